pub mod authority;
pub mod canonical;
pub mod chain;
pub mod constants;
pub mod error;
pub mod mine;
pub mod wire;

use serde::{Deserialize, Serialize};
use serde_json::Number;
use sha2::{Digest, Sha256};
use std::fmt;

pub use authority::{AuthorityConfig, MiningAuthority, RewardPolicy};
pub use chain::{Chain, ChainStore, MemoryStore};
pub use error::{LedgerError, LedgerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Any JSON number; integers and floats keep their wire form.
    pub amount: Number,
    pub recipient: String,
    pub sender: String,
}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: impl Into<Number>,
    ) -> Self {
        Self {
            amount: amount.into(),
            recipient: recipient.into(),
            sender: sender.into(),
        }
    }
}

/// Link from a block to its predecessor.
///
/// Genesis carries a bare integer sentinel instead of a digest; it is kept
/// as an integer on the wire so that it hashes the same everywhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreviousHash {
    Sentinel(u64),
    Digest(String),
}

impl fmt::Display for PreviousHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviousHash::Sentinel(v) => write!(f, "{v}"),
            PreviousHash::Digest(h) => f.write_str(h),
        }
    }
}

impl From<String> for PreviousHash {
    fn from(digest: String) -> Self {
        PreviousHash::Digest(digest)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: PreviousHash,
    pub proof: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Canonical serialization; the input to both hashing and proof checks.
    pub fn fingerprint(&self) -> LedgerResult<Vec<u8>> {
        canonical::to_canonical_vec(self)
    }

    /// Lowercase hex SHA-256 of the fingerprint.
    pub fn hash(&self) -> LedgerResult<String> {
        let fingerprint = self.fingerprint()?;
        Ok(hex::encode(Sha256::digest(&fingerprint)))
    }
}

pub mod pow {
    use super::constants::{HASH_SIZE, POW_DIFFICULTY};
    use sha2::{Digest, Sha256};

    pub type ProofDigest = [u8; HASH_SIZE];

    /// SHA-256 over the fingerprint followed by the decimal proof.
    pub fn proof_digest(fingerprint: &[u8], proof: u64) -> ProofDigest {
        seeded_digest(&Sha256::new_with_prefix(fingerprint), proof)
    }

    /// Same as [`proof_digest`] but resumes from a hasher that has already
    /// absorbed the fingerprint, so search loops hash it only once.
    pub fn seeded_digest(seeded: &Sha256, proof: u64) -> ProofDigest {
        let digest = seeded.clone().chain_update(proof.to_string()).finalize();
        let mut out = [0u8; HASH_SIZE];
        out.copy_from_slice(&digest[..]);
        out
    }

    pub fn count_leading_zero_bits(hash: &ProofDigest) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 8;
            } else {
                total += b.leading_zeros();
                break;
            }
        }
        total
    }

    /// Number of leading `'0'` characters in the hex rendering of `hash`.
    pub fn leading_zero_hex_digits(hash: &ProofDigest) -> u32 {
        count_leading_zero_bits(hash) / 4
    }

    pub fn meets_difficulty(fingerprint: &[u8], proof: u64, difficulty: u32) -> bool {
        leading_zero_hex_digits(&proof_digest(fingerprint, proof)) >= difficulty
    }

    /// The fixed puzzle: six leading hex zeros.
    pub fn is_valid_proof(fingerprint: &[u8], proof: u64) -> bool {
        meets_difficulty(fingerprint, proof, POW_DIFFICULTY)
    }
}
