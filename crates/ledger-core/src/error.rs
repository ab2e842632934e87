use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Read before `ensure_genesis`; never expected once a node is up.
    #[error("chain has no genesis block")]
    EmptyChain,
    #[error("proof {proof} does not satisfy difficulty {difficulty} for block {index}")]
    InvalidProof {
        index: u64,
        proof: u64,
        difficulty: u32,
    },
    #[error("first block is not a genesis block (sentinel link and seed proof)")]
    BadGenesis,
    #[error("block {index} does not link to the hash of its predecessor")]
    BrokenLink { index: u64 },
    #[error("block at position {position} carries index {index}")]
    IndexMismatch { position: usize, index: u64 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
