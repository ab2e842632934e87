//! The single node allowed to validate proofs and extend the chain.
//!
//! All writers go through one `RwLock`, so a proof is always checked
//! against the head as it is at submission time. Two miners that solved
//! the same head race: the first submission advances the head and the
//! second is rejected because its proof no longer fits the new head.

use crate::chain::{Chain, ChainStore};
use crate::constants::{POW_DIFFICULTY, REWARD_AMOUNT, REWARD_SENDER};
use crate::error::{LedgerError, LedgerResult};
use crate::{pow, Block, Transaction};
use parking_lot::RwLock;
use serde_json::Number;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Coinbase-style transaction granted to the miner of each block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardPolicy {
    pub sender: String,
    pub amount: u64,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            sender: REWARD_SENDER.to_string(),
            amount: REWARD_AMOUNT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthorityConfig {
    /// Leading hex zeros required of a proof. Fixed for the process lifetime.
    pub difficulty: u32,
    /// `None` forges blocks without paying the miner.
    pub reward: Option<RewardPolicy>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            difficulty: POW_DIFFICULTY,
            reward: Some(RewardPolicy::default()),
        }
    }
}

pub struct MiningAuthority<S: ChainStore + ?Sized> {
    chain: RwLock<Chain>,
    store: Arc<S>,
    config: AuthorityConfig,
}

impl<S: ChainStore + ?Sized> MiningAuthority<S> {
    /// Load the chain from `store`, or start (and persist) a fresh genesis.
    pub fn open(store: Arc<S>, config: AuthorityConfig) -> LedgerResult<Self> {
        let chain = match store.load().map_err(LedgerError::Storage)? {
            Some(blocks) => {
                let chain = Chain::from_blocks(blocks)?;
                info!(height = chain.len(), "loaded chain from store");
                chain
            }
            None => {
                let chain = Chain::new();
                store.save(chain.blocks()).map_err(LedgerError::Storage)?;
                info!("initialised chain with genesis block");
                chain
            }
        };
        Ok(Self {
            chain: RwLock::new(chain),
            store,
            config,
        })
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn last_block(&self) -> LedgerResult<Block> {
        self.chain.read().last_block().cloned()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.chain.read().blocks().to_vec()
    }

    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.read().is_empty()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        self.chain.read().pending().to_vec()
    }

    pub fn balance_of(&self, id: &str) -> Number {
        self.chain.read().balance_of(id)
    }

    /// Queue a transaction; returns the index of the block it will land in.
    pub fn submit_transaction(
        &self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: impl Into<Number>,
    ) -> u64 {
        let next = self
            .chain
            .write()
            .submit_transaction(sender, recipient, amount);
        debug!(next, "transaction queued");
        next
    }

    /// Validate `proof` against the current head and, if it holds, forge the
    /// next block. A rejected proof leaves the chain and pool untouched.
    pub fn submit_proof(&self, miner_id: &str, proof: u64) -> LedgerResult<Block> {
        let mut chain = self.chain.write();
        let last = chain.last_block()?;
        let fingerprint = last.fingerprint()?;
        if !pow::meets_difficulty(&fingerprint, proof, self.config.difficulty) {
            debug!(miner_id, proof, head = last.index, "proof rejected");
            return Err(LedgerError::InvalidProof {
                index: last.index + 1,
                proof,
                difficulty: self.config.difficulty,
            });
        }

        let checkpoint = chain.checkpoint();
        // The reward must be queued before the append so it lands in the
        // block it pays for.
        if let Some(reward) = &self.config.reward {
            chain.submit_transaction(reward.sender.clone(), miner_id, reward.amount);
        }
        let block = match chain.append_block(proof, None) {
            Ok(block) => block,
            Err(err) => {
                chain.restore(checkpoint);
                return Err(err);
            }
        };
        if let Err(err) = self.store.save(chain.blocks()) {
            chain.restore(checkpoint);
            error!(index = block.index, "failed to persist chain: {err:#}");
            return Err(LedgerError::Storage(err));
        }

        info!(
            index = block.index,
            miner_id,
            proof,
            txs = block.transactions.len(),
            "new block forged"
        );
        Ok(block)
    }
}
