use crate::constants::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
use crate::error::{LedgerError, LedgerResult};
use crate::{Block, PreviousHash, Transaction};
use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Number;
use std::time::{SystemTime, UNIX_EPOCH};

/// Trait the storage backends implement so the authority can persist the
/// chain. This lives in `ledger-core` to avoid a circular dependency.
///
/// `load` must hand back exactly what the last `save` wrote.
pub trait ChainStore: Send + Sync {
    fn load(&self) -> Result<Option<Vec<Block>>>;
    fn save(&self, blocks: &[Block]) -> Result<()>;
}

/// Volatile store for tests and throwaway nodes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: Mutex<Option<Vec<Block>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with an existing chain.
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Mutex::new(Some(blocks)),
        }
    }
}

impl ChainStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<Block>>> {
        Ok(self.blocks.lock().clone())
    }

    fn save(&self, blocks: &[Block]) -> Result<()> {
        *self.blocks.lock() = Some(blocks.to_vec());
        Ok(())
    }
}

/// Ordered blocks plus the pool of transactions waiting for the next one.
///
/// `Chain::default()` is the pre-genesis state; everything else goes
/// through [`Chain::new`] or [`Chain::from_blocks`].
#[derive(Clone, Debug, Default)]
pub struct Chain {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
}

/// State captured before a tentative append so it can be undone.
#[derive(Debug)]
pub(crate) struct Checkpoint {
    height: usize,
    pending: Vec<Transaction>,
}

impl Chain {
    pub fn new() -> Self {
        let mut chain = Self::default();
        chain.ensure_genesis();
        chain
    }

    /// Restore a persisted chain, rejecting it if the indices or links are off.
    pub fn from_blocks(blocks: Vec<Block>) -> LedgerResult<Self> {
        if blocks.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        verify_blocks(&blocks)?;
        Ok(Self {
            blocks,
            pending: Vec::new(),
        })
    }

    /// Ensure a genesis block exists. Idempotent; returns whether one was created.
    pub fn ensure_genesis(&mut self) -> bool {
        if !self.blocks.is_empty() {
            return false;
        }
        self.blocks.push(genesis_block());
        true
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last_block(&self) -> LedgerResult<&Block> {
        self.blocks.last().ok_or(LedgerError::EmptyChain)
    }

    /// Queue a transaction for the next block and return that block's index.
    pub fn submit_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: impl Into<Number>,
    ) -> u64 {
        self.pending.push(Transaction::new(sender, recipient, amount));
        // Indices are 1-based and contiguous, so this is `last.index + 1`.
        self.blocks.len() as u64 + 1
    }

    /// Seal the pending pool into a new block and append it.
    ///
    /// The proof is taken as given; checking it is the caller's job.
    pub fn append_block(
        &mut self,
        proof: u64,
        previous_hash: Option<PreviousHash>,
    ) -> LedgerResult<Block> {
        let previous_hash = match previous_hash {
            Some(link) => link,
            None => PreviousHash::Digest(self.last_block()?.hash()?),
        };
        let block = Block {
            index: self.blocks.len() as u64 + 1,
            previous_hash,
            proof,
            timestamp: now_secs(),
            transactions: std::mem::take(&mut self.pending),
        };
        self.blocks.push(block.clone());
        Ok(block)
    }

    /// Re-check index sequence and hash links over the whole chain.
    pub fn verify(&self) -> LedgerResult<()> {
        verify_blocks(&self.blocks)
    }

    /// Committed amount received minus committed amount sent by `id`.
    ///
    /// Stays an integer while every amount involved is one.
    pub fn balance_of(&self, id: &str) -> Number {
        let mut tally = AmountTally::default();
        for tx in self.blocks.iter().flat_map(|b| b.transactions.iter()) {
            if tx.recipient == id {
                tally.add(&tx.amount, 1);
            }
            if tx.sender == id {
                tally.add(&tx.amount, -1);
            }
        }
        tally.total()
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            height: self.blocks.len(),
            pending: self.pending.clone(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.blocks.truncate(checkpoint.height);
        self.pending = checkpoint.pending;
    }
}

#[derive(Default)]
struct AmountTally {
    ints: i128,
    floats: f64,
    saw_float: bool,
}

impl AmountTally {
    fn add(&mut self, amount: &Number, sign: i8) {
        let int = amount
            .as_i64()
            .map(i128::from)
            .or_else(|| amount.as_u64().map(i128::from));
        match int {
            Some(v) => self.ints += i128::from(sign) * v,
            None => {
                self.saw_float = true;
                self.floats += f64::from(sign) * amount.as_f64().unwrap_or_default();
            }
        }
    }

    fn total(&self) -> Number {
        if !self.saw_float {
            if let Ok(v) = i64::try_from(self.ints) {
                return Number::from(v);
            }
        }
        let total = self.ints as f64 + self.floats;
        Number::from_f64(total)
            .or_else(|| Number::from_f64(f64::MAX.copysign(total)))
            .unwrap_or_else(|| Number::from(0))
    }
}

fn verify_blocks(blocks: &[Block]) -> LedgerResult<()> {
    for (position, block) in blocks.iter().enumerate() {
        if block.index != position as u64 + 1 {
            return Err(LedgerError::IndexMismatch {
                position,
                index: block.index,
            });
        }
        if position == 0 {
            if block.previous_hash != PreviousHash::Sentinel(GENESIS_PREVIOUS_HASH)
                || block.proof != GENESIS_PROOF
            {
                return Err(LedgerError::BadGenesis);
            }
            continue;
        }
        let expected = blocks[position - 1].hash()?;
        match &block.previous_hash {
            PreviousHash::Digest(link) if *link == expected => {}
            _ => return Err(LedgerError::BrokenLink { index: block.index }),
        }
    }
    Ok(())
}

/// A zero-transaction genesis block carrying the sentinel link and seed proof.
pub fn genesis_block() -> Block {
    Block {
        index: 1,
        previous_hash: PreviousHash::Sentinel(GENESIS_PREVIOUS_HASH),
        proof: GENESIS_PROOF,
        timestamp: now_secs(),
        transactions: vec![],
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
