use anyhow::{bail, Context, Result};
use ledger_core::{Block, ChainStore};
use sled::{Batch, Db, Tree};
use std::path::Path;
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";

/// Chain persisted as one JSON value per block, keyed by big-endian index
/// so iteration order is chain order.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    blocks: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path)
            .with_context(|| format!("opening sled store at {}", path.display()))?;
        let blocks = db.open_tree(TREE_BLOCKS)?;
        info!(path = %path.display(), "sled store opened");
        Ok(Self { db, blocks })
    }

    /// Index of the stored tip, read from the last key.
    pub fn height(&self) -> Result<usize> {
        let Some((key, _)) = self.blocks.last()? else {
            return Ok(0);
        };
        let key: [u8; 8] = key.as_ref().try_into().context("malformed block key")?;
        Ok(u64::from_be_bytes(key) as usize)
    }

    pub fn close(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl ChainStore for SledStore {
    fn load(&self) -> Result<Option<Vec<Block>>> {
        if self.blocks.is_empty() {
            return Ok(None);
        }
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for entry in self.blocks.iter() {
            let (key, value) = entry?;
            let block: Block = serde_json::from_slice(&value)
                .with_context(|| format!("decoding block under key {key:?}"))?;
            blocks.push(block);
        }
        debug!(height = blocks.len(), "chain loaded");
        Ok(Some(blocks))
    }

    fn save(&self, blocks: &[Block]) -> Result<()> {
        let written = self.persist(blocks)?;
        debug!(height = blocks.len(), written, "chain saved");
        Ok(())
    }
}

impl SledStore {
    /// Writes only the blocks past the longest prefix already on disk, then
    /// trims anything beyond the new tip. Returns how many blocks were written.
    fn persist(&self, blocks: &[Block]) -> Result<usize> {
        for (position, block) in blocks.iter().enumerate() {
            if block.index != position as u64 + 1 {
                bail!("block at position {position} carries index {}", block.index);
            }
        }

        let kept = self.stored_prefix(blocks)?;
        let mut batch = Batch::default();
        for block in &blocks[kept..] {
            batch.insert(block.index.to_be_bytes().to_vec(), serde_json::to_vec(block)?);
        }
        for key in self.blocks.range((blocks.len() as u64 + 1).to_be_bytes()..) {
            let (key, _) = key?;
            batch.remove(key);
        }
        self.blocks.apply_batch(batch)?;
        self.db.flush()?;
        Ok(blocks.len() - kept)
    }

    /// Length of the leading run of `blocks` that is already stored. Blocks
    /// are hash-linked, so a stored block that matches implies its
    /// predecessors match too; the scan walks back from the shorter tip.
    fn stored_prefix(&self, blocks: &[Block]) -> Result<usize> {
        let mut position = blocks.len().min(self.height()?);
        while position > 0 {
            let block = &blocks[position - 1];
            match self.blocks.get(block.index.to_be_bytes())? {
                Some(stored) if stored.as_ref() == serde_json::to_vec(block)?.as_slice() => break,
                _ => position -= 1,
            }
        }
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::chain::Chain;
    use tempfile::tempdir;

    /// Grows `chain` to `len` blocks; `seed` makes the history distinct.
    fn grow(mut chain: Chain, len: usize, seed: u64) -> Chain {
        for proof in chain.len() as u64..len as u64 {
            chain.submit_transaction("a", format!("b-{seed}"), proof);
            chain.append_block(seed * 1_000 + proof, None).unwrap();
        }
        chain
    }

    fn fork_of(chain: &Chain, keep: usize) -> Chain {
        Chain::from_blocks(chain.blocks()[..keep].to_vec()).unwrap()
    }

    #[test]
    fn appending_writes_only_the_new_block() {
        let temp_dir = tempdir().unwrap();
        let store = SledStore::open(temp_dir.path()).unwrap();
        let mut chain = grow(Chain::new(), 5, 1);

        assert_eq!(store.persist(chain.blocks()).unwrap(), 5);
        assert_eq!(store.persist(chain.blocks()).unwrap(), 0);

        chain.append_block(42, None).unwrap();
        assert_eq!(store.persist(chain.blocks()).unwrap(), 1);
        assert_eq!(store.height().unwrap(), 6);
        assert_eq!(store.load().unwrap().unwrap(), chain.blocks());
    }

    #[test]
    fn divergent_chain_is_rewritten_from_the_fork() {
        let temp_dir = tempdir().unwrap();
        let store = SledStore::open(temp_dir.path()).unwrap();
        let original = grow(Chain::new(), 6, 1);
        store.persist(original.blocks()).unwrap();

        // Same first three blocks, then a shorter history of its own.
        let fork = grow(fork_of(&original, 3), 4, 2);
        assert_eq!(store.persist(fork.blocks()).unwrap(), 1);
        assert_eq!(store.height().unwrap(), 4);
        assert_eq!(store.load().unwrap().unwrap(), fork.blocks());

        // Only genesis in common: everything after it is rewritten.
        let other = grow(fork_of(&original, 1), 7, 3);
        assert_eq!(store.persist(other.blocks()).unwrap(), 6);
        assert_eq!(store.load().unwrap().unwrap(), other.blocks());
    }
}
