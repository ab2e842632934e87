use ledger_core::chain::Chain;
use ledger_core::{mine, AuthorityConfig, Block, ChainStore, MiningAuthority};
use ledger_storage::SledStore;
use rand::Rng;
use serde_json::Number;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

fn random_chain(num_blocks: usize) -> Chain {
    let mut rng = rand::thread_rng();
    let mut chain = Chain::new();
    for _ in 1..num_blocks {
        for i in 0..rng.gen_range(0..5) {
            chain.submit_transaction(format!("addr_from_{i}"), "addr_to", rng.gen_range(1u64..1000));
        }
        chain.append_block(rng.gen(), None).unwrap();
    }
    chain
}

#[tokio::test]
async fn test_storage_round_trip() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().to_path_buf();
    let store = SledStore::open(&db_path)?;
    assert!(store.load()?.is_none());

    let chain = random_chain(100);
    store.save(chain.blocks())?;

    let loaded = store.load()?.expect("chain should exist");
    assert_eq!(loaded, chain.blocks());
    for (saved, original) in loaded.iter().zip(chain.blocks()) {
        assert_eq!(saved.hash()?, original.hash()?);
    }
    assert_eq!(store.height()?, 100);

    temp_dir.close()?;
    let _ = fs::remove_dir_all(db_path);
    Ok(())
}

#[tokio::test]
async fn test_storage_persistence() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().to_path_buf();
    let chain = random_chain(10);
    {
        let store = SledStore::open(&db_path)?;
        store.save(chain.blocks())?;
        store.close()?;
        // `store` dropped here -> lock released
    }
    {
        let store = SledStore::open(&db_path)?;
        let loaded = store.load()?.expect("chain should persist");
        let restored = Chain::from_blocks(loaded)?;
        assert_eq!(restored.blocks(), chain.blocks());
        restored.verify()?;
    }

    temp_dir.close()?;
    let _ = fs::remove_dir_all(db_path);
    Ok(())
}

#[tokio::test]
async fn test_storage_drops_stale_tail() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = SledStore::open(temp_dir.path())?;
    let chain = random_chain(8);
    store.save(chain.blocks())?;
    store.save(&chain.blocks()[..3])?;
    let loaded = store.load()?.expect("chain should exist");
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded, &chain.blocks()[..3]);
    Ok(())
}

#[tokio::test]
async fn test_storage_rejects_misindexed_chain() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = SledStore::open(temp_dir.path())?;
    let mut blocks: Vec<Block> = random_chain(3).blocks().to_vec();
    blocks.swap(1, 2);
    assert!(store.save(&blocks).is_err());
    assert!(store.load()?.is_none(), "a rejected save must not write");
    Ok(())
}

#[tokio::test]
async fn test_storage_corrupt_value_fails_load() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().to_path_buf();
    {
        let store = SledStore::open(&db_path)?;
        store.save(random_chain(2).blocks())?;
        store.close()?;
    }
    {
        let sled_db = sled::open(&db_path)?;
        let blocks = sled_db.open_tree("blocks")?;
        blocks.insert(2u64.to_be_bytes(), vec![0u8; 10])?;
        sled_db.flush()?;
    }
    let store = SledStore::open(&db_path)?;
    assert!(store.load().is_err());
    Ok(())
}

#[tokio::test]
async fn test_authority_reloads_identical_chain() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().to_path_buf();
    let config = AuthorityConfig {
        difficulty: 2,
        ..AuthorityConfig::default()
    };
    let stop = AtomicBool::new(false);

    let before = {
        let store = Arc::new(SledStore::open(&db_path)?);
        let authority = MiningAuthority::open(store, config.clone())?;
        for round in 0..3 {
            authority.submit_transaction("alice", "bob", round + 1);
            let head = authority.last_block()?;
            let proof = mine::search_proof(&head.fingerprint()?, 2, &stop).expect("proof");
            authority.submit_proof("miner-1", proof)?;
        }
        authority.store().close()?;
        authority.blocks()
    };
    assert_eq!(before.len(), 4);

    let store = Arc::new(SledStore::open(&db_path)?);
    let authority = MiningAuthority::open(store, config)?;
    assert_eq!(authority.blocks(), before);
    assert_eq!(authority.last_block()?.hash()?, before[3].hash()?);
    assert_eq!(authority.balance_of("miner-1"), Number::from(3));
    assert_eq!(authority.balance_of("bob"), Number::from(6));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_transactions_land_in_one_block() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = Arc::new(SledStore::open(temp_dir.path())?);
    let authority = Arc::new(MiningAuthority::open(
        store,
        AuthorityConfig {
            difficulty: 0,
            reward: None,
        },
    )?);

    let mut handles = Vec::new();
    for i in 0..50u64 {
        let authority = Arc::clone(&authority);
        handles.push(tokio::task::spawn_blocking(move || {
            authority.submit_transaction(format!("user-{i}"), "sink", i)
        }));
    }
    for handle in handles {
        assert_eq!(handle.await?, 2);
    }

    let block = authority.submit_proof("miner", 0)?;
    assert_eq!(block.transactions.len(), 50);
    assert!(authority.pending().is_empty());
    assert_eq!(authority.store().load()?.expect("saved").len(), 2);
    Ok(())
}
