mod helpers;

use helpers::{create_temp_store, random_chain, teardown_store};
use powledger_core::{pow::Difficulty, Block, Ledger, LedgerError, Transaction, TxInput};
use powledger_storage::{ChainStore, SledStore};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_storage_integration() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let chain = random_chain(100);
    for block in &chain {
        store.append_block(block)?;
    }
    // Retrieve and verify blocks
    for block in &chain {
        let retrieved = store.get_block(block.index)?.expect("Block should exist");
        assert_eq!(&retrieved, block);
        assert_eq!(retrieved.compute_hash(), block.hash);
    }
    assert_eq!(store.load_chain()?, chain);
    assert_eq!(store.len()?, 100);
    assert_eq!(store.tip_height()?, Some(99));
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_persistence() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().to_path_buf();
    let chain = random_chain(5);
    {
        let store = SledStore::open(&db_path)?;
        for block in &chain {
            store.append_block(block)?;
        }
        store.close()?;
    }
    // Re-open the SledStore and verify the chain persists, timestamps included
    {
        let store = SledStore::open(&db_path)?;
        let loaded = store.load_chain()?;
        assert_eq!(loaded, chain);
        assert_eq!(loaded[3].timestamp, chain[3].timestamp);
    }
    temp_dir.close()?;
    Ok(())
}

#[tokio::test]
async fn test_storage_edge_cases() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let genesis = powledger_core::genesis_block();
    store.append_block(&genesis)?;
    let retrieved = store.get_block(0)?.expect("Empty block should exist");
    assert!(retrieved.transactions.is_empty());

    // Very large block with every optional transaction field populated
    let large_txs: Vec<Transaction> = (0..10_000)
        .map(|i| {
            let mut tx = Transaction::new(format!("addr_from_{i}"), format!("addr_to_{i}"), i)
                .with_signature(vec![i as u8; 64]);
            tx.inputs.push(TxInput {
                txid: vec![7; 32],
                vout: i as u32,
                script_sig: "sig".into(),
            });
            tx
        })
        .collect();
    let large = powledger_core::Candidate::on_top_of(&genesis, large_txs.clone()).seal(0);
    store.append_block(&large)?;
    let retrieved = store.get_block(1)?.expect("Large block should exist");
    assert_eq!(retrieved.transactions, large_txs);
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_rejects_out_of_order_append() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let chain = random_chain(3);
    store.append_block(&chain[0])?;
    assert!(store.append_block(&chain[2]).is_err());
    assert!(store.append_block(&chain[0]).is_err());
    assert_eq!(store.len()?, 1);
    store.append_block(&chain[1])?;
    assert_eq!(store.len()?, 2);
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_replace_chain() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let original = random_chain(6);
    for block in &original {
        store.append_block(block)?;
    }

    // Shrinking drops stale blocks beyond the new length
    let shorter = random_chain(3);
    store.replace_chain(&shorter)?;
    assert_eq!(store.load_chain()?, shorter);
    assert!(store.get_block(4)?.is_none());

    // Growing overwrites everything
    let longer = random_chain(9);
    store.replace_chain(&longer)?;
    assert_eq!(store.load_chain()?, longer);

    // Appending continues from the replaced tip
    let next = powledger_core::Candidate::on_top_of(&longer[8], vec![]).seal(1);
    store.append_block(&next)?;
    assert_eq!(store.len()?, 10);

    assert!(store.replace_chain(&[]).is_err());
    assert_eq!(store.len()?, 10);
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_empty_database() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    assert_eq!(store.len()?, 0);
    assert!(store.is_empty()?);
    assert_eq!(store.tip_height()?, None);
    assert!(store.load_chain()?.is_empty());
    assert!(
        store.get_block(0)?.is_none(),
        "No blocks should exist in an empty database"
    );
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_non_existent_block() -> anyhow::Result<()> {
    let (temp_dir, store) = create_temp_store();
    let block = store.get_block(9999)?;
    assert!(block.is_none(), "Block should not exist");
    teardown_store(temp_dir, store);
    Ok(())
}

#[tokio::test]
async fn test_storage_repeated_open_close() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().to_path_buf();
    let chain = random_chain(10);
    for block in &chain {
        {
            let store = SledStore::open(&db_path)?;
            store.append_block(block)?;
        } // Store goes out of scope and is closed here
        {
            let store = SledStore::open(&db_path)?;
            assert_eq!(store.tip_height()?, Some(block.index));
        }
    }
    temp_dir.close()?;
    Ok(())
}

#[tokio::test]
async fn test_storage_concurrent_reads() -> anyhow::Result<()> {
    use tokio::task;
    let (temp_dir, store) = create_temp_store();
    let chain = random_chain(50);
    for block in &chain {
        store.append_block(block)?;
    }
    let store = Arc::new(store);
    let mut handles = Vec::new();
    for index in 0..50u64 {
        let store = Arc::clone(&store);
        handles.push(task::spawn(async move {
            store.get_block(index).unwrap().unwrap()
        }));
    }
    for (index, handle) in handles.into_iter().enumerate() {
        let block: Block = handle.await?;
        assert_eq!(block, chain[index]);
    }
    let owned = SledStore::clone(&store);
    drop(store);
    teardown_store(temp_dir, owned);
    Ok(())
}

#[tokio::test]
async fn test_storage_data_integrity() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().to_path_buf();
    {
        let store = SledStore::open(&db_path)?;
        for block in random_chain(3) {
            store.append_block(&block)?;
        }
        store.close()?;
    }

    // Corrupt block 1 on disk through raw sled
    {
        let sled_db = sled::open(&db_path)?;
        let blocks = sled_db.open_tree("blocks")?;
        blocks.insert(1u64.to_be_bytes(), vec![0u8; 10])?;
        sled_db.flush()?;
    }

    // Reading it fails gracefully instead of panicking, and a ledger refuses it
    let store = Arc::new(SledStore::open(&db_path)?);
    assert!(store.get_block(0)?.is_some());
    assert!(store.get_block(1).is_err());
    let opened = Ledger::open(store.clone(), Difficulty::new(0));
    assert!(matches!(opened, Err(LedgerError::Storage(_))));
    drop(store);
    temp_dir.close()?;
    Ok(())
}

#[tokio::test]
async fn test_storage_trait_compliance() -> anyhow::Result<()> {
    fn assert_store_trait<T: ChainStore>() {}
    assert_store_trait::<SledStore>();
    Ok(())
}

#[tokio::test]
async fn test_ledger_survives_restart() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().to_path_buf();
    let chain = {
        let store = Arc::new(SledStore::open(&db_path)?);
        let ledger = Ledger::open(store.clone(), Difficulty::new(1))?;
        ledger.submit_transaction(Transaction::new("alice", "bob", 5));
        ledger.mine_next()?;
        ledger.mine_next()?;
        store.close()?;
        ledger.chain()
    };
    assert_eq!(chain.len(), 3);

    let store = Arc::new(SledStore::open(&db_path)?);
    let ledger = Ledger::open(store, Difficulty::new(1))?;
    assert_eq!(ledger.chain(), chain);
    assert!(ledger.pending().is_empty());
    drop(ledger);
    temp_dir.close()?;
    Ok(())
}

#[tokio::test]
async fn test_ledger_replacement_is_persisted() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().to_path_buf();
    let pow = Difficulty::new(0);

    let donor = Ledger::with_pow(pow);
    for _ in 0..4 {
        donor.mine_next()?;
    }
    let longer = powledger_core::VerifiedChain::verify(donor.chain(), &pow)?;

    {
        let store = Arc::new(SledStore::open(&db_path)?);
        let ledger = Ledger::open(store, pow)?;
        assert_eq!(ledger.adopt_if_better(longer.clone())?, Some(1));
    }

    let store = SledStore::open(&db_path)?;
    assert_eq!(store.load_chain()?, longer.into_inner());
    drop(store);
    temp_dir.close()?;
    Ok(())
}
