use std::fs;

use powledger_core::{genesis_block, Block, Candidate, Transaction};
use powledger_storage::SledStore;
use rand::Rng;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledStore) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (
        temp_dir,
        SledStore::open(&db_path).expect("Failed to open SledStore"),
    )
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}

/// A linked chain of `len` blocks with random transfers. Nonces are random and
/// the hashes are not mined; storage does not care about proof-of-work.
pub fn random_chain(len: usize) -> Vec<Block> {
    let mut rng = rand::thread_rng();
    let mut chain = vec![genesis_block()];
    while chain.len() < len {
        let txs = (0..rng.gen_range(0..4))
            .map(|i| Transaction::new(format!("user{i}"), "bob", rng.gen_range(1..100)))
            .collect();
        let tip = &chain[chain.len() - 1];
        let block = Candidate::on_top_of(tip, txs).seal(rng.gen());
        chain.push(block);
    }
    chain
}
