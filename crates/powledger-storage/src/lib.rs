pub mod sled_store;

pub use powledger_core::ChainStore;
pub use sled_store::SledStore;
