//! Durable backends for the ledger's `ChainStore` trait.
pub mod sled_store;

pub use ledger_core::ChainStore;
pub use sled_store::SledStore;
