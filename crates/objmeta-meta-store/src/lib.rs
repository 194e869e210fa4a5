//! objmeta Metadata Store - transactional object metadata engine
//!
//! [`Meta`] implements the object metadata operations of the gateway on
//! top of any [`MetaClient`]. [`RedbMetaStore`] is the persistent client
//! backed by redb.

pub mod client;
pub mod object;
pub mod store;
pub mod tables;
pub mod txn;
pub mod usage;
pub mod version;

#[cfg(test)]
mod testing;

// Re-exports
pub use client::MetaClient;
pub use object::Meta;
pub use store::{MetaStoreError, MetaStoreResult, RedbMetaStore};
pub use txn::TxGuard;
pub use usage::UsageDelta;
pub use version::VersionClock;
