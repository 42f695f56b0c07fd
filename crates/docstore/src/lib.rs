//! Document store abstraction for the storefront back end.
//!
//! Models the persistence contract the fulfillment workflow consumes:
//! documents addressed by `collection/id`, plain CRUD operations, and an
//! atomic multi-document commit with optimistic concurrency. Reads made
//! inside a [`Transaction`] record the observed document version; at commit
//! time every recorded version is re-validated and the buffered writes are
//! applied all-or-nothing. [`run_transaction`] retries the whole body on
//! commit conflicts, which gives concurrent transactions touching the same
//! documents serializable-or-retry semantics.

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod transaction;

pub use document::{DocRef, Version, VersionedDoc};
pub use error::{DocStoreError, Result};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use store::{DocumentStore, DocumentStoreExt, WriteBatch, WriteOp};
pub use transaction::{
    MAX_TRANSACTION_ATTEMPTS, Transaction, TransactionError, run_transaction,
};
