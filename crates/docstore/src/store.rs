use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{DocRef, Result, VersionedDoc};

/// A single buffered mutation within a [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Creates or fully replaces a document.
    Set { doc: DocRef, data: Value },
    /// Merges top-level fields into an existing document.
    /// Fails the batch with `NotFound` if the document does not exist.
    Update {
        doc: DocRef,
        fields: serde_json::Map<String, Value>,
    },
    /// Deletes a document. Deleting a missing document is a no-op.
    Delete { doc: DocRef },
}

impl WriteOp {
    /// Returns the document this operation targets.
    pub fn doc(&self) -> &DocRef {
        match self {
            WriteOp::Set { doc, .. } | WriteOp::Update { doc, .. } | WriteOp::Delete { doc } => doc,
        }
    }
}

/// An atomic unit of work: recorded reads to validate plus writes to apply.
///
/// `apply` commits the batch all-or-nothing. Every `(doc, version)` pair in
/// `reads` is re-checked against current state first; `version` is `None`
/// when the document was absent at read time.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Documents read by the transaction with the versions observed.
    pub reads: Vec<(DocRef, Option<crate::Version>)>,
    /// Buffered mutations, applied in order.
    pub writes: Vec<WriteOp>,
}

/// Core trait for document store backends.
///
/// All implementations must be thread-safe (`Send + Sync`). The plain
/// `get`/`set`/`delete` operations are non-transactional; multi-document
/// atomicity goes through `apply`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a single document, returning `None` if it does not exist.
    async fn get(&self, doc: &DocRef) -> Result<Option<VersionedDoc>>;

    /// Reads several documents in one batched operation.
    ///
    /// The result has the same length and order as `docs`, with `None` for
    /// documents that do not exist.
    async fn get_many(&self, docs: &[DocRef]) -> Result<Vec<Option<VersionedDoc>>>;

    /// Creates or replaces a document outside any transaction.
    async fn set(&self, doc: &DocRef, data: Value) -> Result<()>;

    /// Deletes a document outside any transaction. Idempotent.
    async fn delete(&self, doc: &DocRef) -> Result<()>;

    /// Atomically validates the batch's recorded reads and applies its
    /// writes. On any version mismatch the whole batch fails with
    /// `Conflict` and nothing is applied.
    async fn apply(&self, batch: WriteBatch) -> Result<()>;
}

/// Extension trait providing typed convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Reads a document and deserializes it into a typed record.
    async fn get_as<T: DeserializeOwned>(&self, doc: &DocRef) -> Result<Option<T>> {
        match self.get(doc).await? {
            Some(found) => Ok(Some(found.decode()?)),
            None => Ok(None),
        }
    }

    /// Serializes a record and writes it as a document.
    async fn set_as<T: Serialize + Sync>(&self, doc: &DocRef, value: &T) -> Result<()> {
        self.set(doc, serde_json::to_value(value)?).await
    }

    /// Returns true if the document exists.
    async fn exists(&self, doc: &DocRef) -> Result<bool> {
        Ok(self.get(doc).await?.is_some())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}
