use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    DocRef, DocStoreError, Result, Version, VersionedDoc,
    store::{DocumentStore, WriteBatch, WriteOp},
};

/// In-memory document store implementation for testing and local runs.
///
/// Provides the same interface and conflict semantics as the PostgreSQL
/// implementation. Commits take the write lock for their whole
/// validate-then-apply step, so batches are serialized against each other.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    docs: Arc<RwLock<HashMap<DocRef, VersionedDoc>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of documents stored.
    pub async fn document_count(&self) -> usize {
        self.docs.read().await.len()
    }

    /// Returns the ids of all documents in a collection, sorted.
    pub async fn ids_in_collection(&self, collection: &str) -> Vec<String> {
        let docs = self.docs.read().await;
        let mut ids: Vec<String> = docs
            .keys()
            .filter(|doc| doc.collection() == collection)
            .map(|doc| doc.id().to_string())
            .collect();
        ids.sort();
        ids
    }

    /// Clears all documents.
    pub async fn clear(&self) {
        self.docs.write().await.clear();
    }
}

fn merge_fields(
    docs: &mut HashMap<DocRef, VersionedDoc>,
    doc: &DocRef,
    fields: serde_json::Map<String, Value>,
) -> Result<()> {
    let existing = docs
        .get_mut(doc)
        .ok_or_else(|| DocStoreError::NotFound(doc.clone()))?;
    match existing.data {
        Value::Object(ref mut data) => {
            for (key, value) in fields {
                data.insert(key, value);
            }
        }
        // A non-object payload is fully replaced, same as Postgres `||`.
        _ => existing.data = Value::Object(fields),
    }
    existing.version = existing.version.next();
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, doc: &DocRef) -> Result<Option<VersionedDoc>> {
        Ok(self.docs.read().await.get(doc).cloned())
    }

    async fn get_many(&self, docs: &[DocRef]) -> Result<Vec<Option<VersionedDoc>>> {
        let guard = self.docs.read().await;
        Ok(docs.iter().map(|doc| guard.get(doc).cloned()).collect())
    }

    async fn set(&self, doc: &DocRef, data: Value) -> Result<()> {
        let mut guard = self.docs.write().await;
        let version = guard
            .get(doc)
            .map(|existing| existing.version.next())
            .unwrap_or_else(Version::first);
        guard.insert(doc.clone(), VersionedDoc { version, data });
        Ok(())
    }

    async fn delete(&self, doc: &DocRef) -> Result<()> {
        self.docs.write().await.remove(doc);
        Ok(())
    }

    async fn apply(&self, batch: WriteBatch) -> Result<()> {
        let mut guard = self.docs.write().await;

        // Validate every recorded read against current state.
        for (doc, expected) in &batch.reads {
            let actual = guard.get(doc).map(|d| d.version);
            if actual != *expected {
                metrics::counter!("docstore_conflicts_total").increment(1);
                return Err(DocStoreError::Conflict {
                    doc: doc.clone(),
                    expected: *expected,
                    actual,
                });
            }
        }

        // Apply against a scratch copy so a mid-batch failure (missing
        // update target) leaves the store untouched.
        let mut next = guard.clone();
        for write in batch.writes {
            match write {
                WriteOp::Set { doc, data } => {
                    let version = next
                        .get(&doc)
                        .map(|existing| existing.version.next())
                        .unwrap_or_else(Version::first);
                    next.insert(doc, VersionedDoc { version, data });
                }
                WriteOp::Update { doc, fields } => {
                    merge_fields(&mut next, &doc, fields)?;
                }
                WriteOp::Delete { doc } => {
                    next.remove(&doc);
                }
            }
        }
        *guard = next;
        Ok(())
    }
}
