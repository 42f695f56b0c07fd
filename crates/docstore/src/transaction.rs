//! Optimistic transactions over a [`DocumentStore`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::{
    DocRef, DocStoreError, Result, Version,
    store::{DocumentStore, WriteBatch, WriteOp},
};

/// Maximum number of times [`run_transaction`] re-runs a body whose commit
/// hit a conflict before giving up.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Error returned by [`run_transaction`].
#[derive(Debug, Error)]
pub enum TransactionError<E> {
    /// The transaction body returned an error. No writes were applied and
    /// the body is not retried.
    #[error("Transaction aborted: {0}")]
    Aborted(E),

    /// The store failed while reading or committing.
    #[error("Transaction failed: {0}")]
    Store(DocStoreError),

    /// Commit conflicts persisted through every retry attempt.
    #[error("Transaction contention persisted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// A transaction in progress: snapshot reads with recorded versions plus
/// buffered writes. Writes are invisible until commit, including to reads
/// made later in the same transaction.
pub struct Transaction<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
    reads: Vec<(DocRef, Option<Version>)>,
    writes: Vec<WriteOp>,
}

impl<'s, S: DocumentStore + ?Sized> Transaction<'s, S> {
    fn new(store: &'s S) -> Self {
        Self {
            store,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Reads a document, recording its version for commit-time validation.
    pub async fn get<T: DeserializeOwned>(&mut self, doc: &DocRef) -> Result<Option<T>> {
        let found = self.store.get(doc).await?;
        self.reads
            .push((doc.clone(), found.as_ref().map(|d| d.version)));
        match found {
            Some(found) => Ok(Some(found.decode()?)),
            None => Ok(None),
        }
    }

    /// Reads several documents in one batched operation, recording every
    /// version. Result order matches `docs`; missing documents are `None`.
    pub async fn get_many<T: DeserializeOwned>(
        &mut self,
        docs: &[DocRef],
    ) -> Result<Vec<Option<T>>> {
        let found = self.store.get_many(docs).await?;
        for (doc, slot) in docs.iter().zip(found.iter()) {
            self.reads
                .push((doc.clone(), slot.as_ref().map(|d| d.version)));
        }
        found
            .into_iter()
            .map(|slot| slot.map(|d| d.decode()).transpose())
            .collect()
    }

    /// Buffers a create-or-replace write.
    pub fn set<T: Serialize>(&mut self, doc: &DocRef, value: &T) -> Result<()> {
        self.writes.push(WriteOp::Set {
            doc: doc.clone(),
            data: serde_json::to_value(value)?,
        });
        Ok(())
    }

    /// Buffers a partial update merging `fields` (a JSON object) into an
    /// existing document.
    pub fn update(&mut self, doc: &DocRef, fields: Value) -> Result<()> {
        let Value::Object(fields) = fields else {
            return Err(DocStoreError::InvalidUpdate(doc.clone()));
        };
        self.writes.push(WriteOp::Update {
            doc: doc.clone(),
            fields,
        });
        Ok(())
    }

    /// Buffers a delete.
    pub fn delete(&mut self, doc: &DocRef) {
        self.writes.push(WriteOp::Delete { doc: doc.clone() });
    }

    async fn commit(self) -> Result<()> {
        self.store
            .apply(WriteBatch {
                reads: self.reads,
                writes: self.writes,
            })
            .await
    }
}

/// Runs `body` inside an optimistic transaction.
///
/// The body receives a [`Transaction`] for its reads and writes. If the body
/// returns an error the transaction aborts with no writes applied. If the
/// commit hits a version conflict the body is re-run against fresh state, up
/// to [`MAX_TRANSACTION_ATTEMPTS`] times.
pub async fn run_transaction<S, F, T, E>(
    store: &S,
    body: F,
) -> std::result::Result<T, TransactionError<E>>
where
    S: DocumentStore + ?Sized,
    F: AsyncFn(&mut Transaction<'_, S>) -> std::result::Result<T, E>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        let mut tx = Transaction::new(store);
        let value = match body(&mut tx).await {
            Ok(value) => value,
            Err(e) => return Err(TransactionError::Aborted(e)),
        };
        match tx.commit().await {
            Ok(()) => return Ok(value),
            Err(DocStoreError::Conflict { doc, .. }) => {
                metrics::counter!("docstore_transaction_conflicts_total").increment(1);
                if attempts >= MAX_TRANSACTION_ATTEMPTS {
                    return Err(TransactionError::RetriesExhausted { attempts });
                }
                tracing::debug!(%doc, attempts, "transaction conflict, retrying");
            }
            Err(e) => return Err(TransactionError::Store(e)),
        }
    }
}
