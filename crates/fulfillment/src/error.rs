//! Fulfillment failure taxonomy.

use docstore::{DocStoreError, TransactionError};
use domain::DomainError;

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    /// A business rule rejected the order. Terminal for this payment.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The checkout session for the payment does not exist.
    #[error("no checkout session found for payment {0}")]
    SessionNotFound(domain::PaymentId),

    /// The document store failed outside the business rules.
    #[error("document store error: {0}")]
    Store(#[from] DocStoreError),

    /// The transaction kept losing version races and gave up.
    #[error("fulfillment transaction contention, gave up after {attempts} attempts")]
    Contention { attempts: u32 },
}

impl From<TransactionError<FulfillmentError>> for FulfillmentError {
    fn from(err: TransactionError<FulfillmentError>) -> Self {
        match err {
            TransactionError::Aborted(e) => e,
            TransactionError::Store(e) => FulfillmentError::Store(e),
            TransactionError::RetriesExhausted { attempts } => {
                FulfillmentError::Contention { attempts }
            }
        }
    }
}

impl FulfillmentError {
    /// True when the failure is a business rejection rather than an
    /// infrastructure fault.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            FulfillmentError::Domain(_) | FulfillmentError::SessionNotFound(_)
        )
    }
}
