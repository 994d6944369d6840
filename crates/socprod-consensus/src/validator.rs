//! Semantic transaction checks supplied by the host application.

use socprod_types::Transaction;

/// Host capability deciding whether a transaction makes sense for the
/// platform (referenced users exist, the author may edit the post, ...).
/// Structural checks have already passed when this is called.
pub trait TransactionValidator: Send + Sync {
    fn validate(&self, transaction: &Transaction) -> Result<(), String>;
}

/// Accepts every structurally valid transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl TransactionValidator for AcceptAll {
    fn validate(&self, _transaction: &Transaction) -> Result<(), String> {
        Ok(())
    }
}

impl<F> TransactionValidator for F
where
    F: Fn(&Transaction) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, transaction: &Transaction) -> Result<(), String> {
        self(transaction)
    }
}
