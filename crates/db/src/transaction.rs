//! Scoped transactions.
//!
//! Every compound write (message + attachment binds + mentions, read-state
//! upserts) runs inside [`TransactionManager::run`]: the closure's writes
//! commit together on `Ok` and roll back together on `Err`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use huddle_common::{AppError, AppResult};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionError, TransactionTrait};

/// Boxed future returned by a transaction body.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'c>>;

/// Opens transactions on the shared connection pool.
#[derive(Clone)]
pub struct TransactionManager {
    db: Arc<DatabaseConnection>,
}

impl TransactionManager {
    /// Create a new transaction manager.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Run `body` inside a transaction.
    ///
    /// The body must issue all of its queries through the transaction it is
    /// handed; going back to the pool from inside the body can starve it.
    pub async fn run<F, T>(&self, body: F) -> AppResult<T>
    where
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> TxFuture<'c, T> + Send,
        T: Send,
    {
        self.db
            .transaction::<F, T, AppError>(body)
            .await
            .map_err(|e| match e {
                TransactionError::Connection(err) => AppError::Database(err.to_string()),
                TransactionError::Transaction(err) => err,
            })
    }
}
