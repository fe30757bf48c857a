/*!
 * Transaction helpers
 *
 * Services open a transaction with [`begin`], run their writes against it and
 * hand the outcome to [`finish`], which commits on `Ok` and rolls back on `Err`.
 */

use crate::errors::ServiceError;
use metrics::counter;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use tracing::warn;

/// Opens a transaction on the pool.
pub async fn begin(db: &DatabaseConnection) -> Result<DatabaseTransaction, ServiceError> {
    let txn = db.begin().await.map_err(ServiceError::db_error)?;
    counter!("backoffice_db.transaction.started", 1);
    Ok(txn)
}

/// Commits `txn` when `outcome` is `Ok`, otherwise rolls it back and returns the
/// original error.
///
/// ```rust,ignore
/// let txn = transaction::begin(&db).await?;
/// let outcome = write_everything(&txn).await;
/// transaction::finish(txn, outcome).await
/// ```
pub async fn finish<T>(
    txn: DatabaseTransaction,
    outcome: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match outcome {
        Ok(value) => {
            txn.commit().await.map_err(ServiceError::db_error)?;
            counter!("backoffice_db.transaction.committed", 1);
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(error = %rollback_err, "transaction rollback failed");
            }
            counter!("backoffice_db.transaction.rolled_back", 1);
            Err(err)
        }
    }
}
