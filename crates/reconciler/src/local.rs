use futures_util::future::BoxFuture;
use record_store::{RecordStore, with_transaction};

use crate::error::Result;

/// Runs `f` in one local transaction, committing only if it succeeds.
pub(crate) async fn transaction<S, T, F>(store: &S, f: F) -> Result<T>
where
    S: RecordStore,
    F: for<'t> FnOnce(&'t mut S::Tx) -> BoxFuture<'t, Result<T>>,
{
    with_transaction(store, f).await
}
