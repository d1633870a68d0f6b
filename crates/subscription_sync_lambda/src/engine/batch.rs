use std::future::Future;

use tokio::task::JoinSet;
use tracing::warn;

use crate::runtime::error::ItemError;

/// Runs `op` once per key on its own task and waits for all of them.
///
/// Results come back in input order. A task that panics or is cancelled
/// still yields an entry for its key, as `ItemError::Aborted`.
pub async fn fan_out<K, T, F, Fut>(keys: Vec<K>, op: F) -> Vec<(K, Result<T, ItemError>)>
where
    K: Clone,
    T: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, ItemError>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for (index, key) in keys.iter().cloned().enumerate() {
        let work = op(key);
        tasks.spawn(async move { (index, work.await) });
    }

    let mut slots: Vec<Option<Result<T, ItemError>>> = keys.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(result);
                }
            }
            Err(error) => warn!(error = %error, "batch task did not complete"),
        }
    }

    keys.into_iter()
        .zip(slots)
        .map(|(key, slot)| (key, slot.unwrap_or(Err(ItemError::Aborted))))
        .collect()
}
