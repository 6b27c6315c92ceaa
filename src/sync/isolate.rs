use std::fmt::Display;
use std::future::Future;

use crate::error::{AppError, Result};

use super::{SyncContext, SyncPhase};

/// Result of one item inside an isolated loop.
#[derive(Debug)]
pub struct ItemOutcome<K> {
    pub key: K,
    pub result: Result<()>,
}

#[derive(Debug)]
pub struct IsolatedRun<K> {
    pub outcomes: Vec<ItemOutcome<K>>,
    /// Cancellation stopped the loop before every item ran.
    pub interrupted: bool,
}

impl<K> IsolatedRun<K> {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failed_keys(&self) -> impl Iterator<Item = &K> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| &o.key)
    }
}

/// Run `op` for every item, recording failures instead of propagating them.
///
/// Stops early (without running the remaining items) once the sync is
/// cancelled. When `phase` is given, progress is emitted after each item.
pub async fn isolate_each<T, K, F, Fut>(
    ctx: &SyncContext<'_>,
    phase: Option<SyncPhase>,
    items: Vec<T>,
    key: impl Fn(&T) -> K,
    mut op: F,
) -> IsolatedRun<K>
where
    K: Display,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let total = items.len() as u64;
    let mut run = IsolatedRun {
        outcomes: Vec::with_capacity(items.len()),
        interrupted: false,
    };

    if let Some(phase) = phase {
        ctx.progress.emit(phase, 0, Some(total));
    }

    for (index, item) in items.into_iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            run.interrupted = true;
            break;
        }

        let key = key(&item);
        let result = op(item).await;
        let cancelled = matches!(result, Err(AppError::Cancelled));
        if let Err(e) = &result {
            if !cancelled {
                tracing::warn!("Skipping {}: {}", key, e);
            }
        }
        run.outcomes.push(ItemOutcome { key, result });

        if let Some(phase) = phase {
            ctx.progress.emit(phase, index as u64 + 1, Some(total));
        }
        if cancelled {
            run.interrupted = true;
            break;
        }
        ctx.maybe_yield(index + 1).await;
    }

    run
}
