//! Fixed-interval polling with cancellation

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Interval used when polling run status
pub const RUN_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// The predicate held for this value
    Done(T),
    /// Cancelled before the predicate held; carries the last value seen
    Cancelled(Option<T>),
}

/// Call `fetch` every `interval` until `done` holds for its value or
/// `cancel` fires. A fetch error stops polling and is returned.
pub async fn poll_until<T, E, F, Fut, P>(
    interval: Duration,
    cancel: &CancellationToken,
    mut fetch: F,
    mut done: P,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&T) -> bool,
{
    let mut last = None;
    loop {
        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled(last)),
            value = fetch() => value?,
        };
        if done(&value) {
            return Ok(PollOutcome::Done(value));
        }
        last = Some(value);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled(last)),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
