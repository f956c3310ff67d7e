//! Interruptible sleep shared by every background job

use std::time::Duration;
use tokio::time::Instant;

/// Shortest slice `sleep_in_parts` will sleep for
pub const MIN_SLEEP_PART: Duration = Duration::from_millis(1);

/// Sleep for up to `time`, waking every `part` to re-evaluate `condition`.
///
/// Returns as soon as `condition` yields `false`, so a job blocked here can be
/// stopped with a latency of at most one `part` instead of a full interval.
/// A `part` shorter than [`MIN_SLEEP_PART`] is raised to it.
///
/// # Examples
///
/// ```
/// use esox_sharedpool::sleep_in_parts;
/// use std::time::Duration;
///
/// # tokio_test_block_on(async {
/// // condition is already false: returns immediately
/// sleep_in_parts(Duration::from_secs(60), Duration::from_millis(50), || false).await;
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
pub async fn sleep_in_parts<C>(time: Duration, part: Duration, mut condition: C)
where
    C: FnMut() -> bool,
{
    let part = part.max(MIN_SLEEP_PART);
    let end = Instant::now() + time;

    while condition() {
        let remains = end.saturating_duration_since(Instant::now()).min(part);
        if remains.is_zero() {
            break;
        }
        tokio::time::sleep(remains).await;
    }
}
