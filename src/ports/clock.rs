//! Clock port: elapsed time and sleeping.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future type returned by [`Clock::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Source of monotonic time for retry and polling decisions.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;

    /// Wait for the given duration.
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}
