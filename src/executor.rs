use futures::future::BoxFuture;

use crate::error::BoxError;

/// The execution service the drain loop runs on.
///
/// This is an injected capability rather than a global: the drain loop
/// submits each of its steps through `schedule`, and faults that can no
/// longer be attributed to any live consumer call (a panicking terminal
/// handler) are escalated through `report_failure`. Steps submitted from
/// one drain sequence must run in submission order; since a subscriber has
/// at most one outstanding step at a time, any spawn-like implementation
/// satisfies that.
pub trait Executor: Send + Sync + 'static {
    /// Run a unit of work asynchronously.
    fn schedule(&self, step: BoxFuture<'static, ()>);

    /// Process-wide sink for faults with no remaining delivery channel.
    fn report_failure(&self, error: BoxError);
}

/// Runs drain steps on a Tokio runtime.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioExecutor {
    /// Use an explicit runtime handle. Producers may then call into the
    /// subscriber from threads outside the runtime.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the calling context.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime, as
    /// [`tokio::runtime::Handle::current`] does.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

#[cfg(feature = "tokio")]
impl Executor for TokioExecutor {
    fn schedule(&self, step: BoxFuture<'static, ()>) {
        self.handle.spawn(step);
    }

    fn report_failure(&self, error: BoxError) {
        log::error!("unreportable consumer fault: {error}");
    }
}
