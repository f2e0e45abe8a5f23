//! Error taxonomy for the channel and pool.
//!
//! Every failure mode is an explicit, typed return value; nothing here ever propagates
//! as an unwind out of a worker thread.

/// Failure to enqueue a message.
///
/// Carries no payload: unlike a `std::sync::mpsc::SendError<T>`, a failing [`Channel::send`]
/// never consumes the caller's message, so there is nothing to hand back.
///
/// [`Channel::send`]: crate::Channel::send
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
#[error("send on a channel that is not Listening")]
pub struct SendError;

/// Failure to dequeue a message: the channel will never yield another one.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
#[error("recv on a channel that is Dead")]
pub struct RecvError;

/// Failure to begin a graceful join.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
#[error("join called on a channel that is not Listening")]
pub struct JoinError;

/// Failure to submit a task: the pool's channel is no longer `Listening`.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
#[error("add_task called on a pool that is not joinable")]
pub struct PoolNotListening;

/// A task's callable panicked while running.
///
/// The panic is caught at the task boundary (see [`crate::task`]) and turned into this
/// value rather than unwinding the worker thread; it is delivered through the task's
/// future exactly like any other result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFailure(pub Option<String>);

impl TaskFailure {
    /// The panic message, if the payload could be downcast to a `String` or `&str`.
    pub fn message(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Recovers a `TaskFailure` from a `std::panic::catch_unwind` payload.
    pub(crate) fn from_panic_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = payload
            .downcast::<String>()
            .map(|s| *s)
            .or_else(|payload| payload.downcast::<&str>().map(|s| s.to_string()))
            .ok();
        TaskFailure(msg)
    }
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(msg) => write!(f, "task panicked: {msg}"),
            None => write!(f, "task panicked"),
        }
    }
}

impl std::error::Error for TaskFailure {}

/// Errors that can arise from [`Pool`](crate::Pool) operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    #[error(transparent)]
    NotListening(#[from] PoolNotListening),
    #[error(transparent)]
    TaskFailure(#[from] TaskFailure),
}

/// The union of every failure this crate can produce.
///
/// Most call sites use the narrower, specific error types directly; this exists so that
/// application code gluing several operations together with `?` has a single type to
/// convert into.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChanPoolError {
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Recv(#[from] RecvError),
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Task(#[from] TaskFailure),
}

impl From<PoolNotListening> for ChanPoolError {
    fn from(e: PoolNotListening) -> Self {
        ChanPoolError::Pool(PoolError::NotListening(e))
    }
}
