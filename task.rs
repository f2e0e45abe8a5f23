//! Type-erased, one-shot runnables and the future used to hand their result back.
//!
//! A submitted closure is captured behind a single [`Runnable`] trait object alongside
//! the producer half of a [`futures::channel::oneshot`] pair, a dedicated one-slot
//! channel rather than a reuse of [`Channel`](crate::Channel), since this handoff is
//! exactly one writer, one reader, exactly once.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::error::TaskFailure;
use crate::pool::TaskContext;

/// A one-shot runnable: invoked exactly once, and guaranteed to deliver a result (or a
/// captured panic) to its bound future no matter what.
pub(crate) trait Runnable: Send {
    fn run(self: Box<Self>, ctx: &TaskContext);
}

pub(crate) type Task = Box<dyn Runnable>;

struct WithoutContext<F, R> {
    f: F,
    tx: oneshot::Sender<Result<R, TaskFailure>>,
}

impl<F, R> Runnable for WithoutContext<F, R>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    fn run(self: Box<Self>, _ctx: &TaskContext) {
        let Self { f, tx } = *self;
        let result = panic::catch_unwind(AssertUnwindSafe(f)).map_err(TaskFailure::from_panic_payload);
        if let Err(failure) = &result {
            log::warn!("task panicked: {failure}");
        }
        // A dropped receiver (caller lost interest in the `TaskHandle`) is not our problem.
        let _ = tx.send(result);
    }
}

struct WithContext<F, R> {
    f: F,
    tx: oneshot::Sender<Result<R, TaskFailure>>,
}

impl<F, R> Runnable for WithContext<F, R>
where
    F: FnOnce(&TaskContext) -> R + Send,
    R: Send,
{
    fn run(self: Box<Self>, ctx: &TaskContext) {
        let Self { f, tx } = *self;
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| f(ctx))).map_err(TaskFailure::from_panic_payload);
        if let Err(failure) = &result {
            log::warn!("task panicked: {failure}");
        }
        let _ = tx.send(result);
    }
}

pub(crate) fn task_without_context<F, R>(f: F) -> (Task, TaskHandle<R>)
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let task: Task = Box::new(WithoutContext { f, tx });
    (task, TaskHandle { rx })
}

pub(crate) fn task_with_context<F, R>(f: F) -> (Task, TaskHandle<R>)
where
    F: FnOnce(&TaskContext) -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let task: Task = Box::new(WithContext { f, tx });
    (task, TaskHandle { rx })
}

/// The future returned by [`Pool::add_task`](crate::Pool::add_task) and
/// [`Pool::add_task_with_context`](crate::Pool::add_task_with_context).
///
/// Resolves to the callable's return value, or to [`TaskFailure`] if it panicked while
/// running, or was abandoned (dropped from the queue by [`Pool::kill`](crate::Pool::kill)
/// before it had a chance to run).
pub struct TaskHandle<R> {
    rx: oneshot::Receiver<Result<R, TaskFailure>>,
}

impl<R> Future for TaskHandle<R> {
    type Output = Result<R, TaskFailure>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_canceled)) => Poll::Ready(Err(TaskFailure(Some(
                "task was abandoned before it ran".to_string(),
            )))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn without_context_delivers_value() {
        let (task, handle) = task_without_context(|| 42);
        let ctx = test_ctx();
        task.run(&ctx);
        assert_eq!(block_on(handle).unwrap(), 42);
    }

    #[test]
    fn with_context_sees_worker_index() {
        let (task, handle) = task_with_context(|ctx: &TaskContext| ctx.worker_index());
        let ctx = test_ctx_with_index(3);
        task.run(&ctx);
        assert_eq!(block_on(handle).unwrap(), 3);
    }

    #[test]
    fn panic_is_captured_not_propagated() {
        let (task, handle) = task_without_context(|| -> i32 { panic!("kaboom") });
        let ctx = test_ctx();
        task.run(&ctx);
        let err = block_on(handle).unwrap_err();
        assert_eq!(err.message(), Some("kaboom"));
    }

    #[test]
    fn dropped_task_resolves_to_failure() {
        let (task, handle) = task_without_context(|| 1);
        drop(task);
        assert!(block_on(handle).is_err());
    }

    fn test_ctx() -> TaskContext {
        test_ctx_with_index(0)
    }

    fn test_ctx_with_index(index: usize) -> TaskContext {
        // TaskContext's fields are crate-private; build one the same way the worker loop
        // does, via a throwaway thread so we get a real ThreadId.
        std::thread::spawn(move || crate::pool::test_support::context(index))
            .join()
            .unwrap()
    }
}
