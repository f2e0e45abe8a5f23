//! A fixed-size pool of worker threads executing heterogeneous, type-erased tasks.
//!
//! [`Pool`] owns a `Channel<Task>` and spawns `N` worker threads that pull tasks off it
//! until the channel is drained ([`Pool::join`]) or killed ([`Pool::kill`]). Submitting a
//! task ([`Pool::add_task`] / [`Pool::add_task_with_context`]) hands the caller back a
//! [`TaskHandle`] future that resolves once the task has run (or been abandoned).

use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;

use parking_lot::Mutex;

use crate::channel::Channel;
use crate::error::PoolNotListening;
use crate::task::{self, Runnable, Task, TaskHandle};

/// Per-worker, read-only state handed to every task that opts in via
/// [`Pool::add_task_with_context`]. Never shared between workers.
#[derive(Debug, Clone)]
pub struct TaskContext {
    worker_index: usize,
    thread_id: ThreadId,
    thread_name: Option<String>,
    processed_task: u64,
    started_at: Instant,
}

impl TaskContext {
    /// This worker's index in `0..pool_size`.
    pub fn worker_index(&self) -> usize {
        self.worker_index
    }

    /// The OS thread identity running this worker.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// The worker thread's name, as set by [`thread::Builder::name`].
    pub fn worker_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// How many tasks this worker had completed *before* the one currently running.
    pub fn processed_task(&self) -> u64 {
        self.processed_task
    }

    /// When this worker thread started.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}


/// A fixed-size pool of worker threads.
///
/// ```
/// use chanpool::Pool;
/// use futures::executor::block_on;
///
/// let pool = Pool::new(4);
/// let handles: Vec<_> = (0..100).map(|i| pool.add_task(move || i * i).unwrap()).collect();
/// let results: Vec<_> = handles.into_iter().map(|h| block_on(h).unwrap()).collect();
/// assert_eq!(results.iter().sum::<i32>(), (0..100).map(|i| i * i).sum());
/// pool.join();
/// ```
pub struct Pool {
    channel: Channel<Task>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

/// Thread name prefix used by [`Pool::new`]. Workers are named `"{prefix}-{index}"`.
const DEFAULT_NAME_PREFIX: &str = "chanpool-worker";

impl Pool {
    /// Creates a pool with `n` eagerly-spawned worker threads, named
    /// `"chanpool-worker-0"`, `"chanpool-worker-1"`, etc.
    ///
    /// # Panics
    /// Panics if `n == 0`; a pool with no workers can never make progress.
    pub fn new(n: usize) -> Self {
        Self::with_name_prefix(n, DEFAULT_NAME_PREFIX)
    }

    /// Like [`Pool::new`], but worker threads are named `"{prefix}-{index}"` instead of
    /// the default prefix, useful when a host process runs more than one pool and wants
    /// its threads distinguishable in a debugger or `/proc`.
    ///
    /// # Panics
    /// Panics if `n == 0`; a pool with no workers can never make progress.
    pub fn with_name_prefix(n: usize, prefix: impl Into<String>) -> Self {
        assert!(n > 0, "Pool::new requires at least one worker");
        let prefix = prefix.into();
        let channel = Channel::new();
        let workers = (0..n)
            .map(|index| spawn_worker(index, &prefix, channel.clone()))
            .collect();
        log::debug!("pool started with {n} workers (prefix {prefix:?})");
        Pool {
            channel,
            workers: Mutex::new(workers),
            size: n,
        }
    }

    /// The number of worker threads in the pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// `true` iff the pool is still accepting tasks.
    pub fn joinable(&self) -> bool {
        self.channel.joinable()
    }

    /// Submits a context-free task. Fails if the pool is no longer `joinable`.
    pub fn add_task<F, R>(&self, f: F) -> Result<TaskHandle<R>, PoolNotListening>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, handle) = task::task_without_context(f);
        self.channel.send(task).map_err(|_| PoolNotListening)?;
        Ok(handle)
    }

    /// Submits a task that wants to see its [`TaskContext`]. Fails if the pool is no
    /// longer `joinable`.
    pub fn add_task_with_context<F, R>(&self, f: F) -> Result<TaskHandle<R>, PoolNotListening>
    where
        F: FnOnce(&TaskContext) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, handle) = task::task_with_context(f);
        self.channel.send(task).map_err(|_| PoolNotListening)?;
        Ok(handle)
    }

    /// Drains and stops the pool: every task already accepted will run to completion,
    /// `add_task`/`add_task_with_context` fail from here on, and this call blocks until
    /// every worker thread has exited and been joined.
    pub fn join(&self) {
        // Already-Dead (e.g. a second call, or a prior `kill`) is not an error here: the
        // worker vec will simply be empty and the loop below is a no-op.
        let _ = self.channel.join(|| {});
        self.join_workers();
    }

    /// Stops the pool abruptly: tasks that haven't started yet are dropped without
    /// running (their futures resolve to `TaskFailure`); tasks already in flight are
    /// allowed to finish. Blocks until every worker thread has exited and been joined.
    pub fn kill(&self) {
        self.channel.kill();
        self.join_workers();
    }

    fn join_workers(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(err) = worker.join() {
                log::warn!("pool worker thread panicked: {err:?}");
            }
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if self.channel.joinable() {
            self.channel.kill();
        }
        self.join_workers();
    }
}

fn spawn_worker(index: usize, prefix: &str, channel: Channel<Task>) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("{prefix}-{index}"))
        .spawn(move || worker_loop(index, channel))
        .expect("failed to spawn pool worker thread")
}

fn worker_loop(index: usize, channel: Channel<Task>) {
    let thread_id = thread::current().id();
    let thread_name = thread::current().name().map(String::from);
    let started_at = Instant::now();
    let mut processed_task: u64 = 0;

    loop {
        let task = match channel.recv() {
            Ok(task) => task,
            Err(_) => {
                log::debug!("worker {index} exiting: channel is dead");
                break;
            }
        };
        let ctx = TaskContext {
            worker_index: index,
            thread_id,
            thread_name: thread_name.clone(),
            processed_task,
            started_at,
        };
        task.run(&ctx);
        processed_task += 1;
        log::trace!("worker {index} completed task #{processed_task}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_tasks_and_reports_results() {
        let pool = Pool::new(4);
        let handles: Vec<_> = (0..100)
            .map(|i| pool.add_task(move || i * i).unwrap())
            .collect();
        let mut results: Vec<_> = handles.into_iter().map(|h| block_on(h).unwrap()).collect();
        results.sort_unstable();
        let expected: Vec<_> = (0..100).map(|i| i * i).collect();
        assert_eq!(results, expected);
        pool.join();
    }

    #[test]
    fn task_panic_is_isolated() {
        let pool = Pool::new(2);
        let ok1 = pool.add_task(|| 1).unwrap();
        let fail1 = pool.add_task(|| -> i32 { panic!("boom") }).unwrap();
        let ok2 = pool.add_task(|| 2).unwrap();
        let fail2 = pool.add_task(|| -> i32 { panic!("bang") }).unwrap();
        let ok3 = pool.add_task(|| 3).unwrap();

        assert_eq!(block_on(ok1).unwrap(), 1);
        assert!(block_on(fail1).is_err());
        assert_eq!(block_on(ok2).unwrap(), 2);
        assert!(block_on(fail2).is_err());
        assert_eq!(block_on(ok3).unwrap(), 3);

        assert!(pool.joinable());
        pool.join();
        assert!(!pool.joinable());
    }

    #[test]
    fn context_monotonicity_within_one_worker() {
        let pool = Pool::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let seen = seen.clone();
                pool.add_task_with_context(move |ctx| {
                    seen.lock().push(ctx.processed_task());
                })
                .unwrap()
            })
            .collect();
        for h in handles {
            block_on(h).unwrap();
        }
        pool.join();
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn kill_drops_unstarted_tasks() {
        let pool = Pool::new(1);
        let gate = Arc::new(std::sync::Barrier::new(2));
        let blocker = {
            let gate = gate.clone();
            pool.add_task(move || {
                gate.wait();
            })
            .unwrap()
        };
        // Give the single worker time to pick up `blocker` and start blocking on the gate.
        std::thread::sleep(std::time::Duration::from_millis(20));

        let never_runs = pool.add_task(|| panic!("must not run")).unwrap();

        // `kill` blocks until the in-flight `blocker` task finishes, which in turn needs
        // someone on this thread to meet it at the gate, so run it on another thread.
        std::thread::scope(|scope| {
            scope.spawn(|| pool.kill());
            gate.wait();
        });
        block_on(blocker).unwrap();
        assert!(block_on(never_runs).is_err());
    }

    #[test]
    fn size_reports_worker_count() {
        let pool = Pool::new(7);
        assert_eq!(pool.size(), 7);
        pool.join();
    }

    #[test]
    fn with_name_prefix_names_worker_threads() {
        let pool = Pool::with_name_prefix(2, "custom-pool");
        let handle = pool.add_task_with_context(|ctx| ctx.worker_name().map(String::from)).unwrap();
        let name = block_on(handle).unwrap();
        assert!(name.unwrap().starts_with("custom-pool-"));
        pool.join();
    }

    #[test]
    fn processed_count_increments_once_per_task() {
        let pool = Pool::new(3);
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..30)
            .map(|_| {
                let counter = counter.clone();
                pool.add_task(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
            })
            .collect();
        for h in handles {
            block_on(h).unwrap();
        }
        pool.join();
        assert_eq!(counter.load(Ordering::SeqCst), 30);
    }
}
