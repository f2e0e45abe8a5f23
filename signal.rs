//! A degenerate [`Channel`] whose payload is "a signal" rather than a value, a cheap,
//! N-way counting semaphore built on the same lock/condvar plumbing as [`Channel<T>`].
//!
//! Per-sender FIFO and bulk atomicity are inherited for free by specialising
//! `Channel<()>` instead of hand-duplicating a second lock/condvar/atomic-count data
//! structure; the observable behaviour (a non-negative pending-signal count, woken one at
//! a time or all at once) is the same counting-semaphore behaviour as a hand-rolled
//! implementation would give you.

use crate::channel::{Channel, ChannelState};
use crate::error::{RecvError, SendError};

/// A counting semaphore with the same `Listening` → `Killing` → `Dead` shutdown lifecycle
/// as [`Channel<T>`], but no graceful `join`: there is no message inventory to drain,
/// just a pending-signal count.
#[derive(Clone)]
pub struct Signal {
    inner: Channel<()>,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    /// Creates a new signal with zero pending signals.
    pub fn new() -> Self {
        Signal {
            inner: Channel::new(),
        }
    }

    /// Raises the signal once, waking one waiter.
    pub fn send(&self) -> Result<(), SendError> {
        self.inner.send(())
    }

    /// Raises the signal `n` times at once, waking up to `n` waiters.
    pub fn send_n(&self, n: usize) -> Result<(), SendError> {
        self.inner.send_bulk(std::iter::repeat(()).take(n))
    }

    /// Blocks until the signal count is positive, then consumes one.
    pub fn recv(&self) -> Result<(), RecvError> {
        self.inner.recv()
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&self) -> bool {
        self.inner.try_recv().is_some()
    }

    /// Resets the pending count to zero, wakes every waiter, and goes terminal.
    pub fn kill(&self) {
        self.inner.kill()
    }

    /// `true` iff the signal is still `Listening`.
    pub fn joinable(&self) -> bool {
        self.inner.joinable()
    }

    /// The current pending-signal count.
    pub fn pending(&self) -> usize {
        self.inner.len()
    }

    /// A snapshot of the current lifecycle state.
    pub fn state(&self) -> ChannelState {
        self.inner.state()
    }
}
