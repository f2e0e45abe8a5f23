//! The channel lifecycle state machine.
//!
//! A [`Channel<T>`] is a multi-producer, multi-consumer FIFO queue of owned values with
//! an explicit shutdown protocol: [`join`](Channel::join) lets the existing queue drain
//! before going terminal, [`kill`](Channel::kill) discards it immediately. Both are
//! implemented on top of a single [`parking_lot::Mutex`]-guarded `VecDeque` and a pair of
//! condition variables (one signalling "a message is available", the other "the queue is
//! empty"), plus an atomic lifecycle tag that can be read without taking the lock.

use std::collections::VecDeque;
use std::sync::atomic::{self, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{JoinError, RecvError, SendError};

/// Where a [`Channel`] is in its shutdown lifecycle.
///
/// Transitions are monotonic in "shutdownness": `Listening` may advance to `Joining` (via
/// [`Channel::join`]) or to `Killing` (via [`Channel::kill`] or the destructor). `Joining`
/// advances to `Dead` once the queue drains, or is pre-empted by `Killing`. `Killing`
/// always advances to `Dead`. Once `Dead`, every operation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    /// Accepting sends and receives.
    Listening = 0,
    /// Rejecting new sends; receives continue until the queue drains, at which point the
    /// channel becomes `Dead`.
    Joining = 1,
    /// Rejecting everything; the queue is being discarded.
    Killing = 2,
    /// Terminal. Every operation fails (except the infallible `kill`, `joinable`, `len`,
    /// `state`, and `try_recv`).
    Dead = 3,
}

impl ChannelState {
    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => ChannelState::Listening,
            1 => ChannelState::Joining,
            2 => ChannelState::Killing,
            _ => ChannelState::Dead,
        }
    }

    /// Whether a receiver may still be given a message in this state (either one already
    /// queued, or one that arrives later).
    fn receivable(self) -> bool {
        matches!(self, ChannelState::Listening | ChannelState::Joining)
    }
}

struct Inner<T> {
    queue: Mutex<VecDeque<T>>,
    state: AtomicU8,
    /// Number of live `Channel` handles sharing this `Inner`, tracked separately from the
    /// `Arc`'s own strong count so the last-handle check in `Drop` is a single atomic
    /// read-modify-write rather than a read followed by a separate decrement.
    handles: AtomicUsize,
    /// Signalled whenever the queue may have gone from empty to non-empty, or the state
    /// has changed in a way that unblocks a receiver.
    message_available: Condvar,
    /// Signalled whenever the queue has just become empty; this is what `join` waits on.
    queue_empty: Condvar,
}

/// A multi-producer, multi-consumer channel with an explicit shutdown lifecycle.
///
/// Cloning a `Channel` is cheap and gives you another handle onto the same underlying
/// queue, exactly the "shared, non-owning view" that [`Pool`](crate::Pool) hands to its
/// workers, with the original owner (the `Pool`) controlling the channel's lifetime.
pub struct Channel<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        self.inner.handles.fetch_add(1, Ordering::Relaxed);
        Channel {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Channel<T> {
    /// Creates a new, empty channel in the `Listening` state.
    pub fn new() -> Self {
        Channel {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                state: AtomicU8::new(ChannelState::Listening as u8),
                handles: AtomicUsize::new(1),
                message_available: Condvar::new(),
                queue_empty: Condvar::new(),
            }),
        }
    }

    /// A snapshot of the current lifecycle state.
    pub fn state(&self) -> ChannelState {
        ChannelState::from_tag(self.inner.state.load(Ordering::Acquire))
    }

    /// `true` iff the channel is currently `Listening`.
    pub fn joinable(&self) -> bool {
        self.state() == ChannelState::Listening
    }

    /// The number of messages currently queued. Racy with concurrent senders/receivers;
    /// useful for metrics and tests, not for synchronization.
    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// `true` iff no messages are currently queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attempts to enqueue a single message.
    ///
    /// Fails with [`SendError`] if the channel is not `Listening`; the caller keeps
    /// ownership of `msg` in that case (nothing is consumed on a failing send).
    pub fn send(&self, msg: T) -> Result<(), SendError> {
        let mut queue = self.inner.queue.lock();
        if !self.state_is_listening_locked() {
            return Err(SendError);
        }
        queue.push_back(msg);
        let depth = queue.len();
        drop(queue);
        log::trace!("channel: sent message, {depth} now queued");
        self.inner.message_available.notify_one();
        Ok(())
    }

    /// Enqueues a whole batch of messages atomically: no other `send`, `send_bulk`, or
    /// `recv` can interleave with this batch, so the messages appear contiguously in the
    /// per-sender stream.
    pub fn send_bulk(&self, msgs: impl IntoIterator<Item = T>) -> Result<(), SendError> {
        let mut queue = self.inner.queue.lock();
        if !self.state_is_listening_locked() {
            return Err(SendError);
        }
        let before = queue.len();
        queue.extend(msgs);
        let depth = queue.len();
        drop(queue);
        log::trace!("channel: bulk-sent {} messages, {depth} now queued", depth - before);
        self.inner.message_available.notify_all();
        Ok(())
    }

    /// Blocks until a message is available or the channel becomes unreceivable.
    ///
    /// Fails with [`RecvError`] only once the queue is observed empty *and* the channel
    /// is neither `Listening` nor `Joining`, i.e. it will never yield another message.
    pub fn recv(&self) -> Result<T, RecvError> {
        let mut queue = self.inner.queue.lock();
        loop {
            if let Some(msg) = queue.pop_front() {
                self.on_pop_locked(&queue);
                log::trace!("channel: received message, {} left queued", queue.len());
                return Ok(msg);
            }
            if !ChannelState::from_tag(self.inner.state.load(Ordering::Acquire)).receivable() {
                log::trace!("channel: recv failed, channel is no longer receivable");
                return Err(RecvError);
            }
            self.inner.message_available.wait(&mut queue);
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). Returns `None` whether the queue is
    /// merely empty or the channel is unreceivable; this method never fails.
    pub fn try_recv(&self) -> Option<T> {
        let mut queue = self.inner.queue.lock();
        let msg = queue.pop_front()?;
        self.on_pop_locked(&queue);
        Some(msg)
    }

    /// Begins a graceful shutdown.
    ///
    /// Requires the channel to currently be `Listening`, else fails with [`JoinError`].
    /// `hook` runs *before* the state is advanced to `Joining`; it is the caller's last
    /// chance to perform a final Listening-time send (e.g. a poison pill) while other
    /// senders can still succeed too. Once `hook` returns, new sends are rejected and this
    /// call blocks until the existing queue drains, at which point the channel becomes
    /// `Dead` and any blocked receivers wake with [`RecvError`].
    pub fn join(&self, hook: impl FnOnce()) -> Result<(), JoinError> {
        if self.inner.state.load(Ordering::Acquire) != ChannelState::Listening as u8 {
            return Err(JoinError);
        }
        hook();

        let mut queue = self.inner.queue.lock();
        if self.inner.state.load(Ordering::Acquire) != ChannelState::Listening as u8 {
            // A concurrent kill() won the race while the hook ran unlocked.
            return Err(JoinError);
        }
        self.inner
            .state
            .store(ChannelState::Joining as u8, Ordering::Release);
        log::debug!("channel: Listening -> Joining");

        while !queue.is_empty() {
            self.inner.queue_empty.wait(&mut queue);
        }

        // Another kill() may have beaten us to Dead while we were waiting; either way the
        // queue is empty and the channel must end up Dead.
        self.inner
            .state
            .store(ChannelState::Dead as u8, Ordering::Release);
        log::debug!("channel: Joining -> Dead (drained)");
        drop(queue);
        self.inner.message_available.notify_all();
        Ok(())
    }

    /// Aborts the channel immediately: rejects all further sends and receives, discards
    /// any queued messages, and wakes every blocked caller. Infallible and non-blocking.
    pub fn kill(&self) {
        let mut queue = self.inner.queue.lock();
        if self.inner.state.load(Ordering::Acquire) == ChannelState::Dead as u8 {
            return;
        }
        self.inner
            .state
            .store(ChannelState::Killing as u8, Ordering::Release);
        let dropped = queue.len();
        queue.clear();
        log::debug!("channel: Listening/Joining -> Killing, dropping {dropped} queued messages");
        self.inner.message_available.notify_all();
        self.inner.queue_empty.notify_all();
        self.inner
            .state
            .store(ChannelState::Dead as u8, Ordering::Release);
        log::debug!("channel: Killing -> Dead");
    }

    fn state_is_listening_locked(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == ChannelState::Listening as u8
    }

    /// Common bookkeeping after a successful pop, called with the queue guard held.
    fn on_pop_locked(&self, queue: &VecDeque<T>) {
        if queue.is_empty() {
            self.inner.queue_empty.notify_all();
        } else {
            // There's more work; make sure other blocked receivers don't starve waiting
            // for a sender to notify again.
            self.inner.message_available.notify_one();
        }
    }
}

impl<T> Drop for Channel<T> {
    fn drop(&mut self) {
        // A separate "read the count, then decide" check (e.g. Arc::strong_count() == 1)
        // is a race: two handles dropping at the same time can each read the pre-decrement
        // count and both conclude they're not last, so neither calls kill() and a receiver
        // blocked in recv() on some other surviving handle hangs forever. fetch_sub reports
        // the count this call itself observed right before decrementing, atomically, so
        // exactly one dropping handle ever sees 1 and runs the teardown.
        if self.inner.handles.fetch_sub(1, Ordering::Release) == 1 {
            atomic::fence(Ordering::Acquire);
            self.kill();
        }
    }
}
