/*!
A small concurrency toolkit: a bounded-lifetime message [`Channel`] and a fixed-size
[`Pool`] of worker threads built on top of it.

The channel is the interesting part. It is a multi-producer, multi-consumer, in-memory
FIFO with an explicit shutdown lifecycle: callers can either drain it gracefully with
[`Channel::join`] (existing messages are delivered, new sends are rejected) or abort it
immediately with [`Channel::kill`] (queued messages are dropped, nothing more is ever
delivered). [`Pool`] wires a `Channel<Task>` to a fixed vector of worker threads and hands
each submitted closure back to the caller as a future.

```
use chanpool::Pool;
use futures::executor::block_on;

let pool = Pool::new(4);
let handle = pool.add_task(|| 2 + 2).unwrap();
assert_eq!(block_on(handle).unwrap(), 4);
pool.join();
```
*/

mod channel;
mod error;
mod pool;
mod signal;
mod task;

pub use channel::{Channel, ChannelState};
pub use error::{
    ChanPoolError, JoinError, PoolError, PoolNotListening, RecvError, SendError, TaskFailure,
};
pub use pool::{Pool, TaskContext};
pub use signal::Signal;
pub use task::TaskHandle;

/// Crate-wide result alias, for ergonomic internal use and for callers who don't care
/// which specific error enum they got back.
pub type Result<T> = std::result::Result<T, ChanPoolError>;
