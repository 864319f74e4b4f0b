//! # Synchronization Primitives
//!
//! RULE: callers never see a lock. Each primitive owns its mutex and exposes
//! only operations that keep the invariant.
//!
//! ## The Handoff
//!
//! ```text
//!   Producer ──push──> SharedQueue ──pop_blocking──> Consumer
//!                                                      │
//!   Initiator <──get── Future <──── Promise <──set─────┘
//! ```
//!
//! ## Two Locks at Once
//!
//! `lock_both` / `lock_all` / `LockPair` acquire all-or-none, so no pair of
//! call sites can deadlock by disagreeing on lock order.

mod cancel;
mod multi_lock;
pub(crate) mod result_channel;
mod shared_queue;

pub use cancel::CancellationToken;
pub use multi_lock::{lock_all, lock_both, lock_both_from, try_lock_both_for, LockPair, StartWith};
pub use result_channel::{channel, Future, Promise, SharedFuture, WaitStatus};
pub use shared_queue::{QueueStats, SharedQueue};
