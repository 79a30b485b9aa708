//! Cancellation contexts.
//!
//! A [`Context`] is passed to every operation that may block. It carries an
//! optional deadline and can be cancelled from another thread through its
//! [`CancelHandle`]. Blocking waits inside the crate wake up as soon as the
//! context is cancelled.
//!
//! ```
//! use pinstore_core::Context;
//!
//! let (ctx, handle) = Context::with_cancel();
//! assert!(!ctx.is_cancelled());
//!
//! handle.cancel();
//! assert!(ctx.is_cancelled());
//! assert!(ctx.check().is_err());
//! ```

use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Why a context ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Cancelled through its handle.
    Cancelled,
    /// The context's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "context cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Something blocked on its own condition variable that must also wake up
/// when a context is cancelled.
pub(crate) trait Waker: Send + Sync {
    fn wake(&self);
}

struct Shared {
    state: Mutex<Option<CancelReason>>,
    cond: Condvar,
    wakers: Mutex<Vec<Weak<dyn Waker>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(None),
            cond: Condvar::new(),
            wakers: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self, reason: CancelReason) {
        {
            let mut state = self.state.lock();
            if state.is_some() {
                return;
            }
            *state = Some(reason);
            self.cond.notify_all();
        }

        // Wake outside the state lock: wakers take their own locks.
        let wakers = std::mem::take(&mut *self.wakers.lock());
        for waker in wakers.iter().filter_map(Weak::upgrade) {
            waker.wake();
        }
    }
}

/// A cloneable cancellation scope with an optional deadline.
#[derive(Clone)]
pub struct Context {
    shared: Arc<Shared>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            deadline: None,
        }
    }

    /// A context that can be cancelled through the returned handle.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let ctx = Self::background();
        let handle = CancelHandle {
            shared: Arc::clone(&ctx.shared),
        };
        (ctx, handle)
    }

    /// A cancellable context that also expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> (Self, CancelHandle) {
        let (mut ctx, handle) = Self::with_cancel();
        ctx.deadline = Some(Instant::now() + timeout);
        (ctx, handle)
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the reason this context ended, or `None` while it is live.
    pub fn reason(&self) -> Option<CancelReason> {
        if let Some(reason) = *self.shared.state.lock() {
            return Some(reason);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Checks if the context has ended.
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Returns a `Cancelled` error if the context has ended.
    pub fn check(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(Error::cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Blocks for `duration`, returning early with `Cancelled` if the
    /// context ends first.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let until = Instant::now() + duration;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(reason) = *state {
                return Err(Error::cancelled(reason));
            }
            let now = Instant::now();
            if let Some(deadline) = self.deadline
                && now >= deadline
            {
                return Err(Error::cancelled(CancelReason::DeadlineExceeded));
            }
            if now >= until {
                return Ok(());
            }
            let wake_at = match self.deadline {
                Some(deadline) => deadline.min(until),
                None => until,
            };
            self.shared.cond.wait_until(&mut state, wake_at);
        }
    }

    /// Registers a waker to be called once when this context is cancelled
    /// through its handle. Deadlines do not fire wakers; waiters are
    /// expected to bound their waits with [`Context::deadline`].
    pub(crate) fn register_waker(&self, waker: Weak<dyn Waker>) {
        let mut wakers = self.shared.wakers.lock();
        wakers.retain(|w| w.strong_count() > 0);
        wakers.push(waker);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("reason", &self.reason())
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Cancels the context it was created with, and every clone of it.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Cancel the context. Calling this more than once has no effect.
    pub fn cancel(&self) {
        self.shared.cancel(CancelReason::Cancelled);
    }

    /// Checks if this handle has been used.
    pub fn is_cancelled(&self) -> bool {
        self.shared.state.lock().is_some()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
