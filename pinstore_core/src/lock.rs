//! Exclusion between pinning writers and the garbage collector.
//!
//! Writers that must not have their blocks collected before they are pinned
//! hold a shared [`PinLock`]. The collector, and batch removal, hold the
//! exclusive [`GcLock`], which waits for every pin lock to be released.

use crate::context::Context;
use crate::error::Result;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a single lock attempt waits before re-checking the context.
const LOCK_SLICE: Duration = Duration::from_millis(10);

/// The lock shared by a block store and its collector.
#[derive(Debug, Default)]
pub struct GcLocker {
    lock: Arc<RwLock<()>>,
}

impl GcLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a shared pin lock, waiting for any running collection.
    pub fn pin_lock(&self, ctx: &Context) -> Result<PinLock> {
        loop {
            ctx.check()?;
            if let Some(guard) = self.lock.try_read_arc_until(slice_end(ctx)) {
                tracing::trace!("pin lock acquired");
                return Ok(PinLock { guard: Some(guard) });
            }
        }
    }

    /// Acquire the exclusive collection lock, waiting for all pin locks.
    pub fn gc_lock(&self, ctx: &Context) -> Result<GcLock> {
        loop {
            ctx.check()?;
            if let Some(guard) = self.lock.try_write_arc_until(slice_end(ctx)) {
                tracing::trace!("gc lock acquired");
                return Ok(GcLock { guard: Some(guard) });
            }
        }
    }

    /// Returns true while a collection holds the lock.
    pub fn gc_requested(&self) -> bool {
        self.lock.is_locked_exclusive()
    }
}

fn slice_end(ctx: &Context) -> Instant {
    let end = Instant::now() + LOCK_SLICE;
    match ctx.deadline() {
        Some(deadline) => deadline.min(end),
        None => end,
    }
}

/// Shared guard that suspends garbage collection while held.
///
/// Released on drop; [`PinLock::release`] releases early and is idempotent.
#[must_use = "the pin lock is released as soon as it is dropped"]
pub struct PinLock {
    guard: Option<ArcRwLockReadGuard<RawRwLock, ()>>,
}

impl PinLock {
    pub fn release(&mut self) {
        if self.guard.take().is_some() {
            tracing::trace!("pin lock released");
        }
    }

    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for PinLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Exclusive guard held by a collector or batch removal.
#[must_use = "the gc lock is released as soon as it is dropped"]
pub struct GcLock {
    guard: Option<ArcRwLockWriteGuard<RawRwLock, ()>>,
}

impl GcLock {
    pub fn release(&mut self) {
        if self.guard.take().is_some() {
            tracing::trace!("gc lock released");
        }
    }

    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for GcLock {
    fn drop(&mut self) {
        self.release();
    }
}
