//! Streamed batch removal of blocks and their pins.
//!
//! [`rm_blocks`] returns a [`RemovalStream`] immediately and removes the
//! requested blocks on a dedicated worker thread. One [`RemovalOutcome`] is
//! delivered per requested CID as soon as that CID has been processed, so a
//! failure on one block never holds back or aborts the others.
//!
//! The worker holds the store's GC lock for the whole batch and flushes the
//! pinner once at the end. Outcomes for blocks whose pin had to be removed
//! (with `force`) are delivered after that flush, so a failed flush is
//! reported on exactly the blocks it affects.

use crate::blockstore::Blockstore;
use crate::cid::Cid;
use crate::context::{Context, Waker};
use crate::error::{Error, Result};
use crate::pin::Pinner;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::thread;

/// Options for [`rm_blocks`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RmBlocksOptions {
    /// Remove pins instead of refusing to delete pinned blocks.
    pub force: bool,
    /// Only report failures.
    pub quiet: bool,
}

/// The result of removing one block.
#[derive(Debug)]
pub struct RemovalOutcome {
    pub cid: Cid,
    pub error: Option<Error>,
}

impl RemovalOutcome {
    fn removed(cid: Cid) -> Self {
        Self { cid, error: None }
    }

    fn failed(cid: Cid, error: Error) -> Self {
        Self {
            cid,
            error: Some(error),
        }
    }

    fn from_result(cid: Cid, result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::removed(cid),
            Err(e) => Self::failed(cid, e),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Cid> {
        match self.error {
            None => Ok(self.cid),
            Some(e) => Err(e),
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    outcomes: VecDeque<RemovalOutcome>,
    closed: bool,
}

/// Single-producer queue between the worker and the stream.
#[derive(Debug, Default)]
struct OutcomeQueue {
    state: Mutex<QueueState>,
    cond: Condvar,
}

impl OutcomeQueue {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                outcomes: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn push(&self, outcome: RemovalOutcome) {
        let mut state = self.state.lock();
        state.outcomes.push_back(outcome);
        self.cond.notify_all();
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.cond.notify_all();
    }
}

impl Waker for OutcomeQueue {
    fn wake(&self) {
        let _state = self.state.lock();
        self.cond.notify_all();
    }
}

/// Closes the queue when the worker exits, including by panic.
struct CloseOnDrop(Arc<OutcomeQueue>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Outcomes of a batch removal, in processing order.
///
/// Shares the batch's context: once it ends, no further outcomes are
/// delivered.
#[derive(Debug)]
pub struct RemovalStream {
    queue: Arc<OutcomeQueue>,
    ctx: Context,
}

impl RemovalStream {
    /// Wait for the next outcome.
    ///
    /// Returns `Ok(None)` once every outcome has been delivered and
    /// `Cancelled` if the context ends first.
    pub fn recv(&self) -> Result<Option<RemovalOutcome>> {
        let mut state = self.queue.state.lock();
        loop {
            self.ctx.check()?;
            if let Some(outcome) = state.outcomes.pop_front() {
                return Ok(Some(outcome));
            }
            if state.closed {
                return Ok(None);
            }
            match self.ctx.deadline() {
                Some(deadline) => {
                    self.queue.cond.wait_until(&mut state, deadline);
                }
                None => self.queue.cond.wait(&mut state),
            }
        }
    }
}

impl Iterator for RemovalStream {
    type Item = RemovalOutcome;

    /// Ends when the batch is done or the context ends.
    fn next(&mut self) -> Option<RemovalOutcome> {
        self.recv().ok().flatten()
    }
}

/// Remove `cids` from `blockstore`, and from `pinner` when `force` is set.
///
/// Returns as soon as the worker thread is started.
pub fn rm_blocks(
    ctx: &Context,
    blockstore: Arc<dyn Blockstore>,
    pinner: Arc<dyn Pinner>,
    cids: Vec<Cid>,
    options: RmBlocksOptions,
) -> Result<RemovalStream> {
    // Bounded by the batch size: the worker never waits on a reader.
    let queue = Arc::new(OutcomeQueue::with_capacity(cids.len()));
    let waker: Weak<dyn Waker> = Arc::downgrade(&queue) as Weak<dyn Waker>;
    ctx.register_waker(waker);

    let worker = Worker {
        ctx: ctx.clone(),
        blockstore,
        pinner,
        options,
        queue: Arc::clone(&queue),
    };
    thread::Builder::new()
        .name("rm-blocks".to_string())
        .spawn(move || {
            let _close = CloseOnDrop(Arc::clone(&worker.queue));
            worker.run(cids);
        })?;

    Ok(RemovalStream {
        queue,
        ctx: ctx.clone(),
    })
}

struct Worker {
    ctx: Context,
    blockstore: Arc<dyn Blockstore>,
    pinner: Arc<dyn Pinner>,
    options: RmBlocksOptions,
    queue: Arc<OutcomeQueue>,
}

/// What processing one CID produced.
enum Step {
    Done(RemovalOutcome),
    /// Pin removed; the outcome waits for the flush.
    Unpinned(RemovalOutcome),
    Cancelled,
}

impl Worker {
    fn run(&self, cids: Vec<Cid>) {
        let total = cids.len();
        let _gc = match self.blockstore.gc_lock(&self.ctx) {
            Ok(lock) => lock,
            Err(e) if e.is_cancelled() => {
                tracing::debug!(total, "batch removal cancelled before start");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to acquire gc lock for removal");
                let reason = e.to_string();
                let mut first = Some(e);
                for cid in cids {
                    let error = first
                        .take()
                        .unwrap_or_else(|| Error::store(cid.to_hex(), reason.clone()));
                    self.queue.push(RemovalOutcome::failed(cid, error));
                }
                return;
            }
        };

        let mut unpinned = Vec::new();
        let mut pins_touched = false;
        let mut cancelled = false;
        let mut failed = 0usize;

        for cid in cids {
            if self.ctx.is_cancelled() {
                cancelled = true;
                break;
            }
            match self.remove_one(cid, &mut pins_touched) {
                Step::Done(outcome) => {
                    if !outcome.is_ok() {
                        failed += 1;
                    }
                    self.emit(outcome);
                }
                Step::Unpinned(outcome) => unpinned.push(outcome),
                Step::Cancelled => {
                    cancelled = true;
                    break;
                }
            }
        }

        if pins_touched {
            let flushed = self.pinner.flush();
            if let Err(e) = &flushed {
                tracing::error!(error = %e, count = unpinned.len(), "failed to persist pin removals");
            }
            if !cancelled {
                for mut outcome in unpinned {
                    if outcome.error.is_none()
                        && let Err(e) = &flushed
                    {
                        outcome.error = Some(Error::pin_operation(
                            outcome.cid.to_hex(),
                            format!("block removed but unpin was not persisted: {}", e),
                        ));
                    }
                    if !outcome.is_ok() {
                        failed += 1;
                    }
                    self.emit(outcome);
                }
            }
        }

        if cancelled {
            tracing::debug!(total, "batch removal cancelled");
        } else {
            tracing::info!(total, failed, force = self.options.force, "batch removal finished");
        }
    }

    /// Sets `pins_touched` once the pinner's in-memory set has changed.
    fn remove_one(&self, cid: Cid, pins_touched: &mut bool) -> Step {
        let pin = match self.pinner.get_pin(&cid) {
            Ok(pin) => pin,
            Err(e) => {
                return Step::Done(RemovalOutcome::failed(
                    cid,
                    Error::pin_operation(cid.to_hex(), e.to_string()),
                ));
            }
        };

        if let Some(pin) = pin {
            if !self.options.force {
                return Step::Done(RemovalOutcome::failed(cid, Error::pinned(cid.to_hex())));
            }
            if let Err(e) = self.pinner.unpin(&cid, true) {
                return Step::Done(RemovalOutcome::failed(
                    cid,
                    Error::pin_operation(cid.to_hex(), e.to_string()),
                ));
            }
            *pins_touched = true;
            tracing::debug!(%cid, "removed pin");

            return match self.blockstore.delete_block(&self.ctx, &cid) {
                Err(e) if e.is_cancelled() => {
                    // The block stays, so its pin must too
                    if let Err(e) = self.pinner.pin(&cid, pin.mode, &pin.label) {
                        tracing::error!(%cid, error = %e, "failed to restore pin after cancelled delete");
                    }
                    Step::Cancelled
                }
                result => Step::Unpinned(RemovalOutcome::from_result(
                    cid,
                    result.map_err(|e| deletion_error(&cid, e)),
                )),
            };
        }

        let result = match self.blockstore.has_block(&self.ctx, &cid) {
            Ok(true) => self.blockstore.delete_block(&self.ctx, &cid),
            Ok(false) => Err(Error::not_found(cid.to_hex())),
            Err(e) => Err(e),
        };
        match result {
            Err(e) if e.is_cancelled() => Step::Cancelled,
            result => Step::Done(RemovalOutcome::from_result(
                cid,
                result.map_err(|e| deletion_error(&cid, e)),
            )),
        }
    }

    fn emit(&self, outcome: RemovalOutcome) {
        if let Some(e) = &outcome.error {
            tracing::warn!(cid = %outcome.cid, error = %e, "failed to remove block");
        } else if self.options.quiet {
            return;
        }
        self.queue.push(outcome);
    }
}

/// Deletion failures other than a missing block are reported as `Store`.
fn deletion_error(cid: &Cid, error: Error) -> Error {
    match error {
        Error::NotFound { .. } | Error::Store { .. } => error,
        other => Error::store(cid.to_hex(), other.to_string()),
    }
}
