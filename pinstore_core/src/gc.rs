//! Garbage collection.

use crate::blockstore::Blockstore;
use crate::cid::Cid;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::pin::Pinner;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;

/// Statistics from a garbage collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcStats {
    /// Number of blocks deleted.
    pub objects_deleted: usize,
    /// Payload bytes freed.
    pub bytes_freed: u64,
}

/// Run garbage collection.
///
/// Holds the store's GC lock for the whole run, so no pinning writer can
/// interleave. Every block not in the pin set is deleted. If `dry_run` is
/// true, reports what would be deleted without actually deleting.
#[tracing::instrument(skip_all, fields(dry_run))]
pub fn collect_garbage(
    ctx: &Context,
    store: &dyn Blockstore,
    pinner: &dyn Pinner,
    dry_run: bool,
) -> Result<GcStats> {
    let started = Instant::now();
    let _gc = store.gc_lock(ctx)?;

    let pinned = mark_pinned(pinner)?;
    let stats = sweep(ctx, store, &pinned, dry_run)?;

    tracing::info!(
        pinned = pinned.len(),
        deleted = stats.objects_deleted,
        bytes = stats.bytes_freed,
        elapsed_us = started.elapsed().as_micros() as u64,
        "garbage collection finished"
    );
    Ok(stats)
}

/// Mark phase: the pinned set.
///
/// Blocks carry no links, so a recursive pin protects exactly its own block.
fn mark_pinned(pinner: &dyn Pinner) -> Result<HashSet<Cid>> {
    Ok(pinner.pins()?.into_iter().map(|pin| pin.cid).collect())
}

/// Sweep phase: delete every unmarked block.
fn sweep(
    ctx: &Context,
    store: &dyn Blockstore,
    pinned: &HashSet<Cid>,
    dry_run: bool,
) -> Result<GcStats> {
    let mut stats = GcStats::default();

    for cid in store.all_cids(ctx)? {
        ctx.check()?;
        if pinned.contains(&cid) {
            continue;
        }

        let size = match store.block_size(ctx, &cid) {
            Ok(size) => size,
            // Removed underneath us
            Err(Error::NotFound { .. }) => continue,
            Err(e) => return Err(e),
        };

        if !dry_run {
            match store.delete_block(ctx, &cid) {
                Ok(()) => {}
                Err(Error::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(%cid, size, dry_run, "collected block");
        stats.objects_deleted += 1;
        stats.bytes_freed += size;
    }

    Ok(stats)
}
