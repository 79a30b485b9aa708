//! The block store interface and an in-memory implementation.

use crate::block::Block;
use crate::cid::Cid;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::lock::{GcLock, GcLocker, PinLock};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Content-addressed storage of raw blocks.
///
/// Implementations are shared between threads and synchronize internally.
/// Every method takes the caller's [`Context`] and should return
/// `Cancelled` promptly once it ends.
pub trait Blockstore: Send + Sync {
    /// Fetch a block. Absent blocks are a `NotFound` error.
    fn get_block(&self, ctx: &Context, cid: &Cid) -> Result<Block>;

    /// Check whether a block is present.
    fn has_block(&self, ctx: &Context, cid: &Cid) -> Result<bool>;

    /// Payload size of a block without transferring the payload.
    fn block_size(&self, ctx: &Context, cid: &Cid) -> Result<u64> {
        Ok(self.get_block(ctx, cid)?.len() as u64)
    }

    /// Persist a block. Storing a block that already exists is a no-op.
    fn put_block(&self, ctx: &Context, block: &Block) -> Result<()>;

    /// Delete a block. Absent blocks are a `NotFound` error.
    fn delete_block(&self, ctx: &Context, cid: &Cid) -> Result<()>;

    /// All stored CIDs, in no particular order.
    fn all_cids(&self, ctx: &Context) -> Result<Vec<Cid>>;

    /// The lock coordinating pinning writers with garbage collection.
    fn locker(&self) -> &GcLocker;

    /// Suspend garbage collection until the returned guard is released.
    fn pin_lock(&self, ctx: &Context) -> Result<PinLock> {
        self.locker().pin_lock(ctx)
    }

    /// Exclude all pinning writers until the returned guard is released.
    fn gc_lock(&self, ctx: &Context) -> Result<GcLock> {
        self.locker().gc_lock(ctx)
    }
}

/// A block store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryBlockstore {
    blocks: RwLock<HashMap<Cid, Block>>,
    locker: GcLocker,
}

impl MemoryBlockstore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

impl Blockstore for MemoryBlockstore {
    fn get_block(&self, ctx: &Context, cid: &Cid) -> Result<Block> {
        ctx.check()?;
        self.blocks
            .read()
            .get(cid)
            .cloned()
            .ok_or_else(|| Error::not_found(cid.to_hex()))
    }

    fn has_block(&self, ctx: &Context, cid: &Cid) -> Result<bool> {
        ctx.check()?;
        Ok(self.blocks.read().contains_key(cid))
    }

    fn block_size(&self, ctx: &Context, cid: &Cid) -> Result<u64> {
        ctx.check()?;
        self.blocks
            .read()
            .get(cid)
            .map(|b| b.len() as u64)
            .ok_or_else(|| Error::not_found(cid.to_hex()))
    }

    fn put_block(&self, ctx: &Context, block: &Block) -> Result<()> {
        ctx.check()?;
        self.blocks
            .write()
            .entry(*block.cid())
            .or_insert_with(|| block.clone());
        Ok(())
    }

    fn delete_block(&self, ctx: &Context, cid: &Cid) -> Result<()> {
        ctx.check()?;
        match self.blocks.write().remove(cid) {
            Some(_) => Ok(()),
            None => Err(Error::not_found(cid.to_hex())),
        }
    }

    fn all_cids(&self, ctx: &Context) -> Result<Vec<Cid>> {
        ctx.check()?;
        Ok(self.blocks.read().keys().copied().collect())
    }

    fn locker(&self) -> &GcLocker {
        &self.locker
    }
}
