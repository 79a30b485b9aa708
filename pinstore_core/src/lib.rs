//! # Pinstore Core
//!
//! A content-addressed block store with pinning.
//!
//! Payloads are stored as immutable blocks named by their CID. Pinned blocks
//! survive garbage collection; unpinned ones are collected. A shared pin
//! lock keeps the collector from removing a block between the moment it is
//! written and the moment it is pinned.
//!
//! ## Features
//!
//! - Put, get, stat and remove single blocks through [`BlockService`]
//! - CIDs with selectable version, codec and hash (BLAKE3 or SHA2-256)
//! - Durable pins and mutable names
//! - Streamed batch removal with per-block outcomes
//! - Cancellation and deadlines through [`Context`]
//!
//! ## Example
//!
//! ```no_run
//! use pinstore_core::{
//!     BlockService, ContentPath, Context, FsBlockstore, PutOptions, RmOptions, StoreConfig,
//! };
//! use std::io::Read;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! FsBlockstore::init("./my-store", StoreConfig::default())?;
//! let service = BlockService::open_fs("./my-store")?;
//! let ctx = Context::background();
//!
//! // Store and pin a payload
//! let options = PutOptions { pin: true, ..PutOptions::default() };
//! let stat = service.put(&ctx, &b"hello"[..], &options)?;
//! println!("{} ({} bytes)", stat.path(), stat.size());
//!
//! // Read it back
//! let path = ContentPath::from(*stat.path());
//! let mut data = Vec::new();
//! service.get(&ctx, &path)?.read_to_end(&mut data)?;
//!
//! // Pinned blocks need force
//! service.rm(&ctx, &path, RmOptions { force: true, quiet: false })?;
//! # Ok(())
//! # }
//! ```

mod block;
mod blockstore;
mod cid;
mod config;
mod context;
mod error;
mod gc;
mod lock;
mod names;
mod object;
mod path;
mod pin;
mod remove;
mod resolve;
mod service;
mod store;

pub use block::Block;
pub use blockstore::{Blockstore, MemoryBlockstore};
pub use cid::{Algorithm, CID_SIZE, Cid, Codec, DIGEST_SIZE, Prefix, Version};
pub use config::{DEFAULT_COMPRESSION_THRESHOLD, StoreConfig};
pub use context::{CancelHandle, CancelReason, Context};
pub use error::{Error, Result};
pub use gc::{GcStats, collect_garbage};
pub use lock::{GcLock, GcLocker, PinLock};
pub use names::{NameRegistry, validate_name};
pub use object::{CompressionType, HEADER_SIZE, ObjectHeader};
pub use path::{ContentPath, ImmutablePath, Namespace};
pub use pin::{FilePinner, Pin, PinMode, Pinner};
pub use remove::{RemovalOutcome, RemovalStream, RmBlocksOptions, rm_blocks};
pub use resolve::{Resolver, StoreResolver};
pub use service::{BlockReader, BlockService, BlockStat, PutOptions, RmOptions};
pub use store::FsBlockstore;
