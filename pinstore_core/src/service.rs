//! The block service: put, get, stat and remove over a block store and pinner.

use crate::block::Block;
use crate::blockstore::Blockstore;
use crate::cid::{Cid, Prefix};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::names::NameRegistry;
use crate::path::{ContentPath, ImmutablePath};
use crate::pin::{FilePinner, PinMode, Pinner};
use crate::remove::{RemovalStream, RmBlocksOptions, rm_blocks};
use crate::resolve::{Resolver, StoreResolver};
use crate::store::FsBlockstore;
use serde::Serialize;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Read buffer size when draining put input.
const READ_CHUNK: usize = 64 * 1024;

/// Options for [`BlockService::put`].
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Pin the block recursively once stored.
    pub pin: bool,
    /// CID format; the service default when unset.
    pub cid_prefix: Option<Prefix>,
    /// Label recorded with the pin.
    pub label: String,
}

/// Options for [`BlockService::rm`] and [`BlockService::rm_many`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RmOptions {
    /// Remove pins instead of refusing to delete pinned blocks.
    pub force: bool,
    /// Only report failures from [`BlockService::rm_many`].
    pub quiet: bool,
}

impl From<RmOptions> for RmBlocksOptions {
    fn from(options: RmOptions) -> Self {
        RmBlocksOptions {
            force: options.force,
            quiet: options.quiet,
        }
    }
}

/// Where a block lives and how large it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockStat {
    path: ImmutablePath,
    size: u64,
}

impl BlockStat {
    pub fn path(&self) -> &ImmutablePath {
        &self.path
    }

    pub fn cid(&self) -> &Cid {
        self.path.cid()
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Single-pass reader over a fetched block's payload.
#[derive(Debug)]
pub struct BlockReader {
    block: Block,
    pos: usize,
}

impl BlockReader {
    fn new(block: Block) -> Self {
        Self { block, pos: 0 }
    }

    pub fn cid(&self) -> &Cid {
        self.block.cid()
    }

    /// Total payload length.
    pub fn len(&self) -> usize {
        self.block.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }
}

impl Read for BlockReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rest = &self.block.data()[self.pos..];
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Stores, fetches and removes single blocks, keeping pins consistent.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct BlockService {
    store: Arc<dyn Blockstore>,
    pinner: Arc<dyn Pinner>,
    resolver: Arc<dyn Resolver>,
    default_prefix: Prefix,
}

impl BlockService {
    pub fn new(
        store: Arc<dyn Blockstore>,
        pinner: Arc<dyn Pinner>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        Self {
            store,
            pinner,
            resolver,
            default_prefix: Prefix::default(),
        }
    }

    /// Use `prefix` when a put does not name one.
    pub fn with_default_prefix(mut self, prefix: Prefix) -> Self {
        self.default_prefix = prefix;
        self
    }

    /// Open the filesystem store at `root` with its pins and names.
    pub fn open_fs<P: AsRef<Path>>(root: P) -> Result<Self> {
        let store = FsBlockstore::open(root)?;
        let pinner = FilePinner::open(store.pins_path())?;
        let names = NameRegistry::open(store.names_dir())?;
        let prefix = store.config().prefix;

        Ok(Self::new(
            Arc::new(store),
            Arc::new(pinner),
            Arc::new(StoreResolver::with_names(names)),
        )
        .with_default_prefix(prefix))
    }

    pub fn store(&self) -> &Arc<dyn Blockstore> {
        &self.store
    }

    pub fn pinner(&self) -> &Arc<dyn Pinner> {
        &self.pinner
    }

    pub fn default_prefix(&self) -> &Prefix {
        &self.default_prefix
    }

    /// Store the whole of `reader` as one block, optionally pinning it.
    ///
    /// A pinned put holds a pin lock from before the store write until the
    /// pin is flushed, so a concurrent collection cannot remove the block in
    /// between. If pinning fails the block stays stored.
    #[tracing::instrument(skip_all, fields(pin = options.pin))]
    pub fn put<R: Read>(&self, ctx: &Context, reader: R, options: &PutOptions) -> Result<BlockStat> {
        let started = Instant::now();
        let data = read_all(ctx, reader)?;
        tracing::debug!(
            bytes = data.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "read input"
        );

        let started = Instant::now();
        let prefix = options.cid_prefix.unwrap_or(self.default_prefix);
        let block = Block::new(data, &prefix)?;
        let cid = *block.cid();
        tracing::debug!(%cid, elapsed_us = started.elapsed().as_micros() as u64, "hashed block");

        let _pin_lock = if options.pin {
            Some(self.store.pin_lock(ctx)?)
        } else {
            None
        };

        let started = Instant::now();
        self.store
            .put_block(ctx, &block)
            .map_err(|e| match e {
                Error::Cancelled { .. } | Error::Store { .. } => e,
                other => Error::store(cid.to_hex(), other.to_string()),
            })?;
        tracing::debug!(%cid, elapsed_us = started.elapsed().as_micros() as u64, "stored block");

        if options.pin {
            ctx.check()?;
            let started = Instant::now();
            self.pinner
                .pin(&cid, PinMode::Recursive, &options.label)
                .and_then(|()| self.pinner.flush())
                .map_err(|e| match e {
                    Error::PinOperation { .. } => e,
                    other => Error::pin_operation(cid.to_hex(), other.to_string()),
                })?;
            tracing::debug!(%cid, elapsed_us = started.elapsed().as_micros() as u64, "pinned block");
        }

        Ok(BlockStat {
            path: ImmutablePath::from_cid(cid),
            size: block.len() as u64,
        })
    }

    /// Fetch the block at `path`.
    #[tracing::instrument(skip_all, fields(path = %path))]
    pub fn get(&self, ctx: &Context, path: &ContentPath) -> Result<BlockReader> {
        let cid = self.resolve(ctx, path)?;
        let block = self.store.get_block(ctx, &cid)?;
        Ok(BlockReader::new(block))
    }

    /// Size of the block at `path`, without reading its payload.
    #[tracing::instrument(skip_all, fields(path = %path))]
    pub fn stat(&self, ctx: &Context, path: &ContentPath) -> Result<BlockStat> {
        let cid = self.resolve(ctx, path)?;
        let size = self.store.block_size(ctx, &cid)?;
        Ok(BlockStat {
            path: ImmutablePath::from_cid(cid),
            size,
        })
    }

    /// Remove the block at `path`.
    ///
    /// Pinned blocks are refused unless `options.force` is set. If `ctx` ends
    /// first the call returns `Cancelled` and the removal finishes on its own.
    #[tracing::instrument(skip_all, fields(path = %path, force = options.force))]
    pub fn rm(&self, ctx: &Context, path: &ContentPath, options: RmOptions) -> Result<()> {
        let cid = self.resolve(ctx, path)?;
        let stream = rm_blocks(
            ctx,
            Arc::clone(&self.store),
            Arc::clone(&self.pinner),
            vec![cid],
            RmBlocksOptions {
                force: options.force,
                quiet: false,
            },
        )?;

        match stream.recv()? {
            None => Ok(()),
            Some(outcome) => outcome.into_result().map(|_| ()),
        }
    }

    /// Remove every block in `paths`, streaming one outcome per block.
    ///
    /// All paths are resolved before any block is touched.
    #[tracing::instrument(skip_all, fields(count = paths.len(), force = options.force))]
    pub fn rm_many(
        &self,
        ctx: &Context,
        paths: &[ContentPath],
        options: RmOptions,
    ) -> Result<RemovalStream> {
        let cids = paths
            .iter()
            .map(|path| self.resolve(ctx, path))
            .collect::<Result<Vec<_>>>()?;

        rm_blocks(
            ctx,
            Arc::clone(&self.store),
            Arc::clone(&self.pinner),
            cids,
            options.into(),
        )
    }

    fn resolve(&self, ctx: &Context, path: &ContentPath) -> Result<Cid> {
        let (cid, remainder) = self.resolver.resolve(ctx, path).map_err(|e| match e {
            Error::Cancelled { .. } | Error::Resolution { .. } => e,
            other => Error::resolution(path.to_string(), other.to_string()),
        })?;
        if !remainder.is_empty() {
            tracing::debug!(%path, ?remainder, "ignoring unresolved path segments");
        }
        Ok(cid)
    }
}

/// Drain `reader`, observing `ctx` between chunks.
fn read_all<R: Read>(ctx: &Context, mut reader: R) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        ctx.check()?;
        match reader.read(&mut buf) {
            Ok(0) => return Ok(data),
            Ok(n) => data.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::read(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockstore::MemoryBlockstore;
    use crate::cid::{Algorithm, Codec, Version};
    use crate::config::StoreConfig;
    use crate::context::CancelHandle;
    use crate::gc::collect_garbage;
    use crate::lock::GcLocker;
    use crate::pin::Pin;
    use parking_lot::Mutex;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn memory_service() -> (BlockService, Arc<MemoryBlockstore>, Arc<FilePinner>) {
        let store = Arc::new(MemoryBlockstore::new());
        let pinner = Arc::new(FilePinner::ephemeral());
        let service = BlockService::new(
            store.clone(),
            pinner.clone(),
            Arc::new(StoreResolver::new()),
        );
        (service, store, pinner)
    }

    fn put(service: &BlockService, data: &[u8], pin: bool) -> BlockStat {
        service
            .put(
                &Context::background(),
                data,
                &PutOptions {
                    pin,
                    ..PutOptions::default()
                },
            )
            .unwrap()
    }

    fn path_of(stat: &BlockStat) -> ContentPath {
        ContentPath::from(*stat.path())
    }

    fn read_to_vec(mut reader: BlockReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_put_get_stat() {
        let (service, _, pinner) = memory_service();
        let ctx = Context::background();

        let stat = put(&service, b"hello blocks", false);
        assert_eq!(stat.size(), 12);
        assert_eq!(*stat.cid(), Prefix::default().sum(b"hello blocks").unwrap());
        assert_eq!(stat.path().to_string(), format!("/cid/{}", stat.cid()));
        assert!(pinner.is_empty());

        let reader = service.get(&ctx, &path_of(&stat)).unwrap();
        assert_eq!(reader.len(), 12);
        assert_eq!(read_to_vec(reader), b"hello blocks");

        assert_eq!(service.stat(&ctx, &path_of(&stat)).unwrap(), stat);
    }

    #[test]
    fn test_put_empty_payload() {
        let (service, _, _) = memory_service();
        let stat = put(&service, b"", false);
        assert_eq!(stat.size(), 0);
        let reader = service.get(&Context::background(), &path_of(&stat)).unwrap();
        assert!(read_to_vec(reader).is_empty());
    }

    #[test]
    fn test_put_with_prefix() {
        let (service, _, _) = memory_service();
        let prefix = Prefix::new(Version::V1, Codec::Raw, Algorithm::Sha2_256).unwrap();

        let stat = service
            .put(
                &Context::background(),
                &b"sha"[..],
                &PutOptions {
                    cid_prefix: Some(prefix),
                    ..PutOptions::default()
                },
            )
            .unwrap();

        assert_eq!(stat.cid().prefix(), prefix);
        assert_eq!(stat.cid().algorithm(), Algorithm::Sha2_256);
    }

    #[test]
    fn test_put_pin_records_label() {
        let (service, _, pinner) = memory_service();
        let stat = service
            .put(
                &Context::background(),
                &b"pinned"[..],
                &PutOptions {
                    pin: true,
                    label: "release".to_string(),
                    ..PutOptions::default()
                },
            )
            .unwrap();

        assert_eq!(
            pinner.pins().unwrap(),
            vec![Pin {
                cid: *stat.cid(),
                mode: PinMode::Recursive,
                label: "release".to_string(),
            }]
        );
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("stream broke"))
        }
    }

    #[test]
    fn test_put_read_failure() {
        let (service, store, _) = memory_service();
        let err = service
            .put(&Context::background(), FailingReader, &PutOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert!(store.is_empty());
    }

    /// A store that can be told to fail writes, or to pause them.
    #[derive(Default)]
    struct TestStore {
        inner: MemoryBlockstore,
        fail_puts: bool,
        put_delay: Option<Duration>,
        started: Mutex<Option<mpsc::Sender<()>>>,
        cancel_after_put: Mutex<Option<CancelHandle>>,
        get_delay: Option<Duration>,
    }

    impl Blockstore for TestStore {
        fn get_block(&self, ctx: &Context, cid: &Cid) -> Result<Block> {
            if let Some(delay) = self.get_delay {
                ctx.sleep(delay)?;
            }
            self.inner.get_block(ctx, cid)
        }
        fn has_block(&self, ctx: &Context, cid: &Cid) -> Result<bool> {
            self.inner.has_block(ctx, cid)
        }
        fn put_block(&self, ctx: &Context, block: &Block) -> Result<()> {
            if let Some(tx) = self.started.lock().take() {
                let _ = tx.send(());
            }
            if self.fail_puts {
                return Err(Error::Io {
                    source: io::Error::other("read-only"),
                });
            }
            if let Some(delay) = self.put_delay {
                thread::sleep(delay);
            }
            self.inner.put_block(ctx, block)?;
            if let Some(handle) = self.cancel_after_put.lock().take() {
                handle.cancel();
            }
            Ok(())
        }
        fn delete_block(&self, ctx: &Context, cid: &Cid) -> Result<()> {
            self.inner.delete_block(ctx, cid)
        }
        fn all_cids(&self, ctx: &Context) -> Result<Vec<Cid>> {
            self.inner.all_cids(ctx)
        }
        fn locker(&self) -> &GcLocker {
            self.inner.locker()
        }
    }

    fn service_over(store: Arc<TestStore>, pinner: Arc<dyn Pinner>) -> BlockService {
        BlockService::new(store, pinner, Arc::new(StoreResolver::new()))
    }

    #[test]
    fn test_put_store_failure_releases_lock() {
        let store = Arc::new(TestStore {
            fail_puts: true,
            ..TestStore::default()
        });
        let pinner = Arc::new(FilePinner::ephemeral());
        let service = service_over(store.clone(), pinner.clone());
        let ctx = Context::background();

        let err = service
            .put(
                &ctx,
                &b"nowhere"[..],
                &PutOptions {
                    pin: true,
                    ..PutOptions::default()
                },
            )
            .unwrap_err();

        assert!(matches!(err, Error::Store { .. }));
        assert!(pinner.is_empty());
        // A collection can run, so no pin lock leaked
        let (timeout_ctx, _handle) = Context::with_timeout(Duration::from_millis(200));
        assert!(store.gc_lock(&timeout_ctx).is_ok());
    }

    /// A pinner that refuses every pin.
    struct RefusingPinner;

    impl Pinner for RefusingPinner {
        fn pin(&self, cid: &Cid, _mode: PinMode, _label: &str) -> Result<()> {
            Err(Error::Io {
                source: io::Error::other(format!("no room for {}", cid)),
            })
        }
        fn unpin(&self, cid: &Cid, _recursive: bool) -> Result<()> {
            Err(Error::not_pinned(cid.to_hex()))
        }
        fn pinned_mode(&self, _cid: &Cid) -> Result<Option<PinMode>> {
            Ok(None)
        }
        fn pins(&self) -> Result<Vec<Pin>> {
            Ok(Vec::new())
        }
        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_put_pin_failure_keeps_block() {
        let store = Arc::new(TestStore::default());
        let service = service_over(store.clone(), Arc::new(RefusingPinner));
        let ctx = Context::background();

        let err = service
            .put(
                &ctx,
                &b"kept anyway"[..],
                &PutOptions {
                    pin: true,
                    ..PutOptions::default()
                },
            )
            .unwrap_err();

        let cid = match err {
            Error::PinOperation { cid, .. } => Cid::from_hex(&cid).unwrap(),
            other => panic!("expected pin failure, got {:?}", other),
        };
        assert!(store.has_block(&ctx, &cid).unwrap());
    }

    fn gc_lock_available(store: &TestStore) -> bool {
        let (ctx, _handle) = Context::with_timeout(Duration::from_millis(200));
        store.gc_lock(&ctx).is_ok()
    }

    #[test]
    fn test_put_cancelled_during_write() {
        let (tx, rx) = mpsc::channel();
        let store = Arc::new(TestStore {
            put_delay: Some(Duration::from_millis(100)),
            started: Mutex::new(Some(tx)),
            ..TestStore::default()
        });
        let pinner = Arc::new(FilePinner::ephemeral());
        let service = service_over(store.clone(), pinner.clone());
        let (ctx, handle) = Context::with_cancel();

        let writer = thread::spawn(move || {
            service.put(
                &ctx,
                &b"interrupted"[..],
                &PutOptions {
                    pin: true,
                    ..PutOptions::default()
                },
            )
        });
        rx.recv().unwrap();
        handle.cancel();

        let err = writer.join().unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(store.inner.is_empty());
        assert!(pinner.is_empty());
        assert!(gc_lock_available(&store));
    }

    #[test]
    fn test_put_cancelled_before_pin() {
        let (ctx, handle) = Context::with_cancel();
        let store = Arc::new(TestStore {
            cancel_after_put: Mutex::new(Some(handle)),
            ..TestStore::default()
        });
        let pinner = Arc::new(FilePinner::ephemeral());
        let service = service_over(store.clone(), pinner.clone());

        let err = service
            .put(
                &ctx,
                &b"stored, never pinned"[..],
                &PutOptions {
                    pin: true,
                    ..PutOptions::default()
                },
            )
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(store.inner.len(), 1);
        assert!(pinner.is_empty());
        assert!(gc_lock_available(&store));
    }

    /// A pinner whose flush always fails.
    struct UnflushablePinner(FilePinner);

    impl Pinner for UnflushablePinner {
        fn pin(&self, cid: &Cid, mode: PinMode, label: &str) -> Result<()> {
            self.0.pin(cid, mode, label)
        }
        fn unpin(&self, cid: &Cid, recursive: bool) -> Result<()> {
            self.0.unpin(cid, recursive)
        }
        fn pinned_mode(&self, cid: &Cid) -> Result<Option<PinMode>> {
            self.0.pinned_mode(cid)
        }
        fn pins(&self) -> Result<Vec<Pin>> {
            self.0.pins()
        }
        fn flush(&self) -> Result<()> {
            Err(Error::Io {
                source: io::Error::other("disk full"),
            })
        }
    }

    #[test]
    fn test_put_flush_failure_keeps_block() {
        let store = Arc::new(TestStore::default());
        let service = service_over(
            store.clone(),
            Arc::new(UnflushablePinner(FilePinner::ephemeral())),
        );
        let ctx = Context::background();

        let err = service
            .put(
                &ctx,
                &b"written, pin lost"[..],
                &PutOptions {
                    pin: true,
                    ..PutOptions::default()
                },
            )
            .unwrap_err();

        let cid = match err {
            Error::PinOperation { cid, .. } => Cid::from_hex(&cid).unwrap(),
            other => panic!("expected pin failure, got {:?}", other),
        };
        assert_eq!(cid, Prefix::default().sum(b"written, pin lost").unwrap());
        assert!(store.has_block(&ctx, &cid).unwrap());
        assert!(gc_lock_available(&store));
    }

    #[test]
    fn test_pinned_put_survives_concurrent_gc() {
        let (tx, rx) = mpsc::channel();
        let store = Arc::new(TestStore {
            put_delay: Some(Duration::from_millis(100)),
            started: Mutex::new(Some(tx)),
            ..TestStore::default()
        });
        let pinner = Arc::new(FilePinner::ephemeral());
        let service = service_over(store.clone(), pinner.clone());

        let writer = thread::spawn(move || {
            service
                .put(
                    &Context::background(),
                    &b"racing the collector"[..],
                    &PutOptions {
                        pin: true,
                        ..PutOptions::default()
                    },
                )
                .unwrap()
        });

        // The write has started and the pin lock is held
        rx.recv().unwrap();
        let stats = collect_garbage(
            &Context::background(),
            store.as_ref(),
            pinner.as_ref(),
            false,
        )
        .unwrap();
        let stat = writer.join().unwrap();

        assert_eq!(stats.objects_deleted, 0);
        assert!(store.has_block(&Context::background(), stat.cid()).unwrap());
        assert_eq!(
            pinner.pinned_mode(stat.cid()).unwrap(),
            Some(PinMode::Recursive)
        );
    }

    #[test]
    fn test_get_missing_block() {
        let (service, _, _) = memory_service();
        let cid = Prefix::default().sum(b"absent").unwrap();
        let err = service
            .get(&Context::background(), &ContentPath::from_cid(&cid))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_get_unresolvable_path() {
        let (service, _, _) = memory_service();
        let path = ContentPath::parse("/name/unknown").unwrap();
        assert!(matches!(
            service.get(&Context::background(), &path),
            Err(Error::Resolution { .. })
        ));
    }

    #[test]
    fn test_get_cancelled_before_read_completes() {
        let store = Arc::new(TestStore {
            get_delay: Some(Duration::from_secs(5)),
            ..TestStore::default()
        });
        let service = service_over(store.clone(), Arc::new(FilePinner::ephemeral()));
        let stat = put(&service, b"slow to read", false);

        let (ctx, handle) = Context::with_cancel();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.cancel();
        });

        let started = Instant::now();
        let err = service.get(&ctx, &path_of(&stat)).unwrap_err();
        canceller.join().unwrap();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(store.inner.len(), 1);
    }

    #[test]
    fn test_rm_unpinned() {
        let (service, _, _) = memory_service();
        let ctx = Context::background();
        let stat = put(&service, b"temporary", false);

        service.rm(&ctx, &path_of(&stat), RmOptions::default()).unwrap();

        assert!(matches!(
            service.get(&ctx, &path_of(&stat)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_rm_pinned_requires_force() {
        let (service, _, pinner) = memory_service();
        let ctx = Context::background();
        let stat = put(&service, b"precious", true);

        let err = service
            .rm(&ctx, &path_of(&stat), RmOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Pinned { .. }));
        assert!(service.get(&ctx, &path_of(&stat)).is_ok());

        service
            .rm(
                &ctx,
                &path_of(&stat),
                RmOptions {
                    force: true,
                    quiet: false,
                },
            )
            .unwrap();
        assert_eq!(pinner.pinned_mode(stat.cid()).unwrap(), None);
        assert!(matches!(
            service.get(&ctx, &path_of(&stat)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_rm_missing_block() {
        let (service, _, _) = memory_service();
        let cid = Prefix::default().sum(b"never").unwrap();
        let err = service
            .rm(
                &Context::background(),
                &ContentPath::from_cid(&cid),
                RmOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_rm_many_mixed() {
        let (service, _, _) = memory_service();
        let ctx = Context::background();
        let a = put(&service, b"a", false);
        let b = put(&service, b"b", true);
        let c = Prefix::default().sum(b"c").unwrap();

        let paths = vec![path_of(&a), path_of(&b), ContentPath::from_cid(&c)];
        let outcomes: Vec<_> = service
            .rm_many(&ctx, &paths, RmOptions::default())
            .unwrap()
            .collect();

        assert_eq!(outcomes.len(), 3);
        for outcome in outcomes {
            if outcome.cid == *a.cid() {
                assert!(outcome.is_ok());
            } else if outcome.cid == *b.cid() {
                assert!(matches!(outcome.error, Some(Error::Pinned { .. })));
            } else {
                assert_eq!(outcome.cid, c);
                assert!(matches!(outcome.error, Some(Error::NotFound { .. })));
            }
        }
    }

    #[test]
    fn test_rm_many_resolution_failure_touches_nothing() {
        let (service, store, _) = memory_service();
        let a = put(&service, b"a", false);
        let paths = vec![path_of(&a), ContentPath::parse("/name/missing").unwrap()];

        let err = service
            .rm_many(&Context::background(), &paths, RmOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_open_fs_with_names() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = Prefix::new(Version::V1, Codec::Raw, Algorithm::Sha2_256).unwrap();
        FsBlockstore::init(temp_dir.path(), StoreConfig::with_prefix(prefix)).unwrap();
        let ctx = Context::background();

        let service = BlockService::open_fs(temp_dir.path()).unwrap();
        assert_eq!(*service.default_prefix(), prefix);
        let stat = put(&service, b"on disk", true);

        let names = NameRegistry::open(temp_dir.path().join("names")).unwrap();
        names.set("current", stat.cid()).unwrap();

        // A fresh service sees the durable pin and the name
        let reopened = BlockService::open_fs(temp_dir.path()).unwrap();
        assert_eq!(
            reopened.pinner().pinned_mode(stat.cid()).unwrap(),
            Some(PinMode::Recursive)
        );
        let path = ContentPath::parse("/name/current").unwrap();
        assert_eq!(reopened.stat(&ctx, &path).unwrap(), stat);
        assert_eq!(read_to_vec(reopened.get(&ctx, &path).unwrap()), b"on disk");
    }
}
