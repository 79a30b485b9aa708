//! Filesystem block store and object I/O.

use crate::block::Block;
use crate::blockstore::Blockstore;
use crate::cid::Cid;
use crate::config::StoreConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::lock::GcLocker;
use crate::object::{
    CompressionType, HEADER_SIZE, ObjectHeader, compress_zstd, decompress_zstd,
};
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// A block store rooted at a directory.
///
/// Layout:
/// - `config` with the store settings
/// - `objects/{algo}/{shard}/{cid}` for blocks
/// - `pins` for the durable pin set
/// - `names/` for named paths
#[derive(Debug)]
pub struct FsBlockstore {
    root: PathBuf,
    config: StoreConfig,
    locker: GcLocker,
}

impl FsBlockstore {
    /// Initialize a new store at the given path.
    pub fn init<P: AsRef<Path>>(root: P, config: StoreConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("objects"))?;
        fs::create_dir_all(root.join("names"))?;
        fs::write(root.join("config"), config.render())?;

        tracing::info!(root = %root.display(), prefix = %config.prefix, "initialized store");

        Ok(Self {
            root,
            config,
            locker: GcLocker::new(),
        })
    }

    /// Open an existing store at the given path.
    ///
    /// Validates the store structure and reads the configuration.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            return Err(Error::invalid_store(&root, "directory does not exist"));
        }

        let config_path = root.join("config");
        if !config_path.exists() {
            return Err(Error::invalid_store(&root, "config file not found"));
        }
        let config = StoreConfig::parse(&fs::read_to_string(&config_path)?, &root)?;

        if !root.join("objects").exists() {
            return Err(Error::invalid_store(&root, "objects directory missing"));
        }
        fs::create_dir_all(root.join("names"))?;

        Ok(Self {
            root,
            config,
            locker: GcLocker::new(),
        })
    }

    /// Get the root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Path of the durable pin set.
    pub fn pins_path(&self) -> PathBuf {
        self.root.join("pins")
    }

    /// Directory holding named paths.
    pub fn names_dir(&self) -> PathBuf {
        self.root.join("names")
    }

    /// Get the path to an object file given its CID.
    ///
    /// Returns: `objects/{algorithm}/{shard}/{cid}`
    pub fn object_path(&self, cid: &Cid) -> PathBuf {
        self.root
            .join("objects")
            .join(cid.algorithm().as_str())
            .join(cid.shard())
            .join(cid.to_hex())
    }

    /// Read an object header from a file.
    pub(crate) fn read_object_header(&self, path: &Path) -> Result<ObjectHeader> {
        let mut file = fs::File::open(path)?;
        let mut header_buf = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_buf)
            .map_err(|e| Error::corrupted_object(path, e.to_string()))?;
        ObjectHeader::decode(&header_buf, path)
    }

    /// Read the payload of an object, checking its stored length.
    fn read_object_payload(&self, path: &Path, header: &ObjectHeader) -> Result<Vec<u8>> {
        let mut file = fs::File::open(path)?;

        let mut header_buf = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_buf)?;

        let mut payload = Vec::new();
        file.read_to_end(&mut payload)?;

        if payload.len() as u64 != header.stored_len {
            return Err(Error::corrupted_object(
                path,
                format!(
                    "Payload length mismatch: expected {}, got {}",
                    header.stored_len,
                    payload.len()
                ),
            ));
        }

        Ok(payload)
    }

    /// Write an object atomically using tempfile.
    fn write_object_atomic(
        &self,
        obj_path: &Path,
        header: &ObjectHeader,
        payload: &[u8],
    ) -> Result<()> {
        let parent = obj_path
            .parent()
            .ok_or_else(|| Error::invalid_store(&self.root, "object path has no parent"))?;
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(&header.encode())?;
        temp_file.write_all(payload)?;
        temp_file.flush()?;
        temp_file.persist(obj_path)?;

        Ok(())
    }

    fn write_block(&self, block: &Block) -> Result<()> {
        let cid = block.cid();
        let obj_path = self.object_path(cid);

        // Deduplication
        if obj_path.exists() {
            tracing::debug!(%cid, "block already stored");
            return Ok(());
        }

        let data = block.data();
        let (payload, compression) = if data.len() as u64 >= self.config.compression_threshold {
            (compress_zstd(data)?, CompressionType::Zstd)
        } else {
            (data.to_vec(), CompressionType::None)
        };

        let header = ObjectHeader::new(
            cid.codec(),
            cid.algorithm(),
            compression,
            payload.len() as u64,
            data.len() as u64,
        );
        self.write_object_atomic(&obj_path, &header, &payload)?;

        tracing::debug!(
            %cid,
            size = data.len(),
            stored = payload.len(),
            compression = compression.as_str(),
            "stored block"
        );
        Ok(())
    }

    fn read_block(&self, cid: &Cid, obj_path: &Path) -> Result<Block> {
        let header = self.read_object_header(obj_path)?;
        let stored = self.read_object_payload(obj_path, &header)?;
        let data = match header.compression {
            CompressionType::None => stored,
            CompressionType::Zstd => decompress_zstd(&stored)?,
        };

        // Corruption detection
        if data.len() as u64 != header.raw_len || !cid.verify(&data) {
            return Err(Error::corrupted_object(
                obj_path,
                format!("Content does not match {}", cid),
            ));
        }

        Ok(Block::trusted(data, *cid))
    }

    /// Remove an empty shard directory left behind by a delete.
    fn prune_shard(&self, obj_path: &Path) {
        if let Some(shard) = obj_path.parent()
            && let Ok(mut entries) = fs::read_dir(shard)
            && entries.next().is_none()
        {
            let _ = fs::remove_dir(shard);
        }
    }
}

impl Blockstore for FsBlockstore {
    fn get_block(&self, ctx: &Context, cid: &Cid) -> Result<Block> {
        ctx.check()?;
        let obj_path = self.object_path(cid);
        if !obj_path.exists() {
            return Err(Error::not_found(cid.to_hex()));
        }
        self.read_block(cid, &obj_path)
    }

    fn has_block(&self, ctx: &Context, cid: &Cid) -> Result<bool> {
        ctx.check()?;
        Ok(self.object_path(cid).exists())
    }

    /// Answered from the object header alone.
    fn block_size(&self, ctx: &Context, cid: &Cid) -> Result<u64> {
        ctx.check()?;
        let obj_path = self.object_path(cid);
        if !obj_path.exists() {
            return Err(Error::not_found(cid.to_hex()));
        }
        Ok(self.read_object_header(&obj_path)?.raw_len)
    }

    fn put_block(&self, ctx: &Context, block: &Block) -> Result<()> {
        ctx.check()?;
        self.write_block(block)
            .map_err(|e| Error::store(block.cid().to_hex(), e.to_string()))
    }

    fn delete_block(&self, ctx: &Context, cid: &Cid) -> Result<()> {
        ctx.check()?;
        let obj_path = self.object_path(cid);
        match fs::remove_file(&obj_path) {
            Ok(()) => {
                self.prune_shard(&obj_path);
                tracing::debug!(%cid, "deleted block");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::not_found(cid.to_hex())),
            Err(e) => Err(Error::store(cid.to_hex(), e.to_string())),
        }
    }

    fn all_cids(&self, ctx: &Context) -> Result<Vec<Cid>> {
        let mut cids = Vec::new();
        let objects_dir = self.root.join("objects");

        for algo_entry in fs::read_dir(&objects_dir)? {
            let algo_path = algo_entry?.path();
            if !algo_path.is_dir() {
                continue;
            }
            for shard_entry in fs::read_dir(&algo_path)? {
                ctx.check()?;
                let shard_path = shard_entry?.path();
                if !shard_path.is_dir() {
                    continue;
                }
                for obj_entry in fs::read_dir(&shard_path)? {
                    let obj_path = obj_entry?.path();
                    let name = obj_path.file_name().and_then(|n| n.to_str()).unwrap_or("");

                    // Skips leftover temp files
                    if let Ok(cid) = Cid::from_hex(name) {
                        cids.push(cid);
                    }
                }
            }
        }

        Ok(cids)
    }

    fn locker(&self) -> &GcLocker {
        &self.locker
    }
}
