//! Store configuration file.
//!
//! The `config` file at the store root is a list of `key=value` lines.
//! Blank lines and lines starting with `#` are ignored.
//!
//! ```text
//! version=1
//! cid-version=1
//! codec=raw
//! algo=blake3-256
//! compression-threshold=4096
//! ```

use crate::cid::{Algorithm, Codec, Prefix, Version};
use crate::error::{Error, Result};
use std::path::Path;

/// Payloads at least this large are compressed by default.
pub const DEFAULT_COMPRESSION_THRESHOLD: u64 = 4096;

/// Settings persisted alongside a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Default CID prefix for new blocks.
    pub prefix: Prefix,
    /// Minimum payload size for zstd compression.
    pub compression_threshold: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefix: Prefix::default(),
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
        }
    }
}

impl StoreConfig {
    /// Config with the given default prefix.
    pub fn with_prefix(prefix: Prefix) -> Self {
        Self {
            prefix,
            ..Self::default()
        }
    }

    /// Render the config file contents.
    pub fn render(&self) -> String {
        format!(
            "version=1\ncid-version={}\ncodec={}\nalgo={}\ncompression-threshold={}\n",
            self.prefix.version.to_u8(),
            self.prefix.codec.as_str(),
            self.prefix.algorithm.as_str(),
            self.compression_threshold
        )
    }

    /// Parse config file contents. `root` is only used in error messages.
    pub fn parse(content: &str, root: &Path) -> Result<Self> {
        let mut version = None;
        let mut cid_version = None;
        let mut codec = None;
        let mut algo = None;
        let mut threshold = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim();
                match key.trim() {
                    "version" => version = Some(value),
                    "cid-version" => cid_version = Some(value),
                    "codec" => codec = Some(value),
                    "algo" => algo = Some(value),
                    "compression-threshold" => threshold = Some(value),
                    _ => {}
                }
            }
        }

        if version != Some("1") {
            return Err(Error::invalid_store(
                root,
                format!("Unsupported config version: {:?}", version),
            ));
        }

        let algo = algo.ok_or_else(|| Error::invalid_store(root, "Missing algo in config"))?;
        let algorithm = Algorithm::parse(algo)?;

        let version = match cid_version {
            Some(v) => Version::from_u8(v.parse::<u8>().map_err(|_| {
                Error::invalid_store(root, format!("Invalid cid-version: {}", v))
            })?)?,
            None => Version::V1,
        };
        let codec = match codec {
            Some(c) => Codec::parse(c)?,
            None => Codec::Raw,
        };
        let compression_threshold = match threshold {
            Some(t) => t.parse::<u64>().map_err(|_| {
                Error::invalid_store(root, format!("Invalid compression-threshold: {}", t))
            })?,
            None => DEFAULT_COMPRESSION_THRESHOLD,
        };

        Ok(Self {
            prefix: Prefix::new(version, codec, algorithm)?,
            compression_threshold,
        })
    }
}
