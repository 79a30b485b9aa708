//! On-disk object format used by [`FsBlockstore`](crate::FsBlockstore).
//!
//! Objects are stored with a 24-byte header followed by the payload:
//!
//! ```text
//! 0x00  4   "PBLK" magic
//! 0x04  1   format version (u8) = 1
//! 0x05  1   codec (multicodec code)
//! 0x06  1   algo (multihash code)
//! 0x07  1   compression: 0=none, 1=zstd
//! 0x08  8   stored_len (u64 LE) - payload bytes on disk
//! 0x10  8   raw_len (u64 LE) - uncompressed block size
//! 0x18  ... payload
//! ```

use crate::cid::{Algorithm, Codec};
use crate::error::{Error, Result};
use std::path::Path;

/// Magic bytes at the start of every object file.
pub const MAGIC: &[u8; 4] = b"PBLK";

/// Current object format version.
pub const VERSION: u8 = 1;

/// Size of the object header in bytes.
pub const HEADER_SIZE: usize = 24;

/// Compression types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// No compression.
    None = 0,
    /// Zstandard compression.
    Zstd = 1,
}

impl CompressionType {
    /// Convert to byte representation.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse from byte representation.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Zstd),
            _ => None,
        }
    }

    /// Get the string name of this compression type.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionType::None => "none",
            CompressionType::Zstd => "zstd",
        }
    }
}

/// A 24-byte object header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    pub version: u8,
    pub codec: Codec,
    pub algorithm: Algorithm,
    pub compression: CompressionType,
    /// Length of the payload on disk (compressed size if compressed).
    pub stored_len: u64,
    /// Length of the block payload.
    pub raw_len: u64,
}

impl ObjectHeader {
    /// Create a new object header.
    pub fn new(
        codec: Codec,
        algorithm: Algorithm,
        compression: CompressionType,
        stored_len: u64,
        raw_len: u64,
    ) -> Self {
        Self {
            version: VERSION,
            codec,
            algorithm,
            compression,
            stored_len,
            raw_len,
        }
    }

    /// Encode the header to a 24-byte array.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version;
        buf[5] = self.codec.id();
        buf[6] = self.algorithm.id();
        buf[7] = self.compression.to_u8();
        buf[8..16].copy_from_slice(&self.stored_len.to_le_bytes());
        buf[16..24].copy_from_slice(&self.raw_len.to_le_bytes());
        buf
    }

    /// Decode a header read from the object at `path`.
    pub fn decode(buf: &[u8], path: &Path) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::corrupted_object(
                path,
                format!(
                    "Header too short: {} bytes (expected {})",
                    buf.len(),
                    HEADER_SIZE
                ),
            ));
        }

        if &buf[0..4] != MAGIC {
            return Err(Error::corrupted_object(
                path,
                format!("Invalid magic: expected {:?}, got {:?}", MAGIC, &buf[0..4]),
            ));
        }

        let version = buf[4];
        if version != VERSION {
            return Err(Error::corrupted_object(
                path,
                format!("Unsupported version: {} (expected {})", version, VERSION),
            ));
        }

        let codec = Codec::from_id(buf[5])
            .map_err(|e| Error::corrupted_object(path, e.to_string()))?;
        let algorithm = Algorithm::from_id(buf[6])
            .map_err(|e| Error::corrupted_object(path, e.to_string()))?;
        let compression = CompressionType::from_u8(buf[7]).ok_or_else(|| {
            Error::corrupted_object(path, format!("Invalid compression type: {}", buf[7]))
        })?;

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&buf[8..16]);
        let stored_len = u64::from_le_bytes(len_bytes);
        len_bytes.copy_from_slice(&buf[16..24]);
        let raw_len = u64::from_le_bytes(len_bytes);

        if compression == CompressionType::None && stored_len != raw_len {
            return Err(Error::corrupted_object(
                path,
                format!(
                    "Uncompressed object with stored_len {} != raw_len {}",
                    stored_len, raw_len
                ),
            ));
        }

        Ok(Self {
            version,
            codec,
            algorithm,
            compression,
            stored_len,
            raw_len,
        })
    }
}

pub(crate) fn compress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::encode_all(data, 3).map_err(Error::from)
}

pub(crate) fn decompress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> &'static Path {
        Path::new("objects/test")
    }

    #[test]
    fn test_header_encode_decode() {
        let header = ObjectHeader::new(
            Codec::Raw,
            Algorithm::Blake3,
            CompressionType::Zstd,
            1234,
            5678,
        );
        let encoded = header.encode();
        assert_eq!(encoded.len(), HEADER_SIZE);
        assert_eq!(&encoded[0..4], MAGIC);

        let decoded = ObjectHeader::decode(&encoded, path()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn test_header_invalid_magic() {
        let mut buf = ObjectHeader::new(Codec::Raw, Algorithm::Blake3, CompressionType::None, 1, 1)
            .encode();
        buf[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            ObjectHeader::decode(&buf, path()),
            Err(Error::CorruptedObject { .. })
        ));
    }

    #[test]
    fn test_header_too_short() {
        assert!(ObjectHeader::decode(&[0u8; 10], path()).is_err());
    }

    #[test]
    fn test_header_bad_fields() {
        let good = ObjectHeader::new(Codec::DagPb, Algorithm::Sha2_256, CompressionType::None, 9, 9)
            .encode();

        let mut bad_version = good;
        bad_version[4] = 9;
        assert!(ObjectHeader::decode(&bad_version, path()).is_err());

        let mut bad_codec = good;
        bad_codec[5] = 0xff;
        assert!(ObjectHeader::decode(&bad_codec, path()).is_err());

        let mut bad_compression = good;
        bad_compression[7] = 7;
        assert!(ObjectHeader::decode(&bad_compression, path()).is_err());

        let mut bad_len = good;
        bad_len[16] = 10;
        assert!(ObjectHeader::decode(&bad_len, path()).is_err());
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Zstd roundtrip preserves data
        #[test]
        fn prop_compression_roundtrip(data in prop::collection::vec(any::<u8>(), 0..50_000)) {
            let compressed = compress_zstd(&data)?;
            let decompressed = decompress_zstd(&compressed)?;
            prop_assert_eq!(decompressed, data);
        }
    }
}
