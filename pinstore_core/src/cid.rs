//! Content identifiers and the prefixes that produce them.
//!
//! A [`Cid`] names a block by its content. It is made of a version, a codec,
//! a hash algorithm and the digest of the payload under that algorithm. The
//! binary form is `[version][codec][algorithm][digest...]` and the text form
//! is its lowercase hex encoding.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Digest size in bytes (both supported algorithms produce 256-bit hashes).
pub const DIGEST_SIZE: usize = 32;

/// Size of the binary CID form.
pub const CID_SIZE: usize = 3 + DIGEST_SIZE;

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    /// SHA2 with 256-bit output.
    Sha2_256,
    /// BLAKE3 with 256-bit output.
    Blake3,
}

impl Algorithm {
    /// Returns the string representation of the algorithm (for config files).
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha2_256 => "sha2-256",
            Algorithm::Blake3 => "blake3-256",
        }
    }

    /// Parse algorithm from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "sha2-256" | "sha256" => Ok(Algorithm::Sha2_256),
            "blake3-256" | "blake3" => Ok(Algorithm::Blake3),
            _ => Err(Error::unsupported_algorithm(s)),
        }
    }

    /// Returns the algorithm ID byte (multihash code).
    pub fn id(&self) -> u8 {
        match self {
            Algorithm::Sha2_256 => 0x12,
            Algorithm::Blake3 => 0x1e,
        }
    }

    /// Parse algorithm from ID byte.
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0x12 => Ok(Algorithm::Sha2_256),
            0x1e => Ok(Algorithm::Blake3),
            _ => Err(Error::unsupported_algorithm(format!("ID {:#04x}", id))),
        }
    }

    /// Hash raw bytes.
    pub fn digest(&self, data: &[u8]) -> [u8; DIGEST_SIZE] {
        match self {
            Algorithm::Sha2_256 => Sha256::digest(data).into(),
            Algorithm::Blake3 => *blake3::hash(data).as_bytes(),
        }
    }
}

/// Supported block codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Codec {
    /// Opaque raw bytes.
    Raw,
    /// Protobuf-encoded DAG node.
    DagPb,
}

impl Codec {
    /// Returns the string representation of the codec.
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Raw => "raw",
            Codec::DagPb => "dag-pb",
        }
    }

    /// Parse codec from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(Codec::Raw),
            "dag-pb" | "protobuf" => Ok(Codec::DagPb),
            _ => Err(Error::unsupported_codec(s)),
        }
    }

    /// Returns the codec ID byte (multicodec code).
    pub fn id(&self) -> u8 {
        match self {
            Codec::Raw => 0x55,
            Codec::DagPb => 0x70,
        }
    }

    /// Parse codec from ID byte.
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0x55 => Ok(Codec::Raw),
            0x70 => Ok(Codec::DagPb),
            _ => Err(Error::unsupported_codec(format!("ID {:#04x}", id))),
        }
    }
}

/// CID versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    /// Legacy form: `dag-pb` + `sha2-256` only.
    V0,
    /// Self-describing form.
    V1,
}

impl Version {
    /// Convert to byte representation.
    pub fn to_u8(self) -> u8 {
        match self {
            Version::V0 => 0,
            Version::V1 => 1,
        }
    }

    /// Parse from byte representation.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Version::V0),
            1 => Ok(Version::V1),
            _ => Err(Error::invalid_prefix(format!(
                "Unsupported CID version: {}",
                value
            ))),
        }
    }
}

/// The format settings used to compute a CID from a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix {
    pub version: Version,
    pub codec: Codec,
    pub algorithm: Algorithm,
}

impl Prefix {
    /// Create a prefix, validating the combination.
    pub fn new(version: Version, codec: Codec, algorithm: Algorithm) -> Result<Self> {
        let prefix = Self {
            version,
            codec,
            algorithm,
        };
        prefix.validate()?;
        Ok(prefix)
    }

    /// Raw blocks hashed with BLAKE3.
    pub fn v1_raw() -> Self {
        Self {
            version: Version::V1,
            codec: Codec::Raw,
            algorithm: Algorithm::Blake3,
        }
    }

    /// Version 0 admits only `dag-pb` + `sha2-256`.
    pub fn validate(&self) -> Result<()> {
        if self.version == Version::V0
            && (self.codec != Codec::DagPb || self.algorithm != Algorithm::Sha2_256)
        {
            return Err(Error::invalid_prefix(format!(
                "CIDv0 requires dag-pb and sha2-256, got {} and {}",
                self.codec.as_str(),
                self.algorithm.as_str()
            )));
        }
        Ok(())
    }

    /// Compute the CID of `data` under this prefix.
    pub fn sum(&self, data: &[u8]) -> Result<Cid> {
        self.validate()?;
        Ok(Cid {
            version: self.version,
            codec: self.codec,
            algorithm: self.algorithm,
            digest: self.algorithm.digest(data),
        })
    }
}

impl Default for Prefix {
    fn default() -> Self {
        Self::v1_raw()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{}/{}/{}",
            self.version.to_u8(),
            self.codec.as_str(),
            self.algorithm.as_str()
        )
    }
}

impl FromStr for Prefix {
    type Err = Error;

    /// Parses `v<version>/<codec>/<algorithm>`, e.g. `v1/raw/sha2-256`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 3 {
            return Err(Error::invalid_prefix(format!(
                "Expected version/codec/algorithm, got {}",
                s
            )));
        }
        let version = parts[0]
            .strip_prefix('v')
            .and_then(|v| v.parse::<u8>().ok())
            .ok_or_else(|| Error::invalid_prefix(format!("Invalid version: {}", parts[0])))?;
        Prefix::new(
            Version::from_u8(version)?,
            Codec::parse(parts[1])?,
            Algorithm::parse(parts[2])?,
        )
    }
}

/// A content identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cid {
    version: Version,
    codec: Codec,
    algorithm: Algorithm,
    digest: [u8; DIGEST_SIZE],
}

impl Cid {
    /// The prefix this CID was computed with.
    pub fn prefix(&self) -> Prefix {
        Prefix {
            version: self.version,
            codec: self.codec,
            algorithm: self.algorithm,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Get the raw digest bytes.
    pub fn digest(&self) -> &[u8; DIGEST_SIZE] {
        &self.digest
    }

    /// Encode to the binary form.
    pub fn to_bytes(&self) -> [u8; CID_SIZE] {
        let mut buf = [0u8; CID_SIZE];
        buf[0] = self.version.to_u8();
        buf[1] = self.codec.id();
        buf[2] = self.algorithm.id();
        buf[3..].copy_from_slice(&self.digest);
        buf
    }

    /// Decode from the binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CID_SIZE {
            return Err(Error::invalid_cid(format!(
                "Expected {} bytes, got {}",
                CID_SIZE,
                bytes.len()
            )));
        }
        let prefix = Prefix::new(
            Version::from_u8(bytes[0])?,
            Codec::from_id(bytes[1])?,
            Algorithm::from_id(bytes[2])?,
        )?;
        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&bytes[3..]);
        Ok(Self {
            version: prefix.version,
            codec: prefix.codec,
            algorithm: prefix.algorithm,
            digest,
        })
    }

    /// Parse the hex text form.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != CID_SIZE * 2 {
            return Err(Error::invalid_cid(format!(
                "Expected {} hex characters, got {}",
                CID_SIZE * 2,
                hex_str.len()
            )));
        }
        let bytes =
            hex::decode(hex_str).map_err(|e| Error::invalid_cid(format!("Invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Convert to the hex text form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// First digest byte in hex (for directory sharding).
    pub fn shard(&self) -> String {
        hex::encode(&self.digest[..1])
    }

    /// Check that `data` hashes to this CID.
    pub fn verify(&self, data: &[u8]) -> bool {
        self.algorithm.digest(data) == self.digest
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.to_hex())
    }
}

impl FromStr for Cid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Cid::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_known_digest() {
        let cid = Prefix::v1_raw().sum(b"hello world").unwrap();
        assert_eq!(
            hex::encode(cid.digest()),
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
        assert_eq!(cid.to_hex().len(), CID_SIZE * 2);
        assert!(cid.to_hex().starts_with("01551e"));
    }

    #[test]
    fn test_sha256_known_digest() {
        let prefix = Prefix::new(Version::V1, Codec::Raw, Algorithm::Sha2_256).unwrap();
        let cid = prefix.sum(b"hello world").unwrap();
        assert_eq!(
            hex::encode(cid.digest()),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_v0_requires_dag_pb_sha256() {
        assert!(Prefix::new(Version::V0, Codec::Raw, Algorithm::Sha2_256).is_err());
        assert!(Prefix::new(Version::V0, Codec::DagPb, Algorithm::Blake3).is_err());
        assert!(Prefix::new(Version::V0, Codec::DagPb, Algorithm::Sha2_256).is_ok());

        let bad = Prefix {
            version: Version::V0,
            codec: Codec::Raw,
            algorithm: Algorithm::Blake3,
        };
        assert!(matches!(bad.sum(b"x"), Err(Error::InvalidPrefix { .. })));
    }

    #[test]
    fn test_prefix_changes_cid() {
        let blake = Prefix::v1_raw().sum(b"data").unwrap();
        let sha = Prefix::new(Version::V1, Codec::Raw, Algorithm::Sha2_256)
            .unwrap()
            .sum(b"data")
            .unwrap();
        let pb = Prefix::new(Version::V1, Codec::DagPb, Algorithm::Blake3)
            .unwrap()
            .sum(b"data")
            .unwrap();

        assert_ne!(blake, sha);
        assert_ne!(blake, pb);
        assert_eq!(blake.digest(), pb.digest());
        assert_eq!(pb.prefix().codec, Codec::DagPb);
    }

    #[test]
    fn test_cid_from_hex_invalid() {
        assert!(Cid::from_hex("abcd").is_err());
        assert!(Cid::from_hex("").is_err());
        assert!(Cid::from_hex(&"z".repeat(CID_SIZE * 2)).is_err());

        // Unknown codec byte
        let mut bytes = Prefix::v1_raw().sum(b"x").unwrap().to_bytes();
        bytes[1] = 0x99;
        assert!(Cid::from_hex(&hex::encode(bytes)).is_err());
    }

    #[test]
    fn test_prefix_parse() {
        let prefix: Prefix = "v1/raw/sha2-256".parse().unwrap();
        assert_eq!(prefix.algorithm, Algorithm::Sha2_256);
        assert_eq!(prefix.to_string(), "v1/raw/sha2-256");

        assert!("v0/raw/sha2-256".parse::<Prefix>().is_err());
        assert!("v1/raw".parse::<Prefix>().is_err());
        assert!("x1/raw/blake3".parse::<Prefix>().is_err());
        assert!("v1/cbor/blake3".parse::<Prefix>().is_err());
    }

    #[test]
    fn test_cid_serde() {
        let cid = Prefix::v1_raw().sum(b"serde").unwrap();
        let json = serde_json::to_string(&cid).unwrap();
        assert_eq!(json, format!("\"{}\"", cid));
        let back: Cid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cid);
    }

    #[test]
    fn test_verify() {
        let cid = Prefix::v1_raw().sum(b"payload").unwrap();
        assert!(cid.verify(b"payload"));
        assert!(!cid.verify(b"tampered"));
    }

    // Property-based tests
    use proptest::prelude::*;

    fn any_prefix() -> impl Strategy<Value = Prefix> {
        prop::sample::select(vec![
            Prefix::v1_raw(),
            Prefix::new(Version::V1, Codec::Raw, Algorithm::Sha2_256).unwrap(),
            Prefix::new(Version::V1, Codec::DagPb, Algorithm::Blake3).unwrap(),
            Prefix::new(Version::V0, Codec::DagPb, Algorithm::Sha2_256).unwrap(),
        ])
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            max_shrink_iters: 10000,
            ..ProptestConfig::default()
        })]

        /// Same payload and same prefix always give the same CID.
        #[test]
        fn prop_cid_deterministic(
            data in prop::collection::vec(any::<u8>(), 0..4096),
            prefix in any_prefix()
        ) {
            let cid1 = prefix.sum(&data)?;
            let cid2 = prefix.sum(&data)?;
            prop_assert_eq!(cid1, cid2);
            prop_assert_eq!(cid1.prefix(), prefix);
        }

        /// Text form parses back to the same CID.
        #[test]
        fn prop_hex_roundtrip(
            data in prop::collection::vec(any::<u8>(), 0..256),
            prefix in any_prefix()
        ) {
            let cid = prefix.sum(&data)?;
            prop_assert_eq!(Cid::from_hex(&cid.to_hex())?, cid);
        }

        /// Invalid hex length always fails
        #[test]
        fn prop_invalid_hex_length_fails(
            s in "[0-9a-f]{0,69}|[0-9a-f]{71,128}"
        ) {
            prop_assert!(Cid::from_hex(&s).is_err());
        }
    }
}
