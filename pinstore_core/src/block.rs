//! Immutable blocks.

use crate::cid::{Cid, Prefix};
use crate::error::{Error, Result};
use std::sync::Arc;

/// A payload paired with the CID that names it.
///
/// Cloning is cheap; the payload is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    cid: Cid,
    data: Arc<[u8]>,
}

impl Block {
    /// Hash `data` under `prefix` and build the block.
    pub fn new(data: impl Into<Arc<[u8]>>, prefix: &Prefix) -> Result<Self> {
        let data = data.into();
        let cid = prefix.sum(&data)?;
        Ok(Self { cid, data })
    }

    /// Pair `data` with a CID computed elsewhere, checking that they match.
    pub fn with_cid(data: impl Into<Arc<[u8]>>, cid: Cid) -> Result<Self> {
        let data = data.into();
        if !cid.verify(&data) {
            return Err(Error::invalid_cid(format!(
                "Data does not hash to {}",
                cid
            )));
        }
        Ok(Self { cid, data })
    }

    /// Pair `data` with `cid` without re-hashing. The caller guarantees they match.
    pub(crate) fn trusted(data: impl Into<Arc<[u8]>>, cid: Cid) -> Self {
        Self {
            cid,
            data: data.into(),
        }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy the payload out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}
