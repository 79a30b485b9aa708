//! Content paths.
//!
//! A path names a block either directly by CID or indirectly through a
//! mutable name:
//!
//! ```text
//! /cid/<cid>[/segment...]
//! /name/<name>[/segment...]
//! <cid>
//! ```

use crate::cid::Cid;
use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The namespace a path's root lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Rooted at a CID; never changes.
    Cid,
    /// Rooted at a mutable name.
    Name,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Cid => "cid",
            Namespace::Name => "name",
        }
    }
}

/// A parsed, not yet resolved, path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentPath {
    namespace: Namespace,
    root: String,
    segments: Vec<String>,
}

impl ContentPath {
    /// Parse a path string.
    pub fn parse(s: &str) -> Result<Self> {
        let Some(rest) = s.strip_prefix('/') else {
            // Bare CID form
            let cid = Cid::from_hex(s).map_err(|e| Error::invalid_path(s, e.to_string()))?;
            return Ok(Self::from_cid(&cid));
        };

        let mut parts = rest.split('/').filter(|p| !p.is_empty());
        let namespace = match parts.next() {
            Some("cid") => Namespace::Cid,
            Some("name") => Namespace::Name,
            Some(other) => {
                return Err(Error::invalid_path(
                    s,
                    format!("Unknown namespace: {}", other),
                ));
            }
            None => return Err(Error::invalid_path(s, "Missing namespace")),
        };
        let root = parts
            .next()
            .ok_or_else(|| Error::invalid_path(s, "Missing root"))?
            .to_string();
        let segments = parts.map(str::to_string).collect();

        Ok(Self {
            namespace,
            root,
            segments,
        })
    }

    /// The immutable path of a CID.
    pub fn from_cid(cid: &Cid) -> Self {
        Self {
            namespace: Namespace::Cid,
            root: cid.to_hex(),
            segments: Vec::new(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The CID or name the path starts from.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Segments after the root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True if resolution can never change.
    pub fn is_immutable(&self) -> bool {
        self.namespace == Namespace::Cid
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.namespace.as_str(), self.root)?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for ContentPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A resolved path rooted at a CID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImmutablePath {
    cid: Cid,
}

impl ImmutablePath {
    pub fn from_cid(cid: Cid) -> Self {
        Self { cid }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }
}

impl fmt::Display for ImmutablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/cid/{}", self.cid)
    }
}

impl From<ImmutablePath> for ContentPath {
    fn from(path: ImmutablePath) -> Self {
        ContentPath::from_cid(&path.cid)
    }
}

impl Serialize for ImmutablePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
