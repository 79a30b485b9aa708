//! Path resolution.

use crate::cid::Cid;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::names::NameRegistry;
use crate::path::{ContentPath, Namespace};

/// Maps a path to the CID at its root.
pub trait Resolver: Send + Sync {
    /// Returns the root CID and the path segments left unresolved.
    fn resolve(&self, ctx: &Context, path: &ContentPath) -> Result<(Cid, Vec<String>)>;
}

/// Resolves CID paths directly and name paths through a [`NameRegistry`].
#[derive(Debug, Clone, Default)]
pub struct StoreResolver {
    names: Option<NameRegistry>,
}

impl StoreResolver {
    /// A resolver that only understands CID paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver that also looks names up in `names`.
    pub fn with_names(names: NameRegistry) -> Self {
        Self { names: Some(names) }
    }
}

impl Resolver for StoreResolver {
    fn resolve(&self, ctx: &Context, path: &ContentPath) -> Result<(Cid, Vec<String>)> {
        ctx.check()?;

        let cid = match path.namespace() {
            Namespace::Cid => Cid::from_hex(path.root())
                .map_err(|e| Error::resolution(path.to_string(), e.to_string()))?,
            Namespace::Name => {
                let names = self
                    .names
                    .as_ref()
                    .ok_or_else(|| Error::resolution(path.to_string(), "names are not enabled"))?;
                names
                    .get(path.root())
                    .map_err(|e| Error::resolution(path.to_string(), e.to_string()))?
                    .ok_or_else(|| {
                        Error::resolution(path.to_string(), format!("name not found: {}", path.root()))
                    })?
            }
        };

        tracing::trace!(%path, %cid, "resolved");
        Ok((cid, path.segments().to_vec()))
    }
}
