//! Named, mutable pointers to CIDs.

use crate::cid::Cid;
use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Manages names stored one file per name under a directory.
///
/// Each name file is append-only; the last valid line is the current value.
#[derive(Debug, Clone)]
pub struct NameRegistry {
    dir: PathBuf,
}

impl NameRegistry {
    /// Create a registry rooted at `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Get the path to a name file.
    fn name_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }

    /// Point `name` at `cid`.
    pub fn set(&self, name: &str, cid: &Cid) -> Result<()> {
        let path = self.name_path(name)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        writeln!(file, "{}", cid.to_hex())?;
        Ok(())
    }

    /// Get the current value of a name.
    pub fn get(&self, name: &str) -> Result<Option<Cid>> {
        let path = self.name_path(name)?;

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let mut last = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Ok(cid) = Cid::from_hex(line) {
                last = Some(cid);
            }
        }

        Ok(last)
    }

    /// List all names as (name, cid) pairs, sorted by name.
    pub fn list(&self) -> Result<Vec<(String, Cid)>> {
        let mut names = Vec::new();

        if !self.dir.exists() {
            return Ok(names);
        }

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();

            if path.is_file()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
                && validate_name(name).is_ok()
                && let Some(cid) = self.get(name)?
            {
                names.push((name.to_string(), cid));
            }
        }

        names.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(names)
    }

    /// Remove a name.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.name_path(name)?;

        if !path.exists() {
            return Err(Error::name_not_found(name));
        }

        fs::remove_file(&path)?;
        Ok(())
    }
}

/// Names must be non-empty and free of path traversal.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name("Name cannot be empty"));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') || name.starts_with('.')
    {
        return Err(Error::invalid_name(format!(
            "Invalid name: {} (must not contain .. or path separators)",
            name
        )));
    }
    Ok(())
}
