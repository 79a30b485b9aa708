//! Pins: the durable set of blocks protected from garbage collection.

use crate::cid::Cid;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// How a pin protects its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    /// Protects only the pinned block.
    Direct,
    /// Protects the pinned block and everything it references.
    Recursive,
}

impl PinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinMode::Direct => "direct",
            PinMode::Recursive => "recursive",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "direct" => Ok(PinMode::Direct),
            "recursive" => Ok(PinMode::Recursive),
            _ => Err(Error::pin_operation("-", format!("Unknown pin mode: {}", s))),
        }
    }
}

/// A pinned CID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pin {
    pub cid: Cid,
    pub mode: PinMode,
    pub label: String,
}

impl Pin {
    /// Serialize to a pipe-delimited line.
    pub fn to_line(&self) -> String {
        format!("{}|{}|{}", self.cid, self.mode.as_str(), self.label)
    }

    /// Parse a pipe-delimited line. Labels may themselves contain `|`.
    pub fn from_line(line: &str) -> Result<Self> {
        let mut parts = line.splitn(3, '|');
        let (Some(cid), Some(mode), Some(label)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::pin_operation(
                "-",
                format!("Invalid pin entry: {}", line),
            ));
        };
        Ok(Self {
            cid: Cid::from_hex(cid)?,
            mode: PinMode::parse(mode)?,
            label: label.to_string(),
        })
    }
}

/// Maintains the set of pinned CIDs.
///
/// Mutations apply to the in-memory set immediately and become durable
/// on [`Pinner::flush`]. Each call is atomic with respect to other calls.
pub trait Pinner: Send + Sync {
    /// Pin `cid`. Re-pinning replaces the mode and label; a recursive pin
    /// is never downgraded to direct.
    fn pin(&self, cid: &Cid, mode: PinMode, label: &str) -> Result<()>;

    /// Remove the pin on `cid`. A recursive pin is only removed when
    /// `recursive` is set.
    fn unpin(&self, cid: &Cid, recursive: bool) -> Result<()>;

    /// The mode `cid` is pinned with, if any.
    fn pinned_mode(&self, cid: &Cid) -> Result<Option<PinMode>>;

    /// The full pin on `cid`, if any.
    fn get_pin(&self, cid: &Cid) -> Result<Option<Pin>> {
        Ok(self.pins()?.into_iter().find(|pin| pin.cid == *cid))
    }

    /// All pins, sorted by CID.
    fn pins(&self) -> Result<Vec<Pin>>;

    /// Make all changes durable.
    fn flush(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct PinState {
    pins: HashMap<Cid, (PinMode, String)>,
    dirty: bool,
}

/// A pinner persisted to a single file, one pin per line.
#[derive(Debug)]
pub struct FilePinner {
    path: Option<PathBuf>,
    state: Mutex<PinState>,
}

impl FilePinner {
    /// Open or create the pin file at `path`, loading its pins.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut pins = HashMap::new();

        if path.exists() {
            for line in fs::read_to_string(&path)?.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                match Pin::from_line(line) {
                    Ok(pin) => {
                        pins.insert(pin.cid, (pin.mode, pin.label));
                    }
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping invalid pin entry"),
                }
            }
        }

        tracing::debug!(path = %path.display(), count = pins.len(), "loaded pins");

        Ok(Self {
            path: Some(path),
            state: Mutex::new(PinState { pins, dirty: false }),
        })
    }

    /// A pinner that keeps its set in memory only; flushing is a no-op.
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            state: Mutex::new(PinState::default()),
        }
    }

    /// Number of pins.
    pub fn len(&self) -> usize {
        self.state.lock().pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pins.is_empty()
    }

    fn write_atomic(path: &Path, content: &str) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.flush()?;
        temp_file.persist(path)?;
        Ok(())
    }
}

impl Pinner for FilePinner {
    fn pin(&self, cid: &Cid, mode: PinMode, label: &str) -> Result<()> {
        let mut state = self.state.lock();
        let mode = match state.pins.get(cid) {
            Some((PinMode::Recursive, _)) => PinMode::Recursive,
            _ => mode,
        };
        state.pins.insert(*cid, (mode, label.to_string()));
        state.dirty = true;
        Ok(())
    }

    fn unpin(&self, cid: &Cid, recursive: bool) -> Result<()> {
        let mut state = self.state.lock();
        match state.pins.get(cid) {
            None => Err(Error::not_pinned(cid.to_hex())),
            Some((PinMode::Recursive, _)) if !recursive => Err(Error::pin_operation(
                cid.to_hex(),
                "pinned recursively, pass recursive to unpin",
            )),
            Some(_) => {
                state.pins.remove(cid);
                state.dirty = true;
                Ok(())
            }
        }
    }

    fn pinned_mode(&self, cid: &Cid) -> Result<Option<PinMode>> {
        Ok(self.state.lock().pins.get(cid).map(|(mode, _)| *mode))
    }

    fn get_pin(&self, cid: &Cid) -> Result<Option<Pin>> {
        Ok(self.state.lock().pins.get(cid).map(|(mode, label)| Pin {
            cid: *cid,
            mode: *mode,
            label: label.clone(),
        }))
    }

    fn pins(&self) -> Result<Vec<Pin>> {
        let state = self.state.lock();
        let mut pins: Vec<Pin> = state
            .pins
            .iter()
            .map(|(cid, (mode, label))| Pin {
                cid: *cid,
                mode: *mode,
                label: label.clone(),
            })
            .collect();
        pins.sort_by(|a, b| a.cid.cmp(&b.cid));
        Ok(pins)
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.dirty {
            return Ok(());
        }
        if let Some(path) = &self.path {
            let mut lines: Vec<String> = state
                .pins
                .iter()
                .map(|(cid, (mode, label))| {
                    Pin {
                        cid: *cid,
                        mode: *mode,
                        label: label.clone(),
                    }
                    .to_line()
                })
                .collect();
            lines.sort();

            let mut content = lines.join("\n");
            content.push('\n');
            Self::write_atomic(path, &content)?;
            tracing::debug!(path = %path.display(), count = lines.len(), "flushed pins");
        }
        state.dirty = false;
        Ok(())
    }
}
