//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use pinstore_core::{Cid, Pin};
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Write output using the configured format.
    ///
    /// The `data` parameter must be a serializable struct that includes
    /// `success: bool` and `result_code: u8` fields.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write raw bytes to stdout regardless of format.
    pub fn write_raw(&self, data: &mut impl io::Read) -> Result<u64> {
        let mut handle = self.stdout.lock();
        let n = io::copy(data, &mut handle)?;
        handle.flush()?;
        Ok(n)
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error message directly.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `init` command.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub result_code: u8,
    pub root: String,
    pub prefix: String,
}

/// Output for `put` and `stat` commands.
#[derive(Debug, Serialize)]
pub struct BlockOutput {
    pub success: bool,
    pub result_code: u8,
    pub cid: Cid,
    pub path: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

/// A block that could not be removed.
#[derive(Debug, Clone, Serialize)]
pub struct RmFailure {
    pub cid: Cid,
    pub error: String,
}

/// Output for `rm` command.
#[derive(Debug, Serialize)]
pub struct RmOutput {
    pub success: bool,
    pub result_code: u8,
    pub removed: Vec<Cid>,
    pub failed: Vec<RmFailure>,
}

/// Output for `pin add` and `pin rm` commands.
#[derive(Debug, Serialize)]
pub struct PinOutput {
    pub success: bool,
    pub result_code: u8,
    pub cid: Cid,
    pub pinned: bool,
}

/// Output for `pin ls` command.
#[derive(Debug, Serialize)]
pub struct PinListOutput {
    pub success: bool,
    pub result_code: u8,
    pub pins: Vec<Pin>,
}

/// Output for `gc` command.
#[derive(Debug, Serialize)]
pub struct GcOutput {
    pub success: bool,
    pub result_code: u8,
    pub dry_run: bool,
    pub objects_deleted: usize,
    pub bytes_freed: u64,
}

/// Name information for `name ls` and `name get`.
#[derive(Debug, Clone, Serialize)]
pub struct NameInfo {
    pub name: String,
    pub cid: Cid,
}

/// Output for `name set` and `name get` commands.
#[derive(Debug, Serialize)]
pub struct NameOutput {
    pub success: bool,
    pub result_code: u8,
    #[serde(flatten)]
    pub name: NameInfo,
}

/// Output for `name ls` command.
#[derive(Debug, Serialize)]
pub struct NameListOutput {
    pub success: bool,
    pub result_code: u8,
    pub names: Vec<NameInfo>,
}

/// Output for `name rm` command.
#[derive(Debug, Serialize)]
pub struct NameRmOutput {
    pub success: bool,
    pub result_code: u8,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinstore_core::Prefix;

    fn cid() -> Cid {
        Prefix::default().sum(b"output").unwrap()
    }

    #[test]
    fn test_block_output_omits_unset_pinned() {
        let output = BlockOutput {
            success: true,
            result_code: 0,
            cid: cid(),
            path: format!("/cid/{}", cid()),
            size: 6,
            pinned: None,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["cid"], cid().to_hex());
        assert_eq!(json["size"], 6);
        assert!(json.get("pinned").is_none());
    }

    #[test]
    fn test_name_output_is_flat() {
        let output = NameOutput {
            success: true,
            result_code: 0,
            name: NameInfo {
                name: "latest".to_string(),
                cid: cid(),
            },
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["name"], "latest");
        assert_eq!(json["cid"], cid().to_hex());
    }

    #[test]
    fn test_rm_output_lists_failures() {
        let output = RmOutput {
            success: false,
            result_code: 1,
            removed: Vec::new(),
            failed: vec![RmFailure {
                cid: cid(),
                error: "Block not found".to_string(),
            }],
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["failed"][0]["error"], "Block not found");
        assert_eq!(json["removed"].as_array().unwrap().len(), 0);
    }
}
