mod output;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use output::{
    BlockOutput, GcOutput, InitOutput, NameInfo, NameListOutput, NameOutput, NameRmOutput,
    OutputWriter, PinListOutput, PinOutput, RmFailure, RmOutput,
};
use pinstore_core::{
    Algorithm, BlockService, Codec, ContentPath, Context, FsBlockstore, NameRegistry, PinMode,
    Prefix, PutOptions, RmOptions, StoreConfig, Version, collect_garbage,
};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Pinstore - A content-addressed block store
#[derive(Parser)]
#[command(name = "pinstore")]
#[command(about = "Content-addressed block store with pinning", long_about = None)]
#[command(version)]
struct Cli {
    /// Store root directory (defaults to PINSTORE_ROOT env var or ./pinstore)
    #[arg(short, long, global = true, env = "PINSTORE_ROOT")]
    root: Option<PathBuf>,

    /// Output JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Give up after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// CID format flags shared by `init` and `put`.
#[derive(clap::Args, Debug, Default)]
struct PrefixArgs {
    /// CID version (0 or 1)
    #[arg(long)]
    cid_version: Option<u8>,

    /// Block codec (raw, dag-pb)
    #[arg(long)]
    codec: Option<String>,

    /// Hash algorithm (blake3-256, sha2-256)
    #[arg(long)]
    algo: Option<String>,
}

impl PrefixArgs {
    fn is_empty(&self) -> bool {
        self.cid_version.is_none() && self.codec.is_none() && self.algo.is_none()
    }

    /// Apply the given flags on top of `base`.
    fn resolve(&self, base: Prefix) -> Result<Prefix> {
        let version = match self.cid_version {
            Some(v) => Version::from_u8(v)?,
            None => base.version,
        };
        let codec = match &self.codec {
            Some(c) => Codec::parse(c)?,
            None => base.codec,
        };
        let algorithm = match &self.algo {
            Some(a) => Algorithm::parse(a)?,
            None => base.algorithm,
        };
        Ok(Prefix::new(version, codec, algorithm)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new store
    Init {
        #[command(flatten)]
        prefix: PrefixArgs,
    },

    /// Store a file (or stdin) as one block
    Put {
        /// File to store; `-` or omitted reads stdin
        file: Option<PathBuf>,

        /// Pin the block so garbage collection keeps it
        #[arg(long)]
        pin: bool,

        /// Label recorded with the pin
        #[arg(long, default_value = "")]
        label: String,

        #[command(flatten)]
        prefix: PrefixArgs,
    },

    /// Write a block's payload to stdout
    Get {
        /// /cid/<cid>, /name/<name> or a bare CID
        path: String,
    },

    /// Show a block's CID and size
    Stat {
        /// /cid/<cid>, /name/<name> or a bare CID
        path: String,
    },

    /// Remove blocks
    Rm {
        /// Paths of the blocks to remove
        #[arg(required = true)]
        paths: Vec<String>,

        /// Remove pins as well instead of refusing pinned blocks
        #[arg(short, long)]
        force: bool,

        /// Only report failures
        #[arg(short, long)]
        quiet: bool,
    },

    /// Manage pins
    #[command(subcommand)]
    Pin(PinCommands),

    /// Garbage collect unpinned blocks
    Gc {
        /// Dry run - show what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage names
    #[command(subcommand)]
    Name(NameCommands),
}

#[derive(Subcommand)]
enum PinCommands {
    /// Pin a stored block
    Add {
        path: String,

        /// Pin only this block rather than recursively
        #[arg(long)]
        direct: bool,

        #[arg(long, default_value = "")]
        label: String,
    },

    /// Remove a pin
    Rm { path: String },

    /// List all pins
    Ls,
}

#[derive(Subcommand)]
enum NameCommands {
    /// Point a name at a block
    Set { name: String, path: String },

    /// Show the block a name points at
    Get { name: String },

    /// List all names
    Ls,

    /// Remove a name
    Rm { name: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let out = OutputWriter::new(cli.json);

    // Store root: --root > PINSTORE_ROOT env var > ./pinstore default
    let root = cli.root.unwrap_or_else(|| PathBuf::from("./pinstore"));
    tracing::debug!(root = %root.display(), "using store root");

    let (ctx, _cancel) = match cli.timeout {
        Some(secs) => {
            let (ctx, handle) = Context::with_timeout(Duration::from_secs(secs));
            (ctx, Some(handle))
        }
        None => (Context::background(), None),
    };

    let result = match cli.command {
        Commands::Init { prefix } => cmd_init(&out, &root, &prefix),
        Commands::Put {
            file,
            pin,
            label,
            prefix,
        } => cmd_put(&out, &ctx, &root, file.as_deref(), pin, label, &prefix),
        Commands::Get { path } => cmd_get(&out, &ctx, &root, &path),
        Commands::Stat { path } => cmd_stat(&out, &ctx, &root, &path),
        Commands::Rm {
            paths,
            force,
            quiet,
        } => cmd_rm(&out, &ctx, &root, &paths, RmOptions { force, quiet }),
        Commands::Pin(pin_cmd) => match pin_cmd {
            PinCommands::Add {
                path,
                direct,
                label,
            } => cmd_pin_add(&out, &ctx, &root, &path, direct, &label),
            PinCommands::Rm { path } => cmd_pin_rm(&out, &ctx, &root, &path),
            PinCommands::Ls => cmd_pin_ls(&out, &root),
        },
        Commands::Gc { dry_run } => cmd_gc(&out, &ctx, &root, dry_run),
        Commands::Name(name_cmd) => match name_cmd {
            NameCommands::Set { name, path } => cmd_name_set(&out, &ctx, &root, &name, &path),
            NameCommands::Get { name } => cmd_name_get(&out, &root, &name),
            NameCommands::Ls => cmd_name_ls(&out, &root),
            NameCommands::Rm { name } => cmd_name_rm(&out, &root, &name),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            out.write_error(&e, 1);
            ExitCode::FAILURE
        }
    }
}

fn open_service(root: &Path) -> Result<BlockService> {
    BlockService::open_fs(root)
        .with_context(|| format!("Failed to open store at {}", root.display()))
}

fn open_names(root: &Path) -> Result<NameRegistry> {
    let store =
        FsBlockstore::open(root).with_context(|| format!("Failed to open store at {}", root.display()))?;
    Ok(NameRegistry::open(store.names_dir())?)
}

fn parse_path(path: &str) -> Result<ContentPath> {
    ContentPath::parse(path).with_context(|| format!("Invalid path: {}", path))
}

fn cmd_init(out: &OutputWriter, root: &Path, prefix_args: &PrefixArgs) -> Result<()> {
    let prefix = prefix_args.resolve(Prefix::default())?;

    FsBlockstore::init(root, StoreConfig::with_prefix(prefix))
        .with_context(|| format!("Failed to initialize store at {}", root.display()))?;

    let output = InitOutput {
        success: true,
        result_code: 0,
        root: root.display().to_string(),
        prefix: prefix.to_string(),
    };
    out.write(&output, || {
        format!(
            "Initialized pinstore at {}\nCID prefix: {}\n",
            root.display(),
            prefix
        )
    })
}

fn cmd_put(
    out: &OutputWriter,
    ctx: &Context,
    root: &Path,
    file: Option<&Path>,
    pin: bool,
    label: String,
    prefix_args: &PrefixArgs,
) -> Result<()> {
    let service = open_service(root)?;

    let cid_prefix = if prefix_args.is_empty() {
        None
    } else {
        Some(prefix_args.resolve(*service.default_prefix())?)
    };
    let options = PutOptions {
        pin,
        cid_prefix,
        label,
    };

    let reader: Box<dyn Read> = match file {
        None => Box::new(io::stdin().lock()),
        Some(p) if p == Path::new("-") => Box::new(io::stdin().lock()),
        Some(p) => Box::new(
            File::open(p).with_context(|| format!("Failed to open {}", p.display()))?,
        ),
    };

    let stat = service
        .put(ctx, reader, &options)
        .context("Failed to put block")?;

    let output = BlockOutput {
        success: true,
        result_code: 0,
        cid: *stat.cid(),
        path: stat.path().to_string(),
        size: stat.size(),
        pinned: Some(pin),
    };
    out.write(&output, || format!("{}\n", stat.cid()))
}

fn cmd_get(out: &OutputWriter, ctx: &Context, root: &Path, path: &str) -> Result<()> {
    let service = open_service(root)?;
    let path = parse_path(path)?;

    let mut reader = service
        .get(ctx, &path)
        .with_context(|| format!("Failed to get {}", path))?;
    out.write_raw(&mut reader)?;
    Ok(())
}

fn cmd_stat(out: &OutputWriter, ctx: &Context, root: &Path, path: &str) -> Result<()> {
    let service = open_service(root)?;
    let path = parse_path(path)?;

    let stat = service
        .stat(ctx, &path)
        .with_context(|| format!("Failed to stat {}", path))?;
    let pinned = service.pinner().pinned_mode(stat.cid())?;

    let output = BlockOutput {
        success: true,
        result_code: 0,
        cid: *stat.cid(),
        path: stat.path().to_string(),
        size: stat.size(),
        pinned: Some(pinned.is_some()),
    };
    out.write(&output, || {
        let mut text = format!("CID: {}\nSize: {} bytes\n", stat.cid(), stat.size());
        match pinned {
            Some(mode) => text.push_str(&format!("Pinned: {}\n", mode.as_str())),
            None => text.push_str("Pinned: no\n"),
        }
        text
    })
}

fn cmd_rm(
    out: &OutputWriter,
    ctx: &Context,
    root: &Path,
    paths: &[String],
    options: RmOptions,
) -> Result<()> {
    let service = open_service(root)?;
    let paths = paths
        .iter()
        .map(|p| parse_path(p))
        .collect::<Result<Vec<_>>>()?;

    let stream = service
        .rm_many(ctx, &paths, options)
        .context("Failed to start removal")?;

    let mut removed = Vec::new();
    let mut failed = Vec::new();
    while let Some(outcome) = stream.recv()? {
        match outcome.error {
            None => {
                if !out.is_json() {
                    println!("removed {}", outcome.cid);
                }
                removed.push(outcome.cid);
            }
            Some(e) => {
                if !out.is_json() {
                    eprintln!("cannot remove {}: {}", outcome.cid, e);
                }
                failed.push(RmFailure {
                    cid: outcome.cid,
                    error: e.to_string(),
                });
            }
        }
    }

    let failures = failed.len();
    let output = RmOutput {
        success: failures == 0,
        result_code: if failures == 0 { 0 } else { 1 },
        removed,
        failed,
    };
    if out.is_json() {
        out.write(&output, String::new)?;
    }

    if failures > 0 {
        anyhow::bail!("{} of {} blocks could not be removed", failures, paths.len());
    }
    Ok(())
}

fn cmd_pin_add(
    out: &OutputWriter,
    ctx: &Context,
    root: &Path,
    path: &str,
    direct: bool,
    label: &str,
) -> Result<()> {
    let service = open_service(root)?;
    let path = parse_path(path)?;

    // Hold off collection until the pin is durable
    let _lock = service.store().pin_lock(ctx)?;
    let stat = service
        .stat(ctx, &path)
        .with_context(|| format!("Failed to stat {}", path))?;
    let mode = if direct {
        PinMode::Direct
    } else {
        PinMode::Recursive
    };
    service.pinner().pin(stat.cid(), mode, label)?;
    service.pinner().flush().context("Failed to save pins")?;

    let output = PinOutput {
        success: true,
        result_code: 0,
        cid: *stat.cid(),
        pinned: true,
    };
    out.write(&output, || format!("pinned {} {}\n", stat.cid(), mode.as_str()))
}

fn cmd_pin_rm(out: &OutputWriter, ctx: &Context, root: &Path, path: &str) -> Result<()> {
    let service = open_service(root)?;
    let path = parse_path(path)?;

    let stat = service
        .stat(ctx, &path)
        .with_context(|| format!("Failed to stat {}", path))?;
    service
        .pinner()
        .unpin(stat.cid(), true)
        .with_context(|| format!("Failed to unpin {}", stat.cid()))?;
    service.pinner().flush().context("Failed to save pins")?;

    let output = PinOutput {
        success: true,
        result_code: 0,
        cid: *stat.cid(),
        pinned: false,
    };
    out.write(&output, || format!("unpinned {}\n", stat.cid()))
}

fn cmd_pin_ls(out: &OutputWriter, root: &Path) -> Result<()> {
    let service = open_service(root)?;
    let pins = service.pinner().pins().context("Failed to list pins")?;

    let text = if pins.is_empty() {
        "No pins\n".to_string()
    } else {
        pins.iter()
            .map(|pin| {
                if pin.label.is_empty() {
                    format!("{} {}\n", pin.cid, pin.mode.as_str())
                } else {
                    format!("{} {} {}\n", pin.cid, pin.mode.as_str(), pin.label)
                }
            })
            .collect()
    };

    let output = PinListOutput {
        success: true,
        result_code: 0,
        pins,
    };
    out.write(&output, || text)
}

fn cmd_gc(out: &OutputWriter, ctx: &Context, root: &Path, dry_run: bool) -> Result<()> {
    let service = open_service(root)?;

    let stats = collect_garbage(
        ctx,
        service.store().as_ref(),
        service.pinner().as_ref(),
        dry_run,
    )
    .context("Failed to run garbage collection")?;

    let output = GcOutput {
        success: true,
        result_code: 0,
        dry_run,
        objects_deleted: stats.objects_deleted,
        bytes_freed: stats.bytes_freed,
    };
    out.write(&output, || {
        if dry_run {
            format!(
                "Dry run - no blocks deleted\nWould delete {} blocks\nWould free {} bytes\n",
                stats.objects_deleted, stats.bytes_freed
            )
        } else {
            format!(
                "Deleted {} blocks\nFreed {} bytes\n",
                stats.objects_deleted, stats.bytes_freed
            )
        }
    })
}

fn cmd_name_set(out: &OutputWriter, ctx: &Context, root: &Path, name: &str, path: &str) -> Result<()> {
    let service = open_service(root)?;
    let names = open_names(root)?;
    let path = parse_path(path)?;

    let stat = service
        .stat(ctx, &path)
        .with_context(|| format!("Failed to stat {}", path))?;
    names
        .set(name, stat.cid())
        .with_context(|| format!("Failed to set name: {}", name))?;

    let output = NameOutput {
        success: true,
        result_code: 0,
        name: NameInfo {
            name: name.to_string(),
            cid: *stat.cid(),
        },
    };
    out.write(&output, || format!("{} -> {}\n", name, stat.cid()))
}

fn cmd_name_get(out: &OutputWriter, root: &Path, name: &str) -> Result<()> {
    let names = open_names(root)?;
    let cid = names
        .get(name)?
        .with_context(|| format!("Name not found: {}", name))?;

    let output = NameOutput {
        success: true,
        result_code: 0,
        name: NameInfo {
            name: name.to_string(),
            cid,
        },
    };
    out.write(&output, || format!("{}\n", cid))
}

fn cmd_name_ls(out: &OutputWriter, root: &Path) -> Result<()> {
    let names = open_names(root)?;
    let list = names.list().context("Failed to list names")?;

    let text = if list.is_empty() {
        "No names\n".to_string()
    } else {
        list.iter()
            .map(|(name, cid)| format!("{} -> {}\n", name, cid))
            .collect()
    };

    let output = NameListOutput {
        success: true,
        result_code: 0,
        names: list
            .into_iter()
            .map(|(name, cid)| NameInfo { name, cid })
            .collect(),
    };
    out.write(&output, || text)
}

fn cmd_name_rm(out: &OutputWriter, root: &Path, name: &str) -> Result<()> {
    let names = open_names(root)?;
    names
        .remove(name)
        .with_context(|| format!("Failed to remove name: {}", name))?;

    let output = NameRmOutput {
        success: true,
        result_code: 0,
        name: name.to_string(),
    };
    out.write(&output, || format!("Removed name: {}\n", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_args_override_base() {
        let args = PrefixArgs {
            algo: Some("sha2-256".to_string()),
            ..PrefixArgs::default()
        };
        let prefix = args.resolve(Prefix::default()).unwrap();
        assert_eq!(prefix.algorithm, Algorithm::Sha2_256);
        assert_eq!(prefix.codec, Prefix::default().codec);
    }

    #[test]
    fn test_prefix_args_reject_invalid_v0() {
        let args = PrefixArgs {
            cid_version: Some(0),
            ..PrefixArgs::default()
        };
        assert!(args.resolve(Prefix::default()).is_err());
    }

    #[test]
    fn test_cli_parses_rm_flags() {
        let cli = Cli::try_parse_from(["pinstore", "rm", "-f", "-q", "a", "b"]).unwrap();
        match cli.command {
            Commands::Rm {
                paths,
                force,
                quiet,
            } => {
                assert_eq!(paths, vec!["a", "b"]);
                assert!(force);
                assert!(quiet);
            }
            _ => panic!("expected rm"),
        }
    }
}
