//! bkp CLI - content-addressed backups of mapped paths

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use bkp_cli::cmd;
use bkp_cli::cmd::setting::SettingKind;

/// bkp - Deduplicating backups of the paths you map
#[derive(Parser)]
#[command(name = "bkp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show debug logging on stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a repository in the current directory
    Init {
        /// Reset history and mappings of an existing repository
        #[arg(long)]
        force: bool,
    },
    /// Map a path to back up
    Add {
        /// File or directory to capture
        path: PathBuf,
        /// Name inside backups (default: derived from the absolute path)
        nickname: Option<String>,
    },
    /// Stop backing up a path
    Rm {
        path: PathBuf,
    },
    /// Show the active backup and recover mappings
    Map,
    /// Capture every mapped path
    Backup {
        /// Backup message (default: repository config)
        #[arg(short, long)]
        message: Option<String>,
        /// Load the backup setting first (default file: .bkp/settings/backup)
        #[arg(long)]
        setting: Option<Option<PathBuf>>,
    },
    /// Restore a backup
    Recover {
        /// Backup id, unique prefix, `latest` or `latest~N` (default: latest)
        backup: Option<String>,
        /// Load the recover setting first (default file: .bkp/settings/recover)
        #[arg(long, conflicts_with_all = ["captured", "to"])]
        setting: Option<Option<PathBuf>>,
        /// Restore to the paths the backup was captured from
        #[arg(long, conflicts_with = "to")]
        captured: bool,
        /// Restore the whole backup tree under this directory
        #[arg(long)]
        to: Option<PathBuf>,
    },
    /// Show backup history, newest first
    Log {
        /// Number of backups to show (default: 20)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show details of a backup
    Show {
        /// Backup id, unique prefix, `latest` or `latest~N` (default: latest)
        backup: Option<String>,
        /// Make the backup's mapping the active one and export both settings
        #[arg(long)]
        adopt: bool,
    },
    /// Import or export setting files
    #[command(subcommand)]
    Setting(SettingCommands),
    /// Show repository configuration
    Config {
        /// Print a single value, e.g. `store.compression_level`
        #[arg(long)]
        get: Option<String>,
    },
    /// Check every backup against the object store
    Verify,
}

#[derive(Subcommand)]
enum SettingCommands {
    /// Write the active mapping to a setting file
    Export {
        #[arg(value_enum)]
        kind: SettingKind,
        /// Target file (default: .bkp/settings/<kind>)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Replace the active mapping from a setting file
    Import {
        #[arg(value_enum)]
        kind: SettingKind,
        /// Source file (default: .bkp/settings/<kind>)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => cmd::init::run(force),
        Commands::Add { path, nickname } => cmd::add::run(&path, nickname.as_deref()),
        Commands::Rm { path } => cmd::rm::run(&path),
        Commands::Map => cmd::map::run(),
        Commands::Backup { message, setting } => cmd::backup::run(message, setting),
        Commands::Recover {
            backup,
            setting,
            captured,
            to,
        } => cmd::recover::run(backup.as_deref(), setting, captured, to),
        Commands::Log { limit } => cmd::log::run(limit),
        Commands::Show { backup, adopt } => cmd::show::run(backup.as_deref(), adopt),
        Commands::Setting(setting_cmd) => match setting_cmd {
            SettingCommands::Export { kind, file } => cmd::setting::export(kind, file),
            SettingCommands::Import { kind, file } => cmd::setting::import(kind, file),
        },
        Commands::Config { get } => cmd::config::run(get.as_deref()),
        Commands::Verify => cmd::verify::run(),
    }
}

/// `RUST_LOG` when set, `warn` otherwise; `--verbose` forces `debug`
fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}
