//! uplink command-line entry point.

mod config;
mod prompt;
mod upload;

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uplink_engine::{DuplicateAction, UploaderConfig};

use crate::config::CliConfig;

#[derive(Parser)]
#[command(version, about = "Resumable uploads to cloud storage", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files, resuming any partial uploads the service already holds
    Upload(UploadArgs),
    /// Store the session token in the configuration file
    SetToken {
        token: String,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct UploadArgs {
    /// Files to upload
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Session token for this run (overrides the configuration file)
    #[arg(long, value_name = "TOKEN", env = "UPLINK_SESSION_TOKEN")]
    token: Option<String>,

    /// Maximum unit uploads in flight
    #[arg(short = 'j', long, value_name = "COUNT")]
    concurrency: Option<usize>,

    /// Retries per unit before a file fails
    #[arg(long, value_name = "COUNT")]
    retries: Option<u32>,

    /// Destination folder key
    #[arg(long, value_name = "KEY")]
    folder: Option<String>,

    /// Destination path below the folder
    #[arg(long, value_name = "PATH")]
    path: Option<String>,

    /// What to do when a file name already exists: keep, skip or replace
    #[arg(long, value_name = "ACTION")]
    on_duplicate: Option<DuplicateAction>,

    /// Always transfer bytes, even when the service already has the content
    #[arg(long, action = ArgAction::SetTrue)]
    no_instant: bool,

    /// Only upload these extensions (comma separated)
    #[arg(long, value_name = "LIST")]
    ext: Option<String>,

    /// Print every state change and progress step
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl UploadArgs {
    fn apply(&self, config: &mut UploaderConfig) {
        if let Some(token) = &self.token {
            config.session_token = token.clone();
        }
        if let Some(n) = self.concurrency {
            config.concurrent_uploads = n;
        }
        if let Some(n) = self.retries {
            config.retry_attempts = n;
        }
        if let Some(folder) = &self.folder {
            config.folder_key = folder.clone();
        }
        if let Some(path) = &self.path {
            config.relative_path = Some(path.clone());
        }
        if let Some(action) = self.on_duplicate {
            config.action_on_duplicate = Some(action);
        }
        if self.no_instant {
            config.disable_instant_uploads = true;
        }
        if let Some(list) = &self.ext {
            config.filter_by_extension = uplink_engine::parse_extension_list(list);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(config::default_path);
    let mut cli_config =
        CliConfig::load(&path).with_context(|| format!("loading {}", path.display()))?;
    tracing::debug!(path = %path.display(), "configuration loaded");

    match cli.cmd {
        Commands::Upload(args) => {
            args.apply(&mut cli_config.uploader);
            let verbose = args.verbose || cli_config.verbose_progress;
            upload::run(cli_config.uploader, &args.files, verbose).await
        }
        Commands::SetToken { token } => {
            cli_config.uploader.session_token = token;
            cli_config.save(&path)?;
            println!("session token saved to {}", path.display());
            Ok(())
        }
        Commands::Config => {
            if !cli_config.uploader.session_token.is_empty() {
                cli_config.uploader.session_token = "********".into();
            }
            print!("{}", toml::to_string_pretty(&cli_config)?);
            Ok(())
        }
    }
}
