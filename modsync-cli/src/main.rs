//! modsync - install and update packwiz modpacks from the command line

use anyhow::Context;
use clap::{Parser, Subcommand};
use modsync_lib::installer::config;
use modsync_lib::{
    CancellationToken, CurseForgeClient, HttpTransport, InstallSpec, ManifestHash,
    ProgressReporter, Repository,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "modsync",
    version,
    about = "Install and update packwiz modpacks"
)]
struct Cli {
    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Bring a directory in line with a remote pack.
    #[command(alias = "i")]
    Install {
        /// URL of the pack's pack.toml.
        url: String,
        /// Expected hash of pack.toml, as <format>:<hash>.
        #[arg(long)]
        hash: Option<ManifestHash>,
        /// Directory to install into.
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        /// HTTP proxy as <host>:<port>.
        #[arg(short, long)]
        proxy: Option<String>,
        /// Number of concurrent fetches (defaults to the CPU count).
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Only report what would change.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Never overwrite existing files marked preserve in the index.
        #[arg(long, default_value_t = false)]
        keep_preserved: bool,
    },
}

/// Forwards installer progress to the log
struct LogProgressReporter {
    last_percent: AtomicU32,
}

impl LogProgressReporter {
    fn new() -> Self {
        Self {
            last_percent: AtomicU32::new(0),
        }
    }
}

impl ProgressReporter for LogProgressReporter {
    fn start_step(&self, name: &str, total_steps: Option<u32>) {
        match total_steps {
            Some(total) => log::info!("{} ({} files)", name, total),
            None => log::info!("{}", name),
        }
    }

    fn set_message(&self, message: &str) {
        log::debug!("{}", message);
    }

    fn set_step_count(&self, current: u32, total: Option<u32>) {
        let Some(total) = total.filter(|t| *t > 0) else {
            return;
        };
        // Log every 10%
        let percent = current * 100 / total;
        let bucket = percent / 10 * 10;
        if bucket > self.last_percent.fetch_max(bucket, Ordering::SeqCst) {
            log::info!("Progress: {}/{} ({}%)", current, total, bucket);
        }
    }

    fn done(&self, success: bool, message: Option<&str>) {
        let message = message.unwrap_or_default();
        if success {
            log::info!("{}", message);
        } else {
            log::error!("{}", message);
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, cancelling outstanding work");
                cancel.cancel();
            }
        });
    }

    match run(cli.command, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, cancel: &CancellationToken) -> anyhow::Result<()> {
    match command {
        Commands::Install {
            url,
            hash,
            dir,
            proxy,
            jobs,
            dry_run,
            keep_preserved,
        } => {
            let transport = Arc::new(
                HttpTransport::new(proxy.as_deref()).context("Failed to set up HTTP client")?,
            );
            let curseforge = CurseForgeClient::new(transport.clone(), config::curseforge_api_key());
            if !curseforge.has_credential() {
                log::debug!(
                    "{} is not set; CurseForge-hosted files cannot be resolved",
                    config::CURSEFORGE_API_KEY_ENV
                );
            }

            let mut spec = InstallSpec::new(dir);
            if let Some(jobs) = jobs {
                spec.concurrency = jobs.max(1);
            }
            spec.dry_run = dry_run;
            spec.respect_preserve = keep_preserved;

            let mut repo = Repository::new(&url, transport)
                .with_context(|| format!("Invalid pack URL {}", url))?
                .with_resolver(Arc::new(curseforge))
                .with_concurrency(spec.concurrency);
            if let Some(hash) = hash {
                repo = repo.with_hash(hash);
            }

            let report = repo
                .install(&spec, cancel, &LogProgressReporter::new())
                .await
                .with_context(|| format!("Failed to install {}", url))?;

            println!("{}", report);
            Ok(())
        }
    }
}
