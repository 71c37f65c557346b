pub mod config;
pub mod core;
pub mod types;


use crate::error::{PackError, Result};
use crate::installer::core::batch::run_bounded;
use crate::installer::core::downloader::HttpTransport;
use crate::pack::types::ResolvedFile;
use crate::utils::hash::verify;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;
use tokio::fs::{create_dir_all, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use types::{InstallSpec, ProgressReporter};

/// What an install run did, by relative path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    /// Already present with the expected hash
    pub skipped: Vec<PathBuf>,
    /// Downloaded and written (or, for a dry run, would be)
    pub installed: Vec<PathBuf>,
    pub dry_run: bool,
}

impl ChangeReport {
    pub fn is_unchanged(&self) -> bool {
        self.installed.is_empty()
    }

    fn sort(&mut self) {
        self.skipped.sort();
        self.installed.sort();
    }
}

impl fmt::Display for ChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let verb = if self.dry_run { "Would install" } else { "Installed" };
        writeln!(f, "{}: {}", verb, self.installed.len())?;
        for path in &self.installed {
            writeln!(f, "  + {}", path.display())?;
        }
        write!(f, "Skipped (up to date): {}", self.skipped.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Skipped,
    Installed,
}

/// Install resolved files under `spec.root_dir`.
///
/// Each file is checked against its expected hash first and only fetched
/// when missing or stale. Work runs in a bounded group of
/// `spec.concurrency`; the first failure cancels the rest and is returned
/// instead of a report.
pub async fn install_files(
    transport: &HttpTransport,
    files: Vec<ResolvedFile>,
    spec: &InstallSpec,
    cancel: &CancellationToken,
    reporter: &dyn ProgressReporter,
) -> Result<ChangeReport> {
    // Deduplicate by destination to avoid concurrent writes to the same file
    let mut unique_files = Vec::with_capacity(files.len());
    let mut seen_paths = HashSet::new();
    for file in files {
        if seen_paths.insert(file.path.clone()) {
            unique_files.push(file);
        } else {
            log::warn!("Duplicate destination in pack, ignoring: {}", file.path.display());
        }
    }

    let total = unique_files.len();
    log::info!(
        "Installing {} files into {} (concurrency={}, dry_run={})",
        total,
        spec.root_dir.display(),
        spec.concurrency,
        spec.dry_run
    );
    reporter.start_step("Installing pack files", Some(total as u32));

    let report = Mutex::new(ChangeReport::default());
    let finished = AtomicUsize::new(0);

    let result = run_bounded(unique_files, spec.concurrency, cancel, |file, token| {
        let report = &report;
        let finished = &finished;
        async move {
            let path = file.path.clone();
            let outcome = install_one(transport, file, spec, &token).await?;

            let verb = match (outcome, spec.dry_run) {
                (FileOutcome::Skipped, _) => "Up to date",
                (FileOutcome::Installed, true) => "Would install",
                (FileOutcome::Installed, false) => "Installed",
            };
            reporter.set_message(&format!("{}: {}", verb, path.display()));

            {
                let mut report = report.lock().await;
                match outcome {
                    FileOutcome::Skipped => report.skipped.push(path),
                    FileOutcome::Installed => report.installed.push(path),
                }
            }

            let count = finished.fetch_add(1, Ordering::SeqCst) + 1;
            reporter.set_step_count(count as u32, Some(total as u32));
            Ok(())
        }
    })
    .await;

    if let Err(e) = result {
        log::error!("Install failed: {}", e);
        reporter.done(false, Some("Installation failed"));
        return Err(e);
    }

    let mut report = report.into_inner();
    report.dry_run = spec.dry_run;
    report.sort();

    log::info!(
        "Install complete: {} installed, {} skipped",
        report.installed.len(),
        report.skipped.len()
    );
    reporter.done(true, Some("Installation complete"));
    Ok(report)
}

async fn install_one(
    transport: &HttpTransport,
    mut file: ResolvedFile,
    spec: &InstallSpec,
    cancel: &CancellationToken,
) -> Result<FileOutcome> {
    let dest = spec.destination(&file.path);

    if spec.respect_preserve && file.preserve && is_existing_file(&dest).await? {
        log::debug!("Preserved file exists, leaving untouched: {}", dest.display());
        return Ok(FileOutcome::Skipped);
    }

    if check_integrity(&dest, &file).await? {
        log::debug!("File exists and hash matches, skipping: {}", dest.display());
        return Ok(FileOutcome::Skipped);
    }

    if spec.dry_run {
        log::info!("[Dry-Run] Would download {} to {}", file.url, dest.display());
        return Ok(FileOutcome::Installed);
    }

    let data = transport
        .fetch_verified(&file.url, file.hash_format, &file.hash, cancel)
        .await?;
    let data = file.data.insert(data);

    write_atomically(&dest, data).await?;
    log::info!("Installed {}", file.path.display());
    Ok(FileOutcome::Installed)
}

async fn is_existing_file(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Err(PackError::PathConflict {
            path: path.to_path_buf(),
        }),
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PackError::io(path, e)),
    }
}

/// True when `path` already holds the expected content
async fn check_integrity(path: &Path, file: &ResolvedFile) -> Result<bool> {
    if !is_existing_file(path).await? {
        return Ok(false);
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PackError::io(path, e))?;
    let valid = verify(&bytes, file.hash_format, &file.hash);
    if !valid {
        log::info!(
            "File exists but {} mismatches, re-downloading: {}",
            file.hash_format,
            path.display()
        );
    }
    Ok(valid)
}

/// Write into an anonymous temp file next to `path`, then rename over it.
/// A failed or interrupted write never leaves a truncated destination, and
/// the temp file is removed whenever it is dropped before the rename.
async fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    create_dir_all(parent)
        .await
        .map_err(|e| PackError::io(parent, e))?;

    let tmp = NamedTempFile::new_in(parent).map_err(|e| PackError::io(parent, e))?;
    let written = async {
        let mut file = File::from_std(tmp.reopen()?);
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    written.map_err(|e| PackError::io(tmp.path(), e))?;

    tmp.persist(path).map_err(|e| PackError::io(path, e.error))?;
    Ok(())
}
