//! Installs and updates packwiz modpacks.
//!
//! A [`Repository`] resolves a remote `pack.toml` into hash-verified files;
//! [`installer::install_files`] writes the missing or stale ones to disk.

pub mod api;
pub mod error;
pub mod installer;
pub mod pack;
pub mod utils;

// Re-export commonly used types
pub use api::CurseForgeClient;
pub use error::{PackError, Result};
pub use installer::core::downloader::HttpTransport;
pub use installer::types::{InstallSpec, ProgressReporter, SilentProgressReporter};
pub use installer::{install_files, ChangeReport};
pub use pack::{ManifestHash, Repository, ResolutionStage, ResolvedFile};
pub use utils::hash::HashFormat;
pub use tokio_util::sync::CancellationToken;
