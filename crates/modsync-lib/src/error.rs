use std::path::PathBuf;

/// Errors produced while resolving a pack or installing its files
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status}: {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to fetch pack manifest {url}: {source}")]
    ManifestFetch {
        url: String,
        #[source]
        source: Box<PackError>,
    },

    #[error("{algorithm} mismatch for {url}: expected {expected}, got {actual}")]
    Integrity {
        url: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to decode {document}: {message}")]
    Decode {
        document: &'static str,
        message: String,
    },

    #[error("Metafile not found for index entry: {path}")]
    MissingMetadata { path: String },

    #[error("Cannot resolve a download for {path}: {reason}")]
    UnresolvableDownload { path: String, reason: String },

    #[error("CurseForge API key is not configured")]
    MissingCredential,

    #[error("Destination is a directory: {}", path.display())]
    PathConflict { path: PathBuf },

    #[error("Unsupported hash format: {name}")]
    UnsupportedAlgorithm { name: String },

    #[error("Invalid hash specification '{spec}', expected <format>:<hash>")]
    InvalidHashSpec { spec: String },

    #[error("Path escapes the install root: {path}")]
    UnsafePath { path: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl PackError {
    /// True for network failures and non-2xx responses
    pub fn is_transport(&self) -> bool {
        matches!(self, PackError::Transport { .. } | PackError::HttpStatus { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = PackError> = std::result::Result<T, E>;
