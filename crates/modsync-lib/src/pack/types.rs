use crate::error::PackError;
use crate::utils::hash::HashFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Download mode naming CurseForge as the indirect host
pub const MODE_CURSEFORGE: &str = "metadata:curseforge";

/// Root pack descriptor (pack.toml)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct PackDescriptor {
    pub name: String,
    pub author: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub pack_format: String,
    pub index: IndexReference,
    /// Version pins, e.g. `minecraft = "1.20.1"`, `fabric = "0.15.3"`
    #[serde(default)]
    pub versions: BTreeMap<String, String>,
}

impl PackDescriptor {
    pub fn is_packwiz_format(&self) -> bool {
        self.pack_format.is_empty() || self.pack_format.starts_with("packwiz:")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct IndexReference {
    pub file: String,
    pub hash_format: HashFormat,
    pub hash: String,
}

/// File index (index.toml)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct FileIndex {
    pub hash_format: HashFormat,
    #[serde(default)]
    pub files: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct IndexEntry {
    pub file: String,
    pub hash: String,
    pub alias: Option<String>,
    pub hash_format: Option<HashFormat>,
    #[serde(default)]
    pub metafile: bool,
    #[serde(default)]
    pub preserve: bool,
}

impl IndexEntry {
    /// Entry override, falling back to the index default
    pub fn effective_hash_format(&self, index: &FileIndex) -> HashFormat {
        self.hash_format.unwrap_or(index.hash_format)
    }
}

/// Per-file metadata record (*.pw.toml)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct FileMetadata {
    pub filename: String,
    pub name: String,
    pub side: Option<Side>,
    pub download: DownloadSpec,
    pub update: Option<UpdateSources>,
    pub option: Option<OptionalSpec>,
    /// Path of the index entry this record was fetched for
    #[serde(skip)]
    pub index_path: String,
}

impl FileMetadata {
    /// Classify where the payload for this record comes from
    pub fn download_source(&self) -> DownloadSource {
        if let Some(url) = self.download.url.as_deref().filter(|u| !u.is_empty()) {
            return DownloadSource::Direct(url.to_string());
        }

        let mode = self.download.mode.clone().unwrap_or_default();
        if mode == MODE_CURSEFORGE {
            if let Some(cf) = self.update.as_ref().and_then(|u| u.curseforge.as_ref()) {
                return DownloadSource::CurseForge {
                    project_id: cf.project_id,
                    file_id: cf.file_id,
                };
            }
        }
        DownloadSource::Unsupported { mode }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct DownloadSpec {
    pub hash_format: HashFormat,
    pub hash: String,
    pub url: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UpdateSources {
    pub curseforge: Option<CurseForgeUpdate>,
    pub modrinth: Option<ModrinthUpdate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct CurseForgeUpdate {
    pub project_id: u32,
    pub file_id: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ModrinthUpdate {
    pub mod_id: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OptionalSpec {
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub default: bool,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Client,
    Server,
    Both,
    #[serde(other)]
    Unknown,
}

/// Where a metafile's payload is downloaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    Direct(String),
    CurseForge { project_id: u32, file_id: u32 },
    Unsupported { mode: String },
}

/// A fully determined file, ready to be checked and installed
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    /// Destination relative to the install root
    pub path: PathBuf,
    pub url: String,
    pub hash: String,
    pub hash_format: HashFormat,
    pub preserve: bool,
    pub alias: Option<String>,
    /// Payload, filled in once downloaded and verified
    pub data: Option<Vec<u8>>,
}

/// Expected hash of the pack manifest itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestHash {
    pub format: HashFormat,
    pub hash: String,
}

impl ManifestHash {
    pub fn new(format: HashFormat, hash: impl Into<String>) -> Self {
        Self {
            format,
            hash: hash.into(),
        }
    }
}

impl FromStr for ManifestHash {
    type Err = PackError;

    /// Parse `<format>:<hash>`, e.g. `sha256:abc012...`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PackError::InvalidHashSpec {
            spec: s.to_string(),
        };
        let (format, hash) = s.split_once(':').ok_or_else(invalid)?;
        if format.is_empty() || hash.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(format.parse()?, hash))
    }
}
