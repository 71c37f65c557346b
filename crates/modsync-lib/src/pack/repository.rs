//! Resolution chain for a remote pack: pack.toml -> index.toml -> metafiles
//! -> resolved files.
//!
//! Each stage is loaded on demand and cached for the lifetime of the
//! [`Repository`]. Asking for a later stage runs any missing earlier stage
//! first.

use crate::error::{PackError, Result};
use crate::installer::config::default_concurrency;
use crate::installer::core::batch::run_bounded;
use crate::installer::core::downloader::HttpTransport;
use crate::installer::core::traits::DownloadUrlResolver;
use crate::installer::types::{InstallSpec, ProgressReporter};
use crate::installer::{install_files, ChangeReport};
use crate::pack::parser::{parse_index, parse_metafile, parse_pack};
use crate::pack::types::{
    DownloadSource, FileIndex, FileMetadata, IndexEntry, ManifestHash, PackDescriptor,
    ResolvedFile,
};
use crate::utils::hash::HashFormat;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How far resolution has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResolutionStage {
    Unresolved,
    PackLoaded,
    IndexLoaded,
    MetadataLoaded,
    FilesResolved,
}

/// Index together with the locations derived from it
#[derive(Debug, Clone)]
struct LoadedIndex {
    url: Url,
    /// Directory of the index file, relative to the install root
    dir: PathBuf,
    index: FileIndex,
}

pub struct Repository {
    url: Url,
    pack_hash: Option<ManifestHash>,
    transport: Arc<HttpTransport>,
    resolver: Option<Arc<dyn DownloadUrlResolver>>,
    concurrency: usize,
    stage: ResolutionStage,
    pack: Option<PackDescriptor>,
    index: Option<LoadedIndex>,
    metafiles: Option<Vec<FileMetadata>>,
    files: Option<Vec<ResolvedFile>>,
    /// Indirect lookups already made, keyed by (project id, file id)
    resolved_urls: HashMap<(u32, u32), String>,
}

impl Repository {
    pub fn new(pack_url: &str, transport: Arc<HttpTransport>) -> Result<Self> {
        let url = Url::parse(pack_url).map_err(|e| PackError::InvalidUrl {
            url: pack_url.to_string(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(PackError::InvalidUrl {
                url: pack_url.to_string(),
                reason: "expected an http(s) URL to pack.toml".to_string(),
            });
        }

        Ok(Self {
            url,
            pack_hash: None,
            transport,
            resolver: None,
            concurrency: default_concurrency(),
            stage: ResolutionStage::Unresolved,
            pack: None,
            index: None,
            metafiles: None,
            files: None,
            resolved_urls: HashMap::new(),
        })
    }

    /// Require pack.toml to match this hash
    pub fn with_hash(mut self, hash: ManifestHash) -> Self {
        self.pack_hash = Some(hash);
        self
    }

    /// Resolver used for `metadata:curseforge` downloads
    pub fn with_resolver(mut self, resolver: Arc<dyn DownloadUrlResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Width of the metafile fetch group
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn stage(&self) -> ResolutionStage {
        self.stage
    }

    fn advance(&mut self, stage: ResolutionStage) {
        if stage > self.stage {
            log::debug!("[Repository] {:?} -> {:?}", self.stage, stage);
            self.stage = stage;
        }
    }

    /// Fetch and decode pack.toml
    pub async fn load_pack(&mut self, cancel: &CancellationToken) -> Result<&PackDescriptor> {
        let pack = match self.pack.take() {
            Some(pack) => pack,
            None => {
                let pack = self.fetch_pack(cancel).await?;
                log::info!(
                    "Loaded pack {} {} ({})",
                    pack.name,
                    pack.version.as_deref().unwrap_or("-"),
                    pack.pack_format
                );
                self.advance(ResolutionStage::PackLoaded);
                pack
            }
        };
        Ok(self.pack.insert(pack))
    }

    async fn fetch_pack(&self, cancel: &CancellationToken) -> Result<PackDescriptor> {
        let url = self.url.as_str();
        let fetched = match &self.pack_hash {
            Some(expected) => {
                self.transport
                    .fetch_verified(url, expected.format, &expected.hash, cancel)
                    .await
            }
            None => self.transport.fetch_bytes(url, cancel).await,
        };

        let data = fetched.map_err(|e| match e {
            PackError::Transport { .. } | PackError::HttpStatus { .. } => {
                PackError::ManifestFetch {
                    url: url.to_string(),
                    source: Box::new(e),
                }
            }
            other => other,
        })?;
        parse_pack(&data)
    }

    /// Fetch and decode the index the pack points at
    pub async fn load_index(&mut self, cancel: &CancellationToken) -> Result<&FileIndex> {
        Ok(&self.ensure_index(cancel).await?.index)
    }

    async fn ensure_index(&mut self, cancel: &CancellationToken) -> Result<&LoadedIndex> {
        let loaded = match self.index.take() {
            Some(loaded) => loaded,
            None => {
                let index_ref = self.load_pack(cancel).await?.index.clone();
                let url = sibling_url(&self.url, &index_ref.file)?;
                let dir = local_path(Path::new(""), &index_ref.file)?
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();

                let data = self
                    .transport
                    .fetch_verified(url.as_str(), index_ref.hash_format, &index_ref.hash, cancel)
                    .await?;
                let index = parse_index(&data)?;
                log::info!("Loaded index {} with {} files", url, index.files.len());
                self.advance(ResolutionStage::IndexLoaded);
                LoadedIndex { url, dir, index }
            }
        };
        Ok(self.index.insert(loaded))
    }

    /// Fetch every metafile named by the index, concurrently.
    ///
    /// Fails with the first error; no partial list is kept.
    pub async fn load_metafiles(&mut self, cancel: &CancellationToken) -> Result<&[FileMetadata]> {
        let metafiles = match self.metafiles.take() {
            Some(metafiles) => metafiles,
            None => {
                let metafiles = self.fetch_metafiles(cancel).await?;
                self.advance(ResolutionStage::MetadataLoaded);
                metafiles
            }
        };
        Ok(self.metafiles.insert(metafiles))
    }

    async fn fetch_metafiles(&mut self, cancel: &CancellationToken) -> Result<Vec<FileMetadata>> {
        let loaded = self.ensure_index(cancel).await?;

        let mut jobs = Vec::new();
        for entry in loaded.index.files.iter().filter(|e| e.metafile) {
            jobs.push(MetafileJob {
                path: entry.file.clone(),
                url: sibling_url(&loaded.url, &entry.file)?,
                hash_format: entry.effective_hash_format(&loaded.index),
                hash: entry.hash.clone(),
            });
        }

        log::info!("Fetching {} metafiles", jobs.len());
        let transport = self.transport.clone();
        run_bounded(jobs, self.concurrency, cancel, |job, token| {
            let transport = transport.clone();
            async move {
                let data = transport
                    .fetch_verified(job.url.as_str(), job.hash_format, &job.hash, &token)
                    .await?;
                let mut metafile = parse_metafile(&data)?;
                metafile.index_path = job.path;
                Ok(metafile)
            }
        })
        .await
    }

    /// Turn every index entry into a [`ResolvedFile`]
    pub async fn resolve_files(&mut self, cancel: &CancellationToken) -> Result<&[ResolvedFile]> {
        let files = match self.files.take() {
            Some(files) => files,
            None => {
                let files = self.build_resolved_files(cancel).await?;
                log::info!("Resolved {} files", files.len());
                self.advance(ResolutionStage::FilesResolved);
                files
            }
        };
        Ok(self.files.insert(files))
    }

    async fn build_resolved_files(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResolvedFile>> {
        let metafiles = self.load_metafiles(cancel).await?.to_vec();
        let loaded = self.ensure_index(cancel).await?.clone();

        let by_path: HashMap<&str, &FileMetadata> = metafiles
            .iter()
            .map(|m| (m.index_path.as_str(), m))
            .collect();

        let mut files = Vec::with_capacity(loaded.index.files.len());
        for entry in &loaded.index.files {
            let file = if entry.metafile {
                let metafile = by_path.get(entry.file.as_str()).ok_or_else(|| {
                    PackError::MissingMetadata {
                        path: entry.file.clone(),
                    }
                })?;
                self.resolve_metafile_entry(&loaded, entry, metafile, cancel)
                    .await?
            } else {
                resolve_plain_entry(&loaded, entry)?
            };
            files.push(file);
        }

        Ok(files)
    }

    async fn resolve_metafile_entry(
        &mut self,
        loaded: &LoadedIndex,
        entry: &IndexEntry,
        metafile: &FileMetadata,
        cancel: &CancellationToken,
    ) -> Result<ResolvedFile> {
        let url = match metafile.download_source() {
            DownloadSource::Direct(url) => url,
            DownloadSource::CurseForge {
                project_id,
                file_id,
            } => self.resolve_indirect(&entry.file, project_id, file_id, cancel).await?,
            DownloadSource::Unsupported { mode } => {
                return Err(PackError::UnresolvableDownload {
                    path: entry.file.clone(),
                    reason: if mode.is_empty() {
                        "no download url and no download mode".to_string()
                    } else {
                        format!("unsupported download mode '{}'", mode)
                    },
                });
            }
        };

        let entry_dir = entry.file.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let dir = local_path(&loaded.dir, entry_dir)?;
        let path = local_path(&dir, &metafile.filename)?;

        checked_file(
            &entry.file,
            ResolvedFile {
                path,
                url,
                hash: metafile.download.hash.clone(),
                hash_format: metafile.download.hash_format,
                preserve: entry.preserve,
                alias: entry.alias.clone(),
                data: None,
            },
        )
    }

    async fn resolve_indirect(
        &mut self,
        entry_path: &str,
        project_id: u32,
        file_id: u32,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if let Some(url) = self.resolved_urls.get(&(project_id, file_id)) {
            return Ok(url.clone());
        }

        let resolver = self
            .resolver
            .clone()
            .ok_or_else(|| PackError::UnresolvableDownload {
                path: entry_path.to_string(),
                reason: "no resolver configured for CurseForge downloads".to_string(),
            })?;

        log::debug!(
            "Resolving CurseForge download for {} ({}/{})",
            entry_path,
            project_id,
            file_id
        );
        let url = resolver
            .resolve_download_url(project_id, file_id, cancel)
            .await?;
        self.resolved_urls.insert((project_id, file_id), url.clone());
        Ok(url)
    }

    /// Resolve everything, then install into `spec.root_dir`
    pub async fn install(
        &mut self,
        spec: &InstallSpec,
        cancel: &CancellationToken,
        reporter: &dyn ProgressReporter,
    ) -> Result<ChangeReport> {
        let files = self.resolve_files(cancel).await?.to_vec();
        install_files(&self.transport, files, spec, cancel, reporter).await
    }
}

struct MetafileJob {
    path: String,
    url: Url,
    hash_format: HashFormat,
    hash: String,
}

fn resolve_plain_entry(loaded: &LoadedIndex, entry: &IndexEntry) -> Result<ResolvedFile> {
    checked_file(
        &entry.file,
        ResolvedFile {
            path: local_path(&loaded.dir, &entry.file)?,
            url: sibling_url(&loaded.url, &entry.file)?.to_string(),
            hash: entry.hash.clone(),
            hash_format: entry.effective_hash_format(&loaded.index),
            preserve: entry.preserve,
            alias: entry.alias.clone(),
            data: None,
        },
    )
}

/// A file may only leave resolution with a hash and a URL
fn checked_file(entry_path: &str, file: ResolvedFile) -> Result<ResolvedFile> {
    if file.hash.trim().is_empty() {
        return Err(PackError::UnresolvableDownload {
            path: entry_path.to_string(),
            reason: "no hash declared".to_string(),
        });
    }
    if file.url.trim().is_empty() {
        return Err(PackError::UnresolvableDownload {
            path: entry_path.to_string(),
            reason: "empty download url".to_string(),
        });
    }
    Ok(file)
}

/// Resolve `relative` against the directory containing `base`
pub(crate) fn sibling_url(base: &Url, relative: &str) -> Result<Url> {
    let mut url = base.clone();
    url.set_fragment(None);
    {
        let mut segments = url.path_segments_mut().map_err(|_| PackError::InvalidUrl {
            url: base.to_string(),
            reason: "cannot be a base URL".to_string(),
        })?;
        segments.pop();
        for segment in relative.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => {
                    segments.push(s);
                }
            }
        }
    }
    Ok(url)
}

/// Join a `/`-separated manifest path onto `base`, refusing anything that
/// could leave the install root
pub(crate) fn local_path(base: &Path, relative: &str) -> Result<PathBuf> {
    let unsafe_path = || PackError::UnsafePath {
        path: relative.to_string(),
    };
    if relative.starts_with('/') || relative.starts_with('\\') {
        return Err(unsafe_path());
    }

    let mut path = base.to_path_buf();
    for segment in relative.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return Err(unsafe_path()),
            s if s.contains(':') => return Err(unsafe_path()),
            s => path.push(s),
        }
    }
    Ok(path)
}
