use crate::cache::GraphCacheManager;
use crate::discovery::{relative_path, FileDiscovery};
use crate::error::{Result, ScanError};
use crate::limits::resolve_workers;
use crate::pool::{parse_parallel, parse_serial, ParseJob};
use crate::progress::{ProgressReporter, ScanEvent};
use crate::stats::ScanStats;
use serde::{Deserialize, Serialize};
use sigscope_gdscript::{AstError, AstProvider, ScriptTree};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanMode {
    /// Parse every discovered file
    Full,
    /// Parse only files the ledger reports as stale
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Up to this many files are parsed on the calling task
    pub serial_threshold: usize,

    /// Worker count for the parallel path; `None` derives it from the environment and CPU count
    pub workers: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            serial_threshold: 16,
            workers: None,
        }
    }
}

/// A successfully parsed script
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub tree: ScriptTree,
    pub file_path: PathBuf,
    pub relative_path: String,
    pub size_bytes: u64,
    pub parse_duration_ms: u64,
    pub mtime: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileErrorKind {
    Io,
    Encoding,
    Parse,
    WorkerCrashed,
}

impl From<&AstError> for FileErrorKind {
    fn from(err: &AstError) -> Self {
        match err {
            AstError::IoError(_) => Self::Io,
            AstError::InvalidEncoding(_) => Self::Encoding,
            AstError::ParseError { .. } | AstError::InitError(_) => Self::Parse,
        }
    }
}

/// A file dropped from the scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub path: PathBuf,
    pub relative_path: String,
    pub kind: FileErrorKind,
    pub message: String,
}

impl FileError {
    pub(crate) fn new(job: &ParseJob, kind: FileErrorKind, message: String) -> Self {
        Self {
            path: job.path.clone(),
            relative_path: job.relative_path.clone(),
            kind,
            message,
        }
    }
}

#[derive(Debug)]
pub struct ScanOutcome {
    /// Canonical project root
    pub root: PathBuf,

    /// Every script found under the root, parsed or not
    pub discovered: Vec<PathBuf>,

    pub files: Vec<ParsedFile>,
    pub errors: Vec<FileError>,
    pub stats: ScanStats,
}

/// Walks a project and parses its scripts
pub struct ProjectScanner {
    provider: Arc<dyn AstProvider>,
    options: ScanOptions,
    progress: Option<UnboundedSender<ScanEvent>>,
}

impl ProjectScanner {
    pub fn new(provider: Arc<dyn AstProvider>) -> Self {
        Self {
            provider,
            options: ScanOptions::default(),
            progress: None,
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Send [`ScanEvent`]s to `tx` during every scan
    pub fn with_progress(mut self, tx: UnboundedSender<ScanEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan `root`, parsing the files `mode` selects and recording them in `cache`.
    ///
    /// Per-file failures end up in [`ScanOutcome::errors`]; only an unusable root or a provider
    /// that fails to initialize make the scan itself fail.
    pub async fn scan(
        &self,
        root: &Path,
        mode: ScanMode,
        cache: &mut GraphCacheManager,
    ) -> Result<ScanOutcome> {
        let started = Instant::now();
        let mut progress = ProgressReporter::new(self.progress.clone());

        let root = match resolve_root(root).await {
            Ok(root) => root,
            Err(err) => {
                progress.failed(&err.to_string());
                return Err(err);
            }
        };
        if let Err(err) = self.provider.init() {
            let err = ScanError::ProviderInit(err);
            progress.failed(&err.to_string());
            return Err(err);
        }

        let discovered = FileDiscovery::new(&root).discover();
        let jobs: Vec<ParseJob> = discovered
            .iter()
            .filter(|path| mode == ScanMode::Full || cache.is_stale(path))
            .map(|path| ParseJob {
                path: path.clone(),
                relative_path: relative_path(&root, path),
            })
            .collect();

        let mut stats = ScanStats::new(discovered.len());
        stats.files_skipped = discovered.len() - jobs.len();
        log::info!(
            "Found {} script files, {} to parse ({:?} scan)",
            discovered.len(),
            jobs.len(),
            mode
        );
        progress.started(&root, discovered.len(), jobs.len());

        let result = if jobs.len() <= self.options.serial_threshold {
            stats.workers = 1;
            parse_serial(self.provider.as_ref(), &jobs, &mut progress)
        } else {
            stats.workers = resolve_workers(jobs.len(), self.options.workers);
            parse_parallel(Arc::clone(&self.provider), jobs, stats.workers, &mut progress).await
        };
        progress.finish();

        for file in &result.parsed {
            cache.update_cache(&file.file_path, file.mtime);
            stats.add_parsed(file.size_bytes);
        }
        for _ in &result.errors {
            stats.add_failed();
        }
        stats.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        log::info!(
            "Scan complete: {} parsed, {} skipped, {} failed in {}ms",
            stats.files_parsed,
            stats.files_skipped,
            stats.files_failed,
            stats.duration_ms
        );
        progress.completed(&stats);

        Ok(ScanOutcome {
            root,
            discovered,
            files: result.parsed,
            errors: result.errors,
            stats,
        })
    }
}

/// Canonicalize `root` and make sure it is a directory
pub(crate) async fn resolve_root(root: &Path) -> Result<PathBuf> {
    let canonical = tokio::fs::canonicalize(root)
        .await
        .map_err(|e| ScanError::invalid_root(root, e.to_string()))?;
    let metadata = tokio::fs::metadata(&canonical)
        .await
        .map_err(|e| ScanError::invalid_root(root, e.to_string()))?;
    if !metadata.is_dir() {
        return Err(ScanError::invalid_root(root, "not a directory"));
    }
    Ok(canonical)
}
