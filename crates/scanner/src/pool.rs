use crate::cache::system_time_ms;
use crate::progress::ProgressReporter;
use crate::scanner::{FileError, FileErrorKind, ParsedFile};
use sigscope_gdscript::AstProvider;
use std::any::Any;
use std::collections::HashSet;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// One file waiting to be parsed
#[derive(Debug, Clone)]
pub(crate) struct ParseJob {
    pub path: PathBuf,
    pub relative_path: String,
}

/// Per-file result sent from a worker
pub(crate) enum WorkerMessage {
    Parsed(ParsedFile),
    Failed(FileError),
}

pub(crate) fn parse_one(provider: &dyn AstProvider, job: &ParseJob) -> WorkerMessage {
    let metadata = match fs::metadata(&job.path) {
        Ok(metadata) => metadata,
        Err(e) => {
            log::warn!("Skipping {}: {e}", job.relative_path);
            return WorkerMessage::Failed(FileError::new(job, FileErrorKind::Io, e.to_string()));
        }
    };
    let mtime = metadata.modified().map(system_time_ms).unwrap_or(0);

    let started = Instant::now();
    match provider.parse_file(&job.path) {
        Ok(tree) => WorkerMessage::Parsed(ParsedFile {
            tree,
            file_path: job.path.clone(),
            relative_path: job.relative_path.clone(),
            size_bytes: metadata.len(),
            parse_duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            mtime,
        }),
        Err(err) => {
            log::warn!("Skipping {}: {err}", job.relative_path);
            WorkerMessage::Failed(FileError::new(job, FileErrorKind::from(&err), err.to_string()))
        }
    }
}

#[derive(Default)]
pub(crate) struct PoolResult {
    pub parsed: Vec<ParsedFile>,
    pub errors: Vec<FileError>,
}

impl PoolResult {
    fn push(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Parsed(file) => self.parsed.push(file),
            WorkerMessage::Failed(error) => self.errors.push(error),
        }
    }

    fn sort(&mut self) {
        self.parsed
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        self.errors
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Parse every job on the calling task.
///
/// A provider panic costs only the file it panicked on, reported as
/// [`FileErrorKind::WorkerCrashed`].
pub(crate) fn parse_serial(
    provider: &dyn AstProvider,
    jobs: &[ParseJob],
    progress: &mut ProgressReporter,
) -> PoolResult {
    let mut result = PoolResult::default();
    for job in jobs {
        let message = panic::catch_unwind(AssertUnwindSafe(|| parse_one(provider, job)))
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                log::warn!("Provider panicked on {}: {reason}", job.relative_path);
                WorkerMessage::Failed(FileError::new(
                    job,
                    FileErrorKind::WorkerCrashed,
                    format!("Provider panicked: {reason}"),
                ))
            });
        result.push(message);
        progress.file_done();
    }
    result
}

/// Parse jobs over `workers` blocking tasks, each owning one contiguous chunk.
///
/// A panicking worker loses only the files of its chunk it had not reported yet; those come back
/// as [`FileErrorKind::WorkerCrashed`].
pub(crate) async fn parse_parallel(
    provider: Arc<dyn AstProvider>,
    jobs: Vec<ParseJob>,
    workers: usize,
    progress: &mut ProgressReporter,
) -> PoolResult {
    let mut result = PoolResult::default();
    if jobs.is_empty() {
        return result;
    }

    let total = jobs.len();
    let chunk_size = total.div_ceil(workers.max(1));

    // Shared with the worker so a crashed chunk can still be accounted for
    let mut chunks: Vec<Arc<[ParseJob]>> = Vec::with_capacity(total.div_ceil(chunk_size));
    let mut pending = jobs.into_iter().peekable();
    while pending.peek().is_some() {
        chunks.push(pending.by_ref().take(chunk_size).collect());
    }
    log::debug!(
        "Parsing {total} files in {} chunks of up to {chunk_size}",
        chunks.len()
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<WorkerMessage>();
    let mut handles = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let chunk = Arc::clone(chunk);
        let tx = tx.clone();
        let provider = Arc::clone(&provider);
        handles.push(tokio::task::spawn_blocking(move || {
            for job in chunk.iter() {
                if tx.send(parse_one(provider.as_ref(), job)).is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    let mut reported: HashSet<PathBuf> = HashSet::new();
    while let Some(message) = rx.recv().await {
        let path = match &message {
            WorkerMessage::Parsed(file) => file.file_path.clone(),
            WorkerMessage::Failed(error) => error.path.clone(),
        };
        reported.insert(path);
        result.push(message);
        progress.file_done();
    }

    for (handle, chunk) in handles.into_iter().zip(&chunks) {
        if let Err(e) = handle.await {
            log::warn!("Parse worker failed: {e}");
            for job in chunk.iter().filter(|job| !reported.contains(&job.path)) {
                result.errors.push(FileError::new(
                    job,
                    FileErrorKind::WorkerCrashed,
                    format!("Worker panicked: {e}"),
                ));
                progress.file_done();
            }
        }
    }

    result.sort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sigscope_gdscript::{GdScriptProvider, ScriptTree};
    use tempfile::tempdir;

    fn jobs_in(dir: &std::path::Path, files: &[(&str, &str)]) -> Vec<ParseJob> {
        files
            .iter()
            .map(|(name, source)| {
                let path = dir.join(name);
                fs::write(&path, source).unwrap();
                ParseJob {
                    path,
                    relative_path: name.to_string(),
                }
            })
            .collect()
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let job = ParseJob {
            path: PathBuf::from("/definitely/not/here.gd"),
            relative_path: "here.gd".to_string(),
        };
        match parse_one(&GdScriptProvider::new(), &job) {
            WorkerMessage::Failed(error) => assert_eq!(error.kind, FileErrorKind::Io),
            WorkerMessage::Parsed(_) => panic!("missing file parsed"),
        }
    }

    struct PanickingProvider;

    impl AstProvider for PanickingProvider {
        fn parse_string(&self, source: &str) -> sigscope_gdscript::Result<ScriptTree> {
            if source.contains("explode") {
                panic!("cannot read {source:?}");
            }
            GdScriptProvider::new().parse_string(source)
        }
    }

    #[test]
    fn serial_panic_costs_one_file() {
        let dir = tempdir().unwrap();
        let jobs = jobs_in(
            dir.path(),
            &[
                ("a.gd", "signal a\n"),
                ("b.gd", "signal explode\n"),
                ("c.gd", "signal c\n"),
            ],
        );

        let mut progress = ProgressReporter::new(None);
        let result = parse_serial(&PanickingProvider, &jobs, &mut progress);

        let parsed: Vec<&str> = result.parsed.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(parsed, vec!["a.gd", "c.gd"]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].relative_path, "b.gd");
        assert_eq!(result.errors[0].kind, FileErrorKind::WorkerCrashed);
        assert!(result.errors[0].message.contains("cannot read"));
    }

    #[tokio::test]
    async fn chunks_cover_every_job_once() {
        let dir = tempdir().unwrap();
        let files: Vec<(String, String)> = (0..7)
            .map(|i| (format!("f{i}.gd"), format!("signal s{i}\n")))
            .collect();
        let refs: Vec<(&str, &str)> = files.iter().map(|(n, s)| (n.as_str(), s.as_str())).collect();
        let jobs = jobs_in(dir.path(), &refs);

        let provider: Arc<dyn AstProvider> = Arc::new(GdScriptProvider::new());
        let mut progress = ProgressReporter::new(None);
        let result = parse_parallel(provider, jobs, 3, &mut progress).await;

        let parsed: Vec<&str> = result.parsed.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(
            parsed,
            vec!["f0.gd", "f1.gd", "f2.gd", "f3.gd", "f4.gd", "f5.gd", "f6.gd"]
        );
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn parallel_and_serial_agree() {
        let dir = tempdir().unwrap();
        let jobs = jobs_in(
            dir.path(),
            &[
                ("a.gd", "signal a\n"),
                ("b.gd", "func f():\n\ta.emit()\n"),
                ("c.gd", "signal c\n"),
                ("d.gd", "extends Node\n"),
                ("e.gd", "signal e(x)\n"),
            ],
        );
        let provider: Arc<dyn AstProvider> = Arc::new(GdScriptProvider::new());

        let mut progress = ProgressReporter::new(None);
        let serial = parse_serial(provider.as_ref(), &jobs, &mut progress);
        let parallel = parse_parallel(Arc::clone(&provider), jobs, 3, &mut progress).await;

        let names = |r: &PoolResult| -> Vec<String> {
            r.parsed.iter().map(|f| f.relative_path.clone()).collect()
        };
        assert_eq!(names(&serial), names(&parallel));
        assert_eq!(parallel.parsed.len(), 5);
        assert!(parallel.errors.is_empty());
    }
}
