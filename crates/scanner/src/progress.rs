use crate::stats::ScanStats;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

/// Processed files between two `Progress` events
pub const PROGRESS_INTERVAL: usize = 10;

/// Scan lifecycle events sent to an optional observer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ScanEvent {
    #[serde(rename_all = "camelCase")]
    Started {
        root: PathBuf,
        files_discovered: usize,
        files_to_parse: usize,
    },
    Progress {
        processed: usize,
        total: usize,
    },
    Completed {
        stats: ScanStats,
    },
    Failed {
        error: String,
    },
}

pub(crate) struct ProgressReporter {
    tx: Option<UnboundedSender<ScanEvent>>,
    total: usize,
    processed: usize,
    last_reported: Option<usize>,
}

impl ProgressReporter {
    pub fn new(tx: Option<UnboundedSender<ScanEvent>>) -> Self {
        Self {
            tx,
            total: 0,
            processed: 0,
            last_reported: None,
        }
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver only silences progress
            let _ = tx.send(event);
        }
    }

    pub fn started(&mut self, root: &Path, files_discovered: usize, files_to_parse: usize) {
        self.total = files_to_parse;
        self.processed = 0;
        self.last_reported = None;
        self.emit(ScanEvent::Started {
            root: root.to_path_buf(),
            files_discovered,
            files_to_parse,
        });
    }

    pub fn file_done(&mut self) {
        self.processed += 1;
        if self.processed % PROGRESS_INTERVAL == 0 {
            self.report();
        }
    }

    /// Final `Progress` unless the last one already covered every file
    pub fn finish(&mut self) {
        if self.last_reported != Some(self.processed) {
            self.report();
        }
    }

    fn report(&mut self) {
        self.last_reported = Some(self.processed);
        self.emit(ScanEvent::Progress {
            processed: self.processed,
            total: self.total,
        });
    }

    pub fn completed(&self, stats: &ScanStats) {
        self.emit(ScanEvent::Completed {
            stats: stats.clone(),
        });
    }

    pub fn failed(&self, error: &str) {
        self.emit(ScanEvent::Failed {
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ScanEvent>) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn progress_every_interval_and_at_the_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reporter = ProgressReporter::new(Some(tx));
        reporter.started(Path::new("/p"), 30, 23);
        for _ in 0..23 {
            reporter.file_done();
        }
        reporter.finish();

        let progress: Vec<usize> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                ScanEvent::Progress { processed, .. } => Some(processed),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![10, 20, 23]);
    }

    #[test]
    fn no_duplicate_final_progress() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reporter = ProgressReporter::new(Some(tx));
        reporter.started(Path::new("/p"), 10, 10);
        for _ in 0..10 {
            reporter.file_done();
        }
        reporter.finish();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ScanEvent::Progress {
                processed: 10,
                total: 10
            }
        );
    }

    #[test]
    fn dropped_receiver_is_harmless() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut reporter = ProgressReporter::new(Some(tx));
        reporter.started(Path::new("/p"), 1, 1);
        reporter.file_done();
        reporter.finish();
        reporter.failed("boom");
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let json = serde_json::to_value(ScanEvent::Started {
            root: PathBuf::from("/p"),
            files_discovered: 3,
            files_to_parse: 1,
        })
        .unwrap();
        assert_eq!(json["event"], "started");
        assert_eq!(json["filesDiscovered"], 3);
    }
}
