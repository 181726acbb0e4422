use serde::{Deserialize, Serialize};

/// Statistics about one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Source files found under the root
    pub files_discovered: usize,

    /// Files left alone because the ledger says they are unchanged
    pub files_skipped: usize,

    pub files_parsed: usize,
    pub files_failed: usize,

    /// Total size of the parsed files
    pub bytes_parsed: u64,

    /// Parse workers used; 1 when parsing ran on the calling task
    pub workers: usize,

    pub duration_ms: u64,
}

impl ScanStats {
    pub fn new(files_discovered: usize) -> Self {
        Self {
            files_discovered,
            ..Self::default()
        }
    }

    pub fn add_parsed(&mut self, size_bytes: u64) {
        self.files_parsed += 1;
        self.bytes_parsed += size_bytes;
    }

    pub fn add_failed(&mut self) {
        self.files_failed += 1;
    }
}
