use crate::error::Result;
use serde::{Deserialize, Serialize};
use sigscope_graph::GRAPH_SCHEMA_VERSION;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// File name of the ledger inside the state directory
pub const LEDGER_FILE: &str = "ledger.json";

/// Kind of artifact a ledger tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    SignalGraph,
}

impl ArtifactKind {
    pub const fn current_version(self) -> u32 {
        match self {
            Self::SignalGraph => GRAPH_SCHEMA_VERSION,
        }
    }
}

/// What the ledger remembers about one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub file_path: String,
    pub mtime: u64,
    pub schema_version: u32,
}

/// Modification time in whole milliseconds since the epoch
pub fn file_mtime_ms(path: &Path) -> std::io::Result<u64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(system_time_ms(modified))
}

pub(crate) fn system_time_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Per-file ledger deciding which files need re-parsing.
///
/// Keys are absolute paths as given by the scanner.
#[derive(Debug, Clone)]
pub struct GraphCacheManager {
    artifact: ArtifactKind,
    schemas: HashMap<ArtifactKind, u32>,
    entries: BTreeMap<String, CacheEntry>,
}

impl GraphCacheManager {
    pub fn new(artifact: ArtifactKind) -> Self {
        let mut schemas = HashMap::new();
        schemas.insert(artifact, artifact.current_version());
        Self {
            artifact,
            schemas,
            entries: BTreeMap::new(),
        }
    }

    /// Set the schema version entries of `artifact` must carry to be fresh
    pub fn register_schema(&mut self, artifact: ArtifactKind, version: u32) {
        self.schemas.insert(artifact, version);
    }

    pub fn schema_version(&self) -> u32 {
        self.schemas
            .get(&self.artifact)
            .copied()
            .unwrap_or_else(|| self.artifact.current_version())
    }

    pub fn is_stale(&self, path: &Path) -> bool {
        let Some(entry) = self.entries.get(&key(path)) else {
            return true;
        };
        if entry.schema_version != self.schema_version() {
            return true;
        }
        match file_mtime_ms(path) {
            Ok(mtime) => mtime != entry.mtime,
            Err(_) => true,
        }
    }

    pub fn update_cache(&mut self, path: &Path, mtime: u64) {
        let file_path = key(path);
        let entry = CacheEntry {
            file_path: file_path.clone(),
            mtime,
            schema_version: self.schema_version(),
        };
        self.entries.insert(file_path, entry);
    }

    pub fn evict(&mut self, path: &Path) -> Option<CacheEntry> {
        self.entries.remove(&key(path))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, path: &Path) -> Option<&CacheEntry> {
        self.entries.get(&key(path))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the entries with the ledger at `path`, returning how many were loaded.
    ///
    /// A missing ledger loads nothing; an unreadable or corrupt one is treated the same way.
    pub fn load(&mut self, path: &Path) -> usize {
        self.entries.clear();
        if !path.exists() {
            return 0;
        }

        let entries = fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|data| {
                serde_json::from_slice::<BTreeMap<String, CacheEntry>>(&data)
                    .map_err(|e| e.to_string())
            });
        match entries {
            Ok(entries) => {
                self.entries = entries;
                log::debug!("Loaded {} ledger entries from {}", self.entries.len(), path.display());
            }
            Err(err) => log::warn!("Ignoring corrupt ledger {}: {err}", path.display()),
        }
        self.entries.len()
    }

    /// Write the ledger through a temporary file and rename it into place
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(&self.entries)?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
