use crate::error::{GraphError, Result};
use crate::types::{SignalGraph, GRAPH_SCHEMA_VERSION};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory under the project root holding every persisted artifact
pub const STATE_DIR: &str = ".sigscope";

pub const GRAPH_FILE: &str = "signal_graph.json";

/// Persists the signal graph of one project as JSON
#[derive(Debug, Clone)]
pub struct GraphStore {
    path: PathBuf,
}

impl GraphStore {
    pub fn new(project_root: &Path) -> Self {
        Self {
            path: project_root.join(STATE_DIR).join(GRAPH_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted graph.
    ///
    /// A missing, unreadable, corrupt or outdated file yields `None` and is left as it is; the
    /// next [`save`](Self::save) replaces it.
    pub fn load(&self) -> Option<SignalGraph> {
        if !self.path.exists() {
            debug!("No signal graph at {}", self.path.display());
            return None;
        }

        match self.read() {
            Ok(graph) => Some(graph),
            Err(GraphError::SchemaMismatch { found, expected }) => {
                debug!(
                    "Signal graph schema mismatch (cache={found}, current={expected}), forcing rebuild"
                );
                None
            }
            Err(err) => {
                warn!("Signal graph {} unusable: {err}", self.path.display());
                None
            }
        }
    }

    fn read(&self) -> Result<SignalGraph> {
        let data = fs::read(&self.path)?;

        // Check the version before the full decode so older layouts are reported as such
        let value: serde_json::Value = serde_json::from_slice(&data)?;
        let found = value
            .pointer("/metadata/schemaVersion")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;
        if found != GRAPH_SCHEMA_VERSION {
            return Err(GraphError::SchemaMismatch {
                found,
                expected: GRAPH_SCHEMA_VERSION,
            });
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Write the graph through a temporary file and rename it into place
    pub fn save(&self, graph: &SignalGraph) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(graph)?;
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;

        debug!("Saved signal graph to {}", self.path.display());
        Ok(())
    }
}
