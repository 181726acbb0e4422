//! # Sigscope Graph
//!
//! Cross-file signal graph for GDScript projects, plus the analyses built on top of it.
//!
//! ## Features
//!
//! - **Fact extraction** - signal declarations, emissions and connections per file
//! - **Graph building** - per-file facts folded into one name-keyed graph
//! - **Unused signals** - orphan, dead emitter and isolated signals with confidence scores
//! - **Clustering** - greedy modularity communities over the file topology
//!
//! ## Architecture
//!
//! ```text
//! ScriptTree (per file)
//!     │
//!     ├──> Signal Extractor
//!     │      ├─ signal declarations (with parameter types)
//!     │      ├─ emit() / emit_signal()
//!     │      └─ connect() in every historical form
//!     │
//!     ├──> Graph Builder
//!     │      └─ SignalGraph { definitions, emissions, connections, metadata }
//!     │
//!     ├──> Unused Signal Detector
//!     │      └─ Orphan / DeadEmitter / Isolated + confidence
//!     │
//!     └──> Community Detector (petgraph)
//!            └─ file clusters + modularity
//! ```

mod builder;
mod community;
mod error;
mod extractor;
mod store;
mod types;
mod unused;

pub use builder::GraphBuilder;
pub use community::{file_topology, ClusterResult, CommunityDetector, FileTopology};
pub use error::{GraphError, Result};
pub use extractor::SignalExtractor;
pub use store::{GraphStore, GRAPH_FILE, STATE_DIR};
pub use types::{
    FileSignals, GraphMetadata, SignalConnection, SignalDefinition, SignalEmission, SignalFact,
    SignalGraph, GRAPH_SCHEMA_VERSION,
};
pub use unused::{
    ConfidencePolicy, DetectorOptions, UnusedPattern, UnusedReport, UnusedSignalDetector,
    UnusedSignalReport, UnusedStats,
};
