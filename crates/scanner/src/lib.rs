//! # Sigscope Scanner
//!
//! Project discovery, parallel parsing and incremental analysis sessions.
//!
//! ## Architecture
//!
//! ```text
//! SignalSession
//!     │
//!     ├──> ProjectScanner
//!     │      ├─ FileDiscovery (ignore::WalkBuilder, .gd only)
//!     │      ├─ GraphCacheManager (mtime ledger, stale filter)
//!     │      └─ worker pool (spawn_blocking chunks, mpsc results)
//!     │
//!     ├──> SignalExtractor (per parsed file)
//!     │
//!     └──> GraphBuilder ──> GraphStore (.sigscope/signal_graph.json)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use sigscope_gdscript::GdScriptProvider;
//! use sigscope_scanner::{ScanMode, SessionOptions, SignalSession};
//! use std::sync::Arc;
//!
//! # async fn run() -> sigscope_scanner::Result<()> {
//! let provider = Arc::new(GdScriptProvider::new());
//! let mut session =
//!     SignalSession::open("my_game".as_ref(), provider, SessionOptions::default()).await?;
//! let outcome = session.analyze(ScanMode::Incremental).await?;
//! println!("{} signals", outcome.graph.metadata.signal_count);
//! # Ok(())
//! # }
//! ```

mod cache;
mod discovery;
mod error;
mod limits;
mod pool;
mod progress;
mod scanner;
mod session;
mod stats;

pub use cache::{file_mtime_ms, ArtifactKind, CacheEntry, GraphCacheManager, LEDGER_FILE};
pub use discovery::{relative_path, FileDiscovery, EXCLUDED_DIRS, ROOT_CACHE_DIRS};
pub use error::{Result, ScanError};
pub use limits::WORKERS_ENV;
pub use progress::{ScanEvent, PROGRESS_INTERVAL};
pub use scanner::{
    FileError, FileErrorKind, ParsedFile, ProjectScanner, ScanMode, ScanOptions, ScanOutcome,
};
pub use session::{AnalysisOutcome, SessionOptions, SignalSession};
pub use stats::ScanStats;
