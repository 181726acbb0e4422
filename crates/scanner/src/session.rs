use crate::cache::{ArtifactKind, GraphCacheManager, LEDGER_FILE};
use crate::discovery::relative_path;
use crate::error::Result;
use crate::progress::ScanEvent;
use crate::scanner::{resolve_root, FileError, ProjectScanner, ScanMode, ScanOptions};
use crate::stats::ScanStats;
use sigscope_gdscript::AstProvider;
use sigscope_graph::{FileSignals, GraphBuilder, GraphStore, SignalExtractor, SignalGraph, STATE_DIR};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub scan: ScanOptions,

    /// Write the graph and the ledger under `<root>/.sigscope` after every analysis
    pub persist: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            persist: true,
        }
    }
}

#[derive(Debug)]
pub struct AnalysisOutcome {
    pub graph: SignalGraph,
    pub stats: ScanStats,
    pub errors: Vec<FileError>,
}

/// Keeps one project's graph up to date across scans
pub struct SignalSession {
    root: PathBuf,
    scanner: ProjectScanner,
    cache: GraphCacheManager,
    store: GraphStore,
    ledger_path: PathBuf,
    /// Facts per project-relative path
    files: BTreeMap<String, FileSignals>,
    extractor: SignalExtractor,
    builder: GraphBuilder,
    persist: bool,
}

impl SignalSession {
    /// Open `root`, restoring the ledger and graph persisted by an earlier session
    pub async fn open(
        root: &Path,
        provider: Arc<dyn AstProvider>,
        options: SessionOptions,
    ) -> Result<Self> {
        let root = resolve_root(root).await?;
        let store = GraphStore::new(&root);
        let ledger_path = root.join(STATE_DIR).join(LEDGER_FILE);

        let mut cache = GraphCacheManager::new(ArtifactKind::SignalGraph);
        let mut files = BTreeMap::new();
        if options.persist {
            cache.load(&ledger_path);
            match store.load() {
                Some(graph) => {
                    // Files without facts only show up in the ledger
                    for path in cache.paths() {
                        let rel = relative_path(&root, Path::new(path));
                        files.insert(rel.clone(), FileSignals::new(rel));
                    }
                    files.extend(graph.facts_by_file());
                }
                None => cache.clear(),
            }
        }
        log::debug!(
            "Opened session for {} with {} known files",
            root.display(),
            files.len()
        );

        Ok(Self {
            scanner: ProjectScanner::new(provider).with_options(options.scan),
            root,
            cache,
            store,
            ledger_path,
            files,
            extractor: SignalExtractor::new(),
            builder: GraphBuilder::new(),
            persist: options.persist,
        })
    }

    pub fn with_progress(mut self, tx: UnboundedSender<ScanEvent>) -> Self {
        self.scanner = self.scanner.with_progress(tx);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &GraphCacheManager {
        &self.cache
    }

    /// Scan, refresh the facts of every parsed file and rebuild the graph
    pub async fn analyze(&mut self, mode: ScanMode) -> Result<AnalysisOutcome> {
        let outcome = self.scanner.scan(&self.root, mode, &mut self.cache).await?;

        let present: HashSet<&Path> = outcome.discovered.iter().map(PathBuf::as_path).collect();
        let vanished: Vec<PathBuf> = self
            .cache
            .paths()
            .map(PathBuf::from)
            .filter(|path| !present.contains(path.as_path()))
            .collect();
        for path in &vanished {
            self.cache.evict(path);
        }
        let present_rel: HashSet<String> = outcome
            .discovered
            .iter()
            .map(|path| relative_path(&outcome.root, path))
            .collect();
        self.files.retain(|rel, _| present_rel.contains(rel));

        for error in &outcome.errors {
            self.files.remove(&error.relative_path);
            self.cache.evict(&error.path);
        }
        for file in &outcome.files {
            let signals = self.extractor.extract(&file.tree, &file.relative_path);
            self.files.insert(file.relative_path.clone(), signals);
        }

        let graph = self.builder.build_from_files(self.files.values().cloned());

        if self.persist {
            self.store.save(&graph)?;
            self.cache.persist(&self.ledger_path)?;
        }

        Ok(AnalysisOutcome {
            graph,
            stats: outcome.stats,
            errors: outcome.errors,
        })
    }
}
