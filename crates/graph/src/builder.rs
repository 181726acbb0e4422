use crate::extractor::SignalExtractor;
use crate::types::{FileSignals, SignalGraph};
use sigscope_gdscript::ScriptTree;

/// Folds per-file facts into one project graph
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    extractor: SignalExtractor,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract every tree of the forest and fold the results.
    ///
    /// Paths are the project-relative names stored on each fact.
    pub fn build_full_graph<P: AsRef<str>>(&self, forest: &[(P, &ScriptTree)]) -> SignalGraph {
        let files = forest
            .iter()
            .map(|(path, tree)| self.extractor.extract(tree, path.as_ref()));
        self.build_from_files(files)
    }

    /// Fold already extracted files; input is sorted by path first so buckets come out in the
    /// same order no matter how the files were scanned
    pub fn build_from_files(&self, files: impl IntoIterator<Item = FileSignals>) -> SignalGraph {
        let mut files: Vec<FileSignals> = files.into_iter().collect();
        files.sort_by(|a, b| a.file_path.cmp(&b.file_path));

        let file_count = files.len();
        let mut graph = SignalGraph::new();
        for file in files {
            for fact in file.into_facts() {
                graph.add_fact(fact);
            }
        }
        graph.refresh_metadata(file_count);

        log::info!(
            "Built signal graph: {} files, {} signals, {} emissions, {} connections",
            graph.metadata.file_count,
            graph.metadata.signal_count,
            graph.metadata.emission_count,
            graph.metadata.connection_count
        );

        graph
    }
}
