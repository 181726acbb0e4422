use serde::Serialize;
use sigscope_graph::{ClusterResult, GraphMetadata, UnusedPattern, UnusedReport};
use sigscope_scanner::{FileError, ScanStats};

/// JSON body of `sigscope scan --json`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutput<'a> {
    pub stats: &'a ScanStats,
    pub graph: &'a GraphMetadata,
    pub errors: &'a [FileError],
}

pub fn render_scan(stats: &ScanStats, graph: &GraphMetadata, errors: &[FileError]) -> String {
    let mut out = format!(
        "Scanned {} files ({} parsed, {} unchanged, {} failed) in {}ms\n",
        stats.files_discovered,
        stats.files_parsed,
        stats.files_skipped,
        stats.files_failed,
        stats.duration_ms
    );
    out.push_str(&format!(
        "Graph: {} signals, {} emissions, {} connections across {} files\n",
        graph.signal_count, graph.emission_count, graph.connection_count, graph.file_count
    ));
    for error in errors {
        out.push_str(&format!(
            "  skipped {} ({:?}): {}\n",
            error.relative_path, error.kind, error.message
        ));
    }
    out
}

fn pattern_label(pattern: UnusedPattern) -> &'static str {
    match pattern {
        UnusedPattern::Orphan => "orphan",
        UnusedPattern::DeadEmitter => "dead-emitter",
        UnusedPattern::Isolated => "isolated",
    }
}

pub fn render_unused(report: &UnusedReport) -> String {
    if report.reports.is_empty() {
        return format!(
            "No unused signals among {} analyzed\n",
            report.stats.signals_analyzed
        );
    }

    let width = report
        .reports
        .iter()
        .map(|r| r.signal_name.len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for entry in &report.reports {
        out.push_str(&format!(
            "{:<12} {:<width$}  {:.2}  {}\n",
            pattern_label(entry.pattern),
            entry.signal_name,
            entry.confidence,
            entry.reason
        ));
    }
    out.push_str(&format!(
        "\n{} unused of {} signals ({} orphan, {} dead emitter, {} isolated)\n",
        report.stats.total_unused,
        report.stats.signals_analyzed,
        report.stats.orphans_found,
        report.stats.dead_emitters_found,
        report.stats.isolated_found
    ));
    out
}

pub fn render_clusters(result: &ClusterResult) -> String {
    let mut out = String::new();
    for (id, members) in &result.clusters {
        out.push_str(&format!("Cluster {id} ({} files)\n", members.len()));
        for member in members {
            out.push_str(&format!("  {member}\n"));
        }
    }
    out.push_str(&format!("Modularity: {:.3}\n", result.modularity));
    out
}
