use crate::types::SignalGraph;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Instant;

/// How a signal fails to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnusedPattern {
    /// Connected somewhere, never emitted
    Orphan,
    /// Emitted somewhere, never connected
    DeadEmitter,
    /// Neither emitted nor connected
    Isolated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnusedSignalReport {
    pub signal_name: String,
    pub pattern: UnusedPattern,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnusedStats {
    pub signals_analyzed: usize,
    pub orphans_found: usize,
    pub dead_emitters_found: usize,
    pub isolated_found: usize,
    pub total_unused: usize,
    pub duration_ms: u64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnusedReport {
    pub reports: Vec<UnusedSignalReport>,
    pub stats: UnusedStats,
}

/// Confidence magnitudes used by the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePolicy {
    pub isolated: f64,
    pub orphan: f64,
    pub dead_emitter: f64,
    /// Subtracted for names starting with `_`
    pub private_penalty: f64,
    /// Subtracted when more than one file or class declares the name
    pub duplicate_penalty: f64,
    /// Subtracted for names with no declaration in the scanned files
    pub undeclared_penalty: f64,
    pub floor: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            isolated: 1.0,
            orphan: 0.95,
            dead_emitter: 0.90,
            private_penalty: 0.15,
            duplicate_penalty: 0.10,
            undeclared_penalty: 0.20,
            floor: 0.50,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DetectorOptions {
    /// Also classify names that are emitted or connected but never declared
    pub include_undeclared: bool,
    pub policy: ConfidencePolicy,
}

/// Classifies declared signals that are never emitted, never connected, or both
#[derive(Debug, Clone, Default)]
pub struct UnusedSignalDetector {
    options: DetectorOptions,
}

impl UnusedSignalDetector {
    pub fn new(options: DetectorOptions) -> Self {
        Self { options }
    }

    pub fn detect_unused(&self, graph: &SignalGraph) -> UnusedReport {
        let started = Instant::now();
        let policy = &self.options.policy;

        let names: Vec<&str> = if self.options.include_undeclared {
            graph.signal_names().into_iter().collect()
        } else {
            graph.definitions.keys().map(String::as_str).collect()
        };

        let mut stats = UnusedStats {
            signals_analyzed: names.len(),
            ..UnusedStats::default()
        };
        let mut reports = Vec::new();

        for name in names {
            let definitions = graph.definitions_of(name).len();
            let emissions = graph.emissions_of(name).len();
            let connections = graph.connections_of(name).len();

            let (pattern, base, mut reason) = match (emissions, connections) {
                (0, 0) => (
                    UnusedPattern::Isolated,
                    policy.isolated,
                    "declared but never emitted or connected".to_string(),
                ),
                (0, n) => (
                    UnusedPattern::Orphan,
                    policy.orphan,
                    format!("connected {n} time(s) but never emitted"),
                ),
                (n, 0) => (
                    UnusedPattern::DeadEmitter,
                    policy.dead_emitter,
                    format!("emitted {n} time(s) but never connected"),
                ),
                _ => continue,
            };

            let confidence = if pattern == UnusedPattern::Isolated {
                base
            } else {
                let mut confidence = base;
                if name.starts_with('_') {
                    confidence -= policy.private_penalty;
                    reason.push_str("; private name");
                }
                if definitions > 1 {
                    confidence -= policy.duplicate_penalty;
                    reason.push_str(&format!("; declared {definitions} times"));
                }
                if definitions == 0 {
                    confidence -= policy.undeclared_penalty;
                    reason.push_str("; no declaration in scanned files");
                }
                round2(confidence.max(policy.floor))
            };

            match pattern {
                UnusedPattern::Orphan => stats.orphans_found += 1,
                UnusedPattern::DeadEmitter => stats.dead_emitters_found += 1,
                UnusedPattern::Isolated => stats.isolated_found += 1,
            }
            reports.push(UnusedSignalReport {
                signal_name: name.to_string(),
                pattern,
                confidence,
                reason,
            });
        }

        reports.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.signal_name.cmp(&b.signal_name))
        });

        stats.total_unused = reports.len();
        stats.avg_confidence = if reports.is_empty() {
            0.0
        } else {
            round2(reports.iter().map(|r| r.confidence).sum::<f64>() / reports.len() as f64)
        };
        stats.duration_ms = started.elapsed().as_millis() as u64;

        log::info!(
            "Unused signals: {} of {} analyzed ({} orphan, {} dead emitter, {} isolated)",
            stats.total_unused,
            stats.signals_analyzed,
            stats.orphans_found,
            stats.dead_emitters_found,
            stats.isolated_found
        );

        UnusedReport { reports, stats }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GraphBuilder;
    use pretty_assertions::assert_eq;
    use sigscope_gdscript::{AstProvider, GdScriptProvider, ScriptTree};

    fn graph(files: &[(&str, &str)]) -> SignalGraph {
        let provider = GdScriptProvider::new();
        let trees: Vec<(&str, ScriptTree)> = files
            .iter()
            .map(|(path, src)| (*path, provider.parse_string(src).unwrap()))
            .collect();
        let forest: Vec<(&str, &ScriptTree)> = trees.iter().map(|(p, t)| (*p, t)).collect();
        GraphBuilder::new().build_full_graph(&forest)
    }

    fn detect(files: &[(&str, &str)]) -> UnusedReport {
        UnusedSignalDetector::default().detect_unused(&graph(files))
    }

    #[test]
    fn connected_but_never_emitted_is_an_orphan() {
        let report = detect(&[
            ("player.gd", "signal health_changed(new_health)\n"),
            (
                "hud.gd",
                "func _ready():\n\tplayer.health_changed.connect(_on_health_changed)\n",
            ),
        ]);

        assert_eq!(report.reports.len(), 1);
        let orphan = &report.reports[0];
        assert_eq!(orphan.signal_name, "health_changed");
        assert_eq!(orphan.pattern, UnusedPattern::Orphan);
        assert!(orphan.confidence >= 0.95);
        assert_eq!(report.stats.orphans_found, 1);
    }

    #[test]
    fn emitted_but_never_connected_is_a_dead_emitter() {
        let report = detect(&[(
            "logger.gd",
            "signal debug_log(message)\n\nfunc log(m):\n\tdebug_log.emit(m)\n",
        )]);

        assert_eq!(report.reports.len(), 1);
        assert_eq!(report.reports[0].pattern, UnusedPattern::DeadEmitter);
        assert!(report.reports[0].confidence >= 0.90);
    }

    #[test]
    fn isolated_is_certain_even_when_private_or_duplicated() {
        let report = detect(&[("a.gd", "signal _quiet\nsignal _quiet\n")]);
        assert_eq!(report.reports[0].pattern, UnusedPattern::Isolated);
        assert_eq!(report.reports[0].confidence, 1.0);
    }

    #[test]
    fn private_and_duplicate_orphans_rank_below_public_ones() {
        let report = detect(&[
            (
                "a.gd",
                "signal public_one\nsignal _private_one\nsignal twice\n",
            ),
            ("b.gd", "signal twice\n"),
            (
                "c.gd",
                "func f():\n\tpublic_one.connect(h)\n\t_private_one.connect(h)\n\ttwice.connect(h)\n",
            ),
        ]);

        let confidence = |name: &str| {
            report
                .reports
                .iter()
                .find(|r| r.signal_name == name)
                .map(|r| r.confidence)
                .unwrap()
        };
        assert_eq!(confidence("public_one"), 0.95);
        assert_eq!(confidence("_private_one"), 0.8);
        assert_eq!(confidence("twice"), 0.85);
        assert_eq!(
            report
                .reports
                .iter()
                .map(|r| r.signal_name.as_str())
                .collect::<Vec<_>>(),
            vec!["public_one", "twice", "_private_one"]
        );
    }

    #[test]
    fn classification_matches_counts() {
        let report = detect(&[(
            "a.gd",
            "signal used\nsignal iso\nsignal orphan\nsignal dead\nfunc f():\n\tused.emit()\n\tused.connect(h)\n\torphan.connect(h)\n\tdead.emit()\n",
        )]);

        let stats = &report.stats;
        assert_eq!(stats.signals_analyzed, 4);
        assert_eq!(stats.total_unused, 3);
        assert_eq!(
            stats.orphans_found + stats.dead_emitters_found + stats.isolated_found,
            stats.total_unused
        );
        assert!(report.reports.iter().all(|r| r.signal_name != "used"));
        assert_eq!(report.reports[0].signal_name, "iso");
        assert_eq!(stats.avg_confidence, round2((1.0 + 0.95 + 0.90) / 3.0));
    }

    #[test]
    fn undeclared_names_only_with_option() {
        let files = [("a.gd", "func f():\n\tbutton.pressed.connect(h)\n\tfoo.emit()\n")];
        assert!(detect(&files).reports.is_empty());

        let detector = UnusedSignalDetector::new(DetectorOptions {
            include_undeclared: true,
            ..DetectorOptions::default()
        });
        let report = detector.detect_unused(&graph(&files));
        assert_eq!(report.stats.signals_analyzed, 2);
        let pressed = report
            .reports
            .iter()
            .find(|r| r.signal_name == "pressed")
            .unwrap();
        assert_eq!(pressed.pattern, UnusedPattern::Orphan);
        assert_eq!(pressed.confidence, 0.75);
    }

    #[test]
    fn five_hundred_signals_classify_within_a_second() {
        let mut src = String::new();
        for i in 0..500 {
            src.push_str(&format!("signal s{i}(value: int)\n"));
        }
        src.push_str("\nfunc wire():\n");
        for i in 0..500 {
            if i % 3 == 0 {
                src.push_str(&format!("\ts{i}.emit({i})\n"));
            }
            if i % 2 == 0 {
                src.push_str(&format!("\ts{i}.connect(_on_s{i})\n"));
            }
        }

        let report = detect(&[("bulk.gd", src.as_str())]);
        let stats = &report.stats;
        assert_eq!(stats.signals_analyzed, 500);
        assert_eq!(stats.isolated_found, 167);
        assert_eq!(stats.orphans_found, 166);
        assert_eq!(stats.dead_emitters_found, 83);
        assert!(stats.duration_ms < 1000, "took {}ms", stats.duration_ms);
    }

    #[test]
    fn empty_graph_has_zero_average() {
        let report = UnusedSignalDetector::default().detect_unused(&SignalGraph::new());
        assert!(report.reports.is_empty());
        assert_eq!(report.stats.avg_confidence, 0.0);
    }
}
