use crate::types::SignalGraph;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Minimum modularity gain that justifies moving a node
const EPSILON: f64 = 1e-10;

const DEFAULT_MAX_PASSES: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResult {
    pub clusters: BTreeMap<usize, BTreeSet<String>>,
    pub node_to_cluster: BTreeMap<String, usize>,
    pub modularity: f64,
}

/// Greedy modularity clustering over an undirected graph
#[derive(Debug, Clone)]
pub struct CommunityDetector {
    max_passes: usize,
}

impl Default for CommunityDetector {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl CommunityDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Partition `nodes` so that modularity over `edges` is locally maximal.
    ///
    /// Duplicate node ids collapse, self-loops and edges naming unknown nodes are ignored.
    /// Cluster ids are dense and follow the order nodes first appear in.
    pub fn detect_communities(
        &self,
        nodes: &[String],
        edges: &[(String, String)],
    ) -> ClusterResult {
        let mut graph: UnGraph<String, ()> = UnGraph::new_undirected();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for node in nodes {
            if !index.contains_key(node.as_str()) {
                index.insert(node.as_str(), graph.add_node(node.clone()));
            }
        }
        for (from, to) in edges {
            match (index.get(from.as_str()), index.get(to.as_str())) {
                (Some(&a), Some(&b)) if a != b => {
                    graph.add_edge(a, b, ());
                }
                _ => log::trace!("Dropping edge {from} -> {to}"),
            }
        }

        let n = graph.node_count();
        if n == 0 {
            return ClusterResult::default();
        }

        let m = graph.edge_count() as f64;
        if graph.edge_count() == 0 {
            return Self::assemble(&graph, &(0..n).collect::<Vec<_>>(), 0.0);
        }

        // adjacency[v] lists one entry per incident edge
        let adjacency: Vec<Vec<usize>> = graph
            .node_indices()
            .map(|v| {
                graph
                    .edges(v)
                    .map(|e| {
                        let other = if e.source() == v { e.target() } else { e.source() };
                        other.index()
                    })
                    .collect()
            })
            .collect();
        let degree: Vec<f64> = adjacency.iter().map(|adj| adj.len() as f64).collect();

        let two_m = 2.0 * m;
        let mut cluster: Vec<usize> = (0..n).collect();
        let mut cluster_degree = degree.clone();

        for pass in 0..self.max_passes {
            let mut moved = false;

            for v in 0..n {
                let current = cluster[v];
                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for &u in &adjacency[v] {
                    *links.entry(cluster[u]).or_insert(0.0) += 1.0;
                }
                let to_current = links.get(&current).copied().unwrap_or(0.0);
                let deg_v = degree[v];

                let mut best = current;
                let mut best_gain = EPSILON;
                for (&candidate, &to_candidate) in &links {
                    if candidate == current {
                        continue;
                    }
                    let gain = (to_candidate - to_current) / two_m
                        - deg_v
                            * (cluster_degree[candidate] - cluster_degree[current] + deg_v)
                            / (two_m * two_m);
                    if gain > best_gain {
                        best_gain = gain;
                        best = candidate;
                    }
                }

                if best != current {
                    cluster_degree[current] -= deg_v;
                    cluster_degree[best] += deg_v;
                    cluster[v] = best;
                    moved = true;
                }
            }

            if !moved {
                log::debug!("Clustering converged after {} pass(es)", pass + 1);
                break;
            }
        }

        let mut internal = vec![0.0; n];
        for edge in graph.edge_references() {
            let (a, b) = (edge.source().index(), edge.target().index());
            if cluster[a] == cluster[b] {
                internal[cluster[a]] += 1.0;
            }
        }
        let modularity: f64 = (0..n)
            .filter(|&c| cluster_degree[c] > 0.0)
            .map(|c| internal[c] / m - (cluster_degree[c] / two_m).powi(2))
            .sum();

        Self::assemble(&graph, &cluster, modularity)
    }

    fn assemble(
        graph: &UnGraph<String, ()>,
        cluster: &[usize],
        modularity: f64,
    ) -> ClusterResult {
        let mut dense: HashMap<usize, usize> = HashMap::new();
        let mut result = ClusterResult {
            modularity,
            ..ClusterResult::default()
        };
        for v in graph.node_indices() {
            let next = dense.len();
            let id = *dense.entry(cluster[v.index()]).or_insert(next);
            let name = graph[v].clone();
            result.clusters.entry(id).or_default().insert(name.clone());
            result.node_to_cluster.insert(name, id);
        }
        result
    }
}

/// File-level view of the signal graph used for clustering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTopology {
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String)>,
}

/// Files taking part in any signal, linked when one defines or emits a signal another connects to
pub fn file_topology(graph: &SignalGraph) -> FileTopology {
    let mut nodes: BTreeSet<&str> = BTreeSet::new();
    let mut edges: BTreeSet<(&str, &str)> = BTreeSet::new();

    for name in graph.signal_names() {
        let producers: BTreeSet<&str> = graph
            .definitions_of(name)
            .iter()
            .map(|d| d.file_path.as_str())
            .chain(graph.emissions_of(name).iter().map(|e| e.file_path.as_str()))
            .collect();
        let consumers: BTreeSet<&str> = graph
            .connections_of(name)
            .iter()
            .map(|c| c.file_path.as_str())
            .collect();

        nodes.extend(producers.iter().copied());
        nodes.extend(consumers.iter().copied());

        for &producer in &producers {
            for &consumer in &consumers {
                if producer != consumer {
                    edges.insert((producer.min(consumer), producer.max(consumer)));
                }
            }
        }
    }

    FileTopology {
        nodes: nodes.into_iter().map(str::to_string).collect(),
        edges: edges
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect(),
    }
}
