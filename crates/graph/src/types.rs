use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// Version of the persisted graph layout; bump when any fact shape changes
pub const GRAPH_SCHEMA_VERSION: u32 = 1;

/// `signal name(params)` declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalDefinition {
    pub name: String,

    /// Parameter names in declaration order
    pub params: Vec<String>,

    /// Parameter name -> type hint, present only when at least one parameter is typed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_types: Option<BTreeMap<String, String>>,

    /// Project-relative path with forward slashes
    pub file_path: String,
    pub line: usize,

    /// Declaration text as written
    pub source: String,
}

/// Call site that fires a signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEmission {
    pub signal_name: String,
    pub file_path: String,
    pub line: usize,

    /// Receiver expression as written, `self` when implicit
    pub emitter: String,

    /// Argument texts, excluding the signal name of `emit_signal`
    pub args: Vec<String>,
}

/// Call site that subscribes a handler to a signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalConnection {
    pub signal_name: String,
    pub file_path: String,
    pub line: usize,

    /// Object owning the signal, when it can be named without evaluating anything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    pub handler: String,

    /// Normalized flag names (`deferred`, `persist`, `one_shot`, `reference_counted`)
    pub flags: Vec<String>,
    pub is_lambda: bool,
}

/// One fact about a signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SignalFact {
    Definition(SignalDefinition),
    Emission(SignalEmission),
    Connection(SignalConnection),
}

impl SignalFact {
    pub fn signal_name(&self) -> &str {
        match self {
            Self::Definition(d) => &d.name,
            Self::Emission(e) => &e.signal_name,
            Self::Connection(c) => &c.signal_name,
        }
    }

    pub fn file_path(&self) -> &str {
        match self {
            Self::Definition(d) => &d.file_path,
            Self::Emission(e) => &e.file_path,
            Self::Connection(c) => &c.file_path,
        }
    }
}

/// Everything extracted from a single file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSignals {
    pub file_path: String,
    pub definitions: Vec<SignalDefinition>,
    pub emissions: Vec<SignalEmission>,
    pub connections: Vec<SignalConnection>,
}

impl FileSignals {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.emissions.is_empty() && self.connections.is_empty()
    }

    pub fn fact_count(&self) -> usize {
        self.definitions.len() + self.emissions.len() + self.connections.len()
    }

    pub fn push(&mut self, fact: SignalFact) {
        match fact {
            SignalFact::Definition(d) => self.definitions.push(d),
            SignalFact::Emission(e) => self.emissions.push(e),
            SignalFact::Connection(c) => self.connections.push(c),
        }
    }

    pub fn into_facts(self) -> impl Iterator<Item = SignalFact> {
        self.definitions
            .into_iter()
            .map(SignalFact::Definition)
            .chain(self.emissions.into_iter().map(SignalFact::Emission))
            .chain(self.connections.into_iter().map(SignalFact::Connection))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
    pub schema_version: u32,

    /// Build time in unix milliseconds
    pub timestamp: u64,
    pub file_count: usize,

    /// Distinct signal names across definitions, emissions and connections
    pub signal_count: usize,
    pub emission_count: usize,
    pub connection_count: usize,
}

impl Default for GraphMetadata {
    fn default() -> Self {
        Self {
            schema_version: GRAPH_SCHEMA_VERSION,
            timestamp: 0,
            file_count: 0,
            signal_count: 0,
            emission_count: 0,
            connection_count: 0,
        }
    }
}

/// Project-wide signal graph, keyed by signal name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalGraph {
    pub definitions: BTreeMap<String, Vec<SignalDefinition>>,
    pub emissions: BTreeMap<String, Vec<SignalEmission>>,
    pub connections: BTreeMap<String, Vec<SignalConnection>>,
    pub metadata: GraphMetadata,
}

impl SignalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fact to its bucket; collisions keep every fact
    pub fn add_fact(&mut self, fact: SignalFact) {
        match fact {
            SignalFact::Definition(d) => self.definitions.entry(d.name.clone()).or_default().push(d),
            SignalFact::Emission(e) => self
                .emissions
                .entry(e.signal_name.clone())
                .or_default()
                .push(e),
            SignalFact::Connection(c) => self
                .connections
                .entry(c.signal_name.clone())
                .or_default()
                .push(c),
        }
    }

    pub fn definitions_of(&self, name: &str) -> &[SignalDefinition] {
        self.definitions.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn emissions_of(&self, name: &str) -> &[SignalEmission] {
        self.emissions.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn connections_of(&self, name: &str) -> &[SignalConnection] {
        self.connections.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every name that appears in any of the three maps
    pub fn signal_names(&self) -> BTreeSet<&str> {
        self.definitions
            .keys()
            .chain(self.emissions.keys())
            .chain(self.connections.keys())
            .map(String::as_str)
            .collect()
    }

    /// Regroup the facts by the file they came from
    pub fn facts_by_file(&self) -> BTreeMap<String, FileSignals> {
        let mut files: BTreeMap<String, FileSignals> = BTreeMap::new();
        let facts = self
            .definitions
            .values()
            .flatten()
            .cloned()
            .map(SignalFact::Definition)
            .chain(
                self.emissions
                    .values()
                    .flatten()
                    .cloned()
                    .map(SignalFact::Emission),
            )
            .chain(
                self.connections
                    .values()
                    .flatten()
                    .cloned()
                    .map(SignalFact::Connection),
            );
        for fact in facts {
            files
                .entry(fact.file_path().to_string())
                .or_insert_with(|| FileSignals::new(fact.file_path()))
                .push(fact);
        }
        files
    }

    /// Recompute counts and stamp the current time
    pub fn refresh_metadata(&mut self, file_count: usize) {
        self.metadata = GraphMetadata {
            schema_version: GRAPH_SCHEMA_VERSION,
            timestamp: now_ms(),
            file_count,
            signal_count: self.signal_names().len(),
            emission_count: self.emissions.values().map(Vec::len).sum(),
            connection_count: self.connections.values().map(Vec::len).sum(),
        };
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
