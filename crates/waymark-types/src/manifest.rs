//! Execution manifest domain types for Waymark.
//!
//! Defines the canonical in-memory representation of an execution manifest:
//! both document forms (YAML and JSON) decode to and encode from
//! `ExecutionManifest`. A manifest is a typed dependency graph of
//! `ManifestNode`s plus the constraints and policies that apply to the whole
//! unit of work.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Oldest manifest schema version this crate understands.
///
/// Documents without a `version` field are treated as this version.
pub const OLDEST_SUPPORTED_VERSION: &str = "1.0";

/// Schema version written by this crate.
pub const CURRENT_SCHEMA_VERSION: &str = "1.1";

/// Open string-keyed map of opaque values (metadata, constraints).
pub type OpenMap = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Execution Manifest (aggregate root)
// ---------------------------------------------------------------------------

/// A complete description of one unit of orchestrated work.
///
/// Treated as immutable once validated: edits produce a new value so that any
/// cached graph analysis stays consistent with the manifest it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionManifest {
    /// Schema version of the document this manifest was decoded from.
    #[serde(default = "default_schema_version", deserialize_with = "null_as_default_version")]
    pub version: String,
    /// Identifier of the planning iteration that produced this manifest.
    #[serde(default, deserialize_with = "null_as_default")]
    pub iteration_id: String,
    /// Creation time, normally RFC 3339. Kept verbatim.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    /// Project this manifest belongs to.
    #[serde(default, deserialize_with = "null_as_default")]
    pub project: String,
    /// Free-form policy inputs (e.g. `runtime`, `security_standard`).
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: OpenMap,
    /// Named policies with their enforcement severity, in declaration order.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<Policy>,
    /// Ordered list of nodes forming the dependency graph.
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<ManifestNode>,
}

impl ExecutionManifest {
    /// Start building a manifest for `project`.
    pub fn builder(project: impl Into<String>) -> ManifestBuilder {
        ManifestBuilder::new(project)
    }

    /// Find the first node with the given id.
    pub fn node(&self, id: &str) -> Option<&ManifestNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Node ids in manifest order (duplicates included).
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.id.as_str())
    }

    /// Parse `timestamp` as RFC 3339. Returns `None` if it is not a valid
    /// RFC 3339 timestamp; the stored string is never rewritten.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// JSON Schema describing the manifest document shape.
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(ExecutionManifest);
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }
}

fn default_schema_version() -> String {
    OLDEST_SUPPORTED_VERSION.to_string()
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_schema_version))
}

// ---------------------------------------------------------------------------
// Manifest Node
// ---------------------------------------------------------------------------

/// One schedulable unit of work in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestNode {
    /// Node ID, unique within a manifest (e.g. "BE.AuthService").
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// The kind of node.
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    #[schemars(with = "String")]
    pub node_type: NodeType,
    /// Capability tag used by an external matcher (e.g. "Backend:Python:FastAPI").
    #[serde(default, deserialize_with = "null_as_default")]
    pub capability: String,
    /// Node IDs this node depends on (DAG edges). Duplicates are ignored by analysis.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Declared artifact names.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    /// Quality gate names, run by an external gate executor.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<String>,
    /// Effort points. Must not be negative when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_effort: Option<i64>,
    /// Extension fields, passed through untouched.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: OpenMap,
}

impl ManifestNode {
    /// Create a node with no dependencies, outputs, gates or effort.
    pub fn new(id: impl Into<String>, node_type: NodeType, capability: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            capability: capability.into(),
            depends_on: Vec::new(),
            outputs: Vec::new(),
            gates: Vec::new(),
            estimated_effort: None,
            metadata: OpenMap::new(),
        }
    }

    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_gates<I, S>(mut self, gates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gates = gates.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_effort(mut self, effort: i64) -> Self {
        self.estimated_effort = Some(effort);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Dependencies with duplicates removed, in first-occurrence order.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        let mut seen = HashSet::with_capacity(self.depends_on.len());
        self.depends_on
            .iter()
            .map(String::as_str)
            .filter(move |dep| seen.insert(*dep))
    }

    /// Effort used for aggregation: absent counts as 0, and so does a
    /// negative value (which validation rejects anyway).
    pub fn effort_points(&self) -> u64 {
        self.estimated_effort
            .map(|e| u64::try_from(e).unwrap_or(0))
            .unwrap_or(0)
    }
}

/// The kind of node in a manifest.
///
/// Tags outside the known set are kept as `Unknown` so that documents written
/// for newer node kinds still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    #[default]
    Action,
    Phase,
    Checkpoint,
    Notification,
    Interface,
    Implementation,
    Unknown(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Action => "action",
            Self::Phase => "phase",
            Self::Checkpoint => "checkpoint",
            Self::Notification => "notification",
            Self::Interface => "interface",
            Self::Implementation => "implementation",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for NodeType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "action" => Self::Action,
            "phase" => Self::Phase,
            "checkpoint" => Self::Checkpoint,
            "notification" => Self::Notification,
            "interface" => Self::Interface,
            "implementation" => Self::Implementation,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<NodeType> for String {
    fn from(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// A named policy and how strictly it is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Policy {
    pub id: String,
    #[schemars(with = "String")]
    pub severity: Severity,
}

impl Policy {
    pub fn new(id: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            severity,
        }
    }
}

/// Enforcement severity of a policy, consumed by external enforcement logic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Blocking,
    Warning,
    Info,
    Unknown(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Blocking => "blocking",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for Severity {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "blocking" => Self::Blocking,
            "warning" => Self::Warning,
            "info" => Self::Info,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles an `ExecutionManifest` in memory.
///
/// Defaults: a fresh UUIDv7 iteration id, the current UTC time as timestamp,
/// and the current schema version.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    manifest: ExecutionManifest,
}

impl ManifestBuilder {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            manifest: ExecutionManifest {
                version: CURRENT_SCHEMA_VERSION.to_string(),
                iteration_id: Uuid::now_v7().to_string(),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                project: project.into(),
                constraints: OpenMap::new(),
                policies: Vec::new(),
                nodes: Vec::new(),
            },
        }
    }

    pub fn iteration_id(mut self, id: impl Into<String>) -> Self {
        self.manifest.iteration_id = id.into();
        self
    }

    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.manifest.timestamp = timestamp.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.manifest.version = version.into();
        self
    }

    pub fn node(mut self, node: ManifestNode) -> Self {
        self.manifest.nodes.push(node);
        self
    }

    pub fn nodes(mut self, nodes: impl IntoIterator<Item = ManifestNode>) -> Self {
        self.manifest.nodes.extend(nodes);
        self
    }

    pub fn constraint(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.manifest.constraints.insert(key.into(), value);
        self
    }

    pub fn policy(mut self, id: impl Into<String>, severity: Severity) -> Self {
        self.manifest.policies.push(Policy::new(id, severity));
        self
    }

    pub fn build(self) -> ExecutionManifest {
        self.manifest
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
