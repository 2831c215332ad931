//! ACDL manifest data model.
//!
//! An [`AgentManifest`] is one agent version's capability declaration: its
//! identity, type, domains, operations, protocols, and performance profile.
//! The wire format is camelCase JSON (or YAML for manifests on disk).
//!
//! Every structural field carries `#[serde(default)]` so any well-formed JSON
//! document deserializes into a manifest; the validator then reports *all*
//! violations in a single pass instead of the first parse failure.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fixed set of agent archetypes an ACDL manifest may declare.
///
/// `Unknown` captures any string outside the enumeration so deserialization
/// never fails on a bad `agentType`; the validator turns it into a structured
/// enum violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Orchestrator,
    Worker,
    Critic,
    Judge,
    Trainer,
    Governor,
    Monitor,
    Integrator,
    #[serde(other)]
    Unknown,
}

impl Default for AgentType {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Orchestrator => "orchestrator",
            Self::Worker => "worker",
            Self::Critic => "critic",
            Self::Judge => "judge",
            Self::Trainer => "trainer",
            Self::Governor => "governor",
            Self::Monitor => "monitor",
            Self::Integrator => "integrator",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AgentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orchestrator" => Ok(Self::Orchestrator),
            "worker" => Ok(Self::Worker),
            "critic" => Ok(Self::Critic),
            "judge" => Ok(Self::Judge),
            "trainer" => Ok(Self::Trainer),
            "governor" => Ok(Self::Governor),
            "monitor" => Ok(Self::Monitor),
            "integrator" => Ok(Self::Integrator),
            _ => Err(()),
        }
    }
}

/// One agent version's capability declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentManifest {
    /// Globally unique id, `<name>-v<MAJOR>.<MINOR>.<PATCH>`.
    pub agent_id: String,
    /// Archetype from the fixed enumeration.
    pub agent_type: AgentType,
    /// Conventionally `"<agentType>.<specialization>"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_sub_type: Option<String>,
    /// Strict semantic version; pre-release/build suffixes permitted.
    pub version: String,
    pub capabilities: Capabilities,
    pub protocols: Protocols,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<Performance>,
    /// Free-form descriptive fields; never consulted by matching logic.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl AgentManifest {
    /// Names of all declared operations, in declaration order.
    pub fn operation_names(&self) -> Vec<&str> {
        self.capabilities
            .operations
            .iter()
            .map(|op| op.name.as_str())
            .collect()
    }

    /// Names of all supported protocols.
    pub fn protocol_names(&self) -> Vec<&str> {
        self.protocols
            .supported
            .iter()
            .map(|p| p.name.as_str())
            .collect()
    }

    /// The protocol entry with the given name, if declared.
    pub fn protocol(&self, name: &str) -> Option<&ProtocolEntry> {
        self.protocols.supported.iter().find(|p| p.name == name)
    }

    /// Declared requests-per-second throughput, if present.
    pub fn throughput_rps(&self) -> Option<f64> {
        self.performance
            .as_ref()?
            .throughput
            .as_ref()?
            .requests_per_second
    }

    /// Declared p99 latency in milliseconds, if present.
    pub fn latency_p99(&self) -> Option<f64> {
        self.performance.as_ref()?.latency.as_ref()?.p99
    }
}

/// What the agent can do: domains, operations, and per-domain specializations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
    /// Domain tags, e.g. `"documentation"`, `"api-design"`. Must be non-empty.
    pub domains: Vec<String>,
    pub operations: Vec<Operation>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub specializations: HashMap<String, Specialization>,
    // Conformance-tier flags (silver/gold criteria).
    pub feedback_loop: bool,
    pub budget_management: bool,
    pub audit_logging: bool,
    pub props_tokens: bool,
    pub learning_signals: bool,
    pub workspace_management: bool,
}

/// A named operation with optional input/output schema references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Operation {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<String>,
}

/// Versions and features an agent supports within one domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Specialization {
    pub versions: Vec<String>,
    pub features: Vec<String>,
}

/// Protocols the agent speaks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Protocols {
    pub supported: Vec<ProtocolEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred: Option<String>,
}

/// One supported protocol binding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolEntry {
    pub name: String,
    pub version: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
}

/// Authentication scheme for a protocol endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Authentication {
    #[serde(rename = "type")]
    pub auth_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

/// Declared performance envelope. All leaves are optional so a minimal
/// manifest may ship empty `throughput`/`latency` objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Performance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<Throughput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<Latency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<Limits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Throughput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<f64>,
}

/// Latency percentiles in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Latency {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99: Option<f64>,
}

impl Latency {
    /// True when all three percentiles are declared.
    pub fn is_complete(&self) -> bool {
        self.p50.is_some() && self.p95.is_some() && self.p99.is_some()
    }
}

/// Hard limits the agent enforces on its own requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Limits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_payload_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens_per_request: Option<u64>,
}

/// Requested and maximum cpu/memory for running the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceSpec {
    /// CPU cores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    /// Memory in megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
}
