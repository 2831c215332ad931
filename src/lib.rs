//! # ACDL Registry
//!
//! Registry, discovery, and matching engine for the Agent Capability
//! Description Language (ACDL). Agents publish capability manifests;
//! callers discover agents by multi-dimensional criteria, and submit a
//! task plus requirements to receive ranked matches — and, for composite
//! tasks, an ordered ensemble of agents.
//!
//! The core is synchronous and I/O-free: the validator gates entry into
//! the registry, and discovery/matching are pure reads over a consistent
//! snapshot. The HTTP layer in [`server`] exposes the three operations as
//! JSON endpoints.

pub mod clock;
pub mod config;
pub mod discovery;
pub mod error;
pub mod manifest;
pub mod matching;
pub mod registry;
pub mod server;
pub mod validator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use discovery::{DiscoveryQuery, DiscoveryResponse};
pub use error::RegistryError;
pub use manifest::{AgentManifest, AgentType};
pub use matching::{MatchRequest, MatchResponse, MatchResult};
pub use registry::{Registration, Registry};
pub use validator::{validate, validate_version, ConformanceLevel, ValidationReport};

/// Library version.
pub const VERSION: &str = "0.3.0";
