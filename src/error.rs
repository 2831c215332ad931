//! Error types for the ACDL registry.
//!
//! All errors here are per-request and recoverable; nothing in the core is
//! fatal to the process. The HTTP layer maps `Rejected` to 400, `Conflict`
//! to 409, and `NotFound` to 404.

use thiserror::Error;

use crate::validator::CheckResult;

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Manifest failed validation; carries the full check list so the caller
    /// sees every violation in one response.
    #[error("Manifest validation failed")]
    Rejected { validation_results: Vec<CheckResult> },

    /// An active registration already holds this agentId.
    #[error("Agent already registered: {agent_id}")]
    Conflict { agent_id: String },

    /// No active registration for this agentId.
    #[error("Agent not found: {agent_id}")]
    NotFound { agent_id: String },

    /// A manifest file on disk could not be parsed.
    #[error("Manifest parse error: {0}")]
    Parse(String),

    /// File I/O error while loading manifests.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for RegistryError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
