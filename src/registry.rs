//! Agent registry — the one shared, mutable store in the system.
//!
//! Registration is the only write path. It validates the manifest, then
//! performs an atomic insert-if-absent keyed by `agentId` through the
//! DashMap entry API, so exactly one of N concurrent identical calls wins
//! and the rest receive a conflict. There is no update or delete: a
//! registration is immutable once created and disappears lazily when its
//! TTL passes (reads filter expired entries; no background eviction).
//!
//! Manifests can also be seeded from `.yaml`/`.yml`/`.json` files on disk,
//! the way generator tooling drops them next to the service.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::RegistryError;
use crate::manifest::AgentManifest;
use crate::validator::{self, CheckResult, ConformanceLevel};

/// Default registration TTL.
pub const DEFAULT_TTL_SECS: i64 = 600;

/// Registration lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Registered,
    Pending,
    Rejected,
}

/// A manifest accepted into the registry, plus registry-assigned fields.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub registration_id: Uuid,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub conformance_level: ConformanceLevel,
    pub validation_results: Vec<CheckResult>,
    pub manifest: AgentManifest,
}

impl Registration {
    /// Whether this registration is still active at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }

    pub fn agent_id(&self) -> &str {
        &self.manifest.agent_id
    }
}

/// Durable map of agent identity to manifest + metadata.
pub struct Registry {
    entries: DashMap<String, Registration>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl Registry {
    /// Registry with the default TTL and the system clock.
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Validate and register a manifest.
    ///
    /// Returns `Rejected` with the full check list on any validation error,
    /// or `Conflict` when an active registration already holds the agentId.
    /// The insert is atomic per key: under concurrent identical calls exactly
    /// one caller receives the new registration.
    pub fn register(&self, manifest: AgentManifest) -> Result<Registration, RegistryError> {
        let report = validator::validate(&manifest);
        if !report.is_valid() {
            tracing::debug!(
                agent_id = %manifest.agent_id,
                errors = report.errors.len(),
                "manifest rejected by validator"
            );
            return Err(RegistryError::Rejected {
                validation_results: report.checks,
            });
        }

        let now = self.clock.now();
        let registration = Registration {
            registration_id: Uuid::new_v4(),
            status: RegistrationStatus::Registered,
            registered_at: now,
            expires_at: now + self.ttl,
            conformance_level: validator::conformance_level(&manifest),
            validation_results: report.checks,
            manifest,
        };

        let agent_id = registration.agent_id().to_string();
        match self.entries.entry(agent_id.clone()) {
            Entry::Occupied(mut occupied) => {
                // An expired holder of this id no longer counts as registered.
                if occupied.get().is_active(now) {
                    return Err(RegistryError::Conflict { agent_id });
                }
                occupied.insert(registration.clone());
                tracing::info!(agent_id = %agent_id, "re-registered after expiry");
                Ok(registration)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(registration.clone());
                tracing::info!(
                    agent_id = %agent_id,
                    conformance = %registration.conformance_level,
                    "agent registered"
                );
                Ok(registration)
            }
        }
    }

    /// Consistent copy of every active registration; discovery and matching
    /// read from this snapshot so a registration committing mid-query never
    /// produces a torn read.
    pub fn snapshot(&self) -> Vec<Registration> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| entry.value().is_active(now))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// The current time as seen by the registry's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Number of entries, expired included (expiry is lazy).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a manifest from a YAML or JSON file.
    pub fn register_from_file(&self, path: &Path) -> Result<Registration, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        let manifest: AgentManifest = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            other => {
                return Err(RegistryError::Parse(format!(
                    "unsupported manifest extension: {:?}",
                    other
                )))
            }
        };
        self.register(manifest)
    }

    /// Seed the registry from every manifest file in a directory (recursive).
    /// Bad files are logged and skipped; returns the number registered.
    pub fn load_directory(&self, dir: &Path) -> Result<usize, RegistryError> {
        let mut count = 0;
        if !dir.exists() {
            return Ok(0);
        }

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                count += self.load_directory(&path)?;
            } else if path.extension().map_or(false, |ext| {
                ext == "yaml" || ext == "yml" || ext == "json"
            }) {
                match self.register_from_file(&path) {
                    Ok(_) => count += 1,
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "skipping manifest file"
                        );
                    }
                }
            }
        }

        Ok(count)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
