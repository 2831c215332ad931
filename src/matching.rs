//! Matching engine — task-fitness scoring and ensemble assembly.
//!
//! Given a task description and a requirement set, every registered agent
//! is scored for fitness on four weighted dimensions:
//!
//! - capability overlap (0.4) — required-domain coverage, multiplied by an
//!   operations-overlap factor
//! - performance fit (0.3) — throughput/latency thresholds with linear
//!   falloff for near misses
//! - protocol fit (0.2) — proportional credit for supported protocols
//! - constraint fit (0.1) — budget/deadline/resource satisfiability
//!
//! Agents with zero overlap on the required domains are dropped entirely
//! (hard floor). Each score comes with human-readable reasons for satisfied
//! dimensions and warnings for unmet or marginal ones. For tasks spanning
//! multiple domains that no single agent covers (or whose type implies a
//! multi-phase workflow) an ordered ensemble of distinct agents is
//! assembled, one role per required domain.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::discovery::{latency_credit, mean_or_one, overlap_ratio, throughput_credit, PerformanceFilter};
use crate::manifest::AgentManifest;
use crate::registry::Registration;

const WEIGHT_CAPABILITY: f64 = 0.4;
const WEIGHT_PERFORMANCE: f64 = 0.3;
const WEIGHT_PROTOCOL: f64 = 0.2;
const WEIGHT_CONSTRAINT: f64 = 0.1;

/// How many runners-up the recommendation lists.
const MAX_ALTERNATIVES: usize = 3;

/// A task plus the requirements agents are matched against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchRequest {
    pub task: TaskDescription,
    pub requirements: Requirements,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskDescription {
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    /// Expected task duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_duration: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Requirements {
    pub capabilities: RequiredCapabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequiredCapabilities {
    pub domains: Vec<String>,
    pub operations: Vec<String>,
}

/// Hard resource/budget/deadline bounds on the task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Constraints {
    /// Budget in token/cost units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    /// Maximum memory in megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_memory: Option<f64>,
    /// Maximum CPU cores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cpu: Option<f64>,
}

/// One agent's fitness for the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub agent_id: String,
    /// Normalized fitness in `[0,1]`.
    pub compatibility: f64,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
}

/// One role in a multi-agent ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleMember {
    pub domain: String,
    pub agent_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub primary_agent: Option<String>,
    pub alternative_agents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensemble: Option<Vec<EnsembleMember>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponse {
    pub matches: Vec<MatchResult>,
    pub recommendation: Recommendation,
}

/// Match every active registration against the request.
///
/// Zero candidates is a valid outcome: the response carries an empty match
/// list and a null primary agent, never an error.
pub fn run_match(
    registrations: &[Registration],
    request: &MatchRequest,
    now: DateTime<Utc>,
) -> MatchResponse {
    let mut matches: Vec<MatchResult> = registrations
        .iter()
        .filter_map(|reg| score_agent(&reg.manifest, request, now))
        .collect();

    matches.sort_by(|a, b| {
        b.compatibility
            .partial_cmp(&a.compatibility)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });

    let primary_agent = matches.first().map(|m| m.agent_id.clone());
    let alternative_agents: Vec<String> = matches
        .iter()
        .skip(1)
        .take(MAX_ALTERNATIVES)
        .map(|m| m.agent_id.clone())
        .collect();

    let ensemble = assemble_ensemble(registrations, request, now);

    tracing::debug!(
        candidates = matches.len(),
        primary = ?primary_agent,
        ensemble = ensemble.is_some(),
        "match complete"
    );

    MatchResponse {
        matches,
        recommendation: Recommendation {
            primary_agent,
            alternative_agents,
            ensemble,
        },
    }
}

/// Score one agent. Returns `None` when the agent falls below the hard
/// floor (zero overlap on a non-empty required-domain set).
fn score_agent(
    manifest: &AgentManifest,
    request: &MatchRequest,
    now: DateTime<Utc>,
) -> Option<MatchResult> {
    let required = &request.requirements;
    let mut reasons = Vec::new();
    let mut warnings = Vec::new();

    // Capability overlap
    let agent_domains: Vec<&str> = manifest
        .capabilities
        .domains
        .iter()
        .map(String::as_str)
        .collect();
    let domain_ratio = overlap_ratio(&required.capabilities.domains, &agent_domains);
    if !required.capabilities.domains.is_empty() && domain_ratio == 0.0 {
        return None;
    }

    let op_names = manifest.operation_names();
    let op_ratio = overlap_ratio(&required.capabilities.operations, &op_names);
    let capability = (domain_ratio * op_ratio).clamp(0.0, 1.0);

    if !required.capabilities.domains.is_empty() {
        if domain_ratio >= 1.0 {
            reasons.push("Supports all required domains".to_string());
        } else {
            let missing: Vec<&str> = required
                .capabilities
                .domains
                .iter()
                .filter(|d| !agent_domains.contains(&d.as_str()))
                .map(String::as_str)
                .collect();
            warnings.push(format!("Missing domains: {}", missing.join(", ")));
        }
        for domain in &required.capabilities.domains {
            if manifest.capabilities.specializations.contains_key(domain) {
                reasons.push(format!("Specialized in {}", domain));
            }
        }
    }
    if !required.capabilities.operations.is_empty() && op_ratio < 1.0 {
        let missing: Vec<&str> = required
            .capabilities
            .operations
            .iter()
            .filter(|op| !op_names.contains(&op.as_str()))
            .map(String::as_str)
            .collect();
        warnings.push(format!("Missing operations: {}", missing.join(", ")));
    }

    // Performance fit
    let performance = performance_fit(manifest, required.performance.as_ref(), &mut reasons, &mut warnings);

    // Protocol fit
    let protocol = protocol_fit(manifest, required.protocols.as_deref(), &mut reasons, &mut warnings);

    // Constraint fit
    let constraint = constraint_fit(
        manifest,
        required.constraints.as_ref(),
        &request.task,
        now,
        &mut reasons,
        &mut warnings,
    );

    let compatibility = (WEIGHT_CAPABILITY * capability
        + WEIGHT_PERFORMANCE * performance
        + WEIGHT_PROTOCOL * protocol
        + WEIGHT_CONSTRAINT * constraint)
        .clamp(0.0, 1.0);

    Some(MatchResult {
        agent_id: manifest.agent_id.clone(),
        compatibility,
        reasons,
        warnings,
    })
}

fn performance_fit(
    manifest: &AgentManifest,
    filter: Option<&PerformanceFilter>,
    reasons: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> f64 {
    let Some(filter) = filter else {
        return 1.0;
    };

    let mut credits = Vec::new();
    if let Some(min) = filter.min_throughput {
        let credit = throughput_credit(manifest.throughput_rps(), min);
        if credit < 1.0 {
            warnings.push("Throughput below requested minimum".to_string());
        }
        credits.push(credit);
    }
    if let Some(max) = filter.max_latency_p99 {
        let credit = latency_credit(manifest.latency_p99(), max);
        if credit < 1.0 {
            warnings.push("Latency p99 above requested maximum".to_string());
        }
        credits.push(credit);
    }

    let fit = mean_or_one(&credits);
    if fit >= 1.0 && !credits.is_empty() {
        reasons.push("Meets performance requirements".to_string());
    }
    fit
}

fn protocol_fit(
    manifest: &AgentManifest,
    required: Option<&[String]>,
    reasons: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> f64 {
    let Some(required) = required else {
        return 1.0;
    };
    if required.is_empty() {
        return 1.0;
    }

    let supported = manifest.protocol_names();
    let ratio = overlap_ratio(required, &supported);
    if ratio >= 1.0 {
        if required.iter().any(|p| p == "mcp") {
            reasons.push("Supports required MCP protocol".to_string());
        } else {
            reasons.push("Supports all required protocols".to_string());
        }
    } else {
        for protocol in required {
            if !supported.contains(&protocol.as_str()) {
                warnings.push(format!("Protocol {} not supported", protocol));
            }
        }
    }
    ratio
}

fn constraint_fit(
    manifest: &AgentManifest,
    constraints: Option<&Constraints>,
    task: &TaskDescription,
    now: DateTime<Utc>,
    reasons: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> f64 {
    let Some(constraints) = constraints else {
        return 1.0;
    };

    let mut credit: f64 = 1.0;
    let limits = manifest
        .performance
        .as_ref()
        .and_then(|p| p.limits.as_ref());
    let resource_limits = manifest
        .performance
        .as_ref()
        .and_then(|p| p.resources.as_ref())
        .and_then(|r| r.limits.as_ref());

    if let (Some(budget), Some(max_tokens)) = (
        constraints.budget,
        limits.and_then(|l| l.max_tokens_per_request),
    ) {
        if budget < max_tokens {
            credit *= 0.5;
            warnings.push("May exceed budget constraints".to_string());
        }
    }

    if let Some(deadline) = constraints.deadline {
        let duration = chrono::Duration::seconds(task.expected_duration.unwrap_or(0.0) as i64);
        if now + duration > deadline {
            credit = 0.0;
            warnings.push("Deadline cannot be met".to_string());
        }
    }

    if let (Some(max_memory), Some(memory_mb)) = (
        constraints.max_memory,
        resource_limits.and_then(|r| r.memory_mb),
    ) {
        if memory_mb > max_memory {
            credit *= 0.5;
            warnings.push("Exceeds memory constraints".to_string());
        }
    }

    if let (Some(max_cpu), Some(cpu)) = (constraints.max_cpu, resource_limits.and_then(|r| r.cpu)) {
        if cpu > max_cpu {
            credit *= 0.5;
            warnings.push("Exceeds cpu constraints".to_string());
        }
    }

    if credit >= 1.0 {
        reasons.push("Meets resource constraints".to_string());
    }
    credit.clamp(0.0, 1.0)
}

/// Task types whose name alone implies a multi-phase workflow.
fn implies_phases(task_type: &str) -> bool {
    let lowered = task_type.to_lowercase();
    ["pipeline", "workflow", "composite"]
        .iter()
        .any(|kw| lowered.contains(kw))
}

/// Assemble an ordered ensemble when the task spans multiple domains.
///
/// One role per required domain, preserving the input ordering of domains.
/// Each role takes the highest-scoring agent for that domain alone,
/// preferring agents not yet assigned to an earlier role.
fn assemble_ensemble(
    registrations: &[Registration],
    request: &MatchRequest,
    now: DateTime<Utc>,
) -> Option<Vec<EnsembleMember>> {
    let domains = &request.requirements.capabilities.domains;
    if domains.len() < 2 {
        return None;
    }

    let single_agent_covers_all = registrations.iter().any(|reg| {
        domains
            .iter()
            .all(|d| reg.manifest.capabilities.domains.contains(d))
    });
    if single_agent_covers_all && !implies_phases(&request.task.task_type) {
        return None;
    }

    // Role score: the agent's compatibility when the requirements are
    // narrowed to that single domain.
    let mut role_scores: HashMap<&str, Vec<(f64, &str)>> = HashMap::new();
    for domain in domains {
        let mut narrowed = request.clone();
        narrowed.requirements.capabilities.domains = vec![domain.clone()];
        let mut scored: Vec<(f64, &str)> = registrations
            .iter()
            .filter(|reg| reg.manifest.capabilities.domains.contains(domain))
            .filter_map(|reg| {
                score_agent(&reg.manifest, &narrowed, now)
                    .map(|m| (m.compatibility, reg.manifest.agent_id.as_str()))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });
        role_scores.insert(domain.as_str(), scored);
    }

    let mut members = Vec::new();
    let mut used: Vec<&str> = Vec::new();
    for domain in domains {
        let candidates = role_scores.get(domain.as_str())?;
        // Prefer a distinct agent; reuse the best one only when the registry
        // has nobody else for this role.
        let pick = candidates
            .iter()
            .find(|(_, id)| !used.contains(id))
            .or_else(|| candidates.first())?;
        used.push(pick.1);
        members.push(EnsembleMember {
            domain: domain.clone(),
            agent_id: pick.1.to_string(),
        });
    }

    Some(members)
}
