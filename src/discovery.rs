//! Discovery engine — multi-criteria queries over the registry.
//!
//! All filters are conjunctive: an agent is a candidate only when it
//! satisfies every supplied filter, and within `domains`/`operations` it
//! must satisfy *all* listed items. Candidates are scored into `[0,1]`,
//! sorted (default: score descending, agentId ascending on ties), and
//! paginated. An empty result set is a successful response, never an error.
//!
//! The scoring primitives here ([`overlap_ratio`], [`throughput_credit`],
//! [`latency_credit`]) are shared with the matching engine.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manifest::{AgentManifest, AgentType, Specialization};
use crate::registry::Registration;

/// Optional, conjunctive discovery filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveryQuery {
    pub domains: Option<Vec<String>>,
    pub operations: Option<Vec<String>>,
    pub protocols: Option<Vec<String>>,
    pub agent_type: Option<AgentType>,
    pub performance: Option<PerformanceFilter>,
    pub specializations: Option<HashMap<String, Specialization>>,
    /// Required `authentication.type` on the agent's `rest` protocol entry.
    pub authentication: Option<String>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
    pub pagination: Option<Pagination>,
}

/// Performance thresholds a candidate must meet.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceFilter {
    pub min_throughput: Option<f64>,
    pub max_latency_p99: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    Score,
    AgentId,
    RegisteredAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// One scored discovery hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredAgent {
    pub agent_id: String,
    pub manifest: AgentManifest,
    pub score: f64,
    pub registered_at: DateTime<Utc>,
}

/// Discovery response: scored hits, pre-pagination count, scan time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    pub agents: Vec<DiscoveredAgent>,
    pub total_found: usize,
    /// Wall-clock milliseconds for the scan + score + sort.
    pub query_time: u64,
}

/// Run a discovery query over a registry snapshot.
pub fn discover(registrations: &[Registration], query: &DiscoveryQuery) -> DiscoveryResponse {
    let started = Instant::now();

    let mut candidates: Vec<DiscoveredAgent> = registrations
        .iter()
        .filter(|reg| matches_query(&reg.manifest, query))
        .map(|reg| DiscoveredAgent {
            agent_id: reg.manifest.agent_id.clone(),
            score: score_candidate(&reg.manifest, query),
            manifest: reg.manifest.clone(),
            registered_at: reg.registered_at,
        })
        .collect();

    let total_found = candidates.len();
    sort_candidates(&mut candidates, query);

    let pagination = query.pagination.unwrap_or_default();
    let agents: Vec<DiscoveredAgent> = candidates
        .into_iter()
        .skip(pagination.offset)
        .take(pagination.limit)
        .collect();

    let query_time = started.elapsed().as_millis() as u64;
    tracing::debug!(total_found, query_time, "discovery query complete");

    DiscoveryResponse {
        agents,
        total_found,
        query_time,
    }
}

/// Whether the manifest satisfies every supplied filter.
fn matches_query(manifest: &AgentManifest, query: &DiscoveryQuery) -> bool {
    if let Some(domains) = &query.domains {
        if !domains
            .iter()
            .all(|d| manifest.capabilities.domains.contains(d))
        {
            return false;
        }
    }

    if let Some(operations) = &query.operations {
        let names = manifest.operation_names();
        if !operations.iter().all(|op| names.contains(&op.as_str())) {
            return false;
        }
    }

    if let Some(protocols) = &query.protocols {
        let names = manifest.protocol_names();
        if !protocols.iter().all(|p| names.contains(&p.as_str())) {
            return false;
        }
    }

    if let Some(agent_type) = query.agent_type {
        if manifest.agent_type != agent_type {
            return false;
        }
    }

    if let Some(perf) = &query.performance {
        if let Some(min) = perf.min_throughput {
            match manifest.throughput_rps() {
                Some(rps) if rps >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = perf.max_latency_p99 {
            match manifest.latency_p99() {
                Some(p99) if p99 <= max => {}
                _ => return false,
            }
        }
    }

    if let Some(specializations) = &query.specializations {
        for (domain, wanted) in specializations {
            match manifest.capabilities.specializations.get(domain) {
                Some(have) => {
                    if !wanted.versions.iter().all(|v| have.versions.contains(v))
                        || !wanted.features.iter().all(|f| have.features.contains(f))
                    {
                        return false;
                    }
                }
                None => return false,
            }
        }
    }

    if let Some(auth) = &query.authentication {
        let rest_auth = manifest
            .protocol("rest")
            .and_then(|p| p.authentication.as_ref())
            .map(|a| a.auth_type.as_str());
        if rest_auth != Some(auth.as_str()) {
            return false;
        }
    }

    true
}

/// Score a candidate that already passed the filters.
///
/// Ranks by specificity: an agent whose declared surface is close to what
/// the query asked for outranks a kitchen-sink agent that merely includes
/// it. Weights mirror the matching engine's 0.4/0.3/0.2/0.1 split.
fn score_candidate(manifest: &AgentManifest, query: &DiscoveryQuery) -> f64 {
    let domain_focus = focus(
        query.domains.as_deref(),
        manifest.capabilities.domains.len(),
    );
    let op_focus = focus(
        query.operations.as_deref(),
        manifest.capabilities.operations.len(),
    );
    let capability = domain_focus * op_focus;

    let performance = query
        .performance
        .map(|perf| {
            let mut credits = Vec::new();
            if let Some(min) = perf.min_throughput {
                credits.push(throughput_credit(manifest.throughput_rps(), min));
            }
            if let Some(max) = perf.max_latency_p99 {
                credits.push(latency_credit(manifest.latency_p99(), max));
            }
            mean_or_one(&credits)
        })
        .unwrap_or(1.0);

    let protocol = focus(
        query.protocols.as_deref(),
        manifest.protocols.supported.len(),
    );

    let score = 0.4 * capability + 0.3 * performance + 0.2 * protocol + 0.1;
    score.clamp(0.0, 1.0)
}

/// Requested-count over declared-count, in `(0,1]`. Vacuous filters score 1.
fn focus(requested: Option<&[String]>, declared: usize) -> f64 {
    match requested {
        Some(items) if !items.is_empty() && declared > 0 => {
            (items.len() as f64 / declared as f64).min(1.0)
        }
        _ => 1.0,
    }
}

fn sort_candidates(candidates: &mut [DiscoveredAgent], query: &DiscoveryQuery) {
    let sort_by = query.sort_by.unwrap_or(SortBy::Score);
    let default_order = match sort_by {
        SortBy::Score => SortOrder::Desc,
        SortBy::AgentId | SortBy::RegisteredAt => SortOrder::Asc,
    };
    let order = query.sort_order.unwrap_or(default_order);

    candidates.sort_by(|a, b| {
        let primary = match sort_by {
            SortBy::Score => a
                .score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal),
            SortBy::AgentId => a.agent_id.cmp(&b.agent_id),
            SortBy::RegisteredAt => a.registered_at.cmp(&b.registered_at),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        // agentId ascending breaks ties for determinism.
        primary.then_with(|| a.agent_id.cmp(&b.agent_id))
    });
}

// ---------------------------------------------------------------------------
// Scoring primitives shared with the matching engine
// ---------------------------------------------------------------------------

/// Fraction of `required` items present in `available`; 1.0 when nothing is
/// required.
pub(crate) fn overlap_ratio(required: &[String], available: &[&str]) -> f64 {
    if required.is_empty() {
        return 1.0;
    }
    let hits = required
        .iter()
        .filter(|item| available.contains(&item.as_str()))
        .count();
    hits as f64 / required.len() as f64
}

/// Linear-falloff credit for a throughput floor. A missing figure earns 0.
pub(crate) fn throughput_credit(rps: Option<f64>, min: f64) -> f64 {
    match rps {
        Some(rps) if min > 0.0 => (rps / min).clamp(0.0, 1.0),
        Some(_) => 1.0,
        None => 0.0,
    }
}

/// Linear-falloff credit for a latency ceiling. A missing figure earns 0.
pub(crate) fn latency_credit(p99: Option<f64>, max: f64) -> f64 {
    match p99 {
        Some(p99) if p99 > 0.0 => (max / p99).clamp(0.0, 1.0),
        Some(_) => 1.0,
        None => 0.0,
    }
}

pub(crate) fn mean_or_one(credits: &[f64]) -> f64 {
    if credits.is_empty() {
        1.0
    } else {
        credits.iter().sum::<f64>() / credits.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn register(registry: &Registry, json: serde_json::Value) {
        let manifest: AgentManifest = serde_json::from_value(json).unwrap();
        registry.register(manifest).unwrap();
    }

    fn seeded_registry() -> Registry {
        let registry = Registry::new();
        register(
            &registry,
            serde_json::json!({
                "agentId": "worker-test-v1.0.0",
                "agentType": "worker",
                "version": "1.0.0",
                "capabilities": {
                    "domains": ["testing"],
                    "operations": [{"name": "run-tests"}, {"name": "report-coverage"}]
                },
                "protocols": {
                    "supported": [{
                        "name": "rest", "version": "1.1",
                        "endpoint": "https://agents.local/worker",
                        "authentication": {"type": "bearer"}
                    }]
                },
                "performance": {
                    "throughput": {"requestsPerSecond": 50.0},
                    "latency": {"p50": 20.0, "p95": 90.0, "p99": 200.0}
                }
            }),
        );
        register(
            &registry,
            serde_json::json!({
                "agentId": "worker-docs-v1.2.0",
                "agentType": "worker",
                "version": "1.2.0",
                "capabilities": {
                    "domains": ["documentation", "api-design"],
                    "operations": [{"name": "generate-docs"}],
                    "specializations": {
                        "documentation": {"versions": ["openapi-3.1"], "features": ["markdown"]}
                    }
                },
                "protocols": {
                    "supported": [
                        {"name": "rest", "version": "1.1", "endpoint": "https://agents.local/docs"},
                        {"name": "mcp", "version": "1.0", "endpoint": "mcp://agents.local/docs"}
                    ]
                },
                "performance": {
                    "throughput": {"requestsPerSecond": 200.0},
                    "latency": {"p50": 5.0, "p95": 20.0, "p99": 45.0}
                }
            }),
        );
        register(
            &registry,
            serde_json::json!({
                "agentId": "orchestrator-main-v2.0.0",
                "agentType": "orchestrator",
                "version": "2.0.0",
                "capabilities": {
                    "domains": ["orchestration", "testing", "documentation"],
                    "operations": [{"name": "plan"}, {"name": "delegate"}]
                },
                "protocols": {
                    "supported": [{"name": "grpc", "version": "1.0", "endpoint": "grpc://agents.local/orch"}]
                },
                "performance": {
                    "throughput": {"requestsPerSecond": 20.0},
                    "latency": {"p50": 50.0, "p95": 300.0, "p99": 800.0}
                }
            }),
        );
        registry
    }

    #[test]
    fn test_domain_filter_returns_exact_agent() {
        let registry = seeded_registry();
        let query = DiscoveryQuery {
            domains: Some(vec!["api-design".to_string()]),
            ..Default::default()
        };
        let response = discover(&registry.snapshot(), &query);
        assert_eq!(response.total_found, 1);
        assert_eq!(response.agents[0].agent_id, "worker-docs-v1.2.0");
    }

    #[test]
    fn test_multi_domain_query_requires_all_domains() {
        let registry = seeded_registry();
        let query = DiscoveryQuery {
            domains: Some(vec!["testing".to_string(), "documentation".to_string()]),
            ..Default::default()
        };
        let response = discover(&registry.snapshot(), &query);
        // Only the orchestrator supports both.
        assert_eq!(response.total_found, 1);
        assert_eq!(response.agents[0].agent_id, "orchestrator-main-v2.0.0");
        for agent in &response.agents {
            for domain in query.domains.as_ref().unwrap() {
                assert!(agent.manifest.capabilities.domains.contains(domain));
            }
        }
    }

    #[test]
    fn test_agent_type_and_performance_filters() {
        let registry = seeded_registry();
        let query = DiscoveryQuery {
            agent_type: Some(AgentType::Worker),
            performance: Some(PerformanceFilter {
                min_throughput: Some(100.0),
                max_latency_p99: Some(100.0),
            }),
            ..Default::default()
        };
        let response = discover(&registry.snapshot(), &query);
        assert_eq!(response.total_found, 1);
        assert_eq!(response.agents[0].agent_id, "worker-docs-v1.2.0");
    }

    #[test]
    fn test_specialization_filter_requires_versions_and_features() {
        let registry = seeded_registry();
        let mut specializations = HashMap::new();
        specializations.insert(
            "documentation".to_string(),
            Specialization {
                versions: vec!["openapi-3.1".to_string()],
                features: vec!["markdown".to_string()],
            },
        );
        let query = DiscoveryQuery {
            specializations: Some(specializations),
            ..Default::default()
        };
        let response = discover(&registry.snapshot(), &query);
        assert_eq!(response.total_found, 1);
        assert_eq!(response.agents[0].agent_id, "worker-docs-v1.2.0");

        let mut missing = HashMap::new();
        missing.insert(
            "documentation".to_string(),
            Specialization {
                versions: vec!["openapi-2.0".to_string()],
                features: vec![],
            },
        );
        let query = DiscoveryQuery {
            specializations: Some(missing),
            ..Default::default()
        };
        assert_eq!(discover(&registry.snapshot(), &query).total_found, 0);
    }

    #[test]
    fn test_authentication_filter_checks_rest_entry() {
        let registry = seeded_registry();
        let query = DiscoveryQuery {
            authentication: Some("bearer".to_string()),
            ..Default::default()
        };
        let response = discover(&registry.snapshot(), &query);
        assert_eq!(response.total_found, 1);
        assert_eq!(response.agents[0].agent_id, "worker-test-v1.0.0");
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let registry = seeded_registry();
        let query = DiscoveryQuery {
            domains: Some(vec!["nonexistent-domain".to_string()]),
            ..Default::default()
        };
        let response = discover(&registry.snapshot(), &query);
        assert!(response.agents.is_empty());
        assert_eq!(response.total_found, 0);
    }

    #[test]
    fn test_scores_bounded_and_sorted_descending() {
        let registry = seeded_registry();
        let response = discover(&registry.snapshot(), &DiscoveryQuery::default());
        assert_eq!(response.total_found, 3);
        for pair in response.agents.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for agent in &response.agents {
            assert!((0.0..=1.0).contains(&agent.score));
        }
    }

    #[test]
    fn test_ties_broken_by_agent_id_ascending() {
        let registry = seeded_registry();
        let response = discover(&registry.snapshot(), &DiscoveryQuery::default());
        let equal_scored: Vec<&DiscoveredAgent> = response
            .agents
            .iter()
            .filter(|a| (a.score - response.agents[0].score).abs() < f64::EPSILON)
            .collect();
        for pair in equal_scored.windows(2) {
            assert!(pair[0].agent_id < pair[1].agent_id);
        }
    }

    #[test]
    fn test_sort_by_agent_id() {
        let registry = seeded_registry();
        let query = DiscoveryQuery {
            sort_by: Some(SortBy::AgentId),
            ..Default::default()
        };
        let response = discover(&registry.snapshot(), &query);
        let ids: Vec<&str> = response.agents.iter().map(|a| a.agent_id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_sort_by_registered_at_follows_registration_order() {
        use crate::clock::ManualClock;
        use std::sync::Arc;

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry =
            crate::registry::Registry::with_clock(chrono::Duration::minutes(10), clock.clone());

        // Register in reverse-lexicographic id order so agentId order and
        // registration order disagree.
        register(
            &registry,
            serde_json::json!({
                "agentId": "worker-zzz-v1.0.0",
                "agentType": "worker",
                "version": "1.0.0",
                "capabilities": {"domains": ["testing"]},
                "protocols": {"supported": []},
                "performance": {"throughput": {}, "latency": {}}
            }),
        );
        clock.advance(chrono::Duration::seconds(30));
        register(
            &registry,
            serde_json::json!({
                "agentId": "worker-aaa-v1.0.0",
                "agentType": "worker",
                "version": "1.0.0",
                "capabilities": {"domains": ["testing"]},
                "protocols": {"supported": []},
                "performance": {"throughput": {}, "latency": {}}
            }),
        );

        let query = DiscoveryQuery {
            sort_by: Some(SortBy::RegisteredAt),
            ..Default::default()
        };
        let response = discover(&registry.snapshot(), &query);
        assert_eq!(response.agents[0].agent_id, "worker-zzz-v1.0.0");
        assert_eq!(response.agents[1].agent_id, "worker-aaa-v1.0.0");
        assert!(response.agents[0].registered_at < response.agents[1].registered_at);

        let query = DiscoveryQuery {
            sort_by: Some(SortBy::RegisteredAt),
            sort_order: Some(SortOrder::Desc),
            ..Default::default()
        };
        let response = discover(&registry.snapshot(), &query);
        assert_eq!(response.agents[0].agent_id, "worker-aaa-v1.0.0");
    }

    #[test]
    fn test_pagination_reports_pre_pagination_total() {
        let registry = seeded_registry();
        let query = DiscoveryQuery {
            pagination: Some(Pagination {
                offset: 1,
                limit: 1,
            }),
            ..Default::default()
        };
        let response = discover(&registry.snapshot(), &query);
        assert_eq!(response.agents.len(), 1);
        assert_eq!(response.total_found, 3);
    }

    #[test]
    fn test_malformed_query_shape_fails_deserialization() {
        // The HTTP layer relies on this to produce its 400.
        let bad = serde_json::json!({"domains": "testing"});
        assert!(serde_json::from_value::<DiscoveryQuery>(bad).is_err());
    }

    #[test]
    fn test_overlap_ratio() {
        let required = vec!["a".to_string(), "b".to_string()];
        assert_eq!(overlap_ratio(&required, &["a", "b", "c"]), 1.0);
        assert_eq!(overlap_ratio(&required, &["a"]), 0.5);
        assert_eq!(overlap_ratio(&required, &[]), 0.0);
        assert_eq!(overlap_ratio(&[], &[]), 1.0);
    }

    #[test]
    fn test_threshold_credits() {
        assert_eq!(throughput_credit(Some(100.0), 50.0), 1.0);
        assert_eq!(throughput_credit(Some(25.0), 50.0), 0.5);
        assert_eq!(throughput_credit(None, 50.0), 0.0);
        assert_eq!(latency_credit(Some(100.0), 200.0), 1.0);
        assert_eq!(latency_credit(Some(400.0), 200.0), 0.5);
        assert_eq!(latency_credit(None, 200.0), 0.0);
    }
}
