//! Structural and semantic validation of ACDL manifests.
//!
//! [`validate`] runs a fixed, ordered list of checks and never
//! short-circuits: a single response lists every violation. Each check
//! produces a [`CheckResult`] (stored on the registration as
//! `validationResults`) and, on failure, one or more structured
//! [`ValidationIssue`]s.
//!
//! [`conformance_level`] classifies a structurally valid manifest into
//! bronze/silver/gold, evaluated top-down with fallthrough so the tiers stay
//! monotonic: gold implies silver implies bronze.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::manifest::{AgentManifest, AgentType};

static AGENT_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]*-v\d+\.\d+\.\d+$").expect("agentId pattern is valid")
});

// Strict semver: MAJOR.MINOR.PATCH with optional pre-release and build
// metadata suffixes.
static SEMVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .expect("semver pattern is valid")
});

/// One structured validation error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

/// Outcome of one named check, kept on the registration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Full validation outcome: ordered check list plus flattened errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub checks: Vec<CheckResult>,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Manifest conformance tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConformanceLevel {
    Bronze,
    Silver,
    Gold,
}

impl std::fmt::Display for ConformanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bronze => write!(f, "bronze"),
            Self::Silver => write!(f, "silver"),
            Self::Gold => write!(f, "gold"),
        }
    }
}

/// Strict-semver predicate, usable standalone.
pub fn validate_version(version: &str) -> bool {
    SEMVER_RE.is_match(version)
}

/// Run every check against the manifest and collect all violations.
pub fn validate(manifest: &AgentManifest) -> ValidationReport {
    let mut checks = Vec::new();
    let mut errors = Vec::new();

    check_agent_id(manifest, &mut checks, &mut errors);
    check_agent_type(manifest, &mut checks, &mut errors);
    check_version(manifest, &mut checks, &mut errors);
    check_domains(manifest, &mut checks, &mut errors);
    check_operations(manifest, &mut checks, &mut errors);
    check_protocols(manifest, &mut checks, &mut errors);
    check_performance(manifest, &mut checks, &mut errors);

    ValidationReport {
        valid: errors.is_empty(),
        checks,
        errors,
    }
}

fn record(
    checks: &mut Vec<CheckResult>,
    errors: &mut Vec<ValidationIssue>,
    check: &str,
    issues: Vec<ValidationIssue>,
) {
    if issues.is_empty() {
        checks.push(CheckResult {
            check: check.to_string(),
            passed: true,
            message: None,
        });
    } else {
        checks.push(CheckResult {
            check: check.to_string(),
            passed: false,
            message: Some(
                issues
                    .iter()
                    .map(|i| i.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
        });
        errors.extend(issues);
    }
}

fn issue(field: &str, code: &str, message: String) -> ValidationIssue {
    ValidationIssue {
        field: field.to_string(),
        code: code.to_string(),
        message,
    }
}

fn check_agent_id(
    manifest: &AgentManifest,
    checks: &mut Vec<CheckResult>,
    errors: &mut Vec<ValidationIssue>,
) {
    let mut issues = Vec::new();
    if manifest.agent_id.is_empty() {
        issues.push(issue(
            "agentId",
            "REQUIRED",
            "agentId is required".to_string(),
        ));
    } else if !AGENT_ID_RE.is_match(&manifest.agent_id) {
        issues.push(issue(
            "agentId",
            "INVALID_FORMAT",
            format!(
                "agentId '{}' must match <name>-v<MAJOR>.<MINOR>.<PATCH> (lowercase, hyphenated)",
                manifest.agent_id
            ),
        ));
    }
    record(checks, errors, "agentId-format", issues);
}

fn check_agent_type(
    manifest: &AgentManifest,
    checks: &mut Vec<CheckResult>,
    errors: &mut Vec<ValidationIssue>,
) {
    let mut issues = Vec::new();
    if manifest.agent_type == AgentType::Unknown {
        issues.push(issue(
            "agentType",
            "ENUM_VIOLATION",
            "agentType must be one of the enum values: orchestrator, worker, critic, judge, trainer, governor, monitor, integrator"
                .to_string(),
        ));
    }
    record(checks, errors, "agentType-enum", issues);
}

fn check_version(
    manifest: &AgentManifest,
    checks: &mut Vec<CheckResult>,
    errors: &mut Vec<ValidationIssue>,
) {
    let mut issues = Vec::new();
    if !validate_version(&manifest.version) {
        issues.push(issue(
            "version",
            "INVALID_FORMAT",
            format!(
                "version '{}' must be strict semver (MAJOR.MINOR.PATCH)",
                manifest.version
            ),
        ));
    }
    record(checks, errors, "version-format", issues);
}

fn check_domains(
    manifest: &AgentManifest,
    checks: &mut Vec<CheckResult>,
    errors: &mut Vec<ValidationIssue>,
) {
    let mut issues = Vec::new();
    if manifest.capabilities.domains.is_empty() {
        issues.push(issue(
            "capabilities.domains",
            "REQUIRED",
            "capabilities.domains must not be empty".to_string(),
        ));
    }
    record(checks, errors, "capabilities.domains", issues);
}

fn check_operations(
    manifest: &AgentManifest,
    checks: &mut Vec<CheckResult>,
    errors: &mut Vec<ValidationIssue>,
) {
    let mut issues = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for (idx, op) in manifest.capabilities.operations.iter().enumerate() {
        let field = format!("capabilities.operations[{}].name", idx);
        if op.name.is_empty() {
            issues.push(issue(
                &field,
                "REQUIRED",
                format!("operation at index {} has an empty name", idx),
            ));
        } else if !seen.insert(op.name.as_str()) {
            issues.push(issue(
                &field,
                "DUPLICATE",
                format!("duplicate operation name '{}'", op.name),
            ));
        }
    }
    record(checks, errors, "operations", issues);
}

fn check_protocols(
    manifest: &AgentManifest,
    checks: &mut Vec<CheckResult>,
    errors: &mut Vec<ValidationIssue>,
) {
    let mut issues = Vec::new();
    for (idx, proto) in manifest.protocols.supported.iter().enumerate() {
        let prefix = format!("protocols.supported[{}]", idx);
        if proto.name.is_empty() {
            issues.push(issue(
                &format!("{}.name", prefix),
                "REQUIRED",
                format!("protocol entry {} is missing a name", idx),
            ));
        }
        if proto.version.is_empty() {
            issues.push(issue(
                &format!("{}.version", prefix),
                "REQUIRED",
                format!("protocol entry {} is missing a version", idx),
            ));
        }
        if proto.endpoint.is_empty() {
            issues.push(issue(
                &format!("{}.endpoint", prefix),
                "REQUIRED",
                format!("protocol entry {} is missing an endpoint", idx),
            ));
        } else if proto.name == "mcp" && !proto.endpoint.starts_with("mcp://") {
            issues.push(issue(
                &format!("{}.endpoint", prefix),
                "INVALID_FORMAT",
                format!(
                    "mcp protocol endpoint '{}' must start with mcp://",
                    proto.endpoint
                ),
            ));
        }
    }
    record(checks, errors, "protocols", issues);
}

fn check_performance(
    manifest: &AgentManifest,
    checks: &mut Vec<CheckResult>,
    errors: &mut Vec<ValidationIssue>,
) {
    let mut issues = Vec::new();
    match &manifest.performance {
        None => {
            issues.push(issue(
                "performance",
                "REQUIRED",
                "performance section is required".to_string(),
            ));
        }
        Some(perf) => {
            if perf.throughput.is_none() {
                issues.push(issue(
                    "performance.throughput",
                    "REQUIRED",
                    "performance.throughput object is required".to_string(),
                ));
            }
            if perf.latency.is_none() {
                issues.push(issue(
                    "performance.latency",
                    "REQUIRED",
                    "performance.latency object is required".to_string(),
                ));
            }
        }
    }
    record(checks, errors, "performance", issues);
}

/// Classify a manifest into its conformance tier.
///
/// Evaluated top-down with fallthrough: a manifest failing any gold criterion
/// but meeting all silver criteria is silver, and so on down to bronze.
pub fn conformance_level(manifest: &AgentManifest) -> ConformanceLevel {
    if meets_gold(manifest) {
        ConformanceLevel::Gold
    } else if meets_silver(manifest) {
        ConformanceLevel::Silver
    } else {
        ConformanceLevel::Bronze
    }
}

fn meets_silver(manifest: &AgentManifest) -> bool {
    let caps = &manifest.capabilities;
    let complete_figures = manifest
        .performance
        .as_ref()
        .map(|p| {
            p.latency.as_ref().is_some_and(|l| l.is_complete())
                && p.throughput
                    .as_ref()
                    .is_some_and(|t| t.requests_per_second.is_some())
        })
        .unwrap_or(false);

    caps.feedback_loop
        && manifest.protocols.supported.len() >= 2
        && complete_figures
        && caps.budget_management
        && caps.audit_logging
}

fn meets_gold(manifest: &AgentManifest) -> bool {
    let caps = &manifest.capabilities;
    meets_silver(manifest)
        && manifest.protocols.supported.len() >= 4
        && manifest.protocol("mcp").is_some()
        && caps.props_tokens
        && caps.learning_signals
        && caps.workspace_management
}
