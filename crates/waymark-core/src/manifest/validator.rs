//! Manifest validation.
//!
//! Checks run in three stages:
//! - structural: identity fields, node list, node ids, effort, optional strict tags
//! - referential: duplicate ids and unresolved `depends_on` entries
//! - graph: cycle detection, only when the first two stages found nothing
//!
//! Structural and referential problems are collected in one pass so authors
//! can fix a manifest in one go. A cycle yields a single violation.

use std::collections::HashSet;

use waymark_types::config::KernelConfig;
use waymark_types::manifest::ExecutionManifest;
use waymark_types::validation::{ValidationErrors, Violation};

use super::graph::ManifestGraph;

/// Caller-selectable validation behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Report node types and policy severities outside the known set.
    pub strict: bool,
    /// Reject manifests with more nodes than this.
    pub max_nodes: Option<usize>,
}

impl ValidationOptions {
    /// Lenient defaults with strict tag checking turned on.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

impl From<&KernelConfig> for ValidationOptions {
    fn from(config: &KernelConfig) -> Self {
        Self {
            strict: config.strict_types,
            max_nodes: Some(config.max_nodes),
        }
    }
}

/// Validate with default (lenient) options.
pub fn validate(manifest: &ExecutionManifest) -> Result<(), ValidationErrors> {
    validate_with(manifest, &ValidationOptions::default())
}

/// Validate `manifest`, returning every violation found.
pub fn validate_with(
    manifest: &ExecutionManifest,
    options: &ValidationOptions,
) -> Result<(), ValidationErrors> {
    let mut violations = Vec::new();
    check_structure(manifest, options, &mut violations);
    check_references(manifest, &mut violations);

    // Cycle detection assumes every reference resolves.
    if violations.is_empty() {
        if let Some(node_id) = ManifestGraph::new(manifest).find_cycle_node() {
            violations.push(Violation::cycle(
                node_id,
                format!("dependency cycle detected involving node '{node_id}'"),
            ));
        }
    }

    tracing::debug!(
        project = %manifest.project,
        nodes = manifest.nodes.len(),
        violations = violations.len(),
        "validated manifest"
    );

    match ValidationErrors::from_violations(violations) {
        Some(errors) => Err(errors),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Structural checks
// ---------------------------------------------------------------------------

fn check_structure(
    manifest: &ExecutionManifest,
    options: &ValidationOptions,
    violations: &mut Vec<Violation>,
) {
    for (field, value) in [
        ("iteration_id", &manifest.iteration_id),
        ("timestamp", &manifest.timestamp),
        ("project", &manifest.project),
    ] {
        if value.trim().is_empty() {
            violations.push(Violation::structural(format!("{field} must not be empty")));
        }
    }

    if manifest.nodes.is_empty() {
        violations.push(Violation::structural("manifest must have at least one node"));
    }
    if let Some(max) = options.max_nodes {
        if manifest.nodes.len() > max {
            violations.push(Violation::structural(format!(
                "manifest has {} nodes, more than the limit of {max}",
                manifest.nodes.len()
            )));
        }
    }

    for (position, node) in manifest.nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            violations.push(Violation::structural(format!(
                "node at position {position} has no id"
            )));
        }
        if let Some(effort) = node.estimated_effort {
            if effort < 0 {
                violations.push(
                    Violation::structural(format!(
                        "node '{}' has negative estimated_effort {effort}",
                        node.id
                    ))
                    .for_node(&node.id),
                );
            }
        }
        if options.strict && !node.node_type.is_known() {
            violations.push(
                Violation::structural(format!(
                    "node '{}' has unknown type '{}'",
                    node.id, node.node_type
                ))
                .for_node(&node.id),
            );
        }
    }

    for (position, policy) in manifest.policies.iter().enumerate() {
        if policy.id.trim().is_empty() {
            violations.push(Violation::structural(format!(
                "policy at position {position} has no id"
            )));
        }
        if options.strict && !policy.severity.is_known() {
            violations.push(Violation::structural(format!(
                "policy '{}' has unknown severity '{}'",
                policy.id, policy.severity
            )));
        }
    }
}

// ---------------------------------------------------------------------------
// Referential checks
// ---------------------------------------------------------------------------

fn check_references(manifest: &ExecutionManifest, violations: &mut Vec<Violation>) {
    // First definition of each id; later duplicates are reported and ignored.
    let mut seen: HashSet<&str> = HashSet::with_capacity(manifest.nodes.len());
    let mut canonical = Vec::with_capacity(manifest.nodes.len());
    for (position, node) in manifest.nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            continue;
        }
        if seen.insert(node.id.as_str()) {
            canonical.push(node);
        } else {
            violations.push(Violation::referential(
                &node.id,
                format!("duplicate node id '{}' at position {position}", node.id),
            ));
        }
    }

    for node in canonical {
        for dep in node.dependencies() {
            if !seen.contains(dep) {
                violations.push(Violation::referential(
                    &node.id,
                    format!("node '{}' depends on unknown node '{dep}'", node.id),
                ));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
