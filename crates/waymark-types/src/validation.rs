//! Validation outcome types.
//!
//! The validator never stops at the first problem it sees (except for cycles),
//! so its failure value is a batch of `Violation`s rather than a single error.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a manifest violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Missing identity field, empty node list, node without an id, bad effort.
    Structural,
    /// Duplicate node id or unresolved dependency reference.
    Referential,
    /// The dependency graph contains at least one cycle.
    Cycle,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structural => write!(f, "structural"),
            Self::Referential => write!(f, "referential"),
            Self::Cycle => write!(f, "cycle"),
        }
    }
}

/// One problem found in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Offending node, when the violation concerns a single node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn structural(message: impl Into<String>) -> Self {
        Self {
            kind: ViolationKind::Structural,
            node_id: None,
            message: message.into(),
        }
    }

    pub fn referential(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ViolationKind::Referential,
            node_id: Some(node_id.into()),
            message: message.into(),
        }
    }

    pub fn cycle(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ViolationKind::Cycle,
            node_id: Some(node_id.into()),
            message: message.into(),
        }
    }

    /// Attach the offending node id.
    pub fn for_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// Non-empty, ordered list of violations returned by a failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<Violation>);

impl ValidationErrors {
    /// Wrap a batch of violations. Returns `None` for an empty batch.
    pub fn from_violations(violations: Vec<Violation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self(violations))
        }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Violations of a single kind.
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.0.iter().filter(move |v| v.kind == kind)
    }

    pub fn has_kind(&self, kind: ViolationKind) -> bool {
        self.of_kind(kind).next().is_some()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "manifest is invalid ({} violation(s))", self.0.len())?;
        for (i, violation) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
