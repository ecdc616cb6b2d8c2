//! Structural validation for flows
//!
//! Validation is advisory: it reports diagnostics and never fails. Callers
//! decide whether outstanding errors should block execution.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Flow, NodeId, NodeType};

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One structural finding about a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Node the finding refers to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    fn error(message: impl Into<String>) -> Self {
        Self {
            node_id: None,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    fn warning(node_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.map(str::to_string),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", severity, self.message)
    }
}

/// Validate a flow
///
/// Returns every finding (not just the first), in rule order: start node
/// count, end node presence, per-node connectivity, dangling connections.
pub fn validate_flow(flow: &Flow) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    validate_start_end_presence(flow, &mut diagnostics);
    validate_connectivity(flow, &mut diagnostics);
    validate_connection_references(flow, &mut diagnostics);

    diagnostics
}

/// Check whether any diagnostic is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Count diagnostics of the given severity
pub fn count_severity(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}

/// Check Start/End node presence
fn validate_start_end_presence(flow: &Flow, diagnostics: &mut Vec<Diagnostic>) {
    let start_count = flow.nodes_of_type(NodeType::Start).count();
    let end_count = flow.nodes_of_type(NodeType::End).count();

    if start_count == 0 {
        diagnostics.push(Diagnostic::error("Flow must have a Start node."));
    } else if start_count > 1 {
        diagnostics.push(Diagnostic::error("Flow can only have one Start node."));
    }

    if end_count == 0 {
        diagnostics.push(Diagnostic::warning(
            None,
            "Flow should have at least one End node.",
        ));
    }
}

/// Flag nodes without incoming (non-START) or outgoing (non-END) connections
fn validate_connectivity(flow: &Flow, diagnostics: &mut Vec<Diagnostic>) {
    let targets: HashSet<&str> = flow.connections.iter().map(|c| c.target.as_str()).collect();
    let sources: HashSet<&str> = flow.connections.iter().map(|c| c.source.as_str()).collect();

    for node in &flow.nodes {
        if node.node_type != NodeType::Start && !targets.contains(node.id.as_str()) {
            diagnostics.push(Diagnostic::warning(
                Some(&node.id),
                format!("Node \"{}\" is not reachable.", node.label()),
            ));
        }

        if node.node_type != NodeType::End && !sources.contains(node.id.as_str()) {
            diagnostics.push(Diagnostic::warning(
                Some(&node.id),
                format!("Node \"{}\" has no output.", node.label()),
            ));
        }
    }
}

/// Check that all connection source/target nodes exist
fn validate_connection_references(flow: &Flow, diagnostics: &mut Vec<Diagnostic>) {
    let node_ids: HashSet<&str> = flow.nodes.iter().map(|n| n.id.as_str()).collect();

    for connection in &flow.connections {
        for endpoint in [&connection.source, &connection.target] {
            if !node_ids.contains(endpoint.as_str()) {
                diagnostics.push(Diagnostic::warning(
                    None,
                    format!(
                        "Connection \"{}\" references unknown node \"{}\".",
                        connection.id, endpoint
                    ),
                ));
            }
        }
    }
}
