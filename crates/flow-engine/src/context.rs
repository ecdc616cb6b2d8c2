//! Per-run execution context
//!
//! Holds the variables scripts and conditions operate on, plus the parsed
//! responses of API nodes keyed by node id. A context is created when a run
//! starts and dropped when it ends.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::types::NodeId;

/// Context for flow execution, holding data passed between nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    /// Variables accessible by name.
    variables: Map<String, Value>,
    /// Parsed API responses (keyed by API node ID).
    responses: BTreeMap<NodeId, Value>,
}

impl ExecutionContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with initial variables.
    pub fn with_variables(variables: Map<String, Value>) -> Self {
        Self {
            variables,
            responses: BTreeMap::new(),
        }
    }

    /// Get a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Get a variable (mutable).
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.variables.get_mut(name)
    }

    /// Set a variable.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Remove a variable.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    /// Check if a variable exists.
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    /// Get the parsed response stored by an API node.
    pub fn response(&self, node_id: &str) -> Option<&Value> {
        self.responses.get(node_id)
    }

    /// Store the parsed response of an API node, replacing any earlier one.
    pub fn store_response(&mut self, node_id: impl Into<NodeId>, value: Value) {
        self.responses.insert(node_id.into(), value);
    }

    pub fn responses(&self) -> &BTreeMap<NodeId, Value> {
        &self.responses
    }

    /// All responses as one JSON object (node id -> response).
    pub fn responses_value(&self) -> Value {
        Value::Object(
            self.responses
                .iter()
                .map(|(id, value)| (id.clone(), value.clone()))
                .collect(),
        )
    }
}
