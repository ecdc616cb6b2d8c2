//! Fluent builder for flows
//!
//! Provides a compact API for constructing flows programmatically.

use crate::types::{
    ApiConfig, Connection, Flow, FlowNode, NodeData, NodeType, Position, PORT_FALSE, PORT_TRUE,
};

/// Fluent builder for constructing flows
///
/// # Example
///
/// ```ignore
/// let flow = FlowBuilder::new("flow-1", "Checkout")
///     .add_start("start", (0.0, 0.0))
///     .add_decision("paid", (100.0, 0.0), "total > 0")
///     .add_end("done", (200.0, 0.0))
///     .connect("start", "paid")
///     .connect_port("paid", "true", "done")
///     .build();
/// ```
pub struct FlowBuilder {
    id: String,
    name: String,
    description: Option<String>,
    nodes: Vec<FlowNode>,
    connections: Vec<Connection>,
    connection_counter: usize,
}

impl FlowBuilder {
    /// Create a new flow builder
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            connections: Vec::new(),
            connection_counter: 0,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a node of any type, labelled with its type name
    pub fn add_node(
        mut self,
        id: impl Into<String>,
        node_type: NodeType,
        position: impl Into<Position>,
    ) -> Self {
        self.nodes.push(FlowNode::new(id, node_type, position));
        self
    }

    /// Add a START node
    pub fn add_start(self, id: impl Into<String>, position: impl Into<Position>) -> Self {
        self.add_node(id, NodeType::Start, position)
    }

    /// Add an END node
    pub fn add_end(self, id: impl Into<String>, position: impl Into<Position>) -> Self {
        self.add_node(id, NodeType::End, position)
    }

    /// Add a TASK node
    pub fn add_task(self, id: impl Into<String>, position: impl Into<Position>) -> Self {
        self.add_node(id, NodeType::Task, position)
    }

    /// Add a SCRIPT node
    pub fn add_script(
        mut self,
        id: impl Into<String>,
        position: impl Into<Position>,
        script: impl Into<String>,
    ) -> Self {
        let mut node = FlowNode::new(id, NodeType::Script, position);
        node.data.script = Some(script.into());
        self.nodes.push(node);
        self
    }

    /// Add a DECISION node
    pub fn add_decision(
        mut self,
        id: impl Into<String>,
        position: impl Into<Position>,
        condition: impl Into<String>,
    ) -> Self {
        let mut node = FlowNode::new(id, NodeType::Decision, position);
        node.data.condition = Some(condition.into());
        self.nodes.push(node);
        self
    }

    /// Add an API node
    pub fn add_api(
        mut self,
        id: impl Into<String>,
        position: impl Into<Position>,
        config: ApiConfig,
    ) -> Self {
        let mut node = FlowNode::new(id, NodeType::Api, position);
        node.data.api_config = Some(config);
        self.nodes.push(node);
        self
    }

    /// Set the label on the most recently added node
    ///
    /// Must be called immediately after one of the `add_*` node methods.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.data.label = label.into();
        }
        self
    }

    /// Replace the payload of the most recently added node
    pub fn with_data(mut self, data: NodeData) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.data = data;
        }
        self
    }

    /// Add an untagged connection (auto-generates the connection ID)
    pub fn connect(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        let id = self.next_connection_id();
        self.connections.push(Connection::new(id, source, target));
        self
    }

    /// Add a connection tagged with a source port
    pub fn connect_port(
        mut self,
        source: impl Into<String>,
        port: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let id = self.next_connection_id();
        self.connections
            .push(Connection::with_port(id, source, port, target));
        self
    }

    /// Connect both branches of a DECISION node
    pub fn branch(
        self,
        decision: impl Into<String>,
        when_true: impl Into<String>,
        when_false: impl Into<String>,
    ) -> Self {
        let decision = decision.into();
        self.connect_port(decision.clone(), PORT_TRUE, when_true)
            .connect_port(decision, PORT_FALSE, when_false)
    }

    fn next_connection_id(&mut self) -> String {
        self.connection_counter += 1;
        format!("conn-{}", self.connection_counter)
    }

    /// Build the flow without validation
    pub fn build(self) -> Flow {
        Flow {
            id: self.id,
            name: self.name,
            description: self.description,
            nodes: self.nodes,
            connections: self.connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_linear_flow() {
        let flow = FlowBuilder::new("f", "Linear")
            .with_description("three steps")
            .add_start("s", (0.0, 0.0))
            .add_task("t", (100.0, 0.0))
            .with_label("Prepare")
            .add_end("e", (200.0, 0.0))
            .connect("s", "t")
            .connect("t", "e")
            .build();

        assert_eq!(flow.nodes.len(), 3);
        assert_eq!(flow.nodes[1].label(), "Prepare");
        assert_eq!(flow.nodes[0].label(), "START");
        assert_eq!(flow.connections[0].id, "conn-1");
        assert_eq!(flow.connections[1].id, "conn-2");
        assert_eq!(flow.description.as_deref(), Some("three steps"));
    }

    #[test]
    fn test_branch_tags_ports() {
        let flow = FlowBuilder::new("f", "Branch")
            .add_start("s", (0.0, 0.0))
            .add_decision("d", (100.0, 0.0), "ok")
            .add_end("yes", (200.0, -50.0))
            .add_end("no", (200.0, 50.0))
            .connect("s", "d")
            .branch("d", "yes", "no")
            .build();

        assert_eq!(flow.next_connection("d", Some("true")).unwrap().target, "yes");
        assert_eq!(flow.next_connection("d", Some("false")).unwrap().target, "no");
        assert_eq!(
            flow.find_node("d").unwrap().data.condition.as_deref(),
            Some("ok")
        );
    }
}
