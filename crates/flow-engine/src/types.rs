//! Core types for flow graphs
//!
//! These types mirror the flow JSON document exchanged with the editor:
//! a flow owns an ordered list of typed nodes and an ordered list of
//! connections between them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for a connection
pub type ConnectionId = String;

/// Port tag followed when a condition holds
pub const PORT_TRUE: &str = "true";

/// Port tag followed when a condition does not hold
pub const PORT_FALSE: &str = "false";

/// The type of a flow node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Entry point of the flow. Exactly one per flow.
    Start,
    /// Plain step with no side effect.
    Task,
    /// Branches on a boolean condition via the "true"/"false" ports.
    Decision,
    /// Runs statements against the execution context.
    Script,
    /// Issues one HTTP request and stores the parsed response.
    Api,
    /// Exit point of the flow. Can have multiple.
    End,
}

impl NodeType {
    /// Wire name of this node type (e.g. `"DECISION"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Start => "START",
            NodeType::Task => "TASK",
            NodeType::Decision => "DECISION",
            NodeType::Script => "SCRIPT",
            NodeType::Api => "API",
            NodeType::End => "END",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method of an API node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request issued by an API node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Position of a node in the editor canvas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Payload carried by every node
///
/// Only the field matching the node's type is meaningful; the others are
/// ignored by the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// Human-readable label shown in logs and diagnostics
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Statements run by SCRIPT nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Boolean expression evaluated by DECISION nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Request issued by API nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_config: Option<ApiConfig>,
}

impl NodeData {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

/// A node instance in a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    /// Unique identifier within the flow
    pub id: NodeId,
    /// Node type, determines execution semantics
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Position in the editor (cosmetic)
    pub position: Position,
    /// Label and type-specific payload
    pub data: NodeData,
}

impl FlowNode {
    /// Create a new node whose label is the node type name.
    pub fn new(id: impl Into<String>, node_type: NodeType, position: impl Into<Position>) -> Self {
        Self {
            id: id.into(),
            node_type,
            position: position.into(),
            data: NodeData::new(node_type.as_str()),
        }
    }

    /// Create a new node with an explicit payload.
    pub fn with_data(
        id: impl Into<String>,
        node_type: NodeType,
        position: impl Into<Position>,
        data: NodeData,
    ) -> Self {
        Self {
            id: id.into(),
            node_type,
            position: position.into(),
            data,
        }
    }

    pub fn label(&self) -> &str {
        &self.data.label
    }
}

/// A directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Source node ID
    pub source: NodeId,
    /// Target node ID
    pub target: NodeId,
    /// Output port on the source side (e.g. "true" / "false")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,
}

impl Connection {
    /// Create an untagged connection.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_port: None,
        }
    }

    /// Create a connection tagged with a source port.
    pub fn with_port(
        id: impl Into<String>,
        source: impl Into<String>,
        port: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_port: Some(port.into()),
        }
    }
}

/// A complete flow document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    /// Unique identifier for this flow
    pub id: String,
    /// Human-readable name
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nodes in the flow
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    /// Connections between nodes
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Flow {
    /// Create a new empty flow
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a flow from its JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize this flow to a pretty-printed JSON document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find the first START node in node order.
    pub fn find_start_node(&self) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.node_type == NodeType::Start)
    }

    /// Iterate over the nodes of a given type.
    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &FlowNode> + '_ {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }

    /// Find the connection to follow out of a node.
    ///
    /// Without a port the first outgoing connection wins regardless of its tag;
    /// with a port only a connection tagged with exactly that port matches.
    pub fn next_connection(&self, node_id: &str, port: Option<&str>) -> Option<&Connection> {
        self.connections.iter().find(|c| {
            c.source == node_id
                && match port {
                    None => true,
                    Some(port) => c.source_port.as_deref() == Some(port),
                }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_flow() -> Flow {
        let mut flow = Flow::new("flow-1", "Sample");
        flow.description = Some("round trip".to_string());
        flow.nodes.push(FlowNode::new("start", NodeType::Start, (0.0, 0.0)));
        flow.nodes.push(FlowNode::with_data(
            "check",
            NodeType::Decision,
            (100.0, 0.0),
            NodeData {
                label: "Check".to_string(),
                condition: Some("x > 0".to_string()),
                ..NodeData::default()
            },
        ));
        flow.nodes.push(FlowNode::with_data(
            "call",
            NodeType::Api,
            (200.0, -40.5),
            NodeData {
                label: "Call".to_string(),
                api_config: Some(ApiConfig {
                    url: "https://example.com/items".to_string(),
                    method: HttpMethod::Post,
                    headers: Some(BTreeMap::from([(
                        "Authorization".to_string(),
                        "Bearer t".to_string(),
                    )])),
                    body: Some("{\"a\":1}".to_string()),
                }),
                ..NodeData::default()
            },
        ));
        flow.nodes.push(FlowNode::new("end", NodeType::End, (300.0, 0.0)));
        flow.connections.push(Connection::new("c1", "start", "check"));
        flow.connections.push(Connection::with_port("c2", "check", "true", "call"));
        flow.connections.push(Connection::with_port("c3", "check", "false", "end"));
        flow.connections.push(Connection::new("c4", "call", "end"));
        flow
    }

    #[test]
    fn test_json_round_trip() {
        let flow = sample_flow();
        let json = flow.to_json().unwrap();
        let decoded = Flow::from_json(&json).unwrap();
        assert_eq!(decoded, flow);
    }

    #[test]
    fn test_wire_format() {
        let flow = sample_flow();
        let value = serde_json::to_value(&flow).unwrap();

        assert_eq!(value["nodes"][0]["type"], "START");
        assert_eq!(value["nodes"][0]["position"]["x"], 0.0);
        assert_eq!(value["nodes"][2]["data"]["apiConfig"]["method"], "POST");
        assert_eq!(value["connections"][1]["sourcePort"], "true");
        assert!(value["connections"][0].get("sourcePort").is_none());
    }

    #[test]
    fn test_parse_editor_document() {
        let json = r#"{
            "id": "f",
            "name": "Editor flow",
            "nodes": [
                {"id": "n1", "type": "START", "position": {"x": 10, "y": 20},
                 "data": {"label": "Begin"}},
                {"id": "n2", "type": "SCRIPT", "position": {"x": 10, "y": 120},
                 "data": {"label": "Set", "script": "x = 1", "condition": "ignored"}}
            ],
            "connections": [{"id": "c", "source": "n1", "target": "n2"}]
        }"#;

        let flow = Flow::from_json(json).unwrap();
        assert_eq!(flow.nodes.len(), 2);
        assert_eq!(flow.nodes[1].node_type, NodeType::Script);
        assert_eq!(flow.nodes[1].data.script.as_deref(), Some("x = 1"));
        assert_eq!(flow.connections[0].source_port, None);
    }

    #[test]
    fn test_next_connection_by_port() {
        let flow = sample_flow();

        assert_eq!(flow.next_connection("start", None).unwrap().target, "check");
        assert_eq!(flow.next_connection("check", Some("false")).unwrap().target, "end");
        assert_eq!(flow.next_connection("check", None).unwrap().target, "call");
        assert!(flow.next_connection("check", Some("maybe")).is_none());
        assert!(flow.next_connection("end", None).is_none());
    }

    #[test]
    fn test_find_start_node() {
        let flow = sample_flow();
        assert_eq!(flow.find_start_node().unwrap().id, "start");
        assert_eq!(flow.nodes_of_type(NodeType::End).count(), 1);
        assert!(Flow::new("e", "Empty").find_start_node().is_none());
    }
}
