//! Node execution logic.
//!
//! One handler per node type. Handlers mutate the execution context, emit
//! their own progress entries, and tell the executor which way to go next.

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::events::{EventSink, LogEntry, LogStatus};
use crate::expression::{eval_condition, run_script};
use crate::http::{HttpClient, HttpRequest};
use crate::types::{FlowNode, NodeType, PORT_FALSE, PORT_TRUE};

/// Where traversal goes after a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// First outgoing connection, whatever its port
    Next,
    /// Outgoing connection tagged with this port
    Port(String),
    /// Run is complete
    End,
}

/// Result of executing a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeExecutionResult {
    pub route: Route,
    /// Optional message describing what happened.
    pub message: Option<String>,
}

impl NodeExecutionResult {
    /// Continue through the first outgoing connection.
    pub fn next() -> Self {
        Self {
            route: Route::Next,
            message: None,
        }
    }

    /// Continue through a tagged port.
    pub fn port(port: impl Into<String>) -> Self {
        Self {
            route: Route::Port(port.into()),
            message: None,
        }
    }

    pub fn end() -> Self {
        Self {
            route: Route::End,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// The node being executed, plus where its log entries go.
pub struct NodeScope<'a> {
    pub execution_id: &'a str,
    pub node: &'a FlowNode,
    pub event_sink: &'a dyn EventSink,
}

impl NodeScope<'_> {
    /// Emit an entry attributed to this node.
    pub fn log(&self, message: impl Into<String>, status: LogStatus) {
        let _ = self.event_sink.send(LogEntry::for_node(
            self.execution_id,
            self.node,
            message,
            status,
        ));
    }
}

/// Execute a Start or Task node.
///
/// These carry no side effect and pass through to the next node.
pub fn execute_passthrough(scope: &NodeScope<'_>) -> Result<NodeExecutionResult> {
    Ok(NodeExecutionResult::next().with_message(format!("{} passed", scope.node.node_type)))
}

/// Execute an End node.
pub fn execute_end(_scope: &NodeScope<'_>) -> Result<NodeExecutionResult> {
    Ok(NodeExecutionResult::end().with_message("Flow completed"))
}

/// Execute a Script node.
///
/// Statements run against the context in order. Missing or blank script text
/// is a no-op.
pub fn execute_script(
    scope: &NodeScope<'_>,
    context: &mut ExecutionContext,
) -> Result<NodeExecutionResult> {
    let Some(script) = non_blank(scope.node.data.script.as_deref()) else {
        return Ok(NodeExecutionResult::next().with_message("Empty script"));
    };

    run_script(script, context)?;
    Ok(NodeExecutionResult::next().with_message("Script executed"))
}

/// Execute a Decision node.
///
/// The condition's truthiness picks the "true" or "false" port. Missing or
/// blank condition text is false.
pub fn execute_decision(
    scope: &NodeScope<'_>,
    context: &ExecutionContext,
) -> Result<NodeExecutionResult> {
    let condition_met = match non_blank(scope.node.data.condition.as_deref()) {
        Some(condition) => eval_condition(condition, context)?,
        None => false,
    };

    scope.log(
        format!("Condition evaluated to: {}", condition_met),
        LogStatus::Info,
    );

    let port = if condition_met { PORT_TRUE } else { PORT_FALSE };
    Ok(NodeExecutionResult::port(port))
}

/// Execute an Api node.
///
/// Sends one request and stores the parsed body under the node's id. A node
/// without API configuration is a no-op.
pub async fn execute_api(
    scope: &NodeScope<'_>,
    context: &mut ExecutionContext,
    http: &dyn HttpClient,
) -> Result<NodeExecutionResult> {
    let Some(config) = scope.node.data.api_config.as_ref() else {
        return Ok(NodeExecutionResult::next().with_message("No API configuration"));
    };

    let request = HttpRequest::from_config(config);
    scope.log(
        format!("Calling API: {} {}", request.method, request.url),
        LogStatus::Info,
    );

    let response = http.send(request).await?;
    context.store_response(scope.node.id.clone(), response);

    scope.log("API response received", LogStatus::Success);
    Ok(NodeExecutionResult::next())
}

/// Execute a node based on its type.
pub async fn execute_node(
    scope: &NodeScope<'_>,
    context: &mut ExecutionContext,
    http: &dyn HttpClient,
) -> Result<NodeExecutionResult> {
    match scope.node.node_type {
        NodeType::Start | NodeType::Task => execute_passthrough(scope),
        NodeType::Script => execute_script(scope, context),
        NodeType::Decision => execute_decision(scope, context),
        NodeType::Api => execute_api(scope, context, http).await,
        NodeType::End => execute_end(scope),
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|s| !s.trim().is_empty())
}
