//! Flow executor.
//!
//! Walks a flow from its START node, one node at a time, until it reaches an
//! END node, runs out of connections, fails, or exhausts its step budget.
//! Progress is reported through an [`EventSink`] and the id of the node being
//! executed is published on a watch channel.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{watch, Mutex};

use crate::config::ExecutorConfig;
use crate::context::ExecutionContext;
use crate::events::{EventSink, LogEntry, LogStatus};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::nodes::{execute_node, NodeScope, Route};
use crate::types::{Flow, FlowNode, NodeId};
use crate::validation::validate_flow;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "status",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum RunOutcome {
    /// An END node was reached.
    Success { node_id: NodeId },
    /// Traversal had nowhere to go.
    Stopped { node_id: NodeId, reason: String },
    /// A node failed, the step budget ran out, or the flow could not start.
    Failed {
        node_id: Option<NodeId>,
        error: String,
    },
    /// Another run was already in progress on this executor.
    Rejected,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }

    /// Node where traversal ended, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            RunOutcome::Success { node_id } | RunOutcome::Stopped { node_id, .. } => {
                Some(node_id.as_str())
            }
            RunOutcome::Failed { node_id, .. } => node_id.as_deref(),
            RunOutcome::Rejected => None,
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub execution_id: String,
    pub outcome: RunOutcome,
    /// Number of nodes executed.
    pub nodes_executed: u32,
    /// Total execution time in milliseconds.
    pub execution_time_ms: u64,
}

impl RunReport {
    fn new(
        execution_id: String,
        outcome: RunOutcome,
        nodes_executed: u32,
        started: Instant,
    ) -> Self {
        Self {
            execution_id,
            outcome,
            nodes_executed,
            execution_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Executor for flows.
///
/// One executor runs at most one flow at a time; a call to [`run`] made while
/// another is in flight returns [`RunOutcome::Rejected`] without side effects.
///
/// [`run`]: FlowExecutor::run
pub struct FlowExecutor {
    http: Arc<dyn HttpClient>,
    event_sink: Arc<dyn EventSink>,
    config: ExecutorConfig,
    /// Node currently executing, `None` when idle
    active_node: watch::Sender<Option<NodeId>>,
    /// Held for the duration of a run
    run_slot: Mutex<()>,
}

impl FlowExecutor {
    /// Create an executor with the default configuration and HTTP client.
    pub fn new(event_sink: Arc<dyn EventSink>) -> Self {
        let (active_node, _) = watch::channel(None);
        Self {
            http: Arc::new(ReqwestHttpClient::new()),
            event_sink,
            config: ExecutorConfig::default(),
            active_node,
            run_slot: Mutex::new(()),
        }
    }

    /// Set the HTTP client used by API nodes.
    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = http;
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the pause between node executions (0 disables it).
    pub fn with_pacing(mut self, pacing_ms: u64) -> Self {
        self.config.pacing_ms = pacing_ms;
        self
    }

    /// Set the maximum number of nodes to execute.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.config.max_steps = max_steps;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Id of the node currently executing.
    pub fn active_node(&self) -> Option<NodeId> {
        self.active_node.borrow().clone()
    }

    /// Watch the active node as it changes.
    pub fn subscribe_active_node(&self) -> watch::Receiver<Option<NodeId>> {
        self.active_node.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.run_slot.try_lock().is_err()
    }

    /// Execute a flow with an empty context.
    pub async fn run(&self, flow: &Flow) -> RunReport {
        self.run_with_context(flow, Map::new()).await
    }

    /// Execute a flow with initial variables.
    pub async fn run_with_context(&self, flow: &Flow, variables: Map<String, Value>) -> RunReport {
        let started = Instant::now();
        let execution_id = format!("flow-exec-{}", uuid::Uuid::new_v4());

        let Ok(_slot) = self.run_slot.try_lock() else {
            log::warn!("Flow '{}' rejected: another run is in progress", flow.id);
            return RunReport::new(execution_id, RunOutcome::Rejected, 0, started);
        };

        log::info!("Flow execution {} started for '{}'", execution_id, flow.id);
        let (outcome, nodes_executed) = self.execute(flow, variables, &execution_id).await;
        log::info!(
            "Flow execution {} finished after {} nodes: {:?}",
            execution_id,
            nodes_executed,
            outcome
        );

        RunReport::new(execution_id, outcome, nodes_executed, started)
    }

    async fn execute(
        &self,
        flow: &Flow,
        variables: Map<String, Value>,
        execution_id: &str,
    ) -> (RunOutcome, u32) {
        if self.config.require_valid {
            let errors: Vec<String> = validate_flow(flow)
                .into_iter()
                .filter(|d| d.is_error())
                .map(|d| d.message)
                .collect();
            if !errors.is_empty() {
                let error = format!("Flow failed validation: {}", errors.join(" "));
                self.emit_system(execution_id, &error, LogStatus::Error);
                return (RunOutcome::Failed { node_id: None, error }, 0);
            }
        }

        let Some(start) = flow.find_start_node() else {
            let error = "No Start node found in flow".to_string();
            self.emit_system(execution_id, &error, LogStatus::Error);
            return (RunOutcome::Failed { node_id: None, error }, 0);
        };

        self.emit_system(
            execution_id,
            format!("Starting flow \"{}\"", flow.name),
            LogStatus::Info,
        );

        let mut context = ExecutionContext::with_variables(variables);
        let outcome = self.traverse(flow, start, &mut context, execution_id).await;
        self.active_node.send_replace(None);
        outcome
    }

    async fn traverse(
        &self,
        flow: &Flow,
        start: &FlowNode,
        context: &mut ExecutionContext,
        execution_id: &str,
    ) -> (RunOutcome, u32) {
        let mut nodes_executed: u32 = 0;
        let mut current = start;

        loop {
            let scope = NodeScope {
                execution_id,
                node: current,
                event_sink: self.event_sink.as_ref(),
            };

            // Check execution limit
            if nodes_executed >= self.config.max_steps {
                let error = format!("Step limit reached ({} nodes)", self.config.max_steps);
                scope.log(&error, LogStatus::Error);
                let outcome = RunOutcome::Failed {
                    node_id: Some(current.id.clone()),
                    error,
                };
                return (outcome, nodes_executed);
            }

            self.active_node.send_replace(Some(current.id.clone()));
            scope.log(format!("Executing {}", current.node_type), LogStatus::Info);
            nodes_executed += 1;

            let result = match execute_node(&scope, context, self.http.as_ref()).await {
                Ok(result) => result,
                Err(e) => {
                    let error = e.to_string();
                    log::warn!("Node '{}' failed: {}", current.id, error);
                    scope.log(format!("Error: {}", error), LogStatus::Error);
                    let outcome = RunOutcome::Failed {
                        node_id: Some(current.id.clone()),
                        error,
                    };
                    return (outcome, nodes_executed);
                }
            };

            if let Some(message) = &result.message {
                log::debug!("Node '{}': {}", current.id, message);
            }

            let port = match result.route {
                Route::End => {
                    scope.log("Flow completed successfully", LogStatus::Success);
                    let outcome = RunOutcome::Success {
                        node_id: current.id.clone(),
                    };
                    return (outcome, nodes_executed);
                }
                Route::Next => None,
                Route::Port(port) => Some(port),
            };

            let next = match flow.next_connection(&current.id, port.as_deref()) {
                None => Err(match &port {
                    Some(port) => format!("No connection for port \"{}\"; flow stopped", port),
                    None => "No outgoing connection; flow stopped".to_string(),
                }),
                Some(connection) => flow.find_node(&connection.target).ok_or_else(|| {
                    format!(
                        "Connection \"{}\" targets unknown node \"{}\"; flow stopped",
                        connection.id, connection.target
                    )
                }),
            };

            current = match next {
                Ok(node) => node,
                Err(reason) => {
                    scope.log(&reason, LogStatus::Warning);
                    let outcome = RunOutcome::Stopped {
                        node_id: current.id.clone(),
                        reason,
                    };
                    return (outcome, nodes_executed);
                }
            };

            if self.config.pacing_ms > 0 {
                tokio::time::sleep(self.config.pacing()).await;
            }
        }
    }

    fn emit_system(&self, execution_id: &str, message: impl Into<String>, status: LogStatus) {
        let _ = self
            .event_sink
            .send(LogEntry::system(execution_id, message, status));
    }
}
