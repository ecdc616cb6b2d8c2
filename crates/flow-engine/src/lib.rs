//! Flow Engine - runtime for visual flow graphs
//!
//! This crate executes, validates and versions the flow documents produced by
//! a node editor. It supports:
//!
//! - Sequential execution of START, TASK, DECISION, SCRIPT, API and END nodes
//! - A paced, observable run: streamed log entries plus an active-node signal
//! - Advisory structural validation (diagnostics, never errors)
//! - Clone-based undo/redo over any snapshot type
//!
//! # Architecture
//!
//! - `FlowExecutor`: walks the graph one node at a time, rejecting re-entrant runs
//! - `expression`: sandboxed language for SCRIPT statements and DECISION conditions
//! - `HttpClient`: transport seam for API nodes (reqwest by default)
//! - `EventSink`: log entry delivery (broadcast or mpsc channel, collector, or no-op)
//! - `History`: bounded undo/redo stack
//! - `FlowStore`: in-memory flows with optional JSON persistence
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flow_engine::{BroadcastEventSink, FlowBuilder, FlowExecutor};
//!
//! let flow = FlowBuilder::new("greet", "Greeting")
//!     .add_start("start", (0.0, 0.0))
//!     .add_script("set", (0.0, 100.0), "greeting = 'hello'")
//!     .add_end("end", (0.0, 200.0))
//!     .connect("start", "set")
//!     .connect("set", "end")
//!     .build();
//!
//! let sink = Arc::new(BroadcastEventSink::default());
//! let mut logs = sink.subscribe();
//! let report = FlowExecutor::new(sink).run(&flow).await;
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod executor;
pub mod expression;
pub mod history;
pub mod http;
pub mod nodes;
pub mod store;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::FlowBuilder;
pub use config::ExecutorConfig;
pub use context::ExecutionContext;
pub use error::{FlowEngineError, Result};
pub use events::{
    BroadcastEventSink, ChannelEventSink, EventError, EventSink, LogEntry, LogStatus,
    NullEventSink, VecEventSink,
};
pub use executor::{FlowExecutor, RunOutcome, RunReport};
pub use expression::ExprError;
pub use history::History;
pub use http::{HttpClient, HttpRequest, ReqwestHttpClient};
pub use store::{export_flow, import_flow, FlowMetadata, FlowStore};
pub use types::{
    ApiConfig, Connection, ConnectionId, Flow, FlowNode, HttpMethod, NodeData, NodeId, NodeType,
    Position,
};
pub use validation::{validate_flow, Diagnostic, Severity};
