//! Log entries streamed during flow execution
//!
//! Entries are sent from the engine to the editor (or any consumer)
//! to report progress, branch decisions, errors and the run outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::config::{defaults, system};
use crate::types::FlowNode;

/// Trait for sending log entries
///
/// This abstracts over the transport mechanism (broadcast channel, UI
/// bridge, etc.) allowing the engine to be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send a log entry
    ///
    /// Returns an error if the entry could not be sent (e.g., channel closed)
    fn send(&self, entry: LogEntry) -> Result<(), EventError>;
}

/// Error when sending log entries fails
#[derive(Debug, Clone, Error)]
#[error("Event error: {message}")]
pub struct EventError {
    pub message: String,
}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Status of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Info,
    Success,
    Warning,
    Error,
}

/// One entry of the execution log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// Run that produced this entry
    pub execution_id: String,
    /// Node id, or `"system"` for run-level entries
    pub node_id: String,
    pub node_label: String,
    pub message: String,
    pub status: LogStatus,
}

impl LogEntry {
    /// Create an entry attributed to a node
    pub fn for_node(
        execution_id: &str,
        node: &FlowNode,
        message: impl Into<String>,
        status: LogStatus,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            execution_id: execution_id.to_string(),
            node_id: node.id.clone(),
            node_label: node.data.label.clone(),
            message: message.into(),
            status,
        }
    }

    /// Create a run-level entry
    pub fn system(execution_id: &str, message: impl Into<String>, status: LogStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            execution_id: execution_id.to_string(),
            node_id: system::NODE_ID.to_string(),
            node_label: system::LABEL.to_string(),
            message: message.into(),
            status,
        }
    }

    pub fn is_system(&self) -> bool {
        self.node_id == system::NODE_ID
    }
}

/// A no-op event sink that discards all entries
///
/// Useful for testing or when logs aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _entry: LogEntry) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects entries
///
/// Useful for testing to verify entries were emitted correctly.
pub struct VecEventSink {
    entries: std::sync::Mutex<Vec<LogEntry>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            entries: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected entries
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Clear all collected entries
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, entry: LogEntry) -> Result<(), EventError> {
        self.lock().push(entry);
        Ok(())
    }
}

/// Fan-out event sink backed by a broadcast channel
///
/// Any number of observers can subscribe. Subscribers only see entries sent
/// after they subscribed; a subscriber that falls more than the channel
/// capacity behind loses the oldest entries.
pub struct BroadcastEventSink {
    sender: broadcast::Sender<LogEntry>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to entries sent from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(defaults::LOG_CHANNEL_CAPACITY)
    }
}

impl EventSink for BroadcastEventSink {
    fn send(&self, entry: LogEntry) -> Result<(), EventError> {
        // Nobody listening is not a failure
        let _ = self.sender.send(entry);
        Ok(())
    }
}

/// Single-consumer event sink backed by an unbounded mpsc channel
///
/// Unlike [`BroadcastEventSink`] nothing is ever dropped, and sending fails
/// once the receiver is gone.
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<LogEntry>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogEntry>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, entry: LogEntry) -> Result<(), EventError> {
        self.sender
            .send(entry)
            .map_err(|_| EventError::channel_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeType;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();
        let node = FlowNode::new("task1", NodeType::Task, (0.0, 0.0));

        sink.send(LogEntry::for_node("exec1", &node, "Executing TASK", LogStatus::Info))
            .unwrap();

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].node_id, "task1");
        assert_eq!(entries[0].node_label, "TASK");
        assert!(!entries[0].is_system());

        sink.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        // Should not panic
        sink.send(LogEntry::system("exec1", "hello", LogStatus::Info))
            .unwrap();
    }

    #[test]
    fn test_serialized_entry() {
        let entry = LogEntry::system("exec1", "Execution ended", LogStatus::Warning);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["nodeId"], "system");
        assert_eq!(value["nodeLabel"], "System");
        assert_eq!(value["status"], "warning");
    }

    #[tokio::test]
    async fn test_channel_event_sink() {
        let (sink, mut receiver) = ChannelEventSink::new();

        sink.send(LogEntry::system("exec1", "queued", LogStatus::Info))
            .unwrap();
        assert_eq!(receiver.recv().await.unwrap().message, "queued");

        drop(receiver);
        let err = sink
            .send(LogEntry::system("exec1", "lost", LogStatus::Info))
            .unwrap_err();
        assert_eq!(err.message, "Channel closed");
        assert_eq!(err.to_string(), "Event error: Channel closed");
    }

    #[tokio::test]
    async fn test_broadcast_fan_out() {
        let sink = BroadcastEventSink::new(8);

        // No subscribers yet: dropped silently
        sink.send(LogEntry::system("exec1", "early", LogStatus::Info))
            .unwrap();

        let mut first = sink.subscribe();
        let mut second = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 2);

        sink.send(LogEntry::system("exec1", "one", LogStatus::Info))
            .unwrap();
        sink.send(LogEntry::system("exec1", "two", LogStatus::Success))
            .unwrap();

        for receiver in [&mut first, &mut second] {
            assert_eq!(receiver.recv().await.unwrap().message, "one");
            assert_eq!(receiver.recv().await.unwrap().message, "two");
        }
    }
}
