//! Flow storage with file persistence.
//!
//! Flows live in memory for fast access, optionally mirrored to one pretty
//! JSON file per flow (`<dir>/<id>.json`) so they survive restarts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Flow;

/// Metadata for a flow (for listing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMetadata {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub node_count: usize,
}

impl From<&Flow> for FlowMetadata {
    fn from(flow: &Flow) -> Self {
        Self {
            id: flow.id.clone(),
            name: flow.name.clone(),
            description: flow.description.clone(),
            node_count: flow.nodes.len(),
        }
    }
}

/// In-memory flow store with optional file persistence.
///
/// # Example
///
/// ```ignore
/// let mut store = FlowStore::with_persistence(".flows");
/// let count = store.load_from_disk()?;
///
/// // Persisted immediately
/// store.save(flow)?;
/// ```
#[derive(Debug, Default)]
pub struct FlowStore {
    /// Stored flows, keyed by ID.
    flows: HashMap<String, Flow>,
    /// Optional directory for file persistence.
    persist_path: Option<PathBuf>,
}

impl FlowStore {
    /// Create a new in-memory store without persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that persists to the given directory.
    ///
    /// The directory will be created if it doesn't exist when saving.
    pub fn with_persistence(path: impl AsRef<Path>) -> Self {
        Self {
            flows: HashMap::new(),
            persist_path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// Load all flows from the persistence directory.
    ///
    /// Files that fail to parse are skipped with a warning. Returns the
    /// number of flows loaded.
    pub fn load_from_disk(&mut self) -> Result<usize> {
        let Some(ref path) = self.persist_path else {
            return Ok(0);
        };

        if !path.exists() {
            return Ok(0);
        }

        let mut count = 0;
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.extension().is_some_and(|e| e == "json") {
                let content = std::fs::read_to_string(&file_path)?;
                match Flow::from_json(&content) {
                    Ok(flow) => {
                        log::info!("Loaded flow '{}' from {:?}", flow.id, file_path);
                        self.flows.insert(flow.id.clone(), flow);
                        count += 1;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse flow from {:?}: {}", file_path, e);
                    }
                }
            }
        }
        Ok(count)
    }

    fn save_to_disk(&self, flow: &Flow) -> Result<()> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };

        std::fs::create_dir_all(path)?;
        let file_path = path.join(format!("{}.json", flow.id));
        std::fs::write(&file_path, flow.to_json()?)?;
        log::debug!("Saved flow '{}' to {:?}", flow.id, file_path);
        Ok(())
    }

    fn delete_from_disk(&self, id: &str) -> Result<()> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };

        let file_path = path.join(format!("{}.json", id));
        if file_path.exists() {
            std::fs::remove_file(&file_path)?;
            log::debug!("Deleted flow '{}' from {:?}", id, file_path);
        }
        Ok(())
    }

    /// Get a flow by ID.
    pub fn get(&self, id: &str) -> Option<&Flow> {
        self.flows.get(id)
    }

    /// Insert or replace a flow, persisting it if enabled.
    pub fn save(&mut self, flow: Flow) -> Result<()> {
        self.save_to_disk(&flow)?;
        self.flows.insert(flow.id.clone(), flow);
        Ok(())
    }

    /// Remove a flow by ID.
    ///
    /// Returns the removed flow if it existed.
    pub fn delete(&mut self, id: &str) -> Result<Option<Flow>> {
        self.delete_from_disk(id)?;
        Ok(self.flows.remove(id))
    }

    /// List all flows, sorted by name.
    pub fn list(&self) -> Vec<FlowMetadata> {
        let mut list: Vec<FlowMetadata> = self.flows.values().map(FlowMetadata::from).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub fn contains(&self, id: &str) -> bool {
        self.flows.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

/// File name used when exporting a flow: its name with whitespace runs
/// replaced by `_`.
pub fn export_file_name(flow: &Flow) -> String {
    let mut stem = String::with_capacity(flow.name.len());
    let mut in_whitespace = false;
    for c in flow.name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                stem.push('_');
            }
            in_whitespace = true;
        } else {
            stem.push(c);
            in_whitespace = false;
        }
    }
    format!("{}.json", stem)
}

/// Write a flow to `dir` as pretty JSON, returning the file path.
pub fn export_flow(flow: &Flow, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let file_path = dir.join(export_file_name(flow));
    std::fs::write(&file_path, flow.to_json()?)?;
    log::info!("Exported flow '{}' to {:?}", flow.id, file_path);
    Ok(file_path)
}

/// Read a flow from a JSON file.
pub fn import_flow(path: impl AsRef<Path>) -> Result<Flow> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let flow = Flow::from_json(&content)?;
    log::info!("Imported flow '{}' from {:?}", flow.id, path.as_ref());
    Ok(flow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FlowBuilder;
    use tempfile::TempDir;

    fn create_test_flow(id: &str, name: &str) -> Flow {
        FlowBuilder::new(id, name)
            .add_start("start", (0.0, 0.0))
            .add_end("end", (100.0, 0.0))
            .connect("start", "end")
            .build()
    }

    #[test]
    fn test_in_memory_store() {
        let mut store = FlowStore::new();

        store.save(create_test_flow("b", "Beta")).unwrap();
        store.save(create_test_flow("a", "Alpha")).unwrap();

        assert!(store.get("a").is_some());
        assert!(store.get("nonexistent").is_none());
        assert!(store.contains("b"));

        let names: Vec<String> = store.list().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
        assert_eq!(store.list()[0].node_count, 2);

        let removed = store.delete("a").unwrap();
        assert!(removed.is_some());
        assert!(!store.contains("a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_save_replaces() {
        let mut store = FlowStore::new();
        store.save(create_test_flow("a", "First")).unwrap();
        store.save(create_test_flow("a", "Second")).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").map(|f| f.name.as_str()), Some("Second"));
    }

    #[test]
    fn test_persistent_store() {
        let temp_dir = TempDir::new().unwrap();
        let persist_path = temp_dir.path().join("flows");

        {
            let mut store = FlowStore::with_persistence(&persist_path);
            store.save(create_test_flow("persist-test", "Persistent")).unwrap();
            store.save(create_test_flow("gone", "Deleted")).unwrap();
            store.delete("gone").unwrap();
        }
        std::fs::write(persist_path.join("junk.json"), "{ not a flow").unwrap();

        let mut store = FlowStore::with_persistence(&persist_path);
        let count = store.load_from_disk().unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            store.get("persist-test"),
            Some(&create_test_flow("persist-test", "Persistent"))
        );
    }

    #[test]
    fn test_missing_directory_loads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FlowStore::with_persistence(temp_dir.path().join("absent"));
        assert_eq!(store.load_from_disk().unwrap(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_export_and_import() {
        let temp_dir = TempDir::new().unwrap();
        let flow = create_test_flow("f1", "My  checkout\tflow");

        let path = export_flow(&flow, temp_dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "My_checkout_flow.json");

        let imported = import_flow(&path).unwrap();
        assert_eq!(imported, flow);
    }

    #[test]
    fn test_export_file_name_keeps_edge_whitespace() {
        let flow = Flow::new("f", " Daily sync ");
        assert_eq!(export_file_name(&flow), "_Daily_sync_.json");
    }

    #[test]
    fn test_import_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "[]").unwrap();

        assert!(import_flow(&path).is_err());
        assert!(import_flow(temp_dir.path().join("missing.json")).is_err());
    }
}
