//! Run state persistence.
//!
//! The executor talks to storage through the [`RunStore`] trait and treats
//! every `save` as synchronous: a node never starts before its `running`
//! state is durable, and an output is never visible to dependents before its
//! `succeeded` state is durable.

use crate::state::GraphRunRecord;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use weft_core::{GraphId, RunId};

/// Errors from a run store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to load run state: {0}")]
    LoadFailed(String),

    #[error("failed to save run state: {0}")]
    SaveFailed(String),

    #[error("run state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::SaveFailed(err.to_string())
    }
}

/// Persistence collaborator for the graph executor.
pub trait RunStore: Send + Sync {
    /// Load the record for `(graph_id, run_id)`, if one was ever saved.
    fn load(&self, graph_id: &GraphId, run_id: &RunId)
    -> Result<Option<GraphRunRecord>, StoreError>;

    /// Durably persist the record, replacing any previous version.
    fn save(&self, record: &GraphRunRecord) -> Result<(), StoreError>;

    /// All records for a graph, most recently updated first.
    fn list(&self, graph_id: &GraphId) -> Result<Vec<GraphRunRecord>, StoreError>;

    /// The most recently updated record for a graph, if any.
    fn latest(&self, graph_id: &GraphId) -> Result<Option<GraphRunRecord>, StoreError> {
        Ok(self.list(graph_id)?.into_iter().next())
    }
}

/// Transient store for development and tests. All data is lost when the
/// process terminates.
#[derive(Clone, Default)]
pub struct InMemoryRunStore {
    records: Arc<RwLock<HashMap<(GraphId, RunId), GraphRunRecord>>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for InMemoryRunStore {
    fn load(
        &self,
        graph_id: &GraphId,
        run_id: &RunId,
    ) -> Result<Option<GraphRunRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|e| StoreError::LoadFailed(format!("lock poisoned: {e}")))?;
        Ok(records.get(&(graph_id.clone(), run_id.clone())).cloned())
    }

    fn save(&self, record: &GraphRunRecord) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StoreError::SaveFailed(format!("lock poisoned: {e}")))?;
        records.insert(
            (record.graph_id.clone(), record.run_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn list(&self, graph_id: &GraphId) -> Result<Vec<GraphRunRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|e| StoreError::LoadFailed(format!("lock poisoned: {e}")))?;
        let mut runs: Vec<GraphRunRecord> = records
            .iter()
            .filter(|((graph, _), _)| graph == graph_id)
            .map(|(_, record)| record.clone())
            .collect();
        runs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(runs)
    }
}

/// One JSON document per run under a directory. Writes go through a
/// temporary file and an atomic rename so a crash mid-save never leaves a
/// truncated record.
pub struct JsonFileRunStore {
    dir: PathBuf,
}

impl JsonFileRunStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    // Identifier validation restricts ids to [A-Za-z0-9._-], so the ids are
    // safe to embed in a file name.
    fn path_for(&self, graph_id: &GraphId, run_id: &RunId) -> PathBuf {
        self.dir.join(format!("{graph_id}__{run_id}.json"))
    }
}

impl RunStore for JsonFileRunStore {
    fn load(
        &self,
        graph_id: &GraphId,
        run_id: &RunId,
    ) -> Result<Option<GraphRunRecord>, StoreError> {
        let path = self.path_for(graph_id, run_id);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::LoadFailed(err.to_string())),
        }
    }

    fn save(&self, record: &GraphRunRecord) -> Result<(), StoreError> {
        let path = self.path_for(&record.graph_id, &record.run_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn list(&self, graph_id: &GraphId) -> Result<Vec<GraphRunRecord>, StoreError> {
        let prefix = format!("{graph_id}__");
        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| StoreError::LoadFailed(e.to_string()))? {
            let entry = entry.map_err(|e| StoreError::LoadFailed(e.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            let raw = fs::read_to_string(entry.path())
                .map_err(|e| StoreError::LoadFailed(e.to_string()))?;
            runs.push(serde_json::from_str(&raw)?);
        }
        runs.sort_by(|a: &GraphRunRecord, b: &GraphRunRecord| b.updated_at.cmp(&a.updated_at));
        Ok(runs)
    }
}
