//! Workspace metadata.
//!
//! The surrounding daemon tracks workspaces in its own database; the engine
//! only needs two calls from it, expressed here as the [`WorkspaceMetaStore`]
//! trait. [`JsonMetaStore`] is the built-in file-backed implementation used
//! by the CLI and by tests.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{IndexError, IndexResult};

/// Indexing state of a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Building,
    Success,
    Failed,
}

impl BuildState {
    /// External status string for this state.
    pub fn as_status(&self) -> &'static str {
        match self {
            Self::Building => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Per-workspace bookkeeping the indexer maintains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub workspace_path: String,
    pub total_files: usize,
    pub state: BuildState,
    pub last_indexed_at: i64,
}

/// The seam to the external workspace store.
pub trait WorkspaceMetaStore: Send + Sync {
    fn get_by_path(&self, workspace: &str) -> Option<WorkspaceRecord>;

    fn update_codegraph_info(
        &self,
        workspace: &str,
        total_files: usize,
        state: BuildState,
    ) -> IndexResult<()>;
}

/// JSON-file-backed metadata store.
pub struct JsonMetaStore {
    path: PathBuf,
    records: Mutex<HashMap<String, WorkspaceRecord>>,
}

impl JsonMetaStore {
    /// Open (or create) the metadata file under `data_dir`.
    pub fn open(data_dir: &Path) -> IndexResult<Self> {
        let path = data_dir.join("workspaces.json");
        let records = if path.is_file() {
            let raw = std::fs::read_to_string(&path).map_err(|e| IndexError::FileRead {
                path: path.clone(),
                source: e,
            })?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "unreadable workspace metadata, starting fresh: {e}");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    fn persist(&self, records: &HashMap<String, WorkspaceRecord>) -> IndexResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::FileWrite {
                path: self.path.clone(),
                source: e,
            })?;
        }
        let rendered = serde_json::to_string_pretty(records)
            .map_err(|e| IndexError::General(format!("failed to serialize metadata: {e}")))?;
        std::fs::write(&self.path, rendered).map_err(|e| IndexError::FileWrite {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl WorkspaceMetaStore for JsonMetaStore {
    fn get_by_path(&self, workspace: &str) -> Option<WorkspaceRecord> {
        self.records.lock().get(workspace).cloned()
    }

    fn update_codegraph_info(
        &self,
        workspace: &str,
        total_files: usize,
        state: BuildState,
    ) -> IndexResult<()> {
        let mut records = self.records.lock();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        records.insert(
            workspace.to_string(),
            WorkspaceRecord {
                workspace_path: workspace.to_string(),
                total_files,
                state,
                last_indexed_at: now,
            },
        );
        self.persist(&records)
    }
}
