use async_trait::async_trait;
use fd_lock::RwLock;
use std::fs::{self as std_fs, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::store::{apply_status_transition, build_initial_state, StateStore, StoreError};
use super::value::StateData;
use super::workflow_state::{OwnerContext, WorkflowState, WorkflowStatus};

const STATE_SUFFIX: &str = ".state.json";

/// JSON-file store, one document per run.
///
/// Writes go to a temporary file and are renamed into place. Every mutation
/// holds an exclusive `fd-lock` on `<id>.lock`, so status-guarded transitions
/// stay atomic across processes sharing the directory.
#[derive(Debug, Clone)]
pub struct FileSystemStateStore {
    directory: PathBuf,
}

impl FileSystemStateStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn state_file_path(&self, id: &str) -> PathBuf {
        self.directory.join(format!("{id}{STATE_SUFFIX}"))
    }

    fn validate_id(id: &str) -> Result<(), StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(StoreError::InvalidId { id: id.to_string() })
        }
    }

    /// Run `mutate` against the stored record while holding the per-id lock.
    /// `mutate` receives `None` when no record exists yet.
    async fn locked_update<F>(&self, id: &str, mutate: F) -> Result<WorkflowState, StoreError>
    where
        F: FnOnce(Option<WorkflowState>) -> Result<WorkflowState, StoreError> + Send + 'static,
    {
        Self::validate_id(id)?;
        let directory = self.directory.clone();
        let id = id.to_string();

        tokio::task::spawn_blocking(move || {
            std_fs::create_dir_all(&directory)?;
            let lock_file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(directory.join(format!("{id}.lock")))?;
            let mut lock = RwLock::new(lock_file);
            let _guard = lock.write()?;

            let state_file = directory.join(format!("{id}{STATE_SUFFIX}"));
            let current = match std_fs::read_to_string(&state_file) {
                Ok(contents) => Some(serde_json::from_str::<WorkflowState>(&contents)?),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(StoreError::IoError(e)),
            };

            let updated = mutate(current)?;
            let serialized = serde_json::to_string_pretty(&updated)?;

            // Write to temporary file first, then rename (atomic operation)
            let temp_file = directory.join(format!("{id}{STATE_SUFFIX}.tmp"));
            std_fs::write(&temp_file, serialized)?;
            std_fs::rename(&temp_file, &state_file)?;
            Ok(updated)
        })
        .await?
    }
}

#[async_trait]
impl StateStore for FileSystemStateStore {
    async fn create(
        &self,
        workflow_type: &str,
        input: &StateData,
        owner: &OwnerContext,
    ) -> Result<WorkflowState, StoreError> {
        let state = build_initial_state(workflow_type, input, owner);
        let fresh = state.clone();
        let created = self.locked_update(&state.id, move |_| Ok(fresh)).await?;

        info!(
            workflow_id = %created.id,
            workflow_type = %workflow_type,
            file = ?self.state_file_path(&created.id),
            "Workflow state created"
        );
        Ok(created)
    }

    async fn save(&self, state: &WorkflowState) -> Result<(), StoreError> {
        let to_save = state.clone();
        self.locked_update(&state.id, move |_| Ok(to_save)).await?;

        debug!(
            workflow_id = %state.id,
            current_node = %state.current_node,
            status = %state.status,
            "Workflow state saved"
        );
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<WorkflowState, StoreError> {
        Self::validate_id(id)?;
        let state_file = self.state_file_path(id);

        let contents = match fs::read_to_string(&state_file).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { id: id.to_string() })
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&contents)?)
    }

    async fn transition_status(
        &self,
        id: &str,
        expected: WorkflowStatus,
        next: WorkflowStatus,
    ) -> Result<WorkflowState, StoreError> {
        let missing_id = id.to_string();
        let updated = self
            .locked_update(id, move |current| {
                let mut state = current.ok_or(StoreError::NotFound { id: missing_id })?;
                apply_status_transition(&mut state, expected, next)?;
                Ok(state)
            })
            .await?;

        info!(
            workflow_id = %id,
            from_status = %expected,
            to_status = %next,
            "Workflow status transitioned"
        );
        Ok(updated)
    }

    async fn list(&self) -> Result<Vec<WorkflowState>, StoreError> {
        if !self.directory.exists() {
            return Ok(vec![]);
        }

        let mut states = Vec::new();
        let mut entries = fs::read_dir(&self.directory).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(STATE_SUFFIX) {
                continue;
            }

            match fs::read_to_string(&path).await {
                Ok(contents) => match serde_json::from_str::<WorkflowState>(&contents) {
                    Ok(state) => states.push(state),
                    Err(e) => warn!(file = ?path, error = %e, "Skipping unreadable state file"),
                },
                Err(e) => warn!(file = ?path, error = %e, "Failed to read state file"),
            }
        }

        states.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(states)
    }
}
