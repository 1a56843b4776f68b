use async_trait::async_trait;
use thiserror::Error;

use super::value::StateData;
use super::workflow_state::{OwnerContext, WorkflowState, WorkflowStatus};

/// Errors raised by state persistence backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Workflow state not found: {id}")]
    NotFound { id: String },

    #[error("Invalid workflow state id: {id}")]
    InvalidId { id: String },

    #[error("Status conflict for {id}: expected {expected}, found {found}")]
    StatusConflict {
        id: String,
        expected: WorkflowStatus,
        found: WorkflowStatus,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

/// Durable storage for workflow runs, keyed by state id.
///
/// Implementations must make `save` and `transition_status` atomic per id;
/// the engine relies on `transition_status` to keep two concurrent resumes
/// from both advancing the same run.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Create and persist a fresh run whose `state_data` starts as `input`.
    async fn create(
        &self,
        workflow_type: &str,
        input: &StateData,
        owner: &OwnerContext,
    ) -> Result<WorkflowState, StoreError>;

    /// Persist the full record, replacing what is stored under its id.
    async fn save(&self, state: &WorkflowState) -> Result<(), StoreError>;

    /// Load a run by id.
    async fn load(&self, id: &str) -> Result<WorkflowState, StoreError>;

    /// Re-fetch the authoritative copy of `state`.
    async fn reload(&self, state: &WorkflowState) -> Result<WorkflowState, StoreError> {
        self.load(&state.id).await
    }

    /// Conditionally move a run from `expected` to `next`. Fails with
    /// [`StoreError::StatusConflict`] when the stored status differs.
    async fn transition_status(
        &self,
        id: &str,
        expected: WorkflowStatus,
        next: WorkflowStatus,
    ) -> Result<WorkflowState, StoreError>;

    /// All stored runs, oldest first.
    async fn list(&self) -> Result<Vec<WorkflowState>, StoreError>;
}

pub(crate) fn new_state_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn build_initial_state(
    workflow_type: &str,
    input: &StateData,
    owner: &OwnerContext,
) -> WorkflowState {
    let mut state = WorkflowState::new(new_state_id(), workflow_type, owner);
    state.state_data = input.clone();
    state
}

/// Apply a status-guarded transition to an in-hand record.
pub(crate) fn apply_status_transition(
    state: &mut WorkflowState,
    expected: WorkflowStatus,
    next: WorkflowStatus,
) -> Result<(), StoreError> {
    if state.status != expected {
        return Err(StoreError::StatusConflict {
            id: state.id.clone(),
            expected,
            found: state.status,
        });
    }
    state.status = next;
    state.touch();
    Ok(())
}
