use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::store::{apply_status_transition, build_initial_state, StateStore, StoreError};
use super::value::StateData;
use super::workflow_state::{OwnerContext, WorkflowState, WorkflowStatus};

/// Process-local store. Each operation holds the map lock for its whole
/// read-modify-write, so per-id updates are atomic.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<String, WorkflowState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn create(
        &self,
        workflow_type: &str,
        input: &StateData,
        owner: &OwnerContext,
    ) -> Result<WorkflowState, StoreError> {
        let state = build_initial_state(workflow_type, input, owner);
        self.states
            .write()
            .await
            .insert(state.id.clone(), state.clone());
        debug!(workflow_id = %state.id, workflow_type = %workflow_type, "Created workflow state");
        Ok(state)
    }

    async fn save(&self, state: &WorkflowState) -> Result<(), StoreError> {
        self.states
            .write()
            .await
            .insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<WorkflowState, StoreError> {
        self.states
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn transition_status(
        &self,
        id: &str,
        expected: WorkflowStatus,
        next: WorkflowStatus,
    ) -> Result<WorkflowState, StoreError> {
        let mut states = self.states.write().await;
        let state = states
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        apply_status_transition(state, expected, next)?;
        Ok(state.clone())
    }

    async fn list(&self) -> Result<Vec<WorkflowState>, StoreError> {
        let mut states: Vec<WorkflowState> = self.states.read().await.values().cloned().collect();
        states.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_data;

    #[tokio::test]
    async fn test_create_save_and_reload() {
        let store = InMemoryStateStore::new();
        let mut state = store
            .create("dispatcher", &state_data! { "title" => "x" }, &OwnerContext::team("t1"))
            .await
            .unwrap();
        assert_eq!(state.state_data["title"].as_str(), Some("x"));

        state.current_node = "analyze".to_string();
        store.save(&state).await.unwrap();

        let reloaded = store.reload(&state).await.unwrap();
        assert_eq!(reloaded.current_node, "analyze");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let store = InMemoryStateStore::new();
        let result = store.load("nope").await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_transition_status_is_guarded() {
        let store = InMemoryStateStore::new();
        let mut state = store
            .create("dispatcher", &StateData::new(), &OwnerContext::team("t1"))
            .await
            .unwrap();
        state.status = WorkflowStatus::Paused;
        store.save(&state).await.unwrap();

        let resumed = store
            .transition_status(&state.id, WorkflowStatus::Paused, WorkflowStatus::Running)
            .await
            .unwrap();
        assert_eq!(resumed.status, WorkflowStatus::Running);

        let second = store
            .transition_status(&state.id, WorkflowStatus::Paused, WorkflowStatus::Running)
            .await;
        assert!(matches!(
            second,
            Err(StoreError::StatusConflict { found: WorkflowStatus::Running, .. })
        ));
    }
}
