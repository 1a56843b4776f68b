use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::value::{merge_state_data, StateData};
use crate::workflow::approval::ApprovalRef;

/// `current_node` value before the first step has been entered.
pub const NODE_NONE: &str = "none";

/// `current_node` value once every step has run.
pub const NODE_COMPLETED: &str = "completed";

/// Key under which a resume payload is merged into `state_data`.
pub const APPROVAL_DATA_KEY: &str = "approval_data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Running => "running",
            WorkflowStatus::Paused => "paused",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a run belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContext {
    pub team_id: String,
    pub agent_id: Option<String>,
}

impl OwnerContext {
    pub fn team(team_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            agent_id: None,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

/// Durable progress record for one workflow run.
///
/// A paused run is fully described by this record; nothing else has to stay
/// in memory between `start` and `resume`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: String,
    pub workflow_type: String,
    pub team_id: String,
    pub agent_id: Option<String>,
    pub current_node: String,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub state_data: StateData,
    #[serde(default)]
    pub pending_approval: Option<ApprovalRef>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(id: impl Into<String>, workflow_type: impl Into<String>, owner: &OwnerContext) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            workflow_type: workflow_type.into(),
            team_id: owner.team_id.clone(),
            agent_id: owner.agent_id.clone(),
            current_node: NODE_NONE.to_string(),
            status: WorkflowStatus::Running,
            state_data: StateData::new(),
            pending_approval: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn merge_data(&mut self, updates: StateData) {
        merge_state_data(&mut self.state_data, updates);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_paused(&self) -> bool {
        self.status == WorkflowStatus::Paused
    }

    pub fn is_completed(&self) -> bool {
        self.status == WorkflowStatus::Completed || self.current_node == NODE_COMPLETED
    }

    pub fn owner(&self) -> OwnerContext {
        OwnerContext {
            team_id: self.team_id.clone(),
            agent_id: self.agent_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_data;

    #[test]
    fn test_new_state_starts_before_first_step() {
        let state = WorkflowState::new("wf-1", "dispatcher", &OwnerContext::team("team-a").with_agent("agent-7"));

        assert_eq!(state.current_node, NODE_NONE);
        assert_eq!(state.status, WorkflowStatus::Running);
        assert_eq!(state.team_id, "team-a");
        assert_eq!(state.agent_id.as_deref(), Some("agent-7"));
        assert!(state.state_data.is_empty());
        assert!(state.pending_approval.is_none());
    }

    #[test]
    fn test_merge_data_updates_timestamp() {
        let mut state = WorkflowState::new("wf-1", "dispatcher", &OwnerContext::team("t"));
        let before = state.updated_at;
        state.merge_data(state_data! { "a" => 1 });

        assert!(state.updated_at >= before);
        assert_eq!(state.state_data.len(), 1);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&WorkflowStatus::Paused).unwrap(), "\"paused\"");
        let status: WorkflowStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(status, WorkflowStatus::Completed);
        assert!(status.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
    }
}
