//! Approval checkpoint: suspends a run until a human decision arrives.
//!
//! A step that needs sign-off calls [`ApprovalCheckpoint::request_approval`]
//! and returns a paused [`StepOutput`]. The request flips the stored run to
//! `Paused`; the engine sees that on its post-step reload and stops. Only one
//! approval may be outstanding per run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::definition::StepOutput;
use super::errors::{TransitionReason, WorkflowError};
use crate::state::{StateData, StateStore, StateValue, WorkflowState, WorkflowStatus};
use crate::state_data;

/// Outstanding approval record referencing one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRef {
    pub id: String,
    pub workflow_id: String,
    /// Step that asked for the approval
    pub step: String,
    pub description: String,
    pub requested_by: Option<String>,
    #[serde(default)]
    pub designated_reviewers: Vec<String>,
    #[serde(default)]
    pub human_only: bool,
    pub requested_at: DateTime<Utc>,
}

/// What a step asks a reviewer to sign off on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApprovalRequest {
    pub description: String,
    pub designated_reviewers: Vec<String>,
    pub human_only: bool,
}

impl ApprovalRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_reviewers<I, S>(mut self, reviewers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.designated_reviewers = reviewers.into_iter().map(Into::into).collect();
        self
    }

    pub fn human_only(mut self) -> Self {
        self.human_only = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerKind {
    Human,
    AiAgent,
}

/// A reviewer's answer to a pending approval.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub reviewer: String,
    pub reviewer_kind: ReviewerKind,
    pub comment: Option<String>,
    /// Extra fields merged into the payload, e.g. an assignee override
    pub data: StateData,
}

impl ApprovalDecision {
    pub fn approve(reviewer: impl Into<String>) -> Self {
        Self {
            approved: true,
            reviewer: reviewer.into(),
            reviewer_kind: ReviewerKind::Human,
            comment: None,
            data: StateData::new(),
        }
    }

    pub fn reject(reviewer: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            approved: false,
            comment: Some(comment.into()),
            ..Self::approve(reviewer)
        }
    }

    pub fn by_ai_agent(mut self) -> Self {
        self.reviewer_kind = ReviewerKind::AiAgent;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Check this decision against the approval it answers.
    pub fn validate(&self, approval: &ApprovalRef) -> Result<(), WorkflowError> {
        let reject = |reason: TransitionReason, detail: String| -> Result<(), WorkflowError> {
            Err(WorkflowError::rejected(
                WorkflowStatus::Paused,
                WorkflowStatus::Running,
                reason,
                detail,
            ))
        };

        if approval.requested_by.as_deref() == Some(self.reviewer.as_str()) {
            return reject(
                TransitionReason::PermissionDenied,
                format!("{} cannot review their own request", self.reviewer),
            );
        }
        if approval.human_only && self.reviewer_kind == ReviewerKind::AiAgent {
            return reject(
                TransitionReason::AiAgentRestricted,
                format!("approval {} requires a human reviewer", approval.id),
            );
        }
        if !approval.designated_reviewers.is_empty()
            && !approval.designated_reviewers.iter().any(|r| r == &self.reviewer)
        {
            return reject(
                TransitionReason::NotDesignatedReviewer,
                format!("{} is not a designated reviewer for approval {}", self.reviewer, approval.id),
            );
        }
        let has_comment = self.comment.as_deref().is_some_and(|c| !c.trim().is_empty());
        if !self.approved && !has_comment {
            return reject(
                TransitionReason::CommentRequired,
                "a rejection must include a comment".to_string(),
            );
        }
        Ok(())
    }

    /// Payload merged under `approval_data` on resume.
    pub fn to_payload(&self, approval: &ApprovalRef) -> StateData {
        let mut payload = self.data.clone();
        payload.insert("approved".into(), self.approved.into());
        payload.insert("reviewer".into(), self.reviewer.clone().into());
        payload.insert(
            "reviewer_kind".into(),
            match self.reviewer_kind {
                ReviewerKind::Human => "human",
                ReviewerKind::AiAgent => "ai_agent",
            }
            .into(),
        );
        payload.insert("comment".into(), self.comment.clone().into());
        payload.insert("approval_id".into(), approval.id.clone().into());
        payload.insert("decided_at".into(), Utc::now().to_rfc3339().into());
        payload
    }
}

/// Creates approval records and suspends runs.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ApprovalService: Send + Sync {
    /// Record an approval for `state` and mark the run `Paused`.
    async fn request_approval(
        &self,
        state: &WorkflowState,
        request: &ApprovalRequest,
    ) -> Result<ApprovalRef, WorkflowError>;

    async fn is_pending(&self, state: &WorkflowState) -> Result<bool, WorkflowError>;
}

/// Keeps the approval record on the stored run itself, so a paused run is
/// described by a single document.
#[derive(Clone)]
pub struct StoreApprovalService {
    store: Arc<dyn StateStore>,
}

impl StoreApprovalService {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ApprovalService for StoreApprovalService {
    async fn request_approval(
        &self,
        state: &WorkflowState,
        request: &ApprovalRequest,
    ) -> Result<ApprovalRef, WorkflowError> {
        let mut current = self.store.reload(state).await?;

        if let Some(existing) = &current.pending_approval {
            return Err(WorkflowError::ApprovalAlreadyPending {
                workflow_id: current.id.clone(),
                approval_id: existing.id.clone(),
            });
        }
        if current.status != WorkflowStatus::Running {
            return Err(WorkflowError::invalid_transition(
                current.status,
                WorkflowStatus::Paused,
                "only a running workflow can request approval",
            ));
        }

        let approval = ApprovalRef {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: current.id.clone(),
            step: current.current_node.clone(),
            description: request.description.clone(),
            requested_by: current.agent_id.clone(),
            designated_reviewers: request.designated_reviewers.clone(),
            human_only: request.human_only,
            requested_at: Utc::now(),
        };

        current.pending_approval = Some(approval.clone());
        current.status = WorkflowStatus::Paused;
        self.store.save(&current).await?;
        Ok(approval)
    }

    async fn is_pending(&self, state: &WorkflowState) -> Result<bool, WorkflowError> {
        let current = self.store.reload(state).await?;
        Ok(current.status == WorkflowStatus::Paused && current.pending_approval.is_some())
    }
}

/// Entry point steps use to ask for human sign-off.
#[derive(Clone)]
pub struct ApprovalCheckpoint {
    service: Arc<dyn ApprovalService>,
}

impl ApprovalCheckpoint {
    pub fn new(service: Arc<dyn ApprovalService>) -> Self {
        Self { service }
    }

    /// Create the approval record and suspend the run. A second request while
    /// one is open fails with [`WorkflowError::ApprovalAlreadyPending`].
    pub async fn request_approval(
        &self,
        state: &WorkflowState,
        request: ApprovalRequest,
    ) -> Result<ApprovalRef, WorkflowError> {
        // The service checks against the stored record, not the caller's copy
        let approval = self.service.request_approval(state, &request).await?;
        info!(
            workflow_id = %state.id,
            approval_id = %approval.id,
            step = %approval.step,
            description = %approval.description,
            "Workflow paused for approval"
        );
        Ok(approval)
    }

    pub async fn is_pending(&self, state: &WorkflowState) -> Result<bool, WorkflowError> {
        self.service.is_pending(state).await
    }

    /// Partial step result reported alongside an approval request.
    pub fn paused_output(approval: &ApprovalRef, mut partial: StateData) -> StepOutput {
        partial.extend(state_data! {
            "approval_id" => approval.id.clone(),
            "approval_description" => approval.description.clone(),
        });
        StepOutput::paused(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{InMemoryStateStore, OwnerContext};

    fn approval(requested_by: Option<&str>) -> ApprovalRef {
        ApprovalRef {
            id: "ap-1".into(),
            workflow_id: "wf-1".into(),
            step: "approve_assignment".into(),
            description: "Assign".into(),
            requested_by: requested_by.map(String::from),
            designated_reviewers: vec![],
            human_only: false,
            requested_at: Utc::now(),
        }
    }

    async fn running_state(store: &Arc<InMemoryStateStore>) -> WorkflowState {
        store
            .create("dispatcher", &StateData::new(), &OwnerContext::team("t").with_agent("agent-1"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_approval_pauses_stored_run() {
        let store = Arc::new(InMemoryStateStore::new());
        let state = running_state(&store).await;
        let checkpoint = ApprovalCheckpoint::new(Arc::new(StoreApprovalService::new(store.clone())));

        let approval = checkpoint
            .request_approval(&state, ApprovalRequest::new("Assign work order"))
            .await
            .unwrap();

        let stored = store.load(&state.id).await.unwrap();
        assert_eq!(stored.status, WorkflowStatus::Paused);
        assert_eq!(stored.pending_approval.as_ref(), Some(&approval));
        assert_eq!(approval.requested_by.as_deref(), Some("agent-1"));
        assert!(checkpoint.is_pending(&state).await.unwrap());
    }

    #[tokio::test]
    async fn test_second_request_while_pending_is_rejected() {
        let store = Arc::new(InMemoryStateStore::new());
        let state = running_state(&store).await;
        let checkpoint = ApprovalCheckpoint::new(Arc::new(StoreApprovalService::new(store.clone())));

        checkpoint
            .request_approval(&state, ApprovalRequest::new("first"))
            .await
            .unwrap();
        let second = checkpoint
            .request_approval(&state, ApprovalRequest::new("second"))
            .await;

        assert!(matches!(second, Err(WorkflowError::ApprovalAlreadyPending { .. })));
        let stored = store.load(&state.id).await.unwrap();
        assert_eq!(stored.pending_approval.unwrap().description, "first");
    }

    #[tokio::test]
    async fn test_pending_rejection_names_the_open_approval() {
        let store = Arc::new(InMemoryStateStore::new());
        let state = running_state(&store).await;
        let checkpoint = ApprovalCheckpoint::new(Arc::new(StoreApprovalService::new(store.clone())));

        // `state` is the pre-pause copy and knows nothing about the first approval
        let first = checkpoint
            .request_approval(&state, ApprovalRequest::new("first"))
            .await
            .unwrap();
        assert!(state.pending_approval.is_none());

        match checkpoint.request_approval(&state, ApprovalRequest::new("second")).await {
            Err(WorkflowError::ApprovalAlreadyPending { workflow_id, approval_id }) => {
                assert_eq!(workflow_id, state.id);
                assert_eq!(approval_id, first.id);
            }
            other => panic!("expected ApprovalAlreadyPending, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_checkpoint_passes_service_rejection_through() {
        let mut service = MockApprovalService::new();
        service.expect_request_approval().times(1).returning(|state, _| {
            Err(WorkflowError::ApprovalAlreadyPending {
                workflow_id: state.id.clone(),
                approval_id: "ap-open".into(),
            })
        });

        let checkpoint = ApprovalCheckpoint::new(Arc::new(service));
        let state = WorkflowState::new("wf-1", "dispatcher", &OwnerContext::team("t"));
        let result = checkpoint.request_approval(&state, ApprovalRequest::new("x")).await;

        assert!(matches!(
            result,
            Err(WorkflowError::ApprovalAlreadyPending { ref approval_id, .. }) if approval_id == "ap-open"
        ));
    }

    #[test]
    fn test_decision_validation_reason_codes() {
        let own = approval(Some("agent-1"));
        let err = ApprovalDecision::approve("agent-1").validate(&own).unwrap_err();
        assert_eq!(err.reason(), Some(TransitionReason::PermissionDenied));

        let mut human_only = approval(None);
        human_only.human_only = true;
        let err = ApprovalDecision::approve("bot-7").by_ai_agent().validate(&human_only).unwrap_err();
        assert_eq!(err.reason(), Some(TransitionReason::AiAgentRestricted));

        let mut designated = approval(None);
        designated.designated_reviewers = vec!["lead".into()];
        let err = ApprovalDecision::approve("intern").validate(&designated).unwrap_err();
        assert_eq!(err.reason(), Some(TransitionReason::NotDesignatedReviewer));
        assert!(ApprovalDecision::approve("lead").validate(&designated).is_ok());

        let mut silent_reject = ApprovalDecision::approve("lead");
        silent_reject.approved = false;
        let err = silent_reject.validate(&approval(None)).unwrap_err();
        assert_eq!(err.reason(), Some(TransitionReason::CommentRequired));

        assert!(ApprovalDecision::reject("lead", "wrong crew").validate(&approval(None)).is_ok());
    }

    #[test]
    fn test_decision_payload_fields() {
        let payload = ApprovalDecision::approve("lead")
            .with_data("assignee", "m-2")
            .to_payload(&approval(None));

        assert_eq!(payload["approved"], StateValue::Bool(true));
        assert_eq!(payload["reviewer"].as_str(), Some("lead"));
        assert_eq!(payload["reviewer_kind"].as_str(), Some("human"));
        assert_eq!(payload["approval_id"].as_str(), Some("ap-1"));
        assert_eq!(payload["assignee"].as_str(), Some("m-2"));
        assert!(payload["comment"].is_null());
    }
}
