use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::customization::LookupError;
use crate::state::{StoreError, WorkflowStatus};

/// Machine-readable reason attached to a rejected transition.
///
/// The string codes are stable identifiers; callers branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    InvalidTransition,
    PermissionDenied,
    CommentRequired,
    NotDesignatedReviewer,
    AiAgentRestricted,
}

impl TransitionReason {
    pub fn code(&self) -> &'static str {
        match self {
            TransitionReason::InvalidTransition => "invalid_transition",
            TransitionReason::PermissionDenied => "permission_denied",
            TransitionReason::CommentRequired => "comment_required",
            TransitionReason::NotDesignatedReviewer => "not_designated_reviewer",
            TransitionReason::AiAgentRestricted => "ai_agent_restricted",
        }
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors that can occur while driving a workflow run
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid transition from {from} to {to} ({reason}): {detail}")]
    InvalidTransition {
        from: WorkflowStatus,
        to: WorkflowStatus,
        reason: TransitionReason,
        detail: String,
    },

    #[error("Unknown workflow type: {workflow_type}")]
    UnknownWorkflowType { workflow_type: String },

    #[error("Invalid definition for workflow type '{workflow_type}': {reason}")]
    InvalidDefinition {
        workflow_type: String,
        reason: String,
    },

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Lifecycle hook '{hook}' failed: {source}")]
    HookFailed {
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Approval {approval_id} is already pending for workflow {workflow_id}")]
    ApprovalAlreadyPending {
        workflow_id: String,
        approval_id: String,
    },

    #[error("No approval is pending for workflow {workflow_id}")]
    NoPendingApproval { workflow_id: String },

    #[error("Skip policy unavailable for step '{step}': {source}")]
    SkipPolicyUnavailable {
        step: String,
        #[source]
        source: LookupError,
    },

    #[error("Parameter '{key}' unavailable: {source}")]
    ParameterUnavailable {
        key: String,
        #[source]
        source: LookupError,
    },

    #[error("State store error: {0}")]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub(crate) fn invalid_transition(
        from: WorkflowStatus,
        to: WorkflowStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self::rejected(from, to, TransitionReason::InvalidTransition, detail)
    }

    pub(crate) fn rejected(
        from: WorkflowStatus,
        to: WorkflowStatus,
        reason: TransitionReason,
        detail: impl Into<String>,
    ) -> Self {
        WorkflowError::InvalidTransition {
            from,
            to,
            reason,
            detail: detail.into(),
        }
    }

    /// Reason code when this is a rejected transition.
    pub fn reason(&self) -> Option<TransitionReason> {
        match self {
            WorkflowError::InvalidTransition { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
