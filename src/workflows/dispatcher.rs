//! Dispatcher: analyze a work order, rank the team for it, get the
//! assignment signed off, then record the outcome.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{read_path, to_data};
use crate::config::DispatcherConfig;
use crate::routing::{RoutingCandidate, RoutingScorer, WorkRequirements};
use crate::state::{StateData, StateValue, WorkflowState, APPROVAL_DATA_KEY};
use crate::workflow::{
    ApprovalCheckpoint, ApprovalRequest, Step, StepContext, StepHandler, StepOutput,
    WorkflowDefinition,
};

pub const DISPATCHER: &str = "dispatcher";

pub const ANALYZE_REQUEST: &str = "analyze_request";
pub const ROUTE_WORK: &str = "route_work";
pub const APPROVE_ASSIGNMENT: &str = "approve_assignment";
pub const FINALIZE_ASSIGNMENT: &str = "finalize_assignment";

/// Input key holding the work order.
pub const WORK_ORDER_KEY: &str = "work_order";

/// Work order as supplied by the caller under `work_order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub priority: Option<String>,
}

/// Validated work order, written by `analyze_request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedRequest {
    pub title: String,
    pub required_skills: Vec<String>,
    pub estimated_hours: f64,
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingOutcome {
    pub top_candidate: String,
    pub top_candidates: Vec<String>,
    pub candidates: Vec<RoutingCandidate>,
}

/// Outcome written by `finalize_assignment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// `assigned` or `rejected`
    pub status: String,
    pub assignee: Option<String>,
    pub reviewer: Option<String>,
    pub comment: Option<String>,
}

pub struct DispatcherWorkflow {
    steps: Vec<Step>,
}

impl DispatcherWorkflow {
    pub fn new(scorer: RoutingScorer, settings: DispatcherConfig) -> Self {
        Self {
            steps: vec![
                Step::new(ANALYZE_REQUEST, AnalyzeRequest { settings: settings.clone() }),
                Step::new(ROUTE_WORK, RouteWork { scorer }),
                Step::new(APPROVE_ASSIGNMENT, ApproveAssignment { settings }),
                Step::new(FINALIZE_ASSIGNMENT, FinalizeAssignment),
            ],
        }
    }
}

#[async_trait]
impl WorkflowDefinition for DispatcherWorkflow {
    fn workflow_type(&self) -> &str {
        DISPATCHER
    }

    fn steps(&self) -> &[Step] {
        &self.steps
    }

    async fn on_start(&self, state: &WorkflowState, input: &StateData) -> anyhow::Result<()> {
        match input.get(WORK_ORDER_KEY) {
            Some(StateValue::Map(_)) => Ok(()),
            Some(other) => anyhow::bail!("'{WORK_ORDER_KEY}' must be a record, got {}", other.kind()),
            None => anyhow::bail!("dispatcher run {} needs a '{WORK_ORDER_KEY}' input", state.id),
        }
    }

    async fn on_complete(&self, state: &WorkflowState) -> anyhow::Result<()> {
        if let Ok(record) = read_path::<AssignmentRecord>(state, FINALIZE_ASSIGNMENT) {
            info!(
                workflow_id = %state.id,
                team_id = %state.team_id,
                status = %record.status,
                assignee = ?record.assignee,
                "Work order dispatched"
            );
        }
        Ok(())
    }
}

struct AnalyzeRequest {
    settings: DispatcherConfig,
}

#[async_trait]
impl StepHandler for AnalyzeRequest {
    async fn execute(&self, _ctx: &StepContext<'_>, state: &WorkflowState) -> anyhow::Result<StepOutput> {
        let order: WorkOrder = read_path(state, WORK_ORDER_KEY)?;

        let title = order.title.trim();
        if title.is_empty() {
            return Ok(StepOutput::fail("work order has no title"));
        }
        let estimated_hours = match order.estimated_hours {
            Some(hours) if hours.is_finite() && hours >= 0.0 => hours,
            Some(hours) => {
                return Ok(StepOutput::fail(format!(
                    "estimated hours must be zero or more, got {hours}"
                )))
            }
            None => self.settings.default_estimated_hours,
        };
        let required_skills = order
            .required_skills
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let analyzed = AnalyzedRequest {
            title: title.to_string(),
            required_skills,
            estimated_hours,
            priority: order
                .priority
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "normal".to_string()),
        };
        Ok(StepOutput::new(to_data(&analyzed)?))
    }
}

struct RouteWork {
    scorer: RoutingScorer,
}

#[async_trait]
impl StepHandler for RouteWork {
    async fn execute(&self, _ctx: &StepContext<'_>, state: &WorkflowState) -> anyhow::Result<StepOutput> {
        let request: AnalyzedRequest = read_path(state, ANALYZE_REQUEST)?;
        let requirements = WorkRequirements::new(request.required_skills, request.estimated_hours);

        let candidates = self.scorer.calculate_routing(&state.team_id, &requirements).await?;
        let Some(best) = candidates.first() else {
            return Ok(StepOutput::fail(format!(
                "team {} has no members to route to",
                state.team_id
            )));
        };

        let outcome = RoutingOutcome {
            top_candidate: best.member_id.clone(),
            top_candidates: candidates
                .iter()
                .filter(|c| c.is_top_candidate)
                .map(|c| c.member_id.clone())
                .collect(),
            candidates,
        };
        Ok(StepOutput::new(to_data(&outcome)?))
    }
}

struct ApproveAssignment {
    settings: DispatcherConfig,
}

#[async_trait]
impl StepHandler for ApproveAssignment {
    async fn execute(&self, ctx: &StepContext<'_>, state: &WorkflowState) -> anyhow::Result<StepOutput> {
        let title: String = read_path(state, &format!("{ANALYZE_REQUEST}.title"))?;
        let proposed: String = read_path(state, &format!("{ROUTE_WORK}.top_candidate"))?;

        let require_approval = ctx
            .parameter(state, "require_approval", self.settings.require_approval)
            .await?
            .as_bool()
            .unwrap_or(self.settings.require_approval);
        if !require_approval {
            return Ok(StepOutput::new(crate::state_data! {
                "approved" => true,
                "auto_approved" => true,
                "proposed_assignee" => proposed,
            }));
        }

        let approval = ctx
            .checkpoint
            .request_approval(
                state,
                ApprovalRequest::new(format!("Assign '{title}' to {proposed}")),
            )
            .await?;
        Ok(ApprovalCheckpoint::paused_output(
            &approval,
            crate::state_data! { "proposed_assignee" => proposed },
        ))
    }
}

struct FinalizeAssignment;

#[async_trait]
impl StepHandler for FinalizeAssignment {
    async fn execute(&self, _ctx: &StepContext<'_>, state: &WorkflowState) -> anyhow::Result<StepOutput> {
        let proposed: String = read_path(state, &format!("{ROUTE_WORK}.top_candidate"))?;
        let decision = state
            .state_data
            .get(APPROVAL_DATA_KEY)
            .and_then(StateValue::as_map);

        // No decision means the approval step was auto-approved or skipped.
        let record = match decision {
            Some(decision) => {
                let approved = decision
                    .get("approved")
                    .and_then(StateValue::as_bool)
                    .unwrap_or(false);
                let text = |key: &str| decision.get(key).and_then(StateValue::as_str).map(String::from);
                AssignmentRecord {
                    status: if approved { "assigned" } else { "rejected" }.to_string(),
                    assignee: approved.then(|| text("assignee").unwrap_or(proposed)),
                    reviewer: text("reviewer"),
                    comment: text("comment"),
                }
            }
            None => AssignmentRecord {
                status: "assigned".to_string(),
                assignee: Some(proposed),
                reviewer: None,
                comment: None,
            },
        };
        Ok(StepOutput::new(to_data(&record)?))
    }
}
