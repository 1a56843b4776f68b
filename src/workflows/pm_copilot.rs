//! PM copilot: summarize a project's task list into a status update, with a
//! human review when the risk is high enough.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use super::{read_path, to_data};
use crate::config::PmCopilotConfig;
use crate::state::{StateData, StateValue, WorkflowState, APPROVAL_DATA_KEY};
use crate::workflow::{
    ApprovalCheckpoint, ApprovalRequest, Step, StepContext, StepHandler, StepOutput,
    WorkflowDefinition,
};

pub const PM_COPILOT: &str = "pm-copilot";

pub const COLLECT_TASKS: &str = "collect_tasks";
pub const ASSESS_RISKS: &str = "assess_risks";
pub const REVIEW_UPDATE: &str = "review_update";
pub const PUBLISH_UPDATE: &str = "publish_update";

/// Input key holding the task list.
pub const TASKS_KEY: &str = "tasks";
/// Optional input key fixing "today" as `YYYY-MM-DD`.
pub const AS_OF_KEY: &str = "as_of";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

fn default_status() -> String {
    "todo".to_string()
}

impl TaskRecord {
    pub fn is_done(&self) -> bool {
        matches!(self.status.as_str(), "done" | "completed" | "closed")
    }

    pub fn is_blocked(&self) -> bool {
        self.status == "blocked"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => anyhow::bail!("unknown risk level '{other}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCollection {
    pub as_of: NaiveDate,
    pub total: usize,
    pub open: usize,
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overdue: Vec<String>,
    pub blocked: Vec<String>,
    pub unassigned: Vec<String>,
    pub risk_level: RiskLevel,
}

impl RiskAssessment {
    /// Overdue and blocked work weighs double; unassigned open work once.
    fn level_for(overdue: usize, blocked: usize, unassigned: usize) -> RiskLevel {
        match overdue * 2 + blocked * 2 + unassigned {
            0..=1 => RiskLevel::Low,
            2..=5 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// `published` or `withheld`
    pub status: String,
    pub summary: String,
    pub reviewer: Option<String>,
    pub comment: Option<String>,
}

pub struct PmCopilotWorkflow {
    steps: Vec<Step>,
}

impl PmCopilotWorkflow {
    pub fn new(settings: PmCopilotConfig) -> Self {
        Self {
            steps: vec![
                Step::new(COLLECT_TASKS, CollectTasks),
                Step::new(
                    ASSESS_RISKS,
                    AssessRisks {
                        grace_days: settings.overdue_grace_days,
                    },
                ),
                Step::new(REVIEW_UPDATE, ReviewUpdate { settings }),
                Step::new(PUBLISH_UPDATE, PublishUpdate),
            ],
        }
    }
}

#[async_trait]
impl WorkflowDefinition for PmCopilotWorkflow {
    fn workflow_type(&self) -> &str {
        PM_COPILOT
    }

    fn steps(&self) -> &[Step] {
        &self.steps
    }

    async fn on_start(&self, _state: &WorkflowState, input: &StateData) -> anyhow::Result<()> {
        match input.get(TASKS_KEY) {
            Some(StateValue::List(_)) => Ok(()),
            Some(other) => anyhow::bail!("'{TASKS_KEY}' must be a list, got {}", other.kind()),
            None => anyhow::bail!("pm-copilot needs a '{TASKS_KEY}' input"),
        }
    }

    async fn on_complete(&self, state: &WorkflowState) -> anyhow::Result<()> {
        if let Ok(update) = read_path::<StatusUpdate>(state, PUBLISH_UPDATE) {
            info!(
                workflow_id = %state.id,
                team_id = %state.team_id,
                status = %update.status,
                "Status update finished"
            );
        }
        Ok(())
    }
}

struct CollectTasks;

#[async_trait]
impl StepHandler for CollectTasks {
    async fn execute(&self, _ctx: &StepContext<'_>, state: &WorkflowState) -> anyhow::Result<StepOutput> {
        let mut tasks: Vec<TaskRecord> = read_path(state, TASKS_KEY)?;
        for task in &mut tasks {
            task.title = task.title.trim().to_string();
            task.status = task.status.trim().to_lowercase().replace([' ', '-'], "_");
            task.assignee = task
                .assignee
                .take()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty());
        }

        let as_of: NaiveDate = match state.state_data.get(AS_OF_KEY) {
            Some(value) if !value.is_null() => value.deserialize_into()?,
            _ => Utc::now().date_naive(),
        };
        let collection = TaskCollection {
            as_of,
            total: tasks.len(),
            open: tasks.iter().filter(|t| !t.is_done()).count(),
            tasks,
        };
        Ok(StepOutput::new(to_data(&collection)?))
    }
}

struct AssessRisks {
    grace_days: i64,
}

#[async_trait]
impl StepHandler for AssessRisks {
    async fn execute(&self, _ctx: &StepContext<'_>, state: &WorkflowState) -> anyhow::Result<StepOutput> {
        let collection: TaskCollection = read_path(state, COLLECT_TASKS)?;
        let cutoff = collection.as_of - Duration::days(self.grace_days.max(0));
        let label = |task: &TaskRecord| task.id.clone().unwrap_or_else(|| task.title.clone());

        let open: Vec<&TaskRecord> = collection.tasks.iter().filter(|t| !t.is_done()).collect();
        let overdue: Vec<String> = open
            .iter()
            .filter(|t| t.due_date.is_some_and(|due| due < cutoff))
            .map(|&t| label(t))
            .collect();
        let blocked: Vec<String> = open.iter().filter(|t| t.is_blocked()).map(|&t| label(t)).collect();
        let unassigned: Vec<String> = open
            .iter()
            .filter(|t| t.assignee.is_none())
            .map(|&t| label(t))
            .collect();

        let assessment = RiskAssessment {
            risk_level: RiskAssessment::level_for(overdue.len(), blocked.len(), unassigned.len()),
            overdue,
            blocked,
            unassigned,
        };
        Ok(StepOutput::new(to_data(&assessment)?))
    }
}

struct ReviewUpdate {
    settings: PmCopilotConfig,
}

#[async_trait]
impl StepHandler for ReviewUpdate {
    async fn execute(&self, ctx: &StepContext<'_>, state: &WorkflowState) -> anyhow::Result<StepOutput> {
        let risk: RiskLevel = read_path(state, &format!("{ASSESS_RISKS}.risk_level"))?;
        let threshold_value = ctx
            .parameter(state, "review_threshold", self.settings.review_threshold.as_str())
            .await?;
        let threshold: RiskLevel = threshold_value
            .as_str()
            .unwrap_or(self.settings.review_threshold.as_str())
            .parse()?;

        if risk < threshold {
            return Ok(StepOutput::new(crate::state_data! {
                "reviewed" => false,
                "risk_level" => risk.as_str(),
                "threshold" => threshold.as_str(),
            }));
        }

        let approval = ctx
            .checkpoint
            .request_approval(
                state,
                ApprovalRequest::new(format!("Review status update ({risk} risk)")).human_only(),
            )
            .await?;
        Ok(ApprovalCheckpoint::paused_output(
            &approval,
            crate::state_data! {
                "risk_level" => risk.as_str(),
                "threshold" => threshold.as_str(),
            },
        ))
    }
}

struct PublishUpdate;

#[async_trait]
impl StepHandler for PublishUpdate {
    async fn execute(&self, _ctx: &StepContext<'_>, state: &WorkflowState) -> anyhow::Result<StepOutput> {
        let collection: TaskCollection = read_path(state, COLLECT_TASKS)?;
        let assessment: RiskAssessment = read_path(state, ASSESS_RISKS)?;

        let summary = format!(
            "{}/{} tasks done as of {}; {} overdue, {} blocked, {} unassigned. Risk: {}.",
            collection.total - collection.open,
            collection.total,
            collection.as_of,
            assessment.overdue.len(),
            assessment.blocked.len(),
            assessment.unassigned.len(),
            assessment.risk_level,
        );

        let decision = state
            .state_data
            .get(APPROVAL_DATA_KEY)
            .and_then(StateValue::as_map);
        let text = |key: &str| {
            decision
                .and_then(|d| d.get(key))
                .and_then(StateValue::as_str)
                .map(String::from)
        };
        let approved = decision
            .map(|d| d.get("approved").and_then(StateValue::as_bool).unwrap_or(false))
            .unwrap_or(true);

        let update = StatusUpdate {
            status: if approved { "published" } else { "withheld" }.to_string(),
            summary,
            reviewer: text("reviewer"),
            comment: text("comment"),
        };
        Ok(StepOutput::new(to_data(&update)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{InMemoryStateStore, OwnerContext, WorkflowStatus};
    use crate::state_data;
    use crate::workflow::{
        ApprovalDecision, CustomizationParameterLookup, StaticCustomizations, TransitionReason,
        WorkflowCustomization, WorkflowEngine, WorkflowRegistry,
    };
    use std::sync::Arc;

    fn engine(customizations: StaticCustomizations) -> WorkflowEngine {
        let registry = WorkflowRegistry::new()
            .with(PmCopilotWorkflow::new(PmCopilotConfig::default()))
            .unwrap();
        WorkflowEngine::new(Arc::new(InMemoryStateStore::new()), registry)
            .with_parameters(Arc::new(CustomizationParameterLookup::new(Arc::new(customizations))))
    }

    fn task(id: &str, status: &str, assignee: Option<&str>, due: Option<&str>) -> StateValue {
        state_data! {
            "id" => id,
            "title" => format!("Task {id}"),
            "status" => status,
            "assignee" => assignee,
            "due_date" => due,
        }
        .into()
    }

    fn owner() -> OwnerContext {
        OwnerContext::team("proj").with_agent("pm-bot")
    }

    fn calm_project() -> StateData {
        state_data! {
            AS_OF_KEY => "2026-03-10",
            TASKS_KEY => vec![
                task("t1", "done", Some("ana"), Some("2026-03-01")),
                task("t2", "In Progress", Some("bo"), Some("2026-03-20")),
            ],
        }
    }

    fn troubled_project() -> StateData {
        state_data! {
            AS_OF_KEY => "2026-03-10",
            TASKS_KEY => vec![
                task("t1", "todo", None, Some("2026-03-01")),
                task("t2", "blocked", Some("bo"), Some("2026-03-05")),
                task("t3", "done", None, Some("2026-02-01")),
            ],
        }
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskAssessment::level_for(0, 0, 1), RiskLevel::Low);
        assert_eq!(RiskAssessment::level_for(1, 0, 0), RiskLevel::Medium);
        assert_eq!(RiskAssessment::level_for(1, 1, 2), RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert_eq!("MEDIUM".parse::<RiskLevel>().unwrap(), RiskLevel::Medium);
        assert!("severe".parse::<RiskLevel>().is_err());
    }

    #[tokio::test]
    async fn test_low_risk_publishes_without_review() {
        let engine = engine(StaticCustomizations::new());
        let done = engine.start_and_run(PM_COPILOT, calm_project(), &owner()).await.unwrap();

        assert_eq!(done.status, WorkflowStatus::Completed);
        let update: StatusUpdate = read_path(&done, PUBLISH_UPDATE).unwrap();
        assert_eq!(update.status, "published");
        assert!(update.summary.starts_with("1/2 tasks done as of 2026-03-10"));

        let collection: TaskCollection = read_path(&done, COLLECT_TASKS).unwrap();
        assert_eq!(collection.tasks[1].status, "in_progress");
    }

    #[tokio::test]
    async fn test_high_risk_needs_human_review() {
        let engine = engine(StaticCustomizations::new());
        let paused = engine
            .start_and_run(PM_COPILOT, troubled_project(), &owner())
            .await
            .unwrap();

        assert_eq!(paused.status, WorkflowStatus::Paused);
        assert_eq!(paused.current_node, REVIEW_UPDATE);
        let assessment: RiskAssessment = read_path(&paused, ASSESS_RISKS).unwrap();
        assert_eq!(assessment.overdue, vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(assessment.blocked, vec!["t2".to_string()]);
        assert_eq!(assessment.unassigned, vec!["t1".to_string()]);
        assert_eq!(assessment.risk_level, RiskLevel::High);

        let err = engine
            .resume_with_decision(&paused, &ApprovalDecision::approve("copilot-ai").by_ai_agent())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(TransitionReason::AiAgentRestricted));

        let done = engine
            .resume_with_decision(&paused, &ApprovalDecision::reject("lead", "numbers look off"))
            .await
            .unwrap();
        let update: StatusUpdate = read_path(&done, PUBLISH_UPDATE).unwrap();
        assert_eq!(update.status, "withheld");
        assert_eq!(update.comment.as_deref(), Some("numbers look off"));
    }

    #[tokio::test]
    async fn test_review_threshold_parameter() {
        let engine = engine(StaticCustomizations::new().with(
            "proj",
            PM_COPILOT,
            WorkflowCustomization::default().parameter("review_threshold", "low"),
        ));

        let paused = engine.start_and_run(PM_COPILOT, calm_project(), &owner()).await.unwrap();
        assert_eq!(paused.status, WorkflowStatus::Paused);
    }

    #[tokio::test]
    async fn test_tasks_input_is_required() {
        let engine = engine(StaticCustomizations::new());
        let result = engine
            .start(PM_COPILOT, state_data! { TASKS_KEY => "not a list" }, &owner())
            .await;
        assert!(result.is_err());
    }
}
