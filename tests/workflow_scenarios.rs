// End-to-end workflow scenarios over the in-memory and file-backed stores

use agent_workflows::routing::{Proficiency, RoutingScorer, StaticRoster, TeamMember};
use agent_workflows::state::{
    FileSystemStateStore, InMemoryStateStore, OwnerContext, StateData, StateStore, WorkflowState,
    WorkflowStatus,
};
use agent_workflows::state_data;
use agent_workflows::workflow::{
    ApprovalCheckpoint, ApprovalDecision, ApprovalRequest, StepContext, StepHandler, StepOutput,
    StepSequence, WorkflowEngine, WorkflowError, WorkflowRegistry,
};
use agent_workflows::config::AgentWorkflowsConfig;
use agent_workflows::workflows::builtin_registry;
use async_trait::async_trait;
use std::sync::Arc;
use tempfile::TempDir;

struct Mark(&'static str);

#[async_trait]
impl StepHandler for Mark {
    async fn execute(&self, _ctx: &StepContext<'_>, _state: &WorkflowState) -> anyhow::Result<StepOutput> {
        Ok(StepOutput::new(state_data! { "done" => self.0 }))
    }
}

struct SignOff;

#[async_trait]
impl StepHandler for SignOff {
    async fn execute(&self, ctx: &StepContext<'_>, state: &WorkflowState) -> anyhow::Result<StepOutput> {
        let approval = ctx
            .checkpoint
            .request_approval(state, ApprovalRequest::new("Confirm the route"))
            .await?;
        Ok(ApprovalCheckpoint::paused_output(&approval, StateData::new()))
    }
}

fn analyze_route_finalize() -> StepSequence {
    StepSequence::new("triage")
        .step("analyze", Mark("analyze"))
        .step("route", Mark("route"))
        .step("finalize", Mark("finalize"))
}

fn with_gate() -> StepSequence {
    StepSequence::new("gated")
        .step("analyze", Mark("analyze"))
        .step("route", SignOff)
        .step("finalize", Mark("finalize"))
}

fn owner() -> OwnerContext {
    OwnerContext::team("team-a").with_agent("agent-7")
}

#[tokio::test]
async fn test_three_steps_complete_one_call_at_a_time() {
    let engine = WorkflowEngine::new(
        Arc::new(InMemoryStateStore::new()),
        WorkflowRegistry::new().with(analyze_route_finalize()).unwrap(),
    );

    let mut state = engine.start("triage", StateData::new(), &owner()).await.unwrap();
    assert!(engine.execute_next_step(&mut state).await.unwrap());
    assert_eq!(state.current_node, "analyze");
    assert!(engine.execute_next_step(&mut state).await.unwrap());
    assert_eq!(state.current_node, "route");
    assert!(!engine.execute_next_step(&mut state).await.unwrap());

    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(state.current_node, "completed");
}

#[tokio::test]
async fn test_pause_at_second_step_then_resume_to_completion() {
    let store = Arc::new(InMemoryStateStore::new());
    let engine = WorkflowEngine::new(store.clone(), WorkflowRegistry::new().with(with_gate()).unwrap());

    let mut state = engine.start("gated", StateData::new(), &owner()).await.unwrap();
    assert!(engine.execute_next_step(&mut state).await.unwrap());
    assert!(!engine.execute_next_step(&mut state).await.unwrap());
    assert_eq!(state.status, WorkflowStatus::Paused);
    assert_eq!(state.current_node, "route");
    assert!(state.pending_approval.is_some());

    let resumed = engine
        .resume(&state, state_data! { "approved" => true })
        .await
        .unwrap();

    assert_eq!(resumed.status, WorkflowStatus::Completed);
    assert_eq!(resumed.current_node, "completed");
    assert!(resumed.pending_approval.is_none());
    let approval = resumed.state_data["approval_data"].as_map().unwrap();
    assert_eq!(approval["approved"].as_bool(), Some(true));
    assert_eq!(store.load(&resumed.id).await.unwrap(), resumed);
}

#[tokio::test]
async fn test_resume_requires_paused_run() {
    let engine = WorkflowEngine::new(
        Arc::new(InMemoryStateStore::new()),
        WorkflowRegistry::new().with(analyze_route_finalize()).unwrap(),
    );
    let state = engine.start("triage", StateData::new(), &owner()).await.unwrap();

    let result = engine.resume(&state, state_data! { "approved" => true }).await;
    assert!(matches!(result, Err(WorkflowError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_paused_run_survives_process_restart_on_disk() {
    let dir = TempDir::new().unwrap();

    let paused = {
        let engine = WorkflowEngine::new(
            Arc::new(FileSystemStateStore::new(dir.path())),
            WorkflowRegistry::new().with(with_gate()).unwrap(),
        );
        engine
            .start_and_run("gated", StateData::new(), &owner())
            .await
            .unwrap()
    };
    assert_eq!(paused.status, WorkflowStatus::Paused);

    // A fresh engine over the same directory picks the run back up
    let engine = WorkflowEngine::new(
        Arc::new(FileSystemStateStore::new(dir.path())),
        WorkflowRegistry::new().with(with_gate()).unwrap(),
    );
    let loaded = engine.load(&paused.id).await.unwrap();
    assert_eq!(loaded.status, WorkflowStatus::Paused);

    let finished = engine
        .resume_with_decision(&loaded, &ApprovalDecision::approve("lead"))
        .await
        .unwrap();
    assert_eq!(finished.status, WorkflowStatus::Completed);
    let approval = finished.state_data["approval_data"].as_map().unwrap();
    assert_eq!(approval["reviewer"].as_str(), Some("lead"));
    assert_eq!(
        finished.state_data["finalize"].as_map().unwrap()["done"].as_str(),
        Some("finalize")
    );
}

#[tokio::test]
async fn test_skill_scores_for_advanced_and_basic_members() {
    let roster = StaticRoster::new().with_team(
        "web",
        vec![
            TeamMember::new("ada", 40.0).with_skill("Laravel", Proficiency::Advanced),
            TeamMember::new("bob", 40.0).with_skill("laravel", Proficiency::Basic),
        ],
    );
    let scorer = RoutingScorer::new(Arc::new(roster));

    let scores = scorer
        .calculate_skill_scores("web", &["Laravel".to_string()])
        .await
        .unwrap();

    assert_eq!(scores["ada"].score, 100.0);
    assert!((scores["bob"].score - 33.33).abs() < 0.01);
}

#[tokio::test]
async fn test_dispatcher_routes_and_waits_for_sign_off() {
    let roster = StaticRoster::new().with_team(
        "web",
        vec![
            TeamMember::new("ada", 40.0)
                .with_skill("Laravel", Proficiency::Advanced)
                .with_workload(10.0),
            TeamMember::new("bob", 40.0)
                .with_skill("Laravel", Proficiency::Basic)
                .with_workload(38.0),
        ],
    );
    let config = AgentWorkflowsConfig::default();
    let engine = WorkflowEngine::new(
        Arc::new(InMemoryStateStore::new()),
        builtin_registry(&config, Arc::new(roster)).unwrap(),
    );

    let input = state_data! {
        "work_order" => state_data! {
            "title" => "Upgrade billing service",
            "required_skills" => vec!["Laravel"],
            "estimated_hours" => 6,
        },
    };
    let paused = engine
        .start_and_run("dispatcher", input, &OwnerContext::team("web"))
        .await
        .unwrap();
    assert_eq!(paused.status, WorkflowStatus::Paused);
    let routing = paused.state_data["route_work"].as_map().unwrap();
    assert_eq!(routing["top_candidate"].as_str(), Some("ada"));

    let done = engine
        .resume_with_decision(&paused, &ApprovalDecision::approve("lead"))
        .await
        .unwrap();
    assert_eq!(done.status, WorkflowStatus::Completed);
    let assignment = done.state_data["finalize_assignment"].as_map().unwrap();
    assert_eq!(assignment["status"].as_str(), Some("assigned"));
    assert_eq!(assignment["assignee"].as_str(), Some("ada"));
}
