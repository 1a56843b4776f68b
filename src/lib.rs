// Agent Workflows Library - durable, resumable agent workflows
// This exposes the engine, state stores, routing and built-in workflows

pub mod cli;
pub mod config;
pub mod routing;
pub mod state;
pub mod telemetry;
pub mod workflow;
pub mod workflows;

// Re-export key types for easy access
pub use config::AgentWorkflowsConfig;
pub use routing::{
    RoutingCandidate, RoutingError, RoutingScorer, StaticRoster, TeamMember, TeamRoster,
    WorkRequirements,
};
pub use state::{
    FileSystemStateStore, InMemoryStateStore, OwnerContext, StateData, StateStore, StateValue,
    StoreError, WorkflowState, WorkflowStatus,
};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry};
pub use workflow::{
    ApprovalCheckpoint, ApprovalDecision, StepContext, StepHandler, StepOutput, WorkflowDefinition,
    WorkflowEngine, WorkflowError, WorkflowRegistry,
};
pub use workflows::{builtin_registry, DispatcherWorkflow, PmCopilotWorkflow};
