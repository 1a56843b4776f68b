//! Built-in workflow types
//!
//! - **dispatcher**: routes a work order to the best-fitting team member
//! - **pm_copilot**: turns a task list into a reviewed status update

pub mod dispatcher;
pub mod pm_copilot;

pub use dispatcher::{DispatcherWorkflow, WorkOrder, DISPATCHER};
pub use pm_copilot::{PmCopilotWorkflow, RiskLevel, TaskRecord, PM_COPILOT};

use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::config::AgentWorkflowsConfig;
use crate::routing::{RoutingScorer, TeamRoster};
use crate::state::{lookup_path, StateData, StateValue, WorkflowState};
use crate::workflow::{WorkflowError, WorkflowRegistry};

/// Registry holding every built-in workflow type.
pub fn builtin_registry(
    config: &AgentWorkflowsConfig,
    roster: Arc<dyn TeamRoster>,
) -> Result<WorkflowRegistry, WorkflowError> {
    WorkflowRegistry::new()
        .with(DispatcherWorkflow::new(
            RoutingScorer::new(roster),
            config.dispatcher.clone(),
        ))?
        .with(PmCopilotWorkflow::new(config.pm_copilot.clone()))
}

/// Read a typed record out of `state_data` at a dotted path.
pub(crate) fn read_path<T: DeserializeOwned>(state: &WorkflowState, path: &str) -> anyhow::Result<T> {
    lookup_path(&state.state_data, path)
        .ok_or_else(|| anyhow!("'{path}' is missing from workflow {}", state.id))?
        .deserialize_into()
        .with_context(|| format!("'{path}' in workflow {} has an unexpected shape", state.id))
}

/// Flatten a serializable record into step output data.
pub(crate) fn to_data<T: Serialize>(record: &T) -> anyhow::Result<StateData> {
    match StateValue::from_serialize(record)? {
        StateValue::Map(data) => Ok(data),
        other => Err(anyhow!("expected a record, got {}", other.kind())),
    }
}
