use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AgentWorkflowsConfig;
use crate::routing::{StaticRoster, TeamRoster};
use crate::state::{FileSystemStateStore, StateData, WorkflowState, WorkflowStatus};
use crate::workflow::{CustomizationParameterLookup, CustomizationSkipPolicy, WorkflowEngine};
use crate::workflows::builtin_registry;

pub mod recover;
pub mod resume;
pub mod route;
pub mod start;
pub mod status;
pub mod workflows;

/// Everything a command needs, resolved once from config and flags.
pub struct CommandContext {
    pub config: AgentWorkflowsConfig,
    pub json: bool,
}

impl CommandContext {
    pub fn new(
        mut config: AgentWorkflowsConfig,
        state_dir: Option<PathBuf>,
        roster: Option<PathBuf>,
        json: bool,
    ) -> Self {
        if let Some(dir) = state_dir {
            config.persistence.state_directory = dir;
        }
        if roster.is_some() {
            config.persistence.roster_file = roster;
        }
        Self { config, json }
    }

    pub async fn roster(&self) -> Result<Arc<dyn TeamRoster>> {
        match &self.config.persistence.roster_file {
            Some(path) => {
                let roster = StaticRoster::load(path)
                    .await
                    .with_context(|| format!("Failed to load roster from {}", path.display()))?;
                Ok(Arc::new(roster))
            }
            None => Ok(Arc::new(StaticRoster::new())),
        }
    }

    /// Engine over the file store, with config-driven customizations.
    pub async fn engine(&self) -> Result<WorkflowEngine> {
        let store = Arc::new(FileSystemStateStore::new(
            self.config.persistence.state_directory.clone(),
        ));
        let registry = builtin_registry(&self.config, self.roster().await?)?;
        let customizations = Arc::new(self.config.customization_lookup());

        Ok(WorkflowEngine::new(store, registry)
            .with_skip_policy(Arc::new(CustomizationSkipPolicy::new(customizations.clone())))
            .with_parameters(Arc::new(CustomizationParameterLookup::new(customizations))))
    }

    pub fn print_state(&self, state: &WorkflowState) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(state)?);
            return Ok(());
        }

        let icon = match state.status {
            WorkflowStatus::Running => "🔄",
            WorkflowStatus::Paused => "⏸️ ",
            WorkflowStatus::Completed => "✅",
            WorkflowStatus::Failed => "❌",
        };
        println!("{icon} {} [{}] {}", state.id, state.workflow_type, state.status);
        println!("   👥 Team: {}", state.team_id);
        if let Some(agent) = &state.agent_id {
            println!("   🤖 Agent: {agent}");
        }
        println!("   📍 Node: {}", state.current_node);
        if let Some(approval) = &state.pending_approval {
            println!("   📝 Awaiting approval {}: {}", approval.id, approval.description);
        }
        if let Some(reason) = &state.failure_reason {
            println!("   💥 Failure: {reason}");
        }
        println!("   🕒 Updated: {}", state.updated_at.to_rfc3339());
        Ok(())
    }
}

/// Parse a JSON object argument into state data.
pub fn parse_object(raw: &str, what: &str) -> Result<StateData> {
    serde_json::from_str(raw).with_context(|| format!("{what} must be a JSON object"))
}
