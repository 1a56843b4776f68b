use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::workflow::{StaticCustomizations, WorkflowCustomization, ANY_TEAM};

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "agent-workflows.toml";

/// Main configuration structure for agent-workflows
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentWorkflowsConfig {
    pub observability: ObservabilityConfig,
    pub persistence: PersistenceConfig,
    pub dispatcher: DispatcherConfig,
    pub pm_copilot: PmCopilotConfig,
    /// Per-team skip rules and parameters
    pub customizations: Vec<CustomizationEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory holding one JSON file per workflow run
    pub state_directory: PathBuf,
    /// Team roster used by routing, `{"team-id": [member, ...]}`
    pub roster_file: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_directory: PathBuf::from(".agent-workflows/state"),
            roster_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Estimate used when a work order carries none
    pub default_estimated_hours: f64,
    /// Default for the `require_approval` parameter
    pub require_approval: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_estimated_hours: 4.0,
            require_approval: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PmCopilotConfig {
    /// Default for the `review_threshold` parameter: low, medium or high
    pub review_threshold: String,
    /// Days past due before a task counts as overdue
    pub overdue_grace_days: i64,
}

impl Default for PmCopilotConfig {
    fn default() -> Self {
        Self {
            review_threshold: "high".to_string(),
            overdue_grace_days: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CustomizationEntry {
    #[serde(default = "any_team")]
    pub team_id: String,
    pub workflow_type: String,
    #[serde(flatten)]
    pub customization: WorkflowCustomization,
}

fn any_team() -> String {
    ANY_TEAM.to_string()
}

impl AgentWorkflowsConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. `path`, or `agent-workflows.toml` when present
    /// 3. Environment variables, e.g. `AGENT_WORKFLOWS_DISPATCHER__REQUIRE_APPROVAL`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        builder = builder.add_source(
            Environment::with_prefix("AGENT_WORKFLOWS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to read agent-workflows configuration")?;
        let config: AgentWorkflowsConfig = config
            .try_deserialize()
            .context("Invalid agent-workflows configuration")?;
        tracing::debug!(
            customizations = config.customizations.len(),
            state_directory = %config.persistence.state_directory.display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
        }
        Ok(())
    }

    /// Customization records as a lookup the engine can query.
    pub fn customization_lookup(&self) -> StaticCustomizations {
        self.customizations
            .iter()
            .fold(StaticCustomizations::new(), |lookup, entry| {
                lookup.with(
                    entry.team_id.clone(),
                    entry.workflow_type.clone(),
                    entry.customization.clone(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::SkipCondition;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AgentWorkflowsConfig::default();
        assert_eq!(config.observability.log_level, "info");
        assert!(config.dispatcher.require_approval);
        assert_eq!(config.dispatcher.default_estimated_hours, 4.0);
        assert_eq!(config.pm_copilot.review_threshold, "high");
        assert!(config.customizations.is_empty());
    }

    #[test]
    fn test_load_from_file_with_customizations() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[persistence]
state_directory = "/tmp/runs"

[dispatcher]
require_approval = false

[[customizations]]
team_id = "team-a"
workflow_type = "dispatcher"
skip_steps = ["approve_assignment"]

[[customizations.skip_rules]]
step = "route_work"
when = {{ op = "exists", key = "assignee" }}

[customizations.parameters]
require_approval = false

[[customizations]]
workflow_type = "pm-copilot"

[customizations.parameters]
review_threshold = "medium"
"#
        )
        .unwrap();

        let config = AgentWorkflowsConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.persistence.state_directory, PathBuf::from("/tmp/runs"));
        assert!(!config.dispatcher.require_approval);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.customizations.len(), 2);

        let dispatcher = &config.customizations[0];
        assert_eq!(dispatcher.team_id, "team-a");
        assert_eq!(dispatcher.customization.skip_steps, vec!["approve_assignment".to_string()]);
        assert_eq!(
            dispatcher.customization.skip_rules[0].when,
            SkipCondition::Exists { key: "assignee".into() }
        );

        let lookup = config.customization_lookup();
        let pm = lookup.find("team-z", "pm-copilot").unwrap();
        assert_eq!(pm.parameters["review_threshold"].as_str(), Some("medium"));
    }

    #[test]
    fn test_save_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent-workflows.toml");

        let mut config = AgentWorkflowsConfig::default();
        config.dispatcher.default_estimated_hours = 6.5;
        config.save_to_file(&path).unwrap();

        let loaded = AgentWorkflowsConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.dispatcher.default_estimated_hours, 6.5);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AgentWorkflowsConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
