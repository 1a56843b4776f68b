//! Per-team workflow customization: which steps to bypass and which
//! tunable parameters to apply. The records live outside this crate and are
//! reached through [`CustomizationLookup`] and [`ParameterLookup`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::state::{lookup_path, StateData, StateValue, WorkflowState};

/// Team id that matches every team when no exact record exists.
pub const ANY_TEAM: &str = "*";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Customization source unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Malformed customization for {scope}: {reason}")]
    Malformed { scope: String, reason: String },
}

/// Condition evaluated against `state_data` by a conditional skip rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SkipCondition {
    Equals { key: String, value: StateValue },
    Exists { key: String },
    Missing { key: String },
    Truthy { key: String },
    Falsy { key: String },
}

impl SkipCondition {
    pub fn evaluate(&self, data: &StateData) -> bool {
        match self {
            SkipCondition::Equals { key, value } => lookup_path(data, key) == Some(value),
            SkipCondition::Exists { key } => lookup_path(data, key).is_some_and(|v| !v.is_null()),
            SkipCondition::Missing { key } => lookup_path(data, key).map_or(true, |v| v.is_null()),
            SkipCondition::Truthy { key } => lookup_path(data, key).is_some_and(|v| v.is_truthy()),
            SkipCondition::Falsy { key } => !lookup_path(data, key).is_some_and(|v| v.is_truthy()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRule {
    pub step: String,
    pub when: SkipCondition,
}

/// Customization record for one (team, workflow type) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCustomization {
    /// Steps bypassed unconditionally
    #[serde(default)]
    pub skip_steps: Vec<String>,
    #[serde(default)]
    pub skip_rules: Vec<SkipRule>,
    #[serde(default)]
    pub parameters: StateData,
}

impl WorkflowCustomization {
    pub fn skips(&self, step: &str, data: &StateData) -> bool {
        self.skip_steps.iter().any(|s| s == step)
            || self
                .skip_rules
                .iter()
                .any(|rule| rule.step == step && rule.when.evaluate(data))
    }

    pub fn skip_step(mut self, step: impl Into<String>) -> Self {
        self.skip_steps.push(step.into());
        self
    }

    pub fn skip_when(mut self, step: impl Into<String>, when: SkipCondition) -> Self {
        self.skip_rules.push(SkipRule {
            step: step.into(),
            when,
        });
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CustomizationLookup: Send + Sync {
    /// Customization that applies to `state`, if any.
    async fn get_customization(
        &self,
        state: &WorkflowState,
    ) -> Result<Option<WorkflowCustomization>, LookupError>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ParameterLookup: Send + Sync {
    /// Workflow-tunable setting for `state`, or `default` when unset.
    async fn get_parameter(
        &self,
        state: &WorkflowState,
        key: &str,
        default: StateValue,
    ) -> Result<StateValue, LookupError>;
}

/// Fixed set of customization records keyed by team and workflow type.
#[derive(Debug, Clone, Default)]
pub struct StaticCustomizations {
    entries: HashMap<(String, String), WorkflowCustomization>,
}

impl StaticCustomizations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        team_id: impl Into<String>,
        workflow_type: impl Into<String>,
        customization: WorkflowCustomization,
    ) {
        self.entries
            .insert((team_id.into(), workflow_type.into()), customization);
    }

    pub fn with(
        mut self,
        team_id: impl Into<String>,
        workflow_type: impl Into<String>,
        customization: WorkflowCustomization,
    ) -> Self {
        self.insert(team_id, workflow_type, customization);
        self
    }

    pub fn find(&self, team_id: &str, workflow_type: &str) -> Option<&WorkflowCustomization> {
        self.entries
            .get(&(team_id.to_string(), workflow_type.to_string()))
            .or_else(|| {
                self.entries
                    .get(&(ANY_TEAM.to_string(), workflow_type.to_string()))
            })
    }
}

#[async_trait]
impl CustomizationLookup for StaticCustomizations {
    async fn get_customization(
        &self,
        state: &WorkflowState,
    ) -> Result<Option<WorkflowCustomization>, LookupError> {
        Ok(self.find(&state.team_id, &state.workflow_type).cloned())
    }
}

/// Parameter lookup that always answers with the caller's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParameters;

#[async_trait]
impl ParameterLookup for DefaultParameters {
    async fn get_parameter(
        &self,
        _state: &WorkflowState,
        _key: &str,
        default: StateValue,
    ) -> Result<StateValue, LookupError> {
        Ok(default)
    }
}

/// Reads parameters out of the customization record for the run.
#[derive(Clone)]
pub struct CustomizationParameterLookup {
    lookup: Arc<dyn CustomizationLookup>,
}

impl CustomizationParameterLookup {
    pub fn new(lookup: Arc<dyn CustomizationLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl ParameterLookup for CustomizationParameterLookup {
    async fn get_parameter(
        &self,
        state: &WorkflowState,
        key: &str,
        default: StateValue,
    ) -> Result<StateValue, LookupError> {
        let value = self
            .lookup
            .get_customization(state)
            .await?
            .and_then(|c| c.parameters.get(key).cloned())
            .unwrap_or(default);
        Ok(value)
    }
}
