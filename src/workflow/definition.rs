use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::approval::ApprovalCheckpoint;
use super::customization::ParameterLookup;
use super::errors::WorkflowError;
use crate::state::{StateData, StateValue, WorkflowState, NODE_COMPLETED, NODE_NONE};

/// What the engine should do after a step handler returns.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StepDirective {
    #[default]
    Continue,
    /// The step requested approval; the stored status is authoritative.
    Paused,
    /// The step asks the engine to mark the run `Failed`.
    Fail { reason: String },
}

/// Result of one step, merged into `state_data` under the step's name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepOutput {
    pub data: StateData,
    pub directive: StepDirective,
}

impl StepOutput {
    pub fn new(data: StateData) -> Self {
        Self {
            data,
            directive: StepDirective::Continue,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn paused(mut data: StateData) -> Self {
        data.insert("status".into(), "paused".into());
        Self {
            data,
            directive: StepDirective::Paused,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut data = StateData::new();
        data.insert("status".into(), "failed".into());
        data.insert("reason".into(), reason.clone().into());
        Self {
            data,
            directive: StepDirective::Fail { reason },
        }
    }

    pub fn is_paused(&self) -> bool {
        self.directive == StepDirective::Paused
    }
}

/// Collaborators a step handler may call while it runs.
pub struct StepContext<'a> {
    pub step: &'a str,
    pub checkpoint: &'a ApprovalCheckpoint,
    pub parameters: &'a dyn ParameterLookup,
}

impl StepContext<'_> {
    pub async fn parameter(
        &self,
        state: &WorkflowState,
        key: &str,
        default: impl Into<StateValue>,
    ) -> Result<StateValue, WorkflowError> {
        self.parameters
            .get_parameter(state, key, default.into())
            .await
            .map_err(|source| WorkflowError::ParameterUnavailable {
                key: key.to_string(),
                source,
            })
    }
}

/// One unit of work in a workflow.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(&self, ctx: &StepContext<'_>, state: &WorkflowState) -> anyhow::Result<StepOutput>;
}

/// A named, registered step.
#[derive(Clone)]
pub struct Step {
    pub name: String,
    pub handler: Arc<dyn StepHandler>,
}

impl Step {
    pub fn new(name: impl Into<String>, handler: impl StepHandler + 'static) -> Self {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

/// A workflow type: its ordered steps plus lifecycle hooks.
///
/// Hooks default to no-ops. A hook error aborts the operation that invoked it.
#[async_trait]
pub trait WorkflowDefinition: Send + Sync {
    fn workflow_type(&self) -> &str;

    fn steps(&self) -> &[Step];

    fn step_names(&self) -> Vec<&str> {
        self.steps().iter().map(|s| s.name.as_str()).collect()
    }

    fn position(&self, node: &str) -> Option<usize> {
        self.steps().iter().position(|s| s.name == node)
    }

    async fn on_start(&self, _state: &WorkflowState, _input: &StateData) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_resume(&self, _state: &WorkflowState, _payload: &StateData) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_step(&self, _state: &WorkflowState, _step: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_step(
        &self,
        _state: &WorkflowState,
        _step: &str,
        _output: &StepOutput,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_complete(&self, _state: &WorkflowState) -> anyhow::Result<()> {
        Ok(())
    }
}

fn validate_steps(definition: &dyn WorkflowDefinition) -> Result<(), WorkflowError> {
    let invalid = |reason: String| WorkflowError::InvalidDefinition {
        workflow_type: definition.workflow_type().to_string(),
        reason,
    };

    let mut seen = HashSet::new();
    for step in definition.steps() {
        if step.name.trim().is_empty() {
            return Err(invalid("step names must not be empty".to_string()));
        }
        if step.name == NODE_NONE || step.name == NODE_COMPLETED {
            return Err(invalid(format!("step name '{}' is reserved", step.name)));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(invalid(format!("step '{}' is declared more than once", step.name)));
        }
    }
    Ok(())
}

/// Workflow types known to an engine, by name.
#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    definitions: BTreeMap<String, Arc<dyn WorkflowDefinition>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a workflow type. Step names must be unique and must not collide
    /// with the `none`/`completed` node markers, since the engine locates
    /// its position by name.
    pub fn register(&mut self, definition: Arc<dyn WorkflowDefinition>) -> Result<(), WorkflowError> {
        validate_steps(definition.as_ref())?;
        self.definitions
            .insert(definition.workflow_type().to_string(), definition);
        Ok(())
    }

    pub fn with(mut self, definition: impl WorkflowDefinition + 'static) -> Result<Self, WorkflowError> {
        self.register(Arc::new(definition))?;
        Ok(self)
    }

    pub fn get(&self, workflow_type: &str) -> Result<Arc<dyn WorkflowDefinition>, WorkflowError> {
        self.definitions
            .get(workflow_type)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownWorkflowType {
                workflow_type: workflow_type.to_string(),
            })
    }

    pub fn workflow_types(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflow_types", &self.workflow_types())
            .finish()
    }
}

/// Workflow assembled from a list of steps, with no custom hooks.
#[derive(Debug, Clone)]
pub struct StepSequence {
    workflow_type: String,
    steps: Vec<Step>,
}

impl StepSequence {
    pub fn new(workflow_type: impl Into<String>) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, name: impl Into<String>, handler: impl StepHandler + 'static) -> Self {
        self.steps.push(Step::new(name, handler));
        self
    }
}

impl WorkflowDefinition for StepSequence {
    fn workflow_type(&self) -> &str {
        &self.workflow_type
    }

    fn steps(&self) -> &[Step] {
        &self.steps
    }
}
