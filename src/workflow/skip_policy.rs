use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::customization::CustomizationLookup;
use super::errors::WorkflowError;
use crate::state::WorkflowState;

/// Decides whether a step is bypassed for a run. Implementations only query;
/// they never mutate the run or its customization.
#[async_trait]
pub trait SkipPolicy: Send + Sync {
    async fn should_skip(&self, state: &WorkflowState, step: &str) -> Result<bool, WorkflowError>;
}

/// Never skips anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSkipPolicy;

#[async_trait]
impl SkipPolicy for NoSkipPolicy {
    async fn should_skip(&self, _state: &WorkflowState, _step: &str) -> Result<bool, WorkflowError> {
        Ok(false)
    }
}

/// Skip policy backed by the team's customization record.
///
/// No record means no skips. A failed lookup is returned as
/// [`WorkflowError::SkipPolicyUnavailable`] instead of guessing.
#[derive(Clone)]
pub struct CustomizationSkipPolicy {
    lookup: Arc<dyn CustomizationLookup>,
}

impl CustomizationSkipPolicy {
    pub fn new(lookup: Arc<dyn CustomizationLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl SkipPolicy for CustomizationSkipPolicy {
    async fn should_skip(&self, state: &WorkflowState, step: &str) -> Result<bool, WorkflowError> {
        let customization = self
            .lookup
            .get_customization(state)
            .await
            .map_err(|source| WorkflowError::SkipPolicyUnavailable {
                step: step.to_string(),
                source,
            })?;

        let skip = customization
            .map(|c| c.skips(step, &state.state_data))
            .unwrap_or(false);

        debug!(
            workflow_id = %state.id,
            step = %step,
            skip = skip,
            "Evaluated skip policy"
        );
        Ok(skip)
    }
}
