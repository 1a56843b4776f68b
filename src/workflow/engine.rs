//! Drives workflow runs step by step.
//!
//! Every transition is persisted before the next one starts, so a process can
//! stop between any two steps and a later `resume` or `run` picks up from the
//! stored record.

use std::sync::Arc;
use tracing::{info, warn, Instrument};

use super::approval::{ApprovalCheckpoint, ApprovalDecision, ApprovalService, StoreApprovalService};
use super::customization::{DefaultParameters, ParameterLookup};
use super::definition::{Step, StepContext, StepDirective, WorkflowDefinition, WorkflowRegistry};
use super::errors::WorkflowError;
use super::skip_policy::{NoSkipPolicy, SkipPolicy};
use crate::state::{
    OwnerContext, StateData, StateStore, StoreError, WorkflowState, WorkflowStatus,
    APPROVAL_DATA_KEY, NODE_COMPLETED, NODE_NONE,
};
use crate::state_data;
use crate::telemetry::create_workflow_span;

pub struct WorkflowEngine {
    store: Arc<dyn StateStore>,
    registry: WorkflowRegistry,
    skip_policy: Arc<dyn SkipPolicy>,
    checkpoint: ApprovalCheckpoint,
    parameters: Arc<dyn ParameterLookup>,
}

impl WorkflowEngine {
    /// Engine that skips nothing, keeps approvals on the stored run and
    /// answers every parameter with its default.
    pub fn new(store: Arc<dyn StateStore>, registry: WorkflowRegistry) -> Self {
        let checkpoint = ApprovalCheckpoint::new(Arc::new(StoreApprovalService::new(store.clone())));
        Self {
            store,
            registry,
            skip_policy: Arc::new(NoSkipPolicy),
            checkpoint,
            parameters: Arc::new(DefaultParameters),
        }
    }

    pub fn with_skip_policy(mut self, skip_policy: Arc<dyn SkipPolicy>) -> Self {
        self.skip_policy = skip_policy;
        self
    }

    pub fn with_approval_service(mut self, service: Arc<dyn ApprovalService>) -> Self {
        self.checkpoint = ApprovalCheckpoint::new(service);
        self
    }

    pub fn with_parameters(mut self, parameters: Arc<dyn ParameterLookup>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    pub async fn load(&self, id: &str) -> Result<WorkflowState, WorkflowError> {
        Ok(self.store.load(id).await?)
    }

    /// Create a run positioned before its first step. Nothing executes yet.
    pub async fn start(
        &self,
        workflow_type: &str,
        input: StateData,
        owner: &OwnerContext,
    ) -> Result<WorkflowState, WorkflowError> {
        let definition = self.registry.get(workflow_type)?;
        let mut state = self.store.create(workflow_type, &input, owner).await?;

        if let Err(source) = definition.on_start(&state, &input).await {
            self.mark_failed(&mut state, format!("on_start hook failed: {source}"))
                .await?;
            return Err(WorkflowError::HookFailed {
                hook: "on_start",
                source,
            });
        }

        state.merge_data(input);
        self.store.save(&state).await?;

        info!(
            workflow_id = %state.id,
            workflow_type = %state.workflow_type,
            team_id = %state.team_id,
            "Workflow started"
        );
        Ok(state)
    }

    pub async fn start_and_run(
        &self,
        workflow_type: &str,
        input: StateData,
        owner: &OwnerContext,
    ) -> Result<WorkflowState, WorkflowError> {
        let state = self.start(workflow_type, input, owner).await?;
        self.run(state).await
    }

    /// Execute steps until the run pauses, completes or fails.
    pub async fn run(&self, mut state: WorkflowState) -> Result<WorkflowState, WorkflowError> {
        let span = create_workflow_span(&state.id, &state.workflow_type, &state.team_id);
        async move {
            while self.execute_next_step(&mut state).await? {}
            info!(
                workflow_id = %state.id,
                status = %state.status,
                current_node = %state.current_node,
                "Workflow run stopped"
            );
            Ok(state)
        }
        .instrument(span)
        .await
    }

    /// Continue a paused run with a reviewer's payload.
    ///
    /// The payload lands under `approval_data`. Only one of several concurrent
    /// callers wins the Paused to Running transition; the rest get
    /// `invalid_transition`.
    pub async fn resume(
        &self,
        state: &WorkflowState,
        payload: StateData,
    ) -> Result<WorkflowState, WorkflowError> {
        if state.status != WorkflowStatus::Paused {
            return Err(WorkflowError::invalid_transition(
                state.status,
                WorkflowStatus::Running,
                format!("workflow {} is not paused", state.id),
            ));
        }
        let definition = self.registry.get(&state.workflow_type)?;

        let mut current = match self
            .store
            .transition_status(&state.id, WorkflowStatus::Paused, WorkflowStatus::Running)
            .await
        {
            Ok(current) => current,
            Err(StoreError::StatusConflict { found, .. }) => {
                return Err(WorkflowError::invalid_transition(
                    found,
                    WorkflowStatus::Running,
                    format!("workflow {} is no longer paused", state.id),
                ));
            }
            Err(err) => return Err(err.into()),
        };

        let mut approval_data = payload.clone();
        if let Some(approval) = current.pending_approval.take() {
            approval_data
                .entry("approval_id".to_string())
                .or_insert_with(|| approval.id.into());
        }
        current.merge_data(state_data! { APPROVAL_DATA_KEY => approval_data });
        self.store.save(&current).await?;

        info!(
            workflow_id = %current.id,
            from_status = %WorkflowStatus::Paused,
            to_status = %WorkflowStatus::Running,
            current_node = %current.current_node,
            "Workflow resumed"
        );

        definition
            .on_resume(&current, &payload)
            .await
            .map_err(|source| WorkflowError::HookFailed {
                hook: "on_resume",
                source,
            })?;

        self.run(current).await
    }

    /// Check a reviewer's decision against the pending approval, then resume
    /// with the decision as payload.
    pub async fn resume_with_decision(
        &self,
        state: &WorkflowState,
        decision: &ApprovalDecision,
    ) -> Result<WorkflowState, WorkflowError> {
        let current = self.store.reload(state).await?;
        if current.status != WorkflowStatus::Paused {
            return Err(WorkflowError::invalid_transition(
                current.status,
                WorkflowStatus::Running,
                format!("workflow {} is not paused", current.id),
            ));
        }
        let approval = current
            .pending_approval
            .as_ref()
            .ok_or_else(|| WorkflowError::NoPendingApproval {
                workflow_id: current.id.clone(),
            })?;

        if let Err(err) = decision.validate(approval) {
            warn!(
                workflow_id = %current.id,
                approval_id = %approval.id,
                reviewer = %decision.reviewer,
                reason = ?err.reason(),
                "Approval decision rejected"
            );
            return Err(err);
        }

        let payload = decision.to_payload(approval);
        self.resume(&current, payload).await
    }

    /// Advance the run by at most one executed step.
    ///
    /// Returns `true` while there is more to do. Skipped steps do not count;
    /// they are passed over in the same call. The run completes in the call
    /// that executes its final step.
    pub async fn execute_next_step(&self, state: &mut WorkflowState) -> Result<bool, WorkflowError> {
        if state.is_completed() {
            return Ok(false);
        }
        if matches!(state.status, WorkflowStatus::Paused | WorkflowStatus::Failed) {
            return Ok(false);
        }

        let definition = self.registry.get(&state.workflow_type)?;
        let steps = definition.steps();
        let mut next = definition
            .position(&state.current_node)
            .map_or(0, |index| index + 1);

        while let Some(step) = steps.get(next) {
            if self.skip_policy.should_skip(state, &step.name).await? {
                info!(
                    workflow_id = %state.id,
                    step = %step.name,
                    from_node = %state.current_node,
                    "Skipping step"
                );
                state.current_node = step.name.clone();
                state.touch();
                self.store.save(state).await?;
                next += 1;
                continue;
            }
            return self.execute_step(definition.as_ref(), step, state).await;
        }

        self.complete(definition.as_ref(), state).await?;
        Ok(false)
    }

    /// Jump forward so that `target` is the next step to run. The steps in
    /// between are passed over without executing.
    pub async fn skip_to(
        &self,
        state: &WorkflowState,
        target: &str,
    ) -> Result<WorkflowState, WorkflowError> {
        let mut current = self.store.reload(state).await?;
        if current.status != WorkflowStatus::Running || current.is_completed() {
            return Err(WorkflowError::invalid_transition(
                current.status,
                WorkflowStatus::Running,
                format!("workflow {} cannot skip ahead", current.id),
            ));
        }

        let definition = self.registry.get(&current.workflow_type)?;
        let target_index = definition.position(target).ok_or_else(|| {
            WorkflowError::invalid_transition(
                current.status,
                current.status,
                format!("step '{target}' is not part of {}", current.workflow_type),
            )
        })?;
        if definition
            .position(&current.current_node)
            .is_some_and(|index| target_index <= index)
        {
            return Err(WorkflowError::invalid_transition(
                current.status,
                current.status,
                format!("step '{target}' is not ahead of '{}'", current.current_node),
            ));
        }

        let from_node = std::mem::replace(
            &mut current.current_node,
            match target_index {
                0 => NODE_NONE.to_string(),
                index => definition.steps()[index - 1].name.clone(),
            },
        );
        current.touch();
        self.store.save(&current).await?;

        info!(
            workflow_id = %current.id,
            from_node = %from_node,
            target = %target,
            "Workflow skipped ahead"
        );
        Ok(current)
    }

    /// Re-run the step the run is positioned on, then keep going.
    ///
    /// Only for a step whose handler returned an error. Output is merged
    /// under the step name only on success, so a step that already has
    /// output is refused rather than executed twice.
    pub async fn redrive(&self, state: &WorkflowState) -> Result<WorkflowState, WorkflowError> {
        let mut current = self.store.reload(state).await?;
        if current.status != WorkflowStatus::Running {
            return Err(WorkflowError::invalid_transition(
                current.status,
                WorkflowStatus::Running,
                format!("workflow {} is not running", current.id),
            ));
        }

        let definition = self.registry.get(&current.workflow_type)?;
        let Some(step) = definition
            .position(&current.current_node)
            .and_then(|index| definition.steps().get(index))
        else {
            return Err(WorkflowError::invalid_transition(
                current.status,
                current.status,
                format!("workflow {} is not positioned on a step", current.id),
            ));
        };

        if current.state_data.contains_key(&step.name) {
            return Err(WorkflowError::invalid_transition(
                current.status,
                current.status,
                format!(
                    "step '{}' of workflow {} already finished; nothing to redrive",
                    step.name, current.id
                ),
            ));
        }

        info!(workflow_id = %current.id, step = %step.name, "Redriving step");
        if self.execute_step(definition.as_ref(), step, &mut current).await? {
            self.run(current).await
        } else {
            Ok(current)
        }
    }

    async fn execute_step(
        &self,
        definition: &dyn WorkflowDefinition,
        step: &Step,
        state: &mut WorkflowState,
    ) -> Result<bool, WorkflowError> {
        let from_node = std::mem::replace(&mut state.current_node, step.name.clone());
        state.touch();
        self.store.save(state).await?;
        info!(
            workflow_id = %state.id,
            step = %step.name,
            from_node = %from_node,
            "Executing step"
        );

        definition
            .before_step(state, &step.name)
            .await
            .map_err(|source| WorkflowError::HookFailed {
                hook: "before_step",
                source,
            })?;

        let ctx = StepContext {
            step: &step.name,
            checkpoint: &self.checkpoint,
            parameters: self.parameters.as_ref(),
        };
        let output = step.handler.execute(&ctx, state).await.map_err(|source| {
            warn!(workflow_id = %state.id, step = %step.name, error = %source, "Step handler failed");
            WorkflowError::StepFailed {
                step: step.name.clone(),
                source,
            }
        })?;

        definition
            .after_step(state, &step.name, &output)
            .await
            .map_err(|source| WorkflowError::HookFailed {
                hook: "after_step",
                source,
            })?;

        // The handler may have paused the run through the approval service.
        let mut current = self.store.reload(state).await?;
        current.merge_data(state_data! { step.name.as_str() => output.data.clone() });

        if output.is_paused() && !current.is_paused() {
            warn!(
                workflow_id = %current.id,
                step = %step.name,
                "Step reported a pause but no approval was recorded"
            );
        }
        if let StepDirective::Fail { reason } = &output.directive {
            warn!(
                workflow_id = %current.id,
                step = %step.name,
                from_status = %current.status,
                to_status = %WorkflowStatus::Failed,
                reason = %reason,
                "Step marked workflow as failed"
            );
            current.status = WorkflowStatus::Failed;
            current.failure_reason = Some(reason.clone());
        }

        self.store.save(&current).await?;
        *state = current;

        info!(
            workflow_id = %state.id,
            step = %step.name,
            status = %state.status,
            "Step finished"
        );
        let proceed =
            !state.is_paused() && !state.is_completed() && state.status != WorkflowStatus::Failed;
        let is_last = definition
            .position(&step.name)
            .is_some_and(|index| index + 1 == definition.steps().len());
        if proceed && is_last {
            self.complete(definition, state).await?;
            return Ok(false);
        }
        Ok(proceed)
    }

    async fn complete(
        &self,
        definition: &dyn WorkflowDefinition,
        state: &mut WorkflowState,
    ) -> Result<(), WorkflowError> {
        let from_status = state.status;
        state.current_node = NODE_COMPLETED.to_string();
        state.status = WorkflowStatus::Completed;
        state.touch();
        self.store.save(state).await?;

        info!(
            workflow_id = %state.id,
            from_status = %from_status,
            to_status = %WorkflowStatus::Completed,
            "Workflow completed"
        );

        definition
            .on_complete(state)
            .await
            .map_err(|source| WorkflowError::HookFailed {
                hook: "on_complete",
                source,
            })
    }

    async fn mark_failed(&self, state: &mut WorkflowState, reason: String) -> Result<(), WorkflowError> {
        warn!(
            workflow_id = %state.id,
            from_status = %state.status,
            to_status = %WorkflowStatus::Failed,
            reason = %reason,
            "Workflow failed"
        );
        state.status = WorkflowStatus::Failed;
        state.failure_reason = Some(reason);
        state.touch();
        self.store.save(state).await?;
        Ok(())
    }
}
