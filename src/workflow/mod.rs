//! Workflow execution core
//!
//! - **definition**: step handlers, workflow definitions and their registry
//! - **engine**: drives a run through its steps and persists every transition
//! - **approval**: suspends a run until a reviewer decides
//! - **skip_policy** / **customization**: per-team step bypass and parameters
//! - **errors**: the error type every operation here returns

pub mod approval;
pub mod customization;
pub mod definition;
pub mod engine;
pub mod errors;
pub mod skip_policy;

pub use approval::{
    ApprovalCheckpoint, ApprovalDecision, ApprovalRef, ApprovalRequest, ApprovalService,
    ReviewerKind, StoreApprovalService,
};
pub use customization::{
    CustomizationLookup, CustomizationParameterLookup, DefaultParameters, LookupError,
    ParameterLookup, SkipCondition, SkipRule, StaticCustomizations, WorkflowCustomization, ANY_TEAM,
};
pub use definition::{
    Step, StepContext, StepDirective, StepHandler, StepOutput, StepSequence, WorkflowDefinition,
    WorkflowRegistry,
};
pub use engine::WorkflowEngine;
pub use errors::{TransitionReason, WorkflowError};
pub use skip_policy::{CustomizationSkipPolicy, NoSkipPolicy, SkipPolicy};

#[cfg(any(test, feature = "testing"))]
pub use approval::MockApprovalService;
#[cfg(any(test, feature = "testing"))]
pub use customization::{MockCustomizationLookup, MockParameterLookup};
