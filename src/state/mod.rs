//! Durable workflow run records
//!
//! - **value**: the typed `state_data` document and its merge rules
//! - **workflow_state**: the per-run record and its status
//! - **store**: the persistence interface the engine depends on
//! - **memory** / **file**: in-process and JSON-file backends

pub mod file;
pub mod memory;
pub mod store;
pub mod value;
pub mod workflow_state;

pub use file::FileSystemStateStore;
pub use memory::InMemoryStateStore;
pub use store::{StateStore, StoreError};
pub use value::{lookup_path, merge_state_data, StateData, StateValue};
pub use workflow_state::{
    OwnerContext, WorkflowState, WorkflowStatus, APPROVAL_DATA_KEY, NODE_COMPLETED, NODE_NONE,
};
