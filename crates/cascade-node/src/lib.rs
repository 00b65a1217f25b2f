//! Node executor contract for cascade.
//!
//! Every node type is implemented by a [`NodeExecutor`] registered in a
//! [`NodeRegistry`] under its node type. Executors receive the node with its
//! parameters already resolved ([`ResolvedNode`]), the per-execution
//! [`WorkflowContext`], and a read-only view of the [`ExecutionState`]
//! produced by the nodes that finished before them.

mod context;
mod executor;
mod metrics;
mod registry;
mod result;
mod state;
mod validation;

pub use context::{Trigger, Variables, WorkflowContext};
pub use executor::{ExecutorMetadata, NodeExecutor, ResolvedNode};
pub use metrics::ExecutionMetrics;
pub use registry::{NodeRegistry, RegistryEntry, RegistryError};
pub use result::{NodeResult, NodeStatus, codes};
pub use state::ExecutionState;
pub use validation::{ValidationResult, validate_required};
