//! DAG executor for cascade.
//!
//! Sequences the nodes of a validated [`cascade_workflow::Workflow`]:
//! readiness by dependency, branch pruning through labeled edges, per-node
//! retry and timeout, panic isolation, bounded concurrency and cancellation.
//!
//! How a single node is run (template resolution, executor lookup) is
//! delegated to a [`NodeInvoker`].

mod config;
mod dag;
mod error;
mod events;
mod invoker;

pub use config::DagConfig;
pub use dag::{DagExecutor, DagOutcome, ERROR_LABEL, edge_active};
pub use error::InvokeError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier, Tee};
pub use invoker::NodeInvoker;
