//! Cascade Config
//!
//! This crate contains the serializable workflow definition types for cascade.
//! These types represent workflow definitions as they are authored and stored,
//! before they are validated into a `cascade_workflow::Workflow`.
//!
//! Definitions can be loaded from:
//! - JSON files (via CLI with `cascade run workflow.json`)
//! - An external store (as JSON blobs)
//!
//! Node parameters are free-form JSON. Any string inside them may embed
//! `{{ expression }}` placeholders which are resolved right before the node runs.

mod edge;
mod node;
mod retry;
mod workflow;

pub use edge::EdgeDef;
pub use node::{NodeDef, OnError};
pub use retry::{Backoff, RetryPolicy};
pub use workflow::WorkflowDef;
