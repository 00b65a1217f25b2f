//! Cascade Workflow
//!
//! This crate provides the validated workflow representation for cascade.
//! A [`Workflow`] can only be built from a `WorkflowDef` that passed the
//! structural checks, so everything downstream may rely on them:
//! - node ids are non-empty and unique
//! - every edge references existing nodes
//! - the graph is acyclic (checked with Kahn's algorithm, not assumed)
//!
//! Node-level defaults (retry policy, timeout) are folded in from the
//! workflow definition at this point.

mod error;
mod graph;
mod node;
mod workflow;

pub use error::WorkflowError;
pub use graph::Graph;
pub use node::{Edge, Node};
pub use workflow::Workflow;
