//! Cascade Engine
//!
//! Entry point for running workflows. [`ExecutionEngine`] validates a
//! definition, walks it with the DAG executor through a [`RegistryInvoker`]
//! (executor lookup plus `{{ }}` resolution), and stores the resulting
//! [`cascade_store::ExecutionRecord`].
//!
//! # Architecture
//!
//! ```text
//! ExecutionEngine
//!   ├── EngineConfig      -> DagConfig
//!   ├── ExecutionStore    (records, workflow definitions)
//!   └── DagExecutor
//!         └── RegistryInvoker
//!               ├── NodeRegistry  (node type -> NodeExecutor)
//!               └── Resolver      (context / nodes / json / utils)
//! ```

mod config;
mod engine;
mod error;
mod invoker;
mod logs;

pub use config::EngineConfig;
pub use engine::{EXECUTION_ERROR, ExecutionEngine, WORKFLOW_FAILED};
pub use error::EngineError;
pub use invoker::RegistryInvoker;
pub use logs::LogCollector;
