//! Built-in node executors for cascade.
//!
//! Executors that talk to the outside world do so through collaborator
//! traits ([`DataStore`], [`Mailer`], [`ProtocolClient`]) so they can be
//! swapped for real backends. [`Collaborators::default`] wires in-memory
//! implementations.

pub mod condition;
pub mod dbal;
pub mod email;
pub mod http;
pub mod protocol;
pub mod transform;
pub mod variables;
pub mod wait;
pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;

use cascade_node::{NodeExecutor, NodeRegistry};

pub use condition::{ConditionExecutor, truthy};
pub use dbal::{DataStore, DbalReadExecutor, DbalWriteExecutor, MemoryDataStore, WriteOperation};
pub use email::{EmailMessage, EmailSendExecutor, Mailer, OutboxMailer};
pub use http::HttpRequestExecutor;
pub use protocol::{ProtocolClient, ProtocolRequestExecutor};
pub use transform::TransformExecutor;
pub use variables::SetVariableExecutor;
pub use wait::WaitExecutor;
pub use webhook::WebhookResponseExecutor;

/// Error returned by collaborator backends.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("invalid request: {0}")]
  Invalid(String),

  #[error("service unavailable: {0}")]
  Unavailable(String),
}

/// Backends handed to the built-in executors.
#[derive(Clone)]
pub struct Collaborators {
  pub data_store: Arc<dyn DataStore>,
  pub mailer: Arc<dyn Mailer>,
  /// protocol name -> client
  pub protocols: HashMap<String, Arc<dyn ProtocolClient>>,
  pub http: reqwest::Client,
}

impl Collaborators {
  pub fn with_protocol(mut self, name: impl Into<String>, client: Arc<dyn ProtocolClient>) -> Self {
    self.protocols.insert(name.into(), client);
    self
  }
}

impl Default for Collaborators {
  fn default() -> Self {
    Self {
      data_store: Arc::new(MemoryDataStore::new()),
      mailer: Arc::new(OutboxMailer::new()),
      protocols: HashMap::new(),
      http: reqwest::Client::new(),
    }
  }
}

/// One instance of every built-in executor.
pub fn builtin_executors(collaborators: &Collaborators) -> Vec<Arc<dyn NodeExecutor>> {
  vec![
    Arc::new(HttpRequestExecutor::new(collaborators.http.clone())),
    Arc::new(ConditionExecutor),
    Arc::new(DbalReadExecutor::new(collaborators.data_store.clone())),
    Arc::new(DbalWriteExecutor::new(collaborators.data_store.clone())),
    Arc::new(EmailSendExecutor::new(collaborators.mailer.clone())),
    Arc::new(WaitExecutor),
    Arc::new(SetVariableExecutor),
    Arc::new(TransformExecutor),
    Arc::new(WebhookResponseExecutor),
    Arc::new(ProtocolRequestExecutor::new(collaborators.protocols.clone())),
  ]
}

/// A registry holding every built-in executor.
pub fn builtin_registry(collaborators: &Collaborators) -> NodeRegistry {
  let registry = NodeRegistry::new();
  registry.register_batch(builtin_executors(collaborators));
  registry
}
