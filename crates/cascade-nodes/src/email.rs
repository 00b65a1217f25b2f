use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cascade_node::{
  ExecutionState, ExecutorMetadata, NodeExecutor, NodeResult, ResolvedNode, WorkflowContext,
  codes,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::ServiceError;

pub const NODE_TYPE: &str = "email-send";

pub const EMAIL_SEND_FAILED: &str = "EMAIL_SEND_FAILED";

/// A message handed to a [`Mailer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
  pub tenant_id: String,
  pub to: Vec<String>,
  #[serde(default)]
  pub cc: Vec<String>,
  pub subject: String,
  pub body: String,
  #[serde(default)]
  pub html: bool,
}

/// Delivery backend for `email-send`.
#[async_trait]
pub trait Mailer: Send + Sync {
  /// Returns a message id.
  async fn send(&self, message: &EmailMessage) -> Result<String, ServiceError>;
}

/// Keeps sent messages in memory instead of delivering them.
#[derive(Debug, Default)]
pub struct OutboxMailer {
  sent: Mutex<Vec<EmailMessage>>,
}

impl OutboxMailer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn sent(&self) -> Vec<EmailMessage> {
    self
      .sent
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .clone()
  }
}

#[async_trait]
impl Mailer for OutboxMailer {
  async fn send(&self, message: &EmailMessage) -> Result<String, ServiceError> {
    let id = uuid::Uuid::new_v4().to_string();
    self
      .sent
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .push(message.clone());
    Ok(id)
  }
}

/// A single address or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Recipients {
  One(String),
  Many(Vec<String>),
}

impl Recipients {
  fn into_vec(self) -> Vec<String> {
    let list = match self {
      Recipients::One(one) => one.split(',').map(str::to_string).collect(),
      Recipients::Many(many) => many,
    };
    list
      .into_iter()
      .map(|addr| addr.trim().to_string())
      .filter(|addr| !addr.is_empty())
      .collect()
  }
}

#[derive(Debug, Deserialize)]
struct EmailParams {
  to: Recipients,
  #[serde(default)]
  cc: Option<Recipients>,
  subject: String,
  #[serde(default)]
  body: String,
  #[serde(default)]
  html: bool,
}

pub struct EmailSendExecutor {
  mailer: Arc<dyn Mailer>,
}

impl EmailSendExecutor {
  pub fn new(mailer: Arc<dyn Mailer>) -> Self {
    Self { mailer }
  }
}

fn is_address(addr: &str) -> bool {
  match addr.split_once('@') {
    Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
    None => false,
  }
}

#[async_trait]
impl NodeExecutor for EmailSendExecutor {
  fn node_type(&self) -> &str {
    NODE_TYPE
  }

  fn metadata(&self) -> ExecutorMetadata {
    ExecutorMetadata::new(NODE_TYPE)
      .category("integration")
      .description("Send an email")
      .required(["to", "subject"])
  }

  async fn execute(
    &self,
    node: &ResolvedNode,
    context: &WorkflowContext,
    _state: &ExecutionState,
  ) -> NodeResult {
    let params: EmailParams = match node.parse_parameters() {
      Ok(params) => params,
      Err(result) => return result,
    };

    let to = params.to.into_vec();
    let cc = params.cc.map(Recipients::into_vec).unwrap_or_default();
    if to.is_empty() {
      return NodeResult::error(codes::INVALID_PARAMETERS, "no recipients");
    }
    if let Some(bad) = to.iter().chain(&cc).find(|addr| !is_address(addr)) {
      return NodeResult::error(
        codes::INVALID_PARAMETERS,
        format!("invalid email address: {bad}"),
      );
    }

    let message = EmailMessage {
      tenant_id: context.tenant_id.clone(),
      to,
      cc,
      subject: params.subject,
      body: params.body,
      html: params.html,
    };

    match self.mailer.send(&message).await {
      Ok(message_id) => {
        info!(node_id = %node.node_id(), recipients = message.to.len(), "email_sent");
        NodeResult::success(json!({
          "message_id": message_id,
          "to": message.to,
          "cc": message.cc,
          "subject": message.subject,
        }))
        .with_api_calls(1)
      }
      Err(e) => {
        warn!(node_id = %node.node_id(), error = %e, "email_send_failed");
        NodeResult::error(EMAIL_SEND_FAILED, e.to_string()).with_api_calls(1)
      }
    }
  }
}
