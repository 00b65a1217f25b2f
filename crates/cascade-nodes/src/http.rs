use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use cascade_node::{
  ExecutionState, ExecutorMetadata, NodeExecutor, NodeResult, ResolvedNode, ValidationResult,
  WorkflowContext, codes, validate_required,
};
use cascade_workflow::Node;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub const NODE_TYPE: &str = "http-request";

pub const HTTP_REQUEST_FAILED: &str = "HTTP_REQUEST_FAILED";
pub const HTTP_4XX: &str = "HTTP_4xx";
pub const HTTP_5XX: &str = "HTTP_5xx";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Deserialize)]
struct HttpParams {
  url: String,
  #[serde(default = "default_method")]
  method: String,
  #[serde(default)]
  headers: HashMap<String, String>,
  #[serde(default)]
  query: HashMap<String, Value>,
  #[serde(default)]
  body: Option<Value>,
  #[serde(default)]
  timeout_ms: Option<u64>,
  /// Statuses accepted as success. Any 2xx when empty.
  #[serde(default)]
  expected_status: Vec<u16>,
}

fn default_method() -> String {
  "GET".to_string()
}

/// Performs an HTTP request and exposes `{ status, headers, body }`.
///
/// The body is parsed as JSON when possible and kept as a string otherwise.
/// Unexpected statuses are errors, but the output is still attached so that
/// downstream error handlers can inspect the response.
#[derive(Debug, Clone)]
pub struct HttpRequestExecutor {
  client: Client,
}

impl HttpRequestExecutor {
  pub fn new(client: Client) -> Self {
    Self { client }
  }
}

impl Default for HttpRequestExecutor {
  fn default() -> Self {
    Self::new(Client::new())
  }
}

#[async_trait]
impl NodeExecutor for HttpRequestExecutor {
  fn node_type(&self) -> &str {
    NODE_TYPE
  }

  fn metadata(&self) -> ExecutorMetadata {
    ExecutorMetadata::new(NODE_TYPE)
      .category("integration")
      .description("Send an HTTP request")
      .required(["url"])
  }

  fn validate(&self, node: &Node) -> ValidationResult {
    let mut result = validate_required(node, ["url"]);
    if let Some(Value::String(method)) = node.parameter("method")
      && !method.contains("{{")
      && parse_method(method).is_none()
    {
      result.push_error(format!("unsupported HTTP method: {method}"));
    }
    result
  }

  async fn execute(
    &self,
    node: &ResolvedNode,
    _context: &WorkflowContext,
    _state: &ExecutionState,
  ) -> NodeResult {
    let params: HttpParams = match node.parse_parameters() {
      Ok(params) => params,
      Err(result) => return result,
    };

    let Some(method) = parse_method(&params.method) else {
      return NodeResult::error(
        codes::INVALID_PARAMETERS,
        format!("unsupported HTTP method: {}", params.method),
      );
    };

    let timeout = Duration::from_millis(params.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
    let mut request = self
      .client
      .request(method.clone(), &params.url)
      .timeout(timeout);

    for (key, value) in &params.headers {
      request = request.header(key, value);
    }

    if !params.query.is_empty() {
      let query: Vec<(&str, String)> = params
        .query
        .iter()
        .map(|(k, v)| (k.as_str(), query_value(v)))
        .collect();
      request = request.query(&query);
    }

    if let Some(body) = &params.body {
      request = match body {
        Value::String(text) => request.body(text.clone()),
        other => request.json(other),
      };
    }

    debug!(node_id = %node.node_id(), method = %method, url = %params.url, "http_request");

    let response = match request.send().await {
      Ok(response) => response,
      Err(e) => {
        warn!(node_id = %node.node_id(), url = %params.url, error = %e, "http_request_failed");
        return NodeResult::error(HTTP_REQUEST_FAILED, format!("request failed: {e}"))
          .with_api_calls(1);
      }
    };

    let status = response.status().as_u16();
    let headers: HashMap<String, String> = response
      .headers()
      .iter()
      .filter_map(|(k, v)| {
        v.to_str()
          .ok()
          .map(|val| (k.as_str().to_string(), val.to_string()))
      })
      .collect();

    let body = match response.text().await {
      Ok(body) => body,
      Err(e) => {
        return NodeResult::error(HTTP_REQUEST_FAILED, format!("failed to read body: {e}"))
          .with_api_calls(1);
      }
    };

    let body_value = serde_json::from_str(&body).unwrap_or(Value::String(body));

    let output = json!({
      "status": status,
      "headers": headers,
      "body": body_value,
    });

    let accepted = if params.expected_status.is_empty() {
      (200..300).contains(&status)
    } else {
      params.expected_status.contains(&status)
    };

    let result = if accepted {
      NodeResult::success(output)
    } else {
      let code = if status >= 500 { HTTP_5XX } else { HTTP_4XX };
      NodeResult::error(code, format!("unexpected status {status} from {}", params.url))
        .with_output(output)
    };
    result.with_api_calls(1)
  }
}

fn parse_method(method: &str) -> Option<Method> {
  match method.to_uppercase().as_str() {
    "GET" => Some(Method::GET),
    "POST" => Some(Method::POST),
    "PUT" => Some(Method::PUT),
    "DELETE" => Some(Method::DELETE),
    "PATCH" => Some(Method::PATCH),
    "HEAD" => Some(Method::HEAD),
    "OPTIONS" => Some(Method::OPTIONS),
    _ => None,
  }
}

fn query_value(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{node, run};
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  /// Serve one canned response on a loopback port and return its base url.
  async fn serve_once(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut buf = vec![0u8; 4096];
      let _ = socket.read(&mut buf).await;
      let response = format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
      );
      socket.write_all(response.as_bytes()).await.unwrap();
      socket.shutdown().await.unwrap();
    });
    format!("http://{addr}")
  }

  #[tokio::test]
  async fn test_success_parses_json_body() {
    let url = serve_once("200 OK", r#"{"id":7}"#).await;
    let result = run(&HttpRequestExecutor::default(), json!({ "url": url })).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output["status"], 200);
    assert_eq!(result.output["body"]["id"], 7);
    assert_eq!(result.api_calls, 1);
  }

  #[tokio::test]
  async fn test_server_error_keeps_output() {
    let url = serve_once("503 Service Unavailable", r#"{"retry":true}"#).await;
    let result = run(
      &HttpRequestExecutor::default(),
      json!({ "url": url, "method": "post", "body": { "a": 1 } }),
    )
    .await;

    assert!(result.is_error());
    assert_eq!(result.error_code.as_deref(), Some(HTTP_5XX));
    assert_eq!(result.output["status"], 503);
  }

  #[tokio::test]
  async fn test_expected_status_overrides_default() {
    let url = serve_once("404 Not Found", "missing").await;
    let result = run(
      &HttpRequestExecutor::default(),
      json!({ "url": url, "expected_status": [404] }),
    )
    .await;

    assert!(result.is_success());
    assert_eq!(result.output["body"], "missing");
  }

  #[tokio::test]
  async fn test_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = run(
      &HttpRequestExecutor::default(),
      json!({ "url": format!("http://{addr}"), "timeout_ms": 2000 }),
    )
    .await;

    assert!(result.is_error());
    assert_eq!(result.error_code.as_deref(), Some(HTTP_REQUEST_FAILED));
  }

  #[tokio::test]
  async fn test_unsupported_method() {
    let result = run(
      &HttpRequestExecutor::default(),
      json!({ "url": "http://localhost", "method": "BREW" }),
    )
    .await;
    assert_eq!(result.error_code.as_deref(), Some(codes::INVALID_PARAMETERS));
  }

  #[test]
  fn test_validate() {
    let executor = HttpRequestExecutor::default();
    assert!(!executor.validate(&node(NODE_TYPE, json!({}))).valid);
    assert!(
      !executor
        .validate(&node(NODE_TYPE, json!({ "url": "http://x", "method": "BREW" })))
        .valid
    );
    assert!(
      executor
        .validate(&node(NODE_TYPE, json!({ "url": "http://x", "method": "{{ context.m }}" })))
        .valid
    );
  }
}
