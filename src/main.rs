use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cascade_config::WorkflowDef;
use cascade_engine::{EngineConfig, ExecutionEngine};
use cascade_node::{Trigger, WorkflowContext};
use cascade_nodes::{Collaborators, builtin_registry};
use cascade_store::{ExecutionStatus, FsStore};

/// Cascade - a workflow orchestration engine
#[derive(Parser)]
#[command(name = "cascade")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.cascade)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Engine configuration file (default: <data-dir>/config.json if present)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Tenant the executions belong to
  #[arg(long, global = true, default_value = "default")]
  tenant: String,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow file; the trigger payload is read from stdin
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// Trigger kind recorded on the execution
    #[arg(long, default_value = "manual")]
    trigger: String,
  },

  /// Check a workflow file without running it
  Validate {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// List the available node types
  Nodes,

  /// Show a stored execution record
  Status {
    execution_id: String,
  },

  /// List recent executions of a workflow
  History {
    workflow_id: String,

    #[arg(long, default_value_t = 20)]
    limit: usize,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".cascade"),
  };

  let Some(command) = cli.command else {
    println!("cascade - use --help to see available commands");
    return Ok(());
  };

  let config = load_config(cli.config.as_deref(), &data_dir)?;
  let engine = build_engine(&data_dir, config);

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Run {
        workflow_file,
        trigger,
      } => run_workflow(&engine, &workflow_file, &cli.tenant, trigger).await,
      Commands::Validate { workflow_file } => validate_workflow(&engine, &workflow_file).await,
      Commands::Nodes => list_nodes(&engine),
      Commands::Status { execution_id } => {
        let record = engine
          .get_execution_status(&execution_id, &cli.tenant)
          .await
          .with_context(|| format!("failed to load execution '{execution_id}'"))?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        Ok(())
      }
      Commands::History { workflow_id, limit } => {
        let records = engine
          .list_executions(&workflow_id, &cli.tenant, limit)
          .await
          .with_context(|| format!("failed to list executions of '{workflow_id}'"))?;
        for record in records {
          println!(
            "{}  {}  {:>7}  {}ms",
            record.id,
            record.start_time.to_rfc3339(),
            record.status.as_str(),
            record.duration_ms
          );
        }
        Ok(())
      }
    }
  })
}

fn build_engine(data_dir: &Path, config: EngineConfig) -> ExecutionEngine {
  let store = Arc::new(FsStore::new(data_dir));
  let registry = builtin_registry(&Collaborators::default());
  ExecutionEngine::new(registry, store, config)
}

/// Explicit `--config` must exist; otherwise `<data-dir>/config.json` is used
/// when present, and defaults when not.
fn load_config(explicit: Option<&Path>, data_dir: &Path) -> Result<EngineConfig> {
  let path = match explicit {
    Some(path) => path.to_path_buf(),
    None => {
      let default = data_dir.join("config.json");
      if !default.exists() {
        return Ok(EngineConfig::default());
      }
      default
    }
  };

  let content = std::fs::read_to_string(&path)
    .with_context(|| format!("failed to read config file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse config file: {}", path.display()))
}

async fn read_workflow(workflow_file: &Path) -> Result<WorkflowDef> {
  let content = tokio::fs::read_to_string(workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))
}

async fn run_workflow(
  engine: &ExecutionEngine,
  workflow_file: &Path,
  tenant_id: &str,
  trigger: String,
) -> Result<()> {
  let def = read_workflow(workflow_file).await?;
  eprintln!("Loaded workflow: {} ({} nodes)", def.name, def.nodes.len());

  let payload = read_payload_from_stdin()?;

  let context = WorkflowContext::new(tenant_id).with_trigger(Trigger::new(trigger, payload));
  let record = engine
    .execute_workflow(&def, context)
    .await
    .context("workflow could not be executed")?;

  eprintln!(
    "Execution {} finished: {} ({} executed, {} failed, {} skipped)",
    record.id,
    record.status,
    record.metrics.nodes_executed,
    record.metrics.failed_nodes,
    record.metrics.skipped_nodes
  );

  println!("{}", serde_json::to_string_pretty(&record)?);

  if record.status != ExecutionStatus::Success {
    bail!("execution {} finished with status {}", record.id, record.status);
  }
  Ok(())
}

async fn validate_workflow(engine: &ExecutionEngine, workflow_file: &Path) -> Result<()> {
  let def = read_workflow(workflow_file).await?;
  let results = engine
    .validate_workflow(&def)
    .context("workflow is structurally invalid")?;

  let mut invalid = 0;
  for (node_id, result) in &results {
    let mark = if result.valid { "ok" } else { "invalid" };
    println!("{node_id}: {mark}");
    for error in &result.errors {
      println!("  error: {error}");
    }
    for warning in &result.warnings {
      println!("  warning: {warning}");
    }
    if !result.valid {
      invalid += 1;
    }
  }

  if invalid > 0 {
    bail!("{invalid} node(s) failed validation");
  }
  Ok(())
}

fn list_nodes(engine: &ExecutionEngine) -> Result<()> {
  for node_type in engine.list_executors() {
    match engine.registry().metadata(&node_type) {
      Some(meta) => println!("{:<18} {:<12} {}", node_type, meta.category, meta.description),
      None => println!("{node_type}"),
    }
  }
  Ok(())
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    Ok(serde_json::json!({}))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read payload from stdin")?;

    if input.trim().is_empty() {
      Ok(serde_json::json!({}))
    } else {
      serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_config_defaults_without_file() {
    let dir = TempDir::new().unwrap();
    let config = load_config(None, dir.path()).unwrap();
    assert_eq!(config, EngineConfig::default());
  }

  #[test]
  fn test_config_from_data_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.json"), r#"{ "max_concurrency": 2 }"#).unwrap();

    let config = load_config(None, dir.path()).unwrap();
    assert_eq!(config.max_concurrency, 2);
  }

  #[test]
  fn test_explicit_config_must_exist() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.json");
    assert!(load_config(Some(missing.as_path()), dir.path()).is_err());
  }

  #[test]
  fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = load_config(Some(path.as_path()), dir.path()).unwrap_err();
    assert!(err.to_string().contains("failed to parse config file"));
  }
}
