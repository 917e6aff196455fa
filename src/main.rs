use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trellis_engine::{EngineConfig, ExecutionEvent, RecoveryCoordinator, WorkflowEngine};
use trellis_gateway::{CallStatus, Gateway};
use trellis_store::{ExecutionStatus, SqliteStore};
use trellis_tool::ToolCategory;
use trellis_tool_registry::ToolRegistryBuilder;
use trellis_workflow::WorkflowSpec;

mod tools;

/// Trellis - a durable tool-workflow DAG engine
#[derive(Parser)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.trellis)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow or a single tool
  Run {
    #[command(subcommand)]
    target: RunTarget,
  },

  /// List registered tools
  Tools {
    /// Filter by category (UTILITY, HEAVY, ADMIN)
    #[arg(long)]
    category: Option<String>,
  },

  /// Show a tool's user-facing input schema
  Schema {
    tool: String,

    /// Inline the tool's declared dependencies
    #[arg(long)]
    pipeline: bool,
  },

  /// Show the persisted state of a workflow
  Status { workflow_id: String },

  /// List recent workflow executions
  Executions {
    #[arg(long, default_value_t = 10)]
    limit: i64,

    /// Filter by status (PENDING, RUNNING, COMPLETED, FAILED)
    #[arg(long)]
    status: Option<String>,
  },

  /// Reconcile executions interrupted by a previous process
  Recover,
}

#[derive(Subcommand)]
enum RunTarget {
  /// Run a workflow from a JSON spec file, streaming events as NDJSON
  Workflow {
    /// Path to the workflow spec file
    workflow_file: PathBuf,
  },

  /// Run a single tool; arguments are read from stdin as JSON
  Tool {
    /// The registered tool name
    name: String,
  },
}

/// The long-lived application values: one store, one registry, one engine,
/// surfaced through the gateway.
struct App {
  store: Arc<SqliteStore>,
  gateway: Gateway<SqliteStore>,
}

impl App {
  async fn build(data_dir: &Path) -> Result<Self> {
    tokio::fs::create_dir_all(data_dir)
      .await
      .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let store = Arc::new(
      SqliteStore::connect(&data_dir.join("trellis.db"))
        .await
        .context("failed to open the trellis database")?,
    );
    store.migrate().await.context("failed to run migrations")?;

    let registry = Arc::new(
      ToolRegistryBuilder::new()
        .tool(Arc::new(tools::EchoTool))
        .tool(Arc::new(tools::MakeIdTool))
        .build()
        .context("failed to build the tool registry")?,
    );

    let engine = Arc::new(WorkflowEngine::new(
      registry.clone(),
      store.clone(),
      EngineConfig::default(),
    ));

    Ok(Self {
      gateway: Gateway::new(registry, engine, store.clone()),
      store,
    })
  }

  /// Reconcile interrupted work left by a prior process. Runs before any
  /// command that submits new work.
  async fn recover(&self) -> Result<trellis_store::RecoveredIds> {
    RecoveryCoordinator::new(self.store.clone())
      .recover()
      .await
      .context("startup recovery failed")
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = cli.data_dir.unwrap_or_else(|| {
    dirs::home_dir()
      .expect("could not determine home directory")
      .join(".trellis")
  });

  match cli.command {
    Commands::Run { target } => match target {
      RunTarget::Workflow { workflow_file } => run_workflow(workflow_file, &data_dir).await,
      RunTarget::Tool { name } => run_tool(name, &data_dir).await,
    },
    Commands::Tools { category } => list_tools(category, &data_dir).await,
    Commands::Schema { tool, pipeline } => show_schema(tool, pipeline, &data_dir).await,
    Commands::Status { workflow_id } => show_status(workflow_id, &data_dir).await,
    Commands::Executions { limit, status } => list_executions(limit, status, &data_dir).await,
    Commands::Recover => recover(&data_dir).await,
  }
}

async fn run_workflow(workflow_file: PathBuf, data_dir: &Path) -> Result<()> {
  let app = App::build(data_dir).await?;
  app.recover().await?;

  let content = tokio::fs::read_to_string(&workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;
  let spec: WorkflowSpec = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  let mut submission = app.gateway.submit_workflow(spec, None);
  let mut failed = false;
  while let Some(event) = submission.events.recv().await {
    if matches!(event, ExecutionEvent::WorkflowFailed { .. }) {
      failed = true;
    }
    println!("{}", serde_json::to_string(&event)?);
  }

  if failed {
    bail!("workflow failed");
  }
  Ok(())
}

async fn run_tool(name: String, data_dir: &Path) -> Result<()> {
  let app = App::build(data_dir).await?;
  app.recover().await?;

  let arguments = read_arguments_from_stdin()?;
  let outcome = app.gateway.call_tool(&name, arguments).await;
  println!("{}", serde_json::to_string_pretty(&outcome)?);

  if matches!(outcome.status, CallStatus::Failed) {
    bail!("tool invocation failed");
  }
  Ok(())
}

async fn list_tools(category: Option<String>, data_dir: &Path) -> Result<()> {
  let app = App::build(data_dir).await?;
  let category = category.map(|c| parse_category(&c)).transpose()?;
  let catalogue = app.gateway.catalogue(category);
  println!("{}", serde_json::to_string_pretty(&catalogue)?);
  Ok(())
}

async fn show_schema(tool: String, pipeline: bool, data_dir: &Path) -> Result<()> {
  let app = App::build(data_dir).await?;
  let response = app
    .gateway
    .tool_schema(&tool, pipeline)
    .with_context(|| format!("failed to compose schema for '{tool}'"))?;
  println!("{}", serde_json::to_string_pretty(&response)?);
  Ok(())
}

async fn show_status(workflow_id: String, data_dir: &Path) -> Result<()> {
  let app = App::build(data_dir).await?;
  match app.gateway.workflow_status(&workflow_id).await? {
    Some(status) => {
      println!("{}", serde_json::to_string_pretty(&status)?);
      Ok(())
    }
    None => bail!("workflow '{workflow_id}' not found"),
  }
}

async fn list_executions(limit: i64, status: Option<String>, data_dir: &Path) -> Result<()> {
  let app = App::build(data_dir).await?;
  let status = status.map(|s| parse_status(&s)).transpose()?;
  let executions = app.gateway.recent_executions(limit, status).await?;
  println!("{}", serde_json::to_string_pretty(&executions)?);
  Ok(())
}

async fn recover(data_dir: &Path) -> Result<()> {
  let app = App::build(data_dir).await?;
  let recovered = app.recover().await?;

  println!(
    "{}",
    serde_json::to_string_pretty(&serde_json::json!({
      "workflows": recovered.workflow_ids,
      "nodes": recovered.node_ids,
    }))?
  );
  Ok(())
}

fn read_arguments_from_stdin() -> Result<serde_json::Map<String, serde_json::Value>> {
  let mut buffer = String::new();
  std::io::stdin()
    .read_to_string(&mut buffer)
    .context("failed to read arguments from stdin")?;

  if buffer.trim().is_empty() {
    return Ok(serde_json::Map::new());
  }

  let value: serde_json::Value =
    serde_json::from_str(&buffer).context("arguments must be a JSON object")?;
  match value {
    serde_json::Value::Object(map) => Ok(map),
    _ => bail!("arguments must be a JSON object"),
  }
}

fn parse_category(raw: &str) -> Result<ToolCategory> {
  serde_json::from_value(serde_json::Value::String(raw.to_uppercase()))
    .with_context(|| format!("unknown category: {raw}"))
}

fn parse_status(raw: &str) -> Result<ExecutionStatus> {
  serde_json::from_value(serde_json::Value::String(raw.to_uppercase()))
    .with_context(|| format!("unknown status: {raw}"))
}
