//! # runtime-cli
//!
//! Thin demo binary over the Runtime RPC surface: `validate` checks a
//! `GraphSpec` package without running it, `run` triggers one entry
//! point in-process and prints the event stream to the terminal until
//! the execution finishes, and `serve` starts the HTTP/WS front.
//!
//! Grounded on the teacher's `langgraph-cli` subcommand shape
//! (`Validate`/`Check`/`Run`) and `orchestrator-server`'s startup/
//! graceful-shutdown sequence, with the task-database wiring dropped —
//! this binary has nothing to migrate or connect to.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use runtime_core::{EventBus, GraphSpec, ImplicitJudge, LoopConfig, SharedMemory, SubscriptionFilter};
use runtime_llm::{MockLlmClient, OpenAiCompatibleClient, RemoteLlmConfig};
use runtime_orchestrator::AgentRuntime;
use runtime_tools::ToolRegistryBuilder;

#[derive(Parser)]
#[command(name = "runtime")]
#[command(about = "Agent runtime demo CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a GraphSpec YAML file without running it.
    Validate {
        /// Path to the graph YAML file.
        file: PathBuf,
    },

    /// Load a graph and trigger one entry point, printing events to
    /// stdout until the execution completes, dead-ends, or escalates.
    Run {
        /// Path to the graph YAML file.
        file: PathBuf,

        /// Entry point id to trigger.
        #[arg(short, long)]
        entry_point: String,

        /// Initial input, as a JSON object.
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Directory session/checkpoint state is written under.
        #[arg(long, default_value = "./runtime-data")]
        storage_root: PathBuf,
    },

    /// Start the HTTP/WS front over the Runtime RPC surface.
    Serve {
        /// Path to the primary graph's YAML file.
        file: PathBuf,

        /// Address to bind the HTTP server to.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,

        /// Directory session/checkpoint state is written under.
        #[arg(long, default_value = "./runtime-data")]
        storage_root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { file } => validate(&file),
        Commands::Run { file, entry_point, input, storage_root } => run(&file, &entry_point, &input, storage_root).await,
        Commands::Serve { file, bind, storage_root } => serve(&file, &bind, storage_root).await,
    }
}

fn validate(file: &PathBuf) -> anyhow::Result<()> {
    let yaml = std::fs::read_to_string(file)?;
    let graph = GraphSpec::from_yaml(&yaml)?;
    println!("graph is valid");
    println!("  id: {}", graph.id);
    println!("  nodes: {}", graph.nodes.len());
    println!("  edges: {}", graph.edges.len());
    println!("  entry points: {}", graph.entry_points.len());
    for ep in &graph.entry_points {
        println!("    - {} ({:?}) -> {}", ep.id, ep.trigger_type, ep.entry_node);
    }
    Ok(())
}

/// Builds the LLM backend from the environment: an OpenAI-compatible
/// endpoint if `RUNTIME_LLM_BASE_URL` and `RUNTIME_LLM_API_KEY` are set,
/// otherwise a deterministic mock so the demo runs with no network.
fn build_llm() -> anyhow::Result<Arc<dyn runtime_core::LlmClient>> {
    match std::env::var("RUNTIME_LLM_BASE_URL") {
        Ok(base_url) => {
            let model = std::env::var("RUNTIME_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
            let config = RemoteLlmConfig::from_env("RUNTIME_LLM_API_KEY", base_url, model)?;
            Ok(Arc::new(OpenAiCompatibleClient::new(config)?))
        }
        Err(_) => {
            tracing::info!("RUNTIME_LLM_BASE_URL not set, using the mock LLM backend");
            Ok(Arc::new(MockLlmClient::single_text("ok")))
        }
    }
}

async fn build_runtime(file: &PathBuf, storage_root: PathBuf) -> anyhow::Result<(Arc<AgentRuntime>, String)> {
    let yaml = std::fs::read_to_string(file)?;
    let graph = GraphSpec::from_yaml(&yaml)?;
    let graph_id = graph.id.clone();

    let runtime = AgentRuntime::new(
        EventBus::new(),
        build_llm()?,
        Arc::new(ToolRegistryBuilder::with_defaults().build()),
        Arc::new(ImplicitJudge),
        LoopConfig::default(),
        storage_root,
    );
    let goal = graph.goal.clone();
    runtime.add_graph(graph_id.clone(), graph, goal, None, true).await?;
    Ok((runtime, graph_id))
}

async fn run(file: &PathBuf, entry_point: &str, input: &str, storage_root: PathBuf) -> anyhow::Result<()> {
    let (runtime, graph_id) = build_runtime(file, storage_root).await?;

    let payload: serde_json::Map<String, serde_json::Value> = serde_json::from_str(input)?;
    let mut memory = SharedMemory::default();
    for (key, value) in payload {
        memory.insert(key, value);
    }

    let (_subscription_id, mut events) = runtime.event_bus().subscribe(SubscriptionFilter::default()).await;
    let handle = runtime.trigger(Some(graph_id), entry_point, memory, None).await?;
    println!("execution {} / session {} started", handle.execution_id, handle.session_id);

    while let Some(event) = events.recv().await {
        println!("[{}] {:?} {}", event.timestamp.format("%H:%M:%S"), event.event_type, event.payload);
        if event.execution_id.as_deref() == Some(handle.execution_id.as_str())
            && matches!(
                event.event_type,
                runtime_core::EventType::ExecutionCompleted
                    | runtime_core::EventType::ExecutionFailed
                    | runtime_core::EventType::ExecutionPaused
            )
        {
            break;
        }
    }
    Ok(())
}

async fn serve(file: &PathBuf, bind: &str, storage_root: PathBuf) -> anyhow::Result<()> {
    let (runtime, graph_id) = build_runtime(file, storage_root).await?;
    tracing::info!(graph_id, "loaded primary graph");

    let app = runtime_orchestrator::api::create_router(runtime);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(bind, "starting Runtime RPC surface");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("runtime shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install CTRL-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received CTRL-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
