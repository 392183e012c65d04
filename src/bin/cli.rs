use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;
use triggerflow::bridge::{send_slack_test, SlackTestMessage};
use triggerflow::engine::{compile, TriggerResponse};
use triggerflow::prelude::*;

#[derive(Parser)]
#[command(name = "triggerflow")]
#[command(about = "Run trigger-driven workflows", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger a single workflow file and print the response
    Run {
        /// Path to the workflow file (.yaml, .yml or .json)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Trigger input as JSON
        #[arg(short, long)]
        input: Option<String>,

        /// Path to runner.yaml config file (default: runner.yaml next to FILE)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Go through the in-memory queue and a worker instead of running inline
        #[arg(short, long)]
        queued: bool,
    },

    /// Compile workflow steps without running them
    Validate {
        /// Path to workflow file or directory
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// List workflows in a directory
    List {
        /// Path to the workflows directory
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },

    /// Send a test message to a Slack incoming webhook
    SlackTest {
        /// Message text
        #[arg(value_name = "TEXT")]
        text: String,

        /// Webhook URL or env:NAME
        #[arg(short, long, default_value = "env:SLACK_WEBHOOK_URL")]
        url: String,

        /// Path to runner.yaml config file for env: secrets
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Per-attempt timeout in milliseconds
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,

        /// Retries after the first attempt
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },
}

#[cfg(feature = "otel")]
fn init_otel_tracing(verbose: bool) -> anyhow::Result<()> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::runtime::Tokio;
    use opentelemetry_sdk::trace::TracerProvider;

    let filter = if verbose {
        "triggerflow=debug"
    } else {
        "triggerflow=info"
    };

    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&otlp_endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .build();

    let tracer = provider.tracer("triggerflow");
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .init();

    opentelemetry::global::set_tracer_provider(provider);
    Ok(())
}

#[cfg(not(feature = "otel"))]
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "triggerflow=debug"
    } else {
        "triggerflow=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    #[cfg(feature = "otel")]
    if let Err(e) = init_otel_tracing(cli.verbose) {
        eprintln!("Failed to initialize tracing: {e}");
        return ExitCode::from(2);
    }

    #[cfg(not(feature = "otel"))]
    init_tracing(cli.verbose);

    let result = run(cli).await;

    #[cfg(feature = "otel")]
    opentelemetry::global::shutdown_tracer_provider();

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run {
            file,
            input,
            config,
            queued,
        } => run_workflow(file, input, config, queued).await,
        Commands::Validate { path } => validate(path),
        Commands::List { dir } => list_workflows(dir),
        Commands::SlackTest {
            text,
            url,
            config,
            timeout_ms,
            retries,
        } => slack_test(text, url, config, timeout_ms, retries).await,
    }
}

fn load_config(file: &Path, config: Option<PathBuf>) -> anyhow::Result<RunnerConfig> {
    let path = config.or_else(|| {
        let candidate = file.parent()?.join("runner.yaml");
        candidate.exists().then_some(candidate)
    });

    match path {
        Some(path) => {
            tracing::debug!(config = %path.display(), "Loading runner config");
            Ok(RunnerConfig::load(&path)?)
        }
        None => Ok(RunnerConfig::default()),
    }
}

/// Config secrets first, then the process environment
fn secrets(config: &RunnerConfig) -> SecretChain {
    SecretChain::new()
        .push(Arc::new(StaticSecrets::from(config.secrets.clone())))
        .push(Arc::new(EnvSecrets))
}

async fn run_workflow(
    file: PathBuf,
    input: Option<String>,
    config: Option<PathBuf>,
    queued: bool,
) -> anyhow::Result<bool> {
    if !file.exists() {
        anyhow::bail!("Workflow file not found: {}", file.display());
    }

    let config = load_config(&file, config)?;
    let workflow = WorkflowLoader::load_file(&file)?;

    let trigger_path = workflow.effective_trigger_path();
    let Some(token) = trigger_path.strip_prefix("/t/").map(str::to_string) else {
        anyhow::bail!("Trigger path must start with /t/: {trigger_path}");
    };

    let input: Value = match input {
        Some(raw) => serde_json::from_str(&raw)?,
        None => Value::Null,
    };

    let engine = Arc::new(
        Engine::new(Arc::new(ReqwestTransport::new()?), Arc::new(secrets(&config)))
            .with_settings(config.engine_settings()),
    );

    let workflows = Arc::new(MemoryWorkflowStore::new());
    workflows.insert(workflow).await;
    let runs = Arc::new(MemoryRunStore::new());
    let templates = Arc::new(MemoryOperationTemplateStore::new());

    let use_queue = queued && config.worker.enabled;
    if queued && !use_queue {
        tracing::warn!("Worker disabled in runner config, running inline");
    }

    let response = if use_queue {
        let queue = Arc::new(MemoryQueue::new());
        let waiter = RunWaiter::new();
        let orchestrator = Arc::new(
            RunOrchestrator::new(engine, workflows.clone(), runs.clone())
                .with_templates(templates)
                .with_waiter(waiter.clone()),
        );

        tracing::debug!(
            visibility_timeout_secs = config.worker.visibility_timeout_secs,
            "Visibility timeout applies to external queue providers only"
        );
        let worker = QueueWorker::new(queue.clone(), orchestrator.clone())
            .with_settings(config.worker_settings());
        worker.start().await;
        let shutdown = Arc::clone(&queue);

        let service = TriggerService::new(
            workflows,
            runs,
            orchestrator,
            Dispatch::Queued {
                queue,
                waiter,
                timeout: config.sync_timeout(),
            },
        );
        let response = service.trigger(&token, input).await;
        // Wake the long-poll so the worker sees the stop flag
        shutdown.close();
        worker.stop().await;
        response?
    } else {
        let orchestrator = Arc::new(
            RunOrchestrator::new(engine, workflows.clone(), runs.clone()).with_templates(templates),
        );
        let service = TriggerService::new(workflows, runs, orchestrator, Dispatch::Inline);
        service.trigger(&token, input).await?
    };

    print_response(&response)?;
    Ok(response.status != ExecutionStatus::Failed)
}

fn print_response(response: &TriggerResponse) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

fn validate(path: PathBuf) -> anyhow::Result<bool> {
    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }

    let workflows = if path.is_dir() {
        WorkflowLoader::load_directory(&path)?
    } else {
        vec![WorkflowLoader::load_file(&path)?]
    };

    if workflows.is_empty() {
        println!("No workflows found in: {}", path.display());
        return Ok(true);
    }

    let mut all_valid = true;
    for workflow in &workflows {
        match compile(&workflow.steps) {
            Ok(compiled) => println!(
                "✓ {} ({} operations)",
                workflow.id,
                compiled.operations.len()
            ),
            Err(e) => {
                all_valid = false;
                println!("✗ {}: {}", workflow.id, e);
            }
        }
    }

    Ok(all_valid)
}

fn list_workflows(dir: PathBuf) -> anyhow::Result<bool> {
    if !dir.exists() {
        anyhow::bail!("Directory not found: {}", dir.display());
    }

    let workflows = WorkflowLoader::load_directory(&dir)?;

    if workflows.is_empty() {
        println!("No workflows found in: {}", dir.display());
        return Ok(true);
    }

    println!("Workflows in {}:\n", dir.display());

    for w in &workflows {
        let disabled = if w.enabled { "" } else { " [disabled]" };
        println!(
            "  {} - {} ({}){}",
            w.id,
            w.name,
            w.effective_trigger_path(),
            disabled
        );
    }

    Ok(true)
}

async fn slack_test(
    text: String,
    url: String,
    config: Option<PathBuf>,
    timeout_ms: u64,
    retries: u32,
) -> anyhow::Result<bool> {
    let config = match config {
        Some(path) => RunnerConfig::load(&path)?,
        None => RunnerConfig::default(),
    };

    let mut message = SlackTestMessage::new(text).url(url);
    message.timeout = Duration::from_millis(timeout_ms);
    message.retries = retries;

    let transport = ReqwestTransport::new()?;
    let response = send_slack_test(&transport, &secrets(&config), &message).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response.result.ok)
}
