mod api;
mod config;

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tokio::sync::mpsc;

use dharmaloops_agent::{create_service, ChatMessage, ReasoningService, ServiceKind};
use dharmaloops_core::{LoopRunner, SessionOutcome, SessionTermination, StreamEvent};
use dharmaloops_logging::{init_tracing, LogFormat, Logger};

use config::{resolve, CliOverrides, FileConfig, ResolvedConfig, RoleSelection};

#[derive(Parser, Debug)]
#[command(
    name = "dharmaloops",
    about = "Self-scored iterative reasoning with feedback between steps",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Session event output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Diagnostic log level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Also write logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reason about a single question
    Run(RunArgs),

    /// Serve the streaming chat API
    Serve {
        /// Port for the API server
        #[arg(short, long, default_value_t = 3100)]
        port: u16,

        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Question to reason about (or --question-file, or stdin)
    #[arg(short, long)]
    question: Option<String>,

    /// Read the question from a file
    #[arg(long, conflicts_with = "question")]
    question_file: Option<PathBuf>,

    /// Output the final outcome as JSON
    #[arg(long)]
    json_output: bool,

    /// Dry run: show resolved settings without calling any service
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Aggregate score that ends the session (0, 1]
    #[arg(short, long)]
    target: Option<f64>,

    /// Maximum number of reasoning steps
    #[arg(short = 'n', long)]
    max_steps: Option<usize>,

    /// Service for both reasoner and feedback
    #[arg(short, long, value_enum)]
    service: Option<ServiceChoice>,

    /// Service specifically for step generation and synthesis
    #[arg(long, value_enum)]
    reasoner_service: Option<ServiceChoice>,

    /// Service specifically for feedback
    #[arg(long, value_enum)]
    feedback_service: Option<ServiceChoice>,

    /// Model to use (if the service supports it)
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL for OpenAI-compatible endpoints
    #[arg(long)]
    base_url: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Directory to read dharmaloops.toml from (default: current directory)
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ServiceChoice {
    Openai,
    Claude,
}

impl From<ServiceChoice> for ServiceKind {
    fn from(choice: ServiceChoice) -> Self {
        match choice {
            ServiceChoice::Openai => ServiceKind::OpenAi,
            ServiceChoice::Claude => ServiceKind::ClaudeCli,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
    Silent,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
            LogFormatChoice::Silent => LogFormat::Silent,
        }
    }
}

impl SessionArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            target: self.target,
            max_steps: self.max_steps,
            service: self.service.map(Into::into),
            reasoner_service: self.reasoner_service.map(Into::into),
            feedback_service: self.feedback_service.map(Into::into),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout_secs,
        }
    }

    fn resolve(&self) -> Result<ResolvedConfig> {
        let working_dir = match self.working_dir.clone() {
            Some(dir) => dir,
            None => std::env::current_dir().context("Failed to get current directory")?,
        };
        let file = FileConfig::load_layered(&working_dir)?;
        resolve(&self.overrides(), &file)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    let _guard = init_tracing(&cli.log_level, log_format, cli.log_dir.as_deref());

    let logger = match cli.log_dir {
        Some(ref dir) => Logger::with_file(log_format, &dir.join("sessions.jsonl"))
            .context("Failed to open session log file")?,
        None => Logger::new(log_format),
    };
    let logger = Arc::new(logger);

    match cli.command {
        Commands::Run(args) => handle_run_command(args, logger).await,
        Commands::Serve { port, session } => handle_serve_command(port, session, logger).await,
    }
}

async fn handle_run_command(args: RunArgs, logger: Arc<Logger>) -> Result<()> {
    let resolved = args.session.resolve()?;
    let question = read_question(&args)?;

    if args.dry_run {
        print_dry_run(&question, &resolved);
        return Ok(());
    }

    let (reasoner, feedback) = build_services(&resolved).await?;
    let runner = LoopRunner::new(reasoner, feedback, resolved.settings, logger)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let show_steps = !args.json_output;
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if show_steps {
                print_event(&event);
            }
        }
    });

    let outcome = runner.run(vec![ChatMessage::user(question)], tx).await;
    printer.await.context("Event printer task failed")?;

    if args.json_output {
        let json = serde_json::to_string_pretty(&outcome)?;
        println!("{}", json);
    } else {
        print_outcome(&outcome);
    }

    std::process::exit(outcome.exit_code());
}

async fn handle_serve_command(port: u16, session: SessionArgs, logger: Arc<Logger>) -> Result<()> {
    let resolved = session.resolve()?;
    let (reasoner, feedback) = build_services(&resolved).await?;

    let state = api::AppState {
        reasoner,
        feedback,
        settings: resolved.settings,
        logger,
    };
    let router = api::create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;

    eprintln!();
    eprintln!(
        "  {} {}",
        "->".bright_green(),
        format!("Listening on http://localhost:{}", port).bold()
    );
    eprintln!("  {} Press {} to stop", "->".dimmed(), "Ctrl+C".bold());
    eprintln!();

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    eprintln!("\nShutting down...");
}

async fn build_services(
    resolved: &ResolvedConfig,
) -> Result<(Arc<dyn ReasoningService>, Arc<dyn ReasoningService>)> {
    let reasoner = build_service(&resolved.reasoner, "Reasoner").await?;
    let feedback = build_service(&resolved.feedback, "Feedback").await?;
    Ok((reasoner, feedback))
}

async fn build_service(selection: &RoleSelection, role: &str) -> Result<Arc<dyn ReasoningService>> {
    let service = create_service(selection.kind, &selection.config)
        .with_context(|| format!("Failed to create {} service '{}'", role, selection.kind))?;

    if !service.is_available().await {
        anyhow::bail!(
            "{} service '{}' is not available. Check its installation or credentials.",
            role,
            service.name()
        );
    }
    Ok(service)
}

fn read_question(args: &RunArgs) -> Result<String> {
    let question = if let Some(ref question) = args.question {
        question.clone()
    } else if let Some(ref path) = args.question_file {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read question file {}", path.display()))?
    } else if !std::io::stdin().is_terminal() {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read question from stdin")?;
        buffer
    } else {
        anyhow::bail!("No question provided. Use --question, --question-file, or pipe it on stdin");
    };

    let question = question.trim().to_string();
    if question.is_empty() {
        anyhow::bail!("The question is empty");
    }
    Ok(question)
}

fn print_dry_run(question: &str, resolved: &ResolvedConfig) {
    let preview: String = question.chars().take(100).collect();
    println!("=== Dry Run ===");
    println!(
        "Question: {}{}",
        preview,
        if question.chars().count() > 100 { "..." } else { "" }
    );
    println!("Target: {:.2}", resolved.settings.target);
    println!("Max steps: {}", resolved.settings.max_steps);
    println!(
        "Reasoner: {} ({})",
        resolved.reasoner.kind,
        resolved.reasoner.config.model.as_deref().unwrap_or("default model")
    );
    println!(
        "Feedback: {} ({})",
        resolved.feedback.kind,
        resolved.feedback.config.model.as_deref().unwrap_or("default model")
    );
}

fn print_event(event: &StreamEvent) {
    match event {
        StreamEvent::ReasoningStep { step } => {
            let s = &step.step;
            println!();
            println!(
                "{} {}",
                format!("[Step {}/{}]", s.step_index, s.max_steps).bold(),
                s.title.cyan()
            );
            if s.degraded {
                println!("{}", "(unstructured output, neutral scores)".yellow());
            }
            println!("{}", s.content);
            println!(
                "{} {:.2}  {}",
                "Aggregate:".dimmed(),
                step.aggregate,
                s.scores.short_description().dimmed()
            );
            if let Some(ref feedback) = s.feedback {
                println!("{} {}", "Feedback:".dimmed(), feedback.italic());
            }
        }
        StreamEvent::Text { content } => {
            println!();
            println!("{}", "=== Answer ===".bold());
            println!("{}", content);
        }
    }
}

fn print_outcome(outcome: &SessionOutcome) {
    eprintln!();
    match &outcome.termination {
        SessionTermination::TargetReached { steps } => {
            eprintln!("=== TARGET REACHED ===");
            eprintln!("Steps: {}", steps);
        }
        SessionTermination::MaxStepsReached { steps } => {
            eprintln!("=== STEP LIMIT ===");
            eprintln!("Reached maximum steps ({})", steps);
        }
        SessionTermination::Aborted { step_index, error } => {
            eprintln!("=== ABORTED ===");
            eprintln!("Step {} failed: {}", step_index, error);
            eprintln!("Steps kept: {}", outcome.step_count());
        }
    }
    if !outcome.synthesized {
        eprintln!("The final answer could not be synthesized.");
    }
    eprintln!("Duration: {:.1}s", outcome.total_duration_secs);
}
