use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use logtrace_common::snapshot::{ElementSnapshot, Position};
use logtrace_engine::cli::{self, OutputHandlers, ReplOptions, Terminal};
use logtrace_engine::clock::{Clock, SystemClock};
use logtrace_engine::config::{ConfigLoader, LogTraceConfig, Settings};
use logtrace_engine::orchestrator::{
    DailyCreditLedger, DebugOrchestrator, RateLimiter, RetryPolicy,
};
use logtrace_engine::recorder::EventRecorder;
use logtrace_engine::storage::{FileStorage, StorageAdapter};
use logtrace_engine::upstream::HttpAiEndpoint;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "logtrace", version, about = "LogTrace event log and AI debugging CLI")]
struct Args {
    /// Config file (defaults to ./logtrace.yaml, then ~/.logtrace/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the persisted events, settings and credit usage
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List recorded events, newest first
    Events {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Write the event log to a JSON file
    Export {
        /// Output path (defaults to the generated file name)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Name the file after today's date instead of the current time
        #[arg(long)]
        dated: bool,
    },
    /// Clear the event log
    Clear,
    /// Ask the AI endpoint about an element
    Analyze {
        #[arg(long)]
        prompt: String,
        /// Element snapshot as JSON
        #[arg(long)]
        element: Option<String>,
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        #[arg(long, default_value_t = 0.0)]
        y: f64,
    },
    /// Show configuration, credits and log size
    Status,
    /// Interactive terminal
    Terminal,
}

struct App {
    config: LogTraceConfig,
    settings: Settings,
    clock: Rc<dyn Clock>,
    recorder: EventRecorder,
    ledger: Rc<DailyCreditLedger>,
    orchestrator: DebugOrchestrator,
    storage_dir: PathBuf,
}

async fn build_app(args: &Args) -> Result<App> {
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };

    let storage_dir = args
        .storage_dir
        .clone()
        .unwrap_or_else(|| config.storage.resolve_dir());
    let storage: Rc<dyn StorageAdapter> = Rc::new(FileStorage::new(&storage_dir));
    let clock: Rc<dyn Clock> = Rc::new(SystemClock);

    let settings = Settings::load(storage.as_ref()).await;
    let recorder = EventRecorder::from_settings(storage.clone(), clock.clone(), &settings);
    let restored = recorder.load().await;
    info!(restored, dir = %storage_dir.display(), "event log loaded");

    let endpoint = HttpAiEndpoint::new(&config.ai)?;
    let ledger =
        Rc::new(DailyCreditLedger::load(&config.credits, clock.clone(), storage.clone()).await);
    let orchestrator = DebugOrchestrator::new(
        Rc::new(endpoint),
        ledger.clone(),
        recorder.clone(),
        clock.clone(),
    )
    .with_rate_limiter(RateLimiter::from_config(&config.rate_limit))
    .with_retry_policy(RetryPolicy::from_config(&config.ai))
    .with_api_key(config.ai.api_key.is_some());

    Ok(App {
        config,
        settings,
        clock,
        recorder,
        ledger,
        orchestrator,
        storage_dir,
    })
}

async fn run(args: Args) -> Result<()> {
    let app = build_app(&args).await?;

    match args.command {
        Command::Events { limit } => {
            let terminal = terminal_for(&app)?;
            println!("{}", terminal.list_events(limit));
        }
        Command::Export { out, dated } => {
            let blob = if dated {
                app.recorder.export_dated()?
            } else {
                app.recorder.export()?
            };
            let path = out.unwrap_or_else(|| PathBuf::from(&blob.filename));
            tokio::fs::write(&path, &blob.contents)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Exported {} events to {}", app.recorder.len(), path.display());
        }
        Command::Clear => {
            app.recorder.clear().await;
            println!("Event log cleared.");
        }
        Command::Analyze {
            prompt,
            element,
            x,
            y,
        } => {
            let element = match element {
                Some(raw) => Some(
                    serde_json::from_str::<ElementSnapshot>(&raw)
                        .context("--element must be an element snapshot in JSON")?,
                ),
                None => None,
            };
            match app
                .orchestrator
                .analyze(&prompt, element.as_ref(), Position::new(x, y))
                .await
            {
                Ok(response) => println!("{}", response),
                Err(e) => {
                    let note = e.notification();
                    app.recorder.flush().await;
                    bail!("{}: {} [{}]", note.title, note.description, e.code());
                }
            }
        }
        Command::Status => {
            println!("AI endpoint:   {}", app.config.ai.endpoint);
            println!(
                "API key:       {}",
                if app.config.ai.api_key.is_some() { "configured" } else { "not set" }
            );
            println!(
                "Credits:       {}/{} today{}",
                app.ledger.remaining(),
                app.ledger.allowance(),
                if app.config.credits.premium { " (premium)" } else { "" }
            );
            println!("Storage:       {}", app.storage_dir.display());
            println!(
                "Events:        {} (max {})",
                app.recorder.len(),
                app.recorder.max_events()
            );
        }
        Command::Terminal => {
            let terminal = terminal_for(&app)?;
            let output = OutputHandlers {
                out: |msg| println!("{}", msg),
                err: |msg| eprintln!("{}", msg),
            };
            let options = ReplOptions {
                banner_lines: &["LogTrace terminal. Type 'help' for commands, 'exit' to leave."],
                prompt: "logtrace> ",
                exit_commands: &["exit", "quit"],
                handle_ctrl_c: true,
                ctrl_c_message: Some("Interrupted."),
            };
            if let Err(e) = cli::run_repl(&terminal, output, options).await {
                bail!("terminal session failed: {}", e);
            }
        }
    }

    app.recorder.flush_due().await;
    if app.recorder.pending_save_at().is_some() {
        app.recorder.flush().await;
    }
    Ok(())
}

fn terminal_for(app: &App) -> Result<Terminal> {
    let export_dir = std::env::current_dir().context("resolving the current directory")?;
    Ok(Terminal::new(
        app.recorder.clone(),
        app.orchestrator.clone(),
        app.clock.clone(),
        app.settings.clone(),
        export_dir,
    ))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so command output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Args::parse()).await
}
