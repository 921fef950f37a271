use std::error::Error;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use orrery_core::application::turn::{RoleMarkerCleanup, TurnEngine, TurnOutcome};
use orrery_core::config::{AppConfig, BackendKind, ToolServerConfig};
use orrery_core::infrastructure::generation::{
    GenerationService, OllamaClient, OpenAiClient, ProgressSink, TextGenerator,
};
use orrery_core::infrastructure::tooling::{
    DisabledToolServer, HttpToolServer, StdioServerConfig, StdioToolServer, ToolTransport,
};
use tracing::{debug, info, warn, Instrument};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "orrery",
    version,
    about = "Chat client that lets a local model answer or call tools"
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = RunMode::Once)]
    mode: RunMode,
    /// Configuration file (defaults to config/orrery.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured model name.
    #[arg(long)]
    model: Option<String>,
    /// Override the generation backend endpoint.
    #[arg(long)]
    endpoint: Option<String>,
    /// Override the HTTP tool server endpoint.
    #[arg(long)]
    tools_endpoint: Option<String>,
    #[arg(long)]
    prompt_file: Option<PathBuf>,
    /// Print the full turn outcome as JSON (once mode only).
    #[arg(long)]
    json: bool,
    prompt: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RunMode {
    Once,
    Chat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();
    debug!(?cli.mode, config = ?cli.config, "CLI arguments parsed");

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(model) = cli.model.clone() {
        config.generation.model = model;
    }
    if let Some(endpoint) = cli.endpoint.clone() {
        config.generation.endpoint = endpoint;
    }
    if let Some(endpoint) = cli.tools_endpoint.clone() {
        config.tools = ToolServerConfig::Http { endpoint };
    }

    let generation = Arc::new(GenerationService::new(build_backend(&config)));
    let transport = build_transport(&config);
    let engine = TurnEngine::with_cleanup(
        generation.clone(),
        transport,
        Arc::new(RoleMarkerCleanup::new(config.cleanup_marker.clone())),
    );

    match cli.mode {
        RunMode::Once => run_once(&cli, &engine).await,
        RunMode::Chat => run_chat(&engine, &generation).await,
    }
}

fn build_backend(config: &AppConfig) -> Arc<dyn TextGenerator> {
    let generation = &config.generation;
    match generation.backend {
        BackendKind::Ollama => Arc::new(OllamaClient::new(
            generation.endpoint.clone(),
            generation.model.clone(),
        )),
        BackendKind::OpenAi => Arc::new(OpenAiClient::new(
            generation.endpoint.clone(),
            generation.model.clone(),
            generation.api_key.clone(),
        )),
    }
}

fn build_transport(config: &AppConfig) -> Arc<dyn ToolTransport> {
    match &config.tools {
        ToolServerConfig::Disabled => {
            warn!("No tool server configured; tool calls will be refused");
            Arc::new(DisabledToolServer)
        }
        ToolServerConfig::Http { endpoint } => Arc::new(HttpToolServer::new(endpoint.clone())),
        ToolServerConfig::Stdio {
            command,
            args,
            workdir,
            env,
        } => {
            let mut server = StdioServerConfig::new(command.clone());
            server.args = args.clone();
            server.workdir = workdir.clone();
            server.env = env.clone();
            Arc::new(StdioToolServer::new(server))
        }
    }
}

async fn run_once(cli: &Cli, engine: &TurnEngine) -> Result<(), Box<dyn Error>> {
    let prompt = load_prompt(cli)?;
    info!("Dispatching single prompt");
    let outcome = engine
        .process_turn(&prompt, Some(progress_renderer()))
        .await?;
    clear_progress_line();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.response_text);
        println!();
        println!("{}", timing_summary(&outcome));
    }
    Ok(())
}

async fn run_chat(
    engine: &TurnEngine,
    generation: &Arc<GenerationService>,
) -> Result<(), Box<dyn Error>> {
    match generation.initialize().await {
        Ok(()) => println!("Backend '{}' is ready.", generation.backend_id()),
        Err(error) => {
            println!("{}", error.user_message());
            return Err(error.into());
        }
    }
    let tools = engine.discover_tools().await;
    println!("Discovered {} tool(s). Type 'exit' to quit.", tools.len());

    let stdin = io::stdin();
    loop {
        print!("You: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "exit" || message == "quit" {
            break;
        }

        // One turn at a time; the next prompt is not read until this one
        // finishes.
        let turn_id = Uuid::new_v4();
        let turn = engine
            .process_turn(message, Some(progress_renderer()))
            .instrument(tracing::info_span!("turn", id = %turn_id));
        match turn.await {
            Ok(outcome) => {
                clear_progress_line();
                println!("{}", outcome.response_text);
                println!("[{}]", timing_summary(&outcome));
            }
            Err(error) => {
                clear_progress_line();
                warn!(id = %turn_id, %error, "Turn failed");
                println!("{}", error.user_message());
            }
        }
        println!();
    }

    info!("Chat session ended");
    Ok(())
}

fn timing_summary(outcome: &TurnOutcome) -> String {
    match &outcome.tool_call_seconds {
        Some(tool_seconds) => format!(
            "Tool selection: {}s | Tool exec: {}s | Total: {}s",
            outcome.model_select_seconds, tool_seconds, outcome.total_seconds
        ),
        None => format!("Total time: {}s", outcome.total_seconds),
    }
}

fn progress_renderer() -> ProgressSink {
    Arc::new(|progress| {
        let mut stderr = io::stderr();
        let line = match progress.tokens_per_second {
            Some(rate) => format!(
                "\rGenerating... {} tokens ({rate:.1} tok/s)",
                progress.tokens
            ),
            None => format!("\rGenerating... {} tokens", progress.tokens),
        };
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    })
}

fn clear_progress_line() {
    let mut stderr = io::stderr();
    let _ = stderr.write_all(b"\r\x1b[2K");
    let _ = stderr.flush();
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .with_writer(io::stderr)
            .init();
    });
}

fn load_prompt(cli: &Cli) -> Result<String, Box<dyn Error>> {
    if let Some(path) = &cli.prompt_file {
        info!(path = %path.display(), "Loading prompt from file");
        let content = fs::read_to_string(Path::new(path))?;
        return Ok(normalize_prompt(content));
    }

    if !cli.prompt.is_empty() {
        info!("Using prompt provided through CLI arguments");
        return Ok(normalize_prompt(cli.prompt.join(" ")));
    }

    if !io::stdin().is_terminal() {
        info!("Reading prompt from standard input");
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(normalize_prompt(buffer));
    }

    warn!("Prompt not provided via arguments, file, or stdin");
    Err("prompt required via arguments, file, or stdin".into())
}

fn normalize_prompt(prompt: String) -> String {
    prompt.trim().to_string()
}
