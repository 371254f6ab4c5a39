mod application;
mod config;
mod domain;
mod infrastructure;

pub use application::{agent, chat, search, stdio};
pub use domain::types;
pub use infrastructure::{model, server, store};

use agent::Agent;
use chat::{ChatRequest, ChatService};
use clap::{Parser, ValueEnum};
use config::AppConfig;
use model::OpenAiClient;
use search::SearchTool;
use serde_json::json;
use std::error::Error;
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use store::IssueStore;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "issuedesk",
    version,
    about = "Conversational issue-tracker assistant backed by an OpenAI-compatible model"
)]
struct Cli {
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    system: Option<String>,
    #[arg(long)]
    session: Option<String>,
    #[arg(long)]
    prompt_file: Option<String>,
    #[arg(long, value_enum, default_value_t = RunMode::Cli)]
    mode: RunMode,
    #[arg(long, default_value = "127.0.0.1:8080")]
    rest_addr: SocketAddr,
    prompt: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RunMode {
    Cli,
    Stdio,
    Rest,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    init_tracing();
    info!("Starting issuedesk");
    let cli = Cli::parse();
    debug!(?cli.mode, config = ?cli.config, system = ?cli.system, session = ?cli.session, "CLI arguments parsed");
    let config_path = cli.config.as_deref().map(Path::new);
    let file_config = AppConfig::load(config_path)?;
    if let Some(path) = config_path {
        info!(path = %path.display(), "Loaded configuration from file");
    } else {
        info!("Loaded configuration using default path or defaults");
    }

    let api_key = OpenAiClient::api_key_from_env()?;
    let endpoint = cli.endpoint.clone().unwrap_or(file_config.endpoint);
    let model = cli.model.clone().unwrap_or(file_config.model);
    debug!(endpoint = %endpoint, model = %model, "Creating model provider");
    let mut provider = OpenAiClient::new(endpoint, api_key, model);
    if let Some(system_prompt) = cli.system.clone().or(file_config.system_prompt) {
        provider = provider.with_system_prompt(system_prompt);
    }

    let issue_store = Arc::new(IssueStore::seeded());
    let tool = SearchTool::new(Arc::clone(&issue_store));
    let mut agent = Agent::new(Arc::new(provider), tool);
    if let Some(max_steps) = file_config.max_tool_steps {
        agent = agent.with_max_steps(max_steps);
    }
    let service = Arc::new(ChatService::new(agent));

    info!(mode = ?cli.mode, "Running assistant in selected mode");
    match cli.mode {
        RunMode::Cli => {
            let prompt = load_prompt(&cli)?;
            info!("Dispatching single prompt via CLI mode");
            let result = service
                .chat(ChatRequest {
                    prompt,
                    session_id: cli.session.clone(),
                })
                .await?;

            let output = json!({
                "session_id": result.session_id,
                "content": result.content,
                "tool_steps": result.steps,
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        RunMode::Stdio => {
            info!("Entering STDIO mode; awaiting JSON line input");
            stdio::run(service.clone()).await?;
        }
        RunMode::Rest => {
            info!(addr = %cli.rest_addr, "Starting REST server");
            server::serve(service.clone(), issue_store.clone(), cli.rest_addr).await?;
        }
    }
    info!("Assistant execution finished");
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn load_prompt(cli: &Cli) -> Result<String, Box<dyn Error>> {
    if let Some(path) = &cli.prompt_file {
        info!(path = %path, "Loading prompt from file");
        let content = fs::read_to_string(path)?;
        return Ok(normalize_prompt(content));
    }

    if !cli.prompt.is_empty() {
        info!("Using prompt provided through CLI arguments");
        let joined = cli.prompt.join(" ");
        return Ok(normalize_prompt(joined));
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
