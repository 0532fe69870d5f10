//! # wpcraft CLI
//!
//! Deploy and check a WordPress + MySQL stack on Docker Compose, driven by LLM agents.
//!
//! Usage:
//!   wpcraft install
//!   wpcraft update
//!   wpcraft validate
//!
//! Examples:
//!   wpcraft -c config.yaml install
//!   wpcraft --verbose validate

mod logging;
mod ui;

use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use wpcraft_agent::{AgentContext, Command, Config, Docker, Orchestrator};
use wpcraft_error::{ErrorKind, Result};
use wpcraft_llm::Provider;

#[derive(Parser)]
#[command(name = "wpcraft")]
#[command(author, version, about = "wpcraft - WordPress on Docker, managed by AI agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the YAML configuration file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Show every agent step and log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Write docker-compose.yml, start the stack and validate it
    Install,
    /// Pull newer images, recreate the containers and validate
    Update,
    /// Check the running stack and repair what is broken
    Validate,
}

impl From<Commands> for Command {
    fn from(cmd: Commands) -> Self {
        match cmd {
            Commands::Install => Command::Install,
            Commands::Update => Command::Update,
            Commands::Validate => Command::Validate,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match until_cancelled(run(cli), tokio::signal::ctrl_c()).await {
        Some(code) => code,
        None => {
            ui::warning("Operation cancelled by user.");
            ExitCode::from(130)
        }
    }
}

/// Drive `work` to completion unless `signal` fires first (`None`).
/// A signal that fails to install never cancels.
async fn until_cancelled<T, W, S>(work: W, signal: S) -> Option<T>
where
    W: Future<Output = T>,
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        out = work => Some(out),
        Ok(()) = signal => None,
    }
}

/// Everything printed after a successful command
fn success_report(command: Command, output: &str, url: &str) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        ui::success_line(format!("Command '{}' completed successfully!", command)),
        output,
        ui::access_box(url),
    )
}

/// Programs that must be on PATH: docker, plus the compose program when it differs
fn required_tools(compose_program: Option<&str>) -> Vec<String> {
    let mut tools = vec!["docker".to_string()];
    if let Some(program) = compose_program.filter(|p| *p != "docker") {
        tools.push(program.to_string());
    }
    tools
}

fn missing_tools(tools: &[String]) -> Vec<String> {
    tools
        .iter()
        .filter(|tool| which::which(tool.as_str()).is_err())
        .cloned()
        .collect()
}

fn check_requirements(compose_program: Option<&str>) -> bool {
    let missing = missing_tools(&required_tools(compose_program));
    if missing.is_empty() {
        return true;
    }
    ui::error(format!("Missing required tools: {}", missing.join(", ")));
    ui::info("Please install Docker and Docker Compose before running this application.");
    false
}

fn load_config(path: &Path, verbose: bool) -> Result<Config> {
    let mut config = Config::load(path)?;
    config.apply_verbose(verbose);
    Ok(config)
}

async fn run(cli: Cli) -> ExitCode {
    let command = Command::from(cli.command);

    ui::info("Validating system requirements...");
    if !check_requirements(None) {
        return ExitCode::FAILURE;
    }

    ui::info(format!("Loading configuration from {}...", cli.config.display()));
    let config = match load_config(&cli.config, cli.verbose) {
        Ok(config) => config,
        Err(e) if e.kind() == ErrorKind::FileNotFound => {
            ui::error(format!("Configuration file not found: {}", cli.config.display()));
            return ExitCode::FAILURE;
        }
        Err(e) => {
            ui::error(format!("Failed to load configuration: {}", e));
            return ExitCode::FAILURE;
        }
    };

    let docker = Docker::system(&config.docker.compose_command);
    if !check_requirements(Some(docker.compose_program())) {
        return ExitCode::FAILURE;
    }
    ui::success("System requirements met");
    ui::success("Configuration loaded");

    if let Err(e) = logging::init(&config.logging) {
        ui::error(format!("Failed to set up logging: {}", e));
        return ExitCode::FAILURE;
    }
    tracing::info!(command = %command, config = %cli.config.display(), "wpcraft starting");

    ui::info("Initializing AI language model...");
    let provider = match config
        .llm
        .provider_config(|name| std::env::var(name).ok())
        .and_then(|pc| Provider::new(pc).map_err(Into::into))
    {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize provider");
            ui::error(format!("Failed to initialize AI model: {}", e));
            ui::info("Please check your API key in the configuration or environment variables.");
            return ExitCode::FAILURE;
        }
    };
    ui::success(format!("AI model initialized ({} / {})", config.llm.provider, config.llm.model));

    ui::info("Creating orchestrator agent...");
    let url = config.wordpress_url();
    let ctx = AgentContext::new(Arc::new(provider), Arc::new(config), Arc::new(docker));
    let orchestrator = Orchestrator::new(ctx);
    ui::success("Orchestrator agent ready");

    ui::banner(format!("Executing: {}", command.as_str().to_uppercase()));
    let result = orchestrator.run(command).await;
    ui::banner("RESULTS");

    match result {
        Ok(run) => {
            tracing::info!(
                command = %command,
                iterations = run.iterations,
                total_tokens = run.usage.total_tokens(),
                "command completed"
            );
            println!("{}", success_report(command, &run.output, &url));
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(command = %command, error = %e, "command failed");
            ui::error(format!("Command '{}' failed!", command));
            ui::error(format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}
