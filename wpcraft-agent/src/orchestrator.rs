//! Orchestrator agent: compose lifecycle and delegation to the sub-agents

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use tokio::sync::OnceCell;
use wpcraft_error::{Error, ErrorKind, Result};
use wpcraft_llm::{LlmProvider, ToolDefinition, UsageTracker};

use crate::agent::{Agent, AgentContext};
use crate::compose::write_compose_file;
use crate::docker::{CommandOutput, COMPOSE_UP_TIMEOUT};
use crate::executor::AgentRun;
use crate::mysql::MySqlAgent;
use crate::prompts;
use crate::toolkit::Toolkit;
use crate::webserver::WebServerAgent;

/// What the user asked the orchestrator to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Install,
    Update,
    Validate,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Install => "install",
            Command::Update => "update",
            Command::Validate => "validate",
        }
    }

    pub fn task(&self) -> &'static str {
        match self {
            Command::Install => prompts::INSTALL_TASK,
            Command::Update => prompts::UPDATE_TASK,
            Command::Validate => prompts::VALIDATE_TASK,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "install" => Ok(Command::Install),
            "update" => Ok(Command::Update),
            "validate" => Ok(Command::Validate),
            other => Err(Error::new(ErrorKind::InvalidArgument, format!("unknown command '{}'", other))),
        }
    }
}

pub struct OrchestratorTools<P> {
    ctx: AgentContext<P>,
    mysql: OnceCell<MySqlAgent<P>>,
    webserver: OnceCell<WebServerAgent<P>>,
    sub_usage: Mutex<UsageTracker>,
}

impl<P: LlmProvider> OrchestratorTools<P> {
    pub fn new(ctx: AgentContext<P>) -> Self {
        Self {
            ctx,
            mysql: OnceCell::new(),
            webserver: OnceCell::new(),
            sub_usage: Mutex::new(UsageTracker::new()),
        }
    }

    /// Token usage of the sub-agents so far
    pub fn sub_agent_usage(&self) -> UsageTracker {
        self.sub_usage.lock().map(|u| u.clone()).unwrap_or_default()
    }

    fn record_usage(&self, usage: &UsageTracker) {
        if let Ok(mut total) = self.sub_usage.lock() {
            total.merge(usage);
        }
    }

    fn compose_file(&self) -> &std::path::Path {
        &self.ctx.config.docker.compose_file
    }

    fn project(&self) -> &str {
        &self.ctx.config.docker.project_name
    }

    fn compose_file_exists(&self) -> String {
        let file = self.compose_file();
        if file.exists() {
            format!("SUCCESS: {} exists.", file.display())
        } else {
            format!("NOT FOUND: {} does not exist. Need to create it.", file.display())
        }
    }

    fn create_compose_file(&self) -> String {
        let file = self.compose_file();
        match write_compose_file(&self.ctx.config, file) {
            Ok(()) => format!("SUCCESS: Created {}", file.display()),
            Err(e) => format!("FAILED: Could not create docker-compose file: {}", e.message()),
        }
    }

    async fn docker_running(&self) -> String {
        match self.ctx.docker.server_version().await {
            Ok(version) => format!("SUCCESS: Docker is running. Version: {}", version),
            Err(e) => format!("FAILED: Docker is not running or not accessible: {}", e.message()),
        }
    }

    async fn existing_containers(&self) -> String {
        match self.ctx.docker.list_containers("wordpress").await {
            Ok(containers) if containers.is_empty() => "NOT FOUND: No existing WordPress containers.".into(),
            Ok(containers) => {
                let lines: Vec<String> = containers
                    .iter()
                    .map(|c| format!("- {}: {}", c.name, c.state))
                    .collect();
                format!("FOUND: Existing WordPress containers:\n{}", lines.join("\n"))
            }
            Err(e) => format!("ERROR: Could not check containers: {}", e.message()),
        }
    }

    fn up_report(result: Result<CommandOutput>, success: &str, failure: &str) -> String {
        match result {
            Ok(output) if output.success() => format!("{}\nOutput: {}", success, output.combined()),
            Ok(output) => format!(
                "{}\nError: {}\nOutput: {}",
                failure,
                output.stderr.trim(),
                output.stdout.trim()
            ),
            Err(e) if e.kind() == ErrorKind::CommandTimeout => format!(
                "FAILED: Docker Compose command timed out after {} seconds.",
                COMPOSE_UP_TIMEOUT.as_secs()
            ),
            Err(e) => format!("FAILED: Could not run docker compose: {}", e.message()),
        }
    }

    async fn compose_up(&self) -> String {
        let result = self.ctx.docker.compose_up(self.compose_file(), self.project()).await;
        Self::up_report(result, "SUCCESS: Docker Compose started.", "FAILED: Docker Compose failed.")
    }

    async fn compose_down(&self) -> String {
        match self.ctx.docker.compose_down(self.compose_file(), self.project()).await {
            Ok(output) if output.success() => {
                format!("SUCCESS: Docker Compose stopped.\nOutput: {}", output.combined())
            }
            Ok(output) => format!("WARNING: Docker Compose down had issues.\nError: {}", output.combined()),
            Err(e) => format!("ERROR: Could not stop docker compose: {}", e.message()),
        }
    }

    async fn compose_restart(&self) -> String {
        if let Err(e) = self.ctx.docker.compose_down(self.compose_file(), self.project()).await {
            tracing::warn!(error = %e, "docker compose down failed during restart");
        }
        let result = self.ctx.docker.compose_up(self.compose_file(), self.project()).await;
        Self::up_report(result, "SUCCESS: Docker Compose restarted.", "FAILED: Docker Compose restart failed.")
    }

    async fn validate_mysql(&self) -> String {
        let agent = self.mysql.get_or_init(|| async {
            tracing::info!("creating MySQL agent for validation");
            MySqlAgent::new(&self.ctx)
        }).await;

        match agent.validate_and_fix().await {
            Ok(run) => {
                self.record_usage(&run.usage);
                format!("SUCCESS: MySQL validation completed.\n{}", run.output)
            }
            Err(e) => format!("FAILED: MySQL validation failed.\n{}", e.message()),
        }
    }

    async fn validate_webserver(&self) -> String {
        let agent = self.webserver.get_or_init(|| async {
            tracing::info!("creating web server agent for validation");
            WebServerAgent::new(&self.ctx)
        }).await;

        match agent.validate_and_fix().await {
            Ok(run) => {
                self.record_usage(&run.usage);
                format!("SUCCESS: Web Server validation completed.\n{}", run.output)
            }
            Err(e) => format!("FAILED: Web Server validation failed.\n{}", e.message()),
        }
    }

    fn wordpress_url(&self) -> String {
        format!("WordPress should be accessible at: {}", self.ctx.config.wordpress_url())
    }

    fn installation_summary(&self) -> String {
        let config = &self.ctx.config;
        let wp = &config.wordpress;
        let mysql = &config.mysql;
        format!(
            "WordPress Installation Summary:
================================
WordPress URL: {url}
WordPress Version: {wp_version}

Database Configuration:
- Database Name: {db_name}
- Database User: {db_user}
- MySQL Version: {mysql_version}

Admin Credentials (for WordPress setup):
- Username: {admin_user}
- Email: {admin_email}
- Password: {admin_password}

Docker Configuration:
- Project Name: {project}
- Compose File: {compose_file}",
            url = config.wordpress_url(),
            wp_version = wp.version,
            db_name = mysql.database.name,
            db_user = mysql.database.user,
            mysql_version = mysql.version,
            admin_user = wp.admin.user,
            admin_email = wp.admin.email,
            admin_password = wp.admin.password,
            project = config.docker.project_name,
            compose_file = config.docker.compose_file.display(),
        )
    }
}

impl<P: LlmProvider> Toolkit for OrchestratorTools<P> {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new("check_docker_compose_file_exists", "Check if the docker-compose file exists."),
            ToolDefinition::new("create_compose_file", "Create the docker-compose file from the configuration."),
            ToolDefinition::new("check_docker_running", "Check if the Docker daemon is running."),
            ToolDefinition::new("check_existing_containers", "List existing WordPress containers and their state."),
            ToolDefinition::new("docker_compose_up", "Start the WordPress stack with docker compose."),
            ToolDefinition::new("docker_compose_down", "Stop the WordPress stack with docker compose."),
            ToolDefinition::new("docker_compose_restart", "Stop and start the WordPress stack again."),
            ToolDefinition::new("validate_mysql_setup", "Run the MySQL agent to validate and repair the database setup."),
            ToolDefinition::new("validate_webserver_setup", "Run the web server agent to validate and repair Apache/PHP."),
            ToolDefinition::new("get_wordpress_url", "Get the URL where WordPress is accessible."),
            ToolDefinition::new("get_installation_summary", "Get a summary of the installation configuration."),
        ]
    }

    async fn invoke(&self, name: &str, _arguments: &Value) -> Result<String> {
        tracing::debug!(tool = name, "orchestrator tool");
        let text = match name {
            "check_docker_compose_file_exists" => self.compose_file_exists(),
            "create_compose_file" => self.create_compose_file(),
            "check_docker_running" => self.docker_running().await,
            "check_existing_containers" => self.existing_containers().await,
            "docker_compose_up" => self.compose_up().await,
            "docker_compose_down" => self.compose_down().await,
            "docker_compose_restart" => self.compose_restart().await,
            "validate_mysql_setup" => self.validate_mysql().await,
            "validate_webserver_setup" => self.validate_webserver().await,
            "get_wordpress_url" => self.wordpress_url(),
            "get_installation_summary" => self.installation_summary(),
            other => return Err(Error::tool_not_found(other)),
        };
        Ok(text)
    }
}

pub struct Orchestrator<P> {
    agent: Agent<P, OrchestratorTools<P>>,
}

impl<P: LlmProvider> Orchestrator<P> {
    pub fn new(ctx: AgentContext<P>) -> Self {
        let provider = std::sync::Arc::clone(&ctx.provider);
        let settings = ctx.executor_settings();
        Self {
            agent: Agent::new(
                "OrchestratorAgent",
                prompts::ORCHESTRATOR_SYSTEM,
                provider,
                settings,
                OrchestratorTools::new(ctx),
            ),
        }
    }

    pub fn agent(&self) -> &Agent<P, OrchestratorTools<P>> {
        &self.agent
    }

    /// Run `command` to completion; usage includes the sub-agents
    pub async fn run(&self, command: Command) -> Result<AgentRun> {
        tracing::info!(%command, "orchestrator: starting operation");

        match self.agent.invoke(command.task()).await {
            Ok(mut run) => {
                run.usage.merge(&self.agent.toolkit().sub_agent_usage());
                tracing::info!(
                    %command,
                    iterations = run.iterations,
                    total_tokens = run.usage.total_tokens(),
                    "orchestrator completed successfully"
                );
                Ok(run)
            }
            Err(e) => {
                tracing::error!(%command, error = %e, "orchestrator failed");
                Err(e.with_context("command", command.as_str()))
            }
        }
    }
}
