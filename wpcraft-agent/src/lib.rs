//! # wpcraft Agent
//!
//! Agents that stand up and validate a WordPress + MySQL stack on Docker Compose:
//! 1. The orchestrator writes docker-compose.yml, checks Docker and runs compose
//! 2. It delegates database checks to the MySQL agent
//! 3. It delegates Apache/PHP/HTTP checks to the web server agent
//! 4. Each agent loops: the model picks a tool, the tool answers with text,
//!    until the model replies with a summary
//!
//! The model decides, the tools act.

pub mod agent;
pub mod compose;
pub mod config;
pub mod docker;
pub mod executor;
pub mod mysql;
pub mod orchestrator;
pub mod prompts;
pub mod toolkit;
pub mod webserver;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentContext, AgentInfo};
pub use compose::{write_compose_file, ComposeFile};
pub use config::{Config, LogFormat};
pub use docker::{CommandOutput, CommandRunner, Docker, SystemRunner};
pub use executor::{AgentExecutor, AgentRun, ExecutorSettings, ToolStep};
pub use mysql::{MySqlAgent, MySqlTools};
pub use orchestrator::{Command, Orchestrator, OrchestratorTools};
pub use toolkit::Toolkit;
pub use webserver::{WebServerAgent, WebServerTools};
