//! Agent = system prompt + toolkit + executor

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use wpcraft_error::Result;
use wpcraft_llm::LlmProvider;

use crate::config::Config;
use crate::docker::Docker;
use crate::executor::{AgentExecutor, AgentRun, ExecutorSettings};
use crate::toolkit::Toolkit;

/// Timeout for the HTTP checks the tools perform
pub const HTTP_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the agents share for one run
pub struct AgentContext<P> {
    pub provider: Arc<P>,
    pub config: Arc<Config>,
    pub docker: Arc<Docker>,
    pub http: reqwest::Client,
}

impl<P> AgentContext<P> {
    pub fn new(provider: Arc<P>, config: Arc<Config>, docker: Arc<Docker>) -> Self {
        Self { provider, config, docker, http: reqwest::Client::new() }
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        self.config.executor_settings()
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.config.agents.health_timeout_secs)
    }
}

// Arc fields only; P itself need not be Clone.
impl<P> Clone for AgentContext<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            config: Arc::clone(&self.config),
            docker: Arc::clone(&self.docker),
            http: self.http.clone(),
        }
    }
}

/// Summary of an agent's setup
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub tool_count: usize,
    pub tool_names: Vec<String>,
    pub max_iterations: usize,
    pub verbose: bool,
}

pub struct Agent<P, T> {
    name: String,
    system_prompt: String,
    toolkit: T,
    executor: AgentExecutor<P>,
}

impl<P: LlmProvider, T: Toolkit> Agent<P, T> {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        provider: Arc<P>,
        settings: ExecutorSettings,
        toolkit: T,
    ) -> Self {
        let agent = Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            toolkit,
            executor: AgentExecutor::new(provider, settings),
        };
        tracing::info!(agent = %agent.name, tools = agent.tool_count(), "initialized agent");
        agent
    }

    pub async fn invoke(&self, input: &str) -> Result<AgentRun> {
        self.executor.invoke(&self.name, &self.system_prompt, input, &self.toolkit).await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.toolkit.tool_names()
    }

    pub fn tool_count(&self) -> usize {
        self.toolkit.definitions().len()
    }

    pub fn info(&self) -> AgentInfo {
        let settings = self.executor.settings();
        AgentInfo {
            name: self.name.clone(),
            tool_count: self.tool_count(),
            tool_names: self.tool_names(),
            max_iterations: settings.max_iterations,
            verbose: settings.verbose,
        }
    }
}

impl<P: LlmProvider, T: Toolkit> fmt::Display for Agent<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} tools)", self.name, self.tool_count())
    }
}
