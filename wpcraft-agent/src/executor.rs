//! Bounded tool-calling loop
//!
//! The model is called with the conversation so far and every tool the
//! toolkit offers. Tool calls are run in order and their text fed back as
//! tool results. The loop ends when the model answers without calling a tool,
//! or fails once `max_iterations` model calls have been spent.

use serde_json::Value;
use std::sync::Arc;
use wpcraft_error::{Error, ErrorKind, Result};
use wpcraft_llm::{ChatMessage, CompletionRequest, LlmProvider, ToolCall, ToolChoice, UsageTracker};

use crate::toolkit::Toolkit;

/// Per-agent loop settings
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub max_iterations: usize,
    pub verbose: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_iterations: 15,
            verbose: false,
        }
    }
}

/// One tool call and what it returned
#[derive(Debug, Clone)]
pub struct ToolStep {
    pub tool: String,
    pub arguments: Value,
    pub observation: String,
}

/// Outcome of a finished conversation
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// The model's final answer
    pub output: String,
    /// Model calls made
    pub iterations: usize,
    pub steps: Vec<ToolStep>,
    pub usage: UsageTracker,
}

pub struct AgentExecutor<P> {
    provider: Arc<P>,
    settings: ExecutorSettings,
}

impl<P: LlmProvider> AgentExecutor<P> {
    pub fn new(provider: Arc<P>, settings: ExecutorSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Drive the conversation for `input` until the model gives a final answer
    pub async fn invoke<T: Toolkit>(
        &self,
        agent: &str,
        system: &str,
        input: &str,
        toolkit: &T,
    ) -> Result<AgentRun> {
        let definitions = toolkit.definitions();
        let mut messages = vec![ChatMessage::system(system), ChatMessage::user(input)];
        let mut steps = Vec::new();
        let mut usage = UsageTracker::new();

        if self.settings.verbose {
            println!("\n> Entering {} ({} tools)", agent, definitions.len());
        }

        for iteration in 1..=self.settings.max_iterations {
            let mut request = CompletionRequest::new(messages.clone())
                .with_temperature(self.settings.temperature)
                .with_max_tokens(self.settings.max_tokens);
            if let Some(model) = &self.settings.model {
                request = request.with_model(model.clone());
            }
            if !definitions.is_empty() {
                request = request
                    .with_tools(definitions.clone())
                    .with_tool_choice(ToolChoice::Auto);
            }

            let response = self.provider.complete(request).await.map_err(|e| {
                Error::from(e)
                    .with_context("agent", agent)
                    .with_context("iteration", iteration.to_string())
            })?;
            usage.track(&response.model, &response.usage);

            tracing::debug!(
                agent,
                iteration,
                tool_calls = response.tool_calls.len(),
                finish_reason = ?response.finish_reason,
                "model responded"
            );

            if response.tool_calls.is_empty() {
                let output = response.content.unwrap_or_default();
                if self.settings.verbose {
                    println!("> Finished {} after {} iterations", agent, iteration);
                }
                tracing::info!(agent, iterations = iteration, tools_called = steps.len(), "agent finished");
                return Ok(AgentRun { output, iterations: iteration, steps, usage });
            }

            if self.settings.verbose {
                if let Some(thought) = response.content.as_deref().filter(|c| !c.trim().is_empty()) {
                    println!("{}", thought.trim());
                }
            }

            messages.push(ChatMessage::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let (arguments, observation) = self.run_tool(call, toolkit).await;

                if self.settings.verbose {
                    println!("> Invoking `{}` with {}", call.name, arguments);
                    println!("{}", observation);
                }

                messages.push(ChatMessage::tool_result(call.id.clone(), observation.clone()));
                steps.push(ToolStep { tool: call.name.clone(), arguments, observation });
            }
        }

        tracing::warn!(agent, max_iterations = self.settings.max_iterations, "iteration limit reached");
        Err(Error::iteration_limit(self.settings.max_iterations).with_context("agent", agent))
    }

    /// Run one call; every failure becomes an `ERROR:` observation
    async fn run_tool<T: Toolkit>(&self, call: &ToolCall, toolkit: &T) -> (Value, String) {
        let arguments = match call.arguments_value() {
            Ok(arguments) => arguments,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "malformed tool arguments");
                return (
                    Value::String(call.arguments.clone()),
                    format!("ERROR: Invalid arguments for {}: {}", call.name, e),
                );
            }
        };

        let observation = match toolkit.invoke(&call.name, &arguments).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::ToolNotFound => {
                tracing::warn!(tool = %call.name, "model requested an unknown tool");
                format!(
                    "ERROR: {} is not a valid tool, try one of [{}].",
                    call.name,
                    toolkit.tool_names().join(", ")
                )
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool failed");
                format!("ERROR: {}", e.message())
            }
        };

        (arguments, observation)
    }
}
