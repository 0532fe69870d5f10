//! Scripted stand-ins for Docker and the LLM

use crate::config::{tests::sample_config, Config};
use crate::docker::{CommandOutput, CommandRunner, Docker};
use crate::AgentContext;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wpcraft_error::{Error, Result};
use wpcraft_llm::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, ProviderError, ToolCall, Usage,
};

type Handler = Box<dyn Fn(&str, &[String]) -> Result<CommandOutput> + Send + Sync>;

/// Answers subprocess calls from a closure and records every argv
pub struct ScriptedRunner {
    handler: Handler,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&str, &[String]) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        Arc::new(Self { handler: Box::new(handler), calls: Mutex::new(Vec::new()) })
    }

    /// Answer calls in order, failing once the script runs out
    pub fn sequence(responses: Vec<Result<CommandOutput>>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_, _| {
            queue.lock().unwrap().pop_front()
                .unwrap_or_else(|| Err(Error::unexpected("no scripted command output left")))
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls joined with spaces, handy for `contains` checks
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.join(" ")).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String], _timeout: Duration) -> Result<CommandOutput> {
        let mut argv = vec![program.to_string()];
        argv.extend(args.iter().cloned());
        self.calls.lock().unwrap().push(argv);
        (self.handler)(program, args)
    }
}

pub fn output(code: i32, stdout: &str, stderr: &str) -> Result<CommandOutput> {
    Ok(CommandOutput { code, stdout: stdout.into(), stderr: stderr.into() })
}

/// Replays canned completions and records the requests it was sent
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<CompletionResponse>) -> Arc<Self> {
        Arc::new(Self { responses: Mutex::new(responses.into()), requests: Mutex::new(Vec::new()) })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn models(&self) -> Vec<String> {
        vec!["scripted-model".into()]
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: CompletionRequest) -> std::result::Result<CompletionResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses.lock().unwrap().pop_front()
            .ok_or_else(|| ProviderError::Other("no scripted completion left".into()))
    }
}

pub fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        id: "resp".into(),
        model: "scripted-model".into(),
        content: Some(text.into()),
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
        usage: Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 },
    }
}

pub fn tool_response(calls: &[(&str, &str, serde_json::Value)]) -> CompletionResponse {
    CompletionResponse {
        id: "resp".into(),
        model: "scripted-model".into(),
        content: None,
        tool_calls: calls.iter().map(|(id, name, args)| ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: args.to_string(),
        }).collect(),
        finish_reason: FinishReason::ToolCalls,
        usage: Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 },
    }
}

pub fn test_config() -> Config {
    sample_config()
}

/// Context wired to scripted Docker and LLM, with no delays
pub fn context(
    provider: Arc<ScriptedProvider>,
    runner: Arc<ScriptedRunner>,
    config: Config,
) -> AgentContext<ScriptedProvider> {
    let docker = Docker::new(runner, &config.docker.compose_command)
        .with_timing(Duration::ZERO, Duration::ZERO);
    AgentContext::new(provider, Arc::new(config), Arc::new(docker))
}
