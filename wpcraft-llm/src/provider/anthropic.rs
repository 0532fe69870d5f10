//! Anthropic Claude provider implementation

use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = http_client(&config)?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or("https://api.anthropic.com/v1")
    }
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn models(&self) -> Vec<String> {
        vec![
            "claude-sonnet-4-20250514".into(),
            "claude-opus-4-20250514".into(),
            "claude-3-7-sonnet-20250219".into(),
            "claude-3-5-sonnet-20241022".into(),
            "claude-3-5-haiku-20241022".into(),
        ]
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("claude-sonnet-4-20250514")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(self.default_model());
        let (system, messages) = convert_messages(&request.messages);
        let tools: Option<Vec<AnthropicTool>> = request.tools.as_ref()
            .filter(|tools| !tools.is_empty())
            .map(|tools| {
                tools.iter().map(|t| AnthropicTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.parameters.clone(),
                }).collect()
            });

        let api_request = AnthropicRequest {
            model: model.to_string(),
            messages,
            system,
            max_tokens: request.max_tokens.unwrap_or(4096),
            temperature: request.temperature,
            tool_choice: tools.as_ref().and(request.tool_choice.as_ref()).map(tool_choice_value),
            tools,
        };

        let api_key = self.config.api_key.as_ref()
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::AuthenticationFailed)?;

        let mut req = self.client
            .post(format!("{}/messages", self.base_url()))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&api_request);

        tracing::debug!(model, messages = api_request.messages.len(), "anthropic messages request");

        let response = req.send().await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry = retry_after(&response);
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text, retry));
        }

        let api_response: AnthropicResponse = response.json().await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        // Extract text content and tool calls
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in &api_response.content {
            match block {
                ContentBlock::Text { text } => {
                    content.push_str(text);
                }
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        arguments: input.to_string(),
                    });
                }
                ContentBlock::Other => {}
            }
        }

        let finish_reason = match api_response.stop_reason.as_deref() {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            Some("tool_use") => FinishReason::ToolCalls,
            _ => FinishReason::Unknown,
        };

        let usage = Usage {
            prompt_tokens: api_response.usage.input_tokens,
            completion_tokens: api_response.usage.output_tokens,
            total_tokens: api_response.usage.input_tokens + api_response.usage.output_tokens,
        };

        Ok(CompletionResponse {
            id: api_response.id,
            model: api_response.model,
            content: if content.is_empty() { None } else { Some(content) },
            tool_calls,
            finish_reason,
            usage,
        })
    }
}

/// Split out the system prompt and fold the conversation into Anthropic turns.
///
/// Tool results travel as `tool_result` blocks inside a user turn, and the
/// API expects roles to alternate, so consecutive turns with the same role
/// are merged into one.
fn tool_choice_value(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => serde_json::json!({ "type": "auto" }),
        ToolChoice::None => serde_json::json!({ "type": "none" }),
        ToolChoice::Required => serde_json::json!({ "type": "any" }),
        ToolChoice::Function { name } => serde_json::json!({ "type": "tool", "name": name }),
    }
}

fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system: Vec<String> = Vec::new();
    let mut out: Vec<AnthropicMessage> = Vec::new();

    for msg in messages {
        let (role, blocks) = match msg.role {
            Role::System => {
                if let Some(content) = &msg.content {
                    system.push(content.clone());
                }
                continue;
            }
            Role::User => ("user", text_blocks(msg.content.as_deref())),
            Role::Assistant => {
                let mut blocks = text_blocks(msg.content.as_deref());
                for call in msg.tool_calls.iter().flatten() {
                    blocks.push(AnthropicContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments_value().unwrap_or_else(|_| serde_json::json!({})),
                    });
                }
                ("assistant", blocks)
            }
            Role::Tool => ("user", vec![AnthropicContentBlock::ToolResult {
                tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                content: msg.content.clone().unwrap_or_default(),
            }]),
        };

        if blocks.is_empty() {
            continue;
        }

        match out.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => out.push(AnthropicMessage { role: role.into(), content: blocks }),
        }
    }

    let system = if system.is_empty() { None } else { Some(system.join("\n\n")) };
    (system, out)
}

fn text_blocks(content: Option<&str>) -> Vec<AnthropicContentBlock> {
    match content {
        Some(text) if !text.is_empty() => vec![AnthropicContentBlock::Text { text: text.to_string() }],
        _ => Vec::new(),
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_convert_messages_merges_tool_turns() {
        let messages = vec![
            ChatMessage::system("You are a MySQL administrator."),
            ChatMessage::user("Validate the database."),
            ChatMessage::assistant_tool_calls(Some("Checking.".into()), vec![
                ToolCall { id: "tu_1".into(), name: "check_mysql_container_status".into(), arguments: "{}".into() },
                ToolCall { id: "tu_2".into(), name: "get_mysql_logs".into(), arguments: "{\"lines\":10}".into() },
            ]),
            ChatMessage::tool_result("tu_1", "Container status: running, Health: healthy"),
            ChatMessage::tool_result("tu_2", "ready for connections"),
        ];

        let (system, converted) = convert_messages(&messages);
        assert_eq!(system.as_deref(), Some("You are a MySQL administrator."));
        assert_eq!(converted.len(), 3);

        let value = serde_json::to_value(&converted).unwrap();
        assert_eq!(value[1]["role"], "assistant");
        assert_eq!(value[1]["content"][0]["type"], "text");
        assert_eq!(value[1]["content"][1]["type"], "tool_use");
        assert_eq!(value[1]["content"][2]["input"]["lines"], 10);

        assert_eq!(value[2]["role"], "user");
        assert_eq!(value[2]["content"].as_array().unwrap().len(), 2);
        assert_eq!(value[2]["content"][1]["tool_use_id"], "tu_2");
    }

    #[test]
    fn test_tool_choice_values() {
        assert_eq!(tool_choice_value(&ToolChoice::Auto), json!({ "type": "auto" }));
        assert_eq!(tool_choice_value(&ToolChoice::None), json!({ "type": "none" }));
        assert_eq!(tool_choice_value(&ToolChoice::Required), json!({ "type": "any" }));
        assert_eq!(
            tool_choice_value(&ToolChoice::Function { name: "get_wordpress_url".into() }),
            json!({ "type": "tool", "name": "get_wordpress_url" })
        );
    }

    #[tokio::test]
    async fn test_complete_parses_tool_use() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "sk-ant-test")
                .header("anthropic-version", "2023-06-01")
                .body_contains("\"input_schema\"")
                .body_contains("\"system\":\"be brief\"");
            then.status(200).json_body(json!({
                "id": "msg_1",
                "model": "claude-sonnet-4-20250514",
                "content": [
                    { "type": "text", "text": "Let me check Docker." },
                    { "type": "tool_use", "id": "tu_7", "name": "check_docker_running", "input": {} }
                ],
                "stop_reason": "tool_use",
                "usage": { "input_tokens": 40, "output_tokens": 9 }
            }));
        }).await;

        let provider = AnthropicProvider::new(
            ProviderConfig::anthropic("sk-ant-test").with_base_url(server.url("/v1")),
        ).unwrap();
        let request = CompletionRequest::new(vec![ChatMessage::system("be brief"), ChatMessage::user("install")])
            .with_tools(vec![ToolDefinition::new("check_docker_running", "Check if Docker daemon is running.")])
            .with_tool_choice(ToolChoice::Auto);
        let response = provider.complete(request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content.as_deref(), Some("Let me check Docker."));
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.tool_calls[0].name, "check_docker_running");
        assert_eq!(response.tool_calls[0].arguments, "{}");
        assert_eq!(response.usage.total_tokens, 49);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let mut config = ProviderConfig::anthropic("");
        config.base_url = Some("http://127.0.0.1:9".into());
        let provider = AnthropicProvider::new(config).unwrap();
        let err = provider.prompt("hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth_failure() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(401).body("{\"error\":\"invalid x-api-key\"}");
        }).await;

        let provider = AnthropicProvider::new(
            ProviderConfig::anthropic("bad").with_base_url(server.url("/v1")),
        ).unwrap();
        let err = provider.prompt("hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed));
    }
}
