//! # wpcraft LLM
//!
//! The model side of the agents: chat messages, tool definitions and the
//! provider clients that carry them to OpenAI or Anthropic.
//!
//! ## Core Concepts
//! - **ChatMessage**: one turn of the conversation, including tool calls and tool results
//! - **ToolDefinition**: name, description and JSON schema of a callable tool
//! - **Provider**: trait-based LLM communication (OpenAI, Anthropic)

pub mod error;
pub mod provider;

pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use provider::{
    LlmProvider, Provider, ProviderConfig, ProviderType, ProviderError,
    ChatMessage, Role, CompletionRequest, CompletionResponse,
    ToolDefinition, ToolCall, ToolChoice,
    FinishReason, Usage, UsageTracker,
    OpenAIProvider, AnthropicProvider,
};
