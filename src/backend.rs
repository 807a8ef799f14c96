//! Reasoning backend port and its edgequake-llm adapter.
//!
//! The agent and the controller speak in [`ChatTurn`]s and [`RequestedCall`]s.
//! Only [`EdgequakeBackend`] knows how those map onto provider messages, so
//! tests drive the whole page walk with a scripted [`ReasoningBackend`] and
//! no network.

use crate::error::BackendError;
use async_trait::async_trait;
use edgequake_llm::{
    ChatMessage, CompletionOptions, FunctionCall, LLMProvider, ToolCall, ToolDefinition,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Author of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedCall {
    /// Provider-assigned id; echoed back in the matching tool result.
    pub id: String,
    /// Tool name as the model spelled it.
    pub name: String,
    /// Parsed JSON arguments. Unparseable argument text is kept as a string.
    pub arguments: Value,
}

impl RequestedCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One entry of the append-only conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    /// Calls requested in an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<RequestedCall>,
    /// For tool turns, the id of the call being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl ChatTurn {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            calls: Vec::new(),
            call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, calls: Vec<RequestedCall>) -> Self {
        Self {
            calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: Some(call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

/// A tool the model may call: name, description and JSON-schema parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// What one backend call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendReply {
    /// Free text (rationale, or the JSON body for metadata extraction).
    pub content: String,
    /// Tool calls, in the order the model listed them.
    pub calls: Vec<RequestedCall>,
}

/// A language model that can answer with text and tool calls.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Send `turns` with `tools` available (empty slice: plain completion).
    async fn complete(
        &self,
        turns: &[ChatTurn],
        tools: &[ToolSpec],
    ) -> Result<BackendReply, BackendError>;
}

// ── edgequake-llm adapter ────────────────────────────────────────────────

/// [`ReasoningBackend`] over any edgequake-llm provider.
pub struct EdgequakeBackend {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl fmt::Debug for EdgequakeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgequakeBackend")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .finish()
    }
}

impl EdgequakeBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl ReasoningBackend for EdgequakeBackend {
    async fn complete(
        &self,
        turns: &[ChatTurn],
        tools: &[ToolSpec],
    ) -> Result<BackendReply, BackendError> {
        let messages = to_messages(turns);

        let response = if tools.is_empty() {
            self.provider.chat(&messages, Some(&self.options)).await
        } else {
            let definitions: Vec<ToolDefinition> = tools
                .iter()
                .map(|t| ToolDefinition::function(t.name, t.description, t.parameters.clone()))
                .collect();
            self.provider
                .chat_with_tools(&messages, &definitions, None, Some(&self.options))
                .await
        }
        .map_err(|e| BackendError::Provider(e.to_string()))?;

        debug!(
            "Backend reply: {} input tokens, {} output tokens, {} tool calls",
            response.prompt_tokens,
            response.completion_tokens,
            response.tool_calls.len()
        );

        let calls = response
            .tool_calls
            .into_iter()
            .map(|c| RequestedCall {
                arguments: parse_arguments(&c.function.arguments),
                id: c.id,
                name: c.function.name,
            })
            .collect();

        Ok(BackendReply {
            content: response.content,
            calls,
        })
    }
}

/// Provider argument strings are JSON; keep the raw text if they are not.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Map history onto provider messages.
///
/// Providers reject a tool message that does not answer a call of an earlier
/// assistant message, so synthetic tool results (backend failure notices)
/// are sent as user messages instead.
fn to_messages(turns: &[ChatTurn]) -> Vec<ChatMessage> {
    let mut open_calls: HashSet<&str> = HashSet::new();
    turns
        .iter()
        .map(|turn| match turn.role {
            Role::System => ChatMessage::system(&turn.content),
            Role::User => ChatMessage::user(&turn.content),
            Role::Assistant => {
                let mut msg = ChatMessage::assistant(&turn.content);
                if !turn.calls.is_empty() {
                    open_calls.extend(turn.calls.iter().map(|c| c.id.as_str()));
                    msg.tool_calls = Some(turn.calls.iter().map(to_tool_call).collect());
                }
                msg
            }
            Role::Tool => match turn.call_id.as_deref() {
                Some(id) if open_calls.remove(id) => ChatMessage::tool_result(id, &turn.content),
                _ => ChatMessage::user(&turn.content),
            },
        })
        .collect()
}

fn to_tool_call(call: &RequestedCall) -> ToolCall {
    let arguments = match &call.arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    ToolCall {
        id: call.id.clone(),
        call_type: "function".to_string(),
        function: FunctionCall {
            name: call.name.clone(),
            arguments,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arguments_parse_or_fall_back_to_text() {
        assert_eq!(parse_arguments(r#"{"current_page_index": 2}"#), json!({"current_page_index": 2}));
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("{oops"), json!("{oops"));
    }

    #[test]
    fn orphan_tool_results_become_user_messages() {
        let turns = vec![
            ChatTurn::user("start"),
            ChatTurn::assistant(
                "",
                vec![RequestedCall::new("c1", "read_consecutive_pages", json!({"current_page_index": 0}))],
            ),
            ChatTurn::tool_result("c1", "--- Page 1 Content ---"),
            ChatTurn::tool_result("backend-error", "Reasoning backend error"),
        ];
        let messages = to_messages(&turns);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("c1"));
        assert!(messages[3].tool_call_id.is_none());
        assert_eq!(messages[1].tool_calls.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn tool_call_keeps_raw_argument_text() {
        let call = RequestedCall::new("x", "save_document", json!("{broken"));
        assert_eq!(to_tool_call(&call).function.arguments, "{broken");
    }

    #[test]
    fn turn_constructors() {
        let t = ChatTurn::tool_result("id", "ok");
        assert_eq!(t.role, Role::Tool);
        assert_eq!(t.call_id.as_deref(), Some("id"));
        assert!(ChatTurn::assistant("hi", vec![]).calls.is_empty());
    }
}
