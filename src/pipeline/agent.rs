//! Decision agent: one reasoning turn over the history, with retry and timeout.
//!
//! Each turn sends a fresh system message rendered from the controller state,
//! followed by the full history. The reply is classified into an
//! [`AgentTurn`]; the controller decides what it means for the page walk.
//!
//! ## Retry Strategy
//!
//! Failures and timeouts are retried `max_retries` times with exponential
//! backoff (`retry_backoff_ms * 2^(attempt-1)`). A turn that still fails is
//! reported as [`AgentTurn::Failed`], never as an `Err`: the backend failure
//! policy belongs to the controller.

use crate::backend::{BackendReply, ChatTurn, ReasoningBackend, RequestedCall, ToolSpec};
use crate::config::SplitConfig;
use crate::error::{BackendError, ToolError};
use crate::output::RawMetadata;
use crate::pipeline::tools::tool_specs;
use crate::prompts::{
    metadata_request, render_instructions, DEFAULT_INSTRUCTIONS, METADATA_EXTRACTION_PROMPT,
};
use crate::split::SplitState;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Classified result of one reasoning turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentTurn {
    /// No tool requested: the next page continues the current document.
    Continue { rationale: String },
    /// One or more tools requested, in order.
    ToolCalls {
        rationale: String,
        calls: Vec<RequestedCall>,
    },
    /// Every attempt failed.
    Failed { attempts: u32, error: ToolError },
}

/// Drives the reasoning backend with the fixed tool vocabulary.
#[derive(Clone)]
pub struct DecisionAgent {
    backend: Arc<dyn ReasoningBackend>,
    instructions: String,
    tools: Vec<ToolSpec>,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout: Duration,
}

impl fmt::Debug for DecisionAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionAgent")
            .field("tools", &self.tools.iter().map(|t| t.name).collect::<Vec<_>>())
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout", &self.api_timeout)
            .finish()
    }
}

impl DecisionAgent {
    pub fn new(backend: Arc<dyn ReasoningBackend>, config: &SplitConfig) -> Self {
        Self {
            backend,
            instructions: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            tools: tool_specs(),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Override the per-call timeout with sub-second precision.
    pub fn with_api_timeout(mut self, api_timeout: Duration) -> Self {
        self.api_timeout = api_timeout;
        self
    }

    /// Attempts per turn: the first call plus retries.
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Run one turn for `state` over `history`.
    pub async fn next_turn(&self, history: &[ChatTurn], state: &SplitState) -> AgentTurn {
        let mut turns = Vec::with_capacity(history.len() + 1);
        turns.push(ChatTurn::system(render_instructions(
            &self.instructions,
            state,
        )));
        turns.extend_from_slice(history);

        let label = format!("Page {}", state.cursor);
        match self.call_with_retry(&turns, &self.tools, &label).await {
            Ok(reply) if reply.calls.is_empty() => AgentTurn::Continue {
                rationale: reply.content,
            },
            Ok(reply) => AgentTurn::ToolCalls {
                rationale: reply.content,
                calls: reply.calls,
            },
            Err(e) => AgentTurn::Failed {
                attempts: self.attempts(),
                error: ToolError::TransientBackend {
                    attempts: self.attempts(),
                    detail: e.to_string(),
                },
            },
        }
    }

    /// Ask the backend for date / company / title of the letter on these pages.
    ///
    /// Never fails: an unreachable backend or a reply that is not JSON yields
    /// empty metadata, which normalises to sentinels.
    pub async fn extract_metadata(&self, current_page_text: &str, next_page_text: &str) -> RawMetadata {
        let turns = [
            ChatTurn::system(METADATA_EXTRACTION_PROMPT),
            ChatTurn::user(metadata_request(current_page_text, next_page_text)),
        ];
        match self.call_with_retry(&turns, &[], "Metadata").await {
            Ok(reply) => parse_metadata_reply(&reply.content),
            Err(e) => {
                warn!("Metadata extraction failed: {}", e);
                RawMetadata::default()
            }
        }
    }

    async fn call_with_retry(
        &self,
        turns: &[ChatTurn],
        tools: &[ToolSpec],
        label: &str,
    ) -> Result<BackendReply, BackendError> {
        let mut last_err = BackendError::Provider("no attempt made".into());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    label, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let result = match timeout(self.api_timeout, self.backend.complete(turns, tools)).await {
                Ok(r) => r,
                Err(_) => Err(BackendError::Timeout(self.api_timeout.as_secs())),
            };

            match result {
                Ok(reply) => {
                    debug!(
                        "{}: {} tool calls, {} chars of text",
                        label,
                        reply.calls.len(),
                        reply.content.len()
                    );
                    return Ok(reply);
                }
                Err(e) => {
                    warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());

/// Parse the extraction reply into metadata; anything unusable becomes empty.
pub fn parse_metadata_reply(content: &str) -> RawMetadata {
    let trimmed = content.trim();
    let body = RE_OUTER_FENCES
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    // Models like to wrap the object in prose; take the outermost braces.
    let object = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    };

    match serde_json::from_str::<Value>(object) {
        Ok(value @ Value::Object(_)) => RawMetadata::from(&value),
        _ => {
            warn!("Metadata reply is not a JSON object; using sentinels");
            RawMetadata::default()
        }
    }
}
