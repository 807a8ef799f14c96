//! Configuration types for agent-driven PDF splitting.
//!
//! All run behaviour is controlled through [`SplitConfig`], built via its
//! [`SplitConfigBuilder`]. Collaborators that tests want to replace (the LLM
//! provider, the embedding provider, the progress sink) are plain `Arc<dyn _>`
//! fields so a test can inject doubles without touching the environment.

use crate::error::PdfSplitError;
use crate::progress::SplitProgressCallback;
use edgequake_llm::{EmbeddingProvider, LLMProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for one split run.
///
/// # Example
/// ```rust
/// use edgequake_pdfsplit::{CollisionPolicy, OnBackendFailure, SplitConfig};
///
/// let config = SplitConfig::builder()
///     .output_dir("out")
///     .model("gpt-4.1-mini")
///     .on_backend_failure(OnBackendFailure::HaltRun)
///     .collision_policy(CollisionPolicy::Fail)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 1);
/// ```
#[derive(Clone)]
pub struct SplitConfig {
    /// Directory the split documents are written to. Default: `split_output`.
    pub output_dir: PathBuf,

    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for agent turns. Default: 0.0.
    ///
    /// Split decisions should be repeatable for the same bundle.
    pub temperature: f32,

    /// Maximum tokens per agent reply. Default: 1024.
    ///
    /// Replies are a short rationale plus tool calls; nothing long is expected.
    pub max_tokens: usize,

    /// Retries after a failed backend call. Default: 1 (one retry, two attempts).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-backend-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Give up on an unanswered human prompt after this many seconds.
    /// Lines typed after the deadline are discarded when the next question
    /// opens. None waits indefinitely. Default: None.
    pub human_timeout_secs: Option<u64>,

    /// Non-consuming tool rounds allowed for one page before the controller
    /// advances on its own. Default: 8.
    pub max_tool_rounds: usize,

    /// Custom instruction block. If None, uses the built-in one.
    ///
    /// The placeholders `{total_pages}`, `{current_page_index}`,
    /// `{next_page_index}` and `{current_document_pages}` are substituted
    /// on every turn.
    pub system_prompt: Option<String>,

    /// JSONL file holding past split decisions. None disables case memory.
    pub case_memory_path: Option<PathBuf>,

    /// Embedding backend for case memory. If None while `case_memory_path`
    /// is set, one is taken from `ProviderFactory::from_env()`.
    pub embedding_provider: Option<Arc<dyn EmbeddingProvider>>,

    /// Record human answers (and agent saves) back into case memory. Default: false.
    pub learn: bool,

    /// What to do when the reasoning backend keeps failing. Default: skip the page.
    pub on_backend_failure: OnBackendFailure,

    /// What to do when an output filename already exists. Default: add a suffix.
    pub collision_policy: CollisionPolicy,

    /// Extra `(needle, short code)` company aliases, checked before the built-in ones.
    pub company_aliases: Vec<(String, String)>,

    /// Optional progress sink.
    pub progress_callback: Option<Arc<dyn SplitProgressCallback>>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("split_output"),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 1024,
            max_retries: 1,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            human_timeout_secs: None,
            max_tool_rounds: 8,
            system_prompt: None,
            case_memory_path: None,
            embedding_provider: None,
            learn: false,
            on_backend_failure: OnBackendFailure::default(),
            collision_policy: CollisionPolicy::default(),
            company_aliases: Vec::new(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SplitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitConfig")
            .field("output_dir", &self.output_dir)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("human_timeout_secs", &self.human_timeout_secs)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("case_memory_path", &self.case_memory_path)
            .field(
                "embedding_provider",
                &self.embedding_provider.as_ref().map(|_| "<dyn EmbeddingProvider>"),
            )
            .field("learn", &self.learn)
            .field("on_backend_failure", &self.on_backend_failure)
            .field("collision_policy", &self.collision_policy)
            .field("company_aliases", &self.company_aliases)
            .finish()
    }
}

impl SplitConfig {
    /// Create a new builder for `SplitConfig`.
    pub fn builder() -> SplitConfigBuilder {
        SplitConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SplitConfig`].
#[derive(Debug)]
pub struct SplitConfigBuilder {
    config: SplitConfig,
}

impl SplitConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn human_timeout_secs(mut self, secs: u64) -> Self {
        self.config.human_timeout_secs = Some(secs);
        self
    }

    pub fn max_tool_rounds(mut self, n: usize) -> Self {
        self.config.max_tool_rounds = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn case_memory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.case_memory_path = Some(path.into());
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.config.embedding_provider = Some(provider);
        self
    }

    pub fn learn(mut self, v: bool) -> Self {
        self.config.learn = v;
        self
    }

    pub fn on_backend_failure(mut self, policy: OnBackendFailure) -> Self {
        self.config.on_backend_failure = policy;
        self
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.config.collision_policy = policy;
        self
    }

    pub fn company_alias(mut self, needle: impl Into<String>, code: impl Into<String>) -> Self {
        self.config
            .company_aliases
            .push((needle.into(), code.into()));
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn SplitProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SplitConfig, PdfSplitError> {
        let c = &self.config;
        if c.output_dir.as_os_str().is_empty() {
            return Err(PdfSplitError::InvalidConfig(
                "output directory must not be empty".into(),
            ));
        }
        if c.max_tool_rounds == 0 {
            return Err(PdfSplitError::InvalidConfig(
                "max_tool_rounds must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(PdfSplitError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.learn && c.case_memory_path.is_none() {
            return Err(PdfSplitError::InvalidConfig(
                "learning mode needs a case memory path".into(),
            ));
        }
        if let Some((needle, _)) = c.company_aliases.iter().find(|(n, _)| n.trim().is_empty()) {
            return Err(PdfSplitError::InvalidConfig(format!(
                "company alias needle must not be blank, got {needle:?}"
            )));
        }
        if let Some((_, code)) = c.company_aliases.iter().find(|(_, code)| !is_file_name_part(code)) {
            return Err(PdfSplitError::InvalidConfig(format!(
                "company alias code must be a plain file name part, got {code:?}"
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Reaction to a reasoning backend that still fails after all retries.
///
/// | Policy | Effect |
/// |--------|--------|
/// | `SkipPage` | treat the page as a continuation and move on (default) |
/// | `HaltRun`  | stop with [`PdfSplitError::BackendHalted`]; nothing pending is flushed |
/// | `AskHuman` | ask the operator whether the next page starts a new letter |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnBackendFailure {
    #[default]
    SkipPage,
    HaltRun,
    AskHuman,
}

impl FromStr for OnBackendFailure {
    type Err = PdfSplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" | "skip_page" => Ok(Self::SkipPage),
            "halt" | "halt_run" => Ok(Self::HaltRun),
            "ask" | "ask_human" => Ok(Self::AskHuman),
            other => Err(PdfSplitError::InvalidConfig(format!(
                "unknown backend failure policy '{other}' (expected skip, halt or ask)"
            ))),
        }
    }
}

/// Reaction to an output filename that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Append `-2`, `-3`, … before the extension. (default)
    #[default]
    Suffix,
    /// Replace the existing file.
    Overwrite,
    /// Refuse; the save fails with a tool error the agent can see.
    Fail,
}

impl FromStr for CollisionPolicy {
    type Err = PdfSplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "suffix" => Ok(Self::Suffix),
            "overwrite" => Ok(Self::Overwrite),
            "fail" => Ok(Self::Fail),
            other => Err(PdfSplitError::InvalidConfig(format!(
                "unknown collision policy '{other}' (expected suffix, overwrite or fail)"
            ))),
        }
    }
}

/// Alias codes land verbatim between the date and the title of a file name.
fn is_file_name_part(code: &str) -> bool {
    !code.trim().is_empty()
        && !code
            .chars()
            .any(|ch| matches!(ch, '/' | '\\') || ch.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = SplitConfig::default();
        assert_eq!(c.max_retries, 1);
        assert_eq!(c.max_tool_rounds, 8);
        assert_eq!(c.on_backend_failure, OnBackendFailure::SkipPage);
        assert_eq!(c.collision_policy, CollisionPolicy::Suffix);
        assert!(!c.learn);
    }

    #[test]
    fn builder_rejects_zero_rounds() {
        let err = SplitConfig::builder().max_tool_rounds(0).build().unwrap_err();
        assert!(matches!(err, PdfSplitError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_learning_without_store() {
        assert!(SplitConfig::builder().learn(true).build().is_err());
        assert!(SplitConfig::builder()
            .learn(true)
            .case_memory_path("cases.jsonl")
            .build()
            .is_ok());
    }

    #[test]
    fn builder_rejects_alias_codes_with_path_separators() {
        for code in ["../x", "a/b", "..\\up", " ", "D\u{0}P"] {
            let err = SplitConfig::builder()
                .company_alias("post", code)
                .build()
                .unwrap_err();
            assert!(matches!(err, PdfSplitError::InvalidConfig(_)), "{code:?}");
        }
        assert!(SplitConfig::builder().company_alias("post", "DP").build().is_ok());
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = SplitConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn policies_parse_from_cli_words() {
        assert_eq!("halt".parse::<OnBackendFailure>().unwrap(), OnBackendFailure::HaltRun);
        assert_eq!("ASK".parse::<OnBackendFailure>().unwrap(), OnBackendFailure::AskHuman);
        assert_eq!("overwrite".parse::<CollisionPolicy>().unwrap(), CollisionPolicy::Overwrite);
        assert!("later".parse::<OnBackendFailure>().is_err());
        assert!("merge".parse::<CollisionPolicy>().is_err());
    }

    #[test]
    fn debug_hides_provider() {
        let s = format!("{:?}", SplitConfig::default());
        assert!(s.contains("SplitConfig"));
        assert!(s.contains("max_tool_rounds"));
    }
}
