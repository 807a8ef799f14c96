//! Split entry points and the page-walk controller.
//!
//! ## The page walk
//!
//! The controller owns a cursor and the buffer of pages collected for the
//! document in progress. The buffer is seeded with page 0 and, while the walk
//! is running, always ends with the cursor page. Each iteration asks the
//! agent about the pair `(cursor, cursor + 1)`:
//!
//! ```text
//! reply without tool calls  → same document:  cursor += 1, push cursor
//! save_document             → new document:   write buffer, cursor += 1, buffer = [cursor]
//! any other tool            → execute, append result, ask again (page not consumed)
//! backend failed            → OnBackendFailure policy
//! cursor == total_pages     → flush non-empty buffer, done
//! ```
//!
//! Every page therefore lands in exactly one output document, in ascending
//! order, no matter what the agent says. The buffer is authoritative: the
//! `page_indices` the agent passes to `save_document` are checked against it
//! and any difference is reported back in the tool result.

use crate::backend::{ChatTurn, EdgequakeBackend, ReasoningBackend, RequestedCall};
use crate::config::{OnBackendFailure, SplitConfig};
use crate::error::{PdfSplitError, ToolError};
use crate::output::{InspectReport, PagePreview, RawMetadata, SavedDocument, SplitOutput, SplitStats};
use crate::pipeline::agent::{AgentTurn, DecisionAgent};
use crate::pipeline::human::{feedback_text, ConsoleConfirmation, HumanConfirmation};
use crate::pipeline::memory::{
    CaseLookup, CaseMemory, DecisionSource, EdgequakeEmbedder, JsonlCaseStore, SplitDecision,
};
use crate::pipeline::normalize::MetadataNormalizer;
use crate::pipeline::pages::{PagePair, PageText, PageTextSource};
use crate::pipeline::tools::ToolInvocation;
use crate::pipeline::writer::{DocumentWriter, PageCopy};
use crate::pipeline::input;
use crate::progress::{NoopProgressCallback, SplitProgressCallback};
use crate::prompts::{backend_failure_question, KICKOFF_MESSAGE};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Call id of the synthetic tool result appended after a failed turn.
pub const BACKEND_FAILURE_CALL_ID: &str = "backend_failure";

const DEFAULT_MODEL: &str = "gpt-4.1-mini";

// ── State ────────────────────────────────────────────────────────────────

/// Where the controller is within one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the agent's decision on the current pair.
    Scanning,
    /// Executing the tools of the last turn.
    AwaitingToolResult,
    /// Every page has been assigned to a written document.
    Done,
}

/// Cursor, page buffer and phase of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitState {
    /// 0-based page under evaluation.
    pub cursor: usize,
    pub total_pages: usize,
    /// Pages collected for the document in progress, ascending.
    pub buffer: Vec<usize>,
    pub phase: Phase,
}

impl SplitState {
    pub fn new(total_pages: usize) -> Self {
        if total_pages == 0 {
            return Self {
                cursor: 0,
                total_pages,
                buffer: Vec::new(),
                phase: Phase::Done,
            };
        }
        Self {
            cursor: 0,
            total_pages,
            buffer: vec![0],
            phase: Phase::Scanning,
        }
    }

    /// True once the cursor has passed the last page.
    pub fn is_done(&self) -> bool {
        self.cursor >= self.total_pages
    }

    /// The next page belongs to the current document.
    pub fn continue_document(&mut self) {
        self.cursor += 1;
        if self.cursor < self.total_pages {
            self.buffer.push(self.cursor);
        }
    }

    /// The next page starts a new document. Returns the finished buffer.
    pub fn start_new_document(&mut self) -> Vec<usize> {
        let finished = std::mem::take(&mut self.buffer);
        self.cursor += 1;
        if self.cursor < self.total_pages {
            self.buffer.push(self.cursor);
        }
        finished
    }
}

// ── Toolbox ──────────────────────────────────────────────────────────────

/// One method per tool in the agent's vocabulary.
#[derive(Clone)]
pub struct Toolbox {
    pages: PageTextSource,
    memory: CaseMemory,
    human: Arc<dyn HumanConfirmation>,
    writer: DocumentWriter,
    agent: DecisionAgent,
}

impl fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolbox")
            .field("pages", &self.pages)
            .field("memory", &self.memory)
            .field("writer", &self.writer)
            .finish()
    }
}

impl Toolbox {
    pub fn new(
        pages: PageTextSource,
        memory: CaseMemory,
        human: Arc<dyn HumanConfirmation>,
        writer: DocumentWriter,
        agent: DecisionAgent,
    ) -> Self {
        Self {
            pages,
            memory,
            human,
            writer,
            agent,
        }
    }

    pub fn read_consecutive_pages(&self, current_page_index: usize) -> Result<PagePair, ToolError> {
        self.pages.read_pair(current_page_index)
    }

    pub async fn search_for_similar_cases(&self, current: &str, next: &str) -> CaseLookup {
        self.memory.find_similar(current, next).await
    }

    pub async fn ask_human_for_confirmation(&self, question: &str) -> Result<bool, ToolError> {
        self.human.confirm(question).await
    }

    pub async fn extract_metadata(&self, current: &str, next: &str) -> RawMetadata {
        self.agent.extract_metadata(current, next).await
    }

    /// Write `pages` as one document. Page copy runs on the blocking pool.
    pub async fn save_document(
        &self,
        pages: Vec<usize>,
        metadata: RawMetadata,
    ) -> Result<SavedDocument, ToolError> {
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || writer.save(&pages, &metadata))
            .await
            .map_err(|e| ToolError::WriteFailed {
                path: self.writer.output_dir().display().to_string(),
                detail: format!("save task failed: {e}"),
            })?
    }
}

// ── Controller ───────────────────────────────────────────────────────────

/// Collaborators of a run. [`split`] builds these from the environment;
/// tests pass doubles to [`split_with`].
pub struct SplitParts {
    pub pages: Arc<dyn PageText>,
    pub copier: Arc<dyn PageCopy>,
    pub backend: Arc<dyn ReasoningBackend>,
    pub human: Arc<dyn HumanConfirmation>,
    pub memory: CaseMemory,
}

/// Drives the agent over the source PDF until every page is written.
pub struct SplitController {
    agent: DecisionAgent,
    toolbox: Toolbox,
    state: SplitState,
    history: Vec<ChatTurn>,
    on_backend_failure: OnBackendFailure,
    max_tool_rounds: usize,
    progress: Arc<dyn SplitProgressCallback>,
    /// Metadata reported for the document in progress.
    last_metadata: Option<RawMetadata>,
    /// Most recent pair read by the agent, for case write-back.
    last_pair: Option<PagePair>,
    documents: Vec<SavedDocument>,
    stats: SplitStats,
}

impl fmt::Debug for SplitController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitController")
            .field("state", &self.state)
            .field("history_len", &self.history.len())
            .field("on_backend_failure", &self.on_backend_failure)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("documents", &self.documents.len())
            .finish()
    }
}

impl SplitController {
    pub fn new(parts: SplitParts, config: &SplitConfig) -> Self {
        Self::with_agent(parts, config, |agent| agent)
    }

    /// Like [`SplitController::new`], letting the caller adjust the agent
    /// (e.g. a sub-second timeout in tests).
    pub fn with_agent(
        parts: SplitParts,
        config: &SplitConfig,
        adjust: impl FnOnce(DecisionAgent) -> DecisionAgent,
    ) -> Self {
        let agent = adjust(DecisionAgent::new(parts.backend, config));
        let pages = PageTextSource::new(parts.pages);
        let writer = DocumentWriter::new(
            parts.copier,
            &config.output_dir,
            MetadataNormalizer::with_aliases(config.company_aliases.clone()),
            config.collision_policy,
        );
        let total_pages = pages.total_pages();
        let toolbox = Toolbox::new(pages, parts.memory, parts.human, writer, agent.clone());

        Self {
            agent,
            toolbox,
            state: SplitState::new(total_pages),
            history: Vec::new(),
            on_backend_failure: config.on_backend_failure,
            max_tool_rounds: config.max_tool_rounds,
            progress: config
                .progress_callback
                .clone()
                .unwrap_or_else(|| Arc::new(NoopProgressCallback)),
            last_metadata: None,
            last_pair: None,
            documents: Vec::new(),
            stats: SplitStats {
                total_pages,
                ..Default::default()
            },
        }
    }

    pub fn state(&self) -> &SplitState {
        &self.state
    }

    /// Conversation so far, without the per-turn system message.
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Walk the document to the end.
    ///
    /// # Errors
    /// Only [`PdfSplitError::BackendHalted`] (policy `HaltRun`) and
    /// [`PdfSplitError::OutputWriteFailed`] (trailing flush). Tool failures
    /// are reported to the agent and never end the run.
    pub async fn run(&mut self) -> Result<SplitOutput, PdfSplitError> {
        let start = Instant::now();
        let total = self.state.total_pages;
        info!("Splitting {} pages", total);
        self.progress.on_split_start(total);

        if self.history.is_empty() {
            self.history.push(ChatTurn::user(KICKOFF_MESSAGE));
        }

        let mut page_seen: Option<usize> = None;
        let mut rounds = 0usize;

        while !self.state.is_done() {
            let cursor = self.state.cursor;
            if page_seen != Some(cursor) {
                page_seen = Some(cursor);
                rounds = 0;
                debug!("Page {}: buffer {:?}", cursor, self.state.buffer);
                self.progress.on_page_start(cursor, total);
            }

            self.state.phase = Phase::Scanning;
            self.stats.agent_turns += 1;

            match self.agent.next_turn(&self.history, &self.state).await {
                AgentTurn::Continue { rationale } => {
                    debug!("Page {}: same document: {}", cursor, rationale);
                    self.history.push(ChatTurn::assistant(rationale, Vec::new()));
                    self.state.continue_document();
                }
                AgentTurn::ToolCalls { rationale, calls } => {
                    self.history
                        .push(ChatTurn::assistant(rationale, calls.clone()));
                    self.state.phase = Phase::AwaitingToolResult;
                    let consumed = self.dispatch(calls).await;
                    if !consumed {
                        rounds += 1;
                        if rounds >= self.max_tool_rounds {
                            warn!(
                                "Page {}: {} tool rounds without a decision, continuing document",
                                cursor, rounds
                            );
                            self.state.continue_document();
                        }
                    }
                }
                AgentTurn::Failed { attempts, error } => {
                    self.handle_backend_failure(attempts, error).await?;
                }
            }
        }

        self.flush_trailing().await?;
        self.state.phase = Phase::Done;

        self.stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Split complete: {} documents from {} pages, {}ms",
            self.documents.len(),
            total,
            self.stats.duration_ms
        );
        self.progress.on_split_complete(total, self.documents.len());

        Ok(SplitOutput {
            documents: self.documents.clone(),
            stats: self.stats.clone(),
        })
    }

    /// Execute every requested call in order, one tool result each.
    /// Returns true when a save consumed the current page.
    async fn dispatch(&mut self, calls: Vec<RequestedCall>) -> bool {
        let mut saved_this_turn = false;

        for call in calls {
            self.stats.tool_calls += 1;
            self.progress.on_tool_call(self.state.cursor, &call.name);

            let result = match ToolInvocation::parse(&call.name, &call.arguments) {
                Ok(invocation) => {
                    debug!("Page {}: {}", self.state.cursor, invocation.name());
                    self.execute(invocation, &mut saved_this_turn).await
                }
                Err(e) => {
                    warn!("Page {}: rejected tool call: {}", self.state.cursor, e);
                    e.to_string()
                }
            };
            self.history.push(ChatTurn::tool_result(call.id, result));
        }

        saved_this_turn
    }

    async fn execute(&mut self, invocation: ToolInvocation, saved_this_turn: &mut bool) -> String {
        match invocation {
            ToolInvocation::ReadConsecutivePages { current_page_index } => {
                match self.toolbox.read_consecutive_pages(current_page_index) {
                    Ok(pair) => {
                        let rendered = pair.to_string();
                        self.last_pair = Some(pair);
                        rendered
                    }
                    Err(e) => e.to_string(),
                }
            }
            ToolInvocation::SearchForSimilarCases {
                current_page_text,
                next_page_text,
            } => self
                .toolbox
                .search_for_similar_cases(&current_page_text, &next_page_text)
                .await
                .to_string(),
            ToolInvocation::AskHumanForConfirmation { question } => {
                self.stats.human_prompts += 1;
                match self.toolbox.ask_human_for_confirmation(&question).await {
                    Ok(new_document) => {
                        let decision = if new_document {
                            SplitDecision::NewDocument
                        } else {
                            SplitDecision::SameDocument
                        };
                        self.learn(decision, DecisionSource::Human).await;
                        feedback_text(new_document).to_string()
                    }
                    Err(e) => e.to_string(),
                }
            }
            ToolInvocation::ExtractMetadata {
                current_page_text,
                next_page_text,
            } => {
                let found = self
                    .toolbox
                    .extract_metadata(&current_page_text, &next_page_text)
                    .await;
                let rendered = serde_json::to_string(&found).unwrap_or_default();
                if !found.is_empty() {
                    self.last_metadata = Some(match self.last_metadata.take() {
                        // The first extraction of a letter describes its
                        // letterhead; later pairs may already show the next one.
                        Some(previous) => previous.or(&found),
                        None => found,
                    });
                }
                rendered
            }
            ToolInvocation::SaveDocument {
                page_indices,
                metadata,
            } => self.save_requested(page_indices, metadata, saved_this_turn).await,
        }
    }

    async fn save_requested(
        &mut self,
        requested: Vec<usize>,
        metadata: RawMetadata,
        saved_this_turn: &mut bool,
    ) -> String {
        if requested.is_empty() {
            return ToolError::EmptySelection.to_string();
        }
        if *saved_this_turn {
            return "Error: a document was already saved in this turn. \
                    Call save_document once per decision."
                .to_string();
        }

        let metadata = match &self.last_metadata {
            Some(previous) => metadata.or(previous),
            None => metadata,
        };
        let pages = self.state.buffer.clone();

        match self.save(pages.clone(), metadata).await {
            Ok(saved) => {
                *saved_this_turn = true;
                self.learn(SplitDecision::NewDocument, DecisionSource::Agent)
                    .await;
                self.state.start_new_document();

                let mut message = format!("Successfully saved document to: {}", saved.path.display());
                if requested != pages {
                    warn!(
                        "Agent asked to save {:?}, saved collected pages {:?}",
                        requested, pages
                    );
                    message.push_str(&format!(
                        "\nNote: saved the collected pages {pages:?} instead of the requested {requested:?}. \
                         Pages are always saved in order, each exactly once."
                    ));
                }
                message
            }
            Err(e) => e.to_string(),
        }
    }

    /// Write a document and update bookkeeping. Does not move the cursor.
    async fn save(
        &mut self,
        pages: Vec<usize>,
        metadata: RawMetadata,
    ) -> Result<SavedDocument, ToolError> {
        let saved = self.toolbox.save_document(pages, metadata).await?;
        self.last_metadata = None;
        self.stats.documents_saved += 1;
        self.progress.on_document_saved(&saved.pages, &saved.path);
        self.documents.push(saved.clone());
        Ok(saved)
    }

    /// Record a decision for the current pair when learning is on.
    async fn learn(&self, decision: SplitDecision, source: DecisionSource) {
        if !self.toolbox.memory.is_learning() {
            return;
        }
        let Some(pair) = self
            .last_pair
            .as_ref()
            .filter(|p| p.index == self.state.cursor)
        else {
            debug!("No pair read for page {}, not recording", self.state.cursor);
            return;
        };
        if let Err(e) = self
            .toolbox
            .memory
            .record(&pair.current, pair.next.as_str(), decision, source)
            .await
        {
            warn!("Could not record case: {}", e);
        }
    }

    async fn handle_backend_failure(
        &mut self,
        attempts: u32,
        error: ToolError,
    ) -> Result<(), PdfSplitError> {
        let cursor = self.state.cursor;
        let detail = error.to_string();
        self.stats.backend_failures += 1;
        self.progress.on_backend_error(cursor, &detail);
        self.history
            .push(ChatTurn::tool_result(BACKEND_FAILURE_CALL_ID, detail.clone()));

        match self.on_backend_failure {
            OnBackendFailure::SkipPage => {
                warn!("Page {}: backend failed, continuing document", cursor);
                self.state.continue_document();
            }
            OnBackendFailure::HaltRun => {
                return Err(PdfSplitError::BackendHalted {
                    page: cursor,
                    attempts,
                    detail,
                });
            }
            OnBackendFailure::AskHuman => {
                if cursor + 1 >= self.state.total_pages {
                    // Last page: the trailing flush closes the document.
                    self.state.continue_document();
                    return Ok(());
                }
                self.stats.human_prompts += 1;
                match self
                    .toolbox
                    .ask_human_for_confirmation(&backend_failure_question(cursor))
                    .await
                {
                    Ok(true) => {
                        let pages = self.state.buffer.clone();
                        let metadata = self.last_metadata.clone().unwrap_or_default();
                        match self.save(pages, metadata).await {
                            Ok(_) => {
                                self.stats.forced_saves += 1;
                                self.state.start_new_document();
                            }
                            Err(e) => {
                                warn!("Page {}: save after human answer failed: {}", cursor, e);
                                self.state.continue_document();
                            }
                        }
                    }
                    Ok(false) => self.state.continue_document(),
                    Err(e) => {
                        warn!("Page {}: {}; continuing document", cursor, e);
                        self.state.continue_document();
                    }
                }
            }
        }
        Ok(())
    }

    /// Write pages the agent never saved.
    async fn flush_trailing(&mut self) -> Result<(), PdfSplitError> {
        if self.state.buffer.is_empty() {
            return Ok(());
        }
        let pages = std::mem::take(&mut self.state.buffer);
        let metadata = self.last_metadata.clone().unwrap_or_default();
        warn!("Agent did not save the final document, flushing pages {:?}", pages);

        self.save(pages, metadata)
            .await
            .map_err(|e| PdfSplitError::OutputWriteFailed {
                path: self.toolbox.writer.output_dir().to_path_buf(),
                detail: e.to_string(),
            })?;
        self.stats.forced_saves += 1;
        Ok(())
    }
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Split a scanned PDF into one PDF per letter.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(PdfSplitError)` only for fatal errors: the input is missing
/// or not a PDF, no provider is configured, the `HaltRun` policy fired, or
/// the final document could not be written.
pub async fn split(
    input: impl AsRef<Path>,
    config: &SplitConfig,
) -> Result<SplitOutput, PdfSplitError> {
    let input = input.as_ref();
    info!("Starting split: {}", input.display());

    // ── Step 1: Validate input ───────────────────────────────────────────
    let path = input::resolve_input(input)?;

    // ── Step 2: Get/create provider ──────────────────────────────────────
    let provider = resolve_provider(config)?;
    let backend = Arc::new(EdgequakeBackend::new(
        provider,
        config.temperature,
        config.max_tokens,
    ));

    // ── Step 3: Parse the PDF ────────────────────────────────────────────
    let (pages, copier) = open_source(&path).await?;

    // ── Step 4: Case memory and operator ─────────────────────────────────
    let memory = build_case_memory(config);
    let human = Arc::new(ConsoleConfirmation::new(
        config.human_timeout_secs.map(Duration::from_secs),
    ));

    split_with(
        SplitParts {
            pages,
            copier,
            backend,
            human,
            memory,
        },
        config,
    )
    .await
}

/// Run the controller over explicit collaborators.
pub async fn split_with(
    parts: SplitParts,
    config: &SplitConfig,
) -> Result<SplitOutput, PdfSplitError> {
    SplitController::new(parts, config).run().await
}

/// Synchronous wrapper around [`split`].
///
/// Creates a temporary tokio runtime internally.
pub fn split_sync(
    input: impl AsRef<Path>,
    config: &SplitConfig,
) -> Result<SplitOutput, PdfSplitError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfSplitError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(split(input, config))
}

/// Page count and a one-line preview per page.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(input: impl AsRef<Path>) -> Result<InspectReport, PdfSplitError> {
    let path = input::resolve_input(input)?;
    let (pages, _) = open_source(&path).await?;
    let source = PageTextSource::new(pages);

    let pages = (0..source.total_pages())
        .map(|index| match source.read(index) {
            Ok(text) => PagePreview::from_text(index, &text),
            Err(e) => PagePreview {
                index,
                chars: 0,
                first_line: format!("<{e}>"),
            },
        })
        .collect();

    Ok(InspectReport {
        path,
        total_pages: source.total_pages(),
        pages,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

type Source = (Arc<dyn PageText>, Arc<dyn PageCopy>);

#[cfg(not(feature = "pdfium"))]
async fn open_source(path: &Path) -> Result<Source, PdfSplitError> {
    use crate::pipeline::pdf::LopdfDocument;

    let owned = path.to_path_buf();
    let doc = tokio::task::spawn_blocking(move || LopdfDocument::open(&owned))
        .await
        .map_err(|e| PdfSplitError::Internal(format!("PDF task panicked: {e}")))??;
    let doc = Arc::new(doc);
    Ok((doc.clone(), doc))
}

#[cfg(feature = "pdfium")]
async fn open_source(path: &Path) -> Result<Source, PdfSplitError> {
    use crate::pipeline::pdfium::PdfiumDocument;

    let owned = path.to_path_buf();
    let doc = tokio::task::spawn_blocking(move || PdfiumDocument::open(&owned))
        .await
        .map_err(|e| PdfSplitError::Internal(format!("PDF task panicked: {e}")))??;
    let doc = Arc::new(doc);
    Ok((doc.clone(), doc))
}

/// Case memory from config. A configured store without a reachable
/// embedding provider still yields a memory; lookups report `Unavailable`.
fn build_case_memory(config: &SplitConfig) -> CaseMemory {
    let Some(path) = &config.case_memory_path else {
        return CaseMemory::disabled();
    };
    let store = Arc::new(JsonlCaseStore::new(path));

    let embedding = match &config.embedding_provider {
        Some(p) => Some(Arc::clone(p)),
        None => match ProviderFactory::from_env() {
            Ok((_, embedding)) => Some(embedding),
            Err(e) => {
                warn!("No embedding provider for case memory: {}", e);
                None
            }
        },
    };

    match embedding {
        Some(p) => CaseMemory::new(Arc::new(EdgequakeEmbedder::new(p)), store),
        None => CaseMemory::without_embedder(store),
    }
    .learning(config.learn)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PdfSplitError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PdfSplitError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. pre-built provider (`config.provider`)
/// 2. named provider + model (`config.provider_name`)
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. `ProviderFactory::from_env` auto-detection
fn resolve_provider(config: &SplitConfig) -> Result<Arc<dyn LLMProvider>, PdfSplitError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PdfSplitError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
