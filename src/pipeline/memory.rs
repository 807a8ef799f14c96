//! Case memory: nearest-neighbour lookup over past split decisions.
//!
//! A case is the text of a page pair plus the decision made for it. The
//! agent consults the closest past case when it is unsure; in learning mode
//! the operator's answers (and the agent's own saves) are written back.
//!
//! Case memory is advisory. Missing configuration, an unreachable embedding
//! backend or an unreadable store all produce [`CaseLookup::Unavailable`],
//! which callers treat exactly like [`CaseLookup::NoMatch`].

use crate::error::ToolError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edgequake_llm::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

// ── Records ──────────────────────────────────────────────────────────────

/// Outcome of one split decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitDecision {
    /// The next page starts a new document.
    NewDocument,
    /// The next page continues the current document.
    SameDocument,
}

impl fmt::Display for SplitDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NewDocument => "new_document",
            Self::SameDocument => "same_document",
        })
    }
}

/// Who made a recorded decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Human,
    Agent,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Human => "human",
            Self::Agent => "agent",
        })
    }
}

/// One stored case. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Text the embedding was computed from (see [`fingerprint`]).
    pub fingerprint: String,
    pub embedding: Vec<f32>,
    pub decision: SplitDecision,
    pub source: DecisionSource,
    pub created_at: DateTime<Utc>,
}

/// Closest past case for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseMatch {
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
    pub decision: SplitDecision,
    pub source: DecisionSource,
}

/// Result of [`CaseMemory::find_similar`].
#[derive(Debug, Clone, PartialEq)]
pub enum CaseLookup {
    Found(CaseMatch),
    NoMatch,
    /// Memory not configured or not reachable; carries the reason.
    Unavailable(String),
}

impl CaseLookup {
    /// The match, if any. `NoMatch` and `Unavailable` are the same to callers.
    pub fn best(&self) -> Option<&CaseMatch> {
        match self {
            Self::Found(m) => Some(m),
            Self::NoMatch | Self::Unavailable(_) => None,
        }
    }
}

impl fmt::Display for CaseLookup {
    /// Tool-result rendering.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(m) => write!(
                f,
                "Found a similar case with score {:.2}. The past {} decision was: '{}'.",
                m.score, m.source, m.decision
            ),
            Self::NoMatch => f.write_str("No similar cases found."),
            Self::Unavailable(reason) => write!(
                f,
                "No similar cases found (case memory unavailable: {reason})."
            ),
        }
    }
}

/// Text embedded for a page pair.
pub fn fingerprint(current_page_text: &str, next_page_text: &str) -> String {
    format!("Current Page:\n{current_page_text}\n\nNext Page:\n{next_page_text}")
}

/// Cosine similarity; 0 for mismatched dimensions or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

// ── Ports ────────────────────────────────────────────────────────────────

/// Turns text into a vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ToolError>;
}

/// Persistence for case records.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Every stored record.
    async fn all(&self) -> Result<Vec<CaseRecord>, ToolError>;

    /// Append one record.
    async fn append(&self, record: CaseRecord) -> Result<(), ToolError>;
}

/// [`Embedder`] over an edgequake-llm embedding provider.
pub struct EdgequakeEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EdgequakeEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Embedder for EdgequakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ToolError> {
        let mut vectors = self
            .provider
            .embed(&[text.to_string()])
            .await
            .map_err(|e| ToolError::BackendUnavailable(format!("embedding failed: {e}")))?;
        if vectors.is_empty() {
            return Err(ToolError::BackendUnavailable(
                "embedding provider returned no vector".into(),
            ));
        }
        Ok(vectors.swap_remove(0))
    }
}

/// Records kept in process memory. Useful for tests and one-off runs.
#[derive(Debug, Default)]
pub struct InMemoryCaseStore {
    records: Mutex<Vec<CaseRecord>>,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<CaseRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl CaseStore for InMemoryCaseStore {
    async fn all(&self) -> Result<Vec<CaseRecord>, ToolError> {
        self.records
            .lock()
            .map(|r| r.clone())
            .map_err(|_| ToolError::BackendUnavailable("case store lock poisoned".into()))
    }

    async fn append(&self, record: CaseRecord) -> Result<(), ToolError> {
        self.records
            .lock()
            .map(|mut r| r.push(record))
            .map_err(|_| ToolError::BackendUnavailable("case store lock poisoned".into()))
    }
}

/// One JSON record per line. A missing file is an empty store; malformed
/// lines are skipped with a warning.
#[derive(Debug, Clone)]
pub struct JsonlCaseStore {
    path: PathBuf,
}

impl JsonlCaseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CaseStore for JsonlCaseStore {
    async fn all(&self) -> Result<Vec<CaseRecord>, ToolError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ToolError::BackendUnavailable(format!(
                    "cannot read case memory {}: {e}",
                    self.path.display()
                )))
            }
        };

        let records = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(n, line)| match serde_json::from_str::<CaseRecord>(line) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!("{}:{}: skipping malformed case: {}", self.path.display(), n + 1, e);
                    None
                }
            })
            .collect();
        Ok(records)
    }

    async fn append(&self, record: CaseRecord) -> Result<(), ToolError> {
        let unavailable = |e: std::io::Error| {
            ToolError::BackendUnavailable(format!(
                "cannot write case memory {}: {e}",
                self.path.display()
            ))
        };

        let mut line = serde_json::to_string(&record)
            .map_err(|e| ToolError::BackendUnavailable(e.to_string()))?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(unavailable)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(unavailable)?;
        file.write_all(line.as_bytes()).await.map_err(unavailable)?;
        file.flush().await.map_err(unavailable)?;
        Ok(())
    }
}

// ── Facade ───────────────────────────────────────────────────────────────

/// Similarity search and optional write-back over past decisions.
#[derive(Clone, Default)]
pub struct CaseMemory {
    embedder: Option<Arc<dyn Embedder>>,
    store: Option<Arc<dyn CaseStore>>,
    learn: bool,
}

impl fmt::Debug for CaseMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaseMemory")
            .field("embedder", &self.embedder.is_some())
            .field("store", &self.store.is_some())
            .field("learn", &self.learn)
            .finish()
    }
}

impl CaseMemory {
    /// Memory that always answers `Unavailable`.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn CaseStore>) -> Self {
        Self {
            embedder: Some(embedder),
            store: Some(store),
            learn: false,
        }
    }

    /// Store configured but no embedder could be built.
    pub fn without_embedder(store: Arc<dyn CaseStore>) -> Self {
        Self {
            embedder: None,
            store: Some(store),
            learn: false,
        }
    }

    /// Enable or disable write-back.
    pub fn learning(mut self, learn: bool) -> Self {
        self.learn = learn;
        self
    }

    pub fn is_learning(&self) -> bool {
        self.learn
    }

    /// Closest stored case for the pair, by cosine similarity.
    pub async fn find_similar(&self, current_page_text: &str, next_page_text: &str) -> CaseLookup {
        let (Some(embedder), Some(store)) = (&self.embedder, &self.store) else {
            return CaseLookup::Unavailable("case memory is not configured".into());
        };

        let query = match embedder
            .embed(&fingerprint(current_page_text, next_page_text))
            .await
        {
            Ok(v) => v,
            Err(e) => return CaseLookup::Unavailable(e.to_string()),
        };
        let records = match store.all().await {
            Ok(r) => r,
            Err(e) => return CaseLookup::Unavailable(e.to_string()),
        };

        let best = records
            .iter()
            .filter(|r| r.embedding.len() == query.len())
            .map(|r| (cosine_similarity(&r.embedding, &query), r))
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((score, record)) => {
                debug!("Closest case: score {:.3}, {}", score, record.decision);
                CaseLookup::Found(CaseMatch {
                    score,
                    decision: record.decision,
                    source: record.source,
                })
            }
            None => CaseLookup::NoMatch,
        }
    }

    /// Store a decision for the pair. No-op unless learning is enabled.
    pub async fn record(
        &self,
        current_page_text: &str,
        next_page_text: &str,
        decision: SplitDecision,
        source: DecisionSource,
    ) -> Result<(), ToolError> {
        if !self.learn {
            return Ok(());
        }
        let (Some(embedder), Some(store)) = (&self.embedder, &self.store) else {
            return Err(ToolError::BackendUnavailable(
                "case memory is not configured".into(),
            ));
        };

        let text = fingerprint(current_page_text, next_page_text);
        let embedding = embedder.embed(&text).await?;
        store
            .append(CaseRecord {
                fingerprint: text,
                embedding,
                decision,
                source,
                created_at: Utc::now(),
            })
            .await?;
        debug!("Recorded {} decision: {}", source, decision);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bag-of-letters embedding: deterministic and good enough to rank.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ToolError> {
            let mut v = vec![0.0; 26];
            for c in text.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
                v[(c - b'a') as usize] += 1.0;
            }
            Ok(v)
        }
    }

    struct DownEmbedder;

    #[async_trait]
    impl Embedder for DownEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ToolError> {
            Err(ToolError::BackendUnavailable("connection refused".into()))
        }
    }

    fn learning_memory(store: Arc<InMemoryCaseStore>) -> CaseMemory {
        CaseMemory::new(Arc::new(LetterEmbedder), store).learning(true)
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn unavailable_is_no_best() {
        assert!(CaseLookup::Unavailable("x".into()).best().is_none());
        assert!(CaseLookup::NoMatch.best().is_none());
    }

    #[test]
    fn disabled_memory_is_unavailable() {
        let lookup = tokio_test::block_on(CaseMemory::disabled().find_similar("a", "b"));
        assert!(matches!(lookup, CaseLookup::Unavailable(_)));
        assert!(lookup.to_string().starts_with("No similar cases found"));
    }

    #[tokio::test]
    async fn nearest_case_wins() {
        let store = Arc::new(InMemoryCaseStore::new());
        let memory = learning_memory(store.clone());
        memory
            .record("invoice acme", "dear customer", SplitDecision::NewDocument, DecisionSource::Human)
            .await
            .unwrap();
        memory
            .record("zzz yyy", "xxx www", SplitDecision::SameDocument, DecisionSource::Agent)
            .await
            .unwrap();

        let lookup = memory.find_similar("invoice acme", "dear customer").await;
        let best = lookup.best().expect("match");
        assert_eq!(best.decision, SplitDecision::NewDocument);
        assert_eq!(best.source, DecisionSource::Human);
        assert!(best.score > 0.99);
        assert!(lookup.to_string().contains("'new_document'"));
    }

    #[tokio::test]
    async fn empty_store_is_no_match() {
        let memory = learning_memory(Arc::new(InMemoryCaseStore::new()));
        assert_eq!(memory.find_similar("a", "b").await, CaseLookup::NoMatch);
    }

    #[tokio::test]
    async fn embedder_down_degrades() {
        let memory = CaseMemory::new(Arc::new(DownEmbedder), Arc::new(InMemoryCaseStore::new()));
        match memory.find_similar("a", "b").await {
            CaseLookup::Unavailable(reason) => assert!(reason.contains("connection refused")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn record_is_noop_without_learning() {
        let store = Arc::new(InMemoryCaseStore::new());
        let memory = CaseMemory::new(Arc::new(LetterEmbedder), store.clone());
        memory
            .record("a", "b", SplitDecision::NewDocument, DecisionSource::Human)
            .await
            .unwrap();
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn jsonl_store_round_trip_and_skips_junk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cases.jsonl");
        let store = JsonlCaseStore::new(&path);

        assert!(store.all().await.unwrap().is_empty());

        let memory = CaseMemory::new(Arc::new(LetterEmbedder), Arc::new(store.clone())).learning(true);
        memory
            .record("page one", "page two", SplitDecision::SameDocument, DecisionSource::Human)
            .await
            .unwrap();

        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("not json\n");
        std::fs::write(&path, raw).unwrap();

        let records = store.all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, SplitDecision::SameDocument);
        assert!(records[0].fingerprint.starts_with("Current Page:\npage one"));
    }
}
