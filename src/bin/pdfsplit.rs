//! CLI binary for edgequake-pdfsplit.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `SplitConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfsplit::{
    inspect, split, CollisionPolicy, OnBackendFailure, SplitConfig, SplitProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Page-walk progress bar with one log line per saved document.
///
/// No steady tick: the bar only redraws on events, so it never paints over
/// an operator prompt that is waiting for input.
struct CliProgressCallback {
    bar: ProgressBar,
    backend_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");

        Arc::new(Self {
            bar,
            backend_errors: AtomicUsize::new(0),
        })
    }
}

impl SplitProgressCallback for CliProgressCallback {
    fn on_split_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Splitting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Splitting {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_index: usize, _total: usize) {
        self.bar.set_position(page_index as u64);
        self.bar.set_message(format!("page {}", page_index + 1));
    }

    fn on_tool_call(&self, page_index: usize, tool_name: &str) {
        self.bar
            .set_message(format!("page {}: {}", page_index + 1, dim(tool_name)));
    }

    fn on_document_saved(&self, pages: &[usize], path: &Path) {
        let span = match (pages.first(), pages.last()) {
            (Some(first), Some(last)) if first != last => format!("pages {}-{}", first + 1, last + 1),
            (Some(only), _) => format!("page {}", only + 1),
            _ => String::new(),
        };
        self.bar.println(format!(
            "  {} {:<12}  {}",
            green("✓"),
            span,
            path.display()
        ));
    }

    fn on_backend_error(&self, page_index: usize, error: &str) {
        self.backend_errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}  {}",
            red("✗"),
            page_index + 1,
            red(&msg)
        ));
    }

    fn on_split_complete(&self, total_pages: usize, documents_saved: usize) {
        self.bar.finish_and_clear();
        let errors = self.backend_errors.load(Ordering::SeqCst);
        if errors == 0 {
            eprintln!(
                "{} {} pages split into {} documents",
                green("✔"),
                total_pages,
                bold(&documents_saved.to_string())
            );
        } else {
            eprintln!(
                "{} {} pages split into {} documents  ({} backend failures)",
                cyan("⚠"),
                total_pages,
                bold(&documents_saved.to_string()),
                red(&errors.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Split a scanned bundle into ./split_output
  pdfsplit scans.pdf

  # Custom output directory and model
  pdfsplit scans.pdf -o letters --model gpt-4.1 --provider openai

  # Use and grow a case memory of past decisions
  pdfsplit scans.pdf --case-memory cases.jsonl --learn

  # Ask the operator whenever the model is unreachable
  pdfsplit scans.pdf --on-backend-failure ask

  # Page count and first line of every page (no API key needed)
  pdfsplit --inspect-only scans.pdf

  # Machine-readable result
  pdfsplit --json scans.pdf > result.json

OUTPUT NAMES:
  {YYYYMMDD}-{Company}-{Title}.pdf, e.g. 20240312-DTAG-Rechnung_Maerz.pdf
  Missing fields become unknown_date / UnknownCompany / untitled.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter (overrides -v / -q)
"#;

/// Split scanned letter bundles into one PDF per letter.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsplit",
    version,
    about = "Split scanned letter bundles into one PDF per letter using a tool-calling LLM",
    long_about = "Walks a scanned PDF page by page. An LLM agent decides where each letter ends, \
optionally consulting a memory of past decisions or a human operator, and every letter is \
written as its own PDF named after its date, sender and subject.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Directory for the split documents.
    #[arg(short, long, env = "PDFSPLIT_OUTPUT_DIR", default_value = "split_output")]
    output_dir: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama."
    )]
    provider: Option<String>,

    /// JSONL file of past split decisions for similar-case lookup.
    #[arg(long, env = "PDFSPLIT_CASE_MEMORY")]
    case_memory: Option<PathBuf>,

    /// Append decisions made in this run to the case memory.
    #[arg(long, env = "PDFSPLIT_LEARN", requires = "case_memory")]
    learn: bool,

    /// What to do when the LLM stays unreachable for a page: skip, halt, ask.
    #[arg(long, env = "PDFSPLIT_ON_BACKEND_FAILURE", default_value = "skip")]
    on_backend_failure: OnBackendFailure,

    /// What to do when an output file exists: suffix, overwrite, fail.
    #[arg(long, env = "PDFSPLIT_COLLISION", default_value = "suffix")]
    collision: CollisionPolicy,

    /// Map a company name fragment to a short code, e.g. "telekom=DTAG". Repeatable.
    #[arg(long = "company-alias", value_name = "NEEDLE=CODE")]
    company_aliases: Vec<String>,

    /// Retries per agent turn on LLM failure.
    #[arg(long, env = "PDFSPLIT_MAX_RETRIES", default_value_t = 1)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDFSPLIT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Seconds to wait for an operator answer (default: wait forever).
    #[arg(long, env = "PDFSPLIT_HUMAN_TIMEOUT")]
    human_timeout: Option<u64>,

    /// Tool rounds allowed on one page before it is kept with the current letter.
    #[arg(long, env = "PDFSPLIT_MAX_TOOL_ROUNDS", default_value_t = 8)]
    max_tool_rounds: usize,

    /// Max LLM output tokens per turn.
    #[arg(long, env = "PDFSPLIT_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFSPLIT_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Path to a text file containing a custom instruction prompt.
    #[arg(long, env = "PDFSPLIT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Output structured JSON (SplitOutput) on stdout.
    #[arg(long, env = "PDFSPLIT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFSPLIT_NO_PROGRESS")]
    no_progress: bool,

    /// Print page count and a preview line per page, no splitting.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSPLIT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFSPLIT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let report = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );
        } else {
            println!("File:   {}", report.path.display());
            println!("Pages:  {}", report.total_pages);
            for page in &report.pages {
                println!(
                    "  {:>4}  {:>6} chars  {}",
                    page.index + 1,
                    page.chars,
                    page.first_line
                );
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<Arc<dyn SplitProgressCallback>> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn SplitProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run split ────────────────────────────────────────────────────────
    let output = split(&cli.input, &config).await.context("Split failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            for doc in &output.documents {
                eprintln!("{:?}  {}", doc.pages, doc.path.display());
            }
        }
        eprintln!(
            "   {} documents  {} agent turns  {} tool calls  {}ms  →  {}",
            output.stats.documents_saved,
            dim(&output.stats.agent_turns.to_string()),
            dim(&output.stats.tool_calls.to_string()),
            output.stats.duration_ms,
            bold(&config.output_dir.display().to_string()),
        );
        if output.stats.forced_saves > 0 {
            eprintln!(
                "   {} documents were closed without an agent decision",
                cyan(&output.stats.forced_saves.to_string())
            );
        }
    }

    Ok(())
}

/// Map CLI args to `SplitConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<Arc<dyn SplitProgressCallback>>,
) -> Result<SplitConfig> {
    let mut builder = SplitConfig::builder()
        .output_dir(&cli.output_dir)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .max_tool_rounds(cli.max_tool_rounds)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .learn(cli.learn)
        .on_backend_failure(cli.on_backend_failure)
        .collision_policy(cli.collision);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = cli.case_memory {
        builder = builder.case_memory_path(path);
    }
    if let Some(secs) = cli.human_timeout {
        builder = builder.human_timeout_secs(secs);
    }
    for alias in &cli.company_aliases {
        let (needle, code) = parse_alias(alias)?;
        builder = builder.company_alias(needle, code);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--company-alias NEEDLE=CODE`.
fn parse_alias(s: &str) -> Result<(&str, &str)> {
    let (needle, code) = s
        .split_once('=')
        .with_context(|| format!("Invalid company alias '{s}', expected NEEDLE=CODE"))?;
    let (needle, code) = (needle.trim(), code.trim());
    if needle.is_empty() || code.is_empty() {
        anyhow::bail!("Invalid company alias '{s}': needle and code must not be empty");
    }
    Ok((needle, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_pdfsplit::pipeline::normalize::{UNKNOWN_COMPANY, UNKNOWN_DATE, UNTITLED};

    #[test]
    fn help_names_the_real_sentinels() {
        let line = format!("{UNKNOWN_DATE} / {UNKNOWN_COMPANY} / {UNTITLED}");
        assert!(AFTER_HELP.contains(&line), "{line}");
    }

    #[test]
    fn alias_needs_both_sides() {
        assert_eq!(parse_alias(" deutsche telekom = DTAG ").unwrap(), ("deutsche telekom", "DTAG"));
        assert!(parse_alias("DTAG").is_err());
        assert!(parse_alias("=DTAG").is_err());
    }
}
