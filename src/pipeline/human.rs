//! Human-in-the-loop confirmation.
//!
//! Operator input arrives as lines on a channel. A single reader thread feeds
//! it for the whole run, so a question that times out leaves no blocked read
//! behind to swallow the answer to the next one. [`read_answer`] is generic
//! over the writer and tested with in-memory buffers; [`ConsoleConfirmation`]
//! binds it to stdin/stderr. stdout stays free for `--json` output.

use crate::error::ToolError;
use async_trait::async_trait;
use std::io::{BufRead, BufReader, Write};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

/// Operator input, one line per message, newline stripped.
pub type LineReceiver = mpsc::UnboundedReceiver<String>;

/// Asks an operator whether the next page starts a new document.
#[async_trait]
pub trait HumanConfirmation: Send + Sync {
    /// `true` for "yes, a new document starts".
    async fn confirm(&self, question: &str) -> Result<bool, ToolError>;
}

/// Accepts `yes`/`y`/`no`/`n`, any case, surrounding whitespace ignored.
pub fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}

/// Tool-result text for an operator answer.
pub fn feedback_text(new_document: bool) -> &'static str {
    if new_document {
        "Human feedback: 'yes', this is a new document."
    } else {
        "Human feedback: 'no', this is not a new document."
    }
}

/// Forward lines from a blocking reader to a channel on a dedicated thread.
///
/// The thread ends at end of input or once the receiver is dropped.
pub fn spawn_line_reader<R: BufRead + Send + 'static>(reader: R) -> LineReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("pdfsplit-operator-input".into())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Operator input failed: {}", e);
                        break;
                    }
                }
            }
        });
    // A failed spawn drops the sender, so the first question reports closed input.
    if let Err(e) = spawned {
        warn!("Could not start the operator input reader: {}", e);
    }
    rx
}

/// Print `question` and take lines from `lines` until one parses.
///
/// `timeout` bounds the whole exchange, re-prompts included. End of input is
/// an error: the caller must not loop forever on a closed stdin.
pub async fn read_answer<W: Write + Send>(
    question: &str,
    lines: &mut LineReceiver,
    writer: &mut W,
    timeout: Option<Duration>,
) -> Result<bool, ToolError> {
    let io_err = |e: std::io::Error| ToolError::HumanInput(e.to_string());
    let deadline = timeout.map(|limit| (tokio::time::Instant::now() + limit, limit));

    writeln!(writer, "\n--- HUMAN CONFIRMATION REQUIRED ---").map_err(io_err)?;
    writeln!(writer, "Agent asks: {question}").map_err(io_err)?;

    loop {
        write!(writer, "Is this the start of a new document? (yes/no): ").map_err(io_err)?;
        writer.flush().map_err(io_err)?;

        let next = match deadline {
            Some((at, limit)) => match tokio::time::timeout_at(at, lines.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!("No answer within {}s", limit.as_secs());
                    // The prompt line is still open.
                    let _ = writeln!(writer);
                    return Err(ToolError::HumanInput(format!(
                        "no answer within {}s",
                        limit.as_secs()
                    )));
                }
            },
            None => lines.recv().await,
        };

        let Some(line) = next else {
            return Err(ToolError::HumanInput("input closed before an answer".into()));
        };
        match parse_answer(&line) {
            Some(answer) => return Ok(answer),
            None => writeln!(writer, "Please answer 'yes' or 'no'.").map_err(io_err)?,
        }
    }
}

/// Prompts on the terminal: question to stderr, answer from stdin.
///
/// The stdin reader starts with the first question and serves every later one.
#[derive(Debug, Default)]
pub struct ConsoleConfirmation {
    lines: Mutex<Option<LineReceiver>>,
    timeout: Option<Duration>,
}

impl ConsoleConfirmation {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            lines: Mutex::new(None),
            timeout,
        }
    }

    /// Answer from `lines` instead of stdin.
    pub fn from_lines(lines: LineReceiver, timeout: Option<Duration>) -> Self {
        Self {
            lines: Mutex::new(Some(lines)),
            timeout,
        }
    }
}

#[async_trait]
impl HumanConfirmation for ConsoleConfirmation {
    async fn confirm(&self, question: &str) -> Result<bool, ToolError> {
        let mut guard = self.lines.lock().await;
        let lines =
            guard.get_or_insert_with(|| spawn_line_reader(BufReader::new(std::io::stdin())));

        // Late answers to an expired question must not answer this one.
        while lines.try_recv().is_ok() {}

        read_answer(question, lines, &mut std::io::stderr(), self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn queued(input: &[&str]) -> LineReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        for line in input {
            tx.send(line.to_string()).unwrap();
        }
        rx
    }

    #[test]
    fn answers_parse_case_insensitively() {
        assert_eq!(parse_answer("YES"), Some(true));
        assert_eq!(parse_answer(" y \n"), Some(true));
        assert_eq!(parse_answer("No"), Some(false));
        assert_eq!(parse_answer("n"), Some(false));
        assert_eq!(parse_answer("maybe"), None);
        assert_eq!(parse_answer(""), None);
    }

    #[tokio::test]
    async fn reprompts_until_valid() {
        let mut lines = queued(&["maybe", "", "NO"]);
        let mut out = Vec::new();
        let answer = read_answer("Is page 3 new?", &mut lines, &mut out, None)
            .await
            .unwrap();
        assert!(!answer);

        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("Agent asks: Is page 3 new?"));
        assert_eq!(shown.matches("(yes/no)").count(), 3);
        assert_eq!(shown.matches("Please answer").count(), 2);
    }

    #[tokio::test]
    async fn closed_input_is_an_error() {
        let mut lines = queued(&["what"]);
        let err = read_answer("q", &mut lines, &mut Vec::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::HumanInput(_)));
    }

    #[tokio::test]
    async fn reader_thread_forwards_lines_until_eof() {
        let mut lines = spawn_line_reader(Cursor::new("y\nn\n"));
        assert_eq!(lines.recv().await.as_deref(), Some("y"));
        assert_eq!(lines.recv().await.as_deref(), Some("n"));
        assert_eq!(lines.recv().await, None);
    }

    #[tokio::test]
    async fn answer_after_timeout_goes_to_the_next_question_only() {
        let (tx, rx) = mpsc::unbounded_channel();
        let console = ConsoleConfirmation::from_lines(rx, Some(Duration::from_millis(300)));

        let err = console.confirm("Is page 2 new?").await.unwrap_err();
        assert!(err.to_string().contains("no answer within"));

        // Typed too late for the first question.
        tx.send("yes".to_string()).unwrap();
        let typed = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            typed.send("no".to_string()).unwrap();
        });

        assert!(!console.confirm("Is page 5 new?").await.unwrap());
        drop(tx);
    }

    #[test]
    fn feedback_wording() {
        assert!(feedback_text(true).contains("is a new document"));
        assert!(feedback_text(false).contains("not a new document"));
    }
}
