//! Prompts for the splitting agent and the metadata extraction call.
//!
//! Every model-facing text lives here so wording changes never touch the
//! retry or state-machine code, and tests can inspect the rendered prompts
//! directly.
//!
//! Callers can override the instruction block via
//! [`crate::config::SplitConfig::system_prompt`]; the placeholders listed on
//! [`render_instructions`] are substituted either way.

use crate::split::SplitState;

/// First user message of every run.
pub const KICKOFF_MESSAGE: &str =
    "Start processing the PDF. Split it into one document per letter.";

/// Default instruction block, re-rendered from the controller state on every turn.
pub const DEFAULT_INSTRUCTIONS: &str = r#"You split a scanned PDF that contains many business letters into one document per letter. Work page by page and follow the workflow below exactly.

### STATE
- Total pages in the PDF: {total_pages}
- You are deciding about pages {current_page_index} and {next_page_index} (0-based).
- Pages collected for the current document: {current_document_pages}

### WORKFLOW
1. Call `read_consecutive_pages` with the current page index to get the text of the current and the next page.
2. Compare the two pages: sender, letterhead, date, subject line, salutation, page numbering ("Seite 2 von 3"), closing formula.
3. If the collected pages hold a single entry, you are on the first page of a letter: call `extract_metadata` for the current and next page now and keep the result for this letter.
4. Decide whether the next page starts a new letter, then act as described below. Act through tool calls, do not describe what you would do.

### DECISIONS
- Clearly a new letter on the next page: call `save_document` with the collected pages and the metadata you extracted on the first page of this letter. Do not extract metadata again at this point, the next page already belongs to another letter. Make the call, do not announce it.
- Clearly the same letter: call no tool. Reply with one short sentence of rationale.
- Unsure: call `search_for_similar_cases`; if still unsure, call `ask_human_for_confirmation`.

### FINAL PAGE
When the next page is '--- End of Document ---' you must call `save_document` for the collected pages.
"#;

/// System prompt for the separate metadata extraction call.
pub const METADATA_EXTRACTION_PROMPT: &str = r#"You read the first page of a business letter and report its metadata.

Answer with a single JSON object and nothing else:
{"date": "<letter date as printed>", "company": "<sending company>", "title": "<subject of the letter>"}

Rules:
- date: the date the letter was written, not a due date or a period. Copy it as printed.
- company: the organisation that sent the letter, not the recipient.
- title: the subject line if there is one, otherwise a short description (at most six words).
- Use null for anything that is not on the page. Do not guess.
- No markdown fences, no commentary."#;

/// Substitute the state placeholders into `template`.
///
/// Placeholders: `{total_pages}`, `{current_page_index}`, `{next_page_index}`,
/// `{current_document_pages}`.
pub fn render_instructions(template: &str, state: &SplitState) -> String {
    template
        .replace("{total_pages}", &state.total_pages.to_string())
        .replace("{current_page_index}", &state.cursor.to_string())
        .replace("{next_page_index}", &(state.cursor + 1).to_string())
        .replace("{current_document_pages}", &format!("{:?}", state.buffer))
}

/// User message for the metadata extraction call.
pub fn metadata_request(current_page_text: &str, next_page_text: &str) -> String {
    format!(
        "Current Page:\n{}\n\nNext Page:\n{}",
        current_page_text, next_page_text
    )
}

/// Question used when the backend failed and the policy asks the operator.
pub fn backend_failure_question(cursor: usize) -> String {
    format!(
        "The reasoning backend failed while comparing pages {} and {}. \
         Does page {} start a new document?",
        cursor + 1,
        cursor + 2,
        cursor + 2
    )
}
