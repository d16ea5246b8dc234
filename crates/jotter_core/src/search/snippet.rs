//! Substring search over note snippets.
//!
//! # Responsibility
//! - Find notes whose preview snippet contains the query text.
//! - Shape snippets for single-line display.
//!
//! # Invariants
//! - Only notes outside the trash are returned; folders never are.
//! - Matching is case-insensitive for ASCII, wildcards in the query are literal.
//! - Results are ordered by `modified_date DESC, id ASC`.

use crate::model::container::{ContainerId, ContainerKind, TRASH_FOLDER_ID};
use crate::store::filter::{ContainerFilter, ContainerOrder};
use crate::store::{RecordStore, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;

static LINE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\r\n]+").expect("valid line break regex"));
static CHECK_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[√□]").expect("valid check marker regex"));

/// Snippet search options.
#[derive(Debug, Clone)]
pub struct SnippetQuery {
    pub text: String,
    /// Maximum number of hits to return.
    pub limit: usize,
}

impl SnippetQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: 50,
        }
    }
}

/// Single search hit returned by [`search_snippets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetHit {
    pub note_id: ContainerId,
    /// Snippet with line breaks removed.
    pub snippet: String,
}

/// Returns an empty list for blank queries.
pub fn search_snippets(store: &RecordStore, query: &SnippetQuery) -> StoreResult<Vec<SnippetHit>> {
    let needle = query.text.trim();
    if needle.is_empty() || query.limit == 0 {
        return Ok(Vec::new());
    }

    let notes = store.query_containers(
        &ContainerFilter::all()
            .with_kind(ContainerKind::Note)
            .excluding_parent(TRASH_FOLDER_ID)
            .with_snippet_containing(needle),
        ContainerOrder::ModifiedDesc,
    )?;
    Ok(notes
        .into_iter()
        .take(query.limit)
        .map(|note| SnippetHit {
            note_id: note.id,
            snippet: LINE_BREAK_RE.replace_all(&note.snippet, "").into_owned(),
        })
        .collect())
}

/// First line of `snippet` without check-list markers, trimmed.
pub fn format_snippet(snippet: &str) -> String {
    let stripped = CHECK_MARKER_RE.replace_all(snippet, "");
    let trimmed = stripped.trim();
    trimmed
        .split('\n')
        .next()
        .unwrap_or_default()
        .trim_end_matches('\r')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::format_snippet;

    #[test]
    fn format_snippet_strips_markers_and_keeps_first_line() {
        assert_eq!(format_snippet("√ milk\n□ eggs"), "milk");
        assert_eq!(format_snippet("  plain text  "), "plain text");
        assert_eq!(format_snippet(""), "");
    }
}
