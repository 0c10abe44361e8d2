//! Rendering of retrieved extracts for the model.

use crate::types::Snippet;

/// Line placed between two consecutive extracts.
pub const EXTRACT_SEPARATOR: &str = "-----";

/// Render snippets as numbered extracts, starting at `base`.
///
/// Snippets keep the order the database returned them in.
pub fn format_extracts(snippets: &[Snippet], base: u64) -> String {
    snippets
        .iter()
        .zip(extract_numbers(base))
        .map(|(snippet, number)| format!("Extract #{}:\n\n{}", number, snippet.text))
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n", EXTRACT_SEPARATOR))
}

/// Extract numbers counting up from `base`, pinned at `u64::MAX`.
pub fn extract_numbers(base: u64) -> impl Iterator<Item = u64> {
    (0u64..).map(move |offset| base.saturating_add(offset))
}
