use async_trait::async_trait;

use crate::types::{AppError, Result, Snippet};

/// Similarity search over document snippets.
#[async_trait]
pub trait SnippetDatabase: Send + Sync {
    /// Up to `limit` snippets nearest to `query`, best first, with
    /// overlapping or adjacent snippets of the same source merged.
    async fn find_nearest_merged(&self, query: &str, limit: usize) -> Result<Vec<Snippet>>;
}

/// Stand-in used when no snippet index is available.
#[derive(Debug, Default)]
pub struct DisabledSnippetDatabase;

#[async_trait]
impl SnippetDatabase for DisabledSnippetDatabase {
    async fn find_nearest_merged(&self, _query: &str, _limit: usize) -> Result<Vec<Snippet>> {
        Err(AppError::Retrieval(
            "No snippet index is configured".to_string(),
        ))
    }
}

fn touches(a: &Snippet, b: &Snippet) -> bool {
    a.source == b.source && a.start_offset <= b.end_offset() && b.start_offset <= a.end_offset()
}

/// Union of two touching snippets of the same source.
fn join(a: &Snippet, b: &Snippet) -> Snippet {
    let (first, second) = if a.start_offset <= b.start_offset {
        (a, b)
    } else {
        (b, a)
    };

    let text = if second.end_offset() <= first.end_offset() {
        first.text.clone()
    } else {
        let shared = first.end_offset() - second.start_offset;
        match second.text.get(shared..) {
            Some(rest) => format!("{}{}", first.text, rest),
            None => format!("{}{}", first.text, second.text),
        }
    };

    Snippet {
        source: first.source.clone(),
        start_offset: first.start_offset,
        page_start: first.page_start.min(second.page_start),
        page_end: first.page_end.max(second.page_end),
        text,
    }
}

/// Merge overlapping or adjacent snippets of the same source.
///
/// Each merged snippet takes the rank of its best-ranked part.
pub fn merge_snippets(snippets: Vec<Snippet>) -> Vec<Snippet> {
    let mut merged: Vec<Snippet> = Vec::with_capacity(snippets.len());

    for snippet in snippets {
        let Some(mut target) = merged.iter().position(|kept| touches(kept, &snippet)) else {
            merged.push(snippet);
            continue;
        };
        merged[target] = join(&merged[target], &snippet);

        // The grown snippet may now reach others.
        let mut other = 0;
        while other < merged.len() {
            if other != target && touches(&merged[target], &merged[other]) {
                let (keep, drop) = if other < target {
                    (other, target)
                } else {
                    (target, other)
                };
                let absorbed = merged.remove(drop);
                merged[keep] = join(&merged[keep], &absorbed);
                target = keep;
                other = 0;
                continue;
            }
            other += 1;
        }
    }

    merged
}
