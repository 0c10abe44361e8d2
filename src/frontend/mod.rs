//! Presentation of workflow activity.
//!
//! The runner reports every message it appends, and the `{rtfm()}` function
//! reports every batch of retrieved snippets, to a [`Frontend`]. The frontend
//! also owns extract numbering: the base it returns from
//! [`Frontend::handle_rtfm_output`] is used verbatim in the rendered text, so
//! the numbers a user sees match the ones the model sees.

use std::sync::atomic::{AtomicU64, Ordering};

use owo_colors::OwoColorize;

use crate::interpolation::extract_numbers;
use crate::types::{Message, MessageRole, Snippet};

/// Receives messages and retrieval results as they happen.
pub trait Frontend: Send + Sync {
    /// Display retrieved snippets; returns the number of the first extract.
    fn handle_rtfm_output(&self, agent: &str, snippets: &[Snippet]) -> u64;

    /// Display a message just appended to `agent`'s transcript.
    fn handle_message(&self, agent: &str, message: &Message);
}

/// Hands out consecutive extract numbers starting at 1.
#[derive(Debug)]
pub struct ExtractCounter(AtomicU64);

impl Default for ExtractCounter {
    fn default() -> Self {
        Self(AtomicU64::new(1))
    }
}

impl ExtractCounter {
    /// Reserve `count` numbers, returning the first.
    pub fn reserve(&self, count: usize) -> u64 {
        self.0.fetch_add(count as u64, Ordering::SeqCst)
    }
}

/// Prints the conversation to the terminal.
#[derive(Debug)]
pub struct ConsoleFrontend {
    colored: bool,
    counter: ExtractCounter,
}

impl Default for ConsoleFrontend {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConsoleFrontend {
    pub fn new(colored: bool) -> Self {
        Self {
            colored,
            counter: ExtractCounter::default(),
        }
    }

    fn role_label(&self, role: MessageRole) -> String {
        let label = format!("{:<9}", role.as_str());
        if !self.colored {
            return label;
        }
        match role {
            MessageRole::System => label.magenta().bold().to_string(),
            MessageRole::User => label.green().bold().to_string(),
            MessageRole::Assistant => label.bright_cyan().bold().to_string(),
        }
    }
}

impl Frontend for ConsoleFrontend {
    fn handle_rtfm_output(&self, agent: &str, snippets: &[Snippet]) -> u64 {
        let base = self.counter.reserve(snippets.len());

        for (snippet, number) in snippets.iter().zip(extract_numbers(base)) {
            let heading = format!("[{}] Extract #{}", agent, number);
            let location = format!(
                "{} (pages {}-{}, offset {})",
                snippet.source, snippet.page_start, snippet.page_end, snippet.start_offset
            );
            if self.colored {
                println!("  {} {}", heading.yellow().bold(), location.dimmed());
            } else {
                println!("  {} {}", heading, location);
            }
        }

        base
    }

    fn handle_message(&self, agent: &str, message: &Message) {
        let agent_label = if self.colored {
            format!("[{}]", agent).dimmed().to_string()
        } else {
            format!("[{}]", agent)
        };
        println!("{} {}", agent_label, self.role_label(message.role));
        for line in message.text.lines() {
            println!("    {}", line);
        }
        println!();
    }
}

/// Discards output but keeps extract numbering consistent.
#[derive(Debug, Default)]
pub struct SilentFrontend {
    counter: ExtractCounter,
}

impl Frontend for SilentFrontend {
    fn handle_rtfm_output(&self, _agent: &str, snippets: &[Snippet]) -> u64 {
        self.counter.reserve(snippets.len())
    }

    fn handle_message(&self, _agent: &str, _message: &Message) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering_continues_across_calls() {
        let frontend = SilentFrontend::default();
        let two = vec![Snippet::new("a", "s", 0), Snippet::new("b", "s", 5)];
        assert_eq!(frontend.handle_rtfm_output("agent1", &two), 1);
        assert_eq!(frontend.handle_rtfm_output("agent1", &two), 3);
        assert_eq!(frontend.handle_rtfm_output("agent2", &[]), 5);
        assert_eq!(frontend.handle_rtfm_output("agent2", &two), 5);
    }

    #[test]
    fn test_console_output_no_panic() {
        let frontend = ConsoleFrontend::new(false);
        frontend.handle_message("agent1", &Message::system("Be brief.\nAnswer in English."));
        frontend.handle_message("agent1", &Message::assistant(""));
        let base = frontend.handle_rtfm_output("agent1", &[Snippet::new("x", "doc.txt", 0)]);
        assert_eq!(base, 1);

        let colored = ConsoleFrontend::new(true);
        colored.handle_message("agent1", &Message::user("hi"));
    }

    #[test]
    fn test_console_numbering_at_the_top_of_the_range() {
        let frontend = ConsoleFrontend {
            colored: false,
            counter: ExtractCounter(AtomicU64::new(u64::MAX)),
        };
        let snippets = vec![Snippet::new("a", "s", 0), Snippet::new("b", "s", 1)];
        assert_eq!(frontend.handle_rtfm_output("agent1", &snippets), u64::MAX);
    }
}
