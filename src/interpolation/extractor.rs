//! Fenced block scanner.
//!
//! Models are asked to wrap code and queries in blocks such as
//!
//! ```text
//! $$$python
//! print("hi")
//! $$$
//! ```
//!
//! The scanner never fails hard: whatever the model wrote, the caller gets an
//! [`Extraction`] it can turn into either a result or corrective text.

/// Fence markers accepted on opening and closing lines.
pub const FENCE_MARKERS: [&str; 2] = ["$$$", "```"];

/// Outcome of looking for a tagged block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Body of the first block with the requested tag.
    Found(String),
    /// No opening line carries the requested tag.
    NoBlockFound,
    /// An opening line exists but the input ends before its closing line.
    UnterminatedBlock,
}

impl Extraction {
    pub fn found(&self) -> Option<&str> {
        match self {
            Extraction::Found(body) => Some(body),
            _ => None,
        }
    }
}

fn opening_marker(line: &str, tag: &str) -> Option<&'static str> {
    let line = line.trim();
    FENCE_MARKERS
        .iter()
        .find(|marker| line.strip_prefix(**marker).is_some_and(|rest| rest == tag))
        .copied()
}

/// Find the first block opened by a marker immediately followed by `tag`.
pub fn extract_block(text: &str, tag: &str) -> Extraction {
    let mut lines = text.lines();

    let marker = loop {
        match lines.next() {
            Some(line) => {
                if let Some(marker) = opening_marker(line, tag) {
                    break marker;
                }
            }
            None => return Extraction::NoBlockFound,
        }
    };

    let mut body = Vec::new();
    for line in lines {
        if line.trim() == marker {
            return Extraction::Found(body.join("\n"));
        }
        body.push(line);
    }

    Extraction::UnterminatedBlock
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_finds_python_block() {
        let text = "Let's execute some Python.\n\n$$$python\nprint(f\"Hello, world! 1+1={1+1}\")\n$$$\n\nHow does that look?";
        assert_eq!(
            extract_block(text, "python"),
            Extraction::Found("print(f\"Hello, world! 1+1={1+1}\")".to_string())
        );
    }

    #[test]
    fn test_multiline_body_is_preserved() {
        let text = "$$$python\nfor i in range(2):\n    print(i)\n$$$";
        assert_eq!(
            extract_block(text, "python").found(),
            Some("for i in range(2):\n    print(i)")
        );
    }

    #[test]
    fn test_first_block_wins() {
        let text = "$$$rtfm\nfirst\n$$$\n$$$rtfm\nsecond\n$$$";
        assert_eq!(extract_block(text, "rtfm").found(), Some("first"));
    }

    #[test]
    fn test_other_tags_are_ignored() {
        let text = "$$$rtfm\nquery\n$$$";
        assert_eq!(extract_block(text, "python"), Extraction::NoBlockFound);
    }

    #[test]
    fn test_unterminated_block() {
        let text = "Let's execute some Python.\n\n$$$python\nprint(\"foo\")\n\nHow does that look?";
        assert_eq!(extract_block(text, "python"), Extraction::UnterminatedBlock);
    }

    #[test]
    fn test_backtick_fence_must_close_with_backticks() {
        let text = "```python\nprint(1)\n$$$";
        assert_eq!(extract_block(text, "python"), Extraction::UnterminatedBlock);

        let text = "```python\nprint(1)\n```";
        assert_eq!(extract_block(text, "python").found(), Some("print(1)"));
    }

    #[rstest]
    #[case("", Extraction::NoBlockFound)]
    #[case("no fences at all", Extraction::NoBlockFound)]
    #[case("$$$python3\nx\n$$$", Extraction::NoBlockFound)]
    #[case("text $$$python\nx\n$$$", Extraction::NoBlockFound)]
    #[case("  $$$python  \nx\n  $$$ ", Extraction::Found("x".to_string()))]
    #[case("$$$python\n$$$", Extraction::Found(String::new()))]
    #[case("$$$python", Extraction::UnterminatedBlock)]
    #[case("$$$python\r\nprint(1)\r\n$$$\r\n", Extraction::Found("print(1)".to_string()))]
    fn test_lenient_scanning(#[case] text: &str, #[case] expected: Extraction) {
        assert_eq!(extract_block(text, "python"), expected);
    }
}
