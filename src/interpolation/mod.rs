//! Template Interpolation
//!
//! Message templates may embed function calls such as `{python()}` or
//! `{rtfm()}`. Templates are parsed once, when the workflow is loaded, and
//! rendered every time their action runs.
//!
//! # Functions
//!
//! | Placeholder | Block tag | Backend |
//! |-------------|-----------|---------|
//! | `{python()}` | `python` | [`ScriptExecutor`](crate::tools::ScriptExecutor) |
//! | `{rtfm()}` | `rtfm` | [`SnippetDatabase`](crate::rag::SnippetDatabase) |
//!
//! Both functions read the most recent assistant message, pull the tagged
//! block out of it with [`extractor::extract_block`] and hand the body to
//! their backend. Anything wrong with the model's text (missing block,
//! unterminated block, nothing retrieved, failing script) becomes
//! corrective text in the rendered message. Only backend failures are
//! returned as errors.
//!
//! # Example
//!
//! ```ignore
//! let template = Template::parse("The Python output is:\n\n{python()}")?;
//! let text = interpolator
//!     .render(&template, &RenderContext { agent: "agent1", last_reply: Some(reply) })
//!     .await?;
//! ```

pub mod extractor;
pub mod rtfm;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::frontend::Frontend;
use crate::rag::SnippetDatabase;
use crate::tools::{ScriptExecutor, ScriptOutcome};
use crate::types::Result;
use extractor::{extract_block, Extraction};

pub use extractor::FENCE_MARKERS;
pub use rtfm::{extract_numbers, format_extracts};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\(\)\}").expect("placeholder pattern is valid")
});

/// Leading sentence of every corrective message about a missing Python block.
pub const NO_PYTHON_BLOCK: &str = "Your message did not contain a Python code block.";
/// Leading sentence of every corrective message about a missing rtfm block.
pub const NO_RTFM_BLOCK: &str = "Your message did not contain an rtfm block.";
/// Substituted when the snippet database returns nothing.
pub const NO_EXTRACTS_FOUND: &str =
    "No extracts matched your query. Try rephrasing it with different keywords.";

const PYTHON_HINT: &str = "To run code, put it between a line containing only `$$$python` \
                           and a line containing only `$$$`.";
const RTFM_HINT: &str = "To search the documentation, put your query between a line \
                         containing only `$$$rtfm` and a line containing only `$$$`.";

/// Functions callable from a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Python,
    Rtfm,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "python" => Some(Function::Python),
            "rtfm" => Some(Function::Rtfm),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Python => "python",
            Function::Rtfm => "rtfm",
        }
    }

    /// Tag of the fenced block the function reads.
    pub fn block_tag(&self) -> &'static str {
        self.name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Call(Function),
}

/// A parsed message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

/// A `{name()}` placeholder naming no known function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown template function `{0}()`")]
pub struct UnknownFunction(pub String);

impl Template {
    /// Split `source` into literal text and function calls.
    ///
    /// Braces that do not form a `{name()}` call are kept as text.
    pub fn parse(source: &str) -> std::result::Result<Self, UnknownFunction> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(source) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let function = Function::from_name(name.as_str())
                .ok_or_else(|| UnknownFunction(name.as_str().to_string()))?;

            if whole.start() > last {
                segments.push(Segment::Text(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Call(function));
            last = whole.end();
        }

        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether rendering reads the latest assistant message.
    pub fn has_calls(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Call(_)))
    }
}

/// Per-render inputs.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Name of the agent whose message is being rendered.
    pub agent: &'a str,
    /// Text of the most recent assistant message, if any.
    pub last_reply: Option<&'a str>,
}

/// Resolves template function calls against the retrieval and execution backends.
#[derive(Clone)]
pub struct Interpolator {
    snippets: Arc<dyn SnippetDatabase>,
    executor: Arc<dyn ScriptExecutor>,
    frontend: Arc<dyn Frontend>,
    top_k: usize,
}

impl Interpolator {
    pub fn new(
        snippets: Arc<dyn SnippetDatabase>,
        executor: Arc<dyn ScriptExecutor>,
        frontend: Arc<dyn Frontend>,
    ) -> Self {
        Self {
            snippets,
            executor,
            frontend,
            top_k: 5,
        }
    }

    /// Number of snippets requested per `{rtfm()}` call.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Render a template, resolving calls left to right.
    pub async fn render(&self, template: &Template, ctx: &RenderContext<'_>) -> Result<String> {
        let mut out = String::with_capacity(template.source.len());

        for segment in &template.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Call(function) => {
                    let value = self.call(*function, ctx).await?;
                    out.push_str(&value);
                }
            }
        }

        Ok(out)
    }

    async fn call(&self, function: Function, ctx: &RenderContext<'_>) -> Result<String> {
        let reply = ctx.last_reply.unwrap_or_default();
        let extraction = extract_block(reply, function.block_tag());

        let body = match extraction {
            Extraction::Found(body) => body,
            failure => {
                warn!(
                    agent = ctx.agent,
                    function = function.name(),
                    ?failure,
                    "Model reply has no usable block"
                );
                return Ok(block_failure_text(function, &failure));
            }
        };

        match function {
            Function::Python => self.python(ctx, &body).await,
            Function::Rtfm => self.rtfm(ctx, &body).await,
        }
    }

    async fn python(&self, ctx: &RenderContext<'_>, source: &str) -> Result<String> {
        debug!(agent = ctx.agent, bytes = source.len(), "Executing Python block");
        let outcome = self.executor.execute(source).await?;
        if !outcome.is_success() {
            warn!(agent = ctx.agent, ?outcome, "Python block did not complete");
        }
        Ok(outcome_text(&outcome))
    }

    async fn rtfm(&self, ctx: &RenderContext<'_>, query: &str) -> Result<String> {
        debug!(agent = ctx.agent, query, "Querying snippet database");
        let snippets = self
            .snippets
            .find_nearest_merged(query, self.top_k)
            .await?;

        if snippets.is_empty() {
            warn!(agent = ctx.agent, query, "No extracts retrieved");
            return Ok(NO_EXTRACTS_FOUND.to_string());
        }

        let base = self.frontend.handle_rtfm_output(ctx.agent, &snippets);
        Ok(format_extracts(&snippets, base))
    }
}

/// Corrective text for a reply without a usable block.
pub fn block_failure_text(function: Function, failure: &Extraction) -> String {
    let (lead, hint) = match function {
        Function::Python => (NO_PYTHON_BLOCK, PYTHON_HINT),
        Function::Rtfm => (NO_RTFM_BLOCK, RTFM_HINT),
    };

    match failure {
        Extraction::UnterminatedBlock => format!(
            "{} A line opening a `{}` block was found, but no closing `$$$` line followed it. {}",
            lead,
            function.block_tag(),
            hint
        ),
        _ => format!("{} {}", lead, hint),
    }
}

/// Text substituted for `{python()}` once the script has run.
pub fn outcome_text(outcome: &ScriptOutcome) -> String {
    match outcome {
        ScriptOutcome::Completed { stdout } => {
            let stdout = stdout.trim_end();
            if stdout.is_empty() {
                "(no output)".to_string()
            } else {
                stdout.to_string()
            }
        }
        ScriptOutcome::Failed {
            stdout,
            stderr,
            exit_code,
        } => {
            let mut text = match exit_code {
                Some(code) => format!("Your code failed with exit status {}.", code),
                None => "Your code was terminated before it finished.".to_string(),
            };
            append_section(&mut text, "Standard output", stdout);
            append_section(&mut text, "Error output", stderr);
            text
        }
        ScriptOutcome::TimedOut {
            stdout,
            timeout_secs,
        } => {
            let mut text = format!(
                "Your code did not finish within {} seconds and was stopped.",
                timeout_secs
            );
            append_section(&mut text, "Standard output", stdout);
            text
        }
    }
}

fn append_section(text: &mut String, title: &str, body: &str) {
    let body = body.trim_end();
    if !body.trim().is_empty() {
        text.push_str(&format!("\n\n{}:\n{}", title, body));
    }
}
