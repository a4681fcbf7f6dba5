use owo_colors::OwoColorize;
use std::fmt;

use crate::token::Token;

/// Which stage of the pipeline produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lexical,
    Syntax,
    Runtime,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lexical => write!(f, "lexical"),
            Phase::Syntax => write!(f, "syntax"),
            Phase::Runtime => write!(f, "runtime"),
        }
    }
}

/// Where on the reported line the problem sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Lexical errors carry no token.
    Unknown,
    /// The end-of-input token.
    End,
    /// A concrete token, identified by its lexeme.
    Lexeme(String),
}

impl Location {
    pub fn of(token: &Token) -> Self {
        if token.is_eof() {
            Location::End
        } else {
            Location::Lexeme(token.lexeme.clone())
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Unknown => Ok(()),
            Location::End => write!(f, " at end"),
            Location::Lexeme(lexeme) => write!(f, " at '{}'", lexeme),
        }
    }
}

/// A single reported problem with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub phase: Phase,
    pub line: usize,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn lexical(line: usize, message: impl Into<String>) -> Self {
        Self {
            phase: Phase::Lexical,
            line,
            location: Location::Unknown,
            message: message.into(),
        }
    }

    pub fn syntax(token: &Token, message: impl Into<String>) -> Self {
        Self {
            phase: Phase::Syntax,
            line: token.line,
            location: Location::of(token),
            message: message.into(),
        }
    }

    pub fn runtime(line: usize, message: impl Into<String>) -> Self {
        Self {
            phase: Phase::Runtime,
            line,
            location: Location::Unknown,
            message: message.into(),
        }
    }

    pub fn is_runtime(&self) -> bool {
        self.phase == Phase::Runtime
    }

    fn render(&self, use_color: bool) -> String {
        match (self.phase, use_color) {
            (Phase::Runtime, false) => format!("{}\n[line {}]", self.message, self.line),
            (Phase::Runtime, true) => format!(
                "{}\n{}",
                self.message.red().bold(),
                format!("[line {}]", self.line).dimmed()
            ),
            (_, false) => format!("[line {}] Error{}: {}", self.line, self.location, self.message),
            (_, true) => format!(
                "{} {}{}: {}",
                format!("[line {}]", self.line).dimmed(),
                "Error".red().bold(),
                self.location,
                self.message.bold()
            ),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// Per-session execution context: collects diagnostics and tracks whether the
/// current run hit a static (lexical/syntax) or runtime error.
#[derive(Debug, Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
    had_error: bool,
    had_runtime_error: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(phase = %diagnostic.phase, line = diagnostic.line, "{}", diagnostic.message);
        if diagnostic.is_runtime() {
            self.had_runtime_error = true;
        } else {
            self.had_error = true;
        }
        self.diagnostics.push(diagnostic);
    }

    /// True if a lexical or syntax error was reported since the last reset.
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Clears flags and pending diagnostics; the REPL calls this between lines.
    pub fn reset(&mut self) {
        self.diagnostics.clear();
        self.had_error = false;
        self.had_runtime_error = false;
    }
}

/// Maps byte offsets to 1-based line numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let newlines = source
            .char_indices()
            .filter(|(_, ch)| *ch == '\n')
            .map(|(offset, _)| offset)
            .collect();
        Self { newlines }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&newline| newline < offset) + 1
    }

    /// Line number of the end of input.
    pub fn last_line(&self) -> usize {
        self.newlines.len() + 1
    }
}

/// Render diagnostics one per line, in the order they were reported.
pub fn render_diagnostics(diagnostics: &[Diagnostic], use_color: bool) -> String {
    let mut output = String::new();
    for diagnostic in diagnostics {
        output.push_str(&diagnostic.render(use_color));
        output.push('\n');
    }
    output
}
