use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::Stmt;
use crate::config::InterpreterConfig;
use crate::diagnostic::{render_diagnostics, Diagnostic, Reporter};
use crate::interpreter::{Interpreter, Parser};
use crate::lexer::scan_tokens;

pub const EXIT_OK: i32 = 0;
/// Command line usage error.
pub const EXIT_USAGE: i32 = 64;
/// The program had lexical or syntax errors.
pub const EXIT_DATA_ERROR: i32 = 65;
/// The script file could not be read.
pub const EXIT_NO_INPUT: i32 = 66;
/// The program failed at runtime.
pub const EXIT_SOFTWARE: i32 = 70;

/// How a single run of source text ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    SyntaxError,
    RuntimeError,
}

impl RunStatus {
    pub fn is_ok(self) -> bool {
        self == RunStatus::Ok
    }

    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Ok => EXIT_OK,
            RunStatus::SyntaxError => EXIT_DATA_ERROR,
            RunStatus::RuntimeError => EXIT_SOFTWARE,
        }
    }
}

/// An interpreter plus the diagnostics of the current run. Globals persist
/// between runs; diagnostics and error flags persist until [`Lox::reset`].
pub struct Lox {
    interpreter: Interpreter,
    reporter: Reporter,
}

impl Lox {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Self::with_output(Box::new(io::stdout()), config)
    }

    pub fn with_output(out: Box<dyn Write>, config: InterpreterConfig) -> Self {
        Self {
            interpreter: Interpreter::with_output(out, config),
            reporter: Reporter::new(),
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Lex and parse `source`. Returns `None` if any lexical or syntax error
    /// was reported, in which case nothing should be executed.
    pub fn parse(&mut self, source: &str) -> Option<Vec<Stmt>> {
        let tokens = scan_tokens(source, &mut self.reporter);
        let result = Parser::new(tokens).parse();
        for error in &result.errors {
            self.reporter.report(error.to_diagnostic());
        }

        if self.reporter.had_error() {
            None
        } else {
            Some(result.statements)
        }
    }

    pub fn execute(&mut self, statements: &[Stmt]) -> RunStatus {
        match self.interpreter.interpret(statements) {
            Ok(()) => RunStatus::Ok,
            Err(error) => {
                self.reporter.report(error.to_diagnostic());
                RunStatus::RuntimeError
            }
        }
    }

    /// Lex, parse and execute `source`.
    pub fn run(&mut self, source: &str) -> RunStatus {
        match self.parse(source) {
            Some(statements) => self.execute(&statements),
            None => RunStatus::SyntaxError,
        }
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.reporter.take_diagnostics()
    }

    /// Forget errors from earlier runs; the REPL calls this between lines.
    pub fn reset(&mut self) {
        self.reporter.reset();
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

/// A cloneable in-memory writer, used to capture `print` output.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer(Rc<RefCell<Vec<u8>>>);

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Everything observable about one run of a program.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub output: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunOutcome {
    /// Diagnostics rendered exactly as the command line tool prints them.
    pub fn rendered_errors(&self) -> String {
        render_diagnostics(&self.diagnostics, false)
    }
}

/// Run `source` in a fresh session with captured output.
pub fn run_source(source: &str) -> RunOutcome {
    run_source_with(source, InterpreterConfig::default())
}

pub fn run_source_with(source: &str, config: InterpreterConfig) -> RunOutcome {
    let buffer = CaptureBuffer::new();
    let mut lox = Lox::with_output(Box::new(buffer.clone()), config);
    let status = lox.run(source);
    RunOutcome {
        status,
        output: buffer.contents(),
        diagnostics: lox.take_diagnostics(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Ok.exit_code(), 0);
        assert_eq!(RunStatus::SyntaxError.exit_code(), 65);
        assert_eq!(RunStatus::RuntimeError.exit_code(), 70);
    }

    #[test]
    fn test_run_captures_output() {
        let outcome = run_source("print \"hello\";");
        assert_eq!(outcome.status, RunStatus::Ok);
        assert_eq!(outcome.output, "hello\n");
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_syntax_error_prevents_execution() {
        let outcome = run_source("print 1; print ;");
        assert_eq!(outcome.status, RunStatus::SyntaxError);
        assert_eq!(outcome.output, "");
        assert_eq!(
            outcome.rendered_errors(),
            "[line 1] Error at ';': Expect expression.\n"
        );
    }

    #[test]
    fn test_lexical_error_prevents_execution() {
        let outcome = run_source("print 1;\n@");
        assert_eq!(outcome.status, RunStatus::SyntaxError);
        assert_eq!(outcome.output, "");
        assert_eq!(outcome.rendered_errors(), "[line 2] Error: Unexpected character.\n");
    }

    #[test]
    fn test_runtime_error_keeps_earlier_output() {
        let outcome = run_source("print 1;\nprint -\"x\";\nprint 2;");
        assert_eq!(outcome.status, RunStatus::RuntimeError);
        assert_eq!(outcome.output, "1\n");
        assert_eq!(outcome.rendered_errors(), "Operand must be a number.\n[line 2]\n");
    }

    #[test]
    fn test_session_keeps_globals_across_runs() {
        let buffer = CaptureBuffer::new();
        let mut lox = Lox::with_output(Box::new(buffer.clone()), InterpreterConfig::default());

        assert_eq!(lox.run("var a = 1;"), RunStatus::Ok);
        assert_eq!(lox.run("print undefined;"), RunStatus::RuntimeError);
        assert!(lox.reporter().had_runtime_error());
        lox.reset();

        assert_eq!(lox.run("print a;"), RunStatus::Ok);
        assert!(!lox.reporter().had_runtime_error());
        assert_eq!(buffer.contents(), "1\n");
    }
}
