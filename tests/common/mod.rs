#![allow(dead_code)]

use lox::config::InterpreterConfig;
use lox::session::{run_source, run_source_with, RunOutcome};
use lox::RunStatus;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn run(source: &str) -> RunOutcome {
    run_source(source)
}

pub fn run_with_depth(source: &str, max_call_depth: usize) -> RunOutcome {
    run_source_with(source, InterpreterConfig { max_call_depth })
}

/// Printed output of a program that must succeed.
pub fn output(source: &str) -> String {
    let outcome = run(source);
    assert_eq!(
        outcome.status,
        RunStatus::Ok,
        "program failed:\n{}",
        outcome.rendered_errors()
    );
    outcome.output
}

/// Printed lines of a program that must succeed.
pub fn lines(source: &str) -> Vec<String> {
    output(source).lines().map(str::to_string).collect()
}

/// Message of the runtime error a program must raise.
pub fn runtime_error(source: &str) -> String {
    let outcome = run(source);
    assert_eq!(outcome.status, RunStatus::RuntimeError, "output: {}", outcome.output);
    assert_eq!(outcome.diagnostics.len(), 1);
    outcome.diagnostics[0].message.clone()
}

/// Rendered diagnostics of a program that must fail to parse.
pub fn syntax_errors(source: &str) -> Vec<String> {
    let outcome = run(source);
    assert_eq!(outcome.status, RunStatus::SyntaxError);
    assert_eq!(outcome.output, "", "nothing may run after a syntax error");
    outcome.rendered_errors().lines().map(str::to_string).collect()
}

/// Helper struct to create and automatically clean up temporary script files
pub struct TempScript {
    path: PathBuf,
}

impl TempScript {
    pub fn new(name: &str, content: &str) -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!(
            "lox_test_{}_{}.lox",
            name,
            std::process::id()
        ));
        let mut file = File::create(&path)?;
        file.write_all(content.as_bytes())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempScript {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
