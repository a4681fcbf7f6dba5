use crate::cli::{Args, ColorChoice};

/// Default bound on nested calls before a program is stopped with `Stack overflow.`.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Settings the evaluator itself needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

pub struct AppConfig {
    pub color_enabled: bool,
    pub verbose: bool,
    pub dump_ast: bool,
    pub interpreter: InterpreterConfig,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Self {
        let color_enabled = match args.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => atty::is(atty::Stream::Stderr) && atty::is(atty::Stream::Stdout),
        };

        AppConfig {
            color_enabled,
            verbose: args.verbose,
            dump_ast: args.dump_ast,
            interpreter: InterpreterConfig {
                max_call_depth: args.max_depth,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_args() {
        let args = Args::try_parse_from(["lox", "--color", "always", "-v", "--max-depth", "10"]).unwrap();
        let config = AppConfig::from_args(&args);
        assert!(config.color_enabled);
        assert!(config.verbose);
        assert!(!config.dump_ast);
        assert_eq!(config.interpreter.max_call_depth, 10);
    }

    #[test]
    fn test_never_disables_color() {
        let args = Args::try_parse_from(["lox", "--color", "never"]).unwrap();
        assert!(!AppConfig::from_args(&args).color_enabled);
    }
}
