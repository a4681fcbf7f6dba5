use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

use crate::config::DEFAULT_MAX_CALL_DEPTH;

#[derive(Parser, Debug)]
#[command(name = "lox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tree-walking interpreter for the Lox scripting language", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Args {
    /// Script to run; starts an interactive prompt when omitted.
    #[arg(value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    #[arg(long = "color", value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Print the parsed program before running it.
    #[arg(long = "dump-ast")]
    pub dump_ast: bool,

    /// Deepest call nesting allowed before reporting a stack overflow.
    #[arg(long = "max-depth", value_name = "N", default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    pub max_depth: usize,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print shell completions.
    Complete {
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "Invalid color choice: {}. Must be 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Args::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, &bin_name, &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["lox"]).unwrap();
        assert!(args.script.is_none());
        assert_eq!(args.color, ColorChoice::Auto);
        assert_eq!(args.max_depth, DEFAULT_MAX_CALL_DEPTH);
        assert!(!args.dump_ast);
    }

    #[test]
    fn test_script_and_flags() {
        let args = Args::try_parse_from([
            "lox",
            "--color",
            "never",
            "--max-depth",
            "64",
            "--dump-ast",
            "main.lox",
        ])
        .unwrap();
        assert_eq!(args.script, Some(PathBuf::from("main.lox")));
        assert_eq!(args.color, ColorChoice::Never);
        assert_eq!(args.max_depth, 64);
        assert!(args.dump_ast);
    }

    #[test]
    fn test_two_scripts_is_usage_error() {
        assert!(Args::try_parse_from(["lox", "a.lox", "b.lox"]).is_err());
    }

    #[test]
    fn test_complete_subcommand() {
        let args = Args::try_parse_from(["lox", "complete", "bash"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::Complete { shell: Shell::Bash })
        ));
    }

    #[test]
    fn test_color_choice_is_case_insensitive() {
        assert_eq!("ALWAYS".parse::<ColorChoice>(), Ok(ColorChoice::Always));
        assert!("sometimes".parse::<ColorChoice>().is_err());
    }
}
