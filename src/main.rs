use clap::Parser;
use lox::ast::AstPrinter;
use lox::cli::{generate_completions, Args, Commands};
use lox::config::AppConfig;
use lox::diagnostic::render_diagnostics;
use lox::session::{Lox, RunStatus, EXIT_NO_INPUT, EXIT_OK, EXIT_USAGE};
use owo_colors::OwoColorize;
use std::io::{self, BufRead, Write};
use std::path::Path;

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() { EXIT_USAGE } else { EXIT_OK };
            std::process::exit(code);
        }
    };

    let config = AppConfig::from_args(&args);

    if let Some(Commands::Complete { shell }) = args.command {
        generate_completions(shell);
        return;
    }

    init_logging(&config);

    let code = match &args.script {
        Some(path) => run_file(path, &config),
        None => run_prompt(&config),
    };
    std::process::exit(code);
}

fn init_logging(config: &AppConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if config.verbose {
        EnvFilter::new("lox=debug")
    } else {
        EnvFilter::try_from_env("LOX_LOG").unwrap_or_else(|_| EnvFilter::new("off"))
    };

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(config.color_enabled)
                .with_target(true),
        )
        .with(filter)
        .try_init();
}

fn run_file(path: &Path, config: &AppConfig) -> i32 {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            error_message(config, &format!("Failed to read {}: {}", path.display(), e));
            return EXIT_NO_INPUT;
        }
    };
    tracing::debug!(path = %path.display(), bytes = source.len(), "running script");

    let mut lox = Lox::with_config(config.interpreter);
    run_source(&mut lox, &source, config).exit_code()
}

fn run_prompt(config: &AppConfig) -> i32 {
    tracing::debug!("entering interactive mode");
    let mut lox = Lox::with_config(config.interpreter);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        match lines.next() {
            Some(Ok(line)) => {
                run_source(&mut lox, &line, config);
                lox.reset();
            }
            Some(Err(e)) => {
                error_message(config, &format!("Error reading input: {}", e));
                break;
            }
            None => break,
        }
    }

    EXIT_OK
}

fn run_source(lox: &mut Lox, source: &str, config: &AppConfig) -> RunStatus {
    let status = match lox.parse(source) {
        Some(statements) => {
            if config.dump_ast {
                print!("{}", AstPrinter::print_program(&statements));
            }
            lox.execute(&statements)
        }
        None => RunStatus::SyntaxError,
    };

    let diagnostics = lox.take_diagnostics();
    eprint!("{}", render_diagnostics(&diagnostics, config.color_enabled));
    status
}

fn error_message(config: &AppConfig, message: &str) {
    if config.color_enabled {
        eprintln!("{}", message.red().bold());
    } else {
        eprintln!("{}", message);
    }
}
