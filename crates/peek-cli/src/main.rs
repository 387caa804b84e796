use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

/// Peek debugger expression evaluator.
///
/// Evaluates C-like expressions against a paused program described by a
/// frame snapshot, with diagnostics that point at what you typed.
///
/// EXAMPLES:
///     peek eval '1 + 2'                        Evaluate an expression
///     peek eval --frame frame.json 'p->x * 2'  Evaluate against a snapshot
///     peek eval --top-level 'int sq(int x) { return x * x; }' 'sq(7)'
///     peek repl --frame frame.json             Start interactive session
///
/// ENVIRONMENT VARIABLES:
///     PEEK_LOG          Log filter (default: warn), e.g. PEEK_LOG=peek_runtime=debug
///     PEEK_DIAGNOSTICS  Set to 'json' for JSON diagnostics by default
///     PEEK_NO_HISTORY   Set to disable REPL history
///     NO_COLOR          Set to disable colored output
#[derive(Parser)]
#[command(name = "peek")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate expressions in one session
    ///
    /// Each EXPR is a separate submission; later ones see the persistent
    /// variables and declarations of earlier ones.
    ///
    /// EXAMPLES:
    ///     peek eval 'int $x = 4;' '$x * $x'
    ///     peek eval --json 'undeclared + 1'
    #[command(visible_alias = "e")]
    Eval {
        /// Expressions to evaluate, in order
        #[arg(required = true)]
        exprs: Vec<String>,
        /// Frame snapshot (JSON) to evaluate against
        #[arg(long, short = 'f')]
        frame: Option<PathBuf>,
        /// Evaluate as top-level declarations instead of statements
        #[arg(long)]
        top_level: bool,
        /// Output diagnostics in JSON format
        #[arg(long)]
        json: bool,
        /// Hide source locations in diagnostics
        #[arg(long)]
        no_source_locations: bool,
    },

    /// Start an interactive session
    ///
    /// REPL COMMANDS:
    ///     :top <text>                          Evaluate as top-level declarations
    ///     :set use-source-locations <on|off>   Toggle source locations
    ///     :vars                                List persistent variables
    ///     :help, :h                            Show help
    ///     :quit, :q                            Exit
    Repl {
        /// Frame snapshot (JSON) to evaluate against
        #[arg(long, short = 'f')]
        frame: Option<PathBuf>,
        /// Disable history persistence
        #[arg(long, env = "PEEK_NO_HISTORY")]
        no_history: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("PEEK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging();
    let cli_config = config::Config::load()?;

    let succeeded = match cli.command {
        Commands::Eval {
            exprs,
            frame,
            top_level,
            json,
            no_source_locations,
        } => {
            let args = commands::eval::EvalArgs {
                exprs,
                frame,
                top_level,
                // Command-line flags override configuration
                json: json || cli_config.default_json(),
                no_source_locations,
            };
            commands::eval::run(&args, &cli_config)?
        }
        Commands::Repl { frame, no_history } => {
            commands::repl::run(frame.as_deref(), no_history, &cli_config)?;
            true
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
