//! REPL command implementation

use crate::config::Config;
use anyhow::Result;
use peek_runtime::{
    DiagnosticFormatter, EvalError, EvalOptions, ExpressionFailure, FrameSnapshot, Session,
    VariableSummary,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;

/// What one line of input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Help,
    Vars,
    Last,
    TopLevel(&'a str),
    SetSourceLocations(bool),
    Usage(&'static str),
    Eval(&'a str),
    Empty,
}

fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    match trimmed {
        "" => return Command::Empty,
        ":quit" | ":q" => return Command::Quit,
        ":help" | ":h" => return Command::Help,
        ":vars" | ":v" => return Command::Vars,
        ":last" => return Command::Last,
        _ => {}
    }

    if let Some(rest) = trimmed.strip_prefix(":top") {
        let text = rest.trim();
        return if text.is_empty() {
            Command::Usage("Usage: :top <declarations>")
        } else {
            Command::TopLevel(text)
        };
    }

    if let Some(rest) = trimmed.strip_prefix(":set") {
        let mut words = rest.split_whitespace();
        return match (words.next(), words.next(), words.next()) {
            (Some("use-source-locations"), Some(value), None) => match value {
                "on" | "true" | "1" => Command::SetSourceLocations(true),
                "off" | "false" | "0" => Command::SetSourceLocations(false),
                _ => Command::Usage("Usage: :set use-source-locations <on|off>"),
            },
            _ => Command::Usage("Usage: :set use-source-locations <on|off>"),
        };
    }

    if trimmed.starts_with(':') {
        return Command::Usage("Unknown command; type :help for a list");
    }

    Command::Eval(line)
}

/// Run the interactive REPL
///
/// If `no_history` is true, disables history persistence.
pub fn run(frame: Option<&Path>, no_history: bool, config: &Config) -> Result<()> {
    let snapshot: FrameSnapshot = super::load_frame(frame)?;
    let session = Session::with_settings(config.settings.expression.clone());
    let formatter = super::formatter(config);
    let json = config.default_json();

    let mut rl = DefaultEditor::new()?;

    // Load history from file (unless disabled)
    let history_path = config.get_history_path();
    if !no_history {
        if let Some(ref path) = history_path {
            let _ = rl.load_history(path); // Ignore errors if file doesn't exist
        }
    }

    println!("Peek v{} expression REPL", peek_runtime::VERSION);
    println!("Type expressions or statements, or :quit to exit");
    println!("Commands: :quit (or :q), :help, :top <decls>, :set use-source-locations <on|off>, :vars, :last");
    println!();

    let mut last_failure: Option<ExpressionFailure> = None;
    loop {
        match rl.readline("(peek) ") {
            Ok(line) => {
                let command = parse_command(&line);
                if command != Command::Empty {
                    let _ = rl.add_history_entry(line.as_str());
                }

                let (text, options) = match command {
                    Command::Empty => continue,
                    Command::Quit => break,
                    Command::Help => {
                        print_help();
                        continue;
                    }
                    Command::Vars => {
                        print_vars(&session.persistent_variables());
                        continue;
                    }
                    Command::Usage(usage) => {
                        println!("{}", usage);
                        continue;
                    }
                    Command::Last => {
                        match &last_failure {
                            Some(failure) => {
                                let err = EvalError::Expression(session.present(failure));
                                super::print_error(&err, json, &formatter);
                            }
                            None => println!("No failed evaluation yet."),
                        }
                        continue;
                    }
                    Command::SetSourceLocations(enabled) => {
                        session.set_use_source_locations(enabled);
                        println!(
                            "use-source-locations = {}",
                            if enabled { "on" } else { "off" }
                        );
                        continue;
                    }
                    Command::TopLevel(text) => (text, EvalOptions::top_level()),
                    Command::Eval(text) => (text, EvalOptions::statement()),
                };

                if let Some(failure) = eval_line(&session, &snapshot, text, &options, json, &formatter) {
                    last_failure = Some(failure);
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C
                println!("^C");
                println!("Use :quit or :q to exit");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    // Save history to file (unless disabled)
    if !no_history {
        if let Some(path) = history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.save_history(&path); // Ignore errors
        }
    }

    Ok(())
}

fn eval_line(
    session: &Session,
    snapshot: &FrameSnapshot,
    text: &str,
    options: &EvalOptions,
    json: bool,
    formatter: &DiagnosticFormatter,
) -> Option<ExpressionFailure> {
    match session.evaluate(text, options, snapshot, snapshot) {
        Ok(outcome) => {
            super::print_outcome(&outcome, json, formatter);
            None
        }
        Err(err) => {
            super::print_error(&err, json, formatter);
            err.failure().cloned()
        }
    }
}

/// Print help information
fn print_help() {
    println!("Peek REPL Commands:");
    println!("  :quit, :q                           Exit the REPL");
    println!("  :help, :h                           Show this help message");
    println!("  :top <decls>                        Evaluate as top-level declarations");
    println!("  :set use-source-locations <on|off>  Show or hide source locations");
    println!("  :vars                               List persistent variables");
    println!("  :last                               Show the last failure again");
    println!();
    println!("Anything else is evaluated as statements in the paused frame.");
    println!("Examples:");
    println!("  (peek) 1 + 2");
    println!("  (peek) int $total = 40;");
    println!("  (peek) :top int twice(int x) {{ return x * 2; }}");
    println!("  (peek) twice($total)");
}

fn print_vars(vars: &[VariableSummary]) {
    if vars.is_empty() {
        println!("No persistent variables.");
        return;
    }

    println!("{:<16} {:<18} {}", "name", "type", "value");
    println!("{}", "-".repeat(50));
    for var in vars {
        println!("{:<16} {:<18} {}", var.name, var.type_name, var.summary);
    }
}
