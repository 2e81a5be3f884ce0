//! Cahier - spaced-repetition archive for language lessons
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use cahier::archive::open_archive;
use cahier::config::{cahier_home, Config};
use cahier::core::{ItemKind, Level, Quality};
use cahier::error::exit_codes;
use cahier::generation::ResponseFileGenerator;
use cahier::storage::StorageAdapter;

// =============================================================================
// CLI Definition
// =============================================================================

/// Cahier - spaced-repetition archive for language lessons
#[derive(Parser)]
#[command(name = "cahier")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Cloud identity to sync under (overrides config)
    #[arg(long, global = true)]
    identity: Option<String>,
    /// Use the device-local store even if an identity is configured
    #[arg(long, global = true, conflicts_with = "identity")]
    local: bool,
    /// Output as JSON
    #[arg(long, short, global = true)]
    json: bool,
    /// Suppress output
    #[arg(long, short, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive a generated lesson from a saved generator response
    Import {
        /// File holding the generator's response
        response: PathBuf,
        /// Lesson topic
        #[arg(long)]
        topic: String,
        /// Proficiency level (A1..C2)
        #[arg(long)]
        level: Level,
        /// Also add grammar points to review
        #[arg(long)]
        with_grammar: bool,
        /// Also add dialogue and essay lines to review
        #[arg(long)]
        with_text: bool,
    },

    /// List review items, newest first
    List {
        /// Only items of this kind (vocab, grammar, text)
        #[arg(long, short)]
        kind: Option<ItemKind>,
        /// Only items of this lesson group
        #[arg(long, short)]
        group: Option<String>,
        /// Maximum number of results
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// List items due for review, most overdue first
    Due {
        /// Only items of this kind (vocab, grammar, text)
        #[arg(long, short)]
        kind: Option<ItemKind>,
        /// Only items of this lesson group
        #[arg(long, short)]
        group: Option<String>,
        /// Maximum number of results (default from config)
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Grade a review item
    Review {
        /// Item ID
        id: String,
        /// Recall quality (hard, good, easy)
        quality: Quality,
    },

    /// Delete a review item
    Delete {
        /// Item ID
        id: String,
    },

    /// Show item counts per lesson group
    Groups,

    /// List archived lessons
    Lessons {
        /// Maximum number of results
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show or change learner settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show current settings (keys masked)
    Show,
    /// Set one setting
    Set {
        /// Setting key, e.g. gemini_key or selected_model
        key: String,
        /// New value
        value: String,
    },
}

fn main() -> ExitCode {
    setup_panic_handler();
    setup_logging();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("cahier error: {}", e);
            ExitCode::from(exit_codes::FAILURE as u8)
        }
    }
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.cahier/crash.log and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("cahier panic: {}", info);

        if let Some(home) = cahier_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

/// Log to stderr, filtered by `CAHIER_LOG` (default `warn`).
fn setup_logging() {
    let filter = EnvFilter::try_from_env("CAHIER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();
}

/// Output flags shared by every command.
#[derive(Clone, Copy)]
struct Output {
    json: bool,
    quiet: bool,
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = session_config(Config::load(), cli.identity, cli.local);
    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Import {
            response,
            topic,
            level,
            with_grammar,
            with_text,
        } => run_import(&config, out, response, topic, level, with_grammar, with_text),
        Commands::List { kind, group, limit } => {
            run_list(&config, out, kind, group, limit, false)
        }
        Commands::Due { kind, group, limit } => {
            let limit = Some(limit.unwrap_or(config.review.default_limit));
            run_list(&config, out, kind, group, limit, true)
        }
        Commands::Review { id, quality } => run_review(&config, out, id, quality),
        Commands::Delete { id } => run_delete(&config, out, id),
        Commands::Groups => run_groups(&config, out),
        Commands::Lessons { limit } => run_lessons(&config, out, limit),
        Commands::Settings { action } => run_settings(&config, out, action),
    }
}

/// Apply the command-line session flags on top of the loaded config.
fn session_config(mut config: Config, identity: Option<String>, local: bool) -> Config {
    if local {
        config.session.identity = None;
    } else if identity.is_some() {
        config.session.identity = identity;
    }
    config
}

// =============================================================================
// Command Implementations
// =============================================================================

/// Convert a success boolean to an exit code.
fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::SUCCESS as u8)
    } else {
        ExitCode::from(exit_codes::FAILURE as u8)
    }
}

fn print(formatted: String) {
    if !formatted.is_empty() {
        println!("{}", formatted);
    }
}

fn run_import(
    config: &Config,
    out: Output,
    response: PathBuf,
    topic: String,
    level: Level,
    with_grammar: bool,
    with_text: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use cahier::cli::import::{ImportCommand, ImportOptions};

    let cmd = ImportCommand::new(
        open_archive(config)?,
        Box::new(ResponseFileGenerator::new(response)),
    );
    let options = ImportOptions {
        topic,
        level,
        with_grammar,
        with_text,
        json: out.json,
        quiet: out.quiet,
    };

    let output = cmd.run(&options);
    print(cmd.format_output(&output, &options));
    Ok(success_to_exit_code(output.success))
}

fn run_list(
    config: &Config,
    out: Output,
    kind: Option<ItemKind>,
    group: Option<String>,
    limit: Option<usize>,
    due: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use cahier::cli::list::{ListCommand, ListOptions};

    let cmd = ListCommand::new(open_archive(config)?);
    let options = ListOptions {
        json: out.json,
        quiet: out.quiet,
        limit,
        kind,
        group,
        due,
    };

    let output = cmd.run(&options);
    print(cmd.format_output(&output, &options));
    Ok(success_to_exit_code(output.success))
}

fn run_review(
    config: &Config,
    out: Output,
    id: String,
    quality: Quality,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use cahier::cli::review::{ReviewCommand, ReviewOptions};

    let cmd = ReviewCommand::new(open_archive(config)?);
    let options = ReviewOptions {
        id,
        quality,
        json: out.json,
        quiet: out.quiet,
    };

    let output = cmd.run(&options);
    print(cmd.format_output(&output, &options));
    Ok(success_to_exit_code(output.success))
}

fn run_delete(
    config: &Config,
    out: Output,
    id: String,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use cahier::cli::delete::{DeleteCommand, DeleteOptions};

    let cmd = DeleteCommand::new(open_archive(config)?);
    let options = DeleteOptions {
        id,
        json: out.json,
        quiet: out.quiet,
    };

    let output = cmd.run(&options);
    print(cmd.format_output(&output, &options));
    Ok(success_to_exit_code(output.success))
}

fn run_groups(config: &Config, out: Output) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use cahier::cli::groups::{GroupsCommand, GroupsOptions};

    let cmd = GroupsCommand::new(open_archive(config)?);
    let options = GroupsOptions {
        json: out.json,
        quiet: out.quiet,
    };

    let output = cmd.run(&options);
    print(cmd.format_output(&output, &options));
    Ok(success_to_exit_code(output.success))
}

fn run_lessons(
    config: &Config,
    out: Output,
    limit: Option<usize>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use cahier::cli::lessons::{LessonsCommand, LessonsOptions};

    let cmd = LessonsCommand::new(open_archive(config)?);
    let options = LessonsOptions {
        json: out.json,
        quiet: out.quiet,
        limit,
    };

    let output = cmd.run(&options);
    print(cmd.format_output(&output, &options));
    Ok(success_to_exit_code(output.success))
}

fn run_settings(
    config: &Config,
    out: Output,
    action: SettingsAction,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use cahier::cli::settings_cmd::{self, SettingsCommand, SettingsOptions};

    let cmd = SettingsCommand::new(StorageAdapter::from_config(config)?);
    let options = SettingsOptions {
        action: match action {
            SettingsAction::Show => settings_cmd::SettingsAction::Show,
            SettingsAction::Set { key, value } => settings_cmd::SettingsAction::Set { key, value },
        },
        json: out.json,
        quiet: out.quiet,
    };

    let output = cmd.run(&options);
    print(cmd.format_output(&output, &options));
    Ok(success_to_exit_code(output.success))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_to_exit_code() {
        assert_eq!(success_to_exit_code(true), ExitCode::from(0));
        assert_eq!(success_to_exit_code(false), ExitCode::from(1));
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(exit_codes::SUCCESS, 0);
        assert_eq!(exit_codes::FAILURE, 1);
        assert_eq!(exit_codes::CRASH, 3);
    }

    #[test]
    fn test_session_config() {
        let mut base = Config::default();
        base.session.identity = Some("configured".to_string());

        let overridden = session_config(base.clone(), Some("flag".to_string()), false);
        assert_eq!(overridden.session.identity.as_deref(), Some("flag"));

        let kept = session_config(base.clone(), None, false);
        assert_eq!(kept.session.identity.as_deref(), Some("configured"));

        let local = session_config(base, None, true);
        assert!(local.session.identity.is_none());
    }

    #[test]
    fn test_cli_parse_import() {
        let cli = Cli::parse_from([
            "cahier",
            "import",
            "lesson.json",
            "--topic",
            "Au café",
            "--level",
            "b1",
            "--with-grammar",
        ]);
        match cli.command {
            Commands::Import {
                response,
                topic,
                level,
                with_grammar,
                with_text,
            } => {
                assert_eq!(response, PathBuf::from("lesson.json"));
                assert_eq!(topic, "Au café");
                assert_eq!(level, Level::B1);
                assert!(with_grammar);
                assert!(!with_text);
            }
            _ => panic!("Expected Import command"),
        }
    }

    #[test]
    fn test_cli_parse_import_rejects_unknown_level() {
        let result = Cli::try_parse_from([
            "cahier", "import", "x.json", "--topic", "t", "--level", "D4",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_list() {
        let cli = Cli::parse_from(["cahier", "list", "--kind", "vocab", "--group", "café__A1"]);
        match cli.command {
            Commands::List { kind, group, limit } => {
                assert_eq!(kind, Some(ItemKind::Vocabulary));
                assert_eq!(group.as_deref(), Some("café__A1"));
                assert!(limit.is_none());
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_parse_due_with_global_flags() {
        let cli = Cli::parse_from(["cahier", "due", "--limit", "5", "--json", "--identity", "ana"]);
        assert!(cli.json);
        assert!(!cli.quiet);
        assert_eq!(cli.identity.as_deref(), Some("ana"));
        match cli.command {
            Commands::Due { limit, .. } => assert_eq!(limit, Some(5)),
            _ => panic!("Expected Due command"),
        }
    }

    #[test]
    fn test_cli_parse_review() {
        let cli = Cli::parse_from(["cahier", "review", "abc123", "normal"]);
        match cli.command {
            Commands::Review { id, quality } => {
                assert_eq!(id, "abc123");
                assert_eq!(quality, Quality::Good);
            }
            _ => panic!("Expected Review command"),
        }
    }

    #[test]
    fn test_cli_local_conflicts_with_identity() {
        let result = Cli::try_parse_from(["cahier", "--local", "--identity", "ana", "groups"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_settings_set() {
        let cli = Cli::parse_from(["cahier", "settings", "set", "user_name", "Ana", "-q"]);
        assert!(cli.quiet);
        match cli.command {
            Commands::Settings {
                action: SettingsAction::Set { key, value },
            } => {
                assert_eq!(key, "user_name");
                assert_eq!(value, "Ana");
            }
            _ => panic!("Expected Settings set command"),
        }
    }
}
