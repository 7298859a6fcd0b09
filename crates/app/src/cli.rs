use std::fmt;
use std::path::PathBuf;

use exam_core::model::{ExamSetId, SessionConfig, SessionConfigError, SessionMode};

#[derive(Debug)]
pub enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingExamId { command: &'static str },
    UnknownArg(String),
    InvalidExamId { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    Invalid(exam_core::Error),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing subcommand"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingExamId { command } => write!(f, "{command} requires an exam set id"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidExamId { raw } => write!(f, "invalid exam set id: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::Invalid(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<SessionConfigError> for ArgsError {
    fn from(err: SessionConfigError) -> Self {
        ArgsError::Invalid(err.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeArgs {
    pub exam_set_id: ExamSetId,
    pub config: SessionConfig,
    pub seed: Option<u64>,
    pub use_history: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Import { file: PathBuf, title: Option<String> },
    List,
    Share(ExamSetId),
    Like(ExamSetId),
    ImportShared(ExamSetId),
    Delete(ExamSetId),
    Export { exam_set_id: ExamSetId, out: Option<PathBuf> },
    Practice(PracticeArgs),
    History(Option<ExamSetId>),
}

/// Parsed command line. Global flags override the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub db_url: Option<String>,
    pub user: Option<String>,
    pub command: Command,
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [--db <sqlite_url>] [--user <name>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  import --file <path> [--title <title>]");
    eprintln!("  list");
    eprintln!("  share <id>            toggle sharing of an exam set you own");
    eprintln!("  like <id>             like a visible exam set, or take the like back");
    eprintln!("  import-shared <id>    copy a shared exam set into your own sets");
    eprintln!("  delete <id>");
    eprintln!("  export <id> [--out <path>]");
    eprintln!("  practice <id> [--mode <mode>] [--count <n>] [--time <secs>] [--seed <n>] [--history]");
    eprintln!("  history [<id>]");
    eprintln!();
    eprintln!("Modes: warmup, review, repetition, comprehensive. --time 0 means untimed.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_USER, RUST_LOG");
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn parse_exam_id(raw: String) -> Result<ExamSetId, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidExamId { raw })
}

impl Args {
    /// Parse everything after the program name.
    ///
    /// Returns `Ok(None)` when help was requested.
    pub fn parse(argv: impl IntoIterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut db_url = None;
        let mut user = None;
        let mut command_name = None;
        let mut rest = Vec::new();

        let mut iter = argv.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Ok(None),
                "--db" => {
                    let value = require_value(&mut iter, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(value);
                }
                "--user" => user = Some(require_value(&mut iter, "--user")?),
                _ if command_name.is_none() && !arg.starts_with("--") => command_name = Some(arg),
                _ => rest.push(arg),
            }
        }

        let name = command_name.ok_or(ArgsError::MissingCommand)?;
        let command = Command::parse(&name, rest)?;
        Ok(Some(Self {
            db_url,
            user,
            command,
        }))
    }
}

impl Command {
    fn parse(name: &str, rest: Vec<String>) -> Result<Self, ArgsError> {
        let mut args = rest.into_iter();
        let command = match name {
            "import" => {
                let mut file = None;
                let mut title = None;
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--file" => file = Some(PathBuf::from(require_value(&mut args, "--file")?)),
                        "--title" => title = Some(require_value(&mut args, "--title")?),
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                let file = file.ok_or(ArgsError::MissingValue { flag: "--file" })?;
                Command::Import { file, title }
            }
            "list" => Command::List,
            "share" => Command::Share(positional_id(&mut args, "share")?),
            "like" => Command::Like(positional_id(&mut args, "like")?),
            "import-shared" => Command::ImportShared(positional_id(&mut args, "import-shared")?),
            "delete" => Command::Delete(positional_id(&mut args, "delete")?),
            "export" => {
                let exam_set_id = positional_id(&mut args, "export")?;
                let mut out = None;
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--out" => out = Some(PathBuf::from(require_value(&mut args, "--out")?)),
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                Command::Export { exam_set_id, out }
            }
            "practice" => Command::Practice(PracticeArgs::parse(&mut args)?),
            "history" => Command::History(args.next().map(parse_exam_id).transpose()?),
            other => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };
        if let Some(extra) = args.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(command)
    }
}

fn positional_id(
    args: &mut impl Iterator<Item = String>,
    command: &'static str,
) -> Result<ExamSetId, ArgsError> {
    let raw = args.next().ok_or(ArgsError::MissingExamId { command })?;
    parse_exam_id(raw)
}

impl PracticeArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let exam_set_id = positional_id(args, "practice")?;
        let mut mode = SessionMode::default();
        let mut count = SessionConfig::DEFAULT_MAX_QUESTIONS;
        let mut time_limit = SessionConfig::DEFAULT_TIME_LIMIT_SECS;
        let mut seed = None;
        let mut use_history = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--mode" => mode = require_value(args, "--mode")?.parse::<SessionMode>()?,
                "--count" => count = parse_number("--count", require_value(args, "--count")?)?,
                "--time" => time_limit = parse_number("--time", require_value(args, "--time")?)?,
                "--seed" => seed = Some(parse_number("--seed", require_value(args, "--seed")?)?),
                "--history" => use_history = true,
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            exam_set_id,
            config: SessionConfig::new(mode, count, time_limit)?,
            seed,
            use_history,
        })
    }
}

/// Turn a bare path or `sqlite:` URL into an absolute `sqlite://` URL.
pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file (and parent directories) so `SQLite` can open it.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Args>, ArgsError> {
        Args::parse(args.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn practice_uses_defaults() {
        let args = parse(&["practice", "7"]).unwrap().unwrap();
        let Command::Practice(p) = args.command else {
            panic!("expected practice");
        };
        assert_eq!(p.exam_set_id, ExamSetId::new(7));
        assert_eq!(p.config, SessionConfig::default());
        assert_eq!(p.seed, None);
        assert!(!p.use_history);
    }

    #[test]
    fn practice_flags_and_globals() {
        let args = parse(&[
            "--user", "bob", "practice", "3", "--mode", "Review", "--count", "5", "--time", "0",
            "--seed", "42", "--history", "--db", "quiz.db",
        ])
        .unwrap()
        .unwrap();
        assert_eq!(args.user.as_deref(), Some("bob"));
        assert_eq!(args.db_url.as_deref(), Some("quiz.db"));
        let Command::Practice(p) = args.command else {
            panic!("expected practice");
        };
        assert_eq!(p.config, SessionConfig::new(SessionMode::Review, 5, 0).unwrap());
        assert_eq!(p.seed, Some(42));
        assert!(p.use_history);
    }

    #[test]
    fn invalid_practice_values_are_rejected() {
        assert!(matches!(
            parse(&["practice", "1", "--count", "0"]),
            Err(ArgsError::Invalid(exam_core::Error::Config(_)))
        ));
        assert!(matches!(
            parse(&["practice", "1", "--mode", "cram"]),
            Err(ArgsError::Invalid(_))
        ));
        assert!(matches!(
            parse(&["practice", "1", "--time", "soon"]),
            Err(ArgsError::InvalidNumber { flag: "--time", .. })
        ));
        assert!(matches!(
            parse(&["practice"]),
            Err(ArgsError::MissingExamId { command: "practice" })
        ));
    }

    #[test]
    fn import_requires_file() {
        assert!(matches!(
            parse(&["import", "--title", "x"]),
            Err(ArgsError::MissingValue { flag: "--file" })
        ));
        let args = parse(&["import", "--file", "set.json"]).unwrap().unwrap();
        assert_eq!(
            args.command,
            Command::Import {
                file: PathBuf::from("set.json"),
                title: None
            }
        );
    }

    #[test]
    fn other_commands() {
        assert_eq!(parse(&["list"]).unwrap().unwrap().command, Command::List);
        assert_eq!(
            parse(&["share", "2"]).unwrap().unwrap().command,
            Command::Share(ExamSetId::new(2))
        );
        assert_eq!(
            parse(&["import-shared", "7"]).unwrap().unwrap().command,
            Command::ImportShared(ExamSetId::new(7))
        );
        assert!(matches!(
            parse(&["import-shared"]),
            Err(ArgsError::MissingExamId { command: "import-shared" })
        ));
        assert_eq!(
            parse(&["history"]).unwrap().unwrap().command,
            Command::History(None)
        );
        assert!(matches!(parse(&["list", "extra"]), Err(ArgsError::UnknownArg(_))));
        assert!(matches!(parse(&["frobnicate"]), Err(ArgsError::UnknownCommand(_))));
        assert!(matches!(parse(&[]), Err(ArgsError::MissingCommand)));
        assert!(parse(&["-h"]).unwrap().is_none());
    }

    #[test]
    fn sqlite_urls_are_normalized() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(normalize_sqlite_url("sqlite:///tmp/a.db".into()), "sqlite:///tmp/a.db");
        assert_eq!(normalize_sqlite_url("sqlite:/tmp/a.db".into()), "sqlite:///tmp/a.db");
        assert!(normalize_sqlite_url("a.db".into()).ends_with("/a.db"));
    }
}
