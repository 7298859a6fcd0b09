use std::io::Write;

use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use exam_core::model::{ExamSet, UserId};
use services::{AppServices, Clock, SelectionPolicy};

mod cli;
mod config;
mod practice;

use cli::{Args, Command, normalize_sqlite_url, prepare_sqlite_file, print_usage};
use config::Settings;

const LIST_LIMIT: u32 = 100;

fn init_tracing(settings: &Settings) {
    let env_filter = EnvFilter::try_new(&settings.rust_log).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn print_set(out: &mut impl Write, set: &ExamSet) -> std::io::Result<()> {
    writeln!(
        out,
        "{:>4}  {:<32} {:>3} questions  {} likes{}  ({})",
        set.id().value(),
        set.title(),
        set.questions().len(),
        set.like_count(),
        if set.is_shared() { "  shared" } else { "" },
        set.owner()
    )
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env();
    init_tracing(&settings);

    let parsed = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return Err(e.into());
        }
    };

    let db_url = normalize_sqlite_url(parsed.db_url.unwrap_or(settings.db_url));
    let user = parsed.user.map_or(settings.user, |u| UserId::new(u.trim()));

    let (selection, seed) = match &parsed.command {
        Command::Practice(p) if p.use_history => (SelectionPolicy::History, p.seed),
        Command::Practice(p) => (SelectionPolicy::PassThrough, p.seed),
        _ => (SelectionPolicy::PassThrough, None),
    };

    prepare_sqlite_file(&db_url)?;
    tracing::debug!(%db_url, %user, "opening storage");
    let app = AppServices::new_sqlite(&db_url, Clock::system(), selection, seed).await?;
    let exam_sets = app.exam_sets();
    let mut out = std::io::stdout();

    match parsed.command {
        Command::Import { file, title } => {
            let raw = std::fs::read_to_string(&file)?;
            let title = title.unwrap_or_else(|| {
                file.file_stem()
                    .map_or_else(|| "Untitled".to_owned(), |s| s.to_string_lossy().into_owned())
            });
            let set = exam_sets.import(&user, &title, &raw).await?;
            writeln!(out, "Imported exam set {} ({} questions).", set.id(), set.questions().len())?;
        }
        Command::List => {
            writeln!(out, "Your exam sets:")?;
            for set in exam_sets.list_mine(&user, LIST_LIMIT).await? {
                print_set(&mut out, &set)?;
            }
            writeln!(out, "Shared exam sets:")?;
            for set in exam_sets.list_shared(LIST_LIMIT).await? {
                print_set(&mut out, &set)?;
            }
        }
        Command::Share(id) => {
            let shared = exam_sets.toggle_share(&user, id).await?;
            let state = if shared { "shared" } else { "private" };
            writeln!(out, "Exam set {id} is now {state}.")?;
        }
        Command::Like(id) => {
            let (liked, likes) = exam_sets.like(&user, id).await?;
            let verb = if liked { "Liked" } else { "Unliked" };
            writeln!(out, "{verb} exam set {id}; it has {likes} likes.")?;
        }
        Command::ImportShared(id) => {
            let set = exam_sets.import_shared(&user, id).await?;
            writeln!(
                out,
                "Copied exam set {id} as {} ({} questions).",
                set.id(),
                set.questions().len()
            )?;
        }
        Command::Delete(id) => {
            exam_sets.delete(&user, id).await?;
            writeln!(out, "Deleted exam set {id}.")?;
        }
        Command::Export { exam_set_id, out: path } => {
            let json = exam_sets.export_json(&user, exam_set_id).await?;
            match path {
                Some(path) => std::fs::write(path, json)?,
                None => writeln!(out, "{json}")?,
            }
        }
        Command::Practice(args) => {
            let stdin = BufReader::new(tokio::io::stdin());
            practice::run(&app.session_loop(), &user, &args, stdin, &mut out).await?;
        }
        Command::History(exam_set_id) => {
            let rows = app
                .session_loop()
                .recent_results(&user, exam_set_id, LIST_LIMIT)
                .await?;
            for row in rows {
                let r = &row.record;
                writeln!(
                    out,
                    "{:>4}  set {:<4} {:<13} {}/{}  {}",
                    row.id,
                    r.exam_set_id.value(),
                    r.mode.as_str(),
                    r.score,
                    r.total_questions,
                    r.completed_at.format("%Y-%m-%d %H:%M")
                )?;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
