use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::MissedTickBehavior;

use exam_core::model::{ChoiceId, PreparedQuestion, SessionReport, UserId};
use services::{Advance, SessionLoopService, SessionStateMachine, Tick};

use crate::cli::PracticeArgs;

type BoxError = Box<dyn std::error::Error>;

/// What the user did while a question was on screen.
enum Input {
    Answer(Option<ChoiceId>),
    TimedOut,
    Quit,
}

/// Run an interactive session: one tick per second, answers read as lines.
///
/// An empty line skips the question; `q` or end of input abandons the session.
pub async fn run<R, W>(
    svc: &SessionLoopService,
    user: &UserId,
    args: &PracticeArgs,
    input: R,
    out: &mut W,
) -> Result<(), BoxError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut session = svc.start_session(user, args.exam_set_id, args.config).await?;
    let mut lines = input.lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    writeln!(
        out,
        "{} questions, mode {}, {}. Type a label to answer, Enter to skip, q to quit.",
        session.questions().len(),
        args.config.mode(),
        describe_limit(args.config.time_limit_secs())
    )?;

    loop {
        let Some(question) = session.current_question().cloned() else {
            break;
        };
        render_question(&session, &question, out)?;
        ticker.reset();

        let input = loop {
            tokio::select! {
                _ = ticker.tick() => match session.tick() {
                    Tick::Expired => break Input::TimedOut,
                    Tick::Remaining(secs) if secs <= 5 || secs % 10 == 0 => {
                        writeln!(out, "  {secs}s left")?;
                    }
                    _ => {}
                },
                line = lines.next_line() => {
                    let Some(line) = line? else { break Input::Quit };
                    let text = line.trim();
                    if text.eq_ignore_ascii_case("q") {
                        break Input::Quit;
                    }
                    if text.is_empty() {
                        break Input::Answer(None);
                    }
                    match resolve_choice(&question, text) {
                        Some(id) => break Input::Answer(Some(id)),
                        None => writeln!(out, "  no choice labelled {text:?}")?,
                    }
                }
            }
        };

        match input {
            Input::Quit => {
                session.dispose();
                writeln!(out, "Session abandoned.")?;
                return Ok(());
            }
            Input::TimedOut => writeln!(out, "  Time's up.")?,
            Input::Answer(choice) => {
                session.submit_answer(choice)?;
            }
        }
        render_feedback(&session, out)?;

        match session.advance()? {
            Advance::Next { .. } | Advance::Inert => {}
            Advance::Completed(report) => {
                render_report(&report, out)?;
                let done = svc.complete(user, args.exam_set_id, report).await;
                if let Some(err) = done.persistence_error {
                    writeln!(out, "Warning: result was not saved ({err}).")?;
                }

                writeln!(out, "Play again? [y/N]")?;
                out.flush()?;
                let again = lines
                    .next_line()
                    .await?
                    .is_some_and(|l| l.trim().eq_ignore_ascii_case("y"));
                if !again {
                    break;
                }
                session.restart()?;
            }
        }
    }

    session.dispose();
    Ok(())
}

fn describe_limit(secs: u32) -> String {
    if secs == 0 {
        "untimed".to_owned()
    } else {
        format!("{secs}s per question")
    }
}

/// Match by choice label (case-insensitive) or by 1-based position.
fn resolve_choice(question: &PreparedQuestion, text: &str) -> Option<ChoiceId> {
    let choices = question.choices();
    choices
        .iter()
        .find(|c| c.label().eq_ignore_ascii_case(text))
        .or_else(|| {
            text.parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| choices.get(i))
        })
        .map(|c| c.id().clone())
}

fn render_question<W: Write>(
    session: &SessionStateMachine,
    question: &PreparedQuestion,
    out: &mut W,
) -> std::io::Result<()> {
    let progress = session.progress();
    let position = progress.current_index.map_or(0, |i| i + 1);
    writeln!(out)?;
    writeln!(out, "[{position}/{}] {}", progress.total, question.question().text())?;
    for choice in question.choices() {
        writeln!(out, "  {}) {}", choice.label(), choice.text())?;
    }
    out.flush()
}

fn render_feedback<W: Write>(session: &SessionStateMachine, out: &mut W) -> std::io::Result<()> {
    let Some(outcome) = session.last_outcome() else {
        return Ok(());
    };
    if outcome.is_correct() {
        writeln!(out, "  Correct ({}s).", outcome.elapsed_secs())?;
    } else {
        let correct: Vec<&str> = outcome
            .question()
            .choices()
            .iter()
            .filter(|c| c.is_correct())
            .map(|c| c.label())
            .collect();
        writeln!(out, "  Incorrect. Correct: {}.", correct.join(", "))?;
    }
    if let Some(explanation) = outcome.question().question().explanation() {
        writeln!(out, "  {explanation}")?;
    }
    Ok(())
}

fn render_report<W: Write>(report: &SessionReport, out: &mut W) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "Score: {}/{} ({}%) in {}s",
        report.correct_count(),
        report.total_questions(),
        report.accuracy_percent(),
        report.total_elapsed_secs()
    )?;
    for (i, outcome) in report.outcomes().iter().enumerate() {
        let mark = if outcome.is_correct() {
            "ok"
        } else if outcome.is_skipped() {
            "--"
        } else {
            "xx"
        };
        writeln!(
            out,
            "  {mark} {}. {}",
            i + 1,
            outcome.question().question().text()
        )?;
    }
    Ok(())
}
