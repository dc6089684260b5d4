use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::api::client::ApiClient;
use crate::api::student::StudentApi;
use crate::cli::commands::user_facing;
use crate::core::config::Settings;
use crate::core::notify::{Notification, NotificationLevel, Notifier};
use crate::core::shutdown::{self, Interrupt};
use crate::core::time::format_countdown;
use crate::exam::autosave::SaveStatus;
use crate::exam::controller::{ExamController, ExamOptions, ExamSnapshot, SubmitOutcome};
use crate::exam::monitor::{EnvironmentEvent, KeyChord};
use crate::exam::runner::ExamRunner;
use crate::exam::state::{Direction, NavigatorStatus, SessionPhase, TickOutcome};
use crate::exam::ExamError;
use crate::schemas::exam::{Exam, OptionLetter};

/// Focus reporting (DECSET 1004), SGR mouse reports (1000 + 1006) and the
/// disambiguating keyboard protocol (`CSI > 1 u`), so the terminal tells us
/// when the window loses focus, is right-clicked, or a modified key is pressed.
const ENABLE_REPORTING: &str = "\x1b[?1004h\x1b[?1000h\x1b[?1006h\x1b[>1u";
const DISABLE_REPORTING: &str = "\x1b[<u\x1b[?1006l\x1b[?1000l\x1b[?1004l";
const CSI: &str = "\x1b[";
const FOCUS_OUT: &str = "\x1b[O";
const FOCUS_IN: &str = "\x1b[I";
/// `ESC [ < button ; x ; y M` on press, lowercase `m` on release.
const MOUSE_REPORT: &str = "\x1b[<";
const RIGHT_BUTTON: &str = "2";

const HELP: &str = "\
commands: n next | p previous | g <k> go to question k | a <A-D> answer
          s submit | r reload questions | h help | q leave";
const SUBMIT_CONFIRMATION: &str =
    "Are you sure you want to submit the exam? This action cannot be undone. [y/N]: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Leave,
}

pub(crate) async fn take(settings: &Settings, client: ApiClient, exam_id: i64) -> Result<()> {
    let api = StudentApi::new(client);
    let exam = api.exam(exam_id).await.map_err(user_facing)?;
    if !exam.is_active {
        bail!("Exam is not active");
    }
    print_instructions(&exam);

    let (notifier, mut notifications) = Notifier::channel();
    let controller = ExamController::new(
        exam,
        Arc::new(api),
        notifier.clone(),
        ExamOptions::from_settings(settings),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (mut runner, mut ticks) = loop {
        match ExamRunner::start(controller.clone(), notifier.clone()).await {
            Ok(started) => break started,
            Err(err) => {
                drain(&mut notifications);
                tracing::warn!(exam_id, error = %err, "Exam could not be started");
                prompt("Type 'r' to retry starting the exam, anything else to leave: ");
                match lines.next_line().await? {
                    Some(line) if line.trim().eq_ignore_ascii_case("r") => continue,
                    _ => return Err(anyhow!("{}", start_failure(&err))),
                }
            }
        }
    };

    print!("{ENABLE_REPORTING}");
    drain(&mut notifications);
    println!("{HELP}");
    render(&runner.controller().snapshot().await);

    let result = drive(&mut runner, &mut ticks, &mut notifications, &mut lines).await;

    print!("{DISABLE_REPORTING}");
    let snapshot = runner.controller().snapshot().await;
    runner.leave().await;
    drain(&mut notifications);

    match snapshot.phase {
        SessionPhase::Submitted => println!(
            "Exam submitted. Answered {}/{} questions.",
            snapshot.answered_count, snapshot.total_questions
        ),
        phase => println!(
            "Left the exam while it was {phase}; {} of {} questions answered.",
            snapshot.answered_count, snapshot.total_questions
        ),
    }
    result
}

async fn drive<R>(
    runner: &mut ExamRunner,
    ticks: &mut mpsc::UnboundedReceiver<TickOutcome>,
    notifications: &mut mpsc::UnboundedReceiver<Notification>,
    lines: &mut tokio::io::Lines<R>,
) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut interrupts = shutdown::interrupts();
    let mut ctrl_c_warned = false;

    loop {
        tokio::select! {
            Some(interrupt) = interrupts.recv() => {
                if on_interrupt(runner, interrupt, &mut ctrl_c_warned) == Flow::Leave {
                    println!("\nInterrupted; leaving the exam view.");
                    return Ok(());
                }
            }
            Some(outcome) = ticks.recv() => {
                match outcome {
                    TickOutcome::Running(remaining) if remaining % 60 == 0 || remaining <= 10 => {
                        println!("Time left: {}", format_countdown(remaining));
                    }
                    TickOutcome::Running(_) | TickOutcome::Idle | TickOutcome::Expired => {}
                }
            }
            Some(notification) = notifications.recv() => show(&notification),
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if handle_line(runner, &line, lines).await? == Flow::Leave {
                            return Ok(());
                        }
                    }
                    None => {
                        println!("Input closed; leaving the exam view.");
                        return Ok(());
                    }
                }
            }
        }

        if runner.controller().phase().await == SessionPhase::Submitted {
            return Ok(());
        }
    }
}

/// Environment signals carried in the raw input line, and what is left of it.
fn scan_environment(line: &str) -> (Vec<EnvironmentEvent>, String) {
    let mut events = Vec::new();
    let mut rest = line.replace(FOCUS_IN, "");

    while let Some(position) = rest.find(FOCUS_OUT) {
        events.push(EnvironmentEvent::VisibilityHidden);
        events.push(EnvironmentEvent::FocusLost);
        rest.replace_range(position..position + FOCUS_OUT.len(), "");
    }

    while let Some(start) = rest.find(MOUSE_REPORT) {
        let body_start = start + MOUSE_REPORT.len();
        let Some(length) = rest[body_start..].find(|c: char| c == 'M' || c == 'm') else {
            rest.truncate(start);
            break;
        };
        let end = body_start + length;
        let pressed = rest[end..].starts_with('M');
        if pressed && rest[body_start..end].split(';').next() == Some(RIGHT_BUTTON) {
            events.push(EnvironmentEvent::ContextMenu);
        }
        rest.replace_range(start..=end, "");
    }

    while let Some(start) = rest.find(CSI) {
        let params_start = start + CSI.len();
        let Some(length) = rest[params_start..]
            .find(|c: char| !(c.is_ascii_digit() || c == ';' || c == ':'))
        else {
            rest.truncate(start);
            break;
        };
        let end = params_start + length;
        let final_byte = rest[end..].chars().next();
        if let Some(chord) =
            final_byte.and_then(|byte| KeyChord::from_csi(&rest[params_start..end], byte))
        {
            events.push(EnvironmentEvent::Shortcut(chord));
        }
        rest.replace_range(start..end + final_byte.map_or(0, char::len_utf8), "");
    }

    let mut cleaned = String::with_capacity(rest.len());
    for character in rest.chars() {
        match KeyChord::from_control_char(character) {
            Some(chord) => events.push(EnvironmentEvent::Shortcut(chord)),
            None if character.is_control() => {}
            None => cleaned.push(character),
        }
    }
    (events, cleaned)
}

/// The first Ctrl+C is a blocked shortcut like any other and only warns; a
/// second one, or SIGTERM, leaves the view.
fn on_interrupt(
    runner: &mut ExamRunner,
    interrupt: Interrupt,
    ctrl_c_warned: &mut bool,
) -> Flow {
    match interrupt {
        Interrupt::CtrlC if !*ctrl_c_warned => {
            *ctrl_c_warned = true;
            runner.report(EnvironmentEvent::Shortcut(KeyChord::ctrl('c')));
            println!("Press Ctrl+C again or type 'q' to leave the exam view.");
            Flow::Continue
        }
        Interrupt::CtrlC | Interrupt::Terminate => Flow::Leave,
    }
}

/// Strips environment signals out of `line`, reporting them, and returns the typed text.
fn typed_text(runner: &mut ExamRunner, line: &str) -> String {
    let (events, input) = scan_environment(line);
    for event in events {
        runner.report(event);
    }
    input
}

async fn confirm_submit<R>(
    runner: &mut ExamRunner,
    lines: &mut tokio::io::Lines<R>,
) -> Result<bool>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    prompt(SUBMIT_CONFIRMATION);
    let Some(answer) = lines.next_line().await? else {
        return Ok(false);
    };
    let answer = typed_text(runner, &answer);
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

async fn handle_line<R>(
    runner: &mut ExamRunner,
    line: &str,
    lines: &mut tokio::io::Lines<R>,
) -> Result<Flow>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let input = typed_text(runner, line);
    let controller = runner.controller().clone();
    let mut words = input.split_whitespace();
    let Some(command) = words.next() else {
        render(&controller.snapshot().await);
        return Ok(Flow::Continue);
    };
    let argument = words.next();

    match command.to_ascii_lowercase().as_str() {
        "n" => {
            controller.advance(Direction::Next).await;
            render(&controller.snapshot().await);
        }
        "p" => {
            controller.advance(Direction::Previous).await;
            render(&controller.snapshot().await);
        }
        "g" => match argument.and_then(|value| value.parse::<usize>().ok()) {
            Some(number) if number >= 1 => {
                controller.jump_to(number - 1).await;
                render(&controller.snapshot().await);
            }
            _ => println!("usage: g <question number>"),
        },
        "a" => match argument.map(str::parse::<OptionLetter>) {
            Some(Ok(option)) => match controller.answer_current(option).await {
                // The save settles in the background; its status shows on the next render.
                Ok(_save) => render(&controller.snapshot().await),
                Err(err) => println!("{}", exam_message(&err)),
            },
            Some(Err(err)) => println!("{err}"),
            None => println!("usage: a <A|B|C|D>"),
        },
        "s" => {
            let snapshot = controller.snapshot().await;
            if snapshot.unsaved_count > 0 {
                println!("{} answer(s) are not saved yet.", snapshot.unsaved_count);
            }
            if !confirm_submit(runner, lines).await? {
                println!("Submission cancelled.");
                return Ok(Flow::Continue);
            }
            // The countdown keeps running while the question is open.
            if controller.phase().await == SessionPhase::Submitted {
                println!("The exam was already submitted.");
                return Ok(Flow::Continue);
            }
            match controller.submit_session().await {
                Ok(SubmitOutcome::Submitted(session)) => {
                    if let Some(marks) = session.obtained_marks {
                        println!("Score: {marks}");
                    }
                }
                Ok(SubmitOutcome::AlreadyInFlight) => println!("Submission already in progress."),
                Err(err) => {
                    tracing::debug!(error = %err, "Manual submit failed");
                    println!("Submission failed; type 's' to try again.");
                }
            }
        }
        "r" => match controller.reload_questions().await {
            Ok(_) => render(&controller.snapshot().await),
            Err(err) => println!("{}", exam_message(&err)),
        },
        "h" | "?" => println!("{HELP}"),
        "q" => return Ok(Flow::Leave),
        other => println!("Unknown command '{other}'. Type 'h' for help."),
    }
    Ok(Flow::Continue)
}

fn render(snapshot: &ExamSnapshot) {
    let clock = format_countdown(snapshot.remaining_seconds);
    let clock = if snapshot.low_time { format!("{clock} (!)") } else { clock };
    println!();
    println!(
        "[{clock}] Question {}/{}  answered {}/{}  unsaved {}",
        (snapshot.current_index + 1).min(snapshot.total_questions),
        snapshot.total_questions,
        snapshot.answered_count,
        snapshot.total_questions,
        snapshot.unsaved_count
    );

    let Some(question) = &snapshot.current_question else {
        println!("No questions loaded. Type 'r' to retry.");
        return;
    };
    println!("{} ({} marks)", question.question_text, question.marks);
    for letter in OptionLetter::ALL {
        let marker = if snapshot.selected == Some(letter) { '>' } else { ' ' };
        println!(" {marker}{letter}) {}", question.option(letter));
    }
    match snapshot.current_save {
        Some(SaveStatus::Pending) => println!("saving..."),
        Some(SaveStatus::Saved) => println!("saved"),
        Some(SaveStatus::Failed) => println!("NOT SAVED"),
        None => {}
    }

    let navigator: Vec<String> = snapshot
        .navigator
        .iter()
        .enumerate()
        .map(|(index, status)| match status {
            NavigatorStatus::Current => format!("[{}]", index + 1),
            NavigatorStatus::Answered => format!(" {}*", index + 1),
            NavigatorStatus::Unanswered => format!(" {} ", index + 1),
        })
        .collect();
    println!("{}", navigator.join(""));
    if snapshot.submitting {
        println!("Submitting...");
    }
}

fn print_instructions(exam: &Exam) {
    println!("{}", exam.title);
    if let Some(description) = exam.description.as_deref() {
        println!("{description}");
    }
    println!(
        "Duration: {} minutes | Total marks: {} | Passing marks: {}",
        exam.duration_minutes, exam.total_marks, exam.passing_marks
    );
    if let Some(instructions) = exam.instructions.as_deref() {
        println!("Instructions: {instructions}");
    }
}

fn show(notification: &Notification) {
    let label = match notification.level {
        NotificationLevel::Success => "ok",
        NotificationLevel::Warning => "warning",
        NotificationLevel::Error => "error",
    };
    println!("[{label}] {}", notification.message);
}

fn drain(notifications: &mut mpsc::UnboundedReceiver<Notification>) {
    while let Ok(notification) = notifications.try_recv() {
        show(&notification);
    }
}

fn prompt(message: &str) {
    print!("{message}");
    if let Err(err) = std::io::stdout().flush() {
        tracing::debug!(error = %err, "stdout flush failed");
    }
}

fn exam_message(err: &ExamError) -> String {
    match err {
        ExamError::Api(api) => api.notification(),
        other => other.to_string(),
    }
}

fn start_failure(err: &ExamError) -> String {
    format!("Failed to start exam: {}", exam_message(err))
}
