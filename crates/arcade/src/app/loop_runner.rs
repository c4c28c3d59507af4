use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use progression::{Clock, Store};
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::console::{ConsoleCommandProcessor, LineOutcome};
use super::session::{Intent, Session};

const PROMPT: &str = "> ";

pub(crate) fn run(mut app: AppWiring) -> ExitCode {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = run_lines(
        &app.processor,
        &mut app.session,
        stdin.lock(),
        &mut stdout.lock(),
    );
    if let Err(err) = result {
        error!(error = %err, "console_io_failed");
        return ExitCode::FAILURE;
    }

    info!(
        storage_degraded = app.session.engine().storage_degraded(),
        "session_ended"
    );
    ExitCode::SUCCESS
}

/// Feeds every input line through the console until `quit` or end of input.
pub(crate) fn run_lines<S, C, R, W>(
    processor: &ConsoleCommandProcessor,
    session: &mut Session<S, C>,
    input: R,
    output: &mut W,
) -> io::Result<()>
where
    S: Store,
    C: Clock,
    R: BufRead,
    W: Write,
{
    write_lines(output, &session.apply(Intent::Hud))?;
    write!(output, "{PROMPT}")?;
    output.flush()?;

    let mut lines = Vec::new();
    for line in input.lines() {
        let line = line?;
        lines.clear();
        match processor.process_line(&line, &mut lines) {
            LineOutcome::Handled => {}
            LineOutcome::Intent(intent) => lines.extend(session.apply(intent)),
            LineOutcome::Quit => {
                writeln!(output, "Bye!")?;
                return Ok(());
            }
        }
        write_lines(output, &lines)?;
        write!(output, "{PROMPT}")?;
        output.flush()?;
    }
    writeln!(output)?;
    Ok(())
}

fn write_lines<W: Write>(output: &mut W, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(output, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use progression::{keys, CalendarDate, EngineConfig, FileStore, ManualClock, ProgressionEngine};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    use super::*;

    fn file_session(dir: &TempDir, clock: &ManualClock) -> Session<FileStore, ManualClock> {
        let store = FileStore::open(dir.path()).expect("open store");
        let engine = ProgressionEngine::open(store, clock.clone(), EngineConfig::default());
        Session::new(engine, StdRng::seed_from_u64(9))
    }

    fn play(session: &mut Session<FileStore, ManualClock>, script: &str) -> String {
        let processor = ConsoleCommandProcessor::new();
        let mut output = Vec::new();
        run_lines(&processor, session, Cursor::new(script), &mut output).expect("run script");
        String::from_utf8(output).expect("utf8")
    }

    #[test]
    fn scripted_session_persists_to_disk() {
        let dir = TempDir::new().expect("temp");
        let clock = ManualClock::at_date(CalendarDate::from_ymd(2026, 10, 18).expect("date"));

        let mut session = file_session(&dir, &clock);
        let transcript = play(
            &mut session,
            "mirror yes\ndesk \"Paid the phone bill\"\ncouch\nquit\ndesk ignored\n",
        );
        assert!(transcript.starts_with("Level 1  XP 0/100 (0%)  Streak 0\n"));
        assert!(transcript.contains("Streak: 1 day(s). Keep it going!\n"));
        assert!(transcript.contains("Logged for 2026-10-18: Paid the phone bill\n"));
        assert!(transcript.ends_with("Bye!\n"));
        assert!(!transcript.contains("ignored"));

        let mut reopened = file_session(&dir, &clock);
        assert_eq!(reopened.engine().xp(), 5);
        assert_eq!(reopened.engine().streak(), 1);
        assert!(reopened
            .engine()
            .store()
            .load(keys::DAILY_LOG_INDEX)
            .expect("load")
            .is_some());

        let transcript = play(&mut reopened, "mirror yes\n");
        assert!(transcript.contains("You already reflected today. Come back tomorrow!"));
    }

    #[test]
    fn parse_errors_are_printed_and_play_continues() {
        let dir = TempDir::new().expect("temp");
        let clock = ManualClock::at_date(CalendarDate::from_ymd(2026, 10, 18).expect("date"));
        let mut session = file_session(&dir, &clock);

        let transcript = play(&mut session, "dance\nhud\n");
        assert!(transcript.contains("error: unknown command 'dance'. try: help\n"));
        assert_eq!(transcript.matches("Level 1").count(), 2);
    }
}
