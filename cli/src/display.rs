use anyhow::Result;
use console::style;
use convoy_core::orchestrator::{Orchestrator, ProgressStatus};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing::warn;

const BAR_WIDTH: usize = 70;
const ORANGE: u8 = 208;

/// `google/gemini-2.5-flash-preview-05-20` becomes `GEMINI-2.5-FLASH HEAVY`.
pub fn model_header(model: &str) -> String {
    let name = model.rsplit('/').next().unwrap_or(model);
    let parts: Vec<&str> = name.split('-').collect();
    let short = if parts.len() >= 3 {
        parts[..3].join("-")
    } else {
        name.to_string()
    };
    format!("{} HEAVY", short.to_uppercase())
}

pub fn format_time(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{secs}S")
    } else if secs < 3600 {
        format!("{}M{}S", secs / 60, secs % 60)
    } else {
        format!("{}H{}M", secs / 3600, (secs % 3600) / 60)
    }
}

fn progress_bar(status: &ProgressStatus) -> String {
    let idle = "·".repeat(BAR_WIDTH);
    match status {
        ProgressStatus::Queued => format!("○ {idle}"),
        ProgressStatus::Initializing => format!("{} {idle}", style("◐").color256(ORANGE)),
        ProgressStatus::Processing => format!(
            "{} {}{}",
            style("●").color256(ORANGE),
            style(":".repeat(10)).color256(ORANGE),
            "·".repeat(BAR_WIDTH - 10)
        ),
        ProgressStatus::Completed => format!(
            "{} {}",
            style("●").color256(ORANGE),
            style(":".repeat(BAR_WIDTH)).color256(ORANGE)
        ),
        ProgressStatus::Failed(_) => format!(
            "{} {}",
            style("✗").red(),
            style("×".repeat(BAR_WIDTH)).red()
        ),
    }
}

fn draw(
    out: &mut impl Write,
    header: &str,
    elapsed: Duration,
    orchestrator: &Orchestrator,
    running: bool,
) -> io::Result<()> {
    execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;

    let snapshot = orchestrator.progress_snapshot();
    let state = if running { "RUNNING" } else { "COMPLETED" };

    writeln!(out, "{}", style(header).bold())?;
    writeln!(out, "● {} • {}", state, format_time(elapsed))?;
    writeln!(out)?;
    for id in 0..orchestrator.num_agents() {
        let status = snapshot.get(&id).unwrap_or(&ProgressStatus::Queued);
        writeln!(out, "AGENT {:02}  {}", id + 1, progress_bar(status))?;
    }
    writeln!(out)?;
    out.flush()
}

/// Polls `run` to completion, calling `redraw` every second and once more at the end. A failed
/// redraw is logged and the run keeps going.
async fn drive<T, W: Write>(
    run: impl Future<Output = T>,
    out: &mut W,
    mut redraw: impl FnMut(&mut W, bool) -> io::Result<()>,
) -> T {
    tokio::pin!(run);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    let output = loop {
        tokio::select! {
            output = &mut run => break output,
            _ = ticker.tick() => {
                if let Err(e) = redraw(out, true) {
                    warn!("Progress redraw failed: {}", e);
                }
            }
        }
    };
    if let Err(e) = redraw(out, false) {
        warn!("Progress redraw failed: {}", e);
    }
    output
}

/// Runs one orchestration while redrawing the agent table every second, then prints the answer.
pub async fn run_with_progress(
    orchestrator: &Orchestrator,
    model: &str,
    query: &str,
) -> Result<String> {
    let header = model_header(model);
    let started = Instant::now();

    let answer = drive(
        orchestrator.orchestrate(query),
        &mut io::stdout(),
        |out, running| draw(out, &header, started.elapsed(), orchestrator, running),
    )
    .await;

    let rule = "=".repeat(80);
    println!("{rule}");
    println!("FINAL RESULTS");
    println!("{rule}");
    println!();
    println!("{answer}");
    println!();
    println!("{rule}");

    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_keeps_first_three_name_parts() {
        assert_eq!(
            model_header("google/gemini-2.5-flash-preview-05-20"),
            "GEMINI-2.5-FLASH HEAVY"
        );
        assert_eq!(model_header("openai/gpt-4o"), "GPT-4O HEAVY");
        assert_eq!(model_header("local"), "LOCAL HEAVY");
    }

    #[test]
    fn time_formats() {
        assert_eq!(format_time(Duration::from_secs(45)), "45S");
        assert_eq!(format_time(Duration::from_secs(192)), "3M12S");
        assert_eq!(format_time(Duration::from_secs(3840)), "1H4M");
    }

    #[test]
    fn queued_bar_is_uncoloured() {
        assert_eq!(
            progress_bar(&ProgressStatus::Queued),
            format!("○ {}", "·".repeat(BAR_WIDTH))
        );
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[tokio::test]
    async fn failed_redraws_do_not_cancel_the_run() {
        let mut redraws = Vec::new();
        let run = async {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            "answer"
        };

        let answer = drive(run, &mut ClosedPipe, |out, running| {
            redraws.push(running);
            writeln!(out, "frame")
        })
        .await;

        assert_eq!(answer, "answer");
        assert!(redraws.iter().filter(|running| **running).count() >= 2);
        assert_eq!(redraws.last(), Some(&false));
    }
}
