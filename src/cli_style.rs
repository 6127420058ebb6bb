use crate::log_export::{JobSnapshot, JobStatus};
use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Color as CtColor, Stylize};

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job Status Rendering
// ═══════════════════════════════════════════════════════════════════════════════

fn status_color(status: &JobStatus) -> CtColor {
    match status {
        JobStatus::InProgress => CtColor::Yellow,
        JobStatus::Completed | JobStatus::FileExists(_) => CtColor::Green,
        JobStatus::Failed(_) => CtColor::Red,
    }
}

pub fn styled_status(status: &JobStatus) -> String {
    status
        .to_string()
        .with(status_color(status))
        .bold()
        .to_string()
}

/// One line per job: right-aligned id, status, last update time.
pub fn format_job_row(job: &JobSnapshot) -> String {
    format!(
        "{:>6}  {}  {}",
        job.id,
        styled_status(&job.status),
        job.updated_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .with(CtColor::DarkGrey)
    )
}
