//! Terminal rendering of progress events.
//!
//! Progress goes to stderr. Stdout carries only what scripts consume: binary
//! paths and shell snippets.

use super::{Action, ProgressEvent, Severity};
use colored::Colorize;
use std::io::{self, IsTerminal, Write};

/// Something that can show progress events to the user.
pub trait Render: Send {
    fn render(&mut self, event: &ProgressEvent) -> io::Result<()>;
}

/// Line-oriented renderer with optional colors.
///
/// ```text
/// update: Loading channel mapping ...
/// update: 1.1 stable is 1.1.0
/// self-update: warning: github werf/multiwerf: no releases found
/// ```
pub struct TextRenderer<W: Write + Send> {
    out: W,
    color: bool,
    quiet: bool,
}

impl TextRenderer<io::Stderr> {
    /// Render to stderr, colored when stderr is a terminal.
    pub fn stderr() -> Self {
        let color = io::stderr().is_terminal();
        Self::new(io::stderr(), color)
    }
}

impl<W: Write + Send> TextRenderer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            quiet: false,
        }
    }

    /// Only show warnings and failures.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn format(&self, event: &ProgressEvent) -> Option<String> {
        if event.text.is_empty() && event.comment.is_none() {
            return None;
        }
        if self.quiet && event.severity == Severity::Ok {
            return None;
        }

        let stage = if self.color {
            event.stage.bold().to_string()
        } else {
            event.stage.clone()
        };

        let text = match (event.severity, self.color) {
            (Severity::Ok, _) => event.text.clone(),
            (Severity::Warn, true) => format!("{} {}", "warning:".yellow().bold(), event.text),
            (Severity::Warn, false) => format!("warning: {}", event.text),
            (Severity::Fail, true) => format!("{} {}", "failed:".red().bold(), event.text.red()),
            (Severity::Fail, false) => format!("failed: {}", event.text),
        };
        let text = if event.debug && self.color {
            text.dimmed().to_string()
        } else {
            text
        };
        let ellipsis = if event.action == Some(Action::Continue) { " ..." } else { "" };

        let mut line = if event.text.is_empty() {
            String::new()
        } else {
            format!("{stage}: {text}{ellipsis}\n")
        };
        if let Some(comment) = &event.comment {
            for comment_line in comment.lines() {
                let comment_line = if self.color {
                    comment_line.dimmed().to_string()
                } else {
                    comment_line.to_string()
                };
                line.push_str(&format!("  {comment_line}\n"));
            }
        }
        Some(line)
    }
}

impl<W: Write + Send> Render for TextRenderer<W> {
    fn render(&mut self, event: &ProgressEvent) -> io::Result<()> {
        if let Some(line) = self.format(event) {
            self.out.write_all(line.as_bytes())?;
            self.out.flush()?;
        }
        Ok(())
    }
}
