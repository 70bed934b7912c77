use std::io::Write;

use owo_colors::OwoColorize;
use owo_colors::Style;
use parlor_core::LogEntry;
use parlor_core::LogView;
use parlor_core::render::EntryOrigin;
use parlor_core::render::StatusLine;

/// Line-oriented [`LogView`] for a terminal. Every entry is one line; the
/// status line is printed whenever it changes.
pub struct TerminalView<W: Write + Send> {
    out: W,
    own: Style,
    other: Style,
    timestamp: Style,
    status: Style,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn styled(out: W) -> Self {
        Self {
            out,
            own: Style::new().cyan(),
            other: Style::new().bold(),
            timestamp: Style::new().dimmed(),
            status: Style::new().dimmed().italic(),
        }
    }

    pub fn plain(out: W) -> Self {
        Self {
            out,
            own: Style::new(),
            other: Style::new(),
            timestamp: Style::new(),
            status: Style::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> LogView for TerminalView<W> {
    fn append(&mut self, entry: &LogEntry) {
        let author = match entry.origin {
            EntryOrigin::Own => self.own,
            EntryOrigin::Other => self.other,
        };
        let _ = writeln!(
            self.out,
            "{} {}: {}",
            format!("[{}]", entry.timestamp).style(self.timestamp),
            entry.author.style(author),
            entry.content
        );
    }

    fn scroll_to_latest(&mut self) {
        let _ = self.out.flush();
    }

    fn set_status(&mut self, status: &StatusLine) {
        let _ = writeln!(self.out, "{}", format!("-- {status} --").style(self.status));
        let _ = self.out.flush();
    }
}
