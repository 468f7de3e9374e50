use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub level: Level,
    pub message: String,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            Level::Info => "INFO",
            Level::Error => "ERROR",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Shown lines kept for scrollback; unseen lines are never dropped.
pub const HISTORY: usize = 200;

/// On-screen status area. Every line is mirrored to `tracing`.
#[derive(Debug, Default)]
pub struct StatusLog {
    lines: Vec<StatusLine>,
    shown: usize,
}

impl StatusLog {
    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.push(Level::Info, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{message}");
        self.push(Level::Error, message);
    }

    fn push(&mut self, level: Level, message: String) {
        self.lines.push(StatusLine { level, message });
        let excess = self.lines.len().saturating_sub(HISTORY).min(self.shown);
        if excess > 0 {
            self.lines.drain(..excess);
            self.shown -= excess;
        }
    }

    pub fn lines(&self) -> &[StatusLine] {
        &self.lines
    }

    pub fn last(&self) -> Option<&StatusLine> {
        self.lines.last()
    }

    pub fn errors(&self) -> impl Iterator<Item = &StatusLine> {
        self.lines.iter().filter(|l| l.level == Level::Error)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.message.contains(needle))
    }

    /// Lines added since the previous call.
    pub fn take_unseen(&mut self) -> Vec<StatusLine> {
        let fresh = self.lines[self.shown..].to_vec();
        self.shown = self.lines.len();
        fresh
    }
}
