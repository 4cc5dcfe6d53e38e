//! Leveled reporting sinks
//!
//! Every stage of a deployment reports through a [`ReportSink`]. The
//! pipeline never knows where messages end up: the process log, a live
//! HTML page, or a page buffered for email.

pub mod email;
pub mod markup;
pub mod page;
pub mod process;
pub mod smtp;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use email::{transport_for, EmailSink, MailMessage, MailTransport, SendmailTransport};
pub use page::{BufferOutput, PageOutput, PageSink, StreamOutput};
pub use process::ProcessSink;
pub use smtp::SmtpTransport;

/// Report severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Notice => "notice",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
            Level::Alert => "alert",
            Level::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for leveled report messages.
///
/// Implementors only provide [`ReportSink::report`]; the per-level
/// methods forward to it.
pub trait ReportSink: Send + Sync {
    /// Record one already formatted message.
    fn report(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.report(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.report(Level::Info, message);
    }

    fn notice(&self, message: &str) {
        self.report(Level::Notice, message);
    }

    fn warning(&self, message: &str) {
        self.report(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        self.report(Level::Error, message);
    }

    fn critical(&self, message: &str) {
        self.report(Level::Critical, message);
    }

    fn alert(&self, message: &str) {
        self.report(Level::Alert, message);
    }

    fn emergency(&self, message: &str) {
        self.report(Level::Emergency, message);
    }
}

/// Drops messages below a minimum severity before they reach the inner sink.
pub struct LevelFilter {
    inner: Arc<dyn ReportSink>,
    min_level: Level,
}

impl LevelFilter {
    pub fn new(inner: Arc<dyn ReportSink>, min_level: Level) -> Self {
        Self { inner, min_level }
    }
}

impl ReportSink for LevelFilter {
    fn report(&self, level: Level, message: &str) {
        if level >= self.min_level {
            self.inner.report(level, message);
        }
    }
}

/// Wrap `sink` so that quiet runs only see notices and above.
pub fn with_quiet(sink: Arc<dyn ReportSink>, quiet: bool) -> Arc<dyn ReportSink> {
    if quiet {
        Arc::new(LevelFilter::new(sink, Level::Notice))
    } else {
        sink
    }
}
