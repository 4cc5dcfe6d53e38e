//! Process log sink

use tracing::{debug, error, info, warn};

use crate::report::markup;
use crate::report::{Level, ReportSink};

/// Forwards reports to the process log, with color markers stripped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSink;

impl ReportSink for ProcessSink {
    fn report(&self, level: Level, message: &str) {
        let message = markup::strip(message);
        match level {
            Level::Debug => debug!("{}", message),
            Level::Info => info!("{}", message),
            Level::Notice => info!(severity = "notice", "{}", message),
            Level::Warning => warn!("{}", message),
            Level::Error => error!("{}", message),
            Level::Critical | Level::Alert | Level::Emergency => {
                error!(severity = level.as_str(), "{}", message)
            }
        }
    }
}
