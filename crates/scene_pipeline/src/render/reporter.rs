//! Non-fatal problem reporting for the cull and sort stages

use log::{error, warn};

/// Receives problems found while a pass runs. Passes never fail; they report
/// and carry on.
pub trait ErrorReporter: Send + Sync {
    /// Something unexpected was skipped
    fn warning(&self, message: &str);

    /// Something went wrong but the pass continued
    fn error(&self, message: &str);
}

/// Forwards reports to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorReporter;

impl ErrorReporter for LogErrorReporter {
    fn warning(&self, message: &str) {
        warn!("{}", message);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}
