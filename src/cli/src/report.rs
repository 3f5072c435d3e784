//! Progress reporting for CLI commands.

use std::io::Write;
use std::sync::Mutex;

use regferry_core::{Reporter, TracingReporter, TransferEvent};

/// Logs every event and prints integrity warnings to stderr.
pub struct CliReporter<W: Write + Send = std::io::Stderr> {
    warnings: Mutex<W>,
}

impl CliReporter {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> CliReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            warnings: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        match self.warnings.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Reporter for CliReporter<W> {
    fn report(&self, event: &TransferEvent) {
        TracingReporter.report(event);

        if let TransferEvent::DigestMismatch {
            subject,
            expected,
            calculated,
        } = event
        {
            if let Ok(mut w) = self.warnings.lock() {
                let _ = writeln!(
                    w,
                    "Warning: digest for {} does not match, pulled {}, calculated {}",
                    subject, expected, calculated
                );
            }
        }
    }
}
