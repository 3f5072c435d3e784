//! Digest verification of fetched content.

use regferry_core::error::{FerryError, Result};
use regferry_core::{IntegrityPolicy, Reporter, TransferEvent};

use crate::oci::Digest;

/// Compare a declared digest with the one computed over the received bytes.
///
/// Under [`IntegrityPolicy::Warn`] a mismatch is reported and processing
/// continues; under [`IntegrityPolicy::Enforce`] it is an error.
pub fn verify_digest(
    policy: IntegrityPolicy,
    reporter: &dyn Reporter,
    subject: &str,
    expected: &Digest,
    calculated: &Digest,
) -> Result<()> {
    if expected == calculated {
        return Ok(());
    }
    match policy {
        IntegrityPolicy::Warn => {
            reporter.report(&TransferEvent::DigestMismatch {
                subject: subject.to_string(),
                expected: expected.to_string(),
                calculated: calculated.to_string(),
            });
            Ok(())
        }
        IntegrityPolicy::Enforce => Err(FerryError::DigestMismatch {
            subject: subject.to_string(),
            expected: expected.to_string(),
            found: calculated.to_string(),
        }),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingReporter;
    use super::*;
    use regferry_core::DigestAlgorithm;

    fn digests() -> (Digest, Digest) {
        (
            Digest::from_bytes(DigestAlgorithm::Sha256, b"declared"),
            Digest::from_bytes(DigestAlgorithm::Sha256, b"received"),
        )
    }

    #[test]
    fn test_match_is_silent() {
        let reporter = RecordingReporter::default();
        let (a, _) = digests();
        verify_digest(IntegrityPolicy::Enforce, &reporter, "config", &a, &a).unwrap();
        assert!(reporter.events.lock().is_empty());
    }

    #[test]
    fn test_warn_reports_and_continues() {
        let reporter = RecordingReporter::default();
        let (expected, calculated) = digests();
        verify_digest(IntegrityPolicy::Warn, &reporter, "config", &expected, &calculated).unwrap();

        let events = reporter.events.lock();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_warning());
        assert!(matches!(
            &events[0],
            TransferEvent::DigestMismatch { subject, .. } if subject == "config"
        ));
    }

    #[test]
    fn test_enforce_fails() {
        let reporter = RecordingReporter::default();
        let (expected, calculated) = digests();
        let err = verify_digest(
            IntegrityPolicy::Enforce,
            &reporter,
            "layer 0",
            &expected,
            &calculated,
        )
        .unwrap_err();
        assert!(matches!(err, FerryError::DigestMismatch { .. }));
        assert!(reporter.events.lock().is_empty());
    }
}
