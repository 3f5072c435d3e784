//! Formatting helpers for CLI output.

use regferry_transfer::Digest;

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// First 12 hex characters of a digest, as image tools abbreviate IDs.
pub fn short_digest(digest: &Digest) -> &str {
    let hex = digest.encoded();
    &hex[..hex.len().min(12)]
}
