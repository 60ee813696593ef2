//! SHA-256 checksums of migration bodies, for detecting edits to migrations
//! that were already applied.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 checksum of a migration body.
///
/// Line endings are normalized to `\n` first so a checkout with CRLF endings
/// hashes the same as the file that was originally applied.
pub fn compute_checksum(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.replace("\r\n", "\n").as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_hex_sha256() {
        let sum = compute_checksum("");
        assert_eq!(
            sum,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn checksum_ignores_line_ending_style() {
        let unix = "ALTER TABLE bookings ADD COLUMN IF NOT EXISTS camera_id TEXT;\n";
        let windows = "ALTER TABLE bookings ADD COLUMN IF NOT EXISTS camera_id TEXT;\r\n";
        assert_eq!(compute_checksum(unix), compute_checksum(windows));
    }

    #[test]
    fn checksum_changes_with_content() {
        assert_ne!(compute_checksum("SELECT 1"), compute_checksum("SELECT 2"));
    }
}
