//! Cache generation naming.
//!
//! A generation name is `{prefix}-{version}-{stamp}`. The stamp is either a
//! calendar date or a short digest of the build id.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the build digest.
const BUILD_STAMP_LEN: usize = 12;

/// Compose a generation name from its parts.
pub fn generation_name(prefix: &str, version: &str, stamp: &str) -> String {
    format!("{prefix}-{version}-{stamp}")
}

/// Calendar stamp: `YYYY-MM-DD`.
pub fn calendar_stamp(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Build stamp: leading hex of SHA-256 over the build id.
pub fn build_stamp(build_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(build_id.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(BUILD_STAMP_LEN);
    digest
}
