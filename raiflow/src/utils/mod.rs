//! Utility functions for identifiers, timestamps and content digests.

pub mod digest;
pub mod timestamps;

pub use digest::{canonical_json, canonical_json_of, compute_digest, sha256_hex};
pub use timestamps::{
    elapsed_ms, format_iso8601, format_rfc3339_millis, iso_timestamp, now_utc, Timestamp,
};

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates a new UUID v7 (time-ordered), used for run and invocation ids.
#[must_use]
pub fn generate_uuid_v7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_is_valid() {
        let id = generate_uuid();
        assert_eq!(id.get_version_num(), 4);
    }

    #[test]
    fn test_generate_uuid_v7_version() {
        assert_eq!(generate_uuid_v7().get_version_num(), 7);
    }
}
