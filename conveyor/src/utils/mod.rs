//! Utility functions for UUID generation and timestamp handling.
//!
//! Timestamps on the wire are RFC3339 with second precision, matching the
//! format every stage writes into execution records and artifacts.

pub mod ids;
pub mod timestamps;

pub use ids::generate_uuid;
pub use timestamps::{now_utc, rfc3339_timestamp, unix_seconds, Timestamp};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_is_valid() {
        let id = generate_uuid();
        assert_eq!(uuid::Uuid::parse_str(&id).map(|u| u.get_version_num()), Ok(4));
    }

    #[test]
    fn test_rfc3339_timestamp_format() {
        let ts = rfc3339_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with('Z'));
    }
}
