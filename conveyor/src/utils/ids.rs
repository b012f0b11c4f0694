//! Identifier generation.

use uuid::Uuid;

/// Generates a new random v4 UUID as a string.
///
/// Jobs, executions, schedules, adapters, and queue messages all carry
/// string ids in this format.
#[must_use]
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}
