//! Identity types for FinanBoard records

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Record identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, so IDs sort in creation order.
pub type EntityId = Uuid;

/// Identifier of the user that owns a record.
///
/// Ownership is enforced by the hosted store's row-level policies; the data
/// layer only uses it to scope queries.
pub type OwnerId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Monetary amount in minor units (cents). Never a float.
pub type Cents = i64;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Format cents as a plain decimal string, e.g. `-1234` → `"-12.34"`.
pub fn format_cents(amount: Cents) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_id_is_v7() {
        assert_eq!(new_entity_id().get_version_num(), 7);
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(123_456), "1234.56");
        assert_eq!(format_cents(-1234), "-12.34");
    }
}
