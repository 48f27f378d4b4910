//! Field selection and ordering.

use hanjadeck_shared::Record;

/// Rebuild every record with only the keys of `key_order`, in that order.
///
/// Keys a record lacks are skipped.
pub fn project(records: &[Record], key_order: &[String]) -> Vec<Record> {
    records.iter().map(|record| record.select(key_order)).collect()
}
