//! Multi-key stable sorter.

use crate::condition::{SortCondition, SortDirection};
use crate::record::Record;
use crate::schema::ViewSchema;
use std::cmp::Ordering;

/// Sorts records by each condition in turn, later conditions breaking ties
/// left by earlier ones. The sort is stable, so records tied on every key
/// keep their input order.
pub fn sort_records<R: Record>(mut records: Vec<R>, sorts: &[SortCondition], schema: &ViewSchema) -> Vec<R> {
    if sorts.is_empty() {
        return records;
    }
    records.sort_by(|a, b| compare_records(a, b, sorts, schema));
    records
}

/// Compares two records under the given sort keys.
pub fn compare_records<R: Record>(a: &R, b: &R, sorts: &[SortCondition], schema: &ViewSchema) -> Ordering {
    for sort in sorts {
        let ordering = schema
            .comparer(&sort.field)
            .compare(a.field(&sort.field), b.field(&sort.field));
        let ordering = match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
