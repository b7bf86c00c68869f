//! Timeline distribution of events over a date range.

use chrono::NaiveDate;

use crate::event::Event;

/// Bucket `events` by the date of their first observation over the inclusive
/// range `start..=end`, normalized so the busiest bucket is `1.0`.
///
/// Events without geometry or outside the range are ignored. Returns all
/// zeros when no event falls in the range.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn distribution(events: &[Event], start: NaiveDate, end: NaiveDate, buckets: usize) -> Vec<f64> {
    let mut counts = vec![0_u32; buckets];
    let total_days = (end - start).num_days() + 1;
    if buckets == 0 || total_days <= 0 {
        return vec![0.0; buckets];
    }

    for event in events {
        let Some(geometry) = event.first_geometry() else {
            continue;
        };
        let offset = (geometry.date.date_naive() - start).num_days();
        if offset < 0 || offset >= total_days {
            continue;
        }
        let index = (offset as f64 / total_days as f64 * buckets as f64).floor() as usize;
        if let Some(count) = counts.get_mut(index) {
            *count += 1;
        }
    }

    let max = counts.iter().copied().max().unwrap_or(0).max(1);
    counts
        .into_iter()
        .map(|count| f64::from(count) / f64::from(max))
        .collect()
}
