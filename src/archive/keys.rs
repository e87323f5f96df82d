//! Archive key naming and ordering.
//!
//! Every uploaded artifact is named `<prefix>_<YYYYMMDDHHMMSS>_<firstid>_
//! <lastid>.csv`, encoding its creation time and the contiguous id range
//! it covers. Objects are immutable once created.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

/// Keys that don't match this shape (manually uploaded or malformed
/// objects) are silently excluded from archive scans.
static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\d{14}_\d+_\d+\.csv$").expect("static pattern"));

/// Format the object key for one uploaded batch.
pub fn build_key(prefix: &str, timestamp: DateTime<Utc>, first_id: i64, last_id: i64) -> String {
    format!(
        "{}_{}_{}_{}.csv",
        prefix,
        timestamp.format("%Y%m%d%H%M%S"),
        first_id,
        last_id
    )
}

/// Retain well-formed archive keys and order them oldest to newest.
///
/// The sort key is the substring after the first underscore. The 14-digit
/// timestamp section is fixed width, so lexicographic ordering agrees
/// with chronological ordering; the trailing ids are not zero-padded,
/// which only matters for distinct batches created in the same second.
pub fn filter_and_sort(raw_keys: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut entries: Vec<(String, String)> = raw_keys
        .into_iter()
        .filter(|key| KEY_PATTERN.is_match(key))
        .map(|key| {
            let sortable = key
                .split_once('_')
                .map(|(_, rest)| rest.to_string())
                .unwrap_or_else(|| key.clone());
            (sortable, key)
        })
        .collect();

    entries.sort();
    entries.into_iter().map(|(_, key)| key).collect()
}
