//! Attendance roster - the session's running attendee tally
//!
//! The roster maps each attendee name to the epoch-ms timestamps of the
//! captures it appeared in. Counts only grow during a session; the roster is
//! cleared only by an explicit reset.

use chrono::{TimeZone, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;
use smallvec::SmallVec;

/// Capture history for one attendee. The appearance count is the number of
/// stored timestamps.
#[derive(Debug, Clone, Default)]
pub struct Sighting {
    times: SmallVec<[u64; 4]>,
}

impl Sighting {
    #[inline]
    pub fn count(&self) -> u64 {
        self.times.len() as u64
    }

    pub fn first_seen(&self) -> u64 {
        self.times.first().copied().unwrap_or(0)
    }

    pub fn last_seen(&self) -> u64 {
        self.times.last().copied().unwrap_or(0)
    }

    pub fn times(&self) -> &[u64] {
        &self.times
    }
}

/// What one `record` call did to the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Names recorded from this capture
    pub seen: usize,
    /// Names that were not in the roster before this capture
    pub new_names: usize,
}

/// One row of the rendered/exported tally, sorted alphabetically by name
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AttendeeRow {
    pub name: String,
    pub count: u64,
    /// First sighting (epoch ms)
    pub first_seen: u64,
    /// Most recent sighting (epoch ms)
    pub last_seen: u64,
    /// All sightings (epoch ms)
    pub times: Vec<u64>,
}

/// Running tally mapping each distinct attendee name to its sightings.
///
/// Invariants: every present key has count >= 1, count equals the number of
/// stored timestamps, and entries are never decremented or removed except by
/// `clear`.
#[derive(Debug, Default)]
pub struct Roster {
    attendees: FxHashMap<String, Sighting>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct attendees
    pub fn len(&self) -> usize {
        self.attendees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attendees.is_empty()
    }

    /// Total sightings across all attendees
    pub fn total_sightings(&self) -> u64 {
        self.attendees.values().map(Sighting::count).sum()
    }

    /// Appearance count for a name (0 if absent)
    pub fn count(&self, name: &str) -> u64 {
        self.attendees.get(name).map(Sighting::count).unwrap_or(0)
    }

    /// Record one capture: every name in `names` gets `ts` appended to its
    /// history, creating the entry on first sight. Names absent from this
    /// capture are untouched. Re-recording the same capture adds the same
    /// increment again.
    pub fn record(&mut self, names: &[String], ts: u64) -> RecordOutcome {
        let mut new_names = 0;
        for name in names {
            let sighting = self.attendees.entry(name.clone()).or_insert_with(|| {
                new_names += 1;
                Sighting::default()
            });
            sighting.times.push(ts);
        }
        RecordOutcome { seen: names.len(), new_names }
    }

    /// Rendered rows, sorted alphabetically by name (the session's stable
    /// display and export order)
    pub fn rows(&self) -> Vec<AttendeeRow> {
        let mut rows: Vec<AttendeeRow> = self
            .attendees
            .iter()
            .map(|(name, s)| AttendeeRow {
                name: name.clone(),
                count: s.count(),
                first_seen: s.first_seen(),
                last_seen: s.last_seen(),
                times: s.times().to_vec(),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Clear the roster back to empty (explicit user reset)
    pub fn clear(&mut self) {
        self.attendees.clear();
    }
}

/// Format an epoch-ms timestamp as `YYYY-MM-DD HH:MM:SS` UTC
pub fn format_ts(epoch_ms: u64) -> String {
    match Utc.timestamp_millis_opt(epoch_ms as i64) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_record_creates_and_increments() {
        let mut roster = Roster::new();
        let outcome = roster.record(&names(&["Alice", "Bob"]), 1000);
        assert_eq!(outcome, RecordOutcome { seen: 2, new_names: 2 });

        let outcome = roster.record(&names(&["Bob", "Carol"]), 2000);
        assert_eq!(outcome, RecordOutcome { seen: 2, new_names: 1 });

        assert_eq!(roster.count("Alice"), 1);
        assert_eq!(roster.count("Bob"), 2);
        assert_eq!(roster.count("Carol"), 1);
        assert_eq!(roster.count("Dave"), 0);
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.total_sightings(), 4);
    }

    #[test]
    fn test_count_matches_event_membership() {
        // Final count for a name equals the number of captures containing it
        let captures = [
            names(&["Alice", "Bob"]),
            names(&["Bob"]),
            names(&["Alice", "Bob", "Carol"]),
            names(&["Carol"]),
        ];
        let mut roster = Roster::new();
        for (i, capture) in captures.iter().enumerate() {
            roster.record(capture, 1000 + i as u64);
        }

        for name in ["Alice", "Bob", "Carol"] {
            let expected = captures.iter().filter(|c| c.contains(&name.to_string())).count() as u64;
            assert_eq!(roster.count(name), expected, "count mismatch for {name}");
        }
    }

    #[test]
    fn test_resubmission_is_not_idempotent() {
        let mut roster = Roster::new();
        roster.record(&names(&["Alice"]), 1000);
        roster.record(&names(&["Alice"]), 1000);
        assert_eq!(roster.count("Alice"), 2);
    }

    #[test]
    fn test_count_equals_times_len() {
        let mut roster = Roster::new();
        roster.record(&names(&["Alice", "Bob"]), 1000);
        roster.record(&names(&["Alice"]), 2000);
        for row in roster.rows() {
            assert_eq!(row.count as usize, row.times.len());
            assert!(row.count >= 1);
        }
    }

    #[test]
    fn test_rows_sorted_by_name() {
        let mut roster = Roster::new();
        roster.record(&names(&["Carol", "Alice", "Bob"]), 1000);
        let rows = roster.rows();
        let sorted: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(sorted, vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn test_first_and_last_seen() {
        let mut roster = Roster::new();
        roster.record(&names(&["Alice"]), 1000);
        roster.record(&names(&["Alice"]), 3000);
        roster.record(&names(&["Alice"]), 2000);
        let rows = roster.rows();
        assert_eq!(rows[0].first_seen, 1000);
        assert_eq!(rows[0].last_seen, 2000);
        assert_eq!(rows[0].times, vec![1000, 3000, 2000]);
    }

    #[test]
    fn test_clear() {
        let mut roster = Roster::new();
        roster.record(&names(&["Alice"]), 1000);
        roster.clear();
        assert!(roster.is_empty());
        assert_eq!(roster.count("Alice"), 0);
    }

    #[test]
    fn test_format_ts() {
        assert_eq!(format_ts(0), "1970-01-01 00:00:00");
        assert_eq!(format_ts(1700000000000), "2023-11-14 22:13:20");
    }
}
