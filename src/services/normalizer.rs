//! Name normalization for raw extraction responses
//!
//! The extraction service replies with free text; the only structure assumed
//! here is "one candidate name per line". Everything else is defensive:
//! whitespace is trimmed, empty and too-short lines are dropped, and
//! duplicates within one capture collapse to a single occurrence unless the
//! duplicate-counting policy is enabled.

use crate::infra::config::Config;
use std::collections::HashSet;

/// Turns a raw model reply into the list of names to record for one capture
#[derive(Debug, Clone)]
pub struct Normalizer {
    min_name_len: usize,
    count_duplicates: bool,
}

impl Normalizer {
    pub fn new(min_name_len: usize, count_duplicates: bool) -> Self {
        Self { min_name_len, count_duplicates }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.min_name_len(), config.count_duplicates())
    }

    /// Normalize a raw response into candidate names, preserving first-seen
    /// order. Returns an empty list when nothing survives (surfaced upstream
    /// as "no names found").
    pub fn normalize(&self, raw: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for line in raw.lines() {
            let name = line.trim();
            if name.is_empty() || name.chars().count() < self.min_name_len {
                continue;
            }
            if self.count_duplicates || seen.insert(name.to_string()) {
                names.push(name.to_string());
            }
        }

        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_normalizer() -> Normalizer {
        Normalizer::new(2, false)
    }

    #[test]
    fn test_trims_and_drops_empty_lines() {
        let names = default_normalizer().normalize("  Alice  \n\n\t\nBob\n   \n");
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_intra_capture_duplicates_collapse_once() {
        let names = default_normalizer().normalize("Alice\nBob\n\nAlice");
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_count_duplicates_policy_keeps_repeats() {
        let normalizer = Normalizer::new(2, true);
        let names = normalizer.normalize("Alice\nBob\n\nAlice");
        assert_eq!(names, vec!["Alice", "Bob", "Alice"]);
    }

    #[test]
    fn test_min_name_len_filter() {
        let names = default_normalizer().normalize("A\nAl\n山\n山田");
        // Single-character lines are dropped, two characters survive
        assert_eq!(names, vec!["Al", "山田"]);
    }

    #[test]
    fn test_crlf_lines() {
        let names = default_normalizer().normalize("Alice\r\nBob\r\n");
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let normalizer = default_normalizer();
        let first = normalizer.normalize("  Carol \nAlice\n\nCarol\nBob ");
        let second = normalizer.normalize(&first.join("\n"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_response_yields_no_names() {
        assert!(default_normalizer().normalize("").is_empty());
        assert!(default_normalizer().normalize("\n \n\t\n").is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let names = default_normalizer().normalize("Zoe\nAlice\nMark");
        assert_eq!(names, vec!["Zoe", "Alice", "Mark"]);
    }
}
