//! Attendance export - writes the roster tally to a delimited text file
//!
//! One row per attendee with header `name,count,first_seen,times`, comma
//! delimited by default (configurable), UTF-8, newline-terminated rows.
//! Rows are alphabetical by name. Exporting an empty roster is an error,
//! matching the interactive surfaces which refuse the action with no data.

use crate::domain::roster::{format_ts, AttendeeRow};
use crate::infra::config::Config;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("roster is empty, nothing to export")]
    EmptyRoster,
    #[error("failed to write export file: {0}")]
    Io(#[from] std::io::Error),
}

/// Export writer for the attendance tally
pub struct Exporter {
    dir: PathBuf,
    delimiter: String,
}

impl Exporter {
    pub fn new(dir: &str, delimiter: &str) -> Self {
        Self { dir: PathBuf::from(dir), delimiter: delimiter.to_string() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.export_dir(), config.export_delimiter())
    }

    /// Write the rows to a timestamped file under the export directory.
    /// Returns the path of the written file.
    pub fn export(&self, rows: &[AttendeeRow]) -> Result<PathBuf, ExportError> {
        if rows.is_empty() {
            return Err(ExportError::EmptyRoster);
        }

        let file_name = format!("attendance_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = self.dir.join(file_name);

        match self.write_file(&path, rows) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    attendees = %rows.len(),
                    "attendance_exported"
                );
                Ok(path)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "attendance_export_failed");
                Err(ExportError::Io(e))
            }
        }
    }

    /// Render the delimited text without touching the filesystem
    pub fn render(&self, rows: &[AttendeeRow]) -> Result<String, ExportError> {
        if rows.is_empty() {
            return Err(ExportError::EmptyRoster);
        }

        let mut out = String::with_capacity(64 * (rows.len() + 1));
        let header = ["name", "count", "first_seen", "times"].join(&self.delimiter);
        out.push_str(&header);
        out.push('\n');

        for row in rows {
            let times =
                row.times.iter().map(|&ts| format_ts(ts)).collect::<Vec<_>>().join("; ");
            let fields = [
                self.quote(&row.name),
                row.count.to_string(),
                format_ts(row.first_seen),
                self.quote(&times),
            ];
            out.push_str(&fields.join(&self.delimiter));
            out.push('\n');
        }

        Ok(out)
    }

    fn write_file(&self, path: &Path, rows: &[AttendeeRow]) -> std::io::Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let rendered = self.render(rows).map_err(|e| match e {
            ExportError::Io(io) => io,
            // Emptiness is checked before rendering
            ExportError::EmptyRoster => std::io::Error::other("empty roster"),
        })?;

        let mut file = OpenOptions::new().create(true).truncate(true).write(true).open(path)?;
        file.write_all(rendered.as_bytes())?;
        Ok(())
    }

    /// Quote a field when it contains the delimiter, a quote, or a newline
    fn quote(&self, field: &str) -> String {
        if field.contains(&self.delimiter) || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::roster::Roster;
    use std::fs;
    use tempfile::tempdir;

    fn sample_rows() -> Vec<AttendeeRow> {
        let mut roster = Roster::new();
        roster.record(&["Alice".to_string(), "Bob".to_string()], 1700000000000);
        roster.record(&["Bob".to_string()], 1700000060000);
        roster.rows()
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let exporter = Exporter::new(dir.path().to_str().unwrap(), ",");

        let path = exporter.export(&sample_rows()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "name,count,first_seen,times");
        assert_eq!(lines[1], "Alice,1,2023-11-14 22:13:20,2023-11-14 22:13:20");
        assert_eq!(lines[2], "Bob,2,2023-11-14 22:13:20,2023-11-14 22:13:20; 2023-11-14 22:14:20");
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_empty_roster_is_an_error() {
        let dir = tempdir().unwrap();
        let exporter = Exporter::new(dir.path().to_str().unwrap(), ",");
        let err = exporter.export(&[]).unwrap_err();
        assert!(matches!(err, ExportError::EmptyRoster));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("out");
        let exporter = Exporter::new(nested.to_str().unwrap(), ",");

        let path = exporter.export(&sample_rows()).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(&nested));
    }

    #[test]
    fn test_quoting_fields_containing_delimiter() {
        let exporter = Exporter::new("unused", ",");
        let mut roster = Roster::new();
        roster.record(&["Smith, Jane".to_string()], 1700000000000);

        let rendered = exporter.render(&roster.rows()).unwrap();
        let row = rendered.lines().nth(1).unwrap();
        assert!(row.starts_with("\"Smith, Jane\","));
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        let exporter = Exporter::new("unused", ",");
        assert_eq!(exporter.quote("Jane \"JJ\" Doe"), "\"Jane \"\"JJ\"\" Doe\"");
        assert_eq!(exporter.quote("plain"), "plain");
    }

    #[test]
    fn test_alternate_delimiter() {
        let exporter = Exporter::new("unused", "\t");
        let rendered = exporter.render(&sample_rows()).unwrap();
        assert!(rendered.starts_with("name\tcount\tfirst_seen\ttimes\n"));
        assert!(rendered.lines().nth(2).unwrap().contains("\t2\t"));
    }

    #[test]
    fn test_export_reimport_reproduces_pairs() {
        let dir = tempdir().unwrap();
        let exporter = Exporter::new(dir.path().to_str().unwrap(), ",");
        let rows = sample_rows();

        let path = exporter.export(&rows).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        let reimported: Vec<(String, u64)> = content
            .lines()
            .skip(1)
            .map(|line| {
                let mut fields = line.split(',');
                let name = fields.next().unwrap().to_string();
                let count = fields.next().unwrap().parse().unwrap();
                (name, count)
            })
            .collect();

        let expected: Vec<(String, u64)> =
            rows.iter().map(|r| (r.name.clone(), r.count)).collect();
        assert_eq!(reimported, expected);
    }
}
