use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::models::{AssignmentReportSet, MatchRecord};
use crate::score::{assignment_stats, flagged};

pub const EXPORT_COLUMNS: [&str; 10] = [
    "assignment",
    "grader_a",
    "grader_b",
    "submitter_a",
    "submitter_b",
    "percent_same",
    "lines_matched",
    "TA Confidence",
    "Head-TA Confidence",
    "source_link",
];

/// One spreadsheet row; the two confidence columns are left blank for staff.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExportRow<'a> {
    pub assignment: &'a str,
    pub grader_a: &'a str,
    pub grader_b: &'a str,
    pub submitter_a: &'a str,
    pub submitter_b: &'a str,
    pub percent_same: u8,
    pub lines_matched: u32,
    pub ta_confidence: &'a str,
    pub head_ta_confidence: &'a str,
    pub source_link: &'a str,
}

impl<'a> From<&'a MatchRecord> for ExportRow<'a> {
    fn from(record: &'a MatchRecord) -> Self {
        ExportRow {
            assignment: &record.assignment,
            grader_a: &record.grader_a,
            grader_b: &record.grader_b,
            submitter_a: &record.submitter_a,
            submitter_b: &record.submitter_b,
            percent_same: record.percent_same(),
            lines_matched: record.lines_matched,
            ta_confidence: "",
            head_ta_confidence: "",
            source_link: &record.source_link,
        }
    }
}

/// Flagged matches of every assignment, assignments in lexicographic order
/// and matches in report order.
pub fn export_rows(reports: &AssignmentReportSet) -> Vec<ExportRow<'_>> {
    reports
        .values()
        .flat_map(|records| {
            let stats = assignment_stats(records);
            flagged(records, &stats).into_iter().map(ExportRow::from)
        })
        .collect()
}

/// Write the review sheet to `path`, replacing any earlier export. The file
/// is assembled beside the target and renamed into place.
pub fn write_export(path: &Path, reports: &AssignmentReportSet) -> Result<usize> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let rows = export_rows(reports);
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut tmp);
        writer.write_record(EXPORT_COLUMNS)?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    tmp.persist(path)?;

    info!(path = %path.display(), rows = rows.len(), "wrote review spreadsheet");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::tests::record;

    fn sample_reports() -> AssignmentReportSet {
        let mut reports = AssignmentReportSet::new();
        reports.insert(
            "PA2".to_string(),
            vec![record("PA2", "x", 30, "y", 35), record("PA2", "z", 12, "w", 10)],
        );
        reports.insert(
            "PA1".to_string(),
            vec![
                record("PA1", "alice", 92, "bob", 88),
                record("PA1", "carol", 40, "dave", 47),
                record("PA1", "erin", 5, "alice", 2),
            ],
        );
        reports
    }

    #[test]
    fn exports_flagged_rows_in_fixed_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CS101.csv");
        let written = write_export(&path, &sample_reports()).unwrap();
        assert_eq!(written, 5);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, EXPORT_COLUMNS.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 5);
        let assignments: Vec<&str> = rows.iter().map(|r| &r[0]).collect();
        assert_eq!(assignments, vec!["PA1", "PA1", "PA1", "PA2", "PA2"]);
        let percent_same: Vec<&str> = rows.iter().map(|r| &r[5]).collect();
        assert_eq!(percent_same, vec!["92", "47", "5", "35", "12"]);
        assert_eq!(&rows[0][3], "alice");
        assert_eq!(&rows[0][7], "");
        assert_eq!(&rows[0][8], "");
        assert_eq!(&rows[0][9], "http://moss.example/PA1/alice-bob.html");
    }

    #[test]
    fn export_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CS101.csv");
        fs::write(&path, "stale").unwrap();

        let mut reports = sample_reports();
        reports.remove("PA1");
        write_export(&path, &reports).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("stale"));
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn empty_export_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        assert_eq!(write_export(&path, &AssignmentReportSet::new()).unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn unwritable_destination_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "file").unwrap();
        let path = blocker.join("CS101.csv");

        assert!(write_export(&path, &sample_reports()).is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
