//! Parsing of cached similarity-report pages into [`MatchRecord`]s.
//!
//! The report tool emits a fixed page: a block of navigation anchors, then a
//! table whose rows hold two linked cells (`path (NN%)`) and one cell with the
//! matched-lines count. [`PageLayout`] names those positions.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::PageLayout;
use crate::error::{Result, TriageError};
use crate::models::{
    AssignmentFailure, AssignmentReportSet, MatchRecord, UNKNOWN_GRADER, UNKNOWN_SUBMITTER,
};

fn table_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)<table\b").expect("valid table regex"))
}

fn cell_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)<td\b[^>]*>([^<]*)").expect("valid cell regex"))
}

fn anchor_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))[^>]*>(.*?)</a\s*>"#)
            .expect("valid anchor regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Anchor {
    href: String,
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Submission {
    grader: String,
    submitter: String,
    percent: u8,
}

/// Parse one report page. The records keep the page's row order.
pub fn parse_report(assignment: &str, html: &str, layout: &PageLayout) -> Result<Vec<MatchRecord>> {
    if !table_pattern().is_match(html) {
        return Err(TriageError::malformed(assignment, "no match table found"));
    }

    let lines = matched_lines(assignment, html, layout)?;
    let anchors = extract_anchors(html);
    if anchors.len() < layout.header_anchors {
        return Err(TriageError::malformed(
            assignment,
            format!(
                "expected at least {} header links, found {}",
                layout.header_anchors,
                anchors.len()
            ),
        ));
    }

    let body = &anchors[layout.header_anchors..];
    if body.len() % 2 != 0 {
        return Err(TriageError::malformed(
            assignment,
            format!("odd number of submission links ({})", body.len()),
        ));
    }
    let pairs = body.len() / 2;
    if lines.len() < pairs {
        return Err(TriageError::malformed(
            assignment,
            format!("{pairs} match rows but only {} matched-line cells", lines.len()),
        ));
    }

    let mut records = Vec::with_capacity(pairs);
    for (pair, lines_matched) in body.chunks_exact(2).zip(lines) {
        let first = parse_submission(assignment, &pair[0].text)?;
        let second = parse_submission(assignment, &pair[1].text)?;
        if first.submitter == second.submitter && first.submitter != UNKNOWN_SUBMITTER {
            warn!(
                assignment,
                submitter = %first.submitter,
                "dropping match of a submission against itself"
            );
            continue;
        }
        records.push(MatchRecord {
            assignment: assignment.to_string(),
            grader_a: first.grader,
            grader_b: second.grader,
            submitter_a: first.submitter,
            submitter_b: second.submitter,
            percent_a: first.percent,
            percent_b: second.percent,
            lines_matched,
            source_link: pair[0].href.clone(),
        });
    }

    debug!(assignment, records = records.len(), "parsed report page");
    Ok(records)
}

fn matched_lines(assignment: &str, html: &str, layout: &PageLayout) -> Result<Vec<u32>> {
    let mut counts = Vec::new();
    for (index, cell) in cell_pattern().captures_iter(html).enumerate() {
        if index % layout.cells_per_row != layout.lines_cell_offset {
            continue;
        }
        let raw = cell.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let count = raw.parse::<u32>().map_err(|_| {
            TriageError::malformed(assignment, format!("matched-lines cell {raw:?} is not a count"))
        })?;
        counts.push(count);
    }
    Ok(counts)
}

fn extract_anchors(html: &str) -> Vec<Anchor> {
    anchor_pattern()
        .captures_iter(html)
        .map(|caps| {
            let href = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let text = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
            Anchor {
                href: decode_entities(href.trim()),
                text: decode_entities(text.trim()),
            }
        })
        .collect()
}

/// Split `"<path> (<percent>%)"` into grader, submitter and percent.
fn parse_submission(assignment: &str, text: &str) -> Result<Submission> {
    let (path, tail) = text
        .rsplit_once(" (")
        .ok_or_else(|| TriageError::malformed(assignment, format!("link text {text:?} has no percentage")))?;
    let raw_percent = tail.split('%').next().unwrap_or_default().trim();
    let percent = raw_percent
        .parse::<u8>()
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| TriageError::InvalidPercent {
            assignment: assignment.to_string(),
            value: raw_percent.to_string(),
        })?;

    let (grader, submitter) = split_identity(path.trim());
    Ok(Submission {
        grader,
        submitter,
        percent,
    })
}

/// Grader is the second-to-last path component and submitter the last.
fn split_identity(path: &str) -> (String, String) {
    let parts: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    match parts.as_slice() {
        [.., grader, submitter] => (grader.to_string(), submitter.to_string()),
        _ => (UNKNOWN_GRADER.to_string(), UNKNOWN_SUBMITTER.to_string()),
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Parse every cached `*.html` page in `pages_dir`. A page that fails to read
/// or parse is reported in the returned failures and left out of the set.
pub fn load_reports(
    pages_dir: &Path,
    layout: &PageLayout,
) -> Result<(AssignmentReportSet, Vec<AssignmentFailure>)> {
    let mut reports = AssignmentReportSet::new();
    let mut failures = Vec::new();

    let mut pages: Vec<_> = fs::read_dir(pages_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "html"))
        .collect();
    pages.sort();

    for page in pages {
        let Some(assignment) = page.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let parsed = fs::read(&page)
            .map_err(TriageError::from)
            .and_then(|bytes| parse_report(&assignment, &String::from_utf8_lossy(&bytes), layout));
        match parsed {
            Ok(records) => {
                reports.insert(assignment, records);
            }
            Err(err) => {
                warn!(assignment = %assignment, error = %err, "skipping unparseable report");
                failures.push(AssignmentFailure {
                    assignment,
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok((reports, failures))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Render a page shaped like the similarity tool's output.
    pub(crate) fn report_page(rows: &[(&str, u8, &str, u8, u32)]) -> String {
        let mut html = String::from(
            "<HTML><HEAD><TITLE>Moss Results</TITLE></HEAD><BODY>\n\
             Moss Results<p>\n\
             <A HREF=\"http://moss.example/general/format.html\">How to Read the Results</A> |\n\
             <A HREF=\"http://moss.example/general/tips.html\">Tips</A> |\n\
             <A HREF=\"http://moss.example/general/faq.html\">FAQ</A> |\n\
             <A HREF=\"mailto:moss-request@example.edu\">Contact</A> |\n\
             <A HREF=\"http://moss.example/general/scripts.html\">Submission Scripts</A> |\n\
             <A HREF=\"http://moss.example/general/credits.html\">Credits</A>\n\
             <TABLE>\n<TR><TH>File 1<TH>File 2<TH>Lines Matched\n",
        );
        for (index, (path_a, pa, path_b, pb, lines)) in rows.iter().enumerate() {
            let link = format!("http://moss.example/results/1/match{index}.html");
            html.push_str(&format!(
                "<TR><TD><A HREF=\"{link}\">{path_a} ({pa}%)</A>\n    <TD><A HREF=\"{link}\">{path_b} ({pb}%)</A>\n<TD ALIGN=right>{lines}\n"
            ));
        }
        html.push_str("</TABLE>\n<HR>\nAny errors found by Moss should be reported.\n</BODY></HTML>\n");
        html
    }

    #[test]
    fn parses_rows_in_report_order() {
        let html = report_page(&[
            ("PA1/ta_kim/alice/", 92, "PA1/ta_lee/bob/", 88, 140),
            ("PA1/ta_kim/carol/", 41, "PA1/ta_kim/dave/", 37, 22),
            ("PA1/ta_lee/erin/", 12, "PA1/ta_kim/alice/", 9, 5),
        ]);
        let records = parse_report("PA1", &html, &PageLayout::default()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            MatchRecord {
                assignment: "PA1".to_string(),
                grader_a: "ta_kim".to_string(),
                grader_b: "ta_lee".to_string(),
                submitter_a: "alice".to_string(),
                submitter_b: "bob".to_string(),
                percent_a: 92,
                percent_b: 88,
                lines_matched: 140,
                source_link: "http://moss.example/results/1/match0.html".to_string(),
            }
        );
        assert_eq!(records[1].submitter_a, "carol");
        assert_eq!(records[1].lines_matched, 22);
        assert_eq!(records[2].percent_b, 9);
        assert_eq!(records[2].grader_b, "ta_kim");
        for record in &records {
            assert!(record.percent_a <= 100 && record.percent_b <= 100);
            assert_ne!(record.submitter_a, record.submitter_b);
        }
    }

    #[test]
    fn short_paths_use_unknown_sentinels() {
        let html = report_page(&[("alice", 50, "PA1/ta_lee/bob", 40, 10)]);
        let records = parse_report("PA1", &html, &PageLayout::default()).unwrap();
        assert_eq!(records[0].grader_a, UNKNOWN_GRADER);
        assert_eq!(records[0].submitter_a, UNKNOWN_SUBMITTER);
        assert_eq!(records[0].submitter_b, "bob");
    }

    #[test]
    fn paths_with_spaces_keep_their_components() {
        let html = report_page(&[("PA2/ta kim/Mary Ann/", 70, "PA2/ta_lee/bob/", 66, 31)]);
        let records = parse_report("PA2", &html, &PageLayout::default()).unwrap();
        assert_eq!(records[0].grader_a, "ta kim");
        assert_eq!(records[0].submitter_a, "Mary Ann");
        assert_eq!(records[0].percent_a, 70);
    }

    #[test]
    fn empty_report_table_yields_no_records() {
        let html = report_page(&[]);
        let records = parse_report("PA3", &html, &PageLayout::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn self_matches_are_dropped() {
        let html = report_page(&[
            ("PA1/ta_kim/alice/", 99, "PA1/ta_kim/alice/", 99, 300),
            ("PA1/ta_kim/carol/", 41, "PA1/ta_kim/dave/", 37, 22),
        ]);
        let records = parse_report("PA1", &html, &PageLayout::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].submitter_a, "carol");
        assert_eq!(records[0].lines_matched, 22);
    }

    #[test]
    fn same_submitter_under_two_graders_is_dropped() {
        let html = report_page(&[
            ("PA1/ta_kim/alice/", 97, "PA1/ta_lee/alice/", 96, 250),
            ("PA1/ta_kim/carol/", 41, "PA1/ta_lee/dave/", 37, 22),
        ]);
        let records = parse_report("PA1", &html, &PageLayout::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].submitter_a, "carol");
        assert_eq!(records[0].lines_matched, 22);
        assert!(records.iter().all(|r| r.submitter_a != r.submitter_b));
    }

    #[test]
    fn rows_with_two_short_paths_are_kept() {
        let html = report_page(&[
            ("alice", 60, "bob", 55, 40),
            ("PA1/ta_kim/carol/", 41, "PA1/ta_lee/dave/", 37, 22),
        ]);
        let records = parse_report("PA1", &html, &PageLayout::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].submitter_a, UNKNOWN_SUBMITTER);
        assert_eq!(records[0].submitter_b, UNKNOWN_SUBMITTER);
        assert_eq!(records[0].percent_a, 60);
        assert_eq!(records[0].lines_matched, 40);
        assert_eq!(records[1].submitter_a, "carol");
    }

    #[test]
    fn page_without_table_is_malformed() {
        let err = parse_report("PA1", "<html><body>Not found</body></html>", &PageLayout::default())
            .unwrap_err();
        assert!(matches!(err, TriageError::MalformedPage { .. }));
    }

    #[test]
    fn percent_out_of_range_is_rejected() {
        let html = report_page(&[("PA1/ta/a/", 50, "PA1/ta/b/", 40, 10)]).replace("(50%)", "(150%)");
        let err = parse_report("PA1", &html, &PageLayout::default()).unwrap_err();
        assert!(matches!(err, TriageError::InvalidPercent { .. }));
    }

    #[test]
    fn missing_lines_cells_are_malformed() {
        let html = report_page(&[("PA1/ta/a/", 50, "PA1/ta/b/", 40, 10)])
            .replace("<TD ALIGN=right>10\n", "");
        let err = parse_report("PA1", &html, &PageLayout::default()).unwrap_err();
        assert!(matches!(err, TriageError::MalformedPage { .. }));
    }

    #[test]
    fn load_reports_skips_broken_pages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("PA1.html"),
            report_page(&[("PA1/ta/a/", 50, "PA1/ta/b/", 40, 10)]),
        )
        .unwrap();
        fs::write(dir.path().join("PA2.html"), "<html>oops</html>").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let (reports, failures) = load_reports(dir.path(), &PageLayout::default()).unwrap();
        assert_eq!(reports.keys().collect::<Vec<_>>(), vec!["PA1"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].assignment, "PA2");
    }
}
