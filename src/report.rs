use std::fmt::Write;

use chrono::{DateTime, Local};

use crate::models::{AssignmentFailure, AssignmentSummary, RankedScore};

pub fn build_summary(
    course: &str,
    generated_at: DateTime<Local>,
    assignments: &[AssignmentSummary],
    scores: &[RankedScore],
    failures: &[AssignmentFailure],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Plagiarism Triage Summary");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        course,
        generated_at.format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Assignments");

    if assignments.is_empty() {
        let _ = writeln!(output, "No report pages were parsed.");
    } else {
        let _ = writeln!(
            output,
            "| Assignment | Matches | Mean % | Std dev | Threshold % | Flagged | Clusters |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|");
        for summary in assignments {
            let _ = writeln!(
                output,
                "| {} | {} | {:.1} | {:.1} | {:.1} | {} | {} |",
                summary.assignment,
                summary.match_count,
                summary.stats.mean,
                summary.stats.stddev,
                summary.stats.threshold,
                summary.flagged_count,
                summary.clusters.len()
            );
        }
    }

    let clustered: Vec<&AssignmentSummary> = assignments
        .iter()
        .filter(|summary| !summary.clusters.is_empty())
        .collect();
    if !clustered.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Clusters");
        for summary in clustered {
            for cluster in &summary.clusters {
                let _ = writeln!(output, "- {}: {}", summary.assignment, cluster.join(", "));
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Suspicion Scores");

    if scores.is_empty() {
        let _ = writeln!(output, "No submitters scored.");
    } else {
        for score in scores.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} score {:.2} across {} matches",
                score.submitter, score.score, score.match_count
            );
        }
    }

    if !failures.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Skipped Assignments");
        for failure in failures {
            let _ = writeln!(output, "- {}: {}", failure.assignment, failure.reason);
        }
    }

    output
}
