use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::config::{BASELINE_SAMPLE, OUTLIER_CAP, STDDEV_MULTIPLIER};
use crate::models::{AssignmentReportSet, AssignmentStats, MatchRecord, RankedScore, SuspicionScore};

/// Mean and sample standard deviation of the per-match best percentage.
/// Fewer than two matches leave the spread at zero.
pub fn assignment_stats(records: &[MatchRecord]) -> AssignmentStats {
    let values: Vec<f64> = records.iter().map(|r| r.percent_same() as f64).collect();
    let mean = mean(&values);
    let stddev = if values.len() < 2 {
        0.0
    } else {
        let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (sum_sq / (values.len() - 1) as f64).sqrt()
    };

    AssignmentStats {
        mean,
        stddev,
        threshold: (mean + STDDEV_MULTIPLIER * stddev).min(OUTLIER_CAP),
    }
}

/// A match is kept for review when it clears the threshold, when either side
/// exceeds the hard cap, or when it is among the first rows of the report.
pub fn is_flagged(record: &MatchRecord, position: usize, stats: &AssignmentStats) -> bool {
    record.percent_same() as f64 > stats.threshold
        || record.percent_a as f64 > OUTLIER_CAP
        || record.percent_b as f64 > OUTLIER_CAP
        || position < BASELINE_SAMPLE
}

pub fn flagged<'a>(records: &'a [MatchRecord], stats: &AssignmentStats) -> Vec<&'a MatchRecord> {
    records
        .iter()
        .enumerate()
        .filter(|(position, record)| is_flagged(record, *position, stats))
        .map(|(_, record)| record)
        .collect()
}

/// Sum of `(mean - percent) / stddev` over every match a submitter appears
/// in. Assignments without spread contribute zero but still register their
/// submitters.
pub fn raw_suspicion(reports: &AssignmentReportSet) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();

    for (assignment, records) in reports {
        let stats = assignment_stats(records);
        let degenerate = stats.stddev <= f64::EPSILON;
        if degenerate && !records.is_empty() {
            warn!(assignment = %assignment, "no spread in match percentages, scores not affected");
        }

        for record in records {
            for (submitter, percent) in [
                (&record.submitter_a, record.percent_a),
                (&record.submitter_b, record.percent_b),
            ] {
                let contribution = if degenerate {
                    0.0
                } else {
                    (stats.mean - percent as f64) / stats.stddev
                };
                *totals.entry(submitter.clone()).or_insert(0.0) += contribution;
            }
        }
    }

    totals
}

/// Standardize totals to zero mean and unit population deviation. Totals with
/// no spread all map to zero.
pub fn normalize(totals: &BTreeMap<String, f64>) -> SuspicionScore {
    let values: Vec<f64> = totals.values().copied().collect();
    let mean = mean(&values);
    let deviation = population_stddev(&values, mean);

    totals
        .iter()
        .map(|(submitter, total)| {
            let score = if deviation <= f64::EPSILON {
                0.0
            } else {
                (total - mean) / deviation
            };
            (submitter.clone(), score)
        })
        .collect()
}

pub fn suspicion_scores(reports: &AssignmentReportSet) -> SuspicionScore {
    normalize(&raw_suspicion(reports))
}

/// Scores sorted from highest to lowest with the number of matches each
/// submitter appears in.
pub fn rank_scores(scores: &SuspicionScore, reports: &AssignmentReportSet) -> Vec<RankedScore> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in reports.values().flatten() {
        *counts.entry(record.submitter_a.as_str()).or_default() += 1;
        *counts.entry(record.submitter_b.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<RankedScore> = scores
        .iter()
        .map(|(submitter, score)| RankedScore {
            submitter: submitter.clone(),
            score: *score,
            match_count: counts.get(submitter.as_str()).copied().unwrap_or(0),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.submitter.cmp(&b.submitter))
    });
    ranked
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn population_stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(assignment: &str, a: &str, pa: u8, b: &str, pb: u8) -> MatchRecord {
        MatchRecord {
            assignment: assignment.to_string(),
            grader_a: "ta_kim".to_string(),
            grader_b: "ta_lee".to_string(),
            submitter_a: a.to_string(),
            submitter_b: b.to_string(),
            percent_a: pa,
            percent_b: pb,
            lines_matched: 10,
            source_link: format!("http://moss.example/{assignment}/{a}-{b}.html"),
        }
    }

    fn spread_records(percents: &[u8]) -> Vec<MatchRecord> {
        percents
            .iter()
            .enumerate()
            .map(|(i, p)| record("PA1", &format!("s{i}a"), *p, &format!("s{i}b"), 0))
            .collect()
    }

    #[test]
    fn threshold_is_capped_at_eighty() {
        let records = spread_records(&[10, 20, 30, 90, 95]);
        let stats = assignment_stats(&records);
        assert!((stats.mean - 49.0).abs() < 1e-9);
        assert!((stats.stddev - 40.373).abs() < 1e-3);
        assert_eq!(stats.threshold, 80.0);
    }

    #[test]
    fn outliers_and_baseline_rows_are_flagged() {
        // 20 low rows push the high matches past the baseline sample.
        let mut percents = vec![10u8; 20];
        percents.extend([10, 20, 30, 90, 95]);
        let records = spread_records(&percents);
        let stats = assignment_stats(&records);

        let kept = flagged(&records, &stats);
        assert_eq!(kept.len(), 22);
        assert_eq!(kept[20].percent_a, 90);
        assert_eq!(kept[21].percent_a, 95);
    }

    #[test]
    fn small_assignments_keep_every_row() {
        let records = spread_records(&[10, 20, 30, 90, 95]);
        let stats = assignment_stats(&records);
        assert_eq!(flagged(&records, &stats).len(), 5);
    }

    #[test]
    fn either_side_above_cap_is_flagged() {
        let stats = AssignmentStats {
            mean: 90.0,
            stddev: 5.0,
            threshold: 80.0,
        };
        let high_b = record("PA1", "a", 10, "b", 85);
        let low = record("PA1", "c", 10, "d", 12);
        assert!(is_flagged(&high_b, 50, &stats));
        assert!(!is_flagged(&low, 50, &stats));
    }

    #[test]
    fn below_average_submitter_accumulates_positive_total() {
        let mut reports = AssignmentReportSet::new();
        reports.insert(
            "PA1".to_string(),
            vec![
                record("PA1", "x", 5, "y", 80),
                record("PA1", "z", 60, "w", 70),
            ],
        );
        reports.insert(
            "PA2".to_string(),
            vec![
                record("PA2", "x", 10, "y", 90),
                record("PA2", "w", 50, "z", 65),
            ],
        );

        let totals = raw_suspicion(&reports);
        assert!(totals["x"] > 0.0);
        assert!(totals["y"] < 0.0);
    }

    #[test]
    fn normalized_scores_have_zero_mean_unit_deviation() {
        let mut reports = AssignmentReportSet::new();
        reports.insert(
            "PA1".to_string(),
            vec![
                record("PA1", "x", 5, "y", 80),
                record("PA1", "z", 60, "w", 70),
                record("PA1", "x", 30, "w", 20),
            ],
        );
        let scores = suspicion_scores(&reports);
        let values: Vec<f64> = scores.values().copied().collect();
        let m = mean(&values);
        let sd = population_stddev(&values, m);
        assert!(m.abs() < 1e-9);
        assert!((sd - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_variance_assignment_contributes_nothing() {
        let mut reports = AssignmentReportSet::new();
        reports.insert(
            "PA1".to_string(),
            vec![record("PA1", "x", 40, "y", 40), record("PA1", "z", 40, "w", 40)],
        );
        let totals = raw_suspicion(&reports);
        assert_eq!(totals.len(), 4);
        assert!(totals.values().all(|v| *v == 0.0));

        let scores = normalize(&totals);
        assert!(scores.values().all(|v| v.is_finite() && *v == 0.0));
    }

    #[test]
    fn single_match_assignment_has_no_spread() {
        let stats = assignment_stats(&[record("PA1", "x", 40, "y", 70)]);
        assert_eq!(stats.stddev, 0.0);
        assert_eq!(stats.threshold, 70.0);
    }

    #[test]
    fn ranking_orders_by_score_descending() {
        let mut reports = AssignmentReportSet::new();
        reports.insert(
            "PA1".to_string(),
            vec![
                record("PA1", "x", 5, "y", 80),
                record("PA1", "z", 60, "w", 70),
            ],
        );
        let scores = suspicion_scores(&reports);
        let ranked = rank_scores(&scores, &reports);
        assert_eq!(ranked[0].submitter, "x");
        assert_eq!(ranked[0].match_count, 1);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
