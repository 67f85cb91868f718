use std::collections::BTreeMap;

use serde::Serialize;

/// Placeholder identity used when a submission path is too short to name
/// both the grader and the submitter.
pub const UNKNOWN_GRADER: &str = "UNKNOWN_TA";
pub const UNKNOWN_SUBMITTER: &str = "UNKNOWN_STUDENT";

/// One pairwise similarity hit between two submissions of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub assignment: String,
    pub grader_a: String,
    pub grader_b: String,
    pub submitter_a: String,
    pub submitter_b: String,
    pub percent_a: u8,
    pub percent_b: u8,
    pub lines_matched: u32,
    pub source_link: String,
}

impl MatchRecord {
    /// The better-of-two match percentage, used for every per-assignment statistic.
    pub fn percent_same(&self) -> u8 {
        self.percent_a.max(self.percent_b)
    }
}

/// Parsed matches keyed by assignment; iteration order is lexicographic by
/// assignment, record order within an assignment is report order.
pub type AssignmentReportSet = BTreeMap<String, Vec<MatchRecord>>;

/// Normalized suspicion score per submitter.
pub type SuspicionScore = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignmentStats {
    pub mean: f64,
    /// Sample standard deviation; zero when fewer than two matches exist.
    pub stddev: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedScore {
    pub submitter: String,
    pub score: f64,
    pub match_count: usize,
}

#[derive(Debug, Clone)]
pub struct AssignmentSummary {
    pub assignment: String,
    pub stats: AssignmentStats,
    pub match_count: usize,
    pub flagged_count: usize,
    pub clusters: Vec<Vec<String>>,
}

/// An assignment that could not be fetched or parsed, with the reason.
#[derive(Debug, Clone)]
pub struct AssignmentFailure {
    pub assignment: String,
    pub reason: String,
}
