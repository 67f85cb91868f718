use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use tracing::{info, warn};

use crate::cluster::{build_cluster_graph, clusters, render_cluster_graph};
use crate::config::{CourseLayout, ImageFormat, PageLayout};
use crate::export::write_export;
use crate::fetch::{fetch_reports, write_atomically, FetchSummary, PageClient};
use crate::histogram::render_histograms;
use crate::models::{AssignmentFailure, AssignmentReportSet, AssignmentSummary, RankedScore};
use crate::parse::load_reports;
use crate::report::build_summary;
use crate::score::{assignment_stats, flagged, rank_scores, suspicion_scores};

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    pub format: ImageFormat,
    pub skip_fetch: bool,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub export_path: PathBuf,
    pub exported_rows: usize,
    pub summary_path: PathBuf,
    pub assignments: Vec<AssignmentSummary>,
    pub scores: Vec<RankedScore>,
    pub failures: Vec<AssignmentFailure>,
}

pub async fn fetch<C: PageClient>(layout: &CourseLayout, client: &C) -> anyhow::Result<FetchSummary> {
    let index_dir = layout.index_dir();
    fetch_reports(client, &index_dir, &layout.pages_dir())
        .await
        .with_context(|| format!("failed to read report index files in {}", index_dir.display()))
}

/// Parse every cached page; pages that fail are returned alongside.
pub fn load(layout: &CourseLayout) -> anyhow::Result<(AssignmentReportSet, Vec<AssignmentFailure>)> {
    let pages_dir = layout.pages_dir();
    load_reports(&pages_dir, &PageLayout::default())
        .with_context(|| format!("failed to read cached report pages in {}", pages_dir.display()))
}

pub async fn process<C: PageClient>(
    layout: &CourseLayout,
    client: &C,
    options: ProcessOptions,
) -> anyhow::Result<RunOutcome> {
    let mut failures = Vec::new();

    if options.skip_fetch {
        info!("skipping fetch, using cached report pages");
    } else if layout.index_dir().is_dir() {
        let summary = fetch(layout, client).await?;
        info!(
            fetched = summary.fetched.len(),
            cached = summary.cached.len(),
            failed = summary.failures.len(),
            "fetch finished"
        );
        failures.extend(summary.failures);
    } else {
        warn!(dir = %layout.index_dir().display(), "no report index directory, nothing to fetch");
    }

    fs::create_dir_all(layout.pages_dir())
        .with_context(|| format!("failed to create {}", layout.pages_dir().display()))?;
    let (reports, parse_failures) = load(layout)?;
    failures.extend(parse_failures);

    analyze(layout, &reports, failures, options.format)
}

/// Render plots, export the review sheet and write the run summary for an
/// already parsed report set.
pub fn analyze(
    layout: &CourseLayout,
    reports: &AssignmentReportSet,
    mut failures: Vec<AssignmentFailure>,
    format: ImageFormat,
) -> anyhow::Result<RunOutcome> {
    let course = layout.course_name();
    let plots_dir = layout.plots_dir();
    fs::create_dir_all(&plots_dir)
        .with_context(|| format!("failed to create {}", plots_dir.display()))?;

    if reports.is_empty() {
        warn!("no parsed reports, skipping histogram");
    } else {
        let path = plots_dir.join(format!("histogram.{}", format.extension()));
        render_histograms(&path, &course, reports, format)
            .with_context(|| format!("failed to render {}", path.display()))?;
    }

    let mut assignments = Vec::with_capacity(reports.len());
    for (assignment, records) in reports {
        let stats = assignment_stats(records);
        let graph = build_cluster_graph(records, stats.threshold);
        let path = plots_dir.join(format!("{assignment}.{}", format.extension()));
        if let Err(err) = render_cluster_graph(&path, assignment, &graph, format) {
            warn!(assignment = %assignment, error = %err, "cluster graph not rendered");
            failures.push(AssignmentFailure {
                assignment: assignment.clone(),
                reason: err.to_string(),
            });
        }

        assignments.push(AssignmentSummary {
            assignment: assignment.clone(),
            stats,
            match_count: records.len(),
            flagged_count: flagged(records, &stats).len(),
            clusters: clusters(&graph),
        });
    }

    let export_path = layout.export_path();
    let exported_rows = write_export(&export_path, reports)
        .with_context(|| format!("failed to export {}", export_path.display()))?;

    let scores = rank_scores(&suspicion_scores(reports), reports);

    let summary_path = layout.summary_path();
    let summary = build_summary(&course, Local::now(), &assignments, &scores, &failures);
    write_atomically(&summary_path, summary.as_bytes())
        .with_context(|| format!("failed to write {}", summary_path.display()))?;

    Ok(RunOutcome {
        export_path,
        exported_rows,
        summary_path,
        assignments,
        scores,
        failures,
    })
}
