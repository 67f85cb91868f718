use std::path::Path;

use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use tracing::info;

use crate::config::{
    figure_pixels, ImageFormat, HISTOGRAM_BINS, HISTOGRAM_DPI, HISTOGRAM_FIGURE_INCHES,
};
use crate::error::{Result, TriageError};
use crate::fonts::register_fonts;
use crate::models::{AssignmentReportSet, MatchRecord};
use crate::score::assignment_stats;

const PERCENT_RANGE: f64 = 100.0;

pub fn grid_side(count: usize) -> usize {
    (count as f64).sqrt().ceil() as usize
}

/// Counts of `percent_same` over equal-width bins spanning 0..=100; the last
/// bin is closed so that 100% is counted.
pub fn histogram_bins(records: &[MatchRecord]) -> Vec<u32> {
    let width = PERCENT_RANGE / HISTOGRAM_BINS as f64;
    let mut counts = vec![0u32; HISTOGRAM_BINS];
    for record in records {
        let bin = ((record.percent_same() as f64 / width) as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }
    counts
}

/// Draw one histogram per assignment, in assignment order, with the outlier
/// threshold marked in red.
pub fn draw_histogram_grid<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    reports: &AssignmentReportSet,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    register_fonts();
    root.fill(&WHITE)?;
    if reports.is_empty() {
        return root.present();
    }

    let (_, height) = root.dim_in_pixel();
    let scale = (height as f64 / 480.0).max(0.5);
    let body = root.titled(title, ("sans-serif", 18.0 * scale))?;
    let side = grid_side(reports.len());
    let panels = body.split_evenly((side, side));
    let bin_width = PERCENT_RANGE / HISTOGRAM_BINS as f64;

    for ((assignment, records), panel) in reports.iter().zip(panels.iter()) {
        let stats = assignment_stats(records);
        let counts = histogram_bins(records);
        let y_max = counts.iter().copied().max().unwrap_or(0) + 1;

        let mut chart = ChartBuilder::on(panel)
            .caption(assignment, ("sans-serif", 12.0 * scale))
            .margin((4.0 * scale) as i32)
            .x_label_area_size((24.0 * scale) as i32)
            .y_label_area_size((30.0 * scale) as i32)
            .build_cartesian_2d(0f64..PERCENT_RANGE, 0u32..y_max)?;

        chart
            .configure_mesh()
            .x_desc("Percent Same")
            .y_desc("Number of Students")
            .label_style(("sans-serif", 8.0 * scale))
            .draw()?;

        chart.draw_series(counts.iter().enumerate().map(|(bin, count)| {
            let left = bin as f64 * bin_width;
            Rectangle::new([(left, 0), (left + bin_width, *count)], BLUE.filled())
        }))?;

        chart.draw_series(std::iter::once(PathElement::new(
            vec![(stats.threshold, 0), (stats.threshold, y_max)],
            RED.stroke_width((2.0 * scale) as u32),
        )))?;
    }

    root.present()
}

pub fn render_histograms(
    path: &Path,
    title: &str,
    reports: &AssignmentReportSet,
    format: ImageFormat,
) -> Result<()> {
    let size = figure_pixels(HISTOGRAM_FIGURE_INCHES, HISTOGRAM_DPI);
    let target = path.display().to_string();
    match format {
        ImageFormat::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_histogram_grid(&root, title, reports).map_err(|e| TriageError::render(&target, e))?;
        }
        ImageFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_histogram_grid(&root, title, reports).map_err(|e| TriageError::render(&target, e))?;
        }
    }
    info!(path = %target, assignments = reports.len(), "wrote histogram grid");
    Ok(())
}
