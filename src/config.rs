use std::path::{Path, PathBuf};

use clap::ValueEnum;

/// Matches above this percentage are always flagged, and the statistical
/// threshold never exceeds it.
pub const OUTLIER_CAP: f64 = 80.0;
/// Number of leading report rows kept for manual review regardless of score.
pub const BASELINE_SAMPLE: usize = 20;
pub const STDDEV_MULTIPLIER: f64 = 1.0;

pub const HISTOGRAM_BINS: usize = 20;
pub const HISTOGRAM_FIGURE_INCHES: (f64, f64) = (6.4, 4.8);
pub const HISTOGRAM_DPI: u32 = 1000;
pub const GRAPH_FIGURE_INCHES: (f64, f64) = (9.0, 9.0);
pub const GRAPH_DPI: u32 = 500;

/// Fixed table layout of a similarity report page: a navigation block of
/// anchors, then one row per match holding two linked submission cells and a
/// matched-lines cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub header_anchors: usize,
    pub cells_per_row: usize,
    pub lines_cell_offset: usize,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            header_anchors: 6,
            cells_per_row: 3,
            lines_cell_offset: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }
}

pub fn figure_pixels(inches: (f64, f64), dpi: u32) -> (u32, u32) {
    (
        (inches.0 * dpi as f64).round() as u32,
        (inches.1 * dpi as f64).round() as u32,
    )
}

/// Directory layout of one course workspace.
#[derive(Debug, Clone)]
pub struct CourseLayout {
    root: PathBuf,
}

impl CourseLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Display name of the course, taken from the last path component.
    pub fn course_name(&self) -> String {
        let resolved = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        resolved
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "course".to_string())
    }

    pub fn assignments_dir(&self) -> PathBuf {
        self.root.join("assignments")
    }

    pub fn script_path(&self) -> PathBuf {
        self.root.join("run_moss.sh")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join("moss_output")
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.root.join("plagiarism")
    }

    pub fn plots_dir(&self) -> PathBuf {
        self.pages_dir().join("plots")
    }

    pub fn export_path(&self) -> PathBuf {
        self.pages_dir().join(format!("{}.csv", self.course_name()))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.pages_dir().join("summary.md")
    }
}
