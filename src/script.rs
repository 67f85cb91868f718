//! Generation of the shell script that submits each assignment's code to the
//! similarity-detection service and captures its report index.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::CourseLayout;
use crate::error::{Result, TriageError};

pub const DEFAULT_MAX_MATCHES: u32 = 1_000_000;

#[derive(Debug, Clone)]
pub struct ScriptOptions {
    pub language: String,
    pub moss_bin: PathBuf,
    pub max_matches: u32,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            language: "cc".to_string(),
            moss_bin: PathBuf::from("moss"),
            max_matches: DEFAULT_MAX_MATCHES,
        }
    }
}

/// Assignment directories under `assignments_dir`, sorted by name.
pub fn list_assignments(assignments_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(assignments_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Backslash-escape the characters the shell would split or interpret.
pub fn shell_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, ' ' | '\'' | '(' | ')') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// One glob per distinct (submission directory, extension), relative to the
/// assignments directory.
fn submission_globs(assignments_dir: &Path, assignment: &str) -> Vec<String> {
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let walker = WalkDir::new(assignments_dir.join(assignment))
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file());

    for entry in walker {
        let path = entry.path();
        let Some(parent) = path.parent().and_then(|p| p.strip_prefix(assignments_dir).ok()) else {
            continue;
        };
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        seen.insert((parent.to_string_lossy().into_owned(), extension));
    }

    seen.into_iter()
        .map(|(dir, extension)| format!("{}/*{}", shell_escape(&dir), extension))
        .collect()
}

pub fn build_script(
    layout: &CourseLayout,
    assignments: &[String],
    options: &ScriptOptions,
) -> Result<String> {
    let root = absolute(layout.root())?;
    let assignments_dir = root.join("assignments");
    let index_dir = root.join("moss_output");
    let course = layout.course_name();

    let mut script = String::from("#!/bin/sh\n\n");
    for assignment in assignments {
        let globs = submission_globs(&assignments_dir, assignment);
        debug!(assignment = %assignment, globs = globs.len(), "collected submission globs");

        let _ = writeln!(script, "cd {}", shell_escape(&assignments_dir.to_string_lossy()));
        let _ = write!(
            script,
            "{} -d -l {} -m {} -c \"{} in {}\"",
            shell_escape(&options.moss_bin.to_string_lossy()),
            options.language,
            options.max_matches,
            assignment,
            course
        );
        for glob in &globs {
            let _ = write!(script, " {glob}");
        }
        let index_path = index_dir.join(format!("{assignment}.txt"));
        let _ = writeln!(script, " | tee {}", shell_escape(&index_path.to_string_lossy()));
        let _ = writeln!(script, "cd {}", shell_escape(&root.to_string_lossy()));
        let _ = writeln!(script);
    }

    Ok(script)
}

/// Write the script to the course root (replacing any previous one) and make
/// it executable.
pub fn write_script(
    layout: &CourseLayout,
    assignments: &[String],
    options: &ScriptOptions,
) -> Result<PathBuf> {
    fs::create_dir_all(layout.index_dir())?;
    let script = build_script(layout, assignments, options)?;
    let path = layout.script_path();
    fs::write(&path, script)?;
    make_executable(&path)?;
    info!(path = %path.display(), assignments = assignments.len(), "generated submission script");
    Ok(path)
}

pub fn run_script(path: &Path) -> Result<()> {
    let status = Command::new("sh").arg(path).status()?;
    if !status.success() {
        return Err(TriageError::ScriptFailed {
            path: path.to_path_buf(),
            status: status.to_string(),
        });
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    })
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
