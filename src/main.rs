use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod cluster;
mod config;
mod error;
mod export;
mod fetch;
mod fonts;
mod histogram;
mod logging;
mod models;
mod parse;
mod pipeline;
mod report;
mod score;
mod script;

use config::{CourseLayout, ImageFormat};
use fetch::HttpPageClient;
use pipeline::ProcessOptions;
use script::ScriptOptions;

#[derive(Parser)]
#[command(name = "plagiarism-triage")]
#[command(about = "Turn similarity reports into ranked review sheets and plots", long_about = None)]
struct Cli {
    /// Course workspace holding assignments/, moss_output/ and plagiarism/
    #[arg(long, global = true, env = "TRIAGE_COURSE_DIR", default_value = ".")]
    course_dir: PathBuf,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log level or filter directive (overrides --verbose)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the similarity-tool submission script
    Script {
        /// Assignments to include (default: every directory under assignments/)
        #[arg(long = "assignment")]
        assignments: Vec<String>,
        #[arg(long, default_value = "cc")]
        language: String,
        #[arg(long, default_value = "moss")]
        moss_bin: PathBuf,
        /// Run the script with `sh` once written
        #[arg(long)]
        run: bool,
    },
    /// Download report pages that are not cached yet
    Fetch,
    /// Fetch, parse, plot, export and summarize
    Process {
        #[arg(long, value_enum, default_value_t = ImageFormat::Png)]
        format: ImageFormat,
        #[arg(long)]
        skip_fetch: bool,
    },
    /// Print the highest normalized suspicion scores
    Scores {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Err(err) = logging::init_tracing(cli.verbose, cli.log_level.as_deref()) {
        eprintln!("Warning: failed to initialize logging: {err}");
    }

    let layout = CourseLayout::new(&cli.course_dir);

    match cli.command {
        Commands::Script {
            assignments,
            language,
            moss_bin,
            run,
        } => {
            let assignments = if assignments.is_empty() {
                script::list_assignments(&layout.assignments_dir()).with_context(|| {
                    format!("failed to list {}", layout.assignments_dir().display())
                })?
            } else {
                assignments
            };
            let options = ScriptOptions {
                language,
                moss_bin,
                ..ScriptOptions::default()
            };
            let path = script::write_script(&layout, &assignments, &options)
                .context("failed to write submission script")?;
            println!("Script for {} assignments written to {}.", assignments.len(), path.display());
            if run {
                script::run_script(&path)?;
                println!("Submission script finished.");
            }
        }
        Commands::Fetch => {
            let client = HttpPageClient::new()?;
            let summary = pipeline::fetch(&layout, &client).await?;
            println!(
                "Fetched {} pages, {} already cached, {} failed.",
                summary.fetched.len(),
                summary.cached.len(),
                summary.failures.len()
            );
            for failure in &summary.failures {
                println!("- {}: {}", failure.assignment, failure.reason);
            }
        }
        Commands::Process { format, skip_fetch } => {
            let client = HttpPageClient::new()?;
            let outcome =
                pipeline::process(&layout, &client, ProcessOptions { format, skip_fetch }).await?;
            println!(
                "Exported {} rows across {} assignments to {}.",
                outcome.exported_rows,
                outcome.assignments.len(),
                outcome.export_path.display()
            );
            println!("Plots written to {}.", layout.plots_dir().display());
            println!("Summary written to {}.", outcome.summary_path.display());
            for failure in &outcome.failures {
                println!("Skipped {}: {}", failure.assignment, failure.reason);
            }
        }
        Commands::Scores { limit, json } => {
            let (reports, failures) = pipeline::load(&layout)?;
            let scores = score::rank_scores(&score::suspicion_scores(&reports), &reports);
            let top: Vec<_> = scores.into_iter().take(limit).collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&top)?);
            } else if top.is_empty() {
                println!("No parsed matches to score.");
            } else {
                println!("Top submitters by suspicion score:");
                for score in &top {
                    println!(
                        "- {} score {:.2} across {} matches",
                        score.submitter, score.score, score.match_count
                    );
                }
            }
            for failure in &failures {
                eprintln!("Skipped {}: {}", failure.assignment, failure.reason);
            }
        }
    }

    Ok(())
}
