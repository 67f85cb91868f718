use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CRATE_TARGET: &str = "plagiarism_triage";

/// Install the global subscriber. `RUST_LOG` or `TRIAGE_LOG` take precedence
/// over the command-line level.
pub fn init_tracing(
    verbose: bool,
    log_level: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let directive = filter_directive(verbose, log_level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("TRIAGE_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .try_init()?;

    Ok(())
}

fn filter_directive(verbose: bool, log_level: Option<&str>) -> String {
    match (verbose, log_level) {
        (_, Some(level)) if level.contains('=') => level.to_string(),
        (_, Some(level)) => format!("{CRATE_TARGET}={level}"),
        (true, None) => format!("{CRATE_TARGET}=debug"),
        (false, None) => format!("{CRATE_TARGET}=info"),
    }
}
