//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

/// ddmon - keeps Datadog monitors in sync with Monitor resources
#[derive(Parser, Debug, Default)]
#[command(name = "ddmon")]
#[command(version)]
#[command(about = "Keeps Datadog monitors in sync with declarative Monitor resources")]
#[command(
    long_about = "ddmon loads Monitor manifests from a directory and creates the matching Datadog monitors. It re-submits them periodically, follows edits to the directory, and deletes a monitor once its manifest is removed."
)]
pub struct Cli {
    /// Operator config file (TOML)
    #[arg(short, long, env = "DDMON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory of Monitor manifests (*.yaml, *.yml)
    #[arg(short, long, env = "DDMON_MANIFESTS")]
    pub manifests: Option<PathBuf>,

    /// Snapshot file for the resource store
    #[arg(long, env = "DDMON_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Seconds between periodic re-submissions
    #[arg(long)]
    pub requeue_secs: Option<u64>,

    /// Number of concurrent reconciles
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Datadog API key (overrides DD_API_KEY)
    #[arg(long)]
    pub dd_api_key: Option<String>,

    /// Datadog application key (overrides DD_APP_KEY)
    #[arg(long)]
    pub dd_app_key: Option<String>,

    /// Datadog API base URL (overrides DD_API_URL)
    #[arg(long)]
    pub dd_api_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    pub log_json: bool,

    /// Reconcile against an in-memory Datadog instead of the real API
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_parse() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from([
            "ddmon",
            "--manifests",
            "monitors",
            "--requeue-secs",
            "60",
            "--workers",
            "8",
            "--state-file",
            "/var/lib/ddmon/state.json",
            "--log-json",
        ])?;

        assert_eq!(cli.manifests, Some(PathBuf::from("monitors")));
        assert_eq!(cli.requeue_secs, Some(60));
        assert_eq!(cli.workers, Some(8));
        assert_eq!(cli.state_file, Some(PathBuf::from("/var/lib/ddmon/state.json")));
        assert!(cli.log_json);
        assert!(!cli.dry_run);
        Ok(())
    }

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
