use clap::{Parser, Subcommand};

pub mod commands;

#[derive(Parser)]
#[command(name = "kindling")]
#[command(about = "Ephemeral-cluster integration pipeline runner")]
#[command(long_about = "Kindling runs an integration-test job against a short-lived kind cluster: \
                       verify the toolchain, create the cluster, start the server under test, wait \
                       for it to become healthy, run the suite, and always tear the cluster down. \
                       Start with 'kindling doctor' to check your environment.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute the full pipeline against a fresh ephemeral cluster
    Run {
        /// Name for the ephemeral cluster (defaults to the configured name)
        #[arg(long, help = "Override the configured ephemeral cluster name")]
        cluster_name: Option<String>,
        /// Trigger event to gate the run on
        #[arg(long, default_value = "dispatch", help = "Trigger event: dispatch, pull-request, push")]
        event: String,
        /// Branch of a push event
        #[arg(long, help = "Branch name for push events")]
        branch: Option<String>,
        /// Changed path of the trigger event (repeatable)
        #[arg(long = "changed-path", help = "Changed path for trigger evaluation, repeatable")]
        changed_paths: Vec<String>,
        /// Path filter glob override (repeatable)
        #[arg(long = "path", help = "Override the configured path filters, repeatable")]
        paths: Vec<String>,
        /// Main branch override for push gating
        #[arg(long, help = "Override the configured main branch name")]
        main_branch: Option<String>,
        /// Run unconditionally, without trigger evaluation
        #[arg(long, help = "Skip trigger evaluation and run unconditionally")]
        skip_trigger_check: bool,
        /// Write a JSON run report
        #[arg(long, num_args = 0..=1, default_missing_value = "", help = "Write the JSON run report (optional path)")]
        report: Option<String>,
        /// Show the planned steps without executing
        #[arg(long, help = "Show the planned steps without touching anything")]
        dry_run: bool,
    },
    /// Delete the ephemeral cluster if it exists (idempotent, recovers leaks)
    Teardown {
        /// Name of the cluster to delete (defaults to the configured name)
        #[arg(long, help = "Override the configured ephemeral cluster name")]
        cluster_name: Option<String>,
    },
    /// Diagnose the toolchain, environment, and workspace
    Doctor {
        /// Show detailed probe output
        #[arg(long, short = 'v', help = "Show detailed diagnostic information")]
        verbose: bool,
    },
    /// Evaluate a trigger event: exit 0 to run, 2 to skip
    Trigger {
        /// Trigger event to evaluate
        #[arg(long, default_value = "dispatch", help = "Trigger event: dispatch, pull-request, push")]
        event: String,
        /// Branch of a push event
        #[arg(long, help = "Branch name for push events")]
        branch: Option<String>,
        /// Changed path of the trigger event (repeatable)
        #[arg(long = "changed-path", help = "Changed path for trigger evaluation, repeatable")]
        changed_paths: Vec<String>,
        /// Path filter glob override (repeatable)
        #[arg(long = "path", help = "Override the configured path filters, repeatable")]
        paths: Vec<String>,
        /// Main branch override for push gating
        #[arg(long, help = "Override the configured main branch name")]
        main_branch: Option<String>,
    },
}
