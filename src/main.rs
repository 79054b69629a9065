use std::process::ExitCode;

use clap::Parser;

use kindling::cli::commands::run::RunParams;
use kindling::cli::{commands, Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Telemetry comes up even when configuration is broken so the error
    // itself gets logged somewhere visible.
    let (log_level, json_logs) = match kindling::config::config() {
        Ok(cfg) => (
            cfg.observability.log_level.clone(),
            cfg.observability.json_logs,
        ),
        Err(_) => ("info".to_string(), false),
    };
    if let Err(e) = kindling::telemetry::init_telemetry(&log_level, json_logs) {
        eprintln!("❌ Failed to initialize logging: {e}");
        return ExitCode::from(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("❌ Failed to start async runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Commands::Run {
                cluster_name,
                event,
                branch,
                changed_paths,
                paths,
                main_branch,
                skip_trigger_check,
                report,
                dry_run,
            } => {
                commands::run::run_command(RunParams {
                    cluster_name,
                    event,
                    branch,
                    changed_paths,
                    paths,
                    main_branch,
                    skip_trigger_check,
                    report,
                    dry_run,
                })
                .await
            }
            Commands::Teardown { cluster_name } => {
                commands::teardown::teardown_command(cluster_name).await
            }
            Commands::Doctor { verbose } => commands::doctor::doctor_command(verbose).await,
            Commands::Trigger {
                event,
                branch,
                changed_paths,
                paths,
                main_branch,
            } => {
                commands::trigger::trigger_command(event, branch, changed_paths, paths, main_branch)
                    .await
            }
        }
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::from(1)
        }
    }
}
