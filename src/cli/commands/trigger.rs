//! Trigger evaluation command
//!
//! CI front-ends call this to decide whether a run is warranted before
//! paying for one. Exit 0 means run, exit 2 means skip.

use anyhow::{bail, Result};

use crate::config::config;
use crate::trigger::{evaluate, PathFilter, TriggerEvent};

/// Build a `TriggerEvent` from CLI flags
pub fn parse_event(
    event: &str,
    branch: Option<String>,
    changed_paths: Vec<String>,
) -> Result<TriggerEvent> {
    match event {
        "dispatch" | "workflow-dispatch" => Ok(TriggerEvent::Dispatch),
        "pull-request" | "pull_request" | "pr" => Ok(TriggerEvent::PullRequest { changed_paths }),
        "push" => {
            let Some(branch) = branch else {
                bail!("push events need --branch");
            };
            Ok(TriggerEvent::Push {
                branch,
                changed_paths,
            })
        }
        other => bail!("unknown trigger event '{other}' (expected dispatch, pull-request, or push)"),
    }
}

pub async fn trigger_command(
    event: String,
    branch: Option<String>,
    changed_paths: Vec<String>,
    paths: Vec<String>,
    main_branch: Option<String>,
) -> Result<u8> {
    let cfg = config()?;
    let event = parse_event(&event, branch, changed_paths)?;

    let globs = if paths.is_empty() {
        cfg.trigger.paths.clone()
    } else {
        paths
    };
    let filter = PathFilter::new(&globs)?;
    let main_branch = main_branch.unwrap_or_else(|| cfg.trigger.main_branch.clone());

    println!(
        "🔍 Evaluating {} event against {} path filter(s)",
        event.kind(),
        globs.len()
    );

    let decision = evaluate(&event, &main_branch, &filter);
    if decision.should_run() {
        println!("✅ RUN: {}", decision.reason());
        Ok(0)
    } else {
        println!("⏭️  SKIP: {}", decision.reason());
        Ok(2)
    }
}
