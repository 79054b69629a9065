//! Trigger gating
//!
//! Decides whether a trigger event warrants a pipeline run: manual dispatch
//! always does, pull requests and pushes to the main branch only when a
//! changed path matches the configured filters.

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// The events that can warrant a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Manual dispatch, unconditional
    Dispatch,
    /// Pull request carrying the listed changed paths
    PullRequest { changed_paths: Vec<String> },
    /// Push to a branch carrying the listed changed paths
    Push {
        branch: String,
        changed_paths: Vec<String>,
    },
}

impl TriggerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerEvent::Dispatch => "dispatch",
            TriggerEvent::PullRequest { .. } => "pull_request",
            TriggerEvent::Push { .. } => "push",
        }
    }
}

/// Outcome of evaluating an event against the trigger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TriggerDecision {
    Run { reason: String },
    Skip { reason: String },
}

impl TriggerDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, TriggerDecision::Run { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            TriggerDecision::Run { reason } | TriggerDecision::Skip { reason } => reason,
        }
    }
}

/// Ordered changed-path globs compiled to anchored regular expressions.
///
/// `**` crosses directory separators, `*` and `?` stay within one segment,
/// matching the path-filter semantics of the CI surface this gate mirrors.
#[derive(Debug)]
pub struct PathFilter {
    patterns: Vec<CompiledPattern>,
}

#[derive(Debug)]
struct CompiledPattern {
    raw: String,
    regex: Regex,
}

impl PathFilter {
    pub fn new<I, S>(globs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();
        for glob in globs {
            let raw = glob.as_ref().to_string();
            let regex = Regex::new(&glob_to_regex(&raw))
                .map_err(|e| anyhow!("invalid path filter '{}': {}", raw, e))?;
            patterns.push(CompiledPattern { raw, regex });
        }
        Ok(Self { patterns })
    }

    /// True when any pattern matches the path. An empty filter list matches
    /// nothing.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.regex.is_match(path))
    }

    /// First pattern matching any of the paths, for decision reasons.
    pub fn first_match<'s, 'p>(&'s self, paths: &'p [String]) -> Option<(&'s str, &'p str)> {
        for path in paths {
            for pattern in &self.patterns {
                if pattern.regex.is_match(path) {
                    return Some((pattern.raw.as_str(), path.as_str()));
                }
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Translate one CI-style glob into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::from("^");
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        // "**/" spans zero or more whole segments
                        regex.push_str("(?:[^/]+/)*");
                    } else {
                        regex.push_str(".*");
                    }
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            c if "\\.+()|[]{}^$".contains(c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
    }

    regex.push('$');
    regex
}

/// Evaluate a trigger event against the configured main branch and filters
pub fn evaluate(event: &TriggerEvent, main_branch: &str, filter: &PathFilter) -> TriggerDecision {
    let decision = match event {
        TriggerEvent::Dispatch => TriggerDecision::Run {
            reason: "manual dispatch always runs".to_string(),
        },
        TriggerEvent::PullRequest { changed_paths } => match filter.first_match(changed_paths) {
            Some((pattern, path)) => TriggerDecision::Run {
                reason: format!("changed path '{path}' matches filter '{pattern}'"),
            },
            None => TriggerDecision::Skip {
                reason: "no changed path matches the configured filters".to_string(),
            },
        },
        TriggerEvent::Push {
            branch,
            changed_paths,
        } => {
            if branch != main_branch {
                TriggerDecision::Skip {
                    reason: format!("push to '{branch}' is not the main branch '{main_branch}'"),
                }
            } else {
                match filter.first_match(changed_paths) {
                    Some((pattern, path)) => TriggerDecision::Run {
                        reason: format!("changed path '{path}' matches filter '{pattern}'"),
                    },
                    None => TriggerDecision::Skip {
                        reason: "no changed path matches the configured filters".to_string(),
                    },
                }
            }
        }
    };

    debug!(
        event = event.kind(),
        run = decision.should_run(),
        reason = decision.reason(),
        "Trigger evaluated"
    );
    decision
}
