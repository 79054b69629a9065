//! Workspace checkout validation
//!
//! A local run already stands inside a checkout, so this step validates the
//! workspace and test directories and records the revision under test. A
//! workspace that is not a git repository is allowed; the revision is then
//! absent from the report.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    pub root: PathBuf,
    pub test_dir: PathBuf,
    pub revision: Option<String>,
}

/// Validate the workspace layout and resolve the revision under test
pub fn inspect(root: &Path, test_dir_rel: &Path) -> Result<WorkspaceInfo, PipelineError> {
    let root = root.canonicalize().map_err(|e| {
        PipelineError::setup(
            "workspace",
            format!("workspace root '{}' not usable: {}", root.display(), e),
        )
    })?;

    let test_dir = root.join(test_dir_rel);
    if !test_dir.is_dir() {
        return Err(PipelineError::setup(
            "workspace",
            format!("test working directory '{}' not found", test_dir.display()),
        ));
    }

    let revision = resolve_revision(&root);
    match &revision {
        Some(rev) => info!(workspace = %root.display(), revision = %rev, "Workspace validated"),
        None => info!(workspace = %root.display(), "Workspace validated (not a git repository)"),
    }

    Ok(WorkspaceInfo {
        root,
        test_dir,
        revision,
    })
}

/// HEAD commit id, best-effort
fn resolve_revision(root: &Path) -> Option<String> {
    let repo = match git2::Repository::discover(root) {
        Ok(repo) => repo,
        Err(e) => {
            debug!(workspace = %root.display(), error = %e, "No git repository found");
            return None;
        }
    };

    repo.head()
        .ok()
        .and_then(|head| head.peel_to_commit().ok())
        .map(|commit| commit.id().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_accepts_plain_directory_without_revision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("tests")).unwrap();

        let info = inspect(dir.path(), Path::new("tests")).unwrap();
        assert!(info.test_dir.ends_with("tests"));
        assert!(info.revision.is_none());
    }

    #[test]
    fn inspect_rejects_missing_test_dir() {
        let dir = tempfile::tempdir().unwrap();

        let err = inspect(dir.path(), Path::new("does-not-exist")).unwrap_err();
        assert!(matches!(err, PipelineError::Setup { .. }));
    }

    #[test]
    fn inspect_rejects_missing_root() {
        let err = inspect(Path::new("/kindling-no-such-root"), Path::new(".")).unwrap_err();
        assert!(matches!(err, PipelineError::Setup { .. }));
    }

    #[test]
    fn inspect_records_head_revision_in_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("tests")).unwrap();

        let repo = git2::Repository::init(dir.path()).unwrap();
        let sig = git2::Signature::now("test", "test@example.com").unwrap();
        let tree_id = {
            let mut index = repo.index().unwrap();
            index.write_tree().unwrap()
        };
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();

        let info = inspect(dir.path(), Path::new("tests")).unwrap();
        assert!(info.revision.is_some());
        assert_eq!(info.revision.unwrap().len(), 40);
    }
}
