//! Crate-wide error funnel.
//!
//! Check-phase and install-phase failures never escape the controller as
//! panics or bare results; the controller funnels them into the lifecycle
//! hooks as an [`UpdateError`] argument and ends the execution gracefully.

use std::path::PathBuf;

use thiserror::Error;

use crate::process::ProcessError;
use crate::registry::LookupError;

/// Failure of one task execution phase.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The version-lookup collaborator failed.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// An external command could not be executed to completion.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The download cache directory could not be prepared.
    #[error("Failed to prepare cache directory {}: {source}", .path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fetch closed cleanly but the expected artifact is absent or not
    /// a regular file.
    #[error("Extension artifact missing after fetch ({})", .path.display())]
    ArtifactMissing { path: PathBuf },

    /// A caller-supplied check predicate failed.
    #[error("Update check failed: {0}")]
    Check(anyhow::Error),
}

impl UpdateError {
    /// Whether this failure is an external-command timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Process(ProcessError::TimedOut { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timeout_is_distinguishable_through_the_funnel() {
        let err = UpdateError::from(ProcessError::TimedOut {
            program: "npm".to_string(),
            timeout: Duration::from_secs(300),
        });
        assert!(err.is_timeout());

        let err = UpdateError::ArtifactMissing {
            path: PathBuf::from("/tmp/extension.vsix"),
        };
        assert!(!err.is_timeout());
    }

    #[test]
    fn artifact_missing_carries_resolved_path() {
        let err = UpdateError::ArtifactMissing {
            path: PathBuf::from("/cache/node_modules/pkg/extension.vsix"),
        };
        assert!(err.to_string().contains("/cache/node_modules/pkg/extension.vsix"));
    }
}
