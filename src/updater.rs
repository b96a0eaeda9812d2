//! Fetch-and-install action.
//!
//! One install attempt: fetch the package into the shared cache via the
//! package manager, verify the artifact actually landed, then hand it to
//! the editor binary. No retries here; the scheduler's next tick is the
//! retry policy.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::UpdateConfig;
use crate::error::UpdateError;
use crate::process::{self, RunOptions};

/// Environment override for the editor binary path.
pub const EDITOR_BIN_ENV: &str = "VSIX_AUTOUPDATE_CODE_BIN";

#[cfg(not(windows))]
const EDITOR_BIN_REL_PATH: &str = "bin/code";
#[cfg(windows)]
const EDITOR_BIN_REL_PATH: &str = "bin/code.cmd";

/// Install action seam. The controller composes either the real [`Updater`]
/// or a double in tests.
#[async_trait]
pub trait Install: Send + Sync {
    /// Perform one install attempt.
    async fn install(&self) -> Result<(), UpdateError>;
}

/// Fetches the watched package and installs its extension artifact.
#[derive(Debug, Clone)]
pub struct Updater {
    package: String,
    npm_tag: String,
    registry_url: String,
    editor_root: PathBuf,
    cache_dir: PathBuf,
    vsix_rel_path: PathBuf,
    package_manager: String,
    fetch_timeout: Duration,
    install_timeout: Duration,
    quiet: bool,
}

impl Updater {
    pub fn from_config(config: &UpdateConfig) -> Self {
        Self {
            package: config.package.clone(),
            npm_tag: config.npm_tag.clone(),
            registry_url: config.registry_url.clone(),
            editor_root: config.editor_root.clone(),
            cache_dir: config.resolved_cache_dir(),
            vsix_rel_path: config.vsix_rel_path.clone(),
            package_manager: config.package_manager.clone(),
            fetch_timeout: config.fetch_timeout,
            install_timeout: config.install_timeout,
            quiet: config.quiet,
        }
    }

    /// Path the artifact is expected at after a fetch.
    pub fn artifact_path(&self) -> PathBuf {
        self.cache_dir
            .join("node_modules")
            .join(&self.package)
            .join(&self.vsix_rel_path)
    }

    /// Editor binary, honoring the `VSIX_AUTOUPDATE_CODE_BIN` override.
    pub fn editor_binary(&self) -> PathBuf {
        if let Ok(path) = std::env::var(EDITOR_BIN_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        self.editor_root.join(EDITOR_BIN_REL_PATH)
    }

    /// Drop a minimal manifest into the cache dir so the package manager
    /// treats it as a project root. Pre-existing manifests are left alone;
    /// a write failure is tolerated since the fetch may still succeed.
    async fn ensure_manifest(&self) {
        let manifest = self.cache_dir.join("package.json");
        if manifest.exists() {
            return;
        }
        let body = serde_json::json!({ "name": "vsix-autoupdate-cache", "private": true });
        match tokio::fs::write(&manifest, body.to_string()).await {
            Ok(()) => debug!(path = %manifest.display(), "initialized cache manifest"),
            Err(err) => warn!(
                path = %manifest.display(),
                error = %err,
                "could not initialize cache manifest"
            ),
        }
    }
}

#[async_trait]
impl Install for Updater {
    async fn install(&self) -> Result<(), UpdateError> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|source| UpdateError::Cache {
                path: self.cache_dir.clone(),
                source,
            })?;
        self.ensure_manifest().await;

        let fetch_args = vec![
            "install".to_string(),
            self.package.clone(),
            "--tag".to_string(),
            self.npm_tag.clone(),
            format!("--registry={}", self.registry_url),
        ];
        info!(package = %self.package, tag = %self.npm_tag, "fetching package");
        process::run(
            &self.package_manager,
            &fetch_args,
            &RunOptions {
                timeout: Some(self.fetch_timeout),
                cwd: Some(self.cache_dir.clone()),
                quiet: self.quiet,
            },
        )
        .await?;

        // A clean fetch close is not enough: the artifact itself is the
        // success criterion.
        let artifact = self.artifact_path();
        if !artifact.is_file() {
            return Err(UpdateError::ArtifactMissing { path: artifact });
        }

        let binary = self.editor_binary().to_string_lossy().into_owned();
        let install_args = vec![
            "--install-extension".to_string(),
            artifact.to_string_lossy().into_owned(),
        ];
        info!(binary = %binary, artifact = %artifact.display(), "installing extension");
        process::run(
            &binary,
            &install_args,
            &RunOptions {
                timeout: Some(self.install_timeout),
                cwd: None,
                quiet: self.quiet,
            },
        )
        .await?;

        info!(package = %self.package, "extension installed");
        Ok(())
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use crate::config::UpdateConfig;
    use std::path::Path;

    fn updater_in(cache: &Path, editor_root: &Path) -> Updater {
        // `true` stands in for npm: closes cleanly without producing files.
        let config = UpdateConfig::new("some-extension", "1.0.0", editor_root)
            .with_cache_dir(cache)
            .with_package_manager("true")
            .with_quiet(true);
        Updater::from_config(&config)
    }

    fn write_executable(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, body).unwrap();
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }

    #[test]
    fn artifact_path_joins_cache_package_and_rel_path() {
        let config = UpdateConfig::new("some-extension", "1.0.0", "/opt/code")
            .with_cache_dir("/var/cache/vsix");
        let updater = Updater::from_config(&config);
        assert_eq!(
            updater.artifact_path(),
            PathBuf::from("/var/cache/vsix/node_modules/some-extension/extension.vsix")
        );
    }

    #[tokio::test]
    async fn clean_fetch_without_artifact_fails_with_artifact_missing() {
        let cache = tempfile::tempdir().unwrap();
        let editor = tempfile::tempdir().unwrap();
        let updater = updater_in(cache.path(), editor.path());

        let err = updater.install().await.unwrap_err();
        match err {
            UpdateError::ArtifactMissing { path } => {
                assert_eq!(path, updater.artifact_path());
            }
            other => panic!("expected ArtifactMissing, got {other}"),
        }
    }

    #[tokio::test]
    async fn install_initializes_cache_manifest() {
        let cache = tempfile::tempdir().unwrap();
        let editor = tempfile::tempdir().unwrap();
        let updater = updater_in(cache.path(), editor.path());

        let _ = updater.install().await;
        assert!(cache.path().join("package.json").is_file());
    }

    #[tokio::test]
    async fn install_runs_editor_binary_when_artifact_exists() {
        let cache = tempfile::tempdir().unwrap();
        let editor = tempfile::tempdir().unwrap();
        let updater = updater_in(cache.path(), editor.path());

        let artifact = updater.artifact_path();
        std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        std::fs::write(&artifact, b"vsix payload").unwrap();

        let bin_dir = editor.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        write_executable(&bin_dir.join("code"), "#!/bin/sh\nexit 0\n");

        tokio_test::assert_ok!(updater.install().await);
    }

    #[tokio::test]
    async fn artifact_directory_is_not_a_file() {
        let cache = tempfile::tempdir().unwrap();
        let editor = tempfile::tempdir().unwrap();
        let updater = updater_in(cache.path(), editor.path());

        // A directory at the artifact path must not pass the check.
        std::fs::create_dir_all(updater.artifact_path()).unwrap();
        let err = updater.install().await.unwrap_err();
        assert!(matches!(err, UpdateError::ArtifactMissing { .. }));
    }

    #[test]
    fn editor_binary_env_override_wins() {
        let config = UpdateConfig::new("some-extension", "1.0.0", "/opt/code");
        let updater = Updater::from_config(&config);
        assert_eq!(updater.editor_binary(), PathBuf::from("/opt/code/bin/code"));

        std::env::set_var(EDITOR_BIN_ENV, "/usr/bin/true");
        let overridden = updater.editor_binary();
        std::env::remove_var(EDITOR_BIN_ENV);
        assert_eq!(overridden, PathBuf::from("/usr/bin/true"));
    }
}
