//! Task registration configuration.
//!
//! One [`UpdateConfig`] describes one auto-update task: which npm package to
//! watch, which editor installation to keep fresh, and how often to poll.
//! The registration is immutable once handed to
//! [`UpdateController::register`](crate::controller::UpdateController::register).

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use futures::future::BoxFuture;
use semver::Version;
use thiserror::Error;

use crate::check::VersionCheck;
use crate::error::UpdateError;
use crate::util::home_dir;

/// Default polling interval between update checks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default npm registry queried for new versions.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org/";

/// Default distribution tag resolved against the registry.
pub const DEFAULT_NPM_TAG: &str = "latest";

/// Default artifact location relative to the fetched package root.
pub const DEFAULT_VSIX_REL_PATH: &str = "extension.vsix";

/// Default wall-clock bound on the package fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Default wall-clock bound on the installer invocation.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Directory name of the shared download cache under `$HOME`.
pub const CACHE_DIR_NAME: &str = ".vsix-autoupdate";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Package identifier cannot be empty")]
    EmptyPackage,

    #[error("Invalid current version {0:?}: {1}")]
    InvalidCurrentVersion(String, semver::Error),

    #[error("Polling interval must be non-zero")]
    ZeroInterval,

    #[error("Registry URL cannot be empty")]
    EmptyRegistryUrl,
}

/// Future returned by lifecycle hooks.
pub type HookFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Hook invoked before each version check.
pub type BeforeCheckHook = Box<dyn Fn() -> HookFuture + Send + Sync>;

/// Hook invoked once a phase settles, carrying that phase's error if one
/// occurred.
pub type PhaseHook = Box<dyn Fn(Option<UpdateError>) -> HookFuture + Send + Sync>;

/// Optional lifecycle callbacks, each invoked at most once per task
/// execution. Hook failures are not caught by the controller: a failing
/// hook aborts the execution it runs in.
#[derive(Default)]
pub struct Hooks {
    /// Runs before the version check.
    pub before_check: Option<BeforeCheckHook>,
    /// Runs once the check phase settles; receives the check error, if any.
    pub before_update: Option<PhaseHook>,
    /// Runs once the install phase settles; receives the install error, if any.
    pub after_update: Option<PhaseHook>,
}

/// Registration for one auto-update task.
pub struct UpdateConfig {
    /// npm package identifier to watch.
    pub package: String,
    /// Version currently installed, as a semver string.
    pub current_version: String,
    /// Distribution tag resolved against the registry.
    pub npm_tag: String,
    /// Registry base URL.
    pub registry_url: String,
    /// Editor application root the installer binary is resolved from.
    pub editor_root: PathBuf,
    /// Polling interval. `None` disables the scheduler entirely; only
    /// explicit calls drive execution in that mode.
    pub interval: Option<Duration>,
    /// Artifact path relative to the fetched package root.
    pub vsix_rel_path: PathBuf,
    /// Download cache override. Defaults to `$HOME/.vsix-autoupdate`.
    pub cache_dir: Option<PathBuf>,
    /// Command used to fetch the package into the cache.
    pub package_manager: String,
    /// Wall-clock bound on the package fetch.
    pub fetch_timeout: Duration,
    /// Wall-clock bound on the installer invocation.
    pub install_timeout: Duration,
    /// Silence child-process stdio instead of inheriting it.
    pub quiet: bool,
    /// Lifecycle callbacks.
    pub hooks: Hooks,
    /// Custom update predicate. Replaces the registry/semver check entirely.
    pub checker: Option<Box<dyn VersionCheck>>,
}

impl UpdateConfig {
    pub fn new(
        package: impl Into<String>,
        current_version: impl Into<String>,
        editor_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            package: package.into(),
            current_version: current_version.into(),
            npm_tag: DEFAULT_NPM_TAG.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            editor_root: editor_root.into(),
            interval: Some(DEFAULT_INTERVAL),
            vsix_rel_path: PathBuf::from(DEFAULT_VSIX_REL_PATH),
            cache_dir: None,
            package_manager: "npm".to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
            quiet: false,
            hooks: Hooks::default(),
            checker: None,
        }
    }

    /// Polling interval; `None` disables the scheduler.
    pub fn with_interval(mut self, interval: Option<Duration>) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_npm_tag(mut self, tag: impl Into<String>) -> Self {
        self.npm_tag = tag.into();
        self
    }

    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    pub fn with_vsix_rel_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.vsix_rel_path = path.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_package_manager(mut self, program: impl Into<String>) -> Self {
        self.package_manager = program.into();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_install_timeout(mut self, timeout: Duration) -> Self {
        self.install_timeout = timeout;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Replace the default registry/semver predicate.
    pub fn with_checker<C: VersionCheck + 'static>(mut self, checker: C) -> Self {
        self.checker = Some(Box::new(checker));
        self
    }

    pub fn on_before_check<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.before_check = Some(Box::new(move || -> HookFuture { Box::pin(hook()) }));
        self
    }

    pub fn on_before_update<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Option<UpdateError>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.before_update = Some(Box::new(move |err| -> HookFuture { Box::pin(hook(err)) }));
        self
    }

    pub fn on_after_update<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Option<UpdateError>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.after_update = Some(Box::new(move |err| -> HookFuture { Box::pin(hook(err)) }));
        self
    }

    /// Cache directory this registration fetches into.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(CACHE_DIR_NAME))
    }

    /// Validate the registration, returning the parsed current version.
    pub(crate) fn validate(&self) -> Result<Version, ConfigError> {
        if self.package.trim().is_empty() {
            return Err(ConfigError::EmptyPackage);
        }
        let current = Version::parse(&self.current_version).map_err(|source| {
            ConfigError::InvalidCurrentVersion(self.current_version.clone(), source)
        })?;
        if matches!(self.interval, Some(interval) if interval.is_zero()) {
            return Err(ConfigError::ZeroInterval);
        }
        if self.registry_url.trim().is_empty() {
            return Err(ConfigError::EmptyRegistryUrl);
        }
        Ok(current)
    }
}
