//! Update task controller.
//!
//! Owns the polling scheduler, the single-flight execution guard, the
//! two-phase error funnel, and hook dispatch. Composes a [`VersionCheck`]
//! and an [`Install`] strategy selected once at registration and never
//! switched afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::check::{RegistryCheck, VersionCheck};
use crate::config::{ConfigError, Hooks, UpdateConfig};
use crate::error::UpdateError;
use crate::registry::RegistryClient;
use crate::updater::{Install, Updater};

struct Inner {
    package: String,
    hooks: Hooks,
    checker: Box<dyn VersionCheck>,
    installer: Box<dyn Install>,
    /// Single-flight guard: set while one task execution is in flight.
    executing: AtomicBool,
    /// One-way stop flag, observed by the scheduler on wake.
    stopped: AtomicBool,
}

/// Handle to one registered update task. Cloning shares the task.
#[derive(Clone)]
pub struct UpdateController {
    inner: Arc<Inner>,
}

impl UpdateController {
    /// Register an update task.
    ///
    /// Spawns the polling scheduler when an interval is configured, so this
    /// must be called from within a Tokio runtime in that case. With
    /// `interval: None` only explicit [`run_slice`](Self::run_slice) /
    /// [`force_update`](Self::force_update) / [`check_update`](Self::check_update)
    /// calls drive execution.
    pub fn register(mut config: UpdateConfig) -> Result<Self, ConfigError> {
        let current = config.validate()?;
        let hooks = std::mem::take(&mut config.hooks);
        let checker: Box<dyn VersionCheck> = match config.checker.take() {
            Some(custom) => custom,
            None => Box::new(RegistryCheck::new(
                RegistryClient::new(config.registry_url.clone()),
                config.package.clone(),
                config.npm_tag.clone(),
                current,
            )),
        };
        let installer = Box::new(Updater::from_config(&config));
        Ok(Self::assemble(
            config.package,
            hooks,
            checker,
            installer,
            config.interval,
        ))
    }

    fn assemble(
        package: String,
        hooks: Hooks,
        checker: Box<dyn VersionCheck>,
        installer: Box<dyn Install>,
        interval: Option<Duration>,
    ) -> Self {
        let controller = Self {
            inner: Arc::new(Inner {
                package,
                hooks,
                checker,
                installer,
                executing: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        };
        if let Some(interval) = interval {
            controller.spawn_scheduler(interval);
        }
        controller
    }

    fn spawn_scheduler(&self, interval: Duration) {
        let controller = self.clone();
        tokio::spawn(async move {
            debug!(package = %controller.inner.package, ?interval, "update scheduler started");
            loop {
                tokio::time::sleep(interval).await;
                if controller.inner.stopped.load(Ordering::SeqCst) {
                    break;
                }
                // One bad tick must never kill the loop.
                if let Err(err) = controller.run_slice().await {
                    warn!(
                        package = %controller.inner.package,
                        error = %err,
                        "scheduled update run failed"
                    );
                }
            }
            debug!(package = %controller.inner.package, "update scheduler stopped");
        });
    }

    /// Run one check-then-maybe-install execution.
    ///
    /// Silently no-ops when another execution is already in flight. Check
    /// and install failures are funneled into the corresponding hook's
    /// error argument and never returned from here; only a failing hook
    /// propagates, aborting the execution it runs in.
    pub async fn run_slice(&self) -> anyhow::Result<()> {
        let Some(_guard) = ExecutionGuard::acquire(&self.inner.executing) else {
            debug!(package = %self.inner.package, "update run already in flight, skipping");
            return Ok(());
        };

        if let Some(before_check) = &self.inner.hooks.before_check {
            before_check().await?;
        }

        let needed = match self.inner.checker.should_update().await {
            Ok(needed) => needed,
            Err(err) => {
                // Terminal for this execution; visible only through the
                // hook argument.
                warn!(package = %self.inner.package, error = %err, "update check failed");
                if let Some(before_update) = &self.inner.hooks.before_update {
                    before_update(Some(err)).await?;
                }
                return Ok(());
            }
        };

        if let Some(before_update) = &self.inner.hooks.before_update {
            before_update(None).await?;
        }
        if !needed {
            return Ok(());
        }

        info!(package = %self.inner.package, "newer version published, installing");
        let outcome = self.inner.installer.install().await;
        if let Err(err) = &outcome {
            warn!(package = %self.inner.package, error = %err, "update install failed");
        }
        if let Some(after_update) = &self.inner.hooks.after_update {
            after_update(outcome.err()).await?;
        }
        Ok(())
    }

    /// Install directly, bypassing the version check, the hooks, and the
    /// single-flight gate. Escape hatch for manual reinstalls; may overlap
    /// a scheduled run.
    pub async fn force_update(&self) -> Result<(), UpdateError> {
        self.inner.installer.install().await
    }

    /// Run the version check alone. No side effects, no gating.
    pub async fn check_update(&self) -> Result<bool, UpdateError> {
        self.inner.checker.should_update().await
    }

    /// Stop future scheduler-triggered executions. Idempotent. An execution
    /// already in flight runs to completion, and spawned processes are not
    /// cancelled.
    pub fn stop(&self) {
        if !self.inner.stopped.swap(true, Ordering::SeqCst) {
            info!(package = %self.inner.package, "update task stopped");
        }
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

/// Clears the single-flight flag on drop, so the guard releases on every
/// exit path: normal completion, hook-error early return, or panic.
struct ExecutionGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ExecutionGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
