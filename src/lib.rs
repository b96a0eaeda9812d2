//! # vsix-autoupdate
//!
//! Background auto-update agent for npm-distributed editor extensions.
//!
//! A registration names an npm package carrying a packaged extension
//! artifact (`.vsix`) and the editor installation to keep fresh. The
//! controller polls the registry, and when a strictly newer version is
//! published it fetches the package into a local cache and hands the
//! artifact to the editor binary (`code --install-extension <artifact>`).
//! Lifecycle hooks report the outcome of each phase; the agent itself
//! never prints or exits.
//!
//! ```no_run
//! use std::time::Duration;
//! use vsix_autoupdate::{UpdateConfig, UpdateController};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = UpdateConfig::new("my-extension-pkg", "1.2.0", "/usr/share/code")
//!     .with_interval(Some(Duration::from_secs(300)))
//!     .on_after_update(|err| async move {
//!         match err {
//!             None => println!("extension updated"),
//!             Some(err) => eprintln!("update failed: {err}"),
//!         }
//!         Ok(())
//!     });
//! let controller = UpdateController::register(config)?;
//! // ... later
//! controller.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//! - `controller`: polling scheduler, single-flight guard, hook dispatch
//! - `updater`: fetch-and-install action
//! - `check`: update predicates (registry/semver or caller-supplied)
//! - `registry`: npm packument lookup
//! - `process`: timeout-enforced external command execution

pub mod check;
pub mod config;
pub mod controller;
pub mod error;
pub mod process;
pub mod registry;
pub mod updater;
pub mod util;

pub use check::{from_fn, FnCheck, RegistryCheck, VersionCheck};
pub use config::{ConfigError, Hooks, UpdateConfig};
pub use controller::UpdateController;
pub use error::UpdateError;
pub use process::{ProcessError, RunOptions};
pub use registry::{LookupError, RegistryClient};
pub use updater::{Install, Updater};
