//! Update predicates.
//!
//! The controller decides whether to install through a [`VersionCheck`]
//! strategy selected once at registration: either the default
//! registry-plus-semver comparison, or a caller-supplied predicate that
//! replaces it wholesale.

use async_trait::async_trait;
use futures::future::BoxFuture;
use semver::Version;
use tracing::debug;

use crate::error::UpdateError;
use crate::registry::{LookupError, RegistryClient};

/// Whether a newer version should be installed.
#[async_trait]
pub trait VersionCheck: Send + Sync {
    /// Pure query; must not mutate controller state. Lookup failures
    /// propagate to the caller, which decides how to route them.
    async fn should_update(&self) -> Result<bool, UpdateError>;
}

/// Default predicate: update iff the published version is strictly newer
/// than the current one under semver precedence.
pub struct RegistryCheck {
    client: RegistryClient,
    package: String,
    tag: String,
    current: Version,
}

impl RegistryCheck {
    pub fn new(
        client: RegistryClient,
        package: impl Into<String>,
        tag: impl Into<String>,
        current: Version,
    ) -> Self {
        Self {
            client,
            package: package.into(),
            tag: tag.into(),
            current,
        }
    }

    /// Compare the current version against a raw registry answer.
    ///
    /// An absent answer means no update (fail-safe, not fail-open).
    fn decide(
        current: &Version,
        latest: Option<&str>,
        package: &str,
    ) -> Result<bool, LookupError> {
        let Some(raw) = latest else {
            return Ok(false);
        };
        let latest = Version::parse(raw).map_err(|source| LookupError::BadVersion {
            package: package.to_string(),
            version: raw.to_string(),
            source,
        })?;
        Ok(*current < latest)
    }
}

#[async_trait]
impl VersionCheck for RegistryCheck {
    async fn should_update(&self) -> Result<bool, UpdateError> {
        let latest = self.client.latest_version(&self.package, &self.tag).await?;
        let newer = Self::decide(&self.current, latest.as_deref(), &self.package)?;
        debug!(
            package = %self.package,
            current = %self.current,
            ?latest,
            newer,
            "version check"
        );
        Ok(newer)
    }
}

/// Caller-supplied predicate created by [`from_fn`].
pub struct FnCheck {
    inner: Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<bool>> + Send + Sync>,
}

/// Adapt an async closure into a [`VersionCheck`].
///
/// The closure replaces the default registry logic entirely; the controller
/// never consults the registry when a custom predicate is registered.
pub fn from_fn<F, Fut>(f: F) -> FnCheck
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    FnCheck {
        inner: Box::new(move || -> BoxFuture<'static, anyhow::Result<bool>> { Box::pin(f()) }),
    }
}

#[async_trait]
impl VersionCheck for FnCheck {
    async fn should_update(&self) -> Result<bool, UpdateError> {
        (self.inner)().await.map_err(UpdateError::Check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> Version {
        Version::parse(raw).unwrap()
    }

    #[test]
    fn strictly_newer_version_triggers_update() {
        assert!(RegistryCheck::decide(&v("1.2.0"), Some("1.3.0"), "pkg").unwrap());
        assert!(RegistryCheck::decide(&v("1.2.0"), Some("2.0.0"), "pkg").unwrap());
    }

    #[test]
    fn same_or_older_version_does_not() {
        assert!(!RegistryCheck::decide(&v("1.3.0"), Some("1.3.0"), "pkg").unwrap());
        assert!(!RegistryCheck::decide(&v("1.3.0"), Some("1.2.0"), "pkg").unwrap());
    }

    #[test]
    fn prerelease_orders_below_release() {
        assert!(RegistryCheck::decide(&v("1.3.0-beta.1"), Some("1.3.0"), "pkg").unwrap());
        assert!(!RegistryCheck::decide(&v("1.3.0"), Some("1.3.0-beta.1"), "pkg").unwrap());
    }

    #[test]
    fn absent_latest_is_fail_safe() {
        assert!(!RegistryCheck::decide(&v("1.2.0"), None, "pkg").unwrap());
    }

    #[test]
    fn unparseable_latest_is_a_lookup_failure() {
        let err = RegistryCheck::decide(&v("1.2.0"), Some("not-a-version"), "pkg").unwrap_err();
        assert!(matches!(err, LookupError::BadVersion { .. }));
    }

    #[tokio::test]
    async fn custom_predicate_replaces_default_logic() {
        let check = from_fn(|| async { Ok(true) });
        assert!(check.should_update().await.unwrap());

        let check = from_fn(|| async { anyhow::bail!("registry unreachable") });
        let err = check.should_update().await.unwrap_err();
        assert!(matches!(err, UpdateError::Check(_)));
    }
}
