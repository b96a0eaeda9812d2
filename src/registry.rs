//! npm registry version lookup (minimal packument client).
//!
//! Fetches `{registry}/{package}` and reads the `dist-tags` table. Only the
//! latest-version surface is needed here; the rest of the packument is
//! ignored.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::util::trim_trailing_slashes;

/// Errors from resolving a distribution tag against the registry.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Registry request for {package} failed: {source}")]
    Http {
        package: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Registry returned {status} for {package}")]
    Status {
        package: String,
        status: reqwest::StatusCode,
    },

    #[error("Malformed packument for {package}: {source}")]
    Body {
        package: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Registry published unparseable version {version:?} for {package}: {source}")]
    BadVersion {
        package: String,
        version: String,
        #[source]
        source: semver::Error,
    },
}

/// The subset of an npm packument this crate reads.
#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: HashMap<String, String>,
}

/// Minimal registry client resolving distribution tags to version strings.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    client: reqwest::Client,
}

impl RegistryClient {
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_trailing_slashes(&registry_url.into()),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Latest published version for `package` under `tag`, or `None` when
    /// the registry knows no such tag.
    pub async fn latest_version(
        &self,
        package: &str,
        tag: &str,
    ) -> Result<Option<String>, LookupError> {
        let url = format!("{}/{}", self.base_url, package);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| LookupError::Http {
                package: package.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                package: package.to_string(),
                status,
            });
        }

        let packument: Packument = resp.json().await.map_err(|source| LookupError::Body {
            package: package.to_string(),
            source,
        })?;

        let latest = packument.dist_tags.get(tag).cloned();
        debug!(package, tag, ?latest, "resolved distribution tag");
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = RegistryClient::new("https://registry.npmjs.org/");
        assert_eq!(client.base_url(), "https://registry.npmjs.org");
    }

    #[test]
    fn packument_reads_dist_tags() {
        let raw = r#"{
            "name": "some-extension",
            "dist-tags": { "latest": "1.4.2", "next": "2.0.0-beta.3" },
            "versions": {}
        }"#;
        let packument: Packument = serde_json::from_str(raw).unwrap();
        assert_eq!(packument.dist_tags.get("latest").map(String::as_str), Some("1.4.2"));
        assert_eq!(packument.dist_tags.get("next").map(String::as_str), Some("2.0.0-beta.3"));
        assert!(packument.dist_tags.get("canary").is_none());
    }

    #[test]
    fn packument_tolerates_missing_dist_tags() {
        let packument: Packument = serde_json::from_str(r#"{ "name": "x" }"#).unwrap();
        assert!(packument.dist_tags.is_empty());
    }
}
