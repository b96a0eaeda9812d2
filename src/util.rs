//! Shared utility functions used across the codebase.

use std::path::PathBuf;

/// Return the value of `$HOME` as a path, falling back to `/root`.
pub fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/root".to_string()))
}

/// Strip trailing slashes from a registry base URL.
///
/// Registry URLs are configured with or without a trailing slash; request
/// paths are always built as `{base}/{package}`, so the base must not end
/// with one.
pub fn trim_trailing_slashes(url: &str) -> String {
    let mut url = url.to_string();
    while url.ends_with('/') {
        url.pop();
    }
    url
}
