//! In-memory content registry.
//!
//! Maps a page key (e.g. `advanceEth`) to the HTML fragment for that page.
//! The registry is filled once at start-up and then shared read-only with
//! every consumer (CLI, pager, HTTP server).

use std::borrow::Cow;
use std::collections::BTreeMap;

use thiserror::Error;

/// Errors surfaced by registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Lookup of a key that was never registered.
    #[error("no page registered under key '{key}'")]
    NotFound { key: String },
    /// Key is empty or contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid page key '{key}'")]
    InvalidKey { key: String },
    /// Key registered twice under [`DuplicatePolicy::Reject`].
    #[error("page key '{key}' is already registered")]
    DuplicateKey { key: String },
}

/// What [`ContentRegistry::try_register`] does when a key already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Last write wins; the previous value is dropped and a warning logged.
    #[default]
    Overwrite,
    /// Keep the first value and fail with [`RegistryError::DuplicateKey`].
    Reject,
}

/// Returns `true` when `key` is a usable page identifier.
///
/// Keys double as URL path segments, so only ASCII alphanumerics, `_` and
/// `-` are accepted.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Key → content mapping.
///
/// Values are `Cow<'static, str>` so pages embedded with `include_str!` are
/// borrowed rather than copied, while pages read from disk are owned.
#[derive(Debug, Clone, Default)]
pub struct ContentRegistry {
    entries: BTreeMap<String, Cow<'static, str>>,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite the content stored under `key`.
    ///
    /// Never fails. When `key` was already present the previous value is
    /// returned and a warning is logged (last write wins).
    pub fn register(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Cow<'static, str>>,
    ) -> Option<Cow<'static, str>> {
        let key = key.into();
        let previous = self.entries.insert(key.clone(), value.into());
        if previous.is_some() {
            log::warn!("[registry] key={key} overwritten (last write wins)");
        }
        previous
    }

    /// Register with key validation and an explicit duplicate policy.
    pub fn try_register(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Cow<'static, str>>,
        policy: DuplicatePolicy,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        if !is_valid_key(&key) {
            return Err(RegistryError::InvalidKey { key });
        }
        if policy == DuplicatePolicy::Reject && self.entries.contains_key(&key) {
            return Err(RegistryError::DuplicateKey { key });
        }
        self.register(key, value);
        Ok(())
    }

    /// Move every entry of `other` into `self`, replacing existing keys.
    ///
    /// Returns the number of keys that were replaced. Replacement is the
    /// point of a merge, so it is not logged as a warning.
    pub fn merge(&mut self, other: ContentRegistry) -> usize {
        let mut replaced = 0;
        for (key, value) in other.entries {
            if self.entries.insert(key, value).is_some() {
                replaced += 1;
            }
        }
        replaced
    }

    /// Look up the content registered under `key`.
    pub fn get(&self, key: &str) -> Result<&str, RegistryError> {
        self.entries
            .get(key)
            .map(|v| v.as_ref())
            .ok_or_else(|| RegistryError::NotFound {
                key: key.to_owned(),
            })
    }

    /// All registered keys, sorted, each exactly once.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(key, content)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}
