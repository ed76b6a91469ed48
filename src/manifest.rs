//! Navigation manifest.
//!
//! A small YAML document that groups page keys into titled sections and
//! fixes the reading order used by the sidebar, the prev/next links and the
//! pager. The registry stays the source of truth for which pages exist;
//! [`Manifest::validate`] reports where the two disagree.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::ContentRegistry;

/// Manifest shipped alongside the embedded pages.
pub const BUILTIN_MANIFEST: &str = include_str!("../content/manifest.yml");

/// Title of the synthetic section that collects pages missing from the
/// manifest.
pub const UNLISTED_SECTION: &str = "More";

fn default_home() -> String {
    "home".to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Site title shown in the page header and `<title>`.
    pub title: String,
    /// Key of the page served at `/`.
    #[serde(default = "default_home")]
    pub home: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub pages: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid manifest: {0}")]
    Parse(#[from] serde_yml::Error),
}

/// A disagreement between the manifest and the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestIssue {
    /// Listed in a section but not registered.
    MissingPage { section: String, key: String },
    /// Listed more than once; only the first listing is used.
    DuplicatePage { key: String },
    /// Registered but not listed in any section.
    Unlisted { key: String },
    /// `home` does not name a registered page.
    MissingHome { key: String },
}

impl fmt::Display for ManifestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestIssue::MissingPage { section, key } => {
                write!(f, "section '{section}' lists unknown page '{key}'")
            }
            ManifestIssue::DuplicatePage { key } => {
                write!(f, "page '{key}' is listed more than once")
            }
            ManifestIssue::Unlisted { key } => {
                write!(f, "page '{key}' is not listed in any section")
            }
            ManifestIssue::MissingHome { key } => {
                write!(f, "home page '{key}' is not registered")
            }
        }
    }
}

/// One sidebar section, restricted to registered pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavSection<'a> {
    pub title: &'a str,
    pub pages: Vec<&'a str>,
}

impl Manifest {
    /// Parse the embedded manifest.
    pub fn builtin() -> Result<Self, ManifestError> {
        Self::from_yaml(BUILTIN_MANIFEST)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_yml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Self::from_yaml(&text)?;
        log::info!(
            "[manifest] loaded path={} sections={}",
            path.display(),
            manifest.sections.len()
        );
        Ok(manifest)
    }

    /// Compare the manifest against `registry`.
    ///
    /// Issues are reported in manifest order, followed by unlisted pages in
    /// key order. An empty result means every registered page is listed
    /// exactly once and every listed page exists.
    pub fn validate(&self, registry: &ContentRegistry) -> Vec<ManifestIssue> {
        let mut issues = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        if !registry.contains(&self.home) {
            issues.push(ManifestIssue::MissingHome {
                key: self.home.clone(),
            });
        }

        for section in &self.sections {
            for key in &section.pages {
                if !seen.insert(key.as_str()) {
                    issues.push(ManifestIssue::DuplicatePage { key: key.clone() });
                    continue;
                }
                if !registry.contains(key) {
                    issues.push(ManifestIssue::MissingPage {
                        section: section.title.clone(),
                        key: key.clone(),
                    });
                }
            }
        }

        for key in registry.keys() {
            if !seen.contains(key) {
                issues.push(ManifestIssue::Unlisted {
                    key: key.to_owned(),
                });
            }
        }

        issues
    }

    /// Sidebar sections: manifest order, registered pages only, first
    /// listing wins. Pages missing from the manifest are gathered into a
    /// trailing [`UNLISTED_SECTION`]. Empty sections are dropped.
    pub fn nav<'a>(&'a self, registry: &'a ContentRegistry) -> Vec<NavSection<'a>> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut nav = Vec::with_capacity(self.sections.len() + 1);

        for section in &self.sections {
            let pages: Vec<&str> = section
                .pages
                .iter()
                .map(String::as_str)
                .filter(|key| registry.contains(key) && seen.insert(*key))
                .collect();
            if !pages.is_empty() {
                nav.push(NavSection {
                    title: &section.title,
                    pages,
                });
            }
        }

        let unlisted: Vec<&str> = registry
            .keys()
            .into_iter()
            .filter(|key| !seen.contains(key))
            .collect();
        if !unlisted.is_empty() {
            nav.push(NavSection {
                title: UNLISTED_SECTION,
                pages: unlisted,
            });
        }

        nav
    }

    /// Every registered page, in reading order.
    pub fn reading_order<'a>(&'a self, registry: &'a ContentRegistry) -> Vec<&'a str> {
        self.nav(registry)
            .into_iter()
            .flat_map(|section| section.pages)
            .collect()
    }

    /// Previous and next page around `key` in reading order.
    pub fn neighbours<'a>(
        &'a self,
        registry: &'a ContentRegistry,
        key: &str,
    ) -> (Option<&'a str>, Option<&'a str>) {
        let order = self.reading_order(registry);
        match order.iter().position(|k| *k == key) {
            Some(idx) => (
                idx.checked_sub(1).map(|i| order[i]),
                order.get(idx + 1).copied(),
            ),
            None => (None, None),
        }
    }

    /// Title of the section that lists `key`, if any.
    pub fn section_of(&self, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.pages.iter().any(|p| p == key))
            .map(|s| s.title.as_str())
    }

    /// Key of the page served at `/`: the manifest's `home` when it is
    /// registered, else the first page in reading order.
    pub fn home_key<'a>(&'a self, registry: &'a ContentRegistry) -> Option<&'a str> {
        if registry.contains(&self.home) {
            return Some(self.home.as_str());
        }
        self.reading_order(registry).first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn registry(keys: &[&str]) -> ContentRegistry {
        let mut reg = ContentRegistry::new();
        for key in keys {
            reg.register(key.to_string(), format!("<h1>{key}</h1>"));
        }
        reg
    }

    const SMALL: &str = "\
title: Test Docs
home: home
sections:
  - title: Basics
    pages: [home, coreConcepts]
  - title: Solana
    pages: [solana, defi]
";

    #[test]
    fn builtin_manifest_parses() {
        let manifest = Manifest::builtin().unwrap();
        assert_eq!(manifest.home, "home");
        assert!(!manifest.sections.is_empty());
    }

    #[test]
    fn builtin_manifest_matches_builtin_registry() {
        let manifest = Manifest::builtin().unwrap();
        let reg = catalog::builtin_registry();
        assert_eq!(manifest.validate(&reg), Vec::<ManifestIssue>::new());
        assert_eq!(manifest.reading_order(&reg).len(), reg.len());
    }

    #[test]
    fn home_defaults_when_omitted() {
        let manifest = Manifest::from_yaml("title: T\n").unwrap();
        assert_eq!(manifest.home, "home");
        assert!(manifest.sections.is_empty());
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let err = Manifest::from_yaml("sections: [unterminated").unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Manifest::load(&tmp.path().join("manifest.yml")).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }

    #[test]
    fn validate_reports_every_issue_kind() {
        let yaml = "\
title: T
home: start
sections:
  - title: A
    pages: [home, ghost, home]
";
        let manifest = Manifest::from_yaml(yaml).unwrap();
        let reg = registry(&["home", "extra"]);
        assert_eq!(
            manifest.validate(&reg),
            vec![
                ManifestIssue::MissingHome {
                    key: "start".into()
                },
                ManifestIssue::MissingPage {
                    section: "A".into(),
                    key: "ghost".into()
                },
                ManifestIssue::DuplicatePage { key: "home".into() },
                ManifestIssue::Unlisted {
                    key: "extra".into()
                },
            ]
        );
    }

    #[test]
    fn nav_drops_missing_and_collects_unlisted() {
        let manifest = Manifest::from_yaml(SMALL).unwrap();
        let reg = registry(&["home", "coreConcepts", "defi", "zzz", "aaa"]);
        let nav = manifest.nav(&reg);
        assert_eq!(
            nav,
            vec![
                NavSection {
                    title: "Basics",
                    pages: vec!["home", "coreConcepts"]
                },
                NavSection {
                    title: "Solana",
                    pages: vec!["defi"]
                },
                NavSection {
                    title: UNLISTED_SECTION,
                    pages: vec!["aaa", "zzz"]
                },
            ]
        );
    }

    #[test]
    fn neighbours_follow_reading_order() {
        let manifest = Manifest::from_yaml(SMALL).unwrap();
        let reg = registry(&["home", "coreConcepts", "solana", "defi"]);
        assert_eq!(manifest.neighbours(&reg, "home"), (None, Some("coreConcepts")));
        assert_eq!(
            manifest.neighbours(&reg, "coreConcepts"),
            (Some("home"), Some("solana"))
        );
        assert_eq!(manifest.neighbours(&reg, "defi"), (Some("solana"), None));
        assert_eq!(manifest.neighbours(&reg, "nope"), (None, None));
    }

    #[test]
    fn section_lookup() {
        let manifest = Manifest::from_yaml(SMALL).unwrap();
        assert_eq!(manifest.section_of("defi"), Some("Solana"));
        assert_eq!(manifest.section_of("unknown"), None);
    }

    #[test]
    fn home_key_falls_back_to_first_page() {
        let manifest = Manifest::from_yaml(SMALL).unwrap();
        let reg = registry(&["coreConcepts", "defi"]);
        assert_eq!(manifest.home_key(&reg), Some("coreConcepts"));
        assert_eq!(manifest.home_key(&ContentRegistry::new()), None);
    }
}
