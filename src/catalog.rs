//! Page catalog: where registry content comes from.
//!
//! Pages live one file per entry under `content/` and are embedded into the
//! binary at compile time. A content directory with the same layout can be
//! loaded at run time, either on its own or on top of the embedded pages.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::registry::{is_valid_key, ContentRegistry, DuplicatePolicy, RegistryError};

/// Extension of page files inside a content directory.
pub const PAGE_EXTENSION: &str = "html";

/// Every tutorial page shipped with the binary, as `(key, fragment)`.
///
/// Subdirectories under `content/` only group files on disk; the key is the
/// file stem.
pub const BUILTIN: &[(&str, &str)] = &[
    ("advanceEth", include_str!("../content/advanceEth.html")),
    ("advanceSol", include_str!("../content/advanceSol.html")),
    ("auditSmartCont", include_str!("../content/auditSmartCont.html")),
    ("backendServices", include_str!("../content/backendServices.html")),
    ("buildDapp", include_str!("../content/buildDapp.html")),
    ("commonVul", include_str!("../content/commonVul.html")),
    ("contractStruct", include_str!("../content/contractStruct.html")),
    ("coreConcepts", include_str!("../content/coreConcepts.html")),
    ("dataType", include_str!("../content/dataType.html")),
    ("defi", include_str!("../content/defi.html")),
    ("deploySPLTok", include_str!("../content/deploySPLTok.html")),
    ("deploySmartCon", include_str!("../content/deploySmartCon.html")),
    ("build", include_str!("../content/erc/build.html")),
    ("deployToken", include_str!("../content/erc/deployToken.html")),
    ("interact", include_str!("../content/erc/interact.html")),
    ("multiToken", include_str!("../content/erc/multiToken.html")),
    ("nonFungToken", include_str!("../content/erc/nonFungToken.html")),
    ("tokens", include_str!("../content/erc/tokens.html")),
    ("ethereum", include_str!("../content/ethereum.html")),
    ("ethereumOverview", include_str!("../content/ethereumOverview.html")),
    ("eventErr", include_str!("../content/eventErr.html")),
    ("eventListing", include_str!("../content/eventListing.html")),
    ("frontendIntegration", include_str!("../content/frontendIntegration.html")),
    ("home", include_str!("../content/home.html")),
    ("installation", include_str!("../content/installation.html")),
    ("integratingThirdParty", include_str!("../content/integratingThirdParty.html")),
    ("introToWebJs", include_str!("../content/introToWebJs.html")),
    ("keyTypes", include_str!("../content/keyTypes.html")),
    ("layers", include_str!("../content/layers.html")),
    ("monitorTool", include_str!("../content/monitorTool.html")),
    ("optimization", include_str!("../content/optimization.html")),
    ("properties", include_str!("../content/properties.html")),
    ("realWorldUseCase", include_str!("../content/realWorldUseCase.html")),
    ("secAccControl", include_str!("../content/secAccControl.html")),
    ("solVsEth", include_str!("../content/solVsEth.html")),
    ("solana", include_str!("../content/solana.html")),
    ("clientIntegration", include_str!("../content/solana/clientIntegration.html")),
    ("deploySolProgram", include_str!("../content/solana/deploySolProgram.html")),
    ("framework", include_str!("../content/solana/framework.html")),
    ("introToSyntax", include_str!("../content/solana/introToSyntax.html")),
    ("simpleDapp", include_str!("../content/solana/simpleDapp.html")),
    ("solArchitecture", include_str!("../content/solana/solArchitecture.html")),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read content directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Registry holding every embedded page.
pub fn builtin_registry() -> ContentRegistry {
    let mut registry = ContentRegistry::new();
    for (key, fragment) in BUILTIN {
        registry.register(*key, *fragment);
    }
    log::debug!("[catalog] builtin pages={}", registry.len());
    registry
}

/// Derive the page key for a content file, or `None` when the file is not a
/// page (wrong extension, non UTF-8 or invalid stem).
pub fn page_key(path: &Path) -> Option<&str> {
    if !has_page_extension(path) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|stem| is_valid_key(stem))
}

fn has_page_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(PAGE_EXTENSION))
}

/// Build a registry from the pages found under `root`.
///
/// See [`load_into`] for traversal rules.
pub fn load_dir(root: &Path, policy: DuplicatePolicy) -> Result<ContentRegistry, CatalogError> {
    let mut registry = ContentRegistry::new();
    load_into(&mut registry, root, policy)?;
    Ok(registry)
}

/// Load the pages under `dir` on top of `base`.
///
/// Pages from `dir` always replace embedded pages with the same key;
/// `policy` only governs keys that occur twice inside `dir` itself.
pub fn overlay(
    mut base: ContentRegistry,
    dir: &Path,
    policy: DuplicatePolicy,
) -> Result<ContentRegistry, CatalogError> {
    let layer = load_dir(dir, policy)?;
    let pages = layer.len();
    let replaced = base.merge(layer);
    log::info!(
        "[catalog] overlay dir={} pages={} replaced={}",
        dir.display(),
        pages,
        replaced
    );
    Ok(base)
}

/// Register every page file under `root` into `registry`.
///
/// # Traversal rules
///
/// - Breadth-first; entries of each directory are visited in sorted order so
///   that duplicate stems resolve deterministically.
/// - Hidden directories (leading `.`) are skipped. Each directory is walked
///   once by canonical path, so symlinked aliases and cycles add nothing.
/// - Only `*.html` files whose stem is a valid key are registered; anything
///   else is logged and ignored.
/// - Unreadable files are logged and skipped. An unreadable `root` is an
///   error.
pub fn load_into(
    registry: &mut ContentRegistry,
    root: &Path,
    policy: DuplicatePolicy,
) -> Result<usize, CatalogError> {
    // Surface a missing or unreadable root instead of an empty registry.
    fs::read_dir(root).map_err(|source| CatalogError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(root.to_path_buf());
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut loaded = 0usize;

    while let Some(dir) = queue.pop_front() {
        // Symlinked directories may alias one already walked, or form a cycle.
        let real = fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
        if !visited.insert(real) {
            log::debug!(
                "[catalog] skipping path='{}' reason='already-visited'",
                dir.display()
            );
            continue;
        }
        let mut paths: Vec<PathBuf> = match fs::read_dir(&dir) {
            Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
            Err(e) => {
                log::warn!(
                    "[catalog] skipping path='{}' reason='read-error: {}'",
                    dir.display(),
                    e
                );
                continue;
            }
        };
        paths.sort();

        for path in paths {
            if path.is_dir() {
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with('.'));
                if !hidden {
                    queue.push_back(path);
                }
                continue;
            }

            let Some(key) = page_key(&path) else {
                if has_page_extension(&path) {
                    log::warn!(
                        "[catalog] skipping path='{}' reason='invalid-key'",
                        path.display()
                    );
                } else {
                    log::debug!("[catalog] ignoring path='{}'", path.display());
                }
                continue;
            };

            let fragment = match fs::read_to_string(&path) {
                Ok(s) => s,
                Err(e) => {
                    log::warn!(
                        "[catalog] skipping path='{}' reason='read-error: {}'",
                        path.display(),
                        e
                    );
                    continue;
                }
            };

            registry.try_register(key, fragment, policy)?;
            loaded += 1;
        }
    }

    log::info!(
        "[catalog] loaded dir={} files={} keys={}",
        root.display(),
        loaded,
        registry.len()
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_fixture(root: &TempDir, rel_path: &str, contents: &str) -> PathBuf {
        let full = root.path().join(rel_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, contents).unwrap();
        full
    }

    const BUILTIN_KEYS: [&str; 42] = [
        "advanceEth",
        "advanceSol",
        "auditSmartCont",
        "backendServices",
        "buildDapp",
        "commonVul",
        "contractStruct",
        "coreConcepts",
        "dataType",
        "defi",
        "deploySPLTok",
        "deploySmartCon",
        "build",
        "deployToken",
        "interact",
        "multiToken",
        "nonFungToken",
        "tokens",
        "ethereum",
        "ethereumOverview",
        "eventErr",
        "eventListing",
        "frontendIntegration",
        "home",
        "installation",
        "integratingThirdParty",
        "introToWebJs",
        "keyTypes",
        "layers",
        "monitorTool",
        "optimization",
        "properties",
        "realWorldUseCase",
        "secAccControl",
        "clientIntegration",
        "deploySolProgram",
        "framework",
        "introToSyntax",
        "simpleDapp",
        "solArchitecture",
        "solVsEth",
        "solana",
    ];

    #[test]
    fn builtin_registry_has_every_topic() {
        let reg = builtin_registry();
        assert_eq!(reg.len(), BUILTIN_KEYS.len());
        for key in BUILTIN_KEYS {
            let page = reg.get(key).unwrap_or_else(|e| panic!("{e}"));
            assert!(page.contains("<h1"), "page {key} has no heading");
        }
    }

    #[test]
    fn builtin_keys_are_unique() {
        let mut keys: Vec<&str> = BUILTIN.iter().map(|(k, _)| *k).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), BUILTIN.len());
    }

    #[test]
    fn builtin_home_page_starts_with_title() {
        let reg = builtin_registry();
        assert!(reg
            .get("home")
            .unwrap()
            .starts_with("<h1 class=\"heading\">What is Blockchain?</h1>"));
    }

    #[test]
    fn template_escapes_are_resolved() {
        let reg = builtin_registry();
        let page = reg.get("clientIntegration").unwrap();
        assert!(page.contains("console.log(`Wallet Public Key: ${payer.publicKey.toBase58()}`);"));
        assert!(!page.contains("\\`"));
    }

    #[test]
    fn page_key_from_path() {
        assert_eq!(page_key(Path::new("content/home.html")), Some("home"));
        assert_eq!(page_key(Path::new("erc/tokens.HTML")), Some("tokens"));
        assert_eq!(page_key(Path::new("notes.md")), None);
        assert_eq!(page_key(Path::new("bad name.html")), None);
        assert_eq!(page_key(Path::new("README")), None);
    }

    #[test]
    fn load_dir_registers_nested_files_by_stem() {
        let tmp = TempDir::new().unwrap();
        write_fixture(&tmp, "home.html", "<h1>Home</h1>");
        write_fixture(&tmp, "erc/tokens.html", "<h1>Tokens</h1>");
        write_fixture(&tmp, "notes.md", "# not a page");

        let reg = load_dir(tmp.path(), DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(reg.keys(), vec!["home", "tokens"]);
        assert_eq!(reg.get("tokens").unwrap(), "<h1>Tokens</h1>");
    }

    #[test]
    fn load_dir_skips_hidden_directories() {
        let tmp = TempDir::new().unwrap();
        write_fixture(&tmp, "home.html", "<h1>Home</h1>");
        write_fixture(&tmp, ".git/secret.html", "<h1>no</h1>");

        let reg = load_dir(tmp.path(), DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(reg.keys(), vec!["home"]);
    }

    #[test]
    fn load_dir_duplicate_stem_last_write_wins() {
        // Root files are visited before subdirectories.
        let tmp = TempDir::new().unwrap();
        write_fixture(&tmp, "keyTypes.html", "A");
        write_fixture(&tmp, "extra/keyTypes.html", "B");

        let reg = load_dir(tmp.path(), DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(reg.get("keyTypes").unwrap(), "B");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn load_dir_duplicate_stem_rejected_when_strict() {
        let tmp = TempDir::new().unwrap();
        write_fixture(&tmp, "keyTypes.html", "A");
        write_fixture(&tmp, "extra/keyTypes.html", "B");

        let err = load_dir(tmp.path(), DuplicatePolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Registry(RegistryError::DuplicateKey { ref key }) if key == "keyTypes"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn load_dir_walks_symlink_cycle_once() {
        let tmp = TempDir::new().unwrap();
        write_fixture(&tmp, "home.html", "<h1>Home</h1>");
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        std::os::unix::fs::symlink(tmp.path(), tmp.path().join("sub/loop")).unwrap();

        let reg = load_dir(tmp.path(), DuplicatePolicy::Reject).unwrap();
        assert_eq!(reg.keys(), vec!["home"]);
    }

    #[cfg(unix)]
    #[test]
    fn load_dir_symlinked_directory_alias_is_not_a_duplicate() {
        let tmp = TempDir::new().unwrap();
        write_fixture(&tmp, "erc/tokens.html", "<h1>Tokens</h1>");
        std::os::unix::fs::symlink(tmp.path().join("erc"), tmp.path().join("alias")).unwrap();

        let mut reg = ContentRegistry::new();
        let loaded = load_into(&mut reg, tmp.path(), DuplicatePolicy::Reject).unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(reg.get("tokens").unwrap(), "<h1>Tokens</h1>");
    }

    #[test]
    fn load_dir_skips_invalid_page_stems() {
        let tmp = TempDir::new().unwrap();
        write_fixture(&tmp, "home.html", "<h1>Home</h1>");
        write_fixture(&tmp, "bad name.html", "<h1>Bad</h1>");

        let reg = load_dir(tmp.path(), DuplicatePolicy::Reject).unwrap();
        assert_eq!(reg.keys(), vec!["home"]);
        assert!(has_page_extension(Path::new("bad name.html")));
        assert!(!has_page_extension(Path::new("notes.md")));
    }

    #[test]
    fn load_dir_missing_root_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_dir(&tmp.path().join("nope"), DuplicatePolicy::Overwrite).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn overlay_replaces_builtin_pages() {
        let tmp = TempDir::new().unwrap();
        write_fixture(&tmp, "home.html", "<h1>Custom home</h1>");
        write_fixture(&tmp, "glossary.html", "<h1>Glossary</h1>");

        let reg = overlay(builtin_registry(), tmp.path(), DuplicatePolicy::Reject).unwrap();
        assert_eq!(reg.get("home").unwrap(), "<h1>Custom home</h1>");
        assert_eq!(reg.get("glossary").unwrap(), "<h1>Glossary</h1>");
        assert_eq!(reg.len(), BUILTIN.len() + 1);
    }
}
