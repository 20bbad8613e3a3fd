//! Locating built installers under the build-output tree.
//!
//! The bundler writes installers to `<target>/release/bundle/<format>/` for
//! host builds and `<target>/<triple>/release/bundle/<format>/` for
//! cross-target builds. Both layouts are searched.

use crate::artefact::{ARCH_TOKENS, Artefact, ArtefactKind, Platform, Variant};
use crate::error::{Result, VerifyError};
use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Builds the glob patterns searched for `kind` under `target_dir`.
#[must_use]
pub fn search_patterns(target_dir: &Utf8Path, kind: ArtefactKind) -> Vec<String> {
    let root = Pattern::escape(target_dir.as_str());
    let tail = format!("release/bundle/{}/*.{}", kind.bundle_dir(), kind.suffix());
    vec![format!("{root}/{tail}"), format!("{root}/*/{tail}")]
}

/// Finds every installer for `platform` under `target_dir`.
///
/// Matches are deduplicated by canonical path, and when a universal build
/// exists for a logical artefact, per-architecture builds of it are dropped.
///
/// # Errors
///
/// Returns [`VerifyError::Discovery`] when nothing is found.
pub fn discover(target_dir: &Utf8Path, platform: Platform) -> Result<Vec<Artefact>> {
    let mut seen = BTreeSet::new();
    let mut found = Vec::new();

    for kind in platform.kinds() {
        for pattern in search_patterns(target_dir, *kind) {
            let Ok(paths) = glob::glob(&pattern) else {
                warn!("skipping invalid search pattern {pattern}");
                continue;
            };
            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(err) => {
                        debug!("skipping unreadable match: {err}");
                        continue;
                    }
                };
                let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
                    warn!("skipping artefact with a non-UTF-8 path");
                    continue;
                };
                if !path.is_file() {
                    continue;
                }
                let canonical = path.canonicalize_utf8().unwrap_or_else(|_| path.clone());
                if !seen.insert(canonical) {
                    continue;
                }
                if let Some(artefact) = Artefact::from_path(path) {
                    found.push(artefact);
                }
            }
        }
    }

    let mut artefacts = prefer_universal(found);
    artefacts.sort_by(|a, b| a.path().cmp(b.path()));
    if artefacts.is_empty() {
        return Err(VerifyError::Discovery {
            platform: platform.to_string(),
            searched: target_dir.to_string(),
        });
    }
    debug!("discovered {} {platform} artefact(s)", artefacts.len());
    Ok(artefacts)
}

/// Builds the artefact for an explicit `--artefact` path.
///
/// # Errors
///
/// Returns [`VerifyError::UnknownArtefactKind`] when the file name matches
/// no supported installer format.
pub fn explicit(path: Utf8PathBuf) -> Result<Artefact> {
    let fallback = path.clone();
    Artefact::from_path(path).ok_or(VerifyError::UnknownArtefactKind { path: fallback })
}

/// Drops per-architecture and native builds that share a logical name with
/// a universal build.
#[must_use]
pub fn prefer_universal(artefacts: Vec<Artefact>) -> Vec<Artefact> {
    let universal: BTreeSet<(ArtefactKind, String)> = artefacts
        .iter()
        .filter(|artefact| *artefact.variant() == Variant::Universal)
        .map(logical_key)
        .collect();

    let mut kept = Vec::with_capacity(artefacts.len());
    let mut dropped: BTreeMap<(ArtefactKind, String), usize> = BTreeMap::new();
    for artefact in artefacts {
        let key = logical_key(&artefact);
        if *artefact.variant() != Variant::Universal && universal.contains(&key) {
            *dropped.entry(key).or_default() += 1;
            continue;
        }
        kept.push(artefact);
    }
    for ((kind, name), count) in dropped {
        debug!("preferring universal {kind} {name} over {count} per-architecture build(s)");
    }
    kept
}

/// Kind plus file name with architecture tokens removed.
fn logical_key(artefact: &Artefact) -> (ArtefactKind, String) {
    let lowered = artefact.display_name().to_lowercase();
    let tokens: Vec<&str> = lowered.split(['_', '-', '.']).collect();
    let mut kept = Vec::with_capacity(tokens.len());
    let mut index = 0;
    while let Some(token) = tokens.get(index) {
        // `x86_64` splits into two tokens.
        if *token == "x86" && tokens.get(index + 1) == Some(&"64") {
            index += 2;
            continue;
        }
        if *token != "universal" && !ARCH_TOKENS.contains(token) {
            kept.push(*token);
        }
        index += 1;
    }
    (artefact.kind(), kept.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct BuildTree {
        _dir: TempDir,
        target: Utf8PathBuf,
    }

    impl BuildTree {
        fn touch(&self, relative: &str) -> Utf8PathBuf {
            let path = self.target.join(relative);
            std::fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
            std::fs::write(&path, b"stub").expect("write artefact");
            path
        }
    }

    #[fixture]
    fn tree() -> BuildTree {
        let dir = tempfile::tempdir().expect("temp dir");
        let target = Utf8PathBuf::from_path_buf(dir.path().join("target")).expect("utf-8 path");
        BuildTree { _dir: dir, target }
    }

    #[rstest]
    fn finds_host_and_cross_target_outputs(tree: BuildTree) {
        tree.touch("release/bundle/deb/formula_1.0.0_amd64.deb");
        tree.touch("aarch64-unknown-linux-gnu/release/bundle/rpm/formula-1.0.0-1.aarch64.rpm");
        tree.touch("release/bundle/deb/notes.txt");

        let found = discover(&tree.target, Platform::Linux).expect("artefacts");
        let kinds: Vec<_> = found.iter().map(Artefact::kind).collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&ArtefactKind::Deb));
        assert!(kinds.contains(&ArtefactKind::Rpm));
    }

    #[rstest]
    fn universal_build_wins_over_per_arch(tree: BuildTree) {
        tree.touch("universal-apple-darwin/release/bundle/dmg/Formula_1.0.0_universal.dmg");
        tree.touch("aarch64-apple-darwin/release/bundle/dmg/Formula_1.0.0_aarch64.dmg");
        tree.touch("x86_64-apple-darwin/release/bundle/dmg/Formula_1.0.0_x64.dmg");
        tree.touch("universal-apple-darwin/release/bundle/macos/Formula.app.tar.gz");
        tree.touch("aarch64-apple-darwin/release/bundle/macos/Formula.app.tar.gz");

        let found = discover(&tree.target, Platform::MacOs).expect("artefacts");
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|a| *a.variant() == Variant::Universal));
    }

    #[rstest]
    fn per_arch_builds_survive_without_universal(tree: BuildTree) {
        tree.touch("aarch64-apple-darwin/release/bundle/dmg/Formula_1.0.0_aarch64.dmg");
        tree.touch("x86_64-apple-darwin/release/bundle/dmg/Formula_1.0.0_x64.dmg");

        let found = discover(&tree.target, Platform::MacOs).expect("artefacts");
        assert_eq!(found.len(), 2);
    }

    #[rstest]
    fn empty_tree_is_a_discovery_error(tree: BuildTree) {
        let err = discover(&tree.target, Platform::Windows).expect_err("nothing built");
        assert!(matches!(err, VerifyError::Discovery { .. }));
        assert!(err.to_string().contains("--artefact"));
    }

    #[test]
    fn explicit_path_infers_kind() {
        let artefact = explicit(Utf8PathBuf::from("dist/Formula_1.0.0_x64-setup.exe")).expect("kind");
        assert_eq!(artefact.kind(), ArtefactKind::Exe);

        let err = explicit(Utf8PathBuf::from("dist/Formula.zip")).expect_err("unknown kind");
        assert!(matches!(err, VerifyError::UnknownArtefactKind { .. }));
    }

    #[test]
    fn patterns_escape_the_target_dir() {
        let patterns = search_patterns(Utf8Path::new("/tmp/[build]"), ArtefactKind::Msi);
        assert_eq!(
            patterns,
            vec![
                "/tmp/[[]build[]]/release/bundle/msi/*.msi".to_owned(),
                "/tmp/[[]build[]]/*/release/bundle/msi/*.msi".to_owned(),
            ]
        );
    }
}
