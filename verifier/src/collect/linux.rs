//! Debian and RPM package collector.
//!
//! Package metadata and the file manifest come from the package tools; the
//! payload is then extracted into the acquired scratch directory so the
//! launcher entry and any shipped MIME fragments can be read.

use super::InspectionContext;
use crate::artefact::{Artefact, ArtefactKind};
use crate::command::{CommandExecutor, run_checked};
use crate::error::{Result, VerifyError};
use crate::facts::{Identity, Observed, ObservedFacts, partition_schemes};
use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use log::{debug, warn};
use shipcheck_common::{DesktopEntry, Extension, MimeFragment, MimeType};
use std::collections::{BTreeMap, BTreeSet};

const APPLICATIONS_DIR: &str = "usr/share/applications";
const MIME_PACKAGES_DIR: &str = "usr/share/mime/packages";
const SCHEME_HANDLER_PREFIX: &str = "x-scheme-handler/";

/// Metadata reported by the package tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageQuery {
    /// Package name.
    pub name: Option<String>,
    /// Package version.
    pub version: Option<String>,
    /// Names of declared dependencies.
    pub depends: BTreeSet<String>,
    /// Absolute paths in the package manifest.
    pub paths: BTreeSet<String>,
}

/// Collects facts from the package `artefact`, extracting its payload into
/// `root`.
///
/// # Errors
///
/// Propagates package-tool failures and returns [`VerifyError::Document`]
/// when a shipped MIME fragment is malformed.
pub fn collect(
    ctx: &InspectionContext<'_>,
    artefact: &Artefact,
    root: &Utf8Path,
) -> Result<ObservedFacts> {
    let package = artefact.path();
    let query = match artefact.kind() {
        ArtefactKind::Rpm => query_rpm(ctx.executor, package, root)?,
        _ => query_deb(ctx.executor, package, root)?,
    };
    let label = artefact.display_name();

    let mut facts = ObservedFacts::default();
    let package_name = query
        .name
        .clone()
        .unwrap_or_else(|| ctx.requirement.package_name().to_owned());
    facts.identity = Identity {
        version: Observed::expected(query.version.clone()),
        package_name: Observed::expected(query.name.clone()),
        ..Identity::default()
    };
    facts.locations.identity = Some(label.to_owned());

    let doc_dir = format!("/usr/share/doc/{package_name}/");
    facts.files_present = Some(
        query
            .paths
            .iter()
            .filter_map(|path| path.strip_prefix(&doc_dir))
            .filter_map(|relative| relative.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect(),
    );
    facts.compliance_root = doc_dir.trim_end_matches('/').to_owned();

    let launcher_names = [
        ctx.requirement.main_binary_name(),
        package_name.as_str(),
        ctx.requirement.product_name(),
    ];
    read_launcher(root, &launcher_names, &mut facts)?;
    read_fragments(root, &mut facts)?;

    facts.dependencies = Some(query.depends);
    facts.package_paths = Some(query.paths);
    Ok(facts)
}

/// Queries a Debian package and extracts its payload into `root`.
///
/// # Errors
///
/// Propagates `dpkg-deb` failures.
pub fn query_deb(
    executor: &dyn CommandExecutor,
    deb: &Utf8Path,
    root: &Utf8Path,
) -> Result<PackageQuery> {
    let control = run_checked(
        executor,
        "dpkg-deb",
        &["-f", deb.as_str(), "Package", "Version", "Depends"],
    )?;
    let fields = parse_control(&control);
    let listing = run_checked(executor, "dpkg-deb", &["-c", deb.as_str()])?;
    run_checked(executor, "dpkg-deb", &["-x", deb.as_str(), root.as_str()])?;

    Ok(PackageQuery {
        name: fields.get("package").cloned(),
        version: fields.get("version").cloned(),
        depends: fields
            .get("depends")
            .map(|value| parse_depends(value))
            .unwrap_or_default(),
        paths: listing.lines().filter_map(listing_path).collect(),
    })
}

/// Queries an RPM package and extracts its payload into `root`.
///
/// # Errors
///
/// Propagates `rpm` and `bsdtar` failures.
pub fn query_rpm(
    executor: &dyn CommandExecutor,
    rpm: &Utf8Path,
    root: &Utf8Path,
) -> Result<PackageQuery> {
    let header = run_checked(
        executor,
        "rpm",
        &["-qp", "--queryformat", "%{NAME}\\n%{VERSION}\\n", rpm.as_str()],
    )?;
    let mut lines = header.lines().map(str::trim);
    let name = lines.next().filter(|line| !line.is_empty()).map(str::to_owned);
    let version = lines.next().filter(|line| !line.is_empty()).map(str::to_owned);

    let listing = run_checked(executor, "rpm", &["-qlp", rpm.as_str()])?;
    let requires = run_checked(executor, "rpm", &["-qp", "--requires", rpm.as_str()])?;
    run_checked(executor, "bsdtar", &["-xf", rpm.as_str(), "-C", root.as_str()])?;

    Ok(PackageQuery {
        name,
        version,
        depends: requires
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_owned)
            .collect(),
        paths: listing
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('/'))
            .map(|line| line.trim_end_matches('/').to_owned())
            .collect(),
    })
}

/// Parses `Field: value` control output, joining continuation lines.
/// Field names are lower-cased.
fn parse_control(text: &str) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some(value) = current.as_ref().and_then(|name| fields.get_mut(name)) {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_lowercase();
        fields.insert(name.clone(), value.trim().to_owned());
        current = Some(name);
    }
    fields
}

/// Package names from a `Depends` value, alternatives included.
fn parse_depends(value: &str) -> BTreeSet<String> {
    value
        .split([',', '|'])
        .filter_map(|clause| clause.split_whitespace().next())
        .map(|name| name.split(':').next().unwrap_or(name).to_owned())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Absolute path of one `dpkg-deb -c` line.
///
/// Lines read `perms owner size date time ./path [-> target]`.
fn listing_path(line: &str) -> Option<String> {
    let mut rest = line.trim_start();
    for _ in 0..5 {
        let end = rest.find(char::is_whitespace)?;
        rest = rest.get(end..)?.trim_start();
    }
    let path = rest.split_once(" -> ").map_or(rest, |(path, _)| path);
    let path = path.strip_prefix('.').unwrap_or(path).trim_end_matches('/');
    (!path.is_empty()).then(|| path.to_owned())
}

fn sorted_matches(root: &Utf8Path, dir: &str, suffix: &str) -> Vec<Utf8PathBuf> {
    let pattern = format!("{}/{dir}/*.{suffix}", Pattern::escape(root.as_str()));
    let Ok(paths) = glob::glob(&pattern) else {
        warn!("skipping invalid search pattern {pattern}");
        return Vec::new();
    };
    let mut found: Vec<Utf8PathBuf> = paths
        .filter_map(std::result::Result::ok)
        .filter_map(|path| Utf8PathBuf::from_path_buf(path).ok())
        .filter(|path| path.is_file())
        .collect();
    found.sort();
    found
}

/// Picks the launcher named after the first matching entry of `names`
/// (ignoring ASCII case), falling back to the first launcher in path order.
fn select_launcher<'a>(launchers: &'a [Utf8PathBuf], names: &[&str]) -> Option<&'a Utf8PathBuf> {
    names
        .iter()
        .find_map(|name| {
            launchers.iter().find(|launcher| {
                launcher
                    .file_stem()
                    .is_some_and(|stem| stem.eq_ignore_ascii_case(name))
            })
        })
        .or_else(|| launchers.first())
}

/// Reads MIME types and scheme handlers from the application's launcher
/// entry.
fn read_launcher(root: &Utf8Path, names: &[&str], facts: &mut ObservedFacts) -> Result<()> {
    let launchers = sorted_matches(root, APPLICATIONS_DIR, "desktop");
    let mut declared = BTreeSet::new();
    let mut raw_schemes = Vec::new();

    if let Some(launcher) = select_launcher(&launchers, names) {
        debug!("reading launcher {launcher}");
        let text = std::fs::read_to_string(launcher)
            .map_err(|err| VerifyError::read(launcher.clone(), err))?;
        let entry = DesktopEntry::parse(&text);
        for raw in entry.list("MimeType") {
            let split = SCHEME_HANDLER_PREFIX.len();
            let handler = raw
                .get(..split)
                .filter(|prefix| prefix.eq_ignore_ascii_case(SCHEME_HANDLER_PREFIX))
                .and_then(|_| raw.get(split..));
            if let Some(scheme) = handler {
                raw_schemes.push(scheme.to_owned());
            }
            match MimeType::parse(raw) {
                Ok(mime) => {
                    declared.insert(mime);
                }
                Err(err) => debug!("ignoring launcher MIME type: {err}"),
            }
        }
        let location = launcher
            .file_name()
            .map(|name| format!("/{APPLICATIONS_DIR}/{name}"));
        facts.locations.mime.clone_from(&location);
        facts.locations.schemes = location;
    } else {
        debug!("no launcher entry under {root}/{APPLICATIONS_DIR}");
    }

    let (schemes, malformed) = partition_schemes(raw_schemes.iter().map(String::as_str));
    facts.registered_schemes = Some(schemes);
    facts.malformed_schemes = malformed;
    facts.declared_mime_types = Some(declared);
    Ok(())
}

/// Reads every shipped shared-MIME-info fragment.
fn read_fragments(root: &Utf8Path, facts: &mut ObservedFacts) -> Result<()> {
    let mut shipped = BTreeSet::new();
    let mut by_extension: BTreeMap<Extension, BTreeSet<MimeType>> = BTreeMap::new();
    for path in sorted_matches(root, MIME_PACKAGES_DIR, "xml") {
        let text =
            std::fs::read_to_string(&path).map_err(|err| VerifyError::read(path.clone(), err))?;
        let fragment = MimeFragment::parse(&text).map_err(|source| VerifyError::Document {
            path: path.clone(),
            source,
        })?;
        for (mime, extensions) in fragment.types() {
            shipped.insert(mime.clone());
            for extension in extensions {
                by_extension
                    .entry(extension.clone())
                    .or_default()
                    .insert(mime.clone());
            }
        }
    }
    facts.shipped_mime_types = Some(shipped);
    facts.mime_by_extension = Some(by_extension);
    Ok(())
}

#[cfg(test)]
#[path = "linux_tests.rs"]
mod tests;
