//! macOS bundle collector.
//!
//! Reads `Contents/Info.plist` of the `.app` inside a mounted disk image or
//! an extracted tarball. File types are resolved through uniform type
//! identifiers: a document type may list extensions directly or name
//! content types whose declarations carry the extensions.

use super::InspectionContext;
use crate::artefact::{Artefact, Variant};
use crate::command::run_checked;
use crate::error::{Result, VerifyError};
use crate::facts::{
    Architecture, ExtensionSource, Identity, Observed, ObservedFacts, partition_schemes,
};
use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use log::{debug, warn};
use shipcheck_common::{Block, DocumentError, Extension, PlistDocument};
use std::collections::{BTreeMap, BTreeSet};

const TYPE_DECLARATION_KEYS: [&str; 2] = ["UTExportedTypeDeclarations", "UTImportedTypeDeclarations"];

/// Finds the `.app` bundle at the top of `root`.
///
/// # Errors
///
/// Returns [`VerifyError::BundleLayout`] when `root` holds no bundle and
/// [`VerifyError::Read`] when it cannot be listed.
pub fn find_app(root: &Utf8Path) -> Result<Utf8PathBuf> {
    let entries = root
        .read_dir_utf8()
        .map_err(|err| VerifyError::read(root, err))?;
    let mut apps: Vec<Utf8PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.into_path())
        .filter(|path| path.extension() == Some("app") && path.is_dir())
        .collect();
    apps.sort();
    let mut apps = apps.into_iter();
    let first = apps.next().ok_or_else(|| VerifyError::BundleLayout {
        path: root.to_owned(),
        reason: "no .app bundle found".to_owned(),
    })?;
    let others = apps.count();
    if others > 0 {
        warn!("{root} holds {} app bundles; inspecting {first}", others + 1);
    }
    Ok(first)
}

/// Collects facts from the bundle at `app`.
///
/// # Errors
///
/// Returns [`VerifyError::Read`] or [`VerifyError::Document`] when
/// `Info.plist` is unreadable, and propagates `lipo` failures for universal
/// builds.
pub fn collect(
    ctx: &InspectionContext<'_>,
    artefact: &Artefact,
    app: &Utf8Path,
) -> Result<ObservedFacts> {
    let app_name = app.file_name().unwrap_or(app.as_str());
    let plist_path = app.join("Contents/Info.plist");
    let text = std::fs::read_to_string(&plist_path)
        .map_err(|err| VerifyError::read(plist_path.clone(), err))?;
    let document_error = |source| VerifyError::Document {
        path: plist_path.clone(),
        source,
    };
    let document = PlistDocument::parse(&text).map_err(document_error)?;
    let mut facts = facts_from_info_plist(&document).map_err(document_error)?;

    let label = format!("{app_name}/Contents/Info.plist");
    facts.locations.file_types = Some(label.clone());
    facts.locations.schemes = Some(label.clone());
    facts.locations.identity = Some(label);

    facts.files_present = Some(resource_names(app));
    facts.compliance_root = format!("{app_name}/Contents/Resources");

    if *artefact.variant() == Variant::Universal {
        let declared = document
            .root()
            .scalar("CFBundleExecutable")
            .map_err(document_error)?;
        let name = declared.as_deref().unwrap_or(ctx.requirement.main_binary_name());
        let binary = main_executable(app, name)?;
        let output = run_checked(ctx.executor, "lipo", &["-archs", binary.as_str()])?;
        facts.binary_slices = Some(output.split_whitespace().map(Architecture::parse).collect());
        facts.locations.binary = Some(
            binary
                .strip_prefix(app.parent().unwrap_or(app))
                .map_or_else(|_| binary.to_string(), ToString::to_string),
        );
    }
    Ok(facts)
}

/// Reads schemes, file types, and identity from a parsed `Info.plist`.
///
/// # Errors
///
/// Returns [`DocumentError::Unbalanced`] when a consulted element never
/// closes.
pub fn facts_from_info_plist(
    document: &PlistDocument,
) -> std::result::Result<ObservedFacts, DocumentError> {
    let root = document.root();
    let mut facts = ObservedFacts::default();

    let mut raw_schemes = Vec::new();
    if let Some(url_types) = root.array("CFBundleURLTypes")? {
        for url_type in url_types.child_dicts()? {
            for schemes in url_type.arrays("CFBundleURLSchemes")? {
                raw_schemes.extend(schemes.strings());
            }
        }
    }
    let (schemes, malformed) = partition_schemes(raw_schemes.iter().map(String::as_str));
    facts.registered_schemes = Some(schemes);
    facts.malformed_schemes = malformed;

    let declared = declared_content_types(&root)?;
    let mut registered = BTreeMap::new();
    if let Some(document_types) = root.array("CFBundleDocumentTypes")? {
        for record in document_types.child_dicts()? {
            for list in record.arrays("CFBundleTypeExtensions")? {
                for raw in list.strings() {
                    if raw.trim() == "*" {
                        continue;
                    }
                    match Extension::parse(&raw) {
                        Ok(extension) => {
                            registered.insert(extension, ExtensionSource::Direct);
                        }
                        Err(err) => debug!("ignoring document type extension: {err}"),
                    }
                }
            }
            for list in record.arrays("LSItemContentTypes")? {
                for identifier in list.strings() {
                    let extensions = declared
                        .get(&identifier.trim().to_lowercase())
                        .filter(|extensions| !extensions.is_empty());
                    let Some(extensions) = extensions else {
                        facts.unresolved_content_types.insert(identifier);
                        continue;
                    };
                    for extension in extensions {
                        registered
                            .entry(extension.clone())
                            .or_insert_with(|| ExtensionSource::ContentType(identifier.clone()));
                    }
                }
            }
        }
    }
    facts.registered_extensions = Some(registered);

    let product_name = match root.scalar("CFBundleName")? {
        Some(name) => Some(name),
        None => root.scalar("CFBundleDisplayName")?,
    };
    facts.identity = Identity {
        bundle_id: Observed::expected(root.scalar("CFBundleIdentifier")?),
        version: Observed::expected(root.scalar("CFBundleShortVersionString")?),
        product_name: Observed::expected(product_name),
        ..Identity::default()
    };
    Ok(facts)
}

/// Maps each declared type identifier (lower-cased) to its extensions.
fn declared_content_types(
    root: &Block<'_>,
) -> std::result::Result<BTreeMap<String, BTreeSet<Extension>>, DocumentError> {
    let mut declared: BTreeMap<String, BTreeSet<Extension>> = BTreeMap::new();
    for key in TYPE_DECLARATION_KEYS {
        let Some(declarations) = root.array(key)? else {
            continue;
        };
        for declaration in declarations.child_dicts()? {
            let Some(identifier) = declaration.scalar("UTTypeIdentifier")? else {
                continue;
            };
            let raw = match declaration.dict("UTTypeTagSpecification")? {
                Some(tags) => match tags.array("public.filename-extension")? {
                    Some(list) => list.strings(),
                    None => tags
                        .scalar("public.filename-extension")?
                        .into_iter()
                        .collect(),
                },
                None => Vec::new(),
            };
            declared
                .entry(identifier.trim().to_lowercase())
                .or_default()
                .extend(raw.iter().filter_map(|value| Extension::parse(value).ok()));
        }
    }
    Ok(declared)
}

/// Basenames of every file below `Contents/Resources`.
fn resource_names(app: &Utf8Path) -> BTreeSet<String> {
    let pattern = format!("{}/Contents/Resources/**/*", Pattern::escape(app.as_str()));
    let Ok(paths) = glob::glob(&pattern) else {
        warn!("skipping invalid resource pattern {pattern}");
        return BTreeSet::new();
    };
    paths
        .filter_map(std::result::Result::ok)
        .filter(|path| path.is_file())
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()).map(str::to_owned))
        .collect()
}

/// Resolves `Contents/MacOS/<name>`, falling back to the only executable
/// file there.
fn main_executable(app: &Utf8Path, name: &str) -> Result<Utf8PathBuf> {
    let macos_dir = app.join("Contents/MacOS");
    let named = macos_dir.join(name);
    if named.is_file() {
        return Ok(named);
    }
    let files: Vec<Utf8PathBuf> = macos_dir
        .read_dir_utf8()
        .map_err(|err| VerifyError::read(macos_dir.clone(), err))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.into_path())
        .filter(|path| is_executable(path))
        .collect();
    match <[Utf8PathBuf; 1]>::try_from(files) {
        Ok([only]) => {
            debug!("{name} not found; using {only}");
            Ok(only)
        }
        Err(files) => Err(VerifyError::BundleLayout {
            path: macos_dir,
            reason: format!(
                "main executable {name} not found and {} executable candidate(s) present",
                files.len()
            ),
        }),
    }
}

#[cfg(unix)]
fn is_executable(path: &Utf8Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Utf8Path) -> bool {
    path.is_file()
}

#[cfg(test)]
#[path = "macos_tests.rs"]
mod tests;
