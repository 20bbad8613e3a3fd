//! Cross-reference validation.
//!
//! Both entry points are pure: they diff declared requirements against
//! observed facts and return every finding. No check short-circuits
//! another.

use crate::facts::{Architecture, Evidence, ExtensionSource, Observed, ObservedFacts};
use crate::requirement::{RequirementModel, normalize_guid};
use shipcheck_common::{Diagnostic, DiagnosticCode, Extension, MimeType, Severity};
use std::collections::{BTreeMap, BTreeSet};

/// MIME types that the shared MIME database does not reliably know, so a
/// package declaring them must ship its own fragment.
pub const UNRELIABLE_SHARED_MIME_TYPES: &[&str] = &["application/vnd.apache.parquet"];

/// Package that installs the MIME-database update hooks.
pub const SHARED_MIME_INFO: &str = "shared-mime-info";

/// Checks the configuration for internal conflicts before any artefact is
/// inspected.
///
/// An extension mapped to more than one MIME type is ambiguous; an extension
/// repeated across entries with the same MIME type is a duplicate.
#[must_use]
pub fn validate_requirements(requirement: &RequirementModel) -> Vec<Diagnostic> {
    let mut entries_by_extension: BTreeMap<&Extension, BTreeSet<usize>> = BTreeMap::new();
    for association in requirement.associations() {
        for extension in &association.extensions {
            entries_by_extension
                .entry(extension)
                .or_default()
                .insert(association.index);
        }
    }

    let mut diagnostics = Vec::new();
    for (extension, entries) in entries_by_extension {
        let mimes = requirement
            .mime_by_extension()
            .get(extension)
            .map(|set| set.iter().map(MimeType::as_str).collect::<Vec<_>>())
            .unwrap_or_default();
        let entry_list = join(entries.iter().map(|index| format!("#{index}")));
        if mimes.len() > 1 {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::AmbiguousMimeType,
                    format!(".{extension} maps to more than one MIME type"),
                )
                .at("bundle.fileAssociations")
                .with_context(format!("MIME types: {}", mimes.join(", ")))
                .with_context(format!("entries: {entry_list}")),
            );
        } else if entries.len() > 1 {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::DuplicateExtension,
                    format!(".{extension} is declared by more than one file association"),
                )
                .at("bundle.fileAssociations")
                .with_context(format!("entries: {entry_list}")),
            );
        }
    }
    diagnostics
}

/// Diffs `requirement` against the facts observed in one artefact.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use shipcheck_common::DiagnosticCode;
/// use shipcheck_verifier::config::PackagingConfig;
/// use shipcheck_verifier::facts::ObservedFacts;
/// use shipcheck_verifier::requirement::RequirementModel;
/// use shipcheck_verifier::validate::validate;
/// use std::collections::BTreeSet;
///
/// let config = PackagingConfig::from_json(
///     Utf8Path::new("tauri.conf.json"),
///     r#"{"identifier":"a","version":"1","productName":"A","mainBinaryName":"a",
///         "plugins":{"deep-link":{"desktop":{"schemes":["formula"]}}}}"#,
/// )?;
/// let requirement = RequirementModel::from_config(&config, Utf8Path::new("."))?;
/// let observed = ObservedFacts {
///     registered_schemes: Some(BTreeSet::new()),
///     ..ObservedFacts::default()
/// };
/// let diagnostics = validate(&requirement, &observed);
/// assert_eq!(diagnostics[0].code(), DiagnosticCode::MissingScheme);
/// # Ok::<(), shipcheck_verifier::config::ConfigError>(())
/// ```
#[must_use]
pub fn validate(requirement: &RequirementModel, observed: &ObservedFacts) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_extensions(requirement, observed, &mut diagnostics);
    check_linux_mime(requirement, observed, &mut diagnostics);
    check_schemes(requirement, observed, &mut diagnostics);
    check_identity(requirement, observed, &mut diagnostics);
    check_architectures(observed, &mut diagnostics);
    check_compliance(requirement, observed, &mut diagnostics);
    check_package_paths(requirement, observed, &mut diagnostics);
    diagnostics
}

const fn missing_severity(evidence: Evidence) -> Severity {
    match evidence {
        Evidence::Structured => Severity::Error,
        Evidence::BestEffort => Severity::Warning,
    }
}

fn join<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: std::fmt::Display,
{
    let parts: Vec<String> = items.into_iter().map(|item| item.to_string()).collect();
    if parts.is_empty() {
        "(none)".to_owned()
    } else {
        parts.join(", ")
    }
}

fn located(diagnostic: Diagnostic, location: Option<&String>) -> Diagnostic {
    match location {
        Some(location) => diagnostic.at(location.as_str()),
        None => diagnostic,
    }
}

fn check_extensions(
    requirement: &RequirementModel,
    observed: &ObservedFacts,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(registered) = &observed.registered_extensions else {
        return;
    };
    let found = join(registered.iter().map(|(extension, source)| match source {
        ExtensionSource::Direct => extension.to_string(),
        ExtensionSource::ContentType(_) => format!("{extension} ({source})"),
    }));
    for extension in requirement.extensions() {
        if registered.contains_key(extension) {
            continue;
        }
        let mut diagnostic = Diagnostic::new(
            missing_severity(observed.evidence),
            DiagnosticCode::MissingExtension,
            format!("file extension .{extension} is not registered"),
        )
        .with_context(format!("registered: {found}"));
        if !observed.unresolved_content_types.is_empty() {
            diagnostic = diagnostic.with_context(format!(
                "content types without extensions: {}",
                join(&observed.unresolved_content_types)
            ));
        }
        diagnostics.push(located(diagnostic, observed.locations.file_types.as_ref()));
    }
}

fn check_linux_mime(
    requirement: &RequirementModel,
    observed: &ObservedFacts,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(declared) = &observed.declared_mime_types else {
        return;
    };
    let globbed = observed.mime_by_extension.as_ref();
    let location = observed.locations.mime.as_ref();

    for extension in requirement.extensions() {
        let expected = requirement
            .mime_by_extension()
            .get(extension)
            .cloned()
            .unwrap_or_default();
        let shipped = globbed.and_then(|map| map.get(extension));

        if let Some(shipped) = shipped.filter(|mimes| !expected.is_empty() && mimes.is_disjoint(&expected)) {
            diagnostics.push(located(
                Diagnostic::error(
                    DiagnosticCode::MimeTypeMismatch,
                    format!(".{extension} is assigned a different MIME type by a shipped fragment"),
                )
                .with_context(format!("expected: {}", join(&expected)))
                .with_context(format!("shipped: {}", join(shipped))),
                location,
            ));
        }

        let handled = if expected.is_empty() {
            shipped.is_some_and(|mimes| !mimes.is_disjoint(declared))
        } else {
            !expected.is_disjoint(declared)
        };
        if !handled {
            let message = if expected.is_empty() {
                format!(".{extension} has no MIME type the launcher entry declares")
            } else {
                format!(
                    ".{extension} is not handled: the launcher entry does not declare {}",
                    join(&expected)
                )
            };
            diagnostics.push(located(
                Diagnostic::new(
                    missing_severity(observed.evidence),
                    DiagnosticCode::MissingExtension,
                    message,
                )
                .with_context(format!(
                    "declared MIME types: {}",
                    join(declared.iter().filter(|mime| mime.scheme_handler().is_none()))
                )),
                location,
            ));
        }
    }

    for mime in requirement.mime_by_extension().values().flatten().collect::<BTreeSet<_>>() {
        if !UNRELIABLE_SHARED_MIME_TYPES.contains(&mime.as_str()) {
            continue;
        }
        let fragment_shipped = observed
            .shipped_mime_types
            .as_ref()
            .is_some_and(|shipped| shipped.contains(mime));
        if !fragment_shipped {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::MissingMimeFragment,
                    format!("{mime} is not in every shared MIME database; the package must ship a fragment declaring it"),
                )
                .at("/usr/share/mime/packages/"),
            );
        }
        let lacks_dependency = observed
            .dependencies
            .as_ref()
            .filter(|dependencies| !dependencies.contains(SHARED_MIME_INFO));
        if let Some(dependencies) = lacks_dependency {
            diagnostics.push(
                Diagnostic::error(
                    DiagnosticCode::MissingDependency,
                    format!("package ships a MIME fragment for {mime} but does not depend on {SHARED_MIME_INFO}"),
                )
                .with_context(format!("depends: {}", join(dependencies))),
            );
        }
    }
}

fn check_schemes(
    requirement: &RequirementModel,
    observed: &ObservedFacts,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let location = observed.locations.schemes.as_ref();
    for raw in &observed.malformed_schemes {
        diagnostics.push(located(
            Diagnostic::error(
                DiagnosticCode::MalformedScheme,
                format!("registered URL scheme {raw:?} is a URL prefix, not a scheme name"),
            ),
            location,
        ));
    }

    let Some(registered) = &observed.registered_schemes else {
        return;
    };
    for scheme in requirement.schemes() {
        if registered.contains(scheme) {
            continue;
        }
        diagnostics.push(located(
            Diagnostic::new(
                missing_severity(observed.evidence),
                DiagnosticCode::MissingScheme,
                format!("URL scheme {scheme} is not registered"),
            )
            .with_context(format!("registered: {}", join(registered))),
            location,
        ));
    }
}

fn check_identity(
    requirement: &RequirementModel,
    observed: &ObservedFacts,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let identity = &observed.identity;
    let location = observed.locations.identity.as_ref();
    let fields: [(&str, &Observed<String>, Option<&str>, fn(&str, &str) -> bool); 5] = [
        (
            "bundle identifier",
            &identity.bundle_id,
            Some(requirement.identifier()),
            |a, b| a == b,
        ),
        (
            "version",
            &identity.version,
            Some(requirement.version()),
            versions_match,
        ),
        (
            "product name",
            &identity.product_name,
            Some(requirement.product_name()),
            |a, b| a == b,
        ),
        (
            "upgrade code",
            &identity.upgrade_code,
            requirement.upgrade_code(),
            |a, b| normalize_guid(a) == normalize_guid(b),
        ),
        (
            "package name",
            &identity.package_name,
            Some(requirement.package_name()),
            |a, b| a == b,
        ),
    ];

    for (label, actual, expected, matches) in fields {
        let Some(expected) = expected else {
            continue;
        };
        match actual {
            Observed::NotApplicable => {}
            Observed::Absent => diagnostics.push(located(
                Diagnostic::error(
                    DiagnosticCode::MissingIdentity,
                    format!("{label} is not declared"),
                )
                .with_context(format!("expected: {expected}")),
                location,
            )),
            Observed::Present(value) if !matches(value, expected) => diagnostics.push(located(
                Diagnostic::error(
                    DiagnosticCode::IdentityMismatch,
                    format!("{label} does not match the packaging config"),
                )
                .with_context(format!("expected: {expected}"))
                .with_context(format!("found: {value}")),
                location,
            )),
            Observed::Present(_) => {}
        }
    }
}

/// Compares two release versions, ignoring a trailing fourth `.0` field
/// and treating `~` and `-` pre-release separators as equal.
///
/// # Examples
///
/// ```
/// use shipcheck_verifier::validate::versions_match;
///
/// assert!(versions_match("1.4.0.0", "1.4.0"));
/// assert!(versions_match("1.4.0~beta.1", "1.4.0-beta.1"));
/// assert!(!versions_match("1.4.1", "1.4.0"));
/// ```
#[must_use]
pub fn versions_match(observed: &str, declared: &str) -> bool {
    canonical_version(observed) == canonical_version(declared)
}

fn canonical_version(raw: &str) -> String {
    let unified = raw.trim().replace('~', "-");
    let fields: Vec<&str> = unified.split('.').collect();
    let numeric = fields
        .iter()
        .all(|field| !field.is_empty() && field.chars().all(|ch| ch.is_ascii_digit()));
    match fields.as_slice() {
        [major, minor, patch, "0"] if numeric => format!("{major}.{minor}.{patch}"),
        _ => unified,
    }
}

fn check_architectures(observed: &ObservedFacts, diagnostics: &mut Vec<Diagnostic>) {
    let Some(slices) = &observed.binary_slices else {
        return;
    };
    for required in [Architecture::X86_64, Architecture::Arm64] {
        if slices.contains(&required) {
            continue;
        }
        diagnostics.push(located(
            Diagnostic::error(
                DiagnosticCode::MissingArchitecture,
                format!("universal executable lacks the {required} slice"),
            )
            .with_context(format!("slices: {}", join(slices))),
            observed.locations.binary.as_ref(),
        ));
    }
}

fn check_compliance(
    requirement: &RequirementModel,
    observed: &ObservedFacts,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(present) = &observed.files_present else {
        return;
    };
    let lowered: BTreeSet<String> = present.iter().map(|name| name.to_lowercase()).collect();
    for name in requirement.compliance_files() {
        if lowered.contains(&name.to_lowercase()) {
            continue;
        }
        let expected_path = if observed.compliance_root.is_empty() {
            name.clone()
        } else {
            format!("{}/{name}", observed.compliance_root.trim_end_matches('/'))
        };
        diagnostics.push(
            Diagnostic::new(
                missing_severity(observed.evidence),
                DiagnosticCode::MissingComplianceFile,
                format!("compliance file {name} is not shipped"),
            )
            .at(expected_path),
        );
    }
}

fn check_package_paths(
    requirement: &RequirementModel,
    observed: &ObservedFacts,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(paths) = &observed.package_paths else {
        return;
    };
    let mut missing = |path: String| {
        diagnostics.push(Diagnostic::error(
            DiagnosticCode::MissingPackagePath,
            format!("{path} is not in the package manifest"),
        ));
    };

    let binary = format!("/usr/bin/{}", requirement.main_binary_name());
    if !paths.contains(&binary) {
        missing(binary);
    }
    let has_launcher = paths
        .iter()
        .any(|path| path.starts_with("/usr/share/applications/") && path.ends_with(".desktop"));
    if !has_launcher {
        missing("/usr/share/applications/*.desktop".to_owned());
    }
    for destination in requirement.linux_file_map() {
        let absolute = if destination.starts_with('/') {
            destination.clone()
        } else {
            format!("/{destination}")
        };
        if !paths.contains(&absolute) {
            missing(absolute);
        }
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
