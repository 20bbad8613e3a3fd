//! Observed facts: what an artefact actually declares.
//!
//! Collectors fill an [`ObservedFacts`] in the shape of the
//! [`RequirementModel`](crate::requirement::RequirementModel). Anything a
//! platform does not report stays "not applicable" and is skipped by the
//! validator.

use shipcheck_common::{Diagnostic, Extension, MimeType, Scheme};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A fact that may be absent, or not reported by the platform at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Observed<T> {
    /// The platform does not carry this fact; nothing to compare.
    #[default]
    NotApplicable,
    /// The platform always carries this fact, but the artefact lacks it.
    Absent,
    /// The observed value.
    Present(T),
}

impl<T> Observed<T> {
    /// Wraps an optional value the platform is expected to carry.
    pub fn expected(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }

    /// Returns the value, if present.
    pub const fn present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::NotApplicable | Self::Absent => None,
        }
    }
}

/// How an extension came to be registered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExtensionSource {
    /// Declared directly by a document-type record or registry key.
    Direct,
    /// Reached through the named content-type identifier.
    ContentType(String),
}

impl fmt::Display for ExtensionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::ContentType(identifier) => write!(f, "via {identifier}"),
        }
    }
}

/// How trustworthy the collected facts are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Evidence {
    /// Read from a structured metadata container.
    #[default]
    Structured,
    /// Inferred by scanning an opaque payload; absence proves little.
    BestEffort,
}

/// A CPU architecture slice of a universal executable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Architecture {
    /// Intel 64-bit.
    X86_64,
    /// Apple silicon.
    Arm64,
    /// Any other slice reported by `lipo`.
    Other(String),
}

impl Architecture {
    /// Parses a name as printed by `lipo -archs`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "x86_64" => Self::X86_64,
            "arm64" => Self::Arm64,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86_64 => f.write_str("x86_64"),
            Self::Arm64 => f.write_str("arm64"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Identity fields read from the artefact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Bundle identifier (macOS).
    pub bundle_id: Observed<String>,
    /// Release version.
    pub version: Observed<String>,
    /// Product name.
    pub product_name: Observed<String>,
    /// Windows upgrade code.
    pub upgrade_code: Observed<String>,
    /// Linux package name.
    pub package_name: Observed<String>,
}

/// Where each category of fact was read from, for diagnostic locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locations {
    /// Source of file-type declarations.
    pub file_types: Option<String>,
    /// Source of scheme registrations.
    pub schemes: Option<String>,
    /// Source of identity fields.
    pub identity: Option<String>,
    /// Source of the MIME declarations.
    pub mime: Option<String>,
    /// The executable inspected for architecture slices.
    pub binary: Option<String>,
}

/// Everything collected from one artefact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedFacts {
    /// How trustworthy the facts are.
    pub evidence: Evidence,
    /// Diagnostic locations per category.
    pub locations: Locations,
    /// Registered extensions and how each was reached. `None` when the
    /// platform reports no file-type declarations.
    pub registered_extensions: Option<BTreeMap<Extension, ExtensionSource>>,
    /// Content-type identifiers that were referenced but declare no
    /// extensions.
    pub unresolved_content_types: BTreeSet<String>,
    /// Registered URL schemes. `None` when not applicable.
    pub registered_schemes: Option<BTreeSet<Scheme>>,
    /// Observed scheme values that are URL prefixes rather than names.
    pub malformed_schemes: Vec<String>,
    /// Identity fields.
    pub identity: Identity,
    /// Architecture slices of the main executable (universal builds only).
    pub binary_slices: Option<BTreeSet<Architecture>>,
    /// Basenames of shipped files where compliance files must live.
    pub files_present: Option<BTreeSet<String>>,
    /// Display path of the directory compliance files must live in.
    pub compliance_root: String,
    /// Every path in the package manifest (Linux).
    pub package_paths: Option<BTreeSet<String>>,
    /// Declared package dependencies (Linux).
    pub dependencies: Option<BTreeSet<String>>,
    /// MIME types the launcher entry declares (Linux).
    pub declared_mime_types: Option<BTreeSet<MimeType>>,
    /// MIME types assigned to extensions by shipped MIME-database
    /// fragments (Linux).
    pub mime_by_extension: Option<BTreeMap<Extension, BTreeSet<MimeType>>>,
    /// MIME types declared by shipped MIME-database fragments (Linux).
    pub shipped_mime_types: Option<BTreeSet<MimeType>>,
}

/// Facts plus any findings raised while collecting them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inspection {
    /// The collected facts.
    pub facts: ObservedFacts,
    /// Findings raised during collection, such as failed signature checks.
    pub diagnostics: Vec<Diagnostic>,
}

impl Inspection {
    /// Wraps facts with no collection findings.
    #[must_use]
    pub const fn new(facts: ObservedFacts) -> Self {
        Self {
            facts,
            diagnostics: Vec::new(),
        }
    }
}

/// Splits observed scheme strings into normalized schemes and malformed
/// values.
///
/// # Examples
///
/// ```
/// use shipcheck_verifier::facts::partition_schemes;
///
/// let (schemes, malformed) = partition_schemes(["Formula", "formula://"]);
/// assert_eq!(schemes.len(), 1);
/// assert_eq!(malformed, vec!["formula://".to_owned()]);
/// ```
pub fn partition_schemes<'a>(
    raw: impl IntoIterator<Item = &'a str>,
) -> (BTreeSet<Scheme>, Vec<String>) {
    let mut schemes = BTreeSet::new();
    let mut malformed = Vec::new();
    for value in raw {
        match Scheme::parse(value) {
            Ok(scheme) => {
                schemes.insert(scheme);
            }
            Err(_) => malformed.push(value.to_owned()),
        }
    }
    (schemes, malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_fields_are_absent_when_missing() {
        assert_eq!(Observed::<String>::expected(None), Observed::Absent);
        assert_eq!(
            Observed::expected(Some("1.0".to_owned())).present(),
            Some(&"1.0".to_owned())
        );
        assert_eq!(Observed::<String>::NotApplicable.present(), None);
    }

    #[test]
    fn architectures_parse_lipo_names() {
        assert_eq!(Architecture::parse("x86_64"), Architecture::X86_64);
        assert_eq!(Architecture::parse(" arm64\n"), Architecture::Arm64);
        assert_eq!(
            Architecture::parse("arm64e"),
            Architecture::Other("arm64e".to_owned())
        );
    }

    #[test]
    fn empty_scheme_values_are_malformed() {
        let (schemes, malformed) = partition_schemes(["", "formula"]);
        assert_eq!(schemes.len(), 1);
        assert_eq!(malformed, vec![String::new()]);
    }
}
