//! Typed verification findings.
//!
//! Every check produces zero or more [`Diagnostic`] values. Diagnostics are
//! additive: a failed check never suppresses later ones, and the run fails
//! exactly when at least one diagnostic has [`Severity::Error`].

use std::fmt;

/// How severe a finding is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Reported, but does not fail the run.
    Warning,
    /// Fails the run.
    Error,
}

impl Severity {
    /// Returns the lower-case label used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifiers for each kind of finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticCode {
    /// A required file extension is not registered by the artefact.
    MissingExtension,
    /// A required URL scheme is not registered by the artefact.
    MissingScheme,
    /// The artefact declares a scheme that is a URL prefix, not a name.
    MalformedScheme,
    /// An extension maps to more than one MIME type in the configuration.
    AmbiguousMimeType,
    /// An extension is claimed by more than one association entry.
    DuplicateExtension,
    /// The artefact maps an extension to a different MIME type.
    MimeTypeMismatch,
    /// An identity field differs from the configuration.
    IdentityMismatch,
    /// An identity field the platform always carries is absent.
    MissingIdentity,
    /// A compliance file is not shipped.
    MissingComplianceFile,
    /// A required path is not in the package manifest.
    MissingPackagePath,
    /// A required package dependency is not declared.
    MissingDependency,
    /// A MIME type needs a shipped MIME-database fragment that is absent.
    MissingMimeFragment,
    /// The main executable lacks a required architecture slice.
    MissingArchitecture,
    /// Signature verification rejected the artefact.
    SignatureInvalid,
    /// Signing checks were not configured.
    SigningSkipped,
    /// Notarization was not confirmed.
    NotarizationInvalid,
    /// Notarization checks were not configured.
    NotarizationSkipped,
    /// Signed entitlements do not include a declared entitlement.
    EntitlementMismatch,
    /// The artefact could not be inspected at all.
    InspectionFailed,
}

impl DiagnosticCode {
    /// Returns the kebab-case code shown in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingExtension => "missing-extension",
            Self::MissingScheme => "missing-scheme",
            Self::MalformedScheme => "malformed-scheme",
            Self::AmbiguousMimeType => "ambiguous-mime-type",
            Self::DuplicateExtension => "duplicate-extension",
            Self::MimeTypeMismatch => "mime-type-mismatch",
            Self::IdentityMismatch => "identity-mismatch",
            Self::MissingIdentity => "missing-identity",
            Self::MissingComplianceFile => "missing-compliance-file",
            Self::MissingPackagePath => "missing-package-path",
            Self::MissingDependency => "missing-dependency",
            Self::MissingMimeFragment => "missing-mime-fragment",
            Self::MissingArchitecture => "missing-architecture",
            Self::SignatureInvalid => "signature-invalid",
            Self::SigningSkipped => "signing-skipped",
            Self::NotarizationInvalid => "notarization-invalid",
            Self::NotarizationSkipped => "notarization-skipped",
            Self::EntitlementMismatch => "entitlement-mismatch",
            Self::InspectionFailed => "inspection-failed",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single verification finding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    severity: Severity,
    code: DiagnosticCode,
    message: String,
    location: Option<String>,
    context: Vec<String>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    ///
    /// # Examples
    ///
    /// ```
    /// use shipcheck_common::diagnostics::{Diagnostic, DiagnosticCode, Severity};
    ///
    /// let diagnostic = Diagnostic::error(DiagnosticCode::MissingExtension, "xlsx is not registered")
    ///     .at("Formula.app/Contents/Info.plist")
    ///     .with_context("registered: csv");
    /// assert_eq!(diagnostic.severity(), Severity::Error);
    /// assert_eq!(diagnostic.context(), ["registered: csv"]);
    /// ```
    #[must_use]
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a warning diagnostic.
    #[must_use]
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Creates a diagnostic with an explicit severity.
    #[must_use]
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location: None,
            context: Vec::new(),
        }
    }

    /// Names the offending file, table field, or document position.
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Appends a line of supporting context.
    #[must_use]
    pub fn with_context(mut self, line: impl Into<String>) -> Self {
        self.context.push(line.into());
        self
    }

    /// Returns the severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the finding code.
    #[must_use]
    pub const fn code(&self) -> DiagnosticCode {
        self.code
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the location, when one is known.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Returns the supporting context lines.
    #[must_use]
    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// Returns `true` for error diagnostics.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, "\n  --> {location}")?;
        }
        for line in &self.context {
            write!(f, "\n  = {line}")?;
        }
        Ok(())
    }
}

/// Returns `true` when any diagnostic is an error.
///
/// # Examples
///
/// ```
/// use shipcheck_common::diagnostics::{Diagnostic, DiagnosticCode, has_errors};
///
/// let warning = Diagnostic::warning(DiagnosticCode::SigningSkipped, "no credentials");
/// assert!(!has_errors(&[warning.clone()]));
///
/// let error = Diagnostic::error(DiagnosticCode::MissingScheme, "formula");
/// assert!(has_errors(&[warning, error]));
/// ```
#[must_use]
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
