//! Signature and notarization checks.
//!
//! Each check runs only when the build environment carries the credentials
//! that would have produced a signature. A check without credentials
//! reports a skip warning; a tool that rejects the artefact reports an
//! error diagnostic. Tool errors (missing executable, timeout) propagate
//! and end the artefact's inspection.

use crate::artefact::{Artefact, ArtefactKind};
use crate::command::{CommandExecutor, run_checked};
use crate::error::{Result, VerifyError};
use crate::requirement::RequirementModel;
use camino::Utf8Path;
use log::debug;
use shipcheck_common::{Diagnostic, DiagnosticCode, PlistDocument};
use std::collections::BTreeSet;

/// Which signing checks the build environment enables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigningEnvironment {
    /// `APPLE_SIGNING_IDENTITY` or `APPLE_CERTIFICATE` is set.
    pub apple_signing: bool,
    /// Apple ID or App Store Connect API credentials are set.
    pub apple_notarization: bool,
    /// `WINDOWS_CERTIFICATE` is set.
    pub windows: bool,
    /// `TAURI_SIGNING_RPM_KEY` is set.
    pub rpm: bool,
}

impl SigningEnvironment {
    /// Reads the environment through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |name: &str| lookup(name).is_some_and(|value| !value.trim().is_empty());
        Self {
            apple_signing: set("APPLE_SIGNING_IDENTITY") || set("APPLE_CERTIFICATE"),
            apple_notarization: (set("APPLE_ID") && set("APPLE_PASSWORD") && set("APPLE_TEAM_ID"))
                || (set("APPLE_API_KEY") && set("APPLE_API_ISSUER")),
            windows: set("WINDOWS_CERTIFICATE"),
            rpm: set("TAURI_SIGNING_RPM_KEY"),
        }
    }

    /// Reads the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

/// Runs the signing checks that apply to `artefact`.
///
/// `subject` is what the signature covers: the `.app` bundle for macOS
/// artefacts and the installer file otherwise.
///
/// # Errors
///
/// Propagates executor errors from enabled checks, and returns
/// [`VerifyError::Document`] when a declared or signed entitlements document
/// cannot be parsed.
pub fn verify(
    executor: &dyn CommandExecutor,
    signing: &SigningEnvironment,
    requirement: &RequirementModel,
    artefact: &Artefact,
    subject: &Utf8Path,
) -> Result<Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    match artefact.kind() {
        ArtefactKind::Dmg | ArtefactKind::AppTarball => {
            verify_macos_signature(executor, signing, requirement, subject, &mut diagnostics)?;
            // A disk image carries its own stapled ticket.
            let notarized = if artefact.kind() == ArtefactKind::Dmg {
                artefact.path()
            } else {
                subject
            };
            verify_notarization(executor, signing, notarized, &mut diagnostics)?;
        }
        ArtefactKind::Msi | ArtefactKind::Exe => {
            if signing.windows {
                let args = ["verify", "/pa", subject.as_str()];
                check_verdict(executor, "signtool", &args, subject, &mut diagnostics)?;
            } else {
                diagnostics.push(skipped(DiagnosticCode::SigningSkipped, "WINDOWS_CERTIFICATE"));
            }
        }
        ArtefactKind::Rpm => {
            if signing.rpm {
                check_verdict(executor, "rpm", &["-K", subject.as_str()], subject, &mut diagnostics)?;
            } else {
                diagnostics.push(skipped(DiagnosticCode::SigningSkipped, "TAURI_SIGNING_RPM_KEY"));
            }
        }
        ArtefactKind::Deb => debug!("debian packages carry no verifiable signature"),
    }
    Ok(diagnostics)
}

fn verify_macos_signature(
    executor: &dyn CommandExecutor,
    signing: &SigningEnvironment,
    requirement: &RequirementModel,
    app: &Utf8Path,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<()> {
    if !signing.apple_signing {
        diagnostics.push(skipped(
            DiagnosticCode::SigningSkipped,
            "APPLE_SIGNING_IDENTITY or APPLE_CERTIFICATE",
        ));
        return Ok(());
    }
    let path = app.as_str();
    check_verdict(
        executor,
        "codesign",
        &["--verify", "--deep", "--strict", "--verbose=2", path],
        app,
        diagnostics,
    )?;
    check_verdict(
        executor,
        "spctl",
        &["--assess", "--type", "execute", "--verbose", path],
        app,
        diagnostics,
    )?;
    if let Some(declared) = requirement.entitlements() {
        verify_entitlements(executor, declared, app, diagnostics)?;
    }
    Ok(())
}

fn verify_notarization(
    executor: &dyn CommandExecutor,
    signing: &SigningEnvironment,
    target: &Utf8Path,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<()> {
    if !signing.apple_notarization {
        diagnostics.push(skipped(
            DiagnosticCode::NotarizationSkipped,
            "APPLE_ID, APPLE_PASSWORD and APPLE_TEAM_ID, or APPLE_API_KEY and APPLE_API_ISSUER",
        ));
        return Ok(());
    }
    let output = executor.run("xcrun", &["stapler", "validate", target.as_str()])?;
    if !output.status.success() {
        diagnostics.push(
            Diagnostic::error(
                DiagnosticCode::NotarizationInvalid,
                "no valid notarization ticket is stapled",
            )
            .at(target.as_str())
            .with_context(tool_message(&output)),
        );
    }
    Ok(())
}

fn verify_entitlements(
    executor: &dyn CommandExecutor,
    declared_path: &Utf8Path,
    app: &Utf8Path,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<()> {
    let text = std::fs::read_to_string(declared_path)
        .map_err(|err| VerifyError::read(declared_path, err))?;
    let declared = entitlement_keys(declared_path, &text)?;

    let signed_text = run_checked(
        executor,
        "codesign",
        &["-d", "--entitlements", "-", "--xml", app.as_str()],
    )?;
    let signed = if signed_text.trim().is_empty() {
        BTreeSet::new()
    } else {
        entitlement_keys(app, &signed_text)?
    };

    let missing: Vec<&String> = declared.difference(&signed).collect();
    if !missing.is_empty() {
        let list: Vec<&str> = missing.iter().map(|key| key.as_str()).collect();
        diagnostics.push(
            Diagnostic::error(
                DiagnosticCode::EntitlementMismatch,
                "signed entitlements omit declared entitlements",
            )
            .at(app.as_str())
            .with_context(format!("missing: {}", list.join(", ")))
            .with_context(format!("declared in: {declared_path}")),
        );
    }
    Ok(())
}

fn entitlement_keys(path: &Utf8Path, text: &str) -> Result<BTreeSet<String>> {
    let document_error = |source| VerifyError::Document {
        path: path.to_owned(),
        source,
    };
    let document = PlistDocument::parse(text).map_err(document_error)?;
    Ok(document
        .root()
        .keys()
        .map_err(document_error)?
        .into_iter()
        .collect())
}

fn check_verdict(
    executor: &dyn CommandExecutor,
    tool: &str,
    args: &[&str],
    subject: &Utf8Path,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<()> {
    let output = executor.run(tool, args)?;
    if output.status.success() {
        debug!("{tool} accepted {subject}");
        return Ok(());
    }
    diagnostics.push(
        Diagnostic::error(
            DiagnosticCode::SignatureInvalid,
            format!("{tool} rejected the signature"),
        )
        .at(subject.as_str())
        .with_context(tool_message(&output)),
    );
    Ok(())
}

fn tool_message(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let message = if stderr.trim().is_empty() {
        stdout.trim().to_owned()
    } else {
        stderr.trim().to_owned()
    };
    format!("{}: {message}", output.status)
}

fn skipped(code: DiagnosticCode, variables: &str) -> Diagnostic {
    let what = match code {
        DiagnosticCode::NotarizationSkipped => "notarization",
        _ => "signature",
    };
    Diagnostic::warning(code, format!("{what} check skipped"))
        .with_context(format!("set {variables} to enable it"))
}

#[cfg(test)]
#[path = "signing_tests.rs"]
mod tests;
