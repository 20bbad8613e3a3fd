//! Unit tests for signature and notarization checks.

use super::{SigningEnvironment, verify};
use crate::artefact::Artefact;
use crate::config::PackagingConfig;
use crate::error::VerifyError;
use crate::requirement::RequirementModel;
use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, stdout_output, success_output};
use camino::{Utf8Path, Utf8PathBuf};
use rstest::rstest;
use shipcheck_common::{Diagnostic, DiagnosticCode, Severity};
use std::collections::HashMap;

const CONFIG: &str = r#"{
    "identifier": "com.example.formula",
    "version": "1.4.0",
    "productName": "Formula",
    "mainBinaryName": "formula"
}"#;

const APP: &str = "/Volumes/Formula/Formula.app";

fn requirement_in(dir: &Utf8Path, text: &str) -> RequirementModel {
    let config =
        PackagingConfig::from_json(Utf8Path::new("tauri.conf.json"), text).expect("valid JSON");
    RequirementModel::from_config(&config, dir).expect("valid requirement")
}

fn artefact(path: &str) -> Artefact {
    Artefact::from_path(Utf8PathBuf::from(path)).expect("known kind")
}

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();
    move |name| map.get(name).cloned()
}

fn codes(diagnostics: &[Diagnostic]) -> Vec<(Severity, DiagnosticCode)> {
    diagnostics
        .iter()
        .map(|diagnostic| (diagnostic.severity(), diagnostic.code()))
        .collect()
}

const ALL_ENABLED: SigningEnvironment = SigningEnvironment {
    apple_signing: true,
    apple_notarization: true,
    windows: true,
    rpm: true,
};

#[rstest]
#[case::identity(&[("APPLE_SIGNING_IDENTITY", "Developer ID Application: Example")], true, false)]
#[case::certificate(&[("APPLE_CERTIFICATE", "base64")], true, false)]
#[case::empty_identity(&[("APPLE_SIGNING_IDENTITY", "  ")], false, false)]
#[case::apple_id(&[("APPLE_ID", "a"), ("APPLE_PASSWORD", "b"), ("APPLE_TEAM_ID", "c")], false, true)]
#[case::partial_apple_id(&[("APPLE_ID", "a"), ("APPLE_PASSWORD", "b")], false, false)]
#[case::api_key(&[("APPLE_API_KEY", "k"), ("APPLE_API_ISSUER", "i")], false, true)]
fn apple_credentials_enable_checks(
    #[case] vars: &[(&str, &str)],
    #[case] signing: bool,
    #[case] notarization: bool,
) {
    let environment = SigningEnvironment::from_lookup(lookup(vars));
    assert_eq!(environment.apple_signing, signing);
    assert_eq!(environment.apple_notarization, notarization);
    assert!(!environment.windows);
}

#[test]
fn process_environment_is_read() {
    temp_env::with_vars(
        [
            ("WINDOWS_CERTIFICATE", Some("pfx")),
            ("TAURI_SIGNING_RPM_KEY", None::<&str>),
        ],
        || {
            let environment = SigningEnvironment::from_env();
            assert!(environment.windows);
            assert!(!environment.rpm);
        },
    );
}

#[test]
fn unconfigured_macos_checks_are_skipped() {
    let executor = StubExecutor::new(Vec::new());
    let requirement = requirement_in(Utf8Path::new("."), CONFIG);

    let diagnostics = verify(
        &executor,
        &SigningEnvironment::default(),
        &requirement,
        &artefact("Formula_1.4.0_universal.dmg"),
        Utf8Path::new(APP),
    )
    .expect("no tool runs");

    assert_eq!(
        codes(&diagnostics),
        vec![
            (Severity::Warning, DiagnosticCode::SigningSkipped),
            (Severity::Warning, DiagnosticCode::NotarizationSkipped),
        ]
    );
    executor.assert_finished();
}

#[test]
fn rejected_gatekeeper_assessment_is_an_error() {
    let executor = StubExecutor::new(vec![
        ExpectedCall::new(
            "codesign",
            &["--verify", "--deep", "--strict", "--verbose=2", APP],
            Ok(success_output()),
        ),
        ExpectedCall::new(
            "spctl",
            &["--assess", "--type", "execute", "--verbose", APP],
            Ok(failure_output("rejected source=Unnotarized Developer ID")),
        ),
        ExpectedCall::new(
            "xcrun",
            &["stapler", "validate", "Formula_1.4.0_universal.dmg"],
            Ok(success_output()),
        ),
    ]);
    let requirement = requirement_in(Utf8Path::new("."), CONFIG);

    let diagnostics = verify(
        &executor,
        &ALL_ENABLED,
        &requirement,
        &artefact("Formula_1.4.0_universal.dmg"),
        Utf8Path::new(APP),
    )
    .expect("tools ran");

    assert_eq!(
        codes(&diagnostics),
        vec![(Severity::Error, DiagnosticCode::SignatureInvalid)]
    );
    assert!(diagnostics[0].context()[0].contains("Unnotarized"));
    executor.assert_finished();
}

#[test]
fn tarball_notarization_checks_the_app() {
    let executor = StubExecutor::new(vec![ExpectedCall::new(
        "xcrun",
        &["stapler", "validate", APP],
        Ok(failure_output("does not have a ticket stapled to it")),
    )]);
    let requirement = requirement_in(Utf8Path::new("."), CONFIG);
    let environment = SigningEnvironment {
        apple_notarization: true,
        ..SigningEnvironment::default()
    };

    let diagnostics = verify(
        &executor,
        &environment,
        &requirement,
        &artefact("Formula.app.tar.gz"),
        Utf8Path::new(APP),
    )
    .expect("tools ran");

    assert_eq!(
        codes(&diagnostics),
        vec![
            (Severity::Warning, DiagnosticCode::SigningSkipped),
            (Severity::Error, DiagnosticCode::NotarizationInvalid),
        ]
    );
    executor.assert_finished();
}

#[test]
fn signed_entitlements_must_cover_declared_keys() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config_dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
    std::fs::write(
        config_dir.join("entitlements.plist"),
        r#"<plist version="1.0"><dict>
            <key>com.apple.security.network.client</key><true/>
            <key>com.apple.security.files.user-selected.read-write</key><true/>
        </dict></plist>"#,
    )
    .expect("write entitlements");
    let requirement = requirement_in(
        &config_dir,
        r#"{
            "identifier": "com.example.formula",
            "version": "1.4.0",
            "productName": "Formula",
            "mainBinaryName": "formula",
            "bundle": { "macOS": { "entitlements": "entitlements.plist" } }
        }"#,
    );
    let signed = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict>
    <key>com.apple.security.network.client</key><true/>
</dict></plist>"#;
    let executor = StubExecutor::new(vec![
        ExpectedCall::new(
            "codesign",
            &["--verify", "--deep", "--strict", "--verbose=2", APP],
            Ok(success_output()),
        ),
        ExpectedCall::new(
            "spctl",
            &["--assess", "--type", "execute", "--verbose", APP],
            Ok(success_output()),
        ),
        ExpectedCall::new(
            "codesign",
            &["-d", "--entitlements", "-", "--xml", APP],
            Ok(stdout_output(signed)),
        ),
    ]);
    let environment = SigningEnvironment {
        apple_signing: true,
        ..SigningEnvironment::default()
    };

    let diagnostics = verify(
        &executor,
        &environment,
        &requirement,
        &artefact("Formula.app.tar.gz"),
        Utf8Path::new(APP),
    )
    .expect("tools ran");

    let mismatch = diagnostics
        .iter()
        .find(|diagnostic| diagnostic.code() == DiagnosticCode::EntitlementMismatch)
        .expect("mismatch reported");
    assert_eq!(
        mismatch.context()[0],
        "missing: com.apple.security.files.user-selected.read-write"
    );
    executor.assert_finished();
}

#[test]
fn missing_signtool_is_a_tool_error() {
    let executor = StubExecutor::new(vec![ExpectedCall::new(
        "signtool",
        &["verify", "/pa", "Formula_1.4.0_x64_en-US.msi"],
        Err(VerifyError::ToolMissing {
            tool: "signtool".to_owned(),
        }),
    )]);
    let requirement = requirement_in(Utf8Path::new("."), CONFIG);

    let err = verify(
        &executor,
        &ALL_ENABLED,
        &requirement,
        &artefact("Formula_1.4.0_x64_en-US.msi"),
        Utf8Path::new("Formula_1.4.0_x64_en-US.msi"),
    )
    .expect_err("tool missing");
    assert!(matches!(err, VerifyError::ToolMissing { .. }));
}

#[rstest]
#[case::rpm("formula-1.4.0-1.x86_64.rpm", "rpm", &["-K", "formula-1.4.0-1.x86_64.rpm"])]
#[case::nsis("Formula_1.4.0_x64-setup.exe", "signtool", &["verify", "/pa", "Formula_1.4.0_x64-setup.exe"])]
fn accepted_signature_reports_nothing(
    #[case] path: &str,
    #[case] tool: &str,
    #[case] args: &[&str],
) {
    let executor = StubExecutor::new(vec![ExpectedCall::new(tool, args, Ok(success_output()))]);
    let requirement = requirement_in(Utf8Path::new("."), CONFIG);

    let diagnostics = verify(
        &executor,
        &ALL_ENABLED,
        &requirement,
        &artefact(path),
        Utf8Path::new(path),
    )
    .expect("tool ran");
    assert!(diagnostics.is_empty());
    executor.assert_finished();
}

#[test]
fn debian_packages_have_no_signature_check() {
    let executor = StubExecutor::new(Vec::new());
    let requirement = requirement_in(Utf8Path::new("."), CONFIG);

    let diagnostics = verify(
        &executor,
        &SigningEnvironment::default(),
        &requirement,
        &artefact("formula_1.4.0_amd64.deb"),
        Utf8Path::new("formula_1.4.0_amd64.deb"),
    )
    .expect("nothing to run");
    assert!(diagnostics.is_empty());
}
