//! Unit tests for run orchestration.
//!
//! Setup executables need no external tools, so they drive most of these
//! tests; failing package tools exercise the per-artefact failure path.

use super::{ArtefactReport, Outcome, RunReport, Verifier};
use crate::artefact::Artefact;
use crate::config::PackagingConfig;
use crate::error::VerifyError;
use crate::lifecycle::extraction::MockArchiveExtractor;
use crate::lifecycle::resource::CleanupRegistry;
use crate::requirement::RequirementModel;
use crate::signing::SigningEnvironment;
use crate::test_utils::{ExpectedCall, StubExecutor, failure_output};
use camino::{Utf8Path, Utf8PathBuf};
use rstest::{fixture, rstest};
use shipcheck_common::{Diagnostic, DiagnosticCode, Severity};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
    requirement: RequirementModel,
    registry: CleanupRegistry,
    extractor: MockArchiveExtractor,
    signing: SigningEnvironment,
}

impl Workspace {
    fn installer(&self, name: &str, payload: &[u8]) -> Artefact {
        let path = self.root.join(name);
        std::fs::write(&path, payload).expect("write installer");
        Artefact::from_path(path).expect("known kind")
    }

    fn verifier<'a>(&'a self, executor: &'a StubExecutor) -> Verifier<'a> {
        Verifier {
            requirement: &self.requirement,
            executor,
            registry: &self.registry,
            extractor: &self.extractor,
            signing: &self.signing,
        }
    }
}

#[fixture]
fn workspace() -> Workspace {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 path");
    let config = PackagingConfig::from_json(
        Utf8Path::new("tauri.conf.json"),
        r#"{"identifier":"com.example.formula","version":"1.4.0",
            "productName":"Formula","mainBinaryName":"formula",
            "bundle":{"fileAssociations":[{"ext":["csv"],"mimeType":"text/csv"}]},
            "plugins":{"deep-link":{"desktop":{"schemes":["formula"]}}}}"#,
    )
    .expect("valid JSON");
    let requirement =
        RequirementModel::from_config(&config, Utf8Path::new(".")).expect("valid requirement");
    Workspace {
        _dir: dir,
        root,
        requirement,
        registry: CleanupRegistry::new(),
        extractor: MockArchiveExtractor::new(),
        signing: SigningEnvironment::default(),
    }
}

const REGISTERED: &[u8] = b"Software\\Classes\\.csv\0Software\\Classes\\formula\\shell\\open\\command\0";

fn codes(diagnostics: &[Diagnostic]) -> Vec<DiagnosticCode> {
    diagnostics.iter().map(Diagnostic::code).collect()
}

#[rstest]
fn registered_installer_only_warns_about_signing(workspace: Workspace) {
    let artefact = workspace.installer("Formula_1.4.0_x64-setup.exe", REGISTERED);
    let executor = StubExecutor::new(Vec::new());

    let diagnostics = workspace
        .verifier(&executor)
        .verify(&artefact)
        .expect("inspected");

    assert_eq!(codes(&diagnostics), vec![DiagnosticCode::SigningSkipped]);
    assert_eq!(diagnostics[0].severity(), Severity::Warning);
}

#[rstest]
fn validation_and_signing_findings_are_combined(workspace: Workspace) {
    let artefact = workspace.installer("Formula_1.4.0_x64-setup.exe", b"no registrations here");
    let executor = StubExecutor::new(Vec::new());

    let diagnostics = workspace
        .verifier(&executor)
        .verify(&artefact)
        .expect("inspected");

    assert_eq!(
        codes(&diagnostics),
        vec![
            DiagnosticCode::MissingExtension,
            DiagnosticCode::MissingScheme,
            DiagnosticCode::SigningSkipped,
        ]
    );
}

#[rstest]
fn failed_collection_releases_scratch_directory(workspace: Workspace) {
    let artefact = workspace.installer("formula_1.4.0_amd64.deb", b"!<arch>\n");
    let executor = StubExecutor::new(vec![ExpectedCall::new(
        "dpkg-deb",
        &[
            "-f",
            artefact.path().as_str(),
            "Package",
            "Version",
            "Depends",
        ],
        Ok(failure_output("not a Debian format archive")),
    )]);

    let err = workspace
        .verifier(&executor)
        .verify(&artefact)
        .expect_err("collection fails");

    assert!(matches!(err, VerifyError::ExternalTool { .. }));
    assert_eq!(workspace.registry.pending(), 0);
    executor.assert_finished();
}

#[rstest]
#[case::verbose(false, 2)]
#[case::quiet(true, 0)]
fn failed_artefact_does_not_stop_the_run(
    workspace: Workspace,
    #[case] quiet: bool,
    #[case] progress_lines: usize,
) {
    let msi = workspace.installer("Formula_1.4.0_x64_en-US.msi", b"");
    let exe = workspace.installer("Formula_1.4.0_x64-setup.exe", REGISTERED);
    let executor = StubExecutor::new(vec![ExpectedCall::new(
        "msiinfo",
        &["tables", msi.path().as_str()],
        Ok(failure_output("not a valid MSI")),
    )]);
    let mut progress = Vec::new();

    let reports =
        workspace
            .verifier(&executor)
            .verify_all(&[msi, exe], &mut progress, quiet);

    assert_eq!(reports.len(), 2);
    assert!(matches!(reports[0].outcome, Outcome::Failed(_)));
    assert!(matches!(reports[1].outcome, Outcome::Inspected(_)));
    assert!(reports[0].has_errors());
    assert!(!reports[1].has_errors());
    let progress = String::from_utf8(progress).expect("utf-8");
    assert_eq!(progress.lines().count(), progress_lines);
    if !quiet {
        assert!(progress.contains("Inspecting Formula_1.4.0_x64_en-US.msi (msi)..."));
    }
}

fn report(artefact: &str, outcome: Outcome) -> ArtefactReport {
    ArtefactReport {
        artefact: Artefact::from_path(Utf8PathBuf::from(artefact)).expect("known kind"),
        outcome,
    }
}

#[test]
fn warnings_alone_pass_the_run() {
    let run = RunReport {
        requirement_diagnostics: Vec::new(),
        artefacts: vec![report(
            "Formula.dmg",
            Outcome::Inspected(vec![Diagnostic::warning(
                DiagnosticCode::NotarizationSkipped,
                "notarization check skipped",
            )]),
        )],
    };
    assert_eq!(run.exit_code(), 0);
    assert_eq!(run.counts(), (0, 1));
}

#[test]
fn failed_inspection_fails_the_run() {
    let run = RunReport {
        requirement_diagnostics: Vec::new(),
        artefacts: vec![report(
            "Formula.msi",
            Outcome::Failed(VerifyError::ToolMissing {
                tool: "msiinfo".to_owned(),
            }),
        )],
    };
    assert_eq!(run.exit_code(), 1);
    assert_eq!(run.counts(), (1, 0));
}

#[test]
fn configuration_errors_fail_the_run() {
    let run = RunReport {
        requirement_diagnostics: vec![Diagnostic::error(
            DiagnosticCode::AmbiguousMimeType,
            ".csv maps to more than one MIME type",
        )],
        artefacts: Vec::new(),
    };
    assert!(run.has_errors());
    assert_eq!(run.exit_code(), 1);
}
