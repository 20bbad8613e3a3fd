//! Behaviour-driven tests for end-to-end artefact verification.
//!
//! Bundles are built as real `.app.tar.gz` archives and verified through the
//! production extractor and collectors. Signing credentials are never set,
//! so no external tool is invoked.

mod support;

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use shipcheck_common::Diagnostic;
use shipcheck_verifier::artefact::Artefact;
use shipcheck_verifier::config::{ConfigError, PackagingConfig};
use shipcheck_verifier::lifecycle::acquire;
use shipcheck_verifier::lifecycle::extraction::GzipTarExtractor;
use shipcheck_verifier::lifecycle::resource::CleanupRegistry;
use shipcheck_verifier::pipeline::{Outcome, RunReport, Verifier};
use shipcheck_verifier::requirement::RequirementModel;
use shipcheck_verifier::signing::SigningEnvironment;
use shipcheck_verifier::test_utils::StubExecutor;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

struct VerificationWorld {
    dir: TempDir,
    config: String,
    info_plist: Option<String>,
    config_error: Option<ConfigError>,
    report: Option<RunReport>,
    package: Option<Artefact>,
    scratch: Option<Utf8PathBuf>,
    second_release: Option<usize>,
}

#[fixture]
fn world() -> VerificationWorld {
    VerificationWorld {
        dir: tempfile::tempdir().expect("temp dir"),
        config: String::new(),
        info_plist: None,
        config_error: None,
        report: None,
        package: None,
        scratch: None,
        second_release: None,
    }
}

fn root(world: &VerificationWorld) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(world.dir.path().to_path_buf()).expect("utf-8 temp dir")
}

fn load(world: &VerificationWorld) -> Result<RequirementModel, ConfigError> {
    let config = PackagingConfig::from_json(&root(world).join("tauri.conf.json"), &world.config)?;
    RequirementModel::from_config(&config, &root(world))
}

fn report(world: &VerificationWorld) -> &RunReport {
    world.report.as_ref().expect("bundle verified")
}

fn errors(world: &VerificationWorld) -> Vec<&Diagnostic> {
    let report = report(world);
    let mut found: Vec<&Diagnostic> = report
        .requirement_diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.is_error())
        .collect();
    for artefact in &report.artefacts {
        match &artefact.outcome {
            Outcome::Inspected(diagnostics) => {
                found.extend(diagnostics.iter().filter(|diagnostic| diagnostic.is_error()));
            }
            Outcome::Failed(err) => panic!("{} was not inspected: {err}", artefact.artefact),
        }
    }
    found
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a packaging config requiring extension \"{extension}\" and scheme \"{scheme}\"")]
fn given_config(world: &mut VerificationWorld, extension: String, scheme: String) {
    world.config = support::config_json(&[(&[extension.as_str()], None)], &[scheme.as_str()]);
}

#[given("a packaging config mapping \"{extension}\" to \"{first}\" and \"{second}\"")]
fn given_conflicting_config(
    world: &mut VerificationWorld,
    extension: String,
    first: String,
    second: String,
) {
    world.config = support::config_json(
        &[
            (&[extension.as_str()], Some(first.as_str())),
            (&[extension.as_str()], Some(second.as_str())),
        ],
        &["formula"],
    );
}

#[given("a bundle registering extension \"{extension}\" and scheme \"{scheme}\"")]
fn given_direct_bundle(world: &mut VerificationWorld, extension: String, scheme: String) {
    let body = format!(
        "{}\n{}",
        support::direct_document_type(&extension),
        support::url_types(&scheme)
    );
    world.info_plist = Some(support::info_plist(&body));
}

#[given("a bundle reaching \"{extension}\" through content type \"{identifier}\"")]
fn given_indirect_bundle(world: &mut VerificationWorld, extension: String, identifier: String) {
    let body = format!(
        "{}\n{}",
        support::content_type_document(&identifier, Some(&extension)),
        support::url_types("formula")
    );
    world.info_plist = Some(support::info_plist(&body));
}

#[given("a bundle referencing content type \"{identifier}\" without declaring it")]
fn given_unresolved_bundle(world: &mut VerificationWorld, identifier: String) {
    let body = format!(
        "{}\n{}",
        support::content_type_document(&identifier, None),
        support::url_types("formula")
    );
    world.info_plist = Some(support::info_plist(&body));
}

#[given("a Debian package acquired for inspection")]
fn given_debian_package(world: &mut VerificationWorld) {
    let path = root(world).join("formula_1.4.0_amd64.deb");
    std::fs::write(&path, b"!<arch>\n").expect("write package");
    world.package = Some(Artefact::from_path(path).expect("deb"));
}

#[when("the bundle is verified")]
fn when_bundle_verified(world: &mut VerificationWorld) {
    let requirement = load(world).expect("valid config");
    let plist = world.info_plist.as_deref().expect("bundle defined");
    let tarball = support::write_app_tarball(&root(world), plist);
    let artefact = Artefact::from_path(tarball).expect("bundle tarball");

    let executor = StubExecutor::new(Vec::new());
    let registry = CleanupRegistry::new();
    let signing = SigningEnvironment::default();
    let verifier = Verifier {
        requirement: &requirement,
        executor: &executor,
        registry: &registry,
        extractor: &GzipTarExtractor,
        signing: &signing,
    };
    let mut progress = Vec::new();
    let report = verifier.run(&[artefact], &mut progress, true);
    assert_eq!(registry.pending(), 0);
    world.report = Some(report);
}

#[when("the packaging config is loaded")]
fn when_config_loaded(world: &mut VerificationWorld) {
    world.config_error = load(world).err();
}

#[when("its resources are released twice")]
fn when_released_twice(world: &mut VerificationWorld) {
    let package = world.package.as_ref().expect("package defined");
    let executor = StubExecutor::new(Vec::new());
    let registry = CleanupRegistry::new();

    let acquired = acquire(package, &executor, &registry, &GzipTarExtractor).expect("scratch");
    let scratch = acquired.root().to_owned();
    assert!(scratch.is_dir());
    acquired.release();
    registry.release_all(&executor);

    world.scratch = Some(scratch);
    world.second_release = Some(registry.release_all(&executor));
}

#[then("no error is reported")]
fn then_no_error(world: &mut VerificationWorld) {
    let errors = errors(world);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

#[then("exactly one \"{code}\" error is reported")]
fn then_one_error(world: &mut VerificationWorld, code: String) {
    let errors = errors(world);
    assert_eq!(errors.len(), 1, "errors: {errors:?}");
    assert_eq!(errors[0].code().as_str(), code);
}

#[then("the error names \"{text}\"")]
fn then_error_names(world: &mut VerificationWorld, text: String) {
    let errors = errors(world);
    let rendered = errors[0].to_string();
    assert!(rendered.contains(&text), "{rendered}");
}

#[then("the run exits with status {status}")]
fn then_exit_status(world: &mut VerificationWorld, status: i32) {
    assert_eq!(report(world).exit_code(), status);
}

#[then("no artefact is inspected")]
fn then_nothing_inspected(world: &mut VerificationWorld) {
    assert!(report(world).artefacts.is_empty());
}

#[then("loading fails with an invalid scheme error")]
fn then_invalid_scheme(world: &mut VerificationWorld) {
    let err = world.config_error.as_ref().expect("loading failed");
    assert!(matches!(err, ConfigError::InvalidScheme { .. }), "{err}");
}

#[then("the scratch directory is gone")]
fn then_scratch_gone(world: &mut VerificationWorld) {
    let scratch = world.scratch.as_ref().expect("released");
    assert!(!scratch.exists());
}

#[then("the second release finds nothing to do")]
fn then_nothing_left(world: &mut VerificationWorld) {
    assert_eq!(world.second_release, Some(0));
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/verification.feature",
    name = "A bundle registering every requirement passes"
)]
fn scenario_bundle_passes(world: VerificationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/verification.feature",
    name = "A bundle missing a required extension fails"
)]
fn scenario_missing_extension(world: VerificationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/verification.feature",
    name = "An extension reached through a content type is registered"
)]
fn scenario_indirect_extension(world: VerificationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/verification.feature",
    name = "A content type that declares no extension does not register one"
)]
fn scenario_unresolved_content_type(world: VerificationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/verification.feature",
    name = "A scheme absent from the bundle is reported"
)]
fn scenario_missing_scheme(world: VerificationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/verification.feature",
    name = "A URL prefix is rejected as a scheme"
)]
fn scenario_url_prefix_rejected(world: VerificationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/verification.feature",
    name = "Conflicting MIME types stop the run before inspection"
)]
fn scenario_conflicting_mime(world: VerificationWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/verification.feature",
    name = "Releasing resources twice is harmless"
)]
fn scenario_idempotent_release(world: VerificationWorld) {
    let _ = world;
}
