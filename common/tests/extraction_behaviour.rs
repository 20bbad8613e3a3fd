//! Behaviour-driven tests for property-list extraction.
//!
//! Tests use the rstest-bdd v0.5.0 mutable world pattern.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use shipcheck_common::document::{DocumentError, PlistDocument};

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ExtractionWorld {
    text: String,
    strings: Option<Vec<String>>,
    array_found: Option<bool>,
    record_schemes: Vec<Vec<String>>,
}

#[fixture]
fn world() -> ExtractionWorld {
    ExtractionWorld::default()
}

fn wrap(body: &str) -> String {
    format!("<?xml version=\"1.0\"?>\n<plist version=\"1.0\">\n<dict>\n{body}\n</dict>\n</plist>\n")
}

fn parse(world: &ExtractionWorld) -> PlistDocument {
    PlistDocument::parse(&world.text).expect("fixture document parses")
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a property list where \"Outer\" holds an array containing nested arrays")]
fn given_nested_arrays(world: &mut ExtractionWorld) {
    world.text = wrap(concat!(
        "<key>Outer</key>\n",
        "<array>\n",
        "  <array><string>a</string></array>\n",
        "  <array><array><string>b</string></array></array>\n",
        "  <string>c</string>\n",
        "</array>\n",
        "<key>Outer</key>\n",
        "<array><string>ignored</string></array>\n",
    ));
}

#[given("a property list with two URL type records")]
fn given_two_url_types(world: &mut ExtractionWorld) {
    world.text = wrap(concat!(
        "<key>CFBundleURLTypes</key>\n",
        "<array>\n",
        "  <dict><key>CFBundleURLSchemes</key><array><string>formula</string></array></dict>\n",
        "  <dict><key>CFBundleURLSchemes</key><array><string>formula-beta</string></array></dict>\n",
        "</array>\n",
    ));
}

#[given("a property list whose URL types are commented out")]
fn given_commented_url_types(world: &mut ExtractionWorld) {
    world.text = wrap(concat!(
        "<!-- local debugging only\n",
        "<key>CFBundleURLTypes</key>\n",
        "<array><dict><key>CFBundleURLSchemes</key><array><string>debug</string></array></dict></array>\n",
        "-->\n",
        "<key>CFBundleName</key><string>Formula</string>\n",
    ));
}

#[given("text without a property-list root")]
fn given_not_a_plist(world: &mut ExtractionWorld) {
    world.text = "<html><body>404 Not Found</body></html>".to_owned();
}

#[when("the array after key \"{key}\" is extracted")]
fn when_array_extracted(world: &mut ExtractionWorld, key: String) {
    let doc = parse(world);
    let array = doc.root().array(&key).expect("balanced document");
    world.array_found = Some(array.is_some());
    world.strings = array.map(|block| block.strings());
}

#[when("each URL type record is read")]
fn when_records_read(world: &mut ExtractionWorld) {
    let doc = parse(world);
    let url_types = doc
        .root()
        .array("CFBundleURLTypes")
        .expect("balanced document")
        .expect("URL types declared");
    world.record_schemes = url_types
        .child_dicts()
        .expect("balanced records")
        .iter()
        .map(|record| {
            record
                .array("CFBundleURLSchemes")
                .expect("balanced record")
                .map(|block| block.strings())
                .unwrap_or_default()
        })
        .collect();
}

#[then("the extracted strings are \"{expected}\"")]
fn then_strings_are(world: &mut ExtractionWorld, expected: String) {
    let strings = world.strings.as_ref().expect("array extracted");
    let expected: Vec<&str> = expected.split(',').collect();
    assert_eq!(strings, &expected);
}

#[then("the records declare schemes \"{first}\" and \"{second}\"")]
fn then_records_declare(world: &mut ExtractionWorld, first: String, second: String) {
    assert_eq!(world.record_schemes, vec![vec![first], vec![second]]);
}

#[then("no array is found")]
fn then_no_array(world: &mut ExtractionWorld) {
    assert_eq!(world.array_found, Some(false));
}

#[then("parsing fails as a malformed document")]
fn then_malformed(world: &mut ExtractionWorld) {
    let err = PlistDocument::parse(&world.text).expect_err("expected parse failure");
    assert!(matches!(err, DocumentError::Malformed { .. }), "{err}");
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/document_extraction.feature",
    name = "Nested arrays are returned whole"
)]
fn scenario_nested_arrays(world: ExtractionWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/document_extraction.feature",
    name = "Sibling keys with the same name do not leak"
)]
fn scenario_sibling_keys(world: ExtractionWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/document_extraction.feature",
    name = "Commented declarations are not reported"
)]
fn scenario_commented_declarations(world: ExtractionWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/document_extraction.feature",
    name = "Documents without structural markers are rejected"
)]
fn scenario_malformed_document(world: ExtractionWorld) {
    let _ = world;
}
