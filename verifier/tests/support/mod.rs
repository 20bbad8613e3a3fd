//! Test support utilities for verifier behavioural tests.
//!
//! Builds configuration text and bundle fixtures on disk so scenarios can
//! drive the real extraction and collection code.

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;

/// Product identity shared by every fixture.
pub const IDENTIFIER: &str = "com.example.formula";
/// Release version shared by every fixture.
pub const VERSION: &str = "1.4.0";
/// Product name shared by every fixture.
pub const PRODUCT: &str = "Formula";

/// Builds packaging-config JSON with the given associations and schemes.
///
/// Each association is a list of extensions with an optional MIME type.
pub fn config_json(associations: &[(&[&str], Option<&str>)], schemes: &[&str]) -> String {
    let associations: Vec<_> = associations
        .iter()
        .map(|(extensions, mime)| match mime {
            Some(mime) => json!({ "ext": extensions, "mimeType": mime }),
            None => json!({ "ext": extensions }),
        })
        .collect();
    json!({
        "identifier": IDENTIFIER,
        "version": VERSION,
        "productName": PRODUCT,
        "mainBinaryName": "formula",
        "bundle": { "fileAssociations": associations },
        "plugins": { "deep-link": { "desktop": { "schemes": schemes } } },
    })
    .to_string()
}

/// Wraps `body` in an `Info.plist` carrying the fixture identity.
pub fn info_plist(body: &str) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<plist version=\"1.0\">\n<dict>\n",
            "  <key>CFBundleIdentifier</key><string>{}</string>\n",
            "  <key>CFBundleShortVersionString</key><string>{}</string>\n",
            "  <key>CFBundleName</key><string>{}</string>\n",
            "  <key>CFBundleExecutable</key><string>formula</string>\n",
            "{}\n</dict>\n</plist>\n"
        ),
        IDENTIFIER, VERSION, PRODUCT, body
    )
}

/// `CFBundleURLTypes` declaring `scheme`.
pub fn url_types(scheme: &str) -> String {
    format!(
        "<key>CFBundleURLTypes</key><array><dict>\
         <key>CFBundleURLSchemes</key><array><string>{scheme}</string></array>\
         </dict></array>"
    )
}

/// A document type listing `extension` directly.
pub fn direct_document_type(extension: &str) -> String {
    format!(
        "<key>CFBundleDocumentTypes</key><array><dict>\
         <key>CFBundleTypeExtensions</key><array><string>{extension}</string></array>\
         </dict></array>"
    )
}

/// A document type naming `identifier`, optionally with an exported type
/// declaration that gives it `extension`.
pub fn content_type_document(identifier: &str, extension: Option<&str>) -> String {
    let mut body = format!(
        "<key>CFBundleDocumentTypes</key><array><dict>\
         <key>LSItemContentTypes</key><array><string>{identifier}</string></array>\
         </dict></array>"
    );
    if let Some(extension) = extension {
        body.push_str(&format!(
            "<key>UTExportedTypeDeclarations</key><array><dict>\
             <key>UTTypeIdentifier</key><string>{identifier}</string>\
             <key>UTTypeTagSpecification</key><dict>\
             <key>public.filename-extension</key><array><string>{extension}</string></array>\
             </dict></dict></array>"
        ));
    }
    body
}

/// Writes `Formula.app.tar.gz` under `dir` holding `Formula.app` with the
/// given `Info.plist` and returns its path.
pub fn write_app_tarball(dir: &Utf8Path, info_plist: &str) -> Utf8PathBuf {
    let path = dir.join("Formula.app.tar.gz");
    let output = std::fs::File::create(&path).expect("create archive");
    let mut builder = tar::Builder::new(GzEncoder::new(output, Compression::fast()));
    let entries: [(&str, &[u8]); 2] = [
        ("Formula.app/Contents/Info.plist", info_plist.as_bytes()),
        ("Formula.app/Contents/MacOS/formula", b"\x7fELF"),
    ];
    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents)
            .expect("append entry");
    }
    let encoder = builder.into_inner().expect("finish tar");
    encoder.finish().expect("finish gzip");
    path
}
