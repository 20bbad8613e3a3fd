//! Reader for shared-MIME-info package fragments.
//!
//! A Linux package that introduces a MIME type ships an XML fragment under
//! `/usr/share/mime/packages/`. Only two things in it matter for
//! verification: which types it declares and which filename globs map to
//! each. Both are read with the same tag scanner the property-list reader
//! uses.
//!
//! # Examples
//!
//! ```
//! use shipcheck_common::mime_info::MimeFragment;
//!
//! let fragment = MimeFragment::parse(r#"<mime-info>
//!   <mime-type type="application/vnd.apache.parquet">
//!     <glob pattern="*.parquet"/>
//!   </mime-type>
//! </mime-info>"#)?;
//! assert_eq!(fragment.types().count(), 1);
//! # Ok::<(), shipcheck_common::document::DocumentError>(())
//! ```

use crate::document::DocumentError;
use crate::document::scan::{self, OpenTag};
use crate::normalize::{Extension, MimeType};
use crate::span::SourceLocation;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// MIME types and the extensions their simple `*.ext` globs name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MimeFragment {
    types: BTreeMap<MimeType, BTreeSet<Extension>>,
}

impl MimeFragment {
    /// Parses a fragment.
    ///
    /// Types with an unparseable `type` attribute and globs that are not of
    /// the form `*.ext` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnterminatedComment`] for an unclosed comment
    /// and [`DocumentError::Unbalanced`] when a `<mime-type>` element never
    /// closes.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let source = scan::blank_comments(text).map_err(|offset| {
            DocumentError::UnterminatedComment {
                location: SourceLocation::from_offset(text, offset),
            }
        })?;

        let mut types: BTreeMap<MimeType, BTreeSet<Extension>> = BTreeMap::new();
        let mut cursor = 0;
        while let Some(tag) = scan::next_open_tag(&source, cursor, source.len()) {
            if tag.name != "mime-type" {
                cursor = tag.end;
                continue;
            }
            let end = scan::element_end(&source, &tag, source.len()).ok_or_else(|| {
                DocumentError::Unbalanced {
                    element: tag.name.to_owned(),
                    location: SourceLocation::from_offset(&source, tag.start),
                }
            })?;
            cursor = end;

            let Some(raw) = attribute(&source, &tag, "type") else {
                continue;
            };
            let mime = match MimeType::parse(&raw) {
                Ok(mime) => mime,
                Err(err) => {
                    debug!("skipping fragment type: {err}");
                    continue;
                }
            };
            let extensions = types.entry(mime).or_default();
            extensions.extend(globbed_extensions(&source, tag.end, end));
        }
        Ok(Self { types })
    }

    /// Declared types with their globbed extensions.
    pub fn types(&self) -> impl Iterator<Item = (&MimeType, &BTreeSet<Extension>)> {
        self.types.iter()
    }
}

fn globbed_extensions(source: &str, from: usize, limit: usize) -> Vec<Extension> {
    let mut found = Vec::new();
    let mut cursor = from;
    while let Some(tag) = scan::next_open_tag(source, cursor, limit) {
        cursor = tag.end;
        if tag.name != "glob" {
            continue;
        }
        let extension = attribute(source, &tag, "pattern")
            .as_deref()
            .and_then(|pattern| pattern.strip_prefix("*."))
            .filter(|rest| !rest.contains(['*', '?', '[']))
            .and_then(|rest| Extension::parse(rest).ok());
        if let Some(extension) = extension {
            found.push(extension);
        }
    }
    found
}

/// Reads `name="value"` (or single-quoted) from an opening tag.
fn attribute(source: &str, tag: &OpenTag<'_>, name: &str) -> Option<String> {
    let body = source.get(tag.start + 1 + tag.name.len()..tag.end)?;
    let mut rest = body;
    while let Some(found) = rest.find(name) {
        let preceded_by_space = rest[..found]
            .chars()
            .next_back()
            .is_none_or(char::is_whitespace);
        let after = rest[found + name.len()..].trim_start();
        rest = &rest[found + name.len()..];
        if !preceded_by_space {
            continue;
        }
        let Some(value) = after.strip_prefix('=').map(str::trim_start) else {
            continue;
        };
        let quote = value.chars().next().filter(|ch| matches!(ch, '"' | '\''))?;
        let inner = &value[1..];
        let close = inner.find(quote)?;
        return Some(scan::decode_entities(&inner[..close]));
    }
    None
}
