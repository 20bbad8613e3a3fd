//! Fact extraction from property-list documents.
//!
//! Property lists are small, and the only structural feature that matters for
//! verification is how `<array>` and `<dict>` elements nest. Rather than
//! building a DOM, this module scans the text with a depth counter (see
//! `scan`) and hands out [`Block`] views: borrowed spans of the document that
//! can be queried for keyed values, nested blocks, and leaf strings.
//!
//! Comments are blanked before any scanning, so a declaration an author has
//! commented out is never reported as present.
//!
//! # Examples
//!
//! ```
//! use shipcheck_common::document::PlistDocument;
//!
//! let doc = PlistDocument::parse(r#"<plist version="1.0"><dict>
//!     <key>CFBundleURLTypes</key>
//!     <array><dict>
//!         <key>CFBundleURLSchemes</key><array><string>formula</string></array>
//!     </dict></array>
//! </dict></plist>"#)?;
//!
//! let url_types = doc.root().array("CFBundleURLTypes")?.expect("declared");
//! assert_eq!(url_types.strings(), vec!["formula"]);
//! # Ok::<(), shipcheck_common::document::DocumentError>(())
//! ```

mod error;
pub(crate) mod scan;

pub use error::DocumentError;

use crate::span::SourceLocation;
use scan::OpenTag;

/// A comment-free property-list document with a located top-level `<dict>`.
#[derive(Clone, Debug)]
pub struct PlistDocument {
    source: String,
    root_start: usize,
    root_end: usize,
}

impl PlistDocument {
    /// Parses `text`, blanking comments and locating the top-level dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Malformed`] when the `<plist>` opening tag or
    /// the top-level `<dict>` is missing, [`DocumentError::Unbalanced`] when
    /// the top-level dictionary never closes, and
    /// [`DocumentError::UnterminatedComment`] for an unclosed comment.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let source = scan::blank_comments(text).map_err(|offset| {
            DocumentError::UnterminatedComment {
                location: SourceLocation::from_offset(text, offset),
            }
        })?;

        let plist = find_named_tag(&source, "plist")
            .ok_or_else(|| DocumentError::malformed("missing <plist> opening tag"))?;
        if plist.self_closing {
            return Err(DocumentError::malformed("empty <plist> element"));
        }

        let root = scan::next_open_tag(&source, plist.end, source.len())
            .filter(|tag| tag.name == "dict")
            .ok_or_else(|| DocumentError::malformed("missing top-level <dict>"))?;
        let root_end = scan::element_end(&source, &root, source.len())
            .ok_or_else(|| unbalanced(&source, &root))?;

        Ok(Self {
            root_start: root.start,
            root_end,
            source,
        })
    }

    /// Returns the top-level dictionary.
    #[must_use]
    pub fn root(&self) -> Block<'_> {
        Block {
            source: &self.source,
            start: self.root_start,
            end: self.root_end,
        }
    }

    /// Returns the comment-blanked document text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.source
    }
}

fn find_named_tag<'a>(source: &'a str, name: &str) -> Option<OpenTag<'a>> {
    let mut cursor = 0;
    while let Some(tag) = scan::next_open_tag(source, cursor, source.len()) {
        if tag.name == name {
            return Some(tag);
        }
        cursor = tag.end;
    }
    None
}

fn unbalanced(source: &str, tag: &OpenTag<'_>) -> DocumentError {
    DocumentError::Unbalanced {
        element: tag.name.to_owned(),
        location: SourceLocation::from_offset(source, tag.start),
    }
}

/// A borrowed element span within a [`PlistDocument`].
///
/// Queries on a block only look inside its span, so sibling blocks that use
/// the same key names never leak into the result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block<'a> {
    source: &'a str,
    start: usize,
    end: usize,
}

impl<'a> Block<'a> {
    /// Returns the full text of the block, including its own tags.
    #[must_use]
    pub fn text(&self) -> &'a str {
        &self.source[self.start..self.end]
    }

    /// Returns the element name of the block (`dict`, `array`, ...).
    #[must_use]
    pub fn name(&self) -> &'a str {
        scan::open_tag_at(self.source, self.start).map_or("", |tag| tag.name)
    }

    /// Returns where the block starts in the document.
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        SourceLocation::from_offset(self.source, self.start)
    }

    /// Returns the scalar value that directly follows the first `key` marker.
    ///
    /// `<string>`, `<integer>`, `<real>`, and `<date>` yield their decoded
    /// text; `<true/>` and `<false/>` yield `"true"` and `"false"`. When the
    /// key is absent or is followed by a container, the result is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unbalanced`] if the value never closes.
    pub fn scalar(&self, key: &str) -> Result<Option<String>, DocumentError> {
        let Some((tag, end)) = self.value_after_first(key)? else {
            return Ok(None);
        };
        Ok(scalar_text(self.source, &tag, end))
    }

    /// Returns the array that directly follows the first `key` marker.
    ///
    /// The span covers the entire array, nested arrays included.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unbalanced`] if the array never closes.
    pub fn array(&self, key: &str) -> Result<Option<Self>, DocumentError> {
        self.container_after_first(key, "array")
    }

    /// Returns the dictionary that directly follows the first `key` marker.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unbalanced`] if the dictionary never closes.
    pub fn dict(&self, key: &str) -> Result<Option<Self>, DocumentError> {
        self.container_after_first(key, "dict")
    }

    /// Returns every array that directly follows a `key` marker, in document
    /// order.
    ///
    /// Scanning resumes after each matched array, so a same-named key nested
    /// inside a matched array is not reported a second time.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unbalanced`] if any matched array never
    /// closes.
    pub fn arrays(&self, key: &str) -> Result<Vec<Self>, DocumentError> {
        let mut found = Vec::new();
        let mut cursor = self.start;
        while let Some((_, marker_end)) = scan::find_key(self.source, key, cursor, self.end) {
            cursor = marker_end;
            let Some(tag) = scan::following_open_tag(self.source, marker_end, self.end) else {
                continue;
            };
            if tag.name != "array" {
                continue;
            }
            let block = self.span_of(&tag)?;
            cursor = block.end;
            found.push(block);
        }
        Ok(found)
    }

    /// Returns the direct children of this block, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unbalanced`] if a child never closes.
    pub fn children(&self) -> Result<Vec<Self>, DocumentError> {
        let Some(own) = scan::open_tag_at(self.source, self.start) else {
            return Ok(Vec::new());
        };
        if own.self_closing {
            return Ok(Vec::new());
        }

        let mut children = Vec::new();
        let mut cursor = own.end;
        while let Some(tag) = scan::next_open_tag(self.source, cursor, self.end) {
            let child = self.span_of(&tag)?;
            cursor = child.end;
            children.push(child);
        }
        Ok(children)
    }

    /// Returns the direct child dictionaries of this block.
    ///
    /// Applied to an array of records, this yields one block per record and
    /// ignores dictionaries nested more deeply inside each record.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unbalanced`] if a child never closes.
    pub fn child_dicts(&self) -> Result<Vec<Self>, DocumentError> {
        Ok(self
            .children()?
            .into_iter()
            .filter(|child| child.name() == "dict")
            .collect())
    }

    /// Returns the key names declared directly in this dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Unbalanced`] if a child never closes.
    pub fn keys(&self) -> Result<Vec<String>, DocumentError> {
        Ok(self
            .children()?
            .into_iter()
            .filter(|child| child.name() == "key")
            .map(|child| {
                let tag = scan::open_tag_at(child.source, child.start);
                tag.and_then(|t| scalar_text(child.source, &t, child.end))
                    .unwrap_or_default()
            })
            .collect())
    }

    /// Returns every `<string>` value inside the block, in document order.
    #[must_use]
    pub fn strings(&self) -> Vec<String> {
        let mut values = Vec::new();
        let mut cursor = self.start;
        while let Some(tag) = scan::next_open_tag(self.source, cursor, self.end) {
            cursor = tag.end;
            if tag.name != "string" {
                continue;
            }
            if tag.self_closing {
                values.push(String::new());
                continue;
            }
            let Some(close) = self.source[tag.end..self.end].find("</string>") else {
                break;
            };
            let body = &self.source[tag.end..tag.end + close];
            values.push(scan::decode_entities(body));
            cursor = tag.end + close + "</string>".len();
        }
        values
    }

    fn span_of(&self, tag: &OpenTag<'_>) -> Result<Self, DocumentError> {
        let end = scan::element_end(self.source, tag, self.end)
            .ok_or_else(|| unbalanced(self.source, tag))?;
        Ok(Self {
            source: self.source,
            start: tag.start,
            end,
        })
    }

    fn value_after_first(&self, key: &str) -> Result<Option<(OpenTag<'a>, usize)>, DocumentError> {
        let Some((_, marker_end)) = scan::find_key(self.source, key, self.start, self.end) else {
            return Ok(None);
        };
        let Some(tag) = scan::following_open_tag(self.source, marker_end, self.end) else {
            return Ok(None);
        };
        let end = scan::element_end(self.source, &tag, self.end)
            .ok_or_else(|| unbalanced(self.source, &tag))?;
        Ok(Some((tag, end)))
    }

    fn container_after_first(&self, key: &str, element: &str) -> Result<Option<Self>, DocumentError> {
        Ok(self
            .value_after_first(key)?
            .filter(|(tag, _)| tag.name == element)
            .map(|(tag, end)| Self {
                source: self.source,
                start: tag.start,
                end,
            }))
    }
}

fn scalar_text(source: &str, tag: &OpenTag<'_>, end: usize) -> Option<String> {
    match tag.name {
        "true" | "false" => Some(tag.name.to_owned()),
        "string" | "integer" | "real" | "date" | "key" => {
            if tag.self_closing {
                return Some(String::new());
            }
            let close_len = tag.name.len() + "</>".len();
            let body = source.get(tag.end..end.checked_sub(close_len)?)?;
            Some(scan::decode_entities(body.trim()))
        }
        _ => None,
    }
}
