//! Canonical forms for file extensions, URL schemes, and MIME types.
//!
//! Declared configuration and observed bundle metadata are normalized through
//! the same constructors, so comparisons never depend on case or on how an
//! author happened to punctuate a value.

use std::fmt;
use thiserror::Error;

/// Errors raised when a value cannot be normalized.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The extension was empty after stripping dots and whitespace.
    #[error("empty file extension in {raw:?}")]
    EmptyExtension {
        /// The value as written.
        raw: String,
    },

    /// The extension contains a path separator or whitespace.
    #[error("invalid file extension {raw:?}")]
    InvalidExtension {
        /// The value as written.
        raw: String,
    },

    /// The scheme was empty after normalization.
    #[error("empty URL scheme in {raw:?}")]
    EmptyScheme {
        /// The value as written.
        raw: String,
    },

    /// The scheme still contains `:` or `/` after its trailing separator was
    /// stripped, e.g. `formula://` written where `formula` was meant.
    #[error("URL scheme {raw:?} must be a bare name such as \"formula\", not a URL prefix")]
    InvalidScheme {
        /// The value as written.
        raw: String,
    },

    /// The MIME type is not of the form `type/subtype`.
    #[error("invalid MIME type {raw:?}")]
    InvalidMimeType {
        /// The value as written.
        raw: String,
    },
}

/// A lower-cased file extension without leading dots.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Extension(String);

impl Extension {
    /// Normalizes `raw` into an extension.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::EmptyExtension`] when nothing remains after
    /// stripping, and [`NormalizeError::InvalidExtension`] for values holding
    /// separators or whitespace.
    ///
    /// # Examples
    ///
    /// ```
    /// use shipcheck_common::normalize::Extension;
    ///
    /// let ext = Extension::parse(" .XLSX ")?;
    /// assert_eq!(ext.as_str(), "xlsx");
    /// # Ok::<(), shipcheck_common::normalize::NormalizeError>(())
    /// ```
    pub fn parse(raw: &str) -> Result<Self, NormalizeError> {
        let value = raw.trim().trim_start_matches('.').to_lowercase();
        if value.is_empty() {
            return Err(NormalizeError::EmptyExtension {
                raw: raw.to_owned(),
            });
        }
        if value.contains(['/', '\\', ':']) || value.contains(char::is_whitespace) {
            return Err(NormalizeError::InvalidExtension {
                raw: raw.to_owned(),
            });
        }
        Ok(Self(value))
    }

    /// Returns the normalized extension.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A lower-cased URL scheme name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scheme(String);

impl Scheme {
    /// Normalizes `raw` into a scheme name.
    ///
    /// Surrounding whitespace and one trailing `:` or `/` are removed and the
    /// result is lower-cased. Anything that still contains `:` or `/` is a
    /// URL prefix rather than a scheme name and is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::EmptyScheme`] or
    /// [`NormalizeError::InvalidScheme`].
    ///
    /// # Examples
    ///
    /// ```
    /// use shipcheck_common::normalize::{NormalizeError, Scheme};
    ///
    /// assert_eq!(Scheme::parse("Formula:")?.as_str(), "formula");
    /// assert!(matches!(
    ///     Scheme::parse("formula://"),
    ///     Err(NormalizeError::InvalidScheme { .. })
    /// ));
    /// # Ok::<(), NormalizeError>(())
    /// ```
    pub fn parse(raw: &str) -> Result<Self, NormalizeError> {
        let trimmed = raw.trim();
        let stripped = trimmed
            .strip_suffix([':', '/'])
            .unwrap_or(trimmed)
            .to_lowercase();
        if stripped.is_empty() {
            return Err(NormalizeError::EmptyScheme {
                raw: raw.to_owned(),
            });
        }
        if stripped.contains([':', '/']) {
            return Err(NormalizeError::InvalidScheme {
                raw: raw.to_owned(),
            });
        }
        Ok(Self(stripped))
    }

    /// Returns the normalized scheme.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A lower-cased `type/subtype` MIME type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MimeType(String);

impl MimeType {
    /// Normalizes `raw` into a MIME type, dropping any `;` parameters.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::InvalidMimeType`] unless the value has
    /// exactly one `/` with non-empty halves.
    ///
    /// # Examples
    ///
    /// ```
    /// use shipcheck_common::normalize::MimeType;
    ///
    /// assert_eq!(MimeType::parse("Text/CSV; charset=utf-8")?.as_str(), "text/csv");
    /// # Ok::<(), shipcheck_common::normalize::NormalizeError>(())
    /// ```
    pub fn parse(raw: &str) -> Result<Self, NormalizeError> {
        let essence = raw.split(';').next().unwrap_or_default().trim().to_lowercase();
        let valid = essence
            .split_once('/')
            .is_some_and(|(kind, sub)| !kind.is_empty() && !sub.is_empty() && !sub.contains('/'));
        if !valid || essence.contains(char::is_whitespace) {
            return Err(NormalizeError::InvalidMimeType {
                raw: raw.to_owned(),
            });
        }
        Ok(Self(essence))
    }

    /// Returns the normalized MIME type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the scheme name when this is an `x-scheme-handler/<scheme>`
    /// pseudo type.
    #[must_use]
    pub fn scheme_handler(&self) -> Option<&str> {
        self.0.strip_prefix("x-scheme-handler/")
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("xlsx", "xlsx")]
    #[case::dotted(".xlsx", "xlsx")]
    #[case::double_dotted("..CSV", "csv")]
    #[case::padded("  Parquet ", "parquet")]
    fn normalizes_extensions(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(Extension::parse(raw).expect("valid").as_str(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::dots_only("..")]
    fn rejects_empty_extensions(#[case] raw: &str) {
        assert!(matches!(
            Extension::parse(raw),
            Err(NormalizeError::EmptyExtension { .. })
        ));
    }

    #[rstest]
    #[case::path("tar/gz")]
    #[case::space("tar gz")]
    fn rejects_invalid_extensions(#[case] raw: &str) {
        assert!(matches!(
            Extension::parse(raw),
            Err(NormalizeError::InvalidExtension { .. })
        ));
    }

    #[rstest]
    #[case::bare("formula", "formula")]
    #[case::upper("FORMULA", "formula")]
    #[case::trailing_colon("formula:", "formula")]
    #[case::trailing_slash("formula/", "formula")]
    #[case::dashed("formula-beta", "formula-beta")]
    fn normalizes_schemes(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(Scheme::parse(raw).expect("valid").as_str(), expected);
    }

    #[rstest]
    #[case::url_prefix("formula://")]
    #[case::colon_slash("formula:/")]
    #[case::embedded("form:ula")]
    #[case::path("formula/open")]
    fn rejects_url_prefixes_as_schemes(#[case] raw: &str) {
        assert!(matches!(
            Scheme::parse(raw),
            Err(NormalizeError::InvalidScheme { .. })
        ));
    }

    #[test]
    fn rejects_empty_scheme() {
        assert!(matches!(
            Scheme::parse(" : "),
            Err(NormalizeError::EmptyScheme { .. })
        ));
    }

    #[rstest]
    #[case::no_slash("textcsv")]
    #[case::empty_subtype("text/")]
    #[case::two_slashes("a/b/c")]
    fn rejects_invalid_mime_types(#[case] raw: &str) {
        assert!(MimeType::parse(raw).is_err());
    }

    #[test]
    fn recognizes_scheme_handler_pseudo_types() {
        let mime = MimeType::parse("x-scheme-handler/formula").expect("valid");
        assert_eq!(mime.scheme_handler(), Some("formula"));
        let plain = MimeType::parse("text/csv").expect("valid");
        assert_eq!(plain.scheme_handler(), None);
    }
}
