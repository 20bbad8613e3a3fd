//! Errors raised while scanning property-list documents.

use crate::span::SourceLocation;
use thiserror::Error;

/// Errors that make a document unusable for fact extraction.
///
/// A key that is simply absent is not an error; extraction methods return
/// `Ok(None)` or an empty list for that case.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// The document lacks the structural markers every property list carries.
    #[error("malformed document: {reason}")]
    Malformed {
        /// Which marker was missing.
        reason: String,
    },

    /// An element was opened but never closed.
    #[error("unbalanced <{element}> element opened at {location}")]
    Unbalanced {
        /// Name of the element whose closing tag is missing.
        element: String,
        /// Position of the opening tag.
        location: SourceLocation,
    },

    /// A comment was opened but never closed.
    #[error("unterminated comment opened at {location}")]
    UnterminatedComment {
        /// Position of the `<!--` marker.
        location: SourceLocation,
    },
}

impl DocumentError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Returns the document position associated with the error, if any.
    #[must_use]
    pub const fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::Malformed { .. } => None,
            Self::Unbalanced { location, .. } | Self::UnterminatedComment { location } => {
                Some(*location)
            }
        }
    }
}
