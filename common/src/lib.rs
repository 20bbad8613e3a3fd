//! Shared extraction and reporting primitives for shipcheck.
//!
//! This crate holds everything that does not depend on a particular platform
//! or on how artefacts are acquired: the property-list scanner, readers for
//! installer-database tables, `.desktop` entries and MIME fragments, value
//! normalization, and the diagnostic model.

pub mod desktop_entry;
pub mod diagnostics;
pub mod document;
pub mod mime_info;
pub mod normalize;
pub mod span;
pub mod table;

pub use desktop_entry::DesktopEntry;
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity, has_errors};
pub use document::{Block, DocumentError, PlistDocument};
pub use mime_info::MimeFragment;
pub use normalize::{Extension, MimeType, NormalizeError, Scheme};
pub use span::SourceLocation;
pub use table::{QueryTable, TableError};
