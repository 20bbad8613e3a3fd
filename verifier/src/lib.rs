//! Release-artefact verification for packaged desktop applications.
//!
//! This crate inspects built installers and confirms that what they
//! register matches the packaging configuration. It is used by the
//! `shipcheck` CLI binary and can be driven programmatically, with external
//! tools injected through [`command::CommandExecutor`].
//!
//! # Modules
//!
//! - [`artefact`] - Installer kinds, variants and platforms
//! - [`cli`] - Command-line argument definitions
//! - [`collect`] - Per-platform fact collectors
//! - [`command`] - External tool execution
//! - [`config`] - Packaging configuration loading
//! - [`error`] - Error types and the crate `Result` alias
//! - [`facts`] - Facts observed in an artefact
//! - [`lifecycle`] - Discovery, acquisition and release of artefacts
//! - [`output`] - Report rendering
//! - [`pipeline`] - Verification run orchestration
//! - [`requirement`] - Declared expectations built from the configuration
//! - [`signing`] - Signature and notarization checks
//! - [`validate`] - Cross-reference validation

pub mod artefact;
pub mod cli;
pub mod collect;
pub mod command;
pub mod config;
pub mod error;
pub mod facts;
pub mod lifecycle;
pub mod output;
pub mod pipeline;
pub mod requirement;
pub mod signing;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod validate;
