//! CLI argument definitions for `shipcheck`.
//!
//! The binary stays a thin orchestration layer; everything parsed here is
//! plain data handed to the library.

use crate::artefact::Platform;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;

/// Verify packaged desktop installers against their packaging config.
#[derive(Parser, Debug)]
#[command(name = "shipcheck")]
#[command(version, about)]
#[command(long_about = concat!(
    "Verify packaged desktop installers against their packaging config.\n\n",
    "shipcheck inspects built installers (.dmg, .app.tar.gz, .msi, NSIS .exe, ",
    ".deb, .rpm) and confirms that file associations, URL schemes, identity, ",
    "compliance files and signatures match what tauri.conf.json declares. ",
    "It never modifies the artefacts.",
))]
#[command(after_help = concat!(
    "EXIT STATUS:\n",
    "  0  every required check passed (warnings permitted)\n",
    "  1  an error finding, or the run could not start\n\n",
    "EXAMPLES:\n",
    "  Verify every installer built for the host platform:\n",
    "    $ shipcheck verify\n\n",
    "  Verify one disk image:\n",
    "    $ shipcheck verify --artefact src-tauri/target/release/bundle/dmg/Formula.dmg\n\n",
    "  Verify Linux packages from a cross-build tree:\n",
    "    $ shipcheck verify --platform linux --target-dir build/target",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Verify built installers.
    Verify(VerifyArgs),
}

/// Platform selector accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformArg {
    /// `.dmg` and `.app.tar.gz` artefacts.
    Macos,
    /// `.msi` and NSIS `.exe` artefacts.
    Windows,
    /// `.deb` and `.rpm` artefacts.
    Linux,
}

impl From<PlatformArg> for Platform {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::Macos => Self::MacOs,
            PlatformArg::Windows => Self::Windows,
            PlatformArg::Linux => Self::Linux,
        }
    }
}

/// Arguments for the verify command.
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    /// Platform whose artefacts are discovered [default: host platform].
    #[arg(short, long, value_enum)]
    pub platform: Option<PlatformArg>,

    /// Verify this installer instead of discovering build outputs.
    #[arg(short, long, value_name = "PATH", alias = "artifact")]
    pub artefact: Option<Utf8PathBuf>,

    /// Packaging config [default: $SHIPCHECK_CONFIG or src-tauri/tauri.conf.json].
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Build-output directory searched for installers.
    #[arg(
        short,
        long,
        value_name = "DIR",
        env = "CARGO_TARGET_DIR",
        default_value = "src-tauri/target"
    )]
    pub target_dir: Utf8PathBuf,

    /// Kill any external tool that runs longer than this many seconds.
    #[arg(long, value_name = "SECS", env = "SHIPCHECK_TOOL_TIMEOUT")]
    pub tool_timeout: Option<u64>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        alias = "verbosity",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (findings still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl VerifyArgs {
    /// The tool timeout, if one was given and is non-zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use shipcheck_verifier::cli::{Cli, Command};
    /// use std::time::Duration;
    ///
    /// let cli = Cli::parse_from(["shipcheck", "verify", "--tool-timeout", "30"]);
    /// let Command::Verify(args) = cli.command;
    /// assert_eq!(args.timeout(), Some(Duration::from_secs(30)));
    /// ```
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.tool_timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Log filter implied by the verbosity flags.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbosity) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, _) => "debug",
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
