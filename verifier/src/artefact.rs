//! Installer artefact kinds and variants.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// Target operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    /// macOS bundles and disk images.
    MacOs,
    /// Windows installers.
    Windows,
    /// Linux packages.
    Linux,
}

impl Platform {
    /// Returns the platform shipcheck is running on, if it is supported.
    #[must_use]
    pub const fn host() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else {
            None
        }
    }

    /// Artefact kinds built for this platform.
    #[must_use]
    pub const fn kinds(self) -> &'static [ArtefactKind] {
        match self {
            Self::MacOs => &[ArtefactKind::Dmg, ArtefactKind::AppTarball],
            Self::Windows => &[ArtefactKind::Msi, ArtefactKind::Exe],
            Self::Linux => &[ArtefactKind::Deb, ArtefactKind::Rpm],
        }
    }

    /// Lower-case display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installer file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtefactKind {
    /// macOS disk image.
    Dmg,
    /// Gzipped tarball of a macOS `.app` bundle.
    AppTarball,
    /// Windows Installer database.
    Msi,
    /// NSIS setup executable.
    Exe,
    /// RPM package.
    Rpm,
    /// Debian package.
    Deb,
}

impl ArtefactKind {
    /// Infers the kind from a file name.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use shipcheck_verifier::artefact::ArtefactKind;
    ///
    /// assert_eq!(
    ///     ArtefactKind::from_path(Utf8Path::new("Formula.app.tar.gz")),
    ///     Some(ArtefactKind::AppTarball)
    /// );
    /// assert_eq!(ArtefactKind::from_path(Utf8Path::new("notes.txt")), None);
    /// ```
    #[must_use]
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        let name = path.file_name()?.to_lowercase();
        [
            (".app.tar.gz", Self::AppTarball),
            (".dmg", Self::Dmg),
            (".msi", Self::Msi),
            (".exe", Self::Exe),
            (".rpm", Self::Rpm),
            (".deb", Self::Deb),
        ]
        .into_iter()
        .find_map(|(suffix, kind)| name.ends_with(suffix).then_some(kind))
    }

    /// File-name suffix used when globbing for build outputs.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Dmg => "dmg",
            Self::AppTarball => "app.tar.gz",
            Self::Msi => "msi",
            Self::Exe => "exe",
            Self::Rpm => "rpm",
            Self::Deb => "deb",
        }
    }

    /// Bundler output directory under `release/bundle/`.
    #[must_use]
    pub const fn bundle_dir(self) -> &'static str {
        match self {
            Self::Dmg => "dmg",
            Self::AppTarball => "macos",
            Self::Msi => "msi",
            Self::Exe => "nsis",
            Self::Rpm => "rpm",
            Self::Deb => "deb",
        }
    }
}

impl fmt::Display for ArtefactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Architecture coverage of a build.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variant {
    /// A macOS universal build carrying both `x86_64` and `arm64`.
    Universal,
    /// A build for one named target architecture.
    PerArch(String),
    /// A build for the host architecture, with no target triple in its path.
    Native,
}

/// Tokens that mark a file name or target directory as architecture
/// specific.
pub const ARCH_TOKENS: &[&str] = &[
    "x86_64", "x64", "amd64", "aarch64", "arm64", "i686", "x86", "armv7", "armhf",
];

impl Variant {
    /// Infers the variant from the artefact path.
    ///
    /// A `universal` path component or file-name token marks a universal
    /// build; an architecture token marks a per-architecture build.
    #[must_use]
    pub fn from_path(path: &Utf8Path) -> Self {
        let tokens: Vec<String> = path
            .components()
            .flat_map(|component| {
                component
                    .as_str()
                    .split(['_', '-', '.'])
                    .map(str::to_lowercase)
                    .collect::<Vec<_>>()
            })
            .collect();
        if tokens.iter().any(|token| token == "universal") {
            return Self::Universal;
        }
        ARCH_TOKENS
            .iter()
            .find(|arch| arch_in_tokens(arch, &tokens))
            .map_or(Self::Native, |arch| Self::PerArch((*arch).to_owned()))
    }
}

fn arch_in_tokens(arch: &str, tokens: &[String]) -> bool {
    // `x86_64` and `aarch64-apple-darwin` split into several tokens.
    let parts: Vec<&str> = arch.split(['_', '-']).collect();
    tokens
        .windows(parts.len())
        .any(|window| window.iter().zip(&parts).all(|(token, part)| token == part))
}

/// A discovered or explicitly named installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artefact {
    kind: ArtefactKind,
    path: Utf8PathBuf,
    variant: Variant,
}

impl Artefact {
    /// Creates an artefact with an explicit kind and variant.
    #[must_use]
    pub const fn new(kind: ArtefactKind, path: Utf8PathBuf, variant: Variant) -> Self {
        Self {
            kind,
            path,
            variant,
        }
    }

    /// Creates an artefact, inferring kind and variant from `path`.
    ///
    /// Returns `None` when the file name matches no known kind.
    #[must_use]
    pub fn from_path(path: Utf8PathBuf) -> Option<Self> {
        let kind = ArtefactKind::from_path(&path)?;
        let variant = Variant::from_path(&path);
        Some(Self::new(kind, path, variant))
    }

    /// Installer format.
    #[must_use]
    pub const fn kind(&self) -> ArtefactKind {
        self.kind
    }

    /// Path to the installer.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Architecture coverage.
    #[must_use]
    pub const fn variant(&self) -> &Variant {
        &self.variant
    }

    /// File name used in reports.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }
}

impl fmt::Display for Artefact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.kind)
    }
}
