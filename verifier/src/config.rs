//! Packaging configuration loading.
//!
//! The configuration is the JSON file the bundler itself consumes. Only the
//! fields that describe what a built installer must contain are read; every
//! other key is ignored.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use shipcheck_common::NormalizeError;
use std::collections::BTreeMap;
use thiserror::Error;

/// Default location of the packaging configuration, relative to the
/// working directory.
pub const DEFAULT_CONFIG_PATH: &str = "src-tauri/tauri.conf.json";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_ENV: &str = "SHIPCHECK_CONFIG";

/// Errors raised while loading the packaging configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read packaging config {path}: {source}")]
    Read {
        /// Path that was read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON of the expected shape.
    #[error("failed to parse packaging config {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: Utf8PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A field every artefact is checked against is absent or empty.
    #[error("packaging config is missing required field `{field}`")]
    MissingField {
        /// Dotted path of the field.
        field: &'static str,
    },

    /// A declared scheme is a URL prefix rather than a bare name.
    #[error("invalid deep-link scheme in packaging config: {source}")]
    InvalidScheme {
        /// The normalization failure.
        #[source]
        source: NormalizeError,
    },

    /// A declared extension or MIME type cannot be normalized.
    #[error("invalid file association #{index} in packaging config: {source}")]
    InvalidAssociation {
        /// Zero-based index into `bundle.fileAssociations`.
        index: usize,
        /// The normalization failure.
        #[source]
        source: NormalizeError,
    },
}

/// A value written either as a single string or as a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// `"xlsx"`
    One(String),
    /// `["xlsx", "xls"]`
    Many(Vec<String>),
}

impl OneOrMany {
    /// Returns the values in declaration order.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::One(value) => vec![value.as_str()],
            Self::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// The subset of the packaging configuration that shipcheck reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagingConfig {
    /// Reverse-DNS bundle identifier.
    pub identifier: Option<String>,
    /// Release version.
    pub version: Option<String>,
    /// Human-readable product name.
    pub product_name: Option<String>,
    /// File name of the main executable.
    pub main_binary_name: Option<String>,
    /// Bundler settings.
    #[serde(default)]
    pub bundle: BundleConfig,
    /// Plugin settings.
    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// `bundle` settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleConfig {
    /// Declared document types.
    #[serde(default)]
    pub file_associations: Vec<FileAssociationConfig>,
    /// Extra files shipped with the application.
    #[serde(default)]
    pub resources: Option<Resources>,
    /// macOS-specific settings.
    #[serde(default, rename = "macOS")]
    pub macos: MacOsConfig,
    /// Linux-specific settings.
    #[serde(default)]
    pub linux: LinuxConfig,
    /// Windows-specific settings.
    #[serde(default)]
    pub windows: WindowsConfig,
}

/// One entry of `bundle.fileAssociations`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAssociationConfig {
    /// Extension or extensions handled by this entry.
    #[serde(default)]
    pub ext: OneOrMany,
    /// MIME type of the document.
    pub mime_type: Option<String>,
}

/// `bundle.resources`, written either as a list of sources or as a map from
/// source to destination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Resources {
    /// `["../LICENSE", "assets/*"]`
    List(Vec<String>),
    /// `{"../LICENSE": "LICENSE"}`
    Map(BTreeMap<String, String>),
}

/// `bundle.macOS` settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MacOsConfig {
    /// Path to the entitlements plist, relative to the config file.
    pub entitlements: Option<String>,
}

/// `bundle.linux` settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinuxConfig {
    /// Debian package settings.
    #[serde(default)]
    pub deb: LinuxPackageConfig,
    /// RPM package settings.
    #[serde(default)]
    pub rpm: LinuxPackageConfig,
}

/// Settings shared by the Linux package formats.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinuxPackageConfig {
    /// Map from install destination to source path.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

/// `bundle.windows` settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowsConfig {
    /// WiX installer settings.
    #[serde(default)]
    pub wix: WixConfig,
}

/// `bundle.windows.wix` settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WixConfig {
    /// Stable upgrade code of the MSI product.
    pub upgrade_code: Option<String>,
}

/// `plugins` settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginsConfig {
    /// Deep-link plugin settings.
    #[serde(default, rename = "deep-link")]
    pub deep_link: DeepLinkConfig,
}

/// `plugins.deep-link` settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeepLinkConfig {
    /// Desktop scheme registrations.
    #[serde(default)]
    pub desktop: Option<DesktopSchemes>,
}

/// `plugins.deep-link.desktop`, either one registration or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DesktopSchemes {
    /// `{"schemes": ["formula"]}`
    One(SchemeRegistration),
    /// `[{"schemes": ["formula"]}, {"schemes": ["formula-beta"]}]`
    Many(Vec<SchemeRegistration>),
}

/// A single desktop deep-link registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemeRegistration {
    /// Scheme names.
    #[serde(default)]
    pub schemes: Vec<String>,
}

impl PackagingConfig {
    /// Parses configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when `text` is not valid JSON of the
    /// expected shape. `path` is only used in the error.
    pub fn from_json(path: &Utf8Path, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Reads and parses the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(path, &text)
    }

    /// Returns every declared desktop scheme, in declaration order.
    #[must_use]
    pub fn desktop_schemes(&self) -> Vec<&str> {
        let registrations: Vec<&SchemeRegistration> = match &self.plugins.deep_link.desktop {
            None => Vec::new(),
            Some(DesktopSchemes::One(one)) => vec![one],
            Some(DesktopSchemes::Many(many)) => many.iter().collect(),
        };
        registrations
            .into_iter()
            .flat_map(|registration| registration.schemes.iter().map(String::as_str))
            .collect()
    }

    /// Returns the source paths listed under `bundle.resources`.
    #[must_use]
    pub fn resource_sources(&self) -> Vec<&str> {
        match &self.bundle.resources {
            None => Vec::new(),
            Some(Resources::List(list)) => list.iter().map(String::as_str).collect(),
            Some(Resources::Map(map)) => map.keys().map(String::as_str).collect(),
        }
    }

    /// Returns every Linux install destination, across both package formats.
    #[must_use]
    pub fn linux_file_destinations(&self) -> Vec<&str> {
        self.bundle
            .linux
            .deb
            .files
            .keys()
            .chain(self.bundle.linux.rpm.files.keys())
            .map(String::as_str)
            .collect()
    }
}

/// Chooses the configuration path: an explicit path wins, then
/// `SHIPCHECK_CONFIG` (as supplied by `lookup`), then the default.
///
/// # Examples
///
/// ```
/// use shipcheck_verifier::config::resolve_config_path;
///
/// let path = resolve_config_path(None, |_| None);
/// assert_eq!(path, "src-tauri/tauri.conf.json");
/// ```
#[must_use]
pub fn resolve_config_path(
    explicit: Option<Utf8PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Utf8PathBuf {
    explicit
        .or_else(|| {
            lookup(CONFIG_ENV)
                .filter(|value| !value.trim().is_empty())
                .map(Utf8PathBuf::from)
        })
        .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CONFIG_PATH))
}
