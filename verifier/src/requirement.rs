//! Canonical declared expectations.
//!
//! [`RequirementModel`] is built once per run from the packaging
//! configuration and never changes afterwards. Every value is normalized on
//! the way in, so collectors and the validator compare like with like.

use crate::config::{ConfigError, PackagingConfig, Resources};
use camino::{Utf8Path, Utf8PathBuf};
use shipcheck_common::{Extension, MimeType, Scheme};
use std::collections::{BTreeMap, BTreeSet};

/// Basename prefixes that mark a resource as a licence or notice file.
pub const COMPLIANCE_PREFIXES: &[&str] = &[
    "LICENSE",
    "LICENCE",
    "NOTICE",
    "COPYING",
    "THIRD_PARTY",
    "THIRD-PARTY",
    "THIRDPARTY",
];

/// One declared file association, kept with its position in the config so
/// conflicts can name the entries involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAssociation {
    /// Zero-based index into `bundle.fileAssociations`.
    pub index: usize,
    /// Normalized extensions handled by the entry.
    pub extensions: Vec<Extension>,
    /// Normalized MIME type, when one was declared.
    pub mime: Option<MimeType>,
}

/// Everything an artefact is expected to declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementModel {
    extensions: BTreeSet<Extension>,
    mime_by_extension: BTreeMap<Extension, BTreeSet<MimeType>>,
    schemes: BTreeSet<Scheme>,
    identifier: String,
    version: String,
    product_name: String,
    main_binary_name: String,
    compliance_files: BTreeSet<String>,
    associations: Vec<FileAssociation>,
    upgrade_code: Option<String>,
    package_name: String,
    linux_file_map: BTreeSet<String>,
    entitlements: Option<Utf8PathBuf>,
}

impl RequirementModel {
    /// Builds the model from a parsed configuration.
    ///
    /// `config_dir` is the directory holding the configuration file; the
    /// entitlements path is resolved against it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for an absent or empty identity
    /// field, [`ConfigError::InvalidScheme`] for a scheme that is a URL
    /// prefix, and [`ConfigError::InvalidAssociation`] for an extension or
    /// MIME type that cannot be normalized.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use shipcheck_verifier::config::PackagingConfig;
    /// use shipcheck_verifier::requirement::RequirementModel;
    ///
    /// let config = PackagingConfig::from_json(
    ///     Utf8Path::new("tauri.conf.json"),
    ///     r#"{"identifier":"com.example.formula","version":"1.0.0",
    ///         "productName":"Formula","mainBinaryName":"formula",
    ///         "plugins":{"deep-link":{"desktop":{"schemes":["Formula:"]}}}}"#,
    /// )?;
    /// let model = RequirementModel::from_config(&config, Utf8Path::new("."))?;
    /// assert_eq!(model.schemes().iter().next().map(|s| s.as_str()), Some("formula"));
    /// # Ok::<(), shipcheck_verifier::config::ConfigError>(())
    /// ```
    pub fn from_config(config: &PackagingConfig, config_dir: &Utf8Path) -> Result<Self, ConfigError> {
        let identifier = required(config.identifier.as_deref(), "identifier")?;
        let version = required(config.version.as_deref(), "version")?;
        let product_name = required(config.product_name.as_deref(), "productName")?;
        let main_binary_name = required(config.main_binary_name.as_deref(), "mainBinaryName")?;

        let associations = parse_associations(config)?;
        let mut extensions = BTreeSet::new();
        let mut mime_by_extension: BTreeMap<Extension, BTreeSet<MimeType>> = BTreeMap::new();
        for association in &associations {
            for extension in &association.extensions {
                extensions.insert(extension.clone());
                let mimes = mime_by_extension.entry(extension.clone()).or_default();
                if let Some(mime) = &association.mime {
                    mimes.insert(mime.clone());
                }
            }
        }

        let schemes = config
            .desktop_schemes()
            .into_iter()
            .map(|raw| Scheme::parse(raw).map_err(|source| ConfigError::InvalidScheme { source }))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let upgrade_code = config
            .bundle
            .windows
            .wix
            .upgrade_code
            .as_deref()
            .map(normalize_guid)
            .filter(|code| !code.is_empty());

        Ok(Self {
            extensions,
            mime_by_extension,
            schemes,
            package_name: kebab_case(&product_name),
            identifier,
            version,
            product_name,
            main_binary_name,
            compliance_files: compliance_files(config.bundle.resources.as_ref()),
            associations,
            upgrade_code,
            linux_file_map: config
                .linux_file_destinations()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            entitlements: config
                .bundle
                .macos
                .entitlements
                .as_deref()
                .filter(|path| !path.trim().is_empty())
                .map(|path| config_dir.join(path)),
        })
    }

    /// Required file extensions.
    #[must_use]
    pub const fn extensions(&self) -> &BTreeSet<Extension> {
        &self.extensions
    }

    /// Declared MIME types per extension.
    #[must_use]
    pub const fn mime_by_extension(&self) -> &BTreeMap<Extension, BTreeSet<MimeType>> {
        &self.mime_by_extension
    }

    /// Required URL schemes.
    #[must_use]
    pub const fn schemes(&self) -> &BTreeSet<Scheme> {
        &self.schemes
    }

    /// Bundle identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Release version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Product name.
    #[must_use]
    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    /// Main executable name.
    #[must_use]
    pub fn main_binary_name(&self) -> &str {
        &self.main_binary_name
    }

    /// Licence and notice basenames that must ship.
    #[must_use]
    pub const fn compliance_files(&self) -> &BTreeSet<String> {
        &self.compliance_files
    }

    /// Declared file associations in config order.
    #[must_use]
    pub fn associations(&self) -> &[FileAssociation] {
        &self.associations
    }

    /// Normalized Windows upgrade code.
    #[must_use]
    pub fn upgrade_code(&self) -> Option<&str> {
        self.upgrade_code.as_deref()
    }

    /// Linux package name.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Extra install destinations declared for Linux packages.
    #[must_use]
    pub const fn linux_file_map(&self) -> &BTreeSet<String> {
        &self.linux_file_map
    }

    /// Declared macOS entitlements file.
    #[must_use]
    pub fn entitlements(&self) -> Option<&Utf8Path> {
        self.entitlements.as_deref()
    }
}

fn required(value: Option<&str>, field: &'static str) -> Result<String, ConfigError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or(ConfigError::MissingField { field })
}

fn parse_associations(config: &PackagingConfig) -> Result<Vec<FileAssociation>, ConfigError> {
    config
        .bundle
        .file_associations
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let invalid = |source| ConfigError::InvalidAssociation { index, source };
            let extensions = entry
                .ext
                .values()
                .into_iter()
                .map(Extension::parse)
                .collect::<Result<Vec<_>, _>>()
                .map_err(invalid)?;
            let mime = entry
                .mime_type
                .as_deref()
                .map(MimeType::parse)
                .transpose()
                .map_err(invalid)?;
            Ok(FileAssociation {
                index,
                extensions,
                mime,
            })
        })
        .collect()
}

fn compliance_files(resources: Option<&Resources>) -> BTreeSet<String> {
    let installed: Vec<&str> = match resources {
        None => Vec::new(),
        Some(Resources::List(sources)) => sources.iter().map(String::as_str).collect(),
        Some(Resources::Map(map)) => map
            .iter()
            .map(|(source, target)| if target.trim().is_empty() { source } else { target })
            .map(String::as_str)
            .collect(),
    };
    installed
        .into_iter()
        .filter(|path| !path.contains(['*', '?', '[']))
        .filter_map(basename)
        .filter(|name| is_compliance_name(name))
        .map(str::to_owned)
        .collect()
}

fn basename(path: &str) -> Option<&str> {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
}

/// Returns `true` when `name` looks like a licence or notice file.
#[must_use]
pub fn is_compliance_name(name: &str) -> bool {
    let upper = name.to_uppercase();
    COMPLIANCE_PREFIXES
        .iter()
        .any(|prefix| upper.starts_with(prefix))
}

/// Upper-cases a GUID and strips its braces.
#[must_use]
pub fn normalize_guid(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .to_uppercase()
}

/// Converts a product name into a Linux package name.
///
/// # Examples
///
/// ```
/// use shipcheck_verifier::requirement::kebab_case;
///
/// assert_eq!(kebab_case("Formula Desk"), "formula-desk");
/// assert_eq!(kebab_case("My  App_2"), "my-app-2");
/// ```
#[must_use]
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_owned()
}
