//! Windows Installer database collector.
//!
//! The MSI is queried table by table with `msiinfo` (msitools). Tables the
//! database does not carry are treated as empty, so a package without a
//! `Registry` table simply registers no URL protocols.

use crate::command::{CommandExecutor, run_checked};
use crate::error::{Result, VerifyError};
use crate::facts::{ExtensionSource, Identity, Observed, ObservedFacts, partition_schemes};
use camino::Utf8Path;
use log::debug;
use shipcheck_common::{Extension, QueryTable, TableError};
use std::collections::{BTreeMap, BTreeSet};

const CLASSES_PREFIX: &str = "software\\classes\\";
const OPEN_COMMAND_SUFFIX: &str = "\\shell\\open\\command";
const URL_PROTOCOL: &str = "URL Protocol";

/// Collects facts from the installer database at `msi`.
///
/// # Errors
///
/// Propagates `msiinfo` failures and returns [`VerifyError::Table`] when an
/// export lacks a column the collector reads.
pub fn collect(executor: &dyn CommandExecutor, msi: &Utf8Path) -> Result<ObservedFacts> {
    let name = msi.file_name().unwrap_or(msi.as_str());
    let table_error = |source| VerifyError::Table {
        path: msi.to_owned(),
        source,
    };
    let available: BTreeSet<String> = run_checked(executor, "msiinfo", &["tables", msi.as_str()])?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    let export = |table: &str| -> Result<Option<QueryTable>> {
        if !available.contains(table) {
            debug!("{name} has no {table} table");
            return Ok(None);
        }
        let text = run_checked(executor, "msiinfo", &["export", msi.as_str(), table])?;
        QueryTable::parse(&text).map(Some).map_err(table_error)
    };

    let property = export("Property")?;
    let registry = export("Registry")?;
    let extension = export("Extension")?;
    let file = export("File")?;

    let mut facts = ObservedFacts::default();

    let mut registered = BTreeMap::new();
    if let Some(table) = &extension {
        for raw in table.column("Extension").map_err(table_error)? {
            insert_extension(&mut registered, raw);
        }
    }
    let keys = match &registry {
        Some(table) => registry_keys(table).map_err(table_error)?,
        None => Vec::new(),
    };
    for (key, _) in &keys {
        let relative = strip_classes(key);
        let first = relative.split('\\').next().unwrap_or_default();
        if let Some(raw) = first.strip_prefix('.') {
            insert_extension(&mut registered, raw);
        }
    }
    facts.registered_extensions = Some(registered);

    let protocols = url_protocols(&keys);
    let (schemes, malformed) = partition_schemes(protocols.iter().map(String::as_str));
    facts.registered_schemes = Some(schemes);
    facts.malformed_schemes = malformed;

    let lookup = |property_name: &str| -> Result<Option<String>> {
        let Some(table) = &property else {
            return Ok(None);
        };
        Ok(table
            .lookup("Property", property_name, "Value")
            .map_err(table_error)?
            .map(str::to_owned))
    };
    facts.identity = Identity {
        product_name: Observed::expected(lookup("ProductName")?),
        version: Observed::expected(lookup("ProductVersion")?),
        upgrade_code: Observed::expected(lookup("UpgradeCode")?),
        ..Identity::default()
    };

    let files = match &file {
        Some(table) => table
            .column("FileName")
            .map_err(table_error)?
            .into_iter()
            .map(long_file_name)
            .map(str::to_owned)
            .collect(),
        None => BTreeSet::new(),
    };
    facts.files_present = Some(files);
    facts.compliance_root = format!("{name}/INSTALLDIR");

    facts.locations.file_types = Some(format!("{name}:Extension"));
    facts.locations.schemes = Some(format!("{name}:Registry"));
    facts.locations.identity = Some(format!("{name}:Property"));
    Ok(facts)
}

fn insert_extension(registered: &mut BTreeMap<Extension, ExtensionSource>, raw: &str) {
    match Extension::parse(raw) {
        Ok(extension) => {
            registered.insert(extension, ExtensionSource::Direct);
        }
        Err(err) => debug!("ignoring registered extension: {err}"),
    }
}

/// `(Key, Name)` pairs of every registry row.
fn registry_keys(table: &QueryTable) -> std::result::Result<Vec<(String, String)>, TableError> {
    let keys = table.column("Key")?;
    let names = table.column("Name")?;
    Ok(keys
        .into_iter()
        .zip(names)
        .map(|(key, name)| (key.to_owned(), name.to_owned()))
        .collect())
}

/// Strips a leading `Software\Classes\` so per-user and per-machine keys
/// compare equal to `HKEY_CLASSES_ROOT` ones.
fn strip_classes(key: &str) -> &str {
    let trimmed = key.trim_matches('\\');
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with(CLASSES_PREFIX) {
        trimmed.get(CLASSES_PREFIX.len()..).unwrap_or(trimmed)
    } else {
        trimmed
    }
}

/// Schemes with both a `URL Protocol` marker on their class key and an
/// open command beneath it.
fn url_protocols(keys: &[(String, String)]) -> BTreeSet<String> {
    let mut marked = BTreeMap::new();
    let mut commands = BTreeSet::new();
    for (key, name) in keys {
        let relative = strip_classes(key);
        let lowered = relative.to_ascii_lowercase();
        if name == URL_PROTOCOL {
            let scheme = relative.rsplit('\\').next().unwrap_or(relative);
            marked.insert(scheme.to_ascii_lowercase(), scheme.to_owned());
        }
        if let Some(class) = lowered.strip_suffix(OPEN_COMMAND_SUFFIX) {
            commands.insert(class.rsplit('\\').next().unwrap_or(class).to_owned());
        }
    }
    marked
        .into_iter()
        .filter(|(lowered, _)| commands.contains(lowered))
        .map(|(_, scheme)| scheme)
        .collect()
}

/// The long half of an MSI `SHORT~1.TXT|long name.txt` file name.
fn long_file_name(raw: &str) -> &str {
    raw.rsplit_once('|').map_or(raw, |(_, long)| long)
}

#[cfg(test)]
#[path = "windows_tests.rs"]
mod tests;
