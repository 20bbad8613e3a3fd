//! Best-effort scan of NSIS setup executables.
//!
//! An NSIS installer carries its registry writes as strings in the payload.
//! The scan looks only for the registrations the configuration requires,
//! using needles qualified enough that an unrelated mention of an extension
//! or scheme name does not match. Strings may be stored as UTF-8 or as
//! UTF-16LE, so each needle is encoded both ways and matched against the raw
//! bytes. A compressed payload hides everything, which is why findings from
//! this collector are warnings.

use crate::error::{Result, VerifyError};
use crate::facts::{Evidence, ExtensionSource, ObservedFacts};
use crate::requirement::RequirementModel;
use camino::Utf8Path;
use std::collections::{BTreeMap, BTreeSet};

/// A string encoding an installer may use.
#[derive(Clone, Copy, Debug)]
enum Encoding {
    Utf8,
    Utf16Le,
}

impl Encoding {
    const ALL: [Self; 2] = [Self::Utf8, Self::Utf16Le];

    fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        }
    }

    /// Whether `window` spells the lower-cased `needle`, ignoring ASCII case.
    fn eq_folded(self, window: &[u8], needle: &[u8]) -> bool {
        match self {
            Self::Utf8 => window.eq_ignore_ascii_case(needle),
            Self::Utf16Le => window
                .chunks_exact(2)
                .zip(needle.chunks_exact(2))
                .all(|(found, wanted)| fold_unit(found) == fold_unit(wanted)),
        }
    }

    /// The code unit starting at `at`, or `None` past the end of `bytes`.
    fn unit_at(self, bytes: &[u8], at: usize) -> Option<u32> {
        match self {
            Self::Utf8 => bytes.get(at).copied().map(u32::from),
            Self::Utf16Le => bytes
                .get(at..at + 2)
                .map(|pair| u32::from(fold_unit(pair))),
        }
    }
}

/// Decodes a UTF-16LE unit, lower-casing ASCII.
fn fold_unit(pair: &[u8]) -> u16 {
    let unit = match pair {
        [low, high] => u16::from_le_bytes([*low, *high]),
        _ => return u16::MAX,
    };
    match u8::try_from(unit) {
        Ok(byte) if byte.is_ascii() => u16::from(byte.to_ascii_lowercase()),
        _ => unit,
    }
}

/// Case-insensitive searches over a raw installer payload.
struct Payload<'a> {
    bytes: &'a [u8],
}

impl Payload<'_> {
    /// Whether the payload contains `needle` in any encoding.
    fn contains(&self, needle: &str) -> bool {
        self.find(needle, |_| true)
    }

    /// Whether the payload contains `needle` followed by a terminator or the
    /// end of the payload.
    fn contains_terminated(&self, needle: &str) -> bool {
        self.find(needle, |next| {
            next.is_none_or(|unit| matches!(char::from_u32(unit), Some('\\' | '"' | '\0')))
        })
    }

    fn find(&self, needle: &str, accept: impl Fn(Option<u32>) -> bool) -> bool {
        let lowered = needle.to_ascii_lowercase();
        Encoding::ALL.into_iter().any(|encoding| {
            let encoded = encoding.encode(&lowered);
            // UTF-16 strings may start at either byte parity, so every offset
            // is tried.
            !encoded.is_empty()
                && self
                    .bytes
                    .windows(encoded.len())
                    .enumerate()
                    .any(|(at, window)| {
                        encoding.eq_folded(window, &encoded)
                            && accept(encoding.unit_at(self.bytes, at + encoded.len()))
                    })
        })
    }
}

/// Scans the installer at `exe` for the required extensions and schemes.
///
/// # Errors
///
/// Returns [`VerifyError::Read`] when the installer cannot be read.
pub fn collect(requirement: &RequirementModel, exe: &Utf8Path) -> Result<ObservedFacts> {
    let bytes = std::fs::read(exe).map_err(|err| VerifyError::read(exe, err))?;
    Ok(scan(requirement, &bytes, exe.file_name().unwrap_or(exe.as_str())))
}

/// Scans an installer payload already in memory.
#[must_use]
pub fn scan(requirement: &RequirementModel, bytes: &[u8], label: &str) -> ObservedFacts {
    let payload = Payload { bytes };

    let registered: BTreeMap<_, _> = requirement
        .extensions()
        .iter()
        .filter(|extension| {
            payload.contains_terminated(&format!("classes\\.{extension}"))
                || payload.contains(&format!(".{extension}\\openwithprogids"))
        })
        .map(|extension| (extension.clone(), ExtensionSource::Direct))
        .collect();
    let schemes: BTreeSet<_> = requirement
        .schemes()
        .iter()
        .filter(|scheme| {
            payload.contains(&format!("\\{scheme}\\shell\\open\\command"))
                || payload.contains(&format!("x-scheme-handler/{scheme};"))
        })
        .cloned()
        .collect();

    let mut facts = ObservedFacts {
        evidence: Evidence::BestEffort,
        registered_extensions: Some(registered),
        registered_schemes: Some(schemes),
        ..ObservedFacts::default()
    };
    facts.locations.file_types = Some(label.to_owned());
    facts.locations.schemes = Some(label.to_owned());
    facts
}
