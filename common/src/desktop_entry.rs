//! Minimal reader for freedesktop `.desktop` launcher entries.
//!
//! Only the `[Desktop Entry]` group is consulted; localized keys
//! (`Name[de]=...`) are ignored in favour of their unlocalized form.

use std::collections::BTreeMap;

const MAIN_GROUP: &str = "Desktop Entry";

/// Key/value pairs from the `[Desktop Entry]` group of a launcher file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesktopEntry {
    values: BTreeMap<String, String>,
}

impl DesktopEntry {
    /// Parses the `[Desktop Entry]` group out of `text`.
    ///
    /// Comments, blank lines, other groups, and lines without `=` are skipped.
    /// When a key repeats, the first value wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use shipcheck_common::desktop_entry::DesktopEntry;
    ///
    /// let entry = DesktopEntry::parse("[Desktop Entry]\nMimeType=text/csv;x-scheme-handler/formula;\n");
    /// assert_eq!(entry.list("MimeType"), vec!["text/csv", "x-scheme-handler/formula"]);
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut values = BTreeMap::new();
        let mut in_main_group = false;

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(group) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_main_group = group == MAIN_GROUP;
                continue;
            }
            if !in_main_group {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.contains('[') {
                continue;
            }
            values
                .entry(key.to_owned())
                .or_insert_with(|| value.trim().to_owned());
        }

        Self { values }
    }

    /// Returns the raw value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the `;`-separated entries of `key`, dropping empty items.
    #[must_use]
    pub fn list(&self, key: &str) -> Vec<&str> {
        self.get(key)
            .map(|value| {
                value
                    .split(';')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::DesktopEntry;

    const ENTRY: &str = "\
# generated by the bundler
[Desktop Entry]
Categories=Office;
Exec=formula %u
Name=Formula
Name[de]=Formel
MimeType=application/vnd.openxmlformats-officedocument.spreadsheetml.sheet;x-scheme-handler/formula;
MimeType=ignored/duplicate;

[Desktop Action new-window]
Name=New Window
MimeType=text/plain;
";

    #[test]
    fn reads_main_group_values() {
        let entry = DesktopEntry::parse(ENTRY);
        assert_eq!(entry.get("Name"), Some("Formula"));
        assert_eq!(entry.get("Exec"), Some("formula %u"));
    }

    #[test]
    fn list_splits_and_keeps_first_declaration() {
        let entry = DesktopEntry::parse(ENTRY);
        assert_eq!(
            entry.list("MimeType"),
            vec![
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "x-scheme-handler/formula"
            ]
        );
    }

    #[test]
    fn missing_key_yields_empty_list() {
        let entry = DesktopEntry::parse(ENTRY);
        assert!(entry.list("Keywords").is_empty());
    }

    #[test]
    fn entries_outside_main_group_are_ignored() {
        let entry = DesktopEntry::parse("[Other]\nName=Nope\n");
        assert_eq!(entry.get("Name"), None);
    }
}
