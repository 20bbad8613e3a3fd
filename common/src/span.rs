//! Line and column bookkeeping for scanned documents.

use std::fmt;

/// Represents a location in a document using one-based line and column numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    line: usize,
    column: usize,
}

impl SourceLocation {
    /// Builds a new location.
    ///
    /// # Examples
    ///
    /// ```
    /// use shipcheck_common::span::SourceLocation;
    ///
    /// let location = SourceLocation::new(3, 5);
    /// assert_eq!(location.line(), 3);
    /// ```
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Resolves a byte offset within `text` to a line and column.
    ///
    /// Offsets beyond the end of `text` resolve to the position just after
    /// the final character. Columns count characters, not bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use shipcheck_common::span::SourceLocation;
    ///
    /// let location = SourceLocation::from_offset("ab\ncd", 4);
    /// assert_eq!(location, SourceLocation::new(2, 2));
    /// ```
    #[must_use]
    pub fn from_offset(text: &str, offset: usize) -> Self {
        let mut line = 1;
        let mut column = 1;
        for (index, ch) in text.char_indices() {
            if index >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self { line, column }
    }

    /// Returns the one-based line number.
    #[must_use]
    pub const fn line(self) -> usize {
        self.line
    }

    /// Returns the one-based column number.
    #[must_use]
    pub const fn column(self) -> usize {
        self.column
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::SourceLocation;
    use rstest::rstest;

    #[rstest]
    #[case::start("abc", 0, 1, 1)]
    #[case::same_line("abc", 2, 1, 3)]
    #[case::after_newline("a\nbc", 2, 2, 1)]
    #[case::past_end("a\nb", 99, 2, 2)]
    fn resolves_offsets(
        #[case] text: &str,
        #[case] offset: usize,
        #[case] line: usize,
        #[case] column: usize,
    ) {
        assert_eq!(
            SourceLocation::from_offset(text, offset),
            SourceLocation::new(line, column)
        );
    }

    #[test]
    fn displays_as_line_colon_column() {
        assert_eq!(SourceLocation::new(7, 12).to_string(), "7:12");
    }
}
