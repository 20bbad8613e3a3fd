//! Tabular query results exported from an installer database.
//!
//! `msiinfo export` (and the Windows Installer `Export` automation call) write
//! a table as an IDT file: three header lines followed by tab-separated rows.
//!
//! ```text
//! Property\tValue          <- column names
//! s72\tl0                  <- column types
//! Property\tProperty       <- table name, then primary key columns
//! ProductName\tFormula     <- rows
//! ```

use thiserror::Error;

/// Errors arising from tabular query output.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TableError {
    /// The text lacks the three IDT header lines.
    #[error("malformed table export: {reason}")]
    Malformed {
        /// Which part of the header was missing.
        reason: String,
    },

    /// A column required by the caller does not exist in the table.
    #[error("table {table} has no column {column}")]
    MissingColumn {
        /// Table name from the export header.
        table: String,
        /// The requested column.
        column: String,
    },
}

/// A parsed installer-database table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl QueryTable {
    /// Parses an IDT export.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Malformed`] when any of the three header lines is
    /// missing or the table-name line is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use shipcheck_common::table::QueryTable;
    ///
    /// let table = QueryTable::parse("Property\tValue\ns72\tl0\nProperty\tProperty\nProductName\tFormula\n")?;
    /// assert_eq!(table.lookup("Property", "ProductName", "Value")?, Some("Formula"));
    /// # Ok::<(), shipcheck_common::table::TableError>(())
    /// ```
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));

        let columns: Vec<String> = lines
            .next()
            .filter(|line| !line.trim().is_empty())
            .ok_or_else(|| malformed("missing column-name line"))?
            .split('\t')
            .map(|column| column.trim().to_owned())
            .collect();
        lines
            .next()
            .ok_or_else(|| malformed("missing column-type line"))?;
        let name = lines
            .next()
            .and_then(|line| line.split('\t').next())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| malformed("missing table-name line"))?
            .to_owned();

        let rows = lines
            .filter(|line| !line.is_empty())
            .map(|line| {
                let mut cells: Vec<String> = line.split('\t').map(unescape).collect();
                cells.resize(columns.len().max(cells.len()), String::new());
                cells
            })
            .collect();

        Ok(Self {
            name,
            columns,
            rows,
        })
    }

    /// Returns every value in `column`, in row order.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingColumn`] when the column does not exist.
    pub fn column(&self, column: &str) -> Result<Vec<&str>, TableError> {
        let index = self.index_of(column)?;
        Ok(self
            .rows
            .iter()
            .filter_map(|row| row.get(index).map(String::as_str))
            .collect())
    }

    /// Returns `value_column` of the first row whose `key_column` equals `key`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingColumn`] when either column does not
    /// exist.
    pub fn lookup(
        &self,
        key_column: &str,
        key: &str,
        value_column: &str,
    ) -> Result<Option<&str>, TableError> {
        let key_index = self.index_of(key_column)?;
        let value_index = self.index_of(value_column)?;
        Ok(self
            .rows
            .iter()
            .find(|row| row.get(key_index).is_some_and(|cell| cell == key))
            .and_then(|row| row.get(value_index))
            .map(String::as_str))
    }

    fn index_of(&self, column: &str) -> Result<usize, TableError> {
        self.columns
            .iter()
            .position(|candidate| candidate == column)
            .ok_or_else(|| TableError::MissingColumn {
                table: self.name.clone(),
                column: column.to_owned(),
            })
    }
}

fn malformed(reason: &str) -> TableError {
    TableError::Malformed {
        reason: reason.to_owned(),
    }
}

// IDT encodes control characters inside cells: LF as 0x19, TAB as 0x10,
// CR as 0x11.
fn unescape(cell: &str) -> String {
    cell.chars()
        .map(|ch| match ch {
            '\u{19}' => '\n',
            '\u{10}' => '\t',
            '\u{11}' => '\r',
            other => other,
        })
        .collect()
}
