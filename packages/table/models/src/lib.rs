#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tabular record types, dataset identifiers, and the crime category taxonomy.
//!
//! Every stage of the batch pipeline (ingest, clean, quality, publish) passes
//! data around as a [`Table`]: an ordered list of column names plus rows of
//! string cells. An empty cell means the value is missing.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The datasets handled by the batch pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dataset {
    /// Municipal crime incidents or agency offense summaries
    Crime,
    /// Monthly tourism indicators
    Tourism,
}

impl Dataset {
    /// Returns all variants of this enum, in pipeline order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Crime, Self::Tourism]
    }
}

/// Coarse crime grouping assigned by the cleaner from free-text offense
/// descriptions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum CrimeCategory {
    /// Crimes against persons (assault, robbery, homicide)
    Violent,
    /// Crimes against property (burglary, larceny, vehicle theft, vandalism)
    Property,
    /// Everything else, including unrecognized or missing offense text
    Other,
}

impl CrimeCategory {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Violent, Self::Property, Self::Other]
    }
}

/// An ordered table of string cells.
///
/// Rows are always exactly as wide as the column list: short rows are padded
/// with empty cells and long rows are truncated on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates an empty table with the given columns.
    #[must_use]
    pub const fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Creates a table from columns and rows, normalizing row widths.
    #[must_use]
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows in order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Consumes the table and returns its columns and rows.
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<String>>) {
        (self.columns, self.rows)
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the named column, if present.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns `true` if the named column is present.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Appends a row, padding or truncating it to the table width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    /// Renames every column with `f`.
    pub fn rename_columns(&mut self, f: impl Fn(&str) -> String) {
        for column in &mut self.columns {
            *column = f(column);
        }
    }

    /// Keeps only the rows for which `keep` returns `true`.
    pub fn retain_rows(&mut self, keep: impl FnMut(&Vec<String>) -> bool) {
        self.rows.retain(keep);
    }

    /// Iterates over the cells of one column.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |row| row.get(index).map_or("", String::as_str))
    }

    /// Replaces the named column's values, appending the column if it does
    /// not exist yet.
    ///
    /// `values` must contain exactly one entry per row; missing entries are
    /// filled with empty cells.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        let index = if let Some(index) = self.column_index(name) {
            index
        } else {
            self.columns.push(name.to_string());
            for row in &mut self.rows {
                row.push(String::new());
            }
            self.columns.len() - 1
        };

        let mut values = values.into_iter();
        for row in &mut self.rows {
            row[index] = values.next().unwrap_or_default();
        }
    }

    /// Removes rows that are exactly equal to an earlier row, keeping the
    /// first occurrence. Returns how many rows were removed.
    pub fn dedup_rows(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(before);
        self.rows.retain(|row| seen.insert(row.clone()));
        before - self.rows.len()
    }
}
