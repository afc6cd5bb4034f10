#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cleaning and enrichment of ingested tables.
//!
//! Both cleaners standardize column names, parse the date column (dropping
//! rows whose date cannot be parsed), derive calendar columns, and remove
//! exact-duplicate rows. The crime cleaner additionally derives `dow`,
//! `hour`, and `crime_category`.

pub mod category;
pub mod dates;

use chrono::NaiveDateTime;
use data_coyote_config::SourceConfig;
use data_coyote_table_models::{Dataset, Table};

use crate::category::map_crime_category;
use crate::dates::{CANONICAL_FORMAT, CalendarParts, parse_date, weekday_name};

/// Alternate crime date column names probed, in order, when the configured
/// column is absent.
pub const DATE_COLUMN_FALLBACKS: &[&str] = &[
    "date",
    "incident_datetime",
    "incident_date",
    "reported_date",
    "data_year",
];

/// Derived column holding the mapped crime category.
pub const CATEGORY_COLUMN: &str = "crime_category";

/// Which calendar columns to derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalendarColumns {
    /// `year`, `month`.
    YearMonth,
    /// `year`, `month`, `dow`, `hour`.
    Full,
}

/// Cleans a raw crime table.
#[must_use]
pub fn clean_crime(mut table: Table, source: &SourceConfig) -> Table {
    standardize_columns(&mut table);

    let configured = normalize_name(&source.date_column);
    let date_column = if table.has_column(&configured) {
        Some(configured)
    } else {
        DATE_COLUMN_FALLBACKS
            .iter()
            .find(|alt| table.has_column(alt))
            .map(ToString::to_string)
    };

    let dropped = enrich_dates(&mut table, date_column.as_deref(), CalendarColumns::Full);

    if let Some(type_column) = source.type_column.as_deref().map(normalize_name) {
        map_categories(&mut table, &type_column);
    }

    let duplicates = table.dedup_rows();
    log::info!(
        "Cleaned {} rows: {} (dropped {dropped} unparseable, {duplicates} duplicate)",
        Dataset::Crime,
        table.len()
    );
    table
}

/// Cleans a raw tourism table.
#[must_use]
pub fn clean_tourism(mut table: Table, source: &SourceConfig) -> Table {
    standardize_columns(&mut table);

    let date_column = normalize_name(&source.date_column);
    let date_column = table.has_column(&date_column).then_some(date_column);

    let dropped = enrich_dates(
        &mut table,
        date_column.as_deref(),
        CalendarColumns::YearMonth,
    );

    let duplicates = table.dedup_rows();
    log::info!(
        "Cleaned {} rows: {} (dropped {dropped} unparseable, {duplicates} duplicate)",
        Dataset::Tourism,
        table.len()
    );
    table
}

/// Lower-cases and trims every column name.
pub fn standardize_columns(table: &mut Table) {
    table.rename_columns(normalize_name);
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Parses `date_column`, drops rows that fail to parse, rewrites the column
/// in canonical form, and appends the derived calendar columns. Returns the
/// number of dropped rows.
///
/// Without a date column every row is dropped.
fn enrich_dates(table: &mut Table, date_column: Option<&str>, columns: CalendarColumns) -> usize {
    let before = table.len();
    let Some(index) = date_column.and_then(|name| table.column_index(name)) else {
        log::warn!("No date column found; dropping all {before} rows");
        table.retain_rows(|_| false);
        return before;
    };

    let (names, rows) = std::mem::take(table).into_parts();
    let date_name = names[index].clone();
    let (rows, parsed): (Vec<Vec<String>>, Vec<NaiveDateTime>) = rows
        .into_iter()
        .filter_map(|row| {
            let dt = parse_date(row.get(index).map_or("", String::as_str))?;
            Some((row, dt))
        })
        .unzip();
    *table = Table::with_rows(names, rows);

    table.set_column(
        &date_name,
        parsed
            .iter()
            .map(|dt| dt.format(CANONICAL_FORMAT).to_string())
            .collect(),
    );

    let parts: Vec<CalendarParts> = parsed.into_iter().map(CalendarParts::from).collect();
    table.set_column("year", parts.iter().map(|p| p.year.to_string()).collect());
    table.set_column("month", parts.iter().map(|p| p.month.to_string()).collect());
    if columns == CalendarColumns::Full {
        table.set_column(
            "dow",
            parts
                .iter()
                .map(|p| weekday_name(p.weekday).to_string())
                .collect(),
        );
        table.set_column("hour", parts.iter().map(|p| p.hour.to_string()).collect());
    }

    before - table.len()
}

/// Adds the [`CATEGORY_COLUMN`] from `type_column`, if that column exists.
fn map_categories(table: &mut Table, type_column: &str) {
    let Some(index) = table.column_index(type_column) else {
        log::debug!("Type column {type_column:?} not present; skipping category mapping");
        return;
    };

    let categories = table
        .column_values(index)
        .map(|value| map_crime_category(value).to_string())
        .collect();
    table.set_column(CATEGORY_COLUMN, categories);
}
