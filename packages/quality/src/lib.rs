#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Quality gates run between pipeline stages.
//!
//! A failed gate aborts the run; nothing downstream should see a table that
//! is empty or missing the columns it depends on.

use data_coyote_table_models::Table;

/// Columns every cleaned table must carry.
pub const REQUIRED_COLUMNS: &[&str] = &["year", "month"];

/// A failed quality expectation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QualityError {
    /// The table has no rows.
    #[error("{name} is empty")]
    Empty {
        /// Label of the checked table.
        name: String,
    },

    /// Required columns are absent.
    #[error("{name} missing columns: {missing:?}")]
    MissingColumns {
        /// Label of the checked table.
        name: String,
        /// Absent columns, in the order they were required.
        missing: Vec<String>,
    },
}

/// Fails if `table` has no rows.
///
/// # Errors
///
/// Returns [`QualityError::Empty`] when the table has zero rows.
pub fn expect_non_empty(table: &Table, name: &str) -> Result<(), QualityError> {
    if table.is_empty() {
        return Err(QualityError::Empty {
            name: name.to_string(),
        });
    }
    log::debug!("{name}: {} rows", table.len());
    Ok(())
}

/// Fails if any of `columns` is absent from `table`.
///
/// # Errors
///
/// Returns [`QualityError::MissingColumns`] listing every absent column.
pub fn expect_columns(table: &Table, columns: &[&str], name: &str) -> Result<(), QualityError> {
    let missing: Vec<String> = columns
        .iter()
        .filter(|column| !table.has_column(column))
        .map(ToString::to_string)
        .collect();

    if missing.is_empty() {
        log::debug!("{name}: required columns present");
        Ok(())
    } else {
        Err(QualityError::MissingColumns {
            name: name.to_string(),
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct CaptureLogger(Mutex<Vec<String>>);

    impl log::Log for CaptureLogger {
        fn enabled(&self, _: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            self.0.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger(Mutex::new(Vec::new()));

    fn captured(needle: &str) -> bool {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);
        LOGGER.0.lock().unwrap().iter().any(|line| line == needle)
    }

    fn table(columns: &[&str], rows: usize) -> Table {
        Table::with_rows(
            columns.iter().map(ToString::to_string).collect(),
            vec![vec!["x".to_string(); columns.len()]; rows],
        )
    }

    #[test]
    fn non_empty_passes_with_rows() {
        assert_eq!(expect_non_empty(&table(&["a"], 1), "crime_raw"), Ok(()));
    }

    #[test]
    fn empty_table_fails_with_label() {
        let err = expect_non_empty(&table(&["a"], 0), "crime_raw").unwrap_err();
        assert_eq!(
            err,
            QualityError::Empty {
                name: "crime_raw".to_string()
            }
        );
        assert_eq!(err.to_string(), "crime_raw is empty");
    }

    #[test]
    fn header_only_table_is_empty() {
        assert!(expect_non_empty(&table(&["year", "month"], 0), "tourism_raw").is_err());
    }

    #[test]
    fn required_columns_present() {
        let t = table(&["date", "year", "month"], 2);
        assert_eq!(expect_columns(&t, REQUIRED_COLUMNS, "crime_clean"), Ok(()));
    }

    #[test]
    fn logs_when_required_columns_present() {
        assert!(!captured("tourism_clean: required columns present"));
        let t = table(&["year", "month"], 1);
        expect_columns(&t, REQUIRED_COLUMNS, "tourism_clean").unwrap();
        assert!(captured("tourism_clean: required columns present"));

        expect_columns(&table(&["date"], 1), REQUIRED_COLUMNS, "crime_check").unwrap_err();
        assert!(!captured("crime_check: required columns present"));
    }

    #[test]
    fn lists_every_missing_column_in_order() {
        let t = table(&["date"], 2);
        let err = expect_columns(&t, REQUIRED_COLUMNS, "crime_clean").unwrap_err();
        assert_eq!(
            err,
            QualityError::MissingColumns {
                name: "crime_clean".to_string(),
                missing: vec!["year".to_string(), "month".to_string()],
            }
        );
        assert_eq!(
            err.to_string(),
            r#"crime_clean missing columns: ["year", "month"]"#
        );
    }

    #[test]
    fn no_required_columns_always_passes() {
        assert_eq!(expect_columns(&table(&[], 0), &[], "x"), Ok(()));
    }
}
