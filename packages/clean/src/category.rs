//! Crime category mapping.
//!
//! Free-text offense descriptions are mapped to a [`CrimeCategory`] by
//! case-insensitive substring search against an ordered keyword table. The
//! first keyword found in the text decides the category.

use data_coyote_table_models::CrimeCategory;

/// Ordered `(keyword, category)` pairs. Earlier entries win when a value
/// contains more than one keyword.
pub const CATEGORY_KEYWORDS: &[(&str, CrimeCategory)] = &[
    ("ASSAULT", CrimeCategory::Violent),
    ("ROBBERY", CrimeCategory::Violent),
    ("HOMICIDE", CrimeCategory::Violent),
    ("BURGLARY", CrimeCategory::Property),
    ("LARCENY", CrimeCategory::Property),
    ("MOTOR VEHICLE THEFT", CrimeCategory::Property),
    ("VANDALISM", CrimeCategory::Property),
    ("DRUG", CrimeCategory::Other),
    ("DUI", CrimeCategory::Other),
];

/// Maps a raw offense description using [`CATEGORY_KEYWORDS`].
#[must_use]
pub fn map_crime_category(raw: &str) -> CrimeCategory {
    map_crime_category_with(raw, CATEGORY_KEYWORDS)
}

/// Maps a raw offense description using a caller-supplied keyword table.
///
/// Empty or unmatched values map to [`CrimeCategory::Other`].
#[must_use]
pub fn map_crime_category_with(raw: &str, keywords: &[(&str, CrimeCategory)]) -> CrimeCategory {
    let upper = raw.trim().to_uppercase();
    if upper.is_empty() {
        return CrimeCategory::Other;
    }

    keywords
        .iter()
        .find(|(keyword, _)| upper.contains(&keyword.to_uppercase()))
        .map_or(CrimeCategory::Other, |(_, category)| *category)
}
