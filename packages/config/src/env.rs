//! Environment variable helpers.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::ConfigError;

/// Matches `${NAME}` or `$NAME`.
static VAR_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .unwrap_or_else(|_| unreachable!())
});

/// Expands `$NAME` and `${NAME}` references using `lookup`. References for
/// which `lookup` returns `None` are left unchanged.
#[must_use]
pub fn expand_env_with(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    VAR_REF
        .replace_all(s, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            lookup(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Returns the trimmed value of `name`, or `None` if it is unset or blank.
#[must_use]
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Returns the trimmed value of `name`, or `default` if it is unset or
/// blank.
#[must_use]
pub fn env_or(name: &str, default: &str) -> String {
    env_var(name).unwrap_or_else(|| default.to_string())
}

/// Returns the trimmed value of `name`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnv`] if the variable is unset or blank.
pub fn require_env(name: &str) -> Result<String, ConfigError> {
    env_var(name).ok_or_else(|| ConfigError::MissingEnv {
        name: name.to_string(),
    })
}

/// Loads a `.env` file from the working directory into the process
/// environment. A missing file is not an error.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("Ignoring unreadable .env file: {e}"),
    }
}
