//! Wire encoding for multi-value cells.
//!
//! A multi-value cell holds an ordered list of strings and travels between
//! stages as a single CSV cell joined with `", "`. Values containing the
//! delimiter are not escaped, so such a value splits into several on the way
//! back. Only the table reader and writer call into this module; everything
//! in memory works on `Vec<String>`.

pub const DELIMITER: &str = ", ";

pub fn encode<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|value| value.as_ref())
        .collect::<Vec<_>>()
        .join(DELIMITER)
}

/// Splits a joined cell. An absent cell decodes to a single `None` so that it
/// still counts as one aligned value during expansion.
pub fn decode(field: Option<&str>) -> Vec<Option<String>> {
    match field {
        None => vec![None],
        Some(raw) => raw
            .split(DELIMITER)
            .map(|value| Some(value.to_string()))
            .collect(),
    }
}
