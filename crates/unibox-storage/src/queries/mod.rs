// SPDX-FileCopyrightText: 2026 Unibox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query operations, one module per table.

pub mod conversations;
pub mod messages;
pub mod retry;

/// Parse a TEXT column into a strum-backed enum, reporting the column index
/// on failure so rusqlite errors stay diagnosable.
pub(crate) fn parse_text_col<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
{
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unrecognized value: {value}").into(),
        )
    })
}
