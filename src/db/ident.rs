//! Identifier and literal handling for DDL that cannot use bind parameters.
//!
//! Every name rendered into `CREATE DATABASE`, `CREATE ROLE`, `GRANT` and the
//! quota DDL goes through [`Ident::new`], which only accepts lower-case
//! PostgreSQL identifiers, and is then rendered quoted.

use std::fmt;

use super::error::ProvisionError;

/// PostgreSQL truncates identifiers to NAMEDATALEN - 1 bytes.
pub const MAX_IDENT_LEN: usize = 63;

/// A validated SQL identifier. `Display` renders it double-quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    pub fn new(raw: &str) -> Result<Self, ProvisionError> {
        if is_valid_identifier(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ProvisionError::InvalidIdentifier(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote_ident(&self.0))
    }
}

/// Lower-case letter or underscore first, then lower-case letters, digits and
/// underscores, at most 63 bytes.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let first_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    first_ok
        && s.len() <= MAX_IDENT_LEN
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes.
///
/// Relies on `standard_conforming_strings = on` (the default since 9.1), under
/// which backslashes inside `'...'` are literal.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
