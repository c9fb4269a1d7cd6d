//! Module: sql::bind
//! Responsibility: resolve `$name` placeholders into positional parameters.
//! Does not own: statement rendering or execution.

use crate::{config::Dialect, db::executor::StorageFault, sql::value::SqlValue};

///
/// Params
///
/// Named parameter values in insertion order. Setting an existing name
/// replaces its value.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    values: Vec<(String, SqlValue)>,
}

impl Params {
    #[must_use]
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> &mut Self {
        let name = name.into();
        let value = value.into();

        match self.values.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((name, value)),
        }

        self
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Merge `other` into `self`; values from `other` win on name clashes.
    pub fn extend(&mut self, other: Self) {
        for (name, value) in other.values {
            self.set(name, value);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.values
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

///
/// BoundStatement
///
/// SQL text with positional placeholders plus the values for them, in
/// position order. This is what an executor receives.
///

#[derive(Clone, Debug, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Rewrite every `$name` in `sql` to the dialect's positional form.
///
/// Each distinct name is assigned one position on first appearance and
/// reused afterwards. Single-quoted literals are copied verbatim. Supplied
/// parameters that the text never references are ignored.
pub fn bind(sql: &str, params: &Params, dialect: Dialect) -> Result<BoundStatement, StorageFault> {
    let bytes = sql.as_bytes();
    let len = bytes.len();

    let mut out = String::with_capacity(len);
    let mut names: Vec<&str> = Vec::new();
    let mut values = Vec::new();
    let mut copied = 0;
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'\'' => i = skip_literal(bytes, i),
            b'$' if i + 1 < len && is_ident_start(bytes[i + 1]) => {
                let mut end = i + 1;
                while end < len && is_ident_continue(bytes[end]) {
                    end += 1;
                }
                let name = &sql[i + 1..end];

                let position = match names.iter().position(|existing| *existing == name) {
                    Some(index) => index + 1,
                    None => {
                        let value = params
                            .get(name)
                            .ok_or_else(|| StorageFault::UnboundParameter {
                                name: name.to_string(),
                            })?;
                        names.push(name);
                        values.push(value.clone());
                        names.len()
                    }
                };

                out.push_str(&sql[copied..i]);
                out.push_str(&dialect.placeholder(position));
                copied = end;
                i = end;
            }
            _ => i += 1,
        }
    }
    out.push_str(&sql[copied..]);

    Ok(BoundStatement { sql: out, values })
}

// Return the index just past the literal opening at `start`.
// A doubled quote inside the literal is an escaped quote.
fn skip_literal(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }

    bytes.len()
}

const fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

const fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}
