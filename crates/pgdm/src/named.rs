//! Named bind parameters.
//!
//! Generated statements and the `custom_*` escape hatches use `:name` placeholders.
//! Postgres only understands positional `$1, $2, ...`, so right before execution
//! [`NamedParams::bind_to`] rewrites the SQL text and orders the values to match.
//!
//! The rewrite leaves these regions untouched:
//! - string literals (`'it''s :not a param'`)
//! - quoted identifiers (`"col:name"`)
//! - dollar-quoted bodies (`$body$ ... $body$`)
//! - `--` line comments and `/* */` block comments
//! - `::type` casts

use crate::error::{DmError, DmResult};
use indexmap::IndexMap;
use std::fmt::Write;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// A single bound value.
pub type Param = Arc<dyn ToSql + Send + Sync>;

/// Insertion-ordered mapping of placeholder name to bound value.
#[derive(Debug, Clone, Default)]
pub struct NamedParams {
    values: IndexMap<String, Param>,
}

impl NamedParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chainable bind. A repeated name replaces the earlier value.
    pub fn bind<T>(mut self, name: impl Into<String>, value: T) -> Self
    where
        T: ToSql + Send + Sync + 'static,
    {
        self.values.insert(name.into(), Arc::new(value));
        self
    }

    /// Add a binding, rejecting a name that is already bound.
    pub(crate) fn insert_unique(&mut self, name: String, value: Param) -> DmResult<()> {
        if self.values.contains_key(&name) {
            return Err(DmError::validation(format!(
                "Placeholder ':{name}' is generated twice in one statement"
            )));
        }
        self.values.insert(name, value);
        Ok(())
    }

    /// Move all bindings of `other` into `self`, rejecting name collisions.
    pub(crate) fn merge(&mut self, other: NamedParams) -> DmResult<()> {
        for (name, value) in other.values {
            self.insert_unique(name, value)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Placeholder names in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Rewrite `:name` placeholders in `sql` to `$n` and collect the values in order.
    ///
    /// Every placeholder must have a value and every value must be used. A name used
    /// more than once maps to the same `$n`.
    pub fn bind_to(&self, sql: &str) -> DmResult<PositionalSql> {
        let mut out = String::with_capacity(sql.len());
        let mut order: IndexMap<&str, usize> = IndexMap::new();
        let bytes = sql.as_bytes();
        let mut copied = 0;
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'\'' => {
                    let escapes = is_escape_string_prefix(bytes, i);
                    i = skip_quoted(bytes, i, b'\'', escapes);
                }
                b'"' => i = skip_quoted(bytes, i, b'"', false),
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    i = bytes[i..]
                        .iter()
                        .position(|&b| b == b'\n')
                        .map_or(bytes.len(), |p| i + p + 1);
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    i = find(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2);
                }
                // `$` inside an identifier such as `a$b$c` never opens a dollar quote.
                b'$' if i > 0 && (is_name_char(bytes[i - 1]) || bytes[i - 1] == b'$') => i += 1,
                b'$' => i = skip_dollar_quoted(bytes, i),
                b':' if bytes.get(i + 1) == Some(&b':') => i += 2,
                b':' if bytes.get(i + 1).is_some_and(|&b| is_name_start(b)) => {
                    let start = i + 1;
                    let end = bytes[start..]
                        .iter()
                        .position(|&b| !is_name_char(b))
                        .map_or(bytes.len(), |p| start + p);
                    let name = &sql[start..end];
                    if !self.values.contains_key(name) {
                        return Err(DmError::validation(format!(
                            "No value bound for placeholder ':{name}'"
                        )));
                    }
                    let next = order.len() + 1;
                    let index = *order.entry(name).or_insert(next);

                    out.push_str(&sql[copied..i]);
                    let _ = write!(&mut out, "${index}");
                    copied = end;
                    i = end;
                }
                _ => i += 1,
            }
        }
        out.push_str(&sql[copied..]);

        if let Some(unused) = self.names().find(|name| !order.contains_key(name)) {
            return Err(DmError::validation(format!(
                "Bound parameter '{unused}' is not used by the statement"
            )));
        }

        let params = order
            .keys()
            .filter_map(|name| self.values.get(*name).cloned())
            .collect();
        Ok(PositionalSql { sql: out, params })
    }
}

/// SQL with `$n` placeholders and its values in positional order.
#[derive(Debug, Clone)]
pub struct PositionalSql {
    pub sql: String,
    pub params: Vec<Param>,
}

impl PositionalSql {
    /// Parameter refs compatible with `tokio-postgres`.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }
}

fn is_name_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

fn is_name_char(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

/// Whether the quote at `open` starts an `E'...'` escape string.
fn is_escape_string_prefix(bytes: &[u8], open: usize) -> bool {
    match open.checked_sub(1).map(|p| bytes[p]) {
        Some(b'E' | b'e') => open < 2 || !is_name_char(bytes[open - 2]),
        _ => false,
    }
}

/// Skip a `'...'` or `"..."` region (doubled delimiter escapes itself, and so does
/// a backslash when `backslash_escapes` is set).
/// Returns the index just past the closing delimiter, or the end of input.
fn skip_quoted(bytes: &[u8], open: usize, delim: u8, backslash_escapes: bool) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if backslash_escapes && bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == delim {
            if bytes.get(i + 1) == Some(&delim) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Skip `$tag$ ... $tag$`. A `$` that does not open a dollar quote (e.g. `$1`)
/// is stepped over as a single byte.
fn skip_dollar_quoted(bytes: &[u8], open: usize) -> usize {
    let mut i = open + 1;
    if bytes.get(i).is_some_and(|&b| is_name_start(b)) {
        while bytes.get(i).is_some_and(|&b| is_name_char(b)) {
            i += 1;
        }
    }
    if bytes.get(i) != Some(&b'$') {
        return open + 1;
    }
    let tag = &bytes[open..=i];
    find(bytes, i + 1, tag).map_or(bytes.len(), |p| p + tag.len())
}
