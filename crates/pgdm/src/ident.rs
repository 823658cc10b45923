//! SQL identifier validation.
//!
//! Table and column names are the only caller input interpolated into generated
//! SQL text, so every one of them goes through [`Ident::parse`] first.
//!
//! - Unquoted parts must match `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL; `"` is escaped as `""`
//! - Parts are separated by `.` (`schema.table`, `table.column`)

use crate::error::{DmError, DmResult};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    /// Unquoted identifier: must match `[A-Za-z_][A-Za-z0-9_$]*`.
    Unquoted(String),
    /// Quoted identifier: allows any characters except NUL.
    Quoted(String),
}

impl IdentPart {
    fn name(&self) -> &str {
        match self {
            IdentPart::Unquoted(s) | IdentPart::Quoted(s) => s,
        }
    }
}

/// A validated SQL identifier (schema, table or column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    parts: Vec<IdentPart>,
}

impl Ident {
    /// Parse an identifier, supporting dotted and quoted forms.
    ///
    /// - Dotted: `schema.table`
    /// - Quoted: `"CamelCase"."UserTable"`
    /// - Mixed: `public."UserTable".id`
    pub fn parse(s: &str) -> DmResult<Self> {
        if s.is_empty() {
            return Err(DmError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(DmError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();
        loop {
            let part = if chars.peek() == Some(&'"') {
                parse_quoted(&mut chars)?
            } else {
                parse_unquoted(&mut chars, s)?
            };
            parts.push(part);

            match chars.next() {
                None => break,
                Some('.') if chars.peek().is_none() => {
                    return Err(DmError::validation(format!(
                        "Trailing '.' in identifier '{s}'"
                    )));
                }
                Some('.') => {}
                Some(c) => {
                    return Err(DmError::validation(format!(
                        "Expected '.' between identifier parts in '{s}', got '{c}'"
                    )));
                }
            }
        }

        Ok(Self { parts })
    }

    /// The identifier parts, outermost first.
    pub fn parts(&self) -> &[IdentPart] {
        &self.parts
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(s) => out.push_str(s),
                IdentPart::Quoted(s) => {
                    out.push('"');
                    out.push_str(&s.replace('"', "\"\""));
                    out.push('"');
                }
            }
        }
    }

    /// Placeholder-safe form of the identifier: parts joined by `_`, every character
    /// outside `[A-Za-z0-9_]` replaced by `_`.
    ///
    /// Used to derive deterministic bind-parameter names such as `where_users_role`.
    pub fn placeholder_stem(&self) -> String {
        let mut out = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('_');
            }
            out.extend(part.name().chars().map(|c| {
                if c == '_' || c.is_ascii_alphanumeric() {
                    c
                } else {
                    '_'
                }
            }));
        }
        out
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

fn parse_quoted(chars: &mut Peekable<Chars<'_>>) -> DmResult<IdentPart> {
    chars.next(); // opening quote
    let mut name = String::new();
    loop {
        match chars.next() {
            Some('"') if chars.peek() == Some(&'"') => {
                chars.next();
                name.push('"');
            }
            Some('"') => break,
            Some(c) => name.push(c),
            None => return Err(DmError::validation("Unclosed quoted identifier")),
        }
    }
    if name.is_empty() {
        return Err(DmError::validation("Empty quoted identifier"));
    }
    Ok(IdentPart::Quoted(name))
}

fn parse_unquoted(chars: &mut Peekable<Chars<'_>>, whole: &str) -> DmResult<IdentPart> {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c == '.' || c == '"' {
            break;
        }
        let ok = if name.is_empty() {
            c == '_' || c.is_ascii_alphabetic()
        } else {
            c == '_' || c == '$' || c.is_ascii_alphanumeric()
        };
        if !ok {
            return Err(DmError::validation(format!(
                "Invalid character '{c}' in identifier '{whole}'"
            )));
        }
        name.push(c);
        chars.next();
    }
    if name.is_empty() {
        return Err(DmError::validation(format!(
            "Empty identifier segment in '{whole}'"
        )));
    }
    Ok(IdentPart::Unquoted(name))
}

/// Validate one entry of a SELECT column list.
///
/// Accepts `*`, `table.*` and any identifier accepted by [`Ident::parse`].
pub(crate) fn select_column_sql(column: &str) -> DmResult<String> {
    if column == "*" {
        return Ok(column.to_string());
    }
    if let Some(table) = column.strip_suffix(".*") {
        return Ok(format!("{}.*", Ident::parse(table)?));
    }
    Ok(Ident::parse(column)?.to_sql())
}
