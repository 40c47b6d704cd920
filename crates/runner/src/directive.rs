// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Meta-directives and client variables
//!
//! Statement text is classified once, before execution, into a SQL command or
//! a client-side directive. Directives start with a backslash and are handled
//! by the harness; they never reach the engine.
//!
//! | Directive | Effect |
//! |---|---|
//! | `\set NAME [VALUE...]` | set a variable (values are concatenated) |
//! | `\unset NAME` | remove a variable |
//! | `\c`, `\connect` | open a new connection |
//! | `\pset null 'TEXT'` | NULL display in diagnostics |
//! | `\pset OPTION ...` | accepted, no effect |
//! | `\o [TARGET]` | suppress (with target) or restore result output |
//! | `\echo`, `\qecho` | no effect |
//!
//! SQL text ending in `\gset [PREFIX]` is executed and its single result row is
//! stored into variables.

use std::collections::BTreeMap;

use crate::error::DirectiveError;

/// A classified statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sql {
        sql: String,
        /// Variable prefix when the statement ends with `\gset`
        gset: Option<String>,
    },
    Directive(Directive),
}

/// A client-side directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Set { name: String, value: String },
    Unset { name: String },
    Connect { args: Vec<String> },
    PsetNull(String),
    /// Formatting option without effect on comparison
    Pset { option: String },
    /// `Some` redirects query output away, `None` restores it
    Output { target: Option<String> },
    Echo(String),
}

impl Command {
    /// Classify statement text
    ///
    /// # Errors
    ///
    /// Returns a `DirectiveError` for unknown or malformed directives.
    pub fn parse(text: &str) -> Result<Command, DirectiveError> {
        let trimmed = text.trim();
        if let Some(rest) = trimmed.strip_prefix('\\') {
            return parse_directive(rest).map(Command::Directive);
        }

        if let Some((sql, prefix)) = split_gset(trimmed) {
            return Ok(Command::Sql {
                sql: sql.to_string(),
                gset: Some(prefix.to_string()),
            });
        }

        Ok(Command::Sql {
            sql: text.to_string(),
            gset: None,
        })
    }
}

fn parse_directive(rest: &str) -> Result<Directive, DirectiveError> {
    let (command, args) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, ""),
    };
    let args = split_args(command, args)?;

    match command {
        "set" => {
            let mut args = args.into_iter();
            let name = args.next().ok_or_else(|| missing(command))?;
            if !is_variable_name(&name) {
                return Err(DirectiveError::InvalidArgument {
                    command: command.to_string(),
                    message: format!("invalid variable name: \"{}\"", name),
                });
            }
            Ok(Directive::Set {
                name,
                value: args.collect(),
            })
        }
        "unset" => {
            let name = args.into_iter().next().ok_or_else(|| missing(command))?;
            Ok(Directive::Unset { name })
        }
        "c" | "connect" => Ok(Directive::Connect { args }),
        "pset" => {
            let mut args = args.into_iter();
            let option = args.next().ok_or_else(|| missing(command))?;
            if option == "null" {
                Ok(Directive::PsetNull(args.next().unwrap_or_default()))
            } else {
                Ok(Directive::Pset { option })
            }
        }
        "o" | "out" => Ok(Directive::Output {
            target: args.into_iter().next(),
        }),
        "echo" | "qecho" => Ok(Directive::Echo(args.join(" "))),
        other => Err(DirectiveError::Unknown(other.to_string())),
    }
}

fn missing(command: &str) -> DirectiveError {
    DirectiveError::MissingArgument {
        command: command.to_string(),
    }
}

/// Split directive arguments on whitespace, honoring single quotes (`''` escapes a quote)
fn split_args(command: &str, input: &str) -> Result<Vec<String>, DirectiveError> {
    let mut args = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut arg = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
            if c != '\'' {
                arg.push(c);
                continue;
            }
            loop {
                match chars.next() {
                    Some('\'') if chars.peek() == Some(&'\'') => {
                        chars.next();
                        arg.push('\'');
                    }
                    Some('\'') => break,
                    Some(inner) => arg.push(inner),
                    None => {
                        return Err(DirectiveError::UnterminatedQuote {
                            command: command.to_string(),
                        });
                    }
                }
            }
        }
        args.push(arg);
    }

    Ok(args)
}

/// Split `SELECT ... \gset [prefix]` into the SQL and the prefix
fn split_gset(text: &str) -> Option<(&str, &str)> {
    let pos = text.rfind("\\gset")?;
    let tail = text[pos + "\\gset".len()..].trim();
    if !(tail.is_empty() || is_variable_name(tail)) {
        return None;
    }
    Some((text[..pos].trim_end(), tail))
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Client-side variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn unset(&mut self, name: &str) {
        self.values.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Interpolate `:name`, `:'name'` and `:"name"` into SQL text
    ///
    /// Quoted literals, quoted identifiers, dollar-quoted bodies, comments and
    /// `::` casts are left alone, as are references to unknown variables.
    pub fn substitute(&self, sql: &str) -> String {
        if self.values.is_empty() || !sql.contains(':') {
            return sql.to_string();
        }

        let chars: Vec<char> = sql.chars().collect();
        let mut out = String::with_capacity(sql.len());
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\'' => {
                    let escapes = i > 0 && matches!(chars[i - 1], 'E' | 'e');
                    let end = skip_quoted(&chars, i, '\'', escapes);
                    out.extend(&chars[i..end]);
                    i = end;
                }
                '"' => {
                    let end = skip_quoted(&chars, i, '"', false);
                    out.extend(&chars[i..end]);
                    i = end;
                }
                '-' if chars.get(i + 1) == Some(&'-') => {
                    let end = chars[i..]
                        .iter()
                        .position(|&c| c == '\n')
                        .map_or(chars.len(), |p| i + p);
                    out.extend(&chars[i..end]);
                    i = end;
                }
                '$' => {
                    let end = skip_dollar_quoted(&chars, i);
                    out.extend(&chars[i..end]);
                    i = end;
                }
                ':' if chars.get(i + 1) == Some(&':') => {
                    out.push_str("::");
                    i += 2;
                }
                ':' => {
                    let (replacement, end) = self.interpolate(&chars, i);
                    match replacement {
                        Some(text) => out.push_str(&text),
                        None => out.extend(&chars[i..end]),
                    }
                    i = end;
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            }
        }

        out
    }

    /// Resolve the reference starting at `start` (a colon); returns the
    /// replacement, if any, and the index after the reference
    fn interpolate(&self, chars: &[char], start: usize) -> (Option<String>, usize) {
        match chars.get(start + 1) {
            Some(&quote) if quote == '\'' || quote == '"' => {
                let name_start = start + 2;
                let Some(len) = chars[name_start..].iter().position(|&c| c == quote) else {
                    return (None, start + 1);
                };
                let name: String = chars[name_start..name_start + len].iter().collect();
                let end = name_start + len + 1;
                match self.get(&name) {
                    Some(value) if is_variable_name(&name) => {
                        (Some(quote_with(value, quote)), end)
                    }
                    _ => (None, end),
                }
            }
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                let len = chars[start + 1..]
                    .iter()
                    .position(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
                    .unwrap_or(chars.len() - start - 1);
                let name: String = chars[start + 1..start + 1 + len].iter().collect();
                let end = start + 1 + len;
                (self.get(&name).map(str::to_string), end)
            }
            _ => (None, start + 1),
        }
    }
}

fn quote_with(value: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    format!(
        "{q}{}{q}",
        value.replace(quote, &doubled),
        q = quote
    )
}

/// Index just past a quoted section starting at `start`
fn skip_quoted(chars: &[char], start: usize, quote: char, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if backslash_escapes && c == '\\' {
            i += 2;
            continue;
        }
        if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// Index just past a `$tag$...$tag$` body, or past the `$` if it opens none
fn skip_dollar_quoted(chars: &[char], start: usize) -> usize {
    let tag_len = chars[start + 1..]
        .iter()
        .position(|&c| c == '$')
        .filter(|&len| {
            chars[start + 1..start + 1 + len]
                .iter()
                .all(|c| c.is_ascii_alphanumeric() || *c == '_')
                && !chars
                    .get(start + 1)
                    .is_some_and(|c| c.is_ascii_digit())
        });
    let Some(tag_len) = tag_len else {
        return start + 1;
    };

    let tag = &chars[start..start + tag_len + 2];
    let body = start + tag.len();
    (body..chars.len())
        .find(|&i| chars[i..].starts_with(tag))
        .map_or(chars.len(), |i| i + tag.len())
}
