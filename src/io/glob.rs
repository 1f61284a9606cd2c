//! Glob-style location patterns
//!
//! Supports `*` and `?` within one path segment, `**` across segments, and
//! `[...]` character classes (`[!...]` negates). A pattern that matches a
//! directory also matches every path beneath it.

use crate::error::{EtlError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

static REPEATED_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/{2,}").unwrap());

#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let normalized = normalize(pattern);
        let body = translate(&normalized)
            .map_err(|message| EtlError::source_read(pattern, message))?;
        let regex = Regex::new(&format!("^{}(?:/.*)?$", body))
            .map_err(|e| EtlError::source_read(pattern, e))?;
        Ok(GlobPattern {
            pattern: normalized,
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Match a `/`-separated path relative to the source root
    pub fn is_match(&self, relative_path: &str) -> bool {
        self.regex.is_match(relative_path)
    }

    /// Leading segments that contain no wildcard; the walk starts there
    pub fn literal_prefix(&self) -> PathBuf {
        self.pattern
            .split('/')
            .take_while(|segment| !segment.contains(['*', '?', '[']))
            .collect()
    }
}

fn normalize(pattern: &str) -> String {
    let trimmed = pattern.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    REPEATED_SLASH
        .replace_all(trimmed.trim_end_matches('/'), "/")
        .into_owned()
}

fn translate(pattern: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // `**/` may also match zero segments
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                let mut class = String::from("[");
                if chars.peek() == Some(&'!') {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    if c == '\\' || c == '[' {
                        class.push('\\');
                    }
                    class.push(c);
                }
                if !closed {
                    return Err(format!("unclosed character class in '{}'", pattern));
                }
                class.push(']');
                out.push_str(&class);
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    Ok(out)
}
