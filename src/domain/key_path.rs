//! Dotted setting paths.
//!
//! A path addresses a whole category (`SEO`), a single setting
//! (`AI.dailyCostLimit`) or one field nested inside a structured setting value
//! (`AI.imageGeneration.enabled`). Parsing never rejects a path; each caller
//! enforces the arity it accepts.

use std::fmt;

const SEPARATOR: char = '.';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    raw: String,
    segments: Vec<String>,
}

impl KeyPath {
    /// Split `path` on `.` without validating the segment count.
    pub fn parse(path: &str) -> Self {
        Self {
            raw: path.to_string(),
            segments: path.split(SEPARATOR).map(str::to_string).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// True when any segment is empty (`"a..b"`, `".a"`, `""`).
    pub fn has_blank_segment(&self) -> bool {
        self.segments.iter().any(|segment| segment.trim().is_empty())
    }

    pub fn category(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or_default()
    }

    pub fn key_name(&self) -> Option<&str> {
        self.segments.get(1).map(String::as_str)
    }

    pub fn field(&self) -> Option<&str> {
        self.segments.get(2).map(String::as_str)
    }

    /// Returns `(category, key_name)` when the path has exactly two non-blank segments.
    pub fn as_pair(&self) -> Option<(&str, &str)> {
        match self.segments.as_slice() {
            [category, key_name] if !self.has_blank_segment() => {
                Some((category.as_str(), key_name.as_str()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
