//! Normalized storage location URIs.
//!
//! A [`LocationUri`] is the canonical form of a table storage location. All
//! path construction for a location goes through [`LocationUri::join`] so a
//! composed file path can never escape the location it was derived from.
//!
//! Accepted inputs:
//! - `file:///absolute/path` (local filesystem)
//! - `memory:///key/space` (in-memory backend, used in tests)
//! - a bare absolute path, normalized to the `file` scheme
//!
//! Normalization removes empty and trailing path segments and rejects `.`
//! and `..` segments outright rather than resolving them.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Storage scheme of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Local filesystem (`file://`).
    File,
    /// In-memory object store (`memory://`), used in tests.
    Memory,
}

impl Scheme {
    /// Returns the scheme name as it appears in a URI.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed, normalized storage location.
///
/// Immutable once constructed. The `path` component is always absolute, has
/// no trailing slash, and contains no `.`/`..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationUri {
    scheme: Scheme,
    path: String,
}

impl LocationUri {
    /// Parses and normalizes a location string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the string has an unsupported
    /// scheme, a relative path, traversal (`..`) segments, or characters the
    /// connector refuses to place in storage paths (`%`, `\`, control
    /// characters).
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidInput("location is empty".to_string()));
        }

        let (scheme, rest) = if let Some(rest) = raw.strip_prefix("file://") {
            (Scheme::File, rest)
        } else if let Some(rest) = raw.strip_prefix("memory://") {
            (Scheme::Memory, rest)
        } else if raw.starts_with('/') {
            (Scheme::File, raw)
        } else if let Some((scheme, _)) = raw.split_once("://") {
            return Err(Error::InvalidInput(format!(
                "unsupported location scheme '{scheme}' (expected file or memory)"
            )));
        } else {
            return Err(Error::InvalidInput(format!(
                "location must be an absolute path or URI: {raw}"
            )));
        };

        let path = Self::normalize_path(rest)?;
        Ok(Self { scheme, path })
    }

    fn normalize_path(raw: &str) -> Result<String> {
        if !raw.starts_with('/') {
            return Err(Error::InvalidInput(format!(
                "location path must be absolute: {raw}"
            )));
        }

        let mut segments = Vec::new();
        for segment in raw.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            }
            Self::validate_segment(segment)?;
            segments.push(segment);
        }

        if segments.is_empty() {
            return Err(Error::InvalidInput(
                "location path must name at least one directory".to_string(),
            ));
        }

        Ok(format!("/{}", segments.join("/")))
    }

    fn validate_segment(segment: &str) -> Result<()> {
        if segment == ".." {
            return Err(Error::InvalidInput(
                "location path cannot contain traversal segments".to_string(),
            ));
        }
        if segment.contains('\\') || segment.contains('%') {
            return Err(Error::InvalidInput(format!(
                "location path segment contains unsupported characters: {segment}"
            )));
        }
        if segment.chars().any(char::is_control) {
            return Err(Error::InvalidInput(
                "location path segment contains control characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the scheme of this location.
    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Returns the absolute path component (no trailing slash).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Appends a single path segment, producing a new location.
    ///
    /// Only separator-free names are accepted, so a path composed through
    /// this method cannot leave the location it was derived from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `name` is empty, contains a path
    /// separator, or is a traversal segment.
    pub fn join(&self, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "path segment cannot be empty".to_string(),
            ));
        }
        if name.contains('/') {
            return Err(Error::InvalidInput(format!(
                "path segment cannot contain separators: {name}"
            )));
        }
        Self::validate_segment(name)?;
        if name == "." {
            return Err(Error::InvalidInput(
                "path segment cannot be '.'".to_string(),
            ));
        }

        Ok(Self {
            scheme: self.scheme,
            path: format!("{}/{name}", self.path),
        })
    }

    /// Returns true if `path` (a backend storage key) lies under this
    /// location.
    #[must_use]
    pub fn contains_path(&self, path: &str) -> bool {
        path.strip_prefix(&self.path)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for LocationUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.path)
    }
}

impl FromStr for LocationUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
