//! Path pattern compilation.
//!
//! # Responsibilities
//! - Normalize an absolute path into segments (`.` dropped, `..` resolved)
//! - Turn a route declaration into literal and parameter parts
//!
//! # Design Decisions
//! - The root separator is implicit: `/` compiles to zero parts, so
//!   prefix concatenation never has to strip a leading root
//! - `..` that would climb above the root is rejected, not clamped
//! - A parameter always spans exactly one segment

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

/// Marks a segment as a named parameter (`/echo/:word`).
pub const PARAMETER_SIGIL: char = ':';

/// Errors raised while normalizing a path or request target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The string cannot be normalized to a well-formed absolute path.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
}

/// One compiled segment of a route declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Must equal the request segment byte-for-byte.
    Literal(String),
    /// Matches any segment and binds it under this name.
    Parameter(String),
}

/// An ordered sequence of [`Part`]s, compiled once at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathPattern {
    parts: Vec<Part>,
}

impl PathPattern {
    /// Compile an absolute path declaration such as `/users/:id/posts`.
    pub fn compile(path: &str) -> Result<Self, PathError> {
        if path.contains(['?', '#']) {
            return Err(PathError::InvalidPath(path.to_string()));
        }

        let parts = normalize_segments(path)?
            .into_iter()
            .map(|segment| match segment.strip_prefix(PARAMETER_SIGIL) {
                Some("") => Err(PathError::InvalidPath(path.to_string())),
                Some(name) => Ok(Part::Parameter(name.to_string())),
                None => decode_segment(segment).map(Part::Literal),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Number of segments this pattern consumes.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// A new pattern made of `self` followed by `other`.
    pub fn appending(&self, other: &PathPattern) -> PathPattern {
        let mut parts = Vec::with_capacity(self.parts.len() + other.parts.len());
        parts.extend_from_slice(&self.parts);
        parts.extend_from_slice(&other.parts);
        PathPattern { parts }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            return f.write_str("/");
        }
        for part in &self.parts {
            match part {
                Part::Literal(literal) => write!(f, "/{}", literal)?,
                Part::Parameter(name) => write!(f, "/{}{}", PARAMETER_SIGIL, name)?,
            }
        }
        Ok(())
    }
}

/// Split an absolute path into its normalized, still-encoded segments.
pub(crate) fn normalize_segments(path: &str) -> Result<Vec<&str>, PathError> {
    if !path.starts_with('/') {
        return Err(PathError::InvalidPath(path.to_string()));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::InvalidPath(path.to_string()));
                }
            }
            other => segments.push(other),
        }
    }
    Ok(segments)
}

/// Percent-decode one segment.
pub(crate) fn decode_segment(segment: &str) -> Result<String, PathError> {
    urlencoding::decode(segment)
        .map(Cow::into_owned)
        .map_err(|_| PathError::InvalidPath(segment.to_string()))
}
