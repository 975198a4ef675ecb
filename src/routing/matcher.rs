//! Request path matching.
//!
//! # Responsibilities
//! - Decompose a request target into decoded path segments and query pairs
//! - Match segments against a compiled pattern behind an accumulated prefix
//! - Merge query pairs into the positional bindings
//!
//! # Design Decisions
//! - Exact segment-count equality: no wildcards, no optional trailing parts
//! - Literal comparison is case-sensitive and happens on decoded segments
//! - Descending into a sub-router yields a new matcher; the original is untouched
//! - Positional bindings win over query pairs of the same name; among
//!   duplicate query keys the last one wins

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Uri;
use url::form_urlencoded;

use crate::routing::pattern::{decode_segment, normalize_segments, Part, PathError, PathPattern};

/// Parameter bindings produced by a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    parameters: HashMap<String, String>,
}

impl PathMatch {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    /// Layer query pairs on top of the positional bindings.
    pub fn merge_query(&mut self, pairs: &[(String, String)]) {
        let mut query: HashMap<&str, &str> = HashMap::with_capacity(pairs.len());
        for (key, value) in pairs {
            query.insert(key, value);
        }
        for (key, value) in query {
            self.parameters
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
    }

    pub fn into_parameters(self) -> HashMap<String, String> {
        self.parameters
    }
}

/// Matches one request's path against patterns, relative to a mount prefix.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    segments: Arc<[String]>,
    query: Arc<[(String, String)]>,
    prefix: PathPattern,
}

impl PathMatcher {
    /// Build a matcher from a raw request target (`/path?query`).
    pub fn new(uri: &str) -> Result<Self, PathError> {
        let parsed: Uri = uri
            .parse()
            .map_err(|_| PathError::InvalidPath(uri.to_string()))?;

        let segments = normalize_segments(parsed.path())?
            .into_iter()
            .map(decode_segment)
            .collect::<Result<Vec<_>, _>>()?;

        let query: Vec<(String, String)> = parsed
            .query()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Ok(Self {
            segments: segments.into(),
            query: query.into(),
            prefix: PathPattern::default(),
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Accumulated prefix contributed by enclosing mounts.
    pub fn prefix(&self) -> &PathPattern {
        &self.prefix
    }

    /// A matcher whose prefix is extended by `mount`.
    pub fn with_prefix(&self, mount: &PathPattern) -> PathMatcher {
        PathMatcher {
            segments: Arc::clone(&self.segments),
            query: Arc::clone(&self.query),
            prefix: self.prefix.appending(mount),
        }
    }

    /// Whether anything mounted under `mount` could possibly match.
    pub fn can_descend(&self, mount: &PathPattern) -> bool {
        let depth = self.prefix.len() + mount.len();
        if depth > self.segments.len() {
            return false;
        }
        self.prefix
            .parts()
            .iter()
            .chain(mount.parts())
            .zip(self.segments.iter())
            .all(|(part, segment)| match part {
                Part::Literal(literal) => literal == segment,
                Part::Parameter(_) => true,
            })
    }

    /// Match `prefix + pattern` against the full request path.
    pub fn match_pattern(&self, pattern: &PathPattern) -> Option<PathMatch> {
        if self.prefix.len() + pattern.len() != self.segments.len() {
            return None;
        }

        let mut parameters = HashMap::new();
        let parts = self.prefix.parts().iter().chain(pattern.parts());
        for (part, segment) in parts.zip(self.segments.iter()) {
            match part {
                Part::Literal(literal) => {
                    if literal != segment {
                        return None;
                    }
                }
                Part::Parameter(name) => {
                    parameters.insert(name.clone(), segment.clone());
                }
            }
        }

        Some(PathMatch { parameters })
    }
}
