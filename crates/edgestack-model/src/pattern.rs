//! Path patterns with named captures.
//!
//! A path pattern is a route-path string containing named segments:
//!
//! - `:name` — one required segment
//! - `:name?` — one optional segment
//! - `:name*` — a catch-all matching zero or more segments
//!
//! Patterns compile to a regular expression plus capture metadata. On match,
//! captured values populate the request params; a catch-all capture yields an
//! array of the individual path segments.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::EdgeError;

/// A captured path-pattern value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// A single captured segment.
    Single(String),
    /// The segments captured by a `:name*` catch-all.
    Multi(Vec<String>),
}

/// Captured params keyed by capture name.
pub type Params = BTreeMap<String, ParamValue>;

/// The kind of one named capture in a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureKind {
    Required,
    Optional,
    CatchAll,
}

#[derive(Debug, Clone)]
struct Capture {
    name: String,
    kind: CaptureKind,
}

/// A compiled path pattern: matching regex plus capture metadata.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    captures: Vec<Capture>,
}

impl PathPattern {
    /// Returns `true` if the string contains pattern syntax (a segment
    /// starting with `:`). Plain strings are handled as literal predicates.
    #[must_use]
    pub fn is_pattern(s: &str) -> bool {
        s.split('/').any(|seg| seg.starts_with(':'))
    }

    /// Compile a pattern string.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::InvalidRoute`] if the pattern produces an
    /// invalid regular expression (e.g. an empty capture name).
    pub fn compile(pattern: &str) -> Result<Self, EdgeError> {
        let mut regex_src = String::from("^");
        let mut captures = Vec::new();

        for segment in pattern.split('/').filter(|s| !s.is_empty()) {
            if let Some(spec) = segment.strip_prefix(':') {
                let (name, kind) = if let Some(name) = spec.strip_suffix('?') {
                    (name, CaptureKind::Optional)
                } else if let Some(name) = spec.strip_suffix('*') {
                    (name, CaptureKind::CatchAll)
                } else {
                    (spec, CaptureKind::Required)
                };

                if name.is_empty() {
                    return Err(EdgeError::InvalidRoute(format!(
                        "path pattern '{pattern}' has an unnamed capture"
                    )));
                }

                match kind {
                    CaptureKind::Required => regex_src.push_str("/([^/]+)"),
                    CaptureKind::Optional => regex_src.push_str("(?:/([^/]+))?"),
                    CaptureKind::CatchAll => regex_src.push_str("(?:/(.+))?"),
                }
                captures.push(Capture {
                    name: name.to_owned(),
                    kind,
                });
            } else {
                regex_src.push('/');
                regex_src.push_str(&regex::escape(segment));
            }
        }

        // Patterns are string predicates, so they share the trailing-slash
        // leniency of literal path conditions.
        regex_src.push_str("/?$");

        let regex = Regex::new(&regex_src)
            .map_err(|e| EdgeError::InvalidRoute(format!("path pattern '{pattern}': {e}")))?;

        Ok(Self {
            source: pattern.to_owned(),
            regex,
            captures,
        })
    }

    /// The original pattern string.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match a request path, returning captured params on success.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let mut params = Params::new();

        for (idx, capture) in self.captures.iter().enumerate() {
            let Some(m) = caps.get(idx + 1) else {
                continue; // optional or catch-all capture that did not match
            };
            let value = match capture.kind {
                CaptureKind::Required | CaptureKind::Optional => {
                    ParamValue::Single(m.as_str().to_owned())
                }
                CaptureKind::CatchAll => ParamValue::Multi(
                    m.as_str().split('/').map(ToOwned::to_owned).collect(),
                ),
            };
            params.insert(capture.name.clone(), value);
        }

        Some(params)
    }
}
