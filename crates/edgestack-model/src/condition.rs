//! Route conditions and their predicates.
//!
//! A [`RouteCondition`] is a record of independently-optional predicates. All
//! present predicates must match (AND); within one predicate, array
//! alternatives are OR'd and `{not: ...}` negates.
//!
//! String predicates on `path`/`url` are trailing-slash lenient: `'/a'`
//! matches both `/a` and `/a/`. Regular-expression predicates are matched
//! exactly as given, with no implicit leniency — `^/a$` matches `/a` but not
//! `/a/`. This asymmetry is deliberate; regex authors can express leniency
//! themselves.
//!
//! Two forms exist: the compiled [`Predicate`]/[`RouteCondition`] used at
//! match time, and the serde-facing [`PredicateSpec`]/[`ConditionSpec`] wire
//! shapes used by the declarative routes file.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EdgeError;
use crate::pattern::{Params, PathPattern};

/// A compiled matching predicate.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Literal string equality (slash-lenient for path/url facets).
    Exact(String),
    /// OR over a list of literal strings.
    AnyOf(Vec<String>),
    /// Regular-expression match (never slash-lenient).
    Regex(Regex),
    /// Path pattern with named captures.
    Pattern(PathPattern),
    /// Negation of an inner predicate.
    Not(Box<Predicate>),
}

/// Compare two values for equality, tolerating a trailing slash on either
/// side. The root path `/` is left untouched.
fn eq_slash_lenient(value: &str, expected: &str) -> bool {
    if value == expected {
        return true;
    }
    fn trim(s: &str) -> &str {
        let t = s.trim_end_matches('/');
        if t.is_empty() { "/" } else { t }
    }
    trim(value) == trim(expected)
}

impl Predicate {
    /// Build an exact-match predicate.
    #[must_use]
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(value.into())
    }

    /// Build an OR-of-literals predicate.
    #[must_use]
    pub fn any_of<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::AnyOf(values.into_iter().map(Into::into).collect())
    }

    /// Build a regex predicate.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::InvalidRoute`] for an invalid expression.
    pub fn regex(expr: &str) -> Result<Self, EdgeError> {
        Regex::new(expr)
            .map(Self::Regex)
            .map_err(|e| EdgeError::InvalidRoute(format!("regex '{expr}': {e}")))
    }

    /// Build a path predicate from a string, compiling pattern syntax
    /// (`:name` segments) when present.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::InvalidRoute`] for an invalid pattern.
    pub fn path(value: &str) -> Result<Self, EdgeError> {
        if PathPattern::is_pattern(value) {
            Ok(Self::Pattern(PathPattern::compile(value)?))
        } else {
            Ok(Self::Exact(value.to_owned()))
        }
    }

    /// Negate a predicate.
    #[must_use]
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// Evaluate the predicate against a value.
    ///
    /// `slash_lenient` enables trailing-slash tolerance for literal string
    /// forms; it is set for `path`/`url` facets only and never applies to
    /// regular expressions.
    #[must_use]
    pub fn matches(&self, value: &str, slash_lenient: bool) -> bool {
        match self {
            Self::Exact(expected) => {
                if slash_lenient {
                    eq_slash_lenient(value, expected)
                } else {
                    value == expected
                }
            }
            Self::AnyOf(alternatives) => alternatives.iter().any(|expected| {
                if slash_lenient {
                    eq_slash_lenient(value, expected)
                } else {
                    value == expected
                }
            }),
            Self::Regex(re) => re.is_match(value),
            Self::Pattern(pattern) => pattern.match_path(value).is_some(),
            Self::Not(inner) => !inner.matches(value, slash_lenient),
        }
    }

    /// Evaluate the predicate, returning captured params when it is a path
    /// pattern. Non-pattern predicates yield empty params on success.
    #[must_use]
    pub fn match_with_params(&self, value: &str, slash_lenient: bool) -> Option<Params> {
        match self {
            Self::Pattern(pattern) => pattern.match_path(value),
            _ => self.matches(value, slash_lenient).then(Params::new),
        }
    }
}

/// A route condition: one optional predicate per request facet, plus
/// per-field predicate maps for headers, cookies, and query parameters.
///
/// A condition with no fields matches every request.
#[derive(Debug, Clone, Default)]
pub struct RouteCondition {
    /// Predicate over the full request URL.
    pub url: Option<Predicate>,
    /// Predicate over the request path.
    pub path: Option<Predicate>,
    /// Predicate over the HTTP method.
    pub method: Option<Predicate>,
    /// Predicate over the path extension (e.g. `html`, `png`).
    pub path_extension: Option<Predicate>,
    /// Per-header predicates, keyed by lower-cased header name.
    pub header: BTreeMap<String, Predicate>,
    /// Per-cookie predicates, keyed by cookie name.
    pub cookie: BTreeMap<String, Predicate>,
    /// Per-parameter predicates, keyed by query parameter name.
    pub query: BTreeMap<String, Predicate>,
}

impl RouteCondition {
    /// A condition matching every request.
    #[must_use]
    pub fn always() -> Self {
        Self::default()
    }

    /// Condition on the request path (string, pattern, or via
    /// [`RouteCondition::default`] plus field assignment for other forms).
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::InvalidRoute`] for an invalid pattern.
    pub fn on_path(path: &str) -> Result<Self, EdgeError> {
        Ok(Self {
            path: Some(Predicate::path(path)?),
            ..Self::default()
        })
    }

    /// Returns `true` if no predicate field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.path.is_none()
            && self.method.is_none()
            && self.path_extension.is_none()
            && self.header.is_empty()
            && self.cookie.is_empty()
            && self.query.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Serde wire shapes
// ---------------------------------------------------------------------------

/// Wire shape of a predicate in the routes file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PredicateSpec {
    /// `{ "not": <predicate> }`
    Not {
        /// The negated predicate.
        not: Box<PredicateSpec>,
    },
    /// `{ "regex": "^/a$" }`
    Regex {
        /// The regular expression source.
        regex: String,
    },
    /// A literal string (or path pattern, for path facets).
    One(String),
    /// OR over a list of literals.
    Many(Vec<String>),
}

impl PredicateSpec {
    /// Compile to a [`Predicate`]. `path_facet` enables pattern-syntax
    /// detection for literal strings.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::InvalidRoute`] for invalid regex or pattern
    /// sources.
    pub fn compile(&self, path_facet: bool) -> Result<Predicate, EdgeError> {
        match self {
            Self::Not { not } => Ok(Predicate::not(not.compile(path_facet)?)),
            Self::Regex { regex } => Predicate::regex(regex),
            Self::One(value) if path_facet => Predicate::path(value),
            Self::One(value) => Ok(Predicate::exact(value.clone())),
            Self::Many(values) => Ok(Predicate::any_of(values.clone())),
        }
    }
}

/// Wire shape of a route condition in the routes file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionSpec {
    /// URL predicate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<PredicateSpec>,
    /// Path predicate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PredicateSpec>,
    /// Method predicate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<PredicateSpec>,
    /// Path-extension predicate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_extension: Option<PredicateSpec>,
    /// Per-header predicates.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, PredicateSpec>,
    /// Per-cookie predicates.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cookie: BTreeMap<String, PredicateSpec>,
    /// Per-query-parameter predicates.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, PredicateSpec>,
}

impl ConditionSpec {
    /// Compile to a [`RouteCondition`].
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::InvalidRoute`] for invalid regex or pattern
    /// sources.
    pub fn compile(&self) -> Result<RouteCondition, EdgeError> {
        let compile_map = |specs: &BTreeMap<String, PredicateSpec>| {
            specs
                .iter()
                .map(|(k, spec)| Ok((k.clone(), spec.compile(false)?)))
                .collect::<Result<BTreeMap<_, _>, EdgeError>>()
        };

        Ok(RouteCondition {
            url: self.url.as_ref().map(|s| s.compile(true)).transpose()?,
            path: self.path.as_ref().map(|s| s.compile(true)).transpose()?,
            method: self.method.as_ref().map(|s| s.compile(false)).transpose()?,
            path_extension: self
                .path_extension
                .as_ref()
                .map(|s| s.compile(false))
                .transpose()?,
            header: compile_map(&self.header)?,
            cookie: compile_map(&self.cookie)?,
            query: compile_map(&self.query)?,
        })
    }
}
