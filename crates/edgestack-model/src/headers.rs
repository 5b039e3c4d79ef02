//! Case-insensitive multi-value header container.
//!
//! [`HeaderBag`] is shared by the request and response models. All reads and
//! writes normalize the header name to lower-case. Most headers hold a single
//! string; `add` on such a header joins values with a comma. Headers that are
//! legitimately multi-valued (`set-cookie`) accumulate an ordered list
//! instead, because joining cookies with a comma corrupts them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Headers that must keep one entry per value instead of comma-joining.
const MULTI_VALUED: &[&str] = &["set-cookie"];

/// The value side of a header entry: a single string or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValues {
    /// A single header value.
    One(String),
    /// An ordered list of values for a multi-valued header.
    Many(Vec<String>),
}

/// Case-insensitive header container with comma-join / append merge rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBag {
    entries: BTreeMap<String, HeaderValues>,
}

impl HeaderBag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any existing value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .insert(key.to_ascii_lowercase(), HeaderValues::One(value.into()));
    }

    /// Set a header only if it is currently absent.
    pub fn set_default(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_ascii_lowercase();
        self.entries.entry(key).or_insert(HeaderValues::One(value.into()));
    }

    /// Add a value to a header.
    ///
    /// For a multi-valued header (`set-cookie`) the value is appended to the
    /// list. For everything else the new value is comma-joined onto the
    /// existing one.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_ascii_lowercase();
        let value = value.into();
        let multi = MULTI_VALUED.contains(&key.as_str());

        match self.entries.get_mut(&key) {
            None if multi => {
                self.entries.insert(key, HeaderValues::Many(vec![value]));
            }
            None => {
                self.entries.insert(key, HeaderValues::One(value));
            }
            Some(HeaderValues::One(existing)) if multi => {
                let first = existing.clone();
                self.entries.insert(key, HeaderValues::Many(vec![first, value]));
            }
            Some(HeaderValues::One(existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            Some(HeaderValues::Many(list)) => {
                list.push(value);
            }
        }
    }

    /// Get a header value. A multi-valued header yields its first value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.entries.get(&key.to_ascii_lowercase())? {
            HeaderValues::One(v) => Some(v.as_str()),
            HeaderValues::Many(list) => list.first().map(String::as_str),
        }
    }

    /// Get all values of a header as a list.
    #[must_use]
    pub fn get_array(&self, key: &str) -> Vec<&str> {
        match self.entries.get(&key.to_ascii_lowercase()) {
            None => Vec::new(),
            Some(HeaderValues::One(v)) => vec![v.as_str()],
            Some(HeaderValues::Many(list)) => list.iter().map(String::as_str).collect(),
        }
    }

    /// Remove a header.
    pub fn delete(&mut self, key: &str) {
        self.entries.remove(&key.to_ascii_lowercase());
    }

    /// Returns `true` if the header is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    /// Set many headers at once, replacing existing values.
    pub fn set_many<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        for (k, v) in pairs {
            self.set(k.as_ref(), v);
        }
    }

    /// Add many headers at once, with `add` merge semantics.
    pub fn add_many<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        for (k, v) in pairs {
            self.add(k.as_ref(), v);
        }
    }

    /// Iterate over `(name, values)` entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValues)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no headers are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every header whose lower-cased name starts with one of the
    /// given prefixes.
    pub fn delete_by_prefix(&mut self, prefixes: &[&str]) {
        self.entries
            .retain(|name, _| !prefixes.iter().any(|p| name.starts_with(p)));
    }
}

impl<'a> IntoIterator for &'a HeaderBag {
    type Item = (&'a str, &'a HeaderValues);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a HeaderValues)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.entries.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_normalize_keys_to_lower_case() {
        let mut bag = HeaderBag::new();
        bag.set("Content-Type", "text/html");
        assert_eq!(bag.get("content-type"), Some("text/html"));
        assert_eq!(bag.get("CONTENT-TYPE"), Some("text/html"));
    }

    #[test]
    fn test_should_join_added_values_with_comma() {
        let mut bag = HeaderBag::new();
        bag.set("vary", "accept");
        bag.add("vary", "accept-encoding");
        assert_eq!(bag.get("vary"), Some("accept, accept-encoding"));
        assert_eq!(bag.get_array("vary"), vec!["accept, accept-encoding"]);
    }

    #[test]
    fn test_should_append_set_cookie_values_to_array() {
        let mut bag = HeaderBag::new();
        bag.add("Set-Cookie", "a=1");
        bag.add("set-cookie", "b=2");
        assert_eq!(bag.get_array("set-cookie"), vec!["a=1", "b=2"]);
        // get returns the first value for multi-valued headers.
        assert_eq!(bag.get("set-cookie"), Some("a=1"));
    }

    #[test]
    fn test_should_promote_single_set_cookie_to_array_on_add() {
        let mut bag = HeaderBag::new();
        bag.set("set-cookie", "a=1");
        bag.add("set-cookie", "b=2");
        assert_eq!(bag.get_array("set-cookie"), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_should_replace_value_on_set() {
        let mut bag = HeaderBag::new();
        bag.set("x-test", "one");
        bag.set("X-Test", "two");
        assert_eq!(bag.get("x-test"), Some("two"));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_should_only_set_default_when_absent() {
        let mut bag = HeaderBag::new();
        bag.set_default("x-test", "one");
        bag.set_default("x-test", "two");
        assert_eq!(bag.get("x-test"), Some("one"));
    }

    #[test]
    fn test_should_delete_headers() {
        let mut bag = HeaderBag::new();
        bag.set("x-test", "one");
        bag.delete("X-Test");
        assert_eq!(bag.get("x-test"), None);
        assert!(bag.get_array("x-test").is_empty());
    }

    #[test]
    fn test_should_set_and_add_many() {
        let mut bag = HeaderBag::new();
        bag.set_many([("a", "1"), ("b", "2")]);
        bag.add_many([("a", "3")]);
        assert_eq!(bag.get("a"), Some("1, 3"));
        assert_eq!(bag.get("b"), Some("2"));
    }

    #[test]
    fn test_should_delete_by_prefix() {
        let mut bag = HeaderBag::new();
        bag.set("x-amz-trace-id", "abc");
        bag.set("x-amzn-requestid", "def");
        bag.set("x-custom", "keep");
        bag.delete_by_prefix(&["x-amz-", "x-amzn-"]);
        assert!(!bag.contains("x-amz-trace-id"));
        assert!(!bag.contains("x-amzn-requestid"));
        assert_eq!(bag.get("x-custom"), Some("keep"));
    }
}
