//! Multi-valued, insertion-ordered name/value collection.
//!
//! Used for request headers, query parameters, cookies and response headers.
//! Keys are grouped case-insensitively (the first spelling wins) and every
//! value under a key is kept in the order it was added. An empty key is a
//! valid entry and serializes as a bare value in query strings.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameValues {
    entries: Vec<(String, Vec<String>)>,
}

impl NameValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value under `key`. Existing values are never overwritten.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self.position(&key) {
            Some(index) => self.entries[index].1.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    pub fn extend<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.add(key, value);
        }
    }

    /// Every value under `key`, case-insensitive. Empty when absent.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.position(key)
            .map(|index| self.entries[index].1.as_slice())
            .unwrap_or(&[])
    }

    /// Values under `key` joined with ", ".
    pub fn get_joined(&self, key: &str) -> Option<String> {
        self.position(key).map(|index| self.entries[index].1.join(", "))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Keys in first-insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Every (key, value) pair, grouped by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key.as_str(), value.as_str())))
    }

    /// Number of stored values (not keys).
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, values)| values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose key is not one of `excluded` (case-insensitive).
    pub fn without(&self, excluded: &[&str]) -> NameValues {
        let entries = self
            .entries
            .iter()
            .filter(|(key, _)| !excluded.iter().any(|name| name.eq_ignore_ascii_case(key)))
            .cloned()
            .collect();
        NameValues { entries }
    }

    /// Serializes as `key=value` pairs joined by `&`, both sides
    /// percent-encoded as UTF-8. An empty key yields the bare value.
    pub fn to_query_string(&self) -> String {
        self.iter()
            .map(|(key, value)| {
                if key.is_empty() {
                    urlencoding::encode(value).into_owned()
                } else {
                    format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Serializes as a single `Cookie` header value: `name=value; name=value`.
    pub fn to_cookie_header(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        Some(
            self.iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(key))
    }
}

impl<K, V> FromIterator<(K, V)> for NameValues
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = NameValues::new();
        values.extend(iter);
        values
    }
}

impl fmt::Display for NameValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, values) in &self.entries {
            writeln!(f, "{} : {}", key, values.join(", "))?;
        }
        Ok(())
    }
}
