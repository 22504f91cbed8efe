//! Case-insensitive, order-preserving header list.

use std::fmt;

/// HTTP header fields in arrival (or insertion) order.
///
/// Lookups ignore ASCII case. Duplicate names are allowed; [`get`](Self::get)
/// returns the first one, [`set`](Self::set) replaces all of them.
///
/// # Examples
///
/// ```
/// use citaty::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("X-Request-Id", "abc");
/// headers.set("x-request-id", "def");
///
/// assert_eq!(headers.get("X-REQUEST-ID"), Some("def"));
/// assert_eq!(headers.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry, keeping any existing values for the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Replaces every entry named `name` with a single entry.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.inner.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.inner.push((name, value.into()));
    }

    /// Returns the first value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Number of entries, counting duplicates.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut h = Headers::new();
        h.insert("Content-Type", "application/json");
        assert_eq!(h.get("content-type"), Some("application/json"));
        assert!(h.contains("CONTENT-TYPE"));
        assert!(!h.contains("x-missing"));
    }

    #[test]
    fn set_replaces_duplicates() {
        let mut h = Headers::new();
        h.insert("Connection", "keep-alive");
        h.insert("connection", "keep-alive");
        h.set("Connection", "close");
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("connection"), Some("close"));
    }

    #[test]
    fn display_is_wire_format() {
        let mut h = Headers::new();
        h.insert("A", "1");
        h.insert("B", "2");
        assert_eq!(h.to_string(), "A: 1\r\nB: 2\r\n");
    }
}
