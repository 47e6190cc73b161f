//! Key Namespacing Module
//!
//! Maps logical keys onto the shared backend keyspace of one instance.

/// Separator between the instance prefix and the logical key.
pub const SEPARATOR: char = ':';

// == Key Space ==
/// The namespace of one cache instance.
///
/// With a non-empty prefix `p`, key `k` lives at `p:k`. With an empty
/// prefix keys are stored bare and the instance owns the whole keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Backend key for a logical key.
    pub fn namespaced(&self, key: &str) -> String {
        self.scope(key)
    }

    /// Raw prefix covering every backend key whose logical key starts with
    /// `sub`. An empty `sub` covers the whole instance.
    pub fn scope(&self, sub: &str) -> String {
        if self.prefix.is_empty() {
            sub.to_string()
        } else {
            let mut scoped = String::with_capacity(self.prefix.len() + 1 + sub.len());
            scoped.push_str(&self.prefix);
            scoped.push(SEPARATOR);
            scoped.push_str(sub);
            scoped
        }
    }

    /// Logical key for a backend key, if it belongs to this instance.
    pub fn strip<'a>(&self, full: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(full);
        }
        full.strip_prefix(self.prefix.as_str())?
            .strip_prefix(SEPARATOR)
    }

    /// Redis glob pattern matching the same keys as [`KeySpace::scope`].
    ///
    /// Glob metacharacters in the prefix and `sub` are escaped so they
    /// match literally.
    pub fn glob(&self, sub: &str) -> String {
        let mut pattern = escape_glob(&self.scope(sub));
        pattern.push('*');
        pattern
    }
}

/// Escapes Redis glob metacharacters.
pub fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
