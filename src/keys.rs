//! Composite key builders
//!
//! Helpers producing deterministic string keys such as `chat.public.100291`
//! from a primary key and a fixed number of extra parts.

use std::fmt::{Display, Write};

use crate::error::{CacheError, Result};

/// Separator used unless another is configured.
pub const DEFAULT_KEY_SEPARATOR: char = '.';

// == Poly Keyer ==
/// Builds keys from a primary key plus exactly `extra_parts` more parts.
///
/// ```rust
/// use ttl_cacher::PolyKeyer;
///
/// let keyer = PolyKeyer::new("chat", 2);
/// assert_eq!(keyer.key(&["public", "100291"]), "chat.public.100291");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyKeyer {
    primary: String,
    extra_parts: usize,
    separator: char,
}

impl PolyKeyer {
    pub fn new(primary: impl Into<String>, extra_parts: usize) -> Self {
        Self {
            primary: primary.into(),
            extra_parts,
            separator: DEFAULT_KEY_SEPARATOR,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Joins the primary key and `parts` with the separator.
    ///
    /// # Panics
    /// Panics if `parts` is empty or its length differs from the configured
    /// number of extra parts. That is a programming error, not a data error;
    /// use [`try_key`](Self::try_key) to handle it instead.
    pub fn key<S: AsRef<str>>(&self, parts: &[S]) -> String {
        match self.try_key(parts) {
            Ok(key) => key,
            Err(err) => panic!("PolyKeyer::key: {err}"),
        }
    }

    /// Like [`key`](Self::key) but reports an arity mismatch as
    /// [`CacheError::KeyArity`].
    pub fn try_key<S: AsRef<str>>(&self, parts: &[S]) -> Result<String> {
        if parts.is_empty() || parts.len() != self.extra_parts {
            return Err(CacheError::KeyArity {
                primary: self.primary.clone(),
                expected: self.extra_parts,
                got: parts.len(),
            });
        }

        let len = self.primary.len()
            + parts.len() * self.separator.len_utf8()
            + parts.iter().map(|p| p.as_ref().len()).sum::<usize>();
        let mut key = String::with_capacity(len);
        key.push_str(&self.primary);
        for part in parts {
            key.push(self.separator);
            key.push_str(part.as_ref());
        }
        Ok(key)
    }
}

// == Duplet ==
/// Builds two-part keys `primary<sep>value` from any displayable value.
///
/// ```rust
/// use ttl_cacher::Duplet;
///
/// let users = Duplet::new("user");
/// assert_eq!(users.key(42), "user.42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplet {
    primary: String,
    separator: char,
}

impl Duplet {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            separator: DEFAULT_KEY_SEPARATOR,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn key<T: Display>(&self, value: T) -> String {
        let mut key = String::with_capacity(self.primary.len() + 8);
        // Writing to a String cannot fail
        let _ = write!(key, "{}{}{}", self.primary, self.separator, value);
        key
    }
}
