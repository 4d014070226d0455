//! Target block types and the name patterns that expand into them.
//!
//! Patterns may contain `*` wildcards. They are expanded once, before a scan,
//! against a universe of known names; the scanner itself only ever does exact
//! set membership.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::world::block::{DEFAULT_NAMESPACE, normalize_name};

/// A block name pattern: an exact name, or a glob with `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern(String);

impl Pattern {
    /// Normalize like block names. A pattern that starts with `*` keeps no
    /// namespace so it can match any.
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim().to_ascii_lowercase();
        if raw.contains(':') || raw.starts_with('*') {
            Pattern(raw)
        } else {
            Pattern(format!("{DEFAULT_NAMESPACE}:{raw}"))
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.contains('*')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, name: &str) -> bool {
        glob_match(self.0.as_bytes(), name.as_bytes())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Iterative glob match with single-star backtracking.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

/// The concrete block types a scan looks for.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    names: HashSet<Arc<str>>,
}

impl TargetSet {
    /// Exact names only; no wildcard handling.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| Arc::from(normalize_name(n.as_ref())))
                .collect(),
        }
    }

    /// Expand patterns against `universe`. Exact names are kept even when the
    /// universe does not list them (modded blocks); a wildcard that matches
    /// nothing is an error.
    pub fn expand<I, S, U, T>(patterns: I, universe: U) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        U: IntoIterator<Item = T> + Clone,
        T: AsRef<str>,
    {
        let mut names: HashSet<Arc<str>> = HashSet::new();
        for raw in patterns {
            let pattern = Pattern::new(raw.as_ref());
            if !pattern.is_wildcard() {
                names.insert(Arc::from(pattern.as_str()));
                continue;
            }
            let mut matched = false;
            for known in universe.clone() {
                let known = known.as_ref();
                if pattern.matches(known) {
                    matched = true;
                    names.insert(Arc::from(known));
                }
            }
            if !matched {
                return Err(ConfigError::UnmatchedPattern(pattern.to_string()));
            }
        }
        if names.is_empty() {
            return Err(ConfigError::EmptyTargets);
        }
        tracing::debug!("Expanded target set to {} block types", names.len());
        Ok(Self { names })
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// The interned name, so matches can share it instead of allocating.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Arc<str>> {
        self.names.get(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in sorted order.
    pub fn sorted(&self) -> Vec<Arc<str>> {
        let mut names: Vec<_> = self.names.iter().cloned().collect();
        names.sort();
        names
    }
}
