//! Allow/block regex predicate over strings (service names, metric names).
//!
//! A candidate passes iff (allow is empty OR it matches any allow pattern)
//! AND it matches no block pattern. Patterns are unanchored: they match
//! anywhere in the candidate unless they carry their own `^`/`$`.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    allow: Vec<Regex>,
    block: Vec<Regex>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an allow pattern.
    pub fn allow(&mut self, pattern: &str) -> Result<(), FilterError> {
        self.allow.push(compile(pattern)?);
        Ok(())
    }

    /// Append a block pattern.
    pub fn block(&mut self, pattern: &str) -> Result<(), FilterError> {
        self.block.push(compile(pattern)?);
        Ok(())
    }

    /// Build a filter from both pattern lists at once.
    pub fn from_patterns<A, B>(allow: A, block: B) -> Result<Self, FilterError>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        let mut f = Self::new();
        for p in allow {
            f.allow(p.as_ref())?;
        }
        for p in block {
            f.block(p.as_ref())?;
        }
        Ok(f)
    }

    #[must_use]
    pub fn permit(&self, candidate: &str) -> bool {
        let allowed = self.allow.is_empty() || self.allow.iter().any(|r| r.is_match(candidate));
        allowed && !self.block.iter().any(|r| r.is_match(candidate))
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.block.is_empty()
    }
}

fn compile(pattern: &str) -> Result<Regex, FilterError> {
    Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
