//! Scope tokens and scope sets

use std::{collections::btree_set, convert::TryFrom, fmt, iter::FromIterator, str::FromStr};

use aliri_braid::braid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An invalid scope token
#[derive(Debug, Error)]
pub enum InvalidScopeToken {
    /// The scope token was the empty string
    #[error("scope token cannot be empty")]
    EmptyString,
    /// The scope token contained an invalid byte
    #[error("invalid scope token byte at position {position}: 0x{value:02x}")]
    InvalidByte {
        /// The index in the scope token where the invalid byte was found
        position: usize,
        /// The invalid byte value
        value: u8,
    },
}

impl From<std::convert::Infallible> for InvalidScopeToken {
    #[inline]
    fn from(x: std::convert::Infallible) -> Self {
        match x {}
    }
}

/// A single permission, conventionally written `resource:operation`
///
/// Syntax follows [RFC 6749, Section 3.3][RFC6749 3.3]: a scope token is
/// non-empty printable ASCII excluding ` ` (space), `"` and `\`. Whether the
/// scope is known to the platform is a separate question answered by the
/// [registry](crate::registry).
///
///   [RFC6749 3.3]: (https://datatracker.ietf.org/doc/html/rfc6749#section-3.3)
#[braid(serde, validator, ref_doc = "A borrowed reference to a [`Scope`]")]
pub struct Scope;

impl aliri_braid::Validator for Scope {
    type Error = InvalidScopeToken;

    fn validate(s: &str) -> Result<(), Self::Error> {
        if s.is_empty() {
            Err(InvalidScopeToken::EmptyString)
        } else if let Some((position, &value)) = s
            .as_bytes()
            .iter()
            .enumerate()
            .find(|(_, &b)| b <= 0x20 || b == 0x22 || b == 0x5C || 0x7F <= b)
        {
            Err(InvalidScopeToken::InvalidByte { position, value })
        } else {
            Ok(())
        }
    }
}

pub(crate) const READ: &str = "read";
pub(crate) const WRITE: &str = "write";

impl ScopeRef {
    /// The part before the first `:`, or the whole token if there is none
    #[inline]
    pub fn resource(&self) -> &str {
        match self.as_str().split_once(':') {
            Some((resource, _)) => resource,
            None => self.as_str(),
        }
    }

    /// The part after the first `:`, if any
    #[inline]
    pub fn operation(&self) -> Option<&str> {
        self.as_str().split_once(':').map(|(_, op)| op)
    }

    /// Whether this is a `resource:read` scope
    #[inline]
    pub fn is_read(&self) -> bool {
        self.operation() == Some(READ)
    }

    /// Whether this is a `resource:write` scope
    #[inline]
    pub fn is_write(&self) -> bool {
        self.operation() == Some(WRITE)
    }

    /// The `resource:read` scope subsumed by this one, if this is a write scope
    pub fn implied_read(&self) -> Option<Scope> {
        if self.is_write() {
            with_operation(self.resource(), READ)
        } else {
            None
        }
    }

    /// The `resource:write` scope that would subsume this one, if this is a
    /// read scope
    pub fn implying_write(&self) -> Option<Scope> {
        if self.is_read() {
            with_operation(self.resource(), WRITE)
        } else {
            None
        }
    }
}

/// Builds `resource:operation`, which is always a valid token when
/// `resource` came out of a valid token
fn with_operation(resource: &str, operation: &str) -> Option<Scope> {
    Scope::new(format!("{}:{}", resource, operation)).ok()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum ScopesDto {
    String(String),
    Array(Vec<Scope>),
}

impl TryFrom<Option<ScopesDto>> for Scopes {
    type Error = InvalidScopeToken;

    fn try_from(dto: Option<ScopesDto>) -> Result<Self, Self::Error> {
        match dto {
            Some(ScopesDto::String(s)) => Self::try_from(s.as_str()),
            Some(ScopesDto::Array(arr)) => Ok(arr.into_iter().collect()),
            None => Ok(Self::empty()),
        }
    }
}

impl From<Scopes> for ScopesDto {
    fn from(s: Scopes) -> Self {
        ScopesDto::String(s.to_string())
    }
}

/// A set of scopes, kept sorted and free of duplicates
///
/// On the wire a scope set is a single space-delimited string. When reading,
/// an array of scope tokens is accepted as well, and a missing or `null`
/// value is the empty set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "Option<ScopesDto>", into = "ScopesDto")]
pub struct Scopes(std::collections::BTreeSet<Scope>);

impl Scopes {
    /// Produces an empty scope set
    #[inline]
    pub fn empty() -> Self {
        Self(std::collections::BTreeSet::new())
    }

    /// Constructs a scope set holding a single scope
    #[inline]
    pub fn single(scope: Scope) -> Self {
        let mut s = Self::empty();
        s.insert(scope);
        s
    }

    /// Adds a scope, returning the extended set
    #[inline]
    pub fn and(mut self, scope: Scope) -> Self {
        self.insert(scope);
        self
    }

    /// Adds a scope to the set
    #[inline]
    pub fn insert(&mut self, scope: Scope) -> bool {
        self.0.insert(scope)
    }

    /// Removes a scope from the set
    #[inline]
    pub fn remove(&mut self, scope: &ScopeRef) -> bool {
        self.0.remove(scope)
    }

    /// Exact membership, with no regard for the read/write hierarchy
    #[inline]
    pub fn contains(&self, scope: &ScopeRef) -> bool {
        self.0.contains(scope)
    }

    /// Whether every scope in `subset` is literally present
    #[inline]
    pub fn contains_all(&self, subset: &Scopes) -> bool {
        self.0.is_superset(&subset.0)
    }

    /// Number of scopes in the set
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no scopes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the scopes in lexicographic order
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// Adds the `resource:read` implied by each `resource:write`
    ///
    /// See [`expand`](crate::expand).
    #[inline]
    pub fn expand(&self) -> Scopes {
        crate::expand(self)
    }

    /// Drops each `resource:read` already implied by a `resource:write`
    ///
    /// See [`minimize`](crate::minimize).
    #[inline]
    pub fn minimize(&self) -> Scopes {
        crate::minimize(self)
    }

    /// Whether this set grants `want`, honoring the read/write hierarchy
    ///
    /// See [`includes`](crate::includes).
    #[inline]
    pub fn includes(&self, want: &ScopeRef) -> bool {
        crate::includes(self, want)
    }

    /// Whether this set permits `operation` on `resource`
    ///
    /// See [`sufficient_for`](crate::sufficient_for).
    #[inline]
    pub fn sufficient_for(&self, resource: &str, operation: &str) -> bool {
        crate::sufficient_for(self, resource, operation)
    }
}

impl fmt::Display for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            f.write_str(scope.as_str())?;
        }
        Ok(())
    }
}

impl IntoIterator for Scopes {
    type Item = Scope;
    type IntoIter = btree_set::IntoIter<Scope>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An iterator over a set of borrowed scopes
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    iter: btree_set::Iter<'a, Scope>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Scope;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<'a> IntoIterator for &'a Scopes {
    type Item = &'a Scope;
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        Iter {
            iter: self.0.iter(),
        }
    }
}

impl<S> Extend<S> for Scopes
where
    S: Into<Scope>,
{
    #[inline]
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = S>,
    {
        self.0.extend(iter.into_iter().map(Into::into))
    }
}

impl<S> FromIterator<S> for Scopes
where
    S: Into<Scope>,
{
    #[inline]
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        let mut set = Self::empty();
        set.extend(iter);
        set
    }
}

impl TryFrom<&'_ str> for Scopes {
    type Error = InvalidScopeToken;

    /// Parses a space-delimited list of scope tokens
    #[inline]
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.split_whitespace()
            .map(|token| Scope::new(token.to_owned()))
            .collect()
    }
}

impl TryFrom<String> for Scopes {
    type Error = InvalidScopeToken;

    #[inline]
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}

impl FromStr for Scopes {
    type Err = InvalidScopeToken;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}
