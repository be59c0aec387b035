//! Operations over sets of scopes
//!
//! The only relation between scopes is the hierarchy rule: `resource:write`
//! subsumes `resource:read` for the same resource. Nothing else is implied.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{registry, Scope, ScopeRef, Scopes};

/// One or more scopes were not found in the registry
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid scope(s): {}", .scopes.join(", "))]
pub struct InvalidScope {
    scopes: Vec<String>,
}

impl InvalidScope {
    /// The rejected scopes, in the order they were supplied
    #[inline]
    pub fn invalid_scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Checks every scope against the registry
///
/// On success the scopes are returned in their original order, duplicates
/// included. On failure every unknown scope is reported, in input order.
pub fn validate<I, S>(scopes: I) -> Result<Vec<Scope>, InvalidScope>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut valid = Vec::new();
    let mut invalid = Vec::new();

    for scope in scopes {
        let scope = scope.as_ref();
        match registry::lookup(scope) {
            Some(def) => valid.push(def.scope()),
            None => invalid.push(scope.to_owned()),
        }
    }

    if invalid.is_empty() {
        Ok(valid)
    } else {
        tracing::debug!(invalid = ?invalid, "rejected unknown scopes");
        Err(InvalidScope { scopes: invalid })
    }
}

/// Adds `resource:read` for every `resource:write`
pub fn expand<I, S>(scopes: I) -> Scopes
where
    I: IntoIterator<Item = S>,
    S: AsRef<ScopeRef>,
{
    let mut expanded = Scopes::empty();
    for scope in scopes {
        let scope = scope.as_ref();
        if let Some(read) = scope.implied_read() {
            expanded.insert(read);
        }
        expanded.insert(scope.to_owned());
    }
    expanded
}

/// Drops `resource:read` wherever `resource:write` is also present
pub fn minimize<I, S>(scopes: I) -> Scopes
where
    I: IntoIterator<Item = S>,
    S: AsRef<ScopeRef>,
{
    let all: Scopes = scopes.into_iter().map(|s| s.as_ref().to_owned()).collect();

    all.iter()
        .filter(|scope| match scope.implying_write() {
            Some(write) => !all.contains(&write),
            None => true,
        })
        .map(ToOwned::to_owned)
        .collect()
}

/// Whether `have` grants `want`
///
/// `want` is granted when it is held literally, or when it is
/// `resource:read` and `resource:write` is held. Holding `resource:read`
/// never grants `resource:write`.
pub fn includes<I, S>(have: I, want: &ScopeRef) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<ScopeRef>,
{
    let implying = want.implying_write();
    have.into_iter().any(|held| {
        let held = held.as_ref();
        held == want || implying.as_deref() == Some(held)
    })
}

/// Groups scopes by the part before the `:`
///
/// Scopes keep their relative order within each group.
pub fn group_by_resource<I, S>(scopes: I) -> BTreeMap<String, Vec<Scope>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<ScopeRef>,
{
    let mut groups: BTreeMap<String, Vec<Scope>> = BTreeMap::new();
    for scope in scopes {
        let scope = scope.as_ref();
        groups
            .entry(scope.resource().to_owned())
            .or_default()
            .push(scope.to_owned());
    }
    groups
}

/// Whether `have` permits `operation` on `resource`
pub fn sufficient_for<I, S>(have: I, resource: &str, operation: &str) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<ScopeRef>,
{
    let wanted = format!("{}:{}", resource, operation);
    match ScopeRef::from_str(&wanted) {
        Ok(wanted) => expand(have).contains(wanted),
        Err(_) => false,
    }
}
