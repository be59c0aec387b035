//! Permission scopes for Verity API credentials
//!
//! A scope is a `resource:operation` string such as `record:read`. Scopes
//! requested from the authorization server must appear in the static
//! [registry]. Sets of scopes obey one hierarchy rule: `resource:write`
//! subsumes `resource:read`.
//!
//! ```
//! use verity_scopes::{expand, minimize, validate};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let granted = validate(["record:write", "record:read", "note:read"])?;
//!
//! let minimal = minimize(&granted);
//! assert_eq!(minimal.to_string(), "note:read record:write");
//! assert_eq!(expand(&minimal), expand(&granted));
//! assert!(minimal.sufficient_for("record", "read"));
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]

mod algebra;
pub mod registry;
mod scope;

pub use algebra::{
    expand, group_by_resource, includes, minimize, sufficient_for, validate, InvalidScope,
};
pub use registry::{description, is_valid, ScopeDefinition};
pub use scope::{InvalidScopeToken, Iter, Scope, ScopeRef, Scopes};
