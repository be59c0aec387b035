//! The static table of scopes the Verity API understands

use crate::{Scope, ScopeRef};

/// A scope the platform knows about
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScopeDefinition {
    name: &'static str,
    description: &'static str,
}

impl ScopeDefinition {
    const fn new(name: &'static str, description: &'static str) -> Self {
        Self { name, description }
    }

    /// The scope token, e.g. `record:read`
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Human-readable explanation suitable for a consent screen
    #[inline]
    pub const fn description(&self) -> &'static str {
        self.description
    }

    /// The definition as a scope token
    #[inline]
    pub fn scope(&self) -> Scope {
        Scope::from_static(self.name)
    }
}

static REGISTRY: &[ScopeDefinition] = &[
    ScopeDefinition::new("record:read", "Read records and their attribute values"),
    ScopeDefinition::new("record:write", "Create, update and delete records"),
    ScopeDefinition::new("object:read", "Read object definitions"),
    ScopeDefinition::new("object:write", "Create and modify object definitions"),
    ScopeDefinition::new("attribute:read", "Read attribute definitions"),
    ScopeDefinition::new("attribute:write", "Create and modify attribute definitions"),
    ScopeDefinition::new("list:read", "Read lists"),
    ScopeDefinition::new("list:write", "Create, update and delete lists"),
    ScopeDefinition::new("list_entry:read", "Read list entries"),
    ScopeDefinition::new("list_entry:write", "Add, update and remove list entries"),
    ScopeDefinition::new("note:read", "Read notes"),
    ScopeDefinition::new("note:write", "Create, update and delete notes"),
    ScopeDefinition::new("task:read", "Read tasks"),
    ScopeDefinition::new("task:write", "Create, update and delete tasks"),
    ScopeDefinition::new("comment:read", "Read comments and threads"),
    ScopeDefinition::new("comment:write", "Post and resolve comments"),
    ScopeDefinition::new("user:read", "Read workspace members"),
    ScopeDefinition::new("user:write", "Invite and manage workspace members"),
    ScopeDefinition::new("webhook:read", "Read webhook subscriptions"),
    ScopeDefinition::new("webhook:write", "Create, update and delete webhook subscriptions"),
    ScopeDefinition::new("file:read", "Download files"),
    ScopeDefinition::new("file:write", "Upload and delete files"),
    ScopeDefinition::new("workspace:read", "Read workspace settings"),
];

/// All scopes the platform understands, in registry order
#[inline]
pub fn registry() -> &'static [ScopeDefinition] {
    REGISTRY
}

/// Looks up a scope by name
pub fn lookup(scope: &str) -> Option<&'static ScopeDefinition> {
    REGISTRY.iter().find(|def| def.name == scope)
}

/// Whether the platform knows this scope
#[inline]
pub fn is_valid(scope: &str) -> bool {
    lookup(scope).is_some()
}

/// The description of a known scope
#[inline]
pub fn description(scope: &str) -> Option<&'static str> {
    lookup(scope).map(ScopeDefinition::description)
}

impl ScopeRef {
    /// Whether the platform knows this scope
    #[inline]
    pub fn is_registered(&self) -> bool {
        is_valid(self.as_str())
    }
}
