//! Layered template context
//!
//! An ordered chain of immutable scopes. Lookups walk from the innermost
//! scope outward and the first scope that mentions a key decides:
//!
//! - a value is returned as-is
//! - a **soft-deleted** (masked) key reads as missing, hiding outer values
//! - a **hard-deleted** key is simply absent, so the outer value shows through
//!
//! Contexts are cheap to extend (`with_scope`) and never mutated once built.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::helpers::Helper;
use super::value::TemplateValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Value(TemplateValue),
    Helper(Helper),
    Masked,
}

/// Result of a successful lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Value(&'a TemplateValue),
    Helper(Helper),
}

/// One named layer of the context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    name: String,
    slots: BTreeMap<String, Slot>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TemplateValue>) {
        self.slots.insert(key.into(), Slot::Value(value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert_helper(&mut self, helper: Helper) {
        self.slots
            .insert(helper.name().to_string(), Slot::Helper(helper));
    }

    /// Mask `key`: lookups stop here and report it missing.
    pub fn soft_delete(&mut self, key: impl Into<String>) {
        self.slots.insert(key.into(), Slot::Masked);
    }

    /// Forget `key` in this scope so outer scopes answer for it.
    pub fn hard_delete(&mut self, key: &str) {
        self.slots.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<&Slot> {
        self.slots.get(key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Outermost first
    scopes: Vec<Arc<Scope>>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new context with `scope` as the innermost layer.
    pub fn with_scope(&self, scope: Scope) -> Self {
        let mut scopes = self.scopes.clone();
        scopes.push(Arc::new(scope));
        Self { scopes }
    }

    pub fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.name() == name)
            .map(|scope| scope.as_ref())
    }

    /// Scope names, outermost first.
    pub fn scope_names(&self) -> Vec<&str> {
        self.scopes.iter().map(|scope| scope.name()).collect()
    }

    /// Look up a single (undotted) key.
    pub fn lookup(&self, key: &str) -> Option<Resolved<'_>> {
        for scope in self.scopes.iter().rev() {
            match scope.get(key) {
                Some(Slot::Value(value)) => return Some(Resolved::Value(value)),
                Some(Slot::Helper(helper)) => return Some(Resolved::Helper(*helper)),
                Some(Slot::Masked) => return None,
                None => continue,
            }
        }
        None
    }

    /// Look up a dotted path. The first segment walks the chain; the rest
    /// descend into the value found.
    pub fn resolve_path(&self, path: &str) -> Option<Resolved<'_>> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        match self.lookup(first)? {
            Resolved::Helper(helper) => segments.next().is_none().then_some(Resolved::Helper(helper)),
            Resolved::Value(mut value) => {
                for segment in segments {
                    value = value.get(segment)?;
                }
                Some(Resolved::Value(value))
            }
        }
    }

    /// Convenience for dotted lookups that must yield a value.
    pub fn value(&self, path: &str) -> Option<&TemplateValue> {
        match self.resolve_path(path)? {
            Resolved::Value(value) => Some(value),
            Resolved::Helper(_) => None,
        }
    }
}
