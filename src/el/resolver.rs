// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Runtime environment for expression evaluation.

use std::collections::HashMap;

use crate::core::{DecodedRecord, Value};

/// A chain of name -> value frames consulted while decoding or encoding.
///
/// Each object under decode pushes a fresh frame over its caller's
/// resolver and extends it, in declaration order, as fields are decoded.
/// Lookup searches the current frame first and then walks the parent
/// chain, so inner frames shadow outer ones.
#[derive(Debug, Default)]
pub struct Resolver<'a> {
    /// Binding order, as inserted
    names: Vec<String>,
    values: HashMap<String, Value>,
    parent: Option<&'a Resolver<'a>>,
}

impl<'a> Resolver<'a> {
    /// Create an empty top-level resolver.
    pub fn root() -> Resolver<'static> {
        Resolver {
            names: Vec::new(),
            values: HashMap::new(),
            parent: None,
        }
    }

    /// Create an empty frame layered over this resolver.
    pub fn child(&'a self) -> Resolver<'a> {
        Resolver {
            names: Vec::new(),
            values: HashMap::new(),
            parent: Some(self),
        }
    }

    /// Bind a name in the current frame.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if !self.values.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.values.insert(name, value);
    }

    /// Bind every field of a decoded record in the current frame.
    ///
    /// Used on encode, where the resolver is backed by the value being
    /// encoded rather than built up incrementally.
    pub fn bind_record(&mut self, record: &DecodedRecord) {
        for (name, value) in record {
            self.bind(name.clone(), value.clone());
        }
    }

    /// Look up a name, searching this frame and then the parent chain.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.values.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|p| p.get(name)),
        }
    }

    /// Look up a name in this frame only.
    pub fn get_local(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The enclosing resolver, if any.
    pub fn outer(&self) -> Option<&Resolver<'a>> {
        self.parent
    }

    /// The topmost enclosing resolver.
    pub fn original(&self) -> &Resolver<'a> {
        let mut current = self;
        while let Some(parent) = current.parent {
            current = parent;
        }
        current
    }

    /// Names bound in this frame, in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_get() {
        let mut resolver = Resolver::root();
        resolver.bind("n", Value::UInt(3));
        assert_eq!(resolver.get("n"), Some(&Value::UInt(3)));
        assert_eq!(resolver.get("missing"), None);
    }

    #[test]
    fn test_insertion_order() {
        let mut resolver = Resolver::root();
        resolver.bind("a", Value::UInt(1));
        resolver.bind("b", Value::UInt(2));
        resolver.bind("a", Value::UInt(3));
        assert_eq!(resolver.names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(resolver.get("a"), Some(&Value::UInt(3)));
    }

    #[test]
    fn test_child_shadows_parent() {
        let mut outer = Resolver::root();
        outer.bind("x", Value::UInt(1));
        outer.bind("y", Value::UInt(2));

        let mut inner = outer.child();
        inner.bind("x", Value::UInt(10));

        assert_eq!(inner.get("x"), Some(&Value::UInt(10)));
        assert_eq!(inner.get("y"), Some(&Value::UInt(2)));
        assert_eq!(inner.get_local("y"), None);
    }

    #[test]
    fn test_outer_and_original() {
        let top = Resolver::root();
        let mid = top.child();
        let leaf = mid.child();

        assert!(leaf.outer().is_some());
        assert!(top.outer().is_none());
        assert!(std::ptr::eq(leaf.original(), &top));
    }

    #[test]
    fn test_bind_record() {
        let mut record = DecodedRecord::new();
        record.insert("flag".to_string(), Value::Bool(true));
        record.insert("x".to_string(), Value::UInt(42));

        let mut resolver = Resolver::root();
        resolver.bind_record(&record);
        assert_eq!(resolver.get("flag"), Some(&Value::Bool(true)));
        assert_eq!(resolver.get("x"), Some(&Value::UInt(42)));
    }
}
