//! Per-variant class handles and their registry.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A class of scene objects, identified by its tag name and variant.
///
/// The tag name is the XML element the class answers to (`bsdf`, `emitter`,
/// `spectrum`, ...); the variant selects the concrete representation
/// (`scalar-rgb`, `scalar-mono`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Class {
    name: String,
    variant: String,
}

impl Class {
    /// Create a new class handle.
    pub fn new(name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant: variant.into(),
        }
    }

    /// Tag name of this class.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variant this class was registered for.
    pub fn variant(&self) -> &str {
        &self.variant
    }
}

/// Registry mapping `(tag name, variant)` to a class handle.
///
/// Populated once during setup, read-only while a document loads.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: HashMap<(String, String), Arc<Class>>,
    tag_names: HashSet<String>,
}

impl ClassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class for `(tag_name, variant)`.
    ///
    /// Registering a `spectrum` class also registers the `texture` synonym
    /// for the same variant: a texture is a kind of continuous spectrum.
    pub fn register(&mut self, tag_name: &str, variant: &str) {
        self.classes.insert(
            (tag_name.to_owned(), variant.to_owned()),
            Arc::new(Class::new(tag_name, variant)),
        );
        self.tag_names.insert(tag_name.to_owned());

        if tag_name == "spectrum" {
            self.classes.insert(
                ("texture".to_owned(), variant.to_owned()),
                Arc::new(Class::new("texture", variant)),
            );
            self.tag_names.insert("texture".to_owned());
        }
    }

    /// True if any variant registered a class under this tag name.
    pub fn has_tag(&self, tag_name: &str) -> bool {
        self.tag_names.contains(tag_name)
    }

    /// Look up the class registered for `(tag_name, variant)`.
    pub fn class_for(&self, tag_name: &str, variant: &str) -> Option<Arc<Class>> {
        self.classes
            .get(&(tag_name.to_owned(), variant.to_owned()))
            .cloned()
    }
}
