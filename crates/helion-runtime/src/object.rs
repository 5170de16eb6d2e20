//! The base trait implemented by every instantiated scene object.

use crate::class::Class;
use std::sync::Arc;

/// Shared handle to an instantiated scene object.
///
/// Objects use shared ownership: several descriptors (and the caller) may
/// hold the same instance, which is dropped once the last handle goes away.
pub type SceneObjectRef = Arc<dyn SceneObject>;

/// An object constructed by a plugin from a property bag.
///
/// The loader only depends on this minimal surface; concrete object types
/// (shapes, BSDFs, emitters, spectra, ...) live in the plugin crates.
pub trait SceneObject: Send + Sync {
    /// The class this object was constructed under.
    fn class(&self) -> &Class;

    /// Downcast support for consumers that know the concrete type.
    fn as_any(&self) -> &dyn std::any::Any;

    /// The identifier assigned in the scene description, if any.
    fn id(&self) -> &str {
        ""
    }

    /// Short human-readable description used in diagnostics.
    fn summary(&self) -> String {
        let id = self.id();
        if id.is_empty() {
            format!("{}[unnamed]", self.class().name())
        } else {
            format!("{}[id=\"{}\"]", self.class().name(), id)
        }
    }

    /// Expand this object into replacement objects.
    ///
    /// Called once after construction. An empty result keeps the object as
    /// is; a single element replaces it; several elements are bound into the
    /// parent under indexed names.
    fn expand(&self) -> Vec<SceneObjectRef> {
        Vec::new()
    }
}

impl std::fmt::Debug for dyn SceneObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}
