//! Plugin constructor registry.

use crate::class::Class;
use crate::error::RuntimeError;
use crate::object::SceneObjectRef;
use crate::properties::Properties;
use std::collections::HashMap;

/// Constructor invoked to build a concrete object from a property bag.
pub type PluginConstructor =
    Box<dyn Fn(&Class, &mut Properties) -> Result<SceneObjectRef, RuntimeError> + Send + Sync>;

/// Factory that maps plugin names to constructors.
///
/// The loader hands every descriptor's class handle and property bag to
/// [`PluginManager::create`]; the plugin name stored in the bag (the `type`
/// attribute) selects the constructor.
#[derive(Default)]
pub struct PluginManager {
    constructors: HashMap<String, PluginConstructor>,
    catch_all: Option<PluginConstructor>,
}

impl PluginManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for the given plugin name.
    pub fn register(&mut self, plugin_name: &str, constructor: PluginConstructor) {
        self.constructors
            .insert(plugin_name.to_owned(), constructor);
    }

    /// Install a fallback constructor used for any unregistered plugin name.
    ///
    /// Validation tools use this to accept arbitrary scene files without
    /// shipping the full plugin set.
    pub fn set_catch_all(&mut self, constructor: PluginConstructor) {
        self.catch_all = Some(constructor);
    }

    /// Construct an object of `class` from `props`.
    pub fn create(
        &self,
        class: &Class,
        props: &mut Properties,
    ) -> Result<SceneObjectRef, RuntimeError> {
        let name = props.plugin_name().to_owned();
        let constructor = self
            .constructors
            .get(&name)
            .or(self.catch_all.as_ref())
            .ok_or(RuntimeError::UnknownPlugin(name))?;
        constructor(class, props)
    }
}
