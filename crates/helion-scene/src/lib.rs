#![warn(missing_docs)]

//! Two-pass XML scene description loader for the helion renderer.
//!
//! A scene description is a directed acyclic graph of typed, named objects
//! with properties and transforms. Loading happens in two passes:
//!
//! 1. a recursive descent over the document tree that validates structure,
//!    substitutes parameters, applies schema upgrades, evaluates transforms,
//!    lowers color/spectrum shorthand and emits a table of deferred object
//!    descriptors keyed by id;
//! 2. a memoized, parallel topological instantiation of that table through
//!    the plugin factory, with alias resolution and object expansion.
//!
//! # Example
//!
//! ```no_run
//! use helion_runtime::{ClassRegistry, PluginManager};
//! use helion_scene::SceneLoader;
//!
//! let mut registry = ClassRegistry::new();
//! registry.register("scene", "scalar-rgb");
//! let plugins = PluginManager::new();
//! // ... register plugin constructors ...
//!
//! let loader = SceneLoader::new(registry, plugins);
//! let scene = loader
//!     .load_string(r#"<scene version="2.0.0"/>"#, "scalar-rgb", &[])
//!     .unwrap();
//! ```

mod document;
mod error;
mod instantiate;
mod parser;
mod scalars;
mod spectrum;
mod tags;
mod transform;
mod upgrade;
mod version;

pub use error::LoadError;
pub use parser::{ParameterList, INCLUDE_MAX_RECURSION};
pub use spectrum::{WAVELENGTH_MAX, WAVELENGTH_MIN};
pub use tags::Tag;
pub use version::Version;

use document::XmlNode;
use helion_runtime::{
    ClassRegistry, FileResolver, FileSystemResolver, PluginManager, Properties, SceneObjectRef,
};
use parser::{ParseContext, Source};
use std::path::Path;
use std::sync::Arc;

/// Loads scene descriptions against a fixed set of external collaborators:
/// the class registry, the plugin factory and the file resolver.
pub struct SceneLoader {
    registry: ClassRegistry,
    plugins: PluginManager,
    resolver: Arc<dyn FileResolver>,
}

impl SceneLoader {
    /// Create a loader with the default filesystem resolver.
    pub fn new(registry: ClassRegistry, plugins: PluginManager) -> Self {
        Self::with_resolver(registry, plugins, Arc::new(FileSystemResolver::new()))
    }

    /// Create a loader with a custom file resolver.
    pub fn with_resolver(
        registry: ClassRegistry,
        plugins: PluginManager,
        resolver: Arc<dyn FileResolver>,
    ) -> Self {
        Self {
            registry,
            plugins,
            resolver,
        }
    }

    /// The class registry consulted during parsing.
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// The plugin factory used to construct objects.
    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    /// The resolver used for `<include>` paths.
    pub fn resolver(&self) -> &dyn FileResolver {
        self.resolver.as_ref()
    }

    /// Load a scene description from a string.
    ///
    /// `variant` selects per-variant classes and the spectral representation;
    /// `params` is an ordered list of `$name` substitutions, where entries
    /// supplied here take precedence over `<default>` declarations.
    pub fn load_string(
        &self,
        text: &str,
        variant: &str,
        params: &[(String, String)],
    ) -> Result<SceneObjectRef, LoadError> {
        let src_id = "<string>";
        let mut doc = document::parse(text)
            .map_err(|e| LoadError::at(src_id, document::offset_to_location(text, e.offset), e.message))?;

        let mut src = Source::new(src_id, text, 0);
        let mut ctx = ParseContext::new(self, variant);
        ctx.sources.insert(src_id.to_owned(), src.text.clone());

        let root_id = self.run_pass1(&mut src, &mut ctx, doc.root_element_mut(), params)?;
        self.run_pass2(ctx, &root_id)
    }

    /// Load a scene description from a file.
    ///
    /// With `write_update`, a document modified by schema upgrades is written
    /// back in place, keeping the original as `<path>.bak`.
    pub fn load_file(
        &self,
        path: &Path,
        variant: &str,
        params: &[(String, String)],
        write_update: bool,
    ) -> Result<SceneObjectRef, LoadError> {
        if !path.exists() {
            return Err(LoadError::message(format!(
                "\"{}\": file does not exist",
                path.display()
            )));
        }
        log::info!("Loading XML file \"{}\" ..", path.display());

        let src_id = path.to_string_lossy().into_owned();
        let text = std::fs::read_to_string(path)?;
        let mut doc = document::parse(&text).map_err(|e| {
            LoadError::at(
                &src_id,
                document::offset_to_location(&text, e.offset),
                e.message,
            )
        })?;

        let mut src = Source::new(src_id.clone(), text.as_str(), 0);
        let mut ctx = ParseContext::new(self, variant);
        ctx.sources.insert(src_id, src.text.clone());

        let root_id = self.run_pass1(&mut src, &mut ctx, doc.root_element_mut(), params)?;

        if src.modified && write_update {
            write_back(path, &mut doc)?;
        }

        self.run_pass2(ctx, &root_id)
    }

    fn run_pass1(
        &self,
        src: &mut Source,
        ctx: &mut ParseContext<'_>,
        root: &mut XmlNode,
        params: &[(String, String)],
    ) -> Result<String, LoadError> {
        let mut props = Properties::new("");
        let mut params = params.to_vec();
        let mut arg_counter = 0usize;
        let (_, root_id) = parser::parse_element(
            src,
            ctx,
            root,
            Tag::Invalid,
            &mut props,
            &mut params,
            &mut arg_counter,
            0,
            false,
        )?;
        Ok(root_id)
    }

    fn run_pass2(
        &self,
        ctx: ParseContext<'_>,
        root_id: &str,
    ) -> Result<SceneObjectRef, LoadError> {
        let ParseContext {
            descriptors,
            sources,
            ..
        } = ctx;
        instantiate::Instantiator::new(self, descriptors, sources).instantiate(root_id)
    }
}

/// Serialize an upgraded document back to disk, keeping a `.bak` copy of the
/// original. Synthetic ids and names are stripped and the root gets the
/// current schema version.
fn write_back(path: &Path, doc: &mut document::XmlDocument) -> Result<(), LoadError> {
    let backup = path.with_extension("bak");
    log::info!(
        "Writing updated \"{}\" .. (backup at \"{}\")",
        path.display(),
        backup.display()
    );
    std::fs::rename(path, &backup).map_err(|e| {
        LoadError::message(format!(
            "unable to rename file \"{}\" to \"{}\": {e}",
            path.display(),
            backup.display()
        ))
    })?;

    let root = doc.root_element_mut();
    root.prepend_attr("version", version::Version::CURRENT.to_string());
    if root.attr("type") == Some("scene") {
        root.remove_attr("type");
    }
    strip_synthetic_attributes(root);

    let xml = document::write(doc)?;
    std::fs::write(path, xml)?;
    Ok(())
}

fn strip_synthetic_attributes(node: &mut XmlNode) {
    if node
        .attr("id")
        .is_some_and(|id| id.starts_with("_unnamed_"))
    {
        node.remove_attr("id");
    }
    if node.attr("name").is_some_and(|name| name.starts_with("_arg_")) {
        node.remove_attr("name");
    }
    for child in &mut node.children {
        strip_synthetic_attributes(child);
    }
}
