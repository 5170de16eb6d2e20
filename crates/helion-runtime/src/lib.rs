#![warn(missing_docs)]

//! Object model and plugin interfaces for the helion renderer.
//!
//! This crate defines the narrow surface the scene loader talks to when it
//! turns parsed descriptors into live objects: the [`SceneObject`] trait, the
//! per-variant [`Class`] registry, the [`PluginManager`] factory, the ordered
//! [`Properties`] bag, and the [`FileResolver`] used by `<include>` elements.

mod class;
mod error;
mod object;
mod plugin;
mod properties;
mod resolver;

pub use class::{Class, ClassRegistry};
pub use error::RuntimeError;
pub use object::{SceneObject, SceneObjectRef};
pub use plugin::{PluginConstructor, PluginManager};
pub use properties::{Properties, Value};
pub use resolver::{FileResolver, FileSystemResolver};
