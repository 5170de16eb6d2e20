//! Ordered, query-tracking property bags.

use crate::error::RuntimeError;
use crate::object::SceneObjectRef;
use helion_math::{Color3, Point3, Transform, Vec3};
use indexmap::IndexMap;
use std::fmt;

/// A single typed property value.
#[derive(Clone)]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// String.
    String(String),
    /// 3D vector.
    Vector(Vec3),
    /// 3D point.
    Point(Point3),
    /// Linear RGB color.
    Color(Color3),
    /// 4x4 affine transform.
    Transform(Transform),
    /// Array of floats (e.g. spectrum samples).
    FloatArray(Vec<f64>),
    /// Unresolved reference to another object by id.
    NamedReference(String),
    /// Resolved scene object.
    Object(SceneObjectRef),
}

impl Value {
    /// Name of the stored type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Vector(_) => "vector",
            Value::Point(_) => "point",
            Value::Color(_) => "color",
            Value::Transform(_) => "transform",
            Value::FloatArray(_) => "float array",
            Value::NamedReference(_) => "named reference",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Vector(v) => write!(f, "[{}, {}, {}]", v.x, v.y, v.z),
            Value::Point(v) => write!(f, "[{}, {}, {}]", v.x, v.y, v.z),
            Value::Color(v) => write!(f, "[{}, {}, {}]", v.r, v.g, v.b),
            Value::Transform(v) => write!(f, "{:?}", v.matrix),
            Value::FloatArray(v) => write!(f, "{v:?}"),
            Value::NamedReference(v) => write!(f, "ref -> {v}"),
            Value::Object(v) => write!(f, "{}", v.summary()),
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    value: Value,
    queried: bool,
}

/// An insertion-ordered mapping from parameter names to typed values.
///
/// Every read through a typed getter marks the entry as queried; after
/// construction the loader treats entries the plugin never read as an error.
#[derive(Clone, Debug, Default)]
pub struct Properties {
    plugin_name: String,
    id: String,
    entries: IndexMap<String, Entry>,
}

macro_rules! typed_getter {
    ($(#[$doc:meta])* $fn_name:ident, $variant:ident, $ty:ty, $expected:literal) => {
        $(#[$doc])*
        pub fn $fn_name(&mut self, name: &str) -> Result<$ty, RuntimeError> {
            let entry = self
                .entries
                .get_mut(name)
                .ok_or_else(|| RuntimeError::MissingProperty(name.to_owned()))?;
            entry.queried = true;
            match &entry.value {
                Value::$variant(v) => Ok(v.clone()),
                other => Err(RuntimeError::property_type(
                    name,
                    $expected,
                    other.type_name(),
                )),
            }
        }
    };
}

impl Properties {
    /// Create an empty property bag for the given plugin name.
    pub fn new(plugin_name: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            id: String::new(),
            entries: IndexMap::new(),
        }
    }

    /// Plugin name (the `type` attribute of the element).
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Replace the plugin name.
    pub fn set_plugin_name(&mut self, name: impl Into<String>) {
        self.plugin_name = name.into();
    }

    /// Identifier of the element this bag belongs to.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Set the identifier.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Store a value under `name`.
    ///
    /// Specifying the same parameter twice logs a warning and keeps the
    /// latest value. The queried flag of a replaced entry is reset.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let entry = Entry {
            value,
            queried: false,
        };
        if self.entries.insert(name.clone(), entry).is_some() {
            log::warn!("property \"{name}\" was specified multiple times");
        }
    }

    /// Replace `name` without a duplicate warning (used when a resolved
    /// object is bound over its named reference).
    pub fn replace(&mut self, name: impl Into<String>, value: Value) {
        self.entries.insert(
            name.into(),
            Entry {
                value,
                queried: false,
            },
        );
    }

    /// Remove an entry, preserving the order of the remaining ones.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.entries.shift_remove(name).map(|e| e.value)
    }

    /// True if a value is stored under `name`.
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Raw read access without marking the entry queried.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).map(|e| &e.value)
    }

    /// Mark an entry as queried without reading it.
    pub fn mark_queried(&mut self, name: &str) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.queried = true;
        }
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }

    /// Names of all `NamedReference` entries with their referent ids,
    /// in insertion order.
    pub fn named_references(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(name, entry)| match &entry.value {
                Value::NamedReference(id) => Some((name.clone(), id.clone())),
                _ => None,
            })
            .collect()
    }

    /// Names of all entries that were never queried, in insertion order.
    pub fn unqueried(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.queried)
            .map(|(name, _)| name.clone())
            .collect()
    }

    typed_getter!(
        /// Read a boolean property.
        boolean, Bool, bool, "boolean");
    typed_getter!(
        /// Read an integer property.
        integer, Int, i64, "integer");
    typed_getter!(
        /// Read a float property.
        float, Float, f64, "float");
    typed_getter!(
        /// Read a string property.
        string, String, String, "string");
    typed_getter!(
        /// Read a vector property.
        vector, Vector, Vec3, "vector");
    typed_getter!(
        /// Read a point property.
        point, Point, Point3, "point");
    typed_getter!(
        /// Read a color property.
        color, Color, Color3, "color");
    typed_getter!(
        /// Read a transform property.
        transform, Transform, Transform, "transform");
    typed_getter!(
        /// Read a float array property.
        float_array, FloatArray, Vec<f64>, "float array");
    typed_getter!(
        /// Read a resolved object property.
        object, Object, SceneObjectRef, "object");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut props = Properties::new("diffuse");
        props.set("zeta", Value::Float(1.0));
        props.set("alpha", Value::Float(2.0));
        props.set("mid", Value::Float(3.0));

        let names: Vec<&str> = props.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_query_tracking() {
        let mut props = Properties::new("diffuse");
        props.set("used", Value::Float(1.0));
        props.set("ignored", Value::Int(2));

        assert_eq!(props.float("used").unwrap(), 1.0);
        assert_eq!(props.unqueried(), vec!["ignored".to_owned()]);
    }

    #[test]
    fn test_type_mismatch() {
        let mut props = Properties::new("diffuse");
        props.set("x", Value::String("not a float".to_owned()));
        let err = props.float("x").unwrap_err();
        assert!(matches!(err, RuntimeError::PropertyType { .. }));
        // A failed typed read still counts as a query
        assert!(props.unqueried().is_empty());
    }

    #[test]
    fn test_missing_property() {
        let mut props = Properties::new("diffuse");
        let err = props.float("absent").unwrap_err();
        assert!(matches!(err, RuntimeError::MissingProperty(_)));
    }

    #[test]
    fn test_named_references_in_order() {
        let mut props = Properties::new("scene");
        props.set("first", Value::NamedReference("a".to_owned()));
        props.set("value", Value::Float(0.5));
        props.set("second", Value::NamedReference("b".to_owned()));

        assert_eq!(
            props.named_references(),
            vec![
                ("first".to_owned(), "a".to_owned()),
                ("second".to_owned(), "b".to_owned())
            ]
        );
    }

    #[test]
    fn test_duplicate_set_overwrites() {
        let mut props = Properties::new("diffuse");
        props.set("v", Value::Float(1.0));
        props.set("v", Value::Float(2.0));
        assert_eq!(props.float("v").unwrap(), 2.0);
    }
}
