//! Pass 1: recursive descent over the document tree.
//!
//! The parser validates structure, substitutes `$name` parameters, applies
//! schema upgrades, evaluates the transform sub-language, lowers color and
//! spectrum shorthand, and emits one deferred [`Descriptor`] per object id.
//! No user object is constructed here except for lowered spectra; everything
//! else waits for the parallel instantiation pass.

use crate::document::{self, NodeKind, XmlNode};
use crate::error::LoadError;
use crate::scalars::{parse_boolean, parse_float, parse_integer};
use crate::spectrum;
use crate::tags::{primitive_tag, Tag};
use crate::transform;
use crate::upgrade;
use crate::version::Version;
use crate::SceneLoader;
use helion_math::{Point3, Transform};
use helion_runtime::{Class, Properties, SceneObjectRef, Value};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Maximum nesting depth of `<include>` directives.
pub const INCLUDE_MAX_RECURSION: usize = 15;

/// Ordered `(name, value)` substitution parameters.
pub type ParameterList = Vec<(String, String)>;

/// One loaded document: its identifier, raw text and include depth.
pub(crate) struct Source {
    pub id: String,
    pub text: Arc<str>,
    pub depth: usize,
    pub modified: bool,
}

impl Source {
    pub fn new(id: impl Into<String>, text: impl Into<Arc<str>>, depth: usize) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            depth,
            modified: false,
        }
    }

    pub fn location(&self, offset: usize) -> String {
        document::offset_to_location(&self.text, offset)
    }

    pub fn error_at(&self, offset: usize, error: impl ToString) -> LoadError {
        LoadError::at(&self.id, self.location(offset), error)
    }
}

/// The deferred representation of an object after pass 1.
///
/// Immutable once emitted, except for the memoized `instance` slot written
/// during pass 2.
pub(crate) struct Descriptor {
    pub props: Properties,
    pub class: Option<Arc<Class>>,
    pub alias: Option<String>,
    pub src_id: String,
    pub offset: usize,
    pub instance: Mutex<Option<SceneObjectRef>>,
}

/// Mutable state threaded through the recursive descent.
pub(crate) struct ParseContext<'a> {
    pub loader: &'a SceneLoader,
    pub descriptors: HashMap<String, Descriptor>,
    pub sources: HashMap<String, Arc<str>>,
    pub transform: Transform,
    pub id_counter: usize,
    pub variant: String,
    pub monochrome: bool,
}

impl<'a> ParseContext<'a> {
    pub fn new(loader: &'a SceneLoader, variant: &str) -> Self {
        Self {
            loader,
            descriptors: HashMap::new(),
            sources: HashMap::new(),
            transform: Transform::identity(),
            id_counter: 0,
            variant: variant.to_owned(),
            monochrome: variant.contains("mono"),
        }
    }

    /// The spectrum class for the active variant.
    pub fn spectrum_class(&self) -> Result<Arc<Class>, LoadError> {
        self.loader
            .registry()
            .class_for("spectrum", &self.variant)
            .ok_or_else(|| {
                LoadError::message("could not retrieve class object for tag \"spectrum\"")
            })
    }

    /// Construct an object through the plugin factory.
    pub fn create_object(
        &self,
        class: &Class,
        props: &mut Properties,
    ) -> Result<SceneObjectRef, LoadError> {
        self.loader
            .plugins()
            .create(class, props)
            .map_err(LoadError::from)
    }

    /// Human-readable location of a descriptor's source element.
    pub fn location_of(&self, desc: &Descriptor) -> String {
        match self.sources.get(&desc.src_id) {
            Some(text) => document::offset_to_location(text, desc.offset),
            None => format!("byte offset {}", desc.offset),
        }
    }
}

/// Check that `node` carries only attributes from `expected`.
///
/// With `expect_all`, every expected attribute must be present; without it
/// (transform operations), it suffices that at least one appeared.
fn check_attributes(node: &XmlNode, expected: &[&str], expect_all: bool) -> Result<(), LoadError> {
    let mut remaining: BTreeSet<&str> = expected.iter().copied().collect();
    let mut found_one = false;
    for (attr_name, _) in &node.attributes {
        if !remaining.remove(attr_name.as_str()) {
            return Err(LoadError::message(format!(
                "unexpected attribute \"{attr_name}\" in element \"{}\"",
                node.name
            )));
        }
        found_one = true;
    }
    if !remaining.is_empty() && (!found_one || expect_all) {
        let missing = remaining.iter().next().copied().unwrap_or("");
        return Err(LoadError::message(format!(
            "missing attribute \"{missing}\" in element \"{}\"",
            node.name
        )));
    }
    Ok(())
}

fn required_attr(node: &XmlNode, name: &str) -> Result<String, LoadError> {
    node.attr(name).map(str::to_owned).ok_or_else(|| {
        LoadError::message(format!(
            "missing attribute \"{name}\" in element \"{}\"",
            node.name
        ))
    })
}

/// Parse one element and its subtree.
///
/// Returns the `(name, id)` pair of an object or reference so the caller can
/// bind it as a named reference; all other tags return empty strings.
/// Errors pick up the element's location on the way out unless an inner
/// frame already attached one.
#[allow(clippy::too_many_arguments)]
pub(crate) fn parse_element(
    src: &mut Source,
    ctx: &mut ParseContext<'_>,
    node: &mut XmlNode,
    parent_tag: Tag,
    props: &mut Properties,
    params: &mut ParameterList,
    arg_counter: &mut usize,
    depth: usize,
    within_emitter: bool,
) -> Result<(String, String), LoadError> {
    let offset = node.offset;
    parse_element_inner(
        src,
        ctx,
        node,
        parent_tag,
        props,
        params,
        arg_counter,
        depth,
        within_emitter,
    )
    .map_err(|e| e.locate(&src.id, src.location(offset)))
}

#[allow(clippy::too_many_arguments)]
fn parse_element_inner(
    src: &mut Source,
    ctx: &mut ParseContext<'_>,
    node: &mut XmlNode,
    parent_tag: Tag,
    props: &mut Properties,
    params: &mut ParameterList,
    arg_counter: &mut usize,
    depth: usize,
    within_emitter: bool,
) -> Result<(String, String), LoadError> {
    // Substitute $name parameters into attribute values. Unmatched
    // placeholders are left intact.
    if !params.is_empty() {
        for (_, value) in node.attributes.iter_mut() {
            if !value.contains('$') {
                continue;
            }
            for (key, replacement) in params.iter() {
                let pattern = format!("${key}");
                if value.contains(&pattern) {
                    *value = value.replace(&pattern, replacement);
                }
            }
        }
    }

    match node.kind {
        NodeKind::Comment => return Ok((String::new(), String::new())),
        NodeKind::Text => return Err(LoadError::message("unexpected content")),
        NodeKind::Element => {}
    }

    // Resolve the tag kind
    let element_name = node.name.clone();
    let mut tag = match primitive_tag(&element_name) {
        Some(tag) => tag,
        None if ctx.loader.registry().has_tag(&element_name) => Tag::Object,
        None => {
            return Err(LoadError::message(format!(
                "unexpected tag \"{element_name}\""
            )))
        }
    };
    if node.attr("type").is_some()
        && tag != Tag::Object
        && ctx
            .loader
            .registry()
            .class_for(&element_name, &ctx.variant)
            .is_some()
    {
        tag = Tag::Object;
    }

    // Structural sanity checks
    let has_parent = parent_tag != Tag::Invalid;
    let parent_is_object = parent_tag == Tag::Object;
    let current_is_object = tag == Tag::Object;
    let parent_is_transform = parent_tag == Tag::Transform;
    let current_is_transform_op = tag.is_transform_op();

    if !has_parent && !current_is_object {
        return Err(LoadError::message(format!(
            "root element \"{element_name}\" must be an object"
        )));
    }
    if parent_is_transform != current_is_transform_op {
        return Err(LoadError::message(if parent_is_transform {
            "transform nodes can only contain transform operations"
        } else {
            "transform operations can only occur in a transform node"
        }));
    }
    if has_parent && !parent_is_object && !(parent_is_transform && current_is_transform_op) {
        return Err(LoadError::message(format!(
            "node \"{element_name}\" cannot occur as child of a property"
        )));
    }

    // A version attribute is mandatory on the root and triggers schema
    // upgrades wherever it appears; it never reaches the attribute checks.
    if depth == 0 && node.attr("version").is_none() {
        return Err(LoadError::message(format!(
            "missing version attribute in root element \"{element_name}\""
        )));
    }
    if let Some(version_str) = node.attr("version").map(str::to_owned) {
        let version: Version = version_str.parse().map_err(|_| {
            LoadError::message(format!("could not parse version number \"{version_str}\""))
        })?;
        if upgrade::upgrade_tree(&src.id, node, version)? {
            src.modified = true;
        }
        node.remove_attr("version");
    }

    if element_name == "scene" {
        node.set_attr("type", "scene");
    } else if tag == Tag::Transform {
        ctx.transform = Transform::identity();
    }

    // Name and id synthesis; leading underscores are reserved
    let names_object = current_is_object || tag == Tag::NamedReference;
    if let Some(name) = node.attr("name") {
        if name.starts_with('_') {
            return Err(LoadError::message(format!(
                "invalid parameter name \"{name}\" in element \"{element_name}\": \
                 leading underscores are reserved for internal identifiers"
            )));
        }
    } else if names_object {
        node.set_attr("name", format!("_arg_{}", *arg_counter));
        *arg_counter += 1;
    }

    if let Some(id) = node.attr("id") {
        if id.starts_with('_') {
            return Err(LoadError::message(format!(
                "invalid id \"{id}\" in element \"{element_name}\": \
                 leading underscores are reserved for internal identifiers"
            )));
        }
    } else if current_is_object {
        node.set_attr("id", format!("_unnamed_{}", ctx.id_counter));
        ctx.id_counter += 1;
    }

    match tag {
        Tag::Object => {
            check_attributes(node, &["type", "id", "name"], true)?;
            let id = required_attr(node, "id")?;
            let name = required_attr(node, "name")?;
            let plugin_type = required_attr(node, "type")?;

            if let Some(existing) = ctx.descriptors.get(&id) {
                return Err(LoadError::message(format!(
                    "\"{element_name}\" has duplicate id \"{id}\" (previous was at {})",
                    ctx.location_of(existing)
                )));
            }
            let class = ctx
                .loader
                .registry()
                .class_for(&element_name, &ctx.variant)
                .ok_or_else(|| {
                    LoadError::message(format!(
                        "could not retrieve class object for tag \"{element_name}\""
                    ))
                })?;

            let mut nested_props = Properties::new(&plugin_type);
            nested_props.set_id(&id);

            let nested_emitter = element_name == "emitter";
            let mut nested_counter = 0usize;
            for i in 0..node.children.len() {
                let (arg_name, nested_id) = parse_element(
                    src,
                    ctx,
                    &mut node.children[i],
                    Tag::Object,
                    &mut nested_props,
                    params,
                    &mut nested_counter,
                    depth + 1,
                    nested_emitter,
                )?;
                if !nested_id.is_empty() {
                    nested_props.set(arg_name, Value::NamedReference(nested_id));
                }
            }

            ctx.descriptors.insert(
                id.clone(),
                Descriptor {
                    props: nested_props,
                    class: Some(class),
                    alias: None,
                    src_id: src.id.clone(),
                    offset: node.offset,
                    instance: Mutex::new(None),
                },
            );
            return Ok((name, id));
        }

        Tag::NamedReference => {
            check_attributes(node, &["name", "id"], true)?;
            let id = required_attr(node, "id")?;
            let name = required_attr(node, "name")?;
            return Ok((name, id));
        }

        Tag::Alias => {
            check_attributes(node, &["id", "as"], true)?;
            let alias_src = required_attr(node, "id")?;
            let alias_dst = required_attr(node, "as")?;
            if let Some(existing) = ctx.descriptors.get(&alias_dst) {
                return Err(LoadError::message(format!(
                    "\"{element_name}\" has duplicate id \"{alias_dst}\" (previous was at {})",
                    ctx.location_of(existing)
                )));
            }
            if !ctx.descriptors.contains_key(&alias_src) {
                return Err(LoadError::message(format!(
                    "referenced id \"{alias_src}\" not found"
                )));
            }
            ctx.descriptors.insert(
                alias_dst,
                Descriptor {
                    props: Properties::new(""),
                    class: None,
                    alias: Some(alias_src),
                    src_id: src.id.clone(),
                    offset: node.offset,
                    instance: Mutex::new(None),
                },
            );
            return Ok((String::new(), String::new()));
        }

        Tag::Default => {
            check_attributes(node, &["name", "value"], true)?;
            let name = required_attr(node, "name")?;
            let value = required_attr(node, "value")?;
            if name.is_empty() {
                return Err(LoadError::message("<default>: name must be non-empty"));
            }
            // Earlier entries win, so caller-supplied parameters take
            // precedence over document defaults.
            if !params.iter().any(|(key, _)| key == &name) {
                params.push((name, value));
            }
            return Ok((String::new(), String::new()));
        }

        Tag::Include => {
            check_attributes(node, &["filename"], true)?;
            let filename = required_attr(node, "filename")?;
            let resolved = ctx.loader.resolver().resolve(Path::new(&filename));
            if !resolved.exists() {
                return Err(LoadError::message(format!(
                    "included file \"{}\" not found",
                    resolved.display()
                )));
            }
            if src.depth + 1 > INCLUDE_MAX_RECURSION {
                return Err(LoadError::message(format!(
                    "exceeded <include> recursion limit of {INCLUDE_MAX_RECURSION}"
                )));
            }

            log::info!("Loading included XML file \"{}\" ..", resolved.display());
            let text = std::fs::read_to_string(&resolved)?;
            let nested_id = resolved.to_string_lossy().into_owned();
            let mut nested_doc = match document::parse(&text) {
                Ok(doc) => doc,
                Err(e) => {
                    return Err(LoadError::message(format!(
                        "error while loading \"{nested_id}\" (at {}): {}",
                        document::offset_to_location(&text, e.offset),
                        e.message
                    )))
                }
            };
            let mut nested_src = Source::new(nested_id.clone(), text.as_str(), src.depth + 1);
            ctx.sources.insert(nested_id, nested_src.text.clone());

            // A scene-rooted include splices its children into the current
            // parent; any other root is parsed in place of this element.
            let root_is_scene = nested_doc.root_element().name == "scene";
            let include_offset = node.offset;
            let result = if root_is_scene {
                let root = nested_doc.root_element_mut();
                let mut splice = || -> Result<(String, String), LoadError> {
                    for i in 0..root.children.len() {
                        let (arg_name, nested_ref) = parse_element(
                            &mut nested_src,
                            ctx,
                            &mut root.children[i],
                            parent_tag,
                            props,
                            params,
                            arg_counter,
                            1,
                            false,
                        )?;
                        if !nested_ref.is_empty() {
                            props.set(arg_name, Value::NamedReference(nested_ref));
                        }
                    }
                    Ok((String::new(), String::new()))
                };
                splice()
            } else {
                parse_element(
                    &mut nested_src,
                    ctx,
                    nested_doc.root_element_mut(),
                    parent_tag,
                    props,
                    params,
                    arg_counter,
                    0,
                    false,
                )
            };
            // Inner failures always gain this include element's location so
            // the chain names every file on the way in.
            let pair = result.map_err(|e| src.error_at(include_offset, e))?;
            if !root_is_scene {
                return Ok(pair);
            }
        }

        Tag::String => {
            check_attributes(node, &["name", "value"], true)?;
            let name = required_attr(node, "name")?;
            let value = required_attr(node, "value")?;
            props.set(name, Value::String(value));
        }

        Tag::Float => {
            check_attributes(node, &["name", "value"], true)?;
            let name = required_attr(node, "name")?;
            let value = required_attr(node, "value")?;
            let parsed = parse_float(&value).ok_or_else(|| {
                LoadError::message(format!("could not parse floating point value \"{value}\""))
            })?;
            props.set(name, Value::Float(parsed));
        }

        Tag::Integer => {
            check_attributes(node, &["name", "value"], true)?;
            let name = required_attr(node, "name")?;
            let value = required_attr(node, "value")?;
            let parsed = parse_integer(&value).ok_or_else(|| {
                LoadError::message(format!("could not parse integer value \"{value}\""))
            })?;
            props.set(name, Value::Int(parsed));
        }

        Tag::Boolean => {
            check_attributes(node, &["name", "value"], true)?;
            let name = required_attr(node, "name")?;
            let value = required_attr(node, "value")?;
            let parsed = parse_boolean(&value).ok_or_else(|| {
                LoadError::message(format!(
                    "could not parse boolean value \"{value}\" -- must be \"true\" or \"false\""
                ))
            })?;
            props.set(name, Value::Bool(parsed));
        }

        Tag::Vector => {
            transform::expand_value_to_xyz(node)?;
            check_attributes(node, &["name", "x", "y", "z"], true)?;
            let name = required_attr(node, "name")?;
            let v = transform::parse_vector(node, 0.0)?;
            props.set(name, Value::Vector(v));
        }

        Tag::Point => {
            transform::expand_value_to_xyz(node)?;
            check_attributes(node, &["name", "x", "y", "z"], true)?;
            let name = required_attr(node, "name")?;
            let v = transform::parse_vector(node, 0.0)?;
            props.set(name, Value::Point(Point3::from(v)));
        }

        Tag::Color => {
            check_attributes(node, &["name", "value"], true)?;
            let name = required_attr(node, "name")?;
            let value = required_attr(node, "value")?;
            let color = spectrum::color_value(&value, ctx.monochrome)?;
            props.set(name, Value::Color(color));
        }

        Tag::Rgb => {
            check_attributes(node, &["name", "value"], true)?;
            let name = required_attr(node, "name")?;
            let value = required_attr(node, "value")?;
            let object = spectrum::rgb_object(ctx, &value, within_emitter)?;
            props.set(name, Value::Object(object));
        }

        Tag::Spectrum => {
            check_attributes(node, &["name", "value"], true)?;
            let name = required_attr(node, "name")?;
            let value = required_attr(node, "value")?;
            let object = spectrum::spectrum_object(ctx, &value, within_emitter)?;
            props.set(name, Value::Object(object));
        }

        Tag::Transform => {
            check_attributes(node, &["name"], true)?;
            ctx.transform = Transform::identity();
        }

        Tag::Translate => {
            transform::expand_value_to_xyz(node)?;
            check_attributes(node, &["x", "y", "z"], false)?;
            let v = transform::parse_vector(node, 0.0)?;
            ctx.transform = Transform::translation(&v).then(&ctx.transform);
        }

        Tag::Rotate => {
            transform::expand_value_to_xyz(node)?;
            check_attributes(node, &["angle", "x", "y", "z"], false)?;
            let axis = transform::parse_vector(node, 0.0)?;
            let angle_str = node.attr("angle").unwrap_or("").to_owned();
            let angle = parse_float(&angle_str).ok_or_else(|| {
                LoadError::message(format!(
                    "could not parse floating point value \"{angle_str}\""
                ))
            })?;
            ctx.transform = transform::rotate_op(&axis, angle).then(&ctx.transform);
        }

        Tag::Scale => {
            transform::expand_value_to_xyz(node)?;
            check_attributes(node, &["x", "y", "z"], false)?;
            let v = transform::parse_vector(node, 1.0)?;
            ctx.transform = Transform::scale(&v).then(&ctx.transform);
        }

        Tag::LookAt => {
            check_attributes(node, &["origin", "target", "up"], true)?;
            let origin = transform::parse_named_vector(node, "origin")?;
            let target = transform::parse_named_vector(node, "target")?;
            let up = transform::parse_named_vector(node, "up")?;
            let op = transform::lookat_op(&origin, &target, &up)?;
            ctx.transform = op.then(&ctx.transform);
        }

        Tag::Matrix => {
            check_attributes(node, &["value"], true)?;
            let value = required_attr(node, "value")?;
            let op = transform::matrix_op(&value)?;
            ctx.transform = op.then(&ctx.transform);
        }

        Tag::Invalid => {
            return Err(LoadError::message(format!(
                "unhandled element \"{element_name}\""
            )))
        }
    }

    // Traverse children of tags that did not handle them above
    for i in 0..node.children.len() {
        parse_element(
            src,
            ctx,
            &mut node.children[i],
            tag,
            props,
            params,
            arg_counter,
            depth + 1,
            within_emitter,
        )?;
    }

    // Closing a transform scope records the accumulator
    if tag == Tag::Transform {
        let name = required_attr(node, "name")?;
        props.set(name, Value::Transform(ctx.transform.clone()));
    }

    Ok((String::new(), String::new()))
}
