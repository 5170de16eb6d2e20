//! The closed set of element kinds the loader understands.

/// Kind of an XML element in a scene description.
///
/// Element names are looked up case-sensitively; names that are not in the
/// fixed table below but match a registered class for the active variant are
/// treated as [`Tag::Object`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// `<boolean name=... value=...>`
    Boolean,
    /// `<integer name=... value=...>`
    Integer,
    /// `<float name=... value=...>`
    Float,
    /// `<string name=... value=...>`
    String,
    /// `<point name=... x=... y=... z=...>`
    Point,
    /// `<vector name=... x=... y=... z=...>`
    Vector,
    /// `<spectrum name=... value=...>`
    Spectrum,
    /// `<rgb name=... value=...>`
    Rgb,
    /// `<color name=... value=...>`
    Color,
    /// `<transform name=...>` scope
    Transform,
    /// `<translate>` transform operation
    Translate,
    /// `<matrix value=...>` transform operation
    Matrix,
    /// `<rotate angle=...>` transform operation
    Rotate,
    /// `<scale>` transform operation
    Scale,
    /// `<lookat origin=... target=... up=...>` transform operation
    LookAt,
    /// An object element resolved through the class registry.
    Object,
    /// `<ref id=...>`
    NamedReference,
    /// `<include filename=...>`
    Include,
    /// `<alias id=... as=...>`
    Alias,
    /// `<default name=... value=...>`
    Default,
    /// Sentinel used as the root's parent tag.
    Invalid,
}

impl Tag {
    /// True for the five operations allowed inside a `<transform>` scope.
    pub fn is_transform_op(self) -> bool {
        matches!(
            self,
            Tag::Translate | Tag::Rotate | Tag::Scale | Tag::LookAt | Tag::Matrix
        )
    }
}

/// Look up the fixed tag kind for an element name.
pub fn primitive_tag(name: &str) -> Option<Tag> {
    let tag = match name {
        "boolean" => Tag::Boolean,
        "integer" => Tag::Integer,
        "float" => Tag::Float,
        "string" => Tag::String,
        "point" => Tag::Point,
        "vector" => Tag::Vector,
        "spectrum" => Tag::Spectrum,
        "rgb" => Tag::Rgb,
        "color" => Tag::Color,
        "transform" => Tag::Transform,
        "translate" => Tag::Translate,
        "matrix" => Tag::Matrix,
        "rotate" => Tag::Rotate,
        "scale" => Tag::Scale,
        "lookat" => Tag::LookAt,
        "ref" => Tag::NamedReference,
        "include" => Tag::Include,
        "alias" => Tag::Alias,
        "default" => Tag::Default,
        _ => return None,
    };
    Some(tag)
}
