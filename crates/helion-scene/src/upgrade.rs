//! Structural rewrites that bring legacy documents up to the current schema.

use crate::document::{NodeKind, XmlNode};
use crate::error::LoadError;
use crate::scalars::parse_float;
use crate::version::Version;

/// Upgrade the subtree rooted at `node` from `version` to the current schema.
///
/// Returns whether the document was modified (true for any version other
/// than [`Version::CURRENT`], even when no rewrite applies). Upgrades are
/// idempotent: re-running them on an already upgraded tree changes nothing.
pub fn upgrade_tree(src_id: &str, node: &mut XmlNode, version: Version) -> Result<bool, LoadError> {
    if version == Version::CURRENT {
        return Ok(false);
    }

    log::info!(
        "\"{src_id}\": upgrading document from v{version} to v{} ..",
        Version::CURRENT
    );

    if version < Version::new(2, 0, 0) {
        rename_name_attributes(node);
        rename_elements(node, "lookAt", "lookat");
        rewrite_uv_properties(node)?;
    }

    Ok(true)
}

/// Rewrite every `name` attribute in the subtree from camelCase to
/// underscore_case.
fn rename_name_attributes(node: &mut XmlNode) {
    if let Some(name) = node.attr("name") {
        let renamed = camel_to_underscore(name);
        node.set_attr("name", renamed);
    }
    for child in &mut node.children {
        rename_name_attributes(child);
    }
}

/// Split at every lowercase-to-uppercase boundary and lowercase the
/// following run of uppercase letters.
fn camel_to_underscore(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 2);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_lowercase() && i + 1 < chars.len() && chars[i + 1].is_ascii_uppercase() {
            out.push(c);
            out.push('_');
            i += 1;
            while i < chars.len() && chars[i].is_ascii_uppercase() {
                out.push(chars[i].to_ascii_lowercase());
                i += 1;
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

/// Rename every element called `from` to `to` in the subtree.
fn rename_elements(node: &mut XmlNode, from: &str, to: &str) {
    if node.name == from {
        node.name = to.to_owned();
    }
    for child in &mut node.children {
        rename_elements(child, from, to);
    }
}

/// Fold legacy `uoffset`/`voffset`/`uscale`/`vscale` float properties into a
/// `<transform name="to_uv">` block.
///
/// The attribute rename has already run, so both the historical lowercase
/// spellings and their underscore forms are recognized.
fn rewrite_uv_properties(node: &mut XmlNode) -> Result<(), LoadError> {
    let mut offset = (0.0f64, 0.0f64);
    let mut scale = (1.0f64, 1.0f64);
    let mut found = false;

    let mut keep = Vec::with_capacity(node.children.len());
    for child in node.children.drain(..) {
        match uv_property_kind(&child) {
            Some(kind) => {
                let value = child.attr("value").unwrap_or("");
                let parsed = parse_float(value).ok_or_else(|| {
                    LoadError::message(format!(
                        "could not parse floating point value \"{value}\""
                    ))
                })?;
                match kind {
                    UvKind::UOffset => offset.0 = parsed,
                    UvKind::VOffset => offset.1 = parsed,
                    UvKind::UScale => scale.0 = parsed,
                    UvKind::VScale => scale.1 = parsed,
                }
                found = true;
            }
            None => keep.push(child),
        }
    }
    node.children = keep;

    if found {
        let mut transform = XmlNode {
            kind: NodeKind::Element,
            name: "transform".to_owned(),
            attributes: vec![("name".to_owned(), "to_uv".to_owned())],
            children: Vec::new(),
            text: String::new(),
            offset: node.offset,
        };
        if offset != (0.0, 0.0) {
            transform.children.push(vector2_element("translate", offset, node.offset));
        }
        if scale != (1.0, 1.0) {
            transform.children.push(vector2_element("scale", scale, node.offset));
        }
        node.children.push(transform);
    }

    for child in &mut node.children {
        rewrite_uv_properties(child)?;
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum UvKind {
    UOffset,
    VOffset,
    UScale,
    VScale,
}

fn uv_property_kind(node: &XmlNode) -> Option<UvKind> {
    if node.kind != NodeKind::Element || node.name != "float" {
        return None;
    }
    match node.attr("name")? {
        "uoffset" | "u_offset" => Some(UvKind::UOffset),
        "voffset" | "v_offset" => Some(UvKind::VOffset),
        "uscale" | "u_scale" => Some(UvKind::UScale),
        "vscale" | "v_scale" => Some(UvKind::VScale),
        _ => None,
    }
}

fn vector2_element(name: &str, (x, y): (f64, f64), offset: usize) -> XmlNode {
    XmlNode {
        kind: NodeKind::Element,
        name: name.to_owned(),
        attributes: vec![
            ("x".to_owned(), format!("{x}")),
            ("y".to_owned(), format!("{y}")),
        ],
        children: Vec::new(),
        text: String::new(),
        offset,
    }
}
