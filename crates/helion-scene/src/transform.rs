//! Evaluation of the transform sub-language.
//!
//! Inside a `<transform>` scope every child operation produces a 4x4 matrix
//! that is left-multiplied onto the running accumulator, so earlier children
//! act innermost on a transformed point.

use crate::document::XmlNode;
use crate::error::LoadError;
use crate::scalars::{parse_float, tokenize};
use helion_math::{Dir3, Matrix4, Point3, Transform, Vec3};

/// Split a `value` attribute into `x`/`y`/`z` attributes.
///
/// A single scalar is broadcast to all three axes; three scalars are split
/// in order. Mixing `value` with any of `x`/`y`/`z` is rejected.
pub fn expand_value_to_xyz(node: &mut XmlNode) -> Result<(), LoadError> {
    let Some(value) = node.attr("value").map(str::to_owned) else {
        return Ok(());
    };
    if node.attr("x").is_some() || node.attr("y").is_some() || node.attr("z").is_some() {
        return Err(LoadError::message(
            "can't mix and match \"value\" and \"x\"/\"y\"/\"z\" attributes",
        ));
    }
    let tokens = tokenize(&value);
    match tokens.len() {
        1 => {
            node.set_attr("x", tokens[0]);
            node.set_attr("y", tokens[0]);
            node.set_attr("z", tokens[0]);
        }
        3 => {
            node.set_attr("x", tokens[0]);
            node.set_attr("y", tokens[1]);
            node.set_attr("z", tokens[2]);
        }
        _ => {
            return Err(LoadError::message(
                "\"value\" attribute must have exactly 1 or 3 elements",
            ))
        }
    }
    node.remove_attr("value");
    Ok(())
}

/// Read the `x`/`y`/`z` attributes of `node`, substituting `default` for
/// missing components.
pub fn parse_vector(node: &XmlNode, default: f64) -> Result<Vec3, LoadError> {
    let mut components = [default; 3];
    for (slot, name) in components.iter_mut().zip(["x", "y", "z"]) {
        if let Some(value) = node.attr(name) {
            *slot = parse_float(value).ok_or_else(|| {
                LoadError::message(format!(
                    "could not parse floating point value \"{value}\""
                ))
            })?;
        }
    }
    Ok(Vec3::new(components[0], components[1], components[2]))
}

/// Parse an attribute holding exactly three floats (e.g. `origin="0 1 0"`).
pub fn parse_named_vector(node: &XmlNode, attr_name: &str) -> Result<Vec3, LoadError> {
    let value = node.attr(attr_name).unwrap_or("");
    let tokens = tokenize(value);
    if tokens.len() != 3 {
        return Err(LoadError::message(format!(
            "\"{attr_name}\" attribute must have exactly 3 elements"
        )));
    }
    let mut components = [0.0; 3];
    for (slot, token) in components.iter_mut().zip(&tokens) {
        *slot = parse_float(token).ok_or_else(|| {
            LoadError::message(format!(
                "could not parse floating point values in \"{value}\""
            ))
        })?;
    }
    Ok(Vec3::new(components[0], components[1], components[2]))
}

/// Rotation by `angle` degrees about `axis` (normalized here).
pub fn rotate_op(axis: &Vec3, angle_deg: f64) -> Transform {
    let axis = Dir3::new_normalize(*axis);
    Transform::rotation_about_axis(&axis, angle_deg.to_radians())
}

/// Camera look-at operation; rejects degenerate configurations.
pub fn lookat_op(origin: &Vec3, target: &Vec3, up: &Vec3) -> Result<Transform, LoadError> {
    let result = Transform::look_at(
        &Point3::from(*origin),
        &Point3::from(*target),
        up,
    );
    if result.has_nan() {
        return Err(LoadError::message("invalid lookat transformation"));
    }
    Ok(result)
}

/// Parse a `matrix` operation's 16 row-major values.
pub fn matrix_op(value: &str) -> Result<Transform, LoadError> {
    let tokens = tokenize(value);
    if tokens.len() != 16 {
        return Err(LoadError::message("matrix: expected 16 values"));
    }
    let mut matrix = Matrix4::identity();
    for i in 0..4 {
        for j in 0..4 {
            let token = tokens[i * 4 + j];
            matrix[(i, j)] = parse_float(token).ok_or_else(|| {
                LoadError::message(format!(
                    "could not parse floating point value \"{token}\""
                ))
            })?;
        }
    }
    Ok(Transform::from_matrix(matrix))
}
