#![warn(missing_docs)]

//! Math types for the helion scene loader.
//!
//! Thin wrappers around nalgebra providing the domain-specific types a scene
//! description works with: points, vectors, linear colors, and 4x4 affine
//! transforms.

use nalgebra::{Unit, Vector3, Vector4};
pub use nalgebra::Matrix4;

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// Absolute tolerance for scalar comparisons (e.g. spectrum sample spacing).
pub const EPSILON: f64 = 1e-4;

/// A linear RGB color value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color3 {
    /// Red component.
    pub r: f64,
    /// Green component.
    pub g: f64,
    /// Blue component.
    pub b: f64,
}

impl Color3 {
    /// Create a new color from its components.
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Create a gray color with all components equal to `v`.
    pub fn splat(v: f64) -> Self {
        Self { r: v, g: v, b: v }
    }

    /// CIE luminance of this color (Rec. 709 primaries, D65 white point).
    pub fn luminance(&self) -> f64 {
        0.212671 * self.r + 0.715160 * self.g + 0.072169 * self.b
    }

    /// Check that every component lies in `[0, 1]`.
    pub fn is_valid_reflectance(&self) -> bool {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        in_range(self.r) && in_range(self.g) && in_range(self.b)
    }
}

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Wrap a raw 4x4 matrix.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Translation by `v`.
    pub fn translation(v: &Vec3) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = v.x;
        m[(1, 3)] = v.y;
        m[(2, 3)] = v.z;
        Self { matrix: m }
    }

    /// Non-uniform scale by `v`.
    pub fn scale(v: &Vec3) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = v.x;
        m[(1, 1)] = v.y;
        m[(2, 2)] = v.z;
        Self { matrix: m }
    }

    /// Rotation about an arbitrary axis through the origin by `angle` radians.
    ///
    /// Uses Rodrigues' rotation formula.
    pub fn rotation_about_axis(axis: &Dir3, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let (x, y, z) = (axis.as_ref().x, axis.as_ref().y, axis.as_ref().z);
        let mut m = Matrix4::identity();
        m[(0, 0)] = t * x * x + c;
        m[(0, 1)] = t * x * y - s * z;
        m[(0, 2)] = t * x * z + s * y;
        m[(1, 0)] = t * x * y + s * z;
        m[(1, 1)] = t * y * y + c;
        m[(1, 2)] = t * y * z - s * x;
        m[(2, 0)] = t * x * z - s * y;
        m[(2, 1)] = t * y * z + s * x;
        m[(2, 2)] = t * z * z + c;
        Self { matrix: m }
    }

    /// Camera-style look-at transform.
    ///
    /// Maps the origin of the local frame to `origin`, the local +Z axis
    /// toward `target`, and uses `up` to fix the roll. Degenerate inputs
    /// (e.g. `up` parallel to the viewing direction, or `origin == target`)
    /// produce NaN entries, which callers are expected to reject via
    /// [`Transform::has_nan`].
    pub fn look_at(origin: &Point3, target: &Point3, up: &Vec3) -> Self {
        let dir = (target - origin).normalize();
        let left = up.cross(&dir).normalize();
        let new_up = dir.cross(&left);
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 1>(0, 0).copy_from(&left);
        m.fixed_view_mut::<3, 1>(0, 1).copy_from(&new_up);
        m.fixed_view_mut::<3, 1>(0, 2).copy_from(&dir);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&origin.coords);
        Self { matrix: m }
    }

    /// Compose: apply `other` first, then `self` (`self * other`).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// True if any matrix entry is NaN.
    pub fn has_nan(&self) -> bool {
        self.matrix.iter().any(|v| v.is_nan())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
