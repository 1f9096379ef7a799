//! Math type re-exports and scene-specific math utilities.
//!
//! Scene transforms are stored as 3x4 row-major affine matrices (the bottom
//! row is implicitly `0 0 0 1`), which is also their wire layout.

pub use glam::{Mat4, Vec2, Vec3, Vec4};

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Affine transform stored as three rows of four floats.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Transform {
    pub x: Vec4,
    pub y: Vec4,
    pub z: Vec4,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        x: Vec4::X,
        y: Vec4::Y,
        z: Vec4::Z,
    };

    /// Build from twelve row-major floats.
    #[inline]
    pub fn from_rows(v: &[f32; 12]) -> Self {
        Self {
            x: Vec4::new(v[0], v[1], v[2], v[3]),
            y: Vec4::new(v[4], v[5], v[6], v[7]),
            z: Vec4::new(v[8], v[9], v[10], v[11]),
        }
    }

    /// Flatten into twelve row-major floats.
    #[inline]
    pub fn to_rows(&self) -> [f32; 12] {
        let mut out = [0.0; 12];
        out[0..4].copy_from_slice(&self.x.to_array());
        out[4..8].copy_from_slice(&self.y.to_array());
        out[8..12].copy_from_slice(&self.z.to_array());
        out
    }

    /// Non-uniform scale.
    #[inline]
    pub fn scale(s: Vec3) -> Self {
        Self {
            x: Vec4::new(s.x, 0.0, 0.0, 0.0),
            y: Vec4::new(0.0, s.y, 0.0, 0.0),
            z: Vec4::new(0.0, 0.0, s.z, 0.0),
        }
    }

    /// Convert to a column-major `glam` matrix.
    #[inline]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols(self.x, self.y, self.z, Vec4::W).transpose()
    }

    /// Drop the projective row of a `glam` matrix.
    #[inline]
    pub fn from_mat4(m: &Mat4) -> Self {
        let t = m.transpose();
        Self { x: t.x_axis, y: t.y_axis, z: t.z_axis }
    }

    /// Translation column.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.x.w, self.y.w, self.z.w)
    }

    /// Normalize the three axis columns, keeping translation.
    pub fn clear_scale(&self) -> Self {
        let m = self.to_mat4();
        let axes = [
            m.x_axis.truncate().normalize_or_zero(),
            m.y_axis.truncate().normalize_or_zero(),
            m.z_axis.truncate().normalize_or_zero(),
        ];
        let cleared = Mat4::from_cols(
            axes[0].extend(0.0),
            axes[1].extend(0.0),
            axes[2].extend(0.0),
            m.w_axis,
        );
        Self::from_mat4(&cleared)
    }

    /// Apply to a point.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let h = p.extend(1.0);
        Vec3::new(self.x.dot(h), self.y.dot(h), self.z.dot(h))
    }

    /// Apply to a direction (ignores translation).
    #[inline]
    pub fn transform_direction(&self, d: Vec3) -> Vec3 {
        let h = d.extend(0.0);
        Vec3::new(self.x.dot(h), self.y.dot(h), self.z.dot(h))
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        Transform::from_mat4(&(self.to_mat4() * rhs.to_mat4()))
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform({:?}, {:?}, {:?})", self.x, self.y, self.z)
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BoundBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundBox {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Check if this box is empty (has no volume).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expand this box to include another box.
    #[inline]
    pub fn expand_by_box(&mut self, other: &Self) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// Bounds of this box after an affine transform.
    pub fn transformed(&self, tfm: &Transform) -> Self {
        let mut out = Self::EMPTY;
        if self.is_empty() {
            return out;
        }
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand_by_point(tfm.transform_point(corner));
        }
        out
    }
}

impl Default for BoundBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BoundBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundBox({:?} - {:?})", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_rows_roundtrip() {
        let rows = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let t = Transform::from_rows(&rows);
        assert_eq!(t.to_rows(), rows);
        assert_eq!(t.translation(), Vec3::new(4.0, 8.0, 12.0));
        assert_eq!(Transform::from_mat4(&t.to_mat4()), t);
    }

    #[test]
    fn test_transform_point() {
        let mut t = Transform::IDENTITY;
        t.x.w = 1.0;
        t.z.w = -2.0;
        assert_eq!(t.transform_point(Vec3::ZERO), Vec3::new(1.0, 0.0, -2.0));
        assert_eq!(t.transform_direction(Vec3::X), Vec3::X);
    }

    #[test]
    fn test_clear_scale_and_flip() {
        let t = Transform::scale(Vec3::new(2.0, 3.0, 4.0));
        let c = t.clear_scale();
        assert!(c.to_mat4().abs_diff_eq(Mat4::IDENTITY, 1e-6));

        let flipped = Transform::IDENTITY * Transform::scale(Vec3::new(1.0, 1.0, -1.0));
        assert_eq!(flipped.z.z, -1.0);
    }

    #[test]
    fn test_bound_box() {
        let mut b = BoundBox::EMPTY;
        assert!(b.is_empty());
        b.expand_by_point(Vec3::ZERO);
        b.expand_by_point(Vec3::ONE);
        assert!(!b.is_empty());

        let mut t = Transform::IDENTITY;
        t.y.w = 10.0;
        let moved = b.transformed(&t);
        assert_eq!(moved.min, Vec3::new(0.0, 10.0, 0.0));
        assert_eq!(moved.max, Vec3::new(1.0, 11.0, 1.0));
        assert_eq!(std::mem::size_of::<BoundBox>(), 24);
    }
}
