//! Plain-data builtins with the engine's layout.
//!
//! Float components use the build's `real` width; `Color` is always four
//! `f32` channels.

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use gdx_sys::real;

use crate::meta::impl_pod_codec;

macro_rules! vector_ops {
    ($ty:ident, $scalar:ty, $($field:ident),+) => {
        impl $ty {
            pub const fn new($($field: $scalar),+) -> Self {
                Self { $($field),+ }
            }

            /// Every component set to `value`.
            pub const fn splat(value: $scalar) -> Self {
                Self { $($field: value),+ }
            }
        }

        impl Add for $ty {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                Self { $($field: self.$field + rhs.$field),+ }
            }
        }

        impl AddAssign for $ty {
            fn add_assign(&mut self, rhs: Self) {
                $(self.$field += rhs.$field;)+
            }
        }

        impl Sub for $ty {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                Self { $($field: self.$field - rhs.$field),+ }
            }
        }

        impl SubAssign for $ty {
            fn sub_assign(&mut self, rhs: Self) {
                $(self.$field -= rhs.$field;)+
            }
        }

        impl Mul<$scalar> for $ty {
            type Output = Self;

            fn mul(self, rhs: $scalar) -> Self {
                Self { $($field: self.$field * rhs),+ }
            }
        }

        impl Neg for $ty {
            type Output = Self;

            fn neg(self) -> Self {
                Self { $($field: -self.$field),+ }
            }
        }
    };
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Vector2 {
    pub x: real,
    pub y: real,
}

vector_ops!(Vector2, real, x, y);

impl Vector2 {
    pub const ZERO: Self = Self::splat(0.0);
    pub const ONE: Self = Self::splat(1.0);
    pub const RIGHT: Self = Self::new(1.0, 0.0);
    pub const DOWN: Self = Self::new(0.0, 1.0);

    pub fn length_squared(self) -> real {
        self.x * self.x + self.y * self.y
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Vector2i {
    pub x: i32,
    pub y: i32,
}

vector_ops!(Vector2i, i32, x, y);

impl Vector2i {
    pub const ZERO: Self = Self::splat(0);

    pub fn cast_float(self) -> Vector2 {
        Vector2::new(self.x as real, self.y as real)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Vector3 {
    pub x: real,
    pub y: real,
    pub z: real,
}

vector_ops!(Vector3, real, x, y, z);

impl Vector3 {
    pub const ZERO: Self = Self::splat(0.0);
    pub const ONE: Self = Self::splat(1.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);

    pub fn length_squared(self) -> real {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn cross(self, with: Self) -> Self {
        Self::new(
            self.y * with.z - self.z * with.y,
            self.z * with.x - self.x * with.z,
            self.x * with.y - self.y * with.x,
        )
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Vector3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

vector_ops!(Vector3i, i32, x, y, z);

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Vector4 {
    pub x: real,
    pub y: real,
    pub z: real,
    pub w: real,
}

vector_ops!(Vector4, real, x, y, z, w);

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Vector4i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub w: i32,
}

vector_ops!(Vector4i, i32, x, y, z, w);

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect2 {
    pub position: Vector2,
    pub size: Vector2,
}

impl Rect2 {
    pub const fn new(position: Vector2, size: Vector2) -> Self {
        Self { position, size }
    }

    pub fn end(self) -> Vector2 {
        self.position + self.size
    }

    /// Whether `point` lies inside, the far edges excluded.
    pub fn contains_point(self, point: Vector2) -> bool {
        let end = self.end();
        point.x >= self.position.x
            && point.y >= self.position.y
            && point.x < end.x
            && point.y < end.y
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect2i {
    pub position: Vector2i,
    pub size: Vector2i,
}

impl Rect2i {
    pub const fn new(position: Vector2i, size: Vector2i) -> Self {
        Self { position, size }
    }

    pub fn area(self) -> i32 {
        self.size.x * self.size.y
    }
}

/// 2D affine transform: two basis columns and an origin.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    pub a: Vector2,
    pub b: Vector2,
    pub origin: Vector2,
}

impl Transform2D {
    pub const IDENTITY: Self = Self {
        a: Vector2::RIGHT,
        b: Vector2::DOWN,
        origin: Vector2::ZERO,
    };

    pub fn xform(self, point: Vector2) -> Vector2 {
        self.a * point.x + self.b * point.y + self.origin
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plane {
    pub normal: Vector3,
    pub d: real,
}

impl Plane {
    pub const fn new(normal: Vector3, d: real) -> Self {
        Self { normal, d }
    }

    pub fn distance_to(self, point: Vector3) -> real {
        self.normal.x * point.x + self.normal.y * point.y + self.normal.z * point.z - self.d
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: real,
    pub y: real,
    pub z: real,
    pub w: real,
}

impl Quaternion {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: real, y: real, z: real, w: real) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub position: Vector3,
    pub size: Vector3,
}

impl Aabb {
    pub const fn new(position: Vector3, size: Vector3) -> Self {
        Self { position, size }
    }

    pub fn volume(self) -> real {
        self.size.x * self.size.y * self.size.z
    }
}

/// 3x3 matrix stored as rows.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    pub rows: [Vector3; 3],
}

impl Basis {
    pub const IDENTITY: Self = Self {
        rows: [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ],
    };

    pub fn xform(self, v: Vector3) -> Vector3 {
        let row = |r: Vector3| r.x * v.x + r.y * v.y + r.z * v.z;
        Vector3::new(row(self.rows[0]), row(self.rows[1]), row(self.rows[2]))
    }
}

impl Default for Basis {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform3D {
    pub basis: Basis,
    pub origin: Vector3,
}

impl Transform3D {
    pub const IDENTITY: Self = Self {
        basis: Basis::IDENTITY,
        origin: Vector3::ZERO,
    };

    pub fn xform(self, point: Vector3) -> Vector3 {
        self.basis.xform(point) + self.origin
    }
}

/// 4x4 matrix stored as columns.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub cols: [Vector4; 4],
}

impl Projection {
    pub const IDENTITY: Self = Self {
        cols: [
            Vector4::new(1.0, 0.0, 0.0, 0.0),
            Vector4::new(0.0, 1.0, 0.0, 0.0),
            Vector4::new(0.0, 0.0, 1.0, 0.0),
            Vector4::new(0.0, 0.0, 0.0, 1.0),
        ],
    };
}

impl Default for Projection {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::from_rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::from_rgba(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::from_rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn from_rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self::from_rgba(r, g, b, 1.0)
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        let channel = |c: u8| c as f32 / 255.0;
        Self::from_rgba(channel(r), channel(g), channel(b), channel(a))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Handle to a server-side resource.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Rid {
    id: u64,
}

impl Rid {
    pub const INVALID: Self = Self { id: 0 };

    pub const fn new(id: u64) -> Self {
        Self { id }
    }

    pub const fn id(self) -> u64 {
        self.id
    }

    pub const fn is_valid(self) -> bool {
        self.id != 0
    }
}

impl_pod_codec! {
    Vector2 => Vector2,
    Vector2i => Vector2i,
    Rect2 => Rect2,
    Rect2i => Rect2i,
    Vector3 => Vector3,
    Vector3i => Vector3i,
    Transform2D => Transform2D,
    Vector4 => Vector4,
    Vector4i => Vector4i,
    Plane => Plane,
    Quaternion => Quaternion,
    Aabb => Aabb,
    Basis => Basis,
    Transform3D => Transform3D,
    Projection => Projection,
    Color => Color,
    Rid => Rid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_arithmetic_is_componentwise() {
        let v = Vector2::new(1.0, 2.0) + Vector2::ONE * 2.0;
        assert_eq!(v, Vector2::new(3.0, 4.0));
        assert_eq!(-Vector3i::new(1, -2, 3), Vector3i::new(-1, 2, -3));
        assert_eq!(Vector3::new(1.0, 0.0, 0.0).cross(Vector3::UP), Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn identity_transforms_keep_points() {
        let p = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(Transform3D::IDENTITY.xform(p), p);
        assert_eq!(Transform2D::default().xform(Vector2::new(5.0, 6.0)), Vector2::new(5.0, 6.0));
    }

    #[test]
    fn rect_contains_excludes_far_edge() {
        let rect = Rect2::new(Vector2::ZERO, Vector2::splat(2.0));
        assert!(rect.contains_point(Vector2::new(1.0, 1.0)));
        assert!(!rect.contains_point(Vector2::new(2.0, 1.0)));
    }

    #[test]
    fn color_layout_ignores_precision() {
        assert_eq!(std::mem::size_of::<Color>(), 16);
        assert_eq!(Color::from_rgba8(255, 0, 0, 255), Color::from_rgb(1.0, 0.0, 0.0));
    }

    #[test]
    fn rid_zero_is_invalid() {
        assert!(!Rid::INVALID.is_valid());
        assert_eq!(Rid::new(7).id(), 7);
    }
}
