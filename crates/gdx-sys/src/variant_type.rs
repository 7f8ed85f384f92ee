//! Variant kinds, call errors and initialization levels.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::types::VariantTypeRaw;

/// Kind tag of an engine variant.
///
/// Numbering follows the engine; it is part of the ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum VariantType {
    Nil = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    String = 4,
    Vector2 = 5,
    Vector2i = 6,
    Rect2 = 7,
    Rect2i = 8,
    Vector3 = 9,
    Vector3i = 10,
    Transform2D = 11,
    Vector4 = 12,
    Vector4i = 13,
    Plane = 14,
    Quaternion = 15,
    Aabb = 16,
    Basis = 17,
    Transform3D = 18,
    Projection = 19,
    Color = 20,
    StringName = 21,
    NodePath = 22,
    Rid = 23,
    Object = 24,
    Callable = 25,
    Signal = 26,
    Dictionary = 27,
    Array = 28,
    PackedByteArray = 29,
    PackedInt32Array = 30,
    PackedInt64Array = 31,
    PackedFloat32Array = 32,
    PackedFloat64Array = 33,
    PackedStringArray = 34,
    PackedVector2Array = 35,
    PackedVector3Array = 36,
    PackedColorArray = 37,
}

impl VariantType {
    pub const COUNT: usize = 38;

    /// Every kind, in ABI order.
    pub const ALL: [VariantType; Self::COUNT] = {
        let mut all = [VariantType::Nil; Self::COUNT];
        let mut i = 0;
        while i < Self::COUNT {
            all[i] = match Self::from_index(i) {
                Some(kind) => kind,
                None => VariantType::Nil,
            };
            i += 1;
        }
        all
    };

    const fn from_index(index: usize) -> Option<Self> {
        use VariantType::*;
        Some(match index {
            0 => Nil,
            1 => Bool,
            2 => Int,
            3 => Float,
            4 => String,
            5 => Vector2,
            6 => Vector2i,
            7 => Rect2,
            8 => Rect2i,
            9 => Vector3,
            10 => Vector3i,
            11 => Transform2D,
            12 => Vector4,
            13 => Vector4i,
            14 => Plane,
            15 => Quaternion,
            16 => Aabb,
            17 => Basis,
            18 => Transform3D,
            19 => Projection,
            20 => Color,
            21 => StringName,
            22 => NodePath,
            23 => Rid,
            24 => Object,
            25 => Callable,
            26 => Signal,
            27 => Dictionary,
            28 => Array,
            29 => PackedByteArray,
            30 => PackedInt32Array,
            31 => PackedInt64Array,
            32 => PackedFloat32Array,
            33 => PackedFloat64Array,
            34 => PackedStringArray,
            35 => PackedVector2Array,
            36 => PackedVector3Array,
            37 => PackedColorArray,
            _ => return None,
        })
    }

    #[inline]
    pub fn sys(self) -> VariantTypeRaw {
        self.into()
    }

    /// Decode a raw tag, mapping unknown values to `Nil`.
    pub fn from_sys(raw: VariantTypeRaw) -> Self {
        Self::try_from(raw).unwrap_or(VariantType::Nil)
    }

    /// Kinds whose value is stored inline and copied bitwise.
    pub fn is_plain_data(self) -> bool {
        use VariantType::*;
        !matches!(
            self,
            String
                | StringName
                | NodePath
                | Object
                | Callable
                | Signal
                | Dictionary
                | Array
                | PackedByteArray
                | PackedInt32Array
                | PackedInt64Array
                | PackedFloat32Array
                | PackedFloat64Array
                | PackedStringArray
                | PackedVector2Array
                | PackedVector3Array
                | PackedColorArray
        )
    }

    pub fn is_packed_array(self) -> bool {
        (VariantType::PackedByteArray.sys()..=VariantType::PackedColorArray.sys())
            .contains(&self.sys())
    }

    /// Engine-facing name, as used in the API manifest.
    pub fn name(self) -> &'static str {
        use VariantType::*;
        match self {
            Nil => "Nil",
            Bool => "bool",
            Int => "int",
            Float => "float",
            String => "String",
            Vector2 => "Vector2",
            Vector2i => "Vector2i",
            Rect2 => "Rect2",
            Rect2i => "Rect2i",
            Vector3 => "Vector3",
            Vector3i => "Vector3i",
            Transform2D => "Transform2D",
            Vector4 => "Vector4",
            Vector4i => "Vector4i",
            Plane => "Plane",
            Quaternion => "Quaternion",
            Aabb => "AABB",
            Basis => "Basis",
            Transform3D => "Transform3D",
            Projection => "Projection",
            Color => "Color",
            StringName => "StringName",
            NodePath => "NodePath",
            Rid => "RID",
            Object => "Object",
            Callable => "Callable",
            Signal => "Signal",
            Dictionary => "Dictionary",
            Array => "Array",
            PackedByteArray => "PackedByteArray",
            PackedInt32Array => "PackedInt32Array",
            PackedInt64Array => "PackedInt64Array",
            PackedFloat32Array => "PackedFloat32Array",
            PackedFloat64Array => "PackedFloat64Array",
            PackedStringArray => "PackedStringArray",
            PackedVector2Array => "PackedVector2Array",
            PackedVector3Array => "PackedVector3Array",
            PackedColorArray => "PackedColorArray",
        }
    }

    /// Inverse of [`VariantType::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for VariantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a variant call, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum CallErrorType {
    Ok = 0,
    InvalidMethod = 1,
    InvalidArgument = 2,
    TooManyArguments = 3,
    TooFewArguments = 4,
    InstanceIsNull = 5,
    MethodNotConst = 6,
}

/// Out-parameter filled by variant calls.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallError {
    pub error: u32,
    pub argument: i32,
    pub expected: i32,
}

impl CallError {
    pub const OK: CallError = CallError {
        error: 0,
        argument: 0,
        expected: 0,
    };

    pub fn new(kind: CallErrorType, argument: i32, expected: i32) -> Self {
        Self {
            error: kind.into(),
            argument,
            expected,
        }
    }

    pub fn kind(&self) -> CallErrorType {
        CallErrorType::try_from(self.error).unwrap_or(CallErrorType::InvalidMethod)
    }

    pub fn is_ok(&self) -> bool {
        self.error == 0
    }
}

impl Default for CallError {
    fn default() -> Self {
        Self::OK
    }
}

/// Stages at which an extension library is initialized, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum InitializationLevel {
    Core = 0,
    Servers = 1,
    Scene = 2,
    Editor = 3,
}

impl InitializationLevel {
    pub const ALL: [InitializationLevel; 4] = [
        InitializationLevel::Core,
        InitializationLevel::Servers,
        InitializationLevel::Scene,
        InitializationLevel::Editor,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_matches_discriminants() {
        for (index, kind) in VariantType::ALL.iter().enumerate() {
            assert_eq!(kind.sys() as usize, index);
        }
    }

    #[test]
    fn names_round_trip() {
        for kind in VariantType::ALL {
            assert_eq!(VariantType::from_name(kind.name()), Some(kind));
        }
        assert_eq!(VariantType::from_name("Node"), None);
    }

    #[test]
    fn unknown_tag_maps_to_nil() {
        assert_eq!(VariantType::from_sys(999), VariantType::Nil);
        assert_eq!(VariantType::from_sys(9), VariantType::Vector3);
    }

    #[test]
    fn packed_range() {
        assert!(VariantType::PackedByteArray.is_packed_array());
        assert!(VariantType::PackedColorArray.is_packed_array());
        assert!(!VariantType::Array.is_packed_array());
        assert!(VariantType::Vector3.is_plain_data());
        assert!(!VariantType::String.is_plain_data());
    }

    #[test]
    fn call_error_kind() {
        let err = CallError::new(CallErrorType::TooFewArguments, 0, 2);
        assert!(!err.is_ok());
        assert_eq!(err.kind(), CallErrorType::TooFewArguments);
        assert!(CallError::default().is_ok());
    }
}
