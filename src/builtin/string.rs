use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::MaybeUninit;

use gdx_sys::{Int, OpaqueNodePath, OpaqueString, OpaqueStringName, VariantType, ctor};

use crate::builtin::{construct, opaque_builtin};
use crate::meta::ToVariant;
use crate::variant::Variant;

/// Engine string.
#[repr(transparent)]
pub struct GString {
    opaque: OpaqueString,
}

opaque_builtin!(GString => VariantType::String);

impl GString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the UTF-8 encoding in bytes.
    pub fn byte_len(&self) -> usize {
        let to_utf8 = gdx_sys::interface_fn!(string_to_utf8_chars);
        let len = unsafe { to_utf8(self.sys(), std::ptr::null_mut(), 0) };
        usize::try_from(len).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }

    pub fn chars(&self) -> Vec<char> {
        self.to_string().chars().collect()
    }

    fn from_utf8(text: &str) -> Self {
        let construct = gdx_sys::interface_fn!(string_new_with_utf8_chars_and_len);
        let mut value = MaybeUninit::<Self>::uninit();
        unsafe {
            construct(value.as_mut_ptr().cast(), text.as_ptr().cast(), text.len() as Int);
            value.assume_init()
        }
    }
}

impl From<&str> for GString {
    fn from(text: &str) -> Self {
        Self::from_utf8(text)
    }
}

impl From<String> for GString {
    fn from(text: String) -> Self {
        Self::from_utf8(&text)
    }
}

impl From<&String> for GString {
    fn from(text: &String) -> Self {
        Self::from_utf8(text)
    }
}

impl From<&StringName> for GString {
    fn from(name: &StringName) -> Self {
        unsafe { construct(VariantType::String, ctor::FROM_STRING, &[name.sys()]) }
    }
}

impl From<&NodePath> for GString {
    fn from(path: &NodePath) -> Self {
        unsafe { construct(VariantType::String, ctor::STRING_FROM_NODE_PATH, &[path.sys()]) }
    }
}

impl From<&GString> for String {
    fn from(text: &GString) -> Self {
        text.to_string()
    }
}

impl ToVariant for str {
    fn to_variant(&self) -> Variant {
        GString::from(self).to_variant()
    }
}

impl ToVariant for String {
    fn to_variant(&self) -> Variant {
        self.as_str().to_variant()
    }
}

impl From<&str> for Variant {
    fn from(text: &str) -> Self {
        text.to_variant()
    }
}

impl fmt::Display for GString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.byte_len();
        let mut buf = vec![0u8; len];
        if len > 0 {
            let to_utf8 = gdx_sys::interface_fn!(string_to_utf8_chars);
            unsafe { to_utf8(self.sys(), buf.as_mut_ptr().cast(), len as Int) };
        }
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

impl fmt::Debug for GString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GString({:?})", self.to_string())
    }
}

impl PartialEq for GString {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for GString {}

impl PartialEq<&str> for GString {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

/// Interned engine name. Equal names share one body, so comparison and
/// hashing use the handle alone.
#[repr(transparent)]
pub struct StringName {
    opaque: OpaqueStringName,
}

opaque_builtin!(StringName => VariantType::StringName);

impl StringName {
    pub fn is_empty(&self) -> bool {
        GString::from(self).is_empty()
    }
}

impl From<&str> for StringName {
    fn from(text: &str) -> Self {
        let construct = gdx_sys::interface_fn!(string_name_new_with_utf8_chars_and_len);
        let mut value = MaybeUninit::<Self>::uninit();
        unsafe {
            construct(value.as_mut_ptr().cast(), text.as_ptr().cast(), text.len() as Int);
            value.assume_init()
        }
    }
}

impl From<&GString> for StringName {
    fn from(text: &GString) -> Self {
        unsafe { construct(VariantType::StringName, ctor::FROM_STRING, &[text.sys()]) }
    }
}

impl PartialEq for StringName {
    fn eq(&self, other: &Self) -> bool {
        self.opaque == other.opaque
    }
}

impl Eq for StringName {}

impl PartialEq<&str> for StringName {
    fn eq(&self, other: &&str) -> bool {
        *self == StringName::from(*other)
    }
}

impl Hash for StringName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.opaque.hash(state);
    }
}

impl fmt::Display for StringName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&GString::from(self), f)
    }
}

impl fmt::Debug for StringName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{:?}", GString::from(self).to_string())
    }
}

/// Path to a node, optionally with property subnames (`a/b:c`).
#[repr(transparent)]
pub struct NodePath {
    opaque: OpaqueNodePath,
}

opaque_builtin!(NodePath => VariantType::NodePath);

impl NodePath {
    pub fn name_count(&self) -> usize {
        let count = gdx_sys::interface_fn!(node_path_get_name_count);
        usize::try_from(unsafe { count(self.sys()) }).unwrap_or_default()
    }

    pub fn subname_count(&self) -> usize {
        let count = gdx_sys::interface_fn!(node_path_get_subname_count);
        usize::try_from(unsafe { count(self.sys()) }).unwrap_or_default()
    }

    pub fn get_name(&self, index: usize) -> Option<StringName> {
        (index < self.name_count()).then(|| {
            let get = gdx_sys::interface_fn!(node_path_get_name);
            let mut name = MaybeUninit::<StringName>::uninit();
            unsafe {
                get(self.sys(), index as Int, name.as_mut_ptr().cast());
                name.assume_init()
            }
        })
    }

    pub fn get_subname(&self, index: usize) -> Option<StringName> {
        (index < self.subname_count()).then(|| {
            let get = gdx_sys::interface_fn!(node_path_get_subname);
            let mut name = MaybeUninit::<StringName>::uninit();
            unsafe {
                get(self.sys(), index as Int, name.as_mut_ptr().cast());
                name.assume_init()
            }
        })
    }

    pub fn names(&self) -> Vec<StringName> {
        (0..self.name_count()).filter_map(|i| self.get_name(i)).collect()
    }

    pub fn subnames(&self) -> Vec<StringName> {
        (0..self.subname_count()).filter_map(|i| self.get_subname(i)).collect()
    }

    pub fn is_absolute(&self) -> bool {
        let is_absolute = gdx_sys::interface_fn!(node_path_is_absolute);
        unsafe { is_absolute(self.sys()) != gdx_sys::FALSE }
    }

    pub fn is_empty(&self) -> bool {
        self.name_count() == 0 && self.subname_count() == 0
    }
}

impl From<&str> for NodePath {
    fn from(text: &str) -> Self {
        Self::from(&GString::from(text))
    }
}

impl From<&GString> for NodePath {
    fn from(text: &GString) -> Self {
        unsafe { construct(VariantType::NodePath, ctor::FROM_STRING, &[text.sys()]) }
    }
}

impl PartialEq for NodePath {
    fn eq(&self, other: &Self) -> bool {
        GString::from(self) == GString::from(other)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&GString::from(self), f)
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePath({:?})", GString::from(self).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn strings_round_trip_utf8() {
        test_support::boot();
        let text = GString::from("héllo");
        assert_eq!(text.to_string(), "héllo");
        assert_eq!(text.byte_len(), 6);
        assert_eq!(text.chars().len(), 5);
        assert!(GString::new().is_empty());
    }

    #[test]
    fn clones_are_independent_values() {
        test_support::boot();
        let a = GString::from("shared");
        let b = a.clone();
        drop(a);
        assert_eq!(b, "shared");
    }

    #[test]
    fn names_compare_by_handle() {
        test_support::boot();
        let a = StringName::from("ready");
        let b = StringName::from(&GString::from("ready"));
        assert_eq!(a, b);
        assert_ne!(a, StringName::from("process"));
        assert_eq!(a.to_string(), "ready");
    }

    #[test]
    fn node_paths_split_names_and_subnames() {
        test_support::boot();
        let path = NodePath::from("/root/Player:position:x");
        assert!(path.is_absolute());
        let names: Vec<String> = path.names().iter().map(ToString::to_string).collect();
        assert_eq!(names, ["root", "Player"]);
        assert_eq!(path.subname_count(), 2);
        assert!(path.get_name(2).is_none());
        assert_eq!(path.to_string(), "/root/Player:position:x");
    }
}
