use std::fmt;
use std::mem::MaybeUninit;

use gdx_sys::{OpaqueDictionary, VariantType};

use crate::builtin::{Array, opaque_builtin};
use crate::meta::ToVariant;
use crate::variant::Variant;

/// Engine dictionary. Copies share one body, like [`Array`].
#[repr(transparent)]
pub struct Dictionary {
    opaque: OpaqueDictionary,
}

opaque_builtin!(Dictionary => VariantType::Dictionary);

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let size = gdx_sys::interface_fn!(dictionary_size);
        usize::try_from(unsafe { size(self.sys()) }).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the value under `key`.
    pub fn get<K: ToVariant + ?Sized>(&self, key: &K) -> Option<Variant> {
        self.get_variant(&key.to_variant())
    }

    fn get_variant(&self, key: &Variant) -> Option<Variant> {
        let get = gdx_sys::interface_fn!(dictionary_get);
        let mut value = MaybeUninit::<Variant>::uninit();
        let (found, value) = unsafe {
            let found = get(self.sys(), key.sys(), value.as_mut_ptr().cast());
            (found, value.assume_init())
        };
        (found != gdx_sys::FALSE).then_some(value)
    }

    pub fn contains_key<K: ToVariant + ?Sized>(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn insert<K: ToVariant, V: ToVariant>(&mut self, key: K, value: V) -> Option<Variant> {
        let key = key.to_variant();
        let previous = self.get_variant(&key);
        let operator_index = gdx_sys::interface_fn!(dictionary_operator_index);
        let slot = unsafe { operator_index(self.sys_mut(), key.sys()) };
        if !slot.is_null() {
            // The slot holds an engine variant; assignment destroys it first.
            unsafe { *Variant::borrow_sys_mut(slot) = value.to_variant() };
        }
        previous
    }

    pub fn remove<K: ToVariant + ?Sized>(&mut self, key: &K) -> Option<Variant> {
        let key = key.to_variant();
        let previous = self.get_variant(&key)?;
        let erase = gdx_sys::interface_fn!(dictionary_erase);
        unsafe { erase(self.sys_mut(), key.sys()) };
        Some(previous)
    }

    pub fn clear(&mut self) {
        let clear = gdx_sys::interface_fn!(dictionary_clear);
        unsafe { clear(self.sys_mut()) };
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Array {
        let keys = gdx_sys::interface_fn!(dictionary_keys);
        let mut array = MaybeUninit::<Array>::uninit();
        unsafe {
            keys(self.sys(), array.as_mut_ptr().cast());
            array.assume_init()
        }
    }

    pub fn values(&self) -> Array {
        let values = gdx_sys::interface_fn!(dictionary_values);
        let mut array = MaybeUninit::<Array>::uninit();
        unsafe {
            values(self.sys(), array.as_mut_ptr().cast());
            array.assume_init()
        }
    }

    /// Entries in insertion order, as of the call.
    pub fn iter(&self) -> DictionaryIter<'_> {
        DictionaryIter {
            dictionary: self,
            keys: self.keys(),
            next: 0,
        }
    }
}

impl<K: ToVariant, V: ToVariant> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dictionary = Dictionary::new();
        for (key, value) in iter {
            dictionary.insert(key, value);
        }
        dictionary
    }
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

pub struct DictionaryIter<'a> {
    dictionary: &'a Dictionary,
    keys: Array,
    next: usize,
}

impl Iterator for DictionaryIter<'_> {
    type Item = (Variant, Variant);

    fn next(&mut self) -> Option<(Variant, Variant)> {
        loop {
            let key = self.keys.get(self.next)?;
            self.next += 1;
            // Entries erased since the snapshot are skipped.
            if let Some(value) = self.dictionary.get_variant(&key) {
                return Some((key, value));
            }
        }
    }
}
