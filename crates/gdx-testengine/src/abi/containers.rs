use std::ffi::{CStr, c_char, c_void};
use std::sync::Arc;

use gdx_sys::{
    Bool, ConstStringNamePtr, ConstStringPtr, ConstTypePtr, ConstVariantPtr, Int, TypePtr,
    UninitStringNamePtr, UninitStringPtr, UninitTypePtr, UninitVariantPtr, VariantPtr, VariantType,
    VariantTypeRaw,
};

use super::{optional_name_arg, var_arg, write_name, write_var};
use crate::error::code;
use crate::hooks::report_error;
use crate::value::{
    ArrayBody, DictBody, ElementType, GStr, Name, NodePathBody, PackedBody, Var, arc_borrow,
    arc_into_word, lock,
};
use crate::{classdb, objects, ops};

// ============================================================================
// Strings
// ============================================================================

unsafe fn utf8_text(contents: *const c_char, size: Int) -> String {
    if contents.is_null() {
        return String::new();
    }
    let bytes = match usize::try_from(size) {
        Ok(len) => unsafe { std::slice::from_raw_parts(contents.cast::<u8>(), len) },
        Err(_) => unsafe { CStr::from_ptr(contents) }.to_bytes(),
    };
    String::from_utf8_lossy(bytes).into_owned()
}

pub(super) unsafe extern "C" fn string_new_with_utf8_chars_and_len(
    dst: UninitStringPtr,
    contents: *const c_char,
    size: Int,
) {
    let text = unsafe { utf8_text(contents, size) };
    unsafe { *dst.cast::<usize>() = GStr::new(text).into_word() };
}

pub(super) unsafe extern "C" fn string_to_utf8_chars(
    value: ConstStringPtr,
    buf: *mut c_char,
    max: Int,
) -> Int {
    let text = unsafe { GStr::borrow_word(*value.cast::<usize>()) };
    let bytes = text.as_bytes();
    if !buf.is_null() {
        let count = bytes.len().min(usize::try_from(max).unwrap_or_default());
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), count) };
    }
    bytes.len() as Int
}

pub(super) unsafe extern "C" fn string_name_new_with_utf8_chars_and_len(
    dst: UninitStringNamePtr,
    contents: *const c_char,
    size: Int,
) {
    let text = unsafe { utf8_text(contents, size) };
    unsafe { write_name(dst, Name::intern(&text)) };
}

// ============================================================================
// Node paths
// ============================================================================

unsafe fn node_path<'a>(path: ConstTypePtr) -> &'a NodePathBody {
    unsafe { arc_borrow(*path.cast::<usize>()) }
}

fn name_at(names: &[Name], index: Int) -> Name {
    usize::try_from(index)
        .ok()
        .and_then(|i| names.get(i).copied())
        .unwrap_or_else(|| Name::intern(""))
}

pub(super) unsafe extern "C" fn node_path_get_name_count(path: ConstTypePtr) -> Int {
    unsafe { node_path(path) }.names.len() as Int
}

pub(super) unsafe extern "C" fn node_path_get_name(
    path: ConstTypePtr,
    index: Int,
    dst: UninitStringNamePtr,
) {
    let name = name_at(&unsafe { node_path(path) }.names, index);
    unsafe { write_name(dst, name) };
}

pub(super) unsafe extern "C" fn node_path_get_subname_count(path: ConstTypePtr) -> Int {
    unsafe { node_path(path) }.subnames.len() as Int
}

pub(super) unsafe extern "C" fn node_path_get_subname(
    path: ConstTypePtr,
    index: Int,
    dst: UninitStringNamePtr,
) {
    let name = name_at(&unsafe { node_path(path) }.subnames, index);
    unsafe { write_name(dst, name) };
}

pub(super) unsafe extern "C" fn node_path_is_absolute(path: ConstTypePtr) -> Bool {
    unsafe { node_path(path) }.absolute as Bool
}

// ============================================================================
// Arrays
// ============================================================================

unsafe fn array<'a>(array: ConstTypePtr) -> &'a ArrayBody {
    unsafe { arc_borrow(*array.cast::<usize>()) }
}

fn index_in(index: Int, len: usize) -> Option<usize> {
    usize::try_from(index).ok().filter(|i| *i < len)
}

/// Whether a typed array with `element` may hold `value`.
fn accepts(element: &ElementType, value: &Var) -> bool {
    if element.kind == VariantType::Nil {
        return true;
    }
    if element.kind == VariantType::Object {
        if value.is_nil() {
            return true;
        }
        let Some((_, id)) = value.object() else {
            return false;
        };
        return match (&element.class, objects::class_name(id)) {
            (Some(base), Some(class)) => classdb::inherits(&class, base),
            (None, _) => true,
            (Some(_), None) => id == 0,
        };
    }
    value.kind() == element.kind
}

fn check_element(body: &ArrayBody, value: &Var) -> bool {
    match &*lock(&body.typed) {
        Some(element) if !accepts(element, value) => {
            let expected = element.class.as_deref().unwrap_or(element.kind.name());
            report_error(format!(
                "Attempted to store a value of type '{}' in an array of type '{expected}'.",
                value.kind().name()
            ));
            false
        }
        _ => true,
    }
}

pub(super) unsafe extern "C" fn array_size(array_ptr: ConstTypePtr) -> Int {
    lock(&unsafe { array(array_ptr) }.items).len() as Int
}

pub(super) unsafe extern "C" fn array_operator_index(array_ptr: TypePtr, index: Int) -> VariantPtr {
    let mut items = lock(&unsafe { array(array_ptr) }.items);
    let len = items.len();
    match index_in(index, len) {
        Some(i) => (&mut items[i] as *mut Var).cast(),
        None => {
            report_error(format!("Index p_index = {index} is out of bounds (size() = {len})."));
            std::ptr::null_mut()
        }
    }
}

pub(super) unsafe extern "C" fn array_set(
    array_ptr: TypePtr,
    index: Int,
    value: ConstVariantPtr,
) -> Bool {
    let body = unsafe { array(array_ptr) };
    let value = unsafe { var_arg(value) };
    if !check_element(body, value) {
        return 0;
    }
    let mut items = lock(&body.items);
    let len = items.len();
    match index_in(index, len) {
        Some(i) => {
            items[i] = value.clone();
            1
        }
        None => {
            report_error(format!("Index p_index = {index} is out of bounds (size() = {len})."));
            0
        }
    }
}

pub(super) unsafe extern "C" fn array_push_back(
    array_ptr: TypePtr,
    value: ConstVariantPtr,
) -> Bool {
    let body = unsafe { array(array_ptr) };
    let value = unsafe { var_arg(value) };
    if !check_element(body, value) {
        return 0;
    }
    lock(&body.items).push(value.clone());
    1
}

pub(super) unsafe extern "C" fn array_resize(array_ptr: TypePtr, size: Int) {
    let body = unsafe { array(array_ptr) };
    let fill = lock(&body.typed).as_ref().map_or(VariantType::Nil, |e| e.kind);
    let size = usize::try_from(size).unwrap_or_default();
    lock(&body.items).resize_with(size, || ops::default_of(fill));
}

pub(super) unsafe extern "C" fn array_remove_at(array_ptr: TypePtr, index: Int) {
    let mut items = lock(&unsafe { array(array_ptr) }.items);
    let len = items.len();
    match index_in(index, len) {
        Some(i) => drop(items.remove(i)),
        None => report_error(format!("Index p_index = {index} is out of bounds (size() = {len}).")),
    }
}

pub(super) unsafe extern "C" fn array_clear(array_ptr: TypePtr) {
    lock(&unsafe { array(array_ptr) }.items).clear();
}

fn duplicate_value(value: &Var, deep: bool) -> Var {
    if !deep {
        return value.clone();
    }
    if let Some(body) = value.array() {
        return Var::from_array(duplicate_array(&body, true));
    }
    if let Some(body) = value.dict() {
        return Var::from_dict(duplicate_dict(&body, true));
    }
    value.clone()
}

fn duplicate_array(body: &ArrayBody, deep: bool) -> Arc<ArrayBody> {
    let items = body.snapshot().iter().map(|item| duplicate_value(item, deep)).collect();
    let copy = ArrayBody::from_vec(items);
    *lock(&copy.typed) = lock(&body.typed).clone();
    copy
}

fn duplicate_dict(body: &DictBody, deep: bool) -> Arc<DictBody> {
    DictBody::from_entries(
        body.snapshot()
            .into_iter()
            .map(|(k, v)| (k, duplicate_value(&v, deep)))
            .collect(),
    )
}

pub(super) unsafe extern "C" fn array_duplicate(
    array_ptr: ConstTypePtr,
    deep: Bool,
    dst: UninitTypePtr,
) {
    let copy = duplicate_array(unsafe { array(array_ptr) }, deep != 0);
    unsafe { *dst.cast::<usize>() = arc_into_word(copy) };
}

pub(super) unsafe extern "C" fn array_set_typed(
    array_ptr: TypePtr,
    kind: VariantTypeRaw,
    class_name: ConstStringNamePtr,
) {
    let body = unsafe { array(array_ptr) };
    if !lock(&body.items).is_empty() {
        report_error("Type can only be set when array is empty.".to_string());
        return;
    }
    let class = unsafe { optional_name_arg(class_name) }.map(|name| name.as_str().to_string());
    *lock(&body.typed) = Some(ElementType {
        kind: VariantType::from_sys(kind),
        class,
    });
}

pub(super) unsafe extern "C" fn array_get_typed_builtin(array_ptr: ConstTypePtr) -> VariantTypeRaw {
    lock(&unsafe { array(array_ptr) }.typed)
        .as_ref()
        .map_or(VariantType::Nil, |e| e.kind)
        .sys()
}

// ============================================================================
// Dictionaries
// ============================================================================

unsafe fn dict<'a>(dict: ConstTypePtr) -> &'a DictBody {
    unsafe { arc_borrow(*dict.cast::<usize>()) }
}

fn position(entries: &[(Var, Var)], key: &Var) -> Option<usize> {
    entries.iter().position(|(k, _)| ops::equal(k, key))
}

pub(super) unsafe extern "C" fn dictionary_size(dict_ptr: ConstTypePtr) -> Int {
    lock(&unsafe { dict(dict_ptr) }.entries).len() as Int
}

pub(super) unsafe extern "C" fn dictionary_operator_index(
    dict_ptr: TypePtr,
    key: ConstVariantPtr,
) -> VariantPtr {
    let key = unsafe { var_arg(key) };
    let mut entries = lock(&unsafe { dict(dict_ptr) }.entries);
    let index = match position(&entries, key) {
        Some(index) => index,
        None => {
            entries.push((key.clone(), Var::nil()));
            entries.len() - 1
        }
    };
    (&mut entries[index].1 as *mut Var).cast()
}

pub(super) unsafe extern "C" fn dictionary_get(
    dict_ptr: ConstTypePtr,
    key: ConstVariantPtr,
    dst: UninitVariantPtr,
) -> Bool {
    let key = unsafe { var_arg(key) };
    let entries = lock(&unsafe { dict(dict_ptr) }.entries);
    match position(&entries, key) {
        Some(index) => {
            unsafe { write_var(dst, entries[index].1.clone()) };
            1
        }
        None => {
            unsafe { write_var(dst, Var::nil()) };
            0
        }
    }
}

pub(super) unsafe extern "C" fn dictionary_erase(dict_ptr: TypePtr, key: ConstVariantPtr) -> Bool {
    let key = unsafe { var_arg(key) };
    let mut entries = lock(&unsafe { dict(dict_ptr) }.entries);
    match position(&entries, key) {
        Some(index) => {
            entries.remove(index);
            1
        }
        None => 0,
    }
}

pub(super) unsafe extern "C" fn dictionary_clear(dict_ptr: TypePtr) {
    lock(&unsafe { dict(dict_ptr) }.entries).clear();
}

pub(super) unsafe extern "C" fn dictionary_keys(dict_ptr: ConstTypePtr, dst: UninitTypePtr) {
    let keys = unsafe { dict(dict_ptr) }.snapshot().into_iter().map(|(k, _)| k).collect();
    unsafe { *dst.cast::<usize>() = arc_into_word(ArrayBody::from_vec(keys)) };
}

pub(super) unsafe extern "C" fn dictionary_values(dict_ptr: ConstTypePtr, dst: UninitTypePtr) {
    let values = unsafe { dict(dict_ptr) }.snapshot().into_iter().map(|(_, v)| v).collect();
    unsafe { *dst.cast::<usize>() = arc_into_word(ArrayBody::from_vec(values)) };
}

// ============================================================================
// Packed arrays
// ============================================================================

unsafe fn packed<'a>(kind: VariantTypeRaw, array: ConstTypePtr) -> Option<&'a PackedBody> {
    let body: &PackedBody = unsafe { arc_borrow(*array.cast::<usize>()) };
    if body.kind().sys() == kind {
        Some(body)
    } else {
        report_error(format!(
            "packed array of type '{}' accessed as '{}'",
            body.kind().name(),
            VariantType::from_sys(kind).name()
        ));
        None
    }
}

/// Run `f` on a unique copy of the body, storing the new word back.
unsafe fn packed_mut<R>(
    kind: VariantTypeRaw,
    array: TypePtr,
    f: impl FnOnce(&mut PackedBody) -> R,
) -> Option<R> {
    unsafe { packed(kind, array.cast_const()) }?;
    let slot = array.cast::<usize>();
    let mut body = unsafe { Arc::from_raw(*slot as *const PackedBody) };
    let result = f(Arc::make_mut(&mut body));
    unsafe { *slot = arc_into_word(body) };
    Some(result)
}

pub(super) unsafe extern "C" fn packed_array_size(
    kind: VariantTypeRaw,
    array: ConstTypePtr,
) -> Int {
    unsafe { packed(kind, array) }.map_or(0, |body| body.len() as Int)
}

pub(super) unsafe extern "C" fn packed_array_resize(
    kind: VariantTypeRaw,
    array: TypePtr,
    size: Int,
) -> Int {
    let Ok(size) = usize::try_from(size) else {
        return code::ERR_INVALID_PARAMETER;
    };
    match unsafe { packed_mut(kind, array, |body| body.resize(size)) } {
        Some(()) => code::OK,
        None => code::ERR_INVALID_PARAMETER,
    }
}

pub(super) unsafe extern "C" fn packed_array_operator_index(
    kind: VariantTypeRaw,
    array: TypePtr,
    index: Int,
) -> *mut c_void {
    let index = usize::try_from(index).unwrap_or(usize::MAX);
    unsafe { packed_mut(kind, array, |body| body.element_mut_ptr(index)) }
        .unwrap_or(std::ptr::null_mut())
}

pub(super) unsafe extern "C" fn packed_array_operator_index_const(
    kind: VariantTypeRaw,
    array: ConstTypePtr,
    index: Int,
) -> *const c_void {
    let index = usize::try_from(index).unwrap_or(usize::MAX);
    unsafe { packed(kind, array) }.map_or(std::ptr::null(), |body| body.element_ptr(index))
}

pub(super) unsafe extern "C" fn packed_array_push_back(
    kind: VariantTypeRaw,
    array: TypePtr,
    value: ConstTypePtr,
) {
    unsafe { packed_mut(kind, array, |body| body.push_raw(value)) };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_word(items: Vec<Var>) -> usize {
        arc_into_word(ArrayBody::from_vec(items))
    }

    #[test]
    fn typed_arrays_reject_other_kinds() {
        let mut word = array_word(Vec::new());
        let ptr = (&mut word as *mut usize).cast::<c_void>();
        unsafe {
            array_set_typed(ptr, VariantType::Int.sys(), std::ptr::null());
            let one = Var::from_int(1);
            let text = Var::from_str("x");
            assert_eq!(array_push_back(ptr, (&one as *const Var).cast()), 1);
            assert_eq!(array_push_back(ptr, (&text as *const Var).cast()), 0);
            assert_eq!(array_size(ptr), 1);
            array_resize(ptr, 3);
            assert_eq!(array(ptr).snapshot()[2].as_int(), Some(0));
            assert_eq!(array_get_typed_builtin(ptr), VariantType::Int.sys());
            crate::value::arc_release::<ArrayBody>(word);
        }
    }

    #[test]
    fn dictionary_get_writes_nil_for_missing_keys() {
        let entries = vec![(Var::from_str("a"), Var::from_int(1))];
        let mut word = arc_into_word(DictBody::from_entries(entries));
        let ptr = (&mut word as *mut usize).cast::<c_void>();
        let missing = Var::from_str("b");
        let mut out = Var::from_int(9);
        unsafe {
            std::ptr::drop_in_place(&mut out);
            let key = (&missing as *const Var).cast();
            assert_eq!(dictionary_get(ptr, key, (&mut out as *mut Var).cast()), 0);
            assert!(out.is_nil());
            let slot = dictionary_operator_index(ptr, (&missing as *const Var).cast());
            assert!(!slot.is_null());
            assert_eq!(dictionary_size(ptr), 2);
            crate::value::arc_release::<DictBody>(word);
        }
    }

    #[test]
    fn packed_writes_do_not_touch_shared_copies() {
        let shared = Arc::new(PackedBody::Int32(vec![1, 2, 3]));
        let other = shared.clone();
        let mut word = arc_into_word(shared);
        let ptr = (&mut word as *mut usize).cast::<c_void>();
        let kind = VariantType::PackedInt32Array.sys();
        unsafe {
            let element = packed_array_operator_index(kind, ptr, 1).cast::<i32>();
            *element = 20;
            assert_eq!(*packed_array_operator_index_const(kind, ptr, 1).cast::<i32>(), 20);
            assert_eq!(packed_array_size(VariantType::PackedByteArray.sys(), ptr), 0);
            crate::value::arc_release::<PackedBody>(word);
        }
        assert_eq!(*other, PackedBody::Int32(vec![1, 2, 3]));
    }

    #[test]
    fn utf8_conversion_reports_full_length() {
        let mut word = 0usize;
        unsafe {
            let dst = (&mut word as *mut usize).cast();
            string_new_with_utf8_chars_and_len(dst, c"héllo".as_ptr(), -1);
            let mut buf = [0 as c_char; 2];
            let len = string_to_utf8_chars((&word as *const usize).cast(), buf.as_mut_ptr(), 2);
            assert_eq!(len, 6);
            assert_eq!(buf[0] as u8, b'h');
            drop(GStr::from_word(word));
        }
    }
}
