//! Engine-side variant and builtin bodies.
//!
//! Every opaque body the bridge holds is one or two words pointing at data
//! owned here. Strings, node paths, arrays, dictionaries and packed arrays are
//! `Arc`-backed; string names are interned and never freed; math values
//! larger than the inline payload are boxed byte buffers.

use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use gdx_sys::{VariantType, real};
use rustc_hash::FxHashMap;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Word helpers
// ============================================================================

pub(crate) fn arc_into_word<T>(arc: Arc<T>) -> usize {
    Arc::into_raw(arc) as usize
}

/// # Safety
///
/// `word` must come from [`arc_into_word::<T>`] and still hold a count.
pub(crate) unsafe fn arc_borrow<'a, T>(word: usize) -> &'a T {
    unsafe { &*(word as *const T) }
}

/// New `Arc` sharing the body behind `word`; the word keeps its own count.
///
/// # Safety
///
/// As for [`arc_borrow`].
pub(crate) unsafe fn arc_share<T>(word: usize) -> Arc<T> {
    unsafe {
        Arc::increment_strong_count(word as *const T);
        Arc::from_raw(word as *const T)
    }
}

/// # Safety
///
/// As for [`arc_borrow`]; the word must not be used afterwards.
pub(crate) unsafe fn arc_release<T>(word: usize) {
    unsafe { drop(Arc::from_raw(word as *const T)) }
}

// ============================================================================
// Strings and names
// ============================================================================

/// Owned reference to an engine string body; the same word the bridge stores.
#[repr(transparent)]
pub struct GStr(NonNull<String>);

unsafe impl Send for GStr {}
unsafe impl Sync for GStr {}

impl GStr {
    pub fn new(text: impl Into<String>) -> Self {
        let raw = Arc::into_raw(Arc::new(text.into())).cast_mut();
        // Arc::into_raw never returns null.
        Self(NonNull::new(raw).unwrap_or(NonNull::dangling()))
    }

    pub fn as_str(&self) -> &str {
        unsafe { self.0.as_ref() }
    }

    pub fn into_word(self) -> usize {
        let word = self.0.as_ptr() as usize;
        std::mem::forget(self);
        word
    }

    pub fn word(&self) -> usize {
        self.0.as_ptr() as usize
    }

    /// # Safety
    ///
    /// `word` must be a live string word; a new count is taken.
    pub unsafe fn share_word(word: usize) -> Self {
        unsafe { Arc::increment_strong_count(word as *const String) };
        Self(NonNull::new(word as *mut String).unwrap_or(NonNull::dangling()))
    }

    /// # Safety
    ///
    /// `word` must be a live string word whose count is transferred.
    pub unsafe fn from_word(word: usize) -> Self {
        Self(NonNull::new(word as *mut String).unwrap_or(NonNull::dangling()))
    }

    /// # Safety
    ///
    /// `word` must be a live string word.
    pub unsafe fn borrow_word<'a>(word: usize) -> &'a str {
        unsafe { (*(word as *const String)).as_str() }
    }
}

impl Clone for GStr {
    fn clone(&self) -> Self {
        unsafe { Self::share_word(self.word()) }
    }
}

impl Drop for GStr {
    fn drop(&mut self) {
        unsafe { arc_release::<String>(self.word()) }
    }
}

impl std::fmt::Debug for GStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl PartialEq for GStr {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Interned string name. Equality is identity.
#[derive(Clone, Copy)]
pub struct Name(&'static String);

static NAMES: OnceLock<Mutex<FxHashMap<&'static str, &'static String>>> = OnceLock::new();

impl Name {
    pub fn intern(text: &str) -> Self {
        let mut names = lock(NAMES.get_or_init(Default::default));
        if let Some(existing) = names.get(text) {
            return Name(existing);
        }
        let leaked: &'static String = Box::leak(Box::new(text.to_string()));
        names.insert(leaked.as_str(), leaked);
        Name(leaked)
    }

    pub fn as_str(self) -> &'static str {
        self.0.as_str()
    }

    pub fn word(self) -> usize {
        self.0 as *const String as usize
    }

    /// # Safety
    ///
    /// `word` must have been produced by [`Name::word`].
    pub unsafe fn from_word(word: usize) -> Self {
        Name(unsafe { &*(word as *const String) })
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for Name {}

impl std::fmt::Debug for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "&{:?}", self.as_str())
    }
}

/// Parsed node path: `/root/a/b:property:sub`.
#[derive(Debug)]
pub struct NodePathBody {
    pub text: String,
    pub names: Vec<Name>,
    pub subnames: Vec<Name>,
    pub absolute: bool,
}

impl NodePathBody {
    pub fn parse(text: &str) -> Self {
        let absolute = text.starts_with('/');
        let mut parts = text.split(':');
        let path = parts.next().unwrap_or_default();
        let names = path.split('/').filter(|s| !s.is_empty()).map(Name::intern).collect();
        let subnames = parts.filter(|s| !s.is_empty()).map(Name::intern).collect();
        Self {
            text: text.to_string(),
            names,
            subnames,
            absolute,
        }
    }
}

// ============================================================================
// Containers
// ============================================================================

/// Element restriction of a typed array.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementType {
    pub kind: VariantType,
    pub class: Option<String>,
}

#[derive(Debug, Default)]
pub struct ArrayBody {
    pub items: Mutex<Vec<Var>>,
    pub typed: Mutex<Option<ElementType>>,
}

impl ArrayBody {
    pub fn from_vec(items: Vec<Var>) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items),
            typed: Mutex::new(None),
        })
    }

    pub fn snapshot(&self) -> Vec<Var> {
        lock(&self.items).clone()
    }
}

#[derive(Debug, Default)]
pub struct DictBody {
    pub entries: Mutex<Vec<(Var, Var)>>,
}

impl DictBody {
    pub fn from_entries(entries: Vec<(Var, Var)>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(entries),
        })
    }

    pub fn snapshot(&self) -> Vec<(Var, Var)> {
        lock(&self.entries).clone()
    }
}

/// Contiguous storage of a packed array. Copy-on-write through `Arc::make_mut`.
#[derive(Debug, Clone, PartialEq)]
pub enum PackedBody {
    Byte(Vec<u8>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    String(Vec<GStr>),
    Vector2(Vec<[real; 2]>),
    Vector3(Vec<[real; 3]>),
    Color(Vec<[f32; 4]>),
}

macro_rules! each_packed {
    ($body:expr, $v:ident => $e:expr) => {
        match $body {
            PackedBody::Byte($v) => $e,
            PackedBody::Int32($v) => $e,
            PackedBody::Int64($v) => $e,
            PackedBody::Float32($v) => $e,
            PackedBody::Float64($v) => $e,
            PackedBody::String($v) => $e,
            PackedBody::Vector2($v) => $e,
            PackedBody::Vector3($v) => $e,
            PackedBody::Color($v) => $e,
        }
    };
}

impl PackedBody {
    pub fn empty(kind: VariantType) -> Option<Self> {
        Some(match kind {
            VariantType::PackedByteArray => PackedBody::Byte(Vec::new()),
            VariantType::PackedInt32Array => PackedBody::Int32(Vec::new()),
            VariantType::PackedInt64Array => PackedBody::Int64(Vec::new()),
            VariantType::PackedFloat32Array => PackedBody::Float32(Vec::new()),
            VariantType::PackedFloat64Array => PackedBody::Float64(Vec::new()),
            VariantType::PackedStringArray => PackedBody::String(Vec::new()),
            VariantType::PackedVector2Array => PackedBody::Vector2(Vec::new()),
            VariantType::PackedVector3Array => PackedBody::Vector3(Vec::new()),
            VariantType::PackedColorArray => PackedBody::Color(Vec::new()),
            _ => return None,
        })
    }

    pub fn kind(&self) -> VariantType {
        match self {
            PackedBody::Byte(_) => VariantType::PackedByteArray,
            PackedBody::Int32(_) => VariantType::PackedInt32Array,
            PackedBody::Int64(_) => VariantType::PackedInt64Array,
            PackedBody::Float32(_) => VariantType::PackedFloat32Array,
            PackedBody::Float64(_) => VariantType::PackedFloat64Array,
            PackedBody::String(_) => VariantType::PackedStringArray,
            PackedBody::Vector2(_) => VariantType::PackedVector2Array,
            PackedBody::Vector3(_) => VariantType::PackedVector3Array,
            PackedBody::Color(_) => VariantType::PackedColorArray,
        }
    }

    pub fn len(&self) -> usize {
        each_packed!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resize(&mut self, len: usize) {
        match self {
            PackedBody::Byte(v) => v.resize(len, 0),
            PackedBody::Int32(v) => v.resize(len, 0),
            PackedBody::Int64(v) => v.resize(len, 0),
            PackedBody::Float32(v) => v.resize(len, 0.0),
            PackedBody::Float64(v) => v.resize(len, 0.0),
            PackedBody::String(v) => v.resize_with(len, || GStr::new("")),
            PackedBody::Vector2(v) => v.resize(len, [0.0; 2]),
            PackedBody::Vector3(v) => v.resize(len, [0.0; 3]),
            PackedBody::Color(v) => v.resize(len, [0.0; 4]),
        }
    }

    pub fn element_ptr(&self, index: usize) -> *const std::ffi::c_void {
        if index >= self.len() {
            return std::ptr::null();
        }
        each_packed!(self, v => v[index..].as_ptr().cast())
    }

    pub fn element_mut_ptr(&mut self, index: usize) -> *mut std::ffi::c_void {
        if index >= self.len() {
            return std::ptr::null_mut();
        }
        each_packed!(self, v => v[index..].as_mut_ptr().cast())
    }

    /// Append the element stored at `src` in its native layout.
    ///
    /// # Safety
    ///
    /// `src` must point to a valid element of this array's type.
    pub unsafe fn push_raw(&mut self, src: *const std::ffi::c_void) {
        unsafe {
            match self {
                PackedBody::Byte(v) => v.push(*src.cast::<u8>()),
                PackedBody::Int32(v) => v.push(*src.cast::<i32>()),
                PackedBody::Int64(v) => v.push(*src.cast::<i64>()),
                PackedBody::Float32(v) => v.push(*src.cast::<f32>()),
                PackedBody::Float64(v) => v.push(*src.cast::<f64>()),
                PackedBody::String(v) => v.push(GStr::share_word(*src.cast::<usize>())),
                PackedBody::Vector2(v) => v.push(*src.cast::<[real; 2]>()),
                PackedBody::Vector3(v) => v.push(*src.cast::<[real; 3]>()),
                PackedBody::Color(v) => v.push(*src.cast::<[f32; 4]>()),
            }
        }
    }

    pub fn get_var(&self, index: usize) -> Option<Var> {
        Some(match self {
            PackedBody::Byte(v) => Var::from_int(i64::from(*v.get(index)?)),
            PackedBody::Int32(v) => Var::from_int(i64::from(*v.get(index)?)),
            PackedBody::Int64(v) => Var::from_int(*v.get(index)?),
            PackedBody::Float32(v) => Var::from_float(f64::from(*v.get(index)?)),
            PackedBody::Float64(v) => Var::from_float(*v.get(index)?),
            PackedBody::String(v) => Var::from_gstr(v.get(index)?.clone()),
            PackedBody::Vector2(v) => {
                Var::from_pod(VariantType::Vector2, reals_to_bytes(v.get(index)?))
            }
            PackedBody::Vector3(v) => {
                Var::from_pod(VariantType::Vector3, reals_to_bytes(v.get(index)?))
            }
            PackedBody::Color(v) => Var::from_pod(VariantType::Color, f32s_to_bytes(v.get(index)?)),
        })
    }

    /// Append a variant element, converting numeric kinds. False when the
    /// element cannot be stored.
    pub fn push_var(&mut self, value: &Var) -> bool {
        match self {
            PackedBody::Byte(v) => value.as_int().map(|i| v.push(i as u8)).is_some(),
            PackedBody::Int32(v) => value.as_int().map(|i| v.push(i as i32)).is_some(),
            PackedBody::Int64(v) => value.as_int().map(|i| v.push(i)).is_some(),
            PackedBody::Float32(v) => value.as_float().map(|f| v.push(f as f32)).is_some(),
            PackedBody::Float64(v) => value.as_float().map(|f| v.push(f)).is_some(),
            PackedBody::String(v) => value.gstr().map(|s| v.push(s)).is_some(),
            PackedBody::Vector2(v) => value
                .pod_of(VariantType::Vector2)
                .map(|bytes| {
                    let r = bytes_to_reals(bytes);
                    v.push([r[0], r[1]])
                })
                .is_some(),
            PackedBody::Vector3(v) => value
                .pod_of(VariantType::Vector3)
                .map(|bytes| {
                    let r = bytes_to_reals(bytes);
                    v.push([r[0], r[1], r[2]])
                })
                .is_some(),
            PackedBody::Color(v) => value
                .pod_of(VariantType::Color)
                .map(|bytes| {
                    let c = bytes_to_f32s(bytes);
                    v.push([c[0], c[1], c[2], c[3]])
                })
                .is_some(),
        }
    }

    pub fn to_vars(&self) -> Vec<Var> {
        (0..self.len()).filter_map(|i| self.get_var(i)).collect()
    }
}

// ============================================================================
// Math values
// ============================================================================

const REAL: usize = std::mem::size_of::<real>();

/// Byte size of kinds stored as boxed bytes in a variant.
pub fn pod_size(kind: VariantType) -> Option<usize> {
    use VariantType::*;
    Some(match kind {
        Vector2 => 2 * REAL,
        Vector2i => 8,
        Rect2 => 4 * REAL,
        Rect2i => 16,
        Vector3 => 3 * REAL,
        Vector3i => 12,
        Transform2D => 6 * REAL,
        Vector4 => 4 * REAL,
        Vector4i => 16,
        Plane => 4 * REAL,
        Quaternion => 4 * REAL,
        Aabb => 6 * REAL,
        Basis => 9 * REAL,
        Transform3D => 12 * REAL,
        Projection => 16 * REAL,
        Color => 16,
        _ => return None,
    })
}

pub fn reals_to_bytes(values: &[real]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

pub fn bytes_to_reals(bytes: &[u8]) -> Vec<real> {
    bytes
        .chunks_exact(REAL)
        .map(|chunk| {
            let mut raw = [0u8; REAL];
            raw.copy_from_slice(chunk);
            real::from_ne_bytes(raw)
        })
        .collect()
}

pub fn f32s_to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

pub fn bytes_to_f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn i32s_to_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

pub fn bytes_to_i32s(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

// ============================================================================
// Variant
// ============================================================================

/// Engine variant: kind tag and two payload words, laid out as the bridge
/// expects.
///
/// | kind                     | `a`                     | `b`            |
/// |--------------------------|-------------------------|----------------|
/// | Bool, Int, Float, RID    | value bits              |                |
/// | String, NodePath, Array, Dictionary | body word    |                |
/// | StringName               | interned name word      |                |
/// | packed arrays            | body word               |                |
/// | Object                   | object address          | instance id    |
/// | Callable, Signal         | object address          | name word      |
/// | math values              | boxed bytes             |                |
#[repr(C)]
pub struct Var {
    tag: usize,
    a: usize,
    b: usize,
}

unsafe impl Send for Var {}
unsafe impl Sync for Var {}

const _: () = assert!(std::mem::size_of::<Var>() == std::mem::size_of::<gdx_sys::OpaqueVariant>());

impl Var {
    pub const fn nil() -> Self {
        Self { tag: 0, a: 0, b: 0 }
    }

    fn raw(kind: VariantType, a: usize, b: usize) -> Self {
        Self {
            tag: kind.sys() as usize,
            a,
            b,
        }
    }

    pub fn from_bool(value: bool) -> Self {
        Self::raw(VariantType::Bool, value as usize, 0)
    }

    pub fn from_int(value: i64) -> Self {
        Self::raw(VariantType::Int, value as u64 as usize, 0)
    }

    pub fn from_float(value: f64) -> Self {
        Self::raw(VariantType::Float, value.to_bits() as usize, 0)
    }

    pub fn from_str(text: &str) -> Self {
        Self::from_gstr(GStr::new(text))
    }

    pub fn from_gstr(text: GStr) -> Self {
        Self::raw(VariantType::String, text.into_word(), 0)
    }

    pub fn from_name(name: Name) -> Self {
        Self::raw(VariantType::StringName, name.word(), 0)
    }

    pub fn from_node_path(path: Arc<NodePathBody>) -> Self {
        Self::raw(VariantType::NodePath, arc_into_word(path), 0)
    }

    /// Object variant; `address == 0` is the null object. A `RefCounted`
    /// target gains a reference the variant gives back when dropped.
    pub fn from_object(address: usize, id: u64) -> Self {
        if address != 0 {
            crate::objects::reference(id);
        }
        Self::raw(VariantType::Object, address, id as usize)
    }

    /// Object variant that takes over a reference the caller already holds.
    pub fn adopt_object(address: usize, id: u64) -> Self {
        Self::raw(VariantType::Object, address, id as usize)
    }

    pub fn from_array(body: Arc<ArrayBody>) -> Self {
        Self::raw(VariantType::Array, arc_into_word(body), 0)
    }

    pub fn from_dict(body: Arc<DictBody>) -> Self {
        Self::raw(VariantType::Dictionary, arc_into_word(body), 0)
    }

    pub fn from_packed(body: Arc<PackedBody>) -> Self {
        let kind = body.kind();
        Self::raw(kind, arc_into_word(body), 0)
    }

    pub fn from_pod(kind: VariantType, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(pod_size(kind), Some(bytes.len()));
        Self::raw(kind, Box::into_raw(Box::new(bytes)) as usize, 0)
    }

    pub fn from_rid(rid: u64) -> Self {
        Self::raw(VariantType::Rid, rid as usize, 0)
    }

    pub fn from_callable(address: usize, method: Name) -> Self {
        Self::raw(VariantType::Callable, address, method.word())
    }

    pub fn from_signal(address: usize, signal: Name) -> Self {
        Self::raw(VariantType::Signal, address, signal.word())
    }

    pub fn kind(&self) -> VariantType {
        VariantType::from_sys(self.tag as u32)
    }

    pub fn words(&self) -> (usize, usize) {
        (self.a, self.b)
    }

    pub fn is_nil(&self) -> bool {
        self.kind() == VariantType::Nil
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind() {
            VariantType::Bool => Some(self.a != 0),
            VariantType::Int => Some(self.a != 0),
            VariantType::Float => Some(f64::from_bits(self.a as u64) != 0.0),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.kind() {
            VariantType::Bool => Some(self.a as i64),
            VariantType::Int => Some(self.a as u64 as i64),
            VariantType::Float => Some(f64::from_bits(self.a as u64) as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.kind() {
            VariantType::Bool => Some(self.a as f64),
            VariantType::Int => Some(self.a as u64 as i64 as f64),
            VariantType::Float => Some(f64::from_bits(self.a as u64)),
            _ => None,
        }
    }

    pub fn as_rid(&self) -> Option<u64> {
        (self.kind() == VariantType::Rid).then_some(self.a as u64)
    }

    pub fn gstr(&self) -> Option<GStr> {
        (self.kind() == VariantType::String).then(|| unsafe { GStr::share_word(self.a) })
    }

    pub fn name(&self) -> Option<Name> {
        (self.kind() == VariantType::StringName).then(|| unsafe { Name::from_word(self.a) })
    }

    pub fn node_path(&self) -> Option<Arc<NodePathBody>> {
        (self.kind() == VariantType::NodePath).then(|| unsafe { arc_share(self.a) })
    }

    /// Text of a `String`, `StringName` or `NodePath`.
    pub fn text(&self) -> Option<String> {
        match self.kind() {
            VariantType::String => Some(unsafe { GStr::borrow_word(self.a) }.to_string()),
            VariantType::StringName => {
                Some(unsafe { Name::from_word(self.a) }.as_str().to_string())
            }
            VariantType::NodePath => {
                Some(unsafe { arc_borrow::<NodePathBody>(self.a) }.text.clone())
            }
            _ => None,
        }
    }

    /// `(address, id)` of an object variant.
    pub fn object(&self) -> Option<(usize, u64)> {
        (self.kind() == VariantType::Object).then_some((self.a, self.b as u64))
    }

    pub fn array(&self) -> Option<Arc<ArrayBody>> {
        (self.kind() == VariantType::Array).then(|| unsafe { arc_share(self.a) })
    }

    pub fn dict(&self) -> Option<Arc<DictBody>> {
        (self.kind() == VariantType::Dictionary).then(|| unsafe { arc_share(self.a) })
    }

    pub fn packed(&self) -> Option<Arc<PackedBody>> {
        self.kind().is_packed_array().then(|| unsafe { arc_share(self.a) })
    }

    pub fn pod(&self) -> Option<&[u8]> {
        pod_size(self.kind())?;
        Some(unsafe { (*(self.a as *const Vec<u8>)).as_slice() })
    }

    pub fn pod_of(&self, kind: VariantType) -> Option<&[u8]> {
        (self.kind() == kind).then(|| self.pod()).flatten()
    }

    /// `(address, name)` of a callable or signal.
    pub fn callable(&self) -> Option<(usize, Name)> {
        matches!(self.kind(), VariantType::Callable | VariantType::Signal)
            .then(|| (self.a, unsafe { Name::from_word(self.b) }))
    }
}

impl Default for Var {
    fn default() -> Self {
        Self::nil()
    }
}

impl Clone for Var {
    fn clone(&self) -> Self {
        use VariantType::*;
        let kind = self.kind();
        let a = match kind {
            String => unsafe { GStr::share_word(self.a) }.into_word(),
            NodePath => arc_into_word(unsafe { arc_share::<NodePathBody>(self.a) }),
            Array => arc_into_word(unsafe { arc_share::<ArrayBody>(self.a) }),
            Dictionary => arc_into_word(unsafe { arc_share::<DictBody>(self.a) }),
            k if k.is_packed_array() => arc_into_word(unsafe { arc_share::<PackedBody>(self.a) }),
            k if pod_size(k).is_some() => {
                let bytes = unsafe { (*(self.a as *const Vec<u8>)).clone() };
                Box::into_raw(Box::new(bytes)) as usize
            }
            Object => {
                if self.a != 0 {
                    crate::objects::reference(self.b as u64);
                }
                self.a
            }
            _ => self.a,
        };
        Self { tag: self.tag, a, b: self.b }
    }
}

impl Drop for Var {
    fn drop(&mut self) {
        use VariantType::*;
        unsafe {
            match self.kind() {
                String => drop(GStr::from_word(self.a)),
                NodePath => arc_release::<NodePathBody>(self.a),
                Array => arc_release::<ArrayBody>(self.a),
                Dictionary => arc_release::<DictBody>(self.a),
                k if k.is_packed_array() => arc_release::<PackedBody>(self.a),
                k if pod_size(k).is_some() => drop(Box::from_raw(self.a as *mut Vec<u8>)),
                Object if self.a != 0 => crate::objects::release(self.b as u64),
                _ => {}
            }
        }
        self.tag = 0;
    }
}

impl std::fmt::Debug for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Var({}: {})", self.kind(), crate::ops::stringify(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_interned() {
        let a = Name::intern("ready");
        let b = Name::intern("ready");
        assert_eq!(a, b);
        assert_eq!(a.word(), b.word());
        assert_ne!(a, Name::intern("process"));
    }

    #[test]
    fn string_words_share_bodies() {
        let text = GStr::new("hello");
        let copy = text.clone();
        assert_eq!(text.word(), copy.word());
        drop(text);
        assert_eq!(copy.as_str(), "hello");
    }

    #[test]
    fn node_paths_split_names_and_subnames() {
        let path = NodePathBody::parse("/root/player:position:x");
        assert!(path.absolute);
        assert_eq!(path.names.len(), 2);
        assert_eq!(path.subnames[1].as_str(), "x");
        assert!(!NodePathBody::parse("a/b").absolute);
    }

    #[test]
    fn packed_bodies_copy_on_write() {
        let mut first = Arc::new(PackedBody::Byte(vec![1, 2, 3]));
        let second = first.clone();
        Arc::make_mut(&mut first).resize(5);
        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 3);
    }

    #[test]
    fn variant_clone_owns_its_payload() {
        let vector = Var::from_pod(VariantType::Vector3, reals_to_bytes(&[1.0, 2.0, 3.0]));
        let copy = vector.clone();
        drop(vector);
        assert_eq!(bytes_to_reals(copy.pod().unwrap()), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn numeric_accessors_coerce() {
        assert_eq!(Var::from_int(-3).as_int(), Some(-3));
        assert_eq!(Var::from_float(2.5).as_int(), Some(2));
        assert_eq!(Var::from_bool(true).as_float(), Some(1.0));
        assert_eq!(Var::from_str("x").as_int(), None);
    }
}
