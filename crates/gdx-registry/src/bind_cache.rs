//! Method-bind cache: engine function pointers resolved once at startup.
//!
//! Generated code describes every symbol it calls with [`BindTables`]. At
//! startup [`MethodBindCache::load`] resolves all of them, checks manifest
//! hashes against the engine, and the result is published with
//! [`install_cache`]. Trampolines then fetch pointers by the index the
//! generator assigned, without locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{OnceLock, PoisonError, RwLock};

use gdx_sys as sys;
use gdx_sys::VariantType;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::error::BindError;

pub type UtilityFn =
    unsafe extern "C" fn(ret: sys::TypePtr, args: *const sys::ConstTypePtr, argc: i32);
pub type BuiltinMethodFn = unsafe extern "C" fn(
    base: sys::TypePtr,
    args: *const sys::ConstTypePtr,
    ret: sys::TypePtr,
    argc: i32,
);
pub type ConstructorFn =
    unsafe extern "C" fn(dst: sys::UninitTypePtr, args: *const sys::ConstTypePtr);
pub type DestructorFn = unsafe extern "C" fn(value: sys::TypePtr);
pub type FromTypeFn = unsafe extern "C" fn(dst: sys::UninitVariantPtr, src: sys::TypePtr);
pub type ToTypeFn = unsafe extern "C" fn(dst: sys::UninitTypePtr, src: sys::VariantPtr);

/// Highest constructor index tried per variant kind.
const MAX_CONSTRUCTORS: usize = 4;

// ============================================================================
// Keys
// ============================================================================

/// A class method as described by the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodKey {
    pub class: &'static str,
    pub method: &'static str,
    pub hash: i64,
    /// Unknown optional methods degrade to a per-call warning instead of
    /// failing startup.
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilityKey {
    pub name: &'static str,
    pub hash: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinMethodKey {
    pub kind: VariantType,
    pub method: &'static str,
    pub hash: i64,
}

/// Every symbol a generated binding needs, indexed by generated ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindTables {
    pub methods: &'static [MethodKey],
    pub utilities: &'static [UtilityKey],
    pub builtin_methods: &'static [BuiltinMethodKey],
}

/// How startup reacts to symbols that do not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MismatchPolicy {
    /// Any hash mismatch or missing required symbol aborts initialization.
    #[default]
    Fatal,
    /// Unresolved symbols are recorded; calling them logs a warning and
    /// returns a default value.
    Degrade,
}

/// A resolved engine method pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodBind(sys::MethodBindPtr);

// Method binds are immutable engine-side descriptors valid for the process lifetime.
unsafe impl Send for MethodBind {}
unsafe impl Sync for MethodBind {}

impl MethodBind {
    pub fn from_ptr(ptr: sys::MethodBindPtr) -> Option<Self> {
        (!ptr.is_null()).then_some(Self(ptr))
    }

    pub fn as_ptr(self) -> sys::MethodBindPtr {
        self.0
    }
}

// ============================================================================
// Resolution seam
// ============================================================================

/// Source of engine symbols.
///
/// [`EngineResolver`] asks the installed engine interface; tests substitute
/// their own tables.
pub trait SymbolResolver {
    fn method(&self, class: &str, method: &str, hash: i64) -> Result<MethodBind, BindError>;
    fn utility(&self, name: &str, hash: i64) -> Option<UtilityFn>;
    fn builtin_method(&self, kind: VariantType, method: &str, hash: i64) -> Option<BuiltinMethodFn>;
    fn constructor(&self, kind: VariantType, index: i32) -> Option<ConstructorFn>;
    fn destructor(&self, kind: VariantType) -> Option<DestructorFn>;
    fn variant_from_type(&self, kind: VariantType) -> Option<FromTypeFn>;
    fn variant_to_type(&self, kind: VariantType) -> Option<ToTypeFn>;
}

/// Resolves symbols through the installed engine interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineResolver;

impl SymbolResolver for EngineResolver {
    fn method(&self, class: &str, method: &str, hash: i64) -> Result<MethodBind, BindError> {
        if !sys::is_initialized() {
            return Err(BindError::InterfaceNotLoaded);
        }
        let get_bind = sys::interface_fn!(classdb_get_method_bind);
        let get_hash = sys::interface_fn!(classdb_get_method_hash);

        let (bind, actual) = sys::with_string_name(class, |class_name| {
            sys::with_string_name(method, |method_name| unsafe {
                let bind = get_bind(class_name, method_name, hash);
                let actual = if bind.is_null() {
                    get_hash(class_name, method_name)
                } else {
                    hash
                };
                (bind, actual)
            })
        });

        if let Some(bind) = MethodBind::from_ptr(bind) {
            return Ok(bind);
        }
        if actual == -1 || actual == hash {
            Err(BindError::UnknownMethod {
                class: class.to_string(),
                method: method.to_string(),
            })
        } else {
            Err(BindError::AbiMismatch {
                class: class.to_string(),
                method: method.to_string(),
                expected: hash,
                actual,
            })
        }
    }

    fn utility(&self, name: &str, hash: i64) -> Option<UtilityFn> {
        let get = sys::interface_fn!(variant_get_ptr_utility_function);
        sys::with_string_name(name, |name| unsafe { get(name, hash) })
    }

    fn builtin_method(
        &self,
        kind: VariantType,
        method: &str,
        hash: i64,
    ) -> Option<BuiltinMethodFn> {
        let get = sys::interface_fn!(variant_get_ptr_builtin_method);
        sys::with_string_name(method, |method| unsafe { get(kind.sys(), method, hash) })
    }

    fn constructor(&self, kind: VariantType, index: i32) -> Option<ConstructorFn> {
        let get = sys::interface_fn!(variant_get_ptr_constructor);
        unsafe { get(kind.sys(), index) }
    }

    fn destructor(&self, kind: VariantType) -> Option<DestructorFn> {
        let get = sys::interface_fn!(variant_get_ptr_destructor);
        unsafe { get(kind.sys()) }
    }

    fn variant_from_type(&self, kind: VariantType) -> Option<FromTypeFn> {
        let get = sys::interface_fn!(get_variant_from_type_constructor);
        unsafe { get(kind.sys()) }
    }

    fn variant_to_type(&self, kind: VariantType) -> Option<ToTypeFn> {
        let get = sys::interface_fn!(get_variant_to_type_constructor);
        unsafe { get(kind.sys()) }
    }
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct VariantOps {
    constructors: [Option<ConstructorFn>; MAX_CONSTRUCTORS],
    destructor: Option<DestructorFn>,
    from_type: Option<FromTypeFn>,
    to_type: Option<ToTypeFn>,
}

/// Resolved engine pointers for one loaded binding.
pub struct MethodBindCache {
    policy: MismatchPolicy,
    methods: Box<[Option<MethodBind>]>,
    method_keys: &'static [MethodKey],
    utilities: Box<[Option<UtilityFn>]>,
    builtin_methods: Box<[Option<BuiltinMethodFn>]>,
    variant_ops: Box<[VariantOps]>,
    degraded: Vec<BindError>,
    warned: Box<[AtomicBool]>,
    lazy: RwLock<FxHashMap<(String, String, i64), MethodBind>>,
}

impl std::fmt::Debug for MethodBindCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodBindCache")
            .field("policy", &self.policy)
            .field("methods", &self.methods.len())
            .field("utilities", &self.utilities.len())
            .field("builtin_methods", &self.builtin_methods.len())
            .field("degraded", &self.degraded.len())
            .finish()
    }
}

impl MethodBindCache {
    /// Resolve every entry of `tables`.
    ///
    /// Returns every fatal error at once so a broken engine build reports all
    /// drifted symbols in one go.
    pub fn load(
        tables: &BindTables,
        policy: MismatchPolicy,
        resolver: &impl SymbolResolver,
    ) -> Result<Self, Vec<BindError>> {
        let mut fatal = Vec::new();
        let mut degraded = Vec::new();

        let mut classify = |error: BindError, optional: bool| {
            let tolerated = match policy {
                MismatchPolicy::Degrade => true,
                MismatchPolicy::Fatal => optional && !error.is_abi_mismatch(),
            };
            if tolerated {
                warn!(%error, "engine symbol unavailable; calls will be skipped");
                degraded.push(error);
            } else {
                fatal.push(error);
            }
        };

        let methods = tables
            .methods
            .iter()
            .map(|key| match resolver.method(key.class, key.method, key.hash) {
                Ok(bind) => Some(bind),
                Err(error) => {
                    classify(error, key.optional);
                    None
                }
            })
            .collect::<Box<[_]>>();

        let utilities = tables
            .utilities
            .iter()
            .map(|key| {
                let resolved = resolver.utility(key.name, key.hash);
                if resolved.is_none() {
                    classify(
                        BindError::UnknownUtility {
                            name: key.name.to_string(),
                            hash: key.hash,
                        },
                        false,
                    );
                }
                resolved
            })
            .collect::<Box<[_]>>();

        let builtin_methods = tables
            .builtin_methods
            .iter()
            .map(|key| {
                let resolved = resolver.builtin_method(key.kind, key.method, key.hash);
                if resolved.is_none() {
                    classify(
                        BindError::UnknownBuiltinMethod {
                            kind: key.kind,
                            method: key.method.to_string(),
                            hash: key.hash,
                        },
                        false,
                    );
                }
                resolved
            })
            .collect::<Box<[_]>>();

        let variant_ops = VariantType::ALL
            .iter()
            .map(|&kind| {
                let mut ops = VariantOps::default();
                if kind == VariantType::Nil {
                    return ops;
                }
                for (index, slot) in ops.constructors.iter_mut().enumerate() {
                    *slot = resolver.constructor(kind, index as i32);
                }
                if !kind.is_plain_data() {
                    ops.destructor = resolver.destructor(kind);
                }
                ops.from_type = resolver.variant_from_type(kind);
                ops.to_type = resolver.variant_to_type(kind);
                ops
            })
            .collect::<Box<[_]>>();

        if !fatal.is_empty() {
            return Err(fatal);
        }

        info!(
            methods = methods.len(),
            utilities = utilities.len(),
            builtin_methods = builtin_methods.len(),
            degraded = degraded.len(),
            "method bind cache loaded"
        );

        let warned = (0..methods.len()).map(|_| AtomicBool::new(false)).collect();
        Ok(Self {
            policy,
            methods,
            method_keys: tables.methods,
            utilities,
            builtin_methods,
            variant_ops,
            degraded,
            warned,
            lazy: RwLock::new(FxHashMap::default()),
        })
    }

    pub fn policy(&self) -> MismatchPolicy {
        self.policy
    }

    /// Symbols that failed to resolve but were tolerated by the policy.
    pub fn degraded(&self) -> &[BindError] {
        &self.degraded
    }

    /// Method pointer for generated id `id`; `None` when degraded.
    #[inline]
    pub fn method(&self, id: usize) -> Option<MethodBind> {
        self.methods.get(id).copied().flatten()
    }

    /// Manifest key for generated id `id`.
    pub fn method_key(&self, id: usize) -> Option<&'static MethodKey> {
        self.method_keys.get(id)
    }

    #[inline]
    pub fn utility(&self, id: usize) -> Option<UtilityFn> {
        self.utilities.get(id).copied().flatten()
    }

    #[inline]
    pub fn builtin_method(&self, id: usize) -> Option<BuiltinMethodFn> {
        self.builtin_methods.get(id).copied().flatten()
    }

    /// Constructor `index` for `kind`.
    pub fn resolve_constructor(
        &self,
        kind: VariantType,
        index: i32,
    ) -> Result<ConstructorFn, BindError> {
        self.variant_ops
            .get(kind.sys() as usize)
            .and_then(|ops| ops.constructors.get(index as usize).copied().flatten())
            .ok_or(BindError::UnknownConstructor { kind, index })
    }

    pub fn destructor(&self, kind: VariantType) -> Option<DestructorFn> {
        self.variant_ops.get(kind.sys() as usize).and_then(|ops| ops.destructor)
    }

    pub fn variant_from_type(&self, kind: VariantType) -> Option<FromTypeFn> {
        self.variant_ops.get(kind.sys() as usize).and_then(|ops| ops.from_type)
    }

    pub fn variant_to_type(&self, kind: VariantType) -> Option<ToTypeFn> {
        self.variant_ops.get(kind.sys() as usize).and_then(|ops| ops.to_type)
    }

    /// Resolve a method that is not part of the generated tables.
    ///
    /// The first successful lookup is memoized.
    pub fn resolve_method(
        &self,
        class: &str,
        method: &str,
        hash: i64,
    ) -> Result<MethodBind, BindError> {
        self.resolve_method_with(class, method, hash, &EngineResolver)
    }

    pub fn resolve_method_with(
        &self,
        class: &str,
        method: &str,
        hash: i64,
        resolver: &impl SymbolResolver,
    ) -> Result<MethodBind, BindError> {
        let key = (class.to_string(), method.to_string(), hash);
        if let Some(bind) = self
            .lazy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(*bind);
        }

        let bind = resolver.method(class, method, hash)?;
        debug!(class, method, "memoized method bind");
        self.lazy
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, bind);
        Ok(bind)
    }

    /// Record a call to a degraded method; true the first time for `id`.
    pub fn note_unavailable(&self, id: usize) -> bool {
        self.warned
            .get(id)
            .is_some_and(|flag| !flag.swap(true, Ordering::Relaxed))
    }
}

// ============================================================================
// Global instance
// ============================================================================

static CACHE: OnceLock<MethodBindCache> = OnceLock::new();

/// Publish the cache for the rest of the process.
pub fn install_cache(cache: MethodBindCache) -> Result<&'static MethodBindCache, BindError> {
    CACHE.set(cache).map_err(|_| BindError::AlreadyInstalled)?;
    Ok(self::cache())
}

pub fn try_cache() -> Option<&'static MethodBindCache> {
    CACHE.get()
}

/// The installed cache.
///
/// # Panics
///
/// When called before startup finished.
pub fn cache() -> &'static MethodBindCache {
    match CACHE.get() {
        Some(cache) => cache,
        None => panic!("method bind cache used before the bridge finished initializing"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeEngine {
        known: Vec<(&'static str, &'static str, i64)>,
    }

    unsafe extern "C" fn fake_utility(_: sys::TypePtr, _: *const sys::ConstTypePtr, _: i32) {}
    unsafe extern "C" fn fake_ctor(_: sys::UninitTypePtr, _: *const sys::ConstTypePtr) {}

    impl SymbolResolver for FakeEngine {
        fn method(&self, class: &str, method: &str, hash: i64) -> Result<MethodBind, BindError> {
            let found = self
                .known
                .iter()
                .position(|(c, m, _)| *c == class && *m == method);
            match found {
                Some(index) if self.known[index].2 == hash => {
                    Ok(MethodBind(std::ptr::without_provenance(index + 1)))
                }
                Some(index) => Err(BindError::AbiMismatch {
                    class: class.into(),
                    method: method.into(),
                    expected: hash,
                    actual: self.known[index].2,
                }),
                None => Err(BindError::UnknownMethod {
                    class: class.into(),
                    method: method.into(),
                }),
            }
        }

        fn utility(&self, name: &str, _hash: i64) -> Option<UtilityFn> {
            (name == "print").then_some(fake_utility as UtilityFn)
        }

        fn builtin_method(&self, _: VariantType, _: &str, _: i64) -> Option<BuiltinMethodFn> {
            None
        }

        fn constructor(&self, kind: VariantType, index: i32) -> Option<ConstructorFn> {
            (kind == VariantType::String && index < 2).then_some(fake_ctor as ConstructorFn)
        }

        fn destructor(&self, _: VariantType) -> Option<DestructorFn> {
            None
        }

        fn variant_from_type(&self, _: VariantType) -> Option<FromTypeFn> {
            None
        }

        fn variant_to_type(&self, _: VariantType) -> Option<ToTypeFn> {
            None
        }
    }

    fn engine() -> FakeEngine {
        FakeEngine {
            known: vec![("Node", "get_name", 11), ("Node", "add_child", 22)],
        }
    }

    static METHODS: &[MethodKey] = &[
        MethodKey {
            class: "Node",
            method: "get_name",
            hash: 11,
            optional: false,
        },
        MethodKey {
            class: "Node",
            method: "add_child",
            hash: 22,
            optional: false,
        },
    ];

    static UTILITIES: &[UtilityKey] = &[UtilityKey { name: "print", hash: 5 }];

    #[test]
    fn load_resolves_every_entry() {
        let tables = BindTables {
            methods: METHODS,
            utilities: UTILITIES,
            builtin_methods: &[],
        };
        let cache = MethodBindCache::load(&tables, MismatchPolicy::Fatal, &engine()).unwrap();

        assert!(cache.method(0).is_some());
        assert!(cache.method(1).is_some());
        assert!(cache.method(2).is_none());
        assert!(cache.utility(0).is_some());
        assert!(cache.degraded().is_empty());
        assert_eq!(cache.method_key(1).unwrap().method, "add_child");
    }

    #[test]
    fn hash_mismatch_is_fatal_by_default() {
        static DRIFTED: &[MethodKey] = &[MethodKey {
            class: "Node",
            method: "get_name",
            hash: 99,
            optional: true,
        }];
        let tables = BindTables {
            methods: DRIFTED,
            ..Default::default()
        };

        let errors = MethodBindCache::load(&tables, MismatchPolicy::Fatal, &engine()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_abi_mismatch());
    }

    #[test]
    fn degrade_policy_keeps_running() {
        static DRIFTED: &[MethodKey] = &[
            MethodKey {
                class: "Node",
                method: "get_name",
                hash: 99,
                optional: false,
            },
            MethodKey {
                class: "Node",
                method: "add_child",
                hash: 22,
                optional: false,
            },
        ];
        let tables = BindTables {
            methods: DRIFTED,
            ..Default::default()
        };

        let cache = MethodBindCache::load(&tables, MismatchPolicy::Degrade, &engine()).unwrap();
        assert!(cache.method(0).is_none());
        assert!(cache.method(1).is_some());
        assert_eq!(cache.degraded().len(), 1);

        assert!(cache.note_unavailable(0));
        assert!(!cache.note_unavailable(0));
    }

    #[test]
    fn optional_unknown_method_is_tolerated() {
        static OPTIONAL: &[MethodKey] = &[MethodKey {
            class: "Node",
            method: "not_in_this_build",
            hash: 1,
            optional: true,
        }];
        let tables = BindTables {
            methods: OPTIONAL,
            ..Default::default()
        };

        let cache = MethodBindCache::load(&tables, MismatchPolicy::Fatal, &engine()).unwrap();
        assert!(cache.method(0).is_none());
        assert!(matches!(cache.degraded()[0], BindError::UnknownMethod { .. }));
    }

    #[test]
    fn missing_utility_is_fatal() {
        static MISSING: &[UtilityKey] = &[UtilityKey { name: "lerpf", hash: 7 }];
        let tables = BindTables {
            utilities: MISSING,
            ..Default::default()
        };

        let errors = MethodBindCache::load(&tables, MismatchPolicy::Fatal, &engine()).unwrap_err();
        assert_eq!(
            errors,
            vec![BindError::UnknownUtility {
                name: "lerpf".into(),
                hash: 7
            }]
        );
    }

    #[test]
    fn constructors_are_looked_up_by_kind_and_index() {
        let tables = BindTables::default();
        let cache = MethodBindCache::load(&tables, MismatchPolicy::Fatal, &engine()).unwrap();

        assert!(cache.resolve_constructor(VariantType::String, 1).is_ok());
        assert_eq!(
            cache.resolve_constructor(VariantType::String, 3).unwrap_err(),
            BindError::UnknownConstructor {
                kind: VariantType::String,
                index: 3
            }
        );
        assert!(cache.resolve_constructor(VariantType::Nil, 0).is_err());
    }

    #[test]
    fn lazy_resolution_is_memoized() {
        let tables = BindTables::default();
        let cache = MethodBindCache::load(&tables, MismatchPolicy::Fatal, &engine()).unwrap();

        let first = cache.resolve_method_with("Node", "add_child", 22, &engine()).unwrap();
        // A resolver that knows nothing still answers from the memo.
        let empty = FakeEngine { known: vec![] };
        let second = cache.resolve_method_with("Node", "add_child", 22, &empty).unwrap();
        assert_eq!(first, second);

        assert!(cache.resolve_method_with("Node", "queue_free", 1, &empty).is_err());
    }
}
