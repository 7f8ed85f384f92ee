use std::sync::{Mutex, PoisonError};

use gdx_registry::{ArgInfo, PropertyDescriptor, VirtualFn, VirtualTable};
use gdx_sys::{ConstTypePtr, MethodFlags, TypePtr, VariantType};
use rustc_hash::FxHashSet;

use crate::builtin::StringName;
use crate::call::CallError;
use crate::meta::{FromVariant, PtrCodec, ToVariant};
use crate::registrar::HostClass;
use crate::registrar::instance::InstanceStorage;
use crate::variant::Variant;

/// Declared type of an argument, return value or property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub kind: VariantType,
    pub class_name: Option<&'static str>,
}

impl ArgSpec {
    pub fn of<V: PtrCodec>() -> Self {
        Self {
            kind: V::VARIANT_TYPE,
            class_name: V::CLASS_NAME,
        }
    }

    fn arg_info(self, name: &'static str) -> ArgInfo {
        ArgInfo {
            name,
            kind: self.kind,
            class_name: self.class_name,
        }
    }
}

/// A property reported by an instance's dynamic property-list hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicProperty {
    pub name: String,
    pub spec: ArgSpec,
}

impl DynamicProperty {
    pub fn new<V: PtrCodec>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: ArgSpec::of::<V>(),
        }
    }
}

// ============================================================================
// Methods
// ============================================================================

/// A Rust function callable as a method of host class `T`.
///
/// Implemented for `Fn(&T, ..) -> R` and `Fn(&mut T, ..) -> R` with up to
/// five arguments; `Marker` is the matching `fn` pointer type and only
/// serves to keep the impls apart.
pub trait HostMethod<T: HostClass, Marker>: Send + Sync + 'static {
    const ARITY: usize;
    const IS_CONST: bool;

    fn args() -> Vec<ArgSpec>;

    fn ret() -> Option<ArgSpec>;

    /// Call with variant arguments, checking count and kinds.
    fn call_variants(
        &self,
        storage: &InstanceStorage<T>,
        args: &[&Variant],
    ) -> Result<Variant, CallError>;

    /// Call with typed storage the engine already checked.
    ///
    /// # Safety
    ///
    /// `args` must hold `ARITY` pointers to values of the declared kinds and
    /// `ret` must be storage for the return kind.
    unsafe fn call_ptrs(
        &self,
        storage: &InstanceStorage<T>,
        args: *const ConstTypePtr,
        ret: TypePtr,
    );

    /// Fill `ret` with the return type's default, for calls that produced no
    /// value.
    ///
    /// # Safety
    ///
    /// `ret` must be uninitialized storage for the return kind.
    unsafe fn write_default_return(ret: TypePtr);
}

/// Default `R` written into a return slot the callee left untouched.
///
/// # Safety
///
/// `ret` must be uninitialized storage for `R`.
unsafe fn write_default<R: PtrCodec>(ret: TypePtr) {
    if R::SIZE != 0 && !ret.is_null() {
        unsafe { crate::call::default_return::<R>().write_return(ret) };
    }
}

/// Return description for `R`; unit means no return value.
fn ret_spec<R: PtrCodec>() -> Option<ArgSpec> {
    (R::SIZE != 0).then(ArgSpec::of::<R>)
}

fn check_arity(expected: usize, given: usize) -> Result<(), CallError> {
    let expected_i32 = expected as i32;
    if given < expected {
        return Err(CallError::TooFewArguments { expected: expected_i32 });
    }
    if given > expected {
        return Err(CallError::TooManyArguments { expected: expected_i32 });
    }
    Ok(())
}

fn decode_arg<A: PtrCodec + FromVariant>(args: &[&Variant], index: usize) -> Result<A, CallError> {
    A::try_from_variant(args[index]).map_err(|_| CallError::InvalidArgument {
        index: index as i32,
        expected: A::VARIANT_TYPE,
    })
}

macro_rules! impl_host_method {
    ($count:literal; $($arg:ident $index:tt),*) => {
        impl<T, F, R, $($arg,)*> HostMethod<T, fn(&mut T, $($arg),*) -> R> for F
        where
            T: HostClass,
            F: Fn(&mut T, $($arg),*) -> R + Send + Sync + 'static,
            R: PtrCodec + ToVariant,
            $($arg: PtrCodec + FromVariant,)*
        {
            const ARITY: usize = $count;
            const IS_CONST: bool = false;

            fn args() -> Vec<ArgSpec> {
                vec![$(ArgSpec::of::<$arg>()),*]
            }

            fn ret() -> Option<ArgSpec> {
                ret_spec::<R>()
            }

            #[allow(unused_variables)]
            fn call_variants(
                &self,
                storage: &InstanceStorage<T>,
                args: &[&Variant],
            ) -> Result<Variant, CallError> {
                check_arity($count, args.len())?;
                let result = (self)(
                    &mut *storage.borrow_mut(),
                    $(decode_arg::<$arg>(args, $index)?),*
                );
                Ok(result.to_variant())
            }

            #[allow(unused_variables)]
            unsafe fn call_ptrs(
                &self,
                storage: &InstanceStorage<T>,
                args: *const ConstTypePtr,
                ret: TypePtr,
            ) {
                let result = (self)(
                    &mut *storage.borrow_mut(),
                    $(unsafe { <$arg as PtrCodec>::from_arg_ptr(*args.add($index)) }),*
                );
                unsafe { result.write_return(ret) };
            }

            unsafe fn write_default_return(ret: TypePtr) {
                unsafe { write_default::<R>(ret) };
            }
        }

        impl<T, F, R, $($arg,)*> HostMethod<T, fn(&T, $($arg),*) -> R> for F
        where
            T: HostClass,
            F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
            R: PtrCodec + ToVariant,
            $($arg: PtrCodec + FromVariant,)*
        {
            const ARITY: usize = $count;
            const IS_CONST: bool = true;

            fn args() -> Vec<ArgSpec> {
                vec![$(ArgSpec::of::<$arg>()),*]
            }

            fn ret() -> Option<ArgSpec> {
                ret_spec::<R>()
            }

            #[allow(unused_variables)]
            fn call_variants(
                &self,
                storage: &InstanceStorage<T>,
                args: &[&Variant],
            ) -> Result<Variant, CallError> {
                check_arity($count, args.len())?;
                let result = (self)(&*storage.borrow(), $(decode_arg::<$arg>(args, $index)?),*);
                Ok(result.to_variant())
            }

            #[allow(unused_variables)]
            unsafe fn call_ptrs(
                &self,
                storage: &InstanceStorage<T>,
                args: *const ConstTypePtr,
                ret: TypePtr,
            ) {
                let result = (self)(
                    &*storage.borrow(),
                    $(unsafe { <$arg as PtrCodec>::from_arg_ptr(*args.add($index)) }),*
                );
                unsafe { result.write_return(ret) };
            }

            unsafe fn write_default_return(ret: TypePtr) {
                unsafe { write_default::<R>(ret) };
            }
        }
    };
}

impl_host_method!(0;);
impl_host_method!(1; A0 0);
impl_host_method!(2; A0 0, A1 1);
impl_host_method!(3; A0 0, A1 1, A2 2);
impl_host_method!(4; A0 0, A1 1, A2 2, A3 3);
impl_host_method!(5; A0 0, A1 1, A2 2, A3 3, A4 4);

/// A [`HostMethod`] with its marker erased.
pub(crate) trait ErasedMethod<T: HostClass>: Send + Sync {
    fn call_variants(
        &self,
        storage: &InstanceStorage<T>,
        args: &[&Variant],
    ) -> Result<Variant, CallError>;

    /// # Safety
    ///
    /// As for [`HostMethod::call_ptrs`].
    unsafe fn call_ptrs(
        &self,
        storage: &InstanceStorage<T>,
        args: *const ConstTypePtr,
        ret: TypePtr,
    );

    /// # Safety
    ///
    /// As for [`HostMethod::write_default_return`].
    unsafe fn write_default_return(&self, ret: TypePtr);
}

struct Erased<F, M> {
    method: F,
    _marker: std::marker::PhantomData<fn() -> M>,
}

impl<T, M, F> ErasedMethod<T> for Erased<F, M>
where
    T: HostClass,
    M: 'static,
    F: HostMethod<T, M>,
{
    fn call_variants(
        &self,
        storage: &InstanceStorage<T>,
        args: &[&Variant],
    ) -> Result<Variant, CallError> {
        self.method.call_variants(storage, args)
    }

    unsafe fn call_ptrs(
        &self,
        storage: &InstanceStorage<T>,
        args: *const ConstTypePtr,
        ret: TypePtr,
    ) {
        unsafe { self.method.call_ptrs(storage, args, ret) }
    }

    unsafe fn write_default_return(&self, ret: TypePtr) {
        unsafe { F::write_default_return(ret) }
    }
}

/// A method ready for registration; its address is the method userdata.
pub(crate) struct MethodEntry<T: HostClass> {
    pub(crate) name: &'static str,
    pub(crate) args: Vec<ArgSpec>,
    pub(crate) ret: Option<ArgSpec>,
    pub(crate) flags: MethodFlags,
    pub(crate) method: Box<dyn ErasedMethod<T>>,
}

pub(crate) struct PropertyEntry {
    pub(crate) name: &'static str,
    pub(crate) spec: ArgSpec,
    pub(crate) getter: &'static str,
    pub(crate) setter: Option<&'static str>,
}

pub(crate) struct ConstantEntry {
    pub(crate) enum_name: &'static str,
    pub(crate) name: &'static str,
    pub(crate) value: i64,
    pub(crate) is_bitfield: bool,
}

/// Instance hooks beyond methods.
pub(crate) struct Hooks<T> {
    pub(crate) notification: Option<fn(&mut T, i32)>,
    pub(crate) to_string: Option<fn(&T) -> String>,
    pub(crate) set: Option<fn(&mut T, &StringName, &Variant) -> bool>,
    pub(crate) get: Option<fn(&T, &StringName) -> Option<Variant>>,
    pub(crate) property_list: Option<fn(&T) -> Vec<DynamicProperty>>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            notification: None,
            to_string: None,
            set: None,
            get: None,
            property_list: None,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Collects what a host class exposes to the engine.
///
/// ```ignore
/// fn register(builder: &mut ClassBuilder<Player>) {
///     builder
///         .method("jump", Player::jump)
///         .property("speed", |p: &Player| p.speed, |p: &mut Player, v: f64| p.speed = v)
///         .constant("State", "IDLE", 0)
///         .on_notification(Player::notified);
/// }
/// ```
pub struct ClassBuilder<T: HostClass> {
    pub(crate) methods: Vec<MethodEntry<T>>,
    pub(crate) properties: Vec<PropertyEntry>,
    pub(crate) constants: Vec<ConstantEntry>,
    pub(crate) virtuals: VirtualTable,
    pub(crate) hooks: Hooks<T>,
}

impl<T: HostClass> ClassBuilder<T> {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
            properties: Vec::new(),
            constants: Vec::new(),
            virtuals: VirtualTable::new(),
            hooks: Hooks::default(),
        }
    }

    /// Expose `f` as method `name`, callable through variant calls and
    /// pointer calls.
    pub fn method<M: 'static, F: HostMethod<T, M>>(
        &mut self,
        name: &'static str,
        f: F,
    ) -> &mut Self {
        let mut flags = MethodFlags::DEFAULT;
        if F::IS_CONST {
            flags |= MethodFlags::CONST;
        }
        self.methods.push(MethodEntry {
            name,
            args: F::args(),
            ret: F::ret(),
            flags,
            method: Box::new(Erased {
                method: f,
                _marker: std::marker::PhantomData,
            }),
        });
        self
    }

    /// Property `name` backed by generated `get_<name>` and `set_<name>`
    /// methods.
    pub fn property<V>(
        &mut self,
        name: &'static str,
        getter: fn(&T) -> V,
        setter: fn(&mut T, V),
    ) -> &mut Self
    where
        V: PtrCodec + ToVariant + FromVariant + 'static,
    {
        let getter_name = accessor_name("get_", name);
        let setter_name = accessor_name("set_", name);
        self.method(getter_name, move |this: &T| getter(this));
        self.method(setter_name, move |this: &mut T, value: V| setter(this, value));
        self.properties.push(PropertyEntry {
            name,
            spec: ArgSpec::of::<V>(),
            getter: getter_name,
            setter: Some(setter_name),
        });
        self
    }

    /// Property `name` with only a `get_<name>` method.
    pub fn read_only_property<V>(&mut self, name: &'static str, getter: fn(&T) -> V) -> &mut Self
    where
        V: PtrCodec + ToVariant + FromVariant + 'static,
    {
        let getter_name = accessor_name("get_", name);
        self.method(getter_name, move |this: &T| getter(this));
        self.properties.push(PropertyEntry {
            name,
            spec: ArgSpec::of::<V>(),
            getter: getter_name,
            setter: None,
        });
        self
    }

    /// Integer constant `name`, grouped under `enum_name` (empty for none).
    pub fn constant(
        &mut self,
        enum_name: &'static str,
        name: &'static str,
        value: i64,
    ) -> &mut Self {
        self.constants.push(ConstantEntry {
            enum_name,
            name,
            value,
            is_bitfield: false,
        });
        self
    }

    pub fn bitfield_constant(
        &mut self,
        enum_name: &'static str,
        name: &'static str,
        value: i64,
    ) -> &mut Self {
        self.constants.push(ConstantEntry {
            enum_name,
            name,
            value,
            is_bitfield: true,
        });
        self
    }

    /// Route engine virtual calls to an override. Takes the result of
    /// `I<Class>::__virtual`; `None` registers nothing.
    pub fn override_virtual(&mut self, entry: Option<(&'static str, VirtualFn)>) -> &mut Self {
        match entry {
            Some((engine_name, stub)) => {
                self.virtuals.insert(engine_name, stub);
            }
            None => crate::engine_warn!(
                "`{}` overrides a virtual its base class does not declare",
                T::CLASS_NAME
            ),
        }
        self
    }

    pub fn on_notification(&mut self, hook: fn(&mut T, i32)) -> &mut Self {
        self.hooks.notification = Some(hook);
        self
    }

    pub fn on_to_string(&mut self, hook: fn(&T) -> String) -> &mut Self {
        self.hooks.to_string = Some(hook);
        self
    }

    /// Handle `Object.set` for names the class does not declare. Returning
    /// `false` lets the engine fall back to its own handling.
    pub fn on_set(&mut self, hook: fn(&mut T, &StringName, &Variant) -> bool) -> &mut Self {
        self.hooks.set = Some(hook);
        self
    }

    pub fn on_get(&mut self, hook: fn(&T, &StringName) -> Option<Variant>) -> &mut Self {
        self.hooks.get = Some(hook);
        self
    }

    /// Extra entries for `Object.get_property_list`.
    pub fn on_property_list(&mut self, hook: fn(&T) -> Vec<DynamicProperty>) -> &mut Self {
        self.hooks.property_list = Some(hook);
        self
    }

    pub(crate) fn arg_infos(entry: &MethodEntry<T>) -> Vec<ArgInfo> {
        entry.args.iter().map(|spec| spec.arg_info("")).collect()
    }

    pub(crate) fn property_descriptors(&self) -> Vec<PropertyDescriptor> {
        self.properties
            .iter()
            .map(|property| {
                let mut descriptor =
                    PropertyDescriptor::new(property.name, property.spec.kind, property.getter);
                descriptor.class_name = property.spec.class_name;
                match property.setter {
                    Some(setter) => descriptor.with_setter(setter),
                    None => descriptor,
                }
            })
            .collect()
    }
}

impl<T: HostClass> Default for ClassBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// `prefix` + `name`, interned for the rest of the process.
fn accessor_name(prefix: &str, name: &str) -> &'static str {
    static NAMES: Mutex<Option<FxHashSet<&'static str>>> = Mutex::new(None);

    let full = format!("{prefix}{name}");
    let mut names = NAMES.lock().unwrap_or_else(PoisonError::into_inner);
    let names = names.get_or_insert_with(Default::default);
    if let Some(existing) = names.get(full.as_str()) {
        return existing;
    }
    let leaked: &'static str = Box::leak(full.into_boxed_str());
    names.insert(leaked);
    leaked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_names_are_interned() {
        let a = accessor_name("get_", "speed");
        let b = accessor_name("get_", "speed");
        assert_eq!(a, "get_speed");
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn arity_errors_name_the_expected_count() {
        assert_eq!(check_arity(2, 1), Err(CallError::TooFewArguments { expected: 2 }));
        assert_eq!(check_arity(0, 3), Err(CallError::TooManyArguments { expected: 0 }));
        assert_eq!(check_arity(1, 1), Ok(()));
    }
}
