//! Class database.
//!
//! Engine classes are declared once, with their method signatures written in
//! the same `ret(args) const vararg static` form the API manifest hashes.
//! Extension classes are added at runtime through the registration entries.
//! Method binds handed to the bridge are `Arc<MethodInfo>` pointers that stay
//! valid for the life of the process, unregistration included.

use std::ffi::c_void;
use std::sync::{Arc, LazyLock, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

use gdx_sys::{
    CallError, CallErrorType, ClassCreationInfo, ClassInstancePtr, ClassMethodCall,
    ClassMethodPtrCall, ObjectPtr, VariantType,
};
use rustc_hash::FxHashMap;
use xxhash_rust::xxh64::xxh64;

use crate::classes::{self, node, object};
use crate::error::code;
use crate::hooks;
use crate::objects;
use crate::ops;
use crate::typed::{self, Slot, TypedArgs};
use crate::value::{GStr, Name, Var, lock};

/// Body of an engine method. Arguments arrive already checked and converted
/// to the declared kinds.
pub type EngineMethod = fn(this: ObjectPtr, args: &[Var]) -> Result<Var, CallError>;

/// Declared type of an argument or return value.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgType {
    pub kind: VariantType,
    /// Class name for object arguments.
    pub class: Option<String>,
}

impl ArgType {
    /// Decode a manifest type string.
    pub fn parse(ty: &str) -> Self {
        let kind = match ty {
            "Variant" => typed::ANY,
            "bool" => VariantType::Bool,
            "int" => VariantType::Int,
            "float" => VariantType::Float,
            t if t.starts_with("enum::") || t.starts_with("bitfield::") => VariantType::Int,
            t if t.starts_with("typedarray::") => VariantType::Array,
            t => match VariantType::from_name(t) {
                Some(kind) => kind,
                None => {
                    return Self {
                        kind: VariantType::Object,
                        class: Some(t.to_string()),
                    };
                }
            },
        };
        Self { kind, class: None }
    }

    pub fn any() -> Self {
        Self {
            kind: typed::ANY,
            class: None,
        }
    }

    fn type_string(&self) -> String {
        match (&self.class, self.kind) {
            (Some(class), _) => class.clone(),
            (None, VariantType::Nil) => "Variant".to_string(),
            (None, kind) => kind.name().to_string(),
        }
    }
}

/// Parsed method signature.
#[derive(Debug, Clone)]
pub struct Signature {
    pub text: String,
    pub args: Vec<ArgType>,
    pub ret: Option<ArgType>,
    pub is_const: bool,
    pub is_vararg: bool,
    pub is_static: bool,
}

impl Signature {
    /// Parse `"int(enum::Animation.TrackType,int) const"`.
    pub fn parse(text: &str) -> Self {
        let (head, tail) = text.split_once('(').unwrap_or((text, ")"));
        let (args, qualifiers) = tail.split_once(')').unwrap_or((tail, ""));
        let ret = (head != "void").then(|| ArgType::parse(head));
        let args = args.split(',').filter(|a| !a.is_empty()).map(ArgType::parse).collect();
        let qualifiers: Vec<&str> = qualifiers.split_whitespace().collect();
        Self {
            text: text.to_string(),
            args,
            ret,
            is_const: qualifiers.contains(&"const"),
            is_vararg: qualifiers.contains(&"vararg"),
            is_static: qualifiers.contains(&"static"),
        }
    }

    fn from_parts(
        ret: Option<ArgType>,
        args: Vec<ArgType>,
        is_const: bool,
        is_vararg: bool,
        is_static: bool,
    ) -> Self {
        let mut text = format!(
            "{}({})",
            ret.as_ref().map_or("void".to_string(), ArgType::type_string),
            args.iter().map(ArgType::type_string).collect::<Vec<_>>().join(",")
        );
        for (set, word) in [(is_const, " const"), (is_vararg, " vararg"), (is_static, " static")] {
            if set {
                text.push_str(word);
            }
        }
        Self {
            text,
            args,
            ret,
            is_const,
            is_vararg,
            is_static,
        }
    }

    /// Low 32 bits of xxh64 over the signature text.
    pub fn hash(&self) -> i64 {
        signature_hash(&self.text)
    }
}

pub fn signature_hash(text: &str) -> i64 {
    (xxh64(text.as_bytes(), 0) & 0xffff_ffff) as i64
}

pub enum MethodBody {
    Engine(EngineMethod),
    Extension {
        userdata: usize,
        call: ClassMethodCall,
        ptrcall: ClassMethodPtrCall,
    },
}

pub struct MethodInfo {
    pub class: String,
    pub name: String,
    pub signature: Signature,
    pub body: MethodBody,
}

impl std::fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{} {}", self.class, self.name, self.signature.text)
    }
}

#[derive(Debug, Clone)]
pub struct PropertyRecord {
    pub name: String,
    pub kind: VariantType,
    pub class: Option<String>,
    pub setter: String,
    pub getter: String,
    pub usage: u32,
}

#[derive(Debug, Clone)]
pub struct ConstantRecord {
    pub enum_name: String,
    pub name: String,
    pub value: i64,
    pub is_bitfield: bool,
}

/// Callback table of a registered extension class.
#[derive(Clone, Copy)]
pub struct ExtensionClass {
    pub info: ClassCreationInfo,
    pub library: usize,
}

// Callback pointers and userdata are owned by the extension library and
// valid on every thread until unregistration.
unsafe impl Send for ExtensionClass {}
unsafe impl Sync for ExtensionClass {}

pub struct ClassInfo {
    pub name: String,
    pub parent: Option<String>,
    pub refcounted: bool,
    pub instantiable: bool,
    pub methods: FxHashMap<String, Arc<MethodInfo>>,
    pub properties: Vec<PropertyRecord>,
    pub constants: Vec<ConstantRecord>,
    pub extension: Option<ExtensionClass>,
}

impl ClassInfo {
    pub fn engine(name: &str, parent: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            refcounted: false,
            instantiable: true,
            methods: FxHashMap::default(),
            properties: Vec::new(),
            constants: Vec::new(),
            extension: None,
        }
    }

    pub fn refcounted(mut self) -> Self {
        self.refcounted = true;
        self
    }

    pub fn not_instantiable(mut self) -> Self {
        self.instantiable = false;
        self
    }

    pub fn method(mut self, name: &str, signature: &str, body: EngineMethod) -> Self {
        let info = MethodInfo {
            class: self.name.clone(),
            name: name.to_string(),
            signature: Signature::parse(signature),
            body: MethodBody::Engine(body),
        };
        self.methods.insert(name.to_string(), Arc::new(info));
        self
    }

    pub fn property(mut self, name: &str, kind: VariantType, setter: &str, getter: &str) -> Self {
        self.properties.push(PropertyRecord {
            name: name.to_string(),
            kind,
            class: None,
            setter: setter.to_string(),
            getter: getter.to_string(),
            usage: gdx_sys::PropertyUsageFlags::DEFAULT.bits(),
        });
        self
    }

    pub fn constant(mut self, name: &str, value: i64) -> Self {
        self.constants.push(ConstantRecord {
            enum_name: String::new(),
            name: name.to_string(),
            value,
            is_bitfield: false,
        });
        self
    }
}

#[derive(Default)]
pub struct ClassDb {
    classes: FxHashMap<String, ClassInfo>,
    /// Unregistered classes; their method binds may still be cached by the bridge.
    retired: Vec<ClassInfo>,
    hash_overrides: FxHashMap<(String, String), i64>,
}

static DB: LazyLock<RwLock<ClassDb>> = LazyLock::new(|| {
    let mut db = ClassDb::default();
    for class in classes::engine_classes() {
        db.classes.insert(class.name.clone(), class);
    }
    RwLock::new(db)
});

/// `get_virtual_call_data` answers, keyed by (class, method).
static VIRTUALS: LazyLock<Mutex<FxHashMap<(String, String), usize>>> =
    LazyLock::new(Default::default);

fn read() -> RwLockReadGuard<'static, ClassDb> {
    DB.read().unwrap_or_else(PoisonError::into_inner)
}

fn write() -> RwLockWriteGuard<'static, ClassDb> {
    DB.write().unwrap_or_else(PoisonError::into_inner)
}

impl ClassDb {
    fn chain(&self, class: &str) -> Vec<&ClassInfo> {
        let mut chain = Vec::new();
        let mut current = self.classes.get(class);
        while let Some(info) = current {
            chain.push(info);
            current = info.parent.as_deref().and_then(|parent| self.classes.get(parent));
        }
        chain
    }
}

// ============================================================================
// Queries
// ============================================================================

pub fn exists(class: &str) -> bool {
    read().classes.contains_key(class)
}

pub fn parent_of(class: &str) -> Option<String> {
    read().classes.get(class).and_then(|info| info.parent.clone())
}

pub fn inherits(class: &str, ancestor: &str) -> bool {
    read().chain(class).iter().any(|info| info.name == ancestor)
}

pub fn is_refcounted(class: &str) -> bool {
    read().classes.get(class).is_some_and(|info| info.refcounted)
}

pub fn find_method(class: &str, method: &str) -> Option<Arc<MethodInfo>> {
    read()
        .chain(class)
        .into_iter()
        .find_map(|info| info.methods.get(method).cloned())
}

/// Hash the engine reports for `class::method`; -1 when unknown.
pub fn method_hash(class: &str, method: &str) -> i64 {
    let db = read();
    if let Some(hash) = db.hash_overrides.get(&(class.to_string(), method.to_string())) {
        return *hash;
    }
    db.chain(class)
        .into_iter()
        .find_map(|info| info.methods.get(method))
        .map_or(-1, |info| info.signature.hash())
}

/// Bind for `class::method` when `hash` matches the reported hash.
pub fn method_bind(class: &str, method: &str, hash: i64) -> Option<Arc<MethodInfo>> {
    let found = find_method(class, method)?;
    let reported = method_hash(class, method);
    if reported != hash {
        hooks::report_error(format!(
            "method bind for {class}::{method} requested with hash {hash}, engine has {reported}"
        ));
        return None;
    }
    Some(found)
}

pub fn override_method_hash(class: &str, method: &str, hash: i64) {
    write()
        .hash_overrides
        .insert((class.to_string(), method.to_string()), hash);
}

/// Properties of `class` and its ancestors, most derived first.
pub fn properties_of(class: &str) -> Vec<PropertyRecord> {
    read()
        .chain(class)
        .into_iter()
        .flat_map(|info| info.properties.iter().cloned())
        .collect()
}

pub fn find_property(class: &str, property: &str) -> Option<PropertyRecord> {
    properties_of(class).into_iter().find(|p| p.name == property)
}

pub fn constant(class: &str, name: &str) -> Option<i64> {
    read()
        .chain(class)
        .into_iter()
        .flat_map(|info| info.constants.iter())
        .find(|c| c.name == name)
        .map(|c| c.value)
}

/// Enum a constant was registered under (empty when it has none) and
/// whether that enum is a bitfield.
pub fn constant_enum(class: &str, name: &str) -> Option<(String, bool)> {
    read()
        .chain(class)
        .into_iter()
        .flat_map(|info| info.constants.iter())
        .find(|c| c.name == name)
        .map(|c| (c.enum_name.clone(), c.is_bitfield))
}

pub fn has_method(class: &str, method: &str) -> bool {
    find_method(class, method).is_some()
}

fn extension_class(class: &str) -> Option<ExtensionClass> {
    read().classes.get(class).and_then(|info| info.extension)
}

/// Extension callbacks and instance attached to object `id`.
fn extension_of(id: u64) -> Option<(ExtensionClass, String, ClassInstancePtr)> {
    let attached = objects::attached(id)?;
    let extension = extension_class(&attached.class)?;
    Some((extension, attached.class, attached.instance as ClassInstancePtr))
}

// ============================================================================
// Invocation
// ============================================================================

fn check_args(method: &MethodInfo, args: &[Var]) -> Result<Vec<Var>, CallError> {
    let declared = &method.signature.args;
    if args.len() < declared.len() {
        return Err(CallError::new(CallErrorType::TooFewArguments, 0, declared.len() as i32));
    }
    if args.len() > declared.len() && !method.signature.is_vararg {
        return Err(CallError::new(CallErrorType::TooManyArguments, 0, declared.len() as i32));
    }

    let mut checked = Vec::with_capacity(args.len());
    for (index, arg) in args.iter().enumerate() {
        let Some(expected) = declared.get(index) else {
            checked.push(arg.clone());
            continue;
        };
        let invalid = || {
            CallError::new(
                CallErrorType::InvalidArgument,
                index as i32,
                expected.kind.sys() as i32,
            )
        };
        let value = match expected.kind {
            VariantType::Nil => arg.clone(),
            VariantType::Object => {
                if !matches!(arg.kind(), VariantType::Object | VariantType::Nil) {
                    return Err(invalid());
                }
                let address = objects::live_address(arg);
                if let (Some(class), Some(id)) = (&expected.class, objects::id_of(address)) {
                    let actual = objects::class_name(id).unwrap_or_default();
                    if !inherits(&actual, class) {
                        return Err(invalid());
                    }
                }
                objects::object_var(address)
            }
            kind => ops::convert(arg, kind).ok_or_else(invalid)?,
        };
        checked.push(value);
    }
    Ok(checked)
}

/// Variant-style call of a bound method.
pub fn call(method: &MethodInfo, this: ObjectPtr, args: &[Var]) -> Result<Var, CallError> {
    if !method.signature.is_static && !objects::is_live_ptr(this) {
        return Err(CallError::new(CallErrorType::InstanceIsNull, 0, 0));
    }
    let args = check_args(method, args)?;
    match &method.body {
        MethodBody::Engine(body) => body(this, &args),
        MethodBody::Extension { userdata, call, .. } => {
            let instance = objects::id_of_ptr(this)
                .and_then(objects::attached)
                .map(|attached| attached.instance as ClassInstancePtr)
                .ok_or(CallError::new(CallErrorType::InstanceIsNull, 0, 0))?;
            let call = call.ok_or(CallError::new(CallErrorType::InvalidMethod, 0, 0))?;
            unsafe { call_extension(call, *userdata, instance, &args) }
        }
    }
}

type CallFn = unsafe extern "C" fn(
    *mut c_void,
    ClassInstancePtr,
    *const *const c_void,
    i64,
    *mut c_void,
    *mut CallError,
);

unsafe fn call_extension(
    call: CallFn,
    userdata: usize,
    instance: ClassInstancePtr,
    args: &[Var],
) -> Result<Var, CallError> {
    let pointers: Vec<*const c_void> = args.iter().map(|arg| (arg as *const Var).cast()).collect();
    // Written in place by the callee; starts as nil so an error path leaks nothing.
    let mut ret = Var::nil();
    let mut error = CallError::OK;
    unsafe {
        call(
            userdata as *mut c_void,
            instance,
            pointers.as_ptr(),
            args.len() as i64,
            (&mut ret as *mut Var).cast(),
            &mut error,
        );
    }
    if error.is_ok() { Ok(ret) } else { Err(error) }
}

/// Pointer-style call of an extension method, marshalling through typed
/// storage the way the engine's own typed callers do.
pub fn ptrcall_extension(method: &MethodInfo, this: ObjectPtr, args: &[Var]) -> Option<Var> {
    let MethodBody::Extension {
        userdata,
        ptrcall: Some(ptrcall),
        ..
    } = &method.body
    else {
        return None;
    };
    let attached = objects::id_of_ptr(this).and_then(objects::attached)?;
    let instance = attached.instance as ClassInstancePtr;
    let args = check_args(method, args).ok()?;
    let kinds: Vec<VariantType> = method.signature.args.iter().map(|a| a.kind).collect();
    let typed_args = TypedArgs::new(&args, &kinds);
    let pointers = typed_args.pointers();
    let mut ret = Slot::new();
    unsafe { ptrcall(*userdata as *mut c_void, instance, pointers.as_ptr(), ret.as_mut_ptr()) };
    Some(match &method.signature.ret {
        Some(ret_type) => unsafe { typed::take_return(ret_type.kind, ret.as_mut_ptr()) },
        None => Var::nil(),
    })
}

// ============================================================================
// Construction and destruction
// ============================================================================

/// Instantiate `class`; extension classes go through their create callback.
pub fn construct(class: &str) -> Result<ObjectPtr, String> {
    let (instantiable, extension) = {
        let db = read();
        let info = db.classes.get(class).ok_or_else(|| format!("class `{class}` does not exist"))?;
        (info.instantiable, info.extension)
    };
    if !instantiable {
        return Err(format!("class `{class}` cannot be instantiated"));
    }
    match extension {
        None => Ok(objects::create(class)),
        Some(extension) => {
            let create = extension
                .info
                .create_instance_func
                .ok_or_else(|| format!("extension class `{class}` has no create callback"))?;
            let object = unsafe { create(extension.info.class_userdata) };
            if let Some(id) = objects::id_of_ptr(object) {
                notify(id, object::NOTIFICATION_POSTINITIALIZE);
            }
            Ok(object)
        }
    }
}

pub fn free_extension_instance(class: &str, instance: ClassInstancePtr) {
    let Some(extension) = extension_class(class) else {
        return;
    };
    if let Some(free) = extension.info.free_instance_func {
        unsafe { free(extension.info.class_userdata, instance) };
    }
}

// ============================================================================
// Notifications and virtual calls
// ============================================================================

/// Deliver `what` to the extension instance of `id`, then dispatch the
/// matching scene virtual.
pub fn notify(id: u64, what: i64) {
    if let Some((extension, _, instance)) = extension_of(id) {
        if let Some(notification) = extension.info.notification_func {
            unsafe { notification(instance, what as i32) };
        }
    }
    let virtual_name = match what {
        node::NOTIFICATION_ENTER_TREE => "_enter_tree",
        node::NOTIFICATION_EXIT_TREE => "_exit_tree",
        node::NOTIFICATION_READY => "_ready",
        _ => return,
    };
    call_virtual(id, virtual_name, &[], None);
}

/// Call virtual `name` on the extension instance of `id` if the extension
/// overrides it. `args` pairs each value with its declared kind.
pub fn call_virtual(
    id: u64,
    name: &str,
    args: &[(Var, VariantType)],
    ret: Option<VariantType>,
) -> Option<Var> {
    let (extension, class, instance) = extension_of(id)?;
    let get_data = extension.info.get_virtual_call_data_func?;
    let call = extension.info.call_virtual_with_data_func?;
    let method_name = Name::intern(name).word();
    let name_ptr = (&method_name as *const usize).cast::<c_void>();

    let key = (class, name.to_string());
    let cached = lock(&VIRTUALS).get(&key).copied();
    let userdata = match cached {
        Some(userdata) => userdata,
        None => {
            let userdata = unsafe { get_data(extension.info.class_userdata, name_ptr) } as usize;
            lock(&VIRTUALS).insert(key, userdata);
            userdata
        }
    };
    if userdata == 0 {
        return None;
    }

    let values: Vec<Var> = args.iter().map(|(value, _)| value.clone()).collect();
    let kinds: Vec<VariantType> = args.iter().map(|(_, kind)| *kind).collect();
    let typed_args = TypedArgs::new(&values, &kinds);
    let pointers = typed_args.pointers();
    let mut slot = Slot::new();
    unsafe {
        call(
            instance,
            name_ptr,
            userdata as *mut c_void,
            pointers.as_ptr(),
            slot.as_mut_ptr(),
        )
    };
    Some(match ret {
        Some(kind) => unsafe { typed::take_return(kind, slot.as_mut_ptr()) },
        None => Var::nil(),
    })
}

pub fn extension_to_string(id: u64) -> Option<String> {
    let (extension, _, instance) = extension_of(id)?;
    let to_string = extension.info.to_string_func?;
    let mut valid = gdx_sys::FALSE;
    let mut word = 0usize;
    unsafe { to_string(instance, &mut valid, (&mut word as *mut usize).cast()) };
    (valid != 0).then(|| unsafe { GStr::from_word(word) }.as_str().to_string())
}

pub fn extension_set(id: u64, property: &str, value: &Var) -> bool {
    let Some((extension, _, instance)) = extension_of(id) else {
        return false;
    };
    let Some(set) = extension.info.set_func else {
        return false;
    };
    let name = Name::intern(property).word();
    unsafe {
        set(
            instance,
            (&name as *const usize).cast(),
            (value as *const Var).cast(),
        ) != 0
    }
}

pub fn extension_get(id: u64, property: &str) -> Option<Var> {
    let (extension, _, instance) = extension_of(id)?;
    let get = extension.info.get_func?;
    let name = Name::intern(property).word();
    let mut ret = Var::nil();
    let found = unsafe {
        get(
            instance,
            (&name as *const usize).cast(),
            (&mut ret as *mut Var).cast(),
        )
    };
    (found != 0).then_some(ret)
}

/// `(name, kind, class, usage)` entries reported by the extension instance.
pub fn extension_property_list(id: u64) -> Vec<PropertyRecord> {
    let Some((extension, _, instance)) = extension_of(id) else {
        return Vec::new();
    };
    let Some(get_list) = extension.info.get_property_list_func else {
        return Vec::new();
    };
    let mut count = 0u32;
    let list = unsafe { get_list(instance, &mut count) };
    if list.is_null() {
        return Vec::new();
    }
    let entries = unsafe { std::slice::from_raw_parts(list, count as usize) };
    let records = entries
        .iter()
        .map(|info| PropertyRecord {
            name: unsafe { crate::abi::name_arg(info.name) }.as_str().to_string(),
            kind: VariantType::from_sys(info.kind),
            class: unsafe { crate::abi::optional_name_arg(info.class_name) }
                .map(|n| n.as_str().to_string()),
            setter: String::new(),
            getter: String::new(),
            usage: info.usage,
        })
        .collect();
    if let Some(free) = extension.info.free_property_list_func {
        unsafe { free(instance, list) };
    }
    records
}

// ============================================================================
// Extension registration
// ============================================================================

pub fn register_extension_class(
    library: usize,
    name: &str,
    parent: &str,
    info: ClassCreationInfo,
) -> i64 {
    let mut db = write();
    if db.classes.contains_key(name) {
        hooks::report_error(format!("class `{name}` is already registered"));
        return code::ERR_ALREADY_EXISTS;
    }
    let Some(parent_info) = db.classes.get(parent) else {
        hooks::report_error(format!("parent class `{parent}` of `{name}` does not exist"));
        return code::ERR_DOES_NOT_EXIST;
    };
    let class = ClassInfo {
        name: name.to_string(),
        parent: Some(parent.to_string()),
        refcounted: parent_info.refcounted,
        instantiable: info.is_abstract == 0 && info.create_instance_func.is_some(),
        methods: FxHashMap::default(),
        properties: Vec::new(),
        constants: Vec::new(),
        extension: Some(ExtensionClass { info, library }),
    };
    db.classes.insert(name.to_string(), class);
    tracing::debug!(class = name, parent, "extension class registered");
    code::OK
}

/// Registration data of an extension method, decoded from the ABI structs.
pub struct ExtensionMethod {
    pub name: String,
    pub userdata: usize,
    pub call: ClassMethodCall,
    pub ptrcall: ClassMethodPtrCall,
    pub flags: gdx_sys::MethodFlags,
    pub args: Vec<ArgType>,
    pub ret: Option<ArgType>,
}

pub fn register_extension_method(class: &str, method: ExtensionMethod) -> i64 {
    let mut db = write();
    let Some(info) = db.classes.get_mut(class) else {
        let method_name = &method.name;
        hooks::report_error(format!(
            "cannot add method `{method_name}` to unknown class `{class}`"
        ));
        return code::ERR_DOES_NOT_EXIST;
    };
    if info.methods.contains_key(&method.name) {
        hooks::report_error(format!("method `{class}::{}` is already registered", method.name));
        return code::ERR_ALREADY_EXISTS;
    }
    let flags = method.flags;
    let signature = Signature::from_parts(
        method.ret,
        method.args,
        flags.contains(gdx_sys::MethodFlags::CONST),
        flags.contains(gdx_sys::MethodFlags::VARARG),
        flags.contains(gdx_sys::MethodFlags::STATIC),
    );
    let bound = MethodInfo {
        class: class.to_string(),
        name: method.name.clone(),
        signature,
        body: MethodBody::Extension {
            userdata: method.userdata,
            call: method.call,
            ptrcall: method.ptrcall,
        },
    };
    tracing::trace!(
        class,
        method = %method.name,
        signature = %bound.signature.text,
        "extension method registered"
    );
    info.methods.insert(method.name, Arc::new(bound));
    code::OK
}

pub fn register_extension_property(class: &str, record: PropertyRecord) -> i64 {
    let getter_exists = has_method(class, &record.getter);
    let setter_exists = record.setter.is_empty() || has_method(class, &record.setter);
    if !getter_exists || !setter_exists {
        hooks::report_error(format!(
            "property `{class}.{}` refers to missing accessor `{}`",
            record.name,
            if getter_exists { &record.setter } else { &record.getter }
        ));
        return code::ERR_DOES_NOT_EXIST;
    }
    let mut db = write();
    match db.classes.get_mut(class) {
        Some(info) => {
            info.properties.push(record);
            code::OK
        }
        None => code::ERR_DOES_NOT_EXIST,
    }
}

pub fn register_extension_constant(class: &str, constant: ConstantRecord) -> i64 {
    let mut db = write();
    match db.classes.get_mut(class) {
        Some(info) => {
            info.constants.push(constant);
            code::OK
        }
        None => code::ERR_DOES_NOT_EXIST,
    }
}

/// Remove an extension class. Only the library that registered it may.
pub fn unregister_extension_class(library: usize, name: &str) -> i64 {
    let mut db = write();
    match db.classes.get(name).map(|info| info.extension) {
        None => {
            hooks::report_error(format!("cannot unregister unknown class `{name}`"));
            return code::ERR_DOES_NOT_EXIST;
        }
        Some(None) => {
            hooks::report_error(format!("cannot unregister engine class `{name}`"));
            return code::ERR_INVALID_PARAMETER;
        }
        Some(Some(extension)) if extension.library != library => {
            hooks::report_error(format!("cannot unregister `{name}`: another library owns it"));
            return code::ERR_INVALID_PARAMETER;
        }
        Some(Some(_)) => {}
    }
    let child = db.classes.values().find(|info| info.parent.as_deref() == Some(name));
    if let Some(child) = child {
        let message = format!("cannot unregister `{name}`: `{}` still inherits it", child.name);
        hooks::report_error(message);
        return code::ERR_INVALID_PARAMETER;
    }
    if let Some(info) = db.classes.remove(name) {
        db.retired.push(info);
    }
    drop(db);
    lock(&VIRTUALS).retain(|(class, _), _| class != name);
    tracing::debug!(class = name, "extension class unregistered");
    code::OK
}

pub fn extension_class_names() -> Vec<String> {
    read()
        .classes
        .values()
        .filter(|info| info.extension.is_some())
        .map(|info| info.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_parse_qualifiers() {
        let sig = Signature::parse("Variant(StringName) vararg");
        assert!(sig.is_vararg);
        assert!(!sig.is_const);
        assert_eq!(sig.args[0].kind, VariantType::StringName);
        assert_eq!(sig.ret.as_ref().map(|r| r.kind), Some(VariantType::Nil));

        let sig = Signature::parse("void()");
        assert!(sig.ret.is_none());
        assert!(sig.args.is_empty());
    }

    #[test]
    fn object_types_keep_their_class() {
        let sig = Signature::parse("FileAccess(String,enum::FileAccess.ModeFlags) static");
        let ret = sig.ret.unwrap();
        assert_eq!(ret.kind, VariantType::Object);
        assert_eq!(ret.class.as_deref(), Some("FileAccess"));
        assert_eq!(sig.args[1].kind, VariantType::Int);
        assert!(sig.is_static);
    }

    #[test]
    fn hashes_match_manifest_values() {
        let get_class = find_method("Object", "get_class").unwrap();
        assert_eq!(signature_hash("String() const"), get_class.signature.hash());
        assert_eq!(method_hash("Object", "get_class"), 3142391475);
        assert_eq!(method_hash("Object", "call"), 1356003741);
        assert_eq!(method_hash("Object", "missing"), -1);
    }

    #[test]
    fn built_signatures_render_canonically() {
        let sig = Signature::from_parts(
            Some(ArgType::parse("int")),
            vec![ArgType::parse("Node"), ArgType::any()],
            true,
            false,
            false,
        );
        assert_eq!(sig.text, "int(Node,Variant) const");
    }

    #[test]
    fn methods_resolve_through_parents() {
        assert!(inherits("ParticleProcessMaterial", "Resource"));
        assert!(find_method("Animation", "get_class").is_some());
        assert!(method_bind("Animation", "add_track", 0).is_none());
    }

    #[test]
    fn argument_checks_report_call_errors() {
        let method = find_method("Object", "is_class").unwrap();
        let err = check_args(&method, &[]).unwrap_err();
        assert_eq!(err.kind(), CallErrorType::TooFewArguments);
        assert_eq!(err.expected, 1);

        let err = check_args(&method, &[Var::from_int(1)]).unwrap_err();
        assert_eq!(err.kind(), CallErrorType::InvalidArgument);
        assert_eq!(err.argument, 0);
        assert_eq!(err.expected, VariantType::String.sys() as i32);

        let err = check_args(&method, &[Var::from_str("a"), Var::from_str("b")]).unwrap_err();
        assert_eq!(err.kind(), CallErrorType::TooManyArguments);
    }

    #[test]
    fn only_the_owning_library_unregisters_a_class() {
        let info: ClassCreationInfo = unsafe { std::mem::zeroed() };
        assert_eq!(register_extension_class(0x10, "OwnedWidget", "RefCounted", info), code::OK);
        let constant = ConstantRecord {
            enum_name: "Mode".to_string(),
            name: "MODE_FAST".to_string(),
            value: 2,
            is_bitfield: true,
        };
        assert_eq!(register_extension_constant("OwnedWidget", constant), code::OK);
        assert_eq!(constant_enum("OwnedWidget", "MODE_FAST"), Some(("Mode".to_string(), true)));

        assert_eq!(unregister_extension_class(0x20, "OwnedWidget"), code::ERR_INVALID_PARAMETER);
        assert!(exists("OwnedWidget"));
        assert_eq!(unregister_extension_class(0x10, "OwnedWidget"), code::OK);
        assert!(!exists("OwnedWidget"));
    }
}
