//! An in-process stand-in for the JVM.
//!
//! The JNI function tables are real; what sits behind them is a small object
//! heap per test thread that knows the handful of classes the bridge talks
//! to: `String`, `HashMap`, the string wrapper and the dispatch class.

use std::cell::RefCell;
use std::collections::HashSet;
use std::ffi::{c_void, CStr};
use std::mem::MaybeUninit;
use std::os::raw::c_char;
use std::ptr::{self, addr_of_mut};
use std::sync::OnceLock;

use jvm_external::config::{DEFAULT_EXTERNAL_STRING_CLASS, DEFAULT_HOST_BRIDGE_CLASS};
use jvm_external::env::JniEnv;
use jvm_external::sys::jni::*;

const STRING_CLASS: &str = "java/lang/String";
const HASH_MAP_CLASS: &str = "java/util/HashMap";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Obj {
    Class(String),
    Str(Vec<u16>),
    Bytes(Vec<i8>),
    Array(Vec<jobject>),
    Wrapper(Vec<u8>),
    Map(Vec<(String, Vec<u8>)>),
    Throwable(String),
    Dispatcher,
}

struct Method {
    name: String,
}

/// Objects live until the heap is reset; references are never collected.
#[derive(Default)]
pub struct Heap {
    objects: Vec<Obj>,
    methods: Vec<Method>,
    pending: Option<jobject>,

    /// Class names, or `class.method`, that lookups fail for.
    pub missing: HashSet<String>,
    /// getExceptionText throws instead of rendering.
    pub render_throws: bool,
    /// getInstance returns null.
    pub no_instance: bool,
    /// NewByteArray throws OutOfMemoryError.
    pub fail_byte_arrays: bool,
    /// getLength reports this instead of the real length.
    pub wrapper_length: Option<jint>,
    pub fail_create: bool,
    pub fail_destroy: bool,

    pub created_with: Vec<String>,
    pub calls: Vec<String>,
    pub registered: Vec<String>,
    pub unregistered: usize,
    pub globals: isize,
    pub destroyed: usize,
}

impl Heap {
    pub fn alloc(&mut self, obj: Obj) -> jobject {
        self.objects.push(obj);
        self.objects.len() as jobject
    }

    fn slot(obj: jobject) -> Option<usize> {
        (obj as usize).checked_sub(1)
    }

    pub fn get(&self, obj: jobject) -> Option<&Obj> {
        Self::slot(obj).and_then(|i| self.objects.get(i))
    }

    fn get_mut(&mut self, obj: jobject) -> Option<&mut Obj> {
        Self::slot(obj).and_then(move |i| self.objects.get_mut(i))
    }

    pub fn text(&self, obj: jobject) -> Option<String> {
        match self.get(obj) {
            Some(Obj::Str(units)) => Some(String::from_utf16_lossy(units)),
            _ => None,
        }
    }

    pub fn new_text(&mut self, text: &str) -> jobject {
        self.alloc(Obj::Str(text.encode_utf16().collect()))
    }

    fn class_name(&self, cls: jclass) -> Option<String> {
        match self.get(cls) {
            Some(Obj::Class(name)) => Some(name.clone()),
            _ => None,
        }
    }

    fn strings(&self, array: jobject) -> Vec<String> {
        match self.get(array) {
            Some(Obj::Array(items)) => items.iter().map(|&i| self.text(i).unwrap_or_default()).collect(),
            _ => Vec::new(),
        }
    }

    fn method_name(&self, mid: jmethodID) -> String {
        (mid as usize)
            .checked_sub(1)
            .and_then(|i| self.methods.get(i))
            .map(|m| m.name.clone())
            .unwrap_or_default()
    }

    pub fn throw(&mut self, message: impl Into<String>) {
        let throwable = self.alloc(Obj::Throwable(message.into()));
        self.pending = Some(throwable);
    }

    pub fn pending(&self) -> bool {
        self.pending.is_some()
    }

    fn lookup(&mut self, cls: jclass, name: &str) -> jmethodID {
        let Some(class) = self.class_name(cls) else {
            return ptr::null_mut();
        };
        if self.missing.contains(&format!("{class}.{name}")) {
            self.throw(format!("java.lang.NoSuchMethodError: {name}"));
            return ptr::null_mut();
        }
        self.methods.push(Method { name: name.to_string() });
        self.methods.len() as jmethodID
    }
}

thread_local! {
    static HEAP: RefCell<Heap> = RefCell::new(Heap::default());
}

pub fn with_heap<R>(f: impl FnOnce(&mut Heap) -> R) -> R {
    HEAP.with(|heap| f(&mut heap.borrow_mut()))
}

/// Start the current thread over with an empty heap.
pub fn reset() {
    with_heap(|heap| *heap = Heap::default());
}

/// A fresh heap and an environment over it.
pub fn fresh_env() -> JniEnv {
    reset();
    unsafe { JniEnv::from_raw(env_ptr()) }
}

unsafe fn arg(args: *const jvalue, index: usize) -> jobject {
    (*args.add(index)).l
}

unsafe fn c_text(text: *const c_char) -> String {
    CStr::from_ptr(text).to_string_lossy().into_owned()
}

// =============================================================================
// JNIEnv
// =============================================================================

unsafe extern "system" fn find_class(_env: *mut JNIEnv, name: *const c_char) -> jclass {
    let name = c_text(name);
    with_heap(|h| {
        if h.missing.contains(&name) {
            h.throw(format!("java.lang.NoClassDefFoundError: {name}"));
            return ptr::null_mut();
        }
        h.alloc(Obj::Class(name))
    })
}

unsafe extern "system" fn exception_occurred(_env: *mut JNIEnv) -> jthrowable {
    with_heap(|h| h.pending.unwrap_or(ptr::null_mut()))
}

unsafe extern "system" fn exception_clear(_env: *mut JNIEnv) {
    with_heap(|h| h.pending = None);
}

unsafe extern "system" fn exception_check(_env: *mut JNIEnv) -> jboolean {
    with_heap(|h| if h.pending() { JNI_TRUE } else { JNI_FALSE })
}

unsafe extern "system" fn new_global_ref(_env: *mut JNIEnv, obj: jobject) -> jobject {
    if !obj.is_null() {
        with_heap(|h| h.globals += 1);
    }
    obj
}

unsafe extern "system" fn delete_global_ref(_env: *mut JNIEnv, _obj: jobject) {
    with_heap(|h| h.globals -= 1);
}

unsafe extern "system" fn delete_local_ref(_env: *mut JNIEnv, _obj: jobject) {}

unsafe extern "system" fn new_object_a(_env: *mut JNIEnv, cls: jclass, _mid: jmethodID, args: *const jvalue) -> jobject {
    with_heap(|h| match h.class_name(cls).as_deref() {
        Some(HASH_MAP_CLASS) => h.alloc(Obj::Map(Vec::new())),
        Some(DEFAULT_EXTERNAL_STRING_CLASS) => {
            let bytes = match h.get(arg(args, 0)) {
                Some(Obj::Bytes(bytes)) => bytes.iter().map(|&b| b as u8).collect(),
                _ => {
                    h.throw("java.lang.NullPointerException");
                    return ptr::null_mut();
                }
            };
            h.alloc(Obj::Wrapper(bytes))
        }
        _ => ptr::null_mut(),
    })
}

unsafe extern "system" fn is_instance_of(_env: *mut JNIEnv, obj: jobject, cls: jclass) -> jboolean {
    with_heap(|h| {
        let kind = match h.get(obj) {
            Some(Obj::Str(_)) => STRING_CLASS,
            Some(Obj::Wrapper(_)) => DEFAULT_EXTERNAL_STRING_CLASS,
            Some(Obj::Map(_)) => HASH_MAP_CLASS,
            _ => return JNI_FALSE,
        };
        if h.class_name(cls).as_deref() == Some(kind) { JNI_TRUE } else { JNI_FALSE }
    })
}

unsafe extern "system" fn get_method_id(_env: *mut JNIEnv, cls: jclass, name: *const c_char, _sig: *const c_char) -> jmethodID {
    let name = c_text(name);
    with_heap(|h| h.lookup(cls, &name))
}

unsafe extern "system" fn get_static_method_id(
    env: *mut JNIEnv,
    cls: jclass,
    name: *const c_char,
    sig: *const c_char,
) -> jmethodID {
    get_method_id(env, cls, name, sig)
}

unsafe extern "system" fn call_object_method_a(_env: *mut JNIEnv, obj: jobject, mid: jmethodID, args: *const jvalue) -> jobject {
    with_heap(|h| {
        let method = h.method_name(mid);
        match method.as_str() {
            "getBytes" => {
                let bytes = match h.get(obj) {
                    Some(Obj::Wrapper(bytes)) => bytes.iter().map(|&b| b as i8).collect(),
                    _ => return ptr::null_mut(),
                };
                h.alloc(Obj::Bytes(bytes))
            }
            "put" => {
                let key = h.text(arg(args, 0)).unwrap_or_default();
                let value = match h.get(arg(args, 1)) {
                    Some(Obj::Wrapper(bytes)) => bytes.clone(),
                    _ => Vec::new(),
                };
                if let Some(Obj::Map(entries)) = h.get_mut(obj) {
                    entries.push((key, value));
                }
                ptr::null_mut()
            }
            "getExternalLibraries" => h.new_text("/opt/xlibs/math.jar"),
            "getExternalPackages" => h.new_text("com.example.math"),
            "getExternalCommands" => h.new_text("beep\nlog"),
            "getExternalFunctions" => ptr::null_mut(),
            "callExternalCommand" | "callExternalFunction" => {
                let name = h.text(arg(args, 0)).unwrap_or_default();
                let params = h.strings(arg(args, 1));
                h.calls.push(format!("{method} {name} {}", params.join(",")));
                match name.as_str() {
                    "square" => match params.first().and_then(|p| p.parse::<i64>().ok()) {
                        Some(n) => h.new_text(&(n * n).to_string()),
                        None => {
                            h.throw("java.lang.NumberFormatException");
                            ptr::null_mut()
                        }
                    },
                    "echo" => h.new_text(&params.join(",")),
                    "throw" => {
                        h.throw("java.lang.IllegalStateException: boom");
                        ptr::null_mut()
                    }
                    _ => ptr::null_mut(),
                }
            }
            _ => ptr::null_mut(),
        }
    })
}

unsafe extern "system" fn call_int_method_a(_env: *mut JNIEnv, obj: jobject, mid: jmethodID, _args: *const jvalue) -> jint {
    with_heap(|h| match (h.method_name(mid).as_str(), h.get(obj)) {
        ("getLength", Some(Obj::Wrapper(bytes))) => h.wrapper_length.unwrap_or(bytes.len() as jint),
        _ => 0,
    })
}

unsafe extern "system" fn call_void_method_a(_env: *mut JNIEnv, _obj: jobject, mid: jmethodID, args: *const jvalue) {
    with_heap(|h| {
        let method = h.method_name(mid);
        let path = h.text(arg(args, 0)).unwrap_or_default();
        h.calls.push(format!("{method} {path}"));
        if path.ends_with(".missing") {
            h.throw(format!("java.io.FileNotFoundException: {path}"));
        }
    })
}

unsafe extern "system" fn call_static_object_method_a(
    _env: *mut JNIEnv,
    _cls: jclass,
    mid: jmethodID,
    args: *const jvalue,
) -> jobject {
    with_heap(|h| match h.method_name(mid).as_str() {
        "getInstance" if h.no_instance => ptr::null_mut(),
        "getInstance" => h.alloc(Obj::Dispatcher),
        "getExceptionText" => {
            if h.render_throws {
                h.throw("java.lang.StackOverflowError");
                return ptr::null_mut();
            }
            let message = match h.get(arg(args, 0)) {
                Some(Obj::Throwable(message)) => message.clone(),
                _ => return ptr::null_mut(),
            };
            h.new_text(&format!("{message}\n\tat Fake.call(Fake.java:1)"))
        }
        _ => ptr::null_mut(),
    })
}

unsafe extern "system" fn new_string(_env: *mut JNIEnv, unicode: *const jchar, len: jsize) -> jstring {
    let units = if len > 0 {
        std::slice::from_raw_parts(unicode, len as usize).to_vec()
    } else {
        Vec::new()
    };
    with_heap(|h| h.alloc(Obj::Str(units)))
}

unsafe extern "system" fn get_string_length(_env: *mut JNIEnv, s: jstring) -> jsize {
    with_heap(|h| match h.get(s) {
        Some(Obj::Str(units)) => units.len() as jsize,
        _ => 0,
    })
}

unsafe extern "system" fn get_string_chars(_env: *mut JNIEnv, s: jstring, _is_copy: *mut jboolean) -> *const jchar {
    // The buffer belongs to the heap object, which outlives the caller's use.
    with_heap(|h| match h.get(s) {
        Some(Obj::Str(units)) => units.as_ptr(),
        _ => ptr::null(),
    })
}

unsafe extern "system" fn release_string_chars(_env: *mut JNIEnv, _s: jstring, _chars: *const jchar) {}

unsafe extern "system" fn get_array_length(_env: *mut JNIEnv, array: jarray) -> jsize {
    with_heap(|h| match h.get(array) {
        Some(Obj::Array(items)) => items.len() as jsize,
        Some(Obj::Bytes(bytes)) => bytes.len() as jsize,
        _ => 0,
    })
}

unsafe extern "system" fn new_object_array(_env: *mut JNIEnv, len: jsize, _cls: jclass, init: jobject) -> jobjectArray {
    with_heap(|h| h.alloc(Obj::Array(vec![init; len.max(0) as usize])))
}

unsafe extern "system" fn get_object_array_element(_env: *mut JNIEnv, array: jobjectArray, index: jsize) -> jobject {
    with_heap(|h| match h.get(array) {
        Some(Obj::Array(items)) => items.get(index as usize).copied().unwrap_or(ptr::null_mut()),
        _ => ptr::null_mut(),
    })
}

unsafe extern "system" fn set_object_array_element(_env: *mut JNIEnv, array: jobjectArray, index: jsize, val: jobject) {
    with_heap(|h| {
        if let Some(Obj::Array(items)) = h.get_mut(array) {
            if let Some(slot) = items.get_mut(index as usize) {
                *slot = val;
            }
        }
    })
}

unsafe extern "system" fn new_byte_array(_env: *mut JNIEnv, len: jsize) -> jbyteArray {
    with_heap(|h| {
        if h.fail_byte_arrays {
            h.throw("java.lang.OutOfMemoryError");
            return ptr::null_mut();
        }
        h.alloc(Obj::Bytes(vec![0; len.max(0) as usize]))
    })
}

unsafe extern "system" fn get_byte_array_region(_env: *mut JNIEnv, array: jbyteArray, start: jsize, len: jsize, buf: *mut jbyte) {
    with_heap(|h| {
        let range = start as usize..(start + len) as usize;
        let copied = match h.get(array) {
            Some(Obj::Bytes(bytes)) if range.end <= bytes.len() => {
                ptr::copy_nonoverlapping(bytes[range].as_ptr(), buf, len as usize);
                true
            }
            _ => false,
        };
        if !copied {
            h.throw("java.lang.ArrayIndexOutOfBoundsException");
        }
    })
}

unsafe extern "system" fn set_byte_array_region(_env: *mut JNIEnv, array: jbyteArray, start: jsize, len: jsize, buf: *const jbyte) {
    with_heap(|h| {
        let range = start as usize..(start + len) as usize;
        let copied = match h.get_mut(array) {
            Some(Obj::Bytes(bytes)) if range.end <= bytes.len() => {
                bytes[range].copy_from_slice(std::slice::from_raw_parts(buf, len as usize));
                true
            }
            _ => false,
        };
        if !copied {
            h.throw("java.lang.ArrayIndexOutOfBoundsException");
        }
    })
}

unsafe extern "system" fn register_natives(_env: *mut JNIEnv, _cls: jclass, methods: *const JNINativeMethod, n: jint) -> jint {
    let names: Vec<String> = (0..n.max(0) as usize).map(|i| c_text((*methods.add(i)).name)).collect();
    with_heap(|h| h.registered = names);
    JNI_OK
}

unsafe extern "system" fn unregister_natives(_env: *mut JNIEnv, _cls: jclass) -> jint {
    with_heap(|h| h.unregistered += 1);
    JNI_OK
}

unsafe extern "system" fn get_java_vm(_env: *mut JNIEnv, vm: *mut *mut JavaVM) -> jint {
    *vm = vm_ptr();
    JNI_OK
}

fn native_interface() -> JNINativeInterface_ {
    // Every typed slot is filled below; the opaque ones stay null.
    let mut table = MaybeUninit::<JNINativeInterface_>::zeroed();
    let t = table.as_mut_ptr();
    unsafe {
        addr_of_mut!((*t).FindClass).write(find_class);
        addr_of_mut!((*t).ExceptionOccurred).write(exception_occurred);
        addr_of_mut!((*t).ExceptionClear).write(exception_clear);
        addr_of_mut!((*t).NewGlobalRef).write(new_global_ref);
        addr_of_mut!((*t).DeleteGlobalRef).write(delete_global_ref);
        addr_of_mut!((*t).DeleteLocalRef).write(delete_local_ref);
        addr_of_mut!((*t).NewObjectA).write(new_object_a);
        addr_of_mut!((*t).IsInstanceOf).write(is_instance_of);
        addr_of_mut!((*t).GetMethodID).write(get_method_id);
        addr_of_mut!((*t).CallObjectMethodA).write(call_object_method_a);
        addr_of_mut!((*t).CallIntMethodA).write(call_int_method_a);
        addr_of_mut!((*t).CallVoidMethodA).write(call_void_method_a);
        addr_of_mut!((*t).GetStaticMethodID).write(get_static_method_id);
        addr_of_mut!((*t).CallStaticObjectMethodA).write(call_static_object_method_a);
        addr_of_mut!((*t).NewString).write(new_string);
        addr_of_mut!((*t).GetStringLength).write(get_string_length);
        addr_of_mut!((*t).GetStringChars).write(get_string_chars);
        addr_of_mut!((*t).ReleaseStringChars).write(release_string_chars);
        addr_of_mut!((*t).GetArrayLength).write(get_array_length);
        addr_of_mut!((*t).NewObjectArray).write(new_object_array);
        addr_of_mut!((*t).GetObjectArrayElement).write(get_object_array_element);
        addr_of_mut!((*t).SetObjectArrayElement).write(set_object_array_element);
        addr_of_mut!((*t).NewByteArray).write(new_byte_array);
        addr_of_mut!((*t).GetByteArrayRegion).write(get_byte_array_region);
        addr_of_mut!((*t).SetByteArrayRegion).write(set_byte_array_region);
        addr_of_mut!((*t).RegisterNatives).write(register_natives);
        addr_of_mut!((*t).UnregisterNatives).write(unregister_natives);
        addr_of_mut!((*t).GetJavaVM).write(get_java_vm);
        addr_of_mut!((*t).ExceptionCheck).write(exception_check);
        table.assume_init()
    }
}

// =============================================================================
// JavaVM
// =============================================================================

unsafe extern "system" fn destroy_java_vm(_vm: *mut JavaVM) -> jint {
    with_heap(|h| {
        h.destroyed += 1;
        if h.fail_destroy { JNI_ERR } else { JNI_OK }
    })
}

unsafe extern "system" fn attach_current_thread(_vm: *mut JavaVM, penv: *mut *mut c_void, _args: *mut c_void) -> jint {
    *penv = env_ptr() as *mut c_void;
    JNI_OK
}

unsafe extern "system" fn detach_current_thread(_vm: *mut JavaVM) -> jint {
    JNI_OK
}

unsafe extern "system" fn get_env(_vm: *mut JavaVM, penv: *mut *mut c_void, _version: jint) -> jint {
    *penv = env_ptr() as *mut c_void;
    JNI_OK
}

fn invoke_interface() -> JNIInvokeInterface_ {
    JNIInvokeInterface_ {
        reserved0: ptr::null_mut(),
        reserved1: ptr::null_mut(),
        reserved2: ptr::null_mut(),
        DestroyJavaVM: destroy_java_vm,
        AttachCurrentThread: attach_current_thread,
        DetachCurrentThread: detach_current_thread,
        GetEnv: get_env,
        AttachCurrentThreadAsDaemon: attach_current_thread,
    }
}

/// Addresses of the leaked `JNIEnv` and `JavaVM` slots, shared by all threads.
fn tables() -> (usize, usize) {
    static TABLES: OnceLock<(usize, usize)> = OnceLock::new();
    *TABLES.get_or_init(|| {
        let native: &'static JNINativeInterface_ = Box::leak(Box::new(native_interface()));
        let env: &'static mut JNIEnv = Box::leak(Box::new(native as *const JNINativeInterface_));
        let invoke: &'static JNIInvokeInterface_ = Box::leak(Box::new(invoke_interface()));
        let vm: &'static mut JavaVM = Box::leak(Box::new(invoke as *const JNIInvokeInterface_));
        (env as *mut JNIEnv as usize, vm as *mut JavaVM as usize)
    })
}

pub fn env_ptr() -> *mut JNIEnv {
    tables().0 as *mut JNIEnv
}

pub fn vm_ptr() -> *mut JavaVM {
    tables().1 as *mut JavaVM
}

/// `JNI_CreateJavaVM` over the current thread's heap. The options are kept
/// in [`Heap::created_with`].
pub unsafe extern "system" fn create_java_vm(pvm: *mut *mut JavaVM, penv: *mut *mut JNIEnv, args: *mut JavaVMInitArgs) -> jint {
    let args = &*args;
    let options: Vec<String> = (0..args.nOptions.max(0) as usize)
        .map(|i| c_text((*args.options.add(i)).optionString))
        .collect();
    let fail = with_heap(|h| {
        h.created_with = options;
        h.fail_create
    });
    if fail {
        return JNI_ERR;
    }
    *pvm = vm_ptr();
    *penv = env_ptr();
    JNI_OK
}

/// The dispatch class name the fake recognises by default.
pub fn host_bridge_class() -> &'static str {
    DEFAULT_HOST_BRIDGE_CLASS
}
