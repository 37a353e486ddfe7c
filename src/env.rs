//! Thin wrapper around the JNI environment.
//!
//! Only the calls the bridge makes are wrapped. Lookups and constructors
//! return `Option` (null means the JVM refused, usually with an exception
//! pending); status-returning calls return `Result<(), jint>`.
//!
//! Strings cross the boundary as UTF-16 (`NewString` / `GetStringChars`), so
//! embedded NULs and supplementary characters survive unchanged.
//!
//! # Reference Guards
//!
//! - [`LocalRef`] deletes a local reference when dropped
//! - [`GlobalRef`] deletes a global reference when dropped, from whichever
//!   attached thread drops it
//!
//! ```rust,ignore
//! let class = LocalRef::new(&env, env.find_class("java/util/HashMap")?);
//! let init = env.get_method_id(class.get(), "<init>", "()V")?;
//! // class is deleted here
//! ```

use crate::sys::jni;
use std::ffi::CString;
use std::ptr;

/// Wrapper around a `JNIEnv*` for the current thread.
///
/// A `JniEnv` is only valid on the thread it was obtained on.
pub struct JniEnv {
    env: *mut jni::JNIEnv,
}

impl JniEnv {
    /// # Safety
    ///
    /// The pointer must be a valid `JNIEnv*` belonging to the current thread.
    pub unsafe fn from_raw(env: *mut jni::JNIEnv) -> Self {
        JniEnv { env }
    }

    /// The VM this environment belongs to.
    pub fn get_java_vm(&self) -> Option<*mut jni::JavaVM> {
        let mut vm: *mut jni::JavaVM = ptr::null_mut();
        let res = unsafe { crate::jni_call!(self.env, GetJavaVM, &mut vm) };
        if res == jni::JNI_OK && !vm.is_null() { Some(vm) } else { None }
    }

    // =========================================================================
    // Classes and methods
    // =========================================================================

    /// Finds a class by binary name (`java/util/HashMap`).
    pub fn find_class(&self, name: &str) -> Option<jni::jclass> {
        let c_name = CString::new(name).ok()?;
        let cls = unsafe { crate::jni_call!(self.env, FindClass, c_name.as_ptr()) };
        if cls.is_null() { None } else { Some(cls) }
    }

    pub fn get_method_id(&self, cls: jni::jclass, name: &str, sig: &str) -> Option<jni::jmethodID> {
        let c_name = CString::new(name).ok()?;
        let c_sig = CString::new(sig).ok()?;
        let mid = unsafe { crate::jni_call!(self.env, GetMethodID, cls, c_name.as_ptr(), c_sig.as_ptr()) };
        if mid.is_null() { None } else { Some(mid) }
    }

    pub fn get_static_method_id(&self, cls: jni::jclass, name: &str, sig: &str) -> Option<jni::jmethodID> {
        let c_name = CString::new(name).ok()?;
        let c_sig = CString::new(sig).ok()?;
        let mid =
            unsafe { crate::jni_call!(self.env, GetStaticMethodID, cls, c_name.as_ptr(), c_sig.as_ptr()) };
        if mid.is_null() { None } else { Some(mid) }
    }

    pub fn is_instance_of(&self, obj: jni::jobject, cls: jni::jclass) -> bool {
        unsafe { crate::jni_call!(self.env, IsInstanceOf, obj, cls) != 0 }
    }

    // =========================================================================
    // Exceptions
    // =========================================================================

    pub fn exception_check(&self) -> bool {
        unsafe { crate::jni_call!(self.env, ExceptionCheck) != 0 }
    }

    pub fn exception_occurred(&self) -> Option<jni::jthrowable> {
        let exc = unsafe { crate::jni_call!(self.env, ExceptionOccurred) };
        if exc.is_null() { None } else { Some(exc) }
    }

    pub fn exception_clear(&self) {
        unsafe { crate::jni_call!(self.env, ExceptionClear) }
    }

    // =========================================================================
    // Strings
    // =========================================================================

    /// Creates a Java string from UTF-8 text.
    pub fn new_string(&self, s: &str) -> Option<jni::jstring> {
        let units: Vec<jni::jchar> = s.encode_utf16().collect();
        let jstr = unsafe {
            crate::jni_call!(self.env, NewString, units.as_ptr(), units.len() as jni::jsize)
        };
        if jstr.is_null() { None } else { Some(jstr) }
    }

    /// Copies a Java string into a Rust string.
    ///
    /// Returns `None` for a null reference. Unpaired surrogates are replaced
    /// with U+FFFD.
    pub fn get_string(&self, s: jni::jstring) -> Option<String> {
        if s.is_null() {
            return None;
        }
        unsafe {
            let len = crate::jni_call!(self.env, GetStringLength, s);
            let chars = crate::jni_call!(self.env, GetStringChars, s, ptr::null_mut());
            if chars.is_null() {
                return None;
            }
            let units = std::slice::from_raw_parts(chars, len.max(0) as usize);
            let result = String::from_utf16_lossy(units);
            crate::jni_call!(self.env, ReleaseStringChars, s, chars);
            Some(result)
        }
    }

    // =========================================================================
    // Objects and references
    // =========================================================================

    pub fn new_object(&self, cls: jni::jclass, method_id: jni::jmethodID, args: &[jni::jvalue]) -> Option<jni::jobject> {
        let obj = unsafe { crate::jni_call!(self.env, NewObjectA, cls, method_id, args.as_ptr()) };
        if obj.is_null() { None } else { Some(obj) }
    }

    pub fn new_global_ref(&self, obj: jni::jobject) -> jni::jobject {
        unsafe { crate::jni_call!(self.env, NewGlobalRef, obj) }
    }

    pub fn delete_global_ref(&self, obj: jni::jobject) {
        unsafe { crate::jni_call!(self.env, DeleteGlobalRef, obj) }
    }

    pub fn delete_local_ref(&self, obj: jni::jobject) {
        unsafe { crate::jni_call!(self.env, DeleteLocalRef, obj) }
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    pub fn get_array_length(&self, array: jni::jarray) -> jni::jsize {
        unsafe { crate::jni_call!(self.env, GetArrayLength, array) }
    }

    pub fn new_object_array(&self, length: jni::jsize, cls: jni::jclass) -> Option<jni::jobjectArray> {
        let arr = unsafe { crate::jni_call!(self.env, NewObjectArray, length, cls, ptr::null_mut()) };
        if arr.is_null() { None } else { Some(arr) }
    }

    pub fn get_object_array_element(&self, array: jni::jobjectArray, index: jni::jsize) -> jni::jobject {
        unsafe { crate::jni_call!(self.env, GetObjectArrayElement, array, index) }
    }

    pub fn set_object_array_element(&self, array: jni::jobjectArray, index: jni::jsize, value: jni::jobject) {
        unsafe { crate::jni_call!(self.env, SetObjectArrayElement, array, index, value) }
    }

    pub fn new_byte_array(&self, length: jni::jsize) -> Option<jni::jbyteArray> {
        let arr = unsafe { crate::jni_call!(self.env, NewByteArray, length) };
        if arr.is_null() { None } else { Some(arr) }
    }

    pub fn get_byte_array_region(&self, array: jni::jbyteArray, start: jni::jsize, buf: &mut [u8]) {
        unsafe {
            crate::jni_call!(
                self.env,
                GetByteArrayRegion,
                array,
                start,
                buf.len() as jni::jsize,
                buf.as_mut_ptr() as *mut jni::jbyte
            )
        }
    }

    pub fn set_byte_array_region(&self, array: jni::jbyteArray, start: jni::jsize, buf: &[u8]) {
        unsafe {
            crate::jni_call!(
                self.env,
                SetByteArrayRegion,
                array,
                start,
                buf.len() as jni::jsize,
                buf.as_ptr() as *const jni::jbyte
            )
        }
    }

    // =========================================================================
    // Method calls
    // =========================================================================

    pub fn call_void_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) {
        unsafe { crate::jni_call!(self.env, CallVoidMethodA, obj, method_id, args.as_ptr()) }
    }

    pub fn call_int_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jint {
        unsafe { crate::jni_call!(self.env, CallIntMethodA, obj, method_id, args.as_ptr()) }
    }

    pub fn call_object_method(&self, obj: jni::jobject, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jobject {
        unsafe { crate::jni_call!(self.env, CallObjectMethodA, obj, method_id, args.as_ptr()) }
    }

    pub fn call_static_object_method(&self, cls: jni::jclass, method_id: jni::jmethodID, args: &[jni::jvalue]) -> jni::jobject {
        unsafe { crate::jni_call!(self.env, CallStaticObjectMethodA, cls, method_id, args.as_ptr()) }
    }

    // =========================================================================
    // Native method registration
    // =========================================================================

    pub fn register_natives(&self, cls: jni::jclass, methods: &[jni::JNINativeMethod]) -> Result<(), jni::jint> {
        let result = unsafe {
            crate::jni_call!(self.env, RegisterNatives, cls, methods.as_ptr(), methods.len() as jni::jint)
        };
        if result == 0 { Ok(()) } else { Err(result) }
    }

    pub fn unregister_natives(&self, cls: jni::jclass) -> Result<(), jni::jint> {
        let result = unsafe { crate::jni_call!(self.env, UnregisterNatives, cls) };
        if result == 0 { Ok(()) } else { Err(result) }
    }
}

/// Deletes a local reference when dropped.
pub struct LocalRef<'a> {
    env: &'a JniEnv,
    obj: jni::jobject,
}

impl<'a> LocalRef<'a> {
    pub fn new(env: &'a JniEnv, obj: jni::jobject) -> Self {
        LocalRef { env, obj }
    }

    pub fn get(&self) -> jni::jobject {
        self.obj
    }

    pub fn is_null(&self) -> bool {
        self.obj.is_null()
    }
}

impl<'a> Drop for LocalRef<'a> {
    fn drop(&mut self) {
        if !self.obj.is_null() {
            self.env.delete_local_ref(self.obj);
        }
    }
}

/// A global reference that outlives the local frame it was created in.
///
/// On drop the reference is deleted through the environment of the dropping
/// thread, which must be attached to the same VM. Global references must be
/// dropped before the VM is destroyed.
pub struct GlobalRef {
    vm: *mut jni::JavaVM,
    obj: jni::jobject,
}

impl GlobalRef {
    /// Promotes `local_obj` to a global reference. The local reference itself
    /// is left alone.
    pub fn new(env: &JniEnv, local_obj: jni::jobject) -> Option<Self> {
        if local_obj.is_null() {
            return None;
        }
        let vm = env.get_java_vm()?;
        let obj = env.new_global_ref(local_obj);
        if obj.is_null() {
            return None;
        }
        Some(GlobalRef { vm, obj })
    }

    pub fn get(&self) -> jni::jobject {
        self.obj
    }
}

impl Drop for GlobalRef {
    fn drop(&mut self) {
        if self.obj.is_null() || self.vm.is_null() {
            return;
        }
        let mut env_ptr: *mut std::os::raw::c_void = ptr::null_mut();
        let res = unsafe { crate::jvm_call!(self.vm, GetEnv, &mut env_ptr, jni::JNI_VERSION_1_6) };
        if res == jni::JNI_OK && !env_ptr.is_null() {
            let env = unsafe { JniEnv::from_raw(env_ptr as *mut jni::JNIEnv) };
            env.delete_global_ref(self.obj);
        } else {
            log::warn!("leaking global reference: dropping thread is not attached to the JVM");
        }
    }
}

// Global references and the VM pointer are valid on every attached thread;
// deletion goes through the dropping thread's own environment.
unsafe impl Send for GlobalRef {}
unsafe impl Sync for GlobalRef {}
