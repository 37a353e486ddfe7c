//! Cached class handles and method IDs.
//!
//! Both caches are resolved once while the JVM is loading and dropped while it
//! unloads. Resolution is all-or-nothing: the first missing class or method
//! aborts with a message naming it, and whatever was already resolved is
//! released by the guards it lives in.

use std::ffi::CString;

use crate::callbacks;
use crate::config::BridgeConfig;
use crate::env::{GlobalRef, JniEnv, LocalRef};
use crate::error::BridgeError;
use crate::sys::jni;

const STRING_CLASS: &str = "java/lang/String";
const HASH_MAP_CLASS: &str = "java/util/HashMap";
const THROWABLE_TO_STRING: &str = "(Ljava/lang/Throwable;)Ljava/lang/String;";
const STRING_TO_VOID: &str = "(Ljava/lang/String;)V";
const TO_STRING: &str = "()Ljava/lang/String;";
const CALL_SIGNATURE: &str = "(Ljava/lang/String;[Ljava/lang/String;)Ljava/lang/String;";

/// Find `name` and promote it to a global reference.
fn global_class(env: &JniEnv, name: &str) -> Result<GlobalRef, BridgeError> {
    let missing = || BridgeError::Reflection(format!("could not find class '{}'", BridgeConfig::dotted(name)));
    let local = LocalRef::new(env, env.find_class(name).ok_or_else(|| {
        env.exception_clear();
        missing()
    })?);
    GlobalRef::new(env, local.get()).ok_or_else(missing)
}

fn short_name(class: &str) -> &str {
    class.rsplit('/').next().unwrap_or(class)
}

/// Method lookup with the "invalid <Class> class (missing ...)" report.
struct MethodLookup<'a> {
    env: &'a JniEnv,
    class: jni::jclass,
    class_name: &'a str,
}

impl<'a> MethodLookup<'a> {
    fn fail(&self, what: &str) -> BridgeError {
        self.env.exception_clear();
        BridgeError::Reflection(format!("invalid {} class (missing {what})", short_name(self.class_name)))
    }

    fn method(&self, name: &str, sig: &str) -> Result<jni::jmethodID, BridgeError> {
        self.env
            .get_method_id(self.class, name, sig)
            .ok_or_else(|| self.fail(&format!("{name} method")))
    }

    fn constructor(&self, sig: &str, what: &str) -> Result<jni::jmethodID, BridgeError> {
        self.env.get_method_id(self.class, "<init>", sig).ok_or_else(|| self.fail(what))
    }

    fn static_method(&self, name: &str, sig: &str) -> Result<jni::jmethodID, BridgeError> {
        self.env
            .get_static_method_id(self.class, name, sig)
            .ok_or_else(|| self.fail(&format!("static {name} method")))
    }
}

/// Interop types used by the marshaling layer.
pub struct RuntimeTypes {
    pub external_string: GlobalRef,
    pub external_string_init: jni::jmethodID,
    pub external_string_get_bytes: jni::jmethodID,
    pub external_string_get_length: jni::jmethodID,

    pub string: GlobalRef,

    pub hash_map: GlobalRef,
    pub hash_map_init: jni::jmethodID,
    pub hash_map_put: jni::jmethodID,
}

// Method IDs stay valid for as long as their class is loaded, which the
// global class references guarantee.
unsafe impl Send for RuntimeTypes {}
unsafe impl Sync for RuntimeTypes {}

impl RuntimeTypes {
    /// Resolve the string wrapper, `String` and `HashMap`, in that order.
    pub fn resolve(env: &JniEnv, config: &BridgeConfig) -> Result<Self, BridgeError> {
        let es_name = config.external_string_class.as_str();
        let external_string = global_class(env, es_name)?;
        let es = MethodLookup { env, class: external_string.get(), class_name: es_name };
        let external_string_init = es.constructor("([B)V", "byte[] constructor")?;
        let external_string_get_bytes = es.method("getBytes", "()[B")?;
        let external_string_get_length = es.method("getLength", "()I")?;

        let string = global_class(env, STRING_CLASS)?;

        let hash_map = global_class(env, HASH_MAP_CLASS)?;
        let map = MethodLookup { env, class: hash_map.get(), class_name: HASH_MAP_CLASS };
        let hash_map_init = map.constructor("()V", "default constructor")?;
        let hash_map_put = map.method("put", "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;")?;

        log::debug!("runtime types resolved ({})", BridgeConfig::dotted(es_name));
        Ok(RuntimeTypes {
            external_string,
            external_string_init,
            external_string_get_bytes,
            external_string_get_length,
            string,
            hash_map,
            hash_map_init,
            hash_map_put,
        })
    }
}

/// The Java-side dispatch singleton and the methods called on it.
pub struct HostBridge {
    // Field order matters on drop: the instance goes before its class.
    instance: GlobalRef,
    class: GlobalRef,
    natives_registered: bool,

    pub get_exception_text: jni::jmethodID,
    pub load_external_library: jni::jmethodID,
    pub unload_external_library: jni::jmethodID,
    pub get_external_libraries: jni::jmethodID,
    pub get_external_packages: jni::jmethodID,
    pub get_external_commands: jni::jmethodID,
    pub get_external_functions: jni::jmethodID,
    pub call_external_command: jni::jmethodID,
    pub call_external_function: jni::jmethodID,
}

unsafe impl Send for HostBridge {}
unsafe impl Sync for HostBridge {}

impl HostBridge {
    /// Resolve the dispatch class, register the host callbacks on it and
    /// obtain its singleton instance.
    pub fn resolve(env: &JniEnv, config: &BridgeConfig) -> Result<Self, BridgeError> {
        let name = config.host_bridge_class.as_str();
        let class = global_class(env, name)?;
        let lookup = MethodLookup { env, class: class.get(), class_name: name };

        let get_instance = lookup.static_method("getInstance", &config.host_bridge_instance_signature())?;
        let get_exception_text = lookup.static_method("getExceptionText", THROWABLE_TO_STRING)?;
        let load_external_library = lookup.method("loadExternalLibrary", STRING_TO_VOID)?;
        let unload_external_library = lookup.method("unloadExternalLibrary", STRING_TO_VOID)?;
        let get_external_libraries = lookup.method("getExternalLibraries", TO_STRING)?;
        let get_external_packages = lookup.method("getExternalPackages", TO_STRING)?;
        let get_external_commands = lookup.method("getExternalCommands", TO_STRING)?;
        let get_external_functions = lookup.method("getExternalFunctions", TO_STRING)?;
        let call_external_command = lookup.method("callExternalCommand", CALL_SIGNATURE)?;
        let call_external_function = lookup.method("callExternalFunction", CALL_SIGNATURE)?;

        register_callbacks(env, class.get(), config)?;
        // Past this point every failure has to undo the registration.
        let instance_local = env.call_static_object_method(class.get(), get_instance, &[]);
        if env.exception_check() || instance_local.is_null() {
            env.exception_clear();
            unregister(env, class.get());
            return Err(BridgeError::Reflection(format!(
                "could not create {} instance object",
                short_name(name)
            )));
        }
        let instance_local = LocalRef::new(env, instance_local);
        let Some(instance) = GlobalRef::new(env, instance_local.get()) else {
            unregister(env, class.get());
            return Err(BridgeError::Reflection(format!(
                "could not create {} global object reference",
                short_name(name)
            )));
        };

        log::debug!("dispatch object {} ready", BridgeConfig::dotted(name));
        Ok(HostBridge {
            instance,
            class,
            natives_registered: true,
            get_exception_text,
            load_external_library,
            unload_external_library,
            get_external_libraries,
            get_external_packages,
            get_external_commands,
            get_external_functions,
            call_external_command,
            call_external_function,
        })
    }

    pub fn instance(&self) -> jni::jobject {
        self.instance.get()
    }

    pub fn class(&self) -> jni::jclass {
        self.class.get()
    }

    /// Unregister the host callbacks. The global references go when `self`
    /// is dropped.
    pub fn release(&mut self, env: &JniEnv) {
        if self.natives_registered {
            unregister(env, self.class.get());
            self.natives_registered = false;
        }
    }
}

fn register_callbacks(env: &JniEnv, class: jni::jclass, config: &BridgeConfig) -> Result<(), BridgeError> {
    let table = callbacks::native_table(config);
    // Keep the C strings alive across the RegisterNatives call.
    let mut strings = Vec::with_capacity(table.len() * 2);
    let mut methods = Vec::with_capacity(table.len());
    for native in &table {
        let name = CString::new(native.name).map_err(|e| BridgeError::Marshal(e.to_string()))?;
        let signature = CString::new(native.signature.as_str()).map_err(|e| BridgeError::Marshal(e.to_string()))?;
        methods.push(jni::JNINativeMethod {
            name: name.as_ptr(),
            signature: signature.as_ptr(),
            fnPtr: native.function,
        });
        strings.push(name);
        strings.push(signature);
    }

    env.register_natives(class, &methods).map_err(|code| {
        env.exception_clear();
        log::error!("RegisterNatives failed with code {code}");
        BridgeError::Reflection("could not register the host callback methods".to_string())
    })?;
    log::debug!("registered {} host callbacks", methods.len());
    Ok(())
}

fn unregister(env: &JniEnv, class: jni::jclass) {
    if let Err(code) = env.unregister_natives(class) {
        log::warn!("UnregisterNatives failed with code {code}");
    }
}
