//! Conversions between host values and Java objects.
//!
//! Every function here works on the current thread's [`JniEnv`] and never
//! leaves a Java exception pending: a failed JNI call is cleared and turned
//! into a null result or a [`BridgeError::Marshal`].

use std::ptr;

use crate::env::{JniEnv, LocalRef};
use crate::error::BridgeError;
use crate::host::{ExternalString, Host, KeyedAssociation};
use crate::reflect::RuntimeTypes;
use crate::sys::jni;

/// Clear a pending exception, reporting whether there was one.
fn clear_pending(env: &JniEnv) -> bool {
    if env.exception_check() {
        env.exception_clear();
        true
    } else {
        false
    }
}

/// Java string from host text; null for `None` or if allocation fails.
pub fn native_to_java_string(env: &JniEnv, text: Option<&str>) -> jni::jstring {
    let Some(text) = text else { return ptr::null_mut() };
    match env.new_string(text) {
        Some(s) => s,
        None => {
            clear_pending(env);
            ptr::null_mut()
        }
    }
}

/// Host text from a Java string; `None` for a null reference.
pub fn java_string_to_native(env: &JniEnv, string: jni::jstring) -> Option<String> {
    env.get_string(string)
}

/// Copy the bytes held by a Java string wrapper.
///
/// The result is exactly `getLength()` bytes long. If `getBytes()` returns
/// fewer bytes the tail is zero-filled; extra bytes are ignored.
pub fn external_string_from_java_wrapper(
    env: &JniEnv,
    types: &RuntimeTypes,
    wrapper: jni::jobject,
) -> Result<ExternalString, BridgeError> {
    if wrapper.is_null() {
        return Err(BridgeError::Marshal("external string is null".to_string()));
    }

    let length = env.call_int_method(wrapper, types.external_string_get_length, &[]);
    if clear_pending(env) {
        return Err(BridgeError::Marshal("getLength threw".to_string()));
    }
    let length = length.max(0) as usize;

    let bytes = LocalRef::new(env, env.call_object_method(wrapper, types.external_string_get_bytes, &[]));
    if clear_pending(env) {
        return Err(BridgeError::Marshal("getBytes threw".to_string()));
    }

    let mut buffer = vec![0u8; length];
    if !bytes.is_null() {
        let available = env.get_array_length(bytes.get()).max(0) as usize;
        let copied = available.min(length);
        if copied > 0 {
            env.get_byte_array_region(bytes.get(), 0, &mut buffer[..copied]);
            if clear_pending(env) {
                return Err(BridgeError::Marshal("could not copy external string bytes".to_string()));
            }
        }
    }
    Ok(ExternalString::new(buffer))
}

/// Build a Java string wrapper holding a copy of `value`.
///
/// Returns null if the byte array or the wrapper cannot be allocated.
pub fn java_wrapper_from_external_string(env: &JniEnv, types: &RuntimeTypes, value: &ExternalString) -> jni::jobject {
    let Some(array) = env.new_byte_array(value.len() as jni::jsize) else {
        clear_pending(env);
        log::warn!("could not allocate a byte[{}] for an external string", value.len());
        return ptr::null_mut();
    };
    let array = LocalRef::new(env, array);
    if !value.is_empty() {
        env.set_byte_array_region(array.get(), 0, value.as_bytes());
        if clear_pending(env) {
            return ptr::null_mut();
        }
    }

    let args = [jni::jvalue { l: array.get() }];
    match env.new_object(types.external_string.get(), types.external_string_init, &args) {
        Some(wrapper) => wrapper,
        None => {
            clear_pending(env);
            ptr::null_mut()
        }
    }
}

/// Build a `java.util.HashMap` from the host array `name`.
///
/// The map is empty if the host reports failure or no elements. Null only if
/// the map itself cannot be constructed.
pub fn java_map_from_keyed_association(env: &JniEnv, types: &RuntimeTypes, host: &dyn Host, name: &str) -> jni::jobject {
    let Some(map) = env.new_object(types.hash_map.get(), types.hash_map_init, &[]) else {
        clear_pending(env);
        return ptr::null_mut();
    };

    let Some(entries) = host.array(name) else {
        log::debug!("host array {name:?} not available, returning an empty map");
        return map;
    };

    for (key, value) in entries.iter() {
        let key = LocalRef::new(env, native_to_java_string(env, Some(key)));
        let value = LocalRef::new(env, java_wrapper_from_external_string(env, types, value));
        let args = [jni::jvalue { l: key.get() }, jni::jvalue { l: value.get() }];
        // put() returns the replaced value, if any.
        drop(LocalRef::new(env, env.call_object_method(map, types.hash_map_put, &args)));
        clear_pending(env);
    }
    map
}

/// Read `count` parallel (value, key) elements from two Java arrays.
///
/// The result always holds exactly `count` elements, in array order. Each
/// element converts on its own: a null, mistyped or missing value becomes an
/// empty string and a null, non-`String` or missing key becomes the empty
/// key. Elements are appended, never merged, so repeated keys (the empty key
/// included) are all handed to the host.
pub fn keyed_association_from_java_arrays(
    env: &JniEnv,
    types: &RuntimeTypes,
    count: jni::jint,
    values: jni::jobjectArray,
    keys: jni::jobjectArray,
) -> KeyedAssociation {
    let length_of = |array: jni::jobjectArray| {
        if array.is_null() {
            0
        } else {
            env.get_array_length(array).max(0)
        }
    };
    let value_count = length_of(values);
    let key_count = length_of(keys);

    let mut assoc = KeyedAssociation::with_capacity(count.max(0) as usize);
    for index in 0..count.max(0) {
        let key = if index < key_count {
            let element = LocalRef::new(env, env.get_object_array_element(keys, index));
            if !element.is_null() && env.is_instance_of(element.get(), types.string.get()) {
                java_string_to_native(env, element.get()).unwrap_or_default()
            } else {
                String::new()
            }
        } else {
            String::new()
        };

        let value = if index < value_count {
            let element = LocalRef::new(env, env.get_object_array_element(values, index));
            if !element.is_null() && env.is_instance_of(element.get(), types.external_string.get()) {
                external_string_from_java_wrapper(env, types, element.get()).unwrap_or_default()
            } else {
                ExternalString::default()
            }
        } else {
            ExternalString::default()
        };

        clear_pending(env);
        assoc.push(key, value);
    }
    assoc
}
