//! Native methods Java code calls to reach the host.
//!
//! The table is registered on the dispatch class while the JVM loads. Each
//! trampoline decodes its Java arguments, calls the installed [`Host`] and
//! encodes the answer. Failures never surface as Java exceptions: string and
//! object results come back `null`, status results come back
//! `EXTERNAL_FAILURE` (1).

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use parking_lot::{const_rwlock, RwLock};

use crate::config::BridgeConfig;
use crate::env::JniEnv;
use crate::host::{self, ExternalString, Host, Selector};
use crate::marshal;
use crate::reflect::RuntimeTypes;
use crate::sys::host::{EXTERNAL_FAILURE, EXTERNAL_SUCCESS};
use crate::sys::jni::{jint, jlong, jobject, jobjectArray, jstring, JNIEnv};

static RUNTIME_TYPES: RwLock<Option<Arc<RuntimeTypes>>> = const_rwlock(None);

/// Make `types` available to the callbacks. Called once the JVM is loaded.
pub fn install_runtime_types(types: Arc<RuntimeTypes>) {
    *RUNTIME_TYPES.write() = Some(types);
}

/// Detach the callbacks from the interop types before they are released.
pub fn clear_runtime_types() {
    *RUNTIME_TYPES.write() = None;
}

/// One entry of the `RegisterNatives` table.
pub struct NativeCallback {
    pub name: &'static str,
    pub signature: String,
    pub function: *mut c_void,
}

/// The full callback table, with signatures built for `config`'s classes.
pub fn native_table(config: &BridgeConfig) -> Vec<NativeCallback> {
    let es = config.external_string_descriptor();
    let entry = |name: &'static str, signature: String, function: *mut c_void| NativeCallback {
        name,
        signature,
        function,
    };

    vec![
        entry("externalSendCardMessage", "(Ljava/lang/String;)I".into(), send_card_message as *mut c_void),
        entry("externalEvalExpr", "(Ljava/lang/String;)Ljava/lang/String;".into(), eval_expr as *mut c_void),
        entry("externalGetGlobal", "(Ljava/lang/String;)Ljava/lang/String;".into(), get_global as *mut c_void),
        entry("externalSetGlobal", "(Ljava/lang/String;Ljava/lang/String;)I".into(), set_global as *mut c_void),
        entry("externalGetVariable", "(Ljava/lang/String;)Ljava/lang/String;".into(), get_variable as *mut c_void),
        entry("externalSetVariable", "(Ljava/lang/String;Ljava/lang/String;)I".into(), set_variable as *mut c_void),
        entry(
            "externalGetVariableEx",
            format!("(Ljava/lang/String;Ljava/lang/String;){es}"),
            get_variable_ex as *mut c_void,
        ),
        entry(
            "externalSetVariableEx",
            format!("(Ljava/lang/String;Ljava/lang/String;{es})I"),
            set_variable_ex as *mut c_void,
        ),
        entry("externalGetArray", "(Ljava/lang/String;)Ljava/util/Map;".into(), get_array as *mut c_void),
        entry(
            "externalSetArray",
            format!("(Ljava/lang/String;I[{es}[Ljava/lang/String;)I"),
            set_array as *mut c_void,
        ),
        entry(
            "externalGetFieldByName",
            "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/String;".into(),
            get_field_by_name as *mut c_void,
        ),
        entry("externalGetFieldByNum", "(Ljava/lang/String;I)Ljava/lang/String;".into(), get_field_by_num as *mut c_void),
        entry("externalGetFieldById", "(Ljava/lang/String;J)Ljava/lang/String;".into(), get_field_by_id as *mut c_void),
        entry(
            "externalSetFieldByName",
            "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)I".into(),
            set_field_by_name as *mut c_void,
        ),
        entry("externalSetFieldByNum", "(Ljava/lang/String;ILjava/lang/String;)I".into(), set_field_by_num as *mut c_void),
        entry("externalSetFieldById", "(Ljava/lang/String;JLjava/lang/String;)I".into(), set_field_by_id as *mut c_void),
        entry(
            "externalShowImageByName",
            "(Ljava/lang/String;Ljava/lang/String;)I".into(),
            show_image_by_name as *mut c_void,
        ),
        entry("externalShowImageByNum", "(Ljava/lang/String;I)I".into(), show_image_by_num as *mut c_void),
        entry("externalShowImageById", "(Ljava/lang/String;J)I".into(), show_image_by_id as *mut c_void),
    ]
}

// =============================================================================
// Plumbing
// =============================================================================

/// Run `f` against the installed host, or return `failed` if there is no
/// host, no interop types, or `f` panics.
fn with_host<R>(raw: *mut JNIEnv, failed: R, f: impl FnOnce(&JniEnv, &dyn Host, &RuntimeTypes) -> Option<R>) -> R {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let types = RUNTIME_TYPES.read().clone()?;
        let Some(host) = host::installed_host() else {
            log::warn!("host callback invoked before a host was installed");
            return None;
        };
        let env = unsafe { JniEnv::from_raw(raw) };
        f(&env, host.as_ref(), &types)
    }));
    match outcome {
        Ok(Some(result)) => result,
        Ok(None) => failed,
        Err(_) => {
            log::error!("panic in host callback");
            failed
        }
    }
}

fn status(ok: bool) -> jint {
    if ok {
        EXTERNAL_SUCCESS
    } else {
        EXTERNAL_FAILURE
    }
}

fn text(env: &JniEnv, s: jstring) -> Option<String> {
    marshal::java_string_to_native(env, s)
}

fn string_result(env: &JniEnv, value: Option<String>) -> Option<jstring> {
    let value = value?;
    let s = marshal::native_to_java_string(env, Some(&value));
    (!s.is_null()).then_some(s)
}

// =============================================================================
// Messages and expressions
// =============================================================================

extern "system" fn send_card_message(env: *mut JNIEnv, _this: jobject, message: jstring) -> jint {
    with_host(env, EXTERNAL_FAILURE, |env, host, _| {
        Some(status(host.send_card_message(&text(env, message)?)))
    })
}

extern "system" fn eval_expr(env: *mut JNIEnv, _this: jobject, expression: jstring) -> jstring {
    with_host(env, ptr::null_mut(), |env, host, _| {
        string_result(env, host.eval_expr(&text(env, expression)?))
    })
}

// =============================================================================
// Globals and variables
// =============================================================================

extern "system" fn get_global(env: *mut JNIEnv, _this: jobject, name: jstring) -> jstring {
    with_host(env, ptr::null_mut(), |env, host, _| string_result(env, host.global(&text(env, name)?)))
}

extern "system" fn set_global(env: *mut JNIEnv, _this: jobject, name: jstring, value: jstring) -> jint {
    with_host(env, EXTERNAL_FAILURE, |env, host, _| {
        Some(status(host.set_global(&text(env, name)?, &text(env, value)?)))
    })
}

extern "system" fn get_variable(env: *mut JNIEnv, _this: jobject, name: jstring) -> jstring {
    with_host(env, ptr::null_mut(), |env, host, _| string_result(env, host.variable(&text(env, name)?)))
}

extern "system" fn set_variable(env: *mut JNIEnv, _this: jobject, name: jstring, value: jstring) -> jint {
    with_host(env, EXTERNAL_FAILURE, |env, host, _| {
        Some(status(host.set_variable(&text(env, name)?, &text(env, value)?)))
    })
}

extern "system" fn get_variable_ex(env: *mut JNIEnv, _this: jobject, name: jstring, key: jstring) -> jobject {
    with_host(env, ptr::null_mut(), |env, host, types| {
        let value = host.variable_ex(&text(env, name)?, &text(env, key)?)?;
        let wrapper = marshal::java_wrapper_from_external_string(env, types, &value);
        (!wrapper.is_null()).then_some(wrapper)
    })
}

extern "system" fn set_variable_ex(env: *mut JNIEnv, _this: jobject, name: jstring, key: jstring, value: jobject) -> jint {
    with_host(env, EXTERNAL_FAILURE, |env, host, types| {
        let value: ExternalString = marshal::external_string_from_java_wrapper(env, types, value)
            .map_err(|e| log::debug!("set-variable-ex: {e}"))
            .ok()?;
        Some(status(host.set_variable_ex(&text(env, name)?, &text(env, key)?, &value)))
    })
}

// =============================================================================
// Arrays
// =============================================================================

extern "system" fn get_array(env: *mut JNIEnv, _this: jobject, name: jstring) -> jobject {
    with_host(env, ptr::null_mut(), |env, host, types| {
        let map = marshal::java_map_from_keyed_association(env, types, host, &text(env, name)?);
        (!map.is_null()).then_some(map)
    })
}

extern "system" fn set_array(
    env: *mut JNIEnv,
    _this: jobject,
    name: jstring,
    count: jint,
    values: jobjectArray,
    keys: jobjectArray,
) -> jint {
    with_host(env, EXTERNAL_FAILURE, |env, host, types| {
        let name = text(env, name)?;
        let entries = marshal::keyed_association_from_java_arrays(env, types, count, values, keys);
        Some(status(host.set_array(&name, &entries)))
    })
}

// =============================================================================
// Fields
// =============================================================================

fn get_field(env: *mut JNIEnv, group: jstring, selector: impl FnOnce(&JniEnv) -> Option<FieldKey>) -> jstring {
    with_host(env, ptr::null_mut(), |env, host, _| {
        let group = text(env, group)?;
        let key = selector(env)?;
        string_result(env, host.field(&group, key.selector()))
    })
}

fn set_field(env: *mut JNIEnv, group: jstring, selector: impl FnOnce(&JniEnv) -> Option<FieldKey>, value: jstring) -> jint {
    with_host(env, EXTERNAL_FAILURE, |env, host, _| {
        let group = text(env, group)?;
        let key = selector(env)?;
        Some(status(host.set_field(&group, key.selector(), &text(env, value)?)))
    })
}

fn show_image(env: *mut JNIEnv, group: jstring, selector: impl FnOnce(&JniEnv) -> Option<FieldKey>) -> jint {
    with_host(env, EXTERNAL_FAILURE, |env, host, _| {
        let group = text(env, group)?;
        let key = selector(env)?;
        Some(status(host.show_image(&group, key.selector())))
    })
}

/// Owned form of [`Selector`], decoded from the Java arguments.
enum FieldKey {
    Name(String),
    Number(i32),
    Id(u64),
}

impl FieldKey {
    fn selector(&self) -> Selector<'_> {
        match self {
            FieldKey::Name(name) => Selector::Name(name),
            FieldKey::Number(n) => Selector::Number(*n),
            FieldKey::Id(id) => Selector::Id(*id),
        }
    }
}

fn by_name(name: jstring) -> impl FnOnce(&JniEnv) -> Option<FieldKey> {
    move |env| text(env, name).map(FieldKey::Name)
}

fn by_num(index: jint) -> impl FnOnce(&JniEnv) -> Option<FieldKey> {
    move |_| Some(FieldKey::Number(index))
}

// Ids are unsigned on the host side; Java only has a signed long.
fn by_id(id: jlong) -> impl FnOnce(&JniEnv) -> Option<FieldKey> {
    move |_| Some(FieldKey::Id(id as u64))
}

extern "system" fn get_field_by_name(env: *mut JNIEnv, _this: jobject, group: jstring, name: jstring) -> jstring {
    get_field(env, group, by_name(name))
}

extern "system" fn get_field_by_num(env: *mut JNIEnv, _this: jobject, group: jstring, index: jint) -> jstring {
    get_field(env, group, by_num(index))
}

extern "system" fn get_field_by_id(env: *mut JNIEnv, _this: jobject, group: jstring, id: jlong) -> jstring {
    get_field(env, group, by_id(id))
}

extern "system" fn set_field_by_name(env: *mut JNIEnv, _this: jobject, group: jstring, name: jstring, value: jstring) -> jint {
    set_field(env, group, by_name(name), value)
}

extern "system" fn set_field_by_num(env: *mut JNIEnv, _this: jobject, group: jstring, index: jint, value: jstring) -> jint {
    set_field(env, group, by_num(index), value)
}

extern "system" fn set_field_by_id(env: *mut JNIEnv, _this: jobject, group: jstring, id: jlong, value: jstring) -> jint {
    set_field(env, group, by_id(id), value)
}

// =============================================================================
// Images
// =============================================================================

extern "system" fn show_image_by_name(env: *mut JNIEnv, _this: jobject, group: jstring, name: jstring) -> jint {
    show_image(env, group, by_name(name))
}

extern "system" fn show_image_by_num(env: *mut JNIEnv, _this: jobject, group: jstring, index: jint) -> jint {
    show_image(env, group, by_num(index))
}

extern "system" fn show_image_by_id(env: *mut JNIEnv, _this: jobject, group: jstring, id: jlong) -> jint {
    show_image(env, group, by_id(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_covers_every_callback_once() {
        let table = native_table(&BridgeConfig::default());
        assert_eq!(table.len(), 19);
        let names: HashSet<_> = table.iter().map(|n| n.name).collect();
        assert_eq!(names.len(), 19);
        assert!(table.iter().all(|n| !n.function.is_null()));
    }

    #[test]
    fn wrapper_signatures_follow_configured_class() {
        let config = BridgeConfig {
            external_string_class: "org/example/Bytes".to_string(),
            ..BridgeConfig::default()
        };
        let table = native_table(&config);
        let sig = |name: &str| table.iter().find(|n| n.name == name).map(|n| n.signature.clone());
        assert_eq!(
            sig("externalGetVariableEx").as_deref(),
            Some("(Ljava/lang/String;Ljava/lang/String;)Lorg/example/Bytes;")
        );
        assert_eq!(
            sig("externalSetArray").as_deref(),
            Some("(Ljava/lang/String;I[Lorg/example/Bytes;[Ljava/lang/String;)I")
        );
    }

    #[test]
    fn callbacks_fail_before_the_jvm_is_loaded() {
        clear_runtime_types();
        let env = ptr::null_mut();
        assert_eq!(send_card_message(env, ptr::null_mut(), ptr::null_mut()), EXTERNAL_FAILURE);
        assert!(get_global(env, ptr::null_mut(), ptr::null_mut()).is_null());
        assert_eq!(show_image_by_id(env, ptr::null_mut(), ptr::null_mut(), 7), EXTERNAL_FAILURE);
    }
}
