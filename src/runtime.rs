//! JNI implementation of [`Launcher`] and [`Runtime`].

use std::sync::Arc;

use crate::callbacks;
use crate::config::BridgeConfig;
use crate::env::{JniEnv, LocalRef};
use crate::error::{BridgeError, Result};
use crate::exception;
use crate::lifecycle::{Invocation, JvmState, Launcher, Listing, Runtime};
use crate::marshal;
use crate::reflect::{HostBridge, RuntimeTypes};
use crate::sys::jni;
use crate::vm::{JavaVm, LaunchOptions};

/// Creates the embedded JVM through `JNI_CreateJavaVM`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JniLauncher;

impl Launcher for JniLauncher {
    type Vm = JniRuntime;

    fn create(&self, options: &LaunchOptions) -> Result<JniRuntime> {
        Ok(JniRuntime::new(JavaVm::launch(options)?))
    }
}

/// The embedded JVM plus everything resolved in it.
pub struct JniRuntime {
    // Dropped in declaration order: the global references go before the VM.
    host_bridge: Option<HostBridge>,
    types: Option<Arc<RuntimeTypes>>,
    vm: JavaVm,
}

impl JniRuntime {
    /// Wrap a freshly created VM. Nothing is resolved until `initialize`.
    pub fn new(vm: JavaVm) -> Self {
        JniRuntime {
            host_bridge: None,
            types: None,
            vm,
        }
    }

    fn bridge(&self) -> Result<&HostBridge> {
        self.host_bridge
            .as_ref()
            .ok_or(BridgeError::State(JvmState::Loading))
    }

    /// Attach the calling thread, call `f`, then capture any exception it
    /// left pending.
    fn call<T>(&self, f: impl FnOnce(&JniEnv, &HostBridge) -> Result<T>) -> Result<T> {
        let bridge = self.bridge()?;
        let env = self.vm.attach_current_thread()?;
        let value = f(&env, bridge);
        exception::check_and_capture(&env, bridge)?;
        value
    }

    fn new_string<'a>(&self, env: &'a JniEnv, s: &str) -> Result<LocalRef<'a>> {
        let js = marshal::native_to_java_string(env, Some(s));
        if js.is_null() {
            return Err(BridgeError::Marshal("could not create a Java string".to_string()));
        }
        Ok(LocalRef::new(env, js))
    }

    fn string_array<'a>(&self, env: &'a JniEnv, items: &[String]) -> Result<LocalRef<'a>> {
        let types = self
            .types
            .as_ref()
            .ok_or(BridgeError::State(JvmState::Loading))?;
        let array = env
            .new_object_array(items.len() as jni::jsize, types.string.get())
            .ok_or_else(|| BridgeError::Marshal("could not allocate the parameter array".to_string()))?;
        let array = LocalRef::new(env, array);
        for (index, item) in items.iter().enumerate() {
            let element = self.new_string(env, item)?;
            env.set_object_array_element(array.get(), index as jni::jsize, element.get());
        }
        Ok(array)
    }

    fn library_call(&self, method: impl Fn(&HostBridge) -> jni::jmethodID, path: &str) -> Result<()> {
        self.call(|env, bridge| {
            let path = self.new_string(env, path)?;
            env.call_void_method(bridge.instance(), method(bridge), &[jni::jvalue { l: path.get() }]);
            Ok(())
        })
    }
}

impl Runtime for JniRuntime {
    fn initialize(&mut self, config: &BridgeConfig) -> Result<()> {
        let env = self.vm.attach_current_thread()?;
        let types = Arc::new(RuntimeTypes::resolve(&env, config)?);
        self.types = Some(Arc::clone(&types));
        callbacks::install_runtime_types(types);
        self.host_bridge = Some(HostBridge::resolve(&env, config)?);
        Ok(())
    }

    fn load_library(&self, path: &str) -> Result<()> {
        self.library_call(|b| b.load_external_library, path)
    }

    fn unload_library(&self, path: &str) -> Result<()> {
        self.library_call(|b| b.unload_external_library, path)
    }

    fn listing(&self, listing: Listing) -> Result<String> {
        self.call(|env, bridge| {
            let method = match listing {
                Listing::Libraries => bridge.get_external_libraries,
                Listing::Packages => bridge.get_external_packages,
                Listing::Commands => bridge.get_external_commands,
                Listing::Functions => bridge.get_external_functions,
            };
            let text = LocalRef::new(env, env.call_object_method(bridge.instance(), method, &[]));
            Ok(marshal::java_string_to_native(env, text.get()).unwrap_or_default())
        })
    }

    fn invoke(&self, kind: Invocation, name: &str, params: &[String]) -> Result<Option<String>> {
        self.call(|env, bridge| {
            let method = match kind {
                Invocation::Command => bridge.call_external_command,
                Invocation::Function => bridge.call_external_function,
            };
            let name = self.new_string(env, name)?;
            let params = self.string_array(env, params)?;
            let args = [jni::jvalue { l: name.get() }, jni::jvalue { l: params.get() }];
            let result = LocalRef::new(env, env.call_object_method(bridge.instance(), method, &args));
            Ok(marshal::java_string_to_native(env, result.get()))
        })
    }

    fn release(&mut self) {
        callbacks::clear_runtime_types();
        match self.vm.attach_current_thread() {
            Ok(env) => {
                if let Some(bridge) = self.host_bridge.as_mut() {
                    bridge.release(&env);
                }
            }
            Err(err) => log::warn!("releasing JVM resources without an attached thread: {err}"),
        }
        self.host_bridge = None;
        self.types = None;
    }

    fn destroy(self) -> Result<()> {
        let JniRuntime { host_bridge, types, vm } = self;
        drop(host_bridge);
        drop(types);
        vm.destroy()
    }
}
