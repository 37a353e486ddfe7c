//! The JVM lifecycle.
//!
//! ```text
//! initial ──load──▶ loading ──▶ loaded ──unload──▶ unloading ──▶ unloaded
//!                      │                               │
//!                      └── init failure ──▶ unloaded   └── destroy failure: stays
//! ```
//!
//! A process gets one JVM: once it has been created, the lifecycle never
//! returns to `initial`.
//!
//! The lifecycle lock is only held while the state changes, never while Java
//! runs. Call-throughs clone the runtime handle and release the lock, so a
//! host script that re-enters the bridge from inside a Java call (a status
//! query, a nested call) does not deadlock. Unload refuses to tear the JVM
//! down while such a call is still on the stack.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::exception::ExceptionState;
use crate::vm::LaunchOptions;

/// Lifecycle phase, with the numeric values the host protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JvmState {
    Uninitialized = 0,
    Loading = 1,
    Loaded = 2,
    Unloading = 3,
    Unloaded = 4,
}

impl JvmState {
    /// Name reported by jvm-status.
    pub fn as_str(self) -> &'static str {
        match self {
            JvmState::Uninitialized => "initial",
            JvmState::Loading => "loading",
            JvmState::Loaded => "loaded",
            JvmState::Unloading => "unloading",
            JvmState::Unloaded => "unloaded",
        }
    }
}

impl std::fmt::Display for JvmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which registry listing to fetch from the dispatch object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Libraries,
    Packages,
    Commands,
    Functions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Command,
    Function,
}

/// A created JVM, as seen by the lifecycle.
pub trait Runtime: Send + Sync {
    /// Resolve the interop types and the dispatch object, and register the
    /// host callbacks.
    fn initialize(&mut self, config: &BridgeConfig) -> Result<()>;

    fn load_library(&self, path: &str) -> Result<()>;
    fn unload_library(&self, path: &str) -> Result<()>;

    /// A newline-separated listing; empty if the dispatch object has none.
    fn listing(&self, listing: Listing) -> Result<String>;

    /// Call a registered command or function. `None` when Java returns null.
    fn invoke(&self, kind: Invocation, name: &str, params: &[String]) -> Result<Option<String>>;

    /// Drop whatever `initialize` set up. Must tolerate a partial setup.
    fn release(&mut self);

    fn destroy(self) -> Result<()>;
}

/// Creates the JVM.
pub trait Launcher: Send + Sync {
    type Vm: Runtime + 'static;

    fn create(&self, options: &LaunchOptions) -> Result<Self::Vm>;
}

struct Lifecycle<R> {
    state: JvmState,
    runtime: Option<Arc<R>>,
}

/// Process-wide bridge context: lifecycle, runtime handle and exception
/// state.
pub struct Bridge<L: Launcher> {
    launcher: L,
    config: BridgeConfig,
    lifecycle: Mutex<Lifecycle<L::Vm>>,
    exception: Mutex<ExceptionState>,
}

impl<L: Launcher> Bridge<L> {
    pub fn new(launcher: L, config: BridgeConfig) -> Self {
        Bridge {
            launcher,
            config,
            lifecycle: Mutex::new(Lifecycle {
                state: JvmState::Uninitialized,
                runtime: None,
            }),
            exception: Mutex::new(ExceptionState::default()),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> JvmState {
        self.lifecycle.lock().state
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == JvmState::Loaded
    }

    /// Stack trace of the exception thrown by the most recent call into
    /// Java; empty if it did not throw.
    pub fn exception_text(&self) -> String {
        self.exception.lock().stack_trace().to_string()
    }

    /// Host-visible message of the most recent failed call into Java.
    pub fn last_error(&self) -> String {
        self.exception.lock().summary().to_string()
    }

    fn launch_options(&self, classpath: &str, runtime_path: Option<&str>) -> LaunchOptions {
        LaunchOptions {
            classpath: classpath.to_string(),
            runtime_path: runtime_path.filter(|p| !p.is_empty()).map(PathBuf::from),
            extra_options: self.config.extra_jvm_options.clone(),
            jni_version: self.config.jni_version,
        }
    }

    /// Create and initialize the JVM.
    ///
    /// Creation failures leave the state `initial`. Once the JVM exists, an
    /// initialization failure destroys it again and leaves `unloaded`.
    pub fn load(&self, classpath: &str, runtime_path: Option<&str>) -> Result<()> {
        let mut vm = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != JvmState::Uninitialized {
                return Err(BridgeError::NotInitial(lifecycle.state));
            }
            let options = self.launch_options(classpath, runtime_path);
            let vm = self.launcher.create(&options).map_err(|err| {
                log::error!("JVM creation failed: {err}");
                err
            })?;
            lifecycle.state = JvmState::Loading;
            vm
        };
        log::debug!("JVM created, initializing");

        let initialized = vm.initialize(&self.config);
        self.exception.lock().record(&initialized);

        let mut lifecycle = self.lifecycle.lock();
        match initialized {
            Ok(()) => {
                lifecycle.runtime = Some(Arc::new(vm));
                lifecycle.state = JvmState::Loaded;
                log::debug!("JVM loaded");
                Ok(())
            }
            Err(err) => {
                log::error!("JVM initialization failed: {err}");
                vm.release();
                if let Err(destroy_err) = vm.destroy() {
                    log::warn!("destroying the half-initialized JVM failed: {destroy_err}");
                }
                lifecycle.state = JvmState::Unloaded;
                Err(err)
            }
        }
    }

    /// Release the callbacks and interop types, then destroy the JVM.
    ///
    /// A destroy failure is reported and leaves the state `unloading`.
    pub fn unload(&self) -> Result<()> {
        let mut vm = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != JvmState::Loaded {
                return Err(BridgeError::State(lifecycle.state));
            }
            let Some(runtime) = lifecycle.runtime.take() else {
                return Err(BridgeError::State(lifecycle.state));
            };
            let vm = match Arc::try_unwrap(runtime) {
                Ok(vm) => vm,
                Err(shared) => {
                    lifecycle.runtime = Some(shared);
                    log::warn!("unload refused: a call into Java is still in progress");
                    return Err(BridgeError::Busy);
                }
            };
            lifecycle.state = JvmState::Unloading;
            vm
        };
        log::debug!("unloading JVM");

        vm.release();
        let destroyed = vm.destroy();
        if let Err(err) = &destroyed {
            log::warn!("JVM destroy failed: {err}");
            return destroyed;
        }
        self.lifecycle.lock().state = JvmState::Unloaded;
        log::debug!("JVM unloaded");
        Ok(())
    }

    /// Run `f` against the loaded runtime and record its exception outcome.
    fn call_through<T>(&self, f: impl FnOnce(&L::Vm) -> Result<T>) -> Result<T> {
        let runtime = {
            let lifecycle = self.lifecycle.lock();
            match (lifecycle.state, lifecycle.runtime.as_ref()) {
                (JvmState::Loaded, Some(runtime)) => Arc::clone(runtime),
                (state, _) => return Err(BridgeError::State(state)),
            }
        };
        let outcome = f(&runtime);
        if let Err(err) = &outcome {
            if !err.is_java_exception() {
                log::warn!("call into Java failed: {err}");
            }
        }
        self.exception.lock().record(&outcome);
        outcome
    }

    pub fn load_library(&self, path: &str) -> Result<()> {
        self.call_through(|vm| vm.load_library(path))
    }

    pub fn unload_library(&self, path: &str) -> Result<()> {
        self.call_through(|vm| vm.unload_library(path))
    }

    pub fn listing(&self, listing: Listing) -> Result<String> {
        self.call_through(|vm| vm.listing(listing))
    }

    pub fn invoke(&self, kind: Invocation, name: &str, params: &[String]) -> Result<Option<String>> {
        self.call_through(|vm| vm.invoke(kind, name, params))
    }
}
