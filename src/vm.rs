//! Creating and destroying the embedded JVM.
//!
//! Two ways to reach `JNI_CreateJavaVM`:
//!
//! - dynamically, by loading libjvm from an explicit runtime path (or one
//!   found through `JVM_LIB_PATH` / `JAVA_HOME`)
//! - through a pre-linked symbol, with the `linked-jvm` feature

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::ptr;

use crate::env::JniEnv;
use crate::error::BridgeError;
use crate::sys::jni;

/// Option that keeps AWT from trying to open a display inside the host.
pub const HEADLESS_OPTION: &str = "-Djava.awt.headless=true";

/// What the host passed to load-jvm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Passed through unmodified as `-Djava.class.path`.
    pub classpath: String,
    /// libjvm to load; `None` means discover it (or use the linked symbol).
    pub runtime_path: Option<PathBuf>,
    /// Appended after the classpath and headless options.
    pub extra_options: Vec<String>,
    pub jni_version: jni::jint,
}

impl LaunchOptions {
    pub fn new(classpath: impl Into<String>) -> Self {
        LaunchOptions {
            classpath: classpath.into(),
            runtime_path: None,
            extra_options: Vec::new(),
            jni_version: jni::JNI_VERSION_1_8,
        }
    }

    pub fn runtime_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime_path = Some(path.into());
        self
    }

    /// The full JVM option list, in the order they are handed to the VM.
    pub fn jvm_options(&self) -> Vec<String> {
        let mut options = vec![format!("-Djava.class.path={}", self.classpath), HEADLESS_OPTION.to_string()];
        options.extend(self.extra_options.iter().cloned());
        options
    }

    pub fn builder(&self) -> Result<JavaVmBuilder, BridgeError> {
        JavaVmBuilder::new(self.jni_version)
            .options(self.jvm_options())
            .map_err(|e| BridgeError::Platform(format!("invalid JVM option (NUL byte): {e}")))
    }
}

fn libjvm_filename() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "jvm.dll"
    }
    #[cfg(target_os = "macos")]
    {
        "libjvm.dylib"
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        "libjvm.so"
    }
}

fn candidates_from_java_home(java_home: &Path) -> Vec<PathBuf> {
    let filename = libjvm_filename();
    let arch = std::env::consts::ARCH;

    let mut rels = vec![
        format!("lib/server/{filename}"),
        format!("jre/lib/server/{filename}"),
        format!("lib/{arch}/server/{filename}"),
        format!("jre/lib/{arch}/server/{filename}"),
    ];

    if cfg!(target_os = "windows") {
        rels.push(format!("bin/server/{filename}"));
        rels.push(format!("bin/client/{filename}"));
    }

    rels.into_iter().map(|r| java_home.join(r)).collect()
}

/// Locate libjvm through `JVM_LIB_PATH`, then `JAVA_HOME`.
pub fn find_libjvm() -> Result<PathBuf, BridgeError> {
    if let Some(path) = std::env::var_os("JVM_LIB_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        return Err(BridgeError::Platform(format!(
            "JVM_LIB_PATH is set but does not exist: {}",
            path.display()
        )));
    }

    if let Some(java_home) = std::env::var_os("JAVA_HOME") {
        let java_home = PathBuf::from(java_home);
        return candidates_from_java_home(&java_home)
            .into_iter()
            .find(|candidate| candidate.exists())
            .ok_or_else(|| {
                BridgeError::Platform(format!(
                    "could not find {} under JAVA_HOME={}",
                    libjvm_filename(),
                    java_home.display()
                ))
            });
    }

    Err(BridgeError::Platform(
        "no <runtime path> given and neither JVM_LIB_PATH nor JAVA_HOME is set".to_string(),
    ))
}

/// Collects options and creates the JVM.
pub struct JavaVmBuilder {
    version: jni::jint,
    options: Vec<CString>,
}

impl JavaVmBuilder {
    pub fn new(version: jni::jint) -> Self {
        Self {
            version,
            options: Vec::new(),
        }
    }

    pub fn option(mut self, opt: &str) -> Result<Self, std::ffi::NulError> {
        self.options.push(CString::new(opt)?);
        Ok(self)
    }

    pub fn options<I, S>(mut self, opts: I) -> Result<Self, std::ffi::NulError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for opt in opts {
            self.options.push(CString::new(opt.as_ref())?);
        }
        Ok(self)
    }

    /// Create the JVM through a raw `JNI_CreateJavaVM` pointer.
    ///
    /// # Safety
    /// The pointer must be valid and its library must stay loaded for the
    /// lifetime of the returned `JavaVm`.
    pub unsafe fn create_with(self, create: jni::JNI_CreateJavaVM) -> Result<JavaVm, BridgeError> {
        self.create_owning(create, None)
    }

    /// The one place a `JavaVm` is built. `lib` is the library `create`
    /// came from; it is kept loaded for as long as the VM lives.
    unsafe fn create_owning(
        self,
        create: jni::JNI_CreateJavaVM,
        lib: Option<libloading::Library>,
    ) -> Result<JavaVm, BridgeError> {
        let mut opt_structs: Vec<jni::JavaVMOption> = self
            .options
            .iter()
            .map(|s| jni::JavaVMOption {
                optionString: s.as_ptr() as *mut std::os::raw::c_char,
                extraInfo: ptr::null_mut(),
            })
            .collect();

        let mut args = jni::JavaVMInitArgs {
            version: self.version,
            nOptions: opt_structs.len() as jni::jint,
            options: opt_structs.as_mut_ptr(),
            ignoreUnrecognized: jni::JNI_FALSE,
        };

        let mut vm: *mut jni::JavaVM = ptr::null_mut();
        let mut env: *mut jni::JNIEnv = ptr::null_mut();

        let res = create(&mut vm, &mut env, &mut args);
        if res != jni::JNI_OK || vm.is_null() || env.is_null() {
            log::error!("JNI_CreateJavaVM failed with code {res}");
            return Err(BridgeError::Platform("could not create Java VM".to_string()));
        }

        Ok(JavaVm {
            vm,
            destroyed: false,
            _lib: lib,
        })
    }

    /// Create the JVM by loading libjvm from `path`.
    pub fn create_from_library<P: AsRef<Path>>(self, path: P) -> Result<JavaVm, BridgeError> {
        let path = path.as_ref();
        let lib = unsafe {
            libloading::Library::new(path).map_err(|e| {
                log::error!("failed to load {}: {e}", path.display());
                BridgeError::Platform("unable to load JVM library from <runtime path>".to_string())
            })?
        };

        let create: jni::JNI_CreateJavaVM = unsafe {
            *lib.get::<jni::JNI_CreateJavaVM>(b"JNI_CreateJavaVM\0").map_err(|e| {
                log::error!("{} has no JNI_CreateJavaVM: {e}", path.display());
                BridgeError::Platform(
                    "invalid JVM library from <runtime path> (missing JNI_CreateJavaVM)".to_string(),
                )
            })?
        };

        unsafe { self.create_owning(create, Some(lib)) }
    }

    /// Create the JVM through the `JNI_CreateJavaVM` symbol linked into the
    /// process.
    #[cfg(feature = "linked-jvm")]
    pub fn create_linked(self) -> Result<JavaVm, BridgeError> {
        #[link(name = "jvm")]
        extern "system" {
            fn JNI_CreateJavaVM(
                pvm: *mut *mut jni::JavaVM,
                penv: *mut *mut jni::JNIEnv,
                args: *mut jni::JavaVMInitArgs,
            ) -> jni::jint;
        }
        unsafe { self.create_with(JNI_CreateJavaVM) }
    }
}

/// The embedded JVM.
pub struct JavaVm {
    vm: *mut jni::JavaVM,
    destroyed: bool,
    _lib: Option<libloading::Library>,
}

impl JavaVm {
    /// Create the JVM the way `options` ask for.
    pub fn launch(options: &LaunchOptions) -> Result<JavaVm, BridgeError> {
        let builder = options.builder()?;
        match &options.runtime_path {
            Some(path) => builder.create_from_library(path),
            #[cfg(feature = "linked-jvm")]
            None => builder.create_linked(),
            #[cfg(not(feature = "linked-jvm"))]
            None => builder.create_from_library(find_libjvm()?),
        }
    }

    /// Attach the current thread (a no-op if it already is) and return its
    /// environment.
    pub fn attach_current_thread(&self) -> Result<JniEnv, BridgeError> {
        let mut env_ptr: *mut std::os::raw::c_void = ptr::null_mut();
        let res = unsafe { crate::jvm_call!(self.vm, AttachCurrentThread, &mut env_ptr, ptr::null_mut()) };
        if res != jni::JNI_OK || env_ptr.is_null() {
            return Err(BridgeError::Platform(format!(
                "could not attach the current thread to the Java VM (code {res})"
            )));
        }
        Ok(unsafe { JniEnv::from_raw(env_ptr as *mut jni::JNIEnv) })
    }

    /// Destroy the JVM. The VM is never touched again, whatever the outcome.
    pub fn destroy(mut self) -> Result<(), BridgeError> {
        self.destroyed = true;
        let res = unsafe { crate::jvm_call!(self.vm, DestroyJavaVM) };
        if res != jni::JNI_OK {
            log::error!("DestroyJavaVM failed with code {res}");
            return Err(BridgeError::Platform("could not destroy Java VM".to_string()));
        }
        Ok(())
    }
}

impl Drop for JavaVm {
    fn drop(&mut self) {
        if self.destroyed || self.vm.is_null() {
            return;
        }
        unsafe {
            let _ = crate::jvm_call!(self.vm, DestroyJavaVM);
        }
    }
}

// The invocation interface is callable from any thread.
unsafe impl Send for JavaVm {}
unsafe impl Sync for JavaVm {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classpath_comes_first_then_headless() {
        let mut options = LaunchOptions::new("/opt/app/classes");
        options.extra_options.push("-Xmx64m".to_string());
        assert_eq!(
            options.jvm_options(),
            vec![
                "-Djava.class.path=/opt/app/classes".to_string(),
                HEADLESS_OPTION.to_string(),
                "-Xmx64m".to_string(),
            ]
        );
    }

    #[test]
    fn nul_in_classpath_is_a_platform_error() {
        let options = LaunchOptions::new("a\0b");
        assert!(matches!(options.builder(), Err(BridgeError::Platform(_))));
    }

    #[test]
    fn missing_library_is_reported_without_creating_anything() {
        let options = LaunchOptions::new("/tmp").runtime_path("/nonexistent/libjvm.so");
        let err = JavaVm::launch(&options).err().unwrap();
        assert_eq!(
            err.to_string(),
            "jvmerr: unable to load JVM library from <runtime path>"
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn library_without_entry_point_is_rejected() {
        let err = JavaVmBuilder::new(jni::JNI_VERSION_1_8)
            .create_from_library("libc.so.6")
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "jvmerr: invalid JVM library from <runtime path> (missing JNI_CreateJavaVM)"
        );
    }

    #[test]
    fn java_home_candidates_use_platform_filename() {
        let candidates = candidates_from_java_home(Path::new("/jdk"));
        assert!(candidates[0].ends_with(format!("lib/server/{}", libjvm_filename())));
    }
}
