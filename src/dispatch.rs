//! Host-facing operations and the exported C handlers.
//!
//! The host calls each handler with its argument vector and reads back a
//! `(result, pass, error)` triple. [`Bridge::dispatch`] does the work on
//! plain Rust values; [`handle`] does the C conversion around it.
//!
//! # Declarations
//!
//! Every operation is exported under a long name and, for the library,
//! listing and call operations, a short alias:
//!
//! | Operation | Names | Kind |
//! |---|---|---|
//! | load JVM | `loadjvm` | command |
//! | unload JVM | `unloadjvm` | command |
//! | is loaded | `jvmisloaded` | function |
//! | status | `jvmstatus` | function |
//! | exception text | `exceptiontext` | function |
//! | load library | `loadexternallibrary`, `loadxlib` | command |
//! | unload library | `unloadexternallibrary`, `unloadxlib` | command |
//! | list libraries | `externallibraries`, `xlibs` | function |
//! | list packages | `externalpackages`, `xpacks` | function |
//! | list commands | `externalcommands`, `xcmds` | function |
//! | list functions | `externalfunctions`, `xfcns` | function |
//! | call command | `callexternalcommand`, `callxcmd` | command |
//! | call function | `callexternalfunction`, `callxfcn` | function |
//!
//! The exported names carry the [`DECLARATION_PREFIX`].

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, OnceLock};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::host::{self, XcbHost};
use crate::lifecycle::{Bridge, Invocation, Launcher, Listing};
use crate::logging::StderrLogger;
use crate::runtime::JniLauncher;
use crate::sys::host::{
    ExternalDeclaration, ExternalHandler, HostCallbacks, DECLARATION_COMMAND, DECLARATION_FUNCTION,
    EXTERNAL_FAILURE, EXTERNAL_SUCCESS, HOST_FALSE, HOST_TRUE,
};

/// Prefix of every exported declaration name.
pub const DECLARATION_PREFIX: &str = "jvmext_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    LoadJvm,
    UnloadJvm,
    IsJvmLoaded,
    JvmStatus,
    ExceptionText,
    LoadLibrary,
    UnloadLibrary,
    Libraries,
    Packages,
    Commands,
    Functions,
    CallCommand,
    CallFunction,
}

/// Whether the host invokes an operation as a command or a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Command,
    Function,
}

impl Kind {
    pub const fn code(self) -> c_char {
        match self {
            Kind::Command => DECLARATION_COMMAND,
            Kind::Function => DECLARATION_FUNCTION,
        }
    }
}

/// Accepted argument counts of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
    /// How the expected parameters are described in the error message.
    pub expected: &'static str,
}

impl Arity {
    const fn none() -> Self {
        Arity { min: 0, max: Some(0), expected: "none" }
    }

    pub fn check(&self, count: usize) -> Result<()> {
        let too_many = self.max.is_some_and(|max| count > max);
        if count < self.min || too_many {
            return Err(BridgeError::Arity { expected: self.expected });
        }
        Ok(())
    }
}

impl Operation {
    pub fn arity(self) -> Arity {
        match self {
            Operation::LoadJvm => Arity {
                min: 1,
                max: Some(2),
                expected: "<class path>[,<runtime path>]",
            },
            Operation::LoadLibrary | Operation::UnloadLibrary => Arity {
                min: 1,
                max: Some(1),
                expected: "<library path>",
            },
            Operation::CallCommand => Arity {
                min: 1,
                max: None,
                expected: "<command name> [,<param>]*",
            },
            Operation::CallFunction => Arity {
                min: 1,
                max: None,
                expected: "<function name> [,<param>]*",
            },
            Operation::UnloadJvm
            | Operation::IsJvmLoaded
            | Operation::JvmStatus
            | Operation::ExceptionText
            | Operation::Libraries
            | Operation::Packages
            | Operation::Commands
            | Operation::Functions => Arity::none(),
        }
    }

    /// Look an operation up by declared name, with or without the prefix.
    /// Case-insensitive, like the host's own name matching.
    pub fn from_name(name: &str) -> Option<Operation> {
        let name = name.to_ascii_lowercase();
        let name = name.strip_prefix(DECLARATION_PREFIX).unwrap_or(&name);
        OPERATION_NAMES
            .iter()
            .find(|(declared, _, _)| *declared == name)
            .map(|(_, op, _)| *op)
    }

    pub fn kind(self) -> Kind {
        OPERATION_NAMES
            .iter()
            .find(|(_, op, _)| *op == self)
            .map(|(_, _, kind)| *kind)
            .unwrap_or(Kind::Function)
    }
}

impl<L: Launcher> Bridge<L> {
    /// Run one host operation. Arity is checked before anything else.
    ///
    /// `Ok(None)` means success with an empty result.
    pub fn dispatch(&self, op: Operation, args: &[String]) -> Result<Option<String>> {
        op.arity().check(args.len())?;
        log::debug!("dispatch {op:?} with {} argument(s)", args.len());

        match op {
            Operation::LoadJvm => self.load(&args[0], args.get(1).map(String::as_str)).map(|()| None),
            Operation::UnloadJvm => self.unload().map(|()| None),
            Operation::IsJvmLoaded => Ok(Some(self.is_loaded().to_string())),
            Operation::JvmStatus => Ok(Some(self.state().as_str().to_string())),
            Operation::ExceptionText => Ok(Some(self.exception_text())),
            Operation::LoadLibrary => self.load_library(&args[0]).map(|()| None),
            Operation::UnloadLibrary => self.unload_library(&args[0]).map(|()| None),
            Operation::Libraries => self.listing(Listing::Libraries).map(Some),
            Operation::Packages => self.listing(Listing::Packages).map(Some),
            Operation::Commands => self.listing(Listing::Commands).map(Some),
            Operation::Functions => self.listing(Listing::Functions).map(Some),
            Operation::CallCommand => self.invoke(Invocation::Command, &args[0], &args[1..]),
            Operation::CallFunction => self.invoke(Invocation::Function, &args[0], &args[1..]),
        }
    }
}

// =============================================================================
// C boundary
// =============================================================================

static BRIDGE: OnceLock<Bridge<JniLauncher>> = OnceLock::new();

/// The process-wide bridge, created on first use from the environment.
pub fn global_bridge() -> &'static Bridge<JniLauncher> {
    BRIDGE.get_or_init(|| {
        let config = BridgeConfig::from_env();
        StderrLogger::init(config.log_level);
        log::debug!("bridge created");
        Bridge::new(JniLauncher, config)
    })
}

/// Copy the host's argument vector. Null entries read as empty strings.
///
/// The host hands arguments over as UTF-8 and they are passed on unmodified.
/// An argument that is not valid UTF-8 has its bad bytes replaced with
/// U+FFFD, and a warning is logged.
///
/// # Safety
/// `arguments` must point to `count` C strings (or be null with `count` 0).
pub unsafe fn collect_arguments(arguments: *const *const c_char, count: c_int) -> Vec<String> {
    if arguments.is_null() || count <= 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(arguments, count as usize)
        .iter()
        .enumerate()
        .map(|(index, &arg)| {
            if arg.is_null() {
                return String::new();
            }
            let bytes = CStr::from_ptr(arg).to_bytes();
            match std::str::from_utf8(bytes) {
                Ok(text) => text.to_owned(),
                Err(err) => {
                    log::warn!("argument {index} is not valid UTF-8 ({err}), replacing invalid bytes");
                    String::from_utf8_lossy(bytes).into_owned()
                }
            }
        })
        .collect()
}

/// `malloc` a NUL-terminated copy of `text` for the host to `free`.
/// Text after an embedded NUL is cut off.
pub fn malloc_c_string(text: &str) -> *mut c_char {
    let bytes = text.as_bytes();
    let bytes = match bytes.iter().position(|&b| b == 0) {
        Some(nul) => &bytes[..nul],
        None => bytes,
    };
    unsafe {
        let buffer = libc::malloc(bytes.len() + 1) as *mut u8;
        if buffer.is_null() {
            return ptr::null_mut();
        }
        ptr::copy_nonoverlapping(bytes.as_ptr(), buffer, bytes.len());
        *buffer.add(bytes.len()) = 0;
        buffer as *mut c_char
    }
}

/// Run `op` on `bridge` and write the outcome into the host's triple.
///
/// # Safety
/// The output pointers must be null or valid for writes; `arguments` as for
/// [`collect_arguments`].
pub unsafe fn handle_with<L: Launcher>(
    bridge: &Bridge<L>,
    op: Operation,
    arguments: *const *const c_char,
    argument_count: c_int,
    r_result: *mut *mut c_char,
    r_pass: *mut c_int,
    r_error: *mut c_int,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let args = collect_arguments(arguments, argument_count);
        bridge.dispatch(op, &args)
    }));

    let (result, failed) = match outcome {
        Ok(Ok(result)) => (result, false),
        Ok(Err(err)) => {
            log::debug!("{op:?} failed: {err}");
            (Some(err.to_string()), true)
        }
        Err(_) => {
            log::error!("panic while handling {op:?}");
            (Some(BridgeError::InternalException.to_string()), true)
        }
    };

    if !r_result.is_null() {
        *r_result = result.as_deref().map_or(ptr::null_mut(), malloc_c_string);
    }
    if !r_pass.is_null() {
        *r_pass = HOST_FALSE;
    }
    if !r_error.is_null() {
        *r_error = if failed { HOST_TRUE } else { HOST_FALSE };
    }
}

/// [`handle_with`] on the process-wide bridge.
///
/// # Safety
/// See [`handle_with`].
pub unsafe fn handle(
    op: Operation,
    arguments: *const *const c_char,
    argument_count: c_int,
    r_result: *mut *mut c_char,
    r_pass: *mut c_int,
    r_error: *mut c_int,
) {
    let bridge = match panic::catch_unwind(global_bridge) {
        Ok(bridge) => bridge,
        Err(_) => {
            if !r_result.is_null() {
                *r_result = malloc_c_string(&BridgeError::InternalException.to_string());
            }
            if !r_pass.is_null() {
                *r_pass = HOST_FALSE;
            }
            if !r_error.is_null() {
                *r_error = HOST_TRUE;
            }
            return;
        }
    };
    handle_with(bridge, op, arguments, argument_count, r_result, r_pass, r_error)
}

/// Export a host handler for one [`Operation`].
#[macro_export]
macro_rules! external_handler {
    ($name:ident, $op:expr) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            arguments: *const *const std::os::raw::c_char,
            argument_count: std::os::raw::c_int,
            r_result: *mut *mut std::os::raw::c_char,
            r_pass: *mut std::os::raw::c_int,
            r_error: *mut std::os::raw::c_int,
        ) {
            $crate::dispatch::handle($op, arguments, argument_count, r_result, r_pass, r_error)
        }
    };
}

const fn declare(name: &'static [u8], kind: Kind, handler: ExternalHandler) -> ExternalDeclaration {
    ExternalDeclaration {
        name: name.as_ptr() as *const c_char,
        kind: kind.code(),
        handler,
    }
}

macro_rules! operations {
    ($( $handler:ident => $op:ident, $kind:ident, [$($name:literal),+] );* $(;)?) => {
        $( external_handler!($handler, Operation::$op); )*

        /// Declared names (without prefix), their operation and kind.
        pub const OPERATION_NAMES: &[(&str, Operation, Kind)] = &[
            $( $( ($name, Operation::$op, Kind::$kind), )+ )*
        ];

        /// The table handed to the host.
        pub static DECLARATIONS: &[ExternalDeclaration] = &[
            $( $( declare(concat!("jvmext_", $name, "\0").as_bytes(), Kind::$kind, $handler), )+ )*
        ];
    };
}

operations! {
    jvmext_loadjvm => LoadJvm, Command, ["loadjvm"];
    jvmext_unloadjvm => UnloadJvm, Command, ["unloadjvm"];
    jvmext_jvmisloaded => IsJvmLoaded, Function, ["jvmisloaded"];
    jvmext_jvmstatus => JvmStatus, Function, ["jvmstatus"];
    jvmext_exceptiontext => ExceptionText, Function, ["exceptiontext"];
    jvmext_loadxlib => LoadLibrary, Command, ["loadexternallibrary", "loadxlib"];
    jvmext_unloadxlib => UnloadLibrary, Command, ["unloadexternallibrary", "unloadxlib"];
    jvmext_xlibs => Libraries, Function, ["externallibraries", "xlibs"];
    jvmext_xpacks => Packages, Function, ["externalpackages", "xpacks"];
    jvmext_xcmds => Commands, Function, ["externalcommands", "xcmds"];
    jvmext_xfcns => Functions, Function, ["externalfunctions", "xfcns"];
    jvmext_callxcmd => CallCommand, Command, ["callexternalcommand", "callxcmd"];
    jvmext_callxfcn => CallFunction, Function, ["callexternalfunction", "callxfcn"];
}

/// The declaration table; `count` receives its length.
///
/// # Safety
/// `count` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn jvmext_declarations(count: *mut c_int) -> *const ExternalDeclaration {
    if !count.is_null() {
        *count = DECLARATIONS.len() as c_int;
    }
    DECLARATIONS.as_ptr()
}

/// Hand over the host's callback table. Returns `EXTERNAL_SUCCESS` (0) or
/// `EXTERNAL_FAILURE` (1) for a null table.
///
/// # Safety
/// `callbacks` must stay valid for the rest of the process lifetime.
#[no_mangle]
pub unsafe extern "C" fn jvmext_install_host(callbacks: *const HostCallbacks) -> c_int {
    let Some(callbacks) = callbacks.as_ref() else {
        return EXTERNAL_FAILURE;
    };
    host::install_host(Arc::new(XcbHost::new(callbacks)));
    log::debug!("host callbacks installed");
    EXTERNAL_SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_the_same_operation() {
        assert_eq!(Operation::from_name("callxfcn"), Some(Operation::CallFunction));
        assert_eq!(Operation::from_name("jvmext_CallExternalFunction"), Some(Operation::CallFunction));
        assert_eq!(Operation::from_name("xlibs"), Operation::from_name("externallibraries"));
        assert_eq!(Operation::from_name("nosuchthing"), None);
    }

    #[test]
    fn declaration_table_matches_names() {
        assert_eq!(DECLARATIONS.len(), OPERATION_NAMES.len());
        for (decl, (name, op, kind)) in DECLARATIONS.iter().zip(OPERATION_NAMES) {
            let declared = unsafe { CStr::from_ptr(decl.name) }.to_str().unwrap();
            assert_eq!(declared, format!("{DECLARATION_PREFIX}{name}"));
            assert_eq!(decl.kind, kind.code());
            assert_eq!(op.kind(), *kind);
        }
    }

    #[test]
    fn arity_messages() {
        let err = Operation::LoadJvm.arity().check(3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "jvmerr: illegal number of parameters (expected <class path>[,<runtime path>])"
        );
        assert!(Operation::CallCommand.arity().check(5).is_ok());
        assert!(Operation::JvmStatus.arity().check(1).is_err());
    }

    #[test]
    fn result_strings_are_nul_terminated_copies() {
        let raw = malloc_c_string("16");
        assert_eq!(unsafe { CStr::from_ptr(raw) }.to_str().unwrap(), "16");
        unsafe { libc::free(raw as *mut libc::c_void) };
    }
}
