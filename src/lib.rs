//! # jvm-external
//!
//! A scripting-host plugin ("external") that embeds a Java VM.
//!
//! The host loads the library, reads its declaration table and calls the
//! exported handlers with string arguments. Through them it can:
//! - load and unload one JVM per process
//! - load Java-side external libraries and list what they register
//! - call the registered commands and functions
//!
//! Arguments and results are UTF-8 text.
//!
//! Java code reaches back into the host (variables, globals, arrays, fields,
//! images, messages) through native methods registered on the dispatch
//! class while the JVM loads.
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`sys`] | raw JNI and host C ABI |
//! | [`env`], [`vm`] | JNI environment wrapper, JVM creation |
//! | [`host`] | host storage as a trait, plus the C callback adapter |
//! | [`marshal`] | host values to and from Java objects |
//! | [`reflect`] | cached classes and method IDs |
//! | [`exception`] | turning Java exceptions into error text |
//! | [`callbacks`] | Java-to-host native methods |
//! | [`lifecycle`] | the JVM state machine |
//! | [`runtime`] | JNI implementation of the lifecycle traits |
//! | [`dispatch`] | host operations and the C exports |
//!
//! ## Driving the bridge from Rust
//!
//! ```rust,ignore
//! use jvm_external::prelude::*;
//!
//! let bridge = Bridge::new(JniLauncher, BridgeConfig::from_env());
//! bridge.dispatch(Operation::LoadJvm, &["/opt/app/classes".into()])?;
//! let squared = bridge.dispatch(Operation::CallFunction, &["square".into(), "4".into()])?;
//! assert_eq!(squared.as_deref(), Some("16"));
//! ```
//!
//! ## Configuration
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `JVMEXT_LOG` | stderr log level (`off` .. `trace`, default `warn`) |
//! | `JVMEXT_JVM_OPTIONS` | extra JVM options, whitespace separated |
//! | `JVM_LIB_PATH` | libjvm to load when no runtime path is given |
//! | `JAVA_HOME` | searched for libjvm when `JVM_LIB_PATH` is unset |
//!
//! With the `linked-jvm` feature, a missing runtime path uses the
//! `JNI_CreateJavaVM` linked into the process instead.

pub mod callbacks;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod exception;
pub mod host;
pub mod lifecycle;
pub mod logging;
pub mod marshal;
pub mod prelude;
pub mod reflect;
pub mod runtime;
pub mod sys;
pub mod vm;

pub use config::BridgeConfig;
pub use dispatch::Operation;
pub use error::{BridgeError, Result};
pub use lifecycle::{Bridge, JvmState};
