//! Raw FFI definitions.
//!
//! [`jni`] mirrors `jni.h`; [`host`] mirrors the C contract of the scripting
//! host that loads this library as an external.

pub mod host;
pub mod jni;
