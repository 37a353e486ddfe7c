//! Java exception capture.
//!
//! Every call into Java ends with [`check_and_capture`]. Afterwards the JVM
//! never has an exception pending, whatever the outcome.

use crate::env::{JniEnv, LocalRef};
use crate::error::BridgeError;
use crate::marshal;
use crate::reflect::HostBridge;
use crate::sys::jni;

/// Turn a pending Java exception into a [`BridgeError`].
///
/// The exception is cleared first, then rendered through the dispatch
/// class's static `getExceptionText(Throwable)`. If rendering throws too,
/// that second exception is cleared and the result is
/// [`BridgeError::InternalException`].
pub fn check_and_capture(env: &JniEnv, bridge: &HostBridge) -> Result<(), BridgeError> {
    let Some(throwable) = env.exception_occurred() else {
        return Ok(());
    };
    let throwable = LocalRef::new(env, throwable);
    env.exception_clear();

    let args = [jni::jvalue { l: throwable.get() }];
    let text = LocalRef::new(
        env,
        env.call_static_object_method(bridge.class(), bridge.get_exception_text, &args),
    );
    if env.exception_check() {
        env.exception_clear();
        log::warn!("getExceptionText threw while rendering an exception");
        return Err(BridgeError::InternalException);
    }

    let stack_trace = marshal::java_string_to_native(env, text.get()).unwrap_or_default();
    log::debug!("captured Java exception: {}", stack_trace.lines().next().unwrap_or(""));
    Err(BridgeError::JavaException { stack_trace })
}

/// What the host reads back through exception-text.
///
/// Both slots are overwritten at every boundary crossing and only reflect
/// the most recent one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionState {
    stack_trace: String,
    summary: String,
}

impl ExceptionState {
    pub fn clear(&mut self) {
        self.stack_trace.clear();
        self.summary.clear();
    }

    /// Record the outcome of one call into Java.
    pub fn record<T>(&mut self, outcome: &Result<T, BridgeError>) {
        match outcome {
            Ok(_) => self.clear(),
            Err(err) => {
                self.stack_trace = err.stack_trace().unwrap_or_default().to_string();
                self.summary = err.to_string();
            }
        }
    }

    /// The rendered Java stack trace, empty if the last call did not throw.
    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }

    /// The host-visible message of the last failure, empty after a success.
    pub fn summary(&self) -> &str {
        &self.summary
    }
}
