//! Error type shared by every bridge layer.
//!
//! The `Display` text of each variant is exactly what the host sees as the
//! result string of a failed call.

use thiserror::Error;

use crate::lifecycle::JvmState;

/// Prefix of every host-visible error message.
pub const ERROR_PREFIX: &str = "jvmerr: ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Wrong number of parameters; `expected` describes the signature.
    #[error("jvmerr: illegal number of parameters (expected {expected})")]
    Arity { expected: &'static str },

    /// The operation is not valid in the current lifecycle phase.
    #[error("jvmerr: {}", state_message(*.0))]
    State(JvmState),

    /// load-jvm called after the JVM left its initial phase.
    #[error("jvmerr: JVM is not in status 'initial'")]
    NotInitial(JvmState),

    /// Unload requested while a call into Java is still on the stack.
    #[error("jvmerr: JVM is busy (a call into Java is still in progress)")]
    Busy,

    /// Runtime library, symbol, creation or destruction failure.
    #[error("jvmerr: {0}")]
    Platform(String),

    /// A required Java class or method could not be resolved.
    #[error("jvmerr: {0}")]
    Reflection(String),

    /// Java code threw; the rendered stack trace is kept for exception-text.
    #[error("jvmerr: an exception occurred (use exception-text to examine the stack trace)")]
    JavaException { stack_trace: String },

    /// Rendering a Java exception threw a second exception.
    #[error("jvmerr: an internal exception occurred (no error message available)")]
    InternalException,

    /// A value could not be converted across the runtime boundary.
    #[error("jvmerr: {0}")]
    Marshal(String),
}

fn state_message(state: JvmState) -> &'static str {
    match state {
        JvmState::Uninitialized => "JVM is not loaded",
        JvmState::Loading => "JVM is not initialized",
        JvmState::Loaded => "JVM is already loaded",
        JvmState::Unloading => "JVM is not completely unloaded",
        JvmState::Unloaded => "JVM is already unloaded",
    }
}

impl BridgeError {
    /// Returns true if the error was produced by Java code or by the attempt
    /// to describe it.
    pub fn is_java_exception(&self) -> bool {
        matches!(self, BridgeError::JavaException { .. } | BridgeError::InternalException)
    }

    /// The stack trace carried by a Java exception, if any.
    pub fn stack_trace(&self) -> Option<&str> {
        match self {
            BridgeError::JavaException { stack_trace } => Some(stack_trace),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
