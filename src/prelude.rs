//! Common imports for driving the bridge or implementing a test double.

pub use crate::config::BridgeConfig;
pub use crate::dispatch::{Arity, Kind, Operation};
pub use crate::error::{BridgeError, Result};
pub use crate::host::{ExternalString, Host, KeyedAssociation, Selector};
pub use crate::lifecycle::{Bridge, Invocation, JvmState, Launcher, Listing, Runtime};
pub use crate::runtime::JniLauncher;
pub use crate::vm::LaunchOptions;
