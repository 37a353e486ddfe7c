//! Bridge configuration.
//!
//! Everything has a working default; the environment can override the log
//! level and append extra JVM options.

use log::LevelFilter;

use crate::sys::jni;

/// Extra JVM options, whitespace separated (e.g. `-Xmx512m -Dfoo=bar`).
pub const ENV_JVM_OPTIONS: &str = "JVMEXT_JVM_OPTIONS";
/// Log level for the stderr logger (`off`, `error`, `warn`, `info`, `debug`, `trace`).
pub const ENV_LOG: &str = "JVMEXT_LOG";

pub const DEFAULT_EXTERNAL_STRING_CLASS: &str = "com/quartam/external/ExternalString";
pub const DEFAULT_HOST_BRIDGE_CLASS: &str = "com/quartam/internal/ExternalHost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// JNI version requested from `JNI_CreateJavaVM`.
    pub jni_version: jni::jint,
    /// Binary class name of the byte-oriented string wrapper.
    pub external_string_class: String,
    /// Binary class name of the callback-dispatch singleton.
    pub host_bridge_class: String,
    /// Options appended after the classpath and headless options.
    pub extra_jvm_options: Vec<String>,
    pub log_level: LevelFilter,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            jni_version: jni::JNI_VERSION_1_8,
            external_string_class: DEFAULT_EXTERNAL_STRING_CLASS.to_string(),
            host_bridge_class: DEFAULT_HOST_BRIDGE_CLASS.to_string(),
            extra_jvm_options: Vec::new(),
            log_level: LevelFilter::Warn,
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `JVMEXT_JVM_OPTIONS` and `JVMEXT_LOG`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`BridgeConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = BridgeConfig::default();
        if let Some(options) = lookup(ENV_JVM_OPTIONS) {
            config.extra_jvm_options = options.split_whitespace().map(str::to_string).collect();
        }
        if let Some(level) = lookup(ENV_LOG) {
            match level.trim().parse::<LevelFilter>() {
                Ok(level) => config.log_level = level,
                Err(_) => log::warn!("ignoring unrecognised {ENV_LOG} value {level:?}"),
            }
        }
        config
    }

    /// JNI signature of a method returning the dispatch singleton.
    pub fn host_bridge_instance_signature(&self) -> String {
        format!("()L{};", self.host_bridge_class)
    }

    /// JNI type descriptor of the string wrapper.
    pub fn external_string_descriptor(&self) -> String {
        format!("L{};", self.external_string_class)
    }

    /// The class name in the dotted form Java programmers read.
    pub fn dotted(class: &str) -> String {
        class.replace('/', ".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_defaults() {
        let config = BridgeConfig::from_lookup(|key| match key {
            ENV_JVM_OPTIONS => Some("-Xmx64m  -Dx=y".to_string()),
            ENV_LOG => Some("debug".to_string()),
            _ => None,
        });
        assert_eq!(config.extra_jvm_options, vec!["-Xmx64m", "-Dx=y"]);
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn bad_log_level_keeps_default() {
        let config = BridgeConfig::from_lookup(|key| (key == ENV_LOG).then(|| "loud".to_string()));
        assert_eq!(config.log_level, LevelFilter::Warn);
    }

    #[test]
    fn descriptors_use_slashed_names() {
        let config = BridgeConfig::default();
        assert_eq!(
            config.host_bridge_instance_signature(),
            "()Lcom/quartam/internal/ExternalHost;"
        );
        assert_eq!(
            BridgeConfig::dotted(&config.external_string_class),
            "com.quartam.external.ExternalString"
        );
    }
}
