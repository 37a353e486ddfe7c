#![allow(dead_code)]

pub mod jvm;

use std::sync::{Arc, Mutex, OnceLock};

use jvm_external::prelude::*;

/// What the fake runtime was asked to do, in order.
pub type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Default, Clone)]
pub struct FakeLauncher {
    pub fail_create: bool,
    pub fail_init: bool,
    pub fail_destroy: bool,
    /// Bridge that `reenter` calls are routed to.
    pub reentry: Option<&'static OnceLock<Bridge<FakeLauncher>>>,
    pub journal: Journal,
}

impl FakeLauncher {
    pub fn entries(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

pub struct FakeRuntime {
    launcher: FakeLauncher,
}

impl FakeRuntime {
    fn note(&self, entry: impl Into<String>) {
        self.launcher.journal.lock().unwrap().push(entry.into());
    }
}

fn java_exception(trace: &str) -> BridgeError {
    BridgeError::JavaException { stack_trace: trace.to_string() }
}

impl Launcher for FakeLauncher {
    type Vm = FakeRuntime;

    fn create(&self, options: &LaunchOptions) -> Result<FakeRuntime> {
        self.journal.lock().unwrap().push(format!("create {}", options.jvm_options().join(" ")));
        if self.fail_create {
            return Err(BridgeError::Platform("unable to load JVM library from <runtime path>".into()));
        }
        Ok(FakeRuntime { launcher: self.clone() })
    }
}

impl Runtime for FakeRuntime {
    fn initialize(&mut self, _config: &BridgeConfig) -> Result<()> {
        self.note("initialize");
        if self.launcher.fail_init {
            return Err(BridgeError::Reflection(
                "could not find class 'com.quartam.internal.ExternalHost'".into(),
            ));
        }
        Ok(())
    }

    fn load_library(&self, path: &str) -> Result<()> {
        self.note(format!("load {path}"));
        if path.ends_with(".missing") {
            return Err(java_exception(&format!("java.io.FileNotFoundException: {path}")));
        }
        Ok(())
    }

    fn unload_library(&self, path: &str) -> Result<()> {
        self.note(format!("unload {path}"));
        Ok(())
    }

    fn listing(&self, listing: Listing) -> Result<String> {
        self.note(format!("list {listing:?}"));
        Ok(match listing {
            Listing::Libraries => "/opt/xlibs/math.jar".to_string(),
            Listing::Packages => "com.example.math".to_string(),
            Listing::Commands => "beep\nlog".to_string(),
            Listing::Functions => "square\nconcat".to_string(),
        })
    }

    fn invoke(&self, kind: Invocation, name: &str, params: &[String]) -> Result<Option<String>> {
        self.note(format!("{kind:?} {name}"));
        match (kind, name) {
            (Invocation::Function, "square") => {
                let n: i64 = params
                    .first()
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(|| java_exception("java.lang.NumberFormatException"))?;
                Ok(Some((n * n).to_string()))
            }
            (Invocation::Function, "concat") => Ok(Some(params.concat())),
            (Invocation::Function, "reenter") => {
                let bridge = self.launcher.reentry.and_then(|cell| cell.get()).expect("reentry bridge");
                let status = bridge.dispatch(Operation::JvmStatus, &[])?.unwrap_or_default();
                let unload = match bridge.dispatch(Operation::UnloadJvm, &[]) {
                    Ok(_) => "unloaded".to_string(),
                    Err(err) => err.to_string(),
                };
                Ok(Some(format!("{status}|{unload}")))
            }
            (_, "throw") => Err(java_exception("java.lang.IllegalStateException: boom\n\tat Demo.run")),
            (Invocation::Command, _) => Ok(None),
            (Invocation::Function, _) => Err(java_exception(&format!("no such function {name}"))),
        }
    }

    fn release(&mut self) {
        self.note("release");
    }

    fn destroy(self) -> Result<()> {
        self.note("destroy");
        if self.launcher.fail_destroy {
            return Err(BridgeError::Platform("could not destroy Java VM".into()));
        }
        Ok(())
    }
}

pub fn bridge(launcher: FakeLauncher) -> Bridge<FakeLauncher> {
    Bridge::new(launcher, BridgeConfig::default())
}

pub fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Dispatch by declared name and flatten the outcome the way the host sees
/// it: `(result, error flag)`.
pub fn call(bridge: &Bridge<FakeLauncher>, name: &str, items: &[&str]) -> (String, bool) {
    let op = Operation::from_name(name).expect("known operation");
    match bridge.dispatch(op, &args(items)) {
        Ok(result) => (result.unwrap_or_default(), false),
        Err(err) => (err.to_string(), true),
    }
}
