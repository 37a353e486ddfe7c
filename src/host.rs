//! The host's storage, seen from the bridge.
//!
//! [`Host`] is what Java-to-host callbacks talk to. [`XcbHost`] implements it
//! on top of the C callback table the host hands over at start-up; tests
//! implement it directly.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_ulong};
use std::ptr;
use std::sync::Arc;

use parking_lot::{const_rwlock, RwLock};

use crate::sys::host::{HostCallbacks, RawExternalString, EXTERNAL_FAILURE, EXTERNAL_SUCCESS};

/// Binary-safe string data owned by the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExternalString {
    bytes: Vec<u8>,
}

impl ExternalString {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        ExternalString { bytes: bytes.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Copy a host buffer. A null buffer or a negative length reads as empty.
    ///
    /// # Safety
    /// `raw.buffer` must point to at least `raw.length` readable bytes.
    pub unsafe fn from_raw(raw: &RawExternalString) -> Self {
        if raw.buffer.is_null() || raw.length <= 0 {
            return ExternalString::default();
        }
        let bytes = std::slice::from_raw_parts(raw.buffer as *const u8, raw.length as usize);
        ExternalString::new(bytes)
    }

    /// Borrow as a host buffer. The view is only valid while `self` is alive.
    pub fn as_raw(&self) -> RawExternalString {
        RawExternalString {
            buffer: self.bytes.as_ptr() as *const c_char,
            length: self.bytes.len() as c_int,
        }
    }
}

impl From<&str> for ExternalString {
    fn from(s: &str) -> Self {
        ExternalString::new(s.as_bytes())
    }
}

/// Key/value pairs of one host array, in the order they were added.
///
/// [`insert`](Self::insert) keeps keys unique. [`push`](Self::push) appends
/// unconditionally, for element-wise copies that must keep every element;
/// [`get`](Self::get) then sees the last one pushed, like the host's own
/// set-array does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedAssociation {
    entries: Vec<(String, ExternalString)>,
    index: HashMap<String, usize>,
}

impl KeyedAssociation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        KeyedAssociation {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert or replace the value stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: ExternalString) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&position) => self.entries[position].1 = value,
            None => self.push(key, value),
        }
    }

    /// Append an element without looking for an existing key.
    pub fn push(&mut self, key: impl Into<String>, value: ExternalString) {
        let key = key.into();
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&ExternalString> {
        self.index.get(key).map(|&position| &self.entries[position].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExternalString)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries sorted by key, for order-insensitive comparison.
    pub fn sorted(&self) -> Vec<(String, ExternalString)> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl<K: Into<String>> FromIterator<(K, ExternalString)> for KeyedAssociation {
    fn from_iter<I: IntoIterator<Item = (K, ExternalString)>>(iter: I) -> Self {
        let mut assoc = KeyedAssociation::new();
        for (k, v) in iter {
            assoc.insert(k, v);
        }
        assoc
    }
}

/// How a field or image is picked out within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    Name(&'a str),
    Number(i32),
    Id(u64),
}

/// Host storage and messaging, as called from Java.
///
/// Every operation reports failure as `false` / `None`; none of them panic or
/// raise.
pub trait Host: Send + Sync {
    fn send_card_message(&self, message: &str) -> bool;
    fn eval_expr(&self, expression: &str) -> Option<String>;

    fn global(&self, name: &str) -> Option<String>;
    fn set_global(&self, name: &str, value: &str) -> bool;

    fn variable(&self, name: &str) -> Option<String>;
    fn set_variable(&self, name: &str, value: &str) -> bool;

    fn variable_ex(&self, name: &str, key: &str) -> Option<ExternalString>;
    fn set_variable_ex(&self, name: &str, key: &str, value: &ExternalString) -> bool;

    /// `None` if the host reports failure; an empty association if the array
    /// has no elements.
    fn array(&self, name: &str) -> Option<KeyedAssociation>;
    fn set_array(&self, name: &str, entries: &KeyedAssociation) -> bool;

    fn field(&self, group: &str, selector: Selector<'_>) -> Option<String>;
    fn set_field(&self, group: &str, selector: Selector<'_>, value: &str) -> bool;

    fn show_image(&self, group: &str, selector: Selector<'_>) -> bool;
}

// =========================================================================
// Installed host
// =========================================================================

static HOST: RwLock<Option<Arc<dyn Host>>> = const_rwlock(None);

/// Make `host` the target of every Java-to-host callback.
pub fn install_host(host: Arc<dyn Host>) {
    *HOST.write() = Some(host);
}

pub fn installed_host() -> Option<Arc<dyn Host>> {
    HOST.read().clone()
}

// =========================================================================
// C callback table adapter
// =========================================================================

/// [`Host`] backed by the host's C callback table.
pub struct XcbHost {
    callbacks: &'static HostCallbacks,
}

/// A host-allocated string, released through the host's `free` on drop.
struct HostBuffer<'a> {
    callbacks: &'a HostCallbacks,
    ptr: *mut c_char,
}

impl<'a> HostBuffer<'a> {
    fn to_string_lossy(&self) -> String {
        if self.ptr.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(self.ptr) }.to_string_lossy().into_owned()
    }
}

impl<'a> Drop for HostBuffer<'a> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { (self.callbacks.free)(self.ptr as *mut std::ffi::c_void) }
        }
    }
}

/// NUL-terminated copies of a batch of keys plus the pointer array the host
/// reads. Both halves are released together.
struct CStringArray {
    _owned: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl CStringArray {
    fn new<'a>(items: impl Iterator<Item = &'a str>) -> Option<Self> {
        let owned = items.map(|s| CString::new(s).ok()).collect::<Option<Vec<_>>>()?;
        let ptrs = owned.iter().map(|s| s.as_ptr()).collect();
        Some(CStringArray { _owned: owned, ptrs })
    }
}

fn c_string(s: &str) -> Option<CString> {
    match CString::new(s) {
        Ok(c) => Some(c),
        Err(_) => {
            log::warn!("host call skipped: argument contains a NUL byte");
            None
        }
    }
}

impl XcbHost {
    /// # Safety
    /// Every function pointer in `callbacks` must be callable for the rest
    /// of the process lifetime.
    pub unsafe fn new(callbacks: &'static HostCallbacks) -> Self {
        XcbHost { callbacks }
    }

    fn status(&self, f: impl FnOnce(*mut c_int)) -> bool {
        let mut success = EXTERNAL_FAILURE;
        f(&mut success);
        success == EXTERNAL_SUCCESS
    }

    fn text(&self, f: impl FnOnce(*mut c_int) -> *mut c_char) -> Option<String> {
        let mut success = EXTERNAL_FAILURE;
        let buffer = HostBuffer {
            callbacks: self.callbacks,
            ptr: f(&mut success),
        };
        (success == EXTERNAL_SUCCESS).then(|| buffer.to_string_lossy())
    }
}

impl Host for XcbHost {
    fn send_card_message(&self, message: &str) -> bool {
        let Some(message) = c_string(message) else { return false };
        self.status(|s| unsafe { (self.callbacks.send_card_message)(message.as_ptr(), s) })
    }

    fn eval_expr(&self, expression: &str) -> Option<String> {
        let expression = c_string(expression)?;
        self.text(|s| unsafe { (self.callbacks.eval_expr)(expression.as_ptr(), s) })
    }

    fn global(&self, name: &str) -> Option<String> {
        let name = c_string(name)?;
        self.text(|s| unsafe { (self.callbacks.get_global)(name.as_ptr(), s) })
    }

    fn set_global(&self, name: &str, value: &str) -> bool {
        let (Some(name), Some(value)) = (c_string(name), c_string(value)) else { return false };
        self.status(|s| unsafe { (self.callbacks.set_global)(name.as_ptr(), value.as_ptr(), s) })
    }

    fn variable(&self, name: &str) -> Option<String> {
        let name = c_string(name)?;
        self.text(|s| unsafe { (self.callbacks.get_variable)(name.as_ptr(), s) })
    }

    fn set_variable(&self, name: &str, value: &str) -> bool {
        let (Some(name), Some(value)) = (c_string(name), c_string(value)) else { return false };
        self.status(|s| unsafe { (self.callbacks.set_variable)(name.as_ptr(), value.as_ptr(), s) })
    }

    fn variable_ex(&self, name: &str, key: &str) -> Option<ExternalString> {
        let name = c_string(name)?;
        let key = c_string(key)?;
        let mut raw = RawExternalString::empty();
        let ok = self.status(|s| unsafe {
            (self.callbacks.get_variable_ex)(name.as_ptr(), key.as_ptr(), &mut raw, s)
        });
        ok.then(|| unsafe { ExternalString::from_raw(&raw) })
    }

    fn set_variable_ex(&self, name: &str, key: &str, value: &ExternalString) -> bool {
        let (Some(name), Some(key)) = (c_string(name), c_string(key)) else { return false };
        let raw = value.as_raw();
        self.status(|s| unsafe {
            (self.callbacks.set_variable_ex)(name.as_ptr(), key.as_ptr(), &raw, s)
        })
    }

    fn array(&self, name: &str) -> Option<KeyedAssociation> {
        let name = c_string(name)?;
        let mut count: c_int = 0;
        let ok = self.status(|s| unsafe {
            (self.callbacks.get_array)(name.as_ptr(), &mut count, ptr::null_mut(), ptr::null_mut(), s)
        });
        if !ok {
            return None;
        }
        if count <= 0 {
            return Some(KeyedAssociation::new());
        }

        let mut values = vec![RawExternalString::empty(); count as usize];
        let mut keys: Vec<*mut c_char> = vec![ptr::null_mut(); count as usize];
        let ok = self.status(|s| unsafe {
            (self.callbacks.get_array)(name.as_ptr(), &mut count, values.as_mut_ptr(), keys.as_mut_ptr(), s)
        });
        if !ok {
            return None;
        }

        let filled = (count.max(0) as usize).min(values.len());
        let mut assoc = KeyedAssociation::with_capacity(filled);
        for (raw, key) in values.iter().zip(keys.iter()).take(filled) {
            if key.is_null() {
                continue;
            }
            let key = unsafe { CStr::from_ptr(*key) }.to_string_lossy().into_owned();
            assoc.insert(key, unsafe { ExternalString::from_raw(raw) });
        }
        Some(assoc)
    }

    fn set_array(&self, name: &str, entries: &KeyedAssociation) -> bool {
        let Some(name) = c_string(name) else { return false };
        let Some(keys) = CStringArray::new(entries.iter().map(|(k, _)| k)) else {
            log::warn!("set-array skipped: a key contains a NUL byte");
            return false;
        };
        let values: Vec<RawExternalString> = entries.iter().map(|(_, v)| v.as_raw()).collect();
        self.status(|s| unsafe {
            (self.callbacks.set_array)(
                name.as_ptr(),
                values.len() as c_int,
                values.as_ptr(),
                keys.ptrs.as_ptr(),
                s,
            )
        })
    }

    fn field(&self, group: &str, selector: Selector<'_>) -> Option<String> {
        let group = c_string(group)?;
        match selector {
            Selector::Name(name) => {
                let name = c_string(name)?;
                self.text(|s| unsafe { (self.callbacks.get_field_by_name)(group.as_ptr(), name.as_ptr(), s) })
            }
            Selector::Number(index) => {
                self.text(|s| unsafe { (self.callbacks.get_field_by_num)(group.as_ptr(), index, s) })
            }
            Selector::Id(id) => {
                self.text(|s| unsafe { (self.callbacks.get_field_by_id)(group.as_ptr(), id as c_ulong, s) })
            }
        }
    }

    fn set_field(&self, group: &str, selector: Selector<'_>, value: &str) -> bool {
        let (Some(group), Some(value)) = (c_string(group), c_string(value)) else { return false };
        match selector {
            Selector::Name(name) => {
                let Some(name) = c_string(name) else { return false };
                self.status(|s| unsafe {
                    (self.callbacks.set_field_by_name)(group.as_ptr(), name.as_ptr(), value.as_ptr(), s)
                })
            }
            Selector::Number(index) => self.status(|s| unsafe {
                (self.callbacks.set_field_by_num)(group.as_ptr(), index, value.as_ptr(), s)
            }),
            Selector::Id(id) => self.status(|s| unsafe {
                (self.callbacks.set_field_by_id)(group.as_ptr(), id as c_ulong, value.as_ptr(), s)
            }),
        }
    }

    fn show_image(&self, group: &str, selector: Selector<'_>) -> bool {
        let Some(group) = c_string(group) else { return false };
        match selector {
            Selector::Name(name) => {
                let Some(name) = c_string(name) else { return false };
                self.status(|s| unsafe { (self.callbacks.show_image_by_name)(group.as_ptr(), name.as_ptr(), s) })
            }
            Selector::Number(index) => {
                self.status(|s| unsafe { (self.callbacks.show_image_by_num)(group.as_ptr(), index, s) })
            }
            Selector::Id(id) => {
                self.status(|s| unsafe { (self.callbacks.show_image_by_id)(group.as_ptr(), id as c_ulong, s) })
            }
        }
    }
}
