// jvm-external/src/sys/host.rs
//
// Raw C ABI shared with the scripting host.
//
// The host loads this library as an "external": it calls the exported
// handlers with an argument vector and reads back a result string plus two
// flags, and it hands the library a table of callbacks for reaching its own
// variable, field and image storage. Every callback reports its outcome via
// a trailing `success` out-parameter holding EXTERNAL_SUCCESS or
// EXTERNAL_FAILURE.

#![allow(non_camel_case_types)]

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_ulong};

pub const EXTERNAL_SUCCESS: c_int = 0;
pub const EXTERNAL_FAILURE: c_int = 1;

pub const HOST_TRUE: c_int = 1;
pub const HOST_FALSE: c_int = 0;

/// Length-tagged, binary-safe byte buffer.
///
/// Buffers returned by the host stay owned by the host; buffers passed to
/// the host are only borrowed for the duration of the callback.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct RawExternalString {
    pub buffer: *const c_char,
    pub length: c_int,
}

impl RawExternalString {
    pub const fn empty() -> Self {
        RawExternalString {
            buffer: std::ptr::null(),
            length: 0,
        }
    }
}

/// Signature shared by every exported command and function handler.
///
/// `r_result` receives a `malloc`-allocated C string (or null) that the host
/// releases with `free`.
pub type ExternalHandler = unsafe extern "C" fn(
    arguments: *const *const c_char,
    argument_count: c_int,
    r_result: *mut *mut c_char,
    r_pass: *mut c_int,
    r_error: *mut c_int,
);

pub const DECLARATION_COMMAND: c_char = b'c' as c_char;
pub const DECLARATION_FUNCTION: c_char = b'f' as c_char;

/// One entry of the table the host reads to learn the exported handlers.
#[repr(C)]
pub struct ExternalDeclaration {
    pub name: *const c_char,
    pub kind: c_char,
    pub handler: ExternalHandler,
}

// The table only holds pointers to 'static data and function pointers.
unsafe impl Sync for ExternalDeclaration {}

/// Callback table supplied by the host.
///
/// Strings returned by `eval_expr`, `get_global`, `get_variable` and the
/// `get_field_by_*` entries are allocated by the host and must be handed back
/// through `free`. External strings and key arrays filled in by
/// `get_variable_ex` and `get_array` are borrowed from the host.
#[repr(C)]
pub struct HostCallbacks {
    pub send_card_message: unsafe extern "C" fn(message: *const c_char, success: *mut c_int),
    pub eval_expr:
        unsafe extern "C" fn(expression: *const c_char, success: *mut c_int) -> *mut c_char,

    pub get_global: unsafe extern "C" fn(name: *const c_char, success: *mut c_int) -> *mut c_char,
    pub set_global:
        unsafe extern "C" fn(name: *const c_char, value: *const c_char, success: *mut c_int),

    pub get_variable:
        unsafe extern "C" fn(name: *const c_char, success: *mut c_int) -> *mut c_char,
    pub set_variable:
        unsafe extern "C" fn(name: *const c_char, value: *const c_char, success: *mut c_int),

    pub get_variable_ex: unsafe extern "C" fn(
        name: *const c_char,
        key: *const c_char,
        value: *mut RawExternalString,
        success: *mut c_int,
    ),
    pub set_variable_ex: unsafe extern "C" fn(
        name: *const c_char,
        key: *const c_char,
        value: *const RawExternalString,
        success: *mut c_int,
    ),

    /// Called once with null `values`/`keys` to learn the element count, then
    /// again with arrays of that size.
    pub get_array: unsafe extern "C" fn(
        name: *const c_char,
        count: *mut c_int,
        values: *mut RawExternalString,
        keys: *mut *mut c_char,
        success: *mut c_int,
    ),
    pub set_array: unsafe extern "C" fn(
        name: *const c_char,
        count: c_int,
        values: *const RawExternalString,
        keys: *const *const c_char,
        success: *mut c_int,
    ),

    pub get_field_by_name: unsafe extern "C" fn(
        group: *const c_char,
        name: *const c_char,
        success: *mut c_int,
    ) -> *mut c_char,
    pub get_field_by_num:
        unsafe extern "C" fn(group: *const c_char, index: c_int, success: *mut c_int) -> *mut c_char,
    pub get_field_by_id:
        unsafe extern "C" fn(group: *const c_char, id: c_ulong, success: *mut c_int) -> *mut c_char,

    pub set_field_by_name: unsafe extern "C" fn(
        group: *const c_char,
        name: *const c_char,
        value: *const c_char,
        success: *mut c_int,
    ),
    pub set_field_by_num: unsafe extern "C" fn(
        group: *const c_char,
        index: c_int,
        value: *const c_char,
        success: *mut c_int,
    ),
    pub set_field_by_id: unsafe extern "C" fn(
        group: *const c_char,
        id: c_ulong,
        value: *const c_char,
        success: *mut c_int,
    ),

    pub show_image_by_name:
        unsafe extern "C" fn(group: *const c_char, name: *const c_char, success: *mut c_int),
    pub show_image_by_num:
        unsafe extern "C" fn(group: *const c_char, index: c_int, success: *mut c_int),
    pub show_image_by_id:
        unsafe extern "C" fn(group: *const c_char, id: c_ulong, success: *mut c_int),

    pub free: unsafe extern "C" fn(ptr: *mut c_void),
}
