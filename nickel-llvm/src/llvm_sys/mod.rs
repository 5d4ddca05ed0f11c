//! Safe(r) wrappers around [llvm_sys], covering what code generation and
//! just-in-time execution of nickel programs need.
//!
//! The wrappers assert that the concrete C++ types of arguments match what
//! the callee expects. For example `core::llvm_add_incoming` checks that
//! its first argument is a C++ `PHINode`, and every `core::llvm_build_*`
//! checks that the builder is positioned in a block. Type-checking the IR
//! itself is left to the verifier.
//!
//! These wrappers do not provide full memory safety. Values returned by
//! LLVM are not bound to the lifetime of their context, so using a value
//! after its [LLVMContext](core::LLVMContext) is dropped is undefined behavior.

pub mod core;
pub mod execution_engine;
pub mod pass_builder;
pub mod target;

use llvm_sys::prelude::LLVMBool;
use std::{
    borrow::Cow,
    ffi::{CStr, CString},
};

/// Convert a null-terminated, possibly null, C string to [String].
fn cstr_to_string(ptr: *const ::core::ffi::c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(
        unsafe { CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned(),
    )
}

/// Convert a non-null-terminated, possibly null C string to [String]
fn sized_cstr_to_string(ptr: *const ::core::ffi::c_char, len: usize) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    let slice = unsafe { std::slice::from_raw_parts(ptr as *const u8, len) };
    Some(String::from_utf8_lossy(slice).into_owned())
}

/// Convert a value to `bool`
trait ToBool {
    fn to_bool(&self) -> bool;
}

impl ToBool for LLVMBool {
    fn to_bool(&self) -> bool {
        *self != 0
    }
}

/// Borrow `s` as a C string if it already ends in a null byte,
/// otherwise allocate a null terminated copy.
///
/// Panics if `s` has a null byte anywhere but at its end.
fn to_c_str(mut s: &str) -> Cow<'_, CStr> {
    if s.is_empty() {
        s = "\0";
    }

    match s.find('\0') {
        None => Cow::from(CString::new(s).expect("no null bytes in string")),
        Some(pos) => {
            assert_eq!(pos, s.len() - 1, "interior null byte in {s:?}");
            Cow::from(CStr::from_bytes_with_nul(s.as_bytes()).expect("checked null terminator"))
        }
    }
}
