//! Type descriptor for host-runtime embedding.
//!
//! A host runtime embeds this crate by defining one constructible object
//! type from the descriptor below and registering the finalizer callback
//! against each instance it wraps. These are the only two entry points the
//! host's object machinery needs.

use crate::engine::UpasmEngine;
use crate::error::UpasmError;
use crate::handle::UpasmHandle;
use crate::lifecycle::{upasm_finalize, upasm_open};
use std::ffi::c_void;
use std::os::raw::c_char;

/// Construction entry point signature.
pub type UpasmConstructFn = unsafe extern "C" fn(
    engine: *const UpasmEngine,
    root: *const c_char,
    binding: *mut c_void,
    error: *mut UpasmError,
) -> *mut UpasmHandle;

/// Per-instance finalizer callback signature: the native pointer being
/// collected plus the opaque hint supplied at registration time.
pub type UpasmFinalizeFn = unsafe extern "C" fn(data: *mut c_void, hint: *mut c_void);

/// Descriptor for the constructible object type exposed to host runtimes.
#[repr(C)]
pub struct UpasmClassDescriptor {
    /// Static type name. Do not free this string.
    pub name: *const c_char,
    /// Construction entry point (`upasm_open`).
    pub construct: UpasmConstructFn,
    /// Finalizer to register per instance (`upasm_finalize`).
    pub finalize: UpasmFinalizeFn,
}

/// Get the class descriptor for the engine instance type.
///
/// # Returns
///
/// Descriptor by value; the `name` field points to a static string.
#[unsafe(no_mangle)]
pub extern "C" fn upasm_class_descriptor() -> UpasmClassDescriptor {
    // Include null terminator in the static string
    static TYPE_NAME: &[u8] = b"UpasmInstance\0";

    UpasmClassDescriptor {
        name: TYPE_NAME.as_ptr() as *const c_char,
        construct: upasm_open,
        finalize: upasm_finalize,
    }
}
