//! Lifecycle management functions (open, teardown, finalize, close).
//!
//! Construction is synchronous: `upasm_open` either returns a wrapper that
//! owns one live engine instance, or fails with nothing for the host to
//! release. The engine instance is released by whichever of explicit
//! teardown or finalization happens first; the later event finds a
//! torn-down handle and performs no native call.

use crate::engine::UpasmEngine;
use crate::error::UpasmError;
use crate::handle::UpasmHandle;
use crate::util::{set_error_null, set_ok};
use std::ffi::c_void;
use std::os::raw::c_char;

/// Open a new engine instance rooted at the given directory.
///
/// # Parameters
///
/// - `engine`: Loaded engine to instantiate
/// - `root`: Root directory for the instance (UTF-8 encoded, null-terminated)
/// - `binding`: Opaque host-object token passed back to the finalizer; may be NULL.
///   Never dereferenced or kept alive by this layer.
/// - `error`: Out-parameter for error information
///
/// # Returns
///
/// Handle on success, NULL on failure. On failure no native state is
/// retained and the host must not register a finalizer.
///
/// # Ownership
///
/// Caller owns the returned handle. It is released by `upasm_finalize()`
/// (via the host runtime's finalization mechanism) or `upasm_close()`,
/// whichever the host uses.
///
/// # Safety
///
/// - `engine` must be a valid engine returned by `upasm_engine_load`
/// - `root` must be a valid null-terminated UTF-8 string or NULL
/// - `error` must be a valid pointer or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upasm_open(
    engine: *const UpasmEngine,
    root: *const c_char,
    binding: *mut c_void,
    error: *mut UpasmError,
) -> *mut UpasmHandle {
    let engine = match unsafe { engine.as_ref() } {
        Some(e) => e,
        None => return unsafe { set_error_null(error, UpasmError::null_pointer("engine")) },
    };

    if root.is_null() {
        return unsafe { set_error_null(error, UpasmError::null_pointer("root")) };
    }

    match unsafe { UpasmHandle::open(engine, root, binding) } {
        Ok(handle) => {
            unsafe { set_ok(error) };
            Box::into_raw(handle)
        }
        Err(e) => unsafe { set_error_null(error, e) },
    }
}

/// Tear down the engine instance behind a handle without freeing the handle.
///
/// This is the explicit-dispose path: the native resource is released now,
/// while the wrapper stays valid for a finalizer that is still registered
/// with the host runtime. That finalizer (or `upasm_close`) later finds a
/// torn-down handle, performs no native call, and frees the wrapper.
///
/// Idempotent; safe to pass NULL.
///
/// # Safety
///
/// - `handle` must be a valid handle returned by `upasm_open`, or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upasm_teardown(handle: *mut UpasmHandle) {
    if let Some(handle) = unsafe { UpasmHandle::from_ptr_mut(handle) } {
        handle.teardown();
    }
}

/// Finalizer callback for the host runtime's collection mechanism.
///
/// Register this function with the host runtime when wrapping a handle in
/// a managed object, passing the handle as `data` and any host-side token
/// as `hint`. At collection time it tears down the engine instance if it
/// is still live, then frees the wrapper.
///
/// The `hint` token is not owned or interpreted by this layer.
/// Safe to invoke with NULL `data`.
///
/// # Safety
///
/// - `data` must be a valid handle returned by `upasm_open`, or NULL
/// - The handle must not be used after this call
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upasm_finalize(data: *mut c_void, hint: *mut c_void) {
    let _ = hint;
    unsafe { upasm_close(data as *mut UpasmHandle) }
}

/// Close and free a handle.
///
/// Equivalent to finalization for hosts without a collection mechanism:
/// tears down the engine instance if it is still live, then frees the
/// wrapper. After this call the handle is invalid and must not be used.
///
/// # Parameters
///
/// - `handle`: Handle to close (safe to pass NULL)
///
/// # Safety
///
/// - `handle` must be a valid handle returned by `upasm_open`, or NULL
/// - The handle must not be used after this call
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upasm_close(handle: *mut UpasmHandle) {
    if handle.is_null() {
        return;
    }

    // Take ownership and drop; Drop runs the idempotent teardown.
    unsafe {
        drop(Box::from_raw(handle));
    }
}
