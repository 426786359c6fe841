//! Opaque JSON command surface.
//!
//! Commands are forwarded to the engine as raw JSON text; the FFI layer
//! only checks the request envelope and never interprets responses.

use crate::error::UpasmError;
use crate::handle::UpasmHandle;
use crate::util::{cstr_to_string, set_error_null, set_ok, string_to_cstr};
use serde::Deserialize;
use std::ffi::CStr;
use std::os::raw::c_char;

/// Request envelope every command must carry.
#[derive(Debug, Deserialize)]
struct CommandEnvelope {
    /// Command method name (e.g. "openWorkspace", "rebuild")
    method: String,
}

/// Submit a JSON command to the engine instance.
///
/// # Parameters
///
/// - `handle`: Valid handle with a live engine instance
/// - `request`: JSON request object with a non-empty `method` field
///   (null-terminated UTF-8 string)
/// - `error`: Out-parameter for error information
///
/// # Returns
///
/// JSON response string on success, NULL on failure.
/// Caller must free with `upasm_string_free()`.
///
/// # Request JSON Schema
///
/// ```json
/// { "method": "openWorkspace", "workspace": "...", "projfile": "..." }
/// ```
///
/// Fields beyond `method` are passed through to the engine unchanged.
///
/// # Safety
///
/// - `handle` must be a valid handle
/// - `request` must be a valid null-terminated UTF-8 string or NULL
/// - `error` must be a valid pointer or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upasm_command(
    handle: *mut UpasmHandle,
    request: *const c_char,
    error: *mut UpasmError,
) -> *mut c_char {
    let handle = match unsafe { UpasmHandle::from_ptr_mut(handle) } {
        Some(h) => h,
        None => return unsafe { set_error_null(error, UpasmError::invalid_handle()) },
    };

    let inst = match handle.instance() {
        Ok(inst) => inst,
        Err(e) => return unsafe { set_error_null(error, e) },
    };

    let request_str = match unsafe { cstr_to_string(request, "request") } {
        Ok(s) => s,
        Err(e) => return unsafe { set_error_null(error, e) },
    };

    // Reject requests the engine protocol cannot route before crossing the
    // boundary.
    let envelope: CommandEnvelope = match serde_json::from_str(&request_str) {
        Ok(env) => env,
        Err(e) => return unsafe { set_error_null(error, UpasmError::json_parse(e)) },
    };
    if envelope.method.is_empty() {
        return unsafe { set_error_null(error, UpasmError::command_failed("<empty>")) };
    }

    log::trace!("dispatching command {}", envelope.method);

    let response = unsafe { (handle.vtable().process_command)(inst, request) };
    if response.is_null() {
        return unsafe { set_error_null(error, UpasmError::command_failed(&envelope.method)) };
    }

    // The response is borrowed from the engine; copy it before returning.
    let response = unsafe { CStr::from_ptr(response) };
    match response.to_str() {
        Ok(s) => {
            unsafe { set_ok(error) };
            string_to_cstr(s.to_string())
        }
        Err(_) => unsafe { set_error_null(error, UpasmError::invalid_utf8("response")) },
    }
}

/// Free a string returned by this library.
///
/// Safe to call with NULL.
///
/// # Safety
///
/// - `s` must be a string returned by this library, or NULL
/// - The string must not be used after this call
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upasm_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        drop(std::ffi::CString::from_raw(s));
    }
}
