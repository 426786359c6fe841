//! Engine message queue access.

use crate::error::UpasmError;
use crate::handle::UpasmHandle;
use crate::util::{set_error_null, set_ok, string_to_cstr};
use std::ffi::CStr;
use std::os::raw::c_char;

/// Drain all queued engine messages.
///
/// Acquires the engine's message lock, reads messages until the queue is
/// empty, and releases the lock. The lock is released even when a message
/// fails validation mid-drain.
///
/// # Parameters
///
/// - `handle`: Valid handle with a live engine instance
/// - `error`: Out-parameter for error information
///
/// # Returns
///
/// JSON array of message strings on success (empty array when no messages
/// are queued), NULL on failure. Caller must free with `upasm_string_free()`.
///
/// # Safety
///
/// - `handle` must be a valid handle
/// - `error` must be a valid pointer or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upasm_messages(
    handle: *mut UpasmHandle,
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

    let vtable = handle.vtable();
    let mut messages: Vec<String> = Vec::new();
    let mut failed = false;

    unsafe { (vtable.lock_messages)(inst) };
    loop {
        let msg = unsafe { (vtable.read_message)(inst) };
        if msg.is_null() {
            break;
        }
        // Messages are borrowed from the engine; copy while the lock is held.
        match unsafe { CStr::from_ptr(msg) }.to_str() {
            Ok(s) => messages.push(s.to_string()),
            Err(_) => {
                failed = true;
                break;
            }
        }
    }
    unsafe { (vtable.unlock_messages)(inst) };

    if failed {
        return unsafe { set_error_null(error, UpasmError::message_invalid()) };
    }

    log::trace!("drained {} engine messages", messages.len());

    match serde_json::to_string(&messages) {
        Ok(json) => {
            unsafe { set_ok(error) };
            string_to_cstr(json)
        }
        Err(e) => unsafe { set_error_null(error, UpasmError::json_parse(e)) },
    }
}
