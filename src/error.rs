//! Error handling for the FFI layer.
//!
//! This module provides C-compatible error types for engine loading and
//! instance lifecycle failures.

use std::ffi::CString;
use std::os::raw::c_char;

/// Error codes for FFI functions.
///
/// These codes are stable and can be matched in host-runtime glue code.
/// Codes 1-99 describe engine and lifecycle failures.
/// Codes 100+ are FFI-specific errors.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpasmErrorCode {
    /// No error
    Ok = 0,

    // Engine library errors (1-9)
    /// Engine library could not be loaded
    LibraryLoad = 1,
    /// Required entry point missing from the engine library
    SymbolMissing = 2,

    // Instance lifecycle errors (10-19)
    /// Engine instance creation failed
    CreateFailed = 10,
    /// Handle has already been torn down
    HandleClosed = 11,

    // Command errors (20-29)
    /// Engine rejected or failed to answer a command
    CommandFailed = 20,
    /// Engine produced a message that is not valid UTF-8
    MessageInvalid = 21,

    // FFI-specific errors (100+)
    /// Null pointer passed
    NullPointer = 100,
    /// Invalid UTF-8 string
    InvalidUtf8 = 101,
    /// JSON parse error
    JsonParse = 102,
    /// Invalid handle
    InvalidHandle = 103,
    /// Unknown error
    Unknown = 255,
}

/// Error structure returned via out-parameter.
///
/// # Memory Ownership
///
/// The `message` field is owned by the FFI layer when non-null.
/// Call `upasm_error_free()` to release the message memory.
#[repr(C)]
#[derive(Debug)]
pub struct UpasmError {
    /// Error code
    pub code: UpasmErrorCode,
    /// Error message (NULL if code == Ok)
    pub message: *mut c_char,
}

impl UpasmError {
    /// Create a success result (no error).
    pub fn ok() -> Self {
        Self {
            code: UpasmErrorCode::Ok,
            message: std::ptr::null_mut(),
        }
    }

    fn with_message(code: UpasmErrorCode, msg: String) -> Self {
        Self {
            code,
            message: CString::new(msg)
                .map(CString::into_raw)
                .unwrap_or(std::ptr::null_mut()),
        }
    }

    /// Create a library load error from a libloading failure.
    pub fn library_load(e: libloading::Error) -> Self {
        Self::with_message(
            UpasmErrorCode::LibraryLoad,
            format!("failed to load engine library: {e}"),
        )
    }

    /// Create a missing symbol error.
    pub fn symbol_missing(name: &str, e: libloading::Error) -> Self {
        Self::with_message(
            UpasmErrorCode::SymbolMissing,
            format!("engine library is missing entry point {name}: {e}"),
        )
    }

    /// Create an instance creation error.
    pub fn create_failed() -> Self {
        Self::with_message(
            UpasmErrorCode::CreateFailed,
            "engine instance creation failed".to_string(),
        )
    }

    /// Create a handle closed error.
    pub fn handle_closed() -> Self {
        Self::with_message(
            UpasmErrorCode::HandleClosed,
            "handle has already been torn down".to_string(),
        )
    }

    /// Create a command failure error.
    pub fn command_failed(method: &str) -> Self {
        Self::with_message(
            UpasmErrorCode::CommandFailed,
            format!("engine returned no response for command: {method}"),
        )
    }

    /// Create an invalid message error.
    pub fn message_invalid() -> Self {
        Self::with_message(
            UpasmErrorCode::MessageInvalid,
            "engine message is not valid UTF-8".to_string(),
        )
    }

    /// Create a null pointer error.
    pub fn null_pointer(param: &str) -> Self {
        Self::with_message(
            UpasmErrorCode::NullPointer,
            format!("null pointer passed for parameter: {param}"),
        )
    }

    /// Create an invalid UTF-8 error.
    pub fn invalid_utf8(context: &str) -> Self {
        Self::with_message(
            UpasmErrorCode::InvalidUtf8,
            format!("invalid UTF-8 in {context}"),
        )
    }

    /// Create a JSON parse error.
    pub fn json_parse(e: serde_json::Error) -> Self {
        Self::with_message(UpasmErrorCode::JsonParse, format!("JSON parse error: {e}"))
    }

    /// Create an invalid handle error.
    pub fn invalid_handle() -> Self {
        Self::with_message(
            UpasmErrorCode::InvalidHandle,
            "invalid or null handle".to_string(),
        )
    }
}

/// Free error message memory.
///
/// Safe to call with NULL error or NULL message.
///
/// # Safety
///
/// The error pointer must be valid or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upasm_error_free(error: *mut UpasmError) {
    if error.is_null() {
        return;
    }
    unsafe {
        let err = &mut *error;
        if !err.message.is_null() {
            drop(CString::from_raw(err.message));
            err.message = std::ptr::null_mut();
        }
    }
}
