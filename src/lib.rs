//! C FFI lifecycle bindings for the UPASM assembler engine.
//!
//! This crate bridges managed host runtimes (editor extensions, scripting
//! runtimes with garbage collection) to the native UPASM engine library.
//! Each handle owns exactly one engine instance; the instance is released
//! exactly once, by whichever of explicit teardown or host finalization
//! happens first.
//!
//! # Thread Safety
//!
//! `UpasmHandle` is NOT `Send` or `Sync`. All operations on a handle must
//! occur from the same thread that created it, or external synchronization
//! must be provided.
//!
//! # Memory Management
//!
//! - Engines returned by `upasm_engine_load` must be freed with `upasm_engine_unload`
//! - Handles returned by `upasm_open` are freed by `upasm_finalize` (registered
//!   with the host runtime) or `upasm_close`
//! - Strings returned by functions must be freed with `upasm_string_free`
//! - Error messages must be freed with `upasm_error_free`
//!
//! # Host Embedding
//!
//! `upasm_class_descriptor()` describes the one constructible object type a
//! host runtime exposes: a type name, the construction entry point, and the
//! per-instance finalizer to register at wrap time. Hosts that dispose
//! explicitly call `upasm_teardown` and leave the wrapper for the still
//! registered finalizer; the finalizer then performs no native call.

#![allow(clippy::missing_safety_doc)]

mod command;
mod descriptor;
mod engine;
mod error;
mod handle;
mod lifecycle;
mod messages;
mod state;
mod util;

// Re-export all public FFI types and functions
pub use command::{upasm_command, upasm_string_free};
pub use descriptor::{
    UpasmClassDescriptor, UpasmConstructFn, UpasmFinalizeFn, upasm_class_descriptor,
};
pub use engine::{
    EngineInstance, EngineVtable, UpasmEngine, upasm_engine_load, upasm_engine_unload,
};
pub use error::{UpasmError, UpasmErrorCode, upasm_error_free};
pub use handle::UpasmHandle;
pub use lifecycle::{upasm_close, upasm_finalize, upasm_open, upasm_teardown};
pub use messages::upasm_messages;
pub use state::upasm_is_open;

use std::os::raw::c_char;

/// Library version string.
///
/// # Returns
///
/// Static string containing the version (e.g., "0.1.0").
/// Do not free this string.
#[unsafe(no_mangle)]
pub extern "C" fn upasm_version() -> *const c_char {
    // Include null terminator in the static string
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::ffi::{CStr, CString, c_void};
    use std::ptr;

    // Stub engine: every entry point records into thread-locals, so each
    // test thread observes its own create/destroy counts.
    thread_local! {
        static CREATED: Cell<usize> = const { Cell::new(0) };
        static DESTROYED: Cell<usize> = const { Cell::new(0) };
        static FAIL_CREATE: Cell<bool> = const { Cell::new(false) };
        static LOCK_DEPTH: Cell<i32> = const { Cell::new(0) };
        static PENDING_MESSAGES: RefCell<Vec<CString>> = const { RefCell::new(Vec::new()) };
        static LAST_REQUEST: RefCell<Option<String>> = const { RefCell::new(None) };
        static RESPONSE_BUF: RefCell<Option<CString>> = const { RefCell::new(None) };
        static MESSAGE_BUF: RefCell<Option<CString>> = const { RefCell::new(None) };
    }

    unsafe extern "C" fn stub_create(root: *const c_char) -> *mut EngineInstance {
        assert!(!root.is_null());
        if FAIL_CREATE.get() {
            return ptr::null_mut();
        }
        CREATED.set(CREATED.get() + 1);
        Box::into_raw(Box::new(0u8)) as *mut EngineInstance
    }

    unsafe extern "C" fn stub_destroy(inst: *mut EngineInstance) {
        assert!(!inst.is_null());
        DESTROYED.set(DESTROYED.get() + 1);
        unsafe { drop(Box::from_raw(inst as *mut u8)) };
    }

    unsafe extern "C" fn stub_process_command(
        inst: *mut EngineInstance,
        request: *const c_char,
    ) -> *const c_char {
        assert!(!inst.is_null());
        let request = unsafe { CStr::from_ptr(request) }.to_str().unwrap();
        LAST_REQUEST.with_borrow_mut(|r| *r = Some(request.to_string()));

        let response = CString::new(r#"{"result":true}"#).unwrap();
        RESPONSE_BUF.with_borrow_mut(|buf| {
            let ptr = response.as_ptr();
            *buf = Some(response);
            ptr
        })
    }

    unsafe extern "C" fn stub_lock_messages(_inst: *mut EngineInstance) {
        LOCK_DEPTH.set(LOCK_DEPTH.get() + 1);
    }

    unsafe extern "C" fn stub_read_message(_inst: *mut EngineInstance) -> *const c_char {
        assert_eq!(LOCK_DEPTH.get(), 1, "read_message requires the lock");
        let next = PENDING_MESSAGES.with_borrow_mut(|q| {
            if q.is_empty() {
                None
            } else {
                Some(q.remove(0))
            }
        });
        match next {
            Some(msg) => MESSAGE_BUF.with_borrow_mut(|buf| {
                let ptr = msg.as_ptr();
                *buf = Some(msg);
                ptr
            }),
            None => ptr::null(),
        }
    }

    unsafe extern "C" fn stub_unlock_messages(_inst: *mut EngineInstance) {
        LOCK_DEPTH.set(LOCK_DEPTH.get() - 1);
    }

    fn stub_vtable() -> EngineVtable {
        EngineVtable {
            create: stub_create,
            destroy: stub_destroy,
            process_command: stub_process_command,
            lock_messages: stub_lock_messages,
            read_message: stub_read_message,
            unlock_messages: stub_unlock_messages,
        }
    }

    fn stub_engine() -> UpasmEngine {
        UpasmEngine::from_vtable(stub_vtable())
    }

    fn open_stub(engine: &UpasmEngine) -> *mut UpasmHandle {
        let root = CString::new("/tmp/workspace").unwrap();
        let mut error = UpasmError::ok();
        let handle =
            unsafe { upasm_open(engine, root.as_ptr(), ptr::null_mut(), &mut error) };
        assert!(!handle.is_null());
        assert_eq!(error.code, UpasmErrorCode::Ok);
        handle
    }

    #[test]
    fn test_version() {
        let version = upasm_version();
        assert!(!version.is_null());
        let version_str = unsafe { CStr::from_ptr(version) };
        assert!(!version_str.to_str().unwrap().is_empty());
    }

    #[test]
    fn test_open_and_close() {
        let engine = stub_engine();
        let handle = open_stub(&engine);

        assert_eq!(CREATED.get(), 1);
        assert_eq!(unsafe { upasm_is_open(handle) }, 1);

        unsafe { upasm_close(handle) };
        assert_eq!(DESTROYED.get(), 1);
    }

    #[test]
    fn test_open_failure_leaves_no_native_state() {
        let engine = stub_engine();
        FAIL_CREATE.set(true);

        let root = CString::new("/tmp/workspace").unwrap();
        let mut error = UpasmError::ok();
        let handle =
            unsafe { upasm_open(&engine, root.as_ptr(), ptr::null_mut(), &mut error) };

        assert!(handle.is_null());
        assert_eq!(error.code, UpasmErrorCode::CreateFailed);
        assert!(!error.message.is_null());
        assert_eq!(CREATED.get(), 0);
        assert_eq!(DESTROYED.get(), 0);

        unsafe { upasm_error_free(&mut error) };
    }

    #[test]
    fn test_finalize_releases_instance() {
        let engine = stub_engine();
        let handle = open_stub(&engine);

        let hint = 0xbeef_usize as *mut c_void;
        unsafe { upasm_finalize(handle as *mut c_void, hint) };
        assert_eq!(DESTROYED.get(), 1);
    }

    #[test]
    fn test_teardown_then_finalize_destroys_once() {
        let engine = stub_engine();
        let handle = open_stub(&engine);

        // Explicit dispose releases the instance now.
        unsafe { upasm_teardown(handle) };
        assert_eq!(DESTROYED.get(), 1);
        assert_eq!(unsafe { upasm_is_open(handle) }, 0);

        // The still registered finalizer later finds a torn-down handle:
        // it frees the wrapper but performs no second native call.
        unsafe { upasm_finalize(handle as *mut c_void, ptr::null_mut()) };
        assert_eq!(DESTROYED.get(), 1);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let engine = stub_engine();
        let root = CString::new("/tmp/workspace").unwrap();
        let mut handle =
            unsafe { UpasmHandle::open(&engine, root.as_ptr(), ptr::null_mut()) }.unwrap();

        handle.teardown();
        handle.teardown();
        assert_eq!(DESTROYED.get(), 1);
        assert!(handle.instance().is_err());

        // Drop must not destroy a second time either.
        drop(handle);
        assert_eq!(DESTROYED.get(), 1);
    }

    #[test]
    fn test_drop_releases_instance() {
        let engine = stub_engine();
        let root = CString::new("/tmp/workspace").unwrap();
        let handle =
            unsafe { UpasmHandle::open(&engine, root.as_ptr(), ptr::null_mut()) }.unwrap();

        drop(handle);
        assert_eq!(DESTROYED.get(), 1);
    }

    #[test]
    fn test_two_instances_are_distinct() {
        let engine = stub_engine();
        let a = open_stub(&engine);
        let b = open_stub(&engine);

        assert_eq!(CREATED.get(), 2);
        assert_ne!(a, b);
        let inst_a = unsafe { (*a).instance() }.unwrap();
        let inst_b = unsafe { (*b).instance() }.unwrap();
        assert_ne!(inst_a, inst_b);

        unsafe { upasm_close(a) };
        unsafe { upasm_close(b) };
        assert_eq!(DESTROYED.get(), 2);
    }

    #[test]
    fn test_open_null_inputs() {
        let engine = stub_engine();
        let root = CString::new("/tmp/workspace").unwrap();
        let mut error = UpasmError::ok();

        let handle =
            unsafe { upasm_open(ptr::null(), root.as_ptr(), ptr::null_mut(), &mut error) };
        assert!(handle.is_null());
        assert_eq!(error.code, UpasmErrorCode::NullPointer);
        unsafe { upasm_error_free(&mut error) };

        let handle = unsafe { upasm_open(&engine, ptr::null(), ptr::null_mut(), &mut error) };
        assert!(handle.is_null());
        assert_eq!(error.code, UpasmErrorCode::NullPointer);
        unsafe { upasm_error_free(&mut error) };

        // Teardown paths are null-safe no-ops.
        unsafe { upasm_teardown(ptr::null_mut()) };
        unsafe { upasm_close(ptr::null_mut()) };
        unsafe { upasm_finalize(ptr::null_mut(), ptr::null_mut()) };
        assert_eq!(DESTROYED.get(), 0);
    }

    #[test]
    fn test_binding_token_is_kept_verbatim() {
        let engine = stub_engine();
        let root = CString::new("/tmp/workspace").unwrap();
        let token = 0x5151_usize as *mut c_void;
        let handle = unsafe { UpasmHandle::open(&engine, root.as_ptr(), token) }.unwrap();

        assert_eq!(handle.binding(), token);
    }

    #[test]
    fn test_command_round_trip() {
        let engine = stub_engine();
        let handle = open_stub(&engine);

        let request = CString::new(r#"{"method":"rebuild"}"#).unwrap();
        let mut error = UpasmError::ok();
        let response = unsafe { upasm_command(handle, request.as_ptr(), &mut error) };

        assert!(!response.is_null());
        assert_eq!(error.code, UpasmErrorCode::Ok);
        let response_str = unsafe { CStr::from_ptr(response) }.to_str().unwrap();
        assert_eq!(response_str, r#"{"result":true}"#);

        // The request text crosses the boundary unchanged.
        LAST_REQUEST.with_borrow(|r| {
            assert_eq!(r.as_deref(), Some(r#"{"method":"rebuild"}"#));
        });

        unsafe { upasm_string_free(response) };
        unsafe { upasm_close(handle) };
    }

    #[test]
    fn test_command_rejects_bad_requests() {
        let engine = stub_engine();
        let handle = open_stub(&engine);
        let mut error = UpasmError::ok();

        // Malformed JSON never reaches the engine.
        let request = CString::new("not json").unwrap();
        let response = unsafe { upasm_command(handle, request.as_ptr(), &mut error) };
        assert!(response.is_null());
        assert_eq!(error.code, UpasmErrorCode::JsonParse);
        LAST_REQUEST.with_borrow(|r| assert!(r.is_none()));
        unsafe { upasm_error_free(&mut error) };

        // Missing method field.
        let request = CString::new(r#"{"workspace":"w"}"#).unwrap();
        let response = unsafe { upasm_command(handle, request.as_ptr(), &mut error) };
        assert!(response.is_null());
        assert_eq!(error.code, UpasmErrorCode::JsonParse);
        unsafe { upasm_error_free(&mut error) };

        unsafe { upasm_close(handle) };
    }

    #[test]
    fn test_command_on_torn_down_handle() {
        let engine = stub_engine();
        let handle = open_stub(&engine);
        unsafe { upasm_teardown(handle) };

        let request = CString::new(r#"{"method":"rebuild"}"#).unwrap();
        let mut error = UpasmError::ok();
        let response = unsafe { upasm_command(handle, request.as_ptr(), &mut error) };
        assert!(response.is_null());
        assert_eq!(error.code, UpasmErrorCode::HandleClosed);

        unsafe { upasm_error_free(&mut error) };
        unsafe { upasm_close(handle) };
    }

    #[test]
    fn test_messages_drained_in_order() {
        let engine = stub_engine();
        let handle = open_stub(&engine);

        PENDING_MESSAGES.with_borrow_mut(|q| {
            q.push(CString::new("first").unwrap());
            q.push(CString::new("second").unwrap());
        });

        let mut error = UpasmError::ok();
        let json = unsafe { upasm_messages(handle, &mut error) };
        assert!(!json.is_null());
        assert_eq!(error.code, UpasmErrorCode::Ok);
        assert_eq!(LOCK_DEPTH.get(), 0);

        let json_str = unsafe { CStr::from_ptr(json) }.to_str().unwrap();
        let messages: Vec<String> = serde_json::from_str(json_str).unwrap();
        assert_eq!(messages, vec!["first".to_string(), "second".to_string()]);
        unsafe { upasm_string_free(json) };

        // Queue is now empty.
        let json = unsafe { upasm_messages(handle, &mut error) };
        let json_str = unsafe { CStr::from_ptr(json) }.to_str().unwrap();
        let messages: Vec<String> = serde_json::from_str(json_str).unwrap();
        assert!(messages.is_empty());
        unsafe { upasm_string_free(json) };

        unsafe { upasm_close(handle) };
    }

    #[test]
    fn test_messages_on_torn_down_handle() {
        let engine = stub_engine();
        let handle = open_stub(&engine);
        unsafe { upasm_teardown(handle) };

        let mut error = UpasmError::ok();
        let json = unsafe { upasm_messages(handle, &mut error) };
        assert!(json.is_null());
        assert_eq!(error.code, UpasmErrorCode::HandleClosed);

        unsafe { upasm_error_free(&mut error) };
        unsafe { upasm_close(handle) };
    }

    #[test]
    fn test_class_descriptor() {
        let descriptor = upasm_class_descriptor();
        let name = unsafe { CStr::from_ptr(descriptor.name) };
        assert_eq!(name.to_str().unwrap(), "UpasmInstance");

        // The descriptor's entry points drive a full construct/finalize cycle.
        let engine = stub_engine();
        let root = CString::new("/tmp/workspace").unwrap();
        let mut error = UpasmError::ok();
        let handle = unsafe {
            (descriptor.construct)(&engine, root.as_ptr(), ptr::null_mut(), &mut error)
        };
        assert!(!handle.is_null());
        assert_eq!(CREATED.get(), 1);

        unsafe { (descriptor.finalize)(handle as *mut c_void, ptr::null_mut()) };
        assert_eq!(DESTROYED.get(), 1);
    }

    #[test]
    fn test_engine_load_missing_library() {
        let path = CString::new("/nonexistent/libUPASM_x64.so").unwrap();
        let mut error = UpasmError::ok();
        let engine = unsafe { upasm_engine_load(path.as_ptr(), &mut error) };

        assert!(engine.is_null());
        assert_eq!(error.code, UpasmErrorCode::LibraryLoad);
        assert!(!error.message.is_null());

        unsafe { upasm_error_free(&mut error) };
    }

    #[test]
    fn test_engine_unload_null_is_noop() {
        unsafe { upasm_engine_unload(ptr::null_mut()) };
    }

    #[test]
    fn test_error_free() {
        let mut error = UpasmError::ok();

        // error_free should handle null message gracefully
        unsafe { upasm_error_free(&mut error) };
        assert!(error.message.is_null());

        // Trigger an actual error (null path)
        let engine = unsafe { upasm_engine_load(ptr::null(), &mut error) };
        assert!(engine.is_null());
        assert_eq!(error.code, UpasmErrorCode::NullPointer);
        assert!(!error.message.is_null());

        // Free the error message
        unsafe { upasm_error_free(&mut error) };
        assert!(error.message.is_null());
    }
}
