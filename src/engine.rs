//! External engine boundary: library loading and entry point resolution.
//!
//! The UPASM engine is an opaque native component. This module treats it as
//! a set of contracted C entry points and never interprets its behavior
//! beyond success/failure.

use crate::error::UpasmError;
use crate::util::{cstr_to_path, set_error_null, set_ok};
use std::os::raw::c_char;
use std::path::Path;

/// Opaque engine instance type.
///
/// Instances are created and destroyed only by the engine's own entry
/// points; the FFI layer never dereferences this type.
#[repr(C)]
pub struct EngineInstance {
    _private: [u8; 0],
}

/// Resolved engine entry points.
///
/// Strings returned by `process_command` and `read_message` are borrowed
/// from the engine; they remain valid only until the next call into the
/// same instance and must be copied before that.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct EngineVtable {
    /// Create an instance rooted at the given directory. Returns NULL on failure.
    pub create: unsafe extern "C" fn(root: *const c_char) -> *mut EngineInstance,
    /// Destroy an instance. Must be called at most once per instance.
    pub destroy: unsafe extern "C" fn(inst: *mut EngineInstance),
    /// Submit a JSON request and receive a JSON response. Returns NULL on failure.
    pub process_command:
        unsafe extern "C" fn(inst: *mut EngineInstance, request: *const c_char) -> *const c_char,
    /// Acquire the message queue lock.
    pub lock_messages: unsafe extern "C" fn(inst: *mut EngineInstance),
    /// Read the next queued message. Returns NULL when the queue is drained.
    pub read_message: unsafe extern "C" fn(inst: *mut EngineInstance) -> *const c_char,
    /// Release the message queue lock.
    pub unlock_messages: unsafe extern "C" fn(inst: *mut EngineInstance),
}

/// Entry point names exported by the engine library.
const SYM_CREATE: &str = "UPASMInst_Create";
const SYM_DESTROY: &str = "UPASMInst_Destroy";
const SYM_PROCESS_COMMAND: &str = "UPASMInst_ProcessCommand";
const SYM_LOCK_MESSAGE: &str = "UPASMInst_LockMessage";
const SYM_READ_MESSAGE: &str = "UPASMInst_ReadMessage";
const SYM_UNLOCK_MESSAGE: &str = "UPASMInst_UnlockMessage";

/// A loaded engine: resolved entry points plus the library that backs them.
///
/// The library handle is retained for the lifetime of this struct so the
/// resolved function pointers stay valid.
pub struct UpasmEngine {
    vtable: EngineVtable,
    _library: Option<libloading::Library>,
}

impl UpasmEngine {
    /// Load the engine library from `path` and resolve all entry points.
    ///
    /// Fails without retaining the library if loading fails or any entry
    /// point is missing.
    ///
    /// # Safety
    ///
    /// Loading a native library runs its initialization routines; the file
    /// at `path` must be a trusted UPASM engine build.
    pub unsafe fn load(path: &Path) -> Result<Self, UpasmError> {
        let library = match unsafe { libloading::Library::new(path) } {
            Ok(lib) => lib,
            Err(e) => return Err(UpasmError::library_load(e)),
        };

        let vtable = EngineVtable {
            create: unsafe { symbol(&library, SYM_CREATE)? },
            destroy: unsafe { symbol(&library, SYM_DESTROY)? },
            process_command: unsafe { symbol(&library, SYM_PROCESS_COMMAND)? },
            lock_messages: unsafe { symbol(&library, SYM_LOCK_MESSAGE)? },
            read_message: unsafe { symbol(&library, SYM_READ_MESSAGE)? },
            unlock_messages: unsafe { symbol(&library, SYM_UNLOCK_MESSAGE)? },
        };

        log::debug!("loaded engine library from {}", path.display());

        Ok(Self {
            vtable,
            _library: Some(library),
        })
    }

    /// Wrap an already-resolved vtable (statically linked engines).
    pub fn from_vtable(vtable: EngineVtable) -> Self {
        Self {
            vtable,
            _library: None,
        }
    }

    /// The resolved entry points.
    pub fn vtable(&self) -> &EngineVtable {
        &self.vtable
    }
}

/// Resolve one entry point from the library.
///
/// # Safety
///
/// `T` must be the correct function pointer type for the named symbol.
unsafe fn symbol<T: Copy>(lib: &libloading::Library, name: &str) -> Result<T, UpasmError> {
    match unsafe { lib.get::<T>(name.as_bytes()) } {
        Ok(sym) => Ok(*sym),
        Err(e) => Err(UpasmError::symbol_missing(name, e)),
    }
}

/// Load the engine library at the given path.
///
/// # Parameters
///
/// - `path`: Filesystem path to the engine library (UTF-8 encoded, null-terminated)
/// - `error`: Out-parameter for error information
///
/// # Returns
///
/// Engine on success, NULL on failure.
///
/// # Ownership
///
/// Caller owns the returned engine. Must call `upasm_engine_unload()` to free.
///
/// # Safety
///
/// - `path` must be a valid null-terminated UTF-8 string or NULL
/// - `error` must be a valid pointer or NULL
/// - The file at `path` must be a trusted UPASM engine build
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upasm_engine_load(
    path: *const c_char,
    error: *mut UpasmError,
) -> *mut UpasmEngine {
    let path = match unsafe { cstr_to_path(path) } {
        Ok(p) => p,
        Err(e) => return unsafe { set_error_null(error, e) },
    };

    match unsafe { UpasmEngine::load(&path) } {
        Ok(engine) => {
            unsafe { set_ok(error) };
            Box::into_raw(Box::new(engine))
        }
        Err(e) => unsafe { set_error_null(error, e) },
    }
}

/// Unload an engine and free its library handle.
///
/// # Parameters
///
/// - `engine`: Engine to unload (safe to pass NULL)
///
/// # Safety
///
/// - `engine` must be a valid engine returned by `upasm_engine_load`, or NULL
/// - No handle created from this engine may still be live; their teardown
///   calls into the library being unloaded
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upasm_engine_unload(engine: *mut UpasmEngine) {
    if engine.is_null() {
        return;
    }

    log::debug!("unloading engine library");

    // Take ownership and drop
    unsafe {
        drop(Box::from_raw(engine));
    }
}
