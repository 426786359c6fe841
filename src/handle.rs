//! Opaque handle wrapper for engine instances.

use crate::engine::{EngineInstance, EngineVtable, UpasmEngine};
use crate::error::UpasmError;
use std::ffi::c_void;
use std::os::raw::c_char;

/// Opaque handle to one engine instance.
///
/// This struct owns the underlying instance and is exposed to the host
/// runtime as an opaque pointer. The instance pointer is non-null exactly
/// while the instance is live; teardown nulls it and releases the native
/// resource at most once, no matter how many teardown paths run.
///
/// # Thread Safety
///
/// `UpasmHandle` is NOT thread-safe. All operations on a handle must occur
/// from the same thread that created it, or external synchronization must
/// be used.
pub struct UpasmHandle {
    inst: *mut EngineInstance,
    vtable: EngineVtable,
    binding: *mut c_void,
}

impl UpasmHandle {
    /// Create an engine instance rooted at `root` and wrap it.
    ///
    /// `binding` is an opaque token identifying the host-side object; it is
    /// never dereferenced or kept alive by this layer, only handed back
    /// through the finalizer signature.
    ///
    /// On failure no native state is retained and no allocation escapes.
    ///
    /// # Safety
    ///
    /// `root` must be a valid null-terminated C string accepted by the
    /// engine's create entry point.
    pub unsafe fn open(
        engine: &UpasmEngine,
        root: *const c_char,
        binding: *mut c_void,
    ) -> Result<Box<Self>, UpasmError> {
        let vtable = *engine.vtable();
        let inst = unsafe { (vtable.create)(root) };
        if inst.is_null() {
            return Err(UpasmError::create_failed());
        }

        log::debug!("engine instance created at {inst:p}");

        Ok(Box::new(Self {
            inst,
            vtable,
            binding,
        }))
    }

    /// Release the engine instance if it is still live.
    ///
    /// Idempotent: the null check on the instance pointer is the only
    /// guard, so a second teardown performs no native call.
    pub fn teardown(&mut self) {
        if self.inst.is_null() {
            return;
        }

        log::debug!("destroying engine instance at {:p}", self.inst);
        unsafe { (self.vtable.destroy)(self.inst) };
        self.inst = std::ptr::null_mut();
    }

    /// Whether the engine instance is still live.
    pub fn is_open(&self) -> bool {
        !self.inst.is_null()
    }

    /// The live instance pointer, or a handle-closed error after teardown.
    pub fn instance(&self) -> Result<*mut EngineInstance, UpasmError> {
        if self.inst.is_null() {
            return Err(UpasmError::handle_closed());
        }
        Ok(self.inst)
    }

    /// The resolved engine entry points.
    pub fn vtable(&self) -> &EngineVtable {
        &self.vtable
    }

    /// The opaque host-object token supplied at construction.
    pub fn binding(&self) -> *mut c_void {
        self.binding
    }

    /// Convert a raw pointer to a mutable reference.
    ///
    /// # Safety
    ///
    /// The pointer must be valid and non-null.
    pub unsafe fn from_ptr_mut<'a>(ptr: *mut UpasmHandle) -> Option<&'a mut Self> {
        unsafe { ptr.as_mut() }
    }
}

impl Drop for UpasmHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}
