//! Handle state queries.

use crate::handle::UpasmHandle;

/// Whether a handle still owns a live engine instance.
///
/// # Parameters
///
/// - `handle`: Handle to query (safe to pass NULL)
///
/// # Returns
///
/// 1 if the engine instance is live, 0 if the handle is NULL or has been
/// torn down.
///
/// # Safety
///
/// - `handle` must be a valid handle returned by `upasm_open`, or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn upasm_is_open(handle: *const UpasmHandle) -> i32 {
    match unsafe { handle.as_ref() } {
        Some(h) => h.is_open() as i32,
        None => 0,
    }
}
