//! FFI layer for host applications.
//!
//! C-compatible functions for applying changesets to an in-memory store.
//! Changesets and snapshots cross the boundary as JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `carry_replay_*` functions are allocated by Rust
//! - Caller must free them with `carry_replay_string_free`
//! - Store pointers must be freed with `carry_replay_store_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": {"message": "...", ...}}` on failure

use crate::{
    ApplierConfig, ApplyError, Changeset, ErrorKind, InstructionApplier, InstructionKind,
    SchemaVersion, Store, StoreSnapshot,
};
use serde::Serialize;
use std::ffi::{c_char, CStr, CString};

/// Error payload for FFI responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FfiError {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instruction: Option<InstructionKind>,
}

impl From<&ApplyError> for FfiError {
    fn from(err: &ApplyError) -> Self {
        Self {
            message: err.to_string(),
            kind: Some(err.kind()),
            index: err.index(),
            instruction: err.instruction(),
        }
    }
}

/// Result wrapper for FFI responses.
#[derive(Serialize)]
#[serde(untagged)]
enum FfiResult<T: Serialize> {
    Ok { ok: T },
    Err { error: FfiError },
}

impl<T: Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: FfiError {
                message: message.into(),
                kind: None,
                index: None,
                instruction: None,
            },
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(
            |e| format!(r#"{{"error":{{"message":"serialization failed: {}"}}}}"#, e),
        )
    }
}

#[derive(Serialize)]
struct Applied {
    applied: usize,
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `carry_replay_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::new(r#"{"error":{"message":"string contained null bytes"}}"#)
            .unwrap_or_default()
            .into_raw(),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

// ============================================================================
// Store Lifecycle
// ============================================================================

/// Create a new empty store.
///
/// Caller must free the returned pointer with `carry_replay_store_free`.
#[no_mangle]
pub extern "C" fn carry_replay_store_new(schema_version: SchemaVersion) -> *mut Store {
    Box::into_raw(Box::new(Store::new(schema_version)))
}

/// Free a store.
///
/// # Safety
/// - `store` must be a valid pointer from `carry_replay_store_new`
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn carry_replay_store_free(store: *mut Store) {
    if !store.is_null() {
        drop(Box::from_raw(store));
    }
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `carry_replay_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn carry_replay_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Replay
// ============================================================================

/// Apply a changeset to the store.
///
/// The applier configuration is read from the environment on every call.
///
/// # Returns
/// JSON string: `{"ok": {"applied": n}}` or `{"error": {...}}`
///
/// # Safety
/// - `store` must be a valid pointer from `carry_replay_store_new` or null
/// - `changeset_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `carry_replay_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_replay_apply(
    store: *mut Store,
    changeset_json: *const c_char,
) -> *mut c_char {
    let store = match store.as_mut() {
        Some(s) => s,
        None => return to_c_string(FfiResult::<()>::err("null store pointer").to_json()),
    };

    let changeset_str = match from_c_string(changeset_json) {
        Some(s) => s,
        None => return to_c_string(FfiResult::<()>::err("invalid changeset JSON").to_json()),
    };

    let changeset: Changeset = match serde_json::from_str(&changeset_str) {
        Ok(c) => c,
        Err(e) => {
            return to_c_string(FfiResult::<()>::err(format!("parse error: {}", e)).to_json())
        }
    };

    let config = match ApplierConfig::from_env() {
        Ok(c) => c,
        Err(e) => return to_c_string(FfiResult::<()>::err(e.to_string()).to_json()),
    };

    match InstructionApplier::with_config(store, config).apply(&changeset, None) {
        Ok(()) => to_c_string(
            FfiResult::ok(Applied {
                applied: changeset.len(),
            })
            .to_json(),
        ),
        Err(e) => to_c_string(
            FfiResult::<()>::Err {
                error: FfiError::from(&e),
            }
            .to_json(),
        ),
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Export store state as a snapshot.
///
/// # Returns
/// JSON string: `{"ok": StoreSnapshot}` or `{"error": {...}}`
///
/// # Safety
/// - `store` must be a valid pointer from `carry_replay_store_new` or null
/// - Caller must free the returned string with `carry_replay_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_replay_export(store: *const Store) -> *mut c_char {
    let store = match store.as_ref() {
        Some(s) => s,
        None => return to_c_string(FfiResult::<()>::err("null store pointer").to_json()),
    };

    to_c_string(FfiResult::ok(store.export_state()).to_json())
}

/// Replace store state with a snapshot.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": {...}}`
///
/// # Safety
/// - `store` must be a valid pointer from `carry_replay_store_new` or null
/// - `snapshot_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `carry_replay_string_free`
#[no_mangle]
pub unsafe extern "C" fn carry_replay_import(
    store: *mut Store,
    snapshot_json: *const c_char,
) -> *mut c_char {
    let store = match store.as_mut() {
        Some(s) => s,
        None => return to_c_string(FfiResult::<()>::err("null store pointer").to_json()),
    };

    let snapshot_str = match from_c_string(snapshot_json) {
        Some(s) => s,
        None => return to_c_string(FfiResult::<()>::err("invalid snapshot JSON").to_json()),
    };

    let result = StoreSnapshot::from_json(&snapshot_str).and_then(|s| store.import_state(s));
    match result {
        Ok(()) => to_c_string(FfiResult::ok(()).to_json()),
        Err(e) => to_c_string(FfiResult::<()>::err(e.to_string()).to_json()),
    }
}

// ============================================================================
// Utility
// ============================================================================

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn carry_replay_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

/// Get the snapshot format version.
#[no_mangle]
pub extern "C" fn carry_replay_snapshot_format_version() -> u32 {
    crate::SNAPSHOT_FORMAT_VERSION
}
