//! FFI bindings for worktrace
//!
//! This module provides C-compatible functions for calling the engine from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `worktrace_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::EngineConfig;
use crate::encoder::ReportEncoder;
use crate::error::MetricsError;
use crate::pipeline::{
    entries_to_buckets, entries_to_metrics, entries_to_metrics_with_config, parse_batch, MetricsEngine,
};
use crate::types::{AggregationMode, Resolution};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Borrow a C string argument, recording an error naming it when invalid
unsafe fn arg_to_string(ptr: *const c_char, name: &str) -> Option<String> {
    if ptr.is_null() {
        set_last_error(&format!("Invalid {name} string pointer"));
        return None;
    }
    match CStr::from_ptr(ptr).to_str() {
        Ok(s) => Some(s.to_string()),
        Err(_) => {
            set_last_error(&format!("{name} is not valid UTF-8"));
            None
        }
    }
}

/// Hand a result to the caller: an owned C string, or NULL with the error recorded
fn into_c_result(result: Result<String, MetricsError>) -> *mut c_char {
    match result {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => cstr.into_raw(),
            Err(_) => {
                set_last_error("Output contained an interior NUL byte");
                ptr::null_mut()
            }
        },
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute window metrics and trends with default settings.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `worktrace_free_string`.
/// - Returns NULL on error; call `worktrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn worktrace_metrics(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = arg_to_string(json, "JSON") else {
        return ptr::null_mut();
    };

    into_c_result(entries_to_metrics(json_str))
}

/// Compute window metrics and trends with a JSON engine configuration.
///
/// # Safety
/// - `json` and `config_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `worktrace_free_string`.
/// - Returns NULL on error; call `worktrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn worktrace_metrics_with_config(
    json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = arg_to_string(json, "JSON") else {
        return ptr::null_mut();
    };
    let Some(config_str) = arg_to_string(config_json, "config") else {
        return ptr::null_mut();
    };

    into_c_result(entries_to_metrics_with_config(json_str, config_str))
}

/// Compute a bucketed series.
///
/// `resolution` is one of `daily`, `weekly`, `monthly`; `mode` is `sum` or `mean`.
///
/// # Safety
/// - `json`, `resolution`, and `mode` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `worktrace_free_string`.
/// - Returns NULL on error; call `worktrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn worktrace_buckets(
    json: *const c_char,
    resolution: *const c_char,
    mode: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json_str) = arg_to_string(json, "JSON") else {
        return ptr::null_mut();
    };
    let Some(resolution_str) = arg_to_string(resolution, "resolution") else {
        return ptr::null_mut();
    };
    let Some(mode_str) = arg_to_string(mode, "mode") else {
        return ptr::null_mut();
    };

    let result = resolution_str
        .parse::<Resolution>()
        .and_then(|resolution| Ok((resolution, mode_str.parse::<AggregationMode>()?)))
        .and_then(|(resolution, mode)| entries_to_buckets(json_str, resolution, mode));

    into_c_result(result)
}

// ============================================================================
// Engine handle API
// ============================================================================

/// Opaque handle to a configured MetricsEngine
pub struct WorktraceEngineHandle {
    engine: MetricsEngine,
    encoder: ReportEncoder,
}

/// Create an engine from a JSON configuration, or defaults when `config_json` is NULL.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `worktrace_engine_free`.
/// - Returns NULL on error; call `worktrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn worktrace_engine_new(config_json: *const c_char) -> *mut WorktraceEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        Ok(EngineConfig::default())
    } else {
        let Some(config_str) = arg_to_string(config_json, "config") else {
            return ptr::null_mut();
        };
        EngineConfig::from_json(&config_str)
    };

    match config.and_then(MetricsEngine::new) {
        Ok(engine) => Box::into_raw(Box::new(WorktraceEngineHandle {
            engine,
            encoder: ReportEncoder::new(),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `worktrace_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn worktrace_engine_free(engine: *mut WorktraceEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Compute window metrics and trends with a configured engine.
///
/// Reports from one handle share a producer instance ID.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `worktrace_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `worktrace_free_string`.
/// - Returns NULL on error; call `worktrace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn worktrace_engine_metrics(
    engine: *const WorktraceEngineHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*engine;

    let Some(json_str) = arg_to_string(json, "JSON") else {
        return ptr::null_mut();
    };

    let result = parse_batch(&json_str)
        .and_then(|input| handle.encoder.encode_to_json(handle.engine.analyze(&input)));
    into_c_result(result)
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by worktrace functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a worktrace function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn worktrace_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next worktrace call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn worktrace_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn worktrace_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
