//! C-compatible FFI API
//!
//! `#[no_mangle]` exports for callers that link the bridge directly. Every
//! fallible function returns an `i32` status code (`LATTICE_OK` = 0) and
//! reports results through out-pointers; the failing call's message is
//! retrievable through the thread-local last-error functions.
//!
//! Byte buffers returned through out-pointers are owned by the caller and
//! must be released with [`lattice_buffer_free`].

use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};
use std::ptr;
use std::slice;

use crate::error::{Error, Result};
use crate::{devices, graph, session, tensor};

pub const LATTICE_OK: i32 = 0;
pub const LATTICE_ERR_INVALID_HANDLE: i32 = 1;
pub const LATTICE_ERR_CONFIG_PARSE: i32 = 2;
pub const LATTICE_ERR_RUN_FAILED: i32 = 3;
pub const LATTICE_ERR_INTERNAL: i32 = 4;
pub const LATTICE_ERR_ENGINE: i32 = 5;
pub const LATTICE_ERR_BAD_ARGUMENT: i32 = 6;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(message: impl Into<String>) {
    let owned = message.into();
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = Some(
            CString::new(owned)
                .unwrap_or_else(|_| CString::new("<error message contained null byte>").unwrap()),
        );
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = None;
    });
}

fn status_code(err: &Error) -> i32 {
    match err {
        Error::InvalidHandle { .. } => LATTICE_ERR_INVALID_HANDLE,
        Error::ConfigParse(_) => LATTICE_ERR_CONFIG_PARSE,
        Error::RunFailed(_) => LATTICE_ERR_RUN_FAILED,
        Error::InternalSerialization(_) => LATTICE_ERR_INTERNAL,
        Error::Engine(_) => LATTICE_ERR_ENGINE,
    }
}

/// Convert a bridge result into a status code, recording the error message
fn finish(result: Result<()>) -> i32 {
    match result {
        Ok(()) => {
            clear_last_error();
            LATTICE_OK
        }
        Err(err) => {
            let code = status_code(&err);
            set_last_error(err.to_string());
            code
        }
    }
}

fn bad_argument(message: &str) -> i32 {
    set_last_error(message);
    LATTICE_ERR_BAD_ARGUMENT
}

/// Read a required C string argument
///
/// # Safety
///
/// `ptr` must be null or a valid NUL-terminated string.
unsafe fn read_str<'a>(ptr: *const c_char, label: &str) -> std::result::Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{} pointer was null", label));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| format!("{} was not valid UTF-8", label))
}

/// Read an optional (nullable) byte-array argument
///
/// # Safety
///
/// `ptr` must be null or valid for `len` bytes.
unsafe fn read_bytes<'a>(ptr: *const u8, len: usize) -> Option<&'a [u8]> {
    if ptr.is_null() {
        None
    } else {
        Some(slice::from_raw_parts(ptr, len))
    }
}

/// Read a required array argument, where null is only legal for length 0
///
/// # Safety
///
/// `ptr` must be valid for `len` elements when non-null.
unsafe fn read_array<'a, T>(ptr: *const T, len: usize) -> std::result::Result<&'a [T], String> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err("array pointer was null with non-zero length".to_string());
    }
    Ok(slice::from_raw_parts(ptr, len))
}

/// Hand a byte vector to the caller
fn give_buffer(bytes: Vec<u8>, out_ptr: *mut *mut u8, out_len: *mut usize) {
    let len = bytes.len();
    let ptr = if len == 0 {
        ptr::null_mut()
    } else {
        Box::into_raw(bytes.into_boxed_slice()) as *mut u8
    };
    unsafe {
        *out_ptr = ptr;
        *out_len = len;
    }
}

/// Length of the last error message in bytes, excluding the terminator
#[no_mangle]
pub extern "C" fn lattice_last_error_length() -> usize {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|msg| msg.as_bytes().len())
            .unwrap_or(0)
    })
}

/// Copy the last error message into `buffer`, returning the bytes copied
/// (excluding the NUL terminator). Returns 0 when no error is recorded.
#[no_mangle]
pub extern "C" fn lattice_last_error_message(buffer: *mut c_char, capacity: usize) -> usize {
    if buffer.is_null() || capacity == 0 {
        return 0;
    }
    LAST_ERROR.with(|slot| {
        if let Some(message) = slot.borrow().as_ref() {
            let bytes = message.as_bytes();
            let to_copy = bytes.len().min(capacity.saturating_sub(1));
            unsafe {
                ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buffer, to_copy);
                *buffer.add(to_copy) = 0;
            }
            to_copy
        } else {
            0
        }
    })
}

/// Clear the recorded error so subsequent calls observe an empty state
#[no_mangle]
pub extern "C" fn lattice_clear_last_error() {
    clear_last_error();
}

/// Release a buffer previously returned through an out-pointer
///
/// # Safety
///
/// `ptr`/`len` must come from this library, unmodified, and be freed once.
#[no_mangle]
pub unsafe extern "C" fn lattice_buffer_free(ptr: *mut u8, len: usize) {
    if ptr.is_null() || len == 0 {
        return;
    }
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, len)));
}

#[no_mangle]
pub extern "C" fn lattice_graph_new() -> u64 {
    clear_last_error();
    graph::graph_create()
}

#[no_mangle]
pub extern "C" fn lattice_graph_delete(graph_handle: u64) -> i32 {
    finish(graph::graph_delete(graph_handle))
}

/// # Safety
///
/// String pointers must be valid NUL-terminated strings; array pointers
/// must be valid for `num_inputs` elements; `out_handle` must be writable.
#[no_mangle]
pub unsafe extern "C" fn lattice_graph_add_operation(
    graph_handle: u64,
    op_type: *const c_char,
    name: *const c_char,
    input_op_handles: *const u64,
    input_op_indices: *const u32,
    num_inputs: usize,
    const_tensor_handle: u64,
    out_handle: *mut u64,
) -> i32 {
    if out_handle.is_null() {
        return bad_argument("out_handle pointer was null");
    }
    let op_type = match read_str(op_type, "op_type") {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };
    let name = match read_str(name, "name") {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };
    let handles = match read_array(input_op_handles, num_inputs) {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };
    let indices = match read_array(input_op_indices, num_inputs) {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };

    match graph::graph_add_operation(graph_handle, op_type, name, handles, indices, const_tensor_handle)
    {
        Ok(handle) => {
            *out_handle = handle;
            clear_last_error();
            LATTICE_OK
        }
        Err(err) => {
            let code = status_code(&err);
            set_last_error(err.to_string());
            code
        }
    }
}

/// # Safety
///
/// `dtype` and `shape_json` must be valid NUL-terminated strings; `data`
/// must be valid for `data_len` bytes; `out_handle` must be writable.
#[no_mangle]
pub unsafe extern "C" fn lattice_tensor_new(
    dtype: *const c_char,
    shape_json: *const c_char,
    data: *const u8,
    data_len: usize,
    out_handle: *mut u64,
) -> i32 {
    if out_handle.is_null() {
        return bad_argument("out_handle pointer was null");
    }
    let dtype = match read_str(dtype, "dtype") {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };
    let shape_json = match read_str(shape_json, "shape_json") {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };
    let data = read_bytes(data, data_len).unwrap_or(&[]);

    match tensor::tensor_create(dtype, shape_json, data) {
        Ok(handle) => {
            *out_handle = handle;
            clear_last_error();
            LATTICE_OK
        }
        Err(err) => {
            let code = status_code(&err);
            set_last_error(err.to_string());
            code
        }
    }
}

#[no_mangle]
pub extern "C" fn lattice_tensor_delete(tensor_handle: u64) -> i32 {
    finish(tensor::tensor_delete(tensor_handle))
}

/// Create a session bound to `graph_handle`
///
/// Returns the new session handle, or 0 on failure with the error recorded.
///
/// # Safety
///
/// `target` must be null or a valid NUL-terminated string; `config` must
/// be null or valid for `config_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn lattice_session_new(
    graph_handle: u64,
    target: *const c_char,
    config: *const u8,
    config_len: usize,
) -> u64 {
    let target = if target.is_null() {
        None
    } else {
        match read_str(target, "target") {
            Ok(s) => Some(s),
            Err(msg) => {
                set_last_error(msg);
                return 0;
            }
        }
    };
    let config = read_bytes(config, config_len);

    match session::session_create(graph_handle, target, config) {
        Ok(handle) => {
            clear_last_error();
            handle
        }
        Err(err) => {
            set_last_error(err.to_string());
            0
        }
    }
}

#[no_mangle]
pub extern "C" fn lattice_session_close(session_handle: u64) -> i32 {
    finish(session::session_close(session_handle))
}

#[no_mangle]
pub extern "C" fn lattice_session_delete(session_handle: u64) -> i32 {
    finish(session::session_delete(session_handle))
}

#[no_mangle]
pub extern "C" fn lattice_session_extend(session_handle: u64) -> i32 {
    finish(session::session_extend(session_handle))
}

/// Run a computation
///
/// Output tensor handles are written into `output_tensor_handles`
/// (`num_outputs` slots). When `want_metadata` is non-zero the serialized
/// run metadata is returned through `metadata_out`/`metadata_len_out`
/// (free with [`lattice_buffer_free`]); otherwise both are zeroed.
///
/// # Safety
///
/// Array pointers must be valid for their stated lengths; `run_options`
/// may be null; metadata out-pointers must be writable.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn lattice_session_run(
    session_handle: u64,
    run_options: *const u8,
    run_options_len: usize,
    input_tensor_handles: *const u64,
    input_op_handles: *const u64,
    input_op_indices: *const u32,
    num_inputs: usize,
    output_op_handles: *const u64,
    output_op_indices: *const u32,
    output_tensor_handles: *mut u64,
    num_outputs: usize,
    target_op_handles: *const u64,
    num_targets: usize,
    want_metadata: u8,
    metadata_out: *mut *mut u8,
    metadata_len_out: *mut usize,
) -> i32 {
    if metadata_out.is_null() || metadata_len_out.is_null() {
        return bad_argument("metadata out pointers were null");
    }
    *metadata_out = ptr::null_mut();
    *metadata_len_out = 0;

    let options = read_bytes(run_options, run_options_len);
    let input_tensors = match read_array(input_tensor_handles, num_inputs) {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };
    let input_ops = match read_array(input_op_handles, num_inputs) {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };
    let input_indices = match read_array(input_op_indices, num_inputs) {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };
    let output_ops = match read_array(output_op_handles, num_outputs) {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };
    let output_indices = match read_array(output_op_indices, num_outputs) {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };
    let targets = match read_array(target_op_handles, num_targets) {
        Ok(s) => s,
        Err(msg) => return bad_argument(&msg),
    };
    let output_slots: &mut [u64] = if num_outputs == 0 {
        &mut []
    } else if output_tensor_handles.is_null() {
        return bad_argument("output_tensor_handles pointer was null");
    } else {
        slice::from_raw_parts_mut(output_tensor_handles, num_outputs)
    };

    match session::session_run(
        session_handle,
        options,
        input_tensors,
        input_ops,
        input_indices,
        output_ops,
        output_indices,
        targets,
        want_metadata != 0,
        output_slots,
    ) {
        Ok(Some(metadata)) => {
            give_buffer(metadata, metadata_out, metadata_len_out);
            clear_last_error();
            LATTICE_OK
        }
        Ok(None) => {
            clear_last_error();
            LATTICE_OK
        }
        Err(err) => {
            let code = status_code(&err);
            set_last_error(err.to_string());
            code
        }
    }
}

/// Enumerate devices under an optional configuration
///
/// The descriptor list is packed into one buffer: a little-endian `u32`
/// count, then per descriptor a little-endian `u32` length followed by
/// that many bytes. Free the buffer with [`lattice_buffer_free`]. On
/// failure the out-pointers are zeroed and nothing is returned.
///
/// # Safety
///
/// `config` may be null; out-pointers must be writable.
#[no_mangle]
pub unsafe extern "C" fn lattice_list_devices(
    config: *const u8,
    config_len: usize,
    out_ptr: *mut *mut u8,
    out_len: *mut usize,
) -> i32 {
    if out_ptr.is_null() || out_len.is_null() {
        return bad_argument("out pointers were null");
    }
    *out_ptr = ptr::null_mut();
    *out_len = 0;

    let config = read_bytes(config, config_len);
    match devices::list_devices(config) {
        Ok(descriptors) => {
            let mut packed = Vec::new();
            packed.extend_from_slice(&(descriptors.len() as u32).to_le_bytes());
            for descriptor in &descriptors {
                packed.extend_from_slice(&(descriptor.len() as u32).to_le_bytes());
                packed.extend_from_slice(descriptor);
            }
            give_buffer(packed, out_ptr, out_len);
            clear_last_error();
            LATTICE_OK
        }
        Err(err) => {
            let code = status_code(&err);
            set_last_error(err.to_string());
            code
        }
    }
}
