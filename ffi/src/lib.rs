/*
 * lib.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of DavKit, a WebDAV client library.
 *
 * DavKit is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * DavKit is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with DavKit.  If not, see <http://www.gnu.org/licenses/>.
 */

//! C FFI for davkit core. Sessions and credential contexts are identified by opaque
//! non-zero handles; destroying an unknown or already destroyed handle is a no-op.
//! Responses and property lists are caller-allocated structs filled by the library
//! and released with their free function, which zeroes them (so a second free is harmless).
//! All string parameters are UTF-8 NUL-terminated. Operations return a `ResultCode`
//! value (0 = OK); details of the last failure on this thread are in davkit_last_error.

use libc::{c_char, c_int, size_t};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use davkit_core::protocol::dav::{decode_path, LegacyPermissions, PropertyRecord};
use davkit_core::{
    global_init, global_shutdown, CredentialContext, DavError, Depth, LegacyAclEntry, Response, Session,
    SessionConfig,
};

/// Handle to a session or credential context. 0 is never a valid handle.
pub type DavkitHandle = u64;

pub const DAVKIT_OK: c_int = 0;
pub const DAVKIT_ERROR: c_int = 1;

struct Registry {
    sessions: RwLock<HashMap<DavkitHandle, Arc<Mutex<Session>>>>,
    auth_contexts: RwLock<HashMap<DavkitHandle, Arc<CredentialContext>>>,
    next_handle: AtomicU64,
}

fn registry() -> &'static Registry {
    static REGISTRY: once_cell::sync::OnceCell<Registry> = once_cell::sync::OnceCell::new();
    REGISTRY.get_or_init(|| Registry {
        sessions: RwLock::new(HashMap::new()),
        auth_contexts: RwLock::new(HashMap::new()),
        next_handle: AtomicU64::new(1),
    })
}

fn new_handle() -> DavkitHandle {
    registry().next_handle.fetch_add(1, Ordering::Relaxed)
}

fn lookup_session(handle: DavkitHandle) -> Option<Arc<Mutex<Session>>> {
    registry().sessions.read().ok()?.get(&handle).cloned()
}

/// Run `f` on the session behind `handle`, or fail with an Error code.
fn with_session<R>(handle: DavkitHandle, f: impl FnOnce(&mut Session) -> R) -> Result<R, DavError> {
    let session = lookup_session(handle).ok_or_else(|| DavError::other("invalid session handle"))?;
    let mut guard = session
        .lock()
        .map_err(|_| DavError::other("session is unusable after a panic"))?;
    Ok(f(&mut guard))
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = RefCell::new(None);
}

fn set_last_error(message: &str) {
    let msg = to_cstring(message);
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

/// Record `err` and return its code.
fn fail(err: &DavError) -> c_int {
    set_last_error(&err.to_string());
    err.code().as_i32()
}

/// CString without interior NULs (they are dropped).
fn to_cstring(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

fn string_to_c(s: &str) -> *mut c_char {
    to_cstring(s).into_raw()
}

fn opt_string_to_c(s: Option<&str>) -> *mut c_char {
    s.map(string_to_c).unwrap_or(ptr::null_mut())
}

unsafe fn free_c_string(p: &mut *mut c_char) {
    if !p.is_null() {
        drop(CString::from_raw(*p));
        *p = ptr::null_mut();
    }
}

fn ptr_to_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

/// Lossy conversion; NULL becomes the empty string.
fn ptr_to_string_lossy(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr).to_string_lossy().into_owned() }
}

/// Hand a Vec to C as (pointer, length). An empty Vec gives NULL.
fn vec_into_raw<T>(v: Vec<T>) -> (*mut T, size_t) {
    if v.is_empty() {
        return (ptr::null_mut(), 0);
    }
    let len = v.len();
    let boxed = v.into_boxed_slice();
    (Box::into_raw(boxed) as *mut T, len)
}

unsafe fn vec_from_raw<T>(p: *mut T, len: size_t) -> Vec<T> {
    if p.is_null() {
        return Vec::new();
    }
    Box::from_raw(ptr::slice_from_raw_parts_mut(p, len)).into_vec()
}

// ---------- Process lifecycle ----------

/// Initialize the transport layer. Reference counted; balance with davkit_global_shutdown.
#[no_mangle]
pub extern "C" fn davkit_global_init() -> c_int {
    match global_init() {
        Ok(()) => {
            clear_last_error();
            DAVKIT_OK
        }
        Err(e) => fail(&e),
    }
}

/// Release one davkit_global_init reference. Extra calls are ignored.
#[no_mangle]
pub extern "C" fn davkit_global_shutdown() {
    global_shutdown();
}

/// Message of the last failure on this thread, or NULL. Valid until the next call on this thread.
#[no_mangle]
pub extern "C" fn davkit_last_error() -> *const c_char {
    LAST_ERROR.with(|e| e.borrow().as_ref().map(|s| s.as_ptr()).unwrap_or(ptr::null()))
}

/// Free a string returned by this library. No-op if ptr is NULL.
#[no_mangle]
pub unsafe extern "C" fn davkit_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        let _ = CString::from_raw(ptr);
    }
}

// ---------- Sessions ----------

/// Create a session for `base_url` (e.g. "https://dav.example.com:8443"). user_agent may be NULL.
/// Returns a session handle, or 0 on error (see davkit_last_error).
#[no_mangle]
pub unsafe extern "C" fn davkit_session_create(base_url: *const c_char, user_agent: *const c_char) -> DavkitHandle {
    let url = match ptr_to_str(base_url) {
        Some(s) => s,
        None => {
            set_last_error("base_url is null or not valid UTF-8");
            return 0;
        }
    };
    let mut config = match SessionConfig::from_url(&url) {
        Ok(c) => c,
        Err(e) => {
            fail(&e);
            return 0;
        }
    };
    if let Some(ua) = ptr_to_str(user_agent) {
        config = config.user_agent(ua);
    }
    let session = match Session::new(config) {
        Ok(s) => s,
        Err(e) => {
            fail(&e);
            return 0;
        }
    };
    let handle = new_handle();
    match registry().sessions.write() {
        Ok(mut guard) => {
            guard.insert(handle, Arc::new(Mutex::new(session)));
        }
        Err(_) => {
            set_last_error("session registry is unusable");
            return 0;
        }
    }
    tracing::debug!(handle, url = %url, "session created");
    clear_last_error();
    handle
}

/// Destroy a session, closing its connection. No-op for 0 or an unknown handle.
#[no_mangle]
pub extern "C" fn davkit_session_destroy(session: DavkitHandle) {
    let removed = registry().sessions.write().ok().and_then(|mut g| g.remove(&session));
    if removed.is_some() {
        tracing::debug!(handle = session, "session destroyed");
    }
}

/// Drop the session's kept-alive connection, if any.
#[no_mangle]
pub extern "C" fn davkit_session_close_connection(session: DavkitHandle) -> c_int {
    match with_session(session, |s| s.close_connection()) {
        Ok(()) => DAVKIT_OK,
        Err(e) => fail(&e),
    }
}

// ---------- Authentication ----------

/// Create a credential context. Credentials are copied.
/// Returns a handle, or 0 if either pointer is NULL (see davkit_last_error).
#[no_mangle]
pub unsafe extern "C" fn davkit_auth_context_create(username: *const c_char, password: *const c_char) -> DavkitHandle {
    if username.is_null() || password.is_null() {
        set_last_error("username and password must not be null");
        return 0;
    }
    let context = Arc::new(CredentialContext::new(
        ptr_to_string_lossy(username),
        ptr_to_string_lossy(password),
    ));
    let handle = new_handle();
    match registry().auth_contexts.write() {
        Ok(mut guard) => {
            guard.insert(handle, context);
            handle
        }
        Err(_) => {
            set_last_error("credential registry is unusable");
            0
        }
    }
}

/// Destroy a credential context. Sessions it was attached to keep their own reference.
#[no_mangle]
pub extern "C" fn davkit_auth_context_destroy(context: DavkitHandle) {
    let _ = registry().auth_contexts.write().map(|mut g| g.remove(&context));
}

/// Answer server challenges on `session` with the credentials of `context`.
/// A context of 0 removes server authentication.
#[no_mangle]
pub extern "C" fn davkit_session_set_server_auth(session: DavkitHandle, context: DavkitHandle) -> c_int {
    let credentials = if context == 0 {
        None
    } else {
        match registry().auth_contexts.read().ok().and_then(|g| g.get(&context).cloned()) {
            Some(c) => Some(c),
            None => return fail(&DavError::other("invalid credential context handle")),
        }
    };
    let result = with_session(session, |s| match credentials {
        Some(c) => s.set_server_auth(c),
        None => s.clear_server_auth(),
    });
    match result {
        Ok(()) => DAVKIT_OK,
        Err(e) => fail(&e),
    }
}

// ---------- Dispatch ----------

/// Request header. Pairs with a NULL or empty name or value are skipped.
#[repr(C)]
pub struct DavkitRequestHeader {
    pub name: *const c_char,
    pub value: *const c_char,
}

/// Response header (owned by the enclosing DavkitResponse).
#[repr(C)]
pub struct DavkitHeader {
    pub name: *mut c_char,
    pub value: *mut c_char,
}

/// Result of davkit_dispatch_request. Release with davkit_response_free.
/// `error` is non-NULL exactly when `code` is not 0.
#[repr(C)]
pub struct DavkitResponse {
    pub code: c_int,
    pub status_code: c_int,
    pub status_class: c_int,
    pub reason: *mut c_char,
    pub body: *mut u8,
    pub body_len: size_t,
    pub error: *mut c_char,
    pub headers: *mut DavkitHeader,
    pub header_count: size_t,
}

impl DavkitResponse {
    fn empty() -> Self {
        Self {
            code: DAVKIT_OK,
            status_code: 0,
            status_class: 0,
            reason: ptr::null_mut(),
            body: ptr::null_mut(),
            body_len: 0,
            error: ptr::null_mut(),
            headers: ptr::null_mut(),
            header_count: 0,
        }
    }

    fn from_response(response: Response) -> Self {
        let headers: Vec<DavkitHeader> = response
            .headers()
            .iter()
            .map(|(k, v)| DavkitHeader {
                name: string_to_c(k),
                value: string_to_c(v),
            })
            .collect();
        let (headers, header_count) = vec_into_raw(headers);
        let status = response.status();
        let code = response.code().as_i32();
        let status_code = c_int::from(status.code);
        let status_class = c_int::from(status.class);
        let reason = opt_string_to_c(status.reason.as_deref());
        let error = opt_string_to_c(response.error());
        let (body, body_len) = vec_into_raw(response.into_body());
        Self {
            code,
            status_code,
            status_class,
            reason,
            body,
            body_len,
            error,
            headers,
            header_count,
        }
    }

    fn failure(err: &DavError) -> Self {
        Self {
            code: err.code().as_i32(),
            error: string_to_c(err.message()),
            ..Self::empty()
        }
    }
}

/// Send one request on `session` and fill `*out`.
/// body may be NULL when body_len is 0; headers may be NULL when header_count is 0.
/// Returns the transport result code (also stored in out->code). A non-2xx status is still 0.
#[no_mangle]
pub unsafe extern "C" fn davkit_dispatch_request(
    session: DavkitHandle,
    method: *const c_char,
    target: *const c_char,
    body: *const u8,
    body_len: size_t,
    headers: *const DavkitRequestHeader,
    header_count: size_t,
    out: *mut DavkitResponse,
) -> c_int {
    if out.is_null() {
        return fail(&DavError::other("out is null"));
    }
    let (method, target) = match (ptr_to_str(method), ptr_to_str(target)) {
        (Some(m), Some(t)) => (m, t),
        _ => {
            let err = DavError::other("method or target is null or not valid UTF-8");
            out.write(DavkitResponse::failure(&err));
            return fail(&err);
        }
    };
    let body = if body.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(body, body_len))
    };
    let pairs: Vec<(String, String)> = if headers.is_null() {
        Vec::new()
    } else {
        std::slice::from_raw_parts(headers, header_count)
            .iter()
            .map(|h| (ptr_to_string_lossy(h.name), ptr_to_string_lossy(h.value)))
            .collect()
    };
    match with_session(session, |s| s.dispatch(&method, &target, body, &pairs)) {
        Ok(response) => {
            let code = response.code();
            match response.error() {
                Some(msg) => set_last_error(msg),
                None => clear_last_error(),
            }
            out.write(DavkitResponse::from_response(response));
            code.as_i32()
        }
        Err(e) => {
            out.write(DavkitResponse::failure(&e));
            fail(&e)
        }
    }
}

/// Release what davkit_dispatch_request put in `*response` and zero it. NULL and repeated calls are no-ops.
#[no_mangle]
pub unsafe extern "C" fn davkit_response_free(response: *mut DavkitResponse) {
    let Some(r) = response.as_mut() else {
        return;
    };
    free_c_string(&mut r.reason);
    free_c_string(&mut r.error);
    drop(vec_from_raw(r.body, r.body_len));
    for mut h in vec_from_raw(r.headers, r.header_count) {
        free_c_string(&mut h.name);
        free_c_string(&mut h.value);
    }
    *r = DavkitResponse::empty();
}

// ---------- PROPFIND ----------

/// One resource from davkit_collect_propfind. Optional strings are NULL when absent.
#[repr(C)]
pub struct DavkitPropRecord {
    pub href: *mut c_char,
    pub path: *mut c_char,
    pub display_name: *mut c_char,
    pub etag: *mut c_char,
    pub content_type: *mut c_char,
    /// -1 when absent or unparseable.
    pub content_length: i64,
    pub last_modified: *mut c_char,
    pub is_collection: c_int,
    pub status_code: c_int,
}

impl DavkitPropRecord {
    fn from_record(record: &PropertyRecord) -> Self {
        Self {
            href: string_to_c(&record.href),
            path: string_to_c(&record.path),
            display_name: opt_string_to_c(record.display_name.as_deref()),
            etag: opt_string_to_c(record.etag.as_deref()),
            content_type: opt_string_to_c(record.content_type.as_deref()),
            content_length: record.content_length,
            last_modified: opt_string_to_c(record.last_modified.as_deref()),
            is_collection: c_int::from(record.is_collection),
            status_code: c_int::from(record.status_code),
        }
    }

    unsafe fn release(&mut self) {
        free_c_string(&mut self.href);
        free_c_string(&mut self.path);
        free_c_string(&mut self.display_name);
        free_c_string(&mut self.etag);
        free_c_string(&mut self.content_type);
        free_c_string(&mut self.last_modified);
    }
}

/// Records of one PROPFIND. Release with davkit_prop_list_free.
#[repr(C)]
pub struct DavkitPropList {
    pub records: *mut DavkitPropRecord,
    pub count: size_t,
}

/// PROPFIND `path` with the given depth (0, 1, anything else = infinity) and fill `*out`.
/// On failure `*out` is left empty.
#[no_mangle]
pub unsafe extern "C" fn davkit_collect_propfind(
    session: DavkitHandle,
    path: *const c_char,
    depth: c_int,
    out: *mut DavkitPropList,
) -> c_int {
    let Some(out) = out.as_mut() else {
        return fail(&DavError::other("out is null"));
    };
    *out = DavkitPropList {
        records: ptr::null_mut(),
        count: 0,
    };
    let Some(path) = ptr_to_str(path) else {
        return fail(&DavError::other("path is null or not valid UTF-8"));
    };
    let result = with_session(session, |s| s.collect_properties(&path, Depth::from_raw(depth)));
    match result.and_then(|r| r) {
        Ok(records) => {
            let converted: Vec<DavkitPropRecord> = records.iter().map(DavkitPropRecord::from_record).collect();
            let (records, count) = vec_into_raw(converted);
            out.records = records;
            out.count = count;
            clear_last_error();
            DAVKIT_OK
        }
        Err(e) => fail(&e),
    }
}

/// Release a property list and zero it. NULL and repeated calls are no-ops.
#[no_mangle]
pub unsafe extern "C" fn davkit_prop_list_free(list: *mut DavkitPropList) {
    let Some(list) = list.as_mut() else {
        return;
    };
    for mut record in vec_from_raw(list.records, list.count) {
        record.release();
    }
    list.records = ptr::null_mut();
    list.count = 0;
}

/// Percent-decoded path of a record. Caller frees with davkit_free_string; NULL if record is NULL.
#[no_mangle]
pub unsafe extern "C" fn davkit_prop_record_decoded_path(record: *const DavkitPropRecord) -> *mut c_char {
    let Some(record) = record.as_ref() else {
        return ptr::null_mut();
    };
    string_to_c(&decode_path(&ptr_to_string_lossy(record.path)))
}

// ---------- ACL ----------

/// Legacy ACL entry. scope: 0 resource, 1 property, other all. effect: 0 grant, other deny.
/// Permission fields are booleans (non-zero = set).
#[repr(C)]
pub struct DavkitLegacyAce {
    pub scope: c_int,
    pub effect: c_int,
    pub principal: *const c_char,
    pub read: c_int,
    pub read_acl: c_int,
    pub write: c_int,
    pub write_acl: c_int,
    pub read_current_user_privilege_set: c_int,
}

impl DavkitLegacyAce {
    fn to_entry(&self) -> LegacyAclEntry {
        let permissions = LegacyPermissions {
            read: self.read != 0,
            read_acl: self.read_acl != 0,
            write: self.write != 0,
            write_acl: self.write_acl != 0,
            read_current_user_privilege_set: self.read_current_user_privilege_set != 0,
        };
        LegacyAclEntry::from_raw(self.scope, self.effect, ptr_to_string_lossy(self.principal), permissions)
    }
}

/// Replace the ACL of `uri` with `count` legacy entries (entries may be NULL when count is 0).
#[no_mangle]
pub unsafe extern "C" fn davkit_acl_set_legacy(
    session: DavkitHandle,
    uri: *const c_char,
    entries: *const DavkitLegacyAce,
    count: size_t,
) -> c_int {
    let Some(uri) = ptr_to_str(uri) else {
        return fail(&DavError::other("uri is null or not valid UTF-8"));
    };
    if entries.is_null() && count != 0 {
        return fail(&DavError::other("entries is null"));
    }
    let legacy: Vec<LegacyAclEntry> = if count == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(entries, count).iter().map(|e| e.to_entry()).collect()
    };
    match with_session(session, |s| s.set_legacy_acl(&uri, &legacy)).and_then(|r| r) {
        Ok(()) => {
            clear_last_error();
            DAVKIT_OK
        }
        Err(e) => fail(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn last_error() -> Option<String> {
        ptr_to_str(davkit_last_error())
    }

    /// Loopback server answering one request with `response`.
    fn one_shot(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut seen = Vec::new();
            let mut buf = [0u8; 1024];
            let mut wanted = None;
            while wanted.map_or(true, |n| seen.len() < n) {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    return;
                }
                seen.extend_from_slice(&buf[..n]);
                if wanted.is_none() {
                    wanted = request_size(&seen);
                }
            }
            stream.write_all(response.as_bytes()).unwrap();
        });
        port
    }

    /// Header block plus Content-Length, once the header block is complete.
    fn request_size(seen: &[u8]) -> Option<usize> {
        let end = seen.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
        let head = String::from_utf8_lossy(&seen[..end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        Some(end + length)
    }

    unsafe fn session_for(port: u16) -> DavkitHandle {
        let url = c(&format!("http://127.0.0.1:{}", port));
        davkit_session_create(url.as_ptr(), ptr::null())
    }

    #[test]
    fn create_rejects_bad_url() {
        unsafe {
            assert_eq!(davkit_session_create(ptr::null(), ptr::null()), 0);
            assert!(last_error().is_some());
            let url = c("not a url");
            assert_eq!(davkit_session_create(url.as_ptr(), ptr::null()), 0);
            assert!(last_error().is_some());
        }
    }

    #[test]
    fn destroy_is_idempotent() {
        unsafe {
            let url = c("http://127.0.0.1:9");
            let handle = davkit_session_create(url.as_ptr(), ptr::null());
            assert_ne!(handle, 0);
            davkit_session_destroy(handle);
            davkit_session_destroy(handle);
            davkit_session_destroy(0);
            assert_eq!(davkit_session_close_connection(handle), DAVKIT_ERROR);

            let (user, pass) = (c("u"), c("p"));
            let ctx = davkit_auth_context_create(user.as_ptr(), pass.as_ptr());
            assert_ne!(ctx, 0);
            davkit_auth_context_destroy(ctx);
            davkit_auth_context_destroy(ctx);
        }
    }

    #[test]
    fn auth_context_requires_both_credentials() {
        unsafe {
            let user = c("u");
            assert_eq!(davkit_auth_context_create(user.as_ptr(), ptr::null()), 0);
            assert!(last_error().unwrap().contains("null"));
            assert_eq!(davkit_auth_context_create(ptr::null(), user.as_ptr()), 0);
            let empty = c("");
            assert_ne!(davkit_auth_context_create(empty.as_ptr(), empty.as_ptr()), 0);
        }
    }

    #[test]
    fn set_server_auth_checks_handles() {
        unsafe {
            let url = c("http://127.0.0.1:9");
            let session = davkit_session_create(url.as_ptr(), ptr::null());
            let (user, pass) = (c("u"), c("p"));
            let ctx = davkit_auth_context_create(user.as_ptr(), pass.as_ptr());
            assert_eq!(davkit_session_set_server_auth(session, ctx), DAVKIT_OK);
            davkit_auth_context_destroy(ctx);
            assert_eq!(davkit_session_set_server_auth(session, ctx), DAVKIT_ERROR);
            assert_eq!(davkit_session_set_server_auth(session, 0), DAVKIT_OK);
            davkit_session_destroy(session);
        }
    }

    #[test]
    fn free_functions_accept_null_and_repeat() {
        unsafe {
            davkit_response_free(ptr::null_mut());
            davkit_prop_list_free(ptr::null_mut());
            davkit_free_string(ptr::null_mut());

            let mut response = DavkitResponse::failure(&DavError::other("boom"));
            davkit_response_free(&mut response);
            assert!(response.error.is_null());
            davkit_response_free(&mut response);

            let mut list = DavkitPropList {
                records: ptr::null_mut(),
                count: 0,
            };
            davkit_prop_list_free(&mut list);
            davkit_prop_list_free(&mut list);
        }
    }

    #[test]
    fn dispatch_fills_response() {
        let port = one_shot("HTTP/1.1 200 OK\r\nA: 1\r\nB: 2\r\nA: 3\r\nContent-Length: 2\r\n\r\nok");
        unsafe {
            let session = session_for(port);
            let (method, target) = (c("GET"), c("/"));
            let (name, value) = (c("X-Test"), c("1"));
            let headers = [DavkitRequestHeader {
                name: name.as_ptr(),
                value: value.as_ptr(),
            }];
            let mut out = DavkitResponse::empty();
            let code = davkit_dispatch_request(
                session,
                method.as_ptr(),
                target.as_ptr(),
                ptr::null(),
                0,
                headers.as_ptr(),
                headers.len(),
                &mut out,
            );
            assert_eq!(code, DAVKIT_OK);
            assert!(out.error.is_null());
            assert_eq!(out.status_code, 200);
            assert_eq!(out.status_class, 2);
            assert_eq!(std::slice::from_raw_parts(out.body, out.body_len), b"ok");
            let names: Vec<String> = std::slice::from_raw_parts(out.headers, out.header_count)
                .iter()
                .map(|h| ptr_to_string_lossy(h.name))
                .collect();
            assert_eq!(names, vec!["A", "B", "A", "Content-Length"]);
            davkit_response_free(&mut out);
            davkit_response_free(&mut out);
            assert!(out.body.is_null());
            davkit_session_destroy(session);
        }
    }

    #[test]
    fn dispatch_with_invalid_method_sets_error() {
        unsafe {
            let url = c("http://127.0.0.1:9");
            let session = davkit_session_create(url.as_ptr(), ptr::null());
            let (method, target) = (c("BAD METHOD"), c("/"));
            let mut out = DavkitResponse::empty();
            let code = davkit_dispatch_request(
                session,
                method.as_ptr(),
                target.as_ptr(),
                ptr::null(),
                0,
                ptr::null(),
                0,
                &mut out,
            );
            assert_eq!(code, DAVKIT_ERROR);
            assert_eq!(out.code, DAVKIT_ERROR);
            assert!(!out.error.is_null());
            assert!(last_error().is_some());
            davkit_response_free(&mut out);
            davkit_session_destroy(session);
        }
    }

    #[test]
    fn propfind_fills_list() {
        let port = one_shot(concat!(
            "HTTP/1.1 207 Multi-Status\r\nConnection: close\r\n\r\n",
            "<?xml version=\"1.0\"?><D:multistatus xmlns:D=\"DAV:\"><D:response><D:href>/a%20b</D:href>",
            "<D:propstat><D:prop><D:getcontentlength>7</D:getcontentlength></D:prop>",
            "<D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response></D:multistatus>"
        ));
        unsafe {
            let session = session_for(port);
            let path = c("/");
            let mut list = DavkitPropList {
                records: ptr::null_mut(),
                count: 0,
            };
            assert_eq!(davkit_collect_propfind(session, path.as_ptr(), 1, &mut list), DAVKIT_OK);
            assert_eq!(list.count, 1);
            let record = &*list.records;
            assert_eq!(record.content_length, 7);
            assert!(record.display_name.is_null());
            assert_eq!(record.is_collection, 0);
            let decoded = davkit_prop_record_decoded_path(record);
            assert_eq!(ptr_to_str(decoded).as_deref(), Some("/a b"));
            davkit_free_string(decoded);
            davkit_prop_list_free(&mut list);
            davkit_prop_list_free(&mut list);
            assert_eq!(list.count, 0);
            davkit_session_destroy(session);
        }
    }

    #[test]
    fn acl_rejects_null_entries() {
        unsafe {
            let url = c("http://127.0.0.1:9");
            let session = davkit_session_create(url.as_ptr(), ptr::null());
            let uri = c("/doc");
            assert_eq!(davkit_acl_set_legacy(session, uri.as_ptr(), ptr::null(), 2), DAVKIT_ERROR);
            assert_eq!(davkit_acl_set_legacy(session, ptr::null(), ptr::null(), 0), DAVKIT_ERROR);
            davkit_session_destroy(session);
        }
    }

    #[test]
    fn legacy_ace_conversion() {
        let principal = c("/principals/bob");
        let ace = DavkitLegacyAce {
            scope: 7,
            effect: 1,
            principal: principal.as_ptr(),
            read: 1,
            read_acl: 0,
            write: 1,
            write_acl: 0,
            read_current_user_privilege_set: 0,
        };
        let entry = ace.to_entry();
        assert_eq!(entry.principal, "/principals/bob");
        assert!(entry.permissions.read && entry.permissions.write);
        assert!(!entry.permissions.read_acl);
    }
}
