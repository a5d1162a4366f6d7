/*
 * dispatch.rs
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

//! Request dispatch: arbitrary method, caller headers and body; the response body is read into memory.

use std::fmt;
use std::io;

use crate::error::{DavError, ResultCode};
use crate::protocol::http::{Method, Request, ResponseHandler, Status};
use crate::session::Session;

/// Capacity reserved for the first body chunk.
pub const INITIAL_BODY_CAPACITY: usize = 4096;

/// The body buffer could not grow to `requested` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityError {
    pub requested: usize,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot grow response body buffer to {} bytes", self.requested)
    }
}

impl std::error::Error for CapacityError {}

/// Growable body buffer. Capacity starts at `INITIAL_BODY_CAPACITY` and doubles;
/// every reservation is fallible, so running out of memory is an error, not an abort.
#[derive(Debug, Default)]
pub struct BodyBuffer {
    data: Vec<u8>,
    limit: Option<usize>,
}

impl BodyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer refusing to hold more than `limit` bytes.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            data: Vec::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Append `chunk`. On error the buffer is unchanged.
    pub fn extend(&mut self, chunk: &[u8]) -> Result<(), CapacityError> {
        let needed = self
            .data
            .len()
            .checked_add(chunk.len())
            .ok_or(CapacityError { requested: usize::MAX })?;
        if let Some(limit) = self.limit {
            if needed > limit {
                return Err(CapacityError { requested: needed });
            }
        }
        if needed > self.data.capacity() {
            let mut cap = self.data.capacity().max(INITIAL_BODY_CAPACITY);
            while cap < needed {
                cap = cap.checked_mul(2).ok_or(CapacityError { requested: needed })?;
            }
            if let Some(limit) = self.limit {
                cap = cap.min(limit);
            }
            self.data
                .try_reserve_exact(cap - self.data.len())
                .map_err(|_| CapacityError { requested: cap })?;
        }
        self.data.extend_from_slice(chunk);
        Ok(())
    }
}

/// Outcome of one dispatch.
///
/// `code` is the transport result; the HTTP status is separate, so a 404 is `Ok`.
/// `error()` is `Some` exactly when `code` is not `Ok`. Status, headers and body
/// received before a failure are kept.
#[derive(Debug, Clone)]
pub struct Response {
    code: ResultCode,
    status: Status,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    error: Option<String>,
}

impl Response {
    pub(crate) fn completed(status: Status, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            code: ResultCode::Ok,
            status,
            headers,
            body,
            error: None,
        }
    }

    /// Failed dispatch with nothing received.
    pub(crate) fn failure(code: ResultCode, message: impl Into<String>) -> Self {
        Self::completed(Status::default(), Vec::new(), Vec::new()).fail(code, message)
    }

    fn fail(mut self, code: ResultCode, message: impl Into<String>) -> Self {
        self.code = if code.is_ok() { ResultCode::Error } else { code };
        self.error = Some(message.into());
        self
    }

    pub fn code(&self) -> ResultCode {
        self.code
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }

    /// Status line; code and class are 0 when no status was received.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Headers in arrival order, duplicates kept.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header named `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Ok if the transport succeeded and the status is 2xx.
    pub fn check_success(&self) -> Result<(), DavError> {
        if let Some(message) = &self.error {
            let err = DavError::new(self.code, message.clone());
            return Err(match self.status.code {
                0 => err,
                status => err.with_status(status),
            });
        }
        if !self.status.is_success() {
            return Err(DavError::status(self.status.code, self.status.reason.as_deref()));
        }
        Ok(())
    }
}

/// Receives the body of a successful (2xx) response instead of the in-memory buffer.
pub(crate) trait BodySink {
    /// The body starts; `headers` are the final response headers.
    fn begin(&mut self, headers: &[(String, String)]);

    fn chunk(&mut self, data: &[u8]) -> io::Result<()>;

    fn finish(&mut self);
}

/// ResponseHandler that records one response into a `BodyBuffer`, or hands a 2xx body to a sink.
pub(crate) struct Collector<'s> {
    status: Option<Status>,
    headers: Vec<(String, String)>,
    limit: Option<usize>,
    body: BodyBuffer,
    overflowed: bool,
    sink: Option<&'s mut dyn BodySink>,
    streaming: bool,
}

impl<'s> Collector<'s> {
    pub(crate) fn new(limit: Option<usize>) -> Self {
        Self {
            status: None,
            headers: Vec::new(),
            limit,
            body: BodyBuffer::with_limit(limit),
            overflowed: false,
            sink: None,
            streaming: false,
        }
    }

    pub(crate) fn with_sink(limit: Option<usize>, sink: &'s mut dyn BodySink) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new(limit)
        }
    }

    /// Forget the previous response before the request is sent again.
    pub(crate) fn reset(&mut self) {
        self.status = None;
        self.headers.clear();
        self.body = BodyBuffer::with_limit(self.limit);
        self.overflowed = false;
        self.streaming = false;
    }

    pub(crate) fn status_code(&self) -> Option<u16> {
        self.status.as_ref().map(|s| s.code)
    }

    pub(crate) fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub(crate) fn into_response(self) -> Response {
        match self.status {
            Some(status) => Response::completed(status, self.headers, self.body.into_vec()),
            None => Response::failure(ResultCode::Error, "no response received"),
        }
    }

    pub(crate) fn into_failure(self, code: ResultCode, message: String) -> Response {
        let status = self.status.unwrap_or_default();
        Response::completed(status, self.headers, self.body.into_vec()).fail(code, message)
    }
}

impl ResponseHandler for Collector<'_> {
    fn status(&mut self, status: Status) {
        self.status = Some(status);
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn start_body(&mut self) {
        let success = self.status.as_ref().map(|s| s.is_success()).unwrap_or(false);
        if let (true, Some(sink)) = (success, self.sink.as_mut()) {
            sink.begin(&self.headers);
            self.streaming = true;
        }
    }

    fn body_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        if self.streaming {
            if let Some(sink) = self.sink.as_mut() {
                return sink.chunk(data);
            }
        }
        self.body.extend(data).map_err(|e| {
            self.overflowed = true;
            tracing::warn!(received = self.body.len(), "{}", e);
            io::Error::new(io::ErrorKind::OutOfMemory, e)
        })
    }

    fn end_body(&mut self) {
        if let (true, Some(sink)) = (self.streaming, self.sink.as_mut()) {
            sink.finish();
        }
    }

    fn complete(&mut self) {}

    fn failed(&mut self, error: &io::Error) {
        if !self.overflowed {
            tracing::trace!(error = %error, "response failed");
        }
    }
}

fn is_valid_target(target: &str) -> bool {
    !target.is_empty() && !target.chars().any(|c| c.is_whitespace() || c.is_control())
}

impl Session {
    /// Send `method target` with `headers` (in order) and an optional body, reading the whole
    /// response into memory.
    ///
    /// Header pairs with an empty name or value are skipped, as are `Host`, `Content-Length`
    /// and `Transfer-Encoding`: framing belongs to the transport. The body is sent with
    /// `Content-Length`. An invalid method or target fails with `Error` before any I/O.
    pub fn dispatch<N, V>(
        &mut self,
        method: &str,
        target: &str,
        body: Option<&[u8]>,
        headers: &[(N, V)],
    ) -> Response
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let Some(method) = Method::from_token(method) else {
            return Response::failure(ResultCode::Error, format!("invalid request method {:?}", method));
        };
        if !is_valid_target(target) {
            return Response::failure(ResultCode::Error, format!("invalid request target {:?}", target));
        }
        let mut request = Request::new(method, target);
        for (name, value) in headers {
            request.header(name.as_ref(), value.as_ref());
        }
        if let Some(data) = body {
            request.body_slice(data);
        }
        self.execute(request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::auth::{AuthResponder, CredentialContext, Credentials};
    use crate::config::{Origin, Scheme, SessionConfig};
    use crate::session::testing::{Reply, ScriptedTransport};

    fn session_with(config: SessionConfig, replies: Vec<Reply>) -> (Session, ScriptedTransport) {
        let transport = ScriptedTransport::new(replies);
        (Session::with_transport(config, Box::new(transport.clone())), transport)
    }

    fn session(replies: Vec<Reply>) -> (Session, ScriptedTransport) {
        session_with(SessionConfig::new(Origin::new(Scheme::Https, "dav.test", 443)), replies)
    }

    const NO_HEADERS: &[(&str, &str)] = &[];

    #[test]
    fn body_buffer_starts_at_4096_and_doubles() {
        let mut buf = BodyBuffer::new();
        buf.extend(&[1u8; 10]).unwrap();
        assert!(buf.capacity() >= INITIAL_BODY_CAPACITY);
        buf.extend(&vec![2u8; 5000]).unwrap();
        assert!(buf.capacity() >= 8192);
        assert_eq!(buf.len(), 5010);
    }

    #[test]
    fn body_buffer_limit_leaves_contents_unchanged() {
        let mut buf = BodyBuffer::with_limit(Some(6));
        buf.extend(b"abcd").unwrap();
        let err = buf.extend(b"efg").unwrap_err();
        assert_eq!(err.requested, 7);
        assert_eq!(buf.as_slice(), b"abcd");
    }

    #[test]
    fn headers_are_sent_in_order_and_bad_pairs_skipped() {
        let (mut s, t) = session(vec![Reply::status(200)]);
        let headers = [
            ("Depth", "1"),
            ("", "ignored"),
            ("X-Empty", ""),
            ("Content-Length", "999"),
            ("Host", "evil.test"),
            ("X-Dup", "a"),
            ("X-Dup", "b"),
        ];
        let r = s.dispatch("PROPFIND", "/dir/", Some(&b"<x/>"[..]), &headers);
        assert!(r.is_ok());
        let sent = t.sent();
        let names: Vec<(&str, &str)> = sent[0]
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(names, vec![("Depth", "1"), ("X-Dup", "a"), ("X-Dup", "b")]);
        assert_eq!(sent[0].body.as_deref(), Some(&b"<x/>"[..]));
        assert_eq!(sent[0].method, Method::Propfind);
    }

    #[test]
    fn response_keeps_header_order_duplicates_and_status_class() {
        let (mut s, _) = session(vec![Reply::status(404)
            .with_header("Set-Cookie", "a=1")
            .with_header("Content-Type", "text/plain")
            .with_header("Set-Cookie", "b=2")
            .with_body(b"missing")]);
        let r = s.dispatch("GET", "/nope", None, NO_HEADERS);
        assert_eq!(r.code(), ResultCode::Ok);
        assert!(r.error().is_none());
        assert_eq!(r.status().code, 404);
        assert_eq!(r.status().class, 4);
        assert_eq!(r.headers().len(), 3);
        assert_eq!(r.headers()[2], ("Set-Cookie".to_string(), "b=2".to_string()));
        assert_eq!(r.body(), b"missing");
        assert!(r.check_success().is_err());
    }

    #[test]
    fn invalid_method_fails_without_io() {
        let (mut s, t) = session(vec![Reply::status(200)]);
        let r = s.dispatch("BAD METHOD", "/", None, NO_HEADERS);
        assert_eq!(r.code(), ResultCode::Error);
        assert!(r.error().is_some());
        assert!(t.sent().is_empty());

        let r = s.dispatch("GET", "/with space", None, NO_HEADERS);
        assert_eq!(r.code(), ResultCode::Error);
        assert!(t.sent().is_empty());
    }

    #[test]
    fn extension_method_is_dispatched() {
        let (mut s, t) = session(vec![Reply::status(200)]);
        let r = s.dispatch("VERSION-CONTROL", "/file", None, NO_HEADERS);
        assert!(r.is_ok());
        assert_eq!(t.sent()[0].method.as_str(), "VERSION-CONTROL");
    }

    #[test]
    fn oversized_body_stops_with_partial_content() {
        let config = SessionConfig::new(Origin::new(Scheme::Http, "dav.test", 80)).max_response_body(10);
        let (mut s, _) = session_with(config, vec![Reply::status(200).with_body(&[7u8; 20])]);
        let r = s.dispatch("GET", "/big", None, NO_HEADERS);
        assert_eq!(r.code(), ResultCode::Error);
        assert!(r.error().is_some());
        assert_eq!(r.status().code, 200);
        assert_eq!(r.body().len(), 8);
    }

    #[test]
    fn auth_attempts_count_up_then_give_up() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let seen = attempts.clone();
        let ctx = CredentialContext::new("alice", "pw");
        let responder = move |realm: &str, attempt: u32| -> Option<Credentials> {
            seen.lock().unwrap().push((realm.to_string(), attempt));
            ctx.respond(realm, attempt)
        };
        let challenge = || Reply::status(401).with_header("WWW-Authenticate", "Basic realm=\"files\"");
        let (mut s, t) = session(vec![challenge(), challenge(), challenge()]);
        s.set_server_auth_responder(Arc::new(responder));

        let r = s.dispatch("GET", "/secret", None, NO_HEADERS);
        assert_eq!(r.code(), ResultCode::Auth);
        assert_eq!(r.status().code, 401);
        assert!(r.error().is_some());
        assert_eq!(t.sent().len(), 3);
        let recorded: Vec<u32> = attempts.lock().unwrap().iter().map(|(_, a)| *a).collect();
        assert_eq!(recorded, vec![1, 2, 3]);
        assert_eq!(attempts.lock().unwrap()[0].0, "files");
    }

    #[test]
    fn attempt_counter_restarts_per_dispatch() {
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let seen = attempts.clone();
        let responder = move |_: &str, attempt: u32| {
            seen.lock().unwrap().push(attempt);
            Some(Credentials::new("u", "p"))
        };
        let challenge = || Reply::status(401).with_header("WWW-Authenticate", "Basic realm=\"r\"");
        let (mut s, _) = session(vec![challenge(), Reply::status(200), challenge(), Reply::status(200)]);
        s.set_server_auth_responder(Arc::new(responder));
        assert!(s.dispatch("GET", "/a", None, NO_HEADERS).is_ok());
        assert!(s.dispatch("GET", "/b", None, NO_HEADERS).is_ok());
        assert_eq!(*attempts.lock().unwrap(), vec![1, 1]);
    }

    #[test]
    fn transport_timeout_maps_to_timeout_code() {
        let (mut s, _) = session(vec![Reply::Fail(io::ErrorKind::TimedOut)]);
        let r = s.dispatch("GET", "/", None, NO_HEADERS);
        assert_eq!(r.code(), ResultCode::Timeout);
        assert!(r.error().is_some());
        assert_eq!(r.status().code, 0);
    }
}
