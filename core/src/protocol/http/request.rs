/*
 * request.rs
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

//! HTTP request: method, target, ordered headers, optional fixed-length body.
//!
//! Built by the dispatcher; sending is done by a `Transport`.

use std::fmt;

/// HTTP request method. Any valid token is accepted through `Extension`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
    Connect,
    Propfind,
    Proppatch,
    Mkcol,
    Copy,
    Move,
    Lock,
    Unlock,
    Acl,
    Report,
    Extension(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Connect => "CONNECT",
            Method::Propfind => "PROPFIND",
            Method::Proppatch => "PROPPATCH",
            Method::Mkcol => "MKCOL",
            Method::Copy => "COPY",
            Method::Move => "MOVE",
            Method::Lock => "LOCK",
            Method::Unlock => "UNLOCK",
            Method::Acl => "ACL",
            Method::Report => "REPORT",
            Method::Extension(s) => s,
        }
    }

    /// Parse a method token. Returns None if `token` is not a valid HTTP token (RFC 9110 tchar).
    /// Methods are case-sensitive, so `get` becomes an extension method.
    pub fn from_token(token: &str) -> Option<Method> {
        if !is_token(token) {
            return None;
        }
        let method = match token {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            "CONNECT" => Method::Connect,
            "PROPFIND" => Method::Propfind,
            "PROPPATCH" => Method::Proppatch,
            "MKCOL" => Method::Mkcol,
            "COPY" => Method::Copy,
            "MOVE" => Method::Move,
            "LOCK" => Method::Lock,
            "UNLOCK" => Method::Unlock,
            "ACL" => Method::Acl,
            "REPORT" => Method::Report,
            other => Method::Extension(other.to_string()),
        };
        Some(method)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True if `s` is a non-empty RFC 9110 token.
pub fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
                )
        })
}

/// Headers the transport owns; caller-supplied copies are dropped.
pub fn is_framing_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("host")
        || name.eq_ignore_ascii_case("content-length")
        || name.eq_ignore_ascii_case("transfer-encoding")
}

/// A request ready for a transport: method, origin-relative target, headers in send order, body.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub target: String,
    pub headers: Vec<(String, String)>,
    /// Sent with Content-Length, never chunked.
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a header. Pairs with an empty name or value, CR/LF in either, or a
    /// framing header name are skipped. Returns whether the header was added.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        let value = value.into();
        if name.is_empty() || value.is_empty() || !is_token(&name) || value.contains(['\r', '\n']) {
            tracing::debug!(header = %name, "skipping malformed request header");
            return false;
        }
        if is_framing_header(&name) {
            tracing::debug!(header = %name, "skipping caller-supplied framing header");
            return false;
        }
        self.headers.push((name, value));
        true
    }

    /// Replace every header named `name` (case-insensitive) with a single value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.remove_header(name);
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&mut self, data: Vec<u8>) -> &mut Self {
        self.body = Some(data);
        self
    }

    /// Set body from a slice (copied).
    pub fn body_slice(&mut self, data: &[u8]) -> &mut Self {
        self.body = Some(data.to_vec());
        self
    }

    /// True if a response to this request never carries a body.
    pub fn expects_no_body(&self) -> bool {
        self.method == Method::Head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webdav_and_extension_methods_parse() {
        assert_eq!(Method::from_token("PROPFIND"), Some(Method::Propfind));
        assert_eq!(
            Method::from_token("VERSION-CONTROL"),
            Some(Method::Extension("VERSION-CONTROL".to_string()))
        );
        assert_eq!(Method::from_token("BAD METHOD"), None);
        assert_eq!(Method::from_token(""), None);
    }

    #[test]
    fn malformed_and_framing_headers_are_skipped() {
        let mut req = Request::new(Method::Get, "/");
        assert!(req.header("Accept", "*/*"));
        assert!(!req.header("", "x"));
        assert!(!req.header("X-Empty", ""));
        assert!(!req.header("X-Split", "a\r\nInjected: yes"));
        assert!(!req.header("Content-Length", "12"));
        assert!(req.header("X-Dup", "1"));
        assert!(req.header("X-Dup", "2"));
        assert_eq!(
            req.headers,
            vec![
                ("Accept".to_string(), "*/*".to_string()),
                ("X-Dup".to_string(), "1".to_string()),
                ("X-Dup".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut req = Request::new(Method::Get, "/");
        req.header("authorization", "old");
        req.set_header("Authorization", "new");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header_value("AUTHORIZATION"), Some("new"));
    }
}
