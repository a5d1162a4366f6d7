/*
 * methods.rs
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

//! Simple WebDAV methods: GET, PUT, DELETE, MKCOL, COPY, MOVE, OPTIONS.
//!
//! Any 2xx except 207 is success. A 207 reports per-resource failures, so it is an error here.

use super::Depth;
use crate::dispatch::Response;
use crate::error::{DavError, ResultCode};
use crate::protocol::http::{Method, Request};
use crate::session::Session;

/// What OPTIONS reported: `DAV:` compliance classes and allowed methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub dav_classes: Vec<String>,
    pub allow: Vec<String>,
}

fn split_list<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .flat_map(|v| v.split(','))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

impl Capabilities {
    pub fn from_headers(headers: &[(String, String)]) -> Self {
        let named = |name: &'static str| {
            headers
                .iter()
                .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        };
        Self {
            dav_classes: split_list(named("DAV")),
            allow: split_list(named("Allow")),
        }
    }

    /// True if the server advertised any DAV compliance class.
    pub fn is_dav(&self) -> bool {
        !self.dav_classes.is_empty()
    }

    pub fn supports(&self, class: &str) -> bool {
        self.dav_classes.iter().any(|c| c.eq_ignore_ascii_case(class))
    }

    pub fn allows(&self, method: &str) -> bool {
        self.allow.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

impl Session {
    pub(crate) fn simple_request(&mut self, request: Request) -> Result<Response, DavError> {
        let response = self.execute(request);
        if response.is_ok() && response.status().code == 207 {
            return Err(DavError::new(ResultCode::Error, "request failed on some resources (207 Multi-Status)")
                .with_status(207));
        }
        response.check_success()?;
        Ok(response)
    }

    /// Absolute URL for a Destination header; absolute inputs are used as they are.
    fn destination(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            self.origin().absolute(target)
        }
    }

    pub fn get(&mut self, path: &str) -> Result<Vec<u8>, DavError> {
        let response = self.simple_request(Request::new(Method::Get, path))?;
        Ok(response.into_body())
    }

    pub fn put(&mut self, path: &str, body: &[u8], content_type: Option<&str>) -> Result<(), DavError> {
        let mut request = Request::new(Method::Put, path);
        if let Some(ct) = content_type {
            request.header("Content-Type", ct);
        }
        request.body_slice(body);
        self.simple_request(request).map(|_| ())
    }

    pub fn delete(&mut self, path: &str) -> Result<(), DavError> {
        self.simple_request(Request::new(Method::Delete, path)).map(|_| ())
    }

    pub fn mkcol(&mut self, path: &str) -> Result<(), DavError> {
        self.simple_request(Request::new(Method::Mkcol, path)).map(|_| ())
    }

    /// COPY `src` to `dst`. `depth` is 0 or infinity for collections.
    pub fn copy(&mut self, src: &str, dst: &str, overwrite: bool, depth: Depth) -> Result<(), DavError> {
        let mut request = Request::new(Method::Copy, src);
        request.header("Destination", self.destination(dst));
        request.header("Overwrite", if overwrite { "T" } else { "F" });
        request.header("Depth", depth.as_str());
        self.simple_request(request).map(|_| ())
    }

    pub fn move_to(&mut self, src: &str, dst: &str, overwrite: bool) -> Result<(), DavError> {
        let mut request = Request::new(Method::Move, src);
        request.header("Destination", self.destination(dst));
        request.header("Overwrite", if overwrite { "T" } else { "F" });
        self.simple_request(request).map(|_| ())
    }

    pub fn options(&mut self, path: &str) -> Result<Capabilities, DavError> {
        let response = self.simple_request(Request::new(Method::Options, path))?;
        Ok(Capabilities::from_headers(response.headers()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Origin, Scheme, SessionConfig};
    use crate::session::testing::{Reply, ScriptedTransport};

    fn session(replies: Vec<Reply>) -> (Session, ScriptedTransport) {
        let transport = ScriptedTransport::new(replies);
        let config = SessionConfig::new(Origin::new(Scheme::Https, "dav.test", 8443));
        (Session::with_transport(config, Box::new(transport.clone())), transport)
    }

    #[test]
    fn get_returns_body_and_rejects_404() {
        let (mut s, _) = session(vec![Reply::status(200).with_body(b"hello"), Reply::status(404)]);
        assert_eq!(s.get("/a.txt").unwrap(), b"hello");
        let err = s.get("/missing").unwrap_err();
        assert_eq!(err.http_status(), Some(404));
        assert_eq!(err.code(), ResultCode::Error);
    }

    #[test]
    fn put_sends_body_and_type() {
        let (mut s, t) = session(vec![Reply::status(201)]);
        s.put("/n.txt", b"data", Some("text/plain")).unwrap();
        let sent = t.sent();
        assert_eq!(sent[0].method, Method::Put);
        assert_eq!(sent[0].body.as_deref(), Some(&b"data"[..]));
        assert_eq!(sent[0].header_value("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn copy_and_move_build_absolute_destination() {
        let (mut s, t) = session(vec![Reply::status(201), Reply::status(204)]);
        s.copy("/a", "/b", false, Depth::Infinity).unwrap();
        s.move_to("/b", "https://other.test/c", true).unwrap();
        let sent = t.sent();
        assert_eq!(sent[0].header_value("Destination"), Some("https://dav.test:8443/b"));
        assert_eq!(sent[0].header_value("Overwrite"), Some("F"));
        assert_eq!(sent[0].header_value("Depth"), Some("infinity"));
        assert_eq!(sent[1].header_value("Destination"), Some("https://other.test/c"));
        assert_eq!(sent[1].header_value("Overwrite"), Some("T"));
    }

    #[test]
    fn delete_with_207_is_an_error() {
        let (mut s, _) = session(vec![Reply::status(207)]);
        assert_eq!(s.delete("/dir/").unwrap_err().http_status(), Some(207));
    }

    #[test]
    fn options_parses_capabilities() {
        let (mut s, _) = session(vec![Reply::status(200)
            .with_header("DAV", "1, 2")
            .with_header("DAV", "access-control")
            .with_header("Allow", "OPTIONS, GET, PROPFIND, ACL")]);
        let caps = s.options("/").unwrap();
        assert!(caps.is_dav());
        assert!(caps.supports("2"));
        assert!(caps.supports("access-control"));
        assert!(caps.allows("acl"));
        assert!(!caps.allows("LOCK"));
    }

    #[test]
    fn mkcol_conflict_fails() {
        let (mut s, _) = session(vec![Reply::status(409)]);
        assert_eq!(s.mkcol("/a/b/").unwrap_err().http_status(), Some(409));
    }
}
