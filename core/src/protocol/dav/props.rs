/*
 * props.rs
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

//! PROPFIND: property names, per-resource result sets, and the fold into `PropertyRecord`s.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset};
use percent_encoding::percent_decode_str;
use url::Url;

use super::multistatus::parse_multistatus;
use super::xml::{XmlBody, DAV_NS};
use super::Depth;
use crate::error::DavError;
use crate::protocol::http::{Method, Request, Status};
use crate::session::Session;

/// A property name: namespace URI and local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropName {
    pub nspace: Cow<'static, str>,
    pub name: Cow<'static, str>,
}

impl PropName {
    pub fn new(nspace: impl Into<Cow<'static, str>>, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            nspace: nspace.into(),
            name: name.into(),
        }
    }

    pub const fn dav(name: &'static str) -> Self {
        Self {
            nspace: Cow::Borrowed(DAV_NS),
            name: Cow::Borrowed(name),
        }
    }
}

pub const DISPLAY_NAME: PropName = PropName::dav("displayname");
pub const GET_ETAG: PropName = PropName::dav("getetag");
pub const GET_CONTENT_TYPE: PropName = PropName::dav("getcontenttype");
pub const GET_CONTENT_LENGTH: PropName = PropName::dav("getcontentlength");
pub const GET_LAST_MODIFIED: PropName = PropName::dav("getlastmodified");
pub const RESOURCE_TYPE: PropName = PropName::dav("resourcetype");

/// Properties requested for a `PropertyRecord`, in request order.
pub const RECORD_PROPS: [PropName; 6] = [
    DISPLAY_NAME,
    GET_ETAG,
    GET_CONTENT_TYPE,
    GET_CONTENT_LENGTH,
    GET_LAST_MODIFIED,
    RESOURCE_TYPE,
];

/// One `<propstat>`: a status and the properties it covers, with their values.
/// Element content is kept as markup (`<collection xmlns="DAV:"/>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropStat {
    pub status: Option<Status>,
    pub props: Vec<(PropName, String)>,
}

/// Everything one `<response>` said about one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropResultSet {
    pub href: String,
    /// Response-level `<status>`, present when the server reports the resource as a whole.
    pub status: Option<Status>,
    pub propstats: Vec<PropStat>,
}

impl PropResultSet {
    fn find(&self, name: &PropName) -> Option<(&PropStat, &str)> {
        self.propstats.iter().find_map(|ps| {
            ps.props
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| (ps, v.as_str()))
        })
    }

    /// Value of `name`, only if it was returned in a 2xx propstat.
    pub fn value(&self, name: &PropName) -> Option<&str> {
        match self.find(name) {
            Some((ps, value)) if ps.status.as_ref().map(|s| s.is_success()).unwrap_or(false) => Some(value),
            _ => None,
        }
    }

    /// Status of the propstat holding `name`.
    pub fn status(&self, name: &PropName) -> Option<&Status> {
        self.find(name).and_then(|(ps, _)| ps.status.as_ref())
    }
}

/// Flattened listing entry for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    /// Href exactly as the server sent it.
    pub href: String,
    /// Path component of the href, still percent-encoded.
    pub path: String,
    pub display_name: Option<String>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    /// -1 when absent or not a number.
    pub content_length: i64,
    pub last_modified: Option<String>,
    pub is_collection: bool,
    /// Status of the first requested property, else of the response, else 0.
    pub status_code: u16,
}

/// Parse a base-10 integer prefix the way C's strtoll does; None if no digits.
fn parse_length(value: &str) -> Option<i64> {
    let s = value.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits.bytes().take_while(|b| b.is_ascii_digit()).count();
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].bytes().fold(0i64, |acc, b| {
        acc.saturating_mul(10).saturating_add(i64::from(b - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

fn path_of(href: &str) -> String {
    if let Ok(url) = Url::parse(href) {
        if url.has_host() {
            return url.path().to_string();
        }
    }
    let end = href.find(['?', '#']).unwrap_or(href.len());
    href[..end].to_string()
}

impl PropertyRecord {
    pub fn from_result_set(set: &PropResultSet) -> Self {
        let text = |name: &PropName| set.value(name).map(|v| v.to_string());
        let content_length = set
            .value(&GET_CONTENT_LENGTH)
            .and_then(parse_length)
            .unwrap_or(-1);
        let is_collection = set
            .value(&RESOURCE_TYPE)
            .map(|v| v.contains("collection"))
            .unwrap_or(false);
        let status_code = set
            .status(&RECORD_PROPS[0])
            .or(set.status.as_ref())
            .map(|s| s.code)
            .unwrap_or(0);
        Self {
            href: set.href.clone(),
            path: path_of(&set.href),
            display_name: text(&DISPLAY_NAME),
            etag: text(&GET_ETAG),
            content_type: text(&GET_CONTENT_TYPE),
            content_length,
            last_modified: text(&GET_LAST_MODIFIED),
            is_collection,
            status_code,
        }
    }

    /// `getlastmodified` parsed as an RFC 1123 date.
    pub fn last_modified_time(&self) -> Option<DateTime<FixedOffset>> {
        self.last_modified
            .as_deref()
            .and_then(|v| DateTime::parse_from_rfc2822(v.trim()).ok())
    }

    /// Path with percent-escapes decoded (lossy for invalid UTF-8).
    pub fn decoded_path(&self) -> String {
        decode_path(&self.path)
    }
}

/// Decode percent-escapes in an href path (lossy for invalid UTF-8).
pub fn decode_path(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

/// Runs a property query and reports each resource. Implemented by `Session` with PROPFIND.
pub trait PropWalker {
    fn walk(
        &mut self,
        path: &str,
        depth: Depth,
        props: &[PropName],
        visitor: &mut dyn FnMut(&PropResultSet),
    ) -> Result<(), DavError>;
}

/// `<propfind><prop>...</prop></propfind>` for `props`.
pub fn propfind_body(props: &[PropName]) -> Result<Vec<u8>, DavError> {
    let mut body = XmlBody::new("propfind")?;
    body.start("prop")?;
    for prop in props {
        body.empty_ns(&prop.nspace, &prop.name)?;
    }
    body.end("prop")?;
    body.finish("propfind")
}

impl PropWalker for Session {
    fn walk(
        &mut self,
        path: &str,
        depth: Depth,
        props: &[PropName],
        visitor: &mut dyn FnMut(&PropResultSet),
    ) -> Result<(), DavError> {
        let mut request = Request::new(Method::Propfind, path);
        request.header("Depth", depth.as_str());
        request.header("Content-Type", "application/xml");
        request.body(propfind_body(props)?);
        let response = self.execute(request);
        response.check_success()?;
        parse_multistatus(response.body(), visitor)
    }
}

/// Fetch the standard property set for `path` and fold each resource into a record.
/// If the query fails, records already built are dropped and the error is returned.
pub fn collect_properties<W>(walker: &mut W, path: &str, depth: Depth) -> Result<Vec<PropertyRecord>, DavError>
where
    W: PropWalker + ?Sized,
{
    let mut records: Vec<PropertyRecord> = Vec::new();
    let mut exhausted = false;
    walker.walk(path, depth, &RECORD_PROPS, &mut |set| {
        if exhausted {
            return;
        }
        if records.try_reserve(1).is_err() {
            exhausted = true;
            return;
        }
        records.push(PropertyRecord::from_result_set(set));
    })?;
    if exhausted {
        tracing::warn!(path, kept = records.len(), "out of memory while collecting properties");
    }
    tracing::debug!(path, depth = depth.as_str(), count = records.len(), "collected properties");
    Ok(records)
}

impl Session {
    /// PROPFIND `path` for the standard property set.
    pub fn collect_properties(&mut self, path: &str, depth: Depth) -> Result<Vec<PropertyRecord>, DavError> {
        collect_properties(self, path, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Origin, Scheme, SessionConfig};
    use crate::error::ResultCode;
    use crate::session::testing::{Reply, ScriptedTransport};

    fn ok() -> Option<Status> {
        Some(Status::with_reason(200, "OK"))
    }

    fn set(href: &str, props: Vec<(PropName, &str)>) -> PropResultSet {
        PropResultSet {
            href: href.to_string(),
            status: None,
            propstats: vec![PropStat {
                status: ok(),
                props: props.into_iter().map(|(n, v)| (n, v.to_string())).collect(),
            }],
        }
    }

    /// Walker that replays result sets, optionally failing afterwards.
    struct FakeWalker {
        sets: Vec<PropResultSet>,
        fail_after: bool,
        seen_depth: Option<Depth>,
        seen_props: usize,
    }

    impl FakeWalker {
        fn new(sets: Vec<PropResultSet>, fail_after: bool) -> Self {
            Self {
                sets,
                fail_after,
                seen_depth: None,
                seen_props: 0,
            }
        }
    }

    impl PropWalker for FakeWalker {
        fn walk(
            &mut self,
            _path: &str,
            depth: Depth,
            props: &[PropName],
            visitor: &mut dyn FnMut(&PropResultSet),
        ) -> Result<(), DavError> {
            self.seen_depth = Some(depth);
            self.seen_props = props.len();
            for s in &self.sets {
                visitor(s);
            }
            if self.fail_after {
                return Err(DavError::new(ResultCode::Connect, "connection reset"));
            }
            Ok(())
        }
    }

    #[test]
    fn content_length_parsing() {
        let records: Vec<PropertyRecord> = ["12345", "abc", " 42bytes"]
            .iter()
            .map(|v| PropertyRecord::from_result_set(&set("/f", vec![(GET_CONTENT_LENGTH, v)])))
            .collect();
        assert_eq!(records[0].content_length, 12345);
        assert_eq!(records[1].content_length, -1);
        assert_eq!(records[2].content_length, 42);
        let missing = PropertyRecord::from_result_set(&set("/f", vec![]));
        assert_eq!(missing.content_length, -1);
    }

    #[test]
    fn fold_reads_each_field() {
        let s = set(
            "http://dav.test/docs/My%20File.txt?x=1",
            vec![
                (DISPLAY_NAME, "My File"),
                (GET_ETAG, "\"e1\""),
                (GET_CONTENT_TYPE, "text/plain"),
                (GET_LAST_MODIFIED, "Tue, 15 Nov 1994 12:45:26 GMT"),
                (RESOURCE_TYPE, ""),
            ],
        );
        let r = PropertyRecord::from_result_set(&s);
        assert_eq!(r.path, "/docs/My%20File.txt");
        assert_eq!(r.decoded_path(), "/docs/My File.txt");
        assert_eq!(r.display_name.as_deref(), Some("My File"));
        assert_eq!(r.etag.as_deref(), Some("\"e1\""));
        assert!(!r.is_collection);
        assert_eq!(r.status_code, 200);
        assert_eq!(r.last_modified_time().map(|t| t.timestamp()), Some(784903526));
    }

    #[test]
    fn status_falls_back_to_response_then_zero() {
        let mut s = set("/a/", vec![(RESOURCE_TYPE, "<collection xmlns=\"DAV:\"/>")]);
        assert!(PropertyRecord::from_result_set(&s).is_collection);
        assert_eq!(PropertyRecord::from_result_set(&s).status_code, 0);
        s.status = Some(Status::new(404));
        assert_eq!(PropertyRecord::from_result_set(&s).status_code, 404);
    }

    #[test]
    fn value_is_hidden_for_failed_propstat() {
        let s = PropResultSet {
            href: "/x".to_string(),
            status: None,
            propstats: vec![PropStat {
                status: Some(Status::new(403)),
                props: vec![(DISPLAY_NAME, "secret".to_string())],
            }],
        };
        assert_eq!(s.value(&DISPLAY_NAME), None);
        assert_eq!(s.status(&DISPLAY_NAME).map(|st| st.code), Some(403));
        let r = PropertyRecord::from_result_set(&s);
        assert_eq!(r.display_name, None);
        assert_eq!(r.status_code, 403);
    }

    #[test]
    fn walker_failure_discards_partial_records() {
        let mut walker = FakeWalker::new(vec![set("/a", vec![]), set("/b", vec![])], true);
        let err = collect_properties(&mut walker, "/", Depth::One).unwrap_err();
        assert_eq!(err.code(), ResultCode::Connect);
    }

    #[test]
    fn empty_listing_is_ok() {
        let mut walker = FakeWalker::new(vec![], false);
        let records = collect_properties(&mut walker, "/", Depth::Zero).unwrap();
        assert!(records.is_empty());
        assert_eq!(walker.seen_depth, Some(Depth::Zero));
        assert_eq!(walker.seen_props, 6);
    }

    #[test]
    fn records_keep_server_order() {
        let mut walker = FakeWalker::new(vec![set("/z", vec![]), set("/a", vec![])], false);
        let records = collect_properties(&mut walker, "/", Depth::Infinity).unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/z", "/a"]);
    }

    fn session(replies: Vec<Reply>) -> (Session, ScriptedTransport) {
        let transport = ScriptedTransport::new(replies);
        let config = SessionConfig::new(Origin::new(Scheme::Http, "dav.test", 80));
        (Session::with_transport(config, Box::new(transport.clone())), transport)
    }

    #[test]
    fn session_propfind_sends_depth_and_body() {
        let body = br#"<D:multistatus xmlns:D="DAV:"><D:response><D:href>/d/</D:href><D:propstat><D:prop><D:resourcetype><D:collection/></D:resourcetype></D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response></D:multistatus>"#;
        let (mut s, t) = session(vec![Reply::status(207).with_body(body)]);
        let records = s.collect_properties("/d/", Depth::One).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_collection);
        let sent = t.sent();
        assert_eq!(sent[0].method, Method::Propfind);
        assert_eq!(sent[0].header_value("Depth"), Some("1"));
        assert_eq!(sent[0].header_value("Content-Type"), Some("application/xml"));
        let xml = String::from_utf8(sent[0].body.clone().unwrap()).unwrap();
        assert!(xml.contains("<getcontentlength/>"));
    }

    #[test]
    fn non_success_propfind_fails() {
        let (mut s, _) = session(vec![Reply::status(403)]);
        let err = s.collect_properties("/d/", Depth::Zero).unwrap_err();
        assert_eq!(err.http_status(), Some(403));
    }
}
