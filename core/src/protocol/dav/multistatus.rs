/*
 * multistatus.rs
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

//! Multistatus (RFC 4918 §13) response parsing with quick_xml's NsReader.
//!
//! Each `<response>` is handed to the visitor as soon as its end tag is read,
//! so a document that breaks half way still delivers the complete responses before it.

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use super::props::{PropName, PropResultSet, PropStat};
use super::xml::{xml_error, DAV_NS};
use crate::error::DavError;
use crate::protocol::http::Status;

const DAV: &[u8] = DAV_NS.as_bytes();

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    ns: Vec<u8>,
    local: Vec<u8>,
}

impl Element {
    fn is_dav(&self, local: &[u8]) -> bool {
        self.ns == DAV && self.local == local
    }
}

/// Value of one property being read; `depth` is the element stack length at its start tag.
struct Capture {
    name: PropName,
    depth: usize,
    value: String,
}

#[derive(Default)]
struct Parser {
    stack: Vec<Element>,
    response: Option<PropResultSet>,
    propstat: Option<PropStat>,
    capture: Option<Capture>,
    text: String,
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl Parser {
    fn parent_is(&self, local: &[u8]) -> bool {
        self.stack.last().map(|e| e.is_dav(local)).unwrap_or(false)
    }

    fn grandparent_is(&self, local: &[u8]) -> bool {
        self.stack.len() >= 2 && self.stack[self.stack.len() - 2].is_dav(local)
    }

    fn open(&mut self, element: &Element, empty: bool) -> Result<(), DavError> {
        if let Some(capture) = self.capture.as_mut() {
            capture.value.push('<');
            capture.value.push_str(&lossy(&element.local));
            if !element.ns.is_empty() {
                capture.value.push_str(" xmlns=\"");
                capture.value.push_str(&quick_xml::escape::escape(lossy(&element.ns).as_str()));
                capture.value.push('"');
            }
            capture.value.push_str(if empty { "/>" } else { ">" });
            return Ok(());
        }

        if self.stack.is_empty() {
            if !element.is_dav(b"multistatus") {
                return Err(DavError::other(format!(
                    "expected multistatus, found <{}>",
                    lossy(&element.local)
                )));
            }
            return Ok(());
        }

        if self.parent_is(b"prop") && self.grandparent_is(b"propstat") {
            let name = PropName::new(lossy(&element.ns), lossy(&element.local));
            if empty {
                if let Some(propstat) = self.propstat.as_mut() {
                    propstat.props.push((name, String::new()));
                }
            } else {
                self.capture = Some(Capture {
                    name,
                    depth: self.stack.len(),
                    value: String::new(),
                });
            }
            return Ok(());
        }

        if element.is_dav(b"response") && self.parent_is(b"multistatus") {
            self.response = Some(PropResultSet::default());
        } else if element.is_dav(b"propstat") && self.parent_is(b"response") {
            self.propstat = Some(PropStat::default());
        } else if element.is_dav(b"href") || element.is_dav(b"status") {
            self.text.clear();
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(capture) = self.capture.as_mut() {
            capture.value.push_str(text);
            return;
        }
        if let Some(top) = self.stack.last() {
            if top.is_dav(b"href") || top.is_dav(b"status") {
                self.text.push_str(text);
            }
        }
    }

    /// Called after the element has been popped off the stack.
    fn close(&mut self, element: &Element, visitor: &mut dyn FnMut(&PropResultSet)) {
        if let Some(capture) = self.capture.as_mut() {
            if self.stack.len() > capture.depth {
                capture.value.push_str("</");
                capture.value.push_str(&lossy(&element.local));
                capture.value.push('>');
                return;
            }
            if let Some(done) = self.capture.take() {
                if let Some(propstat) = self.propstat.as_mut() {
                    propstat.props.push((done.name, done.value));
                }
            }
            return;
        }

        if element.is_dav(b"href") && self.parent_is(b"response") {
            if let Some(response) = self.response.as_mut() {
                response.href = self.text.trim().to_string();
            }
        } else if element.is_dav(b"status") {
            let status = Status::parse_line(&self.text);
            if self.parent_is(b"propstat") {
                if let Some(propstat) = self.propstat.as_mut() {
                    propstat.status = status;
                }
            } else if self.parent_is(b"response") {
                if let Some(response) = self.response.as_mut() {
                    response.status = status;
                }
            }
        } else if element.is_dav(b"propstat") {
            if let (Some(propstat), Some(response)) = (self.propstat.take(), self.response.as_mut()) {
                response.propstats.push(propstat);
            }
        } else if element.is_dav(b"response") {
            if let Some(response) = self.response.take() {
                visitor(&response);
            }
        }
    }
}

fn resolve(result: ResolveResult<'_>) -> Result<Vec<u8>, DavError> {
    match result {
        ResolveResult::Bound(ns) => Ok(ns.as_ref().to_vec()),
        ResolveResult::Unbound => Ok(Vec::new()),
        ResolveResult::Unknown(prefix) => Err(DavError::other(format!(
            "undeclared namespace prefix {}",
            lossy(&prefix)
        ))),
    }
}

/// Parse a multistatus body, calling `visitor` once per `<response>` in document order.
/// An empty body holds no responses.
pub fn parse_multistatus(body: &[u8], visitor: &mut dyn FnMut(&PropResultSet)) -> Result<(), DavError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(());
    }
    let mut reader = NsReader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut parser = Parser::default();
    let mut buf = Vec::new();
    let mut seen_root = false;

    loop {
        let (ns, event) = reader.read_resolved_event_into(&mut buf).map_err(xml_error)?;
        match event {
            Event::Start(e) => {
                let element = Element {
                    ns: resolve(ns)?,
                    local: e.local_name().as_ref().to_vec(),
                };
                parser.open(&element, false)?;
                parser.stack.push(element);
                seen_root = true;
            }
            Event::Empty(e) => {
                let element = Element {
                    ns: resolve(ns)?,
                    local: e.local_name().as_ref().to_vec(),
                };
                parser.open(&element, true)?;
                seen_root = true;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(xml_error)?;
                parser.text(&text);
            }
            Event::CData(c) => {
                let text = lossy(&c);
                parser.text(&text);
            }
            Event::End(_) => {
                if let Some(element) = parser.stack.pop() {
                    parser.close(&element, visitor);
                }
            }
            Event::Eof => {
                if !parser.stack.is_empty() {
                    return Err(DavError::other("multistatus document ended early"));
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    if !seen_root {
        return Err(DavError::other("response body is not a multistatus document"));
    }
    Ok(())
}

/// Parse a whole multistatus body into result sets.
pub fn parse_multistatus_all(body: &[u8]) -> Result<Vec<PropResultSet>, DavError> {
    let mut out = Vec::new();
    parse_multistatus(body, &mut |set| out.push(set.clone()))?;
    Ok(out)
}
