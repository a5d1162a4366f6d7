/*
 * lock.rs
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

//! LOCK / UNLOCK (RFC 4918 §9.10, §9.11): exclusive write locks.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::NsReader;

use super::xml::{xml_error, XmlBody, DAV_NS};
use super::Depth;
use crate::error::DavError;
use crate::protocol::http::{Method, Request};
use crate::session::Session;

/// Parameters of a LOCK request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    /// `Zero` locks the resource only; `Infinity` a whole collection. `One` is sent as infinity.
    pub depth: Depth,
    pub owner: Option<String>,
    /// None asks for an infinite lock.
    pub timeout: Option<Duration>,
}

impl Default for LockRequest {
    fn default() -> Self {
        Self {
            depth: Depth::Zero,
            owner: None,
            timeout: None,
        }
    }
}

/// A held lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    /// Token URI, without angle brackets (e.g. `opaquelocktoken:...`).
    pub token: String,
    /// Path the lock was taken on.
    pub path: String,
    /// Granted timeout; None for infinite or unreported.
    pub timeout: Option<Duration>,
}

/// Parse `Second-N` / `Infinite`; the first usable entry of a list wins.
fn parse_timeout(value: &str) -> Option<Duration> {
    value.split(',').map(|v| v.trim()).find_map(|v| {
        let lower = v.to_ascii_lowercase();
        lower
            .strip_prefix("second-")
            .and_then(|n| n.parse::<u64>().ok())
            .map(Duration::from_secs)
    })
}

fn timeout_header(timeout: Option<Duration>) -> String {
    match timeout {
        Some(t) => format!("Second-{}", t.as_secs()),
        None => "Infinite".to_string(),
    }
}

fn lockinfo_body(owner: Option<&str>) -> Result<Vec<u8>, DavError> {
    let mut body = XmlBody::new("lockinfo")?;
    body.start("lockscope")?;
    body.empty("exclusive")?;
    body.end("lockscope")?;
    body.start("locktype")?;
    body.empty("write")?;
    body.end("locktype")?;
    if let Some(owner) = owner {
        body.text_element("owner", owner)?;
    }
    body.finish("lockinfo")
}

/// Token and timeout from a `lockdiscovery` body (first activelock).
fn parse_lockdiscovery(body: &[u8]) -> Result<(Option<String>, Option<String>), DavError> {
    let mut reader = NsReader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut token = None;
    let mut timeout = None;
    loop {
        let (ns, event) = reader.read_resolved_event_into(&mut buf).map_err(xml_error)?;
        let in_dav = matches!(ns, quick_xml::name::ResolveResult::Bound(n) if n.as_ref() == DAV_NS.as_bytes());
        match event {
            Event::Start(e) => {
                let local = e.local_name().as_ref().to_vec();
                stack.push(if in_dav { local } else { Vec::new() });
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(xml_error)?;
                let top = stack.last().map(|v| v.as_slice());
                let parent = stack.len().checked_sub(2).map(|i| stack[i].as_slice());
                if top == Some(&b"href"[..]) && parent == Some(&b"locktoken"[..]) && token.is_none() {
                    token = Some(text.trim().to_string());
                } else if top == Some(&b"timeout"[..]) && timeout.is_none() {
                    timeout = Some(text.trim().to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok((token, timeout))
}

impl Session {
    /// Take an exclusive write lock on `path`.
    pub fn lock(&mut self, path: &str, params: &LockRequest) -> Result<LockToken, DavError> {
        let depth = match params.depth {
            Depth::Zero => Depth::Zero,
            _ => Depth::Infinity,
        };
        let mut request = Request::new(Method::Lock, path);
        request.header("Depth", depth.as_str());
        request.header("Timeout", timeout_header(params.timeout));
        request.header("Content-Type", "application/xml");
        request.body(lockinfo_body(params.owner.as_deref())?);
        let response = self.simple_request(request)?;

        let header_token = response
            .header("Lock-Token")
            .map(|v| v.trim().trim_start_matches('<').trim_end_matches('>').to_string())
            .filter(|v| !v.is_empty());
        let (body_token, body_timeout) = if response.body().is_empty() {
            (None, None)
        } else {
            parse_lockdiscovery(response.body())?
        };
        let token = header_token
            .or(body_token)
            .ok_or_else(|| DavError::other("LOCK response carried no lock token"))?;
        let timeout = response
            .header("Timeout")
            .map(|v| v.to_string())
            .or(body_timeout)
            .and_then(|v| parse_timeout(&v));
        tracing::debug!(path, ?timeout, "lock acquired");
        Ok(LockToken {
            token,
            path: path.to_string(),
            timeout,
        })
    }

    pub fn unlock(&mut self, lock: &LockToken) -> Result<(), DavError> {
        let mut request = Request::new(Method::Unlock, lock.path.as_str());
        request.header("Lock-Token", format!("<{}>", lock.token));
        self.simple_request(request)?;
        tracing::debug!(path = %lock.path, "lock released");
        Ok(())
    }
}
