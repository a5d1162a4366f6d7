/*
 * response.rs
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

//! HTTP response status line.

use std::fmt;

/// Status line of a response: code, class (first digit) and optional reason phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub class: u8,
    pub reason: Option<String>,
}

impl Status {
    pub fn new(code: u16) -> Self {
        Self {
            code,
            class: (code / 100) as u8,
            reason: None,
        }
    }

    pub fn with_reason(code: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            code,
            class: (code / 100) as u8,
            reason: if reason.is_empty() { None } else { Some(reason) },
        }
    }

    /// Parse a status line such as `HTTP/1.1 207 Multi-Status` (as found in multistatus bodies).
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut parts = line.splitn(3, ' ');
        let version = parts.next()?;
        if !version.starts_with("HTTP/") {
            return None;
        }
        let code = parts.next()?.trim().parse::<u16>().ok()?;
        if !(100..=999).contains(&code) {
            return None;
        }
        Some(match parts.next() {
            Some(reason) => Status::with_reason(code, reason.trim()),
            None => Status::new(code),
        })
    }

    pub fn is_success(&self) -> bool {
        self.class == 2
    }

    pub fn is_informational(&self) -> bool {
        self.class == 1
    }

    /// 1xx, 204 and 304 responses have no body.
    pub fn forbids_body(&self) -> bool {
        self.is_informational() || self.code == 204 || self.code == 304
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(r) => write!(f, "{} {}", self.code, r),
            None => write!(f, "{}", self.code),
        }
    }
}
