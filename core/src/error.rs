/*
 * error.rs
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

//! Result codes and the error value returned by session operations.

use std::fmt;
use std::io;

/// Transport-level result of an operation. Numeric values are part of the C ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    /// Request completed at the transport level (the HTTP status may still be an error).
    Ok = 0,
    /// Generic failure: I/O error, malformed response, resource exhaustion, rejected request.
    Error = 1,
    /// Host name lookup failed.
    Lookup = 2,
    /// Server authentication failed or was abandoned.
    Auth = 3,
    /// Proxy authentication failed or was abandoned.
    ProxyAuth = 4,
    /// Could not connect to the server or proxy.
    Connect = 5,
    /// Connect or read timed out.
    Timeout = 6,
    /// The server rejected the request in a way that makes retrying pointless.
    Failed = 7,
    /// The request should be retried.
    Retry = 8,
    /// The server redirected the request.
    Redirect = 9,
}

impl ResultCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Map a raw code back; unknown values become `Error`.
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => ResultCode::Ok,
            2 => ResultCode::Lookup,
            3 => ResultCode::Auth,
            4 => ResultCode::ProxyAuth,
            5 => ResultCode::Connect,
            6 => ResultCode::Timeout,
            7 => ResultCode::Failed,
            8 => ResultCode::Retry,
            9 => ResultCode::Redirect,
            _ => ResultCode::Error,
        }
    }

    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }

    /// Classify a socket-level error.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => ResultCode::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::AddrNotAvailable => ResultCode::Connect,
            io::ErrorKind::NotFound => ResultCode::Lookup,
            _ => ResultCode::Error,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultCode::Ok => "ok",
            ResultCode::Error => "error",
            ResultCode::Lookup => "lookup failed",
            ResultCode::Auth => "authentication failed",
            ResultCode::ProxyAuth => "proxy authentication failed",
            ResultCode::Connect => "connection failed",
            ResultCode::Timeout => "timed out",
            ResultCode::Failed => "failed",
            ResultCode::Retry => "retry",
            ResultCode::Redirect => "redirect",
        };
        f.write_str(name)
    }
}

/// Failure of a session operation: result code, human-readable message, and the
/// HTTP status when the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavError {
    code: ResultCode,
    message: String,
    status: Option<u16>,
}

impl DavError {
    pub fn new(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
        }
    }

    /// Generic `Error` with a message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ResultCode::Error, message)
    }

    /// The request completed but the server answered with an unexpected status.
    pub fn status(code: u16, reason: Option<&str>) -> Self {
        let message = match reason {
            Some(r) if !r.is_empty() => format!("{} {}", code, r),
            _ => format!("unexpected status {}", code),
        };
        Self {
            code: ResultCode::Error,
            message,
            status: Some(code),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn code(&self) -> ResultCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn http_status(&self) -> Option<u16> {
        self.status
    }
}

impl fmt::Display for DavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (code {}, status {})", self.message, self.code.as_i32(), status),
            None => write!(f, "{} (code {})", self.message, self.code.as_i32()),
        }
    }
}

impl std::error::Error for DavError {}

impl From<io::Error> for DavError {
    fn from(err: io::Error) -> Self {
        DavError::new(ResultCode::from_io(&err), err.to_string())
    }
}
