/*
 * handler.rs
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

//! HTTP response handler trait (push callbacks).
//!
//! Events: status → header (×n) → start_body → body_chunk (×n) → end_body → complete / failed.

use std::io;

use crate::protocol::http::response::Status;

/// Handler for HTTP response events (push model). A transport drives this as data arrives.
///
/// Flow for a response with body:
/// 1. `status(status)` — final (non-1xx) status line received
/// 2. `header(name, value)` — for each response header, in arrival order
/// 3. `start_body()` — body begins
/// 4. `body_chunk(data)` — for each chunk of body data
/// 5. `end_body()` — body complete
/// 6. `header(name, value)` — for each trailer (if any)
/// 7. `complete()` — response fully complete
///
/// On connection/protocol failure only `failed(error)` is called.
pub trait ResponseHandler {
    fn status(&mut self, status: Status);

    /// Called for each response or trailer header. Name may repeat for multi-value headers.
    fn header(&mut self, name: &str, value: &str);

    fn start_body(&mut self);

    /// Data is only valid for the duration of the call. Returning an error stops the read.
    fn body_chunk(&mut self, data: &[u8]) -> io::Result<()>;

    fn end_body(&mut self);

    fn complete(&mut self);

    fn failed(&mut self, error: &io::Error);
}
