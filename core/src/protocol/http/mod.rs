/*
 * mod.rs
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

//! HTTP client: HTTP/1.1 over TCP or TLS with push-parsed responses.
//!
//! - Callback-based response API: `ResponseHandler` with `status`, `header`, `start_body`,
//!   `body_chunk`, `end_body`, `complete`, `failed`.
//! - Buffers: `bytes` crate (BytesMut for the parse buffer).
//! - HTTP/1.1 only: state-machine response parser, Content-Length request bodies.
//! - TLS via tokio-rustls with ALPN `http/1.1`; HTTPS through a proxy uses CONNECT.

mod handler;
mod request;
mod response;

pub mod h1;

pub use handler::ResponseHandler;
pub use h1::H1ResponseHandler;
pub use request::{is_framing_header, is_token, Method, Request};
pub use response::Status;

pub mod client;
pub mod connection;

pub use client::{CapturedResponse, HttpClient, Opened, Timeouts};
pub use connection::{HttpConnection, HttpStream};
