/*
 * client.rs
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

//! HTTP client: open a connection to the origin, directly or through a proxy.
//!
//! HTTPS through a proxy tunnels with CONNECT. When the proxy refuses the
//! tunnel its answer is kept as a `CapturedResponse` so the caller can hand it
//! on (a 407 then drives proxy authentication like any other response).

use std::io;
use std::time::Duration;

use tokio_rustls::TlsConnector;

use crate::config::{Origin, ProxyConfig};
use crate::net::{connect_tcp, tls_handshake};
use crate::protocol::http::connection::{HttpConnection, HttpStream};
use crate::protocol::http::request::{Method, Request};
use crate::protocol::http::response::Status;
use crate::protocol::http::ResponseHandler;

/// Timeouts applied while opening and using a connection.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

/// Outcome of opening a connection.
pub enum Opened {
    Connected(HttpConnection),
    /// The proxy answered CONNECT with a non-2xx status.
    TunnelRefused(CapturedResponse),
}

/// Response recorded in full, for replay to another handler.
#[derive(Debug, Default)]
pub struct CapturedResponse {
    pub status: Option<Status>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub completed: bool,
}

impl CapturedResponse {
    /// Replay the recorded events, in order, to `handler`.
    pub fn replay(&self, handler: &mut dyn ResponseHandler) -> io::Result<()> {
        if let Some(status) = &self.status {
            handler.status(status.clone());
        }
        for (name, value) in &self.headers {
            handler.header(name, value);
        }
        if !self.body.is_empty() {
            handler.start_body();
            handler.body_chunk(&self.body)?;
            handler.end_body();
        }
        handler.complete();
        Ok(())
    }
}

impl ResponseHandler for CapturedResponse {
    fn status(&mut self, status: Status) {
        self.status = Some(status);
    }
    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
    fn start_body(&mut self) {}
    fn body_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(data);
        Ok(())
    }
    fn end_body(&mut self) {}
    fn complete(&mut self) {
        self.completed = true;
    }
    fn failed(&mut self, _error: &io::Error) {}
}

/// HTTP client. Opens connections; requests are then sent on the returned `HttpConnection`.
pub struct HttpClient;

impl HttpClient {
    /// Connect straight to the origin, performing the TLS handshake for https.
    pub async fn connect(
        origin: &Origin,
        connector: &TlsConnector,
        timeouts: Timeouts,
    ) -> io::Result<HttpConnection> {
        let tcp = connect_tcp(&origin.host, origin.port, timeouts.connect).await?;
        let stream = if origin.scheme.is_secure() {
            let tls = tls_handshake(tcp, &origin.host, connector, timeouts.connect).await?;
            HttpStream::Tls(Box::new(tls))
        } else {
            HttpStream::Plain(tcp)
        };
        tracing::debug!(origin = %origin, "connection established");
        Ok(HttpConnection::new(stream, timeouts.read))
    }

    /// Connect through `proxy`. Plain http origins use the proxy connection as is (requests then
    /// carry absolute-form targets); https origins first tunnel with CONNECT.
    /// `proxy_authorization` is sent on the CONNECT request when present.
    pub async fn connect_via_proxy(
        origin: &Origin,
        proxy: &ProxyConfig,
        proxy_authorization: Option<&str>,
        connector: &TlsConnector,
        timeouts: Timeouts,
    ) -> io::Result<Opened> {
        let tcp = connect_tcp(&proxy.host, proxy.port, timeouts.connect).await?;
        let mut conn = HttpConnection::new(HttpStream::Plain(tcp), timeouts.read);
        if !origin.scheme.is_secure() {
            tracing::debug!(proxy = %proxy.authority(), "proxy connection established");
            return Ok(Opened::Connected(conn));
        }

        let authority = origin.authority();
        let mut connect = Request::new(Method::Connect, authority.clone());
        if let Some(value) = proxy_authorization {
            connect.header("Proxy-Authorization", value);
        }
        let mut captured = CapturedResponse::default();
        conn.send(&connect, &authority, &authority, &mut captured).await?;
        let tunnelled = captured.status.as_ref().map(|s| s.is_success()).unwrap_or(false);
        if !tunnelled {
            tracing::debug!(
                proxy = %proxy.authority(),
                status = captured.status.as_ref().map(|s| s.code).unwrap_or(0),
                "proxy refused CONNECT"
            );
            return Ok(Opened::TunnelRefused(captured));
        }

        let tcp = match conn.into_stream() {
            HttpStream::Plain(tcp) => tcp,
            HttpStream::Tls(_) => {
                return Err(io::Error::new(io::ErrorKind::Other, "unexpected TLS proxy stream"));
            }
        };
        let tls = tls_handshake(tcp, &origin.host, connector, timeouts.connect).await?;
        tracing::debug!(origin = %origin, proxy = %proxy.authority(), "tunnel established");
        Ok(Opened::Connected(HttpConnection::new(
            HttpStream::Tls(Box::new(tls)),
            timeouts.read,
        )))
    }
}
