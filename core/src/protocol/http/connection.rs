/*
 * connection.rs
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

//! HTTP connection: one TCP or TLS stream, drives the H1 parser, invokes ResponseHandler.

use bytes::BytesMut;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream as TokioTlsStream;

use crate::protocol::http::h1::{H1ResponseHandler, ParseState, ResponseParser};
use crate::protocol::http::request::{Method, Request};
use crate::protocol::http::response::Status;
use crate::protocol::http::ResponseHandler;

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TokioTlsStream<TcpStream>>),
}

impl HttpStream {
    pub fn is_secure(&self) -> bool {
        matches!(self, HttpStream::Tls(_))
    }
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Bridges H1 parser callbacks to the connection state and the caller's ResponseHandler.
struct H1Driver<'a> {
    status: &'a mut Option<(u16, Option<String>)>,
    headers: &'a mut Vec<(String, String)>,
    handler: &'a mut dyn ResponseHandler,
}

impl H1ResponseHandler for H1Driver<'_> {
    fn status(&mut self, code: u16, reason: Option<&str>) {
        *self.status = Some((code, reason.map(|s| s.to_string())));
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn start_body(&mut self) {
        self.handler.start_body();
    }

    fn body_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.handler.body_chunk(data)
    }

    fn end_body(&mut self) {
        self.handler.end_body();
    }

    fn trailer(&mut self, name: &str, value: &str) {
        self.handler.header(name, value);
    }

    fn complete(&mut self) {
        self.handler.complete();
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// HTTP/1.1 connection: holds the stream and drives the read loop. Call send() to issue a request.
pub struct HttpConnection {
    stream: HttpStream,
    read_timeout: Duration,
    read_buf: BytesMut,
    parser: ResponseParser,
    status: Option<(u16, Option<String>)>,
    headers: Vec<(String, String)>,
    reusable: bool,
    received_any: bool,
    requests_sent: u32,
}

impl HttpConnection {
    pub fn new(stream: HttpStream, read_timeout: Duration) -> Self {
        Self {
            stream,
            read_timeout,
            read_buf: BytesMut::with_capacity(8192),
            parser: ResponseParser::new(),
            status: None,
            headers: Vec::new(),
            reusable: true,
            received_any: false,
            requests_sent: 0,
        }
    }

    /// False once the server asked to close, the body was delimited by close, or an error occurred.
    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    /// Number of requests written on this connection, including the current one.
    pub fn requests_sent(&self) -> u32 {
        self.requests_sent
    }

    /// True if any byte of the current response has arrived.
    pub fn received_any(&self) -> bool {
        self.received_any
    }

    pub fn is_secure(&self) -> bool {
        self.stream.is_secure()
    }

    /// Give the underlying stream back (used after a successful CONNECT).
    pub fn into_stream(self) -> HttpStream {
        self.stream
    }

    /// Send the request and run the read loop until the response is complete.
    /// `host` is the Host header value and `target` the request-target as written on the wire.
    pub async fn send(
        &mut self,
        request: &Request,
        host: &str,
        target: &str,
        handler: &mut dyn ResponseHandler,
    ) -> io::Result<()> {
        let result = self.send_inner(request, host, target, handler).await;
        if result.is_err() {
            self.reusable = false;
        }
        result
    }

    async fn send_inner(
        &mut self,
        request: &Request,
        host: &str,
        target: &str,
        handler: &mut dyn ResponseHandler,
    ) -> io::Result<()> {
        self.status = None;
        self.headers.clear();
        self.parser.reset();
        self.read_buf.clear();
        self.received_any = false;
        self.requests_sent += 1;

        self.write_request(request, host, target).await?;

        let mut tmp = [0u8; 8192];
        loop {
            if !self.read_buf.is_empty() {
                let mut driver = H1Driver {
                    status: &mut self.status,
                    headers: &mut self.headers,
                    handler: &mut *handler,
                };
                self.parser.receive(&mut self.read_buf, &mut driver)?;
            }

            match self.parser.state() {
                ParseState::HeadersComplete => {
                    self.on_headers_complete(request, handler);
                    continue;
                }
                ParseState::Idle => break,
                _ => {}
            }

            let n = match timeout(self.read_timeout, self.stream.read(&mut tmp)).await {
                Ok(r) => r?,
                Err(_) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
                }
            };
            if n == 0 {
                let mut driver = H1Driver {
                    status: &mut self.status,
                    headers: &mut self.headers,
                    handler: &mut *handler,
                };
                if self.parser.finish_at_eof(&mut driver) {
                    self.reusable = false;
                    break;
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before the response was complete",
                ));
            }
            self.received_any = true;
            self.read_buf.extend_from_slice(&tmp[..n]);
        }
        Ok(())
    }

    /// Handle the end of a header block: report a final status or skip an interim one.
    fn on_headers_complete(&mut self, request: &Request, handler: &mut dyn ResponseHandler) {
        let (code, reason) = self.status.take().unwrap_or((0, None));
        let status = match reason {
            Some(r) => Status::with_reason(code, r),
            None => Status::new(code),
        };
        if status.is_informational() {
            // 100 Continue and friends: discard and wait for the final status.
            self.headers.clear();
            self.parser.reset();
            return;
        }

        let content_length =
            find_header(&self.headers, "content-length").and_then(|v| v.trim().parse::<u64>().ok());
        let chunked = find_header(&self.headers, "transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);
        if find_header(&self.headers, "connection")
            .map(|v| v.to_ascii_lowercase().contains("close"))
            .unwrap_or(false)
        {
            self.reusable = false;
        }
        let no_body = request.expects_no_body()
            || status.forbids_body()
            || (request.method == Method::Connect && status.is_success());

        handler.status(status);
        for (name, value) in &self.headers {
            handler.header(name, value);
        }
        let has_body = !no_body && (chunked || content_length.map(|cl| cl > 0).unwrap_or(true));
        if has_body {
            handler.start_body();
        }
        self.parser.set_body_mode(content_length, chunked, no_body);
        if self.parser.reads_until_close() {
            self.reusable = false;
        }
        if self.parser.state() == ParseState::Idle {
            handler.complete();
        }
    }

    async fn write_request(&mut self, request: &Request, host: &str, target: &str) -> io::Result<()> {
        let mut head = format!("{} {} HTTP/1.1\r\nHost: {}\r\n", request.method.as_str(), target, host);
        for (k, v) in &request.headers {
            head.push_str(k);
            head.push_str(": ");
            head.push_str(v);
            head.push_str("\r\n");
        }
        if let Some(body) = &request.body {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        let limit = self.read_timeout;
        let write = async {
            self.stream.write_all(head.as_bytes()).await?;
            if let Some(body) = &request.body {
                self.stream.write_all(body).await?;
            }
            self.stream.flush().await
        };
        match timeout(limit, write).await {
            Ok(r) => r,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
        }
    }

    /// Best-effort close of the stream.
    pub async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}
