/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked or until close).

use bytes::Buf;
use bytes::BytesMut;
use std::io;

/// Callback for HTTP/1.1 response events. The connection implements this and forwards to ResponseHandler.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn start_body(&mut self);
    fn body_chunk(&mut self, data: &[u8]) -> io::Result<()>;
    fn end_body(&mut self);
    fn trailer(&mut self, name: &str, value: &str);
    fn complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Idle,
    StatusLine,
    Headers,
    /// Headers done; the connection must call `set_body_mode` before feeding more.
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    ChunkTrailer,
}

/// How the end of the body is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    /// Content-Length: this many bytes still to come.
    Fixed(u64),
    Chunked,
    UntilClose,
}

/// Push parser for one HTTP/1.1 response at a time. Feed bytes via `receive`.
pub struct ResponseParser {
    state: ParseState,
    framing: BodyFraming,
    chunk_remaining: u64,
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Remove one CRLF-terminated line from `buf`. None until a whole line has arrived.
fn take_line(buf: &mut BytesMut, what: &str) -> io::Result<Option<String>> {
    let Some(end) = buf.windows(2).position(|w| w == b"\r\n") else {
        return Ok(None);
    };
    let line = buf.split_to(end + 2);
    let text = std::str::from_utf8(&line[..end]).map_err(|_| invalid(what))?;
    Ok(Some(text.to_string()))
}

fn split_header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    Some((name.trim(), value.trim()))
}

/// `HTTP/1.1 200 OK` or `HTTP/1.1 200`.
fn parse_status_line(line: &str) -> io::Result<(u16, Option<&str>)> {
    let mut parts = line.splitn(3, ' ');
    if !parts.next().is_some_and(|v| v.starts_with("HTTP/")) {
        return Err(invalid("malformed status line"));
    }
    let code = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .filter(|c| (100..=999).contains(c))
        .ok_or_else(|| invalid("malformed status code"))?;
    let reason = parts.next().map(str::trim).filter(|r| !r.is_empty());
    Ok((code, reason))
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            framing: BodyFraming::UntilClose,
            chunk_remaining: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// True while the body is delimited only by connection close.
    pub fn reads_until_close(&self) -> bool {
        self.state == ParseState::Body && self.framing == BodyFraming::UntilClose
    }

    fn finish<H: H1ResponseHandler>(&mut self, handler: &mut H) {
        handler.end_body();
        handler.complete();
        self.state = ParseState::Idle;
    }

    /// Consume as much of `buf` as forms complete tokens; partial data stays in `buf`.
    /// Stops at `HeadersComplete` so the connection can choose the body mode.
    pub fn receive<H: H1ResponseHandler>(&mut self, buf: &mut BytesMut, handler: &mut H) -> io::Result<()> {
        while !buf.is_empty() {
            match self.state {
                ParseState::Idle | ParseState::HeadersComplete => return Ok(()),
                ParseState::StatusLine => {
                    let Some(line) = take_line(buf, "invalid status line UTF-8")? else {
                        return Ok(());
                    };
                    let (code, reason) = parse_status_line(&line)?;
                    handler.status(code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line) = take_line(buf, "invalid header UTF-8")? else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    if let Some((name, value)) = split_header(&line) {
                        handler.header(name, value);
                    }
                }
                ParseState::Body => match self.framing {
                    BodyFraming::Fixed(remaining) => {
                        let n = remaining.min(buf.len() as u64) as usize;
                        handler.body_chunk(&buf.split_to(n))?;
                        let left = remaining - n as u64;
                        self.framing = BodyFraming::Fixed(left);
                        if left == 0 {
                            self.finish(handler);
                        }
                    }
                    _ => {
                        handler.body_chunk(&buf.split())?;
                        return Ok(());
                    }
                },
                ParseState::ChunkSize => {
                    let Some(line) = take_line(buf, "invalid chunk size")? else {
                        return Ok(());
                    };
                    let size = line.split(';').next().unwrap_or_default().trim();
                    self.chunk_remaining =
                        u64::from_str_radix(size, 16).map_err(|_| invalid("invalid chunk size"))?;
                    self.state = if self.chunk_remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    if self.chunk_remaining > 0 {
                        let n = self.chunk_remaining.min(buf.len() as u64) as usize;
                        handler.body_chunk(&buf.split_to(n))?;
                        self.chunk_remaining -= n as u64;
                    }
                    // Chunk data is followed by CRLF.
                    if self.chunk_remaining > 0 || buf.len() < 2 {
                        return Ok(());
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let Some(line) = take_line(buf, "invalid trailer")? else {
                        return Ok(());
                    };
                    if line.is_empty() {
                        self.finish(handler);
                    } else if let Some((name, value)) = split_header(&line) {
                        handler.trailer(name, value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Choose how the body ends, once headers are in (state `HeadersComplete`).
    /// `no_body` covers HEAD requests and 1xx/204/304 responses; chunked wins over Content-Length.
    pub fn set_body_mode(&mut self, content_length: Option<u64>, chunked: bool, no_body: bool) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        (self.framing, self.state) = match (no_body, chunked, content_length) {
            (true, _, _) | (false, false, Some(0)) => (BodyFraming::Fixed(0), ParseState::Idle),
            (false, true, _) => (BodyFraming::Chunked, ParseState::ChunkSize),
            (false, false, Some(n)) => (BodyFraming::Fixed(n), ParseState::Body),
            (false, false, None) => (BodyFraming::UntilClose, ParseState::Body),
        };
    }

    /// The peer closed the connection. Completes a read-until-close body and returns true;
    /// returns false if the response was cut short.
    pub fn finish_at_eof<H: H1ResponseHandler>(&mut self, handler: &mut H) -> bool {
        if self.reads_until_close() {
            self.finish(handler);
            true
        } else {
            self.state == ParseState::Idle
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
