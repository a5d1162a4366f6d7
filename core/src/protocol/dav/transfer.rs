/*
 * transfer.rs
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

//! File transfers: GET into a writer and PUT from a reader, with progress events.
//!
//! Downloads are written to the sink as body chunks arrive. Uploads are read from the
//! source before sending, since a challenge may require the body to be sent again.

use std::io::{self, Read, Write};

use crate::dispatch::BodySink;
use crate::error::{DavError, ResultCode};
use crate::protocol::http::{Method, Request};
use crate::session::Session;

/// Read size for upload sources.
const UPLOAD_CHUNK: usize = 64 * 1024;

/// Progress of a transfer. `total` is None when the size is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    Started { total: Option<u64> },
    Progress { transferred: u64, total: Option<u64> },
    Completed { transferred: u64 },
}

/// Optional progress callback.
pub type ProgressFn<'a> = Option<&'a mut dyn FnMut(TransferEvent)>;

fn content_length(headers: &[(String, String)]) -> Option<u64> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse().ok())
}

struct Download<'a> {
    out: &'a mut dyn Write,
    progress: ProgressFn<'a>,
    total: Option<u64>,
    transferred: u64,
    started: bool,
}

impl Download<'_> {
    fn emit(&mut self, event: TransferEvent) {
        if let Some(progress) = self.progress.as_mut() {
            progress(event);
        }
    }
}

impl BodySink for Download<'_> {
    fn begin(&mut self, headers: &[(String, String)]) {
        self.total = content_length(headers);
        self.started = true;
        let total = self.total;
        self.emit(TransferEvent::Started { total });
    }

    fn chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.out.write_all(data)?;
        self.transferred += data.len() as u64;
        let (transferred, total) = (self.transferred, self.total);
        self.emit(TransferEvent::Progress { transferred, total });
        Ok(())
    }

    fn finish(&mut self) {}
}

impl Session {
    /// GET `path`, writing the body to `out` as it arrives. Returns the number of bytes written.
    /// On failure `out` may hold part of the body.
    pub fn get_to<'a>(
        &mut self,
        path: &str,
        out: &'a mut dyn Write,
        progress: ProgressFn<'a>,
    ) -> Result<u64, DavError> {
        let mut download = Download {
            out,
            progress,
            total: None,
            transferred: 0,
            started: false,
        };
        let response = self.execute_into(Request::new(Method::Get, path), Some(&mut download));
        response.check_success()?;
        download
            .out
            .flush()
            .map_err(|e| DavError::new(ResultCode::from_io(&e), format!("writing {}: {}", path, e)))?;
        if !download.started {
            download.emit(TransferEvent::Started { total: Some(0) });
        }
        let transferred = download.transferred;
        download.emit(TransferEvent::Completed { transferred });
        tracing::debug!(path, bytes = transferred, "download complete");
        Ok(transferred)
    }

    /// PUT the contents of `source` to `path`. `length`, when known, sizes the buffer and
    /// is reported as the total; progress counts bytes taken from `source`.
    pub fn put_from(
        &mut self,
        path: &str,
        source: &mut dyn Read,
        length: Option<u64>,
        content_type: Option<&str>,
        mut progress: ProgressFn<'_>,
    ) -> Result<u64, DavError> {
        let mut emit = |event: TransferEvent| {
            if let Some(progress) = progress.as_mut() {
                progress(event);
            }
        };
        emit(TransferEvent::Started { total: length });

        let mut body = Vec::new();
        if let Some(len) = length.and_then(|l| usize::try_from(l).ok()) {
            body.try_reserve_exact(len)
                .map_err(|_| DavError::other(format!("cannot buffer {} bytes for upload", len)))?;
        }
        let mut chunk = vec![0u8; UPLOAD_CHUNK];
        loop {
            let n = match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DavError::other(format!("reading upload source: {}", e))),
            };
            body.try_reserve(n)
                .map_err(|_| DavError::other("cannot grow upload buffer"))?;
            body.extend_from_slice(&chunk[..n]);
            emit(TransferEvent::Progress {
                transferred: body.len() as u64,
                total: length,
            });
        }

        let transferred = body.len() as u64;
        let mut request = Request::new(Method::Put, path);
        if let Some(ct) = content_type {
            request.header("Content-Type", ct);
        }
        request.body(body);
        self.simple_request(request)?;
        emit(TransferEvent::Completed { transferred });
        tracing::debug!(path, bytes = transferred, "upload complete");
        Ok(transferred)
    }
}
