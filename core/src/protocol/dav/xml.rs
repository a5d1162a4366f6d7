/*
 * xml.rs
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

//! XML request bodies: a thin wrapper over quick_xml's Writer with the `DAV:` default namespace.

use std::fmt::Display;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

use crate::error::DavError;

pub const DAV_NS: &str = "DAV:";

pub(crate) fn xml_error(e: impl Display) -> DavError {
    DavError::other(format!("XML error: {}", e))
}

/// Writes one XML document into memory.
pub(crate) struct XmlBody {
    writer: Writer<Vec<u8>>,
}

impl XmlBody {
    /// Start a document whose root element `root` declares `xmlns="DAV:"`.
    pub(crate) fn new(root: &str) -> Result<Self, DavError> {
        let mut body = Self {
            writer: Writer::new(Vec::new()),
        };
        body.event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        body.event(Event::Start(BytesStart::new(root).with_attributes([("xmlns", DAV_NS)])))?;
        Ok(body)
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), DavError> {
        self.writer.write_event(event).map_err(xml_error)
    }

    pub(crate) fn start(&mut self, name: &str) -> Result<(), DavError> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    pub(crate) fn end(&mut self, name: &str) -> Result<(), DavError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    pub(crate) fn empty(&mut self, name: &str) -> Result<(), DavError> {
        self.event(Event::Empty(BytesStart::new(name)))
    }

    /// Empty element in namespace `nspace`; no declaration is written for `DAV:`.
    pub(crate) fn empty_ns(&mut self, nspace: &str, name: &str) -> Result<(), DavError> {
        if nspace == DAV_NS {
            return self.empty(name);
        }
        self.event(Event::Empty(BytesStart::new(name).with_attributes([("xmlns", nspace)])))
    }

    pub(crate) fn text_element(&mut self, name: &str, text: &str) -> Result<(), DavError> {
        self.start(name)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// Close the root element and return the bytes.
    pub(crate) fn finish(mut self, root: &str) -> Result<Vec<u8>, DavError> {
        self.end(root)?;
        Ok(self.writer.into_inner())
    }
}
