/*
 * lib.rs
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

//! davkit core: a WebDAV-capable HTTP client.
//!
//! A [`Session`] is bound to one origin. It dispatches arbitrary requests,
//! answers authentication challenges through an [`AuthResponder`], collects
//! PROPFIND results into [`PropertyRecord`]s and sets ACLs. All operations block
//! the caller; call [`global_init`] once before creating network sessions.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod global;
pub mod net;
pub mod protocol;
pub mod session;

pub use auth::{AuthResponder, CredentialContext, Credentials};
pub use config::{Origin, ProxyConfig, Scheme, SessionConfig, TlsPolicy};
pub use dispatch::{BodyBuffer, Response};
pub use error::{DavError, ResultCode};
pub use global::{global_init, global_shutdown, GlobalGuard};
pub use protocol::dav::{
    AclEntry, Depth, LegacyAclEntry, LockRequest, LockToken, PropName, PropertyRecord, PropWalker, TransferEvent,
};
pub use protocol::http::{Method, Status};
pub use session::{NetTransport, Session, Transport};
