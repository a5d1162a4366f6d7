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

//! WebDAV on top of the session: PROPFIND listings, ACLs, locks, file transfers and the simple methods.

pub mod acl;
pub mod lock;
pub mod methods;
pub mod multistatus;
pub mod props;
pub mod transfer;
mod xml;

pub use acl::{
    acl_body, translate_legacy, AclEffect, AclEntry, AclScope, LegacyAclEntry, LegacyPermissions,
    Principal, Privileges,
};
pub use lock::{LockRequest, LockToken};
pub use methods::Capabilities;
pub use multistatus::{parse_multistatus, parse_multistatus_all};
pub use props::{
    collect_properties, decode_path, propfind_body, PropName, PropResultSet, PropStat, PropWalker, PropertyRecord,
    RECORD_PROPS,
};
pub use transfer::{ProgressFn, TransferEvent};
pub use xml::DAV_NS;

/// Depth header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
    Infinity,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
            Depth::Infinity => "infinity",
        }
    }

    /// 0 and 1 as given; any other value (the C ABI passes -1 or 2) means infinity.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Depth::Zero,
            1 => Depth::One,
            _ => Depth::Infinity,
        }
    }
}
