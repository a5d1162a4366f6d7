/*
 * acl.rs
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

//! WebDAV ACL (RFC 3744): the ACL method and the legacy five-flag entry form.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::props::PropName;
use super::xml::{XmlBody, DAV_NS};
use crate::error::{DavError, ResultCode};
use crate::protocol::http::{Method, Request};
use crate::session::Session;

/// What a legacy entry's principal string names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclScope {
    /// The principal is an href.
    Resource,
    /// The principal is a `DAV:` property name (e.g. `owner`).
    Property,
    /// Every principal; the principal string is ignored.
    All,
}

impl AclScope {
    /// 0 and 1 select Resource and Property; any other value means All.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => AclScope::Resource,
            1 => AclScope::Property,
            _ => AclScope::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclEffect {
    Grant,
    Deny,
}

impl AclEffect {
    /// 0 is Grant; anything else is Deny.
    pub fn from_raw(raw: i32) -> Self {
        if raw == 0 {
            AclEffect::Grant
        } else {
            AclEffect::Deny
        }
    }

    fn element(&self) -> &'static str {
        match self {
            AclEffect::Grant => "grant",
            AclEffect::Deny => "deny",
        }
    }
}

/// The five privilege flags of a legacy entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyPermissions {
    pub read: bool,
    pub read_acl: bool,
    pub write: bool,
    pub write_acl: bool,
    pub read_current_user_privilege_set: bool,
}

impl LegacyPermissions {
    pub fn privileges(&self) -> Privileges {
        let mut out = Privileges::empty();
        for (flag, privilege) in [
            (self.read, Privileges::READ),
            (self.read_acl, Privileges::READ_ACL),
            (self.write, Privileges::WRITE),
            (self.write_acl, Privileges::WRITE_ACL),
            (self.read_current_user_privilege_set, Privileges::READ_CURRENT_USER_PRIVILEGE_SET),
        ] {
            if flag {
                out |= privilege;
            }
        }
        out
    }
}

/// Legacy ACL entry: scope, effect, principal string and five flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAclEntry {
    pub scope: AclScope,
    pub effect: AclEffect,
    pub principal: String,
    pub permissions: LegacyPermissions,
}

impl LegacyAclEntry {
    /// Entry from the numeric encoding used across the C ABI.
    pub fn from_raw(scope: i32, effect: i32, principal: impl Into<String>, permissions: LegacyPermissions) -> Self {
        Self {
            scope: AclScope::from_raw(scope),
            effect: AclEffect::from_raw(effect),
            principal: principal.into(),
            permissions,
        }
    }
}

/// ACE principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Href(String),
    Property(PropName),
    All,
    Authenticated,
    Unauthenticated,
    SelfPrincipal,
}

/// Set of `DAV:` privileges. Iteration and serialization follow declaration order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Privileges(u16);

impl Privileges {
    pub const READ: Privileges = Privileges(1 << 0);
    pub const READ_ACL: Privileges = Privileges(1 << 1);
    pub const WRITE: Privileges = Privileges(1 << 2);
    pub const WRITE_ACL: Privileges = Privileges(1 << 3);
    pub const READ_CURRENT_USER_PRIVILEGE_SET: Privileges = Privileges(1 << 4);
    pub const WRITE_PROPERTIES: Privileges = Privileges(1 << 5);
    pub const WRITE_CONTENT: Privileges = Privileges(1 << 6);
    pub const UNLOCK: Privileges = Privileges(1 << 7);
    pub const BIND: Privileges = Privileges(1 << 8);
    pub const UNBIND: Privileges = Privileges(1 << 9);
    pub const ALL: Privileges = Privileges(1 << 10);

    const NAMES: [(Privileges, &'static str); 11] = [
        (Privileges::READ, "read"),
        (Privileges::READ_ACL, "read-acl"),
        (Privileges::WRITE, "write"),
        (Privileges::WRITE_ACL, "write-acl"),
        (Privileges::READ_CURRENT_USER_PRIVILEGE_SET, "read-current-user-privilege-set"),
        (Privileges::WRITE_PROPERTIES, "write-properties"),
        (Privileges::WRITE_CONTENT, "write-content"),
        (Privileges::UNLOCK, "unlock"),
        (Privileges::BIND, "bind"),
        (Privileges::UNBIND, "unbind"),
        (Privileges::ALL, "all"),
    ];

    pub const fn empty() -> Self {
        Privileges(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: Privileges) -> bool {
        self.0 & other.0 == other.0
    }

    /// Element names of the privileges in the set.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        Self::NAMES
            .iter()
            .filter(move |(p, _)| self.contains(*p))
            .map(|(_, name)| *name)
    }
}

impl BitOr for Privileges {
    type Output = Privileges;
    fn bitor(self, rhs: Privileges) -> Privileges {
        Privileges(self.0 | rhs.0)
    }
}

impl BitOrAssign for Privileges {
    fn bitor_assign(&mut self, rhs: Privileges) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Privileges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// One ACE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    pub principal: Principal,
    pub effect: AclEffect,
    pub privileges: Privileges,
}

impl From<&LegacyAclEntry> for AclEntry {
    fn from(entry: &LegacyAclEntry) -> Self {
        let principal = match entry.scope {
            AclScope::Resource => Principal::Href(entry.principal.clone()),
            AclScope::Property => Principal::Property(PropName::new(DAV_NS, entry.principal.clone())),
            AclScope::All => Principal::All,
        };
        Self {
            principal,
            effect: entry.effect,
            privileges: entry.permissions.privileges(),
        }
    }
}

/// Translate legacy entries; fails without partial output if the array cannot be allocated.
pub fn translate_legacy(entries: &[LegacyAclEntry]) -> Result<Vec<AclEntry>, DavError> {
    let mut out = Vec::new();
    out.try_reserve_exact(entries.len())
        .map_err(|_| DavError::other(format!("cannot allocate {} ACL entries", entries.len())))?;
    out.extend(entries.iter().map(AclEntry::from));
    Ok(out)
}

/// `<acl xmlns="DAV:">` body with one `<ace>` per entry.
pub fn acl_body(entries: &[AclEntry]) -> Result<Vec<u8>, DavError> {
    let mut body = XmlBody::new("acl")?;
    for entry in entries {
        body.start("ace")?;
        body.start("principal")?;
        match &entry.principal {
            Principal::Href(href) => body.text_element("href", href)?,
            Principal::Property(name) if name.name.trim().is_empty() => {
                return Err(DavError::new(ResultCode::Error, "property principal has no property name"));
            }
            Principal::Property(name) => {
                body.start("property")?;
                body.empty_ns(&name.nspace, &name.name)?;
                body.end("property")?;
            }
            Principal::All => body.empty("all")?,
            Principal::Authenticated => body.empty("authenticated")?,
            Principal::Unauthenticated => body.empty("unauthenticated")?,
            Principal::SelfPrincipal => body.empty("self")?,
        }
        body.end("principal")?;
        let effect = entry.effect.element();
        body.start(effect)?;
        for name in entry.privileges.names() {
            body.start("privilege")?;
            body.empty(name)?;
            body.end("privilege")?;
        }
        body.end(effect)?;
        body.end("ace")?;
    }
    body.finish("acl")
}

impl Session {
    /// Replace the ACL of `uri`. An empty slice sends an ACL with no ACEs.
    /// A 207 answer means some ACE was refused and is reported as a failure.
    pub fn set_acl(&mut self, uri: &str, entries: &[AclEntry]) -> Result<(), DavError> {
        let mut request = Request::new(Method::Acl, uri);
        request.header("Content-Type", "application/xml");
        request.body(acl_body(entries)?);
        tracing::debug!(uri, aces = entries.len(), "setting ACL");
        let response = self.execute(request);
        if response.is_ok() && response.status().code == 207 {
            return Err(DavError::new(ResultCode::Error, "ACL request partially failed (207 Multi-Status)")
                .with_status(207));
        }
        response.check_success()
    }

    /// Set the ACL of `uri` from legacy entries.
    pub fn set_legacy_acl(&mut self, uri: &str, entries: &[LegacyAclEntry]) -> Result<(), DavError> {
        let translated = translate_legacy(entries)?;
        self.set_acl(uri, &translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Origin, Scheme, SessionConfig};
    use crate::session::testing::{Reply, ScriptedTransport};

    fn perms(read: bool, write: bool) -> LegacyPermissions {
        LegacyPermissions {
            read,
            write,
            ..Default::default()
        }
    }

    fn session(replies: Vec<Reply>) -> (Session, ScriptedTransport) {
        let transport = ScriptedTransport::new(replies);
        let config = SessionConfig::new(Origin::new(Scheme::Https, "dav.test", 443));
        (Session::with_transport(config, Box::new(transport.clone())), transport)
    }

    fn body_of(t: &ScriptedTransport) -> String {
        String::from_utf8(t.sent()[0].body.clone().unwrap()).unwrap()
    }

    #[test]
    fn raw_scope_and_effect_mapping() {
        assert_eq!(AclScope::from_raw(0), AclScope::Resource);
        assert_eq!(AclScope::from_raw(1), AclScope::Property);
        assert_eq!(AclScope::from_raw(2), AclScope::All);
        assert_eq!(AclScope::from_raw(99), AclScope::All);
        assert_eq!(AclScope::from_raw(-1), AclScope::All);
        assert_eq!(AclEffect::from_raw(0), AclEffect::Grant);
        assert_eq!(AclEffect::from_raw(7), AclEffect::Deny);
    }

    #[test]
    fn legacy_translation() {
        let entries = vec![
            LegacyAclEntry::from_raw(0, 0, "/principals/alice", perms(true, true)),
            LegacyAclEntry::from_raw(1, 1, "owner", perms(false, true)),
            LegacyAclEntry::from_raw(99, 0, "ignored", perms(true, false)),
        ];
        let out = translate_legacy(&entries).unwrap();
        assert_eq!(out[0].principal, Principal::Href("/principals/alice".to_string()));
        assert_eq!(out[0].privileges, Privileges::READ | Privileges::WRITE);
        assert_eq!(out[1].principal, Principal::Property(PropName::dav("owner")));
        assert_eq!(out[1].effect, AclEffect::Deny);
        assert_eq!(out[2].principal, Principal::All);
    }

    #[test]
    fn body_has_one_ace_per_entry() {
        let entries = translate_legacy(&[
            LegacyAclEntry::from_raw(0, 0, "/p/a", perms(true, false)),
            LegacyAclEntry::from_raw(2, 1, "", perms(false, true)),
        ])
        .unwrap();
        let xml = String::from_utf8(acl_body(&entries).unwrap()).unwrap();
        assert_eq!(xml.matches("<ace>").count(), 2);
        assert!(xml.contains(
            "<ace><principal><href>/p/a</href></principal><grant><privilege><read/></privilege></grant></ace>"
        ));
        assert!(xml.contains("<ace><principal><all/></principal><deny><privilege><write/></privilege></deny></ace>"));
    }

    #[test]
    fn empty_acl_sends_zero_aces() {
        let (mut s, t) = session(vec![Reply::status(200)]);
        s.set_legacy_acl("/doc", &[]).unwrap();
        let sent = t.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::Acl);
        assert_eq!(sent[0].header_value("Content-Type"), Some("application/xml"));
        let xml = body_of(&t);
        assert!(!xml.contains("<ace>"));
        assert!(xml.contains("<acl xmlns=\"DAV:\"></acl>"));
    }

    #[test]
    fn multistatus_answer_is_failure() {
        let (mut s, _) = session(vec![Reply::status(207)]);
        let entries = [LegacyAclEntry::from_raw(0, 0, "/p/a", perms(true, false))];
        let err = s.set_legacy_acl("/doc", &entries).unwrap_err();
        assert_eq!(err.code(), ResultCode::Error);
        assert_eq!(err.http_status(), Some(207));
    }

    #[test]
    fn rfc3744_principals_serialize() {
        let entries = [
            AclEntry {
                principal: Principal::Authenticated,
                effect: AclEffect::Grant,
                privileges: Privileges::READ | Privileges::READ_CURRENT_USER_PRIVILEGE_SET,
            },
            AclEntry {
                principal: Principal::Property(PropName::new("http://example.com/ns", "group")),
                effect: AclEffect::Grant,
                privileges: Privileges::BIND | Privileges::UNBIND,
            },
        ];
        let xml = String::from_utf8(acl_body(&entries).unwrap()).unwrap();
        assert!(xml.contains("<authenticated/>"));
        assert!(xml.contains("<read-current-user-privilege-set/>"));
        assert!(xml.contains("<property><group xmlns=\"http://example.com/ns\"/></property>"));
        assert!(xml.contains("<privilege><bind/></privilege><privilege><unbind/></privilege>"));
    }

    #[test]
    fn empty_property_principal_is_rejected_before_sending() {
        let (mut s, t) = session(vec![Reply::status(200)]);
        let entries = [LegacyAclEntry::from_raw(1, 0, "", perms(true, false))];
        let err = s.set_legacy_acl("/doc", &entries).unwrap_err();
        assert_eq!(err.code(), ResultCode::Error);
        assert!(t.sent().is_empty());
    }

    #[test]
    fn transport_failure_is_reported() {
        let (mut s, _) = session(vec![Reply::Fail(std::io::ErrorKind::ConnectionRefused)]);
        let err = s.set_legacy_acl("/doc", &[]).unwrap_err();
        assert_eq!(err.code(), ResultCode::Connect);
    }
}
