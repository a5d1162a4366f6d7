/*
 * digest.rs
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

//! Digest access authentication (RFC 2617, RFC 7616), qop `auth` or none.

use md5::{Digest, Md5};
use sha2::Sha256;

use super::challenge::Challenge;
use super::Credentials;

/// Digest hash algorithm named by the challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Md5Sess,
    Sha256,
    Sha256Sess,
}

impl DigestAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Md5Sess => "MD5-sess",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha256Sess => "SHA-256-sess",
        }
    }

    /// Absent algorithm means MD5.
    pub fn from_name(name: Option<&str>) -> Option<Self> {
        match name.map(|n| n.trim().to_ascii_uppercase()) {
            None => Some(DigestAlgorithm::Md5),
            Some(n) => match n.as_str() {
                "MD5" => Some(DigestAlgorithm::Md5),
                "MD5-SESS" => Some(DigestAlgorithm::Md5Sess),
                "SHA-256" => Some(DigestAlgorithm::Sha256),
                "SHA-256-SESS" => Some(DigestAlgorithm::Sha256Sess),
                _ => None,
            },
        }
    }

    fn is_session(&self) -> bool {
        matches!(self, DigestAlgorithm::Md5Sess | DigestAlgorithm::Sha256Sess)
    }

    fn hash(&self, data: &str) -> String {
        match self {
            DigestAlgorithm::Md5 | DigestAlgorithm::Md5Sess => hex(&Md5::digest(data.as_bytes())),
            DigestAlgorithm::Sha256 | DigestAlgorithm::Sha256Sess => {
                hex(&Sha256::digest(data.as_bytes()))
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Random client nonce; falls back to the clock if the OS source fails.
fn generate_cnonce() -> String {
    let mut bytes = [0u8; 16];
    if getrandom::getrandom(&mut bytes).is_err() {
        use std::time::{SystemTime, UNIX_EPOCH};
        let t = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        bytes.copy_from_slice(&t.to_le_bytes());
    }
    hex(&bytes)
}

/// Negotiated digest state: nonce from the last challenge, our cnonce and the nonce-count.
#[derive(Clone)]
pub struct DigestState {
    credentials: Credentials,
    realm: String,
    nonce: String,
    opaque: Option<String>,
    algorithm: DigestAlgorithm,
    qop_auth: bool,
    cnonce: String,
    nonce_count: u32,
    session_key: Option<String>,
}

impl std::fmt::Debug for DigestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestState")
            .field("username", &self.credentials.username())
            .field("realm", &self.realm)
            .field("algorithm", &self.algorithm)
            .field("qop_auth", &self.qop_auth)
            .field("nonce_count", &self.nonce_count)
            .finish()
    }
}

impl DigestState {
    /// Build state from a digest challenge. None if the challenge is unusable
    /// (no nonce, unknown algorithm, or a qop list without `auth`).
    pub fn from_challenge(challenge: &Challenge, credentials: Credentials) -> Option<Self> {
        Self::with_cnonce(challenge, credentials, generate_cnonce())
    }

    pub fn with_cnonce(challenge: &Challenge, credentials: Credentials, cnonce: String) -> Option<Self> {
        let nonce = challenge.param("nonce")?.to_string();
        let algorithm = DigestAlgorithm::from_name(challenge.param("algorithm"))?;
        let qop_auth = match challenge.param("qop") {
            None => false,
            Some(list) => {
                if !list.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")) {
                    return None;
                }
                true
            }
        };
        Some(Self {
            credentials,
            realm: challenge.realm().to_string(),
            nonce,
            opaque: challenge.param("opaque").map(|s| s.to_string()),
            algorithm,
            qop_auth,
            cnonce,
            nonce_count: 0,
            session_key: None,
        })
    }

    /// Take a fresh nonce (after `stale=true`), keeping the credentials.
    pub fn refresh(&mut self, challenge: &Challenge) -> bool {
        let Some(nonce) = challenge.param("nonce") else {
            return false;
        };
        self.nonce = nonce.to_string();
        if let Some(opaque) = challenge.param("opaque") {
            self.opaque = Some(opaque.to_string());
        }
        self.nonce_count = 0;
        self.cnonce = generate_cnonce();
        self.session_key = None;
        true
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    fn ha1(&mut self) -> String {
        if let Some(key) = &self.session_key {
            return key.clone();
        }
        let base = self.algorithm.hash(&format!(
            "{}:{}:{}",
            self.credentials.username(),
            self.realm,
            self.credentials.password()
        ));
        if self.algorithm.is_session() {
            let key = self
                .algorithm
                .hash(&format!("{}:{}:{}", base, self.nonce, self.cnonce));
            self.session_key = Some(key.clone());
            key
        } else {
            base
        }
    }

    /// Compute the `Authorization` value for one request; increments the nonce-count.
    pub fn authorization(&mut self, method: &str, uri: &str) -> String {
        self.nonce_count = self.nonce_count.wrapping_add(1);
        let nc = format!("{:08x}", self.nonce_count);
        let ha1 = self.ha1();
        let ha2 = self.algorithm.hash(&format!("{}:{}", method, uri));
        let response = if self.qop_auth {
            self.algorithm
                .hash(&format!("{}:{}:{}:{}:auth:{}", ha1, self.nonce, nc, self.cnonce, ha2))
        } else {
            self.algorithm.hash(&format!("{}:{}:{}", ha1, self.nonce, ha2))
        };

        let mut out = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}, response=\"{}\"",
            quote(self.credentials.username()),
            quote(&self.realm),
            quote(&self.nonce),
            quote(uri),
            self.algorithm.name(),
            response
        );
        if let Some(opaque) = &self.opaque {
            out.push_str(&format!(", opaque=\"{}\"", quote(opaque)));
        }
        if self.qop_auth {
            out.push_str(&format!(", qop=auth, nc={}, cnonce=\"{}\"", nc, self.cnonce));
        }
        out
    }
}

fn quote(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
