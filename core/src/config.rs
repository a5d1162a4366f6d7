/*
 * config.rs
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

//! Session configuration: origin, timeouts, user agent, TLS trust and proxy.
//!
//! Everything here is in-memory and built by the caller; nothing is read from
//! files or the environment.

use std::fmt;
use std::time::Duration;

use tokio_rustls::rustls::pki_types::CertificateDer;
use url::Url;

use crate::error::DavError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// URL scheme of the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn is_secure(&self) -> bool {
        *self == Scheme::Https
    }
}

/// The single server a session talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Origin {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Parse `scheme://host[:port][/...]`. Path, query and credentials in the URL are ignored.
    pub fn parse(base_url: &str) -> Result<Self, DavError> {
        let url = Url::parse(base_url)
            .map_err(|e| DavError::other(format!("invalid base URL {}: {}", base_url, e)))?;
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(DavError::other(format!("unsupported URL scheme: {}", other))),
        };
        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.trim_start_matches('[').trim_end_matches(']').to_string(),
            _ => return Err(DavError::other("base URL host is missing")),
        };
        let port = url.port().unwrap_or_else(|| scheme.default_port());
        Ok(Self { scheme, host, port })
    }

    /// Value for the Host header: port omitted when it is the scheme default.
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// `scheme://host[:port]` with no trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.host_header())
    }

    /// Absolute URL for a request target relative to this origin.
    pub fn absolute(&self, target: &str) -> String {
        if target.starts_with('/') {
            format!("{}{}", self.base_url(), target)
        } else {
            format!("{}/{}", self.base_url(), target)
        }
    }

    /// `host:port`, as used for connecting and for CONNECT targets.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

/// How server certificates are verified.
#[derive(Debug, Clone, Default)]
pub enum TlsPolicy {
    /// Platform roots, falling back to the bundled Mozilla roots.
    #[default]
    DefaultRoots,
    /// Only the given DER-encoded CA certificates are trusted.
    CustomRoots(Vec<CertificateDer<'static>>),
}

/// Plain HTTP proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Everything needed to create a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub origin: Origin,
    pub user_agent: Option<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub tls: TlsPolicy,
    pub proxy: Option<ProxyConfig>,
    /// Response bodies beyond this many bytes are treated as an allocation failure.
    pub max_response_body: Option<usize>,
}

impl SessionConfig {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            user_agent: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            tls: TlsPolicy::default(),
            proxy: None,
            max_response_body: None,
        }
    }

    pub fn from_url(base_url: &str) -> Result<Self, DavError> {
        Ok(Self::new(Origin::parse(base_url)?))
    }

    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.user_agent = Some(value.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn tls(mut self, policy: TlsPolicy) -> Self {
        self.tls = policy;
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn max_response_body(mut self, bytes: usize) -> Self {
        self.max_response_body = Some(bytes);
        self
    }
}
