/*
 * net.rs
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

//! Socket and TLS helpers: address lookup, timed TCP connect, rustls client handshake.
//!
//! Root store follows the usual order: platform native certs first, then
//! webpki-roots as fallback. Connectors for the default policy are built once.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::TlsConnector;

use crate::config::TlsPolicy;

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = root_store.add_parsable_certificates(certs);
            tracing::trace!(added, ignored, "loaded native root certificates");
        }
        Err(e) => tracing::debug!("native root certificates unavailable: {}", e),
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

/// TLS client config for the given trust policy. HTTP/1.1 only over ALPN.
pub fn client_config(policy: &TlsPolicy) -> Arc<ClientConfig> {
    let roots = match policy {
        TlsPolicy::DefaultRoots => build_root_store(),
        TlsPolicy::CustomRoots(certs) => {
            let mut store = RootCertStore::empty();
            let (_, ignored) = store.add_parsable_certificates(certs.iter().cloned());
            if ignored > 0 {
                tracing::warn!(ignored, "ignored unparsable CA certificates in TLS policy");
            }
            store
        }
    };
    let mut config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Arc::new(config)
}

static DEFAULT_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();

/// Connector for a trust policy; the default-roots connector is shared process-wide.
pub fn connector_for(policy: &TlsPolicy) -> TlsConnector {
    match policy {
        TlsPolicy::DefaultRoots => DEFAULT_CONNECTOR
            .get_or_init(|| TlsConnector::from(client_config(policy)))
            .clone(),
        TlsPolicy::CustomRoots(_) => TlsConnector::from(client_config(policy)),
    }
}

/// Resolve `host:port`. Lookup failure is reported as `NotFound`.
pub async fn resolve(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("could not resolve {}: {}", host, e)))?
        .collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses for {}", host),
        ));
    }
    Ok(addrs)
}

/// Connect to the first reachable address of `host:port`, each attempt bounded by `limit`.
pub async fn connect_tcp(host: &str, port: u16, limit: Duration) -> io::Result<TcpStream> {
    let addrs = resolve(host, port).await?;
    let mut last_err = None;
    for addr in addrs {
        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true).ok();
                tracing::trace!(%addr, "connected");
                return Ok(stream);
            }
            Ok(Err(e)) => last_err = Some(e),
            Err(_) => {
                last_err = Some(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {} timed out", addr),
                ))
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::ConnectionRefused, "could not connect")
    }))
}

/// TLS handshake over an established TCP stream (direct or tunnelled through a proxy).
pub async fn tls_handshake(
    tcp: TcpStream,
    host: &str,
    connector: &TlsConnector,
    limit: Duration,
) -> io::Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))?;
    match timeout(limit, connector.connect(server_name, tcp)).await {
        Ok(Ok(tls)) => Ok(tls),
        Ok(Err(e)) => Err(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            format!("TLS handshake with {} failed: {}", host, e),
        )),
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_roots_config_negotiates_http1_only() {
        let config = client_config(&TlsPolicy::CustomRoots(Vec::new()));
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }
}
