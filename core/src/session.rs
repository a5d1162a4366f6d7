/*
 * session.rs
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

//! Session: one origin, its connection, attached credentials.
//!
//! A `Session` owns a boxed `Transport`. `NetTransport` is the real one: it
//! keeps one HTTP/1.1 connection alive between requests and drives it on the
//! shared runtime from `global`. Tests inject their own transport.

use std::io;
use std::sync::Arc;

use tokio_rustls::TlsConnector;

use crate::auth::{AuthResponder, AuthTarget, ChallengeOutcome, CredentialContext, Negotiator};
use crate::config::{Origin, ProxyConfig, SessionConfig};
use crate::dispatch::{BodySink, Collector, Response};
use crate::error::{DavError, ResultCode};
use crate::global::GlobalGuard;
use crate::net::connector_for;
use crate::protocol::http::{HttpClient, HttpConnection, Opened, Request, ResponseHandler, Timeouts};

/// Carries one request to the server and pushes the response into `handler`.
///
/// On `Err` the transport has already called `handler.failed`. Events seen before the
/// failure (status, headers, part of the body) stay with the handler.
pub trait Transport: Send {
    fn send(&mut self, request: &Request, handler: &mut dyn ResponseHandler) -> io::Result<()>;

    /// Drop any connection kept for reuse.
    fn close(&mut self);
}

/// Connection state used inside the runtime.
struct Link {
    origin: Origin,
    proxy: Option<ProxyConfig>,
    connector: TlsConnector,
    timeouts: Timeouts,
    connection: Option<HttpConnection>,
}

impl Link {
    async fn send(&mut self, request: &Request, handler: &mut dyn ResponseHandler) -> io::Result<()> {
        if let Some(mut conn) = self.connection.take() {
            match self.exchange(&mut conn, request, handler).await {
                // The server closed an idle connection before we wrote; nothing reached the handler.
                Err(e) if !conn.received_any() => {
                    tracing::debug!(error = %e, "kept-alive connection failed, reconnecting");
                }
                result => {
                    self.keep(conn);
                    return result;
                }
            }
        }

        let mut conn = match self.open(request).await? {
            Opened::Connected(conn) => conn,
            Opened::TunnelRefused(captured) => return captured.replay(handler),
        };
        let result = self.exchange(&mut conn, request, handler).await;
        self.keep(conn);
        result
    }

    async fn open(&self, request: &Request) -> io::Result<Opened> {
        match &self.proxy {
            None => HttpClient::connect(&self.origin, &self.connector, self.timeouts)
                .await
                .map(Opened::Connected),
            Some(proxy) => {
                HttpClient::connect_via_proxy(
                    &self.origin,
                    proxy,
                    request.header_value("Proxy-Authorization"),
                    &self.connector,
                    self.timeouts,
                )
                .await
            }
        }
    }

    async fn exchange(
        &self,
        conn: &mut HttpConnection,
        request: &Request,
        handler: &mut dyn ResponseHandler,
    ) -> io::Result<()> {
        let host = self.origin.host_header();
        match &self.proxy {
            Some(_) if !self.origin.scheme.is_secure() => {
                let target = self.origin.absolute(&request.target);
                conn.send(request, &host, &target, handler).await
            }
            Some(_) if request.header_value("Proxy-Authorization").is_some() => {
                // Proxy credentials belong to the CONNECT, not to the tunnelled request.
                let mut inner = request.clone();
                inner.remove_header("Proxy-Authorization");
                conn.send(&inner, &host, &request.target, handler).await
            }
            _ => conn.send(request, &host, &request.target, handler).await,
        }
    }

    fn keep(&mut self, conn: HttpConnection) {
        if conn.is_reusable() {
            self.connection = Some(conn);
        } else {
            tracing::trace!(origin = %self.origin, "connection not reusable, dropping");
        }
    }
}

/// HTTP/1.1 over TCP or TLS, one kept-alive connection, blocking on the shared runtime.
pub struct NetTransport {
    link: Link,
    // Declared last: the connection must drop before the runtime reference.
    guard: GlobalGuard,
}

impl NetTransport {
    pub fn new(config: &SessionConfig) -> Result<Self, DavError> {
        let guard = GlobalGuard::acquire()?;
        Ok(Self {
            link: Link {
                origin: config.origin.clone(),
                proxy: config.proxy.clone(),
                connector: connector_for(&config.tls),
                timeouts: Timeouts {
                    connect: config.connect_timeout,
                    read: config.read_timeout,
                },
                connection: None,
            },
            guard,
        })
    }

    /// True while a connection is kept for reuse.
    pub fn is_connected(&self) -> bool {
        self.link.connection.is_some()
    }
}

impl Transport for NetTransport {
    fn send(&mut self, request: &Request, handler: &mut dyn ResponseHandler) -> io::Result<()> {
        let result = self.guard.runtime().block_on(self.link.send(request, handler));
        if let Err(e) = &result {
            handler.failed(e);
        }
        result
    }

    fn close(&mut self) {
        if let Some(mut conn) = self.link.connection.take() {
            self.guard.runtime().block_on(conn.shutdown());
            tracing::debug!(origin = %self.link.origin, "connection closed");
        }
    }
}

/// A WebDAV session against one origin.
pub struct Session {
    config: SessionConfig,
    server_auth: Option<Negotiator>,
    proxy_auth: Option<Negotiator>,
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("origin", &self.config.origin)
            .field("server_auth", &self.server_auth)
            .field("proxy_auth", &self.proxy_auth)
            .finish()
    }
}

impl Session {
    /// Network session. Holds a reference on the shared runtime until dropped.
    pub fn new(config: SessionConfig) -> Result<Self, DavError> {
        let transport = NetTransport::new(&config)?;
        tracing::debug!(origin = %config.origin, "session created");
        Ok(Self::with_transport(config, Box::new(transport)))
    }

    pub fn with_transport(config: SessionConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            config,
            server_auth: None,
            proxy_auth: None,
            transport,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn origin(&self) -> &Origin {
        &self.config.origin
    }

    /// Attach fixed server credentials. Replaces any previous server authentication state.
    pub fn set_server_auth(&mut self, context: Arc<CredentialContext>) {
        self.set_server_auth_responder(context);
    }

    pub fn set_server_auth_responder(&mut self, responder: Arc<dyn AuthResponder>) {
        self.server_auth = Some(Negotiator::new(AuthTarget::Server, responder));
    }

    pub fn set_proxy_auth(&mut self, responder: Arc<dyn AuthResponder>) {
        self.proxy_auth = Some(Negotiator::new(AuthTarget::Proxy, responder));
    }

    pub fn clear_server_auth(&mut self) {
        self.server_auth = None;
    }

    pub fn close_connection(&mut self) {
        self.transport.close();
    }

    /// Method and request-target of the request line each party sees for `request`.
    /// Digest hashes these, so they must match what goes on the wire: an absolute URL
    /// through a plain proxy, and the CONNECT line for proxy credentials on a tunnel.
    fn request_lines(&self, request: &Request) -> ((String, String), (String, String)) {
        let method = request.method.as_str().to_string();
        let origin = &self.config.origin;
        match &self.config.proxy {
            None => {
                let line = (method, request.target.clone());
                (line.clone(), line)
            }
            Some(_) if origin.scheme.is_secure() => (
                (method, request.target.clone()),
                ("CONNECT".to_string(), origin.authority()),
            ),
            Some(_) => {
                let line = (method, origin.absolute(&request.target));
                (line.clone(), line)
            }
        }
    }

    fn apply_credentials(&mut self, request: &mut Request) {
        let ((server_method, server_uri), (proxy_method, proxy_uri)) = self.request_lines(request);
        if let Some(negotiator) = self.server_auth.as_mut() {
            if let Some(value) = negotiator.authorization(&server_method, &server_uri) {
                request.set_header(negotiator.target().response_header(), value);
            }
        }
        if let Some(negotiator) = self.proxy_auth.as_mut() {
            if let Some(value) = negotiator.authorization(&proxy_method, &proxy_uri) {
                request.set_header(negotiator.target().response_header(), value);
            }
        }
    }

    /// Send `request`, answering 401/407 challenges while the responders supply credentials.
    /// The returned response is the last one received.
    pub(crate) fn execute(&mut self, request: Request) -> Response {
        self.execute_into(request, None)
    }

    /// As `execute`, with the body of a 2xx response delivered to `sink`.
    pub(crate) fn execute_into(&mut self, mut request: Request, sink: Option<&mut dyn BodySink>) -> Response {
        if let Some(agent) = &self.config.user_agent {
            if request.header_value("User-Agent").is_none() {
                request.set_header("User-Agent", agent.clone());
            }
        }
        for negotiator in [self.server_auth.as_mut(), self.proxy_auth.as_mut()]
            .into_iter()
            .flatten()
        {
            negotiator.begin_request();
        }
        tracing::debug!(method = %request.method, path = %request.target, "dispatching request");

        let limit = self.config.max_response_body;
        let mut collector = match sink {
            Some(sink) => Collector::with_sink(limit, sink),
            None => Collector::new(limit),
        };
        loop {
            self.apply_credentials(&mut request);
            collector.reset();
            if let Err(e) = self.transport.send(&request, &mut collector) {
                let code = ResultCode::from_io(&e);
                tracing::debug!(method = %request.method, path = %request.target, error = %e, "request failed");
                return collector.into_failure(code, e.to_string());
            }

            let negotiator = match collector.status_code() {
                Some(401) => self.server_auth.as_mut(),
                Some(407) => self.proxy_auth.as_mut(),
                _ => None,
            };
            let Some(negotiator) = negotiator else {
                return collector.into_response();
            };
            match negotiator.on_challenge(collector.headers()) {
                ChallengeOutcome::Retry => continue,
                ChallengeOutcome::GiveUp => {
                    let code = negotiator.target().failure_code();
                    let message = match negotiator.target() {
                        AuthTarget::Server => "could not authenticate to server",
                        AuthTarget::Proxy => "could not authenticate to proxy server",
                    };
                    tracing::warn!(path = %request.target, attempts = negotiator.attempts(), "{}", message);
                    return collector.into_failure(code, message.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for unit tests.

    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::Transport;
    use crate::protocol::http::{Request, ResponseHandler, Status};

    /// One scripted answer.
    pub enum Reply {
        Respond {
            status: u16,
            reason: &'static str,
            headers: Vec<(String, String)>,
            body: Vec<u8>,
        },
        Fail(io::ErrorKind),
    }

    impl Reply {
        pub fn status(status: u16) -> Self {
            Reply::Respond {
                status,
                reason: "",
                headers: Vec::new(),
                body: Vec::new(),
            }
        }

        pub fn with_header(mut self, name: &str, value: &str) -> Self {
            if let Reply::Respond { headers, .. } = &mut self {
                headers.push((name.to_string(), value.to_string()));
            }
            self
        }

        pub fn with_body(mut self, data: &[u8]) -> Self {
            if let Reply::Respond { body, .. } = &mut self {
                *body = data.to_vec();
            }
            self
        }
    }

    /// Replays scripted replies (bodies in 8-byte chunks) and records every request it was given.
    #[derive(Clone, Default)]
    pub struct ScriptedTransport {
        pub replies: Arc<Mutex<VecDeque<Reply>>>,
        pub requests: Arc<Mutex<Vec<Request>>>,
        pub closed: Arc<Mutex<u32>>,
    }

    impl ScriptedTransport {
        pub fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                ..Default::default()
            }
        }

        pub fn sent(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&mut self, request: &Request, handler: &mut dyn ResponseHandler) -> io::Result<()> {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Reply::Fail(io::ErrorKind::ConnectionRefused));
            match reply {
                Reply::Respond {
                    status,
                    reason,
                    headers,
                    body,
                } => {
                    handler.status(Status::with_reason(status, reason));
                    for (k, v) in &headers {
                        handler.header(k, v);
                    }
                    if !body.is_empty() {
                        handler.start_body();
                        for chunk in body.chunks(8) {
                            if let Err(e) = handler.body_chunk(chunk) {
                                handler.failed(&e);
                                return Err(e);
                            }
                        }
                        handler.end_body();
                    }
                    handler.complete();
                    Ok(())
                }
                Reply::Fail(kind) => {
                    let e = io::Error::new(kind, "scripted failure");
                    handler.failed(&e);
                    Err(e)
                }
            }
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Reply, ScriptedTransport};
    use super::*;
    use crate::config::{Origin, Scheme};
    use crate::protocol::http::Method;

    fn session(replies: Vec<Reply>) -> (Session, ScriptedTransport) {
        let transport = ScriptedTransport::new(replies);
        let config = SessionConfig::new(Origin::new(Scheme::Http, "dav.test", 80)).user_agent("davkit-test");
        (Session::with_transport(config, Box::new(transport.clone())), transport)
    }

    #[test]
    fn basic_challenge_is_answered_once() {
        let (mut s, t) = session(vec![
            Reply::status(401).with_header("WWW-Authenticate", "Basic realm=\"dav\""),
            Reply::status(200),
        ]);
        s.set_server_auth(Arc::new(CredentialContext::new("u", "p")));
        let r = s.execute(Request::new(Method::Get, "/a"));
        assert_eq!(r.code(), ResultCode::Ok);
        assert_eq!(r.status().code, 200);
        let sent = t.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].header_value("Authorization").is_none());
        assert_eq!(sent[1].header_value("Authorization"), Some("Basic dTpw"));
        assert_eq!(sent[1].header_value("User-Agent"), Some("davkit-test"));
    }

    #[test]
    fn credentials_are_sent_preemptively_afterwards() {
        let (mut s, t) = session(vec![
            Reply::status(401).with_header("WWW-Authenticate", "Basic realm=\"dav\""),
            Reply::status(200),
            Reply::status(200),
        ]);
        s.set_server_auth(Arc::new(CredentialContext::new("u", "p")));
        s.execute(Request::new(Method::Get, "/a"));
        s.execute(Request::new(Method::Get, "/b"));
        let sent = t.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].header_value("Authorization"), Some("Basic dTpw"));
    }

    #[test]
    fn proxy_challenge_maps_to_proxy_auth() {
        let challenge = || Reply::status(407).with_header("Proxy-Authenticate", "Basic realm=\"proxy\"");
        let (mut s, _) = session(vec![challenge(), challenge(), challenge()]);
        s.set_proxy_auth(Arc::new(CredentialContext::new("u", "p")));
        let r = s.execute(Request::new(Method::Get, "/"));
        assert_eq!(r.code(), ResultCode::ProxyAuth);
        assert_eq!(r.status().code, 407);
        assert!(r.error().is_some());
    }

    fn digest_param<'a>(header: &'a str, name: &str) -> &'a str {
        let start = header.find(&format!("{}=", name)).unwrap() + name.len() + 1;
        let rest = &header[start..];
        match rest.strip_prefix('"') {
            Some(quoted) => &quoted[..quoted.find('"').unwrap()],
            None => rest.split(',').next().unwrap().trim(),
        }
    }

    fn md5_hex(data: &str) -> String {
        use md5::{Digest, Md5};
        Md5::digest(data.as_bytes()).iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn proxied_session(base_url: &str, replies: Vec<Reply>) -> (Session, ScriptedTransport) {
        let transport = ScriptedTransport::new(replies);
        let config = SessionConfig::from_url(base_url)
            .unwrap()
            .proxy(ProxyConfig::new("proxy.test", 3128));
        (Session::with_transport(config, Box::new(transport.clone())), transport)
    }

    fn proxy_digest_challenge() -> Reply {
        Reply::status(407).with_header("Proxy-Authenticate", "Digest realm=\"p\", nonce=\"n1\", qop=\"auth\"")
    }

    #[test]
    fn proxy_digest_for_tunnel_hashes_connect_line() {
        let (mut s, t) = proxied_session("https://dav.example", vec![proxy_digest_challenge(), Reply::status(200)]);
        s.set_proxy_auth(Arc::new(CredentialContext::new("u", "pw")));
        let r = s.execute(Request::new(Method::Get, "/file"));
        assert_eq!(r.code(), ResultCode::Ok);
        let sent = t.sent();
        let header = sent[1].header_value("Proxy-Authorization").unwrap();
        assert_eq!(digest_param(header, "uri"), "dav.example:443");
        let ha1 = md5_hex("u:p:pw");
        let ha2 = md5_hex("CONNECT:dav.example:443");
        let expected = md5_hex(&format!(
            "{}:n1:{}:{}:auth:{}",
            ha1,
            digest_param(header, "nc"),
            digest_param(header, "cnonce"),
            ha2
        ));
        assert_eq!(digest_param(header, "response"), expected);
    }

    #[test]
    fn proxy_digest_for_plain_http_uses_absolute_target() {
        let (mut s, t) = proxied_session("http://dav.example", vec![proxy_digest_challenge(), Reply::status(200)]);
        s.set_proxy_auth(Arc::new(CredentialContext::new("u", "pw")));
        s.execute(Request::new(Method::Get, "/file"));
        let sent = t.sent();
        let header = sent[1].header_value("Proxy-Authorization").unwrap();
        assert_eq!(digest_param(header, "uri"), "http://dav.example/file");
        let ha2 = md5_hex("GET:http://dav.example/file");
        let expected = md5_hex(&format!(
            "{}:n1:{}:{}:auth:{}",
            md5_hex("u:p:pw"),
            digest_param(header, "nc"),
            digest_param(header, "cnonce"),
            ha2
        ));
        assert_eq!(digest_param(header, "response"), expected);
    }

    #[test]
    fn unauthenticated_401_is_transport_ok() {
        let (mut s, _) = session(vec![Reply::status(401).with_header("WWW-Authenticate", "Basic realm=\"x\"")]);
        let r = s.execute(Request::new(Method::Get, "/"));
        assert_eq!(r.code(), ResultCode::Ok);
        assert_eq!(r.status().code, 401);
    }

    #[test]
    fn connection_refused_maps_to_connect() {
        let (mut s, _) = session(vec![Reply::Fail(io::ErrorKind::ConnectionRefused)]);
        let r = s.execute(Request::new(Method::Get, "/"));
        assert_eq!(r.code(), ResultCode::Connect);
        assert!(r.error().is_some());
    }

    #[test]
    fn close_connection_reaches_transport() {
        let (mut s, t) = session(vec![]);
        s.close_connection();
        assert_eq!(*t.closed.lock().unwrap(), 1);
    }
}
