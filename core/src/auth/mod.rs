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

//! HTTP authentication: credentials, responders and the per-session negotiator.
//!
//! - Credentials / AuthResponder: who to authenticate as, asked once per challenge
//! - CredentialContext: fixed credentials, offered for at most MAX_AUTH_ATTEMPTS challenges
//! - Negotiator: picks a scheme from challenges and produces the Authorization header

mod basic;
pub mod challenge;
mod digest;

use std::sync::Arc;

pub use challenge::{challenges_from_headers, parse_challenges, Challenge};
pub use digest::{DigestAlgorithm, DigestState};

use crate::error::ResultCode;

/// Number of challenges a `CredentialContext` answers before giving up.
pub const MAX_AUTH_ATTEMPTS: u32 = 2;

/// Username and password. Debug output never shows the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Supplies credentials when a server or proxy challenges.
/// `attempt` starts at 1 for each request; returning None gives up.
pub trait AuthResponder: Send + Sync {
    fn respond(&self, realm: &str, attempt: u32) -> Option<Credentials>;
}

impl<F> AuthResponder for F
where
    F: Fn(&str, u32) -> Option<Credentials> + Send + Sync,
{
    fn respond(&self, realm: &str, attempt: u32) -> Option<Credentials> {
        self(realm, attempt)
    }
}

/// Fixed username/password; answers the first MAX_AUTH_ATTEMPTS challenges, then gives up.
#[derive(Debug, Clone)]
pub struct CredentialContext {
    credentials: Credentials,
}

impl CredentialContext {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(username, password),
        }
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }
}

impl AuthResponder for CredentialContext {
    fn respond(&self, realm: &str, attempt: u32) -> Option<Credentials> {
        if attempt > MAX_AUTH_ATTEMPTS {
            tracing::debug!(realm, attempt, "giving up on authentication");
            return None;
        }
        Some(self.credentials.clone())
    }
}

/// Authentication schemes understood by the negotiator, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Digest,
    Basic,
}

impl AuthScheme {
    pub fn name(&self) -> &'static str {
        match self {
            AuthScheme::Digest => "Digest",
            AuthScheme::Basic => "Basic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "digest" => Some(AuthScheme::Digest),
            "basic" => Some(AuthScheme::Basic),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which party is being authenticated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTarget {
    Server,
    Proxy,
}

impl AuthTarget {
    /// Status code that carries a challenge for this target.
    pub fn challenge_status(&self) -> u16 {
        match self {
            AuthTarget::Server => 401,
            AuthTarget::Proxy => 407,
        }
    }

    pub fn challenge_header(&self) -> &'static str {
        match self {
            AuthTarget::Server => "WWW-Authenticate",
            AuthTarget::Proxy => "Proxy-Authenticate",
        }
    }

    pub fn response_header(&self) -> &'static str {
        match self {
            AuthTarget::Server => "Authorization",
            AuthTarget::Proxy => "Proxy-Authorization",
        }
    }

    pub fn failure_code(&self) -> ResultCode {
        match self {
            AuthTarget::Server => ResultCode::Auth,
            AuthTarget::Proxy => ResultCode::ProxyAuth,
        }
    }
}

enum AuthState {
    Basic(String),
    Digest(DigestState),
}

/// Outcome of handling a challenge response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// New credentials are ready; send the request again.
    Retry,
    /// The responder declined or no supported scheme was offered.
    GiveUp,
}

/// Per-session, per-target authentication state.
pub struct Negotiator {
    target: AuthTarget,
    responder: Arc<dyn AuthResponder>,
    attempt: u32,
    stale_retried: bool,
    state: Option<AuthState>,
}

impl std::fmt::Debug for Negotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match &self.state {
            Some(AuthState::Basic(_)) => Some(AuthScheme::Basic),
            Some(AuthState::Digest(_)) => Some(AuthScheme::Digest),
            None => None,
        };
        f.debug_struct("Negotiator")
            .field("target", &self.target)
            .field("attempt", &self.attempt)
            .field("scheme", &scheme)
            .finish()
    }
}

impl Negotiator {
    pub fn new(target: AuthTarget, responder: Arc<dyn AuthResponder>) -> Self {
        Self {
            target,
            responder,
            attempt: 0,
            stale_retried: false,
            state: None,
        }
    }

    pub fn target(&self) -> AuthTarget {
        self.target
    }

    /// Number of challenges answered in the current request.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Scheme negotiated by the last successful challenge, if any.
    pub fn scheme(&self) -> Option<AuthScheme> {
        match &self.state {
            Some(AuthState::Basic(_)) => Some(AuthScheme::Basic),
            Some(AuthState::Digest(_)) => Some(AuthScheme::Digest),
            None => None,
        }
    }

    /// Reset the per-request attempt counter. Negotiated state is kept for pre-emptive use.
    pub fn begin_request(&mut self) {
        self.attempt = 0;
        self.stale_retried = false;
    }

    /// Header value to attach to a request, if a scheme has been negotiated.
    pub fn authorization(&mut self, method: &str, uri: &str) -> Option<String> {
        match &mut self.state {
            Some(AuthState::Basic(value)) => Some(value.clone()),
            Some(AuthState::Digest(state)) => Some(state.authorization(method, uri)),
            None => None,
        }
    }

    /// Handle a 401/407 response carrying `headers`.
    pub fn on_challenge(&mut self, headers: &[(String, String)]) -> ChallengeOutcome {
        let challenges = challenges_from_headers(headers, self.target.challenge_header());
        let digest = challenges.iter().find(|c| c.scheme == "digest");
        let basic = challenges.iter().find(|c| c.scheme == "basic");

        if let (Some(c), Some(AuthState::Digest(state))) = (digest, self.state.as_mut()) {
            let stale = c.param("stale").map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false);
            if stale && !self.stale_retried && state.refresh(c) {
                self.stale_retried = true;
                tracing::debug!(target_kind = ?self.target, "digest nonce stale, retrying");
                return ChallengeOutcome::Retry;
            }
        }

        let realm = digest.or(basic).map(|c| c.realm()).unwrap_or("");
        if digest.is_none() && basic.is_none() {
            tracing::warn!(
                target_kind = ?self.target,
                offered = challenges.len(),
                "no supported authentication scheme offered"
            );
            self.state = None;
            return ChallengeOutcome::GiveUp;
        }

        self.attempt += 1;
        let credentials = match self.responder.respond(realm, self.attempt) {
            Some(c) => c,
            None => {
                self.state = None;
                return ChallengeOutcome::GiveUp;
            }
        };

        if let Some(c) = digest {
            if let Some(state) = DigestState::from_challenge(c, credentials.clone()) {
                tracing::debug!(realm, attempt = self.attempt, scheme = "Digest", "answering challenge");
                self.state = Some(AuthState::Digest(state));
                return ChallengeOutcome::Retry;
            }
        }
        match basic {
            Some(_) => {
                tracing::debug!(realm, attempt = self.attempt, scheme = "Basic", "answering challenge");
                self.state = Some(AuthState::Basic(basic::authorization(&credentials)));
                ChallengeOutcome::Retry
            }
            None => {
                tracing::warn!(realm, "digest challenge not usable and no Basic offered");
                self.state = None;
                ChallengeOutcome::GiveUp
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(name: &str, value: &str) -> Vec<(String, String)> {
        vec![(name.to_string(), value.to_string())]
    }

    #[test]
    fn credential_context_gives_up_after_two() {
        let ctx = CredentialContext::new("alice", "secret");
        assert_eq!(ctx.respond("r", 1), Some(Credentials::new("alice", "secret")));
        assert!(ctx.respond("r", 2).is_some());
        assert!(ctx.respond("r", 3).is_none());
    }

    #[test]
    fn debug_redacts_password() {
        let s = format!("{:?}", Credentials::new("alice", "hunter2"));
        assert!(s.contains("alice"));
        assert!(!s.contains("hunter2"));
    }

    #[test]
    fn basic_negotiation_and_preemptive_reuse() {
        let mut n = Negotiator::new(AuthTarget::Server, Arc::new(CredentialContext::new("u", "p")));
        n.begin_request();
        assert!(n.authorization("GET", "/").is_none());
        let h = headers("WWW-Authenticate", "Basic realm=\"dav\"");
        assert_eq!(n.on_challenge(&h), ChallengeOutcome::Retry);
        assert_eq!(n.authorization("GET", "/").as_deref(), Some("Basic dTpw"));
        n.begin_request();
        assert_eq!(n.authorization("GET", "/other").as_deref(), Some("Basic dTpw"));
        assert_eq!(n.attempts(), 0);
    }

    #[test]
    fn third_challenge_gives_up() {
        let mut n = Negotiator::new(AuthTarget::Server, Arc::new(CredentialContext::new("u", "p")));
        n.begin_request();
        let h = headers("WWW-Authenticate", "Basic realm=\"dav\"");
        assert_eq!(n.on_challenge(&h), ChallengeOutcome::Retry);
        assert_eq!(n.on_challenge(&h), ChallengeOutcome::Retry);
        assert_eq!(n.on_challenge(&h), ChallengeOutcome::GiveUp);
        assert_eq!(n.attempts(), 3);
        assert!(n.scheme().is_none());
    }

    #[test]
    fn digest_preferred_over_basic() {
        let mut n = Negotiator::new(AuthTarget::Proxy, Arc::new(CredentialContext::new("u", "p")));
        n.begin_request();
        let h = vec![
            ("Proxy-Authenticate".to_string(), "Basic realm=\"x\"".to_string()),
            ("Proxy-Authenticate".to_string(), "Digest realm=\"x\", nonce=\"abc\", qop=\"auth\"".to_string()),
        ];
        assert_eq!(n.on_challenge(&h), ChallengeOutcome::Retry);
        assert_eq!(n.scheme(), Some(AuthScheme::Digest));
        assert!(n.authorization("GET", "/").unwrap().starts_with("Digest "));
    }

    #[test]
    fn stale_nonce_refreshes_without_asking() {
        let asked = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = asked.clone();
        let responder = move |_: &str, _: u32| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Some(Credentials::new("u", "p"))
        };
        let mut n = Negotiator::new(AuthTarget::Server, Arc::new(responder));
        n.begin_request();
        let first = headers("WWW-Authenticate", "Digest realm=\"x\", nonce=\"one\"");
        assert_eq!(n.on_challenge(&first), ChallengeOutcome::Retry);
        let stale = headers("WWW-Authenticate", "Digest realm=\"x\", nonce=\"two\", stale=true");
        assert_eq!(n.on_challenge(&stale), ChallengeOutcome::Retry);
        assert_eq!(asked.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(n.authorization("GET", "/").unwrap().contains("nonce=\"two\""));
    }

    #[test]
    fn unsupported_scheme_gives_up_without_asking() {
        let mut n = Negotiator::new(AuthTarget::Server, Arc::new(CredentialContext::new("u", "p")));
        n.begin_request();
        let h = headers("WWW-Authenticate", "Negotiate");
        assert_eq!(n.on_challenge(&h), ChallengeOutcome::GiveUp);
        assert_eq!(n.attempts(), 0);
    }

    #[test]
    fn target_mapping() {
        assert_eq!(AuthTarget::Proxy.challenge_status(), 407);
        assert_eq!(AuthTarget::Proxy.failure_code(), ResultCode::ProxyAuth);
        assert_eq!(AuthTarget::Server.response_header(), "Authorization");
    }
}
