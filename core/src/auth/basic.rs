/*
 * basic.rs
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

//! Basic authentication (RFC 7617).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::Credentials;

/// `Basic <base64(user:password)>`. Credentials are encoded as UTF-8, never truncated.
pub fn authorization(credentials: &Credentials) -> String {
    let raw = format!("{}:{}", credentials.username(), credentials.password());
    format!("Basic {}", STANDARD.encode(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc7617_example() {
        let creds = Credentials::new("Aladdin", "open sesame");
        assert_eq!(authorization(&creds), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn long_credentials_are_not_truncated() {
        let user = "u".repeat(400);
        let creds = Credentials::new(user.clone(), "p");
        let header = authorization(&creds);
        let decoded = STANDARD.decode(header.trim_start_matches("Basic ")).unwrap();
        assert_eq!(decoded.len(), 402);
    }
}
