/*
 * challenge.rs
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

//! `WWW-Authenticate` / `Proxy-Authenticate` challenge parsing (RFC 9110 §11.6).
//!
//! One header value may carry several challenges; a response may carry several headers.

/// One challenge: scheme (lower-cased) and its auth-params (names lower-cased).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub scheme: String,
    pub params: Vec<(String, String)>,
}

impl Challenge {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn realm(&self) -> &str {
        self.param("realm").unwrap_or("")
    }
}

fn is_tchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

struct Cursor<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.s[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t') | Some(',')) {
            self.pos += 1;
        }
    }

    fn token(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while self.peek().map(is_tchar).unwrap_or(false) {
            self.pos += 1;
        }
        if self.pos == start {
            None
        } else {
            Some(&self.s[start..self.pos])
        }
    }

    /// Quoted-string with backslash escapes; an unterminated string runs to the end.
    fn quoted(&mut self) -> String {
        let mut out = String::new();
        self.bump();
        while let Some(c) = self.bump() {
            match c {
                '"' => break,
                '\\' => {
                    if let Some(escaped) = self.bump() {
                        out.push(escaped);
                    }
                }
                other => out.push(other),
            }
        }
        out
    }
}

/// Parse every challenge in one header value.
pub fn parse_challenges(value: &str) -> Vec<Challenge> {
    let mut out = Vec::new();
    let mut cur = Cursor { s: value, pos: 0 };
    loop {
        cur.skip_separators();
        let scheme = match cur.token() {
            Some(s) => s.to_ascii_lowercase(),
            None => break,
        };
        let mut challenge = Challenge {
            scheme,
            params: Vec::new(),
        };
        loop {
            cur.skip_separators();
            let save = cur.pos;
            let name = match cur.token() {
                Some(n) => n,
                None => break,
            };
            cur.skip_ws();
            if cur.peek() == Some('=') {
                cur.bump();
                cur.skip_ws();
                let value = if cur.peek() == Some('"') {
                    cur.quoted()
                } else {
                    cur.token().unwrap_or("").to_string()
                };
                challenge.params.push((name.to_ascii_lowercase(), value));
            } else {
                // A bare token starts the next challenge.
                cur.pos = save;
                break;
            }
        }
        out.push(challenge);
    }
    out
}

/// Collect the challenges from every header named `header_name`, in order.
pub fn challenges_from_headers(headers: &[(String, String)], header_name: &str) -> Vec<Challenge> {
    headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(header_name))
        .flat_map(|(_, v)| parse_challenges(v))
        .collect()
}
