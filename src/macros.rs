// viaspf – implementation of the SPF specification
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! Macro string expansion (RFC 7208, §7).

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    net::IpAddr,
    str::Chars,
};

/// Maximum length in octets of an expanded domain-spec (§7.3; a domain name
/// queriable in DNS, leaving room for the root label).
const MAX_EXPANSION_LEN: usize = 253;

/// The inputs available to macro expansion.
///
/// All values are borrowed from the evaluation in progress: `domain` is the
/// current domain, and the sender has already been split into its local-part
/// and domain-part.
#[derive(Clone, Copy, Debug)]
pub struct MacroContext<'a> {
    pub client_ip: IpAddr,
    pub domain: &'a str,
    pub sender_local_part: &'a str,
    pub sender_domain: &'a str,
}

impl MacroContext<'_> {
    fn sender(&self) -> String {
        format!("{}@{}", self.sender_local_part, self.sender_domain)
    }
}

/// An error that occurs when expanding a macro string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacroError {
    InvalidMacroSequence,
    UnterminatedMacro,
    UnsupportedMacro(char),
    InvalidTransformer,
    ExpansionTooLong,
}

impl Display for MacroError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMacroSequence => write!(f, "invalid macro sequence"),
            Self::UnterminatedMacro => write!(f, "unterminated macro"),
            Self::UnsupportedMacro(c) => write!(f, "unsupported macro letter '{c}'"),
            Self::InvalidTransformer => write!(f, "invalid macro transformer"),
            Self::ExpansionTooLong => write!(f, "macro expansion too long"),
        }
    }
}

impl Error for MacroError {}

/// Expands a domain-spec into a domain name candidate.
///
/// The result is bounded at 253 octets; an expansion that exceeds the bound
/// is truncated on the left, label by label, until it fits (§7.3).
pub fn expand_domain_spec(spec: &str, cx: &MacroContext<'_>) -> Result<String, MacroError> {
    let expanded = expand_macro_string(spec, cx)?;

    if expanded.len() <= MAX_EXPANSION_LEN {
        return Ok(expanded);
    }

    for (i, _) in expanded.match_indices('.') {
        let truncated = &expanded[i + 1..];
        if truncated.len() <= MAX_EXPANSION_LEN {
            return Ok(truncated.into());
        }
    }

    Err(MacroError::ExpansionTooLong)
}

/// Expands the explain-string obtained from an `exp` modifier’s TXT record.
///
/// Unlike domain-spec expansion, the result length is unbounded (§6.2).
pub fn expand_explain_string(s: &str, cx: &MacroContext<'_>) -> Result<String, MacroError> {
    expand_macro_string(s, cx)
}

fn expand_macro_string(s: &str, cx: &MacroContext<'_>) -> Result<String, MacroError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }

        match chars.next() {
            Some('%') => result.push('%'),
            Some('_') => result.push(' '),
            Some('-') => result.push_str("%20"),
            Some('{') => result.push_str(&expand_macro(collect_macro_body(&mut chars)?, cx)?),
            _ => return Err(MacroError::InvalidMacroSequence),
        }
    }

    Ok(result)
}

fn collect_macro_body(chars: &mut Chars<'_>) -> Result<String, MacroError> {
    let mut body = String::new();
    for c in chars {
        if c == '}' {
            return Ok(body);
        }
        body.push(c);
    }
    Err(MacroError::UnterminatedMacro)
}

const DELIMITERS: &[char] = &['.', '-', '+', ',', '/', '_', '='];

// macro-expand within "%{...}": macro letter, then optional transformers
// (digits, 'r'), then optional delimiters (§7.1).
fn expand_macro(body: String, cx: &MacroContext<'_>) -> Result<String, MacroError> {
    let mut chars = body.chars().peekable();

    let letter = chars.next().ok_or(MacroError::InvalidMacroSequence)?;

    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            digits.push(c);
            chars.next();
        } else {
            break;
        }
    }
    let keep_parts = match digits.as_str() {
        "" => None,
        s => match s.parse::<usize>() {
            Ok(0) | Err(_) => return Err(MacroError::InvalidTransformer),
            Ok(n) => Some(n),
        },
    };

    // ABNF string literals are case-insensitive, so the reverse flag may
    // be written either way.
    let mut reverse = false;
    if matches!(chars.peek(), Some('r' | 'R')) {
        chars.next();
        reverse = true;
    }

    let delimiters: Vec<char> = chars.collect();
    if !delimiters.iter().all(|c| DELIMITERS.contains(c)) {
        return Err(MacroError::InvalidTransformer);
    }

    let value = macro_letter_value(letter, cx)?;

    let value = transform(&value, keep_parts, reverse, &delimiters);

    // An uppercase macro letter requests URL-escaped output (§7.3).
    if letter.is_ascii_uppercase() {
        Ok(url_escape(&value))
    } else {
        Ok(value)
    }
}

fn macro_letter_value(letter: char, cx: &MacroContext<'_>) -> Result<String, MacroError> {
    match letter.to_ascii_lowercase() {
        's' => Ok(cx.sender()),
        'l' => Ok(cx.sender_local_part.into()),
        'o' => Ok(cx.sender_domain.into()),
        'd' => Ok(cx.domain.into()),
        'i' => Ok(client_ip_string(cx.client_ip)),
        'v' => Ok(match cx.client_ip {
            IpAddr::V4(_) => "in-addr".into(),
            IpAddr::V6(_) => "ip6".into(),
        }),
        c @ ('p' | 'h' | 'c' | 'r' | 't') => Err(MacroError::UnsupportedMacro(c)),
        _ => Err(MacroError::InvalidMacroSequence),
    }
}

fn transform(value: &str, keep_parts: Option<usize>, reverse: bool, delimiters: &[char]) -> String {
    let delimiters = if delimiters.is_empty() {
        &['.'][..]
    } else {
        delimiters
    };

    let mut parts: Vec<&str> = value.split(delimiters).collect();

    if reverse {
        parts.reverse();
    }

    if let Some(n) = keep_parts {
        if n < parts.len() {
            parts.drain(..parts.len() - n);
        }
    }

    parts.join(".")
}

// The 'i' macro: dotted-quad for IPv4, dot-separated lowercase nibbles for
// IPv6 (§7.3).
fn client_ip_string(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(addr) => addr.to_string(),
        IpAddr::V6(addr) => {
            const HEX: &[u8; 16] = b"0123456789abcdef";
            let mut s = String::with_capacity(63);
            for (i, byte) in addr.octets().iter().enumerate() {
                if i > 0 {
                    s.push('.');
                }
                s.push(HEX[usize::from(byte >> 4)] as char);
                s.push('.');
                s.push(HEX[usize::from(byte & 0xf)] as char);
            }
            s
        }
    }
}

// Percent-encode everything outside the RFC 3986 unreserved set.
fn url_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                escaped.push(byte as char);
            }
            _ => {
                escaped.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    escaped
}
