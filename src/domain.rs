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

//! Domain name validation.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// An error that occurs when validating a domain name.
///
/// Each variant corresponds to one of the pre-evaluation syntax checks in
/// RFC 7208, §4.3. Note that `IdnaConversion` covers all failures of the
/// IDNA transform itself, such as disallowed characters or malformed hyphen
/// placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DomainError {
    SingleLabel,
    EmptyLabel,
    LabelTooLong,
    DomainTooLong,
    IdnaConversion,
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleLabel => write!(f, "domain must have at least two labels"),
            Self::EmptyLabel => write!(f, "domain has empty label"),
            Self::LabelTooLong => write!(f, "domain label exceeds 63 octets"),
            Self::DomainTooLong => write!(f, "domain exceeds 255 octets"),
            Self::IdnaConversion => write!(f, "IDNA conversion to ASCII failed"),
        }
    }
}

impl Error for DomainError {}

/// A validated domain name in normalised, A-label (ASCII) form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainName {
    name: String,
}

impl DomainName {
    /// Normalises and validates a raw domain name (RFC 7208, §4.3).
    ///
    /// Validation proceeds in the following steps. Surrounding whitespace and
    /// at most one trailing dot are removed (domains are implicitly
    /// absolute). The name is converted to its lower-case A-label form per
    /// RFC 5890. Finally, the SPF pre-evaluation checks are applied: the
    /// overall length must not exceed 255 octets, the domain must consist of
    /// at least two labels, and every label must be 1–63 octets long.
    pub fn new(s: &str) -> Result<Self, DomainError> {
        let s = s.trim();
        let s = s.strip_suffix('.').unwrap_or(s);

        let name = idna::domain_to_ascii(s).map_err(|_| DomainError::IdnaConversion)?;

        if name.len() > 255 {
            return Err(DomainError::DomainTooLong);
        }

        let labels: Vec<&str> = name.split('.').collect();

        if labels.len() < 2 {
            return Err(DomainError::SingleLabel);
        }

        for label in labels {
            match label.len() {
                0 => return Err(DomainError::EmptyLabel),
                1..=63 => {}
                _ => return Err(DomainError::LabelTooLong),
            }

            // The IDNA mapping is applied in its lenient form, which lets
            // STD3-disallowed ASCII through. Restrict labels to letters,
            // digits, hyphen, and underscore (underscore labels such as
            // `_spf` are common in published records).
            if !label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
            {
                return Err(DomainError::IdnaConversion);
            }
        }

        Ok(Self { name })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Returns true if this domain equals the given domain or is a proper
    /// subdomain of it.
    pub fn eq_or_subdomain_of(&self, other: &DomainName) -> bool {
        let name = &self.name;
        let other = &other.name;

        if name.eq_ignore_ascii_case(other) {
            return true;
        }

        name.len() > other.len() && {
            let len = name.len() - other.len();
            matches!(name.get(len..), Some(s) if s.eq_ignore_ascii_case(other))
                && matches!(name.get(..len), Some(s) if s.ends_with('.'))
        }
    }
}

impl Display for DomainName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.name.fmt(f)
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_name_ok() {
        assert_eq!(DomainName::new("example.com").unwrap().as_str(), "example.com");
        assert_eq!(DomainName::new("EXAMPLE.Com").unwrap().as_str(), "example.com");
        assert_eq!(DomainName::new("example.com.").unwrap().as_str(), "example.com");
        assert_eq!(DomainName::new("  mail.example.com ").unwrap().as_str(), "mail.example.com");
        assert_eq!(DomainName::new("_spf.example.com").unwrap().as_str(), "_spf.example.com");
    }

    #[test]
    fn domain_name_idn() {
        assert_eq!(
            DomainName::new("example.中国").unwrap().as_str(),
            "example.xn--fiqs8s"
        );
    }

    #[test]
    fn domain_name_single_label() {
        assert_eq!(DomainName::new("localhost"), Err(DomainError::SingleLabel));
        assert_eq!(DomainName::new("com."), Err(DomainError::SingleLabel));
    }

    #[test]
    fn domain_name_empty_label() {
        assert_eq!(DomainName::new("a..example.com"), Err(DomainError::EmptyLabel));
    }

    #[test]
    fn domain_name_label_too_long() {
        let label = "x".repeat(64);
        assert_eq!(
            DomainName::new(&format!("{label}.example.com")),
            Err(DomainError::LabelTooLong)
        );
    }

    #[test]
    fn domain_name_too_long() {
        let label = "x".repeat(60);
        let domain = [label.as_str(); 5].join(".");
        assert!(domain.len() > 255);
        assert_eq!(DomainName::new(&domain), Err(DomainError::DomainTooLong));
    }

    #[test]
    fn domain_name_disallowed_characters() {
        assert_eq!(DomainName::new("exa mple.com"), Err(DomainError::IdnaConversion));
        assert_eq!(DomainName::new("exam\u{0}ple.com"), Err(DomainError::IdnaConversion));
    }

    #[test]
    fn eq_or_subdomain_of_ok() {
        let base = DomainName::new("example.com").unwrap();

        assert!(DomainName::new("example.com").unwrap().eq_or_subdomain_of(&base));
        assert!(DomainName::new("mail.example.com").unwrap().eq_or_subdomain_of(&base));
        assert!(!DomainName::new("mailexample.com").unwrap().eq_or_subdomain_of(&base));
        assert!(!DomainName::new("example.org").unwrap().eq_or_subdomain_of(&base));
    }
}
