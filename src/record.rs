//! SPF record parsing.
//!
//! The parser implements the record grammar of RFC 7208, §4.6, §5 and §6.
//! It is a pure function of the record text: it performs no DNS lookups and
//! no macro expansion, both of which happen during evaluation.

use crate::domain::{DomainError, DomainName};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

/// The qualifier of a directive (RFC 7208, §4.6.2).
///
/// The qualifier determines how a matching mechanism affects the overall
/// result. When no qualifier is given, `Pass` is implied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Qualifier {
    #[default]
    Pass,
    Fail,
    SoftFail,
    Neutral,
}

impl Qualifier {
    fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Pass),
            '-' => Some(Self::Fail),
            '~' => Some(Self::SoftFail),
            '?' => Some(Self::Neutral),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Self::Pass => '+',
            Self::Fail => '-',
            Self::SoftFail => '~',
            Self::Neutral => '?',
        }
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// An IPv4 network in CIDR notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Network {
    addr: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Network {
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, RecordParseError> {
        if prefix_len > 32 {
            return Err(RecordParseError::CidrOutOfRange);
        }
        Ok(Self { addr, prefix_len })
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        ipv4_prefix_eq(self.addr, addr, self.prefix_len)
    }
}

impl Display for Ipv4Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

/// An IPv6 network in CIDR notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv6Network {
    addr: Ipv6Addr,
    prefix_len: u8,
}

impl Ipv6Network {
    pub fn new(addr: Ipv6Addr, prefix_len: u8) -> Result<Self, RecordParseError> {
        if prefix_len > 128 {
            return Err(RecordParseError::CidrOutOfRange);
        }
        Ok(Self { addr, prefix_len })
    }

    pub fn addr(&self) -> Ipv6Addr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn contains(&self, addr: Ipv6Addr) -> bool {
        ipv6_prefix_eq(self.addr, addr, self.prefix_len)
    }
}

impl Display for Ipv6Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

pub(crate) fn ipv4_prefix_eq(a: Ipv4Addr, b: Ipv4Addr, prefix_len: u8) -> bool {
    let mask = match prefix_len {
        0 => 0,
        n => u32::MAX << (32 - u32::from(n)),
    };
    (u32::from(a) ^ u32::from(b)) & mask == 0
}

pub(crate) fn ipv6_prefix_eq(a: Ipv6Addr, b: Ipv6Addr, prefix_len: u8) -> bool {
    let mask = match prefix_len {
        0 => 0,
        n => u128::MAX << (128 - u32::from(n)),
    };
    (u128::from(a) ^ u128::from(b)) & mask == 0
}

/// The dual CIDR lengths of the `a` and `mx` mechanisms (RFC 7208, §5.6).
///
/// Unset lengths default to /32 for IPv4 and /128 for IPv6.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DualCidrLength {
    pub v4: Option<u8>,
    pub v6: Option<u8>,
}

impl DualCidrLength {
    pub fn v4_or_default(&self) -> u8 {
        self.v4.unwrap_or(32)
    }

    pub fn v6_or_default(&self) -> u8 {
        self.v6.unwrap_or(128)
    }
}

/// A domain-spec: a domain name that may contain macro syntax (RFC 7208,
/// §7.1).
///
/// The text is kept exactly as written in the record; macro expansion is
/// deferred to evaluation, where the expansion context is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainSpec {
    text: Box<str>,
    has_macros: bool,
}

impl DomainSpec {
    pub(crate) fn new(s: &str) -> Self {
        Self {
            text: s.into(),
            has_macros: s.contains('%'),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn has_macros(&self) -> bool {
        self.has_macros
    }
}

impl Display for DomainSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// An SPF mechanism (RFC 7208, §5).
///
/// For the `a` and `mx` mechanisms an absent domain means ‘the current
/// domain’ at the point of evaluation, likewise for `ptr`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mechanism {
    All,
    Ip4(Ipv4Network),
    Ip6(Ipv6Network),
    A {
        domain: Option<DomainSpec>,
        cidr: DualCidrLength,
    },
    Mx {
        domain: Option<DomainSpec>,
        cidr: DualCidrLength,
    },
    Ptr {
        domain: Option<DomainSpec>,
    },
    Exists {
        domain: DomainSpec,
    },
    Include {
        domain: DomainSpec,
    },
}

impl Mechanism {
    pub fn name(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Ip4(_) => "ip4",
            Self::Ip6(_) => "ip6",
            Self::A { .. } => "a",
            Self::Mx { .. } => "mx",
            Self::Ptr { .. } => "ptr",
            Self::Exists { .. } => "exists",
            Self::Include { .. } => "include",
        }
    }
}

/// A qualifier–mechanism pair (RFC 7208 calls this a directive).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    pub qualifier: Qualifier,
    pub mechanism: Mechanism,
}

/// An unrecognised modifier.
///
/// §6: unrecognised modifiers must be ignored during evaluation; they are
/// preserved here untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownModifier {
    pub name: Box<str>,
    pub value: Box<str>,
}

/// A parsed SPF record.
///
/// Directive order is semantically significant: evaluation walks the
/// directives left to right and the first match wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    pub directives: Vec<Directive>,
    pub redirect: Option<DomainSpec>,
    pub explanation: Option<DomainSpec>,
    pub unknown_modifiers: Vec<UnknownModifier>,
}

/// An error that occurs when parsing an SPF record.
///
/// Any of these constitutes a permanent error during evaluation: the
/// published policy itself is defective (RFC 7208, §4.6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordParseError {
    MissingVersion,
    NoTerms,
    UnknownTerm(Box<str>),
    InvalidIpNetwork,
    InvalidCidrLength,
    CidrOutOfRange,
    EmptyDomainSpec,
    InvalidDomain(DomainError),
    EmptyModifierValue,
    DuplicateRedirectModifier,
    DuplicateExpModifier,
}

impl Display for RecordParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVersion => write!(f, "missing v=spf1 version tag"),
            Self::NoTerms => write!(f, "record contains no terms"),
            Self::UnknownTerm(term) => write!(f, "unrecognised term \"{term}\""),
            Self::InvalidIpNetwork => write!(f, "invalid IP network"),
            Self::InvalidCidrLength => write!(f, "invalid CIDR length"),
            Self::CidrOutOfRange => write!(f, "CIDR length out of range"),
            Self::EmptyDomainSpec => write!(f, "empty domain-spec"),
            Self::InvalidDomain(error) => error.fmt(f),
            Self::EmptyModifierValue => write!(f, "modifier missing value"),
            Self::DuplicateRedirectModifier => write!(f, "duplicate redirect modifier"),
            Self::DuplicateExpModifier => write!(f, "duplicate exp modifier"),
        }
    }
}

impl Error for RecordParseError {}

impl FromStr for Record {
    type Err = RecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let terms = tokenize(s)?;

        let mut record = Record::default();

        for term in terms {
            // Try modifier syntax first; a term whose left-hand side is not
            // a modifier name falls through to mechanism parsing. (A '=' can
            // legitimately appear in a mechanism as a macro delimiter.)
            match term.split_once('=').filter(|(name, _)| is_modifier_name(name)) {
                Some((name, value)) => record.apply_modifier(name, value)?,
                None => record.directives.push(parse_directive(term)?),
            }
        }

        Ok(record)
    }
}

impl Record {
    fn apply_modifier(&mut self, name: &str, value: &str) -> Result<(), RecordParseError> {
        if value.is_empty() {
            return Err(RecordParseError::EmptyModifierValue);
        }

        // §6.1: redirect and exp must not appear more than once. Their
        // macro-free values can be checked right away; macro-bearing values
        // are checked after expansion during evaluation.
        if name.eq_ignore_ascii_case("redirect") {
            if self.redirect.is_some() {
                return Err(RecordParseError::DuplicateRedirectModifier);
            }
            let spec = DomainSpec::new(value);
            validate_literal_domain(&spec)?;
            self.redirect = Some(spec);
        } else if name.eq_ignore_ascii_case("exp") {
            if self.explanation.is_some() {
                return Err(RecordParseError::DuplicateExpModifier);
            }
            let spec = DomainSpec::new(value);
            validate_literal_domain(&spec)?;
            self.explanation = Some(spec);
        } else {
            self.unknown_modifiers.push(UnknownModifier {
                name: name.to_ascii_lowercase().into(),
                value: value.into(),
            });
        }

        Ok(())
    }
}

fn tokenize(s: &str) -> Result<Vec<&str>, RecordParseError> {
    let mut fields = s.split_ascii_whitespace();

    match fields.next() {
        Some(version) if version.eq_ignore_ascii_case("v=spf1") => {}
        _ => return Err(RecordParseError::MissingVersion),
    }

    let terms: Vec<_> = fields.collect();

    if terms.is_empty() {
        return Err(RecordParseError::NoTerms);
    }

    Ok(terms)
}

// modifier name per §6: ALPHA *( ALPHA / DIGIT / "-" / "_" / "." )
fn is_modifier_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn parse_directive(term: &str) -> Result<Directive, RecordParseError> {
    let (qualifier, rest) = strip_qualifier(term);

    match parse_mechanism(rest) {
        Some(result) => result.map(|mechanism| Directive {
            qualifier,
            mechanism,
        }),
        None => Err(RecordParseError::UnknownTerm(term.into())),
    }
}

fn strip_qualifier(term: &str) -> (Qualifier, &str) {
    let mut chars = term.chars();
    match chars.next().and_then(Qualifier::from_symbol) {
        Some(qualifier) => (qualifier, chars.as_str()),
        None => (Qualifier::default(), term),
    }
}

type MechanismParser = fn(&str) -> Option<Result<Mechanism, RecordParseError>>;

// Ordered list of mechanism grammars, most specific name first. Each parser
// returns `None` when the term is not its mechanism at all, and
// `Some(Err(_))` when the term names its mechanism but the argument is
// ill-formed.
const MECHANISM_PARSERS: &[MechanismParser] = &[
    parse_all,
    parse_ip4,
    parse_ip6,
    parse_a,
    parse_mx,
    parse_ptr,
    parse_exists,
    parse_include,
];

fn parse_mechanism(term: &str) -> Option<Result<Mechanism, RecordParseError>> {
    MECHANISM_PARSERS.iter().find_map(|parse| parse(term))
}

fn strip_mechanism_name<'a>(term: &'a str, name: &str) -> Option<&'a str> {
    let head = term.get(..name.len())?;
    if head.eq_ignore_ascii_case(name) {
        Some(&term[name.len()..])
    } else {
        None
    }
}

fn parse_all(term: &str) -> Option<Result<Mechanism, RecordParseError>> {
    if term.eq_ignore_ascii_case("all") {
        Some(Ok(Mechanism::All))
    } else {
        None
    }
}

fn parse_ip4(term: &str) -> Option<Result<Mechanism, RecordParseError>> {
    let arg = strip_mechanism_name(term, "ip4:")?;
    Some(parse_ipv4_network(arg).map(Mechanism::Ip4))
}

fn parse_ip6(term: &str) -> Option<Result<Mechanism, RecordParseError>> {
    let arg = strip_mechanism_name(term, "ip6:")?;
    Some(parse_ipv6_network(arg).map(Mechanism::Ip6))
}

// §5.6: without a slash, a single host address is meant (/32 resp. /128).
fn parse_ipv4_network(arg: &str) -> Result<Ipv4Network, RecordParseError> {
    let (addr, prefix_len) = match arg.split_once('/') {
        Some((addr, len)) => (addr, parse_prefix_len(len, 32)?),
        None => (arg, 32),
    };
    let addr = Ipv4Addr::from_str(addr).map_err(|_| RecordParseError::InvalidIpNetwork)?;
    Ipv4Network::new(addr, prefix_len)
}

fn parse_ipv6_network(arg: &str) -> Result<Ipv6Network, RecordParseError> {
    let (addr, prefix_len) = match arg.split_once('/') {
        Some((addr, len)) => (addr, parse_prefix_len(len, 128)?),
        None => (arg, 128),
    };
    let addr = Ipv6Addr::from_str(addr).map_err(|_| RecordParseError::InvalidIpNetwork)?;
    Ipv6Network::new(addr, prefix_len)
}

fn parse_prefix_len(s: &str, max: u8) -> Result<u8, RecordParseError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RecordParseError::InvalidCidrLength);
    }
    let n: u8 = s.parse().map_err(|_| RecordParseError::CidrOutOfRange)?;
    if n > max {
        return Err(RecordParseError::CidrOutOfRange);
    }
    Ok(n)
}

fn parse_a(term: &str) -> Option<Result<Mechanism, RecordParseError>> {
    let spec = strip_mechanism_name(term, "a")?;
    let parsed = parse_domain_cidr_spec(spec)?;
    Some(parsed.map(|(domain, cidr)| Mechanism::A { domain, cidr }))
}

fn parse_mx(term: &str) -> Option<Result<Mechanism, RecordParseError>> {
    let spec = strip_mechanism_name(term, "mx")?;
    let parsed = parse_domain_cidr_spec(spec)?;
    Some(parsed.map(|(domain, cidr)| Mechanism::Mx { domain, cidr }))
}

// Shared grammar of the `a` and `mx` mechanisms (RFC 7208, §5.3, §5.4):
//
//   a                      current domain, default lengths
//   a/24                   current domain, IPv4 length 24
//   a/24/64                current domain, IPv4 length 24, IPv6 length 64
//   a:mail.example         explicit domain, default lengths
//   a:mail.example/24/64
//
// Returns `None` when the remainder cannot belong to this mechanism (so
// that e.g. `abc` is not claimed by `a`).
fn parse_domain_cidr_spec(
    spec: &str,
) -> Option<Result<(Option<DomainSpec>, DualCidrLength), RecordParseError>> {
    if spec.is_empty() {
        return Some(Ok((None, DualCidrLength::default())));
    }

    if let Some(lengths) = spec.strip_prefix('/') {
        return Some(parse_dual_cidr_length(lengths).map(|cidr| (None, cidr)));
    }

    let spec = spec.strip_prefix(':')?;

    Some(parse_explicit_domain_cidr(spec))
}

fn parse_explicit_domain_cidr(
    spec: &str,
) -> Result<(Option<DomainSpec>, DualCidrLength), RecordParseError> {
    let (domain, cidr) = match spec.split_once('/') {
        Some((domain, lengths)) => (domain, parse_dual_cidr_length(lengths)?),
        None => (spec, DualCidrLength::default()),
    };

    if domain.is_empty() {
        return Err(RecordParseError::EmptyDomainSpec);
    }

    let domain = DomainSpec::new(domain);
    validate_literal_domain(&domain)?;

    Ok((Some(domain), cidr))
}

fn parse_dual_cidr_length(lengths: &str) -> Result<DualCidrLength, RecordParseError> {
    match lengths.split_once('/') {
        None => Ok(DualCidrLength {
            v4: Some(parse_prefix_len(lengths, 32)?),
            v6: None,
        }),
        Some((v4, v6)) => {
            if v6.contains('/') {
                // more than two length segments
                return Err(RecordParseError::InvalidCidrLength);
            }
            Ok(DualCidrLength {
                v4: Some(parse_prefix_len(v4, 32)?),
                v6: Some(parse_prefix_len(v6, 128)?),
            })
        }
    }
}

fn parse_ptr(term: &str) -> Option<Result<Mechanism, RecordParseError>> {
    let spec = strip_mechanism_name(term, "ptr")?;

    if spec.is_empty() {
        return Some(Ok(Mechanism::Ptr { domain: None }));
    }

    let spec = spec.strip_prefix(':')?;

    if spec.is_empty() {
        return Some(Err(RecordParseError::EmptyDomainSpec));
    }

    // The domain-spec may contain macros and is therefore kept raw; it is
    // validated after expansion during evaluation.
    Some(Ok(Mechanism::Ptr {
        domain: Some(DomainSpec::new(spec)),
    }))
}

fn parse_exists(term: &str) -> Option<Result<Mechanism, RecordParseError>> {
    let spec = strip_mechanism_name(term, "exists:")?;

    if spec.is_empty() {
        return Some(Err(RecordParseError::EmptyDomainSpec));
    }

    Some(Ok(Mechanism::Exists {
        domain: DomainSpec::new(spec),
    }))
}

fn parse_include(term: &str) -> Option<Result<Mechanism, RecordParseError>> {
    let spec = strip_mechanism_name(term, "include:")?;

    if spec.is_empty() {
        return Some(Err(RecordParseError::EmptyDomainSpec));
    }

    Some(Ok(Mechanism::Include {
        domain: DomainSpec::new(spec),
    }))
}

fn validate_literal_domain(spec: &DomainSpec) -> Result<(), RecordParseError> {
    if !spec.has_macros() {
        DomainName::new(spec.as_str()).map_err(RecordParseError::InvalidDomain)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Record {
        s.parse().unwrap()
    }

    #[test]
    fn record_minimal_all() {
        let record = parse("v=spf1 all");

        assert_eq!(
            record.directives,
            [Directive {
                qualifier: Qualifier::Pass,
                mechanism: Mechanism::All,
            }]
        );
        assert_eq!(record.redirect, None);
        assert_eq!(record.explanation, None);
        assert!(record.unknown_modifiers.is_empty());
    }

    #[test]
    fn record_parse_is_pure() {
        let s = "v=spf1 ip4:203.0.113.0/24 include:spf.example.com ~all exp=e.example.com";
        assert_eq!(parse(s), parse(s));
    }

    #[test]
    fn record_qualifiers() {
        let record = parse("v=spf1 +all -all ~all ?all all");

        let qualifiers: Vec<_> = record.directives.iter().map(|d| d.qualifier).collect();

        assert_eq!(
            qualifiers,
            [
                Qualifier::Pass,
                Qualifier::Fail,
                Qualifier::SoftFail,
                Qualifier::Neutral,
                Qualifier::Pass,
            ]
        );
    }

    #[test]
    fn record_version_tag() {
        assert_eq!("-all".parse::<Record>(), Err(RecordParseError::MissingVersion));
        assert_eq!(
            "v=spf10 -all".parse::<Record>(),
            Err(RecordParseError::MissingVersion)
        );
        assert_eq!("v=spf1".parse::<Record>(), Err(RecordParseError::NoTerms));
        assert_eq!("v=spf1   ".parse::<Record>(), Err(RecordParseError::NoTerms));

        // case-insensitive version tag, whitespace of any stripe
        assert!("  V=SPF1 \t ip4:203.0.113.0/24 \r\n -all ".parse::<Record>().is_ok());
    }

    #[test]
    fn record_ip4_default_prefix_len() {
        assert_eq!(
            parse("v=spf1 ip4:203.0.113.23 -all"),
            parse("v=spf1 ip4:203.0.113.23/32 -all")
        );
    }

    #[test]
    fn record_ip4_network() {
        let record = parse("v=spf1 ip4:203.0.113.0/24 -all");

        assert_eq!(
            record.directives[0].mechanism,
            Mechanism::Ip4(Ipv4Network::new("203.0.113.0".parse().unwrap(), 24).unwrap())
        );
    }

    #[test]
    fn record_ip4_errors() {
        assert_eq!(
            "v=spf1 ip4:203.0.113.0/99 -all".parse::<Record>(),
            Err(RecordParseError::CidrOutOfRange)
        );
        assert_eq!(
            "v=spf1 ip4:banana -all".parse::<Record>(),
            Err(RecordParseError::InvalidIpNetwork)
        );
        assert_eq!(
            "v=spf1 ip4:2001:db8::1 -all".parse::<Record>(),
            Err(RecordParseError::InvalidIpNetwork)
        );
        assert_eq!(
            "v=spf1 ip4:203.0.113.0/ -all".parse::<Record>(),
            Err(RecordParseError::InvalidCidrLength)
        );
    }

    #[test]
    fn record_ip6_network() {
        let record = parse("v=spf1 ip6:2001:db8::/32 all");

        assert_eq!(
            record.directives[0].mechanism,
            Mechanism::Ip6(Ipv6Network::new("2001:db8::".parse().unwrap(), 32).unwrap())
        );

        assert_eq!(
            "v=spf1 ip6:2001:db8::/129".parse::<Record>(),
            Err(RecordParseError::CidrOutOfRange)
        );
        assert_eq!(
            "v=spf1 ip6:203.0.113.1".parse::<Record>(),
            Err(RecordParseError::InvalidIpNetwork)
        );
    }

    #[test]
    fn record_a_mechanism_forms() {
        let record = parse("v=spf1 a a/24 a/24/64 a:mail.example.com a:mail.example.com/24/64 -all");

        let mechanisms: Vec<_> = record.directives.iter().map(|d| &d.mechanism).collect();

        assert_eq!(
            mechanisms[0],
            &Mechanism::A {
                domain: None,
                cidr: DualCidrLength::default(),
            }
        );
        assert_eq!(
            mechanisms[1],
            &Mechanism::A {
                domain: None,
                cidr: DualCidrLength { v4: Some(24), v6: None },
            }
        );
        assert_eq!(
            mechanisms[2],
            &Mechanism::A {
                domain: None,
                cidr: DualCidrLength { v4: Some(24), v6: Some(64) },
            }
        );
        assert_eq!(
            mechanisms[3],
            &Mechanism::A {
                domain: Some(DomainSpec::new("mail.example.com")),
                cidr: DualCidrLength::default(),
            }
        );
        assert_eq!(
            mechanisms[4],
            &Mechanism::A {
                domain: Some(DomainSpec::new("mail.example.com")),
                cidr: DualCidrLength { v4: Some(24), v6: Some(64) },
            }
        );
    }

    #[test]
    fn record_a_mechanism_errors() {
        // `abc` is not an `a` mechanism, nor anything else
        assert_eq!(
            "v=spf1 abc".parse::<Record>(),
            Err(RecordParseError::UnknownTerm("abc".into()))
        );
        assert_eq!(
            "v=spf1 a/24/64/128".parse::<Record>(),
            Err(RecordParseError::InvalidCidrLength)
        );
        assert_eq!(
            "v=spf1 a:local!host.example.com".parse::<Record>(),
            Err(RecordParseError::InvalidDomain(DomainError::IdnaConversion))
        );
    }

    #[test]
    fn record_mx_mechanism() {
        let record = parse("v=spf1 mx mx:example.org/24 -all");

        assert_eq!(
            record.directives[0].mechanism,
            Mechanism::Mx {
                domain: None,
                cidr: DualCidrLength::default(),
            }
        );
        assert_eq!(
            record.directives[1].mechanism,
            Mechanism::Mx {
                domain: Some(DomainSpec::new("example.org")),
                cidr: DualCidrLength { v4: Some(24), v6: None },
            }
        );
    }

    #[test]
    fn record_ptr_mechanism() {
        let record = parse("v=spf1 ptr ptr:%{d}.example.com -all");

        assert_eq!(record.directives[0].mechanism, Mechanism::Ptr { domain: None });

        match &record.directives[1].mechanism {
            Mechanism::Ptr { domain: Some(spec) } => {
                assert_eq!(spec.as_str(), "%{d}.example.com");
                assert!(spec.has_macros());
            }
            mechanism => panic!("unexpected mechanism {mechanism:?}"),
        }
    }

    #[test]
    fn record_exists_mechanism() {
        let record = parse("v=spf1 exists:%{ir}.sbl.example.org -all");

        match &record.directives[0].mechanism {
            Mechanism::Exists { domain } => {
                assert_eq!(domain.as_str(), "%{ir}.sbl.example.org");
                assert!(domain.has_macros());
            }
            mechanism => panic!("unexpected mechanism {mechanism:?}"),
        }

        assert_eq!(
            "v=spf1 exists:".parse::<Record>(),
            Err(RecordParseError::EmptyDomainSpec)
        );
        assert_eq!(
            "v=spf1 exists".parse::<Record>(),
            Err(RecordParseError::UnknownTerm("exists".into()))
        );
    }

    #[test]
    fn record_include_mechanism() {
        let record = parse("v=spf1 include:spf.example.com -all");

        assert_eq!(
            record.directives[0].mechanism,
            Mechanism::Include {
                domain: DomainSpec::new("spf.example.com"),
            }
        );

        assert_eq!(
            "v=spf1 include:".parse::<Record>(),
            Err(RecordParseError::EmptyDomainSpec)
        );
    }

    #[test]
    fn record_redirect_modifier() {
        let record = parse("v=spf1 mx redirect=other.example.com");

        assert_eq!(record.redirect, Some(DomainSpec::new("other.example.com")));

        assert_eq!(
            "v=spf1 redirect=a.example.com redirect=b.example.com".parse::<Record>(),
            Err(RecordParseError::DuplicateRedirectModifier)
        );
        assert_eq!(
            "v=spf1 all redirect=".parse::<Record>(),
            Err(RecordParseError::EmptyModifierValue)
        );
        assert_eq!(
            "v=spf1 all redirect=localhost".parse::<Record>(),
            Err(RecordParseError::InvalidDomain(DomainError::SingleLabel))
        );
    }

    #[test]
    fn record_exp_modifier() {
        let record = parse("v=spf1 -all exp=explain._spf.%{d}");

        let explanation = record.explanation.unwrap();
        assert_eq!(explanation.as_str(), "explain._spf.%{d}");
        assert!(explanation.has_macros());

        assert_eq!(
            "v=spf1 exp=a.example.com exp=b.example.com -all".parse::<Record>(),
            Err(RecordParseError::DuplicateExpModifier)
        );
    }

    #[test]
    fn record_unknown_modifiers_preserved() {
        let record = parse("v=spf1 mx Custom-Tag=some%20value -all");

        assert_eq!(
            record.unknown_modifiers,
            [UnknownModifier {
                name: "custom-tag".into(),
                value: "some%20value".into(),
            }]
        );
    }

    #[test]
    fn record_macro_delimiter_not_a_modifier() {
        // '=' here is a macro delimiter, not a modifier assignment
        let record = parse("v=spf1 include:%{s=}.example.com -all");

        assert_eq!(record.directives.len(), 2);
        assert!(record.unknown_modifiers.is_empty());
    }

    #[test]
    fn ipv4_network_contains() {
        let network = Ipv4Network::new("203.0.113.0".parse().unwrap(), 24).unwrap();

        assert!(network.contains("203.0.113.5".parse().unwrap()));
        assert!(!network.contains("203.0.114.5".parse().unwrap()));

        let any = Ipv4Network::new("0.0.0.0".parse().unwrap(), 0).unwrap();
        assert!(any.contains("198.51.100.1".parse().unwrap()));
    }

    #[test]
    fn ipv6_network_contains() {
        let network = Ipv6Network::new("2001:db8::".parse().unwrap(), 32).unwrap();

        assert!(network.contains("2001:db8::1".parse().unwrap()));
        assert!(!network.contains("2001:db9::1".parse().unwrap()));
    }
}
