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

//! Evaluation of SPF policies: the `check_host` procedure.

mod eval;
mod lookup;
mod query;

pub use lookup::Lookup;

use crate::{
    domain::DomainError,
    macros::MacroError,
    record::RecordParseError,
    util::CanonicalStr,
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io,
    net::IpAddr,
    time::Duration,
};

/// Configuration of the evaluation process.
///
/// `Config` implements `Default`, with defaults matching the limits
/// recommended in RFC 7208, §4.6.4.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// The maximum number of DNS-querying mechanisms and modifiers allowed
    /// during an evaluation. Exceeding this limit yields result `permerror`.
    pub max_lookups: usize,

    /// The maximum number of DNS lookups allowed to return an empty answer
    /// during an evaluation. Exceeding this limit yields result `permerror`.
    pub max_void_lookups: usize,

    /// The timeout applied to each individual DNS query. An elapsed timeout
    /// is treated as a temporary DNS failure.
    pub lookup_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_lookups: 10,
            max_void_lookups: 2,
            lookup_timeout: Duration::from_secs(10),
        }
    }
}

/// The result of evaluating an SPF policy (RFC 7208, §2.6).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SpfResult {
    /// No SPF record could be obtained for the domain, or the domain was not
    /// usable in the first place.
    None,

    /// The domain makes no definite assertion about the client.
    Neutral,

    /// The client is authorised to send mail on behalf of the domain.
    Pass,

    /// The client is not authorised to send mail on behalf of the domain.
    Fail,

    /// The domain believes the client is not authorised, but is not willing
    /// to make a strong assertion.
    SoftFail,

    /// A transient error, usually in DNS, prevented evaluation. Trying again
    /// later may yield a definite result.
    TempError,

    /// The domain’s published policy could not be correctly interpreted.
    PermError,
}

impl CanonicalStr for SpfResult {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Neutral => "neutral",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::SoftFail => "softfail",
            Self::TempError => "temperror",
            Self::PermError => "permerror",
        }
    }
}

impl Display for SpfResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

/// The circumstance that led to an indefinite or erroneous result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorCause {
    /// The domain given to `check_host` is not a usable domain name.
    Domain(DomainError),
    /// The domain publishes no SPF record, or does not exist.
    NoRecord,
    /// The domain publishes more than one SPF record.
    MultipleRecords,
    /// The SPF record could not be parsed.
    RecordSyntax(RecordParseError),
    /// A macro string in the record could not be expanded.
    Macro(MacroError),
    /// The evaluation exceeded the DNS lookup limit.
    LookupLimitExceeded,
    /// The evaluation exceeded the void lookup limit.
    VoidLookupLimitExceeded,
    /// The evaluation recursed too deeply.
    RecursionLimitExceeded,
    /// An `include`d policy evaluated to a result that cannot be used.
    UnusableIncludePolicy,
    /// A `redirect`ed-to policy evaluated to a result that cannot be used.
    UnusableRedirectPolicy,
    /// A DNS failure.
    Dns(Box<str>),
}

impl Display for ErrorCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(error) => write!(f, "invalid domain: {error}"),
            Self::NoRecord => write!(f, "no SPF record published"),
            Self::MultipleRecords => write!(f, "multiple SPF records published"),
            Self::RecordSyntax(error) => write!(f, "invalid SPF record: {error}"),
            Self::Macro(error) => write!(f, "macro expansion failed: {error}"),
            Self::LookupLimitExceeded => write!(f, "DNS lookup limit exceeded"),
            Self::VoidLookupLimitExceeded => write!(f, "void DNS lookup limit exceeded"),
            Self::RecursionLimitExceeded => write!(f, "evaluation recursed too deeply"),
            Self::UnusableIncludePolicy => write!(f, "included policy not usable"),
            Self::UnusableRedirectPolicy => write!(f, "redirected-to policy not usable"),
            Self::Dns(msg) => write!(f, "DNS failure: {msg}"),
        }
    }
}

impl Error for ErrorCause {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Domain(error) => Some(error),
            Self::RecordSyntax(error) => Some(error),
            Self::Macro(error) => Some(error),
            _ => None,
        }
    }
}

/// The complete result of a `check_host` query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryResult {
    /// The SPF result.
    pub spf_result: SpfResult,

    /// For an indefinite or erroneous result, the circumstance that caused
    /// it.
    pub cause: Option<ErrorCause>,

    /// For result [`Fail`][SpfResult::Fail], the explanation string obtained
    /// via the `exp` modifier, if any.
    pub explanation: Option<String>,
}

/// Evaluates the SPF policy of `domain` for the given client.
///
/// This is the *check_host* function of RFC 7208, §4: it looks up and parses
/// the SPF record published at `domain`, then evaluates the record’s
/// mechanisms against `client_ip` and `sender` to arrive at an authorisation
/// result.
///
/// `sender` is the envelope sender (MAIL FROM or HELO identity). An empty
/// sender or a sender without a local part is substituted with the
/// local-part `postmaster` (§4.3).
///
/// An error is returned only when a DNS lookup fails with
/// [`ErrorKind::Interrupted`][io::ErrorKind::Interrupted]; every other
/// failure mode is captured in the returned [`QueryResult`].
///
/// # Examples
///
/// ```
/// # use std::{future::Future, io::{self, ErrorKind}, net::{IpAddr, Ipv4Addr, Ipv6Addr}, pin::Pin};
/// # use viaspf::{check_host, Config, Lookup, SpfResult};
/// #
/// # struct MockLookup;
/// #
/// # impl Lookup for MockLookup {
/// #     type Query<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>
/// #     where
/// #         Self: 'a,
/// #         T: 'a;
/// #
/// #     fn lookup_txt(&self, _domain: &str) -> Self::Query<'_, Vec<String>> {
/// #         Box::pin(std::future::ready(Ok(vec![
/// #             "v=spf1 ip4:203.0.113.0/24 -all".into(),
/// #         ])))
/// #     }
/// #     fn lookup_a(&self, _domain: &str) -> Self::Query<'_, Vec<Ipv4Addr>> {
/// #         Box::pin(std::future::ready(Err(ErrorKind::NotFound.into())))
/// #     }
/// #     fn lookup_aaaa(&self, _domain: &str) -> Self::Query<'_, Vec<Ipv6Addr>> {
/// #         Box::pin(std::future::ready(Err(ErrorKind::NotFound.into())))
/// #     }
/// #     fn lookup_mx(&self, _domain: &str) -> Self::Query<'_, Vec<String>> {
/// #         Box::pin(std::future::ready(Err(ErrorKind::NotFound.into())))
/// #     }
/// #     fn lookup_ptr(&self, _ip: IpAddr) -> Self::Query<'_, Vec<String>> {
/// #         Box::pin(std::future::ready(Err(ErrorKind::NotFound.into())))
/// #     }
/// # }
/// #
/// # tokio::runtime::Builder::new_current_thread()
/// #     .enable_time()
/// #     .build()
/// #     .unwrap()
/// #     .block_on(async {
/// let resolver = MockLookup;
/// let config = Config::default();
/// let client_ip: IpAddr = "203.0.113.5".parse()?;
///
/// let result = check_host(
///     &resolver,
///     &config,
///     client_ip,
///     "example.com",
///     "amy@example.com",
/// )
/// .await?;
///
/// assert_eq!(result.spf_result, SpfResult::Pass);
/// # Ok::<_, Box<dyn std::error::Error>>(())
/// # })
/// # .unwrap();
/// ```
pub async fn check_host<T: Lookup>(
    resolver: &T,
    config: &Config,
    client_ip: IpAddr,
    domain: &str,
    sender: &str,
) -> io::Result<QueryResult> {
    eval::check_host(resolver, config, client_ip, domain, sender).await
}
