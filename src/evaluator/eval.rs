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

use crate::{
    domain::DomainName,
    evaluator::{
        lookup::Lookup,
        query::{self, RecordLookupError},
        Config, ErrorCause, QueryResult, SpfResult,
    },
    macros::{self, MacroContext},
    record::{
        ipv4_prefix_eq, ipv6_prefix_eq, DomainSpec, DualCidrLength, Mechanism, Qualifier, Record,
    },
};
use std::{
    future::Future,
    io::{self, ErrorKind},
    net::IpAddr,
    pin::Pin,
    time::Duration,
};
use tokio::time;
use tracing::{debug, trace};

// Hard ceiling on include/redirect nesting. The lookup limit already bounds
// recursion when left at its default; this guards against generous
// configurations.
const MAX_EVALUATION_DEPTH: usize = 20;

// §4.6.4: at most 10 MX hosts resolved per mx mechanism, and at most 10 PTR
// names inspected per ptr mechanism.
const MAX_MX_HOSTS: usize = 10;
const MAX_PTR_NAMES: usize = 10;

/// Aborts the evaluation of the entire `check_host` invocation, across
/// include and redirect recursion.
enum Abort {
    Io(io::Error),
    TempError(ErrorCause),
    PermError(ErrorCause),
}

/// A definite evaluation outcome. Only `none`, `neutral`, `pass`, `fail` and
/// `softfail` flow through here; the error results travel as [`Abort`].
struct Output {
    result: SpfResult,
    cause: Option<ErrorCause>,
    explanation: Option<String>,
}

impl Output {
    fn none(cause: Option<ErrorCause>) -> Self {
        Self {
            result: SpfResult::None,
            cause,
            explanation: None,
        }
    }
}

pub(crate) async fn check_host<T: Lookup>(
    resolver: &T,
    config: &Config,
    client_ip: IpAddr,
    domain: &str,
    sender: &str,
) -> io::Result<QueryResult> {
    debug!(%client_ip, domain, sender, "checking host authorisation");

    let domain = match DomainName::new(domain) {
        Ok(domain) => domain,
        Err(error) => {
            return Ok(QueryResult {
                spf_result: SpfResult::None,
                cause: Some(ErrorCause::Domain(error)),
                explanation: None,
            });
        }
    };

    let client_ip = canonical_client_ip(client_ip);
    let (sender_local_part, sender_domain) = split_sender(sender, domain.as_str());

    let mut evaluator = Evaluator {
        resolver,
        config,
        client_ip,
        sender_local_part,
        sender_domain,
        lookups: 0,
        void_lookups: 0,
        depth: 0,
    };

    let result = match evaluator.check_domain(domain).await {
        Ok(output) => QueryResult {
            spf_result: output.result,
            cause: output.cause,
            explanation: output.explanation,
        },
        Err(Abort::Io(error)) => return Err(error),
        Err(Abort::TempError(cause)) => QueryResult {
            spf_result: SpfResult::TempError,
            cause: Some(cause),
            explanation: None,
        },
        Err(Abort::PermError(cause)) => QueryResult {
            spf_result: SpfResult::PermError,
            cause: Some(cause),
            explanation: None,
        },
    };

    debug!(result = %result.spf_result, "evaluation done");

    Ok(result)
}

// An IPv4-mapped IPv6 client address is an IPv4 client (§4.3).
fn canonical_client_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(addr) => match addr.to_ipv4_mapped() {
            Some(addr) => IpAddr::V4(addr),
            None => ip,
        },
        ip => ip,
    }
}

// §4.3: an empty sender or a sender without a local-part gets the
// local-part `postmaster`. The sender may be enclosed in angle brackets as
// in the SMTP envelope.
fn split_sender(sender: &str, fallback_domain: &str) -> (String, String) {
    let sender = sender.trim();
    let sender = sender
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(sender);

    match sender.split_once('@') {
        Some((local_part, domain)) if !local_part.is_empty() && !domain.is_empty() => {
            (local_part.into(), domain.into())
        }
        Some((_, domain)) if !domain.is_empty() => ("postmaster".into(), domain.into()),
        None if !sender.is_empty() => ("postmaster".into(), sender.into()),
        _ => ("postmaster".into(), fallback_domain.into()),
    }
}

struct Evaluator<'a, T> {
    resolver: &'a T,
    config: &'a Config,
    client_ip: IpAddr,
    sender_local_part: String,
    sender_domain: String,
    lookups: usize,
    void_lookups: usize,
    depth: usize,
}

impl<'a, T: Lookup> Evaluator<'a, T> {
    // Boxed because evaluation recurses through include and redirect.
    fn check_domain<'s>(
        &'s mut self,
        domain: DomainName,
    ) -> Pin<Box<dyn Future<Output = Result<Output, Abort>> + Send + 's>> {
        Box::pin(async move {
            if self.depth >= MAX_EVALUATION_DEPTH {
                return Err(Abort::PermError(ErrorCause::RecursionLimitExceeded));
            }

            self.depth += 1;
            let result = self.check_domain_record(&domain).await;
            self.depth -= 1;
            result
        })
    }

    async fn check_domain_record(&mut self, domain: &DomainName) -> Result<Output, Abort> {
        let timeout = self.config.lookup_timeout;

        let record = match query::look_up_spf_record(self.resolver, domain.as_str(), timeout).await
        {
            Ok(Some(txt)) => txt
                .parse::<Record>()
                .map_err(|e| Abort::PermError(ErrorCause::RecordSyntax(e)))?,
            Ok(None) => return Ok(Output::none(None)),
            Err(RecordLookupError::NoRecord) => return Ok(Output::none(Some(ErrorCause::NoRecord))),
            Err(RecordLookupError::TempFail(e)) => return Err(Abort::TempError(dns_cause(&e))),
            Err(RecordLookupError::PermFail(e)) => return Err(Abort::PermError(dns_cause(&e))),
            Err(RecordLookupError::MultipleRecords) => {
                return Err(Abort::PermError(ErrorCause::MultipleRecords));
            }
            Err(RecordLookupError::Aborted(e)) => return Err(Abort::Io(e)),
        };

        self.evaluate_record(domain, &record).await
    }

    async fn evaluate_record(
        &mut self,
        domain: &DomainName,
        record: &Record,
    ) -> Result<Output, Abort> {
        for directive in &record.directives {
            trace!(
                domain = domain.as_str(),
                mechanism = directive.mechanism.name(),
                "evaluating mechanism"
            );

            if self.mechanism_matches(domain, &directive.mechanism).await? {
                let result = qualifier_result(directive.qualifier);

                trace!(%result, "mechanism matched");

                let explanation = if result == SpfResult::Fail {
                    self.fetch_explanation(domain, record).await.map_err(Abort::Io)?
                } else {
                    None
                };

                return Ok(Output {
                    result,
                    cause: None,
                    explanation,
                });
            }
        }

        // No mechanism matched: follow the redirect modifier if there is
        // one, else the result is neutral (§4.7, §6.1).
        match &record.redirect {
            Some(spec) => {
                self.count_lookup()?;

                let target = self.expand_target_domain(spec, domain)?;

                trace!(target = target.as_str(), "following redirect");

                let output = self.check_domain(target).await?;

                if output.result == SpfResult::None {
                    Err(Abort::PermError(ErrorCause::UnusableRedirectPolicy))
                } else {
                    Ok(output)
                }
            }
            None => Ok(Output {
                result: SpfResult::Neutral,
                cause: None,
                explanation: None,
            }),
        }
    }

    async fn mechanism_matches(
        &mut self,
        domain: &DomainName,
        mechanism: &Mechanism,
    ) -> Result<bool, Abort> {
        match mechanism {
            Mechanism::All => Ok(true),
            Mechanism::Ip4(network) => Ok(match self.client_ip {
                IpAddr::V4(addr) => network.contains(addr),
                IpAddr::V6(_) => false,
            }),
            Mechanism::Ip6(network) => Ok(match self.client_ip {
                IpAddr::V6(addr) => network.contains(addr),
                IpAddr::V4(_) => false,
            }),
            Mechanism::A { domain: spec, cidr } => {
                self.match_a(domain, spec.as_ref(), *cidr).await
            }
            Mechanism::Mx { domain: spec, cidr } => {
                self.match_mx(domain, spec.as_ref(), *cidr).await
            }
            Mechanism::Ptr { domain: spec } => self.match_ptr(domain, spec.as_ref()).await,
            Mechanism::Exists { domain: spec } => self.match_exists(domain, spec).await,
            Mechanism::Include { domain: spec } => self.match_include(domain, spec).await,
        }
    }

    async fn match_a(
        &mut self,
        domain: &DomainName,
        spec: Option<&DomainSpec>,
        cidr: DualCidrLength,
    ) -> Result<bool, Abort> {
        let target = self.resolve_target(spec, domain)?;

        self.count_lookup()?;

        let addrs = self.look_up_client_family_addrs(target.as_str()).await?;

        if addrs.is_empty() {
            self.count_void_lookup()?;
            return Ok(false);
        }

        Ok(addrs.into_iter().any(|addr| self.client_ip_in_network(addr, cidr)))
    }

    async fn match_mx(
        &mut self,
        domain: &DomainName,
        spec: Option<&DomainSpec>,
        cidr: DualCidrLength,
    ) -> Result<bool, Abort> {
        let target = self.resolve_target(spec, domain)?;

        self.count_lookup()?;

        let query = self.resolver.lookup_mx(target.as_str());
        let hosts = run_query(self.config.lookup_timeout, query).await?;

        if hosts.is_empty() {
            self.count_void_lookup()?;
            return Ok(false);
        }

        if hosts.len() > MAX_MX_HOSTS {
            return Err(Abort::PermError(ErrorCause::LookupLimitExceeded));
        }

        for host in hosts {
            let Ok(host) = DomainName::new(&host) else {
                continue;
            };

            self.count_lookup()?;

            let addrs = self.look_up_client_family_addrs(host.as_str()).await?;

            if addrs.into_iter().any(|addr| self.client_ip_in_network(addr, cidr)) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn match_ptr(
        &mut self,
        domain: &DomainName,
        spec: Option<&DomainSpec>,
    ) -> Result<bool, Abort> {
        let target = self.resolve_target(spec, domain)?;

        self.count_lookup()?;

        let query = self.resolver.lookup_ptr(self.client_ip);
        let names = run_query(self.config.lookup_timeout, query).await?;

        for name in names.iter().take(MAX_PTR_NAMES) {
            let Ok(name) = DomainName::new(name) else {
                continue;
            };

            if !name.eq_or_subdomain_of(&target) {
                continue;
            }

            // §5.5: each candidate name is validated by forward lookup;
            // names that fail to resolve are skipped.
            let addrs = match self.look_up_client_family_addrs(name.as_str()).await {
                Ok(addrs) => addrs,
                Err(abort @ Abort::Io(_)) => return Err(abort),
                Err(_) => continue,
            };

            if addrs.contains(&self.client_ip) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn match_exists(
        &mut self,
        domain: &DomainName,
        spec: &DomainSpec,
    ) -> Result<bool, Abort> {
        let target = self.expand_target_domain(spec, domain)?;

        self.count_lookup()?;

        // §5.7: exists queries A records regardless of the client address
        // family.
        let query = self.resolver.lookup_a(target.as_str());
        let addrs = run_query(self.config.lookup_timeout, query).await?;

        if addrs.is_empty() {
            self.count_void_lookup()?;
            return Ok(false);
        }

        Ok(true)
    }

    async fn match_include(
        &mut self,
        domain: &DomainName,
        spec: &DomainSpec,
    ) -> Result<bool, Abort> {
        let target = self.expand_target_domain(spec, domain)?;

        self.count_lookup()?;

        trace!(target = target.as_str(), "evaluating included policy");

        let output = self.check_domain(target).await?;

        match output.result {
            SpfResult::Pass => Ok(true),
            SpfResult::Fail | SpfResult::SoftFail | SpfResult::Neutral => Ok(false),
            // The recursive evaluation surfaces temperror/permerror through
            // `Abort`, so only `none` remains here (§5.2).
            _ => Err(Abort::PermError(ErrorCause::UnusableIncludePolicy)),
        }
    }

    /// Produces the explanation string for a `fail` result (§6.2).
    ///
    /// Failure to produce an explanation never affects the SPF result: all
    /// errors except aborted lookups degrade to no explanation.
    async fn fetch_explanation(
        &self,
        domain: &DomainName,
        record: &Record,
    ) -> io::Result<Option<String>> {
        let Some(spec) = &record.explanation else {
            return Ok(None);
        };

        let cx = self.macro_context(domain);

        let Ok(target) = macros::expand_domain_spec(spec.as_str(), &cx) else {
            return Ok(None);
        };
        let Ok(target) = DomainName::new(&target) else {
            return Ok(None);
        };

        let query = self.resolver.lookup_txt(target.as_str());

        let txts = match time::timeout(self.config.lookup_timeout, query).await {
            Ok(Ok(txts)) => txts,
            Ok(Err(e)) if e.kind() == ErrorKind::Interrupted => return Err(e),
            Ok(Err(e)) => {
                debug!(error = %e, "failed to look up explanation");
                return Ok(None);
            }
            Err(_) => {
                debug!("explanation lookup timed out");
                return Ok(None);
            }
        };

        // The explanation must be a single TXT record.
        let [txt] = txts.as_slice() else {
            return Ok(None);
        };

        Ok(macros::expand_explain_string(txt, &cx).ok())
    }

    fn resolve_target(
        &self,
        spec: Option<&DomainSpec>,
        domain: &DomainName,
    ) -> Result<DomainName, Abort> {
        match spec {
            Some(spec) => self.expand_target_domain(spec, domain),
            None => Ok(domain.clone()),
        }
    }

    fn expand_target_domain(
        &self,
        spec: &DomainSpec,
        domain: &DomainName,
    ) -> Result<DomainName, Abort> {
        let cx = self.macro_context(domain);

        let expanded = macros::expand_domain_spec(spec.as_str(), &cx)
            .map_err(|e| Abort::PermError(ErrorCause::Macro(e)))?;

        DomainName::new(&expanded).map_err(|e| Abort::PermError(ErrorCause::Domain(e)))
    }

    fn macro_context<'c>(&'c self, domain: &'c DomainName) -> MacroContext<'c> {
        MacroContext {
            client_ip: self.client_ip,
            domain: domain.as_str(),
            sender_local_part: &self.sender_local_part,
            sender_domain: &self.sender_domain,
        }
    }

    async fn look_up_client_family_addrs(&self, domain: &str) -> Result<Vec<IpAddr>, Abort> {
        let timeout = self.config.lookup_timeout;

        match self.client_ip {
            IpAddr::V4(_) => {
                let addrs = run_query(timeout, self.resolver.lookup_a(domain)).await?;
                Ok(addrs.into_iter().map(IpAddr::V4).collect())
            }
            IpAddr::V6(_) => {
                let addrs = run_query(timeout, self.resolver.lookup_aaaa(domain)).await?;
                Ok(addrs.into_iter().map(IpAddr::V6).collect())
            }
        }
    }

    fn client_ip_in_network(&self, addr: IpAddr, cidr: DualCidrLength) -> bool {
        match (self.client_ip, addr) {
            (IpAddr::V4(client), IpAddr::V4(addr)) => {
                ipv4_prefix_eq(client, addr, cidr.v4_or_default())
            }
            (IpAddr::V6(client), IpAddr::V6(addr)) => {
                ipv6_prefix_eq(client, addr, cidr.v6_or_default())
            }
            _ => false,
        }
    }

    fn count_lookup(&mut self) -> Result<(), Abort> {
        self.lookups += 1;
        if self.lookups > self.config.max_lookups {
            Err(Abort::PermError(ErrorCause::LookupLimitExceeded))
        } else {
            Ok(())
        }
    }

    fn count_void_lookup(&mut self) -> Result<(), Abort> {
        self.void_lookups += 1;
        if self.void_lookups > self.config.max_void_lookups {
            Err(Abort::PermError(ErrorCause::VoidLookupLimitExceeded))
        } else {
            Ok(())
        }
    }
}

/// Runs a single address or name query with a timeout, normalising the
/// error taxonomy: NXDOMAIN becomes an empty answer, timeouts become
/// temporary failures, aborted lookups abort the evaluation, everything
/// else is a permanent failure.
async fn run_query<F, U>(timeout: Duration, query: F) -> Result<Vec<U>, Abort>
where
    F: Future<Output = io::Result<Vec<U>>>,
{
    match time::timeout(timeout, query).await {
        Ok(Ok(answers)) => Ok(answers),
        Ok(Err(e)) => match e.kind() {
            ErrorKind::NotFound => Ok(Vec::new()),
            ErrorKind::Interrupted => Err(Abort::Io(e)),
            ErrorKind::TimedOut => Err(Abort::TempError(dns_cause(&e))),
            _ => Err(Abort::PermError(dns_cause(&e))),
        },
        Err(_) => Err(Abort::TempError(ErrorCause::Dns("lookup timed out".into()))),
    }
}

fn qualifier_result(qualifier: Qualifier) -> SpfResult {
    match qualifier {
        Qualifier::Pass => SpfResult::Pass,
        Qualifier::Fail => SpfResult::Fail,
        Qualifier::SoftFail => SpfResult::SoftFail,
        Qualifier::Neutral => SpfResult::Neutral,
    }
}

fn dns_cause(error: &io::Error) -> ErrorCause {
    ErrorCause::Dns(error.to_string().into())
}
