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

#[cfg(feature = "hickory-resolver")]
mod hickory_resolver;

use std::{
    future::Future,
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

/// A trait for looking up DNS records.
///
/// This trait is used to abstract over the DNS resolver. By implementing it,
/// any DNS resolver can be used with the [`check_host`][crate::check_host]
/// procedure.
///
/// The error values returned from the lookup methods are inspected by the
/// evaluator, which recognises the following error kinds:
///
/// * [`ErrorKind::NotFound`][io::ErrorKind::NotFound]: the queried domain
///   does not exist (NXDOMAIN)
/// * [`ErrorKind::TimedOut`][io::ErrorKind::TimedOut]: the query did not
///   complete in time, a temporary DNS failure
/// * [`ErrorKind::Interrupted`][io::ErrorKind::Interrupted]: the query was
///   aborted; such errors abort the entire evaluation and are returned
///   verbatim from `check_host`
///
/// All other errors are treated as permanent DNS failures.
///
/// When the **`hickory-resolver`** feature is enabled, `Lookup` is
/// implemented for the [Hickory DNS] `TokioAsyncResolver`.
///
/// [Hickory DNS]: https://github.com/hickory-dns/hickory-dns
pub trait Lookup: Send + Sync {
    /// The type of query result futures.
    type Query<'a, T>: Future<Output = io::Result<T>> + Send + 'a
    where
        Self: 'a,
        T: 'a;

    /// Looks up the TXT records of the given domain. Each returned string is
    /// the concatenation of one TXT record’s character strings.
    fn lookup_txt(&self, domain: &str) -> Self::Query<'_, Vec<String>>;

    /// Looks up the IPv4 addresses (A records) of the given domain.
    fn lookup_a(&self, domain: &str) -> Self::Query<'_, Vec<Ipv4Addr>>;

    /// Looks up the IPv6 addresses (AAAA records) of the given domain.
    fn lookup_aaaa(&self, domain: &str) -> Self::Query<'_, Vec<Ipv6Addr>>;

    /// Looks up the MX hosts of the given domain, ordered by preference,
    /// best preference first.
    fn lookup_mx(&self, domain: &str) -> Self::Query<'_, Vec<String>>;

    /// Looks up the PTR records of the given IP address.
    fn lookup_ptr(&self, ip: IpAddr) -> Self::Query<'_, Vec<String>>;
}
