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

use super::Lookup;
use hickory_resolver::{
    error::{ResolveError, ResolveErrorKind},
    Name, TokioAsyncResolver,
};
use std::{
    future::Future,
    io::{self, ErrorKind},
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    pin::Pin,
};

fn to_io_error(error: ResolveError) -> io::Error {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => io::Error::from(ErrorKind::NotFound),
        ResolveErrorKind::Timeout => io::Error::from(ErrorKind::TimedOut),
        _ => error.into(),
    }
}

impl Lookup for TokioAsyncResolver {
    type Query<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>
    where
        Self: 'a,
        T: 'a;

    fn lookup_txt(&self, domain: &str) -> Self::Query<'_, Vec<String>> {
        let name = Name::from_ascii(domain);

        Box::pin(async move {
            let name = name.map_err(|_| ErrorKind::InvalidInput)?;

            let lookup = self.txt_lookup(name).await.map_err(to_io_error)?;

            let txts = lookup
                .into_iter()
                .map(|txt| String::from_utf8_lossy(&txt.txt_data().concat()).into_owned())
                .collect();

            Ok(txts)
        })
    }

    fn lookup_a(&self, domain: &str) -> Self::Query<'_, Vec<Ipv4Addr>> {
        let name = Name::from_ascii(domain);

        Box::pin(async move {
            let name = name.map_err(|_| ErrorKind::InvalidInput)?;

            let lookup = self.ipv4_lookup(name).await.map_err(to_io_error)?;

            Ok(lookup.into_iter().map(|a| a.0).collect())
        })
    }

    fn lookup_aaaa(&self, domain: &str) -> Self::Query<'_, Vec<Ipv6Addr>> {
        let name = Name::from_ascii(domain);

        Box::pin(async move {
            let name = name.map_err(|_| ErrorKind::InvalidInput)?;

            let lookup = self.ipv6_lookup(name).await.map_err(to_io_error)?;

            Ok(lookup.into_iter().map(|aaaa| aaaa.0).collect())
        })
    }

    fn lookup_mx(&self, domain: &str) -> Self::Query<'_, Vec<String>> {
        let name = Name::from_ascii(domain);

        Box::pin(async move {
            let name = name.map_err(|_| ErrorKind::InvalidInput)?;

            let lookup = self.mx_lookup(name).await.map_err(to_io_error)?;

            let mut hosts: Vec<_> = lookup
                .into_iter()
                .map(|mx| (mx.preference(), mx.exchange().to_ascii()))
                .collect();
            hosts.sort_by_key(|&(preference, _)| preference);

            Ok(hosts.into_iter().map(|(_, host)| host).collect())
        })
    }

    fn lookup_ptr(&self, ip: IpAddr) -> Self::Query<'_, Vec<String>> {
        Box::pin(async move {
            let lookup = self.reverse_lookup(ip).await.map_err(to_io_error)?;

            Ok(lookup.into_iter().map(|name| name.0.to_ascii()).collect())
        })
    }
}
