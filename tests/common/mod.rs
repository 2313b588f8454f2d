use std::{
    future::{self, Future},
    io::{self, ErrorKind},
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    pin::Pin,
    sync::Arc,
};
use viaspf::Lookup;

type NameLookupFn<T> = Arc<dyn Fn(&str) -> io::Result<Vec<T>> + Send + Sync>;
type AddrLookupFn = Arc<dyn Fn(IpAddr) -> io::Result<Vec<String>> + Send + Sync>;

/// A mock DNS resolver assembled from per-record-type closures. Lookups of
/// record types without a closure fail with `NotFound` (NXDOMAIN).
#[derive(Clone)]
pub struct MockLookup {
    txt: NameLookupFn<String>,
    a: NameLookupFn<Ipv4Addr>,
    aaaa: NameLookupFn<Ipv6Addr>,
    mx: NameLookupFn<String>,
    ptr: AddrLookupFn,
}

#[allow(dead_code)]
impl MockLookup {
    pub fn new() -> Self {
        Self {
            txt: Arc::new(|_| Err(ErrorKind::NotFound.into())),
            a: Arc::new(|_| Err(ErrorKind::NotFound.into())),
            aaaa: Arc::new(|_| Err(ErrorKind::NotFound.into())),
            mx: Arc::new(|_| Err(ErrorKind::NotFound.into())),
            ptr: Arc::new(|_| Err(ErrorKind::NotFound.into())),
        }
    }

    pub fn with_txt(
        mut self,
        f: impl Fn(&str) -> io::Result<Vec<String>> + Send + Sync + 'static,
    ) -> Self {
        self.txt = Arc::new(f);
        self
    }

    pub fn with_a(
        mut self,
        f: impl Fn(&str) -> io::Result<Vec<Ipv4Addr>> + Send + Sync + 'static,
    ) -> Self {
        self.a = Arc::new(f);
        self
    }

    pub fn with_aaaa(
        mut self,
        f: impl Fn(&str) -> io::Result<Vec<Ipv6Addr>> + Send + Sync + 'static,
    ) -> Self {
        self.aaaa = Arc::new(f);
        self
    }

    pub fn with_mx(
        mut self,
        f: impl Fn(&str) -> io::Result<Vec<String>> + Send + Sync + 'static,
    ) -> Self {
        self.mx = Arc::new(f);
        self
    }

    pub fn with_ptr(
        mut self,
        f: impl Fn(IpAddr) -> io::Result<Vec<String>> + Send + Sync + 'static,
    ) -> Self {
        self.ptr = Arc::new(f);
        self
    }
}

fn ready<T: Send + 'static>(
    result: io::Result<T>,
) -> Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'static>> {
    Box::pin(future::ready(result))
}

impl Lookup for MockLookup {
    type Query<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>
    where
        Self: 'a,
        T: 'a;

    fn lookup_txt(&self, domain: &str) -> Self::Query<'_, Vec<String>> {
        ready((self.txt)(domain))
    }

    fn lookup_a(&self, domain: &str) -> Self::Query<'_, Vec<Ipv4Addr>> {
        ready((self.a)(domain))
    }

    fn lookup_aaaa(&self, domain: &str) -> Self::Query<'_, Vec<Ipv6Addr>> {
        ready((self.aaaa)(domain))
    }

    fn lookup_mx(&self, domain: &str) -> Self::Query<'_, Vec<String>> {
        ready((self.mx)(domain))
    }

    fn lookup_ptr(&self, ip: IpAddr) -> Self::Query<'_, Vec<String>> {
        ready((self.ptr)(ip))
    }
}
