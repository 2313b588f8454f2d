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

//! A library implementing the *Sender Policy Framework* (SPF) described in
//! [RFC 7208].
//!
//! This library provides the `check_host` decision procedure for verifying
//! whether a host is authorised to send mail on behalf of a domain, as well
//! as low-level APIs covering the various SPF protocol areas.
//!
//! The high-level entry point is [`check_host`] in module `evaluator`: given
//! the IP address of an SMTP client, the domain under evaluation, and the
//! envelope sender, it fetches the domain’s SPF record from DNS, parses it,
//! and walks its mechanisms to arrive at an authorisation result. DNS access
//! is abstracted behind the [`Lookup`] trait, which callers implement for
//! their resolver of choice.
//!
//! The low-level building blocks are provided in additional modules: the
//! record grammar in module `record`, domain name validation in module
//! `domain`, and macro string expansion in module `macros`. Users familiar
//! with SPF could use these to build their own evaluation facilities.
//!
//! # Usage
//!
//! See the example for [`check_host`] for basic usage.
//!
//! # Cargo features
//!
//! The feature **`hickory-resolver`** makes an implementation of
//! [`Lookup`][crate::evaluator::Lookup] available for the Hickory DNS
//! resolver.
//!
//! [RFC 7208]: https://www.rfc-editor.org/rfc/rfc7208

pub mod domain;
pub mod evaluator;
pub mod macros;
pub mod record;
mod util;

pub use crate::{
    domain::{DomainError, DomainName},
    evaluator::{check_host, Config, ErrorCause, Lookup, QueryResult, SpfResult},
    record::{Mechanism, Qualifier, Record, RecordParseError},
    util::CanonicalStr,
};
