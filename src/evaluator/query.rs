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

//! Retrieval and selection of the SPF record (RFC 7208, §4.4 and §4.5).

use crate::evaluator::Lookup;
use std::{
    io::{self, ErrorKind},
    time::Duration,
};
use tokio::time;
use tracing::trace;

#[derive(Debug)]
pub(crate) enum RecordLookupError {
    /// No SPF record is published at the domain, or the domain does not
    /// exist.
    NoRecord,
    /// A temporary DNS failure.
    TempFail(io::Error),
    /// A permanent DNS failure.
    PermFail(io::Error),
    /// More than one SPF record is published at the domain.
    MultipleRecords,
    /// The lookup was aborted; the evaluation cannot proceed.
    Aborted(io::Error),
}

/// Queries the TXT records of the given domain and selects the SPF record
/// among them.
///
/// Returns `Ok(None)` when TXT records exist but none of them is an SPF
/// record.
pub(crate) async fn look_up_spf_record<T: Lookup>(
    resolver: &T,
    domain: &str,
    lookup_timeout: Duration,
) -> Result<Option<String>, RecordLookupError> {
    trace!(domain, "looking up SPF record");

    let txts = match time::timeout(lookup_timeout, resolver.lookup_txt(domain)).await {
        Ok(result) => result.map_err(classify_txt_error)?,
        Err(_) => {
            return Err(RecordLookupError::TempFail(io::Error::from(
                ErrorKind::TimedOut,
            )));
        }
    };

    select_spf_record(txts)
}

fn classify_txt_error(error: io::Error) -> RecordLookupError {
    match error.kind() {
        ErrorKind::Interrupted => RecordLookupError::Aborted(error),
        ErrorKind::NotFound => RecordLookupError::NoRecord,
        ErrorKind::TimedOut => RecordLookupError::TempFail(error),
        _ => RecordLookupError::PermFail(error),
    }
}

/// Selects the sole SPF record among a domain’s TXT records (§4.5).
///
/// A TXT record is an SPF record exactly when its first whitespace-separated
/// field is `v=spf1`. The selected record is normalised to lower case.
fn select_spf_record(txts: Vec<String>) -> Result<Option<String>, RecordLookupError> {
    let mut records = txts.iter().map(|txt| txt.trim()).filter(|txt| {
        matches!(
            txt.split_ascii_whitespace().next(),
            Some(version) if version.eq_ignore_ascii_case("v=spf1")
        )
    });

    match (records.next(), records.next()) {
        (None, _) => Ok(None),
        (Some(record), None) => Ok(Some(record.to_ascii_lowercase())),
        (Some(_), Some(_)) => Err(RecordLookupError::MultipleRecords),
    }
}
