// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hashed tag dispatch for request record lines
//!
//! Every known tag hashes (FNV-1a) to its own slot of a fixed table built in a
//! `const` context; a collision aborts compilation, so adding a tag that
//! collides is caught at build time rather than by a misparsed record.

use super::OpKind;

/// Typed destination of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    JobId,
    GroupId,
    Owner,
    Client,
    Sender,
    MailAddr,
    JobType,
    Number,
    External,
    Canonical,
    Modem,
    PageHandling,
    Status,
    DoneOp,
    CommId,
    ContinuationCover,
    Tts,
    KillTime,
    RetryTime,
    State,
    Priority,
    UserPriority,
    Tries,
    MaxTries,
    Dials,
    MaxDials,
    TotalDials,
    TotalTries,
    Pages,
    TotalPages,
    Resolution,
    PageWidth,
    PageLength,
    DesiredBitRate,
    DesiredScanTime,
    DesiredEcm,
    DesiredFormat,
    UseContinuationCover,
    Returned,
    CallStatus,
    Notify,
    Op(OpKind),
}

pub(crate) const FIELDS: &[(&str, Field)] = &[
    ("jobid", Field::JobId),
    ("groupid", Field::GroupId),
    ("owner", Field::Owner),
    ("client", Field::Client),
    ("sender", Field::Sender),
    ("mailaddr", Field::MailAddr),
    ("jobtype", Field::JobType),
    ("number", Field::Number),
    ("external", Field::External),
    ("canonical", Field::Canonical),
    ("modem", Field::Modem),
    ("pagehandling", Field::PageHandling),
    ("status", Field::Status),
    ("doneop", Field::DoneOp),
    ("commid", Field::CommId),
    ("ccover", Field::ContinuationCover),
    ("tts", Field::Tts),
    ("killtime", Field::KillTime),
    ("retrytime", Field::RetryTime),
    ("state", Field::State),
    ("pri", Field::Priority),
    ("usrpri", Field::UserPriority),
    ("ntries", Field::Tries),
    ("maxtries", Field::MaxTries),
    ("ndials", Field::Dials),
    ("maxdials", Field::MaxDials),
    ("totdials", Field::TotalDials),
    ("tottries", Field::TotalTries),
    ("npages", Field::Pages),
    ("totpages", Field::TotalPages),
    ("resolution", Field::Resolution),
    ("pagewidth", Field::PageWidth),
    ("pagelength", Field::PageLength),
    ("desiredbr", Field::DesiredBitRate),
    ("desiredst", Field::DesiredScanTime),
    ("desiredec", Field::DesiredEcm),
    ("desireddf", Field::DesiredFormat),
    ("useccover", Field::UseContinuationCover),
    ("returned", Field::Returned),
    ("callstatus", Field::CallStatus),
    ("notify", Field::Notify),
    ("fax", Field::Op(OpKind::Fax)),
    ("tiff", Field::Op(OpKind::Tiff)),
    ("!tiff", Field::Op(OpKind::TiffSaved)),
    ("pdf", Field::Op(OpKind::Pdf)),
    ("!pdf", Field::Op(OpKind::PdfSaved)),
    ("postscript", Field::Op(OpKind::PostScript)),
    ("!postscript", Field::Op(OpKind::PostScriptSaved)),
    ("pcl", Field::Op(OpKind::Pcl)),
    ("!pcl", Field::Op(OpKind::PclSaved)),
    ("data", Field::Op(OpKind::Data)),
    ("!data", Field::Op(OpKind::DataSaved)),
    ("poll", Field::Op(OpKind::Poll)),
    ("page", Field::Op(OpKind::Page)),
    ("uucp", Field::Op(OpKind::Uucp)),
];

pub(crate) const TABLE_SIZE: usize = 468;

pub(crate) const fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(0x0100_0193);
        i += 1;
    }
    hash
}

const fn slot(tag: &str) -> usize {
    fnv1a(tag.as_bytes()) as usize % TABLE_SIZE
}

// Evaluated at compile time; the panic is a build failure, never a runtime one.
#[allow(clippy::panic)]
const fn build_table() -> [Option<(&'static str, Field)>; TABLE_SIZE] {
    let mut table: [Option<(&'static str, Field)>; TABLE_SIZE] = [None; TABLE_SIZE];
    let mut i = 0;
    while i < FIELDS.len() {
        let (tag, field) = FIELDS[i];
        let s = slot(tag);
        if table[s].is_some() {
            panic!("request record tag hash collision; change TABLE_SIZE");
        }
        table[s] = Some((tag, field));
        i += 1;
    }
    table
}

static TABLE: [Option<(&'static str, Field)>; TABLE_SIZE] = build_table();

/// Look up the field for a tag; unknown tags return `None`
pub(crate) fn lookup(tag: &str) -> Option<Field> {
    match TABLE[slot(tag)] {
        Some((name, field)) if name == tag => Some(field),
        _ => None,
    }
}
