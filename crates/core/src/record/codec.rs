// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text encoding of request records

use super::tags::{self, Field};
use super::{DocOp, DoneOp, FaxRequest, JobId, OpKind, RecordError};
use crate::state::{JobState, JobType, NotifyWhen};
use crate::status::{CallStatus, SendStatus};
use std::fmt::Write;
use std::str::FromStr;

/// Split record text into logical `(line number, text)` lines.
///
/// A physical line ending in an odd run of backslashes continues on the next
/// line; the last backslash stands for an embedded newline. Within a
/// trailing run, `\\` is one literal backslash.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let (start, mut acc) = pending.take().unwrap_or((idx + 1, String::new()));
        let head = raw.trim_end_matches('\\');
        let run = raw.len() - head.len();
        acc.push_str(head);
        acc.extend(std::iter::repeat('\\').take(run / 2));
        if run % 2 == 1 {
            acc.push('\n');
            pending = Some((start, acc));
        } else {
            out.push((start, acc));
        }
    }
    if let Some(last) = pending {
        out.push(last);
    }
    out
}

fn number<T: FromStr>(line: usize, tag: &str, value: &str) -> Result<T, RecordError> {
    value.trim().parse().map_err(|_| RecordError::InvalidValue {
        line,
        tag: tag.to_string(),
        value: value.to_string(),
    })
}

fn invalid(line: usize, tag: &str, value: &str) -> RecordError {
    RecordError::InvalidValue {
        line,
        tag: tag.to_string(),
        value: value.to_string(),
    }
}

fn parse_op(line: usize, op: OpKind, rest: &str) -> Result<DocOp, RecordError> {
    let mut parts = rest.splitn(3, ':');
    let (Some(dirnum), Some(addr), Some(item)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(RecordError::MalformedOp {
            line,
            text: format!("{}:{}", op.name(), rest),
        });
    };
    let dirnum = if dirnum.is_empty() {
        0
    } else {
        number(line, op.name(), dirnum)?
    };
    Ok(DocOp {
        op,
        dirnum,
        addr: addr.to_string(),
        item: item.to_string(),
    })
}

pub(super) fn parse(text: &str) -> Result<FaxRequest, RecordError> {
    let mut req = FaxRequest::new(JobId::new(""), "");
    // `external` defaults to `number` only when the record does not set it
    let mut saw_external = false;

    for (line, content) in logical_lines(text) {
        if content.trim().is_empty() {
            continue;
        }
        let Some((tag, value)) = content.split_once(':') else {
            return Err(RecordError::MissingSeparator { line });
        };

        let Some(field) = tags::lookup(tag) else {
            req.extra.push((tag.to_string(), value.to_string()));
            continue;
        };

        match field {
            Field::JobId => req.jobid = JobId::new(value),
            Field::GroupId => req.groupid = value.to_string(),
            Field::Owner => req.owner = value.to_string(),
            Field::Client => req.client = value.to_string(),
            Field::Sender => req.sender = value.to_string(),
            Field::MailAddr => req.mailaddr = value.to_string(),
            Field::JobType => {
                req.jobtype = JobType::parse(value).ok_or_else(|| invalid(line, tag, value))?
            }
            Field::Number => req.number = value.to_string(),
            Field::External => {
                req.external = value.to_string();
                saw_external = true;
            }
            Field::Canonical => req.canonical = value.to_string(),
            Field::Modem => req.modem = value.to_string(),
            Field::PageHandling => req.pagehandling = value.to_string(),
            Field::Status => req.status = value.to_string(),
            Field::DoneOp => {
                req.doneop = DoneOp::parse(value).ok_or_else(|| invalid(line, tag, value))?
            }
            Field::CommId => req.commid = value.to_string(),
            Field::ContinuationCover => req.ccover = value.to_string(),
            Field::Tts => req.tts = number(line, tag, value)?,
            Field::KillTime => req.killtime = number(line, tag, value)?,
            Field::RetryTime => req.retrytime = number::<i64>(line, tag, value)?.max(0),
            Field::State => {
                let code: u8 = number(line, tag, value)?;
                req.state = JobState::from_code(code).ok_or_else(|| invalid(line, tag, value))?;
            }
            Field::Priority => req.pri = number(line, tag, value)?,
            Field::UserPriority => req.usrpri = number(line, tag, value)?,
            Field::Tries => req.ntries = number(line, tag, value)?,
            Field::MaxTries => req.maxtries = number(line, tag, value)?,
            Field::Dials => req.ndials = number(line, tag, value)?,
            Field::MaxDials => req.maxdials = number(line, tag, value)?,
            Field::TotalDials => req.totdials = number(line, tag, value)?,
            Field::TotalTries => req.tottries = number(line, tag, value)?,
            Field::Pages => req.npages = number(line, tag, value)?,
            Field::TotalPages => req.totpages = number(line, tag, value)?,
            Field::Resolution => req.resolution = number(line, tag, value)?,
            Field::PageWidth => req.pagewidth = number(line, tag, value)?,
            Field::PageLength => req.pagelength = number(line, tag, value)?,
            Field::DesiredBitRate => req.desiredbr = number(line, tag, value)?,
            Field::DesiredScanTime => req.desiredst = number(line, tag, value)?,
            Field::DesiredEcm => req.desiredec = number(line, tag, value)?,
            Field::DesiredFormat => req.desireddf = number(line, tag, value)?,
            Field::UseContinuationCover => {
                let flag: u8 = number(line, tag, value)?;
                req.useccover = flag != 0;
            }
            Field::Returned => {
                let code: u8 = number(line, tag, value)?;
                req.returned =
                    Some(SendStatus::from_code(code).ok_or_else(|| invalid(line, tag, value))?);
            }
            Field::CallStatus => {
                let code: u8 = number(line, tag, value)?;
                req.callstatus =
                    Some(CallStatus::from_code(code).ok_or_else(|| invalid(line, tag, value))?);
            }
            Field::Notify => {
                req.notify = NotifyWhen::parse(value).ok_or_else(|| invalid(line, tag, value))?
            }
            Field::Op(op) => req.items.push(parse_op(line, op, value)?),
        }
    }

    if req.jobid.as_str().is_empty() {
        return Err(RecordError::MissingJobId);
    }
    if !saw_external {
        req.external = req.number.clone();
    }
    Ok(req)
}

/// Inverse of [`logical_lines`]: trailing backslashes of each physical line
/// are doubled and embedded newlines become backslash continuations
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut segments = value.split('\n').peekable();
    while let Some(segment) = segments.next() {
        let head = segment.trim_end_matches('\\');
        out.push_str(head);
        out.extend(std::iter::repeat('\\').take(2 * (segment.len() - head.len())));
        if segments.peek().is_some() {
            out.push_str("\\\n");
        }
    }
    out
}

pub(super) fn write(req: &FaxRequest) -> String {
    let mut out = String::with_capacity(1024);

    // Writing into a String cannot fail.
    macro_rules! put {
        ($tag:expr, $value:expr) => {
            let _ = writeln!(out, "{}:{}", $tag, escape(&$value.to_string()));
        };
    }

    put!("jobid", req.jobid);
    put!("groupid", req.groupid);
    put!("state", req.state.code());
    put!("jobtype", req.jobtype.name());
    put!("owner", req.owner);
    put!("client", req.client);
    put!("sender", req.sender);
    put!("mailaddr", req.mailaddr);
    put!("number", req.number);
    put!("external", req.external);
    put!("canonical", req.canonical);
    put!("modem", req.modem);
    put!("tts", req.tts);
    put!("killtime", req.killtime);
    put!("retrytime", req.retrytime);
    put!("pri", req.pri);
    put!("usrpri", req.usrpri);
    put!("ntries", req.ntries);
    put!("maxtries", req.maxtries);
    put!("ndials", req.ndials);
    put!("maxdials", req.maxdials);
    put!("totdials", req.totdials);
    put!("tottries", req.tottries);
    put!("npages", req.npages);
    put!("totpages", req.totpages);
    put!("resolution", req.resolution);
    put!("pagewidth", req.pagewidth);
    put!("pagelength", req.pagelength);
    put!("desiredbr", req.desiredbr);
    put!("desiredst", req.desiredst);
    put!("desiredec", req.desiredec);
    put!("desireddf", req.desireddf);
    put!("useccover", u8::from(req.useccover));
    put!("notify", req.notify.name());
    put!("doneop", req.doneop.name());
    if !req.pagehandling.is_empty() {
        put!("pagehandling", req.pagehandling);
    }
    if !req.commid.is_empty() {
        put!("commid", req.commid);
    }
    if !req.ccover.is_empty() {
        put!("ccover", req.ccover);
    }
    if let Some(returned) = req.returned {
        put!("returned", returned.code());
    }
    if let Some(call) = req.callstatus {
        put!("callstatus", call.code());
    }
    put!("status", req.status);
    for (tag, value) in &req.extra {
        put!(tag, value);
    }
    for doc in &req.items {
        let line = format!("{}:{}:{}:{}", doc.op.name(), doc.dirnum, doc.addr, doc.item);
        let _ = writeln!(out, "{}", escape(&line));
    }
    out
}
