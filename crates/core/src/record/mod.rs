// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request record: the durable description of one send job
//!
//! A record is a line-oriented `tag:value` text file. It is the single source
//! of truth for a job's persisted state; the scheduler re-reads it before
//! every scheduling decision and rewrites it after every transition.

mod codec;
mod tags;

use crate::state::{JobState, JobType, NotifyWhen};
use crate::status::{CallStatus, SendStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors reading a request record
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("line {line}: missing ':' separator")]
    MissingSeparator { line: usize },
    #[error("line {line}: invalid value for {tag}: {value:?}")]
    InvalidValue {
        line: usize,
        tag: String,
        value: String,
    },
    #[error("line {line}: malformed document operation {text:?}")]
    MalformedOp { line: usize, text: String },
    #[error("record has no jobid")]
    MissingJobId,
}

/// Job identifier as assigned by the submission server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the record file for this job inside the send queue directory
    pub fn qfile(&self) -> String {
        format!("q{}", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source document formats that need imaging before transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocKind {
    Tiff,
    Pdf,
    PostScript,
    Pcl,
    Data,
}

impl DocKind {
    pub fn name(self) -> &'static str {
        match self {
            DocKind::Tiff => "tiff",
            DocKind::Pdf => "pdf",
            DocKind::PostScript => "postscript",
            DocKind::Pcl => "pcl",
            DocKind::Data => "data",
        }
    }
}

/// A document operation line: `<op>:<dirnum>:<addr>:<item>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    /// Send an already imaged fax document
    Fax,
    Tiff,
    TiffSaved,
    Pdf,
    PdfSaved,
    PostScript,
    PostScriptSaved,
    Pcl,
    PclSaved,
    Data,
    DataSaved,
    Poll,
    Page,
    Uucp,
}

impl OpKind {
    pub fn name(self) -> &'static str {
        match self {
            OpKind::Fax => "fax",
            OpKind::Tiff => "tiff",
            OpKind::TiffSaved => "!tiff",
            OpKind::Pdf => "pdf",
            OpKind::PdfSaved => "!pdf",
            OpKind::PostScript => "postscript",
            OpKind::PostScriptSaved => "!postscript",
            OpKind::Pcl => "pcl",
            OpKind::PclSaved => "!pcl",
            OpKind::Data => "data",
            OpKind::DataSaved => "!data",
            OpKind::Poll => "poll",
            OpKind::Page => "page",
            OpKind::Uucp => "uucp",
        }
    }

    /// Source format of a document op, if it is one that gets imaged
    pub fn doc_kind(self) -> Option<DocKind> {
        match self {
            OpKind::Tiff | OpKind::TiffSaved => Some(DocKind::Tiff),
            OpKind::Pdf | OpKind::PdfSaved => Some(DocKind::Pdf),
            OpKind::PostScript | OpKind::PostScriptSaved => Some(DocKind::PostScript),
            OpKind::Pcl | OpKind::PclSaved => Some(DocKind::Pcl),
            OpKind::Data | OpKind::DataSaved => Some(DocKind::Data),
            OpKind::Fax | OpKind::Poll | OpKind::Page | OpKind::Uucp => None,
        }
    }

    /// An unsaved source document still waiting to be imaged
    pub fn needs_imaging(self) -> bool {
        matches!(
            self,
            OpKind::Tiff | OpKind::Pdf | OpKind::PostScript | OpKind::Pcl | OpKind::Data
        )
    }

    /// A source document kept after imaging so it can be re-imaged
    pub fn is_saved(self) -> bool {
        matches!(
            self,
            OpKind::TiffSaved
                | OpKind::PdfSaved
                | OpKind::PostScriptSaved
                | OpKind::PclSaved
                | OpKind::DataSaved
        )
    }

    /// The saved variant of a source op
    pub fn saved(self) -> Self {
        match self {
            OpKind::Tiff => OpKind::TiffSaved,
            OpKind::Pdf => OpKind::PdfSaved,
            OpKind::PostScript => OpKind::PostScriptSaved,
            OpKind::Pcl => OpKind::PclSaved,
            OpKind::Data => OpKind::DataSaved,
            other => other,
        }
    }

    /// The unsaved variant of a source op (used when a job must be re-imaged)
    pub fn unsaved(self) -> Self {
        match self {
            OpKind::TiffSaved => OpKind::Tiff,
            OpKind::PdfSaved => OpKind::Pdf,
            OpKind::PostScriptSaved => OpKind::PostScript,
            OpKind::PclSaved => OpKind::Pcl,
            OpKind::DataSaved => OpKind::Data,
            other => other,
        }
    }
}

/// One document operation of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocOp {
    pub op: OpKind,
    /// Directory index (cover pages and continuation documents use distinct values)
    pub dirnum: u16,
    /// Sub-address or pager PIN, depending on the op
    pub addr: String,
    /// Spool-relative file name, or PIN/message for page ops
    pub item: String,
}

impl DocOp {
    pub fn new(op: OpKind, item: impl Into<String>) -> Self {
        Self {
            op,
            dirnum: 0,
            addr: String::new(),
            item: item.into(),
        }
    }
}

/// What happens to the record once the job is finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoneOp {
    #[default]
    Archive,
    Remove,
}

impl DoneOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "archive" => Some(DoneOp::Archive),
            "remove" | "default" => Some(DoneOp::Remove),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DoneOp::Archive => "archive",
            DoneOp::Remove => "remove",
        }
    }
}

/// In-memory form of a request record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaxRequest {
    pub jobid: JobId,
    pub groupid: String,
    pub owner: String,
    pub client: String,
    pub sender: String,
    pub mailaddr: String,
    pub jobtype: JobType,
    /// Dial string as submitted
    pub number: String,
    /// Number as shown to people
    pub external: String,
    /// Canonical destination, the queue key
    pub canonical: String,
    /// Modem id or modem group name
    pub modem: String,
    pub state: JobState,
    /// Earliest send time, unix seconds
    pub tts: i64,
    /// Abandon deadline, unix seconds
    pub killtime: i64,
    /// Fixed retry delay in seconds; 0 selects the call-status delay
    pub retrytime: i64,
    pub pri: u8,
    pub usrpri: u8,
    pub ntries: u16,
    pub maxtries: u16,
    pub ndials: u16,
    pub maxdials: u16,
    pub totdials: u16,
    pub tottries: u16,
    pub npages: u16,
    pub totpages: u16,
    /// Vertical resolution in lines/inch
    pub resolution: u16,
    /// Page width in mm
    pub pagewidth: u16,
    /// Page length in mm
    pub pagelength: u16,
    pub desiredbr: u16,
    pub desiredst: u16,
    pub desiredec: u16,
    pub desireddf: u16,
    pub useccover: bool,
    pub notify: NotifyWhen,
    /// Per-document session handling computed during preparation
    pub pagehandling: String,
    /// Human readable result of the last attempt
    pub status: String,
    pub returned: Option<SendStatus>,
    pub callstatus: Option<CallStatus>,
    pub doneop: DoneOp,
    pub commid: String,
    /// Generated continuation cover page, if any
    pub ccover: String,
    pub items: Vec<DocOp>,
    /// Tags this version does not understand, preserved on rewrite
    pub extra: Vec<(String, String)>,
}

/// Default job priority ("normal")
pub const DEFAULT_PRIORITY: u8 = 127;

impl FaxRequest {
    pub fn new(jobid: JobId, number: impl Into<String>) -> Self {
        let number = number.into();
        Self {
            jobid,
            groupid: String::new(),
            owner: String::new(),
            client: String::new(),
            sender: String::new(),
            mailaddr: String::new(),
            jobtype: JobType::Facsimile,
            external: number.clone(),
            number,
            canonical: String::new(),
            modem: "any".to_string(),
            state: JobState::Pending,
            tts: 0,
            killtime: 0,
            retrytime: 0,
            pri: DEFAULT_PRIORITY,
            usrpri: DEFAULT_PRIORITY,
            ntries: 0,
            maxtries: 3,
            ndials: 0,
            maxdials: 12,
            totdials: 0,
            tottries: 0,
            npages: 0,
            totpages: 0,
            resolution: 98,
            pagewidth: 209,
            pagelength: 296,
            desiredbr: 5,
            desiredst: 0,
            desiredec: 2,
            desireddf: 0,
            useccover: false,
            notify: NotifyWhen::None,
            pagehandling: String::new(),
            status: String::new(),
            returned: None,
            callstatus: None,
            doneop: DoneOp::Archive,
            commid: String::new(),
            ccover: String::new(),
            items: Vec::new(),
            extra: Vec::new(),
        }
    }

    /// Parse record text
    pub fn parse(text: &str) -> Result<Self, RecordError> {
        codec::parse(text)
    }

    /// Serialize to record text
    pub fn to_text(&self) -> String {
        codec::write(self)
    }

    /// Documents that still need imaging
    pub fn pending_images(&self) -> impl Iterator<Item = (usize, &DocOp)> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, d)| d.op.needs_imaging())
    }

    /// Imaged documents the sender will transmit
    pub fn fax_documents(&self) -> impl Iterator<Item = &DocOp> {
        self.items.iter().filter(|d| d.op == OpKind::Fax)
    }

    /// Whether this is a polling-only request
    pub fn is_poll_only(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|d| d.op == OpKind::Poll)
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
