// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger specifications: which events a subscriber wants
//!
//! A spec is a comma separated list of rules. Each rule is an event class
//! letter, a mask (`*` for every event in the class, or a hex/decimal bit
//! mask) and an optional `@id` filter naming one job or modem:
//!
//! ```text
//! J*              every job event
//! J0x1000@42      JOB_DONE for job 42 only
//! M*@ttyS0,S*     modem events for ttyS0 plus every send event
//! ```

use crate::event::{EventClass, EventCode};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("empty trigger specification")]
    Empty,
    #[error("unknown event class in {0:?}")]
    BadClass(String),
    #[error("bad event mask in {0:?}")]
    BadMask(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRule {
    pub class: EventClass,
    pub mask: u32,
    pub id: Option<String>,
}

impl TriggerRule {
    fn matches(&self, code: EventCode, subject: &str) -> bool {
        code.class() == self.class
            && self.mask & code.mask() != 0
            && self.id.as_deref().map_or(true, |id| id == subject)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSpec {
    rules: Vec<TriggerRule>,
}

impl TriggerSpec {
    pub fn parse(spec: &str) -> Result<Self, TriggerError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(TriggerError::Empty);
        }
        let rules = spec
            .split(',')
            .map(|tok| parse_rule(tok.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }

    /// Whether an event about `subject` (job id or modem id) is wanted
    pub fn matches(&self, code: EventCode, subject: &str) -> bool {
        self.rules.iter().any(|r| r.matches(code, subject))
    }
}

impl fmt::Display for TriggerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if rule.mask == u32::MAX {
                write!(f, "{}*", rule.class.letter())?;
            } else {
                write!(f, "{}{:#06x}", rule.class.letter(), rule.mask)?;
            }
            if let Some(id) = &rule.id {
                write!(f, "@{id}")?;
            }
        }
        Ok(())
    }
}

fn parse_rule(tok: &str) -> Result<TriggerRule, TriggerError> {
    let mut chars = tok.chars();
    let Some(letter) = chars.next() else {
        return Err(TriggerError::Empty);
    };
    let class = EventClass::from_letter(letter).ok_or_else(|| TriggerError::BadClass(tok.to_string()))?;
    let rest = chars.as_str();
    let (mask, id) = match rest.split_once('@') {
        Some((mask, id)) if !id.is_empty() => (mask, Some(id.to_string())),
        Some(_) => return Err(TriggerError::BadMask(tok.to_string())),
        None => (rest, None),
    };
    let bad = || TriggerError::BadMask(tok.to_string());
    let mask = match mask {
        "*" => u32::MAX,
        m => match m.strip_prefix("0x").or_else(|| m.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16).map_err(|_| bad())?,
            None => m.parse().map_err(|_| bad())?,
        },
    };
    if mask == 0 {
        return Err(bad());
    }
    Ok(TriggerRule { class, mask, id })
}
