//! GTID (Global Transaction ID)
//!
//! GTID 형식: UUID:sequence-number
//! 예: "3e11fa47-71ca-11e1-9e33-c80aa9429562:23"

use crate::error::{ChangeLogError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn gtid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}):([0-9]+)$")
            .expect("GTID 정규식은 항상 유효함")
    })
}

/// 단일 트랜잭션의 GTID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Gtid {
    /// 원본 서버 UUID
    source_id: String,
    /// 트랜잭션 순번 (1부터 시작)
    sequence: u64,
}

impl Gtid {
    pub fn new(source_id: impl Into<String>, sequence: u64) -> Result<Self> {
        let source_id = source_id.into();
        format!("{}:{}", source_id, sequence).parse()
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl FromStr for Gtid {
    type Err = ChangeLogError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = gtid_regex()
            .captures(s.trim())
            .ok_or_else(|| ChangeLogError::InvalidArgument(format!("Invalid GTID format: {}", s)))?;

        let sequence = caps[2]
            .parse::<u64>()
            .map_err(|_| ChangeLogError::InvalidArgument(format!("Invalid sequence: {}", &caps[2])))?;
        if sequence == 0 {
            return Err(ChangeLogError::InvalidArgument(format!(
                "GTID sequence must start at 1: {}",
                s
            )));
        }

        Ok(Gtid {
            source_id: caps[1].to_lowercase(),
            sequence,
        })
    }
}

impl TryFrom<String> for Gtid {
    type Error = ChangeLogError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Gtid> for String {
    fn from(gtid: Gtid) -> Self {
        gtid.to_string()
    }
}

impl fmt::Display for Gtid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_id, self.sequence)
    }
}
