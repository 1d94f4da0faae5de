//! 복제 로그 이벤트 모델
//!
//! 핸들러가 반응하는 세 가지 이벤트:
//! - 트랜잭션 경계 (GTID)
//! - 스키마/DDL 쿼리
//! - 행 변경 배치 (INSERT / UPDATE / DELETE)

use crate::error::{ChangeLogError, Result};
use crate::gtid::Gtid;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// 셀 값 (MySQL 타입)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Decimal(String),
    Json(Value),
}

impl CellValue {
    /// 메시지 페이로드용 JSON 값
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Int64(i) => Value::from(*i),
            CellValue::UInt64(u) => Value::from(*u),
            CellValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::String(s) => Value::String(s.clone()),
            CellValue::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
            CellValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            CellValue::Decimal(d) => Value::String(d.clone()),
            CellValue::Json(v) => v.clone(),
        }
    }

    /// 복제 라이브러리가 넘겨주는 JSON 값에서 변환
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Int64(i64::from(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CellValue::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    CellValue::UInt64(u)
                } else {
                    n.as_f64().map(CellValue::Double).unwrap_or(CellValue::Null)
                }
            }
            Value::String(s) => CellValue::String(s.clone()),
            other => CellValue::Json(other.clone()),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Int64(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::String(v.to_string())
    }
}

/// 컬럼명 -> 값
pub type RowValues = BTreeMap<String, CellValue>;

/// 행 변경 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }
}

/// 행 하나의 페이로드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowPayload {
    /// 새 행 값
    Create { values: RowValues },
    /// 변경 전후 값 (같은 컬럼 키)
    Update {
        before_values: RowValues,
        after_values: RowValues,
    },
    /// 삭제 전 값
    Delete { values: RowValues },
}

impl RowPayload {
    pub fn kind(&self) -> MutationKind {
        match self {
            RowPayload::Create { .. } => MutationKind::Create,
            RowPayload::Update { .. } => MutationKind::Update,
            RowPayload::Delete { .. } => MutationKind::Delete,
        }
    }

    /// 복제 라이브러리 형식의 행을 파싱
    ///
    /// create/delete: `{"values": {...}}`
    /// update: `{"before_values": {...}, "after_values": {...}}`
    pub fn from_raw(kind: MutationKind, row: &Value) -> Result<Self> {
        match kind {
            MutationKind::Create => Ok(RowPayload::Create {
                values: value_map(row, "values")?,
            }),
            MutationKind::Update => Ok(RowPayload::Update {
                before_values: value_map(row, "before_values")?,
                after_values: value_map(row, "after_values")?,
            }),
            MutationKind::Delete => Ok(RowPayload::Delete {
                values: value_map(row, "values")?,
            }),
        }
    }
}

fn value_map(row: &Value, key: &str) -> Result<RowValues> {
    let object = row
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| ChangeLogError::RowConstruction(format!("row is missing {} map: {}", key, row)))?;

    Ok(object
        .iter()
        .map(|(column, value)| (column.clone(), CellValue::from_json(value)))
        .collect())
}

/// 트랜잭션 경계 (GTID 모드)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBoundary {
    pub gtid: Gtid,
}

fn ddl_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:/\*.*?\*/\s*)*(CREATE|ALTER|DROP|RENAME|TRUNCATE)\b")
            .expect("DDL 정규식은 항상 유효함")
    })
}

/// 스키마 쿼리 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaStatement {
    /// 데이터베이스명
    pub schema: String,
    /// 쿼리 문자열
    pub query: String,
}

impl SchemaStatement {
    /// 테이블 메타데이터를 바꿀 수 있는 DDL인지
    pub fn is_ddl(&self) -> bool {
        ddl_regex().is_match(&self.query)
    }
}

/// 행 변경 배치
///
/// 행 순서는 그대로 출력 메시지 순서가 됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMutationBatch {
    /// 데이터베이스명
    pub schema: String,
    /// 테이블명
    pub table: String,
    pub kind: MutationKind,
    pub rows: Vec<RowPayload>,
    /// 이벤트 타임스탬프
    pub timestamp: DateTime<Utc>,
}

impl RowMutationBatch {
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        kind: MutationKind,
        rows: Vec<RowPayload>,
    ) -> Self {
        RowMutationBatch {
            schema: schema.into(),
            table: table.into(),
            kind,
            rows,
            timestamp: Utc::now(),
        }
    }

    /// 원시 JSON 행들로 배치 생성
    pub fn from_raw_rows(
        schema: impl Into<String>,
        table: impl Into<String>,
        kind: MutationKind,
        rows: &[Value],
    ) -> Result<Self> {
        let rows = rows
            .iter()
            .map(|row| RowPayload::from_raw(kind, row))
            .collect::<Result<Vec<_>>>()?;
        Ok(RowMutationBatch::new(schema, table, kind, rows))
    }

    /// "schema.table"
    pub fn table_key(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// 핸들러가 받는 복제 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplicationEvent {
    TransactionBoundary(TransactionBoundary),
    SchemaStatement(SchemaStatement),
    RowMutation(RowMutationBatch),
}

impl ReplicationEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ReplicationEvent::TransactionBoundary(_) => "transaction_boundary",
            ReplicationEvent::SchemaStatement(_) => "schema_statement",
            ReplicationEvent::RowMutation(_) => "row_mutation",
        }
    }
}

impl From<RowMutationBatch> for ReplicationEvent {
    fn from(batch: RowMutationBatch) -> Self {
        ReplicationEvent::RowMutation(batch)
    }
}
