//! Changelog 메시지 및 메시지 빌더
//!
//! 행 하나당 메시지 하나를 만듭니다. 메시지는 프로듀서에 넘긴 뒤 보관하지 않습니다.

use crate::error::{ChangeLogError, Result};
use crate::events::{MutationKind, RowMutationBatch, RowPayload, RowValues};
use crate::gtid::Gtid;
use crate::position::{PositionIdentifier, ReplicationPosition};
use crate::schema::SchemaWrapperEntry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// 메시지가 참조하는 업스트림 위치
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamPosition {
    /// binlog 파일 + 오프셋
    Log(PositionIdentifier),
    /// GTID 모드
    Gtid { cluster_name: String, gtid: Gtid },
}

/// 다운스트림으로 발행되는 changelog 메시지
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeLogMessage {
    pub message_id: Uuid,
    pub kind: MutationKind,
    pub schema_id: i64,
    /// 현재 행 데이터 (delete는 삭제 전 값)
    pub payload: Value,
    /// update의 변경 전 데이터
    pub previous_payload: Option<Value>,
    pub upstream_position: UpstreamPosition,
    pub contains_pii: bool,
    pub timestamp: DateTime<Utc>,
}

/// 행 하나로 메시지를 만드는 협력자
pub trait MessageBuilder: Send + Sync {
    fn build(
        &self,
        entry: &SchemaWrapperEntry,
        batch: &RowMutationBatch,
        row: &RowPayload,
        position: &ReplicationPosition,
        gtid_enabled: bool,
    ) -> Result<ChangeLogMessage>;
}

/// 기본 메시지 빌더
#[derive(Debug, Clone, Default)]
pub struct ChangeLogMessageBuilder {
    contains_pii: bool,
}

impl ChangeLogMessageBuilder {
    pub fn new(contains_pii: bool) -> Self {
        ChangeLogMessageBuilder { contains_pii }
    }

    fn upstream_position(
        position: &ReplicationPosition,
        gtid_enabled: bool,
    ) -> Result<UpstreamPosition> {
        if !gtid_enabled {
            return Ok(UpstreamPosition::Log(position.position.clone()));
        }

        let gtid = position.gtid.clone().ok_or_else(|| {
            ChangeLogError::RowConstruction(format!(
                "GTID mode is enabled but position {} has no GTID",
                position.position
            ))
        })?;

        Ok(UpstreamPosition::Gtid {
            cluster_name: position.position.cluster_name().to_string(),
            gtid,
        })
    }

    fn payload(batch: &RowMutationBatch, values: &RowValues) -> Value {
        let mut payload = Map::new();
        payload.insert("table_schema".to_string(), Value::String(batch.schema.clone()));
        payload.insert("table_name".to_string(), Value::String(batch.table.clone()));
        if let Some(id) = values.get("id") {
            payload.insert("id".to_string(), id.to_json());
        }
        payload.insert(
            "values".to_string(),
            Value::Object(
                values
                    .iter()
                    .map(|(column, value)| (column.clone(), value.to_json()))
                    .collect(),
            ),
        );
        Value::Object(payload)
    }
}

impl MessageBuilder for ChangeLogMessageBuilder {
    fn build(
        &self,
        entry: &SchemaWrapperEntry,
        batch: &RowMutationBatch,
        row: &RowPayload,
        position: &ReplicationPosition,
        gtid_enabled: bool,
    ) -> Result<ChangeLogMessage> {
        if row.kind() != batch.kind {
            return Err(ChangeLogError::RowConstruction(format!(
                "{} row in {} batch for {}",
                row.kind().as_str(),
                batch.kind.as_str(),
                batch.table_key()
            )));
        }

        let (payload, previous_payload) = match row {
            RowPayload::Create { values } | RowPayload::Delete { values } => {
                (Self::payload(batch, values), None)
            }
            RowPayload::Update {
                before_values,
                after_values,
            } => {
                if !before_values.keys().eq(after_values.keys()) {
                    return Err(ChangeLogError::RowConstruction(format!(
                        "update row for {} has mismatched before/after columns",
                        batch.table_key()
                    )));
                }
                (
                    Self::payload(batch, after_values),
                    Some(Self::payload(batch, before_values)),
                )
            }
        };

        Ok(ChangeLogMessage {
            message_id: Uuid::new_v4(),
            kind: batch.kind,
            schema_id: entry.schema_id,
            payload,
            previous_payload,
            upstream_position: Self::upstream_position(position, gtid_enabled)?,
            contains_pii: self.contains_pii,
            timestamp: batch.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CellValue;
    use serde_json::json;

    fn entry() -> SchemaWrapperEntry {
        SchemaWrapperEntry {
            schema_id: 42,
            namespace: "foo".to_string(),
            name: "bar".to_string(),
        }
    }

    fn position() -> ReplicationPosition {
        ReplicationPosition::new(PositionIdentifier::new("cluster1", "binlog.0001", 100).unwrap())
    }

    fn values(n: i64) -> RowValues {
        let mut values = RowValues::new();
        values.insert("id".to_string(), CellValue::Int64(1));
        values.insert("a_number".to_string(), CellValue::Int64(n));
        values
    }

    #[test]
    fn test_build_create_message() {
        let row = RowPayload::Create { values: values(100) };
        let batch = RowMutationBatch::new("fake_database", "fake_table", MutationKind::Create, vec![row.clone()]);

        let message = ChangeLogMessageBuilder::default()
            .build(&entry(), &batch, &row, &position(), false)
            .unwrap();

        assert_eq!(message.schema_id, 42);
        assert_eq!(message.kind, MutationKind::Create);
        assert_eq!(
            message.payload,
            json!({
                "table_schema": "fake_database",
                "table_name": "fake_table",
                "id": 1,
                "values": {"id": 1, "a_number": 100}
            })
        );
        assert!(message.previous_payload.is_none());
        assert_eq!(message.upstream_position, UpstreamPosition::Log(position().position));
        assert!(!message.contains_pii);
    }

    #[test]
    fn test_build_update_message() {
        let row = RowPayload::Update {
            before_values: values(110),
            after_values: values(100),
        };
        let batch = RowMutationBatch::new("fake_database", "fake_table", MutationKind::Update, vec![row.clone()]);

        let message = ChangeLogMessageBuilder::new(true)
            .build(&entry(), &batch, &row, &position(), false)
            .unwrap();

        assert_eq!(message.payload["values"]["a_number"], 100);
        assert_eq!(message.previous_payload.unwrap()["values"]["a_number"], 110);
        assert!(message.contains_pii);
    }

    #[test]
    fn test_update_with_mismatched_columns_fails() {
        let mut after = values(100);
        after.insert("extra".to_string(), CellValue::Null);
        let row = RowPayload::Update {
            before_values: values(110),
            after_values: after,
        };
        let batch = RowMutationBatch::new("db", "t", MutationKind::Update, vec![row.clone()]);

        let result = ChangeLogMessageBuilder::default().build(&entry(), &batch, &row, &position(), false);
        assert!(matches!(result, Err(ChangeLogError::RowConstruction(_))));
    }

    #[test]
    fn test_mixed_row_kind_fails() {
        let row = RowPayload::Delete { values: values(1) };
        let batch = RowMutationBatch::new("db", "t", MutationKind::Create, vec![row.clone()]);

        let result = ChangeLogMessageBuilder::default().build(&entry(), &batch, &row, &position(), false);
        assert!(matches!(result, Err(ChangeLogError::RowConstruction(_))));
    }

    #[test]
    fn test_gtid_mode_references_transaction() {
        let gtid: Gtid = "550e8400-e29b-41d4-a716-446655440000:5".parse().unwrap();
        let row = RowPayload::Create { values: values(1) };
        let batch = RowMutationBatch::new("db", "t", MutationKind::Create, vec![row.clone()]);
        let builder = ChangeLogMessageBuilder::default();

        let with_gtid = ReplicationPosition::with_gtid(position().position, gtid.clone());
        let message = builder.build(&entry(), &batch, &row, &with_gtid, true).unwrap();
        assert_eq!(
            message.upstream_position,
            UpstreamPosition::Gtid {
                cluster_name: "cluster1".to_string(),
                gtid,
            }
        );

        let result = builder.build(&entry(), &batch, &row, &position(), true);
        assert!(matches!(result, Err(ChangeLogError::RowConstruction(_))));
    }
}
