//! Binlog 처리 위치 식별자 및 체크포인트 추적
//!
//! (클러스터, binlog 파일명, 오프셋) 세 값으로 재시작 지점을 정확히 식별합니다.
//! 문자열 형식: "cluster1:mysql-bin.000003:4097"

use crate::error::{ChangeLogError, Result};
use crate::gtid::Gtid;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Binlog 위치 식별자
///
/// 생성 후 변경되지 않습니다. 세 필드가 모두 같을 때만 동등하며 해시도 같은
/// 세 필드로 계산되므로 맵/셋의 키로 쓸 수 있습니다.
/// 순서는 cluster, 파일명 접두어, 파일 시퀀스 번호, log_pos 순으로 비교하므로
/// "mysql-bin.999999" 다음의 "mysql-bin.1000000"도 뒤로 정렬됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PositionMapping")]
pub struct PositionIdentifier {
    cluster_name: String,
    log_file: String,
    log_pos: u64,
}

/// 역직렬화 전용 원시 매핑
#[derive(Deserialize)]
struct PositionMapping {
    cluster_name: String,
    log_file: String,
    log_pos: u64,
}

impl TryFrom<PositionMapping> for PositionIdentifier {
    type Error = ChangeLogError;

    fn try_from(raw: PositionMapping) -> Result<Self> {
        PositionIdentifier::new(raw.cluster_name, raw.log_file, raw.log_pos)
    }
}

impl PositionIdentifier {
    pub fn new(
        cluster_name: impl Into<String>,
        log_file: impl Into<String>,
        log_pos: u64,
    ) -> Result<Self> {
        let cluster_name = cluster_name.into();
        let log_file = log_file.into();

        if cluster_name.is_empty() {
            return Err(ChangeLogError::InvalidArgument(
                "cluster_name must not be empty".to_string(),
            ));
        }
        if log_file.is_empty() {
            return Err(ChangeLogError::InvalidArgument(
                "log_file must not be empty".to_string(),
            ));
        }

        Ok(PositionIdentifier {
            cluster_name,
            log_file,
            log_pos,
        })
    }

    /// 동적 값에서 생성 (타입 강제 변환 없음)
    ///
    /// `cluster_name`, `log_file`은 JSON 문자열이어야 하고 `log_pos`는 음이 아닌
    /// 정수여야 합니다. 바이트 배열이나 숫자 문자열("10")은 거부됩니다.
    pub fn from_values(cluster_name: &Value, log_file: &Value, log_pos: &Value) -> Result<Self> {
        let cluster_name = expect_text("cluster_name", cluster_name)?;
        let log_file = expect_text("log_file", log_file)?;
        let log_pos = log_pos.as_u64().ok_or_else(|| {
            ChangeLogError::InvalidArgument(format!(
                "log_pos must be a non-negative integer, got {}",
                log_pos
            ))
        })?;

        PositionIdentifier::new(cluster_name, log_file, log_pos)
    }

    /// `to_mapping()` 형식의 매핑에서 생성
    pub fn from_mapping(mapping: &Value) -> Result<Self> {
        let object = mapping.as_object().ok_or_else(|| {
            ChangeLogError::InvalidArgument(format!("position mapping must be an object, got {}", mapping))
        })?;

        let field = |name: &str| {
            object.get(name).ok_or_else(|| {
                ChangeLogError::InvalidArgument(format!("position mapping is missing {}", name))
            })
        };

        PositionIdentifier::from_values(field("cluster_name")?, field("log_file")?, field("log_pos")?)
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    pub fn log_pos(&self) -> u64 {
        self.log_pos
    }

    /// `{cluster_name, log_file, log_pos}` 매핑
    pub fn to_mapping(&self) -> Value {
        serde_json::json!({
            "cluster_name": self.cluster_name,
            "log_file": self.log_file,
            "log_pos": self.log_pos,
        })
    }

    /// 파일명에서 시퀀스 번호 추출 (e.g., "mysql-bin.000123" -> 123)
    pub fn file_sequence(&self) -> Option<u64> {
        self.log_file
            .rsplit_once('.')
            .and_then(|(_, seq)| seq.parse().ok())
    }

    /// 파일명 접두어 (e.g., "mysql-bin.000123" -> "mysql-bin")
    fn file_base(&self) -> &str {
        self.log_file
            .rsplit_once('.')
            .map(|(base, _)| base)
            .unwrap_or(self.log_file.as_str())
    }

    // 시퀀스가 같고 표기만 다른 파일명("x.010" vs "x.10")은 원문 비교로 구분
    fn sort_key(&self) -> (&str, &str, Option<u64>, &str, u64) {
        (
            self.cluster_name.as_str(),
            self.file_base(),
            self.file_sequence(),
            self.log_file.as_str(),
            self.log_pos,
        )
    }
}

impl Ord for PositionIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for PositionIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn expect_text(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(ChangeLogError::InvalidArgument(format!(
            "{} must be text, got {}",
            field, other
        ))),
    }
}

impl fmt::Display for PositionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.cluster_name, self.log_file, self.log_pos)
    }
}

impl FromStr for PositionIdentifier {
    type Err = ChangeLogError;

    /// 마지막 두 ':'를 기준으로 분리하므로 클러스터명에는 ':'가 들어가도 됩니다.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.rsplitn(3, ':');
        let (log_pos, log_file, cluster_name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(pos), Some(file), Some(cluster)) => (pos, file, cluster),
            _ => {
                return Err(ChangeLogError::InvalidArgument(format!(
                    "Invalid position string: {}",
                    s
                )))
            }
        };

        let log_pos = log_pos.parse::<u64>().map_err(|_| {
            ChangeLogError::InvalidArgument(format!("Invalid log_pos: {}", log_pos))
        })?;

        PositionIdentifier::new(cluster_name, log_file, log_pos)
    }
}

/// `handle_event`에 전달되는 현재 위치
///
/// GTID 모드에서는 메시지가 트랜잭션 GTID를 참조하고, 아니면 binlog 위치를 참조합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationPosition {
    pub position: PositionIdentifier,
    /// 현재 트랜잭션의 GTID (있는 경우)
    pub gtid: Option<Gtid>,
}

impl ReplicationPosition {
    pub fn new(position: PositionIdentifier) -> Self {
        ReplicationPosition {
            position,
            gtid: None,
        }
    }

    pub fn with_gtid(position: PositionIdentifier, gtid: Gtid) -> Self {
        ReplicationPosition {
            position,
            gtid: Some(gtid),
        }
    }
}

impl From<PositionIdentifier> for ReplicationPosition {
    fn from(position: PositionIdentifier) -> Self {
        ReplicationPosition::new(position)
    }
}

impl fmt::Display for ReplicationPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.gtid {
            Some(gtid) => write!(f, "{} ({})", self.position, gtid),
            None => write!(f, "{}", self.position),
        }
    }
}

/// 마지막으로 발행 완료된 위치 추적 (메모리 전용)
///
/// 위치는 앞으로만 이동합니다. 재시작 시 체크포인트 이전 이벤트를 건너뛰는 데 씁니다.
/// 영속화는 호출자의 책임입니다.
#[derive(Debug, Default)]
pub struct CheckpointTracker {
    last: RwLock<Option<PositionIdentifier>>,
}

impl CheckpointTracker {
    pub fn new() -> Self {
        CheckpointTracker::default()
    }

    /// 저장된 체크포인트에서 재개
    pub fn resume_from(position: PositionIdentifier) -> Self {
        CheckpointTracker {
            last: RwLock::new(Some(position)),
        }
    }

    pub fn current(&self) -> Option<PositionIdentifier> {
        self.last.read().clone()
    }

    /// 체크포인트 전진. 이미 처리된 위치면 `false`
    ///
    /// 다른 클러스터의 위치는 같은 스트림이 아니므로 에러입니다.
    pub fn advance(&self, position: &PositionIdentifier) -> Result<bool> {
        let mut last = self.last.write();

        if let Some(current) = last.as_ref() {
            if current.cluster_name() != position.cluster_name() {
                return Err(ChangeLogError::InvalidArgument(format!(
                    "position {} belongs to a different cluster than checkpoint {}",
                    position, current
                )));
            }
            if position <= current {
                debug!("Checkpoint {} not advanced by {}", current, position);
                return Ok(false);
            }
        }

        *last = Some(position.clone());
        Ok(true)
    }

    /// 체크포인트 이하의 위치인지 (같은 클러스터일 때만)
    pub fn is_processed(&self, position: &PositionIdentifier) -> bool {
        match self.last.read().as_ref() {
            Some(current) => {
                current.cluster_name() == position.cluster_name() && position <= current
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn position() -> PositionIdentifier {
        PositionIdentifier::new("cluster1", "bin_log1", 10).unwrap()
    }

    #[test]
    fn test_position_mapping() {
        assert_eq!(
            position().to_mapping(),
            json!({"cluster_name": "cluster1", "log_file": "bin_log1", "log_pos": 10})
        );
    }

    #[test]
    fn test_position_str_repr() {
        assert_eq!(position().to_string(), "cluster1:bin_log1:10");
    }

    #[test]
    fn test_position_rejects_invalid_values() {
        let invalid = [
            (json!(b"cluster1".to_vec()), json!("bin_log1"), json!(10)),
            (json!("cluster1"), json!(b"bin_log1".to_vec()), json!(10)),
            (json!("cluster1"), json!("bin_log1"), json!("10")),
            (json!("cluster1"), json!("bin_log1"), json!(-1)),
            (json!("cluster1"), json!("bin_log1"), json!(10.5)),
        ];

        for (cluster, file, pos) in invalid.iter() {
            let result = PositionIdentifier::from_values(cluster, file, pos);
            assert!(
                matches!(result, Err(ChangeLogError::InvalidArgument(_))),
                "expected rejection for ({}, {}, {})",
                cluster,
                file,
                pos
            );
        }
    }

    #[test]
    fn test_position_rejects_empty_fields() {
        assert!(PositionIdentifier::new("", "bin_log1", 10).is_err());
        assert!(PositionIdentifier::new("cluster1", "", 10).is_err());
    }

    #[test]
    fn test_equality_and_hash() {
        let a = position();
        let b = position();
        assert_eq!(a, a);
        assert_eq!(a, b);

        let mut map = HashMap::new();
        map.insert(a, "message1");
        assert_eq!(map.get(&b), Some(&"message1"));
    }

    #[test]
    fn test_inequality() {
        let base = position();
        assert_ne!(base, PositionIdentifier::new("different_cluster", "bin_log1", 10).unwrap());
        assert_ne!(base, PositionIdentifier::new("cluster1", "bin_log2", 10).unwrap());
        assert_ne!(base, PositionIdentifier::new("cluster1", "bin_log1", 11).unwrap());
    }

    #[test]
    fn test_mapping_round_trip() {
        let original = position();
        let restored = PositionIdentifier::from_mapping(&original.to_mapping()).unwrap();
        assert_eq!(original, restored);

        let from_serde: PositionIdentifier = serde_json::from_value(original.to_mapping()).unwrap();
        assert_eq!(original, from_serde);
    }

    #[test]
    fn test_from_mapping_missing_field() {
        let result = PositionIdentifier::from_mapping(&json!({"cluster_name": "c", "log_file": "f"}));
        assert!(matches!(result, Err(ChangeLogError::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_from_str() {
        let parsed: PositionIdentifier = "cluster1:bin_log1:10".parse().unwrap();
        assert_eq!(parsed, position());

        let with_colon: PositionIdentifier = "host:3306:mysql-bin.000002:4".parse().unwrap();
        assert_eq!(with_colon.cluster_name(), "host:3306");
        assert_eq!(with_colon.log_file(), "mysql-bin.000002");

        assert!("cluster1:bin_log1".parse::<PositionIdentifier>().is_err());
        assert!("cluster1:bin_log1:abc".parse::<PositionIdentifier>().is_err());
    }

    #[test]
    fn test_ordering_across_rotation() {
        let a = PositionIdentifier::new("c", "mysql-bin.000009", 90_000).unwrap();
        let b = PositionIdentifier::new("c", "mysql-bin.000010", 4).unwrap();
        let c = PositionIdentifier::new("c", "mysql-bin.000010", 120).unwrap();
        assert!(a < b);
        assert!(b < c);
        assert_eq!(b.file_sequence(), Some(10));
    }

    #[test]
    fn test_checkpoint_tracker_advances_forward_only() {
        let tracker = CheckpointTracker::new();
        let first = PositionIdentifier::new("c", "mysql-bin.000001", 100).unwrap();
        let second = PositionIdentifier::new("c", "mysql-bin.000001", 200).unwrap();

        assert!(!tracker.is_processed(&first));
        assert!(tracker.advance(&second).unwrap());
        assert!(!tracker.advance(&first).unwrap());
        assert_eq!(tracker.current(), Some(second.clone()));
        assert!(tracker.is_processed(&first));
        assert!(tracker.is_processed(&second));
    }

    #[test]
    fn test_ordering_when_sequence_gains_a_digit() {
        let before = PositionIdentifier::new("c", "mysql-bin.999999", 500).unwrap();
        let after = PositionIdentifier::new("c", "mysql-bin.1000000", 4).unwrap();
        assert!(before < after);
        assert_eq!(after.file_sequence(), Some(1_000_000));

        let tracker = CheckpointTracker::resume_from(before.clone());
        assert!(!tracker.is_processed(&after));
        assert!(tracker.advance(&after).unwrap());
        assert!(tracker.is_processed(&before));
        assert_eq!(tracker.current(), Some(after));
    }

    #[test]
    fn test_ordering_falls_back_to_text() {
        let padded = PositionIdentifier::new("c", "relay.010", 4).unwrap();
        let bare = PositionIdentifier::new("c", "relay.10", 4).unwrap();
        assert_ne!(padded, bare);
        assert_ne!(padded.cmp(&bare), Ordering::Equal);

        let no_suffix = PositionIdentifier::new("c", "binlog", 4).unwrap();
        assert_eq!(no_suffix.file_sequence(), None);
        assert_eq!(no_suffix.cmp(&no_suffix.clone()), Ordering::Equal);
    }

    #[test]
    fn test_checkpoint_tracker_rejects_other_cluster() {
        let tracker = CheckpointTracker::resume_from(position());
        let other = PositionIdentifier::new("cluster2", "bin_log1", 99).unwrap();
        assert!(tracker.advance(&other).is_err());
        assert!(!tracker.is_processed(&other));
    }
}
