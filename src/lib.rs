//! MySQL Binlog Changelog 핸들러
//!
//! 복제 로그의 행 변경 이벤트를 스키마 등록된 changelog 메시지로 변환해
//! 데이터 버스에 발행합니다.
//! 주요 기능:
//! - Binlog 위치 식별자 및 체크포인트 추적
//! - 복제 이벤트 모델 (GTID, DDL, 행 변경)
//! - 스키마 레지스트리 1회 등록
//! - 행 순서를 유지하는 메시지 발행

pub mod config;
pub mod error;
pub mod events;
pub mod gtid;
pub mod handler;
pub mod message;
pub mod position;
pub mod producer;
pub mod schema;
pub mod stats;

pub use config::HandlerConfig;
pub use error::{ChangeLogError, Result};
pub use events::{MutationKind, ReplicationEvent, RowMutationBatch, RowPayload};
pub use gtid::Gtid;
pub use handler::ChangeLogEventHandler;
pub use message::{ChangeLogMessage, ChangeLogMessageBuilder, MessageBuilder};
pub use position::{CheckpointTracker, PositionIdentifier, ReplicationPosition};
pub use producer::{ChannelProducer, LoggingProducer, Producer};
pub use schema::{SchemaRegistrar, SchemaRegistryClient, SchemaSource};
