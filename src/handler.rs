//! Changelog 이벤트 핸들러
//!
//! 행 변경 배치를 받아 행마다 changelog 메시지를 만들고 프로듀서로 발행합니다.
//! 스트림 하나당 하나의 핸들러를 쓰며, `handle_event`가 끝난 뒤에 다음 이벤트를
//! 넘겨야 합니다. 행 순서는 그대로 발행 순서가 됩니다.

use crate::config::HandlerConfig;
use crate::error::Result;
use crate::events::{ReplicationEvent, RowMutationBatch};
use crate::message::{ChangeLogMessageBuilder, MessageBuilder};
use crate::position::ReplicationPosition;
use crate::producer::Producer;
use crate::schema::{SchemaRegistrar, SchemaRegistryClient, SchemaSource, SchemaWrapperEntry};
use crate::stats::TableStatsCounter;
use std::sync::Arc;
use tracing::{debug, info};

/// Changelog 이벤트 핸들러
pub struct ChangeLogEventHandler {
    producer: Arc<dyn Producer>,
    message_builder: Box<dyn MessageBuilder>,
    schema_wrapper_entry: SchemaWrapperEntry,
    gtid_enabled: bool,
    stats_counter: Option<Arc<TableStatsCounter>>,
}

impl ChangeLogEventHandler {
    /// 스키마를 등록하고 핸들러 생성
    ///
    /// 등록에 실패하면 메시지를 만들 수 없으므로 생성도 실패합니다.
    pub async fn new(
        config: &HandlerConfig,
        schema_source: &dyn SchemaSource,
        registry: &dyn SchemaRegistryClient,
        producer: Arc<dyn Producer>,
    ) -> Result<Self> {
        let mut registrar = SchemaRegistrar::new(config.registrar_config(), registry);
        let schema_wrapper_entry = registrar.register(schema_source).await?;

        info!(
            "ChangeLog handler ready (schema_id: {}, gtid_enabled: {}, dry_run: {})",
            schema_wrapper_entry.schema_id, config.gtid_enabled, config.register_dry_run
        );

        Ok(ChangeLogEventHandler {
            producer,
            message_builder: Box::new(ChangeLogMessageBuilder::new(config.contains_pii)),
            schema_wrapper_entry,
            gtid_enabled: config.gtid_enabled,
            stats_counter: None,
        })
    }

    pub fn with_message_builder(mut self, builder: impl MessageBuilder + 'static) -> Self {
        self.message_builder = Box::new(builder);
        self
    }

    pub fn with_stats_counter(mut self, counter: Arc<TableStatsCounter>) -> Self {
        self.stats_counter = Some(counter);
        self
    }

    pub fn schema_id(&self) -> i64 {
        self.schema_wrapper_entry.schema_id
    }

    pub fn schema_wrapper_entry(&self) -> &SchemaWrapperEntry {
        &self.schema_wrapper_entry
    }

    pub fn gtid_enabled(&self) -> bool {
        self.gtid_enabled
    }

    /// 이벤트 처리
    ///
    /// 행 변경 배치만 메시지를 만들고, 나머지 이벤트는 아무 것도 하지 않습니다.
    pub async fn handle_event(
        &self,
        event: &ReplicationEvent,
        position: &ReplicationPosition,
    ) -> Result<()> {
        match event {
            ReplicationEvent::RowMutation(batch) => self.handle_rows(batch, position).await,
            ReplicationEvent::TransactionBoundary(boundary) => {
                debug!("Transaction boundary {} at {}", boundary.gtid, position);
                Ok(())
            }
            ReplicationEvent::SchemaStatement(statement) => {
                // 캐시된 schema_id는 DDL과 무관하게 유지
                if statement.is_ddl() {
                    debug!(
                        "DDL on {} at {}: {}",
                        statement.schema, position, statement.query
                    );
                }
                Ok(())
            }
        }
    }

    async fn handle_rows(
        &self,
        batch: &RowMutationBatch,
        position: &ReplicationPosition,
    ) -> Result<()> {
        debug!(
            "Handling {} {} rows for {} at {}",
            batch.rows.len(),
            batch.kind.as_str(),
            batch.table_key(),
            position
        );

        // 한 행이라도 잘못되면 아무 것도 발행하지 않음
        let messages = batch
            .rows
            .iter()
            .map(|row| {
                self.message_builder.build(
                    &self.schema_wrapper_entry,
                    batch,
                    row,
                    position,
                    self.gtid_enabled,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        for message in messages {
            self.producer.publish(message).await?;

            if let Some(counter) = &self.stats_counter {
                counter.increment(&batch.table_key());
            }
        }

        Ok(())
    }
}
