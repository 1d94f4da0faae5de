/// Changelog 핸들러 사용 예제
///
/// 스키마 파일을 읽어 dry-run 모드로 핸들러를 만들고, 샘플 행 변경 이벤트를
/// 처리해 발행된 메시지를 출력합니다.
use mysql_changelog::events::{MutationKind, ReplicationEvent, RowMutationBatch, SchemaStatement};
use mysql_changelog::schema::{FileSchemaSource, OfflineRegistryClient};
use mysql_changelog::stats::TableStatsCounter;
use mysql_changelog::{
    ChangeLogEventHandler, ChannelProducer, CheckpointTracker, HandlerConfig, PositionIdentifier,
    ReplicationPosition,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 초기화
    tracing_subscriber::fmt::init();

    let mut config = HandlerConfig::from_env()?;
    // 레지스트리 없이 실행
    config.register_dry_run = true;

    info!("Loading changelog schema from {}", config.schema_path.display());
    let schema_source = FileSchemaSource::new(&config.schema_path);

    let (producer, mut rx) = ChannelProducer::new();
    let stats = Arc::new(TableStatsCounter::new());
    let handler = ChangeLogEventHandler::new(
        &config,
        &schema_source,
        &OfflineRegistryClient,
        Arc::new(producer),
    )
    .await?
    .with_stats_counter(stats.clone());

    info!("ChangeLog handler started with schema_id {}", handler.schema_id());

    let tracker = CheckpointTracker::new();
    for (event, position) in sample_events()? {
        if tracker.is_processed(&position.position) {
            info!("Skipping already processed position {}", position);
            continue;
        }

        handler.handle_event(&event, &position).await?;
        tracker.advance(&position.position)?;
    }

    while let Ok(message) = rx.try_recv() {
        info!("{}", serde_json::to_string(&message)?);
    }

    if let Some(checkpoint) = tracker.current() {
        info!("Checkpoint: {}", checkpoint.to_mapping());
    }
    info!("Published rows per table: {:?}", stats.snapshot());

    Ok(())
}

/// 샘플 이벤트 (마지막 이벤트는 재전송된 중복 위치)
fn sample_events() -> mysql_changelog::Result<Vec<(ReplicationEvent, ReplicationPosition)>> {
    let cluster = "refresh_primary";
    let at = |pos: u64| -> mysql_changelog::Result<ReplicationPosition> {
        Ok(PositionIdentifier::new(cluster, "mysql-bin.000001", pos)?.into())
    };

    let create = RowMutationBatch::from_raw_rows(
        "fake_database",
        "fake_table",
        MutationKind::Create,
        &[
            json!({"values": {"id": 1, "a_number": 100}}),
            json!({"values": {"id": 2, "a_number": 200}}),
            json!({"values": {"id": 3, "a_number": 300}}),
        ],
    )?;
    let update = RowMutationBatch::from_raw_rows(
        "fake_database",
        "fake_table",
        MutationKind::Update,
        &[json!({
            "before_values": {"id": 1, "a_number": 100},
            "after_values": {"id": 1, "a_number": 110}
        })],
    )?;
    let ddl = SchemaStatement {
        schema: "fake_database".to_string(),
        query: "ALTER TABLE fake_table ADD COLUMN note VARCHAR(64)".to_string(),
    };
    let delete = RowMutationBatch::from_raw_rows(
        "fake_database",
        "fake_table",
        MutationKind::Delete,
        &[json!({"values": {"id": 3, "a_number": 300}})],
    )?;

    Ok(vec![
        (create.into(), at(120)?),
        (update.clone().into(), at(480)?),
        (ReplicationEvent::SchemaStatement(ddl), at(760)?),
        (delete.into(), at(1024)?),
        (update.into(), at(480)?),
    ])
}
