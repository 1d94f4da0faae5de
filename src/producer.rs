//! 메시지 프로듀서
//!
//! 전달/재시도 정책은 프로듀서 구현의 책임입니다. 핸들러는 에러를 그대로 전달합니다.

use crate::error::{ChangeLogError, Result};
use crate::message::ChangeLogMessage;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

/// 데이터 버스 프로듀서
#[async_trait]
pub trait Producer: Send + Sync {
    async fn publish(&self, message: ChangeLogMessage) -> Result<()>;
}

/// 메시지 수신자
pub type MessageReceiver = mpsc::UnboundedReceiver<ChangeLogMessage>;

/// tokio 채널로 메시지를 넘기는 프로듀서
#[derive(Debug, Clone)]
pub struct ChannelProducer {
    tx: mpsc::UnboundedSender<ChangeLogMessage>,
}

impl ChannelProducer {
    pub fn new() -> (Self, MessageReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelProducer { tx }, rx)
    }
}

#[async_trait]
impl Producer for ChannelProducer {
    async fn publish(&self, message: ChangeLogMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| ChangeLogError::Producer("message channel closed".to_string()))
    }
}

/// 메시지를 JSON 한 줄로 로그에 남기는 프로듀서 (디버깅용)
#[derive(Debug, Clone, Default)]
pub struct LoggingProducer;

#[async_trait]
impl Producer for LoggingProducer {
    async fn publish(&self, message: ChangeLogMessage) -> Result<()> {
        let line = serde_json::to_string(&message)?;
        info!(target: "changelog", "{}", line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MutationKind;
    use crate::message::UpstreamPosition;
    use crate::position::PositionIdentifier;
    use chrono::Utc;
    use uuid::Uuid;

    fn message() -> ChangeLogMessage {
        ChangeLogMessage {
            message_id: Uuid::new_v4(),
            kind: MutationKind::Create,
            schema_id: 1,
            payload: serde_json::json!({"table_name": "t"}),
            previous_payload: None,
            upstream_position: UpstreamPosition::Log(
                PositionIdentifier::new("c", "mysql-bin.000001", 4).unwrap(),
            ),
            contains_pii: false,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_channel_producer() {
        let (producer, mut rx) = ChannelProducer::new();
        let sent = message();

        producer.publish(sent.clone()).await.unwrap();

        assert_eq!(rx.recv().await, Some(sent));
    }

    #[tokio::test]
    async fn test_channel_producer_closed() {
        let (producer, rx) = ChannelProducer::new();
        drop(rx);

        let result = producer.publish(message()).await;
        assert!(matches!(result, Err(ChangeLogError::Producer(_))));
    }

    #[test]
    fn test_logging_producer() {
        let result = tokio_test::block_on(LoggingProducer.publish(message()));
        assert!(result.is_ok());
    }
}
