//! Changelog 핸들러 에러 타입

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChangeLogError {
    /// PositionIdentifier 등 생성 시 잘못된 인자
    #[error("잘못된 인자: {0}")]
    InvalidArgument(String),

    /// 로컬 스키마 정의를 읽을 수 없거나 형식이 잘못됨
    #[error("스키마 소스 에러: {0}")]
    SchemaSource(String),

    /// 원격 스키마 레지스트리 등록 실패
    #[error("스키마 레지스트리 에러: {0}")]
    Registry(String),

    /// 행 페이로드로 메시지를 만들 수 없음
    #[error("행 메시지 생성 에러: {0}")]
    RowConstruction(String),

    /// 프로듀서가 반환한 에러 (그대로 전달)
    #[error("프로듀서 에러: {0}")]
    Producer(String),

    #[error("설정 에러: {0}")]
    Config(String),

    #[error("I/O 에러: {0}")]
    IoError(String),

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<io::Error> for ChangeLogError {
    fn from(err: io::Error) -> Self {
        ChangeLogError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChangeLogError>;
