//! Changelog 출력 스키마 등록
//!
//! 로컬 스키마 정의를 읽어 원격 스키마 레지스트리에 한 번 등록하고,
//! 반환된 schema_id를 핸들러 수명 동안 재사용합니다.
//! 상태 전이: Uninitialized -> Registering -> Ready(schema_id)

use crate::error::{ChangeLogError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

/// dry-run 모드에서 반환하는 고정 schema_id
pub const DRY_RUN_SCHEMA_ID: i64 = 1;

/// 로컬 스키마 정의 (Avro 스키마 JSON)
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSchema {
    pub namespace: String,
    pub name: String,
    /// 전체 스키마 본문
    pub body: Value,
}

impl LocalSchema {
    /// 스키마 JSON 파싱. namespace와 name은 문자열이어야 합니다.
    pub fn from_json(body: Value) -> Result<Self> {
        let text_field = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    ChangeLogError::SchemaSource(format!("schema is missing string field {}", key))
                })
        };

        let namespace = text_field("namespace")?;
        let name = text_field("name")?;

        Ok(LocalSchema {
            namespace,
            name,
            body,
        })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let body: Value = serde_json::from_str(raw)
            .map_err(|e| ChangeLogError::SchemaSource(format!("malformed schema JSON: {}", e)))?;
        LocalSchema::from_json(body)
    }
}

/// 로컬 스키마 정의 소스
pub trait SchemaSource: Send + Sync {
    fn read(&self) -> Result<LocalSchema>;
}

/// 파일에 저장된 스키마 정의
#[derive(Debug, Clone)]
pub struct FileSchemaSource {
    path: PathBuf,
}

impl FileSchemaSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSchemaSource { path: path.into() }
    }
}

impl SchemaSource for FileSchemaSource {
    fn read(&self) -> Result<LocalSchema> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            ChangeLogError::SchemaSource(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        LocalSchema::parse(&raw)
    }
}

/// 메모리에 있는 스키마 정의
#[derive(Debug, Clone)]
pub struct StaticSchemaSource {
    schema: LocalSchema,
}

impl StaticSchemaSource {
    pub fn new(schema: LocalSchema) -> Self {
        StaticSchemaSource { schema }
    }
}

impl SchemaSource for StaticSchemaSource {
    fn read(&self) -> Result<LocalSchema> {
        Ok(self.schema.clone())
    }
}

/// 스키마 등록 요청
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterSchemaRequest {
    pub contains_pii: bool,
    pub namespace: String,
    pub schema_json: Value,
    pub source: String,
    pub source_owner_email: String,
}

/// 스키마 등록 응답
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisteredSchema {
    pub schema_id: i64,
}

/// 원격 스키마 레지스트리 클라이언트
#[async_trait]
pub trait SchemaRegistryClient: Send + Sync {
    async fn register_schema_from_schema_json(
        &self,
        request: RegisterSchemaRequest,
    ) -> Result<RegisteredSchema>;
}

/// 레지스트리가 설정되지 않은 환경용 클라이언트 (dry-run 전용)
#[derive(Debug, Clone, Default)]
pub struct OfflineRegistryClient;

#[async_trait]
impl SchemaRegistryClient for OfflineRegistryClient {
    async fn register_schema_from_schema_json(
        &self,
        request: RegisterSchemaRequest,
    ) -> Result<RegisteredSchema> {
        Err(ChangeLogError::Registry(format!(
            "no schema registry configured for {}.{}",
            request.namespace, request.source
        )))
    }
}

/// 등록된 changelog 스키마 (메시지 생성 시 사용)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaWrapperEntry {
    pub schema_id: i64,
    pub namespace: String,
    pub name: String,
}

/// 등록 설정
#[derive(Debug, Clone)]
pub struct RegistrarConfig {
    pub register_dry_run: bool,
    pub contains_pii: bool,
    pub source_owner_email: String,
}

/// 등록 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    Uninitialized,
    Registering,
    Ready(SchemaWrapperEntry),
}

/// 스키마 등록기
pub struct SchemaRegistrar<'a> {
    config: RegistrarConfig,
    client: &'a dyn SchemaRegistryClient,
    state: RegistrationState,
}

impl<'a> SchemaRegistrar<'a> {
    pub fn new(config: RegistrarConfig, client: &'a dyn SchemaRegistryClient) -> Self {
        SchemaRegistrar {
            config,
            client,
            state: RegistrationState::Uninitialized,
        }
    }

    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    /// 스키마 등록 후 schema_id 반환
    ///
    /// 이미 Ready 상태면 레지스트리를 다시 호출하지 않습니다.
    /// 실패하면 Uninitialized로 돌아가고 에러를 그대로 전달합니다.
    pub async fn get_schema_id(&mut self, source: &dyn SchemaSource) -> Result<i64> {
        Ok(self.register(source).await?.schema_id)
    }

    pub async fn register(&mut self, source: &dyn SchemaSource) -> Result<SchemaWrapperEntry> {
        if let RegistrationState::Ready(entry) = &self.state {
            return Ok(entry.clone());
        }

        self.state = RegistrationState::Registering;
        match self.register_once(source).await {
            Ok(entry) => {
                self.state = RegistrationState::Ready(entry.clone());
                Ok(entry)
            }
            Err(e) => {
                self.state = RegistrationState::Uninitialized;
                Err(e)
            }
        }
    }

    async fn register_once(&self, source: &dyn SchemaSource) -> Result<SchemaWrapperEntry> {
        let schema = source.read()?;

        if self.config.register_dry_run {
            info!(
                "Dry run: skipping registration of {}.{}",
                schema.namespace, schema.name
            );
            return Ok(SchemaWrapperEntry {
                schema_id: DRY_RUN_SCHEMA_ID,
                namespace: schema.namespace,
                name: schema.name,
            });
        }

        info!("Registering schema {}.{}", schema.namespace, schema.name);

        let request = RegisterSchemaRequest {
            contains_pii: self.config.contains_pii,
            namespace: schema.namespace.clone(),
            schema_json: schema.body.clone(),
            source: schema.name.clone(),
            source_owner_email: self.config.source_owner_email.clone(),
        };
        debug!("Register request: {:?}", request);

        let registered = self.client.register_schema_from_schema_json(request).await?;

        info!(
            "Registered schema {}.{} with id {}",
            schema.namespace, schema.name, registered.schema_id
        );

        Ok(SchemaWrapperEntry {
            schema_id: registered.schema_id,
            namespace: schema.namespace,
            name: schema.name,
        })
    }
}
