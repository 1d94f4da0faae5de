//! 핸들러 설정

use crate::error::{ChangeLogError, Result};
use crate::schema::RegistrarConfig;
use std::env;
use std::path::PathBuf;

/// changelog 스키마 소유자 연락처 기본값
pub const DEFAULT_SOURCE_OWNER_EMAIL: &str = "distsys-data+changelog@yelp.com";

/// changelog 스키마 파일 기본 경로
pub const DEFAULT_SCHEMA_PATH: &str = "schema/changelog.v1.avsc";

/// ChangeLogEventHandler 설정
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// 스키마 레지스트리 호출 생략
    pub register_dry_run: bool,
    /// 메시지가 binlog 위치 대신 GTID를 참조
    pub gtid_enabled: bool,
    pub contains_pii: bool,
    pub source_owner_email: String,
    pub schema_path: PathBuf,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        HandlerConfig {
            register_dry_run: false,
            gtid_enabled: false,
            contains_pii: false,
            source_owner_email: DEFAULT_SOURCE_OWNER_EMAIL.to_string(),
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
        }
    }
}

impl HandlerConfig {
    /// 환경 변수에서 설정 로드 (없으면 기본값)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = HandlerConfig::default();
        let flag = |key: &str, default: bool| match lookup(key) {
            Some(raw) => parse_bool(key, &raw),
            None => Ok(default),
        };

        Ok(HandlerConfig {
            register_dry_run: flag("CHANGELOG_REGISTER_DRY_RUN", defaults.register_dry_run)?,
            gtid_enabled: flag("CHANGELOG_GTID_ENABLED", defaults.gtid_enabled)?,
            contains_pii: flag("CHANGELOG_CONTAINS_PII", defaults.contains_pii)?,
            source_owner_email: lookup("CHANGELOG_OWNER_EMAIL")
                .unwrap_or(defaults.source_owner_email),
            schema_path: lookup("CHANGELOG_SCHEMA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.schema_path),
        })
    }

    pub fn registrar_config(&self) -> RegistrarConfig {
        RegistrarConfig {
            register_dry_run: self.register_dry_run,
            contains_pii: self.contains_pii,
            source_owner_email: self.source_owner_email.clone(),
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ChangeLogError::Config(format!(
            "{} must be a boolean, got {:?}",
            key, other
        ))),
    }
}
