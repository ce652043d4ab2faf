//! 모니터 에러 타입
//!
//! [`MonitorError`]는 스캔 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<MonitorError> for SpikewatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! # 전파 정책
//! - 행 단위 에러 (`MalformedRow`, `InvalidTimestamp`): 카운트 후 흡수
//! - 청크 단위 에러 (`StructuralChunk`, `UnexpectedParse`): 로그 후 다음 청크로 진행
//! - `EmptyOrMissingSource`: 복구 가능, 엔진이 `Rejected`로 정상 반환
//! - `SourceIo`: 치명적, 스캔을 중단하고 호출자에게 전파

use spikewatch_core::error::{ConfigError, SourceError, SpikewatchError};

/// 모니터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// 파일이 없거나 헤더 외 데이터 행이 없음
    #[error("source missing or empty: {path}")]
    EmptyOrMissingSource {
        /// 소스 파일 경로
        path: String,
    },

    /// 한 줄이 스키마의 열 구조로 디코딩되지 않음
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow {
        /// 1부터 시작하는 줄 번호
        line: u64,
        /// 실패 사유
        reason: String,
    },

    /// 타임스탬프 디코딩 실패
    #[error("invalid timestamp at line {line}: '{value}'")]
    InvalidTimestamp {
        /// 1부터 시작하는 줄 번호
        line: u64,
        /// 원본 값
        value: String,
    },

    /// 청크 전체에 타임스탬프 열이 없음
    #[error("chunk {chunk_index} has no '{column}' column")]
    StructuralChunk {
        /// 청크 번호 (0부터)
        chunk_index: u64,
        /// 누락된 열 이름
        column: String,
    },

    /// 스캔 도중 소스 파일 I/O 실패
    #[error("source io failure: {path}: {source}")]
    SourceIo {
        /// 소스 파일 경로
        path: String,
        /// 원인
        #[source]
        source: std::io::Error,
    },

    /// 그 밖의 청크 단위 파싱 실패
    #[error("unexpected parse failure in chunk {chunk_index} ({rows} rows): {reason}")]
    UnexpectedParse {
        /// 청크 번호 (0부터)
        chunk_index: u64,
        /// 청크의 행 수
        rows: usize,
        /// 원인
        reason: String,
    },

    /// 스키마 유효성 검증 실패
    #[error("schema error: {0}")]
    Schema(String),

    /// 규칙 유효성 검증 실패
    #[error("rule validation error: rule '{rule}': {reason}")]
    RuleValidation {
        /// 규칙 이름
        rule: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl MonitorError {
    /// 스캔을 중단해야 하는 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SourceIo { .. })
    }
}

impl From<MonitorError> for SpikewatchError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::EmptyOrMissingSource { path } => {
                SpikewatchError::Source(SourceError::EmptyOrMissing { path })
            }
            MonitorError::SourceIo { path, source } => {
                SpikewatchError::Source(SourceError::Unreadable {
                    path,
                    reason: source.to_string(),
                })
            }
            MonitorError::Config { field, reason } => {
                SpikewatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            rule @ MonitorError::RuleValidation { .. } => SpikewatchError::Rule(rule.to_string()),
            other => SpikewatchError::Source(SourceError::Layout(other.to_string())),
        }
    }
}
