//! 에러 타입 -- 도메인별 에러 정의

/// spikewatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum SpikewatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 입력 소스 에러
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// 규칙 구성 에러
    #[error("rule error: {0}")]
    Rule(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 입력 소스 에러
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// 파일이 없거나 헤더 외 데이터 행이 없음 (복구 가능)
    #[error("source missing or empty: {path}")]
    EmptyOrMissing { path: String },

    /// 스캔 도중 파일을 읽을 수 없게 됨 (치명적)
    #[error("source unreadable: {path}: {reason}")]
    Unreadable { path: String, reason: String },

    /// 스키마 또는 헤더 구조 오류
    #[error("invalid source layout: {0}")]
    Layout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts() {
        let err: SpikewatchError = ConfigError::InvalidValue {
            field: "monitor.chunk_size".to_owned(),
            reason: "must be greater than 0".to_owned(),
        }
        .into();
        assert!(matches!(err, SpikewatchError::Config(_)));
        assert!(err.to_string().contains("monitor.chunk_size"));
    }

    #[test]
    fn source_error_display() {
        let err = SourceError::Unreadable {
            path: "/data/export.csv".to_owned(),
            reason: "permission denied".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/export.csv"));
        assert!(msg.contains("permission denied"));
    }
}
