//! 모니터 설정
//!
//! [`MonitorConfig`]는 core의 문자열 기반 [`MonitorConfig`](spikewatch_core::config::MonitorConfig)를
//! 검증된 타입으로 변환한 실행 설정입니다. 스키마와 규칙은 이 단계에서 생성되며
//! 스캔 도중 바뀌지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! use spikewatch_core::config::SpikewatchConfig;
//! use spikewatch_monitor::config::MonitorConfig;
//!
//! let core_config = SpikewatchConfig::default();
//! let config = MonitorConfig::from_core(&core_config.monitor)?;
//! ```

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use spikewatch_core::config::MonitorConfig as CoreMonitorConfig;

use crate::diagnostics::Verbosity;
use crate::error::MonitorError;
use crate::reader::{HeaderPolicy, ReaderOptions};
use crate::rule::AlertRule;
use crate::schema::RecordSchema;

/// 청크 최대 크기
const MAX_CHUNK_SIZE: usize = 100_000_000;

/// 윈도우 집계 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// 청크마다 독립적으로 집계 (기본값). 청크 경계에 걸친 버스트는 나뉨
    #[default]
    ChunkLocal,
    /// 가장 늦은 열린 윈도우를 다음 청크로 이월
    CarryOver,
}

impl WindowMode {
    /// 설정 문자열에서 윈도우 방식을 파싱합니다.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chunk_local" => Some(Self::ChunkLocal),
            "carry_over" => Some(Self::CarryOver),
            _ => None,
        }
    }
}

/// 모니터 실행 설정
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// 스캔할 파일 경로
    pub data_path: PathBuf,
    /// 청크 리더 옵션
    pub reader: ReaderOptions,
    /// 윈도우 집계 방식
    pub window_mode: WindowMode,
    /// 진단 출력 상세도
    pub verbosity: Verbosity,
    /// 레코드 스키마
    pub schema: RecordSchema,
    /// 알림 규칙 (선언 순서대로 평가)
    pub rules: Vec<AlertRule>,
}

impl MonitorConfig {
    /// core 설정에서 실행 설정을 생성합니다.
    ///
    /// # Errors
    /// 문자열 열거값, 스키마, 규칙 중 하나라도 잘못되면 에러를 반환합니다.
    pub fn from_core(core: &CoreMonitorConfig) -> Result<Self, MonitorError> {
        let header = match core.header.as_str() {
            "skip" => HeaderPolicy::Skip,
            "from_file" => HeaderPolicy::FromFile,
            other => return Err(config_error("header", format!("unknown header policy '{other}'"))),
        };

        let mut chars = core.delimiter.chars();
        let (Some(delimiter), None) = (chars.next(), chars.next()) else {
            return Err(config_error("delimiter", "must be exactly one character".to_owned()));
        };

        let window_mode = WindowMode::parse(&core.window_mode).ok_or_else(|| {
            config_error(
                "window_mode",
                format!("unknown window mode '{}'", core.window_mode),
            )
        })?;
        let verbosity = Verbosity::parse(&core.verbosity).ok_or_else(|| {
            config_error("verbosity", format!("unknown verbosity '{}'", core.verbosity))
        })?;

        let schema = RecordSchema::from_config(&core.schema)?;
        let rules = core
            .rules
            .iter()
            .map(AlertRule::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            data_path: PathBuf::from(&core.data_path),
            reader: ReaderOptions {
                chunk_size: core.chunk_size,
                header,
                delimiter,
                ..ReaderOptions::default()
            },
            window_mode,
            verbosity,
            schema,
            rules,
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.data_path.as_os_str().is_empty() {
            return Err(config_error("data_path", "must not be empty".to_owned()));
        }

        if self.reader.chunk_size == 0 || self.reader.chunk_size > MAX_CHUNK_SIZE {
            return Err(config_error(
                "chunk_size",
                format!("must be 1-{MAX_CHUNK_SIZE}"),
            ));
        }

        if self.reader.max_line_length == 0 {
            return Err(config_error(
                "max_line_length",
                "must be greater than 0".to_owned(),
            ));
        }

        if matches!(self.reader.delimiter, '"' | '\n' | '\r') {
            return Err(config_error(
                "delimiter",
                format!("{:?} cannot be used as a delimiter", self.reader.delimiter),
            ));
        }

        self.schema.validate()?;

        let mut names = HashSet::new();
        for rule in &self.rules {
            if !names.insert(rule.name()) {
                return Err(MonitorError::RuleValidation {
                    rule: rule.name().to_owned(),
                    reason: "duplicate rule name".to_owned(),
                });
            }
        }

        Ok(())
    }
}

/// 모니터 설정 빌더
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// 스키마로 새 빌더를 생성합니다. 규칙은 비어 있습니다.
    pub fn new(schema: RecordSchema) -> Self {
        Self {
            config: MonitorConfig {
                data_path: PathBuf::from(CoreMonitorConfig::default().data_path),
                reader: ReaderOptions::default(),
                window_mode: WindowMode::default(),
                verbosity: Verbosity::default(),
                schema,
                rules: Vec::new(),
            },
        }
    }

    /// 파일 경로를 설정합니다.
    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_path = path.into();
        self
    }

    /// 청크 크기를 설정합니다.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.reader.chunk_size = size;
        self
    }

    /// 헤더 처리 방식을 설정합니다.
    pub fn header(mut self, header: HeaderPolicy) -> Self {
        self.config.reader.header = header;
        self
    }

    /// 필드 구분자를 설정합니다.
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.reader.delimiter = delimiter;
        self
    }

    /// 윈도우 집계 방식을 설정합니다.
    pub fn window_mode(mut self, mode: WindowMode) -> Self {
        self.config.window_mode = mode;
        self
    }

    /// 진단 상세도를 설정합니다.
    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.config.verbosity = verbosity;
        self
    }

    /// 규칙을 추가합니다.
    pub fn rule(mut self, rule: impl Into<AlertRule>) -> Self {
        self.config.rules.push(rule.into());
        self
    }

    /// 설정을 검증하고 `MonitorConfig`를 생성합니다.
    pub fn build(self) -> Result<MonitorConfig, MonitorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn config_error(field: &str, reason: String) -> MonitorError {
    MonitorError::Config {
        field: field.to_owned(),
        reason,
    }
}
