//! 설정 관리 -- spikewatch.toml 파싱 및 런타임 설정
//!
//! [`SpikewatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SPIKEWATCH_MONITOR_CHUNK_SIZE=50000` 형식)
//! 3. 설정 파일 (`spikewatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), spikewatch_core::error::SpikewatchError> {
//! use spikewatch_core::config::SpikewatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = SpikewatchConfig::load("spikewatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = SpikewatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, SpikewatchError};

/// spikewatch 통합 설정
///
/// `spikewatch.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpikewatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 모니터 설정
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl SpikewatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SpikewatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SpikewatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SpikewatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                SpikewatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, SpikewatchError> {
        toml::from_str(toml_str).map_err(|e| {
            SpikewatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SPIKEWATCH_{SECTION}_{FIELD}`
    /// 예: `SPIKEWATCH_MONITOR_DATA_PATH=/data/export.csv`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SPIKEWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SPIKEWATCH_GENERAL_LOG_FORMAT");

        // Monitor
        override_string(&mut self.monitor.data_path, "SPIKEWATCH_MONITOR_DATA_PATH");
        override_usize(&mut self.monitor.chunk_size, "SPIKEWATCH_MONITOR_CHUNK_SIZE");
        override_string(&mut self.monitor.header, "SPIKEWATCH_MONITOR_HEADER");
        override_string(&mut self.monitor.window_mode, "SPIKEWATCH_MONITOR_WINDOW_MODE");
        override_string(&mut self.monitor.verbosity, "SPIKEWATCH_MONITOR_VERBOSITY");
        override_csv(
            &mut self.monitor.schema.columns,
            "SPIKEWATCH_MONITOR_SCHEMA_COLUMNS",
        );
        override_string(
            &mut self.monitor.schema.timestamp_column,
            "SPIKEWATCH_MONITOR_SCHEMA_TIMESTAMP_COLUMN",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 문자열 열거값과 수치 범위만 검사합니다. 스키마/규칙의 의미 검증은
    /// 모니터 모듈이 설정을 변환할 때 수행합니다.
    pub fn validate(&self) -> Result<(), SpikewatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        check_one_of("general.log_level", &self.general.log_level, &valid_levels)?;

        let valid_formats = ["json", "pretty"];
        check_one_of("general.log_format", &self.general.log_format, &valid_formats)?;

        let monitor = &self.monitor;
        if monitor.data_path.is_empty() {
            return Err(invalid("monitor.data_path", "must not be empty"));
        }
        if monitor.chunk_size == 0 {
            return Err(invalid("monitor.chunk_size", "must be greater than 0"));
        }
        check_one_of("monitor.header", &monitor.header, &["skip", "from_file"])?;
        check_one_of(
            "monitor.window_mode",
            &monitor.window_mode,
            &["chunk_local", "carry_over"],
        )?;
        check_one_of(
            "monitor.verbosity",
            &monitor.verbosity,
            &["quiet", "normal", "verbose"],
        )?;
        if monitor.delimiter.chars().count() != 1 {
            return Err(invalid(
                "monitor.delimiter",
                "must be exactly one character",
            ));
        }

        for (idx, rule) in monitor.rules.iter().enumerate() {
            let field = format!("monitor.rules[{idx}]");
            check_one_of(
                &format!("{field}.kind"),
                &rule.kind,
                &["rate_threshold", "grouped_threshold"],
            )?;
            if rule.threshold == 0 {
                return Err(invalid(&format!("{field}.threshold"), "must be greater than 0"));
            }
            rule.window
                .to_duration()
                .map_err(|reason| invalid(&format!("{field}.window"), &reason))?;
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 모니터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// 스캔할 로그 익스포트 파일 경로
    pub data_path: String,
    /// 청크당 최대 행 수
    pub chunk_size: usize,
    /// 헤더 처리 방식 (skip, from_file)
    pub header: String,
    /// 필드 구분자 (한 글자)
    pub delimiter: String,
    /// 윈도우 집계 방식 (chunk_local, carry_over)
    pub window_mode: String,
    /// 진단 로그 상세도 (quiet, normal, verbose)
    pub verbosity: String,
    /// 레코드 스키마
    pub schema: SchemaConfig,
    /// 알림 규칙 목록 (선언 순서대로 평가)
    pub rules: Vec<RuleConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_path: "/app/data/alert_project_data.csv".to_owned(),
            chunk_size: 1_000_000,
            header: "skip".to_owned(),
            delimiter: ",".to_owned(),
            window_mode: "chunk_local".to_owned(),
            verbosity: "normal".to_owned(),
            schema: SchemaConfig::default(),
            rules: vec![
                RuleConfig {
                    name: Some("fatal_error_rate".to_owned()),
                    kind: "rate_threshold".to_owned(),
                    threshold: 10,
                    window: WindowSetting::Text("1min".to_owned()),
                    ..RuleConfig::default()
                },
                RuleConfig {
                    name: Some("bundle_fatal_error".to_owned()),
                    kind: "grouped_threshold".to_owned(),
                    threshold: 10,
                    window: WindowSetting::Text("1h".to_owned()),
                    group_field: Some("bundle_id".to_owned()),
                    ..RuleConfig::default()
                },
            ],
        }
    }
}

/// 레코드 스키마 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// 열 이름 목록 (파일의 열 순서와 동일)
    pub columns: Vec<String>,
    /// 타임스탬프 열 이름
    pub timestamp_column: String,
    /// 타임스탬프 인코딩 (epoch_seconds, epoch_millis, rfc3339)
    pub timestamp_encoding: String,
    /// 열별 선언 타입 (text, integer, float, boolean). 미지정 열은 text.
    pub types: BTreeMap<String, String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        let columns = [
            "error_code",
            "error_message",
            "severity",
            "log_location",
            "mode",
            "model",
            "graphics",
            "session_id",
            "sdkv",
            "test_mode",
            "flow_id",
            "flow_type",
            "sdk_date",
            "publisher_id",
            "game_id",
            "bundle_id",
            "appv",
            "language",
            "os",
            "adv_id",
            "gdpr",
            "ccpa",
            "country_code",
            "date",
        ];
        Self {
            columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            timestamp_column: "date".to_owned(),
            timestamp_encoding: "epoch_seconds".to_owned(),
            types: BTreeMap::new(),
        }
    }
}

/// 알림 규칙 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// 규칙 식별자 (싱크에 전달). 미지정 시 kind를 사용합니다.
    pub name: Option<String>,
    /// 규칙 종류 (rate_threshold, grouped_threshold)
    pub kind: String,
    /// 임계값 (윈도우 카운트가 이 값을 초과하면 알림)
    pub threshold: u64,
    /// 시간 윈도우 (초 단위 정수 또는 "1min", "1h" 형식 문자열)
    pub window: WindowSetting,
    /// 매칭 대상 필드
    pub match_field: String,
    /// 매칭 값 (정확히 일치)
    pub match_value: String,
    /// 그룹화 필드 (grouped_threshold 전용)
    pub group_field: Option<String>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            name: None,
            kind: "rate_threshold".to_owned(),
            threshold: 10,
            window: WindowSetting::Seconds(60),
            match_field: "severity".to_owned(),
            match_value: "Error".to_owned(),
            group_field: None,
        }
    }
}

/// 시간 윈도우 설정값
///
/// TOML에서 `window = 60` 또는 `window = "1min"` 두 형식을 모두 허용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WindowSetting {
    /// 초 단위 정수
    Seconds(u64),
    /// 단위 접미사가 붙은 문자열 (s, sec, m, min, h, d)
    Text(String),
}

impl WindowSetting {
    /// 윈도우 길이를 `Duration`으로 변환합니다.
    ///
    /// 0초 윈도우나 알 수 없는 단위는 에러 메시지를 반환합니다.
    pub fn to_duration(&self) -> Result<Duration, String> {
        let secs = match self {
            Self::Seconds(secs) => *secs,
            Self::Text(text) => parse_window_secs(text)?,
        };
        if secs == 0 {
            return Err("window must be greater than 0 seconds".to_owned());
        }
        Ok(Duration::from_secs(secs))
    }
}

/// "90", "30s", "1min", "2h", "1d" 형식의 문자열을 초 단위로 변환합니다.
fn parse_window_secs(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);

    // "min"처럼 숫자가 생략된 경우 1로 간주
    let amount: u64 = if digits.is_empty() {
        1
    } else {
        digits
            .parse()
            .map_err(|e| format!("invalid window '{text}': {e}"))?
    };

    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" => 1,
        "m" | "min" | "mins" | "t" => 60,
        "h" | "hr" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        other => return Err(format!("invalid window '{text}': unknown unit '{other}'")),
    };

    amount
        .checked_mul(multiplier)
        .ok_or_else(|| format!("invalid window '{text}': overflow"))
}

fn invalid(field: &str, reason: &str) -> SpikewatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
    .into()
}

fn check_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), SpikewatchError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            &format!("must be one of: {}", allowed.join(", ")),
        ))
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}
