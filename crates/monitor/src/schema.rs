//! 레코드 스키마 -- 열 순서, 선언 타입, 타임스탬프 열과 인코딩
//!
//! [`RecordSchema`]는 스캔 시작 시 한 번 생성되어 실행 내내 불변입니다.
//! 불변식: 타임스탬프 열은 반드시 열 목록에 포함되어야 하며 열 이름은 유일해야 합니다.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spikewatch_core::config::SchemaConfig;

use crate::error::MonitorError;

/// 열 선언 타입
///
/// 원시 값의 형식 검증에만 사용되며, 값 자체는 텍스트로 유지됩니다.
/// 빈 값은 null로 간주되어 모든 타입을 통과합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 임의의 텍스트 (기본값)
    #[default]
    Text,
    /// 부호 있는 정수
    Integer,
    /// 부동소수점
    Float,
    /// 불리언 (true/false/1/0)
    Boolean,
}

impl ColumnType {
    /// 문자열에서 열 타입을 파싱합니다. 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "str" | "string" | "object" => Some(Self::Text),
            "integer" | "int" | "int64" => Some(Self::Integer),
            "float" | "float64" | "double" => Some(Self::Float),
            "boolean" | "bool" => Some(Self::Boolean),
            _ => None,
        }
    }

    /// 원시 값이 이 타입으로 해석 가능한지 확인합니다.
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return true;
        }
        match self {
            Self::Text => true,
            Self::Integer => value.parse::<i64>().is_ok(),
            Self::Float => value.parse::<f64>().is_ok(),
            Self::Boolean => matches!(
                value.to_ascii_lowercase().as_str(),
                "true" | "false" | "1" | "0"
            ),
        }
    }
}

/// 타임스탬프 열 인코딩
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampEncoding {
    /// Unix epoch 기준 초 (정수 또는 소수)
    #[default]
    EpochSeconds,
    /// Unix epoch 기준 밀리초
    EpochMillis,
    /// RFC 3339 문자열
    Rfc3339,
}

impl TimestampEncoding {
    /// 문자열에서 인코딩을 파싱합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "epoch_seconds" | "seconds" | "s" => Some(Self::EpochSeconds),
            "epoch_millis" | "millis" | "ms" => Some(Self::EpochMillis),
            "rfc3339" | "iso8601" => Some(Self::Rfc3339),
            _ => None,
        }
    }

    /// 원시 값을 절대 시각으로 디코딩합니다.
    ///
    /// 빈 값, 숫자가 아닌 값, 유한하지 않은 값, 표현 범위를 벗어난 값은 `None`입니다.
    pub fn decode(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match self {
            Self::EpochSeconds => decode_fractional(raw, 1.0),
            Self::EpochMillis => match raw.parse::<i64>() {
                Ok(millis) => DateTime::from_timestamp_millis(millis),
                Err(_) => decode_fractional(raw, 1_000.0),
            },
            Self::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// `units_per_second` 단위의 숫자 문자열을 시각으로 변환합니다.
fn decode_fractional(raw: &str, units_per_second: f64) -> Option<DateTime<Utc>> {
    if units_per_second == 1.0
        && let Ok(secs) = raw.parse::<i64>()
    {
        return DateTime::from_timestamp(secs, 0);
    }

    let value = raw.parse::<f64>().ok()? / units_per_second;
    if !value.is_finite() || value.abs() > i64::MAX as f64 {
        return None;
    }
    let secs = value.floor();
    let nanos = ((value - secs) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

/// 레코드 스키마
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    /// 열 이름 (파일 순서)
    columns: Vec<String>,
    /// 열별 선언 타입 (미지정 열은 Text)
    types: HashMap<String, ColumnType>,
    /// 타임스탬프 열 이름
    timestamp_column: String,
    /// 타임스탬프 인코딩
    timestamp_encoding: TimestampEncoding,
}

impl RecordSchema {
    /// 모든 열이 텍스트이고 epoch 초 인코딩을 사용하는 스키마를 생성합니다.
    pub fn new(
        columns: impl IntoIterator<Item = impl Into<String>>,
        timestamp_column: impl Into<String>,
    ) -> Result<Self, MonitorError> {
        RecordSchemaBuilder::new(columns, timestamp_column).build()
    }

    /// 스키마 빌더를 생성합니다.
    pub fn builder(
        columns: impl IntoIterator<Item = impl Into<String>>,
        timestamp_column: impl Into<String>,
    ) -> RecordSchemaBuilder {
        RecordSchemaBuilder::new(columns, timestamp_column)
    }

    /// core 설정의 스키마 섹션에서 스키마를 생성합니다.
    pub fn from_config(config: &SchemaConfig) -> Result<Self, MonitorError> {
        let encoding = TimestampEncoding::from_str_loose(&config.timestamp_encoding)
            .ok_or_else(|| {
                MonitorError::Schema(format!(
                    "unknown timestamp encoding '{}'",
                    config.timestamp_encoding
                ))
            })?;

        let mut builder = Self::builder(config.columns.iter().cloned(), &config.timestamp_column)
            .timestamp_encoding(encoding);

        for (column, type_name) in &config.types {
            let column_type = ColumnType::from_str_loose(type_name).ok_or_else(|| {
                MonitorError::Schema(format!(
                    "unknown type '{type_name}' for column '{column}'"
                ))
            })?;
            builder = builder.column_type(column, column_type);
        }

        builder.build()
    }

    /// 스키마 불변식을 검증합니다.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.columns.is_empty() {
            return Err(MonitorError::Schema("column list must not be empty".to_owned()));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.is_empty() {
                return Err(MonitorError::Schema("column names must not be empty".to_owned()));
            }
            if !seen.insert(column.as_str()) {
                return Err(MonitorError::Schema(format!(
                    "duplicate column name '{column}'"
                )));
            }
        }

        if !seen.contains(self.timestamp_column.as_str()) {
            return Err(MonitorError::Schema(format!(
                "timestamp column '{}' is not in the column list",
                self.timestamp_column
            )));
        }

        if let Some(unknown) = self.types.keys().find(|name| !seen.contains(name.as_str())) {
            return Err(MonitorError::Schema(format!(
                "type declared for unknown column '{unknown}'"
            )));
        }

        Ok(())
    }

    /// 열 이름 목록을 반환합니다.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 열 개수를 반환합니다.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// 타임스탬프 열 이름을 반환합니다.
    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    /// 타임스탬프 인코딩을 반환합니다.
    pub fn timestamp_encoding(&self) -> TimestampEncoding {
        self.timestamp_encoding
    }

    /// 열의 선언 타입을 반환합니다. 미지정 열은 `Text`입니다.
    pub fn column_type(&self, column: &str) -> ColumnType {
        self.types.get(column).copied().unwrap_or_default()
    }

    /// 열 이름의 위치를 반환합니다.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// 레코드 스키마 빌더
pub struct RecordSchemaBuilder {
    schema: RecordSchema,
}

impl RecordSchemaBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new(
        columns: impl IntoIterator<Item = impl Into<String>>,
        timestamp_column: impl Into<String>,
    ) -> Self {
        Self {
            schema: RecordSchema {
                columns: columns.into_iter().map(Into::into).collect(),
                types: HashMap::new(),
                timestamp_column: timestamp_column.into(),
                timestamp_encoding: TimestampEncoding::default(),
            },
        }
    }

    /// 열 타입을 선언합니다.
    pub fn column_type(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.schema.types.insert(column.into(), column_type);
        self
    }

    /// 타임스탬프 인코딩을 설정합니다.
    pub fn timestamp_encoding(mut self, encoding: TimestampEncoding) -> Self {
        self.schema.timestamp_encoding = encoding;
        self
    }

    /// 스키마를 검증하고 생성합니다.
    pub fn build(self) -> Result<RecordSchema, MonitorError> {
        self.schema.validate()?;
        Ok(self.schema)
    }
}
