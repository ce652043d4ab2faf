//! 행 정규화 -- 타임스탬프 열을 절대 시각으로 변환합니다.
//!
//! [`RowNormalizer`]는 원시 청크를 받아 타임스탬프를 디코딩하고,
//! 디코딩에 실패한 행은 버리고 카운트합니다 (치명적이지 않음).
//!
//! 청크의 열 목록에 타임스탬프 열이 아예 없으면 행 단위 실패가 아니라
//! 구조적 에러이므로 청크 전체를 거부합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::MonitorError;
use crate::reader::RawChunk;
use crate::schema::{RecordSchema, TimestampEncoding};

/// 정규화된 행
///
/// 불변식: `timestamp`는 항상 유효합니다. 원래의 텍스트 타임스탬프 자리는 비워집니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    /// 파일 내 줄 번호
    pub line: u64,
    /// 디코딩된 절대 시각
    pub timestamp: DateTime<Utc>,
    /// 열 순서의 원시 값 (타임스탬프 자리는 빈 문자열)
    pub values: Vec<String>,
}

/// 정규화된 청크 -- 규칙 평가의 단위
#[derive(Debug, Clone)]
pub struct NormalizedChunk {
    /// 청크 번호 (0부터)
    pub index: u64,
    /// 열 이름
    pub columns: Arc<[String]>,
    /// 정규화된 행 (파일 순서)
    pub rows: Vec<NormalizedRow>,
    /// 타임스탬프 디코딩 실패로 버려진 행 수
    pub invalid_timestamps: u64,
}

impl NormalizedChunk {
    /// 새 청크를 생성합니다.
    pub fn new(index: u64, columns: Arc<[String]>, rows: Vec<NormalizedRow>) -> Self {
        Self {
            index,
            columns,
            rows,
            invalid_timestamps: 0,
        }
    }

    /// 열 이름의 위치를 반환합니다.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// 행 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 행이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 행 정규화기
#[derive(Debug, Clone)]
pub struct RowNormalizer {
    /// 타임스탬프 열 이름
    timestamp_column: String,
    /// 타임스탬프 인코딩
    encoding: TimestampEncoding,
}

impl RowNormalizer {
    /// 스키마로부터 정규화기를 생성합니다.
    pub fn new(schema: &RecordSchema) -> Self {
        Self {
            timestamp_column: schema.timestamp_column().to_owned(),
            encoding: schema.timestamp_encoding(),
        }
    }

    /// 원시 청크를 정규화합니다.
    ///
    /// # Errors
    /// - 타임스탬프 열이 없으면 `StructuralChunk`
    /// - 행의 필드 수가 열 목록과 다르면 `UnexpectedParse`
    pub fn normalize(&self, raw: RawChunk) -> Result<NormalizedChunk, MonitorError> {
        let Some(ts_idx) = raw.column_index(&self.timestamp_column) else {
            return Err(MonitorError::StructuralChunk {
                chunk_index: raw.index,
                column: self.timestamp_column.clone(),
            });
        };

        let width = raw.columns.len();
        let total = raw.rows.len();
        let mut rows = Vec::with_capacity(total);
        let mut invalid = 0u64;

        for mut row in raw.rows {
            if row.values.len() != width {
                return Err(MonitorError::UnexpectedParse {
                    chunk_index: raw.index,
                    rows: total,
                    reason: format!(
                        "row at line {} has {} fields, expected {width}",
                        row.line,
                        row.values.len()
                    ),
                });
            }

            match self.encoding.decode(&row.values[ts_idx]) {
                Some(timestamp) => {
                    std::mem::take(&mut row.values[ts_idx]);
                    rows.push(NormalizedRow {
                        line: row.line,
                        timestamp,
                        values: row.values,
                    });
                }
                None => {
                    invalid += 1;
                    tracing::trace!(
                        line = row.line,
                        value = %row.values[ts_idx],
                        "dropping row with invalid timestamp"
                    );
                }
            }
        }

        Ok(NormalizedChunk {
            index: raw.index,
            columns: raw.columns,
            rows,
            invalid_timestamps: invalid,
        })
    }
}
