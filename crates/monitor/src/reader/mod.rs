//! 청크 리더 -- 구분자 파일을 제한된 크기의 원시 행 배치로 읽습니다.
//!
//! [`ChunkReader`]는 파일을 한 번만 앞에서부터 읽는 비재시작 시퀀스입니다.
//! 메모리 사용량은 청크 크기에 비례하며 파일 크기와 무관합니다.
//!
//! # 처리 흐름
//! 1. `open`: 줄 수 사전 스캔 → 파일이 없거나 헤더뿐이면 `EmptyOrMissingSource`
//! 2. 헤더 줄 처리 ([`HeaderPolicy`])
//! 3. `next_chunk`: 유효 행이 `chunk_size`개 모이거나 EOF에 도달할 때까지 읽기
//!
//! 잘못된 줄(열 개수 불일치, UTF-8 아님, 닫히지 않은 인용, 선언 타입 불일치)은
//! 개별적으로 건너뛰고 카운트합니다. 빈 줄은 조용히 건너뜁니다.

pub mod fields;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::error::MonitorError;
use crate::schema::{ColumnType, RecordSchema};

pub use fields::split_fields;

/// 사전 스캔 시 읽기 버퍼 크기
const COUNT_BUFFER_SIZE: usize = 64 * 1024;

/// 헤더 줄 처리 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPolicy {
    /// 첫 줄을 버리고 스키마의 열 이름을 사용 (기본값)
    #[default]
    Skip,
    /// 첫 줄에서 열 이름을 읽음. 타입과 타임스탬프 열은 스키마를 따름
    FromFile,
}

/// 청크 리더 옵션
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// 청크당 최대 유효 행 수
    pub chunk_size: usize,
    /// 헤더 처리 방식
    pub header: HeaderPolicy,
    /// 필드 구분자
    pub delimiter: char,
    /// 최대 줄 길이 (바이트). 초과하는 줄은 잘못된 행으로 처리
    pub max_line_length: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000_000,
            header: HeaderPolicy::Skip,
            delimiter: ',',
            max_line_length: 1024 * 1024, // 1MB
        }
    }
}

/// 원시 행 -- 한 줄에서 분할된 텍스트 값 (열 순서)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 파일 내 줄 번호 (1부터, 헤더 포함)
    pub line: u64,
    /// 열 순서의 원시 값
    pub values: Vec<String>,
}

impl RawRow {
    /// 새 원시 행을 생성합니다.
    pub fn new(line: u64, values: Vec<String>) -> Self {
        Self { line, values }
    }
}

/// 원시 행 청크
#[derive(Debug, Clone)]
pub struct RawChunk {
    /// 청크 번호 (0부터)
    pub index: u64,
    /// 이 청크 행들의 열 이름
    pub columns: Arc<[String]>,
    /// 원시 행 (파일 순서)
    pub rows: Vec<RawRow>,
    /// 이 청크를 읽는 동안 건너뛴 잘못된 줄 수
    pub malformed: u64,
}

impl RawChunk {
    /// 새 청크를 생성합니다.
    pub fn new(index: u64, columns: Arc<[String]>, rows: Vec<RawRow>) -> Self {
        Self {
            index,
            columns,
            rows,
            malformed: 0,
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

/// 리더 누적 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReaderStats {
    /// 소비한 데이터 줄 수 (헤더 제외, 빈 줄/잘못된 줄 포함)
    pub lines_consumed: u64,
    /// 청크로 전달된 유효 행 수
    pub rows_read: u64,
    /// 건너뛴 잘못된 줄 수
    pub malformed_rows: u64,
    /// 건너뛴 빈 줄 수
    pub blank_lines: u64,
}

/// 청크 리더
pub struct ChunkReader {
    /// 소스 파일 경로
    path: PathBuf,
    /// 버퍼링된 파일 리더
    reader: BufReader<File>,
    /// 행의 열 이름 (스키마 또는 파일 헤더)
    columns: Arc<[String]>,
    /// 열 위치별 선언 타입 (타임스탬프 열은 정규화 단계에서 검사하므로 Text)
    types: Vec<ColumnType>,
    /// 리더 옵션
    options: ReaderOptions,
    /// 헤더를 제외한 전체 줄 수 (사전 스캔 결과)
    total_lines: u64,
    /// 마지막으로 읽은 줄 번호
    line_no: u64,
    /// 다음 청크 번호
    next_index: u64,
    /// 누적 통계
    stats: ReaderStats,
    /// EOF 도달 여부
    exhausted: bool,
}

impl ChunkReader {
    /// 파일을 열고 헤더를 처리합니다.
    ///
    /// # Errors
    /// - 파일이 없거나 헤더 외 데이터 줄이 없으면 `EmptyOrMissingSource`
    /// - 그 밖의 I/O 실패는 `SourceIo`
    /// - `HeaderPolicy::FromFile`에서 헤더를 분할할 수 없으면 `Schema`
    pub async fn open(
        path: impl AsRef<Path>,
        schema: &RecordSchema,
        options: ReaderOptions,
    ) -> Result<Self, MonitorError> {
        let path = path.as_ref();
        if options.chunk_size == 0 {
            return Err(MonitorError::Config {
                field: "chunk_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let total = count_lines(path)
            .await
            .map_err(|e| Self::open_error(path, e))?;
        if total <= 1 {
            return Err(MonitorError::EmptyOrMissingSource {
                path: path.display().to_string(),
            });
        }

        let file = File::open(path)
            .await
            .map_err(|e| Self::open_error(path, e))?;

        let mut reader = Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            columns: schema.columns().to_vec().into(),
            types: Vec::new(),
            options,
            total_lines: total - 1,
            line_no: 0,
            next_index: 0,
            stats: ReaderStats::default(),
            exhausted: false,
        };

        let header = reader.read_line().await?.unwrap_or_default();
        if reader.options.header == HeaderPolicy::FromFile {
            let text = String::from_utf8_lossy(&header);
            let names = split_fields(trim_line_end(&text), reader.options.delimiter)
                .map_err(|reason| MonitorError::Schema(format!("malformed header: {reason}")))?;
            reader.columns = names.into_iter().map(|n| n.trim().to_owned()).collect();
        }

        reader.types = reader
            .columns
            .iter()
            .map(|name| {
                if name == schema.timestamp_column() {
                    ColumnType::Text
                } else {
                    schema.column_type(name)
                }
            })
            .collect();

        tracing::debug!(
            path = %reader.path.display(),
            total_lines = reader.total_lines,
            columns = reader.columns.len(),
            "opened source file"
        );

        Ok(reader)
    }

    /// 다음 청크를 읽습니다. 입력이 소진되면 `None`을 반환합니다.
    ///
    /// # Errors
    /// 읽기 도중 I/O 실패 시 `SourceIo` (치명적)
    pub async fn next_chunk(&mut self) -> Result<Option<RawChunk>, MonitorError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut rows = Vec::with_capacity(self.options.chunk_size.min(8192));
        let mut malformed = 0u64;

        while rows.len() < self.options.chunk_size {
            let Some(bytes) = self.read_line().await? else {
                self.exhausted = true;
                break;
            };
            self.stats.lines_consumed += 1;

            match self.decode_line(self.line_no, &bytes) {
                Ok(Some(values)) => rows.push(RawRow::new(self.line_no, values)),
                Ok(None) => self.stats.blank_lines += 1,
                Err(err) => {
                    malformed += 1;
                    tracing::debug!(
                        path = %self.path.display(),
                        error = %err,
                        "skipping malformed row"
                    );
                }
            }
        }

        self.stats.rows_read += rows.len() as u64;
        self.stats.malformed_rows += malformed;

        if rows.is_empty() {
            return Ok(None);
        }

        let index = self.next_index;
        self.next_index += 1;
        Ok(Some(RawChunk {
            index,
            columns: Arc::clone(&self.columns),
            rows,
            malformed,
        }))
    }

    /// 헤더를 제외한 전체 줄 수를 반환합니다.
    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }

    /// 누적 통계를 반환합니다.
    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    /// 행의 열 이름을 반환합니다.
    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    /// 다음 줄을 원시 바이트로 읽습니다. EOF면 `None`.
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>, MonitorError> {
        let mut buf = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|source| MonitorError::SourceIo {
                path: self.path.display().to_string(),
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(buf))
    }

    /// 한 줄을 열 값으로 디코딩합니다. 빈 줄이면 `None`.
    fn decode_line(&self, line: u64, bytes: &[u8]) -> Result<Option<Vec<String>>, MonitorError> {
        let malformed = |reason: String| MonitorError::MalformedRow { line, reason };

        if bytes.len() > self.options.max_line_length {
            return Err(malformed(format!(
                "line length {} exceeds max {}",
                bytes.len(),
                self.options.max_line_length
            )));
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| malformed(format!("invalid UTF-8: {e}")))?;
        let text = trim_line_end(text);
        if text.trim().is_empty() {
            return Ok(None);
        }

        let values = split_fields(text, self.options.delimiter).map_err(malformed)?;
        if values.len() != self.columns.len() {
            return Err(malformed(format!(
                "expected {} fields, found {}",
                self.columns.len(),
                values.len()
            )));
        }

        for ((value, column_type), name) in values.iter().zip(&self.types).zip(self.columns.iter()) {
            if !column_type.accepts(value) {
                return Err(malformed(format!(
                    "value '{value}' in column '{name}' is not a valid {column_type:?}"
                )));
            }
        }

        Ok(Some(values))
    }

    fn open_error(path: &Path, err: std::io::Error) -> MonitorError {
        if err.kind() == std::io::ErrorKind::NotFound {
            MonitorError::EmptyOrMissingSource {
                path: path.display().to_string(),
            }
        } else {
            MonitorError::SourceIo {
                path: path.display().to_string(),
                source: err,
            }
        }
    }
}

/// 파일의 줄 수를 셉니다. 마지막 줄에 개행이 없어도 한 줄로 셉니다.
pub async fn count_lines(path: impl AsRef<Path>) -> std::io::Result<u64> {
    let mut file = File::open(path.as_ref()).await?;
    let mut buf = vec![0u8; COUNT_BUFFER_SIZE];
    let mut lines = 0u64;
    let mut last = None;

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        lines += buf[..n].iter().filter(|b| **b == b'\n').count() as u64;
        last = Some(buf[n - 1]);
    }

    if matches!(last, Some(b) if b != b'\n') {
        lines += 1;
    }
    Ok(lines)
}

fn trim_line_end(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}
