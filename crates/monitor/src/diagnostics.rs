//! 진단 출력 핸들
//!
//! 청크 단위 드롭 보고(잘못된 행, 타임스탬프 실패, 건너뛴 청크)의 로그 레벨을 결정합니다.
//! 전역 subscriber 설정은 바이너리에서만 수행하며, 이 핸들은 엔진 생성 시 주입됩니다.

use serde::{Deserialize, Serialize};

/// 진단 출력 상세도
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// 드롭 보고를 debug 레벨로 내림
    Quiet,
    /// 드롭이 있을 때 info 레벨로 보고 (기본값)
    #[default]
    Normal,
    /// 드롭이 있을 때 warn 레벨로 보고하고, 청크마다 요약을 info로 출력
    Verbose,
}

impl Verbosity {
    /// 설정 문자열에서 상세도를 파싱합니다.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quiet" => Some(Self::Quiet),
            "normal" => Some(Self::Normal),
            "verbose" => Some(Self::Verbose),
            _ => None,
        }
    }
}

/// 청크 하나의 드롭 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkDrops {
    /// 청크 번호
    pub chunk_index: u64,
    /// 정규화 후 남은 행 수
    pub rows: usize,
    /// 잘못된 줄 수
    pub malformed: u64,
    /// 타임스탬프 디코딩 실패 수
    pub invalid_timestamps: u64,
}

impl ChunkDrops {
    /// 드롭된 행이 있는지 확인합니다.
    pub fn has_drops(&self) -> bool {
        self.malformed > 0 || self.invalid_timestamps > 0
    }
}

/// 진단 핸들
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    verbosity: Verbosity,
}

impl Diagnostics {
    /// 상세도를 지정해 핸들을 생성합니다.
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// 상세도
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// 청크 하나의 드롭을 보고합니다.
    pub fn chunk_drops(&self, drops: &ChunkDrops) {
        if !drops.has_drops() {
            if self.verbosity == Verbosity::Verbose {
                tracing::info!(chunk = drops.chunk_index, rows = drops.rows, "chunk normalized");
            }
            return;
        }

        match self.verbosity {
            Verbosity::Quiet => tracing::debug!(
                chunk = drops.chunk_index,
                rows = drops.rows,
                malformed = drops.malformed,
                invalid_timestamps = drops.invalid_timestamps,
                "rows dropped from chunk"
            ),
            Verbosity::Normal => tracing::info!(
                chunk = drops.chunk_index,
                rows = drops.rows,
                malformed = drops.malformed,
                invalid_timestamps = drops.invalid_timestamps,
                "rows dropped from chunk"
            ),
            Verbosity::Verbose => tracing::warn!(
                chunk = drops.chunk_index,
                rows = drops.rows,
                malformed = drops.malformed,
                invalid_timestamps = drops.invalid_timestamps,
                "rows dropped from chunk"
            ),
        }
    }

    /// 건너뛴 청크를 보고합니다. 상세도와 무관하게 warn 레벨입니다.
    pub fn chunk_skipped(&self, chunk_index: u64, error: &dyn std::error::Error) {
        tracing::warn!(chunk = chunk_index, error = %error, "skipping chunk");
    }
}
