#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`schema`]: 열 순서, 선언 타입, 타임스탬프 열과 인코딩
//! - [`reader`]: 제한된 크기의 원시 행 청크 읽기 (헤더 처리, 잘못된 줄 건너뛰기)
//! - [`normalize`]: 타임스탬프 디코딩 및 실패 행 제거
//! - [`rule`]: 고정 윈도우 임계값 규칙 (`RateThreshold`, `GroupedThreshold`)
//! - [`engine`]: 전체 스캔 오케스트레이션과 상태 관리
//! - [`sink`]: 내장 알림 싱크와 진행 옵저버
//! - [`diagnostics`]: 청크 단위 드롭 보고 상세도
//! - [`config`]: 모니터 설정 (core 설정 변환)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! ChunkReader -> RowNormalizer -> [AlertRule...] -> AlertSink
//!     |               |                 |               |
//!  CSV chunks    DateTime<Utc>    window counts    tracing/JSON
//! ```

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod schema;
pub mod sink;

pub mod reader;
pub mod rule;

// --- 주요 타입 re-export ---

// 엔진
pub use engine::{EngineState, MonitoringEngine, MonitoringEngineBuilder, ScanOutcome, ScanReport};

// 설정
pub use config::{MonitorConfig, MonitorConfigBuilder, WindowMode};

// 에러
pub use error::MonitorError;

// 스키마
pub use schema::{ColumnType, RecordSchema, RecordSchemaBuilder, TimestampEncoding};

// 리더 / 정규화
pub use normalize::{NormalizedChunk, NormalizedRow, RowNormalizer};
pub use reader::{ChunkReader, HeaderPolicy, RawChunk, RawRow, ReaderOptions};

// 규칙
pub use rule::{AlertRule, GroupedThresholdRule, RateThresholdRule, RowPredicate, RuleKind, WindowCarry};

// 싱크 / 진단
pub use diagnostics::{Diagnostics, Verbosity};
pub use sink::{CollectingSink, JsonLinesSink, TracingProgress, TracingSink};
