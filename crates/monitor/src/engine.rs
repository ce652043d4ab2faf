//! 모니터링 엔진 -- 청크 읽기/정규화/규칙 평가/알림 전달의 전체 흐름을 관리합니다.
//!
//! # 처리 흐름
//! ```text
//! ChunkReader -> RowNormalizer -> [AlertRule...] -> AlertSink
//! ```
//!
//! 단일 태스크에서 순차적으로 동작합니다. 청크 하나를 읽고, 정규화하고,
//! 모든 규칙으로 평가하고, 결과를 싱크에 전달한 뒤에야 다음 청크를 요청합니다.
//! 대기 지점은 파일 읽기뿐입니다.
//!
//! # 상태 전이
//! ```text
//! Idle -> Validating -> Streaming -> (Normalizing -> Evaluating -> Reporting) -> Streaming -> ... -> Done
//!                    \-> Rejected             (파일 없음 / 헤더뿐)
//!         Streaming  -> Aborted               (읽기 도중 I/O 실패)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use spikewatch_core::metrics as m;
use spikewatch_core::pipeline::{AlertSink, ProgressObserver};
use spikewatch_core::types::AlertGroup;

use crate::config::{MonitorConfig, WindowMode};
use crate::diagnostics::{ChunkDrops, Diagnostics};
use crate::error::MonitorError;
use crate::normalize::{NormalizedChunk, RowNormalizer};
use crate::reader::{ChunkReader, ReaderOptions};
use crate::rule::{AlertRule, WindowCarry};
use crate::schema::RecordSchema;
use crate::sink::TracingProgress;

/// 엔진 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// 생성됨, 아직 스캔하지 않음
    Idle,
    /// 소스 파일 확인 중
    Validating,
    /// 다음 청크를 읽는 중
    Streaming,
    /// 청크 정규화 중
    Normalizing,
    /// 규칙 평가 중
    Evaluating,
    /// 싱크로 전달 중
    Reporting,
    /// 스캔 완료
    Done,
    /// 치명적 에러로 중단
    Aborted,
    /// 소스가 없거나 비어 있어 거부됨
    Rejected,
}

impl EngineState {
    /// 상태 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Streaming => "streaming",
            Self::Normalizing => "normalizing",
            Self::Evaluating => "evaluating",
            Self::Reporting => "reporting",
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Rejected => "rejected",
        }
    }

    /// 종료 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Rejected)
    }
}

/// 스캔 결과 구분
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// 파일 끝까지 처리함
    Done,
    /// 소스가 없거나 데이터 행이 없어 처리하지 않음
    Rejected,
}

/// 스캔 한 번의 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// 스캔 식별자
    pub scan_id: Uuid,
    /// 결과 구분
    pub outcome: ScanOutcome,
    /// 소스 파일 경로
    pub path: String,
    /// 헤더를 제외한 전체 줄 수
    pub total_lines: u64,
    /// 평가까지 마친 청크 수
    pub chunks_processed: u64,
    /// 구조적 에러로 건너뛴 청크 수
    pub chunks_skipped: u64,
    /// 리더가 전달한 유효 행 수
    pub rows_read: u64,
    /// 잘못된 줄 수
    pub malformed_rows: u64,
    /// 타임스탬프 디코딩 실패 수
    pub invalid_timestamps: u64,
    /// 규칙 평가에 사용된 행 수
    pub rows_evaluated: u64,
    /// 싱크 호출 횟수
    pub sink_calls: u64,
    /// 싱크로 전달된 알림 그룹 수
    pub alert_groups: u64,
    /// 소요 시간 (밀리초)
    pub elapsed_ms: u64,
}

impl ScanReport {
    fn new(scan_id: Uuid, path: &Path) -> Self {
        Self {
            scan_id,
            outcome: ScanOutcome::Done,
            path: path.display().to_string(),
            total_lines: 0,
            chunks_processed: 0,
            chunks_skipped: 0,
            rows_read: 0,
            malformed_rows: 0,
            invalid_timestamps: 0,
            rows_evaluated: 0,
            sink_calls: 0,
            alert_groups: 0,
            elapsed_ms: 0,
        }
    }

    /// 소스가 거부되었는지 확인합니다.
    pub fn is_rejected(&self) -> bool {
        self.outcome == ScanOutcome::Rejected
    }

    fn finish(&mut self, started: Instant) {
        self.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    }
}

/// 모니터링 엔진
///
/// 규칙 목록과 스키마는 생성 후 바뀌지 않습니다.
/// `carry_over` 모드의 이월 상태는 규칙마다 하나씩 엔진이 소유하며 스캔마다 초기화됩니다.
///
/// # 사용 예시
/// ```ignore
/// use spikewatch_monitor::{MonitoringEngine, TracingSink};
///
/// let mut engine = MonitoringEngine::from_config(config)?;
/// let mut sink = TracingSink::new();
/// let report = engine.ingest_and_analyze("/app/data/export.csv", 100_000, &mut sink).await?;
/// ```
pub struct MonitoringEngine {
    /// 레코드 스키마
    schema: Arc<RecordSchema>,
    /// 행 정규화기
    normalizer: RowNormalizer,
    /// 평가 순서대로의 규칙
    rules: Vec<AlertRule>,
    /// 규칙별 이월 상태 (`rules`와 같은 순서)
    carries: Vec<WindowCarry>,
    /// 윈도우 집계 방식
    window_mode: WindowMode,
    /// 리더 옵션 (청크 크기는 호출마다 덮어씀)
    reader_options: ReaderOptions,
    /// 기본 소스 경로 (`scan`에서 사용)
    data_path: Option<PathBuf>,
    /// 진단 핸들
    diagnostics: Diagnostics,
    /// 진행 옵저버
    progress: Box<dyn ProgressObserver>,
    /// 현재 상태
    state: EngineState,
}

impl MonitoringEngine {
    /// 빌더를 생성합니다.
    pub fn builder(schema: RecordSchema) -> MonitoringEngineBuilder {
        MonitoringEngineBuilder::new(schema)
    }

    /// 검증된 설정에서 엔진을 생성합니다.
    pub fn from_config(config: MonitorConfig) -> Result<Self, MonitorError> {
        MonitoringEngineBuilder::new(config.schema)
            .rules(config.rules)
            .window_mode(config.window_mode)
            .reader_options(config.reader)
            .data_path(config.data_path)
            .diagnostics(Diagnostics::new(config.verbosity))
            .build()
    }

    /// 현재 상태를 반환합니다.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// 규칙 목록을 반환합니다.
    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// 스키마를 반환합니다.
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// 윈도우 집계 방식을 반환합니다.
    pub fn window_mode(&self) -> WindowMode {
        self.window_mode
    }

    /// 설정된 기본 경로와 청크 크기로 스캔합니다.
    ///
    /// # Errors
    /// 기본 경로가 없으면 `Config`, 그 밖에는 [`ingest_and_analyze`](Self::ingest_and_analyze)와 같음
    pub async fn scan<S>(&mut self, sink: &mut S) -> Result<ScanReport, MonitorError>
    where
        S: AlertSink + ?Sized,
    {
        let Some(path) = self.data_path.clone() else {
            return Err(MonitorError::Config {
                field: "data_path".to_owned(),
                reason: "no source path configured".to_owned(),
            });
        };
        let chunk_size = self.reader_options.chunk_size;
        self.ingest_and_analyze(path, chunk_size, sink).await
    }

    /// 파일 하나를 청크 단위로 스캔하고 임계값 초과 그룹을 싱크로 전달합니다.
    ///
    /// 소스 파일이 없거나 헤더뿐이면 에러가 아니라 `ScanOutcome::Rejected` 리포트를 반환하며
    /// 싱크는 호출되지 않습니다.
    ///
    /// # Errors
    /// - 청크 크기가 0이면 `Config`
    /// - 스캔 도중 I/O 실패 시 `SourceIo` (상태는 `Aborted`)
    pub async fn ingest_and_analyze<S>(
        &mut self,
        path: impl AsRef<Path>,
        chunk_size: usize,
        sink: &mut S,
    ) -> Result<ScanReport, MonitorError>
    where
        S: AlertSink + ?Sized,
    {
        let path = path.as_ref();
        let scan_id = Uuid::new_v4();
        let span = tracing::info_span!("scan", %scan_id, path = %path.display());
        self.run_scan(scan_id, path, chunk_size, sink)
            .instrument(span)
            .await
    }

    async fn run_scan<S>(
        &mut self,
        scan_id: Uuid,
        path: &Path,
        chunk_size: usize,
        sink: &mut S,
    ) -> Result<ScanReport, MonitorError>
    where
        S: AlertSink + ?Sized,
    {
        let started = Instant::now();
        let mut report = ScanReport::new(scan_id, path);
        self.carries = vec![WindowCarry::new(); self.rules.len()];
        self.state = EngineState::Validating;

        let options = ReaderOptions {
            chunk_size,
            ..self.reader_options.clone()
        };
        let mut reader = match ChunkReader::open(path, &self.schema, options).await {
            Ok(reader) => reader,
            Err(MonitorError::EmptyOrMissingSource { path }) => {
                tracing::error!(path, "source file is missing or has no data rows");
                self.state = EngineState::Rejected;
                report.outcome = ScanOutcome::Rejected;
                report.finish(started);
                return Ok(report);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to open source file");
                self.state = EngineState::Aborted;
                return Err(e);
            }
        };

        report.total_lines = reader.total_lines();
        tracing::info!(
            total_lines = report.total_lines,
            chunk_size,
            rules = self.rules.len(),
            sink = sink.name(),
            "scan started"
        );
        self.progress.on_progress(0, report.total_lines);
        let mut last_progress = 0u64;

        loop {
            self.state = EngineState::Streaming;
            let raw = match reader.next_chunk().await {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "source read failed, aborting scan");
                    self.state = EngineState::Aborted;
                    return Err(e);
                }
            };

            let chunk_started = Instant::now();
            let chunk_index = raw.index;
            let malformed = raw.malformed;
            report.malformed_rows += malformed;
            metrics::counter!(m::MONITOR_ROWS_READ_TOTAL).increment(raw.len() as u64);
            metrics::counter!(m::MONITOR_MALFORMED_ROWS_TOTAL).increment(malformed);

            self.state = EngineState::Normalizing;
            let chunk = match self.normalizer.normalize(raw) {
                Ok(chunk) => chunk,
                Err(e) => {
                    report.chunks_skipped += 1;
                    self.skip_chunk(chunk_index, &e);
                    last_progress = reader.stats().lines_consumed;
                    self.progress.on_progress(last_progress, report.total_lines);
                    continue;
                }
            };

            report.invalid_timestamps += chunk.invalid_timestamps;
            report.rows_evaluated += chunk.len() as u64;
            metrics::counter!(m::MONITOR_INVALID_TIMESTAMPS_TOTAL)
                .increment(chunk.invalid_timestamps);
            self.diagnostics.chunk_drops(&ChunkDrops {
                chunk_index,
                rows: chunk.len(),
                malformed,
                invalid_timestamps: chunk.invalid_timestamps,
            });

            if !chunk.is_empty() {
                self.evaluate(&chunk, sink, &mut report);
            }

            report.chunks_processed += 1;
            metrics::counter!(m::MONITOR_CHUNKS_PROCESSED_TOTAL).increment(1);
            metrics::histogram!(m::MONITOR_CHUNK_DURATION_SECONDS)
                .record(chunk_started.elapsed().as_secs_f64());
            last_progress = reader.stats().lines_consumed;
            self.progress.on_progress(last_progress, report.total_lines);
        }

        // 마지막 읽기에서 행 없이 끝난 줄들은 청크로 반환되지 않으므로 리더 통계로 맞춥니다.
        let stats = reader.stats();
        let trailing_malformed = stats.malformed_rows.saturating_sub(report.malformed_rows);
        if trailing_malformed > 0 {
            report.malformed_rows += trailing_malformed;
            metrics::counter!(m::MONITOR_MALFORMED_ROWS_TOTAL).increment(trailing_malformed);
        }
        if stats.lines_consumed > last_progress {
            self.progress.on_progress(stats.lines_consumed, report.total_lines);
        }

        if self.window_mode == WindowMode::CarryOver {
            self.flush_carries(sink, &mut report);
        }

        report.rows_read = reader.stats().rows_read;
        report.finish(started);
        self.state = EngineState::Done;

        tracing::info!(
            chunks = report.chunks_processed,
            skipped = report.chunks_skipped,
            rows = report.rows_read,
            malformed = report.malformed_rows,
            invalid_timestamps = report.invalid_timestamps,
            alert_groups = report.alert_groups,
            elapsed_ms = report.elapsed_ms,
            "scan finished"
        );
        Ok(report)
    }

    /// 정규화된 청크를 모든 규칙으로 평가하고 결과를 전달합니다.
    fn evaluate<S>(&mut self, chunk: &NormalizedChunk, sink: &mut S, report: &mut ScanReport)
    where
        S: AlertSink + ?Sized,
    {
        for (rule, carry) in self.rules.iter().zip(self.carries.iter_mut()) {
            self.state = EngineState::Evaluating;
            let groups = match self.window_mode {
                WindowMode::ChunkLocal => rule.check(chunk),
                WindowMode::CarryOver => rule.check_carrying(chunk, carry),
            };
            if !groups.is_empty() {
                self.state = EngineState::Reporting;
                deliver(sink, rule.name(), &groups, report);
            }
        }
    }

    /// 스트림 끝에서 이월된 윈도우를 평가합니다.
    fn flush_carries<S>(&mut self, sink: &mut S, report: &mut ScanReport)
    where
        S: AlertSink + ?Sized,
    {
        for (rule, carry) in self.rules.iter().zip(self.carries.iter_mut()) {
            let groups = rule.flush(carry);
            if !groups.is_empty() {
                self.state = EngineState::Reporting;
                deliver(sink, rule.name(), &groups, report);
            }
        }
    }

    fn skip_chunk(&self, chunk_index: u64, error: &MonitorError) {
        let reason = match error {
            MonitorError::StructuralChunk { .. } => "structural",
            _ => "parse",
        };
        metrics::counter!(m::MONITOR_CHUNKS_SKIPPED_TOTAL, m::LABEL_REASON => reason)
            .increment(1);

        match error {
            MonitorError::UnexpectedParse {
                chunk_index,
                rows,
                reason,
            } => tracing::error!(
                chunk = chunk_index,
                rows,
                cause = %reason,
                "unexpected parse failure, skipping chunk"
            ),
            other => self.diagnostics.chunk_skipped(chunk_index, other),
        }
    }
}

fn deliver<S>(sink: &mut S, rule: &str, groups: &[AlertGroup], report: &mut ScanReport)
where
    S: AlertSink + ?Sized,
{
    sink.report(rule, groups);
    report.sink_calls += 1;
    report.alert_groups += groups.len() as u64;
    metrics::counter!(m::MONITOR_ALERT_GROUPS_TOTAL, m::LABEL_RULE => rule.to_owned())
        .increment(groups.len() as u64);
}

/// 모니터링 엔진 빌더
pub struct MonitoringEngineBuilder {
    schema: RecordSchema,
    rules: Vec<AlertRule>,
    window_mode: WindowMode,
    reader_options: ReaderOptions,
    data_path: Option<PathBuf>,
    diagnostics: Diagnostics,
    progress: Option<Box<dyn ProgressObserver>>,
}

impl MonitoringEngineBuilder {
    /// 스키마로 새 빌더를 생성합니다.
    pub fn new(schema: RecordSchema) -> Self {
        Self {
            schema,
            rules: Vec::new(),
            window_mode: WindowMode::default(),
            reader_options: ReaderOptions::default(),
            data_path: None,
            diagnostics: Diagnostics::default(),
            progress: None,
        }
    }

    /// 규칙을 추가합니다.
    pub fn rule(mut self, rule: impl Into<AlertRule>) -> Self {
        self.rules.push(rule.into());
        self
    }

    /// 규칙 목록을 추가합니다.
    pub fn rules(mut self, rules: impl IntoIterator<Item = AlertRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// 윈도우 집계 방식을 설정합니다.
    pub fn window_mode(mut self, mode: WindowMode) -> Self {
        self.window_mode = mode;
        self
    }

    /// 리더 옵션을 설정합니다.
    pub fn reader_options(mut self, options: ReaderOptions) -> Self {
        self.reader_options = options;
        self
    }

    /// `scan`에서 사용할 기본 소스 경로를 설정합니다.
    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    /// 진단 핸들을 설정합니다.
    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// 진행 옵저버를 설정합니다. 기본값은 [`TracingProgress`]입니다.
    pub fn progress(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.progress = Some(observer);
        self
    }

    /// 엔진을 빌드합니다.
    ///
    /// # Errors
    /// 스키마가 잘못되었거나 규칙 이름이 중복되면 에러를 반환합니다.
    pub fn build(self) -> Result<MonitoringEngine, MonitorError> {
        self.schema.validate()?;

        let mut names = std::collections::HashSet::new();
        for rule in &self.rules {
            if !names.insert(rule.name()) {
                return Err(MonitorError::RuleValidation {
                    rule: rule.name().to_owned(),
                    reason: "duplicate rule name".to_owned(),
                });
            }
        }
        if self.rules.is_empty() {
            tracing::warn!("monitoring engine built without rules, scans will produce no alerts");
        }

        Ok(MonitoringEngine {
            normalizer: RowNormalizer::new(&self.schema),
            schema: Arc::new(self.schema),
            carries: vec![WindowCarry::new(); self.rules.len()],
            rules: self.rules,
            window_mode: self.window_mode,
            reader_options: self.reader_options,
            data_path: self.data_path,
            diagnostics: self.diagnostics,
            progress: self
                .progress
                .unwrap_or_else(|| Box::new(TracingProgress)),
            state: EngineState::Idle,
        })
    }
}
