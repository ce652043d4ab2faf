//! 내장 알림 싱크와 진행 옵저버
//!
//! - [`TracingSink`]: warn 레벨 로그로 알림 출력 (기본값)
//! - [`JsonLinesSink`]: 그룹마다 JSON 한 줄씩 출력
//! - [`CollectingSink`]: 메모리에 수집 (테스트, 임베딩용)
//! - [`TracingProgress`]: debug 레벨로 진행률 출력

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use spikewatch_core::pipeline::{AlertSink, ProgressObserver};
use spikewatch_core::types::{AlertGroup, GroupKey};

/// 로그에 표시할 최대 그룹 수
pub const DEFAULT_DISPLAY_LIMIT: usize = 10;

/// 표시용 정렬: 카운트 내림차순, 같으면 윈도우 시작, 키 순
fn sorted_for_display(groups: &[AlertGroup]) -> Vec<&AlertGroup> {
    let mut sorted: Vec<&AlertGroup> = groups.iter().collect();
    sorted.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.window_start.cmp(&b.window_start))
            .then_with(|| a.key.cmp(&b.key))
    });
    sorted
}

/// tracing 로그로 알림을 출력하는 싱크
#[derive(Debug, Clone)]
pub struct TracingSink {
    display_limit: usize,
}

impl TracingSink {
    /// 기본 표시 한도(10개)로 생성합니다.
    pub fn new() -> Self {
        Self {
            display_limit: DEFAULT_DISPLAY_LIMIT,
        }
    }

    /// 표시 한도를 바꿉니다.
    pub fn with_display_limit(mut self, limit: usize) -> Self {
        self.display_limit = limit;
        self
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn report(&mut self, rule: &str, groups: &[AlertGroup]) {
        let sorted = sorted_for_display(groups);
        let shown: Vec<String> = sorted
            .iter()
            .take(self.display_limit)
            .map(|g| g.to_string())
            .collect();

        tracing::warn!(
            rule,
            groups = groups.len(),
            shown = shown.len(),
            "ALERT: {rule}\n{}",
            shown.join("\n")
        );
    }
}

/// JSON 한 줄에 대응하는 레코드
#[derive(Serialize)]
struct AlertLine<'a> {
    rule: &'a str,
    key: &'a GroupKey,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    count: u64,
}

/// 그룹마다 JSON 한 줄씩 쓰는 싱크
///
/// 쓰기 실패는 스캔을 중단하지 않고 에러 로그와 카운트로 남깁니다.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    lines_written: u64,
    write_errors: u64,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// 새 싱크를 생성합니다.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            lines_written: 0,
            write_errors: 0,
        }
    }

    /// 성공적으로 쓴 줄 수
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// 쓰기 실패 횟수
    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    /// 내부 writer를 반환합니다.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_group(&mut self, rule: &str, group: &AlertGroup) -> std::io::Result<()> {
        let line = AlertLine {
            rule,
            key: &group.key,
            window_start: group.window_start,
            window_end: group.window_end,
            count: group.count,
        };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write + Send> AlertSink for JsonLinesSink<W> {
    fn name(&self) -> &str {
        "json_lines"
    }

    fn report(&mut self, rule: &str, groups: &[AlertGroup]) {
        for group in sorted_for_display(groups) {
            match self.write_group(rule, group) {
                Ok(()) => self.lines_written += 1,
                Err(e) => {
                    self.write_errors += 1;
                    tracing::error!(rule, error = %e, "failed to write alert line");
                }
            }
        }
        if let Err(e) = self.writer.flush() {
            self.write_errors += 1;
            tracing::error!(rule, error = %e, "failed to flush alert output");
        }
    }
}

/// 받은 알림을 메모리에 모으는 싱크
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    reports: Vec<(String, Vec<AlertGroup>)>,
}

impl CollectingSink {
    /// 빈 싱크를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// `report` 호출 기록 (규칙 이름, 그룹)
    pub fn reports(&self) -> &[(String, Vec<AlertGroup>)] {
        &self.reports
    }

    /// `report` 호출 횟수
    pub fn calls(&self) -> usize {
        self.reports.len()
    }

    /// 특정 규칙이 보고한 모든 그룹
    pub fn groups_for(&self, rule: &str) -> Vec<&AlertGroup> {
        self.reports
            .iter()
            .filter(|(name, _)| name == rule)
            .flat_map(|(_, groups)| groups.iter())
            .collect()
    }

    /// 전체 그룹 수
    pub fn total_groups(&self) -> usize {
        self.reports.iter().map(|(_, groups)| groups.len()).sum()
    }
}

impl AlertSink for CollectingSink {
    fn name(&self) -> &str {
        "collecting"
    }

    fn report(&mut self, rule: &str, groups: &[AlertGroup]) {
        self.reports.push((rule.to_owned(), groups.to_vec()));
    }
}

/// debug 레벨로 진행률을 출력하는 옵저버
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn on_progress(&mut self, rows_processed: u64, total_rows: u64) {
        let percent = if total_rows == 0 {
            100.0
        } else {
            rows_processed as f64 * 100.0 / total_rows as f64
        };
        tracing::debug!(
            rows_processed,
            total_rows,
            percent = (percent * 10.0).round() / 10.0,
            "scan progress"
        );
    }
}
