//! 통합 테스트 -- 파일 읽기부터 싱크 전달까지의 전체 스캔 흐름 검증

use std::fmt::Write as _;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spikewatch_core::config::{SchemaConfig, SpikewatchConfig};
use spikewatch_core::pipeline::ProgressObserver;
use spikewatch_core::types::GroupKey;
use spikewatch_monitor::{
    CollectingSink, EngineState, GroupedThresholdRule, HeaderPolicy, JsonLinesSink,
    MonitorConfig, MonitoringEngine, RateThresholdRule, ReaderOptions, RecordSchema,
    ScanOutcome, WindowMode,
};

const HEADER: &str = "date,severity,bundle_id";
/// 분 경계에 정렬된 시각
const BASE: i64 = 1_700_000_040;

fn schema() -> RecordSchema {
    RecordSchema::new(["date", "severity", "bundle_id"], "date").unwrap()
}

fn rate(threshold: u64) -> RateThresholdRule {
    RateThresholdRule::new("fatal_error_rate", threshold, Duration::from_secs(60)).unwrap()
}

fn grouped(threshold: u64) -> GroupedThresholdRule {
    GroupedThresholdRule::new("bundle_fatal_error", threshold, Duration::from_secs(3600)).unwrap()
}

fn csv(rows: &[(i64, &str, &str)]) -> String {
    let mut out = format!("{HEADER}\n");
    for (ts, severity, bundle) in rows {
        writeln!(out, "{ts},{severity},{bundle}").unwrap();
    }
    out
}

fn write_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn errors(n: usize, start: i64, bundle: &'static str) -> Vec<(i64, &'static str, &'static str)> {
    (0..n).map(|i| (start + i as i64, "Error", bundle)).collect()
}

/// 1분 안의 에러 15건, T=10 -> 그룹 하나, count 15
#[tokio::test]
async fn test_fifteen_errors_in_one_minute() {
    let file = write_file(&csv(&errors(15, BASE, "com.app")));
    let mut engine = MonitoringEngine::builder(schema()).rule(rate(10)).build().unwrap();
    let mut sink = CollectingSink::new();

    let report = engine.ingest_and_analyze(file.path(), 1_000, &mut sink).await.unwrap();

    assert_eq!(report.outcome, ScanOutcome::Done);
    assert_eq!(sink.calls(), 1);
    let groups = sink.groups_for("fatal_error_rate");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].key, GroupKey::All);
    assert_eq!(groups[0].count, 15);
    assert_eq!(groups[0].window_start.timestamp(), BASE);
    assert_eq!(groups[0].window_end.timestamp(), BASE + 60);
}

/// 같은 15건이 3개 키 x 5건으로 나뉘면 그룹 규칙은 아무것도 보고하지 않음
#[tokio::test]
async fn test_grouped_rule_split_across_keys() {
    let mut rows = errors(5, BASE, "a");
    rows.extend(errors(5, BASE, "b"));
    rows.extend(errors(5, BASE, "c"));
    let file = write_file(&csv(&rows));

    let mut engine = MonitoringEngine::builder(schema())
        .rule(rate(10))
        .rule(grouped(10))
        .build()
        .unwrap();
    let mut sink = CollectingSink::new();
    engine.ingest_and_analyze(file.path(), 1_000, &mut sink).await.unwrap();

    assert!(sink.groups_for("bundle_fatal_error").is_empty());
    assert_eq!(sink.groups_for("fatal_error_rate").len(), 1);
}

/// 그룹 규칙은 키마다 독립적으로 보고
#[tokio::test]
async fn test_grouped_rule_independent_keys() {
    let mut rows = errors(12, BASE, "a");
    rows.extend(errors(3, BASE, "b"));
    rows.extend(errors(11, BASE, "c"));
    let file = write_file(&csv(&rows));

    let mut engine = MonitoringEngine::builder(schema()).rule(grouped(10)).build().unwrap();
    let mut sink = CollectingSink::new();
    engine.ingest_and_analyze(file.path(), 1_000, &mut sink).await.unwrap();

    let mut keys: Vec<(String, u64)> = sink
        .groups_for("bundle_fatal_error")
        .iter()
        .map(|g| (g.key.to_string(), g.count))
        .collect();
    keys.sort();
    assert_eq!(keys, vec![("a".to_owned(), 12), ("c".to_owned(), 11)]);
}

/// T건은 보고되지 않고 T+1건은 count T+1로 보고
#[tokio::test]
async fn test_threshold_boundary() {
    let mut sink = CollectingSink::new();
    let mut engine = MonitoringEngine::builder(schema()).rule(rate(10)).build().unwrap();

    let at_threshold = write_file(&csv(&errors(10, BASE, "a")));
    engine
        .ingest_and_analyze(at_threshold.path(), 1_000, &mut sink)
        .await
        .unwrap();
    assert_eq!(sink.calls(), 0);

    let above = write_file(&csv(&errors(11, BASE, "a")));
    engine.ingest_and_analyze(above.path(), 1_000, &mut sink).await.unwrap();
    assert_eq!(sink.calls(), 1);
    assert_eq!(sink.groups_for("fatal_error_rate")[0].count, 11);
}

/// 짧은 줄 하나는 버려지고 나머지는 처리됨
#[tokio::test]
async fn test_short_line_is_dropped() {
    let mut content = csv(&errors(11, BASE, "a"));
    content.push_str(&format!("{BASE},Error\n"));
    content.push_str(&format!("{},Error,a\n", BASE + 20));
    let file = write_file(&content);

    let mut engine = MonitoringEngine::builder(schema()).rule(rate(10)).build().unwrap();
    let mut sink = CollectingSink::new();
    let report = engine.ingest_and_analyze(file.path(), 1_000, &mut sink).await.unwrap();

    assert_eq!(report.malformed_rows, 1);
    assert_eq!(report.rows_read, 12);
    assert_eq!(sink.groups_for("fatal_error_rate")[0].count, 12);
}

/// 디코딩할 수 없는 타임스탬프는 절대 카운트되지 않음
#[tokio::test]
async fn test_invalid_timestamps_never_count() {
    let mut rows: Vec<(String, &str, &str)> = (0..10)
        .map(|i| ((BASE + i).to_string(), "Error", "a"))
        .collect();
    rows.push(("not-a-time".to_owned(), "Error", "a"));
    rows.push((String::new(), "Error", "a"));
    rows.push(("NaN".to_owned(), "Error", "a"));
    let mut content = format!("{HEADER}\n");
    for (ts, severity, bundle) in &rows {
        content.push_str(&format!("{ts},{severity},{bundle}\n"));
    }
    let file = write_file(&content);

    // 버린 행이 카운트되면 "a" 그룹이 13건으로 임계값을 넘음
    let mut engine = MonitoringEngine::builder(schema())
        .rule(rate(10))
        .rule(grouped(10))
        .build()
        .unwrap();
    let mut sink = CollectingSink::new();
    let report = engine.ingest_and_analyze(file.path(), 1_000, &mut sink).await.unwrap();

    assert_eq!(report.invalid_timestamps, 3);
    assert!(sink.groups_for("bundle_fatal_error").is_empty());
    assert_eq!(report.rows_evaluated, 10);
    assert_eq!(sink.calls(), 0);
}

/// 헤더만 있는 파일은 거부되고 싱크는 호출되지 않음
#[tokio::test]
async fn test_header_only_file_is_rejected() {
    let file = write_file(&format!("{HEADER}\n"));
    let mut engine = MonitoringEngine::builder(schema()).rule(rate(1)).build().unwrap();
    let mut sink = CollectingSink::new();

    let report = engine.ingest_and_analyze(file.path(), 1_000, &mut sink).await.unwrap();

    assert!(report.is_rejected());
    assert_eq!(engine.state(), EngineState::Rejected);
    assert_eq!(report.chunks_processed, 0);
    assert_eq!(sink.calls(), 0);
}

/// 빈 파일도 거부
#[tokio::test]
async fn test_empty_file_is_rejected() {
    let file = write_file("");
    let mut engine = MonitoringEngine::builder(schema()).rule(rate(1)).build().unwrap();
    let mut sink = CollectingSink::new();
    let report = engine.ingest_and_analyze(file.path(), 1_000, &mut sink).await.unwrap();
    assert!(report.is_rejected());
}

/// 청크 경계에 걸친 버스트는 chunk_local 모드에서 놓침
#[tokio::test]
async fn test_chunk_local_misses_burst_across_boundary() {
    let file = write_file(&csv(&errors(15, BASE, "a")));
    let mut engine = MonitoringEngine::builder(schema()).rule(rate(10)).build().unwrap();
    let mut sink = CollectingSink::new();

    let report = engine.ingest_and_analyze(file.path(), 8, &mut sink).await.unwrap();

    assert_eq!(report.chunks_processed, 2);
    assert_eq!(sink.calls(), 0);
}

/// carry_over 모드에서는 같은 버스트를 잡음
#[tokio::test]
async fn test_carry_over_catches_burst_across_boundary() {
    let file = write_file(&csv(&errors(15, BASE, "a")));
    let mut engine = MonitoringEngine::builder(schema())
        .rule(rate(10))
        .window_mode(WindowMode::CarryOver)
        .build()
        .unwrap();
    let mut sink = CollectingSink::new();

    let report = engine.ingest_and_analyze(file.path(), 8, &mut sink).await.unwrap();

    assert_eq!(report.chunks_processed, 2);
    let groups = sink.groups_for("fatal_error_rate");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 15);
}

/// carry_over 모드에서 윈도우가 바뀌면 이전 윈도우는 즉시 보고
#[tokio::test]
async fn test_carry_over_reports_closed_window_before_end() {
    let mut rows = errors(12, BASE, "a");
    rows.extend(errors(3, BASE + 60, "a"));
    let file = write_file(&csv(&rows));
    let mut engine = MonitoringEngine::builder(schema())
        .rule(rate(10))
        .window_mode(WindowMode::CarryOver)
        .build()
        .unwrap();
    let mut sink = CollectingSink::new();

    engine.ingest_and_analyze(file.path(), 5, &mut sink).await.unwrap();

    let groups = sink.groups_for("fatal_error_rate");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 12);
    assert_eq!(groups[0].window_start.timestamp(), BASE);
}

/// 파일 헤더에 타임스탬프 열이 없으면 모든 청크가 구조적 에러로 건너뛰어짐
#[tokio::test]
async fn test_structural_chunks_are_skipped() {
    let mut content = "when,severity,bundle_id\n".to_owned();
    for i in 0..20 {
        content.push_str(&format!("{},Error,a\n", BASE + i));
    }
    let file = write_file(&content);

    let mut engine = MonitoringEngine::builder(schema())
        .rule(rate(1))
        .reader_options(ReaderOptions {
            header: HeaderPolicy::FromFile,
            ..ReaderOptions::default()
        })
        .build()
        .unwrap();
    let mut sink = CollectingSink::new();
    let report = engine.ingest_and_analyze(file.path(), 10, &mut sink).await.unwrap();

    assert_eq!(report.outcome, ScanOutcome::Done);
    assert_eq!(report.chunks_skipped, 2);
    assert_eq!(report.chunks_processed, 0);
    assert_eq!(sink.calls(), 0);
    assert_eq!(engine.state(), EngineState::Done);
}

/// 헤더에서 열 순서를 읽으면 다른 열 순서의 파일도 처리
#[tokio::test]
async fn test_header_from_file_reorders_columns() {
    let mut content = "bundle_id,severity,date\n".to_owned();
    for i in 0..11 {
        content.push_str(&format!("a,Error,{}\n", BASE + i));
    }
    let file = write_file(&content);

    let mut engine = MonitoringEngine::builder(schema())
        .rule(rate(10))
        .reader_options(ReaderOptions {
            header: HeaderPolicy::FromFile,
            ..ReaderOptions::default()
        })
        .build()
        .unwrap();
    let mut sink = CollectingSink::new();
    engine.ingest_and_analyze(file.path(), 100, &mut sink).await.unwrap();

    assert_eq!(sink.groups_for("fatal_error_rate")[0].count, 11);
}

struct Recorder(Arc<Mutex<Vec<(u64, u64)>>>);

impl ProgressObserver for Recorder {
    fn on_progress(&mut self, rows_processed: u64, total_rows: u64) {
        self.0.lock().unwrap().push((rows_processed, total_rows));
    }
}

/// 진행 옵저버는 마지막에 전체 줄 수를 받음
#[tokio::test]
async fn test_progress_reaches_total() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let file = write_file(&csv(&errors(25, BASE, "a")));
    let mut engine = MonitoringEngine::builder(schema())
        .rule(rate(10))
        .progress(Box::new(Recorder(Arc::clone(&seen))))
        .build()
        .unwrap();
    let mut sink = CollectingSink::new();
    engine.ingest_and_analyze(file.path(), 10, &mut sink).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&(0, 25)));
    assert_eq!(seen.last(), Some(&(25, 25)));
    assert_eq!(seen.len(), 4);
}

/// 마지막 청크 뒤에 남은 잘못된 줄도 카운트되고 진행률은 끝까지 도달함
#[tokio::test]
async fn test_trailing_malformed_line_after_full_chunk() {
    let content = format!("{HEADER}\n{BASE},Error,a\n{},Error,a\n{},Error\n", BASE + 1, BASE + 2);
    let file = write_file(&content);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut engine = MonitoringEngine::builder(schema())
        .rule(rate(10))
        .progress(Box::new(Recorder(Arc::clone(&seen))))
        .build()
        .unwrap();
    let mut sink = CollectingSink::new();
    let report = engine.ingest_and_analyze(file.path(), 2, &mut sink).await.unwrap();

    assert_eq!(report.outcome, ScanOutcome::Done);
    assert_eq!(report.rows_read, 2);
    assert_eq!(report.malformed_rows, 1);
    assert_eq!(report.chunks_processed, 1);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[(0, 3), (2, 3), (3, 3)]);
}

/// 데이터 줄이 전부 잘못된 경우에도 모두 카운트됨
#[tokio::test]
async fn test_all_rows_malformed_are_counted() {
    let file = write_file(&format!("{HEADER}\n{BASE},Error\n{BASE}\n"));
    let mut engine = MonitoringEngine::builder(schema()).rule(rate(1)).build().unwrap();
    let mut sink = CollectingSink::new();

    let report = engine.ingest_and_analyze(file.path(), 10, &mut sink).await.unwrap();

    assert_eq!(report.outcome, ScanOutcome::Done);
    assert_eq!(report.malformed_rows, 2);
    assert_eq!(report.rows_read, 0);
    assert_eq!(report.chunks_processed, 0);
    assert_eq!(sink.calls(), 0);
}

/// 설정 파일에서 엔진을 만들어 기본 경로로 스캔
#[tokio::test]
async fn test_engine_from_core_config() {
    let file = write_file(&csv(&errors(11, BASE, "com.app")));

    let mut core = SpikewatchConfig::default();
    core.monitor.data_path = file.path().display().to_string();
    core.monitor.chunk_size = 4;
    core.monitor.window_mode = "carry_over".to_owned();
    core.monitor.schema = SchemaConfig {
        columns: vec!["date".to_owned(), "severity".to_owned(), "bundle_id".to_owned()],
        timestamp_column: "date".to_owned(),
        ..Default::default()
    };
    core.validate().unwrap();

    let config = MonitorConfig::from_core(&core.monitor).unwrap();
    let mut engine = MonitoringEngine::from_config(config).unwrap();
    let mut sink = CollectingSink::new();
    let report = engine.scan(&mut sink).await.unwrap();

    assert_eq!(report.chunks_processed, 3);
    assert_eq!(sink.groups_for("fatal_error_rate")[0].count, 11);
    assert_eq!(sink.groups_for("bundle_fatal_error")[0].count, 11);
}

/// JSON 싱크는 그룹마다 한 줄
#[tokio::test]
async fn test_json_lines_sink_output() {
    let mut rows = errors(12, BASE, "a");
    rows.extend(errors(11, BASE, "b"));
    let file = write_file(&csv(&rows));

    let mut engine = MonitoringEngine::builder(schema()).rule(grouped(10)).build().unwrap();
    let mut sink = JsonLinesSink::new(Vec::new());
    let report = engine.ingest_and_analyze(file.path(), 1_000, &mut sink).await.unwrap();

    assert_eq!(report.alert_groups, 2);
    let out = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(out.lines().count(), 2);
    for line in out.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["rule"], "bundle_fatal_error");
    }
}
