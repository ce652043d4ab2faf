//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 모니터 엔진은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않은 경우 호출은 아무 효과가 없습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `spikewatch_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency)
//!
//! # 사용 예시
//!
//! ```ignore
//! use spikewatch_core::metrics;
//!
//! metrics::counter!(spikewatch_core::metrics::MONITOR_ROWS_READ_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 규칙 이름 레이블 키
pub const LABEL_RULE: &str = "rule";

/// 청크 스킵 사유 레이블 키 (structural, parse)
pub const LABEL_REASON: &str = "reason";

// ─── Monitor 메트릭 ────────────────────────────────────────────────

/// Monitor: 읽은 데이터 행 수 (counter)
pub const MONITOR_ROWS_READ_TOTAL: &str = "spikewatch_monitor_rows_read_total";

/// Monitor: 열 개수/인코딩 오류로 버려진 행 수 (counter)
pub const MONITOR_MALFORMED_ROWS_TOTAL: &str = "spikewatch_monitor_malformed_rows_total";

/// Monitor: 타임스탬프 파싱 실패로 버려진 행 수 (counter)
pub const MONITOR_INVALID_TIMESTAMPS_TOTAL: &str = "spikewatch_monitor_invalid_timestamps_total";

/// Monitor: 처리 완료된 청크 수 (counter)
pub const MONITOR_CHUNKS_PROCESSED_TOTAL: &str = "spikewatch_monitor_chunks_processed_total";

/// Monitor: 건너뛴 청크 수 (counter, label: reason)
pub const MONITOR_CHUNKS_SKIPPED_TOTAL: &str = "spikewatch_monitor_chunks_skipped_total";

/// Monitor: 싱크로 전달된 알림 그룹 수 (counter, label: rule)
pub const MONITOR_ALERT_GROUPS_TOTAL: &str = "spikewatch_monitor_alert_groups_total";

/// Monitor: 청크 하나의 정규화 + 평가 소요 시간 (histogram, 초)
pub const MONITOR_CHUNK_DURATION_SECONDS: &str = "spikewatch_monitor_chunk_duration_seconds";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 청크 처리 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 60s 범위 (청크 크기가 백만 행 단위까지 커질 수 있음)
pub const CHUNK_DURATION_BUCKETS: [f64; 9] = [0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        MONITOR_ROWS_READ_TOTAL,
        "Total number of data rows read from the source file"
    );
    describe_counter!(
        MONITOR_MALFORMED_ROWS_TOTAL,
        "Total number of lines skipped because they did not match the record schema"
    );
    describe_counter!(
        MONITOR_INVALID_TIMESTAMPS_TOTAL,
        "Total number of rows dropped because their timestamp could not be decoded"
    );
    describe_counter!(
        MONITOR_CHUNKS_PROCESSED_TOTAL,
        "Total number of chunks normalized and evaluated by all rules"
    );
    describe_counter!(
        MONITOR_CHUNKS_SKIPPED_TOTAL,
        "Total number of chunks skipped due to structural or parse errors"
    );
    describe_counter!(
        MONITOR_ALERT_GROUPS_TOTAL,
        "Total number of alert groups forwarded to the alert sink"
    );
    describe_histogram!(
        MONITOR_CHUNK_DURATION_SECONDS,
        "Time to normalize and evaluate a single chunk in seconds"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_share_prefix() {
        for name in [
            MONITOR_ROWS_READ_TOTAL,
            MONITOR_MALFORMED_ROWS_TOTAL,
            MONITOR_INVALID_TIMESTAMPS_TOTAL,
            MONITOR_CHUNKS_PROCESSED_TOTAL,
            MONITOR_CHUNKS_SKIPPED_TOTAL,
            MONITOR_ALERT_GROUPS_TOTAL,
            MONITOR_CHUNK_DURATION_SECONDS,
        ] {
            assert!(name.starts_with("spikewatch_monitor_"), "{name}");
        }
    }

    #[test]
    fn buckets_are_sorted() {
        assert!(CHUNK_DURATION_BUCKETS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        describe_all();
    }
}
