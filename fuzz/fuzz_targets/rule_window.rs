#![no_main]

use std::sync::Arc;
use std::time::Duration;

use arbitrary::Arbitrary;
use chrono::DateTime;
use libfuzzer_sys::fuzz_target;

use spikewatch_monitor::normalize::{NormalizedChunk, NormalizedRow};
use spikewatch_monitor::rule::{AlertRule, GroupedThresholdRule, RateThresholdRule, WindowCarry};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    grouped: bool,
    threshold: u8,
    window_secs: u16,
    /// 시간순으로 정렬되는 행 (오프셋 초, 에러 여부, 번들)
    rows: Vec<(u16, bool, u8)>,
}

const BASE: i64 = 1_700_000_000;

fn build_rule(input: &FuzzInput) -> Option<AlertRule> {
    let threshold = u64::from(input.threshold.max(1));
    let window = Duration::from_secs(u64::from(input.window_secs.max(1)));
    let rule: AlertRule = if input.grouped {
        GroupedThresholdRule::new("fuzz_grouped", threshold, window)
            .ok()?
            .into()
    } else {
        RateThresholdRule::new("fuzz_rate", threshold, window).ok()?.into()
    };
    Some(rule)
}

fuzz_target!(|input: FuzzInput| {
    let Some(rule) = build_rule(&input) else {
        return;
    };

    let mut rows: Vec<(u16, bool, u8)> = input.rows.iter().take(512).copied().collect();
    rows.sort_by_key(|(offset, _, _)| *offset);
    let errors = rows.iter().filter(|(_, error, _)| *error).count() as u64;

    let columns: Arc<[String]> = ["date", "severity", "bundle_id"]
        .iter()
        .map(|c| (*c).to_owned())
        .collect();
    let rows: Vec<NormalizedRow> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(i, (offset, error, bundle))| {
            Some(NormalizedRow {
                line: i as u64 + 2,
                timestamp: DateTime::from_timestamp(BASE + i64::from(offset), 0)?,
                values: vec![
                    String::new(),
                    if error { "Error" } else { "Info" }.to_owned(),
                    format!("b{}", bundle % 8),
                ],
            })
        })
        .collect();
    let chunk = NormalizedChunk::new(0, columns, rows);

    let groups = rule.check(&chunk);
    let mut total = 0u64;
    for group in &groups {
        assert!(group.count > rule.threshold());
        assert!(group.window_start < group.window_end);
        total += group.count;
    }
    assert!(total <= errors);

    // 단일 청크에서는 이월 평가와 독립 평가의 결과가 같아야 함
    let mut carry = WindowCarry::new();
    let mut carried = rule.check_carrying(&chunk, &mut carry);
    carried.extend(rule.flush(&mut carry));
    assert_eq!(groups, carried);
    assert!(carry.is_empty());
});
