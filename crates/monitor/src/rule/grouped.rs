//! 고정 윈도우 + 그룹 필드별 카운트 규칙

use std::time::Duration;

use spikewatch_core::types::{AlertGroup, GroupKey};

use crate::error::MonitorError;
use crate::normalize::NormalizedChunk;

use super::types::RowPredicate;
use super::window::{TimeWindow, WindowCounts};

/// 기본 그룹 필드
pub const DEFAULT_GROUP_FIELD: &str = "bundle_id";

/// (그룹 필드 값, 윈도우)별 매칭 행 수가 임계값을 넘으면 알림을 생성하는 규칙
///
/// 그룹 필드 값이 비어 있는 행도 빈 문자열 키로 집계됩니다.
#[derive(Debug, Clone)]
pub struct GroupedThresholdRule {
    name: String,
    threshold: u64,
    window: TimeWindow,
    predicate: RowPredicate,
    group_field: String,
}

impl GroupedThresholdRule {
    /// 기본 조건(`severity == "Error"`)과 기본 그룹 필드(`bundle_id`)로 규칙을 생성합니다.
    ///
    /// # Errors
    /// 임계값이 0이거나 윈도우가 0초이면 `RuleValidation`
    pub fn new(
        name: impl Into<String>,
        threshold: u64,
        window: Duration,
    ) -> Result<Self, MonitorError> {
        let name = name.into();
        let (threshold, window) = super::validate_limits(&name, threshold, window)?;
        Ok(Self {
            name,
            threshold,
            window,
            predicate: RowPredicate::default(),
            group_field: DEFAULT_GROUP_FIELD.to_owned(),
        })
    }

    /// 행 선택 조건을 바꿉니다.
    pub fn with_predicate(mut self, predicate: RowPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// 그룹 필드를 바꿉니다.
    ///
    /// # Errors
    /// 빈 필드명이면 `RuleValidation`
    pub fn with_group_field(mut self, field: impl Into<String>) -> Result<Self, MonitorError> {
        let field = field.into();
        if field.is_empty() {
            return Err(MonitorError::RuleValidation {
                rule: self.name,
                reason: "group field must not be empty".to_owned(),
            });
        }
        self.group_field = field;
        Ok(self)
    }

    /// 규칙 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 임계값
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// 시간 윈도우
    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    /// 행 선택 조건
    pub fn predicate(&self) -> &RowPredicate {
        &self.predicate
    }

    /// 그룹 필드
    pub fn group_field(&self) -> &str {
        &self.group_field
    }

    /// 청크 하나를 평가합니다.
    pub fn check(&self, chunk: &NormalizedChunk) -> Vec<AlertGroup> {
        self.count(chunk)
            .map(|counts| counts.into_groups(&self.window, self.threshold))
            .unwrap_or_default()
    }

    /// (윈도우, 그룹)별 매칭 행 수를 셉니다. 조건 열이나 그룹 열이 없으면 `None`.
    pub(crate) fn count(&self, chunk: &NormalizedChunk) -> Option<WindowCounts> {
        let Some(field_idx) = self.predicate.resolve(chunk) else {
            super::warn_missing_field(&self.name, &self.predicate.field, chunk.index);
            return None;
        };
        let Some(group_idx) = chunk.column_index(&self.group_field) else {
            super::warn_missing_field(&self.name, &self.group_field, chunk.index);
            return None;
        };

        let mut counts = WindowCounts::new();
        for row in chunk
            .rows
            .iter()
            .filter(|row| row.values[field_idx] == self.predicate.value)
        {
            counts.increment(
                self.window.index_of(&row.timestamp),
                GroupKey::Group(row.values[group_idx].clone()),
            );
        }
        Some(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::test_support::{chunk, rows_at};

    fn rule(threshold: u64) -> GroupedThresholdRule {
        GroupedThresholdRule::new("bundle_fatal_error", threshold, Duration::from_secs(3600))
            .unwrap()
    }

    #[test]
    fn three_keys_of_five_stay_below_threshold() {
        let mut rows = rows_at(1_700_000_040, 5, "Error", "a");
        rows.extend(rows_at(1_700_000_040, 5, "Error", "b"));
        rows.extend(rows_at(1_700_000_040, 5, "Error", "c"));
        assert!(rule(10).check(&chunk(rows)).is_empty());
    }

    #[test]
    fn groups_are_independent() {
        let mut rows = rows_at(1_700_000_040, 12, "Error", "a");
        rows.extend(rows_at(1_700_000_040, 3, "Error", "b"));
        rows.extend(rows_at(1_700_000_040, 11, "Error", "c"));
        let groups = rule(10).check(&chunk(rows));

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, GroupKey::Group("a".to_owned()));
        assert_eq!(groups[0].count, 12);
        assert_eq!(groups[1].key, GroupKey::Group("c".to_owned()));
        assert_eq!(groups[1].count, 11);
    }

    #[test]
    fn same_key_in_different_windows_is_split() {
        let mut rows = rows_at(1_699_999_200, 8, "Error", "a");
        rows.extend(rows_at(1_700_002_800, 8, "Error", "a"));
        assert!(rule(10).check(&chunk(rows.clone())).is_empty());
        assert_eq!(rule(7).check(&chunk(rows)).len(), 2);
    }

    #[test]
    fn missing_group_field_yields_nothing() {
        let r = rule(1).with_group_field("tenant").unwrap();
        let c = chunk(rows_at(1_700_000_040, 5, "Error", "a"));
        assert!(r.check(&c).is_empty());
    }

    #[test]
    fn empty_group_field_is_rejected() {
        assert!(rule(1).with_group_field("").is_err());
    }
}
