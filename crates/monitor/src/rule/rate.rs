//! 고정 윈도우 전체 카운트 규칙

use std::time::Duration;

use spikewatch_core::types::{AlertGroup, GroupKey};

use crate::error::MonitorError;
use crate::normalize::NormalizedChunk;

use super::types::RowPredicate;
use super::window::{TimeWindow, WindowCounts};

/// 고정 윈도우 안의 매칭 행 수가 임계값을 넘으면 알림을 생성하는 규칙
#[derive(Debug, Clone)]
pub struct RateThresholdRule {
    name: String,
    threshold: u64,
    window: TimeWindow,
    predicate: RowPredicate,
}

impl RateThresholdRule {
    /// 기본 조건(`severity == "Error"`)으로 규칙을 생성합니다.
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
        })
    }

    /// 행 선택 조건을 바꿉니다.
    pub fn with_predicate(mut self, predicate: RowPredicate) -> Self {
        self.predicate = predicate;
        self
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

    /// 청크 하나를 평가합니다.
    pub fn check(&self, chunk: &NormalizedChunk) -> Vec<AlertGroup> {
        self.count(chunk)
            .map(|counts| counts.into_groups(&self.window, self.threshold))
            .unwrap_or_default()
    }

    /// 윈도우별 매칭 행 수를 셉니다. 조건 열이 청크에 없으면 `None`.
    pub(crate) fn count(&self, chunk: &NormalizedChunk) -> Option<WindowCounts> {
        let Some(field_idx) = self.predicate.resolve(chunk) else {
            super::warn_missing_field(&self.name, &self.predicate.field, chunk.index);
            return None;
        };

        let mut counts = WindowCounts::new();
        for row in chunk
            .rows
            .iter()
            .filter(|row| row.values[field_idx] == self.predicate.value)
        {
            counts.increment(self.window.index_of(&row.timestamp), GroupKey::All);
        }
        Some(counts)
    }
}
