//! 알림 규칙 -- 정규화된 청크를 윈도우별로 집계해 임계값 초과 그룹을 찾습니다.
//!
//! # 규칙 형식
//! ```toml
//! [[monitor.rules]]
//! name = "bundle_fatal_error"
//! kind = "grouped_threshold"
//! threshold = 10
//! window = "1h"
//! group_field = "bundle_id"
//! ```
//!
//! # 아키텍처
//! - [`AlertRule`]: 닫힌 규칙 변형 집합 (`RateThreshold`, `GroupedThreshold`)
//! - [`rate`]: 윈도우 전체 카운트
//! - [`grouped`]: 윈도우 + 그룹 필드별 카운트
//! - [`window`]: 윈도우 번호 계산, 카운트 집계, 청크 간 이월 상태
//!
//! 기본적으로 각 청크는 독립적으로 평가되므로 청크 경계에 걸친 버스트는
//! 나뉘어 집계됩니다. [`AlertRule::check_carrying`]은 가장 늦은 열린 윈도우를
//! [`WindowCarry`]에 보관해 다음 청크와 합칩니다.

pub mod grouped;
pub mod rate;
pub mod types;
pub mod window;

pub use grouped::GroupedThresholdRule;
pub use rate::RateThresholdRule;
pub use types::{RowPredicate, RuleKind};
pub use window::{TimeWindow, WindowCarry, WindowCounts};

use std::time::Duration;

use spikewatch_core::config::RuleConfig;
use spikewatch_core::types::AlertGroup;

use crate::error::MonitorError;
use crate::normalize::NormalizedChunk;

/// 알림 규칙
#[derive(Debug, Clone)]
pub enum AlertRule {
    /// 고정 윈도우 전체 카운트
    RateThreshold(RateThresholdRule),
    /// 고정 윈도우 + 그룹 필드별 카운트
    GroupedThreshold(GroupedThresholdRule),
}

impl AlertRule {
    /// core 설정의 규칙 항목에서 규칙을 생성합니다.
    ///
    /// 이름이 없으면 규칙 종류 문자열을 이름으로 사용합니다.
    ///
    /// # Errors
    /// 알 수 없는 종류, 0 임계값, 잘못된 윈도우, 빈 필드명, rate 규칙의 그룹 필드 지정 시 `RuleValidation`
    pub fn from_config(config: &RuleConfig) -> Result<Self, MonitorError> {
        let name = config.name.clone().unwrap_or_else(|| config.kind.clone());
        let fail = |reason: String| MonitorError::RuleValidation {
            rule: name.clone(),
            reason,
        };

        if name.trim().is_empty() {
            return Err(fail("rule name must not be empty".to_owned()));
        }
        let kind = RuleKind::parse(&config.kind)
            .ok_or_else(|| fail(format!("unknown rule kind '{}'", config.kind)))?;
        let window = config.window.to_duration().map_err(fail)?;
        if config.match_field.is_empty() {
            return Err(fail("match field must not be empty".to_owned()));
        }
        let predicate = RowPredicate::new(&config.match_field, &config.match_value);

        let rule = match kind {
            RuleKind::RateThreshold => {
                if config.group_field.is_some() {
                    return Err(fail(
                        "group_field is only valid for grouped_threshold rules".to_owned(),
                    ));
                }
                Self::RateThreshold(
                    RateThresholdRule::new(name.clone(), config.threshold, window)?
                        .with_predicate(predicate),
                )
            }
            RuleKind::GroupedThreshold => {
                let mut rule = GroupedThresholdRule::new(name.clone(), config.threshold, window)?
                    .with_predicate(predicate);
                if let Some(field) = &config.group_field {
                    rule = rule.with_group_field(field)?;
                }
                Self::GroupedThreshold(rule)
            }
        };
        Ok(rule)
    }

    /// 규칙 이름 (싱크에 전달되는 식별자)
    pub fn name(&self) -> &str {
        match self {
            Self::RateThreshold(rule) => rule.name(),
            Self::GroupedThreshold(rule) => rule.name(),
        }
    }

    /// 규칙 종류
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::RateThreshold(_) => RuleKind::RateThreshold,
            Self::GroupedThreshold(_) => RuleKind::GroupedThreshold,
        }
    }

    /// 임계값
    pub fn threshold(&self) -> u64 {
        match self {
            Self::RateThreshold(rule) => rule.threshold(),
            Self::GroupedThreshold(rule) => rule.threshold(),
        }
    }

    /// 시간 윈도우
    pub fn window(&self) -> &TimeWindow {
        match self {
            Self::RateThreshold(rule) => rule.window(),
            Self::GroupedThreshold(rule) => rule.window(),
        }
    }

    /// 행 선택 조건
    pub fn predicate(&self) -> &RowPredicate {
        match self {
            Self::RateThreshold(rule) => rule.predicate(),
            Self::GroupedThreshold(rule) => rule.predicate(),
        }
    }

    /// 그룹 키 열 (rate 규칙은 `None`)
    pub fn group_field(&self) -> Option<&str> {
        match self {
            Self::RateThreshold(_) => None,
            Self::GroupedThreshold(rule) => Some(rule.group_field()),
        }
    }

    /// 청크 하나를 독립적으로 평가합니다.
    ///
    /// 반환되는 그룹은 모두 `count > threshold`를 만족하며 윈도우 순, 키 순으로 정렬되어 있습니다.
    pub fn check(&self, chunk: &NormalizedChunk) -> Vec<AlertGroup> {
        match self {
            Self::RateThreshold(rule) => rule.check(chunk),
            Self::GroupedThreshold(rule) => rule.check(chunk),
        }
    }

    /// 이월 상태와 함께 청크를 평가합니다.
    ///
    /// 가장 늦은 윈도우는 아직 열려 있다고 보고 `carry`에 보관하며,
    /// 그보다 이른 윈도우만 닫힌 것으로 보고 평가합니다.
    /// 입력이 시간순이라고 가정합니다. 이미 닫힌 윈도우에 늦게 도착한 행은 별도 그룹으로 집계됩니다.
    pub fn check_carrying(
        &self,
        chunk: &NormalizedChunk,
        carry: &mut WindowCarry,
    ) -> Vec<AlertGroup> {
        let Some(counts) = self.count(chunk) else {
            return Vec::new();
        };
        let window = self.window();
        let horizon = chunk
            .rows
            .iter()
            .map(|row| window.index_of(&row.timestamp))
            .max();
        carry
            .advance(counts, horizon)
            .into_groups(window, self.threshold())
    }

    /// 스트림 끝에서 이월된 윈도우를 평가합니다.
    pub fn flush(&self, carry: &mut WindowCarry) -> Vec<AlertGroup> {
        carry.take().into_groups(self.window(), self.threshold())
    }

    fn count(&self, chunk: &NormalizedChunk) -> Option<WindowCounts> {
        match self {
            Self::RateThreshold(rule) => rule.count(chunk),
            Self::GroupedThreshold(rule) => rule.count(chunk),
        }
    }
}

impl From<RateThresholdRule> for AlertRule {
    fn from(rule: RateThresholdRule) -> Self {
        Self::RateThreshold(rule)
    }
}

impl From<GroupedThresholdRule> for AlertRule {
    fn from(rule: GroupedThresholdRule) -> Self {
        Self::GroupedThreshold(rule)
    }
}

/// 임계값과 윈도우 길이를 검증합니다.
fn validate_limits(
    name: &str,
    threshold: u64,
    window: Duration,
) -> Result<(u64, TimeWindow), MonitorError> {
    if threshold == 0 {
        return Err(MonitorError::RuleValidation {
            rule: name.to_owned(),
            reason: "threshold must be greater than 0".to_owned(),
        });
    }
    let window = TimeWindow::new(window).ok_or_else(|| MonitorError::RuleValidation {
        rule: name.to_owned(),
        reason: format!("window of {}s is out of range", window.as_secs()),
    })?;
    Ok((threshold, window))
}

fn warn_missing_field(rule: &str, field: &str, chunk_index: u64) {
    tracing::warn!(
        rule,
        field,
        chunk = chunk_index,
        "column missing from chunk, rule produced no groups"
    );
}
