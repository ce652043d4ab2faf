//! 알림 규칙 공통 타입

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::NormalizedChunk;

/// 규칙 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// 고정 윈도우 전체 카운트
    RateThreshold,
    /// 고정 윈도우 + 그룹 필드별 카운트
    GroupedThreshold,
}

impl RuleKind {
    /// 설정 문자열에서 규칙 종류를 파싱합니다.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rate_threshold" => Some(Self::RateThreshold),
            "grouped_threshold" => Some(Self::GroupedThreshold),
            _ => None,
        }
    }

    /// 설정 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateThreshold => "rate_threshold",
            Self::GroupedThreshold => "grouped_threshold",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 행 선택 조건 -- `field` 열의 값이 `value`와 정확히 일치하는 행
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPredicate {
    /// 대상 열 이름
    pub field: String,
    /// 일치해야 하는 값
    pub value: String,
}

impl RowPredicate {
    /// 새 조건을 생성합니다.
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// 청크 안에서 대상 열의 위치를 찾습니다.
    pub fn resolve(&self, chunk: &NormalizedChunk) -> Option<usize> {
        chunk.column_index(&self.field)
    }
}

impl Default for RowPredicate {
    fn default() -> Self {
        Self::new("severity", "Error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_kind_parse_round_trip() {
        for kind in [RuleKind::RateThreshold, RuleKind::GroupedThreshold] {
            assert_eq!(RuleKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RuleKind::parse("sliding"), None);
    }

    #[test]
    fn default_predicate_matches_error_severity() {
        let p = RowPredicate::default();
        assert_eq!(p.field, "severity");
        assert_eq!(p.value, "Error");
    }
}
