//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 규칙 엔진이 생성하고 알림 싱크가 소비하는 데이터 구조를 정의합니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 알림 그룹 키
///
/// 그룹화 없는 규칙은 [`GroupKey::All`] 하나만 사용하고,
/// 그룹화 규칙은 그룹 필드의 값마다 별도 키를 가집니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    /// 전체 행 (그룹화 없음)
    All,
    /// 그룹 필드 값
    Group(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "*"),
            Self::Group(value) => write!(f, "{value}"),
        }
    }
}

/// 임계값을 초과한 하나의 (키, 윈도우, 카운트) 묶음
///
/// 규칙의 `check` 호출이 생성하고 싱크가 즉시 소비합니다.
/// 항상 `count > threshold`를 만족합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertGroup {
    /// 그룹 키
    pub key: GroupKey,
    /// 윈도우 시작 시각 (포함)
    pub window_start: DateTime<Utc>,
    /// 윈도우 종료 시각 (미포함)
    pub window_end: DateTime<Utc>,
    /// 윈도우 내 매칭된 행 수
    pub count: u64,
}

impl fmt::Display for AlertGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} .. {} error_count={}",
            self.key,
            self.window_start.to_rfc3339(),
            self.window_end.to_rfc3339(),
            self.count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(key: GroupKey) -> AlertGroup {
        AlertGroup {
            key,
            window_start: DateTime::from_timestamp(1_700_000_040, 0).unwrap(),
            window_end: DateTime::from_timestamp(1_700_000_100, 0).unwrap(),
            count: 15,
        }
    }

    #[test]
    fn group_key_display() {
        assert_eq!(GroupKey::All.to_string(), "*");
        assert_eq!(GroupKey::Group("com.app".to_owned()).to_string(), "com.app");
    }

    #[test]
    fn alert_group_display_contains_fields() {
        let msg = group(GroupKey::Group("com.app".to_owned())).to_string();
        assert!(msg.contains("com.app"));
        assert!(msg.contains("error_count=15"));
        assert!(msg.contains("2023-11-14T22:14:00"));
    }

    #[test]
    fn alert_group_serializes_to_json() {
        let json = serde_json::to_value(group(GroupKey::All)).unwrap();
        assert_eq!(json["key"], "all");
        assert_eq!(json["count"], 15);
    }

    #[test]
    fn group_keys_order_all_first() {
        let mut keys = vec![GroupKey::Group("b".to_owned()), GroupKey::All];
        keys.sort();
        assert_eq!(keys[0], GroupKey::All);
    }
}
