//! 고정 시간 윈도우와 윈도우별 카운트 집계
//!
//! 윈도우 번호는 `floor(unix_seconds / window_secs)`로 정의되며,
//! 음수 타임스탬프에서도 내림이 되도록 `div_euclid`를 사용합니다.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use spikewatch_core::types::{AlertGroup, GroupKey};

/// 고정 길이 시간 윈도우
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    secs: i64,
}

impl TimeWindow {
    /// 윈도우를 생성합니다. 0초이거나 `i64` 범위를 넘으면 `None`입니다.
    pub fn new(duration: Duration) -> Option<Self> {
        let secs = i64::try_from(duration.as_secs()).ok()?;
        (secs > 0).then_some(Self { secs })
    }

    /// 윈도우 길이 (초)
    pub fn secs(&self) -> u64 {
        self.secs.unsigned_abs()
    }

    /// 시각이 속하는 윈도우 번호를 반환합니다.
    pub fn index_of(&self, ts: &DateTime<Utc>) -> i64 {
        ts.timestamp().div_euclid(self.secs)
    }

    /// 윈도우 번호의 `[start, end)` 경계를 반환합니다.
    pub fn bounds(&self, index: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = index.saturating_mul(self.secs);
        let end = start.saturating_add(self.secs);
        (
            DateTime::from_timestamp(start, 0).unwrap_or(DateTime::<Utc>::MIN_UTC),
            DateTime::from_timestamp(end, 0).unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }
}

/// (윈도우 번호, 그룹 키)별 카운트
///
/// `BTreeMap`을 사용하므로 결과는 윈도우 순, 같은 윈도우 안에서는 키 순으로 나옵니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowCounts {
    counts: BTreeMap<(i64, GroupKey), u64>,
}

impl WindowCounts {
    /// 빈 집계를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 카운트를 하나 증가시킵니다.
    pub fn increment(&mut self, window: i64, key: GroupKey) {
        *self.counts.entry((window, key)).or_insert(0) += 1;
    }

    /// 다른 집계를 합칩니다.
    pub fn merge(&mut self, other: WindowCounts) {
        for (slot, count) in other.counts {
            *self.counts.entry(slot).or_insert(0) += count;
        }
    }

    /// 가장 늦은 윈도우 번호
    pub fn last_window(&self) -> Option<i64> {
        self.counts.last_key_value().map(|((window, _), _)| *window)
    }

    /// `window` 이상인 항목을 떼어내 반환합니다.
    pub fn split_from(&mut self, window: i64) -> WindowCounts {
        let tail = self.counts.split_off(&(window, GroupKey::All));
        WindowCounts { counts: tail }
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// 임계값을 초과한 항목만 알림 그룹으로 변환합니다.
    pub fn into_groups(self, window: &TimeWindow, threshold: u64) -> Vec<AlertGroup> {
        self.counts
            .into_iter()
            .filter(|(_, count)| *count > threshold)
            .map(|((index, key), count)| {
                let (window_start, window_end) = window.bounds(index);
                AlertGroup {
                    key,
                    window_start,
                    window_end,
                    count,
                }
            })
            .collect()
    }
}

/// `carry_over` 모드에서 청크 사이에 이월되는 열린 윈도우 카운트
///
/// 규칙 인스턴스마다 하나씩 엔진이 소유합니다.
/// 항상 가장 늦은 윈도우 하나의 키들만 보관합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowCarry {
    open: WindowCounts,
    /// 지금까지 본 가장 늦은 윈도우 번호
    horizon: Option<i64>,
}

impl WindowCarry {
    /// 빈 이월 상태를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 이월된 카운트가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// 이월된 윈도우 번호
    pub fn open_window(&self) -> Option<i64> {
        self.open.last_window()
    }

    /// 새 청크의 집계와 이월분을 합치고, 닫힌 윈도우와 새 이월분으로 나눕니다.
    ///
    /// `chunk_horizon`은 청크 전체 행(매칭 여부 무관) 중 가장 늦은 윈도우 번호입니다.
    /// 반환값은 더 이상 행이 추가되지 않을 닫힌 윈도우의 카운트입니다.
    pub(crate) fn advance(&mut self, chunk: WindowCounts, chunk_horizon: Option<i64>) -> WindowCounts {
        let mut merged = std::mem::take(&mut self.open);
        merged.merge(chunk);

        let horizon = [self.horizon, chunk_horizon, merged.last_window()]
            .into_iter()
            .flatten()
            .max();
        self.horizon = horizon;

        if let Some(open) = horizon {
            self.open = merged.split_from(open);
        }
        merged
    }

    /// 남은 이월분을 모두 꺼냅니다.
    pub(crate) fn take(&mut self) -> WindowCounts {
        self.horizon = None;
        std::mem::take(&mut self.open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn minute() -> TimeWindow {
        TimeWindow::new(Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(TimeWindow::new(Duration::ZERO).is_none());
        assert!(TimeWindow::new(Duration::from_secs(u64::MAX)).is_none());
    }

    #[test]
    fn index_floors_toward_negative_infinity() {
        let w = minute();
        assert_eq!(w.index_of(&ts(0)), 0);
        assert_eq!(w.index_of(&ts(59)), 0);
        assert_eq!(w.index_of(&ts(60)), 1);
        assert_eq!(w.index_of(&ts(-1)), -1);
        assert_eq!(w.index_of(&ts(-60)), -1);
        assert_eq!(w.index_of(&ts(-61)), -2);
    }

    #[test]
    fn bounds_are_aligned() {
        let w = minute();
        let idx = w.index_of(&ts(1_700_000_030));
        let (start, end) = w.bounds(idx);
        assert_eq!(start.timestamp() % 60, 0);
        assert_eq!((end - start).num_seconds(), 60);
        assert!(start <= ts(1_700_000_030) && ts(1_700_000_030) < end);
    }

    #[test]
    fn into_groups_filters_strictly_greater() {
        let mut counts = WindowCounts::new();
        for _ in 0..10 {
            counts.increment(5, GroupKey::All);
        }
        for _ in 0..11 {
            counts.increment(6, GroupKey::All);
        }
        let groups = counts.into_groups(&minute(), 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count, 11);
        assert_eq!(groups[0].window_start.timestamp(), 360);
    }

    #[test]
    fn carry_holds_latest_window_only() {
        let mut carry = WindowCarry::new();
        let mut chunk = WindowCounts::new();
        chunk.increment(1, GroupKey::All);
        chunk.increment(2, GroupKey::Group("a".to_owned()));
        chunk.increment(2, GroupKey::Group("b".to_owned()));

        let closed = carry.advance(chunk, Some(2));
        assert_eq!(closed.len(), 1);
        assert_eq!(carry.open_window(), Some(2));

        let mut next = WindowCounts::new();
        next.increment(2, GroupKey::Group("a".to_owned()));
        let closed = carry.advance(next, Some(3));
        assert_eq!(closed.len(), 2);
        assert!(carry.is_empty());
    }

    #[test]
    fn carry_flushes_remaining() {
        let mut carry = WindowCarry::new();
        let mut chunk = WindowCounts::new();
        chunk.increment(7, GroupKey::All);
        let closed = carry.advance(chunk, Some(7));
        assert!(closed.is_empty());

        let rest = carry.take();
        assert_eq!(rest.len(), 1);
        assert!(carry.is_empty());
    }
}
