//! 파이프라인 trait -- 모듈 확장 포인트 정의

use crate::types::AlertGroup;

/// 알림 전달을 구현하는 trait
///
/// 새로운 전달 채널(stdout, 파일, 웹훅 등)을 추가하려면 이 trait을 구현합니다.
/// 코어는 형식, 전달 채널, 버퍼링을 규정하지 않습니다.
pub trait AlertSink: Send {
    /// 싱크 이름
    fn name(&self) -> &str;

    /// 규칙 하나가 청크 하나에서 생성한 알림 그룹을 전달합니다.
    ///
    /// 청크당 0회 이상 호출되며, `groups`는 비어 있지 않습니다.
    fn report(&mut self, rule: &str, groups: &[AlertGroup]);
}

/// 진행 상황 통지를 받는 trait
///
/// 순수하게 참고용이며 제어 흐름에 영향을 주지 않습니다.
pub trait ProgressObserver: Send {
    /// 처리된 행 수와 전체 행 수를 통지합니다.
    fn on_progress(&mut self, rows_processed: u64, total_rows: u64);
}

/// 진행 상황을 무시하는 옵저버
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _rows_processed: u64, _total_rows: u64) {}
}
