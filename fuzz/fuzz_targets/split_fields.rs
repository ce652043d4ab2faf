#![no_main]

use libfuzzer_sys::fuzz_target;
use spikewatch_monitor::reader::split_fields;

fuzz_target!(|data: &[u8]| {
    // 줄 단위 입력이므로 개행 이전까지만 사용
    if let Ok(text) = std::str::from_utf8(data) {
        let line = text.split('\n').next().unwrap_or_default();
        for delimiter in [',', ';', '\t', '|'] {
            if let Ok(fields) = split_fields(line, delimiter) {
                assert!(!fields.is_empty());
                assert!(fields.len() <= line.matches(delimiter).count() + 1);
            }
        }
    }
});
