#![no_main]

use libfuzzer_sys::fuzz_target;
use spikewatch_core::config::SpikewatchConfig;
use spikewatch_monitor::MonitorConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(toml_str) = std::str::from_utf8(data) {
        if let Ok(config) = SpikewatchConfig::parse(toml_str) {
            // 검증 통과 여부와 무관하게 변환은 패닉 없이 끝나야 함
            let _ = config.validate();
            let _ = MonitorConfig::from_core(&config.monitor);
        }
    }
});
