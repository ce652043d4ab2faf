#![no_main]

use libfuzzer_sys::fuzz_target;
use spikewatch_monitor::TimestampEncoding;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        for encoding in [
            TimestampEncoding::EpochSeconds,
            TimestampEncoding::EpochMillis,
            TimestampEncoding::Rfc3339,
        ] {
            let _ = encoding.decode(raw);
        }
    }
});
