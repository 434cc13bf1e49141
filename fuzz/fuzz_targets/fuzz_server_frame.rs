#![no_main]

use libfuzzer_sys::fuzz_target;
use realtime_client::protocol::ServerFrame;

fuzz_target!(|data: &[u8]| {
    // Raw bytes, including serde_json's own UTF-8 validation.
    let _ = serde_json::from_slice::<ServerFrame>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(frame) = serde_json::from_str::<ServerFrame>(s) {
            // Whatever parses must serialize back.
            let _ = serde_json::to_string(&frame);
        }
    }
});
