#![no_main]

use libfuzzer_sys::fuzz_target;
use realtime_client::protocol::ClientFrame;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = serde_json::from_slice::<ClientFrame>(data) {
        let json = serde_json::to_string(&frame).unwrap_or_default();
        let reparsed = serde_json::from_str::<ClientFrame>(&json);
        assert_eq!(reparsed.ok().as_ref(), Some(&frame));
    }
});
