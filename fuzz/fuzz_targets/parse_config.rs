//! Fuzz harness for merge configuration files
//!
//! Malformed YAML or JSON must be rejected with an error, never a panic.

#![no_main]

use covdb_config::MergeConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let input = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => return,
    };

    if let Ok(config) = serde_yaml::from_str::<MergeConfig>(input) {
        let _ = config.options();
    }
    let _: Result<MergeConfig, _> = serde_json::from_str(input);
});
