#![no_main]

use libfuzzer_sys::fuzz_target;
use rulegate::{Rule, RuleSet};

fuzz_target!(|data: &[u8]| {
    // Split input into uri pattern and request uri at the first null byte
    let split = data.iter().position(|&b| b == 0);
    let (pattern_bytes, uri_bytes) = match split {
        Some(pos) => (&data[..pos], &data[pos + 1..]),
        None => (data, &[] as &[u8]),
    };

    let (Ok(pattern), Ok(uri)) = (
        std::str::from_utf8(pattern_bytes),
        std::str::from_utf8(uri_bytes),
    ) else {
        return;
    };

    if let Ok(rules) = RuleSet::new(&[Rule::new(pattern).with_method(pattern)]) {
        if let Some(rule) = rules.select(uri) {
            let _ = rule.matches_method(uri);
        }
    }
});
