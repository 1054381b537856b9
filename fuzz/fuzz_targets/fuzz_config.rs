#![no_main]

use libfuzzer_sys::fuzz_target;
use rulegate::{Config, RuleSet};

fuzz_target!(|data: &[u8]| {
    let input = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => return,
    };

    // Both document formats, then rule compilation; errors are fine
    for parsed in [Config::parse(input), Config::parse_yaml(input)] {
        if let Ok(config) = parsed {
            let _ = RuleSet::new(&config.rules);
        }
    }
});
