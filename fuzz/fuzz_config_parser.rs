//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text through `AppConfig::parse()`, which covers TOML
//! decoding, provider-name normalization and validation.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = parley_config::AppConfig::parse(s) {
            // Lookups on a validated config must never panic either.
            for name in config.providers.keys() {
                let _ = config.provider(name).base_url_or("http://localhost");
            }
        }
    }
});
