//! Fuzz target for layer parsing and option merging.
//!
//! Run with: cargo +nightly fuzz run fuzz_option_merge
//!
//! The input is split on NUL into up to three layer documents. Each is parsed
//! as JSON, falling back to TOML, and the layers are merged. Merging must
//! never panic and the typed view must always be constructible.

#![no_main]

use libfuzzer_sys::fuzz_target;
use prettyfmt_config::{LayerKind, OptionLayer, Settings, merge_with_report};

fn layer(kind: LayerKind, doc: Option<&str>) -> OptionLayer {
    doc.and_then(|s| {
        OptionLayer::parse_json(kind, s)
            .or_else(|_| OptionLayer::parse_toml(kind, s))
            .ok()
    })
    .unwrap_or_else(|| OptionLayer::empty(kind))
}

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let mut docs = s.split('\0');
    let default = layer(LayerKind::Default, docs.next());
    let user = layer(LayerKind::User, docs.next());
    let project = layer(LayerKind::Project, docs.next());

    let report = merge_with_report(&default, &user, &project);
    let settings = Settings::from_options(&report.options);
    let _ = settings.timeout();
    let _ = settings.file_size_limit();
});
