//! Fuzz target for formatter argument construction.
//!
//! Run with: cargo +nightly fuzz run fuzz_cli_args
//!
//! Arbitrary `prettier_options` and `additional_cli_args` maps must always
//! produce arguments that are single `--flag` tokens free of NUL bytes.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use prettyfmt_config::{LayerKind, OptionLayer, Settings, merge};
use prettyfmt_core::invoker::args::{Discovered, build_args};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(project) = OptionLayer::parse_json(LayerKind::Project, s) else {
        return;
    };
    let empty = |kind| OptionLayer::empty(kind);
    let options = merge(&empty(LayerKind::Default), &empty(LayerKind::User), &project);
    let settings = Settings::from_options(&options);

    for path in ["/repo/a.js", "/repo/index.html", "/repo/style.scss", "/repo/Makefile"] {
        for arg in build_args(&settings, Path::new(path), Discovered::default()) {
            assert!(arg.starts_with('-'), "argument {arg:?} is not a flag");
            assert!(!arg.contains('\0'), "argument {arg:?} contains NUL");
        }
    }
});
