//! Text signatures.

use std::sync::LazyLock;

use regex::Regex;

use crate::{FileType, Signature};

/// Standard text signatures in evaluation order.
///
/// JSON is tested before CPP and rejects C-like content itself, so a
/// braced source file never classifies as JSON.
pub const TEXT_SIGNATURES: &[Signature<str>] = &[
    Signature::new(FileType::JSON, is_json),
    Signature::new(FileType::XML, is_xml),
    Signature::new(FileType::INI, is_ini),
    Signature::new(FileType::CPP, is_cpp),
    Signature::new(FileType::LUA, is_lua),
];

const C_LIKE_MARKERS: [&str; 2] = ["#include", "namespace"];
const LUA_MARKERS: [&str; 2] = ["function", "end"];

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

static XML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<.*?/?>").expect("static regex"));

/// A `[section]` header followed by `key=value` lines.
static INI_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[.+\][\r\n]*(?:.*=.*[\r\n]*)*").expect("static regex")
});

pub fn is_json(text: &str) -> bool {
    let text = text.trim();
    if contains_any(text, &C_LIKE_MARKERS) {
        return false;
    }
    (text.starts_with('{') && text.ends_with('}')) || (text.starts_with('[') && text.ends_with(']'))
}

pub fn is_xml(text: &str) -> bool {
    text.starts_with("<?xml") || text.starts_with("<!--") || XML_TAG.is_match(text)
}

pub fn is_ini(text: &str) -> bool {
    text.starts_with('[') && INI_SECTION.is_match(text)
}

pub fn is_cpp(text: &str) -> bool {
    contains_any(text, &C_LIKE_MARKERS)
}

pub fn is_lua(text: &str) -> bool {
    contains_any(text, &LUA_MARKERS)
}
