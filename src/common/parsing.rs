// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use std::collections::HashMap;

pub fn parse_boolish(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split an HTTP query string into key/value pairs. Later keys win.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|kv| !kv.is_empty())
        .map(|kv| match kv.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
            None => (kv.trim().to_string(), String::new()),
        })
        .collect()
}

/// Parse a decimal or `0x`-prefixed unsigned integer.
pub fn parse_u64_flexible(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_pairs() {
        let q = parse_query("candidate=7&cadence=250&flag");
        assert_eq!(q.get("candidate").map(String::as_str), Some("7"));
        assert_eq!(q.get("cadence").map(String::as_str), Some("250"));
        assert_eq!(q.get("flag").map(String::as_str), Some(""));
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn parses_numbers_and_bools() {
        assert_eq!(parse_u64_flexible("42"), Some(42));
        assert_eq!(parse_u64_flexible("0x2a"), Some(42));
        assert_eq!(parse_u64_flexible("nope"), None);
        assert_eq!(parse_boolish("ON"), Some(true));
        assert_eq!(parse_boolish("off"), Some(false));
        assert_eq!(parse_boolish("maybe"), None);
    }
}
