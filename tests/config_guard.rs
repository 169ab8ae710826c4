use regex::Regex;
use std::fs;

/// Fail CI if committed config files carry private keys.
#[test]
fn no_committed_keys_in_configs() {
    let hex_key = Regex::new(r"0x?[a-fA-F0-9]{64}").unwrap();
    let wallet_key = Regex::new(r#"^\s*wallet_key\s*=\s*"[^"]+""#).unwrap();

    let mut checked = 0;
    for entry in fs::read_dir(".").expect("read crate root").flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let is_config = name.starts_with("config") && name.ends_with(".toml");
        if !is_config && name != ".env.example" {
            continue;
        }
        checked += 1;
        let body = fs::read_to_string(entry.path()).expect("read config");
        for (idx, line) in body.lines().enumerate() {
            if hex_key.is_match(line) || wallet_key.is_match(line) {
                panic!("Secret-looking value in {} at line {}", name, idx + 1);
            }
        }
    }
    assert!(checked > 0, "expected at least config.example.toml");
}
