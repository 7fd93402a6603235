//! Integration tests for configuration loading

use rollcall::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[api]
base_url = "https://example.test/v1"
model = "test-vision"
timeout_ms = 5000
max_tokens = 256
instruction = "one name per line, nothing else"

[normalizer]
min_name_len = 3
count_duplicates = true

[export]
dir = "out/attendance"
delimiter = ";"

[server]
port = 9099

[stats]
interval_secs = 5
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.api_base_url(), "https://example.test/v1");
    assert_eq!(config.api_model(), "test-vision");
    assert_eq!(config.api_timeout_ms(), 5000);
    assert_eq!(config.api_max_tokens(), 256);
    assert_eq!(config.instruction(), "one name per line, nothing else");
    assert_eq!(config.min_name_len(), 3);
    assert!(config.count_duplicates());
    assert_eq!(config.export_dir(), "out/attendance");
    assert_eq!(config.export_delimiter(), ";");
    assert_eq!(config.server_port(), 9099);
    assert_eq!(config.stats_interval_secs(), 5);
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.api_base_url(), "https://api.openai.com/v1");
    assert_eq!(config.api_model(), "gpt-4o");
    assert_eq!(config.server_port(), 8080);
}
