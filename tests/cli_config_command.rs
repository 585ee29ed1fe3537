//! Integration tests for the `chat-relay config` template
//!
//! The generated template must load as a working configuration once written
//! to disk, and stay loadable after switching it to static sessions.

use chat_relay::cli::generate_config_template;
use chat_relay::config::Config;
use std::fs;
use tempfile::TempDir;

fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

#[test]
fn test_generated_template_creates_valid_config_file() {
    let temp_dir = create_temp_dir();
    let config_path = temp_dir.path().join("config.toml");

    fs::write(&config_path, generate_config_template()).expect("Failed to write template");

    let config =
        Config::from_file(&config_path).expect("Generated template should load as valid Config");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(
        config.auth.session_url(),
        Some("http://127.0.0.1:3001/api/auth/session")
    );
    assert!(config.auth.sessions().is_empty());
}

#[test]
fn test_template_switched_to_static_sessions_loads() {
    let temp_dir = create_temp_dir();
    let config_path = temp_dir.path().join("config.toml");

    let edited = generate_config_template()
        .replace(
            "session_url = \"http://127.0.0.1:3001/api/auth/session\"",
            "",
        )
        .replace("# [[auth.sessions]]", "[[auth.sessions]]")
        .replace("# token = ", "token = ")
        .replace("# user_id = ", "user_id = ");
    fs::write(&config_path, edited).expect("Failed to write template");

    let config = Config::from_file(&config_path).expect("edited template should load");
    assert!(config.auth.session_url().is_none());
    assert_eq!(config.auth.sessions().len(), 1);
    assert_eq!(config.auth.sessions()[0].user_id(), "dev-user");
}
