//! Unit tests for keychain/env credential loading.
//!
//! These tests mutate process-global env vars and run serially. The
//! keychain service is assumed absent in test environments, so every
//! lookup falls through to the environment.

use task_harvester::config::GlobalConfig;

const ALL_VARS: [&str; 4] = [
    "OPENAI_API_KEY",
    "SLACK_BOT_TOKEN",
    "GMAIL_CLIENT_SECRET",
    "GMAIL_REFRESH_TOKEN",
];

fn clear_env() {
    for var in ALL_VARS {
        std::env::remove_var(var);
    }
}

fn full_config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
[slack]
channel_id = "C1"

[email]
sender_address = "boss@example.com"
client_id = "cid"
"#,
    )
    .expect("config parses")
}

#[tokio::test]
#[serial_test::serial]
async fn env_var_credentials_populate_all_sections() {
    clear_env();
    std::env::set_var("OPENAI_API_KEY", "sk-test");
    std::env::set_var("SLACK_BOT_TOKEN", "xoxb-test");
    std::env::set_var("GMAIL_CLIENT_SECRET", "secret-test");
    std::env::set_var("GMAIL_REFRESH_TOKEN", "refresh-test");

    let mut config = full_config();
    config.load_credentials().await.expect("credentials load");

    assert_eq!(config.llm.api_key, "sk-test");
    assert_eq!(config.slack.as_ref().expect("slack").bot_token, "xoxb-test");
    let email = config.email.as_ref().expect("email");
    assert_eq!(email.client_secret, "secret-test");
    assert_eq!(email.refresh_token, "refresh-test");

    clear_env();
}

#[tokio::test]
#[serial_test::serial]
async fn unconfigured_channels_need_no_credentials() {
    clear_env();
    std::env::set_var("OPENAI_API_KEY", "sk-test");

    let mut config = GlobalConfig::from_toml_str("").expect("config parses");
    config.load_credentials().await.expect("only llm key required");
    assert_eq!(config.llm.api_key, "sk-test");

    clear_env();
}

#[tokio::test]
#[serial_test::serial]
async fn missing_llm_key_names_env_var() {
    clear_env();

    let mut config = GlobalConfig::from_toml_str("").expect("config parses");
    let err = config
        .load_credentials()
        .await
        .expect_err("missing key must fail");
    let msg = err.to_string();
    assert!(msg.starts_with("config:"), "got: {msg}");
    assert!(msg.contains("OPENAI_API_KEY"), "got: {msg}");
}

#[tokio::test]
#[serial_test::serial]
async fn empty_env_var_counts_as_missing() {
    clear_env();
    std::env::set_var("OPENAI_API_KEY", "sk-test");
    std::env::set_var("SLACK_BOT_TOKEN", "");

    let mut config = GlobalConfig::from_toml_str(
        r#"
[slack]
channel_id = "C1"
"#,
    )
    .expect("config parses");
    let err = config
        .load_credentials()
        .await
        .expect_err("empty token must fail");
    assert!(err.to_string().contains("SLACK_BOT_TOKEN"));

    clear_env();
}
