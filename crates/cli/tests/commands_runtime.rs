use std::env;
use std::fs;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use outreach_agent::{LlmClient, TitleExtractor};
use outreach_cli::commands::{config, doctor, pipeline, reclaim, stats};
use outreach_sheets::{InMemoryRowStore, SheetLayout, SheetLeadRepository};
use serde_json::Value;

const VALID_ENV: [(&str, &str); 3] = [
    ("OUTREACH_SHEETS_SPREADSHEET_ID", "sheet-test"),
    ("OUTREACH_SHEETS_ACCESS_TOKEN", "ya29.test-token"),
    ("OUTREACH_TELEGRAM_BOT_TOKEN", "123456:test-secret"),
];

#[test]
fn stats_returns_config_failure_without_env() {
    with_env(&[], || {
        let result = stats::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "stats");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn reclaim_is_a_no_op_when_disabled() {
    with_env(&VALID_ENV, || {
        let result = reclaim::run();
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "reclaim");
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().unwrap_or_default().contains("disabled"));
    });
}

#[test]
fn config_output_redacts_secrets_and_names_sources() {
    with_env(&VALID_ENV, || {
        let output = config::run();

        assert!(output.contains(
            "- telegram.bot_token = 123456:*** (source: env (OUTREACH_TELEGRAM_BOT_TOKEN))"
        ));
        assert!(output.contains("- sheets.access_token = ya29:***"));
        assert!(output.contains("- llm.api_key = <unset> (source: default)"));
        assert!(output.contains("- queue.reclaim_after_secs = <disabled>"));
        assert!(!output.contains("test-secret"));
        assert!(!output.contains("test-token"));
    });
}

#[test]
fn doctor_json_reports_config_failure() {
    with_env(&[], || {
        let payload = parse_payload(&doctor::run(true));
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

#[test]
fn pipeline_filter_keeps_inactive_groups_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("chats.json");
    let output = dir.path().join("inactive.json");
    let groups = dir.path().join("groups.json");
    fs::write(
        &input,
        r#"[
            {"id": "-1001", "title": "INACTIVE John & Jane Trucking #45", "type": "group"},
            {"id": "-1002", "title": "Just chatting", "type": "group"},
            {"id": "42", "title": "inactive person", "type": "user"},
            {"id": "-1003", "title": "Inactive Fleet News", "type": "channel", "unreadCount": 3}
        ]"#,
    )
    .expect("write chats");

    let result = pipeline::filter(&input, &output, "inactive", Some(&groups));
    assert_eq!(result.exit_code, 0, "{}", result.output);

    let kept: Value = serde_json::from_str(&fs::read_to_string(&output).expect("output"))
        .expect("output json");
    let ids: Vec<&str> = kept
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|chat| chat["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["-1001", "-1003"]);

    let grouped: Value = serde_json::from_str(&fs::read_to_string(&groups).expect("groups"))
        .expect("groups json");
    assert_eq!(grouped.as_array().map(Vec::len), Some(3));
}

#[test]
fn pipeline_filter_reports_unreadable_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = pipeline::filter(
        &dir.path().join("missing.json"),
        &dir.path().join("out.json"),
        "inactive",
        None,
    );

    assert_eq!(result.exit_code, 5);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "input");
}

struct CannedLlm;

#[async_trait]
impl LlmClient for CannedLlm {
    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok(r#"Here you go: [{"name": "John & Jane", "company": "Trucking"}, {"name": null, "company": "Fleet"}]"#
            .to_owned())
    }
}

#[tokio::test]
async fn pipeline_extract_writes_leads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("inactive.json");
    let output = dir.path().join("leads.json");
    fs::write(
        &input,
        r#"[
            {"id": "-1001", "title": "INACTIVE John & Jane Trucking #45", "type": "group"},
            {"id": "-1003", "title": "Inactive Fleet News", "type": "channel"}
        ]"#,
    )
    .expect("write input");

    let extractor = TitleExtractor::new(Arc::new(CannedLlm));
    let result = pipeline::execute_extract(&input, &output, &extractor, 40).await;
    assert_eq!(result.exit_code, 0, "{}", result.output);

    let leads: Value = serde_json::from_str(&fs::read_to_string(&output).expect("leads"))
        .expect("leads json");
    assert_eq!(leads[0]["id"], "-1001");
    assert_eq!(leads[0]["name"], "John & Jane");
    assert_eq!(leads[0]["company"], "Trucking");
    assert_eq!(leads[1]["name"], Value::Null);
    assert_eq!(leads[1]["title"], "Inactive Fleet News");
}

#[tokio::test]
async fn pipeline_import_appends_after_existing_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("leads.json");
    fs::write(
        &input,
        r#"[
            {"id": "-1001", "name": "John", "company": "Trucking", "title": "INACTIVE John"},
            {"id": "-1003", "name": null, "company": null, "title": "Inactive Fleet"}
        ]"#,
    )
    .expect("write leads");

    let store = Arc::new(InMemoryRowStore::with_rows(vec![
        vec!["ID", "Name", "Company", "Original Title", "Notes", "Result", "Completed By"],
        vec!["-900", "Old", "Lead", "INACTIVE old", "", "Ignored", "1 @a"],
    ]));
    let repository = SheetLeadRepository::new(store.clone(), SheetLayout::default());

    let result = pipeline::execute_import(&input, &repository).await;
    assert_eq!(result.exit_code, 0, "{}", result.output);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["message"], "imported 2 leads at rows 3..=4");

    assert_eq!(store.cell(3, 0).await, "-1001");
    assert_eq!(store.cell(4, 3).await, "Inactive Fleet");
    assert_eq!(store.cell(4, 5).await, "");
}

#[tokio::test]
async fn stats_and_reclaim_execute_against_a_repository() {
    let store = Arc::new(InMemoryRowStore::with_rows(vec![
        vec!["ID", "Name", "Company", "Original Title", "Notes", "Result", "Completed By"],
        vec!["-1", "", "", "INACTIVE a", "", "", ""],
        vec!["-2", "", "", "INACTIVE b", "", "Successful", "1 @a"],
    ]));
    let repository = SheetLeadRepository::new(store, SheetLayout::default());

    let payload = parse_payload(&stats::execute(&repository).await.output);
    assert_eq!(
        payload["message"],
        "total=2 completed=1 pending=1 in_progress=0 successful=1 rejected=0 ignored=0 unrecognized=0"
    );

    let payload = parse_payload(&reclaim::execute(&repository).await.output);
    assert_eq!(payload["message"], "no stale claims");
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "OUTREACH_SHEETS_SPREADSHEET_ID",
        "OUTREACH_SHEETS_SHEET_NAME",
        "OUTREACH_SHEETS_ACCESS_TOKEN",
        "OUTREACH_SHEETS_BASE_URL",
        "OUTREACH_TELEGRAM_BOT_TOKEN",
        "OUTREACH_BOT_AUTHORIZED_USERS",
        "OUTREACH_LLM_PROVIDER",
        "OUTREACH_LLM_API_KEY",
        "OUTREACH_LLM_BASE_URL",
        "OUTREACH_LLM_MODEL",
        "OUTREACH_TRANSCRIPTION_API_KEY",
        "OUTREACH_QUEUE_RECLAIM_AFTER_SECS",
        "OUTREACH_SERVER_BIND_ADDRESS",
        "OUTREACH_SERVER_HEALTH_CHECK_PORT",
        "OUTREACH_LOGGING_LEVEL",
        "OUTREACH_LOGGING_FORMAT",
        "OUTREACH_LOG_LEVEL",
        "OUTREACH_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
