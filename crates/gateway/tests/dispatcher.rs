mod common;

use serde_json::json;

use common::*;

#[tokio::test]
async fn write_then_read_round_trip_payloads() {
    let skills = skills_fixture();
    let d = dispatcher(skills.path());

    let written = d
        .dispatch(
            "write_file_in_skill",
            r#"{"skill_name":"calc","file_path":"notes/todo.txt","content":"hello"}"#,
        )
        .await;
    assert_eq!(
        written,
        json!({
            "success": true,
            "skill_name": "calc",
            "file_path": "notes/todo.txt",
            "bytes_written": 5,
        })
    );

    let read = d
        .dispatch(
            "read_file_in_skill",
            r#"{"skill_name":"calc","file_path":"notes/todo.txt"}"#,
        )
        .await;
    assert_eq!(
        read,
        json!({
            "success": true,
            "skill_name": "calc",
            "file_path": "notes/todo.txt",
            "content": "hello",
            "size_bytes": 5,
            "encoding": "utf-8",
        })
    );
}

#[tokio::test]
async fn failed_write_keeps_request_fields() {
    let skills = skills_fixture();
    let d = dispatcher(skills.path());

    let payload = d
        .dispatch(
            "write_file_in_skill",
            r#"{"skill_name":"calc","file_path":"venv/bin/python","content":"x"}"#,
        )
        .await;
    assert_eq!(payload["success"], false);
    assert_eq!(payload["skill_name"], "calc");
    assert_eq!(payload["file_path"], "venv/bin/python");
    assert!(payload["error"].is_string());
    assert_eq!(payload["error_kind"], "validation");
}

#[tokio::test]
async fn missing_skill_name_gets_a_descriptive_error() {
    let skills = skills_fixture();
    let d = dispatcher(skills.path());

    let payload = d.dispatch("get_skill", "{}").await;
    let error = payload["error"].as_str().unwrap();
    assert!(error.starts_with("Invalid skill name"), "{error}");
    assert_eq!(payload["error_kind"], "validation");
}

#[tokio::test]
async fn script_without_runtime_is_an_error_payload() {
    let skills = skills_fixture();
    std::fs::create_dir(skills.path().join("bare")).unwrap();
    let d = dispatcher(skills.path());

    let payload = d
        .dispatch("run_python_script", r#"{"skill_name":"bare","script":"print(1)"}"#)
        .await;
    assert_eq!(
        payload,
        json!({
            "error": "Skill 'bare' does not have a venv. Cannot execute script.",
            "error_kind": "execution",
        })
    );
}

#[tokio::test]
async fn create_skill_proposes_without_touching_disk() {
    let skills = skills_fixture();
    let d = dispatcher(skills.path());

    let payload = d
        .dispatch(
            "create_skill",
            r##"{"skill_name":"weather","skill_md_content":"# W","requirements":"requests\nnumpy"}"##,
        )
        .await;
    assert_eq!(payload["status"], "pending_confirmation");
    let actions: Vec<&str> = payload["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a.as_str().unwrap())
        .collect();
    assert_eq!(actions.len(), 5);
    assert_eq!(actions[1], "Write SKILL.MD (3 bytes)");
    assert_eq!(actions[2], "Write requirements.txt");
    assert_eq!(actions[4], "Install dependencies: requests, numpy");
    assert!(!skills.path().join("weather").exists());
    assert_eq!(d.creations().len(), 1);

    let exists = d
        .dispatch("create_skill", r##"{"skill_name":"calc","skill_md_content":"# C"}"##)
        .await;
    assert!(exists["error"].is_string());
    assert_eq!(d.creations().len(), 1);
}

#[tokio::test]
async fn list_skills_reports_missing_root() {
    let skills = skills_fixture();
    let d = dispatcher(&skills.path().join("missing"));

    let payload = d.dispatch("list_skills", "").await;
    assert!(payload["error"]
        .as_str()
        .unwrap()
        .starts_with("Skills folder not found"));
    assert_eq!(payload["error_kind"], "not_found");
}

#[tokio::test]
async fn traversal_is_classified_separately() {
    let skills = skills_fixture();
    let d = dispatcher(skills.path());

    let payload = d
        .dispatch(
            "read_file_in_skill",
            r#"{"skill_name":"calc","file_path":"../../etc/passwd"}"#,
        )
        .await;
    assert_eq!(payload["success"], false);
    assert_eq!(payload["error_kind"], "traversal");
}
