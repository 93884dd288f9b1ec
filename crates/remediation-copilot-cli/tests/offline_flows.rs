use assert_cmd::Command;
use predicates::prelude::*;

const PROVIDER_VARS: [&str; 4] = [
    "OPENAI_API_KEY",
    "GROQ_API_KEY",
    "GEMINI_API_KEY",
    "COHERE_API_KEY",
];

fn offline_cmd() -> Command {
    let mut cmd = Command::cargo_bin("remediation-copilot").unwrap();
    for var in PROVIDER_VARS {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn incidents_path() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/sample_incidents.json").to_string()
}

#[test]
fn providers_reports_every_skip_reason() {
    offline_cmd()
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 of 4 provider(s) available"))
        .stdout(predicate::str::contains("OPENAI_API_KEY"))
        .stdout(predicate::str::contains("cohere"));
}

#[test]
fn remediate_without_providers_fails() {
    offline_cmd()
        .args(["--incidents", &incidents_path(), "remediate", "--id", "INC-102"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no language-model provider available"));
}

#[test]
fn analyze_falls_back_to_static_guidance() {
    offline_cmd()
        .args(["analyze", "--text", "Ransomware encrypted the file server"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Underwriting Checklist:"))
        .stdout(predicate::str::contains("Broker Questions:"))
        .stdout(predicate::str::contains("Recommendation: Request fix"));
}

#[test]
fn questions_stub_emits_two_items_as_json() {
    let output = offline_cmd()
        .args(["--json", "questions", "--text", "Phishing", "--item", "MFA"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let questions: Vec<String> = serde_json::from_slice(&output).unwrap();
    assert_eq!(questions.len(), 2);
}

#[test]
fn suggest_applies_broker_answers_offline() {
    offline_cmd()
        .args([
            "suggest",
            "--text",
            "OT network exposure",
            "--item",
            "Segmentation",
            "--question",
            "Is MFA enforced?",
            "--answer",
            "no",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Escalate: broker reported a missing control"))
        .stdout(predicate::str::contains("Risk multiplier: 1.2 (urgent remediation)"));
}

#[test]
fn suggest_rejects_mismatched_answers() {
    offline_cmd()
        .args(["suggest", "--text", "x", "--question", "Q1", "--answer", "yes", "--answer", "no"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("broker answers are inconsistent"));
}
