//! Validates contract fixtures against frozen JSON schemas.

use doclens_analysis_contract::{UrgencyLevel, parse_analysis_response, parse_history_response};
use doclens_auth::LoginResponse;
use jsonschema::JSONSchema;
use serde_json::{Value, json};

const CONTRACTS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../contracts");

fn read(relative: &str) -> String {
    std::fs::read_to_string(format!("{CONTRACTS}/{relative}"))
        .expect("json file should be readable")
}

fn load_json(relative: &str) -> Value {
    serde_json::from_str(&read(relative)).expect("json file should be valid")
}

fn compile_validator(name: &str) -> JSONSchema {
    let schema = load_json(&format!("{name}.schema.json"));
    JSONSchema::compile(&schema).expect("schema should compile")
}

fn fixture(name: &str) -> Value {
    load_json(&format!("fixtures/{name}.valid.json"))
}

#[test]
fn login_fixture_matches_schema() {
    let validator = compile_validator("login-response");
    assert!(
        validator.is_valid(&fixture("login-response")),
        "login fixture should validate against schema"
    );
}

#[test]
fn analysis_fixture_matches_schema() {
    let validator = compile_validator("analysis-response");
    assert!(
        validator.is_valid(&fixture("analysis-response")),
        "analysis fixture should validate against schema"
    );
}

#[test]
fn history_fixture_matches_schema() {
    let validator = compile_validator("history-response");
    assert!(
        validator.is_valid(&fixture("history-response")),
        "history fixture should validate against schema"
    );
}

#[test]
fn analysis_schema_rejects_missing_analysis() {
    let validator = compile_validator("analysis-response");
    assert!(!validator.is_valid(&json!({ "file_name": "letter.pdf" })));
    assert!(!validator.is_valid(&json!({ "file_name": "", "analysis": {} })));
}

#[test]
fn fixtures_decode_with_client_parsers() {
    let login: LoginResponse = serde_json::from_str(&read("fixtures/login-response.valid.json"))
        .expect("login fixture should decode");
    assert!(login.user.has_analysis_credential());

    let analysis = parse_analysis_response(read("fixtures/analysis-response.valid.json").as_bytes())
        .expect("analysis fixture should decode");
    assert_eq!(analysis.file_name, "tax-notice.pdf");
    assert_eq!(analysis.urgency(), UrgencyLevel::High);
    assert_eq!(analysis.analysis.formatted_sections.len(), 2);

    let history = parse_history_response(read("fixtures/history-response.valid.json").as_bytes())
        .expect("history fixture should decode");
    assert_eq!(history.len(), 2);
}
