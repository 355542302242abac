//! Integration tests reading real files through DataFusion.

mod common;

use chunk_guard::config::{FileFormat, FileSpec, JobSpec, RuleDescriptor, Settings};
use chunk_guard::core::{Severity, Status, ValidationEngine};
use chunk_guard::error::ErrorKind;
use common::*;
use std::fs::File;
use std::io::Write;
use tempfile::TempDir;

/// Writes the five-row customer file as CSV and NDJSON.
fn create_customer_files() -> TempDir {
    let dir = TempDir::new().unwrap();

    let mut csv = File::create(dir.path().join("customers.csv")).unwrap();
    writeln!(csv, "id,email,signup").unwrap();
    writeln!(csv, "1,a@b.com,05/01/2024").unwrap();
    writeln!(csv, "2,,30/02/2024").unwrap();
    writeln!(csv, "3,bad,01/03/2024").unwrap();
    writeln!(csv, "1,a@b.com,11/04/2024").unwrap();
    writeln!(csv, "5,c@d.com,20/05/2024").unwrap();
    csv.flush().unwrap();

    let mut json = File::create(dir.path().join("customers.json")).unwrap();
    writeln!(json, r#"{{"id": 1, "email": "a@b.com"}}"#).unwrap();
    writeln!(json, r#"{{"id": 2, "email": null}}"#).unwrap();
    writeln!(json, r#"{{"id": 3, "email": "bad"}}"#).unwrap();
    writeln!(json, r#"{{"id": 1, "email": "a@b.com"}}"#).unwrap();
    writeln!(json, r#"{{"id": 5, "email": "c@d.com"}}"#).unwrap();
    json.flush().unwrap();

    let mut allowed = File::create(dir.path().join("allowed_ids.csv")).unwrap();
    writeln!(allowed, "customer_id").unwrap();
    for id in [1, 2, 3] {
        writeln!(allowed, "{id}").unwrap();
    }
    allowed.flush().unwrap();

    dir
}

fn scenario_rules() -> Vec<RuleDescriptor> {
    vec![
        mandatory("email"),
        regex("email", EMAIL_PATTERN),
        unique("id"),
    ]
}

#[tokio::test]
async fn test_csv_end_to_end() {
    let dir = create_customer_files();
    let path = dir.path().join("customers.csv").display().to_string();
    let reference = dir.path().join("allowed_ids.csv").display().to_string();

    let mut rules = scenario_rules();
    rules.push(
        RuleDescriptor::new("DateFormatCheck")
            .with_severity(Severity::Warning)
            .with_param("field", "signup")
            .with_param("format", "%d/%m/%Y"),
    );
    rules.push(
        RuleDescriptor::new("ReferentialIntegrityCheck")
            .with_param("field", "id")
            .with_param("reference_file", reference)
            .with_param("reference_key", "customer_id"),
    );
    let job = job(&path, rules, Settings::default().with_chunk_size(2));

    let outcome = ValidationEngine::default().run(&job).await.unwrap();
    let file = outcome.file(&path).unwrap();

    assert_eq!(file.format, "csv");
    assert_eq!(file.rows_processed, 5);
    assert_eq!(file.rule("MandatoryFieldCheck").unwrap().failed_count, 1);
    assert_eq!(file.rule("RegexCheck").unwrap().failed_count, 1);
    assert_eq!(file.rule("UniqueKeyCheck").unwrap().failed_count, 2);

    let dates = file.rule("DateFormatCheck").unwrap();
    assert_eq!(dates.failed_count, 1);
    assert_eq!(dates.samples[0].row_offset, 1);

    let reference = file.rule("ReferentialIntegrityCheck").unwrap();
    assert_eq!(reference.failed_count, 1);
    assert_eq!(reference.samples[0].value.as_deref(), Some("5"));

    assert_eq!(outcome.status, Status::Failed);
    assert_eq!(outcome.exit_code(), 1);
}

#[tokio::test]
async fn test_ndjson_matches_csv() {
    let dir = create_customer_files();
    let csv = dir.path().join("customers.csv").display().to_string();
    let json = dir.path().join("customers.json").display().to_string();

    let job = JobSpec::new("both")
        .with_file(
            scenario_rules()
                .into_iter()
                .fold(FileSpec::new(&csv), |file, rule| file.with_rule(rule)),
        )
        .with_file(
            scenario_rules()
                .into_iter()
                .fold(FileSpec::new(&json).with_format(FileFormat::Json), |file, rule| {
                    file.with_rule(rule)
                }),
        )
        .with_settings(Settings::default().with_chunk_size(3));

    let outcome = ValidationEngine::default().run(&job).await.unwrap();
    let counts = |path: &str| -> Vec<(u64, u64)> {
        outcome
            .file(path)
            .unwrap()
            .rules
            .iter()
            .map(|r| (r.failed_count, r.total_count))
            .collect()
    };
    assert_eq!(counts(&csv), counts(&json));
    assert_eq!(outcome.files.len(), 2);
}

#[tokio::test]
async fn test_missing_reference_file_fails_dependent_rules() {
    let dir = create_customer_files();
    let path = dir.path().join("customers.csv").display().to_string();
    let missing = dir.path().join("nope.csv").display().to_string();

    let rules = vec![
        RuleDescriptor::new("ReferentialIntegrityCheck")
            .with_param("field", "id")
            .with_param("reference_file", missing.clone()),
        RuleDescriptor::new("CrossFileDuplicateCheck")
            .with_param("field", "id")
            .with_param("reference_file", missing),
        mandatory("id"),
    ];
    let outcome = ValidationEngine::default()
        .run(&job(&path, rules, Settings::default()))
        .await
        .unwrap();
    let file = outcome.file(&path).unwrap();

    for rule in &file.rules[..2] {
        assert_eq!(rule.error.as_ref().map(|e| e.kind), Some(ErrorKind::Resource));
    }
    assert!(file.rules[2].passed);
}

#[tokio::test]
async fn test_job_from_json() {
    let dir = create_customer_files();
    let path = dir.path().join("customers.csv").display().to_string();
    let description = serde_json::json!({
        "name": "customers",
        "files": [{
            "path": path,
            "validations": [
                {"type": "MandatoryFieldCheck", "severity": "warning", "params": {"field": "email"}},
                {"type": "RangeCheck", "params": {"field": "id", "min": 1, "max": 5}},
                {"type": "RegexCheck", "enabled": false, "params": {"field": "email", "pattern": "^x"}}
            ]
        }],
        "settings": {"chunk_size": 4}
    });
    let job = JobSpec::from_json_str(&description.to_string()).unwrap();

    let outcome = ValidationEngine::default().run(&job).await.unwrap();
    assert_eq!(outcome.status, Status::Warning);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.files[0].rules.len(), 2);
    assert_eq!(outcome.files[0].batches_processed, 2);
}
