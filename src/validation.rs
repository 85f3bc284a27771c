//! Input validation for diagnostic test records.
//!
//! Works on the loosely-typed JSON object produced by body parsing (JSON
//! bodies and flattened multipart forms alike) and returns typed values
//! carrying only the recognised fields. Every offending field is reported,
//! not just the first.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{resolve_test_type, FileRef, ResultValue, StoredFile, TestResult, OTHER_TEST_TYPE};

/// Shortest accepted patient name and test type, in characters.
const MIN_TEXT_LEN: usize = 3;

const MSG_REQUIRED: &str = "Required";
const MSG_PATIENT_NAME: &str = "Patient name must be at least 3 characters";
const MSG_TEST_TYPE: &str = "Test type must be at least 3 characters";
const MSG_CUSTOM_TEST_TYPE: &str = "Please specify the test type";
const MSG_INVALID_DATE: &str = "Invalid date format";
const MSG_EXPECTED_STRING: &str = "Expected string";
const MSG_EXPECTED_OBJECT: &str = "Expected object";
const MSG_EXPECTED_SCALAR: &str = "Expected string or number";
const MSG_EXPECTED_FILE: &str = "Expected file path or file record";
const MSG_EXPECTED_FILE_LIST: &str = "Expected list of files";

/// One step of a field path: object key or array index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub message: String,
    pub path: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed on {} field(s)", issues.len())]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// Whether any issue is rooted at the given top-level field.
    pub fn mentions(&self, field: &str) -> bool {
        self.issues
            .iter()
            .any(|i| i.path.first() == Some(&PathSegment::Key(field.to_string())))
    }
}

/// A fully validated record, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDiagnosticTest {
    pub patient_name: String,
    pub test_type: String,
    pub test_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub result: TestResult,
}

/// Changes requested by a partial update. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticTestPatch {
    pub patient_name: Option<String>,
    pub test_type: Option<String>,
    pub test_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub result: Option<ResultPatch>,
    pub existing_files: Option<Vec<FileRef>>,
}

/// Key-level changes to the `result` bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPatch {
    /// `Some(None)` clears the value.
    pub value: Option<Option<ResultValue>>,
    /// Replacement file list, when the body names one explicitly.
    pub files: Option<Vec<FileRef>>,
    pub extra: Vec<(String, ResultValue)>,
}

/// Collects issues while the fields are checked one by one.
#[derive(Default)]
struct Issues(Vec<FieldIssue>);

impl Issues {
    fn push(&mut self, path: Vec<PathSegment>, message: &str) {
        self.0.push(FieldIssue {
            message: message.to_string(),
            path,
        });
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError { issues: self.0 })
        }
    }
}

/// Validate a create request. All required fields must be present.
pub fn validate_new(input: &Map<String, Value>) -> Result<NewDiagnosticTest, ValidationError> {
    let mut issues = Issues::default();

    let patient_name = required(input, "patientName", &mut issues)
        .and_then(|v| min_text(v, "patientName", MSG_PATIENT_NAME, &mut issues));
    let test_type = required(input, "testType", &mut issues)
        .and_then(|v| test_type(input, v, &mut issues));
    let test_date = required(input, "testDate", &mut issues)
        .and_then(|v| date(v, "testDate", &mut issues));
    let notes = optional_string(input, "notes", &mut issues);
    let result = match input.get("result") {
        None | Some(Value::Null) => Some(TestResult::default()),
        Some(v) => result_patch(v, &mut issues).map(|patch| {
            let mut result = TestResult::default();
            apply_result_patch(&mut result, patch);
            result
        }),
    };

    match (patient_name, test_type, test_date, result) {
        (Some(patient_name), Some(test_type), Some(test_date), Some(result)) => issues.finish(NewDiagnosticTest {
            patient_name,
            test_type,
            test_date,
            notes,
            result,
        }),
        _ => Err(ValidationError {
            issues: issues.0,
        }),
    }
}

/// Validate an update request. Any subset of fields may be present.
pub fn validate_patch(input: &Map<String, Value>) -> Result<DiagnosticTestPatch, ValidationError> {
    let mut issues = Issues::default();

    let patch = DiagnosticTestPatch {
        patient_name: present(input, "patientName")
            .and_then(|v| min_text(v, "patientName", MSG_PATIENT_NAME, &mut issues)),
        test_type: present(input, "testType").and_then(|v| test_type(input, v, &mut issues)),
        test_date: present(input, "testDate").and_then(|v| date(v, "testDate", &mut issues)),
        notes: optional_string(input, "notes", &mut issues),
        result: present(input, "result").and_then(|v| result_patch(v, &mut issues)),
        existing_files: present(input, "existingFiles").and_then(|v| existing_files(v, &mut issues)),
    };

    issues.finish(patch)
}

/// Parse the accepted `testDate` shapes into a UTC instant.
///
/// Bare dates (`2024-01-10`) become midnight UTC; date-times without an
/// offset are taken as UTC.
pub fn parse_test_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Apply a result patch onto a stored result bag.
pub fn apply_result_patch(result: &mut TestResult, patch: ResultPatch) {
    if let Some(value) = patch.value {
        result.value = value;
    }
    if let Some(files) = patch.files {
        result.files = files;
    }
    for (key, value) in patch.extra {
        result.extra.insert(key, value);
    }
}

fn present<'a>(input: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    input.get(key).filter(|v| !v.is_null())
}

fn required<'a>(
    input: &'a Map<String, Value>,
    key: &str,
    issues: &mut Issues,
) -> Option<&'a Value> {
    let value = present(input, key);
    if value.is_none() {
        issues.push(vec![key.into()], MSG_REQUIRED);
    }
    value
}

fn string<'a>(value: &'a Value, key: &str, issues: &mut Issues) -> Option<&'a str> {
    match value.as_str() {
        Some(s) => Some(s),
        None => {
            issues.push(vec![key.into()], MSG_EXPECTED_STRING);
            None
        }
    }
}

fn min_text(value: &Value, key: &str, message: &str, issues: &mut Issues) -> Option<String> {
    let text = string(value, key, issues)?;
    if text.chars().count() < MIN_TEXT_LEN {
        issues.push(vec![key.into()], message);
        return None;
    }
    Some(text.to_string())
}

fn test_type(input: &Map<String, Value>, value: &Value, issues: &mut Issues) -> Option<String> {
    let selected = min_text(value, "testType", MSG_TEST_TYPE, issues)?;
    if selected != OTHER_TEST_TYPE {
        return Some(selected);
    }
    let custom = input.get("customTestType").and_then(Value::as_str);
    match resolve_test_type(&selected, custom) {
        Some(resolved) if resolved.chars().count() >= MIN_TEXT_LEN => Some(resolved),
        Some(_) => {
            issues.push(vec!["testType".into()], MSG_TEST_TYPE);
            None
        }
        None => {
            issues.push(vec!["testType".into()], MSG_CUSTOM_TEST_TYPE);
            None
        }
    }
}

fn date(value: &Value, key: &str, issues: &mut Issues) -> Option<DateTime<Utc>> {
    let raw = string(value, key, issues)?;
    let parsed = parse_test_date(raw);
    if parsed.is_none() {
        issues.push(vec![key.into()], MSG_INVALID_DATE);
    }
    parsed
}

fn optional_string(input: &Map<String, Value>, key: &str, issues: &mut Issues) -> Option<String> {
    present(input, key)
        .and_then(|v| string(v, key, issues))
        .map(str::to_string)
}

fn scalar(value: &Value) -> Option<ResultValue> {
    match value {
        Value::String(s) => Some(ResultValue::Text(s.clone())),
        Value::Number(n) => Some(ResultValue::Number(n.clone())),
        _ => None,
    }
}

fn result_patch(value: &Value, issues: &mut Issues) -> Option<ResultPatch> {
    let Some(bag) = value.as_object() else {
        issues.push(vec!["result".into()], MSG_EXPECTED_OBJECT);
        return None;
    };

    let before = issues.0.len();
    let mut patch = ResultPatch::default();

    for (key, entry) in bag {
        match key.as_str() {
            "value" => {
                patch.value = match entry {
                    Value::Null => Some(None),
                    Value::String(s) if s.is_empty() => Some(None),
                    other => match scalar(other) {
                        Some(v) => Some(Some(v)),
                        None => {
                            issues.push(vec!["result".into(), "value".into()], MSG_EXPECTED_SCALAR);
                            None
                        }
                    },
                };
            }
            "files" => {
                let base = vec![PathSegment::from("result"), PathSegment::from("files")];
                patch.files = file_list(entry, base, issues);
            }
            _ => match scalar(entry) {
                Some(v) => patch.extra.push((key.clone(), v)),
                None => issues.push(
                    vec!["result".into(), key.as_str().into()],
                    MSG_EXPECTED_SCALAR,
                ),
            },
        }
    }

    (issues.0.len() == before).then_some(patch)
}

fn existing_files(value: &Value, issues: &mut Issues) -> Option<Vec<FileRef>> {
    let base = vec![PathSegment::from("existingFiles")];
    // Multipart forms carry the list as a JSON-encoded string.
    if let Value::String(raw) = value {
        let trimmed = raw.trim();
        if trimmed.starts_with('[') {
            return match serde_json::from_str::<Value>(trimmed) {
                Ok(decoded) => file_list(&decoded, base, issues),
                Err(_) => {
                    issues.push(base, MSG_EXPECTED_FILE_LIST);
                    None
                }
            };
        }
    }
    file_list(value, base, issues)
}

/// A list of file references; a single entry is wrapped in a list.
fn file_list(value: &Value, base: Vec<PathSegment>, issues: &mut Issues) -> Option<Vec<FileRef>> {
    let entries: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::String(_) | Value::Object(_) => vec![value],
        _ => {
            issues.push(base, MSG_EXPECTED_FILE_LIST);
            return None;
        }
    };

    let before = issues.0.len();
    let mut files = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let mut path = base.clone();
        if value.is_array() {
            path.push(index.into());
        }
        match file_ref(entry) {
            Some(file) => files.push(file),
            None => issues.push(path, MSG_EXPECTED_FILE),
        }
    }

    (issues.0.len() == before).then_some(files)
}

fn file_ref(value: &Value) -> Option<FileRef> {
    match value {
        Value::String(path) if !path.trim().is_empty() => Some(FileRef::Path(path.clone())),
        Value::Object(_) => serde_json::from_value::<StoredFile>(value.clone())
            .ok()
            .filter(|f| !f.path.trim().is_empty())
            .map(FileRef::Record),
        _ => None,
    }
}
