use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Variable bindings handed to the evaluator alongside the input.
pub type Context = IndexMap<String, serde_json::Value>;

/// One fixture case, as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub input: String,
    pub expected_output: String,
    pub expected_output_type: String,
    pub context: Context,
    pub source_path: PathBuf,
}

/// JSON shape of a case inside a fixture file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawCase {
    pub name: String,
    pub input: String,
    pub expected_output: String,
    // Older fixtures were written with this typo
    #[serde(alias = "exceptedOutputType")]
    pub expected_output_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
}

impl RawCase {
    pub fn into_case(self, source_path: PathBuf) -> TestCase {
        TestCase {
            name: self.name,
            input: self.input,
            expected_output: self.expected_output,
            expected_output_type: self.expected_output_type,
            context: self.context.unwrap_or_default(),
            source_path,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub status: Status,
    pub path: String,
    pub name: String,
    pub actual_output: Option<String>,
    pub actual_output_type: Option<String>,
    pub expected_output: Option<String>,
    pub expected_output_type: Option<String>,
    pub error: Option<String>,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.status == Status::Passed
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub passed: usize, // Number of passed cases
    pub failed: usize, // Number of failed cases
    pub results: Vec<TestResult>,
}

impl Report {
    pub fn total(&self) -> usize {
        self.results.len()
    }
}
