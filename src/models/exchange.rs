// src/models/exchange.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A problem plus its full test-case list, as exchanged with the exercise
/// repository. Every field is named here at compile time; the serde codec IS
/// the schema, so a malformed document fails deserialization instead of
/// producing a half-populated value.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProblemAndTestCaseList {
    #[validate(nested)]
    pub problem: ProblemData,

    #[validate(
        length(min = 1, max = 200, message = "A problem needs 1 to 200 test cases."),
        nested
    )]
    pub test_cases: Vec<TestCaseData>,
}

/// Problem fields carried by the exchange document. Course assignment and
/// scheduling are set by the importing instructor's request, not the document.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProblemData {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 20000))]
    pub description: String,

    #[serde(default)]
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TestCaseData {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(length(max = 65536))]
    pub input: String,

    #[validate(length(max = 65536))]
    pub expected_output: String,

    #[serde(default = "default_secret")]
    pub secret: bool,
}

fn default_secret() -> bool {
    true
}
