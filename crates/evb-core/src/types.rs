use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

/// A task's globally unique identifier within the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An `owner/name` remote repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId(pub String);

impl RepoId {
    /// Last path segment of the `owner/name` identifier, e.g. `name`.
    pub fn repo_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(self.0.as_str())
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of one per-file patch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchFileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
}

impl fmt::Display for PatchFileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PatchFileStatus::Added => "added",
            PatchFileStatus::Modified => "modified",
            PatchFileStatus::Removed => "removed",
            PatchFileStatus::Renamed => "renamed",
        };
        write!(f, "{s}")
    }
}

/// One file's worth of a parsed unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchInfo {
    pub filename: String,
    pub status: PatchFileStatus,
    /// Hunk lines only; no `diff --git`/`index`/mode header.
    pub patch_content: String,
    pub is_test_file: bool,
    pub old_filename: Option<String>,
}

/// Status of a single test-runner node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Error,
    Unknown,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Passed => "PASSED",
            TestStatus::Failed => "FAILED",
            TestStatus::Skipped => "SKIPPED",
            TestStatus::Error => "ERROR",
            TestStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TestStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "PASSED" => TestStatus::Passed,
            "FAILED" => TestStatus::Failed,
            "SKIPPED" => TestStatus::Skipped,
            "ERROR" => TestStatus::Error,
            _ => TestStatus::Unknown,
        })
    }
}

/// A unit of AST-level change, produced upstream by the data-collection
/// pipeline and occasionally consumed here as an already-derived change list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeType {
    Class,
    Function,
    Method,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChange {
    pub name: String,
    pub change_type: ChangeType,
    pub code_type: CodeType,
}

/// `patch`/`test_patch` accept either a standard unified diff string or an
/// array of already-parsed per-file records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiffPayload {
    Unified(String),
    Records(Vec<PatchInfo>),
}

impl DiffPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            DiffPayload::Unified(s) => s.trim().is_empty(),
            DiffPayload::Records(records) => records.is_empty(),
        }
    }
}

/// A comma-separated list of test-runner node identifiers. The dataset stores
/// `FAIL_TO_PASS`/`PASS_TO_PASS` as a single comma-joined string rather than a
/// JSON array, so (de)serialization goes through that string form too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestIdList(pub Vec<String>);

impl TestIdList {
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect(),
        )
    }

    pub fn as_set(&self) -> HashSet<&str> {
        self.0.iter().map(String::as_str).collect()
    }
}

impl Serialize for TestIdList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.join(","))
    }
}

impl<'de> Deserialize<'de> for TestIdList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TestIdList::parse(&raw))
    }
}

/// One immutable task specification, as loaded from the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    pub instance_id: InstanceId,
    pub repo: RepoId,
    pub base_commit: String,
    pub problem_statement: String,
    pub patch: DiffPayload,
    pub test_patch: DiffPayload,
    #[serde(rename = "FAIL_TO_PASS")]
    pub fail_to_pass: TestIdList,
    #[serde(rename = "PASS_TO_PASS")]
    pub pass_to_pass: TestIdList,
    pub created_at: DateTime<Utc>,
    /// Numeric task/image cache key from the raw dataset record.
    pub number: u64,
}

impl Spec {
    pub fn repo_name(&self) -> &str {
        self.repo.repo_name()
    }

    /// `FAIL_TO_PASS ∩ PASS_TO_PASS = ∅`.
    pub fn has_disjoint_test_sets(&self) -> bool {
        self.fail_to_pass
            .as_set()
            .is_disjoint(&self.pass_to_pass.as_set())
    }
}

/// Best-effort token usage for one agent run. Never populated by throwing;
/// a parse failure yields all fields `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none() && self.output_tokens.is_none() && self.total_tokens.is_none()
    }
}

/// The structured verdict for one `(agent_name, instance_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub agent_name: String,
    pub instance_id: InstanceId,
    pub success_f2p: bool,
    pub success_p2p: bool,
    pub success: bool,
    pub passed_f2p_tests: Vec<String>,
    pub passed_p2p_tests: Vec<String>,
    pub expected_f2p_tests: Vec<String>,
    pub expected_p2p_tests: Vec<String>,
    #[serde(flatten)]
    pub tokens: TokenUsage,
    pub error: Option<String>,
}

impl EvaluationResult {
    pub fn cache_key(&self) -> (String, String) {
        (self.agent_name.clone(), self.instance_id.0.clone())
    }

    pub fn failed(
        agent_name: impl Into<String>,
        instance_id: InstanceId,
        error: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            instance_id,
            success_f2p: false,
            success_p2p: false,
            success: false,
            passed_f2p_tests: Vec::new(),
            passed_p2p_tests: Vec::new(),
            expected_f2p_tests: Vec::new(),
            expected_p2p_tests: Vec::new(),
            tokens: TokenUsage::default(),
            error: Some(error.into()),
        }
    }
}
