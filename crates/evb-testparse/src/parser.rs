//! Parse pytest `-q -rA --tb=no` output into a `(node id) -> TestStatus` map,
//! with aggregation across parametrized variants of the same base test.

use std::collections::{HashMap, HashSet};

use evb_core::TestStatus;

use crate::ansi::strip_ansi_codes;
use crate::line::{contains_status_word, parse_test_line};

const SUMMARY_ANCHOR: &str = "short test summary info";

/// Strip the `[...]` parametrization suffix from a test node id.
pub fn base_test_name(test_path: &str) -> &str {
    match test_path.find('[') {
        Some(idx) => &test_path[..idx],
        None => test_path,
    }
}

/// Collapse a group of parametrized results sharing one base test name.
///
/// Any FAILED/ERROR/UNKNOWN dominates. Otherwise all PASSED/SKIPPED with at
/// least one PASSED yields PASSED; all SKIPPED yields SKIPPED.
pub fn aggregate_parametrized_results(statuses: &[TestStatus]) -> TestStatus {
    if statuses.is_empty() {
        return TestStatus::Unknown;
    }

    if statuses
        .iter()
        .any(|s| matches!(s, TestStatus::Failed | TestStatus::Error | TestStatus::Unknown))
    {
        return TestStatus::Failed;
    }

    if statuses
        .iter()
        .all(|s| matches!(s, TestStatus::Passed | TestStatus::Skipped))
    {
        return if statuses.iter().any(|s| *s == TestStatus::Passed) {
            TestStatus::Passed
        } else {
            TestStatus::Skipped
        };
    }

    TestStatus::Unknown
}

/// Parsed pytest output: every per-node-id status it was able to read.
#[derive(Debug, Clone, Default)]
pub struct TestResultParser {
    results: HashMap<String, TestStatus>,
}

impl TestResultParser {
    pub fn new(output: &str) -> Self {
        let clean = strip_ansi_codes(output);
        let mut results = HashMap::new();

        match clean.find(SUMMARY_ANCHOR) {
            Some(start) => {
                for line in clean[start..].lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Some((status, path)) = parse_test_line(line) {
                        results.insert(path, status);
                    }
                }
            }
            None => {
                for line in clean.lines() {
                    let line = line.trim();
                    if contains_status_word(line) {
                        if let Some((status, path)) = parse_test_line(line) {
                            results.insert(path, status);
                        }
                    }
                }
            }
        }

        Self { results }
    }

    /// Status for one test node id, aggregating parametrized variants when
    /// the exact node id was not itself reported.
    pub fn get_test_status(&self, test_pattern: &str) -> Option<TestStatus> {
        if let Some(status) = self.results.get(test_pattern) {
            return Some(*status);
        }

        let base = base_test_name(test_pattern);
        let group: Vec<TestStatus> = self
            .results
            .iter()
            .filter(|(path, _)| base_test_name(path) == base)
            .map(|(_, status)| *status)
            .collect();

        if group.is_empty() {
            None
        } else {
            Some(aggregate_parametrized_results(&group))
        }
    }

    /// Look up many test patterns at once; unknowns map to `TestStatus::Unknown`.
    pub fn query_tests(&self, patterns: &[String]) -> HashMap<String, TestStatus> {
        patterns
            .iter()
            .map(|pattern| {
                let status = self.get_test_status(pattern).unwrap_or(TestStatus::Unknown);
                (pattern.clone(), status)
            })
            .collect()
    }

    /// Base test names whose aggregated status is one of `expected_statuses`.
    /// Defaults to `[PASSED]` when the list is empty.
    pub fn filter_tests_by_status(&self, expected_statuses: &[TestStatus]) -> HashSet<String> {
        let expected: &[TestStatus] = if expected_statuses.is_empty() {
            &[TestStatus::Passed]
        } else {
            expected_statuses
        };

        let mut groups: HashMap<&str, Vec<TestStatus>> = HashMap::new();
        for (path, status) in &self.results {
            groups.entry(base_test_name(path)).or_default().push(*status);
        }

        groups
            .into_iter()
            .filter_map(|(base, statuses)| {
                let aggregated = aggregate_parametrized_results(&statuses);
                if expected.contains(&aggregated) {
                    Some(base.to_string())
                } else {
                    None
                }
            })
            .collect()
    }
}
