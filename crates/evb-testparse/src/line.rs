//! Parse a single pytest result line, e.g.:
//!   `PASSED tests/test_a.py::test_one`
//!   `FAILED tests/test_a.py::test_one[param] - AssertionError: ...`

use evb_core::TestStatus;

const STATUS_WORDS: [&str; 4] = ["PASSED", "FAILED", "SKIPPED", "ERROR"];

/// Returns the test status and node id, or `None` if the line does not start
/// with one of the four known status words.
pub fn parse_test_line(line: &str) -> Option<(TestStatus, String)> {
    let trimmed = line.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let status_word = parts.next()?;
    if !STATUS_WORDS.contains(&status_word) {
        return None;
    }

    let rest = parts.next()?.trim_start();
    if rest.is_empty() {
        return None;
    }

    let test_path = match rest.find(" - ") {
        Some(idx) => rest[..idx].trim_end().to_string(),
        None => rest.to_string(),
    };

    let status: TestStatus = status_word.parse().unwrap_or(TestStatus::Unknown);
    Some((status, test_path))
}

/// Whether a line contains any of the four status words, used to scan
/// full test output when no "short test summary info" anchor is present.
pub fn contains_status_word(line: &str) -> bool {
    STATUS_WORDS.iter().any(|word| line.contains(word))
}
