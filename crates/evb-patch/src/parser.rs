//! Unified diff parsing into per-file `PatchInfo` records.

use evb_core::{PatchFileStatus, PatchInfo};

use crate::classify::is_test_file;
use crate::error::PatchEngineError;

/// Split a multi-file unified diff into per-file blocks on `diff --git`
/// boundaries, preserving the first block's header.
fn split_file_blocks(diff: &str) -> Result<Vec<&str>, PatchEngineError> {
    if !diff.contains("diff --git") {
        return Err(PatchEngineError::MalformedDiff {
            reason: "missing 'diff --git' header".to_string(),
        });
    }

    let mut blocks = Vec::new();
    let mut rest = diff;

    // The first block starts at the first occurrence of "diff --git".
    let first_start = rest.find("diff --git").expect("checked above");
    rest = &rest[first_start..];

    loop {
        match rest.find("\ndiff --git") {
            Some(idx) => {
                blocks.push(&rest[..idx]);
                rest = &rest[idx + 1..];
            }
            None => {
                blocks.push(rest);
                break;
            }
        }
    }

    Ok(blocks)
}

fn extract_paths(header_line: &str) -> Option<(String, String)> {
    let rest = header_line.strip_prefix("diff --git ")?;
    // Format: "a/<old> b/<new>" — split at the first " b/" boundary to
    // tolerate paths containing spaces, matching git's own heuristic.
    let marker = " b/";
    let idx = rest.find(marker)?;
    let old_part = &rest[..idx];
    let new_part = &rest[idx + marker.len()..];
    let old_path = old_part.strip_prefix("a/").unwrap_or(old_part).to_string();
    let new_path = new_part.trim_end().to_string();
    Some((old_path, new_path))
}

/// Parse a unified diff covering many files into a list of `PatchInfo`.
pub fn parse(diff: &str) -> Result<Vec<PatchInfo>, PatchEngineError> {
    let blocks = split_file_blocks(diff)?;
    let mut records = Vec::with_capacity(blocks.len());

    for block in blocks {
        let mut lines = block.lines();
        let header_line = lines.next().ok_or_else(|| PatchEngineError::MalformedDiff {
            reason: "empty file block".to_string(),
        })?;

        let (old_path, new_path) =
            extract_paths(header_line).ok_or_else(|| PatchEngineError::MalformedDiff {
                reason: format!("unable to parse 'diff --git' header: {header_line}"),
            })?;

        let mut status = PatchFileStatus::Modified;
        let mut old_filename = None;
        let mut rename_from = None;

        for line in block.lines().take(10) {
            if line.starts_with("new file") {
                status = PatchFileStatus::Added;
            } else if line.starts_with("deleted file") {
                status = PatchFileStatus::Removed;
            } else if let Some(from) = line.strip_prefix("rename from ") {
                status = PatchFileStatus::Renamed;
                rename_from = Some(from.trim().to_string());
            }
        }

        if status == PatchFileStatus::Renamed {
            old_filename = rename_from.or_else(|| {
                if old_path != new_path {
                    Some(old_path.clone())
                } else {
                    None
                }
            });
        }

        let mut hunk_lines = Vec::new();
        let mut in_hunk = false;
        for line in block.lines() {
            if line.starts_with("@@") {
                in_hunk = true;
            }
            if in_hunk {
                hunk_lines.push(line);
            }
        }

        let filename = if status == PatchFileStatus::Removed {
            old_path.clone()
        } else {
            new_path.clone()
        };

        records.push(PatchInfo {
            is_test_file: is_test_file(&filename),
            filename,
            status,
            patch_content: hunk_lines.join("\n"),
            old_filename,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILE_DIFF: &str = "diff --git a/pkg/a.py b/pkg/a.py\nindex 1111111..2222222 100644\n--- a/pkg/a.py\n+++ b/pkg/a.py\n@@ -1,2 +1,2 @@\n-old\n+new\n context\ndiff --git a/pkg/tests/test_b.py b/pkg/tests/test_b.py\nindex 3333333..4444444 100644\n--- a/pkg/tests/test_b.py\n+++ b/pkg/tests/test_b.py\n@@ -1,1 +1,1 @@\n-old test\n+new test\n";

    #[test]
    fn parse_splits_on_diff_git_boundaries() {
        let records = parse(TWO_FILE_DIFF).expect("parse");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "pkg/a.py");
        assert!(!records[0].is_test_file);
        assert_eq!(records[1].filename, "pkg/tests/test_b.py");
        assert!(records[1].is_test_file);
    }

    #[test]
    fn parse_rejects_diff_without_header() {
        let err = parse("not a diff at all").expect_err("must fail");
        assert!(matches!(err, PatchEngineError::MalformedDiff { .. }));
    }

    #[test]
    fn parse_detects_new_file_status() {
        let diff = "diff --git a/new.py b/new.py\nnew file mode 100644\nindex 0000000..1111111\n--- /dev/null\n+++ b/new.py\n@@ -0,0 +1,1 @@\n+hello\n";
        let records = parse(diff).expect("parse");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, PatchFileStatus::Added);
        assert_eq!(records[0].filename, "new.py");
    }

    #[test]
    fn parse_detects_deleted_file_status() {
        let diff = "diff --git a/gone.py b/gone.py\ndeleted file mode 100644\nindex 1111111..0000000\n--- a/gone.py\n+++ /dev/null\n@@ -1,1 +0,0 @@\n-hello\n";
        let records = parse(diff).expect("parse");
        assert_eq!(records[0].status, PatchFileStatus::Removed);
        assert_eq!(records[0].filename, "gone.py");
    }

    #[test]
    fn parse_detects_rename_and_preserves_old_filename() {
        let diff = "diff --git a/old_name.py b/new_name.py\nsimilarity index 100%\nrename from old_name.py\nrename to new_name.py\n";
        let records = parse(diff).expect("parse");
        assert_eq!(records[0].status, PatchFileStatus::Renamed);
        assert_eq!(records[0].filename, "new_name.py");
        assert_eq!(records[0].old_filename.as_deref(), Some("old_name.py"));
    }

    #[test]
    fn parse_captures_no_newline_sentinel_within_hunk() {
        let diff = "diff --git a/a.py b/a.py\nindex 1111111..2222222 100644\n--- a/a.py\n+++ b/a.py\n@@ -1,1 +1,1 @@\n-old\n+new\n\\ No newline at end of file\n";
        let records = parse(diff).expect("parse");
        assert!(records[0].patch_content.contains("\\ No newline at end of file"));
    }

    #[test]
    fn parse_yields_one_record_per_diff_git_boundary() {
        let boundary_count = TWO_FILE_DIFF.matches("diff --git").count();
        let records = parse(TWO_FILE_DIFF).expect("parse");
        assert_eq!(records.len(), boundary_count);
    }
}
