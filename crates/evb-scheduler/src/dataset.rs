//! Dataset loading: a JSON array of task records (spec.md §6). Only the
//! local-file `DatasetSource` variant is implemented; remote dataset
//! repositories stay behind the same loader signature for later extension.

use std::path::Path;

use evb_core::Spec;

use crate::error::SchedulerError;

pub fn load_dataset(path: &Path) -> Result<Vec<Spec>, SchedulerError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SchedulerError::DatasetRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SchedulerError::SpecProcessingError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_dataset_reports_read_error_for_missing_file() {
        let err = load_dataset(Path::new("/nonexistent/dataset.json")).expect_err("missing file");
        assert!(matches!(err, SchedulerError::DatasetRead { .. }));
    }

    #[test]
    fn load_dataset_reports_parse_error_for_malformed_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dataset.json");
        std::fs::write(&path, "not json").expect("write");

        let err = load_dataset(&path).expect_err("malformed json");
        assert!(matches!(err, SchedulerError::SpecProcessingError { .. }));
    }

    #[test]
    fn load_dataset_parses_well_formed_array() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dataset.json");
        std::fs::write(
            &path,
            r#"[{
                "instance_id": "demo-1",
                "repo": "astropy/astropy",
                "base_commit": "deadbeef",
                "problem_statement": "fix it",
                "patch": "",
                "test_patch": "",
                "FAIL_TO_PASS": "tests/x.py::a",
                "PASS_TO_PASS": "tests/x.py::b",
                "created_at": "2024-01-01T00:00:00Z",
                "number": 1
            }]"#,
        )
        .expect("write");

        let specs = load_dataset(&path).expect("load");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].instance_id.0, "demo-1");
    }
}
