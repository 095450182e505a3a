//! Validation for harness configuration and dataset entities.

use serde::{Deserialize, Serialize};

use crate::config::HarnessConfig;
use crate::types::Spec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub code: &'static str,
    pub message: String,
}

pub trait Validate {
    fn validate(&self) -> Vec<ValidationIssue>;
}

impl Validate for HarnessConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.agents.is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "agents.empty",
                message: "at least one agent must be configured".to_string(),
            });
        }

        if self.concurrency.max_eval_workers == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "concurrency.max_eval_workers.zero",
                message: "max_eval_workers must be greater than zero".to_string(),
            });
        }

        if self.concurrency.max_specs_per_repo == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "concurrency.max_specs_per_repo.zero",
                message: "max_specs_per_repo must be greater than zero".to_string(),
            });
        }

        if self.container.default_image.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "container.default_image.empty",
                message: "default_image is empty; image builds will need a per-repo override"
                    .to_string(),
            });
        }

        issues
    }
}

impl Validate for Spec {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.instance_id.0.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "spec.instance_id.empty",
                message: "instance_id must not be empty".to_string(),
            });
        }

        if self.base_commit.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "spec.base_commit.empty",
                message: "base_commit must not be empty".to_string(),
            });
        }

        if !self.has_disjoint_test_sets() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "spec.f2p_p2p.overlap",
                message: "FAIL_TO_PASS and PASS_TO_PASS must be disjoint".to_string(),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::{Validate, ValidationLevel};
    use crate::config::{AgentConfig, AgentVariant, HarnessConfig};
    use crate::types::{DiffPayload, InstanceId, RepoId, Spec, TestIdList};
    use chrono::Utc;

    fn valid_harness_config() -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.agents.push(AgentConfig {
            name: "claude-main".to_string(),
            variant: AgentVariant::ClaudeCode,
            model_override: None,
            extra_args: Vec::new(),
        });
        config
    }

    fn valid_spec() -> Spec {
        Spec {
            instance_id: InstanceId("demo-1".to_string()),
            repo: RepoId("owner/name".to_string()),
            base_commit: "deadbeef".to_string(),
            problem_statement: "do the thing".to_string(),
            patch: DiffPayload::Unified(String::new()),
            test_patch: DiffPayload::Unified(String::new()),
            fail_to_pass: TestIdList::parse("tests/x.py::a"),
            pass_to_pass: TestIdList::parse("tests/x.py::b"),
            created_at: Utc::now(),
            number: 1,
        }
    }

    #[test]
    fn harness_config_validation_reports_empty_agent_roster() {
        let mut config = valid_harness_config();
        config.agents.clear();

        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|issue| issue.level == ValidationLevel::Error && issue.code == "agents.empty"));
    }

    #[test]
    fn harness_config_validation_reports_zero_worker_count() {
        let mut config = valid_harness_config();
        config.concurrency.max_eval_workers = 0;

        let issues = config.validate();
        assert!(issues.iter().any(|issue| {
            issue.level == ValidationLevel::Error
                && issue.code == "concurrency.max_eval_workers.zero"
        }));
    }

    #[test]
    fn spec_validation_reports_overlapping_test_sets() {
        let mut spec = valid_spec();
        spec.pass_to_pass = spec.fail_to_pass.clone();

        let issues = spec.validate();
        assert!(issues
            .iter()
            .any(|issue| issue.code == "spec.f2p_p2p.overlap"));
    }

    #[test]
    fn spec_validation_passes_for_well_formed_spec() {
        assert!(valid_spec().validate().is_empty());
    }
}
