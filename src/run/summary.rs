use crate::aggregate::AggregateCounts;
use crate::remote::model::RemoteResult;
use serde::Serialize;

/// Figures appended to the run comment when the run is completed.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub domain_tag: Option<String>,
    pub mode: String,
    pub env: String,
    pub branch: String,
    pub timestamp: String,
    pub planned: usize,
    pub counts: AggregateCounts,
}

impl RunSummary {
    /// Executed share of the planned cases, in percent.
    pub fn coverage(&self) -> f64 {
        if self.planned == 0 {
            return 0.0;
        }
        self.counts.executed as f64 / self.planned as f64 * 100.0
    }

    pub fn render(&self) -> String {
        let mut text = String::from("\n\n Test Run Summary:\n");
        if let Some(tag) = &self.domain_tag {
            text.push_str(&format!("- DomainTag: {}\n", tag));
        }
        text.push_str(&format!("- Mode: {}\n", self.mode));
        text.push_str(&format!("- Env: {}\n", self.env.to_uppercase()));
        text.push_str(&format!("- Branch: {}\n", self.branch));
        text.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        text.push_str(&format!("- Planned: {}\n", self.planned));
        text.push_str(&format!("- Executed: {}\n", self.counts.executed));
        text.push_str(&format!("- TestCoverage: {:.2}%\n", self.coverage()));
        text.push_str(&format!("- Passed: {}\n", self.counts.passed));
        text.push_str(&format!("- Failed: {}\n", self.counts.failed));
        text.push_str(&format!("- Skipped: {}\n", self.counts.skipped));
        text
    }
}

/// Outcome breakdown of a run as stored remotely.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RunAnalytics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub not_executed: usize,
    pub other: usize,
    pub pass_percentage: f64,
}

impl RunAnalytics {
    pub fn from_results(results: &[RemoteResult]) -> Self {
        let count = |outcome: &str| {
            results
                .iter()
                .filter(|result| result.outcome.as_deref() == Some(outcome))
                .count()
        };
        let total = results.len();
        let passed = count("Passed");
        let failed = count("Failed");
        let not_executed = count("NotExecuted");
        let pass_percentage = if total == 0 {
            0.0
        } else {
            (passed as f64 / total as f64 * 10000.0).round() / 100.0
        };
        RunAnalytics {
            total,
            passed,
            failed,
            not_executed,
            other: total - passed - failed - not_executed,
            pass_percentage,
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Total: {}\nPassed: {}\nFailed: {}\nNotExecuted: {}\nOther: {}\nPass %: {:.2}\n",
            self.total, self.passed, self.failed, self.not_executed, self.other, self.pass_percentage
        )
    }
}

pub fn summarize_results(results: &[RemoteResult]) -> RunAnalytics {
    RunAnalytics::from_results(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(planned: usize, counts: AggregateCounts) -> RunSummary {
        RunSummary {
            domain_tag: Some("claims".to_string()),
            mode: "Pipeline".to_string(),
            env: "qa".to_string(),
            branch: "main".to_string(),
            timestamp: "2026-10-17 09:30AM".to_string(),
            planned,
            counts,
        }
    }

    #[test]
    fn coverage_is_executed_over_planned() {
        let s = summary(
            8,
            AggregateCounts {
                executed: 3,
                passed: 2,
                failed: 1,
                skipped: 5,
            },
        );
        assert!((s.coverage() - 37.5).abs() < f64::EPSILON);
        let text = s.render();
        assert!(text.contains("- TestCoverage: 37.50%\n"));
        assert!(text.contains("- Env: QA\n"));
        assert!(text.contains("- DomainTag: claims\n"));
        assert!(text.contains("- Skipped: 5\n"));
    }

    #[test]
    fn empty_plan_has_zero_coverage() {
        assert_eq!(summary(0, AggregateCounts::default()).coverage(), 0.0);
    }

    fn result(id: u64, outcome: &str) -> RemoteResult {
        RemoteResult {
            id,
            test_case: None,
            outcome: Some(outcome.to_string()),
            comment: None,
            automated_test_name: None,
            test_case_title: None,
        }
    }

    #[test]
    fn analytics_counts_by_outcome() {
        let results = vec![
            result(1, "Passed"),
            result(2, "Passed"),
            result(3, "Failed"),
            result(4, "NotExecuted"),
            result(5, "Blocked"),
            result(6, "Passed"),
        ];
        let analytics = RunAnalytics::from_results(&results);
        assert_eq!(analytics.total, 6);
        assert_eq!(analytics.passed, 3);
        assert_eq!(analytics.failed, 1);
        assert_eq!(analytics.not_executed, 1);
        assert_eq!(analytics.other, 1);
        assert_eq!(analytics.pass_percentage, 50.0);
        assert!(analytics.render().contains("Pass %: 50.00\n"));
    }

    #[test]
    fn analytics_rounds_to_two_decimals() {
        let results = vec![result(1, "Passed"), result(2, "Failed"), result(3, "Failed")];
        assert_eq!(RunAnalytics::from_results(&results).pass_percentage, 33.33);
        assert_eq!(summarize_results(&[]).pass_percentage, 0.0);
    }
}
