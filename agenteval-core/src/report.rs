//! Reporter / Aggregator (spec §4.6): pure functions over `EvalSuiteResult`,
//! no side effects, no I/O — grounded on `EvaluationSummary::from_results`'s
//! category/score aggregation shape, generalized to the six operations
//! spec.md names.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{EvalCaseResult, EvalSuiteResult, ErrorType};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    #[serde(rename = "passRate")]
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorSummary {
    #[serde(rename = "errorType")]
    pub error_type: ErrorType,
    pub count: usize,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunComparison {
    #[serde(rename = "passRateDelta")]
    pub pass_rate_delta: f64,
    #[serde(rename = "newlyPassing")]
    pub newly_passing: Vec<String>,
    #[serde(rename = "newlyFailing")]
    pub newly_failing: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedCase {
    #[serde(rename = "caseId")]
    pub case_id: String,
    pub runs: usize,
    pub passes: usize,
    pub failures: usize,
    #[serde(rename = "passRate")]
    pub pass_rate: f64,
    #[serde(rename = "avgDuration")]
    pub avg_duration: f64,
    pub flaky: bool,
    #[serde(rename = "flakinessScore")]
    pub flakiness_score: f64,
}

/// `summarizeByCategory(results)` (spec §4.6).
pub fn summarize_by_category(results: &[EvalCaseResult]) -> Vec<CategorySummary> {
    let mut by_category: HashMap<&str, (usize, usize, usize, usize)> = HashMap::new();
    // order of first appearance, for deterministic output
    let mut order: Vec<&str> = Vec::new();

    for r in results {
        let category = r.eval_case.category();
        let entry = by_category.entry(category).or_insert_with(|| {
            order.push(category);
            (0, 0, 0, 0)
        });
        entry.0 += 1;
        if r.success {
            entry.1 += 1;
        } else if r.is_error {
            entry.3 += 1;
        } else {
            entry.2 += 1;
        }
    }

    order
        .into_iter()
        .map(|category| {
            let (total, passed, failed, errors) = by_category[category];
            let pass_rate = if total == 0 { 0.0 } else { passed as f64 / total as f64 };
            CategorySummary {
                category: category.to_string(),
                total,
                passed,
                failed,
                errors,
                pass_rate,
            }
        })
        .collect()
}

/// `summarizeErrors(results)` (spec §4.6): up to three
/// `"{name}: {message[:100]}"` examples per error type.
pub fn summarize_errors(results: &[EvalCaseResult]) -> Vec<ErrorSummary> {
    let mut by_type: HashMap<ErrorType, (usize, Vec<String>)> = HashMap::new();
    let mut order: Vec<ErrorType> = Vec::new();

    for r in results {
        let Some(error_type) = r.error_type else { continue };
        let entry = by_type.entry(error_type).or_insert_with(|| {
            order.push(error_type);
            (0, Vec::new())
        });
        entry.0 += 1;
        if entry.1.len() < 3 {
            let message = r.error.as_deref().unwrap_or("");
            let truncated: String = message.chars().take(100).collect();
            entry.1.push(format!("{}: {}", r.eval_case.common().name, truncated));
        }
    }

    order
        .into_iter()
        .map(|error_type| {
            let (count, examples) = by_type.remove(&error_type).expect("key present from order");
            ErrorSummary { error_type, count, examples }
        })
        .collect()
}

/// `compareRuns(current, previous)` (spec §4.6), keyed by case id.
pub fn compare_runs(current: &EvalSuiteResult, previous: &EvalSuiteResult) -> RunComparison {
    let previous_by_id: HashMap<&str, bool> =
        previous.results.iter().map(|r| (r.eval_case.id(), r.success)).collect();

    let mut newly_passing = Vec::new();
    let mut newly_failing = Vec::new();

    for r in &current.results {
        let Some(&was_passing) = previous_by_id.get(r.eval_case.id()) else { continue };
        if !was_passing && r.success {
            newly_passing.push(r.eval_case.id().to_string());
        } else if was_passing && !r.success {
            newly_failing.push(r.eval_case.id().to_string());
        }
    }

    RunComparison {
        pass_rate_delta: current.pass_rate - previous.pass_rate,
        newly_passing,
        newly_failing,
    }
}

/// `aggregateResults(runs)` (spec §4.6): per-case aggregation over repeated
/// runs of the same suite. `flaky := 0 < passes < runs`,
/// `flakinessScore := min(passes, failures) / runs`.
pub fn aggregate_results(runs: &[EvalSuiteResult]) -> Vec<AggregatedCase> {
    let mut by_case: HashMap<&str, (usize, usize, usize, u64)> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for run in runs {
        for r in &run.results {
            let id = r.eval_case.id();
            let entry = by_case.entry(id).or_insert_with(|| {
                order.push(id);
                (0, 0, 0, 0)
            });
            entry.0 += 1;
            if r.success {
                entry.1 += 1;
            } else {
                entry.2 += 1;
            }
            entry.3 += r.duration;
        }
    }

    order
        .into_iter()
        .map(|id| {
            let (total_runs, passes, failures, total_duration) = by_case[id];
            let pass_rate = if total_runs == 0 { 0.0 } else { passes as f64 / total_runs as f64 };
            let avg_duration = if total_runs == 0 { 0.0 } else { total_duration as f64 / total_runs as f64 };
            let flaky = passes > 0 && passes < total_runs;
            let flakiness_score = if total_runs == 0 {
                0.0
            } else {
                passes.min(failures) as f64 / total_runs as f64
            };
            AggregatedCase {
                case_id: id.to_string(),
                runs: total_runs,
                passes,
                failures,
                pass_rate,
                avg_duration,
                flaky,
                flakiness_score,
            }
        })
        .collect()
}

/// `detectRegressions(current, baseline)` (spec §4.6): cases `success:true`
/// in `baseline` and `success:false` in `current`.
pub fn detect_regressions(current: &EvalSuiteResult, baseline: &EvalSuiteResult) -> Vec<String> {
    let baseline_passing: HashSet<&str> = baseline
        .results
        .iter()
        .filter(|r| r.success)
        .map(|r| r.eval_case.id())
        .collect();

    current
        .results
        .iter()
        .filter(|r| !r.success && baseline_passing.contains(r.eval_case.id()))
        .map(|r| r.eval_case.id().to_string())
        .collect()
}

/// `calculateNonDeterminismMetrics(runs)` (spec §4.6): average consistency
/// is the fraction of cases whose `success` is identical across every run.
pub fn calculate_non_determinism_metrics(runs: &[EvalSuiteResult]) -> f64 {
    if runs.len() < 2 {
        return 1.0;
    }

    let mut outcomes_by_case: HashMap<&str, Vec<bool>> = HashMap::new();
    for run in runs {
        for r in &run.results {
            outcomes_by_case.entry(r.eval_case.id()).or_default().push(r.success);
        }
    }

    if outcomes_by_case.is_empty() {
        return 1.0;
    }

    let consistent = outcomes_by_case
        .values()
        .filter(|outcomes| outcomes.iter().all(|o| *o == outcomes[0]))
        .count();

    consistent as f64 / outcomes_by_case.len() as f64
}
