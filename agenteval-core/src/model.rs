//! Execution/judging result types that flow between the harness, judges,
//! and runner (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::EvalCase;

/// One tool invocation observed during a case execution, whether captured
/// in-process or mined from a session log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    #[serde(rename = "toolName")]
    pub tool_name: String,
    #[serde(rename = "toolUseId", default)]
    pub tool_use_id: Option<String>,
    pub input: serde_json::Value,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// Stable canonical JSON form used for dedup identity: sorted keys, no
/// insignificant whitespace. This is the only place the engine relies on
/// JSON equality (spec §9); treat it as a semantic contract.
pub fn canonical_json(value: &serde_json::Value) -> String {
    serde_json::to_string(&canonicalize(value)).expect("canonicalized value always serializes")
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            serde_json::to_value(sorted).expect("sorted map always serializes")
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

impl ToolCallRecord {
    /// Dedup identity: `(toolName, canonical(input))` (spec §3).
    pub fn dedup_key(&self) -> (String, String) {
        (self.tool_name.clone(), canonical_json(&self.input))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Usage {
    #[serde(rename = "inputTokens", default)]
    pub input_tokens: u64,
    #[serde(rename = "outputTokens", default)]
    pub output_tokens: u64,
    #[serde(rename = "totalCostUsd", default)]
    pub total_cost_usd: Option<f64>,
}

/// Normalized output of a single agent invocation (one turn), as produced
/// by the test harness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    #[serde(rename = "toolCalls", default)]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Duration in milliseconds.
    pub duration: u64,
    #[serde(rename = "workingDirectory")]
    pub working_directory: String,
    #[serde(rename = "workspaceId")]
    pub workspace_id: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
    #[serde(rename = "numTurns", default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub transcript: Option<String>,
}

/// Error-kind classification used for retry backoff scaling (spec §4.5, §7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Api,
    Timeout,
    Judge,
    Unknown,
}

impl ErrorType {
    /// Classify a lowercased error message (and optionally output), per
    /// spec §4.5's priority order.
    pub fn classify(message: &str, output: Option<&str>) -> Self {
        let haystack = match output {
            Some(o) => format!("{} {}", message, o).to_lowercase(),
            None => message.to_lowercase(),
        };
        if haystack.contains("timeout") || haystack.contains("timed out") {
            return ErrorType::Timeout;
        }
        const API_MARKERS: &[&str] = &[
            "api", "rate limit", "429", "500", "502", "503", "529", "overloaded", "api error",
        ];
        if API_MARKERS.iter().any(|m| haystack.contains(m)) {
            return ErrorType::Api;
        }
        if haystack.contains("judge") {
            return ErrorType::Judge;
        }
        ErrorType::Unknown
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JudgeResult {
    #[serde(rename = "judgeId")]
    pub judge_id: String,
    pub passed: bool,
    /// 0..=100.
    pub score: f64,
    /// 0.0..=1.0.
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl JudgeResult {
    pub fn not_applicable(judge_id: impl Into<String>) -> Self {
        JudgeResult {
            judge_id: judge_id.into(),
            passed: true,
            score: 100.0,
            confidence: 1.0,
            reasoning: "Not applicable".to_string(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalCaseResult {
    #[serde(rename = "evalCase")]
    pub eval_case: EvalCase,
    pub success: bool,
    pub output: String,
    /// Duration in milliseconds, summed across trials when `trials > 1`.
    pub duration: u64,
    #[serde(rename = "judgeResults", default)]
    pub judge_results: Vec<JudgeResult>,
    #[serde(rename = "toolCalls", default)]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(rename = "errorType", default)]
    pub error_type: Option<ErrorType>,
    #[serde(rename = "retryCount", default)]
    pub retry_count: u32,
    #[serde(rename = "trialResults", default)]
    pub trial_results: Vec<bool>,
    #[serde(default)]
    pub flaky: bool,
    #[serde(rename = "retryErrors", default)]
    pub retry_errors: Vec<String>,
    /// True when the case never produced an execution result at all (a
    /// `beforeEach`/`afterEach` hook threw, or the case could not be
    /// dispatched) — spec §4.5's "Error state", distinct from an
    /// ordinary judged failure.
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalSuiteResult {
    #[serde(rename = "runId")]
    pub run_id: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    #[serde(rename = "passRate")]
    pub pass_rate: f64,
    pub results: Vec<EvalCaseResult>,
    pub duration: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl EvalSuiteResult {
    /// Fold per-case results into a suite result (spec §4.5 step 5).
    /// `skipped` is always zero (spec §9 Open Question 1: disabled cases
    /// are omitted from `results` before this point, not counted here).
    pub fn fold(
        run_id: String,
        results: Vec<EvalCaseResult>,
        duration: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        let total = results.len();
        let mut passed = 0usize;
        let mut failed = 0usize;
        let mut errors = 0usize;
        for r in &results {
            if r.success {
                passed += 1;
            } else if r.is_error {
                errors += 1;
            } else {
                failed += 1;
            }
        }
        let pass_rate = if total == 0 { 0.0 } else { passed as f64 / total as f64 };
        EvalSuiteResult {
            run_id,
            total,
            passed,
            failed,
            errors,
            skipped: 0,
            pass_rate,
            results,
            duration,
            timestamp,
        }
    }
}
