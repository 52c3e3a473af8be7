use async_trait::async_trait;

use super::{Judge, JudgeContext};
use crate::model::JudgeResult;
use crate::schema::EvalCase;

/// Checks per-tool call counts against `[min,max]` bounds, and — when an
/// `expectedInput` is declared — that the count only considers calls whose
/// input satisfies it as a key-subset (spec §4.2). Pass iff every
/// configured tool's (optionally input-filtered) count falls within its
/// bounds.
pub struct ToolInvocationJudge;

impl ToolInvocationJudge {
    pub const ID: &'static str = "tool-invocation";

    /// Partial match: every key in `expected` must be present in `actual`
    /// with an equal value. Grounded on the teacher's
    /// `adk_eval::schema::ToolUse::matches`'s non-strict key-subset idiom.
    fn input_satisfies(expected: &serde_json::Value, actual: &serde_json::Value) -> bool {
        match (expected, actual) {
            (serde_json::Value::Object(expected), serde_json::Value::Object(actual)) => {
                expected.iter().all(|(k, v)| actual.get(k) == Some(v))
            }
            _ => expected == actual,
        }
    }
}

#[async_trait]
impl Judge for ToolInvocationJudge {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn evaluate(&self, ctx: &JudgeContext<'_>) -> JudgeResult {
        let EvalCase::Tool(case) = ctx.eval_case else {
            return JudgeResult::not_applicable(Self::ID);
        };
        if case.expected_tool_calls.is_empty() {
            return JudgeResult::not_applicable(Self::ID);
        }

        let total = case.expected_tool_calls.len();
        let mut satisfied = 0usize;
        let mut notes = Vec::new();

        for expected in &case.expected_tool_calls {
            let count = ctx
                .execution_result
                .tool_calls
                .iter()
                .filter(|call| call.tool_name == expected.tool_name)
                .filter(|call| {
                    expected
                        .expected_input
                        .as_ref()
                        .is_none_or(|input| Self::input_satisfies(input, &call.input))
                })
                .count() as u32;
            let (min, max) = (expected.min_calls(), expected.max_calls());
            if count >= min && count <= max {
                satisfied += 1;
            } else {
                notes.push(format!(
                    "{}: expected [{},{}]{}, got {}",
                    expected.tool_name,
                    min,
                    if max == u32::MAX { "∞".to_string() } else { max.to_string() },
                    if expected.expected_input.is_some() { " matching input" } else { "" },
                    count
                ));
            }
        }

        let score = 100.0 * satisfied as f64 / total as f64;
        let passed = satisfied == total;
        let reasoning = if notes.is_empty() {
            "All expected tool calls satisfied".to_string()
        } else {
            notes.join("; ")
        };

        JudgeResult {
            judge_id: Self::ID.to_string(),
            passed,
            score,
            confidence: 1.0,
            reasoning,
            details: None,
        }
    }
}
