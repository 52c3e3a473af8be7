use async_trait::async_trait;
use std::collections::HashMap;

use super::{Judge, JudgeContext};
use crate::model::JudgeResult;
use crate::schema::EvalCase;
use crate::session_log::scan_claude_code_session_logs;

/// Checks per-skill invocation counts. Sources: in-process tool calls
/// where `toolName=="Skill"`, plus a direct session-log scan for `Skill`
/// `tool_use` blocks (spec §4.2) — independent of the harness's own
/// `agentType`-gated augmentation, since this judge always looks under
/// the well-known claude-code log path regardless of configured agent
/// kind.
pub struct SkillInvocationJudge;

impl SkillInvocationJudge {
    pub const ID: &'static str = "skill-invocation";

    fn skill_name_from_input(input: &serde_json::Value) -> Option<String> {
        let raw = input
            .get("skill")
            .and_then(serde_json::Value::as_str)
            .or_else(|| input.get("command").and_then(serde_json::Value::as_str))?;
        Some(raw.trim_start_matches('/').to_string())
    }
}

#[async_trait]
impl Judge for SkillInvocationJudge {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn evaluate(&self, ctx: &JudgeContext<'_>) -> JudgeResult {
        let EvalCase::Tool(case) = ctx.eval_case else {
            return JudgeResult::not_applicable(Self::ID);
        };
        let Some(expected_skills) = &case.expected_skills else {
            return JudgeResult::not_applicable(Self::ID);
        };
        if expected_skills.is_empty() {
            return JudgeResult::not_applicable(Self::ID);
        }

        let mut counts: HashMap<String, u32> = HashMap::new();

        for call in &ctx.execution_result.tool_calls {
            if call.tool_name == "Skill" {
                if let Some(name) = Self::skill_name_from_input(&call.input) {
                    *counts.entry(name).or_insert(0) += 1;
                }
            }
        }
        for call in scan_claude_code_session_logs(&ctx.working_directory) {
            if call.tool_name == "Skill" {
                if let Some(name) = Self::skill_name_from_input(&call.input) {
                    *counts.entry(name).or_insert(0) += 1;
                }
            }
        }

        let total = expected_skills.len();
        let mut satisfied = 0usize;
        let mut notes = Vec::new();
        for expected in expected_skills {
            let count = counts.get(&expected.skill_name).copied().unwrap_or(0);
            if count >= expected.min_calls {
                satisfied += 1;
            } else {
                notes.push(format!(
                    "{}: expected >= {}, got {}",
                    expected.skill_name, expected.min_calls, count
                ));
            }
        }

        let score = 100.0 * satisfied as f64 / total as f64;
        let passed = score >= 80.0;
        let reasoning = if notes.is_empty() {
            "All expected skill invocations satisfied".to_string()
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
