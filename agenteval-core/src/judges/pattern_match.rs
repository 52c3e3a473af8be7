use async_trait::async_trait;
use regex::RegexBuilder;

use super::{Judge, JudgeContext};
use crate::model::JudgeResult;
use crate::schema::EvalCase;

/// Checks each configured pattern against its file's content as a
/// multiline regex, presence-only (spec §4.2).
pub struct PatternMatchJudge;

impl PatternMatchJudge {
    pub const ID: &'static str = "pattern-match";
}

#[async_trait]
impl Judge for PatternMatchJudge {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn evaluate(&self, ctx: &JudgeContext<'_>) -> JudgeResult {
        let EvalCase::CodeGen(case) = ctx.eval_case else {
            return JudgeResult::not_applicable(Self::ID);
        };
        let Some(expected_patterns) = &case.expected_patterns else {
            return JudgeResult::not_applicable(Self::ID);
        };
        if expected_patterns.is_empty() {
            return JudgeResult::not_applicable(Self::ID);
        }

        let mut total = 0usize;
        let mut satisfied = 0usize;
        let mut failures = Vec::new();

        for entry in expected_patterns {
            let content = std::fs::read_to_string(ctx.working_directory.join(&entry.file)).ok();
            for pattern in &entry.patterns {
                total += 1;
                let matched = content.as_deref().is_some_and(|text| {
                    RegexBuilder::new(pattern)
                        .multi_line(true)
                        .build()
                        .map(|re| re.is_match(text))
                        .unwrap_or(false)
                });
                if matched {
                    satisfied += 1;
                } else {
                    failures.push(format!("{}: /{}/", entry.file, pattern));
                }
            }
        }

        let score = if total == 0 { 100.0 } else { 100.0 * satisfied as f64 / total as f64 };
        let passed = score >= 80.0;
        let reasoning = if failures.is_empty() {
            format!("All {total} pattern(s) matched")
        } else {
            format!("Unmatched pattern(s): {}", failures.join("; "))
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
