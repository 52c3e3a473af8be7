use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use super::{Judge, JudgeContext};
use crate::model::{JudgeResult, ToolCallRecord};
use crate::schema::EvalCase;
use crate::session_log::scan_claude_code_session_logs;

const DELEGATION_INTENT_KEYWORDS: &[&str] = &[
    "delegate",
    "task tool",
    "subagent",
    "agent",
    "specialized",
    "use the",
    "invoke",
    "call the",
];

/// Delegation-intent heuristic over invoked `Task` tool calls and output
/// text (spec §4.2). `routing_keywords` models spec §9 Open Question 2:
/// a user-configurable work-type keyword map per expected agent, defaulting
/// to empty so rule 5 never fires unless configured.
pub struct AgentRoutingJudge {
    routing_keywords: HashMap<String, Vec<String>>,
}

impl AgentRoutingJudge {
    pub const ID: &'static str = "agent-routing";

    pub fn new(routing_keywords: HashMap<String, Vec<String>>) -> Self {
        Self { routing_keywords }
    }

    fn invoked_agents(calls: &[ToolCallRecord], extra: &[ToolCallRecord]) -> HashSet<String> {
        calls
            .iter()
            .chain(extra.iter())
            .filter(|c| c.tool_name == "Task")
            .filter_map(|c| {
                c.input
                    .get("agent")
                    .or_else(|| c.input.get("subagent_type"))
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
            })
            .collect()
    }
}

#[async_trait]
impl Judge for AgentRoutingJudge {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn evaluate(&self, ctx: &JudgeContext<'_>) -> JudgeResult {
        let EvalCase::Routing(case) = ctx.eval_case else {
            return JudgeResult::not_applicable(Self::ID);
        };

        let session_calls = scan_claude_code_session_logs(&ctx.working_directory);
        let invoked = Self::invoked_agents(&ctx.execution_result.tool_calls, &session_calls);
        let forbidden: HashSet<&str> = case
            .should_not_route
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(String::as_str)
            .collect();

        let expected_invoked = invoked.contains(&case.expected_agent);
        let forbidden_invoked = invoked.iter().any(|a| forbidden.contains(a.as_str()));
        let task_tool_invoked = !invoked.is_empty();

        let output_lower = ctx.execution_result.output.to_lowercase();
        let expected_mentioned = output_lower.contains(&case.expected_agent.to_lowercase());
        let forbidden_mentioned =
            forbidden.iter().any(|f| output_lower.contains(&f.to_lowercase()));
        let delegation_intent =
            DELEGATION_INTENT_KEYWORDS.iter().any(|kw| output_lower.contains(kw));

        // Rule 1: expected invoked, no forbidden invoked.
        if expected_invoked && !forbidden_invoked {
            return JudgeResult {
                judge_id: Self::ID.to_string(),
                passed: true,
                score: 100.0,
                confidence: 1.0,
                reasoning: format!("Expected agent '{}' invoked, no forbidden agent", case.expected_agent),
                details: None,
            };
        }

        // Rule 2: expected invoked but a forbidden agent also invoked.
        if expected_invoked && forbidden_invoked {
            return JudgeResult {
                judge_id: Self::ID.to_string(),
                passed: false,
                score: 50.0,
                confidence: 1.0,
                reasoning: "Expected agent invoked alongside a forbidden agent".to_string(),
                details: None,
            };
        }

        // Rule 3: no Task tool invoked, but output mentions expected agent
        // with delegation intent and no forbidden mention.
        if !task_tool_invoked && expected_mentioned && delegation_intent && !forbidden_mentioned {
            return JudgeResult {
                judge_id: Self::ID.to_string(),
                passed: true,
                score: 80.0,
                confidence: 0.8,
                reasoning: "Output signals delegation intent toward the expected agent".to_string(),
                details: None,
            };
        }

        // Rule 4: delegation intent to both expected and forbidden.
        if delegation_intent && expected_mentioned && forbidden_mentioned {
            return JudgeResult {
                judge_id: Self::ID.to_string(),
                passed: false,
                score: 40.0,
                confidence: 0.7,
                reasoning: "Output signals delegation intent toward both expected and forbidden agents"
                    .to_string(),
                details: None,
            };
        }

        // Rule 5: no delegation but >=2 work-type keywords for the expected agent.
        if !delegation_intent {
            let keyword_hits = self
                .routing_keywords
                .get(&case.expected_agent)
                .map(|kws| kws.iter().filter(|kw| output_lower.contains(kw.as_str())).count())
                .unwrap_or(0);
            if keyword_hits >= 2 {
                return JudgeResult {
                    judge_id: Self::ID.to_string(),
                    passed: true,
                    score: 70.0,
                    confidence: 0.6,
                    reasoning: format!(
                        "{keyword_hits} work-type keyword(s) for '{}' found in output",
                        case.expected_agent
                    ),
                    details: None,
                };
            }
        }

        // Rule 6: no invocation and no intent.
        JudgeResult {
            judge_id: Self::ID.to_string(),
            passed: false,
            score: 0.0,
            confidence: 1.0,
            reasoning: "No routing to the expected agent detected".to_string(),
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionResult, Usage};
    use crate::schema::{CaseCommon, RoutingCase};

    fn case(expected: &str, forbidden: Vec<String>) -> EvalCase {
        EvalCase::Routing(RoutingCase {
            common: CaseCommon {
                id: "r1".into(),
                name: "n".into(),
                description: None,
                tags: None,
                enabled: true,
                timeout: None,
                agent_type: None,
                trials: None,
                reference_solution: None,
            },
            prompt: "route me".into(),
            expected_agent: expected.into(),
            should_not_route: Some(forbidden),
            judges: vec!["agent-routing".into()],
        })
    }

    fn exec(output: &str, calls: Vec<ToolCallRecord>) -> ExecutionResult {
        ExecutionResult {
            success: true,
            output: output.into(),
            tool_calls: calls,
            duration: 0,
            working_directory: String::new(),
            workspace_id: "ws-1".into(),
            error: None,
            session_id: None,
            num_turns: None,
            usage: Usage::default(),
            transcript: None,
        }
    }

    #[tokio::test]
    async fn rule1_expected_invoked_no_forbidden() {
        let case = case("billing-agent", vec!["support-agent".into()]);
        let calls = vec![ToolCallRecord {
            tool_name: "Task".into(),
            tool_use_id: None,
            input: serde_json::json!({"agent": "billing-agent"}),
            output: None,
            timestamp: chrono::Utc::now(),
            duration: None,
            is_error: false,
        }];
        let exec = exec("", calls);
        let judge = AgentRoutingJudge::new(HashMap::new());
        let ctx = JudgeContext {
            eval_case: &case,
            execution_result: &exec,
            working_directory: std::env::temp_dir(),
            turn_index: None,
        };
        let result = judge.evaluate(&ctx).await;
        assert!(result.passed);
        assert_eq!(result.score, 100.0);
    }

    #[tokio::test]
    async fn rule6_no_invocation_no_intent_fails() {
        let case = case("billing-agent", vec![]);
        let exec = exec("I processed your request directly.", vec![]);
        let judge = AgentRoutingJudge::new(HashMap::new());
        let ctx = JudgeContext {
            eval_case: &case,
            execution_result: &exec,
            working_directory: std::env::temp_dir(),
            turn_index: None,
        };
        let result = judge.evaluate(&ctx).await;
        assert!(!result.passed);
        assert_eq!(result.score, 0.0);
    }

    #[tokio::test]
    async fn rule3_output_mentions_expected_with_delegation_intent() {
        let case = case("billing-agent", vec![]);
        let exec = exec("I'll delegate this to the billing-agent subagent.", vec![]);
        let judge = AgentRoutingJudge::new(HashMap::new());
        let ctx = JudgeContext {
            eval_case: &case,
            execution_result: &exec,
            working_directory: std::env::temp_dir(),
            turn_index: None,
        };
        let result = judge.evaluate(&ctx).await;
        assert!(result.passed);
        assert_eq!(result.score, 80.0);
    }

    #[tokio::test]
    async fn rule5_requires_two_keyword_hits() {
        let case = case("billing-agent", vec![]);
        let mut keywords = HashMap::new();
        keywords.insert("billing-agent".to_string(), vec!["invoice".to_string(), "refund".to_string()]);
        let exec = exec("I will process the invoice and issue a refund.", vec![]);
        let judge = AgentRoutingJudge::new(keywords);
        let ctx = JudgeContext {
            eval_case: &case,
            execution_result: &exec,
            working_directory: std::env::temp_dir(),
            turn_index: None,
        };
        let result = judge.evaluate(&ctx).await;
        assert!(result.passed);
        assert_eq!(result.score, 70.0);
    }
}
