//! Test Harness (spec §4.4): executes a single case or a multi-turn
//! sequence against the agent function under a hard timeout, normalizes
//! the result, and augments tool calls from session logs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::agent::{Agent, AgentContext};
use crate::model::{ExecutionResult, Usage};
use crate::session_log;
use crate::workspace::WorkspaceManager;

/// Returned when a non-final turn of a multi-turn sequence fails: the
/// workspace has already been cleaned up (spec §9's deliberate asymmetry
/// with the single-turn/happy-path cleanup, which the runner performs
/// after judging).
pub struct MultiTurnAbort {
    pub turn_results: Vec<ExecutionResult>,
    pub failed_turn_index: usize,
}

pub struct TestHarness {
    agent: Arc<dyn Agent>,
    workspace_manager: Arc<WorkspaceManager>,
    /// Optional directory copied into every fresh workspace (spec §4.3).
    template: Option<std::path::PathBuf>,
}

impl TestHarness {
    pub fn new(
        agent: Arc<dyn Agent>,
        workspace_manager: Arc<WorkspaceManager>,
        template: Option<std::path::PathBuf>,
    ) -> Self {
        Self { agent, workspace_manager, template }
    }

    /// `execute(case)`: single-turn invocation (spec §4.4 steps 1-6).
    pub async fn execute(
        &self,
        prompt: &str,
        eval_id: &str,
        eval_name: &str,
        timeout_ms: u64,
        agent_type: Option<&str>,
    ) -> ExecutionResult {
        let workspace = self
            .workspace_manager
            .create_workspace(self.template.as_deref())
            .expect("workspace creation should not fail under normal filesystem conditions");

        let context = AgentContext {
            working_directory: workspace.path.display().to_string(),
            eval_id: eval_id.to_string(),
            eval_name: eval_name.to_string(),
            session_id: None,
            timeout: timeout_ms,
        };

        self.run_one_turn(prompt, &context, &workspace.path, &workspace.id, timeout_ms, agent_type)
            .await
    }

    /// `executeMultiTurn(case)`: threads `sessionId` from each turn into
    /// the next; aborts on the first failing turn (spec §4.4).
    pub async fn execute_multi_turn(
        &self,
        turns: &[String],
        eval_id: &str,
        eval_name: &str,
        timeout_ms: u64,
        agent_type: Option<&str>,
    ) -> Result<Vec<ExecutionResult>, MultiTurnAbort> {
        let workspace = self
            .workspace_manager
            .create_workspace(self.template.as_deref())
            .expect("workspace creation should not fail under normal filesystem conditions");

        let mut results = Vec::with_capacity(turns.len());
        let mut session_id: Option<String> = None;

        for (index, prompt) in turns.iter().enumerate() {
            let context = AgentContext {
                working_directory: workspace.path.display().to_string(),
                eval_id: eval_id.to_string(),
                eval_name: eval_name.to_string(),
                session_id: session_id.clone(),
                timeout: timeout_ms,
            };

            let result = self
                .run_one_turn(prompt, &context, &workspace.path, &workspace.id, timeout_ms, agent_type)
                .await;

            session_id = result.session_id.clone();
            let failed = !result.success;
            results.push(result);

            if failed {
                self.workspace_manager.cleanup_workspace(&workspace.id);
                return Err(MultiTurnAbort { turn_results: results, failed_turn_index: index });
            }
        }

        Ok(results)
    }

    async fn run_one_turn(
        &self,
        prompt: &str,
        context: &AgentContext,
        workspace_path: &std::path::Path,
        workspace_id: &str,
        timeout_ms: u64,
        agent_type: Option<&str>,
    ) -> ExecutionResult {
        let start = Instant::now();
        let invocation = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.agent.invoke(prompt, context),
        )
        .await;

        let elapsed = start.elapsed().as_millis() as u64;

        let (success, output, tool_calls, error, session_id, num_turns, usage) = match invocation {
            Ok(invocation) => (
                invocation.success,
                invocation.output,
                invocation.tool_calls,
                invocation.error,
                invocation.session_id,
                invocation.num_turns,
                invocation.usage,
            ),
            Err(_) => (
                false,
                String::new(),
                Vec::new(),
                Some(format!("agent invocation timed out after {timeout_ms}ms")),
                None,
                None,
                Usage::default(),
            ),
        };

        // Session-log mining is forensic: run it even on timeout/failure,
        // best-effort, non-fatal (spec §9).
        let tool_calls = session_log::augment_tool_calls(tool_calls, workspace_path, agent_type);

        ExecutionResult {
            success,
            output,
            tool_calls,
            duration: elapsed,
            working_directory: workspace_path.display().to_string(),
            workspace_id: workspace_id.to_string(),
            error,
            session_id,
            num_turns,
            usage,
            transcript: None,
        }
    }
}
