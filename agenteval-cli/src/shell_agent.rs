//! The CLI's concrete realization of [`agenteval_core::Agent`] (spec §6
//! deliberately leaves the agent implementation external). `ShellAgent`
//! invokes an external program as a subprocess per case: the prompt is
//! written to its stdin, context is passed via environment variables,
//! and its stdout becomes the execution output. This mirrors the
//! teacher's own `adk-cli` stance of treating agent wiring as a thing
//! the operator supplies at the process boundary (`adk-cli`'s `Console`/
//! `Serve` commands print "need to provide agent implementation" rather
//! than hard-coding one); here the boundary is a subprocess contract
//! instead of an in-process trait object, so the CLI has something
//! runnable out of the box.

use std::path::PathBuf;
use std::process::Stdio;

use agenteval_core::{Agent, AgentContext, AgentInvocation};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct ShellAgent {
    program: PathBuf,
    args: Vec<String>,
}

impl ShellAgent {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl Agent for ShellAgent {
    async fn invoke(&self, prompt: &str, ctx: &AgentContext) -> AgentInvocation {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("AGENTEVAL_WORKING_DIR", &ctx.working_directory)
            .env("AGENTEVAL_EVAL_ID", &ctx.eval_id)
            .env("AGENTEVAL_EVAL_NAME", &ctx.eval_name)
            .current_dir(&ctx.working_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The harness enforces its timeout by racing this invocation
            // against a timer and dropping the future on expiry; without
            // this the child survives as an orphan past the timeout.
            .kill_on_drop(true);

        if let Some(session_id) = &ctx.session_id {
            command.env("AGENTEVAL_SESSION_ID", session_id);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return AgentInvocation {
                    success: false,
                    error: Some(format!("failed to spawn agent process: {e}")),
                    ..Default::default()
                };
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                return AgentInvocation {
                    success: false,
                    error: Some(format!("failed to write prompt to agent stdin: {e}")),
                    ..Default::default()
                };
            }
        }

        match child.wait_with_output().await {
            Ok(output) => AgentInvocation {
                output: String::from_utf8_lossy(&output.stdout).into_owned(),
                success: output.status.success(),
                error: if output.status.success() {
                    None
                } else {
                    Some(String::from_utf8_lossy(&output.stderr).into_owned())
                },
                ..Default::default()
            },
            Err(e) => AgentInvocation {
                success: false,
                error: Some(format!("agent process failed: {e}")),
                ..Default::default()
            },
        }
    }
}
