//! Clap argument surface (spec §6 config table), grounded on
//! `adk_cli::cli`'s `Parser`/`Subcommand` derive style.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agenteval")]
#[command(about = "Evaluation harness for non-deterministic AI agents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an eval suite against an agent process.
    Run {
        /// Path to a TOML config file; CLI flags below override its fields.
        #[arg(long, env = "AGENTEVAL_CONFIG")]
        config: Option<PathBuf>,

        /// Directory to discover eval case files under.
        #[arg(long)]
        test_dir: Option<PathBuf>,

        /// Glob pattern(s) for eval case files; repeatable.
        #[arg(long = "test-match")]
        test_match: Vec<String>,

        /// Directory containing LLM-judge rubric markdown files.
        #[arg(long)]
        rubrics_dir: Option<PathBuf>,

        /// Where to write the suite result JSON.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Only run cases in these categories; repeatable.
        #[arg(long)]
        category: Vec<String>,

        /// Only run cases carrying any of these tags; repeatable.
        #[arg(long)]
        tag: Vec<String>,

        /// Only run cases with these ids; repeatable.
        #[arg(long)]
        id: Vec<String>,

        /// Path to the external program invoked as the agent under test.
        #[arg(long)]
        agent_cmd: PathBuf,

        /// Extra arguments passed to the agent program.
        #[arg(long = "agent-arg")]
        agent_args: Vec<String>,

        /// Run cases sequentially even when more than one is loaded.
        #[arg(long)]
        no_parallel: bool,

        /// Maximum concurrent case executions.
        #[arg(long)]
        max_concurrency: Option<u32>,

        /// Keep workspaces on disk after judging instead of deleting them.
        #[arg(long)]
        preserve_workspaces: bool,
    },

    /// List discovered eval cases without running them.
    List {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        test_dir: Option<PathBuf>,

        #[arg(long = "test-match")]
        test_match: Vec<String>,

        #[arg(long)]
        category: Vec<String>,

        #[arg(long)]
        tag: Vec<String>,
    },

    /// Summarize, compare, or aggregate previously written suite result files.
    Report {
        #[command(subcommand)]
        action: ReportAction,
    },
}

#[derive(Subcommand)]
pub enum ReportAction {
    /// Print category and error-taxonomy summaries for one suite result.
    Summary {
        /// Path to an `EvalSuiteResult` JSON file.
        result: PathBuf,
    },
    /// Diff two suite results and report regressions and newly-passing cases.
    Compare {
        /// The more recent `EvalSuiteResult` JSON file.
        current: PathBuf,
        /// The baseline `EvalSuiteResult` JSON file to compare against.
        baseline: PathBuf,
    },
    /// Aggregate flakiness/non-determinism metrics over repeated runs.
    Aggregate {
        /// Paths to `EvalSuiteResult` JSON files from repeated runs of the same suite.
        runs: Vec<PathBuf>,
    },
}
