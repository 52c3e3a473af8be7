mod cli;
mod config;
mod shell_agent;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agenteval_core::{
    builtin_registry, loader, EvalRunner, NoopHooks, RunFilter, TestHarness, WorkspaceManager,
};
use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ReportAction};
use shell_agent::ShellAgent;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Run { .. } => run(&cli.command).await,
        Commands::List { .. } => list(&cli.command),
        Commands::Report { action } => report(action),
    }
}

async fn run(command: &Commands) -> Result<()> {
    let Commands::Run {
        config: config_path,
        category,
        tag,
        id,
        agent_cmd,
        agent_args,
        ..
    } = command
    else {
        unreachable!("run() only called with Commands::Run")
    };

    let config = config::resolve(config_path.as_ref(), command)?;

    let test_dir = PathBuf::from(&config.test_dir);
    let loaded = loader::load_cases(&test_dir, &config.test_match);
    tracing::info!(count = loaded.len(), test_dir = %test_dir.display(), "loaded eval cases");
    let cases = loaded.into_iter().map(|l| l.case).collect();

    let base_dir = WorkspaceManager::resolve_base_dir(&std::env::current_dir()?);
    let workspace_manager = Arc::new(WorkspaceManager::new(base_dir));
    let agent = Arc::new(ShellAgent::new(agent_cmd.clone(), agent_args.clone()));
    let harness = Arc::new(TestHarness::new(agent, workspace_manager.clone(), None));
    let registry = Arc::new(builtin_registry(
        None,
        PathBuf::from(&config.rubrics_dir),
        config.routing_keywords.clone(),
    ));

    let runner = EvalRunner::new(config.clone(), registry, harness, workspace_manager, Arc::new(NoopHooks));

    let filter = RunFilter {
        categories: (!category.is_empty()).then(|| category.clone()),
        tags: (!tag.is_empty()).then(|| tag.clone()),
        ids: (!id.is_empty()).then(|| id.clone()),
    };

    let suite = runner.run(cases, filter).await;

    println!(
        "{} total, {} passed, {} failed, {} errors ({:.1}% pass rate)",
        suite.total,
        suite.passed,
        suite.failed,
        suite.errors,
        suite.pass_rate * 100.0
    );

    let output_dir = PathBuf::from(&config.output_dir);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output dir {}", output_dir.display()))?;
    let output_path = output_dir.join(format!("{}.json", suite.run_id));
    let json = serde_json::to_string_pretty(&suite)?;
    std::fs::write(&output_path, json)
        .with_context(|| format!("writing suite result to {}", output_path.display()))?;
    println!("wrote {}", output_path.display());

    if suite.failed > 0 || suite.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn list(command: &Commands) -> Result<()> {
    let Commands::List { category, tag, .. } = command else {
        unreachable!("list() only called with Commands::List")
    };
    let config = config::resolve(None, command)?;
    let test_dir = PathBuf::from(&config.test_dir);
    let loaded = loader::load_cases(&test_dir, &config.test_match);

    let filter = RunFilter {
        categories: (!category.is_empty()).then(|| category.clone()),
        tags: (!tag.is_empty()).then(|| tag.clone()),
        ids: None,
    };

    for item in &loaded {
        let case = &item.case;
        if !filter.matches(case) {
            continue;
        }
        println!(
            "{:<20} {:<10} {:<40} [{}]",
            case.id(),
            case.category(),
            case.common().name,
            item.source_file.display()
        );
    }
    Ok(())
}

fn report(action: &ReportAction) -> Result<()> {
    use agenteval_core::report::{
        aggregate_results, calculate_non_determinism_metrics, compare_runs, detect_regressions,
        summarize_by_category, summarize_errors,
    };
    use agenteval_core::EvalSuiteResult;

    fn load_suite(path: &Path) -> Result<EvalSuiteResult> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading suite result {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing suite result {}", path.display()))
    }

    match action {
        ReportAction::Summary { result } => {
            let suite = load_suite(result)?;
            for category in summarize_by_category(&suite.results) {
                println!(
                    "{:<10} total={} passed={} failed={} errors={} passRate={:.1}%",
                    category.category,
                    category.total,
                    category.passed,
                    category.failed,
                    category.errors,
                    category.pass_rate * 100.0
                );
            }
            for error in summarize_errors(&suite.results) {
                println!("{:?}: {} occurrences", error.error_type, error.count);
                for example in &error.examples {
                    println!("  - {example}");
                }
            }
        }
        ReportAction::Compare { current, baseline } => {
            let current_suite = load_suite(current)?;
            let baseline_suite = load_suite(baseline)?;
            let comparison = compare_runs(&current_suite, &baseline_suite);
            println!("pass rate delta: {:+.2}%", comparison.pass_rate_delta * 100.0);
            println!("newly passing: {:?}", comparison.newly_passing);
            println!("newly failing: {:?}", comparison.newly_failing);
            let regressions = detect_regressions(&current_suite, &baseline_suite);
            println!("regressions: {regressions:?}");
        }
        ReportAction::Aggregate { runs } => {
            let suites: Vec<EvalSuiteResult> =
                runs.iter().map(|p| load_suite(p)).collect::<Result<Vec<_>>>()?;
            for case in aggregate_results(&suites) {
                println!(
                    "{:<20} runs={} passes={} failures={} passRate={:.1}% flaky={} flakinessScore={:.2}",
                    case.case_id,
                    case.runs,
                    case.passes,
                    case.failures,
                    case.pass_rate * 100.0,
                    case.flaky,
                    case.flakiness_score
                );
            }
            println!("non-determinism consistency: {:.2}%", calculate_non_determinism_metrics(&suites) * 100.0);
        }
    }
    Ok(())
}
