//! Loads `ResolvedConfig` from an optional TOML file and layers CLI flag
//! overrides on top (spec §6), grounded on `adk_cli::config::Config::from_env`'s
//! anyhow-based loading style.

use std::path::PathBuf;

use agenteval_core::ResolvedConfig;
use anyhow::{Context, Result};

use crate::cli::Commands;

/// Loads the base config (TOML if given, else defaults) then applies
/// every CLI flag the operator actually passed.
pub fn resolve(config_path: Option<&PathBuf>, command: &Commands) -> Result<ResolvedConfig> {
    let mut config = match config_path {
        Some(path) => ResolvedConfig::load(path)
            .with_context(|| format!("loading config file {}", path.display()))?,
        None => ResolvedConfig::default(),
    };

    if let Commands::Run {
        test_dir,
        test_match,
        rubrics_dir,
        output_dir,
        no_parallel,
        max_concurrency,
        preserve_workspaces,
        ..
    } = command
    {
        if let Some(dir) = test_dir {
            config.test_dir = dir.display().to_string();
        }
        if !test_match.is_empty() {
            config.test_match = test_match.clone();
        }
        if let Some(dir) = rubrics_dir {
            config.rubrics_dir = dir.display().to_string();
        }
        if let Some(dir) = output_dir {
            config.output_dir = dir.display().to_string();
        }
        if *no_parallel {
            config.parallel = false;
        }
        if let Some(max) = max_concurrency {
            config.max_concurrency = *max;
        }
        if *preserve_workspaces {
            config.preserve_workspaces = true;
        }
    }

    if let Commands::List { test_dir, test_match, .. } = command {
        if let Some(dir) = test_dir {
            config.test_dir = dir.display().to_string();
        }
        if !test_match.is_empty() {
            config.test_match = test_match.clone();
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_defaults_for_run() {
        let command = Commands::Run {
            config: None,
            test_dir: Some(PathBuf::from("/evals")),
            test_match: vec![],
            rubrics_dir: None,
            output_dir: None,
            category: vec![],
            tag: vec![],
            id: vec![],
            agent_cmd: PathBuf::from("/bin/true"),
            agent_args: vec![],
            no_parallel: true,
            max_concurrency: Some(8),
            preserve_workspaces: false,
        };
        let config = resolve(None, &command).unwrap();
        assert_eq!(config.test_dir, "/evals");
        assert!(!config.parallel);
        assert_eq!(config.max_concurrency, 8);
    }
}
