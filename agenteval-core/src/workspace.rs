//! Workspace Manager (spec §4.3): allocates an isolated filesystem
//! directory per case execution, optionally seeded from a template, and
//! removes it after judging.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use rand::Rng;
use walkdir::WalkDir;

use crate::error::{EvalError, Result};

const TEMPLATE_EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", "dist"];
const CLEANUP_MAX_ATTEMPTS: u32 = 3;
const CLEANUP_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct Workspace {
    pub id: String,
    pub path: PathBuf,
}

pub struct WorkspaceManager {
    base_dir: PathBuf,
    live: RwLock<HashMap<String, PathBuf>>,
}

impl WorkspaceManager {
    /// `base_dir` is the preferred location (`{cwd}/__evals__/results/workspaces`
    /// if writable, else the OS temp directory) — resolved by the caller so
    /// the manager itself stays free of cwd-probing logic.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir, live: RwLock::new(HashMap::new()) }
    }

    /// Resolve the preferred base directory per spec §4.3: the cwd-relative
    /// path if it (or its nearest existing ancestor) is writable, else the
    /// OS temp directory.
    pub fn resolve_base_dir(cwd: &Path) -> PathBuf {
        let preferred = cwd.join("__evals__").join("results").join("workspaces");
        if std::fs::create_dir_all(&preferred).is_ok() {
            preferred
        } else {
            std::env::temp_dir().join("agenteval-workspaces")
        }
    }

    fn generate_id() -> String {
        let epoch_ms = chrono::Utc::now().timestamp_millis();
        let suffix: String = rand::thread_rng()
            .sample_iter(rand::distributions::Alphanumeric)
            .take(6)
            .map(char::from)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        format!("ws-{epoch_ms}-{suffix}")
    }

    /// `createWorkspace(template?)`: creates a minimal skeleton (`src/`
    /// plus a manifest file), or copies a template directory's contents
    /// excluding `node_modules`/`.git`/`dist` if `template` exists. A
    /// nonexistent template path silently falls back to the skeleton.
    pub fn create_workspace(&self, template: Option<&Path>) -> Result<Workspace> {
        let id = Self::generate_id();
        let path = self.base_dir.join(&id);
        std::fs::create_dir_all(&path)?;

        match template {
            Some(tpl) if tpl.exists() => Self::copy_template(tpl, &path)?,
            _ => Self::create_skeleton(&path)?,
        }

        self.live.write().expect("workspace table lock poisoned").insert(id.clone(), path.clone());
        Ok(Workspace { id, path })
    }

    fn create_skeleton(path: &Path) -> Result<()> {
        std::fs::create_dir_all(path.join("src"))?;
        std::fs::write(path.join("agenteval.workspace.json"), r#"{"kind":"agenteval-workspace"}"#)?;
        Ok(())
    }

    fn copy_template(template: &Path, dest: &Path) -> Result<()> {
        for entry in WalkDir::new(template)
            .into_iter()
            .filter_entry(|e| !Self::is_excluded(e))
            .filter_map(std::result::Result::ok)
        {
            let relative = entry.path().strip_prefix(template).expect("entry is under template root");
            if relative.as_os_str().is_empty() {
                continue;
            }
            let target = dest.join(relative);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target)?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(entry.path(), &target)?;
            }
        }
        Ok(())
    }

    fn is_excluded(entry: &walkdir::DirEntry) -> bool {
        entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| TEMPLATE_EXCLUDED_DIRS.contains(&name))
    }

    /// Removes the directory with retries; ignores final failure.
    /// Idempotent — a second call for an id already removed is a no-op
    /// (spec §8).
    pub fn cleanup_workspace(&self, id: &str) {
        let path = {
            let mut live = self.live.write().expect("workspace table lock poisoned");
            live.remove(id)
        };
        let Some(path) = path else {
            return;
        };

        for attempt in 0..CLEANUP_MAX_ATTEMPTS {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => return,
                Err(e) if attempt + 1 < CLEANUP_MAX_ATTEMPTS => {
                    tracing::warn!(workspace_id = id, attempt, error = %e, "workspace cleanup retrying");
                    std::thread::sleep(CLEANUP_RETRY_DELAY);
                }
                Err(e) => {
                    tracing::warn!(workspace_id = id, error = %e, "workspace cleanup failed, giving up");
                }
            }
        }
    }

    /// Defensive sweep over any workspaces that survived (spec §4.5
    /// teardown step).
    pub fn cleanup_all(&self) {
        let ids: Vec<String> =
            self.live.read().expect("workspace table lock poisoned").keys().cloned().collect();
        for id in ids {
            self.cleanup_workspace(&id);
        }
    }

    pub fn list_live(&self) -> Vec<String> {
        self.live.read().expect("workspace table lock poisoned").keys().cloned().collect()
    }
}

impl std::fmt::Debug for WorkspaceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceManager").field("base_dir", &self.base_dir).finish()
    }
}
