// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Map (project, issue) to a timesheet task code using the static task-mapping table
// role: classification/tasks
// inputs: Task mapping JSON (issues, projects, default, task_names)
// outputs: Task codes and their human-readable names
// invariants:
// - Precedence: issue-key override > project entry > default; no other fallback
// - Every code reachable from issues/projects/default has a name (checked by validate before any IO)
// - The default code is validated too, so a table whose fallback is unnamed is rejected up front
// errors: Unnamed codes ⇒ SyncError::UnnamedTask; unreadable/malformed file carries the path
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskMappingTable {
  #[serde(default)]
  pub issues: HashMap<String, String>,
  #[serde(default)]
  pub projects: HashMap<String, String>,
  pub default: String,
  #[serde(alias = "taskNames")]
  pub task_names: HashMap<String, String>,
}

impl TaskMappingTable {
  pub fn load(path: &Path) -> Result<Self> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading task mapping {}", path.display()))?;
    let table: TaskMappingTable =
      serde_json::from_str(&text).with_context(|| format!("parsing task mapping {}", path.display()))?;
    table.validate()?;

    Ok(table)
  }

  /// Fail on the first task code (in sorted order) that has no name.
  pub fn validate(&self) -> Result<()> {
    let referenced: BTreeSet<&String> = self
      .issues
      .values()
      .chain(self.projects.values())
      .chain(std::iter::once(&self.default))
      .collect();

    for code in referenced {
      if !self.task_names.contains_key(code) {
        return Err(SyncError::UnnamedTask(code.clone()).into());
      }
    }

    Ok(())
  }

  pub fn classify(&self, project_id: &str, issue_key: &str) -> &str {
    if let Some(task) = self.issues.get(issue_key) {
      return task;
    }

    if let Some(task) = self.projects.get(project_id) {
      return task;
    }

    &self.default
  }

  pub fn task_name(&self, code: &str) -> Option<&str> {
    self.task_names.get(code).map(String::as_str)
  }
}
