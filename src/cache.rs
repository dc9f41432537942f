// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Persist account name → legacy project id resolutions across runs
// role: persistence/account-cache
// inputs: JSON object file (created as {} when absent)
// outputs: In-memory map; pretty JSON written back on save
// side_effects: Creates the parent directory and file on load when missing; rewrites the file on save
// invariants: Entries are only ever added or overwritten, never dropped, within a run
// errors: IO/parse errors carry the file path
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountProjectCache {
  path: PathBuf,
  entries: BTreeMap<String, String>,
}

impl AccountProjectCache {
  pub fn load(path: &Path) -> Result<Self> {
    if !path.exists() {
      let cache = Self {
        path: path.to_path_buf(),
        entries: BTreeMap::new(),
      };
      cache.save()?;
      return Ok(cache);
    }

    let text = std::fs::read_to_string(path).with_context(|| format!("reading account cache {}", path.display()))?;
    let entries: BTreeMap<String, String> =
      serde_json::from_str(&text).with_context(|| format!("parsing account cache {}", path.display()))?;

    Ok(Self {
      path: path.to_path_buf(),
      entries,
    })
  }

  pub fn save(&self) -> Result<()> {
    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }

    std::fs::write(&self.path, serde_json::to_vec_pretty(&self.entries)?)
      .with_context(|| format!("writing account cache {}", self.path.display()))
  }

  pub fn get(&self, account: &str) -> Option<&str> {
    self.entries.get(account).map(String::as_str)
  }

  pub fn insert(&mut self, account: impl Into<String>, project_id: impl Into<String>) {
    self.entries.insert(account.into(), project_id.into());
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}
