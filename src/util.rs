// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Utilities for the effective clock, debug directory preparation and man page rendering
// role: utilities/helpers
// inputs: Optional now override; paths; clap CommandFactory
// outputs: Local now/today, ensured directories, man page text
// side_effects: prepare_debug_dir creates directories
// invariants: prepare_debug_dir returns an existing directory
// errors: IO errors bubble with the path as context
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use clap::CommandFactory;

/// Returns the effective "now" given an optional override.
///
/// When `override_now` is `Some`, that instant is returned; otherwise
/// the current local time is used. Centralizes our handling of test
/// determinism without sprinkling `Local::now()` throughout the code.
pub fn effective_now(override_now: Option<DateTime<Local>>) -> DateTime<Local> {
  override_now.unwrap_or_else(Local::now)
}

pub fn effective_today(override_now: Option<DateTime<Local>>) -> NaiveDate {
  effective_now(override_now).date_naive()
}

pub fn prepare_debug_dir(dir: &Path) -> Result<()> {
  std::fs::create_dir_all(dir).with_context(|| format!("creating debug directory {}", dir.display()))
}

pub fn render_man_page<T: CommandFactory>() -> Result<String> {
  let cmd = T::command();
  let man = clap_mangen::Man::new(cmd);
  let mut buf: Vec<u8> = Vec::new();
  man.render(&mut buf)?;

  Ok(String::from_utf8(buf)?)
}
