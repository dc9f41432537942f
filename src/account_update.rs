// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Bulk re-point issues with recent worklogs from one account to another
// role: processing/account-update
// inputs: {fromAccountKey: toAccountKey} JSON, since date, IssueTracker, WorklogApi
// outputs: Count of updated issues
// side_effects: Account-field updates on every matching issue; pauses between full search pages
// invariants: Every target key resolves to an account id before the first update is sent
// errors: Unknown target key is fatal; tracker errors propagate
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use crate::clients::jira::{IssueTracker, search_all_issues};
use crate::clients::tempo::WorklogApi;

pub const SEARCH_BATCH_SIZE: usize = 100;
pub const SEARCH_PAUSE: Duration = Duration::from_millis(500);

pub fn load_account_map(path: &Path) -> Result<BTreeMap<String, String>> {
  let text = std::fs::read_to_string(path).with_context(|| format!("reading account mapping {}", path.display()))?;
  serde_json::from_str(&text).with_context(|| format!("parsing account mapping {}", path.display()))
}

pub fn account_query(from_key: &str, since: NaiveDate) -> String {
  format!("Account.key = {from_key} AND worklogDate > {}", since.format("%Y-%m-%d"))
}

pub fn update_accounts(
  account_map: &BTreeMap<String, String>,
  since: NaiveDate,
  tracker: &dyn IssueTracker,
  worklogs: &dyn WorklogApi,
  pause: Duration,
) -> Result<usize> {
  let targets: Vec<String> = account_map.values().cloned().collect();
  let ids = worklogs.account_ids_by_key(&targets)?;

  for target in &targets {
    if !ids.contains_key(target) {
      bail!("account {target} not found in the worklog service");
    }
  }

  let mut updated = 0;
  for (from, to) in account_map {
    println!("Updating account {from} to {to}");
    let to_id = ids[to];

    let issues = search_all_issues(tracker, &account_query(from, since), SEARCH_BATCH_SIZE, pause)?;
    for issue in issues {
      println!("Updating issue {}", issue.key);
      tracker
        .update_issue_account(&issue.id, to_id)
        .with_context(|| format!("updating issue {}", issue.key))?;
      updated += 1;
    }
  }

  Ok(updated)
}
