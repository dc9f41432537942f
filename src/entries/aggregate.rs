// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Fold worklogs into per-account, per-day and per-issue second totals, then regroup by legacy project and task
// role: aggregation/accounts
// inputs: WorkLog list, issue tracker (account field), operator prompt for issues without an account
// outputs: AccountBuckets; project → task → date → seconds
// invariants:
// - entries[date] == Σ issues_by_date[*][date] after every fold
// - Folding is additive, so worklog order never changes the result
// - Each issue's account is resolved at most once per run
// errors: Blank operator answer for a missing account ⇒ SyncError::Aborted; tracker errors propagate
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use crate::classify::TaskMappingTable;
use crate::clients::jira::IssueTracker;
use crate::error::SyncError;
use crate::model::WorkLog;
use crate::prompt::Prompt;

pub type DaySeconds = BTreeMap<NaiveDate, u64>;

/// Legacy project id → task code → per-day seconds.
pub type ProjectTaskDays = BTreeMap<String, BTreeMap<String, DaySeconds>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountBucket {
  entries: DaySeconds,
  issues_by_date: BTreeMap<String, DaySeconds>,
}

impl AccountBucket {
  pub fn fold(&mut self, issue_id: &str, date: NaiveDate, seconds: u64) {
    *self.entries.entry(date).or_default() += seconds;
    *self
      .issues_by_date
      .entry(issue_id.to_string())
      .or_default()
      .entry(date)
      .or_default() += seconds;
  }

  pub fn entries(&self) -> &DaySeconds {
    &self.entries
  }

  pub fn issues_by_date(&self) -> &BTreeMap<String, DaySeconds> {
    &self.issues_by_date
  }

  pub fn total_seconds(&self) -> u64 {
    self.entries.values().sum()
  }

  pub fn is_consistent(&self) -> bool {
    let mut summed = DaySeconds::new();
    for days in self.issues_by_date.values() {
      for (date, secs) in days {
        *summed.entry(*date).or_default() += secs;
      }
    }
    summed == self.entries
  }
}

pub type AccountBuckets = BTreeMap<String, AccountBucket>;

/// Issue → account, resolved lazily through the tracker with operator fallback.
pub struct AccountResolver<'a> {
  tracker: &'a dyn IssueTracker,
  prompt: &'a dyn Prompt,
  by_issue: RefCell<HashMap<String, String>>,
}

impl<'a> AccountResolver<'a> {
  pub fn new(tracker: &'a dyn IssueTracker, prompt: &'a dyn Prompt) -> Self {
    Self {
      tracker,
      prompt,
      by_issue: RefCell::new(HashMap::new()),
    }
  }

  pub fn account_for(&self, issue_id: &str) -> Result<String> {
    if let Some(account) = self.by_issue.borrow().get(issue_id) {
      return Ok(account.clone());
    }

    let issue = self
      .tracker
      .get_issue(issue_id)
      .with_context(|| format!("resolving account of issue {issue_id}"))?;

    let account = match issue.account {
      Some(account) => account,
      None => {
        println!("Issue {} has no associated account.", issue.key);
        let answer = self
          .prompt
          .ask("Enter account name or leave blank to terminate: ")?;
        if answer.is_empty() {
          return Err(SyncError::Aborted.into());
        }
        answer
      }
    };

    self
      .by_issue
      .borrow_mut()
      .insert(issue_id.to_string(), account.clone());

    Ok(account)
  }
}

pub fn fold_worklogs(worklogs: &[WorkLog], resolver: &AccountResolver<'_>) -> Result<AccountBuckets> {
  let mut buckets = AccountBuckets::new();

  for w in worklogs {
    let account = resolver.account_for(&w.issue_id)?;
    buckets
      .entry(account)
      .or_default()
      .fold(&w.issue_id, w.start_date, w.time_spent_seconds);
  }

  Ok(buckets)
}

/// Regroup account buckets under their legacy project and the task each issue classifies to.
///
/// Several accounts may map to one project, and several issues to one task;
/// their seconds are summed per day.
pub fn group_by_project_and_task(
  buckets: &AccountBuckets,
  account_projects: &HashMap<String, String>,
  tracker: &dyn IssueTracker,
  mapping: &TaskMappingTable,
) -> Result<ProjectTaskDays> {
  let mut out = ProjectTaskDays::new();

  for (account, bucket) in buckets {
    let project = account_projects
      .get(account)
      .with_context(|| format!("account {account:?} was not matched to a timesheet project"))?;

    for (issue_id, days) in bucket.issues_by_date() {
      let issue = tracker.get_issue(issue_id)?;
      let task = mapping.classify(project, &issue.key);

      let slot = out
        .entry(project.clone())
        .or_default()
        .entry(task.to_string())
        .or_default();
      for (date, secs) in days {
        *slot.entry(*date).or_default() += secs;
      }
    }
  }

  Ok(out)
}
