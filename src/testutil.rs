// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: In-memory fakes for every collaborator seam (issue tracker, worklog service, time-entry source, legacy transport)
// role: test/support
// outputs: Canned responses plus recorded calls for assertions
// invariants: Compiled only for tests or with the `testutil` feature; never reachable from the binary
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::{Result, bail};
use chrono::NaiveDate;

use crate::clients::jira::IssueTracker;
use crate::clients::tempo::WorklogApi;
use crate::clients::toggl::TimeEntrySource;
use crate::error::SyncError;
use crate::legacy::transport::LegacyTransport;
use crate::model::{Issue, NewWorklog, RawEntry, WorkLog};

// --- Issue tracker ---

#[derive(Default)]
pub struct FakeTracker {
  issues: Vec<Issue>,
  lookups: Cell<usize>,
  searches: RefCell<Vec<String>>,
  updates: RefCell<Vec<(String, i64)>>,
}

impl FakeTracker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_issue(mut self, id: &str, key: &str, account: Option<&str>) -> Self {
    self.issues.push(Issue {
      key: key.to_string(),
      id: id.to_string(),
      account: account.map(str::to_string),
    });
    self
  }

  pub fn lookups(&self) -> usize {
    self.lookups.get()
  }

  pub fn searches(&self) -> usize {
    self.searches.borrow().len()
  }

  pub fn queries(&self) -> Vec<String> {
    self.searches.borrow().clone()
  }

  pub fn updates(&self) -> Vec<(String, i64)> {
    self.updates.borrow().clone()
  }
}

impl IssueTracker for FakeTracker {
  fn get_issue(&self, id_or_key: &str) -> Result<Issue> {
    self.lookups.set(self.lookups.get() + 1);
    self
      .issues
      .iter()
      .find(|i| i.id == id_or_key || i.key == id_or_key)
      .cloned()
      .ok_or_else(|| SyncError::IssueNotFound(id_or_key.to_string()).into())
  }

  fn update_issue_account(&self, issue_id: &str, account_id: i64) -> Result<()> {
    self.updates.borrow_mut().push((issue_id.to_string(), account_id));
    Ok(())
  }

  /// Every registered issue matches every query; paging slices insertion order.
  fn search_issues(&self, jql: &str, start_at: usize, max_results: usize) -> Result<Vec<Issue>> {
    self.searches.borrow_mut().push(jql.to_string());
    Ok(self.issues.iter().skip(start_at).take(max_results).cloned().collect())
  }
}

// --- Worklog service ---

#[derive(Default)]
pub struct FakeWorklogs {
  worklogs: Vec<WorkLog>,
  accounts: HashMap<String, i64>,
  rejected_issues: HashSet<String>,
  posted: RefCell<Vec<NewWorklog>>,
  searches: RefCell<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl FakeWorklogs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_worklog(mut self, issue_id: &str, date: NaiveDate, seconds: u64) -> Self {
    self.worklogs.push(WorkLog {
      issue_id: issue_id.to_string(),
      start_date: date,
      time_spent_seconds: seconds,
    });
    self
  }

  pub fn with_account(mut self, key: &str, id: i64) -> Self {
    self.accounts.insert(key.to_string(), id);
    self
  }

  /// Posts against this issue fail as if the service rejected them.
  pub fn rejecting(mut self, issue_id: &str) -> Self {
    self.rejected_issues.insert(issue_id.to_string());
    self
  }

  pub fn posted(&self) -> Vec<NewWorklog> {
    self.posted.borrow().clone()
  }

  pub fn searches(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
    self.searches.borrow().clone()
  }
}

impl WorklogApi for FakeWorklogs {
  fn search_worklogs(&self, author_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<WorkLog>> {
    self.searches.borrow_mut().push((author_id.to_string(), from, to));
    Ok(
      self
        .worklogs
        .iter()
        .filter(|w| w.start_date >= from && w.start_date <= to)
        .cloned()
        .collect(),
    )
  }

  fn post_worklog(&self, worklog: &NewWorklog) -> Result<()> {
    if self.rejected_issues.contains(&worklog.issue_id) {
      bail!("posting worklog failed with HTTP 400: issue {} is closed", worklog.issue_id);
    }
    self.posted.borrow_mut().push(worklog.clone());
    Ok(())
  }

  fn account_ids_by_key(&self, keys: &[String]) -> Result<HashMap<String, i64>> {
    Ok(
      keys
        .iter()
        .filter_map(|k| self.accounts.get(k).map(|id| (k.clone(), *id)))
        .collect(),
    )
  }
}

// --- Raw time-entry source ---

pub struct FakeTimeSource {
  entries: Vec<RawEntry>,
  windows: RefCell<Vec<(NaiveDate, NaiveDate)>>,
}

impl FakeTimeSource {
  pub fn new(entries: Vec<RawEntry>) -> Self {
    Self {
      entries,
      windows: RefCell::new(Vec::new()),
    }
  }

  pub fn windows(&self) -> Vec<(NaiveDate, NaiveDate)> {
    self.windows.borrow().clone()
  }
}

pub fn raw_entry(description: &str, start: &str, stop: Option<&str>) -> RawEntry {
  RawEntry {
    description: description.to_string(),
    start: start.to_string(),
    stop: stop.map(str::to_string),
  }
}

impl TimeEntrySource for FakeTimeSource {
  fn fetch_raw_entries(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RawEntry>> {
    self.windows.borrow_mut().push((from, to));
    Ok(self.entries.clone())
  }
}

// --- Legacy transport ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
  pub method: &'static str,
  pub path: String,
  pub fields: Vec<(String, String)>,
}

impl RecordedCall {
  pub fn field(&self, name: &str) -> Option<&str> {
    self
      .fields
      .iter()
      .rev()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.as_str())
  }
}

struct Rule {
  method: &'static str,
  path: String,
  when: Option<(String, String)>,
  bodies: RefCell<VecDeque<String>>,
}

impl Rule {
  fn matches(&self, method: &str, path: &str, fields: &[(&str, &str)]) -> bool {
    if self.method != method || self.path != path {
      return false;
    }

    match &self.when {
      Some((k, v)) => fields.iter().any(|(fk, fv)| *fk == k.as_str() && *fv == v.as_str()),
      None => true,
    }
  }

  /// Queued bodies are served in order; the last one repeats.
  fn next_body(&self) -> String {
    let mut bodies = self.bodies.borrow_mut();
    if bodies.len() > 1 {
      bodies.pop_front().unwrap_or_default()
    } else {
      bodies.front().cloned().unwrap_or_default()
    }
  }
}

/// Routes requests by method, path and an optional `field=value` condition.
#[derive(Default)]
pub struct FakeTransport {
  rules: Vec<Rule>,
  calls: RefCell<Vec<RecordedCall>>,
}

impl FakeTransport {
  pub fn new() -> Self {
    Self::default()
  }

  fn push(mut self, method: &'static str, path: &str, when: Option<(&str, &str)>, body: String) -> Self {
    let when = when.map(|(k, v)| (k.to_string(), v.to_string()));
    if let Some(rule) = self
      .rules
      .iter()
      .find(|r| r.method == method && r.path == path && r.when == when)
    {
      rule.bodies.borrow_mut().push_back(body);
      return self;
    }

    self.rules.push(Rule {
      method,
      path: path.to_string(),
      when,
      bodies: RefCell::new(VecDeque::from([body])),
    });
    self
  }

  pub fn on_get(self, path: &str, body: impl Into<String>) -> Self {
    self.push("GET", path, None, body.into())
  }

  pub fn on_get_when(self, path: &str, when: (&str, &str), body: impl Into<String>) -> Self {
    self.push("GET", path, Some(when), body.into())
  }

  pub fn on_post(self, path: &str, body: impl Into<String>) -> Self {
    self.push("POST", path, None, body.into())
  }

  pub fn on_post_when(self, path: &str, when: (&str, &str), body: impl Into<String>) -> Self {
    self.push("POST", path, Some(when), body.into())
  }

  pub fn calls(&self) -> Vec<RecordedCall> {
    self.calls.borrow().clone()
  }

  pub fn posts_to(&self, path: &str) -> usize {
    self
      .calls
      .borrow()
      .iter()
      .filter(|c| c.method == "POST" && c.path == path)
      .count()
  }

  fn respond(&self, method: &'static str, path: &str, fields: &[(&str, &str)]) -> Result<String> {
    self.calls.borrow_mut().push(RecordedCall {
      method,
      path: path.to_string(),
      fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
    });

    // Conditional rules win over catch-all ones.
    let rule = self
      .rules
      .iter()
      .find(|r| r.when.is_some() && r.matches(method, path, fields))
      .or_else(|| self.rules.iter().find(|r| r.matches(method, path, fields)));

    match rule {
      Some(r) => Ok(r.next_body()),
      None => bail!("no canned response for {method} {path}"),
    }
  }
}

impl LegacyTransport for FakeTransport {
  fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
    self.respond("GET", path, query)
  }

  fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<String> {
    self.respond("POST", path, form)
  }
}
