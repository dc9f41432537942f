// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Issue-tracker collaborator: issue lookup by id/key, account-field update, JQL search
// role: clients/issue-tracker
// inputs: JiraSettings (base URL, email + API token, account custom field)
// outputs: Issue values with the rendered account field
// side_effects: Network calls to the Jira REST v3 API
// invariants:
// - HTTP 404 on lookup ⇒ SyncError::IssueNotFound (callers may ask the operator for a corrected key)
// - CachedIssueTracker performs at most one remote lookup per id or key per run
// errors: Other HTTP/transport failures propagate unchanged (no retries)
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use crate::clients::{basic_auth, json_agent, read_json};
use crate::config::JiraSettings;
use crate::error::SyncError;
use crate::ext::serde_json::JsonFetch;
use crate::model::Issue;

// --- Trait seam for the issue tracker ---
pub trait IssueTracker {
  /// Look up an issue by numeric id or by key.
  fn get_issue(&self, id_or_key: &str) -> Result<Issue>;

  /// Point the issue's account custom field at a different account.
  fn update_issue_account(&self, issue_id: &str, account_id: i64) -> Result<()>;

  /// One page of a JQL search.
  fn search_issues(&self, jql: &str, start_at: usize, max_results: usize) -> Result<Vec<Issue>>;
}

pub struct JiraHttpApi {
  agent: ureq::Agent,
  settings: JiraSettings,
  auth: String,
}

impl JiraHttpApi {
  pub fn new(settings: JiraSettings) -> Self {
    let auth = basic_auth(&settings.user_email, &settings.api_token);
    Self {
      agent: json_agent(),
      settings,
      auth,
    }
  }

  fn issue_from_json(&self, v: &serde_json::Value) -> Issue {
    let field = format!("fields.{}.value", self.settings.account_field);

    Issue {
      key: v.fetch("key").to_or_default::<String>(),
      id: v.fetch("id").to_id_string().unwrap_or_default(),
      account: v
        .fetch(&field)
        .to::<String>()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()),
    }
  }
}

impl IssueTracker for JiraHttpApi {
  fn get_issue(&self, id_or_key: &str) -> Result<Issue> {
    let url = format!("{}/rest/api/3/issue/{}", self.settings.base_url, id_or_key);
    debug!(%url, "jira issue lookup");

    let outcome = self
      .agent
      .get(&url)
      .set("Accept", "application/json")
      .set("Authorization", &self.auth)
      .query("fields", &format!("summary,{}", self.settings.account_field))
      .call();

    if let Err(ureq::Error::Status(404, _)) = outcome {
      return Err(SyncError::IssueNotFound(id_or_key.to_string()).into());
    }

    let v = read_json(outcome, &format!("looking up issue {id_or_key}"))?;
    Ok(self.issue_from_json(&v))
  }

  fn update_issue_account(&self, issue_id: &str, account_id: i64) -> Result<()> {
    let url = format!("{}/rest/api/3/issue/{}", self.settings.base_url, issue_id);
    debug!(%url, account_id, "jira account update");

    let mut fields = serde_json::Map::new();
    fields.insert(self.settings.account_field.clone(), serde_json::json!(account_id));

    let outcome = self
      .agent
      .put(&url)
      .set("Accept", "application/json")
      .set("Authorization", &self.auth)
      .send_json(serde_json::json!({ "fields": fields }));

    match outcome {
      Ok(_) => Ok(()),
      Err(ureq::Error::Status(code, resp)) => {
        let body = resp.into_string().unwrap_or_default();
        anyhow::bail!("updating issue {issue_id} failed with HTTP {code}: {}", body.trim())
      }
      Err(err) => Err(anyhow::Error::new(err).context(format!("updating issue {issue_id}"))),
    }
  }

  fn search_issues(&self, jql: &str, start_at: usize, max_results: usize) -> Result<Vec<Issue>> {
    let url = format!("{}/rest/api/3/search", self.settings.base_url);
    debug!(%jql, start_at, max_results, "jira search");

    let outcome = self
      .agent
      .get(&url)
      .set("Accept", "application/json")
      .set("Authorization", &self.auth)
      .query("jql", jql)
      .query("startAt", &start_at.to_string())
      .query("maxResults", &max_results.to_string())
      .query("fields", &format!("summary,{}", self.settings.account_field))
      .call();

    let v = read_json(outcome, "searching issues")?;
    Ok(v.fetch("issues").as_array().iter().map(|i| self.issue_from_json(i)).collect())
  }
}

// --- Lightweight in-memory caching wrapper ---
// Issues are immutable for the lifetime of one run; lookups are memoized by id and key.
pub struct CachedIssueTracker<'a> {
  inner: &'a dyn IssueTracker,
  issues: RefCell<HashMap<String, Issue>>,
}

impl<'a> CachedIssueTracker<'a> {
  pub fn new(inner: &'a dyn IssueTracker) -> Self {
    Self {
      inner,
      issues: RefCell::new(HashMap::new()),
    }
  }
}

impl IssueTracker for CachedIssueTracker<'_> {
  fn get_issue(&self, id_or_key: &str) -> Result<Issue> {
    if let Some(issue) = self.issues.borrow().get(id_or_key).cloned() {
      return Ok(issue);
    }

    let issue = self.inner.get_issue(id_or_key)?;
    let mut cache = self.issues.borrow_mut();
    cache.insert(issue.id.clone(), issue.clone());
    cache.insert(issue.key.clone(), issue.clone());
    cache.insert(id_or_key.to_string(), issue.clone());

    Ok(issue)
  }

  fn update_issue_account(&self, issue_id: &str, account_id: i64) -> Result<()> {
    self.inner.update_issue_account(issue_id, account_id)
  }

  fn search_issues(&self, jql: &str, start_at: usize, max_results: usize) -> Result<Vec<Issue>> {
    self.inner.search_issues(jql, start_at, max_results)
  }
}

/// Collect every page of a JQL search. Full pages are followed by `pause` to
/// stay under the tracker's rate limit.
pub fn search_all_issues(
  tracker: &dyn IssueTracker,
  jql: &str,
  batch_size: usize,
  pause: std::time::Duration,
) -> Result<Vec<Issue>> {
  let mut out = Vec::new();
  let mut start_at = 0;

  loop {
    let page = tracker.search_issues(jql, start_at, batch_size)?;
    let n = page.len();

    if n == 0 {
      break;
    }

    start_at += n;
    out.extend(page);

    if n < batch_size {
      break;
    }

    std::thread::sleep(pause);
  }

  Ok(out)
}
