// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Worklog-aggregation collaborator: worklog search/post and account key → id resolution
// role: clients/worklog-service
// inputs: TempoSettings (API URL + bearer token)
// outputs: WorkLog values; account id map
// side_effects: Network calls to the Tempo REST API
// invariants:
// - search_worklogs follows metadata.next until exhausted, so callers see every worklog in the window
// - dates on the wire are YYYY-MM-DD
// errors: HTTP/transport failures propagate (no retries)
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::clients::{json_agent, read_json};
use crate::config::TempoSettings;
use crate::ext::serde_json::JsonFetch;
use crate::model::{NewWorklog, WorkLog};

pub const TEMPO_DATE_FORMAT: &str = "%Y-%m-%d";

// --- Trait seam for the worklog service ---
pub trait WorklogApi {
  fn search_worklogs(&self, author_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<WorkLog>>;
  fn post_worklog(&self, worklog: &NewWorklog) -> Result<()>;
  fn account_ids_by_key(&self, keys: &[String]) -> Result<HashMap<String, i64>>;
}

pub struct TempoHttpApi {
  agent: ureq::Agent,
  settings: TempoSettings,
}

impl TempoHttpApi {
  pub fn new(settings: TempoSettings) -> Self {
    Self {
      agent: json_agent(),
      settings,
    }
  }

  fn bearer(&self) -> String {
    format!("Bearer {}", self.settings.api_token)
  }
}

/// Map one search result onto a WorkLog; entries missing an issue id or date are skipped.
pub fn worklog_from_json(v: &serde_json::Value) -> Option<WorkLog> {
  let issue_id = v.fetch("issue.id").to_id_string()?;
  let raw_date = v.fetch("startDate").to::<String>()?;
  let start_date = NaiveDate::parse_from_str(raw_date.get(..10).unwrap_or(raw_date.as_str()), TEMPO_DATE_FORMAT).ok()?;

  Some(WorkLog {
    issue_id,
    start_date,
    time_spent_seconds: v.fetch("timeSpentSeconds").to::<u64>().unwrap_or(0),
  })
}

impl WorklogApi for TempoHttpApi {
  fn search_worklogs(&self, author_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<WorkLog>> {
    let body = serde_json::json!({
      "authorIds": [author_id],
      "from": from.format(TEMPO_DATE_FORMAT).to_string(),
      "to": to.format(TEMPO_DATE_FORMAT).to_string(),
    });

    let mut url = format!("{}/worklogs/search?limit=1000", self.settings.api_url);
    let mut out = Vec::new();

    loop {
      debug!(%url, "tempo worklog search");
      let outcome = self
        .agent
        .post(&url)
        .set("Authorization", &self.bearer())
        .set("Accept", "application/json")
        .send_json(body.clone());
      let v = read_json(outcome, "searching worklogs")?;

      for item in v.fetch("results").as_array() {
        match worklog_from_json(item) {
          Some(w) => out.push(w),
          None => warn!(?item, "skipping worklog without issue id or start date"),
        }
      }

      match v.fetch("metadata.next").to::<String>() {
        Some(next) if !next.is_empty() => url = next,
        _ => break,
      }
    }

    Ok(out)
  }

  fn post_worklog(&self, worklog: &NewWorklog) -> Result<()> {
    let issue_id: serde_json::Value = worklog
      .issue_id
      .parse::<i64>()
      .map(serde_json::Value::from)
      .unwrap_or_else(|_| serde_json::Value::from(worklog.issue_id.clone()));

    let body = serde_json::json!({
      "authorAccountId": worklog.author_id,
      "description": worklog.description,
      "issueId": issue_id,
      "timeSpentSeconds": worklog.time_spent_seconds,
      "startDate": worklog.start_date.format(TEMPO_DATE_FORMAT).to_string(),
      "startTime": worklog.start_time.format("%H:%M:%S").to_string(),
    });

    let url = format!("{}/worklogs", self.settings.api_url);
    debug!(%url, issue = %worklog.issue_id, "tempo worklog post");

    let outcome = self
      .agent
      .post(&url)
      .set("Authorization", &self.bearer())
      .set("Accept", "application/json")
      .send_json(body);

    read_json(outcome, "posting worklog").map(|_| ())
  }

  fn account_ids_by_key(&self, keys: &[String]) -> Result<HashMap<String, i64>> {
    let url = format!("{}/accounts/search?limit=500", self.settings.api_url);
    debug!(%url, count = keys.len(), "tempo account search");

    let outcome = self
      .agent
      .post(&url)
      .set("Authorization", &self.bearer())
      .set("Accept", "application/json")
      .send_json(serde_json::json!({ "keys": keys }));
    let v = read_json(outcome, "searching accounts").context("resolving account keys")?;

    let mut map = HashMap::new();
    for account in v.fetch("results").as_array() {
      if let (Some(key), Some(id)) = (account.fetch("key").to::<String>(), account.fetch("id").to::<i64>()) {
        map.insert(key, id);
      }
    }

    Ok(map)
  }
}
