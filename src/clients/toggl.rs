// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Raw time-entry source collaborator (Toggl me/time_entries)
// role: clients/time-entry-source
// inputs: TogglSettings (API URL + token)
// outputs: RawEntry values (description, start, optional stop)
// side_effects: Network calls to the Toggl API
// invariants: Window bounds are sent as YYYY-MM-DD; running timers come back with stop = None
// errors: HTTP/transport failures propagate (no retries)
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::Result;
use chrono::NaiveDate;
use tracing::debug;

use crate::clients::{basic_auth, json_agent, read_json};
use crate::config::TogglSettings;
use crate::ext::serde_json::JsonFetch;
use crate::model::RawEntry;

// --- Trait seam for the raw time-entry source ---
pub trait TimeEntrySource {
  fn fetch_raw_entries(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RawEntry>>;
}

pub struct TogglHttpApi {
  agent: ureq::Agent,
  settings: TogglSettings,
}

impl TogglHttpApi {
  pub fn new(settings: TogglSettings) -> Self {
    Self {
      agent: json_agent(),
      settings,
    }
  }
}

pub fn raw_entry_from_json(v: &serde_json::Value) -> Option<RawEntry> {
  Some(RawEntry {
    description: v.fetch("description").to::<String>().unwrap_or_default(),
    start: v.fetch("start").to::<String>()?,
    stop: v.fetch("stop").to::<String>(),
  })
}

impl TimeEntrySource for TogglHttpApi {
  fn fetch_raw_entries(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<RawEntry>> {
    let url = format!("{}/me/time_entries", self.settings.api_url);
    debug!(%url, %from, %to, "toggl time entries");

    let outcome = self
      .agent
      .get(&url)
      .set("Content-Type", "application/json")
      .set("Authorization", &basic_auth(&self.settings.api_token, "api_token"))
      .query("start_date", &from.format("%Y-%m-%d").to_string())
      .query("end_date", &to.format("%Y-%m-%d").to_string())
      .call();
    let v = read_json(outcome, "fetching time entries")?;

    Ok(v.fetch("").as_array().iter().filter_map(raw_entry_from_json).collect())
  }
}
