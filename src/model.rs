// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Define the data model shared by import, aggregation and timesheet submission
// role: model/types
// outputs: Serializable structs for raw entries, worklogs, issues, periods and scraped form fields
// invariants:
// - RawTimeEntry.minutes is a positive multiple of 15
// - TimesheetPeriod is only built from what the legacy system renders
// - FormFieldSet keeps first-insertion order; names are case-sensitive
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// One entry as delivered by the raw time-entry source, before tagging.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RawEntry {
  pub description: String,
  pub start: String,
  /// None while the timer is still running.
  pub stop: Option<String>,
}

/// A tagged, normalized block of time ready to be posted as a worklog.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RawTimeEntry {
  pub issue_tag: String,
  pub occurred_on: NaiveDate,
  pub start_time: NaiveTime,
  pub minutes: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

/// Worklog as returned by the aggregation service's search.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WorkLog {
  pub issue_id: String,
  pub start_date: NaiveDate,
  pub time_spent_seconds: u64,
}

/// Worklog to be created in the aggregation service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NewWorklog {
  pub issue_id: String,
  pub author_id: String,
  pub start_date: NaiveDate,
  pub start_time: NaiveTime,
  pub time_spent_seconds: u64,
  pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Issue {
  pub key: String,
  pub id: String,
  /// Rendered value of the account custom field, if the issue has one.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub account: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TimesheetPeriod {
  pub card_id: String,
  pub start: NaiveDate,
  pub end: NaiveDate,
}

/// Field name → value pairs posted back to the legacy form.
///
/// Insertion order is preserved so the POST body mirrors the scraped form;
/// overwriting a field keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFieldSet {
  fields: Vec<(String, String)>,
  index: HashMap<String, usize>,
}

impl FormFieldSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    let value = value.into();

    match self.index.get(&name) {
      Some(&pos) => self.fields[pos].1 = value,
      None => {
        self.index.insert(name.clone(), self.fields.len());
        self.fields.push((name, value));
      }
    }
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.index.get(name).map(|&pos| self.fields[pos].1.as_str())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.index.contains_key(name)
  }

  pub fn remove(&mut self, name: &str) -> Option<String> {
    let pos = self.index.remove(name)?;
    let (_, value) = self.fields.remove(pos);

    for slot in self.index.values_mut() {
      if *slot > pos {
        *slot -= 1;
      }
    }

    Some(value)
  }

  pub fn len(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  /// Borrowed pairs in the shape `ureq::Request::send_form` expects.
  pub fn as_pairs(&self) -> Vec<(&str, &str)> {
    self.iter().collect()
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFieldSet {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut set = FormFieldSet::new();
    for (k, v) in iter {
      set.set(k, v);
    }
    set
  }
}
