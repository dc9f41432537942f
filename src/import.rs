// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Import raw time entries as worklogs: tag, snap durations, persist the parsed list, then post
// role: processing/import
// inputs: TimeEntrySource, IssueTracker, WorklogApi, Prompt, ImportOptions (window, author, debug dir, dry run)
// outputs: <debug-dir>/toggl-parsed.json; ImportSummary; worklogs created remotely unless dry run
// side_effects: Writes the parsed file; prompts for unmatched tags and unknown issue keys; posts worklogs
// invariants:
// - Running timers are skipped; zero-minute entries are dropped
// - Parsed entries are sorted by date then start time
// - A replacement issue key given once is reused for the rest of the run
// - A rejected post is reported and counted; the import carries on
// errors: Cross-date entries abort with the entry named; blank manual tag or key ⇒ SyncError::Aborted
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::clients::jira::IssueTracker;
use crate::clients::tempo::WorklogApi;
use crate::clients::toggl::TimeEntrySource;
use crate::entries::duration::{entry_minutes, parse_entry_timestamp};
use crate::entries::tag::{clean_remainder, is_valid_tag, match_tag};
use crate::error::SyncError;
use crate::model::{NewWorklog, RawEntry, RawTimeEntry};
use crate::prompt::Prompt;

pub const PARSED_FILE_NAME: &str = "toggl-parsed.json";

#[derive(Debug, Clone)]
pub struct ImportOptions {
  pub from: NaiveDate,
  /// Exclusive.
  pub until: NaiveDate,
  pub author_id: String,
  pub debug_dir: PathBuf,
  pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
  pub parsed: usize,
  pub posted: usize,
  pub failed: usize,
}

fn ask_manual_tag(prompt: &dyn Prompt, entry: &RawEntry) -> Result<(String, Option<String>)> {
  println!(
    "Could not match issue tag for description: '{}' logged: {}",
    entry.description, entry.start
  );

  loop {
    let tag = prompt.ask("Enter tag manually (empty to terminate): ")?.replace(' ', "-");
    if tag.is_empty() {
      return Err(SyncError::Aborted.into());
    }
    if !is_valid_tag(&tag) {
      println!("Tag must look like ABC-123.");
      continue;
    }

    let description = prompt.ask("Enter tag description: ")?;
    return Ok((tag, clean_remainder(&description)));
  }
}

/// Tag and normalize one entry; None for running timers and entries that round to zero.
pub fn parse_entry(entry: &RawEntry, prompt: &dyn Prompt) -> Result<Option<RawTimeEntry>> {
  let Some(stop_raw) = entry.stop.as_deref() else {
    return Ok(None);
  };

  let (issue_tag, description) = match match_tag(&entry.description) {
    Some(m) => (m.tag, m.remainder),
    None => ask_manual_tag(prompt, entry)?,
  };

  let start = parse_entry_timestamp(&entry.start).with_context(|| format!("unreadable start {:?}", entry.start))?;
  let stop = parse_entry_timestamp(stop_raw).with_context(|| format!("unreadable stop {stop_raw:?}"))?;
  let minutes = entry_minutes(start, stop).with_context(|| format!("importing entry {:?}", entry.description))?;

  if minutes == 0 {
    debug!(description = %entry.description, "dropping entry that rounds to zero");
    return Ok(None);
  }

  Ok(Some(RawTimeEntry {
    issue_tag,
    occurred_on: start.date(),
    start_time: start.time(),
    minutes,
    description,
  }))
}

pub fn parse_entries(raw: &[RawEntry], prompt: &dyn Prompt) -> Result<Vec<RawTimeEntry>> {
  let mut out = Vec::new();
  for entry in raw {
    if let Some(parsed) = parse_entry(entry, prompt)? {
      out.push(parsed);
    }
  }

  out.sort_by_key(|e| (e.occurred_on, e.start_time));
  Ok(out)
}

pub fn write_parsed(entries: &[RawTimeEntry], debug_dir: &Path) -> Result<PathBuf> {
  std::fs::create_dir_all(debug_dir).with_context(|| format!("creating {}", debug_dir.display()))?;
  let path = debug_dir.join(PARSED_FILE_NAME);
  std::fs::write(&path, serde_json::to_vec_pretty(entries)?).with_context(|| format!("writing {}", path.display()))?;

  Ok(path)
}

/// Issue key → issue id, with operator corrections for keys the tracker does not know.
pub struct IssueKeyResolver<'a> {
  tracker: &'a dyn IssueTracker,
  prompt: &'a dyn Prompt,
  ids: HashMap<String, String>,
  replacements: HashMap<String, String>,
}

impl<'a> IssueKeyResolver<'a> {
  pub fn new(tracker: &'a dyn IssueTracker, prompt: &'a dyn Prompt) -> Self {
    Self {
      tracker,
      prompt,
      ids: HashMap::new(),
      replacements: HashMap::new(),
    }
  }

  pub fn issue_id(&mut self, tag: &str) -> Result<String> {
    let requested = tag.to_uppercase();
    let mut key = self.replacements.get(&requested).cloned().unwrap_or_else(|| requested.clone());

    loop {
      if let Some(id) = self.ids.get(&key) {
        return Ok(id.clone());
      }

      match self.tracker.get_issue(&key) {
        Ok(issue) => {
          self.ids.insert(key.clone(), issue.id.clone());
          self.ids.insert(issue.key.clone(), issue.id.clone());
          return Ok(issue.id);
        }
        Err(err) if matches!(err.downcast_ref::<SyncError>(), Some(SyncError::IssueNotFound(_))) => {
          println!("Issue with issue key {key} does not exist");
          let answer = self.prompt.ask("Enter issue key manually (empty to terminate): ")?;
          if answer.is_empty() {
            return Err(SyncError::Aborted.into());
          }
          key = answer.to_uppercase();
          self.replacements.insert(requested.clone(), key.clone());
        }
        Err(err) => return Err(err),
      }
    }
  }
}

pub fn post_entries(
  entries: &[RawTimeEntry],
  keys: &mut IssueKeyResolver<'_>,
  worklogs: &dyn WorklogApi,
  author_id: &str,
) -> Result<(usize, usize)> {
  let mut posted = 0;
  let mut failed = 0;

  for e in entries {
    let description = e.description.clone().unwrap_or_default();
    println!(
      "Posting [{} {}] - {} - {}",
      e.occurred_on,
      e.start_time.format("%H:%M:%S"),
      e.issue_tag,
      description
    );

    let worklog = NewWorklog {
      issue_id: keys.issue_id(&e.issue_tag)?,
      author_id: author_id.to_string(),
      start_date: e.occurred_on,
      start_time: e.start_time,
      time_spent_seconds: u64::from(e.minutes) * 60,
      description,
    };

    match worklogs.post_worklog(&worklog) {
      Ok(()) => posted += 1,
      Err(err) => {
        println!("Error posting: {err:#}");
        failed += 1;
      }
    }
  }

  Ok((posted, failed))
}

pub fn run_import(
  source: &dyn TimeEntrySource,
  tracker: &dyn IssueTracker,
  worklogs: &dyn WorklogApi,
  prompt: &dyn Prompt,
  opts: &ImportOptions,
) -> Result<ImportSummary> {
  println!("Starting import of entries between {} and {}", opts.from, opts.until);

  let raw = source.fetch_raw_entries(opts.from, opts.until)?;
  let entries = parse_entries(&raw, prompt)?;
  let path = write_parsed(&entries, &opts.debug_dir)?;
  println!("Successfully parsed {} entries ({})", entries.len(), path.display());

  let mut summary = ImportSummary {
    parsed: entries.len(),
    ..ImportSummary::default()
  };

  if opts.dry_run {
    println!("Dry run: nothing posted");
    return Ok(summary);
  }

  println!("Posting worklogs...");
  let mut keys = IssueKeyResolver::new(tracker, prompt);
  let (posted, failed) = post_entries(&entries, &mut keys, worklogs, &opts.author_id)?;
  summary.posted = posted;
  summary.failed = failed;
  println!("Posted {posted} worklogs, {failed} failed");

  Ok(summary)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::prompt::ScriptedPrompt;
  use crate::testutil::{FakeTimeSource, FakeTracker, FakeWorklogs, raw_entry};

  fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
  }

  fn opts(dir: &Path, dry_run: bool) -> ImportOptions {
    ImportOptions {
      from: d(1),
      until: d(8),
      author_id: "acc-1".into(),
      debug_dir: dir.to_path_buf(),
      dry_run,
    }
  }

  #[test]
  fn eight_minutes_become_a_quarter_hour() {
    let prompt = ScriptedPrompt::new(Vec::<String>::new());
    let e = parse_entry(&raw_entry("ABC-12", "2024-04-01T09:00", Some("2024-04-01T09:08")), &prompt)
      .unwrap()
      .unwrap();
    assert_eq!(e.issue_tag, "ABC-12");
    assert_eq!(e.minutes, 15);
    assert_eq!(e.occurred_on, d(1));
    assert_eq!(e.description, None);
  }

  #[test]
  fn running_timer_and_zero_minutes_are_dropped() {
    let prompt = ScriptedPrompt::new(Vec::<String>::new());
    let raw = vec![
      raw_entry("ABC-1 running", "2024-04-01T09:00:00Z", None),
      raw_entry("ABC-1 blip", "2024-04-01T09:00:00Z", Some("2024-04-01T09:02:00Z")),
    ];
    assert!(parse_entries(&raw, &prompt).unwrap().is_empty());
  }

  #[test]
  fn unmatched_description_asks_until_tag_is_valid() {
    let prompt = ScriptedPrompt::new(["nope", "ops 7", "- call with client"]);
    let e = parse_entry(&raw_entry("Weekly call", "2024-04-02T10:00:00Z", Some("2024-04-02T11:00:00Z")), &prompt)
      .unwrap()
      .unwrap();
    assert_eq!(e.issue_tag, "ops-7");
    assert_eq!(e.description.as_deref(), Some("call with client"));
    assert_eq!(e.minutes, 60);
  }

  #[test]
  fn blank_manual_tag_aborts() {
    let prompt = ScriptedPrompt::new([""]);
    let err = parse_entry(&raw_entry("???", "2024-04-02T10:00:00Z", Some("2024-04-02T11:00:00Z")), &prompt).unwrap_err();
    assert!(crate::error::is_abort(&err));
  }

  #[test]
  fn cross_date_entry_is_fatal_and_named() {
    let prompt = ScriptedPrompt::new(Vec::<String>::new());
    let err = parse_entries(
      &[raw_entry("ABC-1 late", "2024-04-01T23:30:00Z", Some("2024-04-02T00:30:00Z"))],
      &prompt,
    )
    .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("ABC-1 late"));
    assert!(msg.contains("invalid date range"));
  }

  #[test]
  fn parsed_entries_are_sorted() {
    let prompt = ScriptedPrompt::new(Vec::<String>::new());
    let raw = vec![
      raw_entry("B-2", "2024-04-02T09:00:00Z", Some("2024-04-02T10:00:00Z")),
      raw_entry("A-1", "2024-04-01T14:00:00Z", Some("2024-04-01T15:00:00Z")),
      raw_entry("C-3", "2024-04-01T08:00:00Z", Some("2024-04-01T08:30:00Z")),
    ];
    let tags: Vec<String> = parse_entries(&raw, &prompt).unwrap().into_iter().map(|e| e.issue_tag).collect();
    assert_eq!(tags, vec!["C-3", "A-1", "B-2"]);
  }

  #[test]
  fn replacement_key_is_remembered() {
    let tracker = FakeTracker::new().with_issue("500", "ABC-5", None);
    let prompt = ScriptedPrompt::new(["abc-5"]);
    let mut keys = IssueKeyResolver::new(&tracker, &prompt);

    assert_eq!(keys.issue_id("abd-5").unwrap(), "500");
    assert_eq!(keys.issue_id("ABD-5").unwrap(), "500");
    assert_eq!(prompt.asked().len(), 1);
    assert_eq!(tracker.lookups(), 2);
  }

  #[test]
  fn import_posts_and_counts_failures() {
    let td = tempfile::TempDir::new().unwrap();
    let source = FakeTimeSource::new(vec![
      raw_entry("ABC-1 - review", "2024-04-01T09:00:00Z", Some("2024-04-01T10:10:00Z")),
      raw_entry("[ABC-2] fix", "2024-04-01T11:00:00Z", Some("2024-04-01T11:20:00Z")),
    ]);
    let tracker = FakeTracker::new()
      .with_issue("101", "ABC-1", None)
      .with_issue("102", "ABC-2", None);
    let worklogs = FakeWorklogs::new().rejecting("102");
    let prompt = ScriptedPrompt::new(Vec::<String>::new());

    let summary = run_import(&source, &tracker, &worklogs, &prompt, &opts(td.path(), false)).unwrap();
    assert_eq!(summary, ImportSummary { parsed: 2, posted: 1, failed: 1 });
    assert_eq!(source.windows(), vec![(d(1), d(8))]);

    let posted = worklogs.posted();
    assert_eq!(posted[0].issue_id, "101");
    assert_eq!(posted[0].time_spent_seconds, 75 * 60);
    assert_eq!(posted[0].description, "review");
    assert_eq!(posted[0].author_id, "acc-1");

    let written: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(td.path().join(PARSED_FILE_NAME)).unwrap()).unwrap();
    assert_eq!(written.as_array().unwrap().len(), 2);
  }

  #[test]
  fn dry_run_writes_but_does_not_post() {
    let td = tempfile::TempDir::new().unwrap();
    let source = FakeTimeSource::new(vec![raw_entry("ABC-1", "2024-04-01T09:00:00Z", Some("2024-04-01T10:00:00Z"))]);
    let tracker = FakeTracker::new();
    let worklogs = FakeWorklogs::new();
    let prompt = ScriptedPrompt::new(Vec::<String>::new());

    let summary = run_import(&source, &tracker, &worklogs, &prompt, &opts(td.path(), true)).unwrap();
    assert_eq!(summary.parsed, 1);
    assert!(worklogs.posted().is_empty());
    assert_eq!(tracker.lookups(), 0);
    assert!(td.path().join(PARSED_FILE_NAME).exists());
  }
}
