// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Drive the weekly submission loop: locate period → confirm → aggregate → resolve accounts → build rows → save → submit
// role: processing/orchestrator
// inputs: SubmitContext (collaborators, task mapping, author id), account cache, today's date
// outputs: DriverOutcome; timesheets saved and submitted in the legacy system
// side_effects: Remote reads and writes through every collaborator; operator prompts; stdout narration
// invariants:
// - Every period is rebuilt from freshly searched worklogs; nothing from an earlier attempt is reused
// - save strictly precedes submit; a failure between them leaves the period open for the next run
// - Declining a period ends the run successfully
// - A period located again right after its submit is a stuck submission and stops the loop
// errors: Operator aborts surface as SyncError::Aborted; all other failures propagate unchanged
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::{Result, bail};
use chrono::NaiveDate;
use tracing::info;

use crate::cache::AccountProjectCache;
use crate::classify::TaskMappingTable;
use crate::clients::jira::IssueTracker;
use crate::clients::tempo::WorklogApi;
use crate::config::LegacyPaths;
use crate::entries::aggregate::{AccountResolver, fold_worklogs, group_by_project_and_task};
use crate::legacy::form::build_timesheet_fields;
use crate::legacy::period::{is_caught_up, locate_open_period, validate_date_range};
use crate::legacy::projects::ProjectResolver;
use crate::legacy::submit::{fetch_blank_form, save_timesheet, submit_timesheet};
use crate::legacy::transport::LegacyTransport;
use crate::model::{FormFieldSet, TimesheetPeriod};
use crate::prompt::Prompt;

pub struct SubmitContext<'a> {
  pub transport: &'a dyn LegacyTransport,
  pub paths: &'a LegacyPaths,
  pub tracker: &'a dyn IssueTracker,
  pub worklogs: &'a dyn WorklogApi,
  pub prompt: &'a dyn Prompt,
  pub mapping: &'a TaskMappingTable,
  pub author_id: &'a str,
  /// Answer every per-week confirmation with yes.
  pub assume_yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOutcome {
  CaughtUp { submitted: usize },
  Declined { submitted: usize },
}

pub fn process_weeks(ctx: &SubmitContext<'_>, cache: &mut AccountProjectCache, today: NaiveDate) -> Result<DriverOutcome> {
  let mut submitted = 0;
  let mut last_card: Option<String> = None;

  loop {
    let period = locate_open_period(ctx.transport, ctx.paths)?;

    if last_card.as_deref() == Some(period.card_id.as_str()) {
      bail!("timesheet {} still open after submit", period.card_id);
    }

    if is_caught_up(&period, today) {
      println!("Nothing more to submit");
      return Ok(DriverOutcome::CaughtUp { submitted });
    }

    let question = format!("Do you want to create a timesheet for week {} - {}?", period.start, period.end);
    if !ctx.assume_yes && !ctx.prompt.confirm(&question, true)? {
      println!("Exiting...");
      return Ok(DriverOutcome::Declined { submitted });
    }

    submit_period(ctx, cache, &period)?;
    submitted += 1;
    last_card = Some(period.card_id);
  }
}

pub fn submit_period(ctx: &SubmitContext<'_>, cache: &mut AccountProjectCache, period: &TimesheetPeriod) -> Result<FormFieldSet> {
  println!("Creating timesheet for week {} - {}", period.start, period.end);
  validate_date_range(period.start, period.end)?;

  println!("Fetching worklogs...");
  let worklogs = ctx.worklogs.search_worklogs(ctx.author_id, period.start, period.end)?;
  info!(count = worklogs.len(), card_id = %period.card_id, "worklogs for period");

  let accounts = AccountResolver::new(ctx.tracker, ctx.prompt);
  let buckets = fold_worklogs(&worklogs, &accounts)?;

  let mut projects = ProjectResolver::load(ctx.transport, ctx.paths, ctx.prompt)?;
  let account_projects = projects.resolve_all(buckets.keys().map(String::as_str), cache)?;
  let grouped = group_by_project_and_task(&buckets, &account_projects, ctx.tracker, ctx.mapping)?;

  let baseline = fetch_blank_form(ctx.transport, ctx.paths, &period.card_id)?;
  let fields = build_timesheet_fields(&baseline, period, &grouped, ctx.mapping)?;

  println!("Saving timesheet...");
  save_timesheet(ctx.transport, ctx.paths, &fields)?;

  println!("Submitting timesheet...");
  submit_timesheet(ctx.transport, ctx.paths, &fields)?;

  println!(
    "Timesheet for week {} - {} submitted ({} hours)",
    period.start,
    period.end,
    fields.get("totHours1").unwrap_or("0.00")
  );

  Ok(fields)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::legacy::submit::{RECALCULATE_FIELD, SUBMIT_FIELD};
  use crate::prompt::ScriptedPrompt;
  use crate::testutil::{FakeTracker, FakeTransport, FakeWorklogs};

  const HOME: &str = include_str!("../tests/fixtures/legacy/home.html");
  const BLANK: &str = include_str!("../tests/fixtures/legacy/blank_timesheet.html");
  const PROJECTS: &str = include_str!("../tests/fixtures/legacy/projects.html");
  const SEARCH_ONE: &str = include_str!("../tests/fixtures/legacy/search_single.html");

  fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
  }

  fn home_after_submit() -> String {
    HOME.replace(
      "<option value=\"88231\">14/04/2024</option>",
      "<option value=\"88231\">14/04/2024 (Submitted )</option>\n<option value=\"88300\">21/04/2024</option>",
    )
  }

  fn mapping() -> TaskMappingTable {
    serde_json::from_value(serde_json::json!({
      "issues": { "OPS-3": "N0001" },
      "projects": {},
      "default": "N0009",
      "task_names": { "N0001": "Support", "N0009": "General" }
    }))
    .unwrap()
  }

  fn scratch_cache() -> (tempfile::TempDir, AccountProjectCache) {
    let td = tempfile::TempDir::new().unwrap();
    let cache = AccountProjectCache::load(&td.path().join("cache.json")).unwrap();
    (td, cache)
  }

  fn transport(paths: &LegacyPaths) -> FakeTransport {
    FakeTransport::new()
      .on_get(&paths.home, HOME)
      .on_get(&paths.home, home_after_submit())
      .on_get(&paths.projects, PROJECTS)
      .on_get(&paths.timesheet_entry, BLANK)
      .on_post(&paths.projects_search, SEARCH_ONE)
      .on_post(&paths.projects_add, "<html></html>")
      .on_post(&paths.timesheet_proc, "<html>saved</html>")
  }

  #[test]
  fn submits_open_week_then_stops_when_caught_up() {
    let paths = LegacyPaths::default();
    let transport = transport(&paths);
    let tracker = FakeTracker::new()
      .with_issue("1", "ABC-1", Some("01-123456 Client Project"))
      .with_issue("3", "OPS-3", Some("12345678 Internal Tools"));
    let worklogs = FakeWorklogs::new()
      .with_worklog("1", d(8), 900)
      .with_worklog("1", d(9), 3600)
      .with_worklog("3", d(9), 1800)
      .with_worklog("3", d(20), 3600);
    let prompt = ScriptedPrompt::new(["y"]);
    let mapping = mapping();
    let (_td, mut cache) = scratch_cache();

    let ctx = SubmitContext {
      transport: &transport,
      paths: &paths,
      tracker: &tracker,
      worklogs: &worklogs,
      prompt: &prompt,
      mapping: &mapping,
      author_id: "acc-1",
      assume_yes: false,
    };

    let outcome = process_weeks(&ctx, &mut cache, d(14)).unwrap();
    assert_eq!(outcome, DriverOutcome::CaughtUp { submitted: 1 });
    assert_eq!(worklogs.searches(), vec![("acc-1".to_string(), d(8), d(14))]);
    assert_eq!(cache.get("01-123456 Client Project"), Some("01-123456-01"));

    let procs: Vec<_> = transport
      .calls()
      .into_iter()
      .filter(|c| c.path == paths.timesheet_proc)
      .collect();
    assert_eq!(procs.len(), 2);
    assert!(procs[0].field(RECALCULATE_FIELD).is_some() && procs[0].field(SUBMIT_FIELD).is_none());
    assert!(procs[1].field(SUBMIT_FIELD).is_some() && procs[1].field(RECALCULATE_FIELD).is_none());

    let save = &procs[0];
    assert_eq!(save.field("TimeCardRowCount"), Some("2"));
    assert_eq!(save.field("r1_Projname"), Some("01-123456-01"));
    assert_eq!(save.field("r1_Taskname"), Some("N0009"));
    assert_eq!(save.field("r1_Monday"), Some("0.25"));
    assert_eq!(save.field("r1_Tuesday"), Some("1.00"));
    assert_eq!(save.field("r2_Projname"), Some("12345678"));
    assert_eq!(save.field("r2_Taskname"), Some("N0001"));
    assert_eq!(save.field("r2_Taskname_Dscr"), Some("Support"));
    assert_eq!(save.field("tot1_c4"), Some("1.50"));
    assert_eq!(save.field("totHours1"), Some("1.75"));
    assert_eq!(save.field("Emp_ID"), Some("4711"));
  }

  #[test]
  fn rejected_submit_stops_instead_of_reposting() {
    let paths = LegacyPaths::default();
    let transport = FakeTransport::new()
      .on_get(&paths.home, HOME)
      .on_get(&paths.projects, PROJECTS)
      .on_get(&paths.timesheet_entry, BLANK)
      .on_post(&paths.projects_search, SEARCH_ONE)
      .on_post(&paths.projects_add, "<html></html>")
      .on_post(&paths.timesheet_proc, "<html>Error: timesheet locked</html>");
    let tracker = FakeTracker::new().with_issue("1", "ABC-1", Some("01-123456 Client Project"));
    let worklogs = FakeWorklogs::new().with_worklog("1", d(8), 900);
    let prompt = ScriptedPrompt::new(Vec::<String>::new());
    let mapping = mapping();
    let (_td, mut cache) = scratch_cache();

    let ctx = SubmitContext {
      transport: &transport,
      paths: &paths,
      tracker: &tracker,
      worklogs: &worklogs,
      prompt: &prompt,
      mapping: &mapping,
      author_id: "acc-1",
      assume_yes: true,
    };

    let err = process_weeks(&ctx, &mut cache, d(14)).unwrap_err();
    assert!(format!("{err}").contains("timesheet 88231 still open after submit"));
    assert_eq!(transport.posts_to(&paths.timesheet_proc), 2);
  }

  #[test]
  fn declining_ends_without_writes() {
    let paths = LegacyPaths::default();
    let transport = transport(&paths);
    let tracker = FakeTracker::new();
    let worklogs = FakeWorklogs::new();
    let prompt = ScriptedPrompt::new(["n"]);
    let mapping = mapping();
    let (_td, mut cache) = scratch_cache();

    let ctx = SubmitContext {
      transport: &transport,
      paths: &paths,
      tracker: &tracker,
      worklogs: &worklogs,
      prompt: &prompt,
      mapping: &mapping,
      author_id: "acc-1",
      assume_yes: false,
    };

    assert_eq!(
      process_weeks(&ctx, &mut cache, d(14)).unwrap(),
      DriverOutcome::Declined { submitted: 0 }
    );
    assert_eq!(transport.posts_to(&paths.timesheet_proc), 0);
    assert!(worklogs.searches().is_empty());
  }

  #[test]
  fn future_week_means_nothing_to_do() {
    let paths = LegacyPaths::default();
    let transport = transport(&paths);
    let tracker = FakeTracker::new();
    let worklogs = FakeWorklogs::new();
    let prompt = ScriptedPrompt::new(Vec::<String>::new());
    let mapping = mapping();
    let (_td, mut cache) = scratch_cache();

    let ctx = SubmitContext {
      transport: &transport,
      paths: &paths,
      tracker: &tracker,
      worklogs: &worklogs,
      prompt: &prompt,
      mapping: &mapping,
      author_id: "acc-1",
      assume_yes: true,
    };

    assert_eq!(
      process_weeks(&ctx, &mut cache, d(3)).unwrap(),
      DriverOutcome::CaughtUp { submitted: 0 }
    );
    assert!(prompt.asked().is_empty());
  }
}
