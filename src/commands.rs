// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Wire settings, HTTP collaborators and the operator prompt into each command's pipeline
// role: orchestration/commands
// inputs: EffectiveConfig, environment settings, stdin (passwords read without echo on a terminal)
// outputs: Console narration; worklogs, timesheets or account updates in the remote systems
// side_effects: Network calls; debug directory writes; account cache persisted after every submit run
// invariants:
// - The task mapping is loaded and validated before any network call
// - The account cache is saved even when the weekly loop fails part-way
// errors: Missing settings, login failures and pipeline errors propagate with context
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::io::{BufRead, IsTerminal};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use crate::account_update::{SEARCH_PAUSE, load_account_map, update_accounts};
use crate::cache::AccountProjectCache;
use crate::classify::TaskMappingTable;
use crate::cli::{Action, EffectiveConfig, SinceSpec};
use crate::clients::jira::{CachedIssueTracker, JiraHttpApi};
use crate::clients::tempo::TempoHttpApi;
use crate::clients::toggl::TogglHttpApi;
use crate::config::{JiraSettings, LegacySettings, TempoSettings, TogglSettings, encode_password};
use crate::import::{ImportOptions, run_import};
use crate::legacy::transport::{HtmlDump, HttpTransport};
use crate::prompt::{ConsolePrompt, Prompt};
use crate::util::{effective_today, prepare_debug_dir};
use crate::week_processor::{DriverOutcome, SubmitContext, process_weeks};
use crate::window::{WindowSpec, choose_period, choose_since, compute_window, parse_date, parse_now_override};

pub fn run(cfg: &EffectiveConfig) -> Result<()> {
  let today = effective_today(parse_now_override(cfg.now_override.as_deref()));
  let prompt = ConsolePrompt;

  match &cfg.action {
    Action::Import { window, dry_run } => import(cfg, window.as_ref(), *dry_run, today, &prompt),
    Action::Submit {
      task_mapping,
      account_cache,
      assume_yes,
    } => submit(cfg, task_mapping, account_cache, *assume_yes, today, &prompt),
    Action::UpdateAccounts { mapping, since } => accounts(mapping, since.as_ref(), today, &prompt),
    Action::EncodePassword => encode_stdin_password(),
  }
}

fn import(cfg: &EffectiveConfig, window: Option<&WindowSpec>, dry_run: bool, today: NaiveDate, prompt: &dyn Prompt) -> Result<()> {
  let toggl = TogglSettings::from_env()?;
  let jira = JiraSettings::from_env()?;
  let tempo = TempoSettings::from_env()?;

  let range = match window {
    Some(w) => compute_window(w, today)?,
    None => choose_period(prompt, "Choose period to import", today)?,
  };
  info!(label = %range.label, since = %range.since, until = %range.until, "import window");

  prepare_debug_dir(&cfg.debug_dir)?;
  let opts = ImportOptions {
    from: range.since,
    until: range.until,
    author_id: jira.user_id.clone(),
    debug_dir: cfg.debug_dir.clone(),
    dry_run,
  };

  let jira_api = JiraHttpApi::new(jira);
  let tracker = CachedIssueTracker::new(&jira_api);
  let summary = run_import(
    &TogglHttpApi::new(toggl),
    &tracker,
    &TempoHttpApi::new(tempo),
    prompt,
    &opts,
  )?;
  info!(?summary, "import finished");

  Ok(())
}

fn submit(
  cfg: &EffectiveConfig,
  task_mapping: &Path,
  account_cache: &Path,
  assume_yes: bool,
  today: NaiveDate,
  prompt: &dyn Prompt,
) -> Result<()> {
  let mapping = TaskMappingTable::load(task_mapping)?;
  let jira = JiraSettings::from_env()?;
  let tempo = TempoSettings::from_env()?;
  let legacy = LegacySettings::from_env()?;

  prepare_debug_dir(&cfg.debug_dir)?;
  let dump = cfg.debug_html.then(|| HtmlDump::new(cfg.debug_dir.clone()));
  let transport = HttpTransport::new(&legacy, dump);
  println!("Logging into the timesheet system...");
  transport.login()?;
  info!(base_url = %transport.base_url(), "logged into the timesheet system");

  let mut cache = AccountProjectCache::load(account_cache)?;
  let author_id = jira.user_id.clone();
  let jira_api = JiraHttpApi::new(jira);
  let tracker = CachedIssueTracker::new(&jira_api);
  let worklogs = TempoHttpApi::new(tempo);

  let ctx = SubmitContext {
    transport: &transport,
    paths: &legacy.paths,
    tracker: &tracker,
    worklogs: &worklogs,
    prompt,
    mapping: &mapping,
    author_id: &author_id,
    assume_yes,
  };

  let outcome = process_weeks(&ctx, &mut cache, today);
  let saved = cache.save();

  match outcome? {
    DriverOutcome::CaughtUp { submitted } | DriverOutcome::Declined { submitted } => {
      info!(submitted, cache = %cache.path().display(), "submit finished");
    }
  }
  saved
}

fn accounts(mapping: &Path, since: Option<&SinceSpec>, today: NaiveDate, prompt: &dyn Prompt) -> Result<()> {
  let account_map = load_account_map(mapping)?;
  let jira = JiraSettings::from_env()?;
  let tempo = TempoSettings::from_env()?;

  let since = match since {
    Some(SinceSpec::Date(raw)) => parse_date(raw)?,
    Some(SinceSpec::Phrase(phrase)) => compute_window(&WindowSpec::ForPhrase { phrase: phrase.clone() }, today)?.since,
    None => choose_since(prompt, "Select a date", today)?,
  };

  let tracker = JiraHttpApi::new(jira);
  let updated = update_accounts(&account_map, since, &tracker, &TempoHttpApi::new(tempo), SEARCH_PAUSE)?;
  println!("Updated {updated} issues");

  Ok(())
}

fn encode_stdin_password() -> Result<()> {
  let stdin = std::io::stdin();
  let plain = if stdin.is_terminal() {
    eprint!("Password: ");
    rpassword::read_password().context("reading password from the terminal")?
  } else {
    password_line(&mut stdin.lock())?
  };

  println!("{}", encode_password(&plain));
  Ok(())
}

/// Piped input: the first line, without its line ending.
fn password_line(input: &mut dyn BufRead) -> Result<String> {
  let mut line = String::new();
  input.read_line(&mut line).context("reading password from stdin")?;
  Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
