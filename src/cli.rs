// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Command-line surface and its normalization into an EffectiveConfig
// role: cli/config
// inputs: argv via clap derive
// outputs: EffectiveConfig with one resolved Action
// invariants:
// - At most one window selection per command; none means ask interactively
// - --since and --until come as a pair for import
// - The account cache defaults to <debug-dir>/jira_account_mapping.json
// errors: Ambiguous or half-specified windows are rejected before any IO
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::window::WindowSpec;

pub const DEFAULT_TASK_MAPPING: &str = "jira_itime_task_mapping.json";
pub const ACCOUNT_CACHE_FILE: &str = "jira_account_mapping.json";

#[derive(Parser, Debug)]
#[command(
    name = "timecard-sync",
    version,
    about = "Import tracked time as worklogs and submit weekly timesheets to the legacy timesheet system",
    long_about = None
)]
pub struct Cli {
  #[command(subcommand)]
  pub command: Option<Command>,

  /// Directory for parsed entries, the account cache and captured pages
  #[arg(long, global = true, default_value = "debug")]
  pub debug_dir: PathBuf,

  /// Save every timesheet-system response under the debug directory
  #[arg(long, global = true)]
  pub debug_html: bool,

  /// Emit a troff man page to stdout (internal; for packaging)
  #[arg(long, hide = true)]
  pub gen_man: bool,

  /// Override the "now" instant for window and week calculations (hidden; tests only)
  #[arg(long = "now-override", global = true, hide = true)]
  pub now_override: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Import time entries from the time tracker as worklogs
  Import {
    /// Calendar month, e.g. 2024-04
    #[arg(long)]
    month: Option<String>,

    /// Window phrase, e.g. "last week" or "this month"
    #[arg(long = "for")]
    for_str: Option<String>,

    /// Start date (YYYY-MM-DD); must be paired with --until
    #[arg(long, alias = "start")]
    since: Option<String>,

    /// End date (YYYY-MM-DD, exclusive); must be paired with --since
    #[arg(long, alias = "end")]
    until: Option<String>,

    /// Parse and write the parsed entries without posting worklogs
    #[arg(long)]
    dry_run: bool,
  },

  /// Fill, save and submit every open weekly timesheet
  Submit {
    /// Task mapping JSON (issues, projects, default, task_names)
    #[arg(long, default_value = DEFAULT_TASK_MAPPING)]
    task_mapping: PathBuf,

    /// Account → project cache (default: <debug-dir>/jira_account_mapping.json)
    #[arg(long)]
    account_cache: Option<PathBuf>,

    /// Do not ask before each week
    #[arg(long, short = 'y')]
    yes: bool,
  },

  /// Move issues with recent worklogs from one account to another
  UpdateAccounts {
    /// JSON object mapping old account keys to new account keys
    #[arg(long, default_value = "account_update_mapping.json")]
    mapping: PathBuf,

    /// Window phrase; only its start date is used
    #[arg(long = "for")]
    for_str: Option<String>,

    /// Only issues with a worklog after this date (YYYY-MM-DD)
    #[arg(long)]
    since: Option<String>,
  },

  /// Read a password (no echo on a terminal, first line when piped) and print it base64 encoded
  EncodePassword,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinceSpec {
  Date(String),
  Phrase(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
  Import { window: Option<WindowSpec>, dry_run: bool },
  Submit { task_mapping: PathBuf, account_cache: PathBuf, assume_yes: bool },
  UpdateAccounts { mapping: PathBuf, since: Option<SinceSpec> },
  EncodePassword,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EffectiveConfig {
  pub action: Action,
  pub debug_dir: PathBuf,
  pub debug_html: bool,
  pub now_override: Option<String>,
}

fn import_window(
  month: Option<String>,
  for_str: Option<String>,
  since: Option<String>,
  until: Option<String>,
) -> Result<Option<WindowSpec>> {
  let window = match (month, for_str, since, until) {
    (Some(ym), None, None, None) => Some(WindowSpec::Month { ym }),
    (None, Some(phrase), None, None) => Some(WindowSpec::ForPhrase { phrase }),
    (None, None, Some(since), Some(until)) => Some(WindowSpec::SinceUntil { since, until }),
    (None, None, None, None) => None,
    (None, None, Some(_), None) | (None, None, None, Some(_)) => bail!("--since and --until must be given together"),
    _ => bail!("Ambiguous time selection: choose only one of --month | --for | --since/--until"),
  };

  Ok(window)
}

pub fn normalize(cli: Cli) -> Result<EffectiveConfig> {
  let Some(command) = cli.command else {
    bail!("Provide a command: import, submit, update-accounts or encode-password");
  };

  let action = match command {
    Command::Import {
      month,
      for_str,
      since,
      until,
      dry_run,
    } => Action::Import {
      window: import_window(month, for_str, since, until)?,
      dry_run,
    },
    Command::Submit {
      task_mapping,
      account_cache,
      yes,
    } => Action::Submit {
      task_mapping,
      account_cache: account_cache.unwrap_or_else(|| cli.debug_dir.join(ACCOUNT_CACHE_FILE)),
      assume_yes: yes,
    },
    Command::UpdateAccounts { mapping, for_str, since } => {
      let since = match (for_str, since) {
        (Some(p), None) => Some(SinceSpec::Phrase(p)),
        (None, Some(d)) => Some(SinceSpec::Date(d)),
        (None, None) => None,
        (Some(_), Some(_)) => bail!("Ambiguous time selection: choose only one of --for | --since"),
      };
      Action::UpdateAccounts { mapping, since }
    }
    Command::EncodePassword => Action::EncodePassword,
  };

  Ok(EffectiveConfig {
    action,
    debug_dir: cli.debug_dir,
    debug_html: cli.debug_html,
    now_override: cli.now_override,
  })
}
