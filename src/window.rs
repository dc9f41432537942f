// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Resolve import/update windows from --month, --for phrases, --since/--until or an interactive menu
// role: windows/resolution
// inputs: WindowSpec or operator choice; today's date (overridable for tests)
// outputs: LabeledRange with date bounds (until exclusive)
// invariants:
// - Weeks start on Monday; months start on the 1st
// - since < until for every computed range
// errors: Malformed dates/months and unparseable phrases are reported with the offending input
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use two_timer::parse as parse_natural;

use crate::prompt::{Prompt, choose};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const PERIOD_CHOICES: [&str; 5] = ["This week", "Last week", "This month", "Last month", "Custom"];

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum WindowSpec {
  Month { ym: String },
  ForPhrase { phrase: String },
  SinceUntil { since: String, until: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledRange {
  pub label: String,
  pub since: NaiveDate,
  /// Exclusive.
  pub until: NaiveDate,
}

impl LabeledRange {
  fn new(label: impl Into<String>, since: NaiveDate, until: NaiveDate) -> Self {
    Self {
      label: label.into(),
      since,
      until,
    }
  }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).with_context(|| format!("invalid date {raw:?}, expected YYYY-MM-DD"))
}

pub fn month_bounds(year_month: &str) -> Result<(NaiveDate, NaiveDate)> {
  let parts: Vec<&str> = year_month.split('-').collect();

  if parts.len() != 2 {
    bail!("invalid --month, expected YYYY-MM");
  }
  let y: i32 = parts[0].parse().context("parsing year in --month")?;
  let m: u32 = parts[1].parse().context("parsing month in --month")?;

  if !(1..=12).contains(&m) {
    bail!("invalid month in --month");
  }
  let (next_y, next_m) = if m == 12 { (y + 1, 1) } else { (y, m + 1) };

  let start = NaiveDate::from_ymd_opt(y, m, 1).context("invalid --month")?;
  let end = NaiveDate::from_ymd_opt(next_y, next_m, 1).context("invalid --month")?;

  Ok((start, end))
}

pub fn compute_window(window: &WindowSpec, today: NaiveDate) -> Result<LabeledRange> {
  match window {
    WindowSpec::SinceUntil { since, until } => {
      let (s, u) = (parse_date(since)?, parse_date(until)?);
      if s >= u {
        bail!("--since must be before --until");
      }
      Ok(LabeledRange::new(format!("{s}..{u}"), s, u))
    }
    WindowSpec::Month { ym } => {
      let (s, u) = month_bounds(ym)?;
      Ok(LabeledRange::new(ym.clone(), s, u))
    }
    WindowSpec::ForPhrase { phrase } => for_phrase_bounds(phrase, today),
  }
}

// --- Calendar anchors ---

pub fn start_of_week(day: NaiveDate) -> NaiveDate {
  day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

pub fn start_of_month(day: NaiveDate) -> NaiveDate {
  day.with_day(1).unwrap_or(day)
}

fn next_month_start(day: NaiveDate) -> NaiveDate {
  let (y, m) = if day.month() == 12 { (day.year() + 1, 1) } else { (day.year(), day.month() + 1) };
  NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(day)
}

fn prev_month_start(day: NaiveDate) -> NaiveDate {
  start_of_month(start_of_month(day) - Duration::days(1))
}

fn named_range(name: &str, today: NaiveDate) -> Option<LabeledRange> {
  let range = match name {
    "this week" => {
      let s = start_of_week(today);
      LabeledRange::new(name, s, s + Duration::days(7))
    }
    "last week" => {
      let u = start_of_week(today);
      LabeledRange::new(name, u - Duration::days(7), u)
    }
    "this month" => LabeledRange::new(name, start_of_month(today), next_month_start(today)),
    "last month" => LabeledRange::new(name, prev_month_start(today), start_of_month(today)),
    "today" => LabeledRange::new(name, today, today + Duration::days(1)),
    "yesterday" => LabeledRange::new(name, today - Duration::days(1), today),
    _ => return None,
  };

  Some(range)
}

/// Range for a natural-language phrase. Common phrases are anchored to `today`;
/// anything else goes to two_timer, which reads the wall clock.
fn for_phrase_bounds(input: &str, today: NaiveDate) -> Result<LabeledRange> {
  let phrase = input.trim().to_lowercase();

  if let Some(range) = named_range(&phrase, today) {
    return Ok(range);
  }

  let (start, end, _) = parse_natural(&phrase, None)
    .map_err(|err| anyhow::anyhow!("cannot understand --for {input:?}: {err:?}"))?;

  let since = start.date();
  let mut until = end.date();
  if end.time() != chrono::NaiveTime::MIN || until == since {
    until += Duration::days(1);
  }

  Ok(LabeledRange::new(phrase, since, until))
}

/// Ask the operator which window to use.
pub fn choose_period(prompt: &dyn Prompt, title: &str, today: NaiveDate) -> Result<LabeledRange> {
  let idx = choose(prompt, title, &PERIOD_CHOICES)?;

  if let Some(range) = named_range(&PERIOD_CHOICES[idx].to_lowercase(), today) {
    return Ok(range);
  }

  let since = parse_date(&prompt.ask("Enter starting date (YYYY-MM-DD): ")?)?;
  let until = parse_date(&prompt.ask("Enter ending date (YYYY-MM-DD) (exclusive): ")?)?;
  if since >= until {
    bail!("starting date must be before ending date");
  }

  Ok(LabeledRange::new("custom", since, until))
}

/// Ask the operator for a start date only (ranges collapse to their first day).
pub fn choose_since(prompt: &dyn Prompt, title: &str, today: NaiveDate) -> Result<NaiveDate> {
  let idx = choose(prompt, title, &PERIOD_CHOICES)?;

  if let Some(range) = named_range(&PERIOD_CHOICES[idx].to_lowercase(), today) {
    return Ok(range.since);
  }

  parse_date(&prompt.ask("Enter starting date (YYYY-MM-DD): ")?)
}

/// Parse a `--now-override` string into a local DateTime.
/// Accepts RFC3339 (e.g. 2024-04-10T12:00:00Z) or a naive local timestamp
/// formatted as `%Y-%m-%dT%H:%M:%S`.
pub fn parse_now_override(s: Option<&str>) -> Option<DateTime<Local>> {
  s.and_then(|raw| {
    DateTime::parse_from_rfc3339(raw)
      .ok()
      .map(|dt| dt.with_timezone(&Local))
      .or_else(|| {
        chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
          .ok()
          .and_then(|ndt| ndt.and_local_timezone(Local).single())
      })
  })
}
