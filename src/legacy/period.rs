// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Find the next unsubmitted weekly period on the legacy home page, creating one when none is open
// role: legacy/period
// inputs: LegacyTransport, LegacyPaths, today's date
// outputs: TimesheetPeriod (card id, Monday start, Sunday end)
// side_effects: GET of the home page; GET of a blank card (card id 0) creates a new period remotely
// invariants:
// - Options are scanned most-recent-first; the first without the submitted marker wins
// - start = end - 6 days; a valid period starts on Monday and ends on the following Sunday
// errors: Non-Monday/Sunday or non-7-day periods ⇒ SyncError::InvalidPeriod
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::debug;

use crate::config::LegacyPaths;
use crate::error::SyncError;
use crate::legacy::scrape::{extract_new_period, extract_period_options};
use crate::legacy::transport::LegacyTransport;
use crate::model::TimesheetPeriod;

pub fn locate_open_period(transport: &dyn LegacyTransport, paths: &LegacyPaths) -> Result<TimesheetPeriod> {
  let home = transport.get(&paths.home, &[])?;
  let options = extract_period_options(&home);
  debug!(count = options.len(), "timesheet periods listed");

  if let Some(open) = options.iter().rev().find(|o| !o.is_submitted()) {
    let end = open
      .end_date()
      .with_context(|| format!("no end date in timesheet option {:?}", open.label))?;

    return Ok(TimesheetPeriod {
      card_id: open.card_id.clone(),
      start: end - Duration::days(6),
      end,
    });
  }

  println!("Creating a new timesheet...");
  let page = transport.get(&paths.timesheet_entry, &[("TimeCard_ID", "0")])?;
  let (card_id, end) = extract_new_period(&page).context("reading the newly created timesheet")?;

  Ok(TimesheetPeriod {
    card_id,
    start: end - Duration::days(6),
    end,
  })
}

pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
  let invalid = |reason| SyncError::InvalidPeriod { start, end, reason };

  if start.weekday() != Weekday::Mon {
    return Err(invalid("start date must be a Monday").into());
  }

  if end.weekday() != Weekday::Sun {
    return Err(invalid("end date must be a Sunday").into());
  }

  if (end - start).num_days() != 6 {
    return Err(invalid("both dates must be within the same week").into());
  }

  Ok(())
}

/// Nothing left to submit: the period ends in the future and outside the current week.
pub fn is_caught_up(period: &TimesheetPeriod, today: NaiveDate) -> bool {
  period.end > today && period.end.iso_week() != today.iso_week()
}
