// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Snap raw entry durations onto the 15-minute timesheet grid
// role: entries/duration
// inputs: Minutes between start and stop of one raw entry; start/stop timestamps
// outputs: Normalized minutes (multiple of 15, possibly 0)
// invariants:
// - normalize_minutes(m) % 15 == 0 and is idempotent
// - 2 < m < 15 always snaps to 15
// - an entry whose start and stop fall on different calendar dates is rejected
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDateTime};

use crate::error::SyncError;

pub const GRANULARITY_MINUTES: u32 = 15;

/// Round to the timesheet grid: short entries become 15, longer ones round up
/// only when more than 5 minutes past a quarter.
pub fn normalize_minutes(minutes: u32) -> u32 {
  if minutes > 2 && minutes < GRANULARITY_MINUTES {
    return GRANULARITY_MINUTES;
  }

  let rem = minutes % GRANULARITY_MINUTES;
  let floored = minutes - rem;

  if rem > 5 {
    floored + GRANULARITY_MINUTES
  } else {
    floored
  }
}

/// Parse an entry timestamp. Offsets are honored as written (the local wall
/// clock of the source); bare `YYYY-MM-DDTHH:MM[:SS]` is accepted as-is.
pub fn parse_entry_timestamp(raw: &str) -> Option<NaiveDateTime> {
  let raw = raw.trim();

  if let Ok(dt) = DateTime::<FixedOffset>::parse_from_rfc3339(raw) {
    return Some(dt.naive_local());
  }

  NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
    .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
    .ok()
}

/// Normalized minutes between two timestamps on the same calendar date.
pub fn entry_minutes(start: NaiveDateTime, stop: NaiveDateTime) -> Result<u32> {
  if start.date() != stop.date() || stop < start {
    return Err(
      SyncError::InvalidEntryRange {
        start: start.to_string(),
        stop: stop.to_string(),
      }
      .into(),
    );
  }

  let minutes = (stop - start).num_minutes();
  let minutes = u32::try_from(minutes).unwrap_or(u32::MAX);

  Ok(normalize_minutes(minutes))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ts(s: &str) -> NaiveDateTime {
    parse_entry_timestamp(s).unwrap()
  }

  #[test]
  fn short_entries_snap_to_quarter() {
    assert_eq!(normalize_minutes(3), 15);
    assert_eq!(normalize_minutes(8), 15);
    assert_eq!(normalize_minutes(14), 15);
  }

  #[test]
  fn noise_is_discarded() {
    assert_eq!(normalize_minutes(0), 0);
    assert_eq!(normalize_minutes(1), 0);
    assert_eq!(normalize_minutes(2), 0);
  }

  #[test]
  fn five_minute_mark_boundary() {
    assert_eq!(normalize_minutes(20), 15);
    assert_eq!(normalize_minutes(21), 30);
    assert_eq!(normalize_minutes(65), 60);
    assert_eq!(normalize_minutes(66), 75);
  }

  #[test]
  fn eight_minute_entry_becomes_quarter_hour() {
    let m = entry_minutes(ts("2024-04-01T09:00"), ts("2024-04-01T09:08")).unwrap();
    assert_eq!(m, 15);
  }

  #[test]
  fn seconds_are_truncated_before_rounding() {
    let m = entry_minutes(ts("2024-04-01T09:00:00+02:00"), ts("2024-04-01T09:20:59+02:00")).unwrap();
    assert_eq!(m, 15);
  }

  #[test]
  fn cross_date_entry_is_rejected() {
    let err = entry_minutes(ts("2024-04-01T23:30"), ts("2024-04-02T00:30")).unwrap_err();
    assert!(matches!(
      err.downcast_ref::<SyncError>(),
      Some(SyncError::InvalidEntryRange { .. })
    ));
  }

  #[test]
  fn timestamps_keep_source_wall_clock() {
    let t = ts("2024-04-01T23:30:00-05:00");
    assert_eq!(t.to_string(), "2024-04-01 23:30:00");
  }
}
