// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Lay out project/task/day seconds as the legacy timesheet's numbered rows, weekday cells and totals
// role: legacy/form
// inputs: Blank-form baseline, TimesheetPeriod, project → task → date → seconds, TaskMappingTable
// outputs: Complete FormFieldSet ready for save/submit
// invariants:
// - One row per (project, task), numbered from 1; every weekday cell is written, empty days as "0.00"
// - Cells are hours rounded half-up to 2 decimals; row, column and grand totals are sums of the rounded cells
// - Σ column totals == grand total, for any input
// - No remote IO
// errors: Invalid period ⇒ SyncError::InvalidPeriod; task without a name ⇒ SyncError::UnnamedTask
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::Result;
use chrono::NaiveDate;
use tracing::warn;

use crate::classify::TaskMappingTable;
use crate::entries::aggregate::ProjectTaskDays;
use crate::error::SyncError;
use crate::legacy::period::validate_date_range;
use crate::legacy::submit::{RECALCULATE_FIELD, SUBMIT_FIELD};
use crate::model::{FormFieldSet, TimesheetPeriod};

pub const WEEK_DAYS: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

/// Weekday columns are numbered from 3 in the total field names.
const FIRST_DAY_COLUMN: usize = 3;

/// Seconds → hundredths of an hour, half-up.
pub fn centi_hours(seconds: u64) -> u64 {
  (seconds * 100 + 1800) / 3600
}

pub fn format_centi_hours(centi: u64) -> String {
  format!("{}.{:02}", centi / 100, centi % 100)
}

pub fn format_seconds(seconds: u64) -> String {
  format_centi_hours(centi_hours(seconds))
}

fn day_index(period: &TimesheetPeriod, date: NaiveDate) -> Option<usize> {
  let offset = (date - period.start).num_days();
  (0..7).contains(&offset).then_some(offset as usize)
}

pub fn build_timesheet_fields(
  baseline: &FormFieldSet,
  period: &TimesheetPeriod,
  grouped: &ProjectTaskDays,
  mapping: &TaskMappingTable,
) -> Result<FormFieldSet> {
  validate_date_range(period.start, period.end)?;

  let mut fields = baseline.clone();
  fields.remove(RECALCULATE_FIELD);
  fields.remove(SUBMIT_FIELD);

  let mut column_totals = [0u64; 7];
  let mut row = 0usize;

  for (project, tasks) in grouped {
    for (task, days) in tasks {
      row += 1;
      let prefix = format!("r{row}_");
      let name = mapping
        .task_name(task)
        .ok_or_else(|| SyncError::UnnamedTask(task.clone()))?;

      fields.set(format!("{prefix}PrjctCDName"), "");
      fields.set(format!("{prefix}Projname"), project.as_str());
      fields.set(format!("{prefix}Taskname"), task.as_str());
      fields.set(format!("{prefix}Taskname_Dscr"), name);

      let mut cells = [0u64; 7];
      for (date, secs) in days {
        match day_index(period, *date) {
          Some(i) => cells[i] += secs,
          None => warn!(%date, %project, %task, "skipping time outside the timesheet week"),
        }
      }

      let mut row_total = 0;
      for (i, secs) in cells.iter().enumerate() {
        let centi = centi_hours(*secs);
        fields.set(format!("{prefix}{}", WEEK_DAYS[i]), format_centi_hours(centi));
        column_totals[i] += centi;
        row_total += centi;
      }
      fields.set(format!("tot2{row}"), format_centi_hours(row_total));
    }
  }

  fields.set("TimeCardRowCount", row.to_string());
  fields.set("CurrentTotalRows", row.to_string());

  for (i, centi) in column_totals.iter().enumerate() {
    let col = FIRST_DAY_COLUMN + i;
    fields.set(format!("tot1_c{col}"), format_centi_hours(*centi));
    fields.set(format!("tot2_c{col}"), format_centi_hours(*centi));
  }

  let grand = format_centi_hours(column_totals.iter().sum());
  fields.set("totHours1", grand.as_str());
  fields.set("totHours2", grand);

  Ok(fields)
}
