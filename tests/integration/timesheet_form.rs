use std::collections::BTreeMap;

use chrono::NaiveDate;
use timecard_sync::classify::TaskMappingTable;
use timecard_sync::entries::aggregate::ProjectTaskDays;
use timecard_sync::legacy::form::build_timesheet_fields;
use timecard_sync::legacy::scrape::{extract_blank_form_baseline, extract_new_period, extract_period_options};
use timecard_sync::legacy::submit::{RECALCULATE_FIELD, SUBMIT_FIELD};
use timecard_sync::model::TimesheetPeriod;
use test_support::{read_fixture_json, read_fixture_text};

fn d(day: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
}

fn period() -> TimesheetPeriod {
  TimesheetPeriod {
    card_id: "88231".into(),
    start: d(8),
    end: d(14),
  }
}

fn grouped() -> ProjectTaskDays {
  let mut grouped = ProjectTaskDays::new();
  grouped
    .entry("01-123456-01".into())
    .or_insert_with(BTreeMap::new)
    .insert("N0003".into(), BTreeMap::from([(d(8), 3600), (d(12), 5400)]));
  grouped
    .entry("Admin".into())
    .or_insert_with(BTreeMap::new)
    .insert("N0009".into(), BTreeMap::from([(d(9), 900)]));
  grouped
}

#[test]
fn open_period_is_last_unsubmitted_option() {
  let options = extract_period_options(&read_fixture_text("legacy/home.html"));
  let open = options.iter().rev().find(|o| !o.is_submitted()).unwrap();
  assert_eq!(open.card_id, "88231");
  assert_eq!(open.end_date(), Some(d(14)));
}

#[test]
fn new_timesheet_page_yields_card_and_week_end() {
  let (card, end) = extract_new_period(&read_fixture_text("legacy/new_timesheet.html")).unwrap();
  assert_eq!((card.as_str(), end), ("88231", d(7)));
}

#[test]
fn filled_form_keeps_baseline_and_drops_triggers() {
  let mapping: TaskMappingTable = read_fixture_json("mapping/task_mapping.json");
  mapping.validate().unwrap();
  let baseline = extract_blank_form_baseline(&read_fixture_text("legacy/blank_timesheet.html"));

  let fields = build_timesheet_fields(&baseline, &period(), &grouped(), &mapping).unwrap();

  assert_eq!(fields.get("Emp_ID"), Some("4711"));
  assert!(!fields.contains(RECALCULATE_FIELD));
  assert!(!fields.contains(SUBMIT_FIELD));

  assert_eq!(fields.get("TimeCardRowCount"), Some("2"));
  assert_eq!(fields.get("r1_Projname"), Some("01-123456-01"));
  assert_eq!(fields.get("r1_Taskname_Dscr"), Some("Development"));
  assert_eq!(fields.get("r1_Monday"), Some("1.00"));
  assert_eq!(fields.get("r1_Friday"), Some("1.50"));
  assert_eq!(fields.get("r2_Projname"), Some("Admin"));
  assert_eq!(fields.get("r2_Tuesday"), Some("0.25"));
  assert_eq!(fields.get("tot21"), Some("2.50"));
  assert_eq!(fields.get("tot22"), Some("0.25"));
  assert_eq!(fields.get("totHours1"), Some("2.75"));
  assert_eq!(fields.get("totHours2"), Some("2.75"));
}
