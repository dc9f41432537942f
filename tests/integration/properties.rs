use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use timecard_sync::classify::TaskMappingTable;
use timecard_sync::entries::aggregate::{AccountBucket, ProjectTaskDays};
use timecard_sync::entries::duration::{GRANULARITY_MINUTES, normalize_minutes};
use timecard_sync::legacy::form::build_timesheet_fields;
use timecard_sync::model::{FormFieldSet, TimesheetPeriod};

fn monday() -> NaiveDate {
  NaiveDate::from_ymd_opt(2024, 4, 8).unwrap()
}

fn mapping() -> TaskMappingTable {
  serde_json::from_value(serde_json::json!({
    "default": "N0009",
    "task_names": { "N0009": "General" }
  }))
  .unwrap()
}

fn centi(raw: &str) -> u64 {
  raw.replace('.', "").parse().unwrap()
}

proptest! {
  #[test]
  fn normalized_minutes_sit_on_the_grid(m in 0u32..10_000) {
    let n = normalize_minutes(m);
    prop_assert_eq!(n % GRANULARITY_MINUTES, 0);
    prop_assert_eq!(normalize_minutes(n), n);
    if m > 2 && m < GRANULARITY_MINUTES {
      prop_assert_eq!(n, GRANULARITY_MINUTES);
    }
  }

  #[test]
  fn folding_is_consistent_and_order_free(
    (worklogs, shuffled) in proptest::collection::vec((0u8..4, 0i64..7, 0u64..20_000), 0..40)
      .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
  ) {
    let mut first = AccountBucket::default();
    for (issue, day, secs) in &worklogs {
      first.fold(&issue.to_string(), monday() + Duration::days(*day), *secs);
      prop_assert!(first.is_consistent());
    }

    let mut second = AccountBucket::default();
    for (issue, day, secs) in shuffled.iter().rev() {
      second.fold(&issue.to_string(), monday() + Duration::days(*day), *secs);
      prop_assert!(second.is_consistent());
    }

    prop_assert_eq!(first.entries(), second.entries());
    prop_assert_eq!(first.issues_by_date(), second.issues_by_date());
    prop_assert_eq!(first.total_seconds(), worklogs.iter().map(|w| w.2).sum::<u64>());
  }

  #[test]
  fn totals_match_rounded_cells(cells in proptest::collection::vec(proptest::collection::vec(0u64..40_000, 7), 1..5)) {
    let mut grouped = ProjectTaskDays::new();
    for (row, secs) in cells.iter().enumerate() {
      let days: BTreeMap<NaiveDate, u64> = secs
        .iter()
        .enumerate()
        .map(|(i, s)| (monday() + Duration::days(i as i64), *s))
        .collect();
      grouped
        .entry(format!("P{row}"))
        .or_insert_with(BTreeMap::new)
        .insert("N0009".into(), days);
    }
    let period = TimesheetPeriod { card_id: "1".into(), start: monday(), end: monday() + Duration::days(6) };

    let fields = build_timesheet_fields(&FormFieldSet::new(), &period, &grouped, &mapping()).unwrap();

    let days = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
    let mut grand = 0;
    for row in 1..=cells.len() {
      let sum: u64 = days.iter().map(|d| centi(fields.get(&format!("r{row}_{d}")).unwrap())).sum();
      prop_assert_eq!(centi(fields.get(&format!("tot2{row}")).unwrap()), sum);
      grand += sum;
    }
    prop_assert_eq!(centi(fields.get("totHours1").unwrap()), grand);
  }
}
