// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Two-phase timesheet write: fetch the blank form, save with recalculate, then submit
// role: legacy/submit
// inputs: LegacyTransport, LegacyPaths, card id, filled FormFieldSet
// outputs: Posted forms (response pages are only logged)
// side_effects: Non-idempotent POSTs to the timesheet processor
// invariants:
// - save carries the recalculate trigger and never the submit trigger; submit is the reverse
// - save always precedes submit for the same field set
// errors: Transport errors propagate; a failure after save leaves the period open for the next run
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::LegacyPaths;
use crate::legacy::scrape::extract_blank_form_baseline;
use crate::legacy::transport::LegacyTransport;
use crate::model::FormFieldSet;

pub const RECALCULATE_FIELD: &str = "Save & ReCalculate";
pub const SUBMIT_FIELD: &str = "Submit";

pub fn fetch_blank_form(transport: &dyn LegacyTransport, paths: &LegacyPaths, card_id: &str) -> Result<FormFieldSet> {
  let page = transport
    .get(&paths.timesheet_entry, &[("TimeCard_ID", card_id)])
    .with_context(|| format!("opening timesheet {card_id}"))?;
  let baseline = extract_blank_form_baseline(&page);
  debug!(card_id, fields = baseline.len(), "timesheet baseline");

  Ok(baseline)
}

fn with_trigger(fields: &FormFieldSet, add: &str, drop: &str) -> FormFieldSet {
  let mut out = fields.clone();
  out.remove(drop);
  out.set(add, "");
  out
}

pub fn save_timesheet(transport: &dyn LegacyTransport, paths: &LegacyPaths, fields: &FormFieldSet) -> Result<()> {
  let form = with_trigger(fields, RECALCULATE_FIELD, SUBMIT_FIELD);
  transport
    .post(&paths.timesheet_proc, &form.as_pairs())
    .context("saving timesheet")?;

  Ok(())
}

pub fn submit_timesheet(transport: &dyn LegacyTransport, paths: &LegacyPaths, fields: &FormFieldSet) -> Result<()> {
  let form = with_trigger(fields, SUBMIT_FIELD, RECALCULATE_FIELD);
  transport
    .post(&paths.timesheet_proc, &form.as_pairs())
    .context("submitting timesheet")?;

  Ok(())
}
