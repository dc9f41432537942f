// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Named extraction functions over the legacy system's rendered pages (its de facto wire format)
// role: legacy/scrape
// inputs: HTML bodies returned by LegacyTransport
// outputs: Period options, new-period info, blank-form baseline, project search results, personal project list
// invariants:
// - Every selector and field name the legacy markup dictates lives in this module
// - Period option value "0" is the create-new sentinel and is never returned
// - Dates on legacy pages are dd/mm/yyyy
// errors: Missing mandatory elements on a new-period page are reported with the element name
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::{Context, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::model::FormFieldSet;

pub const LEGACY_DATE_FORMAT: &str = "%d/%m/%Y";
pub const SUBMITTED_MARKER: &str = "(Submitted )";

static RE_LEGACY_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2}/\d{2}/\d{4}").unwrap());

static SEL_PERIOD_OPTIONS: Lazy<Selector> =
  Lazy::new(|| Selector::parse(r#"form select[name="TimeCard_ID"] option"#).unwrap());
static SEL_CALENDAR_FIELD: Lazy<Selector> = Lazy::new(|| Selector::parse("#cal-field-1").unwrap());
static SEL_FONT: Lazy<Selector> = Lazy::new(|| Selector::parse("font").unwrap());
static SEL_CARD_ID: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"input[name="TmCrdID"]"#).unwrap());
static SEL_FORM_FIELDS: Lazy<Selector> =
  Lazy::new(|| Selector::parse("form input, form select, form textarea").unwrap());
static SEL_OPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("option").unwrap());
static SEL_SELECTED_OPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("option[selected]").unwrap());
static SEL_SEARCH_RESULTS: Lazy<Selector> = Lazy::new(|| Selector::parse("#Prjct_Lst option").unwrap());
static SEL_PERSONAL_PROJECTS: Lazy<Selector> = Lazy::new(|| Selector::parse("#EmplyPrjct_Lst option").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodOption {
  pub card_id: String,
  pub label: String,
}

impl PeriodOption {
  pub fn is_submitted(&self) -> bool {
    self.label.contains(SUBMITTED_MARKER)
  }

  pub fn end_date(&self) -> Option<NaiveDate> {
    first_legacy_date(&self.label)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectOption {
  pub id: String,
  pub label: String,
}

pub fn parse_legacy_date(raw: &str) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(raw.trim(), LEGACY_DATE_FORMAT).ok()
}

pub fn first_legacy_date(text: &str) -> Option<NaiveDate> {
  RE_LEGACY_DATE.find(text).and_then(|m| parse_legacy_date(m.as_str()))
}

fn text_of(el: ElementRef<'_>) -> String {
  el.text().collect::<String>().trim().to_string()
}

fn attr(el: ElementRef<'_>, name: &str) -> String {
  el.value().attr(name).unwrap_or_default().to_string()
}

/// Period options in page order (oldest first), excluding the create-new sentinel.
pub fn extract_period_options(html: &str) -> Vec<PeriodOption> {
  let doc = Html::parse_document(html);

  doc
    .select(&SEL_PERIOD_OPTIONS)
    .filter(|o| o.value().attr("value") != Some("0"))
    .map(|o| PeriodOption {
      card_id: attr(o, "value"),
      label: text_of(o),
    })
    .collect()
}

/// Card id and default end date offered by a freshly created timesheet.
pub fn extract_new_period(html: &str) -> Result<(String, NaiveDate)> {
  let doc = Html::parse_document(html);

  let field = doc
    .select(&SEL_CALENDAR_FIELD)
    .next()
    .context("new timesheet page has no #cal-field-1")?;
  let label = field
    .parent()
    .and_then(ElementRef::wrap)
    .and_then(|p| p.select(&SEL_FONT).next())
    .map(text_of)
    .context("new timesheet page has no end-date label")?;
  let end = first_legacy_date(&label).with_context(|| format!("no dd/mm/yyyy date in label {label:?}"))?;

  let card_id = doc
    .select(&SEL_CARD_ID)
    .next()
    .and_then(|i| i.value().attr("value"))
    .map(str::to_string)
    .context("new timesheet page has no TmCrdID")?;

  Ok((card_id, end))
}

/// Every named control of the timesheet form with the value a browser would submit by default.
pub fn extract_blank_form_baseline(html: &str) -> FormFieldSet {
  let doc = Html::parse_document(html);
  let mut fields = FormFieldSet::new();

  for el in doc.select(&SEL_FORM_FIELDS) {
    let Some(name) = el.value().attr("name") else {
      continue;
    };

    let value = match el.value().name() {
      "select" => el
        .select(&SEL_SELECTED_OPTION)
        .next()
        .or_else(|| el.select(&SEL_OPTION).next())
        .map(|o| attr(o, "value"))
        .unwrap_or_default(),
      "textarea" => el.text().collect::<String>(),
      _ => {
        let kind = el.value().attr("type").unwrap_or("text").to_ascii_lowercase();
        if (kind == "checkbox" || kind == "radio") && el.value().attr("checked").is_none() {
          continue;
        }
        attr(el, "value")
      }
    };

    fields.set(name, value);
  }

  fields
}

/// Search hits; a lone option without a value is the "nothing found" placeholder.
pub fn extract_project_search_results(html: &str) -> Vec<ProjectOption> {
  let doc = Html::parse_document(html);

  let options: Vec<ProjectOption> = doc
    .select(&SEL_SEARCH_RESULTS)
    .map(|o| ProjectOption {
      id: attr(o, "value"),
      label: text_of(o),
    })
    .collect();

  if options.len() == 1 && options[0].id.is_empty() {
    return Vec::new();
  }

  options
}

pub fn extract_personal_projects(html: &str) -> Vec<String> {
  let doc = Html::parse_document(html);

  doc
    .select(&SEL_PERSONAL_PROJECTS)
    .filter_map(|o| o.value().attr("value"))
    .filter(|v| !v.is_empty())
    .map(str::to_string)
    .collect()
}
