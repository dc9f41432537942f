// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Load endpoint/credential settings for each collaborator from the environment (.env via dotenvy)
// role: config/settings
// inputs: Environment variables (or an injected lookup for tests)
// outputs: JiraSettings, TempoSettings, TogglSettings, LegacySettings (with LegacyAuthScheme, NTLM by default), LegacyPaths
// side_effects: None; dotenv loading happens once in main
// invariants:
// - Required keys missing ⇒ SyncError::MissingSetting naming the key
// - Base URLs never carry a trailing '/'
// errors: Base64 decoding failures of the legacy password carry context
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use crate::error::SyncError;

pub const DEFAULT_ACCOUNT_FIELD: &str = "customfield_10032";
pub const DEFAULT_TEMPO_API_URL: &str = "https://api.tempo.io/4";
pub const DEFAULT_TOGGL_API_URL: &str = "https://api.track.toggl.com/api/v9";
pub const DEFAULT_ITIME_APP_PATH: &str = "/iTime_CZ_SK";
pub const DEFAULT_AUTH_FAILURE_MARKER: &str = "itimeAuths";
pub const DEFAULT_AUTH_SCHEME: &str = "ntlm";

fn required(lookup: &dyn Fn(&str) -> Option<String>, key: &'static str) -> Result<String> {
  match lookup(key) {
    Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
    _ => Err(SyncError::MissingSetting(key).into()),
  }
}

fn optional(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
  lookup(key)
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
    .unwrap_or_else(|| default.to_string())
}

fn env_lookup(key: &str) -> Option<String> {
  std::env::var(key).ok()
}

fn strip_slash(url: String) -> String {
  url.trim_end_matches('/').to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraSettings {
  pub base_url: String,
  pub user_email: String,
  pub api_token: String,
  pub user_id: String,
  pub account_field: String,
}

impl JiraSettings {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(&env_lookup)
  }

  pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
    Ok(Self {
      base_url: strip_slash(required(lookup, "JIRA_URL")?),
      user_email: required(lookup, "JIRA_USER_EMAIL")?,
      api_token: required(lookup, "JIRA_API_TOKEN")?,
      user_id: required(lookup, "JIRA_USER_ID")?,
      account_field: optional(lookup, "JIRA_ACCOUNT_FIELD", DEFAULT_ACCOUNT_FIELD),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempoSettings {
  pub api_url: String,
  pub api_token: String,
}

impl TempoSettings {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(&env_lookup)
  }

  pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
    Ok(Self {
      api_url: strip_slash(optional(lookup, "TEMPO_API_URL", DEFAULT_TEMPO_API_URL)),
      api_token: required(lookup, "TEMPO_API_TOKEN")?,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TogglSettings {
  pub api_url: String,
  pub api_token: String,
}

impl TogglSettings {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(&env_lookup)
  }

  pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
    Ok(Self {
      api_url: strip_slash(optional(lookup, "TOGGL_API_URL", DEFAULT_TOGGL_API_URL)),
      api_token: required(lookup, "TOGGL_API_TOKEN")?,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySettings {
  pub base_url: String,
  pub paths: LegacyPaths,
  pub username: String,
  pub password: String,
  /// Windows domain for NTLM when the username carries no `DOMAIN\` prefix.
  pub domain: String,
  pub auth_scheme: LegacyAuthScheme,
  pub auth_failure_marker: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyAuthScheme {
  Ntlm,
  Basic,
}

impl LegacyAuthScheme {
  pub fn parse(raw: &str) -> Result<Self> {
    match raw.trim().to_ascii_lowercase().as_str() {
      "ntlm" => Ok(Self::Ntlm),
      "basic" => Ok(Self::Basic),
      other => anyhow::bail!("unknown ITIME_AUTH_SCHEME {other:?}, expected ntlm or basic"),
    }
  }
}

impl LegacySettings {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(&env_lookup)
  }

  pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
    let encoded = required(lookup, "ITIME_PASSWORD_BASE64")?;
    let password = decode_password(&encoded).context("decoding ITIME_PASSWORD_BASE64")?;

    Ok(Self {
      base_url: strip_slash(required(lookup, "ITIME_BASE_URL")?),
      paths: LegacyPaths::new(&optional(lookup, "ITIME_APP_PATH", DEFAULT_ITIME_APP_PATH)),
      username: required(lookup, "ITIME_USERNAME")?,
      password,
      domain: optional(lookup, "ITIME_DOMAIN", ""),
      auth_scheme: LegacyAuthScheme::parse(&optional(lookup, "ITIME_AUTH_SCHEME", DEFAULT_AUTH_SCHEME))?,
      auth_failure_marker: optional(lookup, "ITIME_AUTH_FAILURE_MARKER", DEFAULT_AUTH_FAILURE_MARKER),
    })
  }
}

pub fn encode_password(plain: &str) -> String {
  BASE64_STANDARD.encode(plain.as_bytes())
}

pub fn decode_password(encoded: &str) -> Result<String> {
  let bytes = BASE64_STANDARD.decode(encoded.trim())?;
  Ok(String::from_utf8(bytes)?)
}

/// Page paths of the legacy application, relative to its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPaths {
  /// Timesheet list (period selector).
  pub home: String,
  /// Blank/existing timesheet, parameter `TimeCard_ID`.
  pub timesheet_entry: String,
  /// Save and submit target.
  pub timesheet_proc: String,
  /// Personal project list.
  pub projects: String,
  pub projects_search: String,
  pub projects_add: String,
}

impl LegacyPaths {
  pub fn new(app_path: &str) -> Self {
    let app = format!("/{}", app_path.trim_matches('/'));

    Self {
      home: format!("{app}/TmCrdForm.cfm"),
      timesheet_entry: format!("{app}/TmCrdEntry.CFM"),
      timesheet_proc: format!("{app}/timecard_proc_v2.cfm"),
      projects: format!("{app}/Emp_PrjctAcsForm.cfm"),
      projects_search: format!("{app}/Emp_PrjctAcsForm.CFM"),
      projects_add: format!("{app}/EmplyPrjctAcsEntry.CFM"),
    }
  }
}

impl Default for LegacyPaths {
  fn default() -> Self {
    Self::new(DEFAULT_ITIME_APP_PATH)
  }
}
