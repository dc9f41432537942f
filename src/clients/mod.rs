// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Namespace for collaborator API clients (issue tracker, worklog service, raw time-entry source) plus shared HTTP helpers
// role: clients/namespace
// outputs: Trait seams per collaborator and their ureq-backed implementations
// invariants:
// - Every remote call blocks until it completes; nothing here retries
// - Non-2xx responses surface as errors carrying the status and response body
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

pub mod jira;
pub mod tempo;
pub mod toggl;

use std::time::Duration;

use anyhow::{Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

pub const USER_AGENT: &str = concat!("timecard-sync/", env!("CARGO_PKG_VERSION"));

pub fn json_agent() -> ureq::Agent {
  ureq::AgentBuilder::new()
    .timeout(Duration::from_secs(60))
    .user_agent(USER_AGENT)
    .build()
}

pub fn basic_auth(user: &str, secret: &str) -> String {
  format!("Basic {}", BASE64_STANDARD.encode(format!("{user}:{secret}")))
}

/// Unwrap a ureq outcome into a JSON body, turning HTTP status errors into
/// readable failures.
pub fn read_json(outcome: std::result::Result<ureq::Response, ureq::Error>, what: &str) -> Result<serde_json::Value> {
  match outcome {
    Ok(resp) => Ok(resp.into_json::<serde_json::Value>()?),
    Err(ureq::Error::Status(code, resp)) => {
      let body = resp.into_string().unwrap_or_default();
      bail!("{what} failed with HTTP {code}: {}", body.trim())
    }
    Err(err) => Err(anyhow::Error::new(err).context(format!("{what} failed"))),
  }
}
