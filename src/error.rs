// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Typed failure taxonomy carried inside anyhow::Error so the binary can tell operator aborts from faults
// role: errors/types
// outputs: SyncError variants
// invariants: Aborted is the only variant that means "operator chose to stop"; everything else is a fault
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
  #[error("task {0} has no associated name in the task mapping")]
  UnnamedTask(String),

  #[error("aborted by operator")]
  Aborted,

  #[error("cannot log into the timesheet system; update ITIME_PASSWORD_BASE64 in .env (it must be base64 encoded)")]
  LoginFailed,

  #[error("invalid date range {start} - {stop}")]
  InvalidEntryRange { start: String, stop: String },

  #[error("invalid timesheet period {start} - {end}: {reason}")]
  InvalidPeriod {
    start: NaiveDate,
    end: NaiveDate,
    reason: &'static str,
  },

  #[error("issue {0} does not exist")]
  IssueNotFound(String),

  #[error("missing {0} in environment (.env)")]
  MissingSetting(&'static str),
}

/// True when the error chain carries an operator abort.
pub fn is_abort(err: &anyhow::Error) -> bool {
  matches!(err.downcast_ref::<SyncError>(), Some(SyncError::Aborted))
}

#[cfg(test)]
mod tests {
  use super::*;
  use anyhow::Context;

  #[test]
  fn abort_survives_context_wrapping() {
    let err = Err::<(), _>(SyncError::Aborted)
      .context("resolving account")
      .unwrap_err();
    assert!(is_abort(&err));
  }

  #[test]
  fn other_variants_are_not_aborts() {
    let err = anyhow::Error::new(SyncError::LoginFailed);
    assert!(!is_abort(&err));
    assert!(format!("{err}").contains("ITIME_PASSWORD_BASE64"));
  }
}
