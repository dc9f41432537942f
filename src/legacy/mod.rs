// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Legacy timesheet protocol: transport, page scraping, period discovery, project registration, form layout, save/submit
// role: legacy/mod
// invariants: Markup knowledge stays in scrape; everything else works on typed values
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

pub mod form;
pub mod ntlm;
pub mod period;
pub mod projects;
pub mod scrape;
pub mod submit;
pub mod transport;
