// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Namespace for raw time-entry handling (tag matching, duration snapping, worklog aggregation)
// role: entries/namespace
// outputs: Public submodules; pure functions except where a collaborator is passed in
// invariants: No module here talks to the network directly; collaborators arrive as trait objects
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

pub mod aggregate;
pub mod duration;
pub mod tag;
