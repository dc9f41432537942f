// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Pull an issue key and a description remainder out of a free-text time-entry description
// role: entries/tag-matcher
// inputs: Free-text description
// outputs: TagMatch { tag, remainder } or None when no recognized shape matches
// invariants:
// - Pure; no IO
// - A returned tag always satisfies the WORD-NUMBER shape (spaces in the number separator become '-')
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use once_cell::sync::Lazy;
use regex::Regex;

// Recognized shapes (optionally preceded by "#123 "):
//   ABC-12 ...          bare key
//   [ABC-12] ...        bracketed key
//   hotfix/ABC-12 ...   hotfix|feature prefix with '/' or ' - ', key may use a space
static RE_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"(?i)^(?:#\d+\s+)?(?:([a-z]+-\d+)|(?:\[([a-z]+-\d+)\])|(?:hotfix|feature)(?:\s+-\s+|/)([a-z]+[- ]\d+))(\D.*)?",
  )
  .unwrap()
});

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+-\d+$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
  pub tag: String,
  pub remainder: Option<String>,
}

/// Match a description against the recognized shapes.
///
/// Returns None when nothing matches or the extracted tag fails the stricter
/// `WORD-NUMBER` check; callers fall back to asking the operator.
pub fn match_tag(description: &str) -> Option<TagMatch> {
  let caps = RE_DESCRIPTION.captures(description)?;

  let tag = caps
    .get(1)
    .or_else(|| caps.get(2))
    .or_else(|| caps.get(3))?
    .as_str()
    .replace(' ', "-");

  if !is_valid_tag(&tag) {
    return None;
  }

  let remainder = caps.get(4).and_then(|m| clean_remainder(m.as_str()));

  Some(TagMatch { tag, remainder })
}

/// True for `WORD-NUMBER` keys (after spaces are turned into '-').
pub fn is_valid_tag(tag: &str) -> bool {
  RE_TAG.is_match(tag)
}

/// Strip surrounding whitespace and a leading "-" or ":" separator.
pub fn clean_remainder(raw: &str) -> Option<String> {
  let trimmed = raw
    .trim()
    .trim_start_matches(['-', ':'])
    .trim();

  if trimmed.is_empty() {
    None
  } else {
    Some(trimmed.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tag_of(s: &str) -> Option<String> {
    match_tag(s).map(|m| m.tag)
  }

  #[test]
  fn bare_key_without_remainder() {
    let m = match_tag("ABC-12").unwrap();
    assert_eq!(m.tag, "ABC-12");
    assert_eq!(m.remainder, None);
  }

  #[test]
  fn bare_key_with_remainder() {
    let m = match_tag("ABC-12 fix login redirect").unwrap();
    assert_eq!(m.tag, "ABC-12");
    assert_eq!(m.remainder.as_deref(), Some("fix login redirect"));
  }

  #[test]
  fn bracketed_key_strips_separator() {
    let m = match_tag("[OPS-7] - weekly sync").unwrap();
    assert_eq!(m.tag, "OPS-7");
    assert_eq!(m.remainder.as_deref(), Some("weekly sync"));
  }

  #[test]
  fn hotfix_and_feature_prefixes() {
    assert_eq!(tag_of("hotfix/ABC-99 broken export").as_deref(), Some("ABC-99"));
    assert_eq!(tag_of("feature - ABC 100").as_deref(), Some("ABC-100"));
    assert_eq!(tag_of("Feature/xyz-3").as_deref(), Some("xyz-3"));
  }

  #[test]
  fn leading_ticket_number_is_skipped() {
    let m = match_tag("#42 ABC-12: review").unwrap();
    assert_eq!(m.tag, "ABC-12");
    assert_eq!(m.remainder.as_deref(), Some("review"));
  }

  #[test]
  fn case_insensitive() {
    assert_eq!(tag_of("abc-12 lower").as_deref(), Some("abc-12"));
  }

  #[test]
  fn unrecognized_shapes() {
    assert_eq!(match_tag("lunch"), None);
    assert_eq!(match_tag("meeting about ABC-12"), None);
    assert_eq!(match_tag(""), None);
    assert_eq!(match_tag("[ABC-12"), None);
  }
}
