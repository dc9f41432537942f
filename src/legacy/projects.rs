// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Map account names to legacy project ids via search, personal-list registration and operator disambiguation
// role: legacy/projects
// inputs: LegacyTransport, LegacyPaths, Prompt, AccountProjectCache
// outputs: account name → legacy project id
// side_effects: Project search POSTs; registration POST for projects missing from the personal list; cache inserts
// invariants:
// - Cached account names and already-resolved candidates never trigger a remote call
// - A project id is registered at most once, and never when the personal list already has it
// - Search retries are an explicit loop; blank operator input aborts the run
// errors: Blank correction ⇒ SyncError::Aborted; transport errors propagate
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::cache::AccountProjectCache;
use crate::config::LegacyPaths;
use crate::error::SyncError;
use crate::legacy::scrape::{ProjectOption, extract_personal_projects, extract_project_search_results};
use crate::legacy::transport::LegacyTransport;
use crate::prompt::Prompt;

/// Always present in the personal list, never searched for.
pub const ADMIN_PROJECT: &str = "Admin";

const ADD_TO_PERSONAL_LIST: &str = "\u{a0}\u{a0}\u{a0}Add to personal list \u{a0}\u{a0}\u{a0}";

static RE_PROJECT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\d{2}-\d{6}(?:[\d-]+)?)|\d{8,}").unwrap());

/// Project id embedded in an account name (`NN-NNNNNN[-…]` or 8+ digits), else its first word.
pub fn extract_candidate(account: &str) -> String {
  if let Some(m) = RE_PROJECT_ID.find(account) {
    return m.as_str().to_string();
  }

  account.split(' ').next().unwrap_or_default().to_string()
}

pub struct ProjectResolver<'a> {
  transport: &'a dyn LegacyTransport,
  paths: &'a LegacyPaths,
  prompt: &'a dyn Prompt,
  known: HashMap<String, String>,
  personal: HashSet<String>,
}

impl<'a> ProjectResolver<'a> {
  /// Fetch the personal project list once; every id on it counts as resolved.
  pub fn load(transport: &'a dyn LegacyTransport, paths: &'a LegacyPaths, prompt: &'a dyn Prompt) -> Result<Self> {
    println!("Matching accounts with timesheet projects...");
    let page = transport.get(&paths.projects, &[("TimeCard_ID", "0")])?;

    let mut personal: HashSet<String> = extract_personal_projects(&page).into_iter().collect();
    personal.insert(ADMIN_PROJECT.to_string());
    let known = personal.iter().map(|p| (p.clone(), p.clone())).collect();
    debug!(count = personal.len(), "personal projects");

    Ok(Self {
      transport,
      paths,
      prompt,
      known,
      personal,
    })
  }

  pub fn resolve(&mut self, account: &str, cache: &mut AccountProjectCache) -> Result<String> {
    if let Some(project) = cache.get(account).map(str::to_string).or_else(|| self.known.get(account).cloned()) {
      self.known.insert(account.to_string(), project.clone());
      return Ok(project);
    }

    let mut candidate = extract_candidate(account);
    if let Some(project) = self.known.get(&candidate).cloned() {
      self.known.insert(account.to_string(), project.clone());
      cache.insert(account, project.clone());
      return Ok(project);
    }

    let original_candidate = candidate.clone();
    let project = loop {
      let results = self.search(&candidate)?;

      if let [only] = results.as_slice() {
        break only.id.clone();
      }

      if results.is_empty() {
        println!("Project id \"{candidate}\" not found for account {account}");
      } else {
        println!("Multiple projects found:");
        println!("---");
        for r in &results {
          println!("{} ({})", r.id, r.label);
        }
        println!("---");
      }

      candidate = self.prompt.ask("Enter correct project id or empty to terminate: ")?;
      if candidate.is_empty() {
        return Err(SyncError::Aborted.into());
      }
    };

    if !self.personal.contains(&project) && !self.known.contains_key(&project) {
      self.register(&project)?;
      self.personal.insert(project.clone());
    }

    for key in [original_candidate, candidate, project.clone(), account.to_string()] {
      self.known.insert(key, project.clone());
    }
    cache.insert(account, project.clone());

    Ok(project)
  }

  /// Resolve every account; the result maps each account name to its project id.
  pub fn resolve_all<'s, I>(&mut self, accounts: I, cache: &mut AccountProjectCache) -> Result<HashMap<String, String>>
  where
    I: IntoIterator<Item = &'s str>,
  {
    let mut out = HashMap::new();
    for account in accounts {
      let project = self.resolve(account, cache)?;
      out.insert(account.to_string(), project);
    }

    Ok(out)
  }

  fn search(&self, project_id: &str) -> Result<Vec<ProjectOption>> {
    debug!(%project_id, "project search");
    let page = self.transport.post(
      &self.paths.projects_search,
      &[
        ("vExpandPPLFlag", "N"),
        ("vExpandSFlag", "Y"),
        ("Project_name", ""),
        ("Project_ID", project_id),
        ("GetQProjects", "Get Projects"),
      ],
    )?;

    Ok(extract_project_search_results(&page))
  }

  fn register(&self, project_id: &str) -> Result<()> {
    println!("Adding project \"{project_id}\" to the personal list");
    self.transport.post(
      &self.paths.projects_add,
      &[
        ("vExpandPPLFlag", "N"),
        ("vExpandSFlag", "Y"),
        ("BU_ID", "0"),
        ("Project_Type", "All"),
        ("Project_Name", ""),
        ("Client_Name", ""),
        ("Project_ID", project_id),
        ("sortOrder1", "JBNum"),
        ("sortOrder2", "None"),
        ("sortOrder3", "None"),
        ("Global", "0"),
        ("GlobalLEID", ""),
        ("Prjct_Lst", project_id),
        ("MoveTo", ADD_TO_PERSONAL_LIST),
      ],
    )?;

    Ok(())
  }
}
