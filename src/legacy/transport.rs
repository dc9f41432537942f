// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Request/response primitive for the legacy timesheet system (GET with query, form POST) over one cookie session
// role: legacy/transport
// inputs: LegacySettings (base URL, page paths, credentials, auth scheme, auth-failure marker)
// outputs: HTML bodies as strings
// side_effects: Network calls; optional HTML capture under the debug directory
// invariants:
// - One agent (one cookie jar) for the whole run
// - After login the base URL points at the host the login redirects settled on
// - NTLM requests carry their form body on both handshake legs; a 401 without an NTLM challenge ends the run
// errors: Landing on the auth-failure host or a refused handshake ⇒ SyncError::LoginFailed; HTTP status errors carry method and path
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::ntlm::{self, NtlmCredentials};
use crate::clients::basic_auth;
use crate::config::{LegacyAuthScheme, LegacySettings};
use crate::error::SyncError;

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const BROWSER_LANGUAGE: &str = "en-GB,en;q=0.9";
const BROWSER_USER_AGENT: &str =
  "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

static RE_ORIGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(https?://[^/?#]+)").unwrap());

type Outcome = std::result::Result<ureq::Response, ureq::Error>;

// --- Trait seam for the legacy system ---
pub trait LegacyTransport {
  fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String>;
  fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<String>;
}

/// Writes every response body to `<dir>/NNN-<method>-<page>.html`.
pub struct HtmlDump {
  dir: PathBuf,
  seq: Cell<usize>,
}

impl HtmlDump {
  pub fn new(dir: PathBuf) -> Self {
    Self { dir, seq: Cell::new(0) }
  }

  pub fn file_name(seq: usize, method: &str, path: &str) -> String {
    let page = path
      .rsplit('/')
      .next()
      .unwrap_or(path)
      .split('.')
      .next()
      .unwrap_or_default()
      .to_ascii_lowercase();
    let page = if page.is_empty() { "index".to_string() } else { page };

    format!("{seq:03}-{}-{page}.html", method.to_ascii_lowercase())
  }

  pub fn write(&self, method: &str, path: &str, body: &str) -> Result<()> {
    let seq = self.seq.get() + 1;
    self.seq.set(seq);
    std::fs::create_dir_all(&self.dir).with_context(|| format!("creating {}", self.dir.display()))?;
    let target = self.dir.join(Self::file_name(seq, method, path));
    std::fs::write(&target, body).with_context(|| format!("writing {}", target.display()))
  }
}

enum Auth {
  Basic(String),
  Ntlm(NtlmCredentials),
}

pub struct HttpTransport {
  agent: ureq::Agent,
  base_url: RefCell<String>,
  auth: Auth,
  home: String,
  failure_marker: String,
  dump: Option<HtmlDump>,
}

impl HttpTransport {
  pub fn new(settings: &LegacySettings, dump: Option<HtmlDump>) -> Self {
    let agent = ureq::AgentBuilder::new()
      .timeout(Duration::from_secs(120))
      .user_agent(BROWSER_USER_AGENT)
      .redirects(10)
      .build();

    Self {
      agent,
      base_url: RefCell::new(settings.base_url.clone()),
      auth: match settings.auth_scheme {
        LegacyAuthScheme::Basic => Auth::Basic(basic_auth(&settings.username, &settings.password)),
        LegacyAuthScheme::Ntlm => Auth::Ntlm(NtlmCredentials::new(&settings.username, &settings.password, &settings.domain)),
      },
      home: settings.paths.home.clone(),
      failure_marker: settings.auth_failure_marker.clone(),
      dump,
    }
  }

  pub fn base_url(&self) -> String {
    self.base_url.borrow().clone()
  }

  /// Open the home page and settle the session; fails when the redirect
  /// chain ends on the authentication-failure host.
  pub fn login(&self) -> Result<()> {
    let url = format!("{}{}", self.base_url(), self.home);
    debug!(%url, "legacy login");

    let resp = match self.send("GET", &url, &[], None)? {
      Ok(r) => r,
      Err(ureq::Error::Status(401, _)) => return Err(SyncError::LoginFailed.into()),
      Err(err) => return Err(anyhow::Error::new(err).context("opening the timesheet home page")),
    };

    let final_url = resp.get_url().to_string();
    let origin = login_origin(&final_url, &self.failure_marker)?;
    debug!(%origin, "legacy session anchored");
    *self.base_url.borrow_mut() = origin;

    let body = resp.into_string().context("reading home page")?;
    self.capture("GET", &self.home, &body);

    Ok(())
  }

  fn request(&self, method: &str, url: &str, query: &[(&str, &str)]) -> ureq::Request {
    let mut req = self
      .agent
      .request(method, url)
      .set("Accept", BROWSER_ACCEPT)
      .set("Accept-Language", BROWSER_LANGUAGE);
    for (k, v) in query {
      req = req.query(k, v);
    }
    req
  }

  /// One authenticated exchange. NTLM answers the server's challenge on the
  /// same agent, so the second leg rides the connection the first one opened.
  fn send(&self, method: &str, url: &str, query: &[(&str, &str)], form: Option<&[(&str, &str)]>) -> Result<Outcome> {
    let creds = match &self.auth {
      Auth::Basic(header) => return Ok(dispatch(self.request(method, url, query).set("Authorization", header), form)),
      Auth::Ntlm(creds) => creds,
    };

    let negotiate = ntlm::header_value(&ntlm::negotiate_message());
    let resp = match dispatch(self.request(method, url, query).set("Authorization", &negotiate), form) {
      Err(ureq::Error::Status(401, resp)) => resp,
      other => return Ok(other),
    };

    let token = resp.all("WWW-Authenticate").into_iter().find_map(ntlm::challenge_token);
    // drain so the connection goes back to the pool
    let _ = resp.into_string();
    let Some(token) = token else {
      return Err(SyncError::LoginFailed.into());
    };

    let challenge = ntlm::parse_challenge(&token).context("reading the NTLM challenge")?;
    let timestamp = ntlm::server_timestamp(&challenge.target_info).unwrap_or_else(ntlm::filetime_now);
    let message = ntlm::authenticate_message(creds, &challenge, ntlm::random_client_challenge(), timestamp)?;
    debug!(%url, domain = %creds.domain, "answering NTLM challenge");

    Ok(dispatch(
      self.request(method, url, query).set("Authorization", &ntlm::header_value(&message)),
      form,
    ))
  }

  fn finish(&self, method: &str, path: &str, outcome: Outcome) -> Result<String> {
    let body = match outcome {
      Ok(resp) => resp.into_string().with_context(|| format!("reading {method} {path}"))?,
      Err(ureq::Error::Status(code, resp)) => {
        let body = resp.into_string().unwrap_or_default();
        self.capture(method, path, &body);
        anyhow::bail!("{method} {path} failed with HTTP {code}")
      }
      Err(err) => return Err(anyhow::Error::new(err).context(format!("{method} {path}"))),
    };

    self.capture(method, path, &body);
    Ok(body)
  }

  fn capture(&self, method: &str, path: &str, body: &str) {
    if let Some(dump) = &self.dump {
      if let Err(err) = dump.write(method, path, body) {
        tracing::warn!(error = %err, "could not write debug html");
      }
    }
  }
}

fn dispatch(req: ureq::Request, form: Option<&[(&str, &str)]>) -> Outcome {
  match form {
    Some(fields) => req.send_form(fields),
    None => req.call(),
  }
}

/// Scheme and host of the page login settled on.
pub fn login_origin(final_url: &str, failure_marker: &str) -> Result<String> {
  let origin = RE_ORIGIN
    .captures(final_url)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().to_string())
    .with_context(|| format!("unexpected login url {final_url}"))?;

  if origin.contains(failure_marker) {
    return Err(SyncError::LoginFailed.into());
  }

  Ok(origin)
}

impl LegacyTransport for HttpTransport {
  fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
    let url = format!("{}{}", self.base_url(), path);
    debug!(%url, ?query, "legacy GET");

    let outcome = self.send("GET", &url, query, None)?;
    self.finish("GET", path, outcome)
  }

  fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<String> {
    let url = format!("{}{}", self.base_url(), path);
    debug!(%url, fields = form.len(), "legacy POST");

    let outcome = self.send("POST", &url, &[], Some(form))?;

    self.finish("POST", path, outcome)
  }
}
