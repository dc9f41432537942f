// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: NTLMv2 message codec for the legacy system's Windows-integrated authentication
// role: legacy/auth
// inputs: Domain credentials; the server's CHALLENGE message from WWW-Authenticate
// outputs: NEGOTIATE and AUTHENTICATE messages (raw bytes) and their header values
// invariants:
// - Strings on the wire are UTF-16LE; the NTLM_NEGOTIATE_UNICODE flag is always offered
// - Only NTLMv2 responses are produced; LM/NTLMv1 are never sent
// - The server's MsvAvTimestamp is echoed when present, otherwise the local clock is used
// errors: Truncated or foreign challenge messages are rejected with the offending field named
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::{Context, Result, anyhow, ensure};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;
use rand::Rng;

type HmacMd5 = Hmac<Md5>;

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";
const NEGOTIATE: u32 = 1;
const CHALLENGE: u32 = 2;
const AUTHENTICATE: u32 = 3;

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;
const NEGOTIATE_128: u32 = 0x2000_0000;
const NEGOTIATE_56: u32 = 0x8000_0000;

pub const CLIENT_FLAGS: u32 = NEGOTIATE_UNICODE
  | REQUEST_TARGET
  | NEGOTIATE_NTLM
  | NEGOTIATE_ALWAYS_SIGN
  | NEGOTIATE_EXTENDED_SESSIONSECURITY
  | NEGOTIATE_TARGET_INFO
  | NEGOTIATE_128
  | NEGOTIATE_56;

const AV_EOL: u16 = 0;
const AV_TIMESTAMP: u16 = 7;

/// 100ns ticks between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET: u64 = 116_444_736_000_000_000;

const AUTHENTICATE_HEADER_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtlmCredentials {
  pub domain: String,
  pub username: String,
  pub password: String,
}

impl NtlmCredentials {
  /// `DOMAIN\user` wins over a separately configured domain.
  pub fn new(username: &str, password: &str, domain: &str) -> Self {
    let (domain, username) = match username.split_once('\\') {
      Some((d, u)) => (d, u),
      None => (domain, username),
    };

    Self {
      domain: domain.to_string(),
      username: username.to_string(),
      password: password.to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
  pub flags: u32,
  pub server_challenge: [u8; 8],
  pub target_info: Vec<u8>,
}

fn utf16le(s: &str) -> Vec<u8> {
  s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16]> {
  let mut mac = HmacMd5::new_from_slice(key).map_err(|err| anyhow!("hmac-md5 key: {err}"))?;
  for part in parts {
    mac.update(part);
  }

  let mut out = [0u8; 16];
  out.copy_from_slice(&mac.finalize().into_bytes());
  Ok(out)
}

pub fn nt_hash(password: &str) -> [u8; 16] {
  let mut out = [0u8; 16];
  out.copy_from_slice(&Md4::digest(utf16le(password)));
  out
}

pub fn ntowf_v2(creds: &NtlmCredentials) -> Result<[u8; 16]> {
  let identity = utf16le(&format!("{}{}", creds.username.to_uppercase(), creds.domain));
  hmac_md5(&nt_hash(&creds.password), &[&identity])
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
  bytes.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
  bytes.get(at..at + 4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Payload slice addressed by the (len, max_len, offset) field at `at`.
fn read_field<'b>(bytes: &'b [u8], at: usize, name: &str) -> Result<&'b [u8]> {
  let len = read_u16(bytes, at).with_context(|| format!("truncated {name} field"))? as usize;
  let offset = read_u32(bytes, at + 4).with_context(|| format!("truncated {name} field"))? as usize;

  bytes
    .get(offset..offset + len)
    .with_context(|| format!("{name} points outside the message"))
}

fn push_field(header: &mut Vec<u8>, len: usize, offset: usize) {
  header.extend_from_slice(&(len as u16).to_le_bytes());
  header.extend_from_slice(&(len as u16).to_le_bytes());
  header.extend_from_slice(&(offset as u32).to_le_bytes());
}

pub fn negotiate_message() -> Vec<u8> {
  let mut msg = Vec::with_capacity(32);
  msg.extend_from_slice(SIGNATURE);
  msg.extend_from_slice(&NEGOTIATE.to_le_bytes());
  msg.extend_from_slice(&CLIENT_FLAGS.to_le_bytes());
  // empty domain and workstation
  push_field(&mut msg, 0, 32);
  push_field(&mut msg, 0, 32);
  msg
}

pub fn parse_challenge(bytes: &[u8]) -> Result<Challenge> {
  ensure!(bytes.get(..8) == Some(&SIGNATURE[..]), "not an NTLM message");
  ensure!(read_u32(bytes, 8) == Some(CHALLENGE), "expected an NTLM CHALLENGE message");

  let flags = read_u32(bytes, 20).context("truncated challenge flags")?;
  let mut server_challenge = [0u8; 8];
  server_challenge.copy_from_slice(bytes.get(24..32).context("truncated server challenge")?);

  let target_info = if bytes.len() >= 48 {
    read_field(bytes, 40, "target info")?.to_vec()
  } else {
    Vec::new()
  };

  Ok(Challenge {
    flags,
    server_challenge,
    target_info,
  })
}

/// MsvAvTimestamp from the challenge's target info, if the server sent one.
pub fn server_timestamp(target_info: &[u8]) -> Option<u64> {
  let mut at = 0;

  while let (Some(id), Some(len)) = (read_u16(target_info, at), read_u16(target_info, at + 2)) {
    let value = target_info.get(at + 4..at + 4 + len as usize)?;
    match id {
      AV_EOL => return None,
      AV_TIMESTAMP if value.len() == 8 => {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(value);
        return Some(u64::from_le_bytes(raw));
      }
      _ => at += 4 + len as usize,
    }
  }

  None
}

pub fn filetime_now() -> u64 {
  let unix = chrono::Utc::now();
  let ticks = unix.timestamp().max(0) as u64 * 10_000_000 + u64::from(unix.timestamp_subsec_nanos() / 100);
  ticks + FILETIME_UNIX_OFFSET
}

pub fn random_client_challenge() -> [u8; 8] {
  let mut challenge = [0u8; 8];
  rand::thread_rng().fill(&mut challenge);
  challenge
}

/// NTProofStr ‖ blob, as sent in the NtChallengeResponse field.
pub fn nt_response(key: &[u8; 16], challenge: &Challenge, client_challenge: [u8; 8], timestamp: u64) -> Result<Vec<u8>> {
  let mut blob = vec![0x01, 0x01, 0, 0, 0, 0, 0, 0];
  blob.extend_from_slice(&timestamp.to_le_bytes());
  blob.extend_from_slice(&client_challenge);
  blob.extend_from_slice(&[0; 4]);
  blob.extend_from_slice(&challenge.target_info);
  blob.extend_from_slice(&[0; 4]);

  let proof = hmac_md5(key, &[&challenge.server_challenge, &blob])?;

  let mut response = proof.to_vec();
  response.extend_from_slice(&blob);
  Ok(response)
}

pub fn authenticate_message(
  creds: &NtlmCredentials,
  challenge: &Challenge,
  client_challenge: [u8; 8],
  timestamp: u64,
) -> Result<Vec<u8>> {
  let key = ntowf_v2(creds)?;
  let nt = nt_response(&key, challenge, client_challenge, timestamp)?;

  let mut lm = hmac_md5(&key, &[&challenge.server_challenge, &client_challenge])?.to_vec();
  lm.extend_from_slice(&client_challenge);

  let domain = utf16le(&creds.domain);
  let user = utf16le(&creds.username);

  let mut payload = Vec::new();
  let mut offsets = Vec::new();
  for part in [&domain, &user, &lm, &nt] {
    offsets.push(AUTHENTICATE_HEADER_LEN + payload.len());
    payload.extend_from_slice(part);
  }
  let end = AUTHENTICATE_HEADER_LEN + payload.len();

  let mut msg = Vec::with_capacity(end);
  msg.extend_from_slice(SIGNATURE);
  msg.extend_from_slice(&AUTHENTICATE.to_le_bytes());
  push_field(&mut msg, lm.len(), offsets[2]);
  push_field(&mut msg, nt.len(), offsets[3]);
  push_field(&mut msg, domain.len(), offsets[0]);
  push_field(&mut msg, user.len(), offsets[1]);
  // workstation and session key stay empty
  push_field(&mut msg, 0, end);
  push_field(&mut msg, 0, end);
  msg.extend_from_slice(&(CLIENT_FLAGS & (challenge.flags | NEGOTIATE_UNICODE)).to_le_bytes());
  msg.extend_from_slice(&payload);

  Ok(msg)
}

pub fn header_value(message: &[u8]) -> String {
  format!("NTLM {}", BASE64_STANDARD.encode(message))
}

/// Raw CHALLENGE bytes from one `WWW-Authenticate` value; None for other schemes.
pub fn challenge_token(header: &str) -> Option<Vec<u8>> {
  let (scheme, token) = header.trim().split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("NTLM") {
    return None;
  }

  BASE64_STANDARD.decode(token.trim()).ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
  }

  fn creds() -> NtlmCredentials {
    NtlmCredentials::new("User", "Password", "Domain")
  }

  // Target info of the reference exchange: NbDomainName "Domain", NbComputerName "Server", EOL.
  fn reference_target_info() -> Vec<u8> {
    let mut info = Vec::new();
    for (id, value) in [(2u16, "Domain"), (1u16, "Server")] {
      let v = utf16le(value);
      info.extend_from_slice(&id.to_le_bytes());
      info.extend_from_slice(&(v.len() as u16).to_le_bytes());
      info.extend_from_slice(&v);
    }
    info.extend_from_slice(&[0, 0, 0, 0]);
    info
  }

  fn challenge_message(target_info: &[u8]) -> Vec<u8> {
    let mut msg = Vec::new();
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&CHALLENGE.to_le_bytes());
    push_field(&mut msg, 0, 48);
    msg.extend_from_slice(&CLIENT_FLAGS.to_le_bytes());
    msg.extend_from_slice(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
    msg.extend_from_slice(&[0; 8]);
    push_field(&mut msg, target_info.len(), 48);
    msg.extend_from_slice(target_info);
    msg
  }

  #[test]
  fn password_hashes_match_reference_values() {
    assert_eq!(hex(&nt_hash("Password")), "a4f49c406510bdcab6824ee7c30fd852");
    assert_eq!(hex(&ntowf_v2(&creds()).unwrap()), "0c868a403bfd7a93a3001ef22ef02e3f");
  }

  #[test]
  fn nt_proof_matches_reference_exchange() {
    let challenge = parse_challenge(&challenge_message(&reference_target_info())).unwrap();
    let key = ntowf_v2(&creds()).unwrap();
    let response = nt_response(&key, &challenge, [0xaa; 8], 0).unwrap();
    assert_eq!(hex(&response[..16]), "68cd0ab851e51c96aabc927bebef6a1c");
  }

  #[test]
  fn domain_prefix_in_username_is_split() {
    let c = NtlmCredentials::new("CORP\\jdoe", "pw", "IGNORED");
    assert_eq!((c.domain.as_str(), c.username.as_str()), ("CORP", "jdoe"));
  }

  #[test]
  fn negotiate_message_layout() {
    let msg = negotiate_message();
    assert_eq!(msg.len(), 32);
    assert_eq!(&msg[..8], SIGNATURE);
    assert_eq!(read_u32(&msg, 8), Some(NEGOTIATE));
    assert_eq!(read_u32(&msg, 12), Some(CLIENT_FLAGS));
  }

  #[test]
  fn challenge_parsing_reads_fields_and_rejects_foreign_messages() {
    let info = reference_target_info();
    let parsed = parse_challenge(&challenge_message(&info)).unwrap();
    assert_eq!(parsed.server_challenge, [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
    assert_eq!(parsed.target_info, info);

    assert!(parse_challenge(&negotiate_message()).is_err());
    assert!(parse_challenge(b"NTLMSSP\0\x02\0\0\0").is_err());
  }

  #[test]
  fn authenticate_message_addresses_its_payload() {
    let challenge = parse_challenge(&challenge_message(&reference_target_info())).unwrap();
    let msg = authenticate_message(&creds(), &challenge, [0xaa; 8], 0).unwrap();

    assert_eq!(read_u32(&msg, 8), Some(AUTHENTICATE));
    assert_eq!(read_field(&msg, 12, "lm").unwrap().len(), 24);
    assert_eq!(read_field(&msg, 28, "domain").unwrap(), utf16le("Domain").as_slice());
    assert_eq!(read_field(&msg, 36, "user").unwrap(), utf16le("User").as_slice());

    let nt = read_field(&msg, 20, "nt").unwrap();
    assert_eq!(nt.len(), 16 + 28 + challenge.target_info.len() + 4);
    assert_eq!(hex(&nt[..16]), "68cd0ab851e51c96aabc927bebef6a1c");
  }

  #[test]
  fn server_timestamp_is_found_in_target_info() {
    let mut info = Vec::new();
    info.extend_from_slice(&1u16.to_le_bytes());
    info.extend_from_slice(&2u16.to_le_bytes());
    info.extend_from_slice(&[0x41, 0x00]);
    info.extend_from_slice(&AV_TIMESTAMP.to_le_bytes());
    info.extend_from_slice(&8u16.to_le_bytes());
    info.extend_from_slice(&42u64.to_le_bytes());
    info.extend_from_slice(&[0, 0, 0, 0]);

    assert_eq!(server_timestamp(&info), Some(42));
    assert_eq!(server_timestamp(&reference_target_info()), None);
  }

  #[test]
  fn challenge_token_only_accepts_ntlm_scheme() {
    let header = header_value(b"abc");
    assert_eq!(challenge_token(&header), Some(b"abc".to_vec()));
    assert_eq!(challenge_token("Negotiate abc="), None);
    assert_eq!(challenge_token("NTLM"), None);
  }

  #[test]
  fn filetime_is_after_unix_epoch() {
    assert!(filetime_now() > FILETIME_UNIX_OFFSET);
    assert_ne!(random_client_challenge(), random_client_challenge());
  }
}
