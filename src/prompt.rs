// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Operator-input capability injected into the pipeline (console in production, scripted in tests)
// role: io/prompt
// inputs: stdin lines (ConsolePrompt) or a queue of canned answers (ScriptedPrompt)
// outputs: Trimmed answers; yes/no decisions; menu choices
// side_effects: ConsolePrompt writes questions to stdout and blocks on stdin without timeout
// invariants: EOF on stdin is an operator abort (SyncError::Aborted), never an empty answer or a default
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};

use crate::error::SyncError;

pub trait Prompt {
  /// Ask a free-text question and return the trimmed answer.
  fn ask(&self, question: &str) -> Result<String>;

  /// Yes/no question; an empty answer takes `default`.
  fn confirm(&self, question: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };

    loop {
      let answer = self.ask(&format!("{question} {hint}: "))?;
      match answer.to_ascii_lowercase().as_str() {
        "" => return Ok(default),
        "y" | "yes" => return Ok(true),
        "n" | "no" => return Ok(false),
        _ => println!("Please answer y or n."),
      }
    }
  }
}

/// Reads answers from stdin.
pub struct ConsolePrompt;

impl Prompt for ConsolePrompt {
  fn ask(&self, question: &str) -> Result<String> {
    print!("{question}");
    std::io::stdout().flush().context("flushing prompt")?;

    read_answer(&mut std::io::stdin().lock())
  }
}

/// One trimmed line; a closed input stream aborts the run.
pub fn read_answer(input: &mut dyn BufRead) -> Result<String> {
  let mut line = String::new();
  let read = input.read_line(&mut line).context("reading operator input")?;
  if read == 0 {
    return Err(SyncError::Aborted.into());
  }

  Ok(line.trim().to_string())
}

/// Replays canned answers in order and records every question asked.
#[derive(Default)]
pub struct ScriptedPrompt {
  answers: RefCell<VecDeque<String>>,
  asked: RefCell<Vec<String>>,
}

impl ScriptedPrompt {
  pub fn new<I, S>(answers: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
      asked: RefCell::new(Vec::new()),
    }
  }

  pub fn asked(&self) -> Vec<String> {
    self.asked.borrow().clone()
  }

  pub fn remaining(&self) -> usize {
    self.answers.borrow().len()
  }
}

impl Prompt for ScriptedPrompt {
  fn ask(&self, question: &str) -> Result<String> {
    self.asked.borrow_mut().push(question.to_string());

    match self.answers.borrow_mut().pop_front() {
      Some(a) => Ok(a.trim().to_string()),
      None => bail!("no scripted answer left for prompt {question:?}"),
    }
  }
}

/// Numbered menu; returns the zero-based index of the chosen option.
pub fn choose(prompt: &dyn Prompt, title: &str, options: &[&str]) -> Result<usize> {
  println!("{title}");
  for (i, opt) in options.iter().enumerate() {
    println!("  {}) {}", i + 1, opt);
  }

  loop {
    let answer = prompt.ask(&format!("Choice [1-{}]: ", options.len()))?;

    match answer.parse::<usize>() {
      Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
      _ => println!("Enter a number between 1 and {}.", options.len()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn confirm_uses_default_on_empty() {
    let p = ScriptedPrompt::new([""]);
    assert!(p.confirm("Continue?", true).unwrap());
    assert_eq!(p.asked(), vec!["Continue? [Y/n]: ".to_string()]);
  }

  #[test]
  fn confirm_reasks_on_garbage() {
    let p = ScriptedPrompt::new(["maybe", "N"]);
    assert!(!p.confirm("Continue?", true).unwrap());
    assert_eq!(p.asked().len(), 2);
  }

  #[test]
  fn choose_rejects_out_of_range() {
    let p = ScriptedPrompt::new(["0", "9", "2"]);
    let idx = choose(&p, "Pick", &["a", "b", "c"]).unwrap();
    assert_eq!(idx, 1);
    assert_eq!(p.remaining(), 0);
  }

  #[test]
  fn closed_input_aborts_instead_of_answering() {
    let mut input: &[u8] = b"";
    let err = read_answer(&mut input).unwrap_err();
    assert!(crate::error::is_abort(&err));
  }

  #[test]
  fn blank_line_is_an_empty_answer() {
    let mut input: &[u8] = b"  \n";
    assert_eq!(read_answer(&mut input).unwrap(), "");
    let mut input: &[u8] = b" y \r\n";
    assert_eq!(read_answer(&mut input).unwrap(), "y");
  }

  #[test]
  fn scripted_prompt_errors_when_exhausted() {
    let p = ScriptedPrompt::new(Vec::<String>::new());
    assert!(p.ask("anything? ").is_err());
  }
}
