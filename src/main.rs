use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use timecard_sync::cli::{Cli, normalize};
use timecard_sync::error::is_abort;
use timecard_sync::{commands, util};

fn init_tracing() {
  let filter = std::env::var("TIMECARD_LOG")
    .ok()
    .and_then(|v| EnvFilter::try_new(v).ok())
    .or_else(|| EnvFilter::try_from_default_env().ok())
    .unwrap_or_else(|| EnvFilter::new("warn"));

  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
  if cli.gen_man {
    let page = util::render_man_page::<Cli>()?;
    print!("{}", page);
    return Ok(());
  }

  // Phase 1: normalize CLI
  let cfg = normalize(cli)?;

  // Phase 2: run the selected command
  commands::run(&cfg)
}

fn main() -> ExitCode {
  dotenvy::dotenv().ok();
  init_tracing();

  match run(Cli::parse()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) if is_abort(&err) => {
      println!("Exiting...");
      ExitCode::FAILURE
    }
    Err(err) => {
      eprintln!("Error: {err:#}");
      ExitCode::FAILURE
    }
  }
}
