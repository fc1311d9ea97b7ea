//! `rjsonnet <file>`: evaluates a Jsonnet file and prints manifested JSON to
//! stdout. Exit code 0 on success; on failure, a diagnostic (with stack
//! trace) goes to stderr and the process exits non-zero.

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use rjsonnet_cli::GeneralOpts;

#[derive(Parser, Debug)]
#[clap(name = "rjsonnet", about = "Rust Jsonnet implementation")]
struct Opts {
	#[clap(flatten)]
	general: GeneralOpts,

	/// Jsonnet file to evaluate.
	input: PathBuf,
}

fn main() -> ExitCode {
	env_logger::init();
	let opts = Opts::parse();

	let state = match opts.general.configure() {
		Ok(state) => state,
		Err(e) => {
			eprintln!("{e}");
			return ExitCode::FAILURE;
		}
	};

	match rjsonnet_cli::evaluate_path(&state, &opts.input) {
		Ok(json) => {
			println!("{json}");
			ExitCode::SUCCESS
		}
		Err(trace) => {
			eprintln!("{trace}");
			ExitCode::FAILURE
		}
	}
}
