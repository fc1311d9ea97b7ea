//! Flags and `State` wiring shared by every rjsonnet binary.
//!
//! A binary embeds [`GeneralOpts`] into its own `clap` derive and calls
//! [`GeneralOpts::configure`] to get a ready-to-use
//! [`rjsonnet_evaluator::State`] — the flag parsing itself never touches the
//! evaluator directly, so alternate front ends (tests, a future language
//! server) can reuse the same option set without going through a process.

use std::path::PathBuf;

use clap::Args;
use rjsonnet_evaluator::{
	EvaluationSettings, FileImportResolver, IStr, ImportResolver, ManifestFormat, State,
};
use thiserror::Error;

/// Flags controlling evaluator limits, output shape, and external
/// variables — one `-V name=value` per external variable, mirroring
/// `std.extVar`.
#[derive(Args, Debug, Clone)]
pub struct GeneralOpts {
	/// Maximum evaluation stack depth before failing with `StackOverflow`.
	#[clap(long, default_value = "512")]
	pub max_stack: usize,

	/// Maximum number of stack-trace frames kept on a propagating error.
	#[clap(long, default_value = "20")]
	pub max_trace: usize,

	/// Number of spaces used to indent manifested JSON; `0` selects
	/// single-line output.
	#[clap(long, default_value = "4")]
	pub indent: usize,

	/// `name=value` external variable, readable from Jsonnet as
	/// `std.extVar("name")`. May be repeated.
	#[clap(short = 'V', long = "ext-str", value_name = "name=value")]
	pub ext_str: Vec<String>,
}

#[derive(Debug, Error)]
pub enum OptsError {
	#[error("invalid external variable (expected name=value): {0}")]
	BadExtVar(String),
}

impl GeneralOpts {
	/// Builds a [`State`] configured per these flags, with imports resolved
	/// against the real filesystem — other hosts may substitute an
	/// in-memory resolver for testing, but the CLI is the one host that
	/// doesn't.
	pub fn configure(&self) -> Result<State, OptsError> {
		let mut ext_vars = hashbrown::HashMap::default();
		for entry in &self.ext_str {
			let (name, value) = entry
				.split_once('=')
				.ok_or_else(|| OptsError::BadExtVar(entry.clone()))?;
			ext_vars.insert(IStr::from(name), IStr::from(value));
		}
		let settings = EvaluationSettings {
			max_stack: self.max_stack,
			max_trace: self.max_trace,
			import_resolver: Box::new(FileImportResolver) as Box<dyn ImportResolver>,
			manifest_format: if self.indent == 0 {
				ManifestFormat::Minimal
			} else {
				ManifestFormat::Json { padding: self.indent }
			},
			ext_vars,
		};
		Ok(State::new(settings))
	}
}

/// Evaluates and manifests `path` under `state`, the shared body behind
/// every binary's `main`.
pub fn evaluate_path(state: &State, path: &PathBuf) -> Result<IStr, String> {
	let val = state.evaluate_file(path).map_err(|e| state.stringify_err(&e))?;
	state.manifest(&val).map_err(|e| state.stringify_err(&e))
}
