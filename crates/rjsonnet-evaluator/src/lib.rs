//! Call-by-need Jsonnet evaluator: desugaring, the evaluator itself, the
//! object/thunk model, the JSON manifester, and a minimal `std`.

mod ctx;
pub mod error;
mod evaluate;
pub mod function;
mod import;
mod obj;
pub mod stdlib;
pub mod val;

use std::{
	cell::{Ref, RefCell, RefMut},
	fmt::Debug,
	path::Path,
	rc::Rc,
};

pub use ctx::Context;
use crate::throw;
use error::{Error::*, LocError, Result, StackTraceElement};
pub use function::CallLocation;
use hashbrown::HashMap;
pub use import::{DummyImportResolver, FileImportResolver, ImportResolver};
pub use obj::{FieldValue, ObjAssert, ObjField, ObjValue};
pub use rjsonnet_interner::{IBytes, IStr};
use rjsonnet_parser::{LocExpr, ParserSettings, Source, SourcePath};
use rustc_hash::FxBuildHasher;
pub use val::{ManifestFormat, Thunk, Val};

/// Per-canonical-path cache entry: import resolution is cached per
/// canonical path in a process-wide import cache.
#[derive(Default, Clone)]
struct FileCache {
	text: Option<IStr>,
	bytes: Option<IBytes>,
	parsed: Option<LocExpr>,
	/// Guards against a true import cycle (a file whose top-level
	/// expression, evaluated eagerly, imports itself again before it has a
	/// value) — distinct from the mutually-recursive-but-lazy case that
	/// thunks already handle safely.
	evaluating: bool,
	evaluated: Option<Val>,
}

/// Tunable limits and host hooks: no separate config-file format, just
/// fields an embedder sets directly.
pub struct EvaluationSettings {
	/// Caps reduction depth so runaway recursion fails with `StackOverflow`
	/// instead of exhausting the host stack.
	pub max_stack: usize,
	/// Caps how many frames a propagating error's trace keeps.
	pub max_trace: usize,
	pub import_resolver: Box<dyn ImportResolver>,
	pub manifest_format: ManifestFormat,
	/// `-V name=value`-style external variables, read by `std.extVar`.
	pub ext_vars: HashMap<IStr, IStr, FxBuildHasher>,
}
impl Default for EvaluationSettings {
	fn default() -> Self {
		Self {
			max_stack: 512,
			max_trace: 20,
			import_resolver: Box::new(DummyImportResolver),
			manifest_format: ManifestFormat::default(),
			ext_vars: HashMap::default(),
		}
	}
}

#[derive(Default)]
struct EvaluationData {
	stack_depth: usize,
	files: HashMap<SourcePath, FileCache, FxBuildHasher>,
	/// Built once on first use and shared by every file: `std` is bound at
	/// the root environment of every file that evaluates.
	std: Option<ObjValue>,
	/// Polled at thunk-force boundaries so a host can interrupt a long
	/// evaluation between reductions.
	cancelled: bool,
}

/// Maintains the import cache, stack-depth/trace bookkeeping, and
/// evaluation settings for one evaluation session. Cheap to clone: all
/// state lives behind one `Rc`.
#[derive(Clone)]
pub struct State(Rc<StateInner>);
struct StateInner {
	data: RefCell<EvaluationData>,
	settings: RefCell<EvaluationSettings>,
}
impl Default for State {
	fn default() -> Self {
		Self::new(EvaluationSettings::default())
	}
}

impl State {
	pub fn new(settings: EvaluationSettings) -> Self {
		Self(Rc::new(StateInner {
			data: RefCell::default(),
			settings: RefCell::new(settings),
		}))
	}

	fn data(&self) -> Ref<'_, EvaluationData> {
		self.0.data.borrow()
	}
	fn data_mut(&self) -> RefMut<'_, EvaluationData> {
		self.0.data.borrow_mut()
	}
	pub fn settings(&self) -> Ref<'_, EvaluationSettings> {
		self.0.settings.borrow()
	}
	pub fn settings_mut(&self) -> RefMut<'_, EvaluationSettings> {
		self.0.settings.borrow_mut()
	}
}

/// Stack-depth accounting, shared by thunk forcing, function application,
/// and manifestation.
impl State {
	/// Runs `f` as a new stack frame tagged with `loc`; on error, appends a
	/// [`StackTraceElement`] describing this frame, so every error carries a
	/// stack trace of the call/assert/field sites it passed through.
	pub fn push<T>(
		&self,
		loc: CallLocation<'_>,
		frame_desc: impl FnOnce() -> String,
		f: impl FnOnce() -> Result<T>,
	) -> Result<T> {
		self.enter_frame()?;
		let result = f();
		self.data_mut().stack_depth -= 1;
		self.annotate(loc.0.cloned(), frame_desc, result)
	}

	/// Like [`Self::push`], but with no call-site span (native calls,
	/// thunk forces, manifestation).
	pub fn push_description<T>(
		&self,
		frame_desc: impl FnOnce() -> String,
		f: impl FnOnce() -> Result<T>,
	) -> Result<T> {
		self.push(CallLocation::native(), frame_desc, f)
	}

	fn enter_frame(&self) -> Result<()> {
		let mut data = self.data_mut();
		if data.stack_depth >= self.max_stack() {
			drop(data);
			throw!(StackOverflow);
		}
		data.stack_depth += 1;
		Ok(())
	}

	fn annotate<T>(
		&self,
		location: Option<rjsonnet_parser::ExprLocation>,
		frame_desc: impl FnOnce() -> String,
		result: Result<T>,
	) -> Result<T> {
		match result {
			Err(mut err) => {
				if err.trace().0.len() < self.max_trace() {
					err.trace_mut().0.push(StackTraceElement {
						location,
						desc: frame_desc(),
					});
				}
				Err(err)
			}
			ok => ok,
		}
	}

	/// Lets an embedder request that evaluation stop at the next
	/// convenient point; checked at thunk-force boundaries.
	pub fn cancel(&self) {
		self.data_mut().cancelled = true;
	}
	pub(crate) fn check_cancelled(&self) -> Result<()> {
		if self.data().cancelled {
			throw!(RuntimeError("evaluation cancelled".into()));
		}
		Ok(())
	}
}

/// Import resolution and the per-path AST/value cache.
impl State {
	pub fn resolve_from(&self, from: &SourcePath, path: &str) -> Result<SourcePath> {
		self.import_resolver().resolve_from(from, Path::new(path))
	}
	pub fn resolve(&self, path: impl AsRef<Path>) -> Result<SourcePath> {
		self.import_resolver().resolve(path.as_ref())
	}

	fn ensure_text(&self, path: &SourcePath) -> Result<IStr> {
		if let Some(text) = self.data().files.get(path).and_then(|f| f.text.clone()) {
			return Ok(text);
		}
		let raw = self.import_resolver().load_file_contents(path)?;
		let text: IStr = std::str::from_utf8(&raw)
			.map_err(|_| ImportBadFileUtf8(path.clone()))?
			.into();
		self.data_mut()
			.files
			.entry(path.clone())
			.or_insert_with(FileCache::default)
			.text = Some(text.clone());
		Ok(text)
	}

	fn ensure_bytes(&self, path: &SourcePath) -> Result<IBytes> {
		if let Some(bytes) = self.data().files.get(path).and_then(|f| f.bytes.clone()) {
			return Ok(bytes);
		}
		let bytes = if let Some(text) = self.data().files.get(path).and_then(|f| f.text.clone()) {
			text.cast_bytes()
		} else {
			IBytes::from(self.import_resolver().load_file_contents(path)?)
		};
		self.data_mut()
			.files
			.entry(path.clone())
			.or_insert_with(FileCache::default)
			.bytes = Some(bytes.clone());
		Ok(bytes)
	}

	fn ensure_parsed(&self, path: &SourcePath, source: &Source) -> Result<LocExpr> {
		if let Some(parsed) = self.data().files.get(path).and_then(|f| f.parsed.clone()) {
			return Ok(parsed);
		}
		let parsed = rjsonnet_parser::parse(source.code(), &ParserSettings { source: source.clone() })
			.map_err(|e| ImportSyntaxError {
				path: source.clone(),
				message: e.to_string(),
			})?;
		self.data_mut()
			.files
			.entry(path.clone())
			.or_insert_with(FileCache::default)
			.parsed = Some(parsed.clone());
		Ok(parsed)
	}

	/// `import "p"` resolved against `from`'s directory.
	pub fn import_from(&self, from: &SourcePath, path: &str) -> Result<Val> {
		let resolved = self.resolve_from(from, path)?;
		self.import_resolved(resolved)
	}
	/// Top-level `import`, with no importing file (the CLI's initial
	/// argument).
	pub fn import(&self, path: impl AsRef<Path>) -> Result<Val> {
		let resolved = self.resolve(path)?;
		self.import_resolved(resolved)
	}

	/// Evaluates (and caches) the top-level value at an already-resolved
	/// path, reusing a previous result if this exact path was imported
	/// before: repeated imports of the same path return the same AST, and
	/// the evaluated value is memoized the same way.
	pub fn import_resolved(&self, path: SourcePath) -> Result<Val> {
		if let Some(v) = self.data().files.get(&path).and_then(|f| f.evaluated.clone()) {
			return Ok(v);
		}
		let text = self.ensure_text(&path)?;
		let source = Source::new(path.clone(), text);
		let parsed = self.ensure_parsed(&path, &source)?;
		{
			let mut data = self.data_mut();
			let entry = data
				.files
				.get_mut(&path)
				.expect("inserted by ensure_text/ensure_parsed");
			if entry.evaluating {
				throw!(InfiniteRecursionDetected);
			}
			entry.evaluating = true;
		}
		let ctx = self.create_default_context(source);
		let result = evaluate::evaluate(self.clone(), ctx, &parsed);
		let mut data = self.data_mut();
		let entry = data.files.get_mut(&path).expect("still present");
		entry.evaluating = false;
		if let Ok(v) = &result {
			entry.evaluated = Some(v.clone());
		}
		result
	}

	/// `importstr "p"`: raw file contents, decoded as UTF-8.
	pub fn import_resolved_str(&self, path: SourcePath) -> Result<IStr> {
		self.ensure_text(&path)
	}
	/// `importbin "p"`: raw file bytes.
	pub fn import_resolved_bin(&self, path: SourcePath) -> Result<IBytes> {
		self.ensure_bytes(&path)
	}
}

/// Entry points a host calls directly, without going through `import`.
impl State {
	/// Parses and evaluates `code` as a standalone, virtual-path file
	/// (`jsonnet eval`-style snippet, or a unit test).
	pub fn evaluate_snippet(&self, name: impl Into<IStr>, code: impl Into<IStr>) -> Result<Val> {
		let code = code.into();
		let source = Source::new_virtual(name.into(), code.clone());
		let parsed = rjsonnet_parser::parse(&code, &ParserSettings { source: source.clone() }).map_err(|e| {
			ImportSyntaxError {
				path: source.clone(),
				message: e.to_string(),
			}
		})?;
		evaluate::evaluate(self.clone(), self.create_default_context(source), &parsed)
	}

	/// Resolves and evaluates a real file from disk (or whatever
	/// [`ImportResolver`] is installed).
	pub fn evaluate_file(&self, path: impl AsRef<Path>) -> Result<Val> {
		self.import(path)
	}

	/// Builds the root lexical context for a freshly loaded file: no
	/// bindings but `std`, bound at the root environment.
	pub fn create_default_context(&self, source: Source) -> Context {
		let std_obj = self.std_object();
		Context::new_for_source(source).extend([("std".into(), Thunk::evaluated(Val::Obj(std_obj)))])
	}

	fn std_object(&self) -> ObjValue {
		if let Some(obj) = self.data().std.clone() {
			return obj;
		}
		let obj = stdlib::build();
		self.data_mut().std = Some(obj.clone());
		obj
	}

	/// Forces `val` recursively into JSON text, using the currently
	/// configured [`ManifestFormat`].
	pub fn manifest(&self, val: &Val) -> Result<IStr> {
		val.manifest(self, &self.manifest_format())
	}

	/// # Panics
	/// Never under normal operation; `Debug` formatting of a [`LocError`]
	/// is infallible for an in-memory `String` target.
	pub fn stringify_err(&self, e: &LocError) -> String {
		format!("{e:?}")
	}
}

/// Settings accessors.
impl State {
	pub fn import_resolver(&self) -> Ref<'_, dyn ImportResolver> {
		Ref::map(self.settings(), |s| &*s.import_resolver)
	}
	pub fn set_import_resolver(&self, resolver: Box<dyn ImportResolver>) {
		self.settings_mut().import_resolver = resolver;
	}

	pub fn manifest_format(&self) -> ManifestFormat {
		self.settings().manifest_format.clone()
	}
	pub fn set_manifest_format(&self, format: ManifestFormat) {
		self.settings_mut().manifest_format = format;
	}

	pub fn max_stack(&self) -> usize {
		self.settings().max_stack
	}
	pub fn set_max_stack(&self, max: usize) {
		self.settings_mut().max_stack = max;
	}
	pub fn max_trace(&self) -> usize {
		self.settings().max_trace
	}
	pub fn set_max_trace(&self, max: usize) {
		self.settings_mut().max_trace = max;
	}

	pub fn ext_var(&self, name: &str) -> Option<IStr> {
		self.settings().ext_vars.get(name).cloned()
	}
	pub fn set_ext_var(&self, name: IStr, value: IStr) {
		self.settings_mut().ext_vars.insert(name, value);
	}
}

impl Debug for State {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "State")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn eval(src: &str) -> Result<Val> {
		State::default().evaluate_snippet("<test>", src)
	}
	fn manifest(src: &str) -> String {
		let s = State::default();
		let v = s.evaluate_snippet("<test>", src).unwrap();
		s.manifest(&v).unwrap().to_string()
	}

	#[test]
	fn arithmetic_and_functions() {
		assert_eq!(manifest("((function(x) x * x)(5)) == 25"), "true");
		assert_eq!(
			manifest("local max(a,b) = if a > b then a else b; max(4,8)"),
			"8"
		);
	}

	#[test]
	fn object_merge() {
		assert_eq!(manifest("{a: 1} + {a: 2, b: 3}"), "{\n    \"a\": 2,\n    \"b\": 3\n}");
	}

	#[test]
	fn hidden_field_elided() {
		assert_eq!(manifest("{a: 1, b:: 2}"), "{\n    \"a\": 1\n}");
	}

	#[test]
	fn self_reference() {
		assert_eq!(manifest("local x = {a: 1, b: self.a + 1}; x.b"), "2");
	}

	#[test]
	fn inheritance_overrides_self() {
		assert_eq!(
			manifest("local base = {a: 1, b: self.a}; base + {a: 10}"),
			"{\n    \"a\": 10,\n    \"b\": 10\n}"
		);
	}

	#[test]
	fn laziness_skips_unused_errors() {
		assert_eq!(manifest("local _ = error 'x'; 1"), "1");
		assert_eq!(manifest("{a: error 'x', b: 1}.b"), "1");
	}

	#[test]
	fn thunk_cycle_is_an_error() {
		let err = eval("local x = x; x").unwrap_err();
		assert!(matches!(
			err.error(),
			crate::error::Error::InfiniteRecursionDetected
		));
	}

	#[test]
	fn determinism() {
		let a = manifest("{b: 2, a: 1, c: [1,2,3]}");
		let b = manifest("{b: 2, a: 1, c: [1,2,3]}");
		assert_eq!(a, b);
	}

	#[test]
	fn std_is_available() {
		assert_eq!(manifest("std.length([1,2,3])"), "3");
		assert_eq!(manifest("std.type(null)"), "\"null\"");
	}

	#[test]
	fn import_resolves_relative_to_caller() {
		struct InMemory;
		impl ImportResolver for InMemory {
			fn resolve_from(&self, _from: &SourcePath, path: &Path) -> Result<SourcePath> {
				self.resolve(path)
			}
			fn resolve(&self, path: &Path) -> Result<SourcePath> {
				Ok(SourcePath::Virtual(path.to_string_lossy().into_owned().into()))
			}
			fn load_file_contents(&self, resolved: &SourcePath) -> Result<Vec<u8>> {
				match resolved {
					SourcePath::Virtual(name) if name.as_str() == "a.jsonnet" => Ok(b"1 + 2".to_vec()),
					_ => Err(ImportFileNotFound(resolved.clone(), resolved.to_string()).into()),
				}
			}
		}
		let s = State::new(EvaluationSettings {
			import_resolver: Box::new(InMemory),
			..EvaluationSettings::default()
		});
		let v = s.evaluate_snippet("b.jsonnet", "import \"a.jsonnet\"").unwrap();
		assert_eq!(s.manifest(&v).unwrap().to_string(), "3");
	}

	/// A `local` binding must be forced at most once no matter how many
	/// times it's referenced — call-by-need, not call-by-name. Proven by
	/// injecting a host native function that counts its own calls, binding
	/// it once, and reading the bound name three times.
	#[test]
	fn thunk_is_forced_only_once() {
		use crate::function::{FuncVal, NativeDesc};
		use std::cell::Cell;

		let calls = Rc::new(Cell::new(0usize));
		let counted = calls.clone();
		let bump = FuncVal::Native(Rc::new(NativeDesc {
			name: "bump".into(),
			params: Vec::new(),
			f: Box::new(move |_s, _loc, _args| {
				counted.set(counted.get() + 1);
				Ok(Val::Num(counted.get() as f64))
			}),
		}));

		let s = State::default();
		let source = Source::new_virtual("<test>".into(), "local x = bump(); [x, x, x]".into());
		let parsed = rjsonnet_parser::parse(
			"local x = bump(); [x, x, x]",
			&ParserSettings { source: source.clone() },
		)
		.unwrap();
		let ctx = s
			.create_default_context(source)
			.extend([("bump".into(), Thunk::evaluated(Val::Func(bump)))]);

		let v = evaluate::evaluate(s.clone(), ctx, &parsed).unwrap();
		assert_eq!(s.manifest(&v).unwrap().to_string(), "[\n    1,\n    1,\n    1\n]");
		assert_eq!(calls.get(), 1, "x must be forced only once regardless of how often it's read");
	}
}
