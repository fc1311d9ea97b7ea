//! Runtime values and JSON manifestation.

use std::{
	cell::RefCell,
	fmt::{self, Debug},
	rc::Rc,
};

use rjsonnet_interner::IStr;

use crate::{
	error::{Error::*, Result},
	function::FuncVal,
	obj::ObjValue,
	throw, State,
};

/// The type tag of a [`Val`], used in error messages and by `std.type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValType {
	Null,
	Bool,
	Number,
	String,
	Array,
	Object,
	Function,
}
impl fmt::Display for ValType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Null => "null",
			Self::Bool => "boolean",
			Self::Number => "number",
			Self::String => "string",
			Self::Array => "array",
			Self::Object => "object",
			Self::Function => "function",
		})
	}
}

/// A fully evaluated weak-head value.
///
/// `Arr`/`Obj` hold thunks, not values: forcing a `Val` to this point never
/// forces its children.
#[derive(Clone)]
pub enum Val {
	Null,
	Bool(bool),
	Num(f64),
	Str(IStr),
	Arr(Rc<[Thunk]>),
	Obj(ObjValue),
	Func(FuncVal),
}
impl Debug for Val {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => write!(f, "null"),
			Self::Bool(b) => write!(f, "{b}"),
			Self::Num(n) => write!(f, "{n}"),
			Self::Str(s) => write!(f, "{s:?}"),
			Self::Arr(a) => write!(f, "[{} elements]", a.len()),
			Self::Obj(_) => write!(f, "<object>"),
			Self::Func(fun) => write!(f, "<function {}>", fun.name()),
		}
	}
}

impl Val {
	pub fn value_type(&self) -> ValType {
		match self {
			Self::Null => ValType::Null,
			Self::Bool(_) => ValType::Bool,
			Self::Num(_) => ValType::Number,
			Self::Str(_) => ValType::String,
			Self::Arr(_) => ValType::Array,
			Self::Obj(_) => ValType::Object,
			Self::Func(_) => ValType::Function,
		}
	}

	pub fn as_bool(&self) -> Result<bool> {
		match self {
			Self::Bool(b) => Ok(*b),
			v => Err(TypeMismatch("boolean", vec![ValType::Bool], v.value_type()).into()),
		}
	}
	pub fn as_num(&self) -> Result<f64> {
		match self {
			Self::Num(n) => Ok(*n),
			v => Err(TypeMismatch("number", vec![ValType::Number], v.value_type()).into()),
		}
	}
	pub fn as_str(&self) -> Result<IStr> {
		match self {
			Self::Str(s) => Ok(s.clone()),
			v => Err(TypeMismatch("string", vec![ValType::String], v.value_type()).into()),
		}
	}
	pub fn as_arr(&self) -> Result<Rc<[Thunk]>> {
		match self {
			Self::Arr(a) => Ok(a.clone()),
			v => Err(TypeMismatch("array", vec![ValType::Array], v.value_type()).into()),
		}
	}
	pub fn as_obj(&self) -> Result<ObjValue> {
		match self {
			Self::Obj(o) => Ok(o.clone()),
			v => Err(TypeMismatch("object", vec![ValType::Object], v.value_type()).into()),
		}
	}
	pub fn as_func(&self) -> Result<FuncVal> {
		match self {
			Self::Func(f) => Ok(f.clone()),
			v => Err(OnlyFunctionsCanBeCalledGot(v.value_type()).into()),
		}
	}

	/// Structural equality over manifested shape: functions never compare
	/// equal, not even to another function.
	pub fn equals(&self, s: &State, other: &Self) -> Result<bool> {
		Ok(match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Num(a), Self::Num(b)) => a == b,
			(Self::Str(a), Self::Str(b)) => a == b,
			(Self::Arr(a), Self::Arr(b)) => {
				if a.len() != b.len() {
					return Ok(false);
				}
				for (x, y) in a.iter().zip(b.iter()) {
					if !x.force(s)?.equals(s, &y.force(s)?)? {
						return Ok(false);
					}
				}
				true
			}
			(Self::Obj(a), Self::Obj(b)) => {
				let (af, bf) = (a.visible_fields(), b.visible_fields());
				if af != bf {
					return Ok(false);
				}
				for name in af {
					let av = a.get(s, &name)?.expect("field just listed").force(s)?;
					let bv = b.get(s, &name)?.expect("field just listed").force(s)?;
					if !av.equals(s, &bv)? {
						return Ok(false);
					}
				}
				true
			}
			_ => false,
		})
	}
}

type ThunkFn = Box<dyn FnOnce() -> Result<Val>>;
enum ThunkState {
	/// Not forced yet.
	Pending(ThunkFn),
	/// Currently being forced: re-entry means the thunk depends on its own
	/// value, which is a cycle rather than legitimate recursion.
	Evaluating,
	/// Forced once, result memoized forever — exactly-once evaluation per
	/// thunk is an invariant.
	Done(Result<Val>),
}

/// A suspended, memoizing computation.
#[derive(Clone)]
pub struct Thunk(Rc<RefCell<ThunkState>>);
impl Debug for Thunk {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &*self.0.borrow() {
			ThunkState::Pending(_) => write!(f, "Thunk(pending)"),
			ThunkState::Evaluating => write!(f, "Thunk(evaluating)"),
			ThunkState::Done(Ok(v)) => write!(f, "Thunk({v:?})"),
			ThunkState::Done(Err(_)) => write!(f, "Thunk(errored)"),
		}
	}
}
impl Thunk {
	pub fn evaluated(v: Val) -> Self {
		Self(Rc::new(RefCell::new(ThunkState::Done(Ok(v)))))
	}
	pub fn errored(e: crate::error::LocError) -> Self {
		Self(Rc::new(RefCell::new(ThunkState::Done(Err(e)))))
	}
	pub fn new(f: impl FnOnce() -> Result<Val> + 'static) -> Self {
		Self(Rc::new(RefCell::new(ThunkState::Pending(Box::new(f)))))
	}

	/// Forces this thunk, memoizing the outcome (ok or error).
	pub fn force(&self, s: &State) -> Result<Val> {
		s.check_cancelled()?;
		let f = {
			let mut state = self.0.borrow_mut();
			match &mut *state {
				ThunkState::Done(r) => return r.clone(),
				ThunkState::Evaluating => throw!(InfiniteRecursionDetected),
				ThunkState::Pending(_) => {
					let ThunkState::Pending(f) =
						std::mem::replace(&mut *state, ThunkState::Evaluating)
					else {
						unreachable!()
					};
					f
				}
			}
		};
		let result = s.push_description(|| "thunk force".to_owned(), f);
		*self.0.borrow_mut() = ThunkState::Done(result.clone());
		result
	}
}

/// Output format selected for [`State::manifest`]. The evaluator stays
/// agnostic of how bytes get written to a terminal, only of what counts as
/// valid JSON.
#[derive(Clone, Debug)]
pub enum ManifestFormat {
	/// Multi-line, `padding`-space indented JSON.
	Json { padding: usize },
	/// Single-line, minimal JSON.
	Minimal,
}
impl Default for ManifestFormat {
	fn default() -> Self {
		Self::Json { padding: 4 }
	}
}

impl Val {
	pub fn manifest(&self, s: &State, fmt: &ManifestFormat) -> Result<IStr> {
		let mut out = String::new();
		let mut visiting = Vec::new();
		self.write_json(s, fmt, &mut out, 0, &mut visiting)?;
		Ok(out.into())
	}

	fn write_json(
		&self,
		s: &State,
		fmt: &ManifestFormat,
		out: &mut String,
		depth: usize,
		visiting: &mut Vec<usize>,
	) -> Result<()> {
		match self {
			Self::Null => out.push_str("null"),
			Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
			Self::Num(n) => write_number(*n, out),
			Self::Str(str) => write_json_string(str, out),
			Self::Func(_) => throw!(RuntimeError("tried to manifest function value".into())),
			Self::Arr(arr) => {
				let ptr = Rc::as_ptr(arr) as *const () as usize;
				if visiting.contains(&ptr) {
					throw!(InfiniteManifestRecursion);
				}
				visiting.push(ptr);
				if arr.is_empty() {
					out.push_str("[]");
				} else {
					out.push('[');
					newline_indent(out, fmt, depth + 1);
					for (i, el) in arr.iter().enumerate() {
						if i != 0 {
							out.push(',');
							newline_indent(out, fmt, depth + 1);
						}
						el.force(s)?.write_json(s, fmt, out, depth + 1, visiting)?;
					}
					newline_indent(out, fmt, depth);
					out.push(']');
				}
				visiting.pop();
			}
			Self::Obj(obj) => {
				let ptr = obj.identity();
				if visiting.contains(&ptr) {
					throw!(InfiniteManifestRecursion);
				}
				visiting.push(ptr);
				obj.run_asserts(s)?;
				let fields = obj.visible_fields();
				if fields.is_empty() {
					out.push_str("{}");
				} else {
					out.push('{');
					newline_indent(out, fmt, depth + 1);
					for (i, name) in fields.iter().enumerate() {
						if i != 0 {
							out.push(',');
							newline_indent(out, fmt, depth + 1);
						}
						write_json_string(name, out);
						out.push(':');
						if !matches!(fmt, ManifestFormat::Minimal) {
							out.push(' ');
						}
						let val = obj
							.get(s, name)?
							.expect("field just listed as visible")
							.force(s)?;
						val.write_json(s, fmt, out, depth + 1, visiting)?;
					}
					newline_indent(out, fmt, depth);
					out.push('}');
				}
				visiting.pop();
			}
		}
		Ok(())
	}
}

fn newline_indent(out: &mut String, fmt: &ManifestFormat, depth: usize) {
	if let ManifestFormat::Json { padding } = fmt {
		out.push('\n');
		for _ in 0..depth * padding {
			out.push(' ');
		}
	}
}

fn write_number(n: f64, out: &mut String) {
	if n.fract() == 0.0 && n.abs() < 1e15 {
		out.push_str(&format!("{n:.0}"));
	} else {
		out.push_str(&format!("{n}"));
	}
}

fn write_json_string(s: &str, out: &mut String) {
	out.push('"');
	for c in s.chars() {
		match c {
			'"' => out.push_str("\\\""),
			'\\' => out.push_str("\\\\"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\t' => out.push_str("\\t"),
			c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
			c => out.push(c),
		}
	}
	out.push('"');
}
