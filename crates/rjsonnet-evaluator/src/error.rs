//! Error taxonomy and the stack-trace-carrying [`LocError`] every fallible
//! operation in this crate returns.

use std::fmt::Debug;

use rjsonnet_interner::IStr;
use rjsonnet_parser::{BinaryOpType, ExprLocation, Source, SourcePath, UnaryOpType};
use thiserror::Error;

use crate::val::ValType;

/// Every failure this crate can raise. `ParseError`/`ImportError` surface
/// here as [`Self::ImportSyntaxError`]/the `ImportIo`-prefixed variants
/// rather than a separate type, so that every failure in the pipeline
/// shares one `Result<T, LocError>` alias.
#[allow(missing_docs)]
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
	#[error("operator {0} does not operate on type {1}")]
	UnaryOperatorDoesNotOperateOnType(UnaryOpType, ValType),
	#[error("binary operation {1} {0} {2} is not implemented")]
	BinaryOperatorDoesNotOperateOnValues(BinaryOpType, ValType, ValType),

	#[error("no top level object in this context")]
	NoTopLevelObjectFound,
	#[error("self is only usable inside objects")]
	CantUseSelfOutsideOfObject,
	#[error("no super found")]
	NoSuperFound,
	#[error("super can't be used standalone")]
	StandaloneSuper,

	#[error("for loop can only iterate over arrays")]
	InComprehensionCanOnlyIterateOverArray,

	#[error("array out of bounds: {0} is not within [0,{1})")]
	ArrayBoundsError(usize, usize),
	#[error("string out of bounds: {0} is not within [0,{1})")]
	StringBoundsError(usize, usize),

	#[error("assert failed: {}", non_empty(.0))]
	AssertionFailed(IStr),

	#[error("variable is not defined: {0}")]
	VariableIsNotDefined(IStr),
	#[error("duplicate local var: {0}")]
	DuplicateLocalVar(IStr),

	#[error("type mismatch: expected {0}, got {2} (of {1:?})")]
	TypeMismatch(&'static str, Vec<ValType>, ValType),
	#[error("no such field: {0}")]
	NoSuchField(IStr),

	#[error("only functions can be called, got {0}")]
	OnlyFunctionsCanBeCalledGot(ValType),
	#[error("parameter {0} is not defined")]
	UnknownFunctionParameter(String),
	#[error("argument {0} is already bound")]
	BindingParameterASecondTime(IStr),
	#[error("too many args, function accepts at most {0}")]
	TooManyArgsFunctionHas(usize),
	#[error("function parameter not bound in call: {}", .0.as_deref().unwrap_or("<unnamed>"))]
	FunctionParameterNotBoundInCall(Option<IStr>),
	#[error("positional argument after named argument")]
	PositionalAfterNamed,

	#[error("external variable is not defined: {0}")]
	UndefinedExternalVariable(IStr),

	#[error("field name should be string, got {0}")]
	FieldMustBeStringGot(ValType),
	#[error("duplicate field name: {0}")]
	DuplicateFieldName(IStr),

	#[error("attempted to index array with string {0}")]
	AttemptedIndexAnArrayWithString(IStr),
	#[error("{0} index type should be {1}, got {2}")]
	ValueIndexMustBeTypeGot(ValType, ValType, ValType),
	#[error("can't index into {0}")]
	CantIndexInto(ValType),
	#[error("{0} is not indexable")]
	ValueIsNotIndexable(ValType),

	#[error("can't resolve {1} from {0}")]
	ImportFileNotFound(SourcePath, String),
	#[error("resolved file not found: {0:?}")]
	ResolvedFileNotFound(SourcePath),
	#[error("can't import {0}: is a directory")]
	ImportIsADirectory(SourcePath),
	#[error("imported file is not valid utf-8: {0:?}")]
	ImportBadFileUtf8(SourcePath),
	#[error("import io error: {0}")]
	ImportIo(String),
	#[error("can't import from a virtual file")]
	CantImportFromVirtualFile,
	#[error("{path}: syntax error: {message}")]
	ImportSyntaxError { path: Source, message: String },

	#[error("runtime error: {}", non_empty(.0))]
	RuntimeError(IStr),
	#[error("stack overflow, try to reduce recursion, or raise max-stack")]
	StackOverflow,
	#[error("infinite recursion detected")]
	InfiniteRecursionDetected,
	#[error("tried to index by fractional value")]
	FractionalIndex,
	#[error("attempted to divide by zero")]
	DivisionByZero,
	#[error("infinite recursion detected during manifestation")]
	InfiniteManifestRecursion,
}

fn non_empty(s: &str) -> &str {
	if s.is_empty() {
		"\"\" (empty message)"
	} else {
		s
	}
}

impl From<Error> for LocError {
	fn from(e: Error) -> Self {
		Self::new(e)
	}
}

/// One frame of a [`StackTrace`]: a call site, field force, or assertion
/// that was in progress when an error was raised.
#[derive(Clone, Debug)]
pub struct StackTraceElement {
	pub location: Option<ExprLocation>,
	pub desc: String,
}
#[derive(Clone, Debug, Default)]
pub struct StackTrace(pub Vec<StackTraceElement>);

/// An [`Error`] paired with the stack trace accumulated while it propagated:
/// every error carries at least one span, and nested evaluations extend the
/// trace as it unwinds.
#[derive(Clone)]
pub struct LocError(Box<(Error, StackTrace)>);
impl LocError {
	pub fn new(e: Error) -> Self {
		Self(Box::new((e, StackTrace::default())))
	}
	pub fn error(&self) -> &Error {
		&self.0 .0
	}
	pub fn trace(&self) -> &StackTrace {
		&self.0 .1
	}
	pub fn trace_mut(&mut self) -> &mut StackTrace {
		&mut self.0 .1
	}
}
impl Debug for LocError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		writeln!(f, "{}", self.0 .0)?;
		for el in &self.0 .1 .0 {
			writeln!(f, "\tat {}: {}", el.location.as_ref().map_or_else(
				|| "<native>".to_string(),
				|l| l.to_string(),
			), el.desc)?;
		}
		Ok(())
	}
}

pub type Result<V, E = LocError> = std::result::Result<V, E>;

#[macro_export]
macro_rules! throw {
	($e: expr) => {
		return Err($e.into())
	};
}

#[macro_export]
macro_rules! throw_runtime {
	($($tt:tt)*) => {
		return Err($crate::error::Error::RuntimeError(format!($($tt)*).into()).into())
	};
}
