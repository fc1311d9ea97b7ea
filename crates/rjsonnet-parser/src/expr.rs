//! Surface AST produced by the parser.
//!
//! One node kind per surface construct, plus the sugar the grammar itself
//! recognizes (method fields, object comprehensions, `$`/`self`/`super`)
//! which the evaluator desugars on the fly rather than through a second IR.

use std::{fmt, path::PathBuf, rc::Rc};

use rjsonnet_interner::IStr;

use crate::source::ExprLocation;

/// An expression, paired with the span it was parsed from.
///
/// `None` locations occur for expressions synthesized by the evaluator
/// itself (e.g. default `null` for an `if` without `else`) and for ASTs
/// built by hand in tests.
#[derive(Clone, Debug, PartialEq)]
pub struct LocExpr(pub Rc<Expr>, pub Option<ExprLocation>);
impl LocExpr {
	pub fn location(&self) -> Option<&ExprLocation> {
		self.1.as_ref()
	}
}

/// Constructs a [`LocExpr`] with no location, for synthesized sugar.
#[macro_export]
macro_rules! el {
	($expr:expr) => {
		$crate::LocExpr(std::rc::Rc::new($expr), None)
	};
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiteralType {
	Null,
	True,
	False,
	/// `self`
	This,
	/// `$`, the outermost object at the point a `local`/function body was
	/// defined.
	Dollar,
	/// Bare `super` used as `in super` or similar; `super.f`/`super[e]` are
	/// their own [`Expr`] variants because they need the field name eagerly.
	Super,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOpType {
	Mul,
	Div,
	Mod,
	Add,
	Sub,
	Lhs,
	Rhs,
	Lt,
	Gt,
	Lte,
	Gte,
	In,
	Eq,
	Neq,
	BitAnd,
	BitXor,
	BitOr,
	And,
	Or,
}
impl fmt::Display for BinaryOpType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		use BinaryOpType::*;
		f.write_str(match self {
			Mul => "*",
			Div => "/",
			Mod => "%",
			Add => "+",
			Sub => "-",
			Lhs => "<<",
			Rhs => ">>",
			Lt => "<",
			Gt => ">",
			Lte => "<=",
			Gte => ">=",
			In => "in",
			Eq => "==",
			Neq => "!=",
			BitAnd => "&",
			BitXor => "^",
			BitOr => "|",
			And => "&&",
			Or => "||",
		})
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOpType {
	Plus,
	Minus,
	Not,
	BitNot,
}
impl fmt::Display for UnaryOpType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		use UnaryOpType::*;
		f.write_str(match self {
			Plus => "+",
			Minus => "-",
			Not => "!",
			BitNot => "~",
		})
	}
}

/// `f(x)`, `f(x=1)`: call arguments, already split into positional/named.
#[derive(Clone, Debug, PartialEq)]
pub struct ArgsDesc {
	pub unnamed: Vec<LocExpr>,
	pub named: Vec<(IStr, LocExpr)>,
}
impl ArgsDesc {
	pub fn new(unnamed: Vec<LocExpr>, named: Vec<(IStr, LocExpr)>) -> Self {
		Self { unnamed, named }
	}
}

/// A single function/method parameter, with an optional default-value
/// expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Param(pub IStr, pub Option<LocExpr>);

/// A non-empty-or-empty parameter list, shared between `function(...)` and
/// object methods `f(...): ...`.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamsDesc(pub Rc<Vec<Param>>);

/// `local name = value` or `local name(params) = value` (the latter
/// desugars to the former with a `function` value).
#[derive(Clone, Debug, PartialEq)]
pub struct BindSpec {
	pub name: IStr,
	pub params: Option<ParamsDesc>,
	pub value: LocExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssertStmt(pub LocExpr, pub Option<LocExpr>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
	/// `:`, inherits parent hiddenness on merge.
	Normal,
	/// `::`, always hidden.
	Hidden,
	/// `:::`, always visible even if a parent hid it.
	Unhide,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldName {
	/// A literal identifier or string key, known without evaluation.
	Fixed(IStr),
	/// `[expr]: value`, a computed key.
	Dyn(LocExpr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldMember {
	pub name: FieldName,
	/// `key +: value` inherits and extends the parent's value for `key`.
	pub plus: bool,
	/// `Some` for method sugar `f(x): e`, desugared to a `function` value.
	pub params: Option<ParamsDesc>,
	pub visibility: Visibility,
	pub value: LocExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Member {
	Field(FieldMember),
	BindStmt(BindSpec),
	AssertStmt(AssertStmt),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForSpecData(pub IStr, pub LocExpr);
#[derive(Clone, Debug, PartialEq)]
pub struct IfSpecData(pub LocExpr);

#[derive(Clone, Debug, PartialEq)]
pub enum CompSpec {
	ForSpec(ForSpecData),
	IfSpec(IfSpecData),
}

/// `{ [k]: v for x in xs if c }`: the comprehension form of an object
/// literal. Exactly one computed field per iteration; `pre_locals`/
/// `post_locals` are object-scoped `local`s declared before/after the key.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjComp {
	pub pre_locals: Vec<BindSpec>,
	pub key: LocExpr,
	pub plus: bool,
	pub value: LocExpr,
	pub post_locals: Vec<BindSpec>,
	pub compspecs: Vec<CompSpec>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ObjBody {
	MemberList(Vec<Member>),
	ObjComp(ObjComp),
}

/// `a[lo:hi:step]`, Python-like, each part optional.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceDesc {
	pub start: Option<LocExpr>,
	pub end: Option<LocExpr>,
	pub step: Option<LocExpr>,
}

/// The surface AST. `Import`/`ImportStr` still hold an unresolved literal
/// path; resolution happens when the evaluator first forces that import,
/// not during parsing — imports are lazy at evaluation time.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
	Literal(LiteralType),
	Str(IStr),
	Num(f64),
	Var(IStr),

	Arr(Vec<LocExpr>),
	ArrComp(LocExpr, Vec<CompSpec>),

	Obj(ObjBody),
	/// `base { ... }`, sugar for `base + { ... }` that also binds `$` to the
	/// extended object rather than `base`'s original root.
	ObjExtend(LocExpr, ObjBody),

	/// `expr(args)`, optionally `tailstrict`, which forces its arguments
	/// eagerly instead of lazily.
	Apply(LocExpr, ArgsDesc, bool),
	Function(ParamsDesc, LocExpr),

	/// `a[e]` — also used for `a.b` after desugaring to `a["b"]`, and for
	/// `super.f`/`super[e]` (the target expression is literally
	/// `Literal(Super)`; the evaluator pattern-matches on that shape to
	/// resolve the field against the enclosing object's parent layer
	/// instead of evaluating `super` to a standalone value).
	Index(LocExpr, LocExpr),
	Slice(LocExpr, SliceDesc),

	LocalExpr(Vec<BindSpec>, LocExpr),

	IfElse {
		cond: LocExpr,
		cond_then: LocExpr,
		cond_else: Option<LocExpr>,
	},

	BinaryOp(LocExpr, BinaryOpType, LocExpr),
	UnaryOp(UnaryOpType, LocExpr),

	AssertExpr(AssertStmt, LocExpr),
	ErrorStmt(LocExpr),

	Import(PathBuf),
	ImportStr(PathBuf),
	ImportBin(PathBuf),

	/// Parentheses, kept in the tree only so pretty-printing/round-tripping
	/// can reproduce them; semantically a no-op.
	Parened(LocExpr),
}
