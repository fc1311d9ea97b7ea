//! The desugarer and evaluator: walks a surface [`LocExpr`] directly rather
//! than lowering to a separate Core tree first — sugar (method fields,
//! `a.b`, object-locals, default `if`) is rewritten inline as each node is
//! evaluated.

use std::{cell::RefCell, rc::Rc};

use rjsonnet_interner::IStr;
use rjsonnet_parser::{
	el, BinaryOpType, BindSpec, CompSpec, Expr, ForSpecData, IfSpecData, LiteralType, LocExpr,
	Member, ObjBody, ObjComp, SliceDesc, UnaryOpType, Visibility,
};

use crate::{
	ctx::Context,
	error::{Error::*, Result},
	function::{CallLocation, FuncDesc, FuncVal},
	obj::{FieldValue, ObjAssert, ObjField, ObjValue},
	throw,
	val::{Thunk, Val},
	State,
};

/// Evaluates `expr` under `ctx` to a weak-head [`Val`]. Array elements and
/// object field values are left as thunks.
pub fn evaluate(s: State, ctx: Context, expr: &LocExpr) -> Result<Val> {
	match expr.0.as_ref() {
		Expr::Literal(LiteralType::Null) => Ok(Val::Null),
		Expr::Literal(LiteralType::True) => Ok(Val::Bool(true)),
		Expr::Literal(LiteralType::False) => Ok(Val::Bool(false)),
		Expr::Literal(LiteralType::This) => ctx.this().map(Val::Obj).ok_or(CantUseSelfOutsideOfObject.into()),
		Expr::Literal(LiteralType::Dollar) => ctx.dollar().map(Val::Obj).ok_or(NoTopLevelObjectFound.into()),
		Expr::Literal(LiteralType::Super) => throw!(StandaloneSuper),

		Expr::Str(str) => Ok(Val::Str(str.clone())),
		Expr::Num(n) => Ok(Val::Num(*n)),

		Expr::Var(name) => ctx
			.get(name)
			.ok_or_else(|| VariableIsNotDefined(name.clone()).into())
			.and_then(|t| t.force(&s)),

		Expr::Parened(inner) => evaluate(s, ctx, inner),

		Expr::Arr(items) => {
			let thunks: Vec<Thunk> = items
				.iter()
				.map(|item| {
					let s2 = s.clone();
					let ctx2 = ctx.clone();
					let item = item.clone();
					Thunk::new(move || evaluate(s2, ctx2, &item))
				})
				.collect();
			Ok(Val::Arr(thunks.into()))
		}
		Expr::ArrComp(body, specs) => {
			let mut out = Vec::new();
			eval_comp_chain(&s, &ctx, specs, &mut |s, ctx| {
				let s2 = s.clone();
				let ctx2 = ctx.clone();
				let body = body.clone();
				out.push(Thunk::new(move || evaluate(s2, ctx2, &body)));
				Ok(())
			})?;
			Ok(Val::Arr(out.into()))
		}

		Expr::Obj(body) => Ok(Val::Obj(build_object(&s, &ctx, body)?)),
		Expr::ObjExtend(base, body) => {
			let base = evaluate(s.clone(), ctx.clone(), base)?.as_obj()?;
			let top = build_object(&s, &ctx, body)?;
			Ok(Val::Obj(base.extend(&top)))
		}

		Expr::Function(params, body) => Ok(Val::Func(FuncVal::Normal(Rc::new(FuncDesc {
			name: "anonymous".into(),
			ctx,
			params: params.clone(),
			body: body.clone(),
		})))),
		Expr::Apply(callee, args, tailstrict) => {
			let func = evaluate(s.clone(), ctx.clone(), callee)?.as_func()?;
			let loc = expr.location().map_or_else(CallLocation::native, CallLocation::new);
			func.call(s, ctx, args, loc, *tailstrict)
		}

		Expr::Index(target, index) => eval_index(s, ctx, target, index),
		Expr::Slice(target, slice) => eval_slice(s, ctx, target, slice),

		Expr::LocalExpr(binds, body) => {
			let new_ctx = eval_locals(&s, &ctx, binds)?;
			evaluate(s, new_ctx, body)
		}

		Expr::IfElse {
			cond,
			cond_then,
			cond_else,
		} => {
			if evaluate(s.clone(), ctx.clone(), cond)?.as_bool()? {
				evaluate(s, ctx, cond_then)
			} else if let Some(else_branch) = cond_else {
				evaluate(s, ctx, else_branch)
			} else {
				Ok(Val::Null)
			}
		}

		Expr::BinaryOp(lhs, op, rhs) => eval_binary(s, ctx, lhs, *op, rhs),
		Expr::UnaryOp(op, operand) => eval_unary(s, ctx, *op, operand),

		Expr::AssertExpr(assert, rest) => {
			if !evaluate(s.clone(), ctx.clone(), &assert.0)?.as_bool()? {
				let msg = match &assert.1 {
					Some(m) => evaluate(s.clone(), ctx.clone(), m)?.as_str()?,
					None => IStr::from("assertion failed"),
				};
				throw!(AssertionFailed(msg));
			}
			evaluate(s, ctx, rest)
		}
		Expr::ErrorStmt(msg) => {
			let msg = evaluate(s, ctx, msg)?.as_str()?;
			throw!(RuntimeError(msg))
		}

		Expr::Import(path) => {
			let from = source_path_of(&ctx);
			s.import_from(&from, &path.to_string_lossy())
		}
		Expr::ImportStr(path) => {
			let from = source_path_of(&ctx);
			let resolved = s.resolve_from(&from, &path.to_string_lossy())?;
			Ok(Val::Str(s.import_resolved_str(resolved)?))
		}
		Expr::ImportBin(path) => {
			let from = source_path_of(&ctx);
			let resolved = s.resolve_from(&from, &path.to_string_lossy())?;
			let bytes = s.import_resolved_bin(resolved)?;
			let thunks: Vec<Thunk> = bytes
				.as_slice()
				.iter()
				.map(|b| Thunk::evaluated(Val::Num(f64::from(*b))))
				.collect();
			Ok(Val::Arr(thunks.into()))
		}
	}
}

fn source_path_of(ctx: &Context) -> rjsonnet_parser::SourcePath {
	ctx.source()
		.map(|src| src.source_path().clone())
		.unwrap_or_else(|| rjsonnet_parser::SourcePath::Virtual("top-level".into()))
}

/// Desugars `local name(params) = value` to `name = function(params) value`.
fn bind_name_value(bind: &BindSpec) -> (IStr, LocExpr) {
	let value = match &bind.params {
		Some(params) => el!(Expr::Function(params.clone(), bind.value.clone())),
		None => bind.value.clone(),
	};
	(bind.name.clone(), value)
}

/// Evaluates a `local` group: every binding sees every other binding,
/// including itself, via mutual recursion through a shared context cell —
/// all names are in scope in all right-hand sides regardless of order.
fn eval_locals(s: &State, ctx: &Context, binds: &[BindSpec]) -> Result<Context> {
	let mut seen = std::collections::HashSet::new();
	let ctx_cell = Rc::new(RefCell::new(Context::default()));
	let mut bindings = Vec::with_capacity(binds.len());
	for bind in binds {
		let (name, value) = bind_name_value(bind);
		if !seen.insert(name.clone()) {
			throw!(DuplicateLocalVar(name));
		}
		let cell = ctx_cell.clone();
		let s2 = s.clone();
		let thunk = Thunk::new(move || evaluate(s2, cell.borrow().clone(), &value));
		bindings.push((name, thunk));
	}
	let new_ctx = ctx.extend(bindings);
	*ctx_cell.borrow_mut() = new_ctx.clone();
	Ok(new_ctx)
}

/// Runs a chain of `for`/`if` comprehension clauses, invoking `emit` once
/// per surviving binding of the innermost `for`.
fn eval_comp_chain(
	s: &State,
	ctx: &Context,
	specs: &[CompSpec],
	emit: &mut dyn FnMut(&State, &Context) -> Result<()>,
) -> Result<()> {
	match specs.split_first() {
		None => emit(s, ctx),
		Some((CompSpec::IfSpec(IfSpecData(cond)), rest)) => {
			if evaluate(s.clone(), ctx.clone(), cond)?.as_bool()? {
				eval_comp_chain(s, ctx, rest, emit)?;
			}
			Ok(())
		}
		Some((CompSpec::ForSpec(ForSpecData(name, iter_expr)), rest)) => {
			let arr = evaluate(s.clone(), ctx.clone(), iter_expr)?;
			let Val::Arr(items) = arr else {
				throw!(InComprehensionCanOnlyIterateOverArray);
			};
			for item in items.iter() {
				let v = item.force(s)?;
				let new_ctx = ctx.extend([(name.clone(), Thunk::evaluated(v))]);
				eval_comp_chain(s, &new_ctx, rest, emit)?;
			}
			Ok(())
		}
	}
}

/// Builds one fresh mixin layer from an object literal or comprehension,
/// with no parent (`+`/`ObjExtend` link it in afterwards). `$` is inherited
/// from the enclosing scope if one exists, otherwise this object becomes
/// its own root — `$` is bound at each object construction to the root
/// object.
pub fn build_object(s: &State, ctx: &Context, body: &ObjBody) -> Result<ObjValue> {
	match body {
		ObjBody::MemberList(members) => build_member_list(s, ctx, members),
		ObjBody::ObjComp(comp) => build_comprehension(s, ctx, comp),
	}
}

fn build_member_list(s: &State, ctx: &Context, members: &[Member]) -> Result<ObjValue> {
	let mut binds = Vec::new();
	let mut fields = Vec::new();
	let mut asserts_src = Vec::new();
	for member in members {
		match member {
			Member::BindStmt(b) => binds.push(b.clone()),
			Member::Field(f) => fields.push(f.clone()),
			Member::AssertStmt(a) => asserts_src.push(a.clone()),
		}
	}

	let mut field_table = hashbrown::HashMap::with_hasher(rustc_hash::FxBuildHasher::default());
	for field in &fields {
		let name = eval_field_name(s, ctx, &binds, &field.name)?;
		let value_expr = match &field.params {
			Some(params) => el!(Expr::Function(params.clone(), field.value.clone())),
			None => field.value.clone(),
		};
		let wrapped = wrap_locals(&binds, value_expr);
		if field_table
			.insert(
				name.clone(),
				ObjField {
					visibility: field.visibility,
					plus: field.plus,
					ctx: ctx.clone(),
					expr: FieldValue::Expr(wrapped),
				},
			)
			.is_some()
		{
			throw!(DuplicateFieldName(name));
		}
	}

	let asserts = asserts_src
		.iter()
		.map(|a| ObjAssert {
			ctx: ctx.clone(),
			cond: wrap_locals(&binds, a.0.clone()),
			msg: a.1.as_ref().map(|m| wrap_locals(&binds, m.clone())),
		})
		.collect();

	Ok(ObjValue::new_layer(None, field_table, asserts, ctx.dollar()))
}

fn wrap_locals(binds: &[BindSpec], expr: LocExpr) -> LocExpr {
	if binds.is_empty() {
		expr
	} else {
		el!(Expr::LocalExpr(binds.to_vec(), expr))
	}
}

fn eval_field_name(
	s: &State,
	ctx: &Context,
	binds: &[BindSpec],
	name: &rjsonnet_parser::FieldName,
) -> Result<IStr> {
	match name {
		rjsonnet_parser::FieldName::Fixed(name) => Ok(name.clone()),
		rjsonnet_parser::FieldName::Dyn(expr) => {
			let wrapped = wrap_locals(binds, expr.clone());
			evaluate(s.clone(), ctx.clone(), &wrapped)?.as_str()
		}
	}
}

/// Builds a layer from `{ [k]: v for x in xs if c }`: each surviving
/// iteration contributes one field, keyed eagerly.
fn build_comprehension(s: &State, ctx: &Context, comp: &ObjComp) -> Result<ObjValue> {
	let mut field_table = hashbrown::HashMap::with_hasher(rustc_hash::FxBuildHasher::default());
	eval_comp_chain(s, ctx, &comp.compspecs, &mut |s, iter_ctx| {
		let pre_ctx = eval_locals(s, iter_ctx, &comp.pre_locals)?;
		let key = evaluate(s.clone(), pre_ctx.clone(), &comp.key)?.as_str()?;
		let post_ctx = eval_locals(s, &pre_ctx, &comp.post_locals)?;
		if field_table
			.insert(
				key.clone(),
				ObjField {
					visibility: Visibility::Normal,
					plus: comp.plus,
					ctx: post_ctx,
					expr: FieldValue::Expr(comp.value.clone()),
				},
			)
			.is_some()
		{
			throw!(DuplicateFieldName(key));
		}
		Ok(())
	})?;
	Ok(ObjValue::new_layer(None, field_table, Vec::new(), ctx.dollar()))
}

/// `a[e]`, `a.b`, `super.f`/`super[e]` (target is literally `Literal(Super)`)
/// all funnel through here.
fn eval_index(s: State, ctx: Context, target: &LocExpr, index: &LocExpr) -> Result<Val> {
	if matches!(target.0.as_ref(), Expr::Literal(LiteralType::Super)) {
		let Some(sup) = ctx.super_obj() else {
			throw!(NoSuperFound);
		};
		let real_self = ctx.this().ok_or(CantUseSelfOutsideOfObject)?;
		let key = evaluate(s.clone(), ctx, index)?.as_str()?;
		return sup.get_checked_with_self(&s, &key, real_self, index.location());
	}

	let base = evaluate(s.clone(), ctx.clone(), target)?;
	match &base {
		Val::Obj(obj) => {
			let key = evaluate(s.clone(), ctx, index)?.as_str()?;
			obj.get_checked(&s, &key, index.location())
		}
		Val::Arr(items) => {
			let idx_val = evaluate(s, ctx, index)?;
			if matches!(idx_val, Val::Str(_)) {
				throw!(AttemptedIndexAnArrayWithString(idx_val.as_str()?));
			}
			let idx = as_index(idx_val.as_num()?)?;
			items
				.get(idx)
				.ok_or(ArrayBoundsError(idx, items.len()).into())
				.and_then(|t| t.force(&s))
		}
		Val::Str(str) => {
			let idx_val = evaluate(s, ctx, index)?;
			let idx = as_index(idx_val.as_num()?)?;
			let chars_count = str.chars_count();
			let ch = str
				.chars()
				.nth(idx)
				.ok_or(StringBoundsError(idx, chars_count))?;
			Ok(Val::Str(ch.into()))
		}
		v => throw!(CantIndexInto(v.value_type())),
	}
}

fn as_index(n: f64) -> Result<usize> {
	if n.fract() != 0.0 || n < 0.0 {
		throw!(FractionalIndex);
	}
	Ok(n as usize)
}

/// Python-like `a[lo:hi:step]` over arrays or strings.
fn eval_slice(s: State, ctx: Context, target: &LocExpr, slice: &SliceDesc) -> Result<Val> {
	let base = evaluate(s.clone(), ctx.clone(), target)?;
	let len = match &base {
		Val::Arr(items) => items.len(),
		Val::Str(str) => str.chars_count(),
		v => throw!(ValueIsNotIndexable(v.value_type())),
	};

	let resolve = |e: &Option<LocExpr>, default: usize| -> Result<usize> {
		match e {
			None => Ok(default),
			Some(e) => {
				let n = evaluate(s.clone(), ctx.clone(), e)?.as_num()?;
				Ok(as_index(n)?.min(len))
			}
		}
	};
	let start = resolve(&slice.start, 0)?;
	let end = resolve(&slice.end, len)?.max(start);
	let step = match &slice.step {
		None => 1,
		Some(e) => {
			let n = evaluate(s.clone(), ctx.clone(), e)?.as_num()?;
			as_index(n)?.max(1)
		}
	};

	match base {
		Val::Arr(items) => {
			let sliced: Vec<Thunk> = (start..end).step_by(step).map(|i| items[i].clone()).collect();
			Ok(Val::Arr(sliced.into()))
		}
		Val::Str(str) => {
			let sliced: IStr = str.chars().skip(start).take(end - start).step_by(step).collect();
			Ok(Val::Str(sliced))
		}
		_ => unreachable!("checked above"),
	}
}

fn eval_unary(s: State, ctx: Context, op: UnaryOpType, operand: &LocExpr) -> Result<Val> {
	let v = evaluate(s, ctx, operand)?;
	match (op, &v) {
		(UnaryOpType::Plus, Val::Num(n)) => Ok(Val::Num(*n)),
		(UnaryOpType::Minus, Val::Num(n)) => Ok(Val::Num(-n)),
		(UnaryOpType::Not, Val::Bool(b)) => Ok(Val::Bool(!b)),
		(UnaryOpType::BitNot, Val::Num(n)) => Ok(Val::Num(!(*n as i64) as f64)),
		_ => throw!(UnaryOperatorDoesNotOperateOnType(op, v.value_type())),
	}
}

fn eval_binary(s: State, ctx: Context, lhs: &LocExpr, op: BinaryOpType, rhs: &LocExpr) -> Result<Val> {
	use BinaryOpType::*;

	// `k in super`: tests presence on the parent layer without evaluating
	// `super` standalone.
	if op == In && matches!(rhs.0.as_ref(), Expr::Literal(LiteralType::Super)) {
		let Some(sup) = ctx.super_obj() else {
			throw!(NoSuperFound);
		};
		let key = evaluate(s, ctx, lhs)?.as_str()?;
		return Ok(Val::Bool(sup.has_field(&key)));
	}

	if op == And {
		return if evaluate(s.clone(), ctx.clone(), lhs)?.as_bool()? {
			Ok(Val::Bool(evaluate(s, ctx, rhs)?.as_bool()?))
		} else {
			Ok(Val::Bool(false))
		};
	}
	if op == Or {
		return if evaluate(s.clone(), ctx.clone(), lhs)?.as_bool()? {
			Ok(Val::Bool(true))
		} else {
			Ok(Val::Bool(evaluate(s, ctx, rhs)?.as_bool()?))
		};
	}

	let a = evaluate(s.clone(), ctx.clone(), lhs)?;
	let b = evaluate(s.clone(), ctx, rhs)?;

	match op {
		Add => add(&s, &a, &b),
		Sub => Ok(Val::Num(a.as_num()? - b.as_num()?)),
		Mul => Ok(Val::Num(a.as_num()? * b.as_num()?)),
		Div => {
			let divisor = b.as_num()?;
			if divisor == 0.0 {
				throw!(DivisionByZero);
			}
			Ok(Val::Num(a.as_num()? / divisor))
		}
		Mod => {
			let divisor = b.as_num()?;
			if divisor == 0.0 {
				throw!(DivisionByZero);
			}
			Ok(Val::Num(a.as_num()? % divisor))
		}
		Lt | Gt | Lte | Gte => compare(&s, op, &a, &b),
		Eq => Ok(Val::Bool(a.equals(&s, &b)?)),
		Neq => Ok(Val::Bool(!a.equals(&s, &b)?)),
		In => {
			let obj = b.as_obj()?;
			Ok(Val::Bool(obj.has_field(&a.as_str()?)))
		}
		BitAnd => Ok(Val::Num(((as_i64(&a)? & as_i64(&b)?)) as f64)),
		BitOr => Ok(Val::Num(((as_i64(&a)? | as_i64(&b)?)) as f64)),
		BitXor => Ok(Val::Num(((as_i64(&a)? ^ as_i64(&b)?)) as f64)),
		Lhs => Ok(Val::Num(((as_i64(&a)? << (as_i64(&b)? & 63))) as f64)),
		Rhs => Ok(Val::Num(((as_i64(&a)? >> (as_i64(&b)? & 63))) as f64)),
		And | Or => unreachable!("handled above with short-circuit"),
	}
}

fn as_i64(v: &Val) -> Result<i64> {
	Ok(v.as_num()? as i64)
}

/// `+`: numeric add, string concatenation (with the non-string side
/// manifested to JSON first), array concatenation, or right-biased object
/// merge — shared between `BinaryOp(Add)` and `key +:` fields.
pub(crate) fn add(s: &State, a: &Val, b: &Val) -> Result<Val> {
	Ok(match (a, b) {
		(Val::Str(_), _) | (_, Val::Str(_)) => {
			let mut out = String::new();
			out.push_str(&to_display_string(s, a)?);
			out.push_str(&to_display_string(s, b)?);
			Val::Str(out.into())
		}
		(Val::Arr(x), Val::Arr(y)) => {
			let mut out = Vec::with_capacity(x.len() + y.len());
			out.extend(x.iter().cloned());
			out.extend(y.iter().cloned());
			Val::Arr(out.into())
		}
		(Val::Obj(x), Val::Obj(y)) => Val::Obj(x.extend(y)),
		(Val::Num(x), Val::Num(y)) => Val::Num(x + y),
		_ => throw!(BinaryOperatorDoesNotOperateOnValues(
			BinaryOpType::Add,
			a.value_type(),
			b.value_type()
		)),
	})
}

/// Renders `v` the way `+` does for its non-string operand: strings pass
/// through raw, everything else goes through JSON manifestation.
fn to_display_string(s: &State, v: &Val) -> Result<IStr> {
	match v {
		Val::Str(str) => Ok(str.clone()),
		other => other.manifest(s, &crate::val::ManifestFormat::Minimal),
	}
}

fn compare(s: &State, op: BinaryOpType, a: &Val, b: &Val) -> Result<Val> {
	use BinaryOpType::*;
	let ordering = match (a, b) {
		(Val::Num(x), Val::Num(y)) => x.partial_cmp(y),
		(Val::Str(x), Val::Str(y)) => Some(x.as_str().cmp(y.as_str())),
		_ => {
			let _ = s;
			throw!(BinaryOperatorDoesNotOperateOnValues(
				op,
				a.value_type(),
				b.value_type()
			))
		}
	};
	let Some(ordering) = ordering else {
		throw!(BinaryOperatorDoesNotOperateOnValues(op, a.value_type(), b.value_type()));
	};
	Ok(Val::Bool(match op {
		Lt => ordering.is_lt(),
		Gt => ordering.is_gt(),
		Lte => ordering.is_le(),
		Gte => ordering.is_ge(),
		_ => unreachable!(),
	}))
}
