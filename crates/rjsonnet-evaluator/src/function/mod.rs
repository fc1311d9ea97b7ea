//! Function values.
//!
//! Plain functions close over the [`Context`] they were written in; native
//! functions are eager Rust closures exposed under `std.*`. Both share one
//! parameter-binding routine since named args, defaults, and arity checking
//! behave identically for either.

use std::rc::Rc;

use rjsonnet_interner::IStr;
use rjsonnet_parser::{ArgsDesc, ExprLocation, LocExpr, ParamsDesc};

use crate::{
	ctx::Context,
	error::{Error::*, Result},
	evaluate::evaluate,
	throw,
	val::{Thunk, Val},
	State,
};

/// A call site: either a real `f(x)` expression or a native callsite with no
/// jsonnet source behind it (used for TLA application and `std` builtins
/// calling each other).
#[derive(Clone, Copy)]
pub struct CallLocation<'l>(pub Option<&'l ExprLocation>);
impl<'l> CallLocation<'l> {
	pub const fn new(loc: &'l ExprLocation) -> Self {
		Self(Some(loc))
	}
	pub const fn native() -> Self {
		Self(None)
	}
}

/// A `function(params) body` literal, closed over its defining scope.
pub struct FuncDesc {
	pub name: IStr,
	pub ctx: Context,
	pub params: ParamsDesc,
	pub body: LocExpr,
}

/// A Rust-implemented function, called eagerly. Builtins are just Rust
/// closures registered directly rather than going through a plugin ABI.
pub struct NativeDesc {
	pub name: IStr,
	pub params: Vec<IStr>,
	#[allow(clippy::type_complexity)]
	pub f: Box<dyn Fn(&State, CallLocation<'_>, &[Val]) -> Result<Val>>,
}

/// A callable value.
#[derive(Clone)]
pub enum FuncVal {
	Normal(Rc<FuncDesc>),
	Native(Rc<NativeDesc>),
}

impl FuncVal {
	pub fn name(&self) -> IStr {
		match self {
			Self::Normal(f) => f.name.clone(),
			Self::Native(f) => f.name.clone(),
		}
	}

	pub fn params_len(&self) -> usize {
		match self {
			Self::Normal(f) => f.params.0.len(),
			Self::Native(f) => f.params.len(),
		}
	}

	/// Applies `args`, evaluated in `call_ctx` (the caller's scope), to this
	/// function.
	pub fn call(
		&self,
		s: State,
		call_ctx: Context,
		args: &ArgsDesc,
		loc: CallLocation<'_>,
		tailstrict: bool,
	) -> Result<Val> {
		match self {
			Self::Normal(f) => {
				let body_ctx = bind_params(&s, &call_ctx, &f.ctx, &f.params, args, tailstrict)?;
				let name = f.name.clone();
				let body = f.body.clone();
				s.push(loc, move || format!("function <{name}> call"), || {
					evaluate(s.clone(), body_ctx, &body)
				})
			}
			Self::Native(f) => {
				let values = eval_native_args(&s, &call_ctx, &f.params, args)?;
				(f.f)(&s, loc, &values)
			}
		}
	}

	/// Applies already-evaluated positional arguments, for calls made from
	/// other native code or TLA plumbing rather than from jsonnet source.
	pub fn call_values(&self, s: State, loc: CallLocation<'_>, args: Vec<Val>) -> Result<Val> {
		match self {
			Self::Normal(f) => {
				if args.len() > f.params.0.len() {
					throw!(TooManyArgsFunctionHas(f.params.0.len()));
				}
				let ctx_cell = Rc::new(std::cell::RefCell::new(Context::default()));
				let mut bindings = Vec::with_capacity(f.params.0.len());
				for (i, param) in f.params.0.iter().enumerate() {
					let thunk = if let Some(v) = args.get(i) {
						Thunk::evaluated(v.clone())
					} else if let Some(default) = &param.1 {
						let cell = ctx_cell.clone();
						let s2 = s.clone();
						let default = default.clone();
						Thunk::new(move || evaluate(s2, cell.borrow().clone(), &default))
					} else {
						throw!(FunctionParameterNotBoundInCall(Some(param.0.clone())));
					};
					bindings.push((param.0.clone(), thunk));
				}
				let ctx = f.ctx.extend(bindings);
				*ctx_cell.borrow_mut() = ctx.clone();
				let name = f.name.clone();
				let body = f.body.clone();
				s.push(loc, move || format!("function <{name}> call"), || {
					evaluate(s.clone(), ctx, &body)
				})
			}
			Self::Native(f) => {
				if args.len() > f.params.len() {
					throw!(TooManyArgsFunctionHas(f.params.len()));
				}
				(f.f)(&s, loc, &args)
			}
		}
	}
}

/// Matches `args` against `params`, evaluating defaults lazily in a context
/// that sees every other parameter (own-value excluded), since Jsonnet
/// parameters are mutually visible regardless of declaration order.
fn bind_params(
	s: &State,
	call_ctx: &Context,
	closure_ctx: &Context,
	params: &ParamsDesc,
	args: &ArgsDesc,
	tailstrict: bool,
) -> Result<Context> {
	let slots = assign_slots(params.0.iter().map(|p| &p.0), args, params.0.len())?;

	let ctx_cell = Rc::new(std::cell::RefCell::new(Context::default()));
	let mut bindings = Vec::with_capacity(params.0.len());
	for (i, param) in params.0.iter().enumerate() {
		let thunk = if let Some(expr) = &slots[i] {
			let call_ctx = call_ctx.clone();
			let s2 = s.clone();
			let expr = expr.clone();
			if tailstrict {
				Thunk::evaluated(evaluate(s2, call_ctx, &expr)?)
			} else {
				Thunk::new(move || evaluate(s2, call_ctx, &expr))
			}
		} else if let Some(default) = &param.1 {
			let cell = ctx_cell.clone();
			let s2 = s.clone();
			let default = default.clone();
			Thunk::new(move || evaluate(s2, cell.borrow().clone(), &default))
		} else {
			throw!(FunctionParameterNotBoundInCall(Some(param.0.clone())));
		};
		bindings.push((param.0.clone(), thunk));
	}
	let ctx = closure_ctx.extend(bindings);
	*ctx_cell.borrow_mut() = ctx.clone();
	Ok(ctx)
}

/// Evaluates native arguments eagerly; natives take no defaults, every
/// parameter must be bound at the call site.
fn eval_native_args(
	s: &State,
	call_ctx: &Context,
	params: &[IStr],
	args: &ArgsDesc,
) -> Result<Vec<Val>> {
	let slots = assign_slots(params.iter(), args, params.len())?;
	let mut out = Vec::with_capacity(params.len());
	for (i, name) in params.iter().enumerate() {
		let Some(expr) = &slots[i] else {
			throw!(FunctionParameterNotBoundInCall(Some(name.clone())));
		};
		out.push(evaluate(s.clone(), call_ctx.clone(), expr)?);
	}
	Ok(out)
}

/// Fills one slot per parameter with the expression that should bind it:
/// positional args left-to-right, then named args by name.
fn assign_slots<'p>(
	names: impl Iterator<Item = &'p IStr>,
	args: &ArgsDesc,
	arity: usize,
) -> Result<Vec<Option<LocExpr>>> {
	let names: Vec<&IStr> = names.collect();
	if args.unnamed.len() > arity {
		throw!(TooManyArgsFunctionHas(arity));
	}
	let mut slots: Vec<Option<LocExpr>> = vec![None; arity];
	for (i, expr) in args.unnamed.iter().enumerate() {
		slots[i] = Some(expr.clone());
	}
	for (name, expr) in &args.named {
		let Some(idx) = names.iter().position(|n| *n == name) else {
			throw!(UnknownFunctionParameter(name.to_string()));
		};
		if slots[idx].is_some() {
			throw!(BindingParameterASecondTime(name.clone()));
		}
		slots[idx] = Some(expr.clone());
	}
	Ok(slots)
}
