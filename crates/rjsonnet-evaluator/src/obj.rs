//! Objects as linked mixin layers.
//!
//! `L + R` never materializes a merged field table: the result is a new
//! layer holding only `R`'s own fields, pointing at `L` as its `super`.
//! Lookup walks the chain on demand, and the chosen thunk is cached on the
//! object that was actually queried, so repeated lookups stay O(1) amortized
//! while composition itself stays O(1).

use std::{
	cell::{Cell, RefCell},
	collections::BTreeSet,
	rc::{Rc, Weak},
};

use hashbrown::HashMap;
use rjsonnet_interner::IStr;
use rjsonnet_parser::{ExprLocation, LocExpr, Visibility};
use rustc_hash::FxBuildHasher;

use crate::{
	ctx::Context,
	error::{Error::*, Result},
	evaluate::evaluate,
	throw,
	val::{Thunk, Val},
	State,
};

/// Where an [`ObjField`]'s value comes from: jsonnet source evaluated in a
/// bound `self`/`super` context, or a value handed in directly by Rust code.
///
/// The `std` object is the only producer of `Native` fields: each of its
/// field factories is a native implementation rather than a parsed
/// expression, so it has no `LocExpr` to evaluate.
#[derive(Clone)]
pub enum FieldValue {
	Expr(LocExpr),
	Native(Val),
}

#[derive(Clone)]
pub struct ObjField {
	pub visibility: Visibility,
	/// `key +: value`: the field's own value is added to whatever `super`
	/// already defines for this key, rather than replacing it outright.
	pub plus: bool,
	pub ctx: Context,
	pub expr: FieldValue,
}

#[derive(Clone)]
pub struct ObjAssert {
	pub ctx: Context,
	pub cond: LocExpr,
	pub msg: Option<LocExpr>,
}

struct ObjValueData {
	/// `super`: the layer(s) underneath this one, if this object was built
	/// from `base + { .. }` or `base { .. }`.
	parent: Option<ObjValue>,
	fields: HashMap<IStr, ObjField, FxBuildHasher>,
	asserts: Vec<ObjAssert>,
	/// `$` for *this layer's own* fields: either inherited from the
	/// lexical scope the literal was written in, or (if none was
	/// inherited) this very object, set up via `self_weak` below so that
	/// no reference cycle is retained.
	dollar_inherited: Option<ObjValue>,
	self_weak: Weak<ObjValueData>,
	/// Keyed by `(field name, identity of the `self` it was bound to)`: a
	/// shared ancestor layer can be reached as `super` from more than one
	/// composed descendant, and each descendant's fields must see *its own*
	/// `self`, not the ancestor's.
	cache: RefCell<HashMap<(IStr, usize), Thunk, FxBuildHasher>>,
	asserts_ran: Cell<bool>,
}

/// A Jsonnet object value: a pointer to one mixin layer plus (transitively)
/// everything it was merged on top of.
#[derive(Clone)]
pub struct ObjValue(Rc<ObjValueData>);

impl ObjValue {
	/// Builds a single new layer. `dollar_inherited` should be
	/// `ctx.dollar()` at the point the literal was written: `None` means
	/// this literal is the one that gets to define `$`.
	pub fn new_layer(
		parent: Option<Self>,
		fields: HashMap<IStr, ObjField, FxBuildHasher>,
		asserts: Vec<ObjAssert>,
		dollar_inherited: Option<Self>,
	) -> Self {
		let data = Rc::new_cyclic(|weak| ObjValueData {
			parent,
			fields,
			asserts,
			dollar_inherited,
			self_weak: weak.clone(),
			cache: RefCell::default(),
			asserts_ran: Cell::new(false),
		});
		Self(data)
	}

	/// Builds a single rootless layer out of already-constructed values,
	/// with no lexical `ctx`/`$` of its own — used for `std`, whose fields
	/// never reference `self`/`super`/`$`.
	pub fn from_native_fields(fields: impl IntoIterator<Item = (IStr, Val)>) -> Self {
		let mut table = HashMap::with_hasher(FxBuildHasher::default());
		for (name, value) in fields {
			table.insert(
				name,
				ObjField {
					visibility: Visibility::Normal,
					plus: false,
					ctx: Context::default(),
					expr: FieldValue::Native(value),
				},
			);
		}
		Self::new_layer(None, table, Vec::new(), None)
	}

	/// `L + R`: reuses `R`'s existing layer data, just relinking its
	/// parent to `L` — no field re-declaration, no `$` recomputation. `R`'s
	/// fields override `L`'s, with each `R`-field's `super` bound to `L`.
	pub fn extend(&self, top: &Self) -> Self {
		Self::new_layer(
			Some(self.clone()),
			top.0.fields.clone(),
			top.0.asserts.clone(),
			top.0.dollar_inherited.clone(),
		)
	}

	fn dollar(&self) -> Option<Self> {
		self.0
			.dollar_inherited
			.clone()
			.or_else(|| self.0.self_weak.upgrade().map(Self))
	}

	/// Pointer identity, used for manifestation cycle detection.
	pub fn identity(&self) -> usize {
		Rc::as_ptr(&self.0) as usize
	}

	fn find_layer(&self, name: &str) -> Option<Self> {
		let mut cur = Some(self.clone());
		while let Some(layer) = cur {
			if layer.0.fields.contains_key(name) {
				return Some(layer);
			}
			cur = layer.0.parent.clone();
		}
		None
	}

	/// Looks up `name`, returning the (cached) thunk that evaluates its
	/// value, with `self` bound to `self` (this object) and `super` bound
	/// to the parent of whichever layer actually declares the field.
	pub fn get(&self, s: &State, name: &str) -> Result<Option<Thunk>> {
		let this = self.clone();
		self.get_with_self(s, name, this)
	}

	/// Like [`Self::get`], but binds `self` inside the found field to
	/// `real_self` rather than to the object [`Self::get_with_self`] was
	/// called on. Needed for `super.f`/`key +: value`: the layer that
	/// actually declares the field is reached by walking *below* the real
	/// `self`, but the field must see the *final merged* `self` (the
	/// outermost object) regardless of which layer in the chain supplied it.
	pub fn get_with_self(&self, s: &State, name: &str, real_self: Self) -> Result<Option<Thunk>> {
		let cache_key = (IStr::from(name), real_self.identity());
		if let Some(t) = self.0.cache.borrow().get(&cache_key) {
			return Ok(Some(t.clone()));
		}
		let Some(layer) = self.find_layer(name) else {
			return Ok(None);
		};
		let field = layer.0.fields.get(name).expect("just found").clone();
		let this = real_self;
		let super_obj = layer.0.parent.clone();
		let dollar = layer.dollar();
		let bound_ctx = field
			.ctx
			.extend_bound([], Some(this.clone()), super_obj.clone(), dollar);
		let st = s.clone();
		let expr = field.expr.clone();
		let plus = field.plus;
		let name_owned = IStr::from(name);
		let real_self_for_super = this.clone();
		let thunk = Thunk::new(move || {
			let own = match &expr {
				FieldValue::Expr(expr) => evaluate(st.clone(), bound_ctx, expr)?,
				FieldValue::Native(v) => v.clone(),
			};
			if plus {
				if let Some(sup) = &super_obj {
					if let Some(sup_thunk) = sup.get_with_self(&st, &name_owned, real_self_for_super.clone())? {
						let sup_val = sup_thunk.force(&st)?;
						return crate::evaluate::add(&st, &sup_val, &own);
					}
				}
			}
			Ok(own)
		});
		self.0.cache.borrow_mut().insert(cache_key, thunk.clone());
		Ok(Some(thunk))
	}

	/// Runs every layer's `assert`s, `self`-bound to this object, the
	/// first time this particular merged object is manifested.
	pub fn run_asserts(&self, s: &State) -> Result<()> {
		if self.0.asserts_ran.get() {
			return Ok(());
		}
		self.0.asserts_ran.set(true);
		let mut cur = Some(self.clone());
		while let Some(layer) = cur {
			for a in &layer.0.asserts {
				let bound_ctx = a.ctx.extend_bound(
					[],
					Some(self.clone()),
					layer.0.parent.clone(),
					layer.dollar(),
				);
				let cond = evaluate(s.clone(), bound_ctx.clone(), &a.cond)?;
				if !cond.as_bool()? {
					let msg = if let Some(m) = &a.msg {
						evaluate(s.clone(), bound_ctx, m)?.as_str()?
					} else {
						IStr::from("")
					};
					throw!(AssertionFailed(msg));
				}
			}
			cur = layer.0.parent.clone();
		}
		Ok(())
	}

	/// `true` if the topmost non-`:`-visibility layer defining `name`
	/// resolves to visible, inheriting through `:` layers otherwise.
	fn field_visible(start: Option<Self>, name: &str) -> bool {
		let mut cur = start;
		while let Some(layer) = cur {
			if let Some(field) = layer.0.fields.get(name) {
				return match field.visibility {
					Visibility::Hidden => false,
					Visibility::Unhide => true,
					Visibility::Normal => Self::field_visible(layer.0.parent.clone(), name),
				};
			}
			cur = layer.0.parent.clone();
		}
		true
	}

	pub fn has_field(&self, name: &str) -> bool {
		self.find_layer(name).is_some()
	}
	pub fn has_visible_field(&self, name: &str) -> bool {
		self.has_field(name) && Self::field_visible(Some(self.clone()), name)
	}

	fn all_field_names(&self) -> BTreeSet<IStr> {
		let mut out = BTreeSet::new();
		let mut cur = Some(self.clone());
		while let Some(layer) = cur {
			for k in layer.0.fields.keys() {
				out.insert(k.clone());
			}
			cur = layer.0.parent.clone();
		}
		out
	}

	/// All field names, in sorted order, visible or not.
	pub fn field_names(&self) -> Vec<IStr> {
		self.all_field_names().into_iter().collect()
	}

	/// Visible field names, in sorted order — what the manifester and
	/// `std.objectFields` see.
	pub fn visible_fields(&self) -> Vec<IStr> {
		self.all_field_names()
			.into_iter()
			.filter(|n| Self::field_visible(Some(self.clone()), n))
			.collect()
	}

	pub fn get_checked(&self, s: &State, name: &str, loc: Option<&ExprLocation>) -> Result<Val> {
		match self.get(s, name)? {
			Some(t) => t.force(s),
			None => {
				let _ = loc;
				throw!(NoSuchField(IStr::from(name)))
			}
		}
	}

	/// Like [`Self::get_checked`], but for `super.f`: `real_self` is the
	/// `self` in scope at the `super` reference.
	pub fn get_checked_with_self(
		&self,
		s: &State,
		name: &str,
		real_self: Self,
		loc: Option<&ExprLocation>,
	) -> Result<Val> {
		match self.get_with_self(s, name, real_self)? {
			Some(t) => t.force(s),
			None => {
				let _ = loc;
				throw!(NoSuchField(IStr::from(name)))
			}
		}
	}
}
