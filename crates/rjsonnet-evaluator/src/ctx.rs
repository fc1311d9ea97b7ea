//! The lexical environment.
//!
//! `self`/`super`/`$` ride along with every [`Context`] rather than being
//! looked up as ordinary bindings: a closure created inside an object field
//! must keep seeing that field's `self`/`super` no matter how far the
//! closure later travels.

use hashbrown::HashMap;
use rjsonnet_interner::IStr;
use rjsonnet_parser::Source;
use rustc_hash::FxBuildHasher;

use crate::{obj::ObjValue, val::Thunk};

type Bindings = HashMap<IStr, Thunk, FxBuildHasher>;

struct ContextData {
	parent: Option<Context>,
	bindings: Bindings,
	this: Option<ObjValue>,
	super_obj: Option<ObjValue>,
	dollar: Option<ObjValue>,
	/// The file this code was parsed from, used to resolve relative
	/// `import` paths against the directory of the importing file.
	source: Option<Source>,
}

/// An immutable lexical environment, cheap to clone and to extend — `let`
/// and function application extend it, and lookup is purely lexical.
#[derive(Clone)]
pub struct Context(Option<std::rc::Rc<ContextData>>);

impl Default for Context {
	fn default() -> Self {
		Self(None)
	}
}

impl Context {
	/// Root context for a freshly loaded file: no bindings, no `self`, `$`
	/// tied to whatever object the file's top-level expression constructs.
	pub fn new_for_source(source: Source) -> Self {
		let data = ContextData {
			parent: None,
			bindings: Bindings::default(),
			this: None,
			super_obj: None,
			dollar: None,
			source: Some(source),
		};
		Self(Some(std::rc::Rc::new(data)))
	}

	pub fn get(&self, name: &str) -> Option<Thunk> {
		let mut cur = self.0.as_ref();
		while let Some(data) = cur {
			if let Some(t) = data.bindings.get(name) {
				return Some(t.clone());
			}
			cur = data.parent.as_ref().and_then(|p| p.0.as_ref());
		}
		None
	}

	/// Extends with new bindings, keeping the current `self`/`super`/`$`.
	/// Used for `local`, function application, and comprehension variables.
	#[must_use]
	pub fn extend(&self, bindings: impl IntoIterator<Item = (IStr, Thunk)>) -> Self {
		let data = ContextData {
			parent: Some(self.clone()),
			bindings: bindings.into_iter().collect(),
			this: self.this(),
			super_obj: self.super_obj(),
			dollar: self.dollar(),
			source: self.source(),
		};
		Self(Some(std::rc::Rc::new(data)))
	}

	/// Extends with new bindings and rebinds `self`/`super`/`$`, used when
	/// evaluating an object field or assert body.
	#[must_use]
	pub fn extend_bound(
		&self,
		bindings: impl IntoIterator<Item = (IStr, Thunk)>,
		this: Option<ObjValue>,
		super_obj: Option<ObjValue>,
		dollar: Option<ObjValue>,
	) -> Self {
		let data = ContextData {
			parent: Some(self.clone()),
			bindings: bindings.into_iter().collect(),
			this,
			super_obj,
			dollar,
			source: self.source(),
		};
		Self(Some(std::rc::Rc::new(data)))
	}

	pub fn this(&self) -> Option<ObjValue> {
		self.0.as_ref().and_then(|d| d.this.clone())
	}
	pub fn super_obj(&self) -> Option<ObjValue> {
		self.0.as_ref().and_then(|d| d.super_obj.clone())
	}
	pub fn dollar(&self) -> Option<ObjValue> {
		self.0.as_ref().and_then(|d| d.dollar.clone())
	}
	pub fn source(&self) -> Option<Source> {
		self.0.as_ref().and_then(|d| d.source.clone())
	}
}
