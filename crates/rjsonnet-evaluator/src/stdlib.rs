//! The `std` object.
//!
//! Every field is a [`FuncVal::Native`] closure bound into a single rootless
//! [`ObjValue`] layer built once per [`State`] and shared by every file that
//! imports `std` implicitly: `std` is bound at the root environment to an
//! object whose field factories call native implementations rather than
//! parsed Jsonnet expressions.

use std::{cmp::Ordering, rc::Rc};

use rjsonnet_interner::IStr;

use crate::{
	error::{Error::*, Result},
	function::{CallLocation, FuncVal, NativeDesc},
	obj::ObjValue,
	throw,
	val::{ManifestFormat, Val},
	State,
};

fn native(
	name: &'static str,
	params: &[&'static str],
	f: impl Fn(&State, CallLocation<'_>, &[Val]) -> Result<Val> + 'static,
) -> (IStr, Val) {
	let desc = NativeDesc {
		name: name.into(),
		params: params.iter().map(|p| IStr::from(*p)).collect(),
		f: Box::new(f),
	};
	(name.into(), Val::Func(FuncVal::Native(Rc::new(desc))))
}

/// Builds the `std` object. Called once; the result is cached on [`State`]
/// and reused by every file.
pub fn build() -> ObjValue {
	ObjValue::from_native_fields([
		native("type", &["x"], |_, _, a| Ok(Val::Str(a[0].value_type().to_string().into()))),
		native("length", &["x"], |_, _, a| length(&a[0])),
		native("makeArray", &["sz", "func"], |s, _, a| make_array(s, &a[0], &a[1])),
		native("filter", &["func", "arr"], |s, _, a| filter(s, &a[0], &a[1])),
		native("map", &["func", "arr"], |s, _, a| map(s, &a[0], &a[1])),
		native("foldl", &["func", "arr", "init"], |s, _, a| foldl(s, &a[0], &a[1], &a[2])),
		native("foldr", &["func", "arr", "init"], |s, _, a| foldr(s, &a[0], &a[1], &a[2])),
		native("mergePatch", &["target", "patch"], |s, _, a| merge_patch(s, &a[0], &a[1])),
		native("manifestJsonEx", &["value", "indent"], |s, _, a| manifest_json_ex(s, &a[0], &a[1])),
		native("manifestJson", &["value"], |s, _, a| {
			manifest_json_ex(s, &a[0], &Val::Str("    ".into()))
		}),
		native("objectHas", &["o", "f"], |_, _, a| {
			Ok(Val::Bool(a[0].as_obj()?.has_visible_field(&a[1].as_str()?)))
		}),
		native("objectHasAll", &["o", "f"], |_, _, a| {
			Ok(Val::Bool(a[0].as_obj()?.has_field(&a[1].as_str()?)))
		}),
		native("objectFields", &["o"], |_, _, a| Ok(strs(a[0].as_obj()?.visible_fields()))),
		native("objectFieldsAll", &["o"], |_, _, a| Ok(strs(a[0].as_obj()?.field_names()))),
		native("objectValues", &["o"], |s, _, a| object_values(s, &a[0], false)),
		native("objectValuesAll", &["o"], |s, _, a| object_values(s, &a[0], true)),
		native("abs", &["x"], |_, _, a| Ok(Val::Num(a[0].as_num()?.abs()))),
		native("max", &["a", "b"], |_, _, a| Ok(Val::Num(a[0].as_num()?.max(a[1].as_num()?)))),
		native("min", &["a", "b"], |_, _, a| Ok(Val::Num(a[0].as_num()?.min(a[1].as_num()?)))),
		native("round", &["x"], |_, _, a| Ok(Val::Num(a[0].as_num()?.round()))),
		native("floor", &["x"], |_, _, a| Ok(Val::Num(a[0].as_num()?.floor()))),
		native("ceil", &["x"], |_, _, a| Ok(Val::Num(a[0].as_num()?.ceil()))),
		native("pow", &["x", "n"], |_, _, a| Ok(Val::Num(a[0].as_num()?.powf(a[1].as_num()?)))),
		native("sqrt", &["x"], |_, _, a| Ok(Val::Num(a[0].as_num()?.sqrt()))),
		native("exp", &["x"], |_, _, a| Ok(Val::Num(a[0].as_num()?.exp()))),
		native("log", &["x"], |_, _, a| Ok(Val::Num(a[0].as_num()?.ln()))),
		native("range", &["from", "to"], |_, _, a| range(&a[0], &a[1])),
		native("join", &["sep", "arr"], |s, _, a| join(s, &a[0], &a[1])),
		native("split", &["str", "c"], |_, _, a| split(&a[0].as_str()?, &a[1].as_str()?)),
		native("reverse", &["arr"], |_, _, a| {
			let items = a[0].as_arr()?;
			Ok(Val::Arr(items.iter().rev().cloned().collect::<Vec<_>>().into()))
		}),
		native("sort", &["arr"], |s, _, a| sort(s, &a[0])),
		native("uniq", &["arr"], |s, _, a| uniq(s, &a[0])),
		native("substr", &["str", "from", "len"], |_, _, a| substr(&a[0].as_str()?, &a[1], &a[2])),
		native("codepoint", &["str"], |_, _, a| {
			let str = a[0].as_str()?;
			let c = str.chars().next().ok_or(RuntimeError("codepoint of empty string".into()))?;
			Ok(Val::Num(f64::from(c as u32)))
		}),
		native("char", &["n"], |_, _, a| {
			let n = a[0].as_num()? as u32;
			let c = char::from_u32(n).ok_or(RuntimeError("invalid codepoint".into()))?;
			Ok(Val::Str(c.into()))
		}),
		native("startsWith", &["a", "b"], |_, _, a| {
			Ok(Val::Bool(a[0].as_str()?.starts_with(a[1].as_str()?.as_str())))
		}),
		native("endsWith", &["a", "b"], |_, _, a| {
			Ok(Val::Bool(a[0].as_str()?.ends_with(a[1].as_str()?.as_str())))
		}),
		native("toString", &["a"], |s, _, a| to_string_val(s, &a[0])),
		native("trace", &["str", "rest"], |_, _, a| {
			log::debug!("TRACE: {}", a[0].as_str()?);
			Ok(a[1].clone())
		}),
		native("assertEqual", &["a", "b"], |s, _, a| assert_equal(s, &a[0], &a[1])),
		native("extVar", &["x"], |s, _, a| {
			let name = a[0].as_str()?;
			s.ext_var(&name).map(Val::Str).ok_or_else(|| UndefinedExternalVariable(name).into())
		}),
		native("thisFile", &[], |_, _, _| Ok(Val::Str("<unknown>".into()))),
		native("flattenArrays", &["arrs"], |s, _, a| flatten_arrays(s, &a[0])),
		native("prune", &["a"], |s, _, a| prune(s, &a[0])),
		native("equals", &["a", "b"], |s, _, a| Ok(Val::Bool(a[0].equals(s, &a[1])?))),
		native("isArray", &["v"], |_, _, a| Ok(Val::Bool(matches!(a[0], Val::Arr(_))))),
		native("isObject", &["v"], |_, _, a| Ok(Val::Bool(matches!(a[0], Val::Obj(_))))),
		native("isFunction", &["v"], |_, _, a| Ok(Val::Bool(matches!(a[0], Val::Func(_))))),
		native("isString", &["v"], |_, _, a| Ok(Val::Bool(matches!(a[0], Val::Str(_))))),
		native("isNumber", &["v"], |_, _, a| Ok(Val::Bool(matches!(a[0], Val::Num(_))))),
		native("isBoolean", &["v"], |_, _, a| Ok(Val::Bool(matches!(a[0], Val::Bool(_))))),
	])
}

fn strs(names: Vec<IStr>) -> Val {
	Val::Arr(names.into_iter().map(|n| crate::val::Thunk::evaluated(Val::Str(n))).collect::<Vec<_>>().into())
}

fn length(v: &Val) -> Result<Val> {
	Ok(Val::Num(match v {
		Val::Str(s) => s.chars_count() as f64,
		Val::Arr(a) => a.len() as f64,
		Val::Obj(o) => o.visible_fields().len() as f64,
		Val::Func(f) => f.params_len() as f64,
		v => throw!(TypeMismatch(
			"string, array, object, or function",
			vec![],
			v.value_type()
		)),
	}))
}

fn make_array(s: &State, sz: &Val, func: &Val) -> Result<Val> {
	let n = sz.as_num()? as usize;
	let func = func.as_func()?;
	let mut out = Vec::with_capacity(n);
	for i in 0..n {
		let func = func.clone();
		let s2 = s.clone();
		out.push(crate::val::Thunk::new(move || {
			func.call_values(s2, CallLocation::native(), vec![Val::Num(i as f64)])
		}));
	}
	Ok(Val::Arr(out.into()))
}

fn filter(s: &State, func: &Val, arr: &Val) -> Result<Val> {
	let func = func.as_func()?;
	let items = arr.as_arr()?;
	let mut out = Vec::new();
	for item in items.iter() {
		let v = item.force(s)?;
		if func
			.clone()
			.call_values(s.clone(), CallLocation::native(), vec![v.clone()])?
			.as_bool()?
		{
			out.push(crate::val::Thunk::evaluated(v));
		}
	}
	Ok(Val::Arr(out.into()))
}

fn map(s: &State, func: &Val, arr: &Val) -> Result<Val> {
	let func = func.as_func()?;
	let items = arr.as_arr()?;
	let mut out = Vec::with_capacity(items.len());
	for item in items.iter() {
		let func = func.clone();
		let s2 = s.clone();
		let item = item.clone();
		out.push(crate::val::Thunk::new(move || {
			let v = item.force(&s2)?;
			func.call_values(s2, CallLocation::native(), vec![v])
		}));
	}
	Ok(Val::Arr(out.into()))
}

fn foldl(s: &State, func: &Val, arr: &Val, init: &Val) -> Result<Val> {
	let func = func.as_func()?;
	let items = arr.as_arr()?;
	let mut acc = init.clone();
	for item in items.iter() {
		let v = item.force(s)?;
		acc = func
			.clone()
			.call_values(s.clone(), CallLocation::native(), vec![acc, v])?;
	}
	Ok(acc)
}

fn foldr(s: &State, func: &Val, arr: &Val, init: &Val) -> Result<Val> {
	let func = func.as_func()?;
	let items = arr.as_arr()?;
	let mut acc = init.clone();
	for item in items.iter().rev() {
		let v = item.force(s)?;
		acc = func
			.clone()
			.call_values(s.clone(), CallLocation::native(), vec![v, acc])?;
	}
	Ok(acc)
}

/// `std.mergePatch(target, patch)`: RFC 7396 JSON merge patch, the way
/// `+` merges two object *values* rather than two object *layers* — run
/// eagerly, not through the mixin chain.
fn merge_patch(s: &State, target: &Val, patch: &Val) -> Result<Val> {
	match patch {
		Val::Obj(patch_obj) => {
			let mut fields: Vec<(IStr, Val)> = Vec::new();
			if let Val::Obj(target_obj) = target {
				for name in target_obj.field_names() {
					if !patch_obj.has_field(&name) {
						let v = target_obj.get_checked(s, &name, None)?;
						fields.push((name, v));
					}
				}
			}
			for name in patch_obj.field_names() {
				let patch_val = patch_obj.get_checked(s, &name, None)?;
				if matches!(patch_val, Val::Null) {
					continue;
				}
				let base = match target {
					Val::Obj(target_obj) if target_obj.has_field(&name) => {
						target_obj.get_checked(s, &name, None)?
					}
					_ => Val::Null,
				};
				fields.push((name, merge_patch(s, &base, &patch_val)?));
			}
			Ok(Val::Obj(ObjValue::from_native_fields(fields)))
		}
		other => Ok(other.clone()),
	}
}

fn manifest_json_ex(s: &State, v: &Val, indent: &Val) -> Result<Val> {
	let indent = indent.as_str()?;
	let fmt = ManifestFormat::Json { padding: indent.chars().count() };
	Ok(Val::Str(v.manifest(s, &fmt)?))
}

fn object_values(s: &State, v: &Val, all: bool) -> Result<Val> {
	let obj = v.as_obj()?;
	let names = if all { obj.field_names() } else { obj.visible_fields() };
	let mut out = Vec::with_capacity(names.len());
	for name in names {
		out.push(crate::val::Thunk::evaluated(obj.get_checked(s, &name, None)?));
	}
	Ok(Val::Arr(out.into()))
}

fn range(from: &Val, to: &Val) -> Result<Val> {
	let from = from.as_num()? as i64;
	let to = to.as_num()? as i64;
	let out: Vec<crate::val::Thunk> = (from..=to)
		.map(|n| crate::val::Thunk::evaluated(Val::Num(n as f64)))
		.collect();
	Ok(Val::Arr(out.into()))
}

fn join(s: &State, sep: &Val, arr: &Val) -> Result<Val> {
	let items = arr.as_arr()?;
	match sep {
		Val::Str(sep) => {
			let mut out = String::new();
			for (i, item) in items.iter().enumerate() {
				if i != 0 {
					out.push_str(sep);
				}
				out.push_str(&item.force(s)?.as_str()?);
			}
			Ok(Val::Str(out.into()))
		}
		Val::Arr(sep) => {
			let mut out: Vec<crate::val::Thunk> = Vec::new();
			for (i, item) in items.iter().enumerate() {
				if i != 0 {
					out.extend(sep.iter().cloned());
				}
				out.extend(item.force(s)?.as_arr()?.iter().cloned());
			}
			Ok(Val::Arr(out.into()))
		}
		v => throw!(TypeMismatch("string or array", vec![], v.value_type())),
	}
}

fn split(str: &str, sep: &str) -> Result<Val> {
	if sep.is_empty() {
		throw!(RuntimeError("std.split separator must not be empty".into()));
	}
	let parts: Vec<crate::val::Thunk> = str
		.split(sep)
		.map(|p| crate::val::Thunk::evaluated(Val::Str(p.into())))
		.collect();
	Ok(Val::Arr(parts.into()))
}

fn sort(s: &State, arr: &Val) -> Result<Val> {
	let items = arr.as_arr()?;
	let mut forced: Vec<Val> = items.iter().map(|t| t.force(s)).collect::<Result<_>>()?;
	let mut err = None;
	forced.sort_by(|a, b| match cmp_val(a, b) {
		Ok(o) => o,
		Err(e) => {
			err.get_or_insert(e);
			Ordering::Equal
		}
	});
	if let Some(e) = err {
		return Err(e);
	}
	Ok(Val::Arr(
		forced.into_iter().map(crate::val::Thunk::evaluated).collect::<Vec<_>>().into(),
	))
}

fn cmp_val(a: &Val, b: &Val) -> Result<Ordering> {
	match (a, b) {
		(Val::Num(x), Val::Num(y)) => Ok(x.partial_cmp(y).unwrap_or(Ordering::Equal)),
		(Val::Str(x), Val::Str(y)) => Ok(x.as_str().cmp(y.as_str())),
		_ => throw!(TypeMismatch("number or string", vec![], a.value_type())),
	}
}

fn uniq(s: &State, arr: &Val) -> Result<Val> {
	let items = arr.as_arr()?;
	let mut out: Vec<Val> = Vec::new();
	for item in items.iter() {
		let v = item.force(s)?;
		let dup = match out.last() {
			Some(last) => last.equals(s, &v)?,
			None => false,
		};
		if !dup {
			out.push(v);
		}
	}
	Ok(Val::Arr(
		out.into_iter().map(crate::val::Thunk::evaluated).collect::<Vec<_>>().into(),
	))
}

fn substr(str: &str, from: &Val, len: &Val) -> Result<Val> {
	let from = from.as_num()? as usize;
	let len = len.as_num()? as usize;
	let out: String = str.chars().skip(from).take(len).collect();
	Ok(Val::Str(out.into()))
}

fn to_string_val(s: &State, v: &Val) -> Result<Val> {
	match v {
		Val::Str(str) => Ok(Val::Str(str.clone())),
		other => Ok(Val::Str(other.manifest(s, &ManifestFormat::Minimal)?)),
	}
}

fn assert_equal(s: &State, a: &Val, b: &Val) -> Result<Val> {
	if a.equals(s, b)? {
		Ok(Val::Bool(true))
	} else {
		let av = a.manifest(s, &ManifestFormat::Minimal).unwrap_or_else(|_| "<error>".into());
		let bv = b.manifest(s, &ManifestFormat::Minimal).unwrap_or_else(|_| "<error>".into());
		throw!(RuntimeError(format!("assertEqual failed: {av} != {bv}").into()))
	}
}

fn flatten_arrays(s: &State, v: &Val) -> Result<Val> {
	let arrs = v.as_arr()?;
	let mut out = Vec::new();
	for a in arrs.iter() {
		out.extend(a.force(s)?.as_arr()?.iter().cloned());
	}
	Ok(Val::Arr(out.into()))
}

/// `std.prune(a)`: recursively strips `null`s, empty arrays, and empty
/// objects out of `a`.
fn prune(s: &State, v: &Val) -> Result<Val> {
	Ok(match v {
		Val::Null => Val::Null,
		Val::Arr(items) => {
			let mut out = Vec::new();
			for item in items.iter() {
				let pruned = prune(s, &item.force(s)?)?;
				if !is_empty_prune(&pruned) {
					out.push(crate::val::Thunk::evaluated(pruned));
				}
			}
			Val::Arr(out.into())
		}
		Val::Obj(obj) => {
			let mut fields = Vec::new();
			for name in obj.visible_fields() {
				let pruned = prune(s, &obj.get_checked(s, &name, None)?)?;
				if !is_empty_prune(&pruned) {
					fields.push((name, pruned));
				}
			}
			Val::Obj(ObjValue::from_native_fields(fields))
		}
		other => other.clone(),
	})
}

fn is_empty_prune(v: &Val) -> bool {
	matches!(v, Val::Null)
		|| matches!(v, Val::Arr(a) if a.is_empty())
		|| matches!(v, Val::Obj(o) if o.visible_fields().is_empty())
}
