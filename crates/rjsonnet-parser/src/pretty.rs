//! Re-renders a surface [`Expr`] back into Jsonnet source text.
//!
//! Used to verify that parsing is a faithful round trip: every
//! subexpression is fully parenthesized, so the printed text always
//! reparses to a structurally equivalent AST regardless of the original
//! source's own parenthesization or whitespace.

use std::fmt::Write as _;

use crate::expr::{
	ArgsDesc, BindSpec, CompSpec, Expr, FieldName, LiteralType, LocExpr, Member, ObjBody, ObjComp,
	ParamsDesc, SliceDesc,
};

pub fn print(e: &Expr) -> String {
	let mut out = String::new();
	write_expr(&mut out, e);
	out
}

fn write_loc(out: &mut String, e: &LocExpr) {
	write_expr(out, &e.0);
}

fn write_expr(out: &mut String, e: &Expr) {
	match e {
		Expr::Literal(LiteralType::Null) => out.push_str("null"),
		Expr::Literal(LiteralType::True) => out.push_str("true"),
		Expr::Literal(LiteralType::False) => out.push_str("false"),
		Expr::Literal(LiteralType::This) => out.push_str("self"),
		Expr::Literal(LiteralType::Dollar) => out.push('$'),
		Expr::Literal(LiteralType::Super) => out.push_str("super"),

		Expr::Str(s) => write_string_literal(out, s),
		Expr::Num(n) => write_number(out, *n),
		Expr::Var(name) => out.push_str(name),

		Expr::Arr(items) => {
			out.push('[');
			for (i, item) in items.iter().enumerate() {
				if i != 0 {
					out.push(',');
				}
				write_loc(out, item);
			}
			out.push(']');
		}
		Expr::ArrComp(body, specs) => {
			out.push('[');
			write_loc(out, body);
			write_compspecs(out, specs);
			out.push(']');
		}

		Expr::Obj(body) => write_obj_body(out, body),
		Expr::ObjExtend(base, body) => {
			out.push('(');
			write_loc(out, base);
			out.push(')');
			write_obj_body(out, body);
		}

		Expr::Apply(callee, args, tailstrict) => {
			out.push('(');
			write_loc(out, callee);
			out.push_str(")(");
			write_args(out, args);
			out.push(')');
			if *tailstrict {
				out.push_str(" tailstrict");
			}
		}
		Expr::Function(params, body) => {
			out.push_str("function(");
			write_params(out, params);
			out.push(')');
			out.push('(');
			write_loc(out, body);
			out.push(')');
		}

		Expr::Index(target, index) => {
			out.push('(');
			write_loc(out, target);
			out.push_str(")[");
			write_loc(out, index);
			out.push(']');
		}
		Expr::Slice(target, slice) => {
			out.push('(');
			write_loc(out, target);
			out.push_str(")[");
			write_slice(out, slice);
			out.push(']');
		}

		Expr::LocalExpr(binds, body) => {
			out.push_str("local ");
			write_binds(out, binds);
			out.push_str("; (");
			write_loc(out, body);
			out.push(')');
		}

		Expr::IfElse {
			cond,
			cond_then,
			cond_else,
		} => {
			out.push_str("if (");
			write_loc(out, cond);
			out.push_str(") then (");
			write_loc(out, cond_then);
			out.push(')');
			if let Some(else_branch) = cond_else {
				out.push_str(" else (");
				write_loc(out, else_branch);
				out.push(')');
			}
		}

		Expr::BinaryOp(lhs, op, rhs) => {
			out.push('(');
			write_loc(out, lhs);
			let _ = write!(out, ") {op} (");
			write_loc(out, rhs);
			out.push(')');
		}
		Expr::UnaryOp(op, operand) => {
			let _ = write!(out, "{op}(");
			write_loc(out, operand);
			out.push(')');
		}

		Expr::AssertExpr(assert, rest) => {
			out.push_str("assert (");
			write_loc(out, &assert.0);
			out.push(')');
			if let Some(msg) = &assert.1 {
				out.push_str(": (");
				write_loc(out, msg);
				out.push(')');
			}
			out.push_str("; (");
			write_loc(out, rest);
			out.push(')');
		}
		Expr::ErrorStmt(msg) => {
			out.push_str("error (");
			write_loc(out, msg);
			out.push(')');
		}

		Expr::Import(path) => write_import(out, "import", path),
		Expr::ImportStr(path) => write_import(out, "importstr", path),
		Expr::ImportBin(path) => write_import(out, "importbin", path),

		Expr::Parened(inner) => {
			out.push('(');
			write_loc(out, inner);
			out.push(')');
		}
	}
}

fn write_import(out: &mut String, keyword: &str, path: &std::path::Path) {
	out.push_str(keyword);
	out.push(' ');
	write_string_literal(out, &path.to_string_lossy());
}

fn write_params(out: &mut String, params: &ParamsDesc) {
	for (i, param) in params.0.iter().enumerate() {
		if i != 0 {
			out.push(',');
		}
		out.push_str(&param.0);
		if let Some(default) = &param.1 {
			out.push('=');
			write_loc(out, default);
		}
	}
}

fn write_args(out: &mut String, args: &ArgsDesc) {
	let mut first = true;
	for unnamed in &args.unnamed {
		if !first {
			out.push(',');
		}
		first = false;
		write_loc(out, unnamed);
	}
	for (name, value) in &args.named {
		if !first {
			out.push(',');
		}
		first = false;
		out.push_str(name);
		out.push('=');
		write_loc(out, value);
	}
}

fn write_binds(out: &mut String, binds: &[BindSpec]) {
	for (i, bind) in binds.iter().enumerate() {
		if i != 0 {
			out.push(',');
		}
		out.push_str(&bind.name);
		if let Some(params) = &bind.params {
			out.push('(');
			write_params(out, params);
			out.push(')');
		}
		out.push_str(" = (");
		write_loc(out, &bind.value);
		out.push(')');
	}
}

fn write_slice(out: &mut String, slice: &SliceDesc) {
	if let Some(start) = &slice.start {
		write_loc(out, start);
	}
	out.push(':');
	if let Some(end) = &slice.end {
		write_loc(out, end);
	}
	out.push(':');
	if let Some(step) = &slice.step {
		write_loc(out, step);
	}
}

fn write_compspecs(out: &mut String, specs: &[CompSpec]) {
	for spec in specs {
		match spec {
			CompSpec::ForSpec(f) => {
				let _ = write!(out, " for {} in (", f.0);
				write_loc(out, &f.1);
				out.push(')');
			}
			CompSpec::IfSpec(i) => {
				out.push_str(" if (");
				write_loc(out, &i.0);
				out.push(')');
			}
		}
	}
}

fn write_field_name(out: &mut String, name: &FieldName) {
	match name {
		FieldName::Fixed(name) => write_string_literal(out, name),
		FieldName::Dyn(expr) => {
			out.push('[');
			write_loc(out, expr);
			out.push(']');
		}
	}
}

fn write_obj_body(out: &mut String, body: &ObjBody) {
	out.push('{');
	match body {
		ObjBody::MemberList(members) => {
			for (i, member) in members.iter().enumerate() {
				if i != 0 {
					out.push(',');
				}
				write_member(out, member);
			}
		}
		ObjBody::ObjComp(comp) => write_obj_comp(out, comp),
	}
	out.push('}');
}

fn write_member(out: &mut String, member: &Member) {
	match member {
		Member::BindStmt(bind) => {
			out.push_str("local ");
			write_binds(out, std::slice::from_ref(bind));
		}
		Member::AssertStmt(assert) => {
			out.push_str("assert (");
			write_loc(out, &assert.0);
			out.push(')');
			if let Some(msg) = &assert.1 {
				out.push_str(": (");
				write_loc(out, msg);
				out.push(')');
			}
		}
		Member::Field(field) => {
			write_field_name(out, &field.name);
			if let Some(params) = &field.params {
				out.push('(');
				write_params(out, params);
				out.push(')');
			}
			if field.plus {
				out.push('+');
			}
			out.push_str(match field.visibility {
				crate::expr::Visibility::Normal => ":",
				crate::expr::Visibility::Hidden => "::",
				crate::expr::Visibility::Unhide => ":::",
			});
			out.push('(');
			write_loc(out, &field.value);
			out.push(')');
		}
	}
}

fn write_obj_comp(out: &mut String, comp: &ObjComp) {
	for bind in &comp.pre_locals {
		out.push_str("local ");
		write_binds(out, std::slice::from_ref(bind));
		out.push(',');
	}
	out.push('[');
	write_loc(out, &comp.key);
	out.push(']');
	if comp.plus {
		out.push('+');
	}
	out.push_str(": (");
	write_loc(out, &comp.value);
	out.push(')');
	for bind in &comp.post_locals {
		out.push(',');
		out.push_str("local ");
		write_binds(out, std::slice::from_ref(bind));
	}
	write_compspecs(out, &comp.compspecs);
}

fn write_number(out: &mut String, n: f64) {
	if n.fract() == 0.0 && n.abs() < 1e15 {
		let _ = write!(out, "{n:.0}");
	} else {
		let _ = write!(out, "{n}");
	}
}

fn write_string_literal(out: &mut String, s: &str) {
	out.push('"');
	for c in s.chars() {
		match c {
			'"' => out.push_str("\\\""),
			'\\' => out.push_str("\\\\"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\t' => out.push_str("\\t"),
			c => out.push(c),
		}
	}
	out.push('"');
}
