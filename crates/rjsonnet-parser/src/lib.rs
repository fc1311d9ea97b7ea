//! jsonnet surface syntax: lexing, parsing, and import resolution.
#![allow(clippy::redundant_closure_call)]

pub mod expr;
mod pretty;
mod source;
mod unescape;

pub use expr::*;
pub use pretty::print as print_expr;
pub use rjsonnet_interner::{IBytes, IStr};
pub use source::{ExprLocation, Source, SourcePath};

use std::path::PathBuf;

use peg::parser;

/// Parser configuration: currently just which [`Source`] is being parsed,
/// used to stamp every node's span.
pub struct ParserSettings {
	pub source: Source,
}

macro_rules! expr_bin {
	($a:ident $op:ident $b:ident) => {
		Expr::BinaryOp($a, $op, $b)
	};
}
macro_rules! expr_un {
	($op:ident $a:ident) => {
		Expr::UnaryOp($op, $a)
	};
}

parser! {
	grammar jsonnet_parser() for str {
		use peg::ParseLiteral;

		/// Standard C-like comments, plus the shell-style `#` line comment
		/// jsonnet also accepts.
		rule comment()
			= "//" (!['\n'][_])* (['\n'] / ![_])
			/ "/*" (!("*/")[_])* "*/"
			/ "#" (!['\n'][_])* (['\n'] / ![_])

		rule single_whitespace() = quiet!{([' ' | '\r' | '\n' | '\t'] / comment())} / expected!("<whitespace>")
		rule _() = single_whitespace()*

		/// For comma-delimited elements, allowing a trailing comma.
		rule comma() = quiet!{_ "," _} / expected!("<comma>")
		rule alpha() -> char = c:$(['_' | 'a'..='z' | 'A'..='Z']) {c.chars().next().unwrap()}
		rule digit() -> char = d:$(['0'..='9']) {d.chars().next().unwrap()}
		rule end_of_ident() = !['0'..='9' | '_' | 'a'..='z' | 'A'..='Z']
		rule uint_str() -> &'input str = a:$(digit()+) { a }
		/// Number in scientific notation; integer-only input still parses
		/// as `f64` — "integer" is a surface-syntax distinction only.
		rule number() -> f64 = quiet!{a:$(uint_str() ("." uint_str())? (['e'|'E'] (['+'|'-'])? uint_str())?) {? a.parse().map_err(|_| "<number>") }} / expected!("<number>")

		rule reserved() = ("assert" / "else" / "error" / "false" / "for" / "function" / "if" / "import" / "importstr" / "importbin" / "in" / "local" / "null" / "tailstrict" / "then" / "self" / "super" / "true") end_of_ident()
		rule id() = quiet!{ !reserved() alpha() (alpha() / digit())*} / expected!("<identifier>")

		rule keyword(id: &'static str) -> ()
			= ##parse_string_literal(id) end_of_ident()

		pub rule param(s: &ParserSettings) -> Param
			= name:$(id()) value:(_ "=" _ e:expr(s){e})? { Param(name.into(), value) }
		pub rule params(s: &ParserSettings) -> ParamsDesc
			= params:param(s) ** comma() comma()? {?
				let mut defaults_started = false;
				for param in &params {
					if defaults_started && param.1.is_none() {
						return Err("<parameter with default>");
					}
					defaults_started = defaults_started || param.1.is_some();
				}
				Ok(ParamsDesc(std::rc::Rc::new(params)))
			}
			/ { ParamsDesc(std::rc::Rc::new(Vec::new())) }

		pub rule arg(s: &ParserSettings) -> (Option<IStr>, LocExpr)
			= quiet! { name:(n:$(id()) _ "=" _ {n})? value:expr(s) {(name.map(Into::into), value)} }
			/ expected!("<argument>")

		pub rule args(s: &ParserSettings) -> ArgsDesc
			= args:arg(s) ** comma() comma()? {?
				let unnamed_count = args.iter().take_while(|(n, _)| n.is_none()).count();
				let mut unnamed = Vec::with_capacity(unnamed_count);
				let mut named = Vec::with_capacity(args.len() - unnamed_count);
				let mut named_started = false;
				for (name, value) in args {
					if let Some(name) = name {
						named_started = true;
						named.push((name, value));
					} else {
						if named_started {
							return Err("<positional argument after named argument>");
						}
						unnamed.push(value);
					}
				}
				Ok(ArgsDesc::new(unnamed, named))
			}

		pub rule bind(s: &ParserSettings) -> BindSpec
			= name:$(id()) _ "=" _ value:expr(s) {BindSpec{name:name.into(), params: None, value}}
			/ name:$(id()) _ "(" _ params:params(s) _ ")" _ "=" _ value:expr(s) {BindSpec{name:name.into(), params: Some(params), value}}
		pub rule assertion(s: &ParserSettings) -> AssertStmt
			= keyword("assert") _ cond:expr(s) msg:(_ ":" _ e:expr(s) {e})? { AssertStmt(cond, msg) }

		pub rule whole_line() -> &'input str
			= str:$((!['\n'][_])* "\n") {str}
		pub rule string_block() -> String
			= "|||" (!['\n']single_whitespace())* "\n"
			  empty_lines:$(['\n']*)
			  prefix:[' ' | '\t']+ first_line:whole_line()
			  lines:("\n" {"\n"} / [' ' | '\t']*<{prefix.len()}> s:whole_line() {s})*
			  [' ' | '\t']*<, {prefix.len() - 1}> "|||"
			  {let mut l = empty_lines.to_owned(); l.push_str(first_line); l.extend(lines); l}
		pub rule string() -> String
			= quiet!{ "\"" str:$(("\\\"" / "\\\\" / (!['"'][_]))*) "\"" {?unescape::unescape(str).ok_or("<valid escape sequence>")}
			/ "'" str:$(("\\'" / "\\\\" / (!['\''][_]))*) "'" {?unescape::unescape(str).ok_or("<valid escape sequence>")}
			/ "@'" str:$(("''" / (!['\''][_]))*) "'" {str.replace("''", "'")}
			/ "@\"" str:$(("\"\"" / (!['"'][_]))*) "\"" {str.replace("\"\"", "\"")}
			/ string_block() } / expected!("<string>")

		pub rule field_name(s: &ParserSettings) -> FieldName
			= name:$(id()) {FieldName::Fixed(name.into())}
			/ name:string() {FieldName::Fixed(name.into())}
			/ "[" _ e:expr(s) _ "]" {FieldName::Dyn(e)}
		pub rule visibility() -> Visibility
			= ":::" {Visibility::Unhide}
			/ "::" {Visibility::Hidden}
			/ ":" {Visibility::Normal}
		pub rule field(s: &ParserSettings) -> FieldMember
			= name:field_name(s) _ plus:"+"? _ visibility:visibility() _ value:expr(s) {FieldMember{
				name,
				plus: plus.is_some(),
				params: None,
				visibility,
				value,
			}}
			/ name:field_name(s) _ "(" _ params:params(s) _ ")" _ visibility:visibility() _ value:expr(s) {FieldMember{
				name,
				plus: false,
				params: Some(params),
				visibility,
				value,
			}}
		pub rule obj_local(s: &ParserSettings) -> BindSpec
			= keyword("local") _ bind:bind(s) {bind}
		pub rule member(s: &ParserSettings) -> Member
			= bind:obj_local(s) {Member::BindStmt(bind)}
			/ assertion:assertion(s) {Member::AssertStmt(assertion)}
			/ field:field(s) {Member::Field(field)}
		pub rule objinside(s: &ParserSettings) -> ObjBody
			= pre_locals:(b: obj_local(s) comma() {b})* "[" _ key:expr(s) _ "]" _ plus:"+"? _ ":" _ value:expr(s) post_locals:(comma() b:obj_local(s) {b})* _ forspec:forspec(s) others:(_ rest:compspec(s) {rest})? {
				let mut compspecs = vec![CompSpec::ForSpec(forspec)];
				compspecs.extend(others.unwrap_or_default());
				ObjBody::ObjComp(ObjComp{
					pre_locals,
					key,
					plus: plus.is_some(),
					value,
					post_locals,
					compspecs,
				})
			}
			/ members:(member(s) ** comma()) comma()? {?
				let mut seen = std::collections::HashSet::new();
				for m in &members {
					if let Member::Field(FieldMember{name: FieldName::Fixed(name), ..}) = m {
						if !seen.insert(name.clone()) {
							return Err("<unique field name>");
						}
					}
				}
				Ok(ObjBody::MemberList(members))
			}
		pub rule ifspec(s: &ParserSettings) -> IfSpecData
			= keyword("if") _ e:expr(s) {IfSpecData(e)}
		pub rule forspec(s: &ParserSettings) -> ForSpecData
			= keyword("for") _ id:$(id()) _ keyword("in") _ cond:expr(s) {ForSpecData(id.into(), cond)}
		pub rule compspec(s: &ParserSettings) -> Vec<CompSpec>
			= s:(i:ifspec(s) { CompSpec::IfSpec(i) } / f:forspec(s) {CompSpec::ForSpec(f)} ) ** _ {s}
		pub rule local_expr(s: &ParserSettings) -> Expr
			= keyword("local") _ binds:bind(s) ** comma() _ ";" _ e:expr(s) { Expr::LocalExpr(binds, e) }
		pub rule string_expr(s: &ParserSettings) -> Expr
			= s:string() {Expr::Str(s.into())}
		pub rule obj_expr(s: &ParserSettings) -> Expr
			= "{" _ body:objinside(s) _ "}" {Expr::Obj(body)}
		pub rule array_expr(s: &ParserSettings) -> Expr
			= "[" _ elems:(expr(s) ** comma()) _ comma()? "]" {Expr::Arr(elems)}
		pub rule array_comp_expr(s: &ParserSettings) -> Expr
			= "[" _ e:expr(s) _ comma()? _ forspec:forspec(s) _ others:(others: compspec(s) _ {others})? "]" {
				let mut specs = vec![CompSpec::ForSpec(forspec)];
				specs.extend(others.unwrap_or_default());
				Expr::ArrComp(e, specs)
			}
		pub rule number_expr(s: &ParserSettings) -> Expr
			= n:number() { Expr::Num(n) }
		pub rule var_expr(s: &ParserSettings) -> Expr
			= n:$(id()) { Expr::Var(n.into()) }
		pub rule if_then_else_expr(s: &ParserSettings) -> Expr
			= cond:ifspec(s) _ keyword("then") _ cond_then:expr(s) cond_else:(_ keyword("else") _ e:expr(s) {e})? {Expr::IfElse{
				cond: cond.0,
				cond_then,
				cond_else,
			}}

		pub rule literal(s: &ParserSettings) -> Expr
			= v:(
				keyword("null") {LiteralType::Null}
				/ keyword("true") {LiteralType::True}
				/ keyword("false") {LiteralType::False}
				/ keyword("self") {LiteralType::This}
				/ keyword("$") {LiteralType::Dollar}
				/ keyword("super") {LiteralType::Super}
			) {Expr::Literal(v)}

		pub rule expr_basic(s: &ParserSettings) -> Expr
			= literal(s)

			/ string_expr(s) / number_expr(s)
			/ obj_expr(s)
			/ array_comp_expr(s)
			/ array_expr(s)

			/ keyword("importstr") _ path:string() {Expr::ImportStr(PathBuf::from(path))}
			/ keyword("importbin") _ path:string() {Expr::ImportBin(PathBuf::from(path))}
			/ keyword("import") _ path:string() {Expr::Import(PathBuf::from(path))}

			/ local_expr(s)
			/ if_then_else_expr(s)
			/ var_expr(s)

			/ keyword("function") _ "(" _ params:params(s) _ ")" _ e:expr(s) {Expr::Function(params, e)}
			/ assertion:assertion(s) _ ";" _ e:expr(s) { Expr::AssertExpr(assertion, e) }

			/ keyword("error") _ e:expr(s) { Expr::ErrorStmt(e) }

		rule slice_part(s: &ParserSettings) -> Option<LocExpr>
			= e:(_ e:expr(s) _{e})? {e}
		pub rule slice_desc(s: &ParserSettings) -> SliceDesc
			= start:slice_part(s) ":" pair:(end:slice_part(s) step:(":" e:slice_part(s){e})? {(end, step.flatten())})? {
				let (end, step) = pair.unwrap_or((None, None));
				SliceDesc { start, end, step }
			}

		rule binop(x: rule<()>) -> ()
			= quiet!{ x() } / expected!("<binary op>")
		rule unaryop(x: rule<()>) -> ()
			= quiet!{ x() } / expected!("<unary op>")

		use BinaryOpType::*;
		use UnaryOpType::*;
		rule expr(s: &ParserSettings) -> LocExpr
			= precedence! {
				start:position!() v:@ end:position!() { loc_expr(v, s, start, end) }
				--
				a:(@) _ binop(<"||">) _ b:@ {expr_bin!(a Or b)}
				--
				a:(@) _ binop(<"&&">) _ b:@ {expr_bin!(a And b)}
				--
				a:(@) _ binop(<"|">) _ b:@ {expr_bin!(a BitOr b)}
				--
				a:@ _ binop(<"^">) _ b:(@) {expr_bin!(a BitXor b)}
				--
				a:(@) _ binop(<"&">) _ b:@ {expr_bin!(a BitAnd b)}
				--
				a:(@) _ binop(<"==">) _ b:@ {expr_bin!(a Eq b)}
				a:(@) _ binop(<"!=">) _ b:@ {expr_bin!(a Neq b)}
				--
				a:(@) _ binop(<"<=">) _ b:@ {expr_bin!(a Lte b)}
				a:(@) _ binop(<">=">) _ b:@ {expr_bin!(a Gte b)}
				a:(@) _ binop(<"<">) _ b:@ {expr_bin!(a Lt b)}
				a:(@) _ binop(<">">) _ b:@ {expr_bin!(a Gt b)}
				a:(@) _ binop(<keyword("in")>) _ b:@ {expr_bin!(a In b)}
				--
				a:(@) _ binop(<"<<">) _ b:@ {expr_bin!(a Lhs b)}
				a:(@) _ binop(<">>">) _ b:@ {expr_bin!(a Rhs b)}
				--
				a:(@) _ binop(<"+">) _ b:@ {expr_bin!(a Add b)}
				a:(@) _ binop(<"-">) _ b:@ {expr_bin!(a Sub b)}
				--
				a:(@) _ binop(<"*">) _ b:@ {expr_bin!(a Mul b)}
				a:(@) _ binop(<"/">) _ b:@ {expr_bin!(a Div b)}
				a:(@) _ binop(<"%">) _ b:@ {expr_bin!(a Mod b)}
				--
						unaryop(<"-">) _ b:@ {expr_un!(Minus b)}
						unaryop(<"+">) _ b:@ {expr_un!(Plus b)}
						unaryop(<"!">) _ b:@ {expr_un!(Not b)}
						unaryop(<"~">) _ b:@ {expr_un!(BitNot b)}
				--
				a:(@) _ "[" _ e:slice_desc(s) _ "]" {Expr::Slice(a, e)}
				a:(@) _ "." _ e:$(id()) {Expr::Index(a, el!(Expr::Str(e.into())))}
				a:(@) _ "[" _ e:expr(s) _ "]" {Expr::Index(a, e)}
				a:(@) _ "(" _ args:args(s) _ ")" ts:(_ keyword("tailstrict"))? {Expr::Apply(a, args, ts.is_some())}
				a:(@) _ "{" _ body:objinside(s) _ "}" {Expr::ObjExtend(a, body)}
				--
				e:expr_basic(s) {e}
				"(" _ e:expr(s) _ ")" {Expr::Parened(e)}
			}

		pub rule jsonnet(s: &ParserSettings) -> LocExpr = _ e:expr(s) _ {e}
	}
}

fn loc_expr(v: Expr, s: &ParserSettings, start: usize, end: usize) -> LocExpr {
	let loc = ExprLocation::new(s.source.clone(), start, end);
	LocExpr(std::rc::Rc::new(v), Some(loc))
}

/// Parse failure: offset + the set of token kinds that would have been
/// accepted there. Wrapped by the evaluator into `Error::ImportSyntaxError`
/// or surfaced directly for top-level parses.
pub type ParseError = peg::error::ParseError<peg::str::LineCol>;

pub fn parse(str: &str, settings: &ParserSettings) -> Result<LocExpr, ParseError> {
	log::trace!(
		"parsing {} bytes from {}",
		str.len(),
		settings.source.source_path()
	);
	jsonnet_parser::jsonnet(str, settings)
}

// Field hiddenness is checked on every object merge; keep it a bare byte.
static_assertions::assert_eq_size!(Visibility, u8);

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use super::{expr::*, parse};
	use crate::{print_expr, ParserSettings, Source, SourcePath};
	use BinaryOpType::*;

	fn settings() -> ParserSettings {
		ParserSettings {
			source: Source::new(
				SourcePath::from(PathBuf::from("/test.jsonnet")),
				"".into(),
			),
		}
	}

	macro_rules! parse {
		($s:expr) => {
			strip_loc(parse($s, &settings()).unwrap())
		};
	}

	/// Recursively drops spans so tests can compare AST shape without
	/// hardcoding byte offsets.
	///
	/// Also flattens `Parened` wrappers away entirely: parentheses are
	/// insignificant once parsed, so `parse_round_trip` (which reprints
	/// every subexpression fully parenthesized to stay precedence-safe)
	/// can compare against the original without tripping over parens that
	/// only the printer introduced.
	fn strip_loc(e: LocExpr) -> LocExpr {
		fn strip(e: &Expr) -> Expr {
			use Expr::*;
			match e {
				Literal(l) => Literal(*l),
				Str(s) => Str(s.clone()),
				Num(n) => Num(*n),
				Var(v) => Var(v.clone()),
				Arr(xs) => Arr(xs.iter().map(|x| strip_loc(x.clone())).collect()),
				ArrComp(x, specs) => ArrComp(strip_loc(x.clone()), strip_compspecs(specs)),
				Obj(body) => Obj(strip_obj_body(body)),
				ObjExtend(x, body) => ObjExtend(strip_loc(x.clone()), strip_obj_body(body)),
				Apply(f, args, ts) => Apply(strip_loc(f.clone()), strip_args(args), *ts),
				Function(p, b) => Function(strip_params(p), strip_loc(b.clone())),
				Index(a, b) => Index(strip_loc(a.clone()), strip_loc(b.clone())),
				Slice(a, d) => Slice(strip_loc(a.clone()), strip_slice(d)),
				LocalExpr(b, e) => LocalExpr(strip_binds(b), strip_loc(e.clone())),
				IfElse {
					cond,
					cond_then,
					cond_else,
				} => IfElse {
					cond: strip_loc(cond.clone()),
					cond_then: strip_loc(cond_then.clone()),
					cond_else: cond_else.clone().map(strip_loc),
				},
				BinaryOp(a, op, b) => BinaryOp(strip_loc(a.clone()), *op, strip_loc(b.clone())),
				UnaryOp(op, a) => UnaryOp(*op, strip_loc(a.clone())),
				AssertExpr(a, e) => AssertExpr(strip_assert(a), strip_loc(e.clone())),
				ErrorStmt(e) => ErrorStmt(strip_loc(e.clone())),
				Import(p) => Import(p.clone()),
				ImportStr(p) => ImportStr(p.clone()),
				ImportBin(p) => ImportBin(p.clone()),
				Parened(e) => strip(&e.0),
			}
		}
		fn strip_args(args: &crate::expr::ArgsDesc) -> crate::expr::ArgsDesc {
			crate::expr::ArgsDesc::new(
				args.unnamed.iter().map(|e| strip_loc(e.clone())).collect(),
				args.named
					.iter()
					.map(|(n, e)| (n.clone(), strip_loc(e.clone())))
					.collect(),
			)
		}
		fn strip_params(p: &crate::expr::ParamsDesc) -> crate::expr::ParamsDesc {
			crate::expr::ParamsDesc(std::rc::Rc::new(
				p.0.iter()
					.map(|param| crate::expr::Param(param.0.clone(), param.1.clone().map(strip_loc)))
					.collect(),
			))
		}
		fn strip_bind(b: &BindSpec) -> BindSpec {
			BindSpec {
				name: b.name.clone(),
				params: b.params.as_ref().map(strip_params),
				value: strip_loc(b.value.clone()),
			}
		}
		fn strip_binds(binds: &[BindSpec]) -> Vec<BindSpec> {
			binds.iter().map(strip_bind).collect()
		}
		fn strip_assert(a: &crate::expr::AssertStmt) -> crate::expr::AssertStmt {
			crate::expr::AssertStmt(strip_loc(a.0.clone()), a.1.clone().map(strip_loc))
		}
		fn strip_slice(d: &SliceDesc) -> SliceDesc {
			SliceDesc {
				start: d.start.clone().map(strip_loc),
				end: d.end.clone().map(strip_loc),
				step: d.step.clone().map(strip_loc),
			}
		}
		fn strip_compspecs(specs: &[CompSpec]) -> Vec<CompSpec> {
			specs
				.iter()
				.map(|spec| match spec {
					CompSpec::ForSpec(f) => CompSpec::ForSpec(ForSpecData(f.0.clone(), strip_loc(f.1.clone()))),
					CompSpec::IfSpec(i) => CompSpec::IfSpec(IfSpecData(strip_loc(i.0.clone()))),
				})
				.collect()
		}
		fn strip_field_name(n: &FieldName) -> FieldName {
			match n {
				FieldName::Fixed(name) => FieldName::Fixed(name.clone()),
				FieldName::Dyn(e) => FieldName::Dyn(strip_loc(e.clone())),
			}
		}
		fn strip_obj_body(body: &ObjBody) -> ObjBody {
			match body {
				ObjBody::MemberList(members) => ObjBody::MemberList(
					members
						.iter()
						.map(|m| match m {
							Member::BindStmt(b) => Member::BindStmt(strip_bind(b)),
							Member::AssertStmt(a) => Member::AssertStmt(strip_assert(a)),
							Member::Field(f) => Member::Field(FieldMember {
								name: strip_field_name(&f.name),
								plus: f.plus,
								params: f.params.as_ref().map(strip_params),
								visibility: f.visibility,
								value: strip_loc(f.value.clone()),
							}),
						})
						.collect(),
				),
				ObjBody::ObjComp(comp) => ObjBody::ObjComp(ObjComp {
					pre_locals: strip_binds(&comp.pre_locals),
					key: strip_loc(comp.key.clone()),
					plus: comp.plus,
					value: strip_loc(comp.value.clone()),
					post_locals: strip_binds(&comp.post_locals),
					compspecs: strip_compspecs(&comp.compspecs),
				}),
			}
		}
		el!(strip(&e.0))
	}

	#[test]
	fn multiline_string() {
		assert_eq!(
			parse!("|||\n    Hello world!\n     a\n|||"),
			el!(Expr::Str("Hello world!\n a\n".into())),
		);
	}

	#[test]
	fn slice() {
		parse("a[1:]", &settings()).unwrap();
		parse("a[1::]", &settings()).unwrap();
		parse("a[:1:]", &settings()).unwrap();
		parse("a[::1]", &settings()).unwrap();
		parse("str[:len - 1]", &settings()).unwrap();
	}

	#[test]
	fn string_escaping() {
		assert_eq!(
			parse!(r#""Hello, \"world\"!""#),
			el!(Expr::Str(r#"Hello, "world"!"#.into())),
		);
		assert_eq!(
			parse!(r#"'Hello \'world\'!'"#),
			el!(Expr::Str("Hello 'world'!".into())),
		);
	}

	#[test]
	fn string_verbatim() {
		assert_eq!(
			parse!(r#"@"Hello\n""World""""#),
			el!(Expr::Str("Hello\\n\"World\"".into())),
		);
		assert_eq!(parse!(r#"@'it''s'"#), el!(Expr::Str("it's".into())));
	}

	#[test]
	fn imports() {
		assert_eq!(
			parse!("import \"hello\""),
			el!(Expr::Import(PathBuf::from("hello"))),
		);
		assert_eq!(
			parse!("importstr \"garnish.txt\""),
			el!(Expr::ImportStr(PathBuf::from("garnish.txt")))
		);
	}

	#[test]
	fn empty_object() {
		assert_eq!(parse!("{}"), el!(Expr::Obj(ObjBody::MemberList(vec![]))));
	}

	#[test]
	fn duplicate_field_is_error() {
		assert!(parse("{a: 1, a: 2}", &settings()).is_err());
	}

	#[test]
	fn basic_math() {
		assert_eq!(
			parse!("2+2*2"),
			el!(Expr::BinaryOp(
				el!(Expr::Num(2.0)),
				Add,
				el!(Expr::BinaryOp(el!(Expr::Num(2.0)), Mul, el!(Expr::Num(2.0))))
			))
		);
	}

	#[test]
	fn comments_are_skipped() {
		assert_eq!(
			parse!("2//comment\n+//comment\n3/*test*/*/*test*/4"),
			el!(Expr::BinaryOp(
				el!(Expr::Num(2.0)),
				Add,
				el!(Expr::BinaryOp(el!(Expr::Num(3.0)), Mul, el!(Expr::Num(4.0))))
			))
		);
	}

	#[test]
	fn reserved_vs_identifier() {
		use Expr::*;
		assert_eq!(parse!("null"), el!(Literal(LiteralType::Null)));
		assert_eq!(parse!("nulla"), el!(Var("nulla".into())));
	}

	#[test]
	fn operator_precedence_regression() {
		use Expr::*;
		assert_eq!(
			parse!("!a && !b"),
			el!(BinaryOp(
				el!(UnaryOp(UnaryOpType::Not, el!(Var("a".into())))),
				And,
				el!(UnaryOp(UnaryOpType::Not, el!(Var("b".into()))))
			))
		);
	}

	#[test]
	fn default_params_must_trail() {
		assert!(parse("function(a=1, b) a", &settings()).is_err());
		parse("function(a, b=1) a", &settings()).unwrap();
	}

	#[test]
	fn named_args_after_positional_is_error() {
		assert!(parse("f(a, b=1, c)", &settings()).is_err());
		parse("f(a, b=1, c=2)", &settings()).unwrap();
	}

	#[test]
	fn tailstrict_apply() {
		parse("f(a) tailstrict", &settings()).unwrap();
	}

	#[test]
	fn array_comp() {
		use Expr::*;
		assert_eq!(
			parse!("[x for x in arr]"),
			el!(ArrComp(
				el!(Var("x".into())),
				vec![CompSpec::ForSpec(ForSpecData("x".into(), el!(Var("arr".into()))))]
			)),
		)
	}

	/// Printing an AST back to source and reparsing it must yield a
	/// structurally equivalent tree (spans stripped, since the printer
	/// doesn't reproduce original whitespace).
	#[test]
	fn parse_round_trip() {
		for src in [
			"1 + 2 * 3",
			"local max(a, b) = if a > b then a else b; max(4, 8)",
			"{a: 1, b:: 2, c+: [1, 2], [\"d\"]: self.a}",
			"[x * 2 for x in [1, 2, 3] if x > 1]",
			"function(x, y=1) x + y",
			"local base = {a: 1, b: self.a}; base + {a: 10}",
			"import \"a.jsonnet\"",
		] {
			let first = parse(src, &settings()).unwrap();
			let printed = print_expr(&first.0);
			let second = parse(&printed, &settings()).unwrap();
			assert_eq!(
				strip_loc(first),
				strip_loc(second),
				"round-trip mismatch for {src:?}, printed as {printed:?}"
			);
		}
	}

	#[test]
	fn span_covers_whole_expression() {
		let source = Source::new(SourcePath::from(PathBuf::from("/t.jsonnet")), "1 + 2".into());
		let parsed = parse(
			"1 + 2",
			&ParserSettings {
				source: source.clone(),
			},
		)
		.unwrap();
		let loc = parsed.location().unwrap();
		assert_eq!((loc.start, loc.end), (0, 5));
	}
}
