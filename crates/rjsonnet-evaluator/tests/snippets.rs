//! Integration tests: small Jsonnet snippets run end-to-end through the
//! public `State` API and checked against their manifested JSON.

use rjsonnet_evaluator::{EvaluationSettings, ImportResolver};
use rjsonnet_parser::SourcePath;
use std::path::Path;

fn manifest(src: &str) -> String {
	let s = rjsonnet_evaluator::State::default();
	let v = s.evaluate_snippet("<test>", src).expect("evaluation should succeed");
	s.manifest(&v).expect("manifestation should succeed").to_string()
}

fn fails(src: &str) -> rjsonnet_evaluator::error::LocError {
	let s = rjsonnet_evaluator::State::default();
	s.evaluate_snippet("<test>", src).expect_err("evaluation should fail")
}

#[test]
fn scenario_square() {
	assert_eq!(manifest("((function(x) x * x)(5)) == 25"), "true");
}

#[test]
fn scenario_max() {
	assert_eq!(manifest("local max(a,b) = if a > b then a else b; max(4,8)"), "8");
}

#[test]
fn scenario_object_merge() {
	assert_eq!(
		manifest("{a: 1} + {a: 2, b: 3}"),
		"{\n    \"a\": 2,\n    \"b\": 3\n}"
	);
}

#[test]
fn scenario_hidden_field() {
	assert_eq!(manifest("{a: 1, b:: 2}"), "{\n    \"a\": 1\n}");
}

#[test]
fn scenario_self_reference() {
	assert_eq!(manifest("local x = {a: 1, b: self.a + 1}; x.b"), "2");
}

#[test]
fn scenario_inheritance() {
	assert_eq!(
		manifest("local base = {a: 1, b: self.a}; base + {a: 10}"),
		"{\n    \"a\": 10,\n    \"b\": 10\n}"
	);
}

#[test]
fn scenario_laziness() {
	assert_eq!(manifest("local _ = error 'x'; 1"), "1");
	assert_eq!(manifest("{a: error 'x', b: 1}.b"), "1");
}

#[test]
fn scenario_cycle() {
	let err = fails("local x = x; x");
	assert!(matches!(
		err.error(),
		rjsonnet_evaluator::error::Error::InfiniteRecursionDetected
	));
}

#[test]
fn scenario_determinism() {
	assert_eq!(manifest("{b: 2, a: 1}"), manifest("{b: 2, a: 1}"));
}

#[test]
fn named_and_default_arguments() {
	assert_eq!(manifest("(function(a, b=10) a + b)(1)"), "11");
	assert_eq!(manifest("(function(a, b=10) a + b)(a=1)"), "11");
	assert_eq!(manifest("(function(a, b=10) a + b)(b=2, a=1)"), "3");
}

#[test]
fn self_super_mixin_chain() {
	let src = r"
		local A = {greet: 'hi ' + self.name, name: 'A'};
		local B = A + {name: 'B'};
		local C = B + {greet: super.greet + '!'};
		C.greet
	";
	assert_eq!(manifest(src), "\"hi B!\"");
}

/// `self` inside a field reached through `super` must be the *outermost*
/// merged object, not whichever layer happened to declare the field — so a
/// three-layer chain where the outermost layer overrides a field that a
/// `super`-inherited field reads must see the outermost override, not an
/// intermediate one.
#[test]
fn super_lookup_sees_outermost_self_not_intermediate_layer() {
	let src = r"
		local A = {greet: 'hi ' + self.name, name: 'A'};
		local B = A + {name: 'B', greet: super.greet + '!'};
		local C = B + {name: 'C'};
		C.greet
	";
	assert_eq!(manifest(src), "\"hi C!\"");
}

#[test]
fn plus_field_inherits_and_extends_super() {
	let src = r"
		local base = {a: 1};
		local ext = base + {a +: 1};
		ext.a
	";
	assert_eq!(manifest(src), "2");
}

#[test]
fn object_comprehension() {
	let src = "{[k]: k for k in ['x', 'y']}";
	assert_eq!(manifest(src), "{\n    \"x\": \"x\",\n    \"y\": \"y\"\n}");
}

#[test]
fn array_slices_and_strings() {
	assert_eq!(manifest("[1,2,3,4,5][1:4]"), "[\n    2,\n    3,\n    4\n]");
	assert_eq!(manifest("[1,2,3,4,5][::2]"), "[\n    1,\n    3,\n    5\n]");
	assert_eq!(manifest("'hello'[1:3]"), "\"el\"");
}

#[test]
fn stdlib_core_functions() {
	assert_eq!(manifest("std.map(function(x) x * 2, [1,2,3])"), "[\n    2,\n    4,\n    6\n]");
	assert_eq!(manifest("std.filter(function(x) x > 1, [1,2,3])"), "[\n    2,\n    3\n]");
	assert_eq!(manifest("std.foldl(function(acc, x) acc + x, [1,2,3], 0)"), "6");
	assert_eq!(manifest("std.join('-', ['a','b','c'])"), "\"a-b-c\"");
	assert_eq!(manifest("std.sort([3,1,2])"), "[\n    1,\n    2,\n    3\n]");
}

#[test]
fn merge_patch_drops_nulls() {
	assert_eq!(
		manifest("std.mergePatch({a: 1, b: 2}, {b: null, c: 3})"),
		"{\n    \"a\": 1,\n    \"c\": 3\n}"
	);
}

#[test]
fn assert_failure_has_message() {
	let err = fails("assert 1 == 2 : 'nope'; 1");
	assert!(matches!(
		err.error(),
		rjsonnet_evaluator::error::Error::AssertionFailed(_)
	));
}

#[test]
fn division_by_zero_is_an_error() {
	let err = fails("1 / 0");
	assert!(matches!(
		err.error(),
		rjsonnet_evaluator::error::Error::DivisionByZero
	));
}

#[test]
fn import_hook_is_cached_per_canonical_path() {
	use std::cell::Cell;
	use std::rc::Rc;

	struct CountingResolver {
		loads: Rc<Cell<usize>>,
	}
	impl ImportResolver for CountingResolver {
		fn resolve_from(&self, _from: &SourcePath, path: &Path) -> rjsonnet_evaluator::error::Result<SourcePath> {
			self.resolve(path)
		}
		fn resolve(&self, path: &Path) -> rjsonnet_evaluator::error::Result<SourcePath> {
			Ok(SourcePath::Virtual(path.to_string_lossy().into_owned().into()))
		}
		fn load_file_contents(&self, resolved: &SourcePath) -> rjsonnet_evaluator::error::Result<Vec<u8>> {
			self.loads.set(self.loads.get() + 1);
			match resolved {
				SourcePath::Virtual(name) if name.as_str() == "shared.jsonnet" => Ok(b"42".to_vec()),
				other => panic!("unexpected import: {other}"),
			}
		}
	}

	let loads = Rc::new(Cell::new(0));
	let s = rjsonnet_evaluator::State::new(EvaluationSettings {
		import_resolver: Box::new(CountingResolver { loads: loads.clone() }),
		..EvaluationSettings::default()
	});
	let v = s
		.evaluate_snippet(
			"top.jsonnet",
			"(import 'shared.jsonnet') + (import 'shared.jsonnet')",
		)
		.unwrap();
	assert_eq!(s.manifest(&v).unwrap().to_string(), "84");
	assert_eq!(loads.get(), 1, "second import must hit the cache, not reload");
}
