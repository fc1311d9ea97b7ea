//! Source identity and span bookkeeping.
//!
//! Every AST node carries an optional [`ExprLocation`]; diagnostics and
//! stack traces resolve those spans back to line/column pairs lazily, only
//! when a message is actually rendered.

use std::{
	fmt::{self, Display},
	path::{Path, PathBuf},
	rc::Rc,
};

use rjsonnet_interner::IStr;

/// Identifies where a piece of source came from, without carrying its text.
///
/// Used as the cache key for the import resolver: two imports that resolve
/// to the same canonical path share one parsed AST.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourcePath {
	/// A real, canonicalized filesystem path.
	Path(Rc<Path>),
	/// Code that never touched disk: a CLI snippet, a TLA expression, an
	/// external variable's code form, etc. Virtual sources cannot `import`
	/// relative paths.
	Virtual(IStr),
}
impl SourcePath {
	pub fn path(&self) -> Option<&Path> {
		match self {
			Self::Path(p) => Some(p),
			Self::Virtual(_) => None,
		}
	}
}
impl Display for SourcePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Path(p) => write!(f, "{}", p.display()),
			Self::Virtual(name) => write!(f, "<{name}>"),
		}
	}
}
impl From<PathBuf> for SourcePath {
	fn from(p: PathBuf) -> Self {
		Self::Path(p.into())
	}
}

/// A source file's path paired with its full text, cheaply clonable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source(Rc<SourceInner>);
#[derive(Debug, PartialEq, Eq)]
struct SourceInner {
	path: SourcePath,
	code: IStr,
}
impl Source {
	pub fn new(path: SourcePath, code: IStr) -> Self {
		Self(Rc::new(SourceInner { path, code }))
	}
	pub fn new_virtual(name: IStr, code: IStr) -> Self {
		Self::new(SourcePath::Virtual(name), code)
	}
	pub fn source_path(&self) -> &SourcePath {
		&self.0.path
	}
	pub fn code(&self) -> &str {
		&self.0.code
	}
}
impl Display for Source {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		Display::fmt(&self.0.path, f)
	}
}

/// A (begin, end) byte-offset pair into a [`Source`], resolved to
/// 1-based line/column only when a diagnostic is printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprLocation {
	pub source: Source,
	pub start: usize,
	pub end: usize,
}
impl ExprLocation {
	pub fn new(source: Source, start: usize, end: usize) -> Self {
		Self { source, start, end }
	}

	/// True if `self` is nested within (or equal to) `other`'s byte range,
	/// for the same source file.
	pub fn belongs_to(&self, other: &Self) -> bool {
		self.source == other.source && other.start <= self.start && self.end <= other.end
	}

	fn line_col(&self, offset: usize) -> (usize, usize) {
		let code = self.source.code();
		let mut line = 1;
		let mut col = 1;
		for ch in code[..offset.min(code.len())].chars() {
			if ch == '\n' {
				line += 1;
				col = 1;
			} else {
				col += 1;
			}
		}
		(line, col)
	}

	/// `(start_line, start_col, end_line, end_col)`, 1-based.
	pub fn line_cols(&self) -> (usize, usize, usize, usize) {
		let (sl, sc) = self.line_col(self.start);
		let (el, ec) = self.line_col(self.end);
		(sl, sc, el, ec)
	}
}
impl Display for ExprLocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let (sl, sc, el, ec) = self.line_cols();
		write!(f, "{}:{sl}:{sc}-{el}:{ec}", self.source.source_path())
	}
}
