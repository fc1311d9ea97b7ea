//! String and byte-string interning.
//!
//! Jsonnet programs pass field names and short strings around constantly —
//! every object field access, every `self.foo`, every stdlib call compares
//! strings by key. Interning means most of those comparisons become a
//! pointer/length check instead of a byte-by-byte scan, and cloning an
//! [`IStr`] is a refcount bump rather than an allocation.

use std::{
	borrow::Borrow,
	cell::RefCell,
	cmp::Ordering,
	fmt::{self, Debug, Display},
	hash::{Hash, Hasher},
	ops::Deref,
	rc::Rc,
};

use hashbrown::HashMap;
use rustc_hash::FxHasher;

type FxBuildHasher = std::hash::BuildHasherDefault<FxHasher>;

thread_local! {
	static STRINGS: RefCell<HashMap<Rc<str>, (), FxBuildHasher>> = RefCell::new(HashMap::default());
}

fn intern_str(s: &str) -> Rc<str> {
	STRINGS.with(|strings| {
		let mut strings = strings.borrow_mut();
		if let Some((existing, ())) = strings.get_key_value(s) {
			return existing.clone();
		}
		let rc: Rc<str> = Rc::from(s);
		strings.insert(rc.clone(), ());
		rc
	})
}

/// An interned, reference-counted, immutable string.
///
/// Two [`IStr`]s built from equal byte content always compare equal, and
/// cheap to clone: interning happens once per distinct value, in a
/// thread-local table, for the lifetime of the process.
#[derive(Clone)]
pub struct IStr(Rc<str>);

impl IStr {
	/// The empty string. Does not allocate.
	pub fn empty() -> Self {
		Self(Rc::from(""))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Number of chars, not bytes — jsonnet strings index by Unicode scalar
	/// value, not by byte offset.
	pub fn chars_count(&self) -> usize {
		self.0.chars().count()
	}
}

impl Default for IStr {
	fn default() -> Self {
		Self::empty()
	}
}

impl Debug for IStr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		Debug::fmt(&self.0, f)
	}
}
impl Display for IStr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		Display::fmt(&self.0, f)
	}
}

impl Deref for IStr {
	type Target = str;
	fn deref(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for IStr {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for IStr {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl PartialEq for IStr {
	fn eq(&self, other: &Self) -> bool {
		// Interning guarantees equal content shares one allocation, so a
		// pointer comparison is usually enough; fall back for strings that
		// were never fed through `intern_str` (e.g. built via `From<String>`
		// in a context that skipped the table).
		Rc::ptr_eq(&self.0, &other.0) || self.0 == other.0
	}
}
impl Eq for IStr {}
impl Hash for IStr {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.hash(state);
	}
}
impl PartialOrd for IStr {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
impl Ord for IStr {
	fn cmp(&self, other: &Self) -> Ordering {
		self.0.cmp(&other.0)
	}
}

impl From<&str> for IStr {
	fn from(s: &str) -> Self {
		Self(intern_str(s))
	}
}
impl From<String> for IStr {
	fn from(s: String) -> Self {
		Self(intern_str(&s))
	}
}
impl From<&String> for IStr {
	fn from(s: &String) -> Self {
		Self(intern_str(s))
	}
}
impl From<char> for IStr {
	fn from(c: char) -> Self {
		let mut buf = [0u8; 4];
		Self(intern_str(c.encode_utf8(&mut buf)))
	}
}

impl FromIterator<char> for IStr {
	fn from_iter<T: IntoIterator<Item = char>>(iter: T) -> Self {
		let s: String = iter.into_iter().collect();
		Self::from(s)
	}
}

/// An interned, reference-counted, immutable byte string, used for binary
/// imports (`importbin`-style raw bytes) and encoding builtins.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IBytes(Rc<[u8]>);

impl IBytes {
	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}
}
impl Debug for IBytes {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "IBytes({} bytes)", self.0.len())
	}
}
impl Deref for IBytes {
	type Target = [u8];
	fn deref(&self) -> &[u8] {
		&self.0
	}
}
impl From<&[u8]> for IBytes {
	fn from(b: &[u8]) -> Self {
		Self(Rc::from(b))
	}
}
impl From<Vec<u8>> for IBytes {
	fn from(b: Vec<u8>) -> Self {
		Self(Rc::from(b.into_boxed_slice()))
	}
}

impl IBytes {
	/// Interprets the bytes as UTF-8, returning an interned string sharing
	/// no allocation with `self` on failure.
	pub fn cast_str(&self) -> Option<IStr> {
		std::str::from_utf8(&self.0).ok().map(IStr::from)
	}
}
impl IStr {
	pub fn cast_bytes(&self) -> IBytes {
		IBytes::from(self.0.as_bytes())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dedups_equal_strings() {
		let a = IStr::from("hello world");
		let b = IStr::from("hello world".to_string());
		assert_eq!(a, b);
		assert!(Rc::ptr_eq(&a.0, &b.0));
	}

	#[test]
	fn distinguishes_different_strings() {
		let a = IStr::from("a");
		let b = IStr::from("b");
		assert_ne!(a, b);
	}

	#[test]
	fn orders_lexicographically() {
		assert!(IStr::from("a") < IStr::from("b"));
		assert!(IStr::from("ab") > IStr::from("a"));
	}

	#[test]
	fn round_trips_through_bytes() {
		let s = IStr::from("héllo");
		let bytes = s.cast_bytes();
		assert_eq!(bytes.cast_str(), Some(s));
	}
}
