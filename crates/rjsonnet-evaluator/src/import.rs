//! Resolving and loading `import`/`importstr`/`importbin` targets.

use std::{
	fs,
	path::{Path, PathBuf},
};

use rjsonnet_parser::SourcePath;

use crate::{
	error::{Error::*, Result},
	throw,
};

/// Resolves `import`/`importstr`/`importbin` paths and loads file contents.
/// Hosts may substitute an in-memory resolver for testing instead of
/// touching the real filesystem.
pub trait ImportResolver {
	/// Resolves `path`, written literally in source, relative to the
	/// directory of `from`.
	fn resolve_from(&self, from: &SourcePath, path: &Path) -> Result<SourcePath>;
	/// Resolves a path with no importing file (the CLI's initial argument).
	fn resolve(&self, path: &Path) -> Result<SourcePath>;
	/// Reads the raw bytes of an already-resolved path.
	fn load_file_contents(&self, resolved: &SourcePath) -> Result<Vec<u8>>;
}

/// Resolves imports against the real filesystem, canonicalizing paths so
/// that two different relative spellings of the same file share one cache
/// entry.
pub struct FileImportResolver;
impl ImportResolver for FileImportResolver {
	fn resolve_from(&self, from: &SourcePath, path: &Path) -> Result<SourcePath> {
		let base = match from {
			SourcePath::Path(p) => p.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
			SourcePath::Virtual(_) => throw_cant_import_virtual()?,
		};
		self.resolve(&base.join(path))
	}
	fn resolve(&self, path: &Path) -> Result<SourcePath> {
		let canonical: PathBuf = fs::canonicalize(path).map_err(|_| {
			ImportFileNotFound(
				SourcePath::Path(path.into()),
				path.display().to_string(),
			)
		})?;
		if canonical.is_dir() {
			throw!(ImportIsADirectory(SourcePath::Path(canonical.into())));
		}
		Ok(SourcePath::Path(canonical.into()))
	}
	fn load_file_contents(&self, resolved: &SourcePath) -> Result<Vec<u8>> {
		let SourcePath::Path(path) = resolved else {
			return throw_cant_import_virtual();
		};
		fs::read(path).map_err(|e| ImportIo(e.to_string()).into())
	}
}

fn throw_cant_import_virtual<T>() -> Result<T> {
	Err(CantImportFromVirtualFile.into())
}

/// Used when no filesystem access is wired up (snippet evaluation, unit
/// tests): every import fails.
pub struct DummyImportResolver;
impl ImportResolver for DummyImportResolver {
	fn resolve_from(&self, _from: &SourcePath, path: &Path) -> Result<SourcePath> {
		self.resolve(path)
	}
	fn resolve(&self, path: &Path) -> Result<SourcePath> {
		throw!(ImportFileNotFound(
			SourcePath::Virtual("<no import resolver>".into()),
			path.display().to_string()
		))
	}
	fn load_file_contents(&self, resolved: &SourcePath) -> Result<Vec<u8>> {
		throw!(ResolvedFileNotFound(resolved.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dummy_resolver_refuses_everything() {
		let r = DummyImportResolver;
		assert!(r.resolve(Path::new("a.jsonnet")).is_err());
	}
}
