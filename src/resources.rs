use crate::error::LoadError;
use std::env;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Component, Path, PathBuf};

/// Environment variable overriding the root directory of the default [`Resources`] set.
pub const RESOURCE_DIR_ENV: &str = "TESTBED_RESOURCE_DIR";

/// Buffered reader over a resource, what a stream slot receives.
pub type ResourceStream = BufReader<File>;

/// The bundled resource set test fixtures are read from.
///
/// References are paths relative to the root directory, e.g. `users/list.json`.
/// A leading `/` is accepted and ignored. References cannot escape the root: a reference
/// containing `..` is treated as missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    root: PathBuf,
}

impl Resources {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a resource as raw bytes.
    pub fn read_as_bytes(&self, reference: &str) -> Result<Vec<u8>, LoadError> {
        let path = self.locate(reference)?;
        std::fs::read(&path).map_err(|e| to_load_error(reference, path, e))
    }

    /// Read a resource as UTF-8 text.
    ///
    /// Content that is not valid UTF-8 is reported as an I/O failure.
    pub fn read_as_text(&self, reference: &str) -> Result<String, LoadError> {
        let path = self.locate(reference)?;
        std::fs::read_to_string(&path).map_err(|e| to_load_error(reference, path, e))
    }

    /// Open a resource for streaming.
    pub fn read_as_stream(&self, reference: &str) -> Result<ResourceStream, LoadError> {
        let path = self.locate(reference)?;
        File::open(&path)
            .map(BufReader::new)
            .map_err(|e| to_load_error(reference, path, e))
    }

    fn locate(&self, reference: &str) -> Result<PathBuf, LoadError> {
        let relative = Path::new(reference.trim_start_matches('/'));
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        let path = self.root.join(relative);

        if !contained || reference.trim_start_matches('/').is_empty() || !path.is_file() {
            return Err(LoadError::ResourceNotFound {
                reference: reference.to_owned(),
                path,
            });
        }
        Ok(path)
    }
}

impl Default for Resources {
    /// Resolution order: `TESTBED_RESOURCE_DIR`, then `tests/resources` under the crate
    /// being tested (`CARGO_MANIFEST_DIR`), then `tests/resources` relative to the working
    /// directory.
    fn default() -> Self {
        if let Some(dir) = env::var_os(RESOURCE_DIR_ENV) {
            return Self::new(dir);
        }
        let base = env::var_os("CARGO_MANIFEST_DIR")
            .map(PathBuf::from)
            .unwrap_or_default();
        Self::new(base.join("tests").join("resources"))
    }
}

fn to_load_error(reference: &str, path: PathBuf, error: std::io::Error) -> LoadError {
    // The file can disappear between `locate` and the actual read.
    if error.kind() == ErrorKind::NotFound {
        LoadError::ResourceNotFound {
            reference: reference.to_owned(),
            path,
        }
    } else {
        LoadError::Io {
            reference: reference.to_owned(),
            source: error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn fixtures() -> Resources {
        Resources::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/resources"))
    }

    #[test]
    fn reads_a_resource_in_every_encoding() {
        let resources = fixtures();

        let text = resources.read_as_text("hello.txt").unwrap();
        let bytes = resources.read_as_bytes("hello.txt").unwrap();
        let mut streamed = String::new();
        resources
            .read_as_stream("hello.txt")
            .unwrap()
            .read_to_string(&mut streamed)
            .unwrap();

        assert_eq!(text, "Hello, world!");
        assert_eq!(bytes, b"Hello, world!");
        assert_eq!(streamed, text);
    }

    #[test]
    fn a_leading_slash_is_ignored() {
        assert_eq!(
            fixtures().read_as_text("/hello.txt").unwrap(),
            "Hello, world!"
        );
    }

    #[test]
    fn missing_resources_are_reported_as_not_found() {
        let error = fixtures().read_as_bytes("does/not/exist.json").unwrap_err();

        assert!(matches!(
            error,
            LoadError::ResourceNotFound { ref reference, .. } if reference == "does/not/exist.json"
        ));
    }

    #[test]
    fn references_cannot_escape_the_resource_root() {
        let error = fixtures().read_as_text("../resources/hello.txt").unwrap_err();

        assert!(matches!(error, LoadError::ResourceNotFound { .. }));
    }

    #[test]
    fn directories_are_not_resources() {
        let error = fixtures().read_as_text("users").unwrap_err();

        assert!(matches!(error, LoadError::ResourceNotFound { .. }));
    }
}
