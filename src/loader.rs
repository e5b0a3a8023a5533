use crate::error::LoadError;
use crate::resources::Resources;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Anything that implements `ContentLoader` can turn a content reference into the body of a
/// [`ResponseDescriptor`].
///
/// Two loaders are provided out of the box:
/// - [`LiteralLoader`], the reference *is* the content;
/// - [`ResourceLoader`], the reference is a path into the bundled [`Resources`].
///
/// You can add your own strategy by implementing the trait:
///
/// ```rust
/// use webserver_testbed::http::StatusCode;
/// use webserver_testbed::{ContentLoader, LoadError};
///
/// /// Wraps the reference in a JSON envelope.
/// struct Envelope;
///
/// impl ContentLoader for Envelope {
///     fn load_content(&self, reference: &str) -> Result<Vec<u8>, LoadError> {
///         Ok(serde_json::json!({ "data": reference }).to_string().into_bytes())
///     }
/// }
///
/// let response = webserver_testbed::build("hi", StatusCode::OK, &Envelope).unwrap();
/// assert_eq!(response.body(), br#"{"data":"hi"}"#);
/// ```
///
/// Closures with the right signature implement `ContentLoader` as well.
///
/// [`ResponseDescriptor`]: crate::ResponseDescriptor
pub trait ContentLoader: Send + Sync {
    /// Produce the content named by `reference`.
    fn load_content(&self, reference: &str) -> Result<Vec<u8>, LoadError>;
}

impl<F> ContentLoader for F
where
    F: Fn(&str) -> Result<Vec<u8>, LoadError> + Send + Sync,
{
    fn load_content(&self, reference: &str) -> Result<Vec<u8>, LoadError> {
        self(reference)
    }
}

/// Uses the reference itself as the content. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralLoader;

impl ContentLoader for LiteralLoader {
    fn load_content(&self, reference: &str) -> Result<Vec<u8>, LoadError> {
        Ok(reference.as_bytes().to_vec())
    }
}

/// Reads the reference from a [`Resources`] set.
#[derive(Debug, Clone, Default)]
pub struct ResourceLoader {
    resources: Resources,
}

impl ResourceLoader {
    pub fn new(resources: Resources) -> Self {
        Self { resources }
    }
}

impl ContentLoader for ResourceLoader {
    fn load_content(&self, reference: &str) -> Result<Vec<u8>, LoadError> {
        self.resources.read_as_bytes(reference)
    }
}

/// Selects the loading strategy of a [`ResponseDeclaration`](crate::ResponseDeclaration).
///
/// `Resource` resolves against the resource set configured on the
/// [`WebServerExtension`](crate::WebServerExtension) processing the declaration.
#[derive(Clone, Default)]
pub enum Loader {
    Literal,
    #[default]
    Resource,
    Custom(Arc<dyn ContentLoader>),
}

impl Loader {
    /// Wrap a custom loader instance.
    pub fn custom<L: ContentLoader + 'static>(loader: L) -> Self {
        Loader::Custom(Arc::new(loader))
    }

    /// Load `reference` with the selected strategy.
    pub(crate) fn load(&self, reference: &str, resources: &Resources) -> Result<Vec<u8>, LoadError> {
        match self {
            Loader::Literal => LiteralLoader.load_content(reference),
            Loader::Resource => resources.read_as_bytes(reference),
            Loader::Custom(loader) => loader.load_content(reference),
        }
    }
}

impl Debug for Loader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Loader::Literal => f.write_str("Literal"),
            Loader::Resource => f.write_str("Resource"),
            // Trait objects give us nothing to print.
            Loader::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn fixtures() -> Resources {
        Resources::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/resources"))
    }

    #[test]
    fn literal_loader_is_the_identity() {
        for reference in ["", "Hello, world!", "{\"id\": 1}", "ünïcödé"] {
            assert_eq!(
                LiteralLoader.load_content(reference).unwrap(),
                reference.as_bytes()
            );
        }
    }

    #[test]
    fn resource_loader_reads_from_its_resource_set() {
        let loader = ResourceLoader::new(fixtures());

        assert_eq!(
            loader.load_content("users/alice.json").unwrap(),
            br#"{"id":1,"name":"alice"}"#
        );
    }

    #[test]
    fn resource_loader_fails_on_missing_references() {
        let loader = ResourceLoader::new(fixtures());

        let error = loader.load_content("missing.txt").unwrap_err();

        assert!(matches!(error, LoadError::ResourceNotFound { .. }));
    }

    #[test]
    fn closures_are_content_loaders() {
        let loader = Loader::custom(|reference: &str| {
            Ok::<_, LoadError>(reference.to_uppercase().into_bytes())
        });

        assert_eq!(loader.load("shout", &fixtures()).unwrap(), b"SHOUT");
    }

    #[test]
    fn the_default_selector_reads_resources() {
        let loaded = Loader::default().load("hello.txt", &fixtures()).unwrap();

        assert_eq!(loaded, b"Hello, world!");
    }
}
