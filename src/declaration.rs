use crate::error::TestbedError;
use crate::loader::Loader;
use crate::resources::Resources;
use crate::response::{ResponseDescriptor, DEFAULT_STATUS_CODE};
use http::StatusCode;

/// Declares one or more canned responses.
///
/// Attached to a [`TestCase`](crate::TestCase), every value becomes a response enqueued on the
/// mock web server before the test runs, in the order they are given.
/// Attached to a response [`Slot`](crate::Slot), it must carry exactly one value: the built
/// response is bound to the slot for inspection.
///
/// Defaults: status code `200`, [`Loader::Resource`].
///
/// ```rust
/// use webserver_testbed::{Loader, ResponseDeclaration};
///
/// let declaration = ResponseDeclaration::new(["first", "second"])
///     .status_code(202)
///     .loader(Loader::Literal);
///
/// assert_eq!(declaration.values(), &["first", "second"]);
/// assert_eq!(declaration.code(), 202);
/// ```
///
/// The status code applies to every value of the declaration.
#[derive(Debug, Clone)]
pub struct ResponseDeclaration {
    values: Vec<String>,
    status_code: u16,
    loader: Loader,
}

impl ResponseDeclaration {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            status_code: DEFAULT_STATUS_CODE.as_u16(),
            loader: Loader::default(),
        }
    }

    /// A declaration with a single value.
    pub fn single<S: Into<String>>(value: S) -> Self {
        Self::new([value])
    }

    /// Shorthand for a declaration whose values are literal response bodies.
    pub fn literal<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(values).loader(Loader::Literal)
    }

    pub fn status_code(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn code(&self) -> u16 {
        self.status_code
    }

    pub fn selected_loader(&self) -> &Loader {
        &self.loader
    }

    /// The declared status code, checked.
    pub(crate) fn resolved_status(&self) -> Result<StatusCode, TestbedError> {
        StatusCode::from_u16(self.status_code).map_err(|_| TestbedError::InvalidStatusCode {
            code: self.status_code,
        })
    }

    /// Build one descriptor per value, in declaration order.
    ///
    /// Nothing is returned unless every value loads.
    pub fn build_all(&self, resources: &Resources) -> Result<Vec<ResponseDescriptor>, TestbedError> {
        let status_code = self.resolved_status()?;
        self.values
            .iter()
            .map(|value| -> Result<ResponseDescriptor, TestbedError> {
                let body = self.loader.load(value, resources)?;
                Ok(ResponseDescriptor::new(status_code).set_body_bytes(body))
            })
            .collect()
    }
}

/// Declares a resource to inject into a [`Slot`](crate::Slot).
///
/// How the resource is decoded (text, bytes or stream) depends on the type of the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDeclaration {
    reference: String,
}

impl ResourceDeclaration {
    pub fn new<S: Into<String>>(reference: S) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }
}
