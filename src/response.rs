use crate::error::LoadError;
use crate::loader::ContentLoader;
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Bytes;
use serde::Serialize;
use std::convert::TryInto;

/// The status code used when a declaration does not specify one.
pub const DEFAULT_STATUS_CODE: StatusCode = StatusCode::OK;

/// A canned response, ready to be enqueued on a [`ServerHandle`].
///
/// Descriptors are immutable once built: the builder-style methods consume `self` and hand
/// back a new descriptor.
///
/// [`ServerHandle`]: crate::ServerHandle
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseDescriptor {
    status_code: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

// As with every fixture helper, conversions that can only fail because of a typo in the
// test itself panic instead of returning a `Result`.
impl ResponseDescriptor {
    /// An empty response with the given status code.
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// A `200 OK` response with `body` as literal content.
    pub fn of<B: Into<Vec<u8>>>(body: B) -> Self {
        Self::new(DEFAULT_STATUS_CODE).set_body_bytes(body)
    }

    /// Insert a header `value` with `key` as header name, replacing existing values.
    pub fn insert_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert into header name.");
        let value = value
            .try_into()
            .expect("Failed to convert into header value.");
        self.headers.insert(key, value);
        self
    }

    /// Append a header `value` to the list of values for `key`.
    pub fn append_header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        <K as TryInto<HeaderName>>::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        <V as TryInto<HeaderValue>>::Error: std::fmt::Debug,
    {
        let key = key.try_into().expect("Failed to convert into header name.");
        let value = value
            .try_into()
            .expect("Failed to convert into header value.");
        self.headers.append(key, value);
        self
    }

    pub fn set_body_bytes<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Set the body from a JSON-serializable value.
    ///
    /// It sets "Content-Type" to "application/json".
    pub fn set_body_json<B: Serialize>(mut self, body: B) -> Self {
        self.body = serde_json::to_vec(&body).expect("Failed to convert into body.");
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as text, replacing invalid UTF-8 sequences.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn the descriptor into the response written on the wire.
    pub(crate) fn generate_response(&self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body.clone())));
        *response.status_mut() = self.status_code;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

/// Build a descriptor by loading `reference` with `loader`.
///
/// Loader failures are returned unchanged.
///
/// ```rust
/// use webserver_testbed::http::StatusCode;
/// use webserver_testbed::{build, LiteralLoader};
///
/// let response = build("Not here", StatusCode::NOT_FOUND, &LiteralLoader).unwrap();
///
/// assert_eq!(response.status_code(), 404);
/// assert_eq!(response.body(), b"Not here");
/// ```
pub fn build<L>(
    reference: &str,
    status_code: StatusCode,
    loader: &L,
) -> Result<ResponseDescriptor, LoadError>
where
    L: ContentLoader + ?Sized,
{
    let body = loader.load_content(reference)?;
    Ok(ResponseDescriptor::new(status_code).set_body_bytes(body))
}

/// Build one `200 OK` descriptor per reference, in the order they are given.
///
/// The first loader failure aborts the whole batch.
pub fn build_all<I, S, L>(references: I, loader: &L) -> Result<Vec<ResponseDescriptor>, LoadError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    L: ContentLoader + ?Sized,
{
    references
        .into_iter()
        .map(|reference| build(reference.as_ref(), DEFAULT_STATUS_CODE, loader))
        .collect()
}

/// [`build_all`] with the [`LiteralLoader`](crate::LiteralLoader): each value is a response body.
pub fn of_all<I, S>(bodies: I) -> Vec<ResponseDescriptor>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    bodies
        .into_iter()
        .map(|body| ResponseDescriptor::of(body.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LiteralLoader, ResourceLoader};
    use crate::resources::Resources;
    use std::path::Path;

    fn resource_loader() -> ResourceLoader {
        ResourceLoader::new(Resources::new(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/resources"),
        ))
    }

    #[test]
    fn literal_content_round_trips_with_the_default_status() {
        let response = build("Hello, world!", DEFAULT_STATUS_CODE, &LiteralLoader).unwrap();

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.body_string(), "Hello, world!");
        assert_eq!(response, ResponseDescriptor::of("Hello, world!"));
    }

    #[test]
    fn the_declared_status_code_is_kept() {
        for code in [201u16, 204, 301, 404, 418, 500, 503] {
            let status = StatusCode::from_u16(code).unwrap();

            let response = build("body", status, &LiteralLoader).unwrap();

            assert_eq!(response.status_code(), status);
        }
    }

    #[test]
    fn build_all_preserves_input_order() {
        let responses = build_all(["A", "B", "C"], &LiteralLoader).unwrap();

        let bodies: Vec<String> = responses.iter().map(|r| r.body_string()).collect();
        assert_eq!(bodies, ["A", "B", "C"]);
        assert!(responses.iter().all(|r| r.status_code() == StatusCode::OK));
    }

    #[test]
    fn loader_failures_propagate_unchanged() {
        let error = build("missing.json", StatusCode::OK, &resource_loader()).unwrap_err();

        assert!(matches!(error, LoadError::ResourceNotFound { .. }));
    }

    #[test]
    fn one_failure_aborts_the_batch() {
        let result = build_all(["hello.txt", "missing.json"], &resource_loader());

        assert!(result.is_err());
    }

    #[test]
    fn builder_methods_shape_the_generated_response() {
        let response = ResponseDescriptor::new(StatusCode::CREATED)
            .set_body_json(serde_json::json!({ "id": 7 }))
            .insert_header("X-Request-Id", "abc")
            .generate_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.headers()["x-request-id"], "abc");
    }

    #[test]
    fn of_all_uses_literal_bodies() {
        let responses = of_all(["first", "second"]);

        assert_eq!(responses[0].body(), b"first");
        assert_eq!(responses[1].body(), b"second");
    }
}
