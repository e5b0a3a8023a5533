use std::fmt;

use http::{HeaderMap, Method};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use url::Url;

pub const BODY_PRINT_LIMIT: usize = 10_000;

/// Specifies limitations on printing request bodies when logging requests. For some mock servers
/// the bodies may be too large to reasonably print and it may be desirable to limit them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyPrintLimit {
    /// Maximum length of a body to print in bytes.
    Limited(usize),
    /// There is no limit to the size of a body that may be printed.
    Unlimited,
}

/// A request captured by the mock web server.
///
/// Requests are read in full when they arrive, so they can be inspected after the fact
/// through [`ServerHandle::received_requests`](crate::ServerHandle::received_requests).
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

type DynError = Box<dyn std::error::Error + Send + Sync>;

impl Request {
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub(crate) async fn from_hyper(
        request: hyper::Request<hyper::body::Incoming>,
    ) -> Result<Request, DynError> {
        let (parts, body) = request.into_parts();
        let url: Url = match parts.uri.authority() {
            Some(_) => parts.uri.to_string(),
            None => format!("http://localhost{}", parts.uri),
        }
        .parse()?;

        let body = body.collect().await?.to_bytes();

        Ok(Self {
            url,
            method: parts.method,
            headers: parts.headers,
            body: body.to_vec(),
        })
    }

    pub(crate) fn print_with_limit(
        &self,
        mut buffer: impl fmt::Write,
        body_print_limit: BodyPrintLimit,
    ) -> fmt::Result {
        writeln!(buffer, "{} {}", self.method, self.url)?;
        for name in self.headers.keys() {
            let values = self
                .headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()))
                .collect::<Vec<_>>();
            writeln!(buffer, "{}: {}", name, values.join(","))?;
        }

        let printable = match body_print_limit {
            BodyPrintLimit::Limited(limit) if self.body.len() > limit => {
                // Back off to the closest char boundary below the limit.
                (0..=limit)
                    .rev()
                    .find_map(|end| std::str::from_utf8(&self.body[..end]).ok())
                    .filter(|truncated| !truncated.is_empty())
                    .map(|truncated| (truncated, Some(limit)))
            }
            _ => std::str::from_utf8(&self.body)
                .ok()
                .map(|body| (body, None)),
        };

        match printable {
            Some((body, truncated_at)) => {
                writeln!(buffer, "{}", body)?;
                if let Some(limit) = truncated_at {
                    writeln!(
                        buffer,
                        "We truncated the body because it was too large: {} bytes (limit: {} bytes)",
                        self.body.len(),
                        limit
                    )?;
                    writeln!(
                        buffer,
                        "Increase this limit by setting `TESTBED_BODY_PRINT_LIMIT`, or calling `MockWebServerBuilder::body_print_limit`"
                    )?;
                }
                Ok(())
            }
            None => writeln!(
                buffer,
                "Body is likely binary (invalid utf-8) size is {} bytes",
                self.body.len()
            ),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print_with_limit(f, BodyPrintLimit::Limited(BODY_PRINT_LIMIT))
    }
}
