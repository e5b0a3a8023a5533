use crate::error::ServerLifecycleError;
use crate::mock_server::bare_server::{MockWebServer, RequestRecording};
use crate::request::{BodyPrintLimit, BODY_PRINT_LIMIT};
use std::env;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};

/// Environment variable overriding the default [`BodyPrintLimit`].
pub const BODY_PRINT_LIMIT_ENV: &str = "TESTBED_BODY_PRINT_LIMIT";

/// A builder providing a fluent API to configure and start a [`MockWebServer`].
/// Use [`MockWebServer::builder`] to get started.
///
/// The builder is `Clone`: a [`WebServerExtension`](crate::WebServerExtension) keeps one
/// around to start a fresh server with the same configuration before every test.
#[derive(Debug, Clone)]
pub struct MockWebServerBuilder {
    bind_address: SocketAddr,
    record_incoming_requests: bool,
    body_print_limit: BodyPrintLimit,
}

impl MockWebServerBuilder {
    pub(super) fn new() -> Self {
        let body_print_limit = match env::var(BODY_PRINT_LIMIT_ENV)
            .ok()
            .and_then(|x| x.parse::<usize>().ok())
        {
            Some(limit) => BodyPrintLimit::Limited(limit),
            None => BodyPrintLimit::Limited(BODY_PRINT_LIMIT),
        };
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            record_incoming_requests: true,
            body_print_limit,
        }
    }

    /// By default the server listens on a random free port of `127.0.0.1`.
    /// Use `bind_address` to pick the interface and/or the port.
    ///
    /// Binding a fixed port fails with [`ServerLifecycleError::Start`] when the port is taken.
    pub fn bind_address(mut self, address: SocketAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// By default the server records all incoming requests, see
    /// [`ServerHandle::received_requests`](crate::ServerHandle::received_requests).
    pub fn disable_request_recording(mut self) -> Self {
        self.record_incoming_requests = false;
        self
    }

    /// Requests that find the response queue empty are logged, with their body truncated to
    /// this limit.
    pub fn body_print_limit(mut self, limit: BodyPrintLimit) -> Self {
        self.body_print_limit = limit;
        self
    }

    /// Bind the listener and launch the [`MockWebServer`].
    pub fn start(&self) -> Result<MockWebServer, ServerLifecycleError> {
        let listener = TcpListener::bind(self.bind_address).map_err(ServerLifecycleError::Start)?;
        let recording = if self.record_incoming_requests {
            RequestRecording::Enabled
        } else {
            RequestRecording::Disabled
        };
        MockWebServer::start(listener, recording, self.body_print_limit)
    }
}

impl Default for MockWebServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
