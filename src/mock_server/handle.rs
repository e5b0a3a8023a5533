use crate::error::{ServerLifecycleError, TestbedError};
use crate::mock_server::bare_server::MockServerState;
use crate::{Request, ResponseDescriptor};
use log::{debug, warn};
use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use url::Url;

/// A non-owning handle to a running [`MockWebServer`](crate::MockWebServer).
///
/// Handles are cheap to clone. They can enqueue responses and inspect the server, but cannot
/// start or stop it: that is the job of whoever owns the server (usually the
/// [`WebServerExtension`](crate::WebServerExtension)). A handle outliving its server can still
/// inspect it, but [`enqueue`](Self::enqueue) fails and nothing answers requests anymore.
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<RwLock<MockServerState>>,
    address: SocketAddr,
}

impl ServerHandle {
    pub(super) fn new(state: Arc<RwLock<MockServerState>>, address: SocketAddr) -> Self {
        Self { state, address }
    }

    /// The root url of the server, e.g. `http://127.0.0.1:4372/`.
    pub fn base_url(&self) -> Url {
        // A socket address always makes a valid authority.
        Url::parse(&format!("http://{}/", self.address))
            .expect("Failed to build the base url of the mock web server.")
    }

    /// The base url as a string without the trailing slash, e.g. `http://127.0.0.1:4372`.
    pub fn uri(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Resolve `path` against the root of the server.
    ///
    /// ```rust
    /// use webserver_testbed::MockWebServer;
    ///
    /// let server = MockWebServer::builder().start().unwrap();
    /// let url = server.handle().url("/users?page=2").unwrap();
    ///
    /// assert_eq!(url.path(), "/users");
    /// assert_eq!(url.query(), Some("page=2"));
    /// ```
    pub fn url(&self, path: &str) -> Result<Url, TestbedError> {
        self.base_url()
            .join(path)
            .map_err(|source| TestbedError::InvalidUrl {
                path: path.to_owned(),
                source,
            })
    }

    /// The socket address the server listens on.
    pub fn address(&self) -> &SocketAddr {
        &self.address
    }

    /// Queue `response`: it will answer the first request that arrives after every response
    /// queued before it has been served.
    ///
    /// Fails with [`ServerLifecycleError::NotRunning`] once the server has been stopped:
    /// nothing would ever serve the response.
    pub fn enqueue(&self, response: ResponseDescriptor) -> Result<(), ServerLifecycleError> {
        let mut state = self.state.write().expect("Poisoned lock!");
        if !state.is_running() {
            warn!(
                "Refusing to enqueue a {} response on {}: the mock web server has been stopped.",
                response.status_code(),
                self.address
            );
            return Err(ServerLifecycleError::NotRunning);
        }
        debug!(
            "Enqueuing a {} response on {}.",
            response.status_code(),
            self.address
        );
        state.enqueue(response);
        Ok(())
    }

    /// Whether the server behind this handle is still serving.
    pub fn is_running(&self) -> bool {
        self.state.read().expect("Poisoned lock!").is_running()
    }

    pub(super) fn shut_down(&self) {
        self.state.write().expect("Poisoned lock!").shut_down();
    }

    /// Number of enqueued responses not served yet.
    pub fn pending_responses(&self) -> usize {
        self.state.read().expect("Poisoned lock!").pending_responses()
    }

    /// All the requests received since the server started.
    ///
    /// `None` if request recording was disabled on the
    /// [`MockWebServerBuilder`](crate::MockWebServerBuilder).
    pub fn received_requests(&self) -> Option<Vec<Request>> {
        self.state.read().expect("Poisoned lock!").received_requests()
    }
}

impl Debug for ServerHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("address", &self.address)
            .finish()
    }
}

impl PartialEq for ServerHandle {
    /// Two handles are equal when they point to the same server.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}
