//! All bits and pieces concerning the embedded HTTP server are in this module.
//!
//! `bare_server::MockWebServer` owns the `hyper` HTTP server running in the background on its
//! own thread, defined in the `hyper` sub-module. Both share a `MockServerState`: the queue of
//! canned responses plus the recorded requests.
//!
//! Test code does not hold the `MockWebServer` itself: it gets a `handle::ServerHandle`, which
//! can enqueue responses and inspect the server but cannot stop it.
mod bare_server;
mod builder;
mod handle;
mod hyper;

pub use bare_server::MockWebServer;
pub use builder::{MockWebServerBuilder, BODY_PRINT_LIMIT_ENV};
pub use handle::ServerHandle;

impl MockWebServer {
    /// Configure a new [`MockWebServer`].
    ///
    /// ```rust
    /// use webserver_testbed::{MockWebServer, ResponseDescriptor};
    ///
    /// let mut server = MockWebServer::builder().start().unwrap();
    /// server.handle().enqueue(ResponseDescriptor::of("Hello, world!")).unwrap();
    ///
    /// let body = reqwest::blocking::get(server.handle().uri()).unwrap().text().unwrap();
    /// assert_eq!(body, "Hello, world!");
    ///
    /// server.stop().unwrap();
    /// ```
    pub fn builder() -> MockWebServerBuilder {
        MockWebServerBuilder::new()
    }
}
