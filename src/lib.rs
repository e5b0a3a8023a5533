#![allow(clippy::needless_doctest_main)]
//! `webserver_testbed` serves canned HTTP responses from an embedded mock web server while your
//! tests run, declared next to the tests that need them.
//!
//! # Table of Contents
//! 1. [Getting started](#getting-started)
//! 2. [Declaring responses](#declaring-responses)
//! 3. [Injecting fixtures](#injecting-fixtures)
//! 4. [Lifecycle](#lifecycle)
//! 5. [Errors](#errors)
//!
//! ## Getting started
//! ```rust
//! use webserver_testbed::{ResponseDeclaration, TestCase, WebServerExtension};
//!
//! fn main() {
//!     // One mock web server for the whole suite.
//!     let mut extension = WebServerExtension::new();
//!     extension.before_all().unwrap();
//!
//!     // Every value is enqueued before the test runs and served in order.
//!     let case = TestCase::new("lists_then_fails")
//!         .with_responses(ResponseDeclaration::literal(["[]", "[1]"]));
//!
//!     extension
//!         .run_test(&case, &mut (), |_, server| {
//!             let first = reqwest::blocking::get(server.uri()).unwrap().text().unwrap();
//!             let second = reqwest::blocking::get(server.uri()).unwrap().text().unwrap();
//!             assert_eq!(first, "[]");
//!             assert_eq!(second, "[1]");
//!         })
//!         .unwrap();
//!
//!     extension.after_all().unwrap();
//! }
//! ```
//!
//! ## Declaring responses
//!
//! A [`ResponseDeclaration`] names one or more content references, a status code (`200` by
//! default) and a [`Loader`] turning each reference into a body:
//! - [`Loader::Resource`] (the default) reads the reference from the bundled [`Resources`],
//!   `tests/resources` of the crate under test unless configured otherwise;
//! - [`Loader::Literal`] uses the reference as the body;
//! - [`Loader::Custom`] plugs in any [`ContentLoader`].
//!
//! Responses can also be built directly with [`build`], [`build_all`] and
//! [`ResponseDescriptor::of`], then enqueued through a [`ServerHandle`].
//!
//! ## Injecting fixtures
//!
//! Test fixtures implement [`TestInstance`], listing their injectable fields as [`Slot`]s:
//! the server handle, single responses built for inspection, resources read as text, bytes or
//! streams. The [`WebServerExtension`] populates the empty slots before each test; slots that
//! are already populated are left alone.
//!
//! ## Lifecycle
//!
//! With [`Lifecycle::PerSuite`] (the default) one server serves the whole suite, so its base
//! url is stable across tests. With [`Lifecycle::PerTest`] every test gets a freshly started
//! server, with nothing left in its queue from a previous test.
//!
//! Responses are served first-in first-out. A request arriving when the queue is empty gets a
//! `404`.
//!
//! ## Errors
//!
//! Setup never silently degrades: a missing resource, a slot whose type does not match its
//! declaration or a server that fails to start all surface as a [`TestbedError`] from the hook
//! that hit them.
mod binding;
mod declaration;
mod error;
pub mod http;
mod lifecycle;
mod loader;
mod mock_server;
mod request;
mod resources;
mod response;

pub use binding::{BoundValue, MetadataBinder, Slot, SlotKind, SlotTarget, TargetType, TestInstance};
pub use declaration::{ResourceDeclaration, ResponseDeclaration};
pub use error::{LoadError, ServerLifecycleError, TestbedError};
pub use lifecycle::{ExtensionBuilder, Lifecycle, ServerPhase, TestCase, WebServerExtension};
pub use loader::{ContentLoader, LiteralLoader, Loader, ResourceLoader};
pub use mock_server::{MockWebServer, MockWebServerBuilder, ServerHandle, BODY_PRINT_LIMIT_ENV};
pub use request::{BodyPrintLimit, Request, BODY_PRINT_LIMIT};
pub use resources::{ResourceStream, Resources, RESOURCE_DIR_ENV};
pub use response::{build, build_all, of_all, ResponseDescriptor, DEFAULT_STATUS_CODE};
