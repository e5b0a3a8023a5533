use crate::binding::{MetadataBinder, TestInstance};
use crate::declaration::ResponseDeclaration;
use crate::error::{ServerLifecycleError, TestbedError};
use crate::mock_server::{MockWebServer, MockWebServerBuilder, ServerHandle};
use crate::resources::Resources;
use log::{debug, error, warn};
use std::any::{Any, TypeId};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use url::Url;

/// When the mock web server is started and stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Started in [`before_all`](WebServerExtension::before_all), stopped in
    /// [`after_all`](WebServerExtension::after_all): every test of the suite talks to the same
    /// server.
    #[default]
    PerSuite,
    /// Started in [`before_each`](WebServerExtension::before_each), stopped in
    /// [`after_each`](WebServerExtension::after_each): every test gets a fresh server.
    PerTest,
}

/// Where the server of a [`WebServerExtension`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    Unstarted,
    Running,
    /// Terminal for [`Lifecycle::PerSuite`].
    Stopped,
}

enum ServerState {
    Unstarted,
    Running(MockWebServer),
    Stopped,
}

/// A test about to run: its name and the responses to serve while it runs.
#[derive(Debug, Clone)]
pub struct TestCase {
    name: String,
    responses: Option<ResponseDeclaration>,
}

impl TestCase {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            responses: None,
        }
    }

    /// Every value of `declaration` is enqueued, in order, before the test runs.
    pub fn with_responses(mut self, declaration: ResponseDeclaration) -> Self {
        self.responses = Some(declaration);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn responses(&self) -> Option<&ResponseDeclaration> {
        self.responses.as_ref()
    }
}

/// Drives a [`MockWebServer`] around the boundaries of a test suite.
///
/// The host test runner calls the hooks:
/// - [`before_all`](Self::before_all) / [`after_all`](Self::after_all) around the suite;
/// - [`before_each`](Self::before_each) / [`after_each`](Self::after_each) around every test;
///   `before_each` enqueues the responses declared by the [`TestCase`] and binds the test
///   instance;
/// - [`post_process_test_instance`](Self::post_process_test_instance) when it wants an instance
///   bound outside of `before_each`;
/// - [`supports_parameter`](Self::supports_parameter) /
///   [`resolve_parameter`](Self::resolve_parameter) to inject the [`ServerHandle`] into test
///   functions.
///
/// [`run_test`](Self::run_test) wraps a test body with `before_each`/`after_each`.
///
/// ```rust
/// use webserver_testbed::{ResponseDeclaration, TestCase, WebServerExtension};
///
/// let mut extension = WebServerExtension::new();
/// extension.before_all().unwrap();
///
/// let case = TestCase::new("greets").with_responses(ResponseDeclaration::literal(["Hello, world!"]));
/// extension
///     .run_test(&case, &mut (), |_, server| {
///         let response = reqwest::blocking::get(server.uri()).unwrap();
///         assert_eq!(response.status(), 200);
///         assert_eq!(response.text().unwrap(), "Hello, world!");
///     })
///     .unwrap();
///
/// extension.after_all().unwrap();
/// ```
pub struct WebServerExtension {
    lifecycle: Lifecycle,
    server_builder: MockWebServerBuilder,
    resources: Resources,
    state: ServerState,
}

impl WebServerExtension {
    /// An extension with the default configuration: one server for the whole suite,
    /// resources read from the default [`Resources`] set.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// An extension starting a fresh server for every test.
    pub fn per_test() -> Self {
        Self::builder().lifecycle(Lifecycle::PerTest).build()
    }

    pub fn builder() -> ExtensionBuilder {
        ExtensionBuilder::new()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn phase(&self) -> ServerPhase {
        match self.state {
            ServerState::Unstarted => ServerPhase::Unstarted,
            ServerState::Running(_) => ServerPhase::Running,
            ServerState::Stopped => ServerPhase::Stopped,
        }
    }

    pub fn before_all(&mut self) -> Result<(), TestbedError> {
        if self.lifecycle == Lifecycle::PerSuite {
            self.start_server()?;
        }
        Ok(())
    }

    pub fn after_all(&mut self) -> Result<(), TestbedError> {
        if self.lifecycle == Lifecycle::PerSuite {
            self.stop_server()?;
        }
        Ok(())
    }

    /// Prepare the server and `instance` for `case`:
    /// 1. validate the slots of `instance`, before any network activity;
    /// 2. start a fresh server, with [`Lifecycle::PerTest`];
    /// 3. build every response declared by `case` and enqueue them in order;
    /// 4. bind `instance`.
    ///
    /// A response that fails to build leaves the queue untouched. With
    /// [`Lifecycle::PerTest`] a failure also stops the server it started.
    pub fn before_each<I>(&mut self, case: &TestCase, instance: &mut I) -> Result<(), TestbedError>
    where
        I: TestInstance + ?Sized,
    {
        debug!("Preparing test `{}`.", case.name());
        MetadataBinder::new(None, &self.resources).validate(instance)?;

        if self.lifecycle == Lifecycle::PerTest {
            self.start_server()?;
        }
        let outcome = self.prepare(case, instance);
        if outcome.is_err() && self.lifecycle == Lifecycle::PerTest {
            if let Err(e) = self.stop_server() {
                warn!("{}", e);
            }
            self.state = ServerState::Unstarted;
        }
        outcome
    }

    fn prepare<I>(&self, case: &TestCase, instance: &mut I) -> Result<(), TestbedError>
    where
        I: TestInstance + ?Sized,
    {
        let server = self.running()?;
        if let Some(declaration) = case.responses() {
            let responses = declaration.build_all(&self.resources)?;
            debug!(
                "Enqueuing {} response(s) for test `{}`.",
                responses.len(),
                case.name()
            );
            for response in responses {
                server.enqueue(response)?;
            }
        }
        self.post_process_test_instance(instance)
    }

    /// With [`Lifecycle::PerTest`], stop the server of the test that just ran.
    ///
    /// Does nothing if no server was started for the test, e.g. because `before_each` failed.
    pub fn after_each(&mut self) -> Result<(), TestbedError> {
        if self.lifecycle == Lifecycle::PerTest && self.phase() != ServerPhase::Unstarted {
            let stopped = self.stop_server();
            // Ready for the next test, even if stopping failed.
            self.state = ServerState::Unstarted;
            stopped?;
        }
        Ok(())
    }

    /// Populate the empty slots of `instance`.
    ///
    /// Can run right after the instance is constructed. Under [`Lifecycle::PerTest`] no server
    /// is running yet: server slots stay empty until [`before_each`](Self::before_each) binds
    /// them.
    pub fn post_process_test_instance<I>(&self, instance: &mut I) -> Result<(), TestbedError>
    where
        I: TestInstance + ?Sized,
    {
        MetadataBinder::new(self.server(), &self.resources).bind(instance)
    }

    /// Whether a test parameter of type `T` can be provided by [`resolve_parameter`](Self::resolve_parameter).
    pub fn supports_parameter<T: Any>(&self) -> bool {
        TypeId::of::<T>() == TypeId::of::<ServerHandle>()
    }

    /// The handle of the current server, for injection into a test parameter.
    pub fn resolve_parameter(&self) -> Result<ServerHandle, TestbedError> {
        Ok(self.running()?.clone())
    }

    /// The handle of the current server, if one is running.
    pub fn server(&self) -> Option<&ServerHandle> {
        match &self.state {
            ServerState::Running(server) => Some(server.handle()),
            _ => None,
        }
    }

    /// The root url of the current server.
    pub fn base_url(&self) -> Result<Url, TestbedError> {
        Ok(self.running()?.base_url())
    }

    /// `path` resolved against the root of the current server.
    pub fn request_url(&self, path: &str) -> Result<Url, TestbedError> {
        self.running()?.url(path)
    }

    /// Run `test` between [`before_each`](Self::before_each) and
    /// [`after_each`](Self::after_each), handing it the bound instance and the server handle.
    ///
    /// If `test` panics, `after_each` still runs and the panic is resumed afterwards: a failure
    /// to stop the server is logged rather than hiding the test's own failure.
    pub fn run_test<I, F>(
        &mut self,
        case: &TestCase,
        instance: &mut I,
        test: F,
    ) -> Result<(), TestbedError>
    where
        I: TestInstance + ?Sized,
        F: FnOnce(&mut I, &ServerHandle),
    {
        self.before_each(case, instance)?;
        let server = match self.resolve_parameter() {
            Ok(server) => server,
            Err(e) => {
                if let Err(teardown) = self.after_each() {
                    warn!("{}", teardown);
                }
                return Err(e);
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| test(instance, &server)));
        let teardown = self.after_each();
        conclude(case, outcome, teardown)
    }

    fn running(&self) -> Result<&ServerHandle, ServerLifecycleError> {
        self.server().ok_or(ServerLifecycleError::NotRunning)
    }

    fn start_server(&mut self) -> Result<(), ServerLifecycleError> {
        match self.state {
            ServerState::Running(_) => Err(ServerLifecycleError::AlreadyRunning),
            ServerState::Stopped => Err(ServerLifecycleError::Terminated),
            ServerState::Unstarted => {
                let server = self.server_builder.start()?;
                debug!("Mock web server started at {}.", server.handle().uri());
                self.state = ServerState::Running(server);
                Ok(())
            }
        }
    }

    /// The server ends up `Stopped` even if stopping it failed.
    fn stop_server(&mut self) -> Result<(), ServerLifecycleError> {
        match std::mem::replace(&mut self.state, ServerState::Stopped) {
            ServerState::Running(mut server) => server.stop(),
            ServerState::Unstarted => {
                self.state = ServerState::Unstarted;
                Err(ServerLifecycleError::NotRunning)
            }
            ServerState::Stopped => Err(ServerLifecycleError::NotRunning),
        }
    }
}

/// A failed teardown is reported unless the test itself panicked: the test's panic wins.
fn conclude(
    case: &TestCase,
    outcome: thread::Result<()>,
    teardown: Result<(), TestbedError>,
) -> Result<(), TestbedError> {
    match outcome {
        Ok(()) => teardown,
        Err(panic) => {
            if let Err(e) = teardown {
                error!("Test `{}` failed and so did its teardown: {}", case.name(), e);
            }
            panic::resume_unwind(panic)
        }
    }
}

impl Default for WebServerExtension {
    fn default() -> Self {
        Self::new()
    }
}

/// A builder providing a fluent API to configure a [`WebServerExtension`].
/// Use [`WebServerExtension::builder`] to get started.
#[derive(Debug, Clone, Default)]
pub struct ExtensionBuilder {
    lifecycle: Lifecycle,
    server: MockWebServerBuilder,
    resources: Option<Resources>,
}

impl ExtensionBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// `true` for [`Lifecycle::PerTest`], `false` for [`Lifecycle::PerSuite`].
    pub fn per_test_lifecycle(self, per_test: bool) -> Self {
        self.lifecycle(if per_test {
            Lifecycle::PerTest
        } else {
            Lifecycle::PerSuite
        })
    }

    /// Configuration of every server the extension starts.
    pub fn server(mut self, server: MockWebServerBuilder) -> Self {
        self.server = server;
        self
    }

    /// Where [`Loader::Resource`](crate::Loader::Resource) declarations and resource slots
    /// are read from. Defaults to [`Resources::default`].
    pub fn resources(mut self, resources: Resources) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn build(self) -> WebServerExtension {
        WebServerExtension {
            lifecycle: self.lifecycle,
            server_builder: self.server,
            resources: self.resources.unwrap_or_default(),
            state: ServerState::Unstarted,
        }
    }
}
