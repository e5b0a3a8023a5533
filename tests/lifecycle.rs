use std::net::TcpListener;
use std::panic::{self, AssertUnwindSafe};
use test_log::test;
use webserver_testbed::{
    LoadError, MockWebServer, ResponseDeclaration, ServerHandle, ServerLifecycleError,
    ServerPhase, TestCase, TestbedError, WebServerExtension,
};

fn get(server: &ServerHandle, path: &str) -> reqwest::blocking::Response {
    reqwest::blocking::get(server.url(path).unwrap()).unwrap()
}

#[test]
fn serves_a_bundled_resource_at_the_base_url() {
    // Arrange
    let mut extension = WebServerExtension::new();
    extension.before_all().unwrap();
    let case = TestCase::new("hello").with_responses(ResponseDeclaration::single("hello.txt"));

    // Act
    extension
        .run_test(&case, &mut (), |_, server| {
            let response = get(server, "/");

            // Assert
            assert_eq!(response.status(), 200);
            assert_eq!(response.text().unwrap(), "Hello, world!");
        })
        .unwrap();

    extension.after_all().unwrap();
}

#[test]
fn responses_are_served_in_declaration_order_then_404() {
    // Arrange
    let mut extension = WebServerExtension::new();
    extension.before_all().unwrap();
    let case = TestCase::new("fifo").with_responses(ResponseDeclaration::literal(["A", "B", "C"]));

    // Act
    extension
        .run_test(&case, &mut (), |_, server| {
            assert_eq!(server.pending_responses(), 3);
            let bodies: Vec<String> = (0..3)
                .map(|_| get(server, "/anything").text().unwrap())
                .collect();
            let exhausted = get(server, "/anything");

            // Assert
            assert_eq!(bodies, ["A", "B", "C"]);
            assert_eq!(exhausted.status(), 404);
            assert_eq!(server.pending_responses(), 0);
        })
        .unwrap();

    extension.after_all().unwrap();
}

#[test]
fn the_declared_status_code_applies_to_every_value() {
    // Arrange
    let mut extension = WebServerExtension::new();
    extension.before_all().unwrap();
    let case = TestCase::new("status").with_responses(
        ResponseDeclaration::new(["not_found.json", "not_found.json"]).status_code(404),
    );

    // Act
    extension
        .run_test(&case, &mut (), |_, server| {
            for _ in 0..2 {
                let response = get(server, "/users/42");

                // Assert
                assert_eq!(response.status(), 404);
                assert_eq!(response.text().unwrap(), r#"{"error":"not found"}"#);
            }
        })
        .unwrap();

    extension.after_all().unwrap();
}

#[test]
fn a_suite_server_is_shared_by_every_test() {
    // Arrange
    let mut extension = WebServerExtension::new();
    extension.before_all().unwrap();
    let mut seen = Vec::new();

    // Act
    for name in ["first", "second"] {
        let case = TestCase::new(name).with_responses(ResponseDeclaration::literal([name]));
        extension
            .run_test(&case, &mut (), |_, server| {
                assert_eq!(get(server, "/").text().unwrap(), name);
                seen.push(server.base_url());
            })
            .unwrap();
    }

    // Assert
    assert_eq!(seen[0], seen[1]);
    assert_eq!(extension.phase(), ServerPhase::Running);
    extension.after_all().unwrap();
    assert_eq!(extension.phase(), ServerPhase::Stopped);
}

#[test]
fn every_test_gets_a_fresh_server_with_the_per_test_lifecycle() {
    // Arrange
    let mut extension = WebServerExtension::per_test();
    extension.before_all().unwrap();
    let leftovers = TestCase::new("leftovers").with_responses(ResponseDeclaration::literal(["1", "2"]));
    let mut first = None;

    extension
        .run_test(&leftovers, &mut (), |_, server| {
            assert_eq!(get(server, "/").text().unwrap(), "1");
            first = Some(server.clone());
        })
        .unwrap();
    assert_eq!(extension.phase(), ServerPhase::Unstarted);

    // Act
    extension
        .run_test(&TestCase::new("fresh"), &mut (), |_, server| {
            // Assert
            assert_ne!(first.as_ref(), Some(server));
            assert_eq!(server.pending_responses(), 0);
            assert_eq!(get(server, "/").status(), 404);
        })
        .unwrap();

    extension.after_all().unwrap();
}

#[test]
fn a_missing_resource_fails_setup_and_enqueues_nothing() {
    // Arrange
    let mut extension = WebServerExtension::new();
    extension.before_all().unwrap();
    let case = TestCase::new("missing")
        .with_responses(ResponseDeclaration::new(["hello.txt", "does/not/exist.json"]));

    // Act
    let error = extension.before_each(&case, &mut ()).unwrap_err();

    // Assert
    match error {
        TestbedError::Load(LoadError::ResourceNotFound { reference, .. }) => {
            assert_eq!(reference, "does/not/exist.json")
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(extension.server().unwrap().pending_responses(), 0);
    extension.after_all().unwrap();
}

#[test]
fn a_failed_per_test_setup_does_not_leave_a_server_behind() {
    // Arrange
    let mut extension = WebServerExtension::per_test();
    let case = TestCase::new("missing").with_responses(ResponseDeclaration::single("nope.txt"));

    // Act
    let error = extension.before_each(&case, &mut ()).unwrap_err();

    // Assert
    assert!(matches!(error, TestbedError::Load(_)));
    assert_eq!(extension.phase(), ServerPhase::Unstarted);
    // A runner still tears the test down: nothing to stop, nothing to report.
    extension.after_each().unwrap();
}

#[test]
fn binding_an_occupied_port_fails_to_start() {
    // Arrange
    let occupied = TcpListener::bind("127.0.0.1:0").unwrap();
    let mut extension = WebServerExtension::builder()
        .server(MockWebServer::builder().bind_address(occupied.local_addr().unwrap()))
        .build();

    // Act
    let error = extension.before_all().unwrap_err();

    // Assert
    assert!(matches!(
        error,
        TestbedError::Lifecycle(ServerLifecycleError::Start(_))
    ));
    assert_eq!(extension.phase(), ServerPhase::Unstarted);
}

#[test]
fn teardown_runs_even_if_the_test_panics() {
    // Arrange
    let mut extension = WebServerExtension::per_test();
    let case = TestCase::new("panics").with_responses(ResponseDeclaration::literal(["unused"]));

    // Act
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        extension.run_test(&case, &mut (), |_, _| panic!("the test failed"))
    }));

    // Assert
    let panic = outcome.unwrap_err();
    assert_eq!(panic.downcast_ref::<&str>(), Some(&"the test failed"));
    assert_eq!(extension.phase(), ServerPhase::Unstarted);
    assert!(extension.server().is_none());
}

#[test]
fn the_server_handle_is_resolvable_as_a_parameter() {
    // Arrange
    let mut extension = WebServerExtension::new();
    assert!(matches!(
        extension.resolve_parameter(),
        Err(TestbedError::Lifecycle(ServerLifecycleError::NotRunning))
    ));
    extension.before_all().unwrap();

    // Act
    let supported = extension.supports_parameter::<ServerHandle>();
    let handle = extension.resolve_parameter().unwrap();

    // Assert
    assert!(supported);
    assert!(!extension.supports_parameter::<u16>());
    assert_eq!(Some(&handle), extension.server());
    assert_eq!(handle.base_url(), extension.base_url().unwrap());
    assert_eq!(
        extension.request_url("/users/1").unwrap(),
        handle.url("/users/1").unwrap()
    );
    extension.after_all().unwrap();
}
