use crate::error::ServerLifecycleError;
use crate::mock_server::handle::ServerHandle;
use crate::mock_server::hyper::run_server;
use crate::request::BodyPrintLimit;
use crate::{Request, ResponseDescriptor};
use http::{Response, StatusCode};
use http_body_util::Full;
use hyper::body::Bytes;
use log::debug;
use std::collections::VecDeque;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

/// Whether the server keeps a copy of every request it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestRecording {
    Enabled,
    Disabled,
}

/// Everything the background server and its handles share: the queue of canned responses and
/// the requests received so far.
pub(crate) struct MockServerState {
    queue: VecDeque<ResponseDescriptor>,
    received_requests: Option<Vec<Request>>,
    body_print_limit: BodyPrintLimit,
    // Cleared once the owning `MockWebServer` starts shutting down.
    running: bool,
}

impl MockServerState {
    pub(super) fn new(recording: RequestRecording, body_print_limit: BodyPrintLimit) -> Self {
        let received_requests = match recording {
            RequestRecording::Enabled => Some(Vec::new()),
            RequestRecording::Disabled => None,
        };
        Self {
            queue: VecDeque::new(),
            received_requests,
            body_print_limit,
            running: true,
        }
    }

    /// Answer `request` with the oldest queued response, or a 404 when the queue is empty.
    pub(super) fn handle_request(&mut self, request: Request) -> Response<Full<Bytes>> {
        let response = match self.queue.pop_front() {
            Some(descriptor) => {
                debug!(
                    "Serving a {} response to {} {}.",
                    descriptor.status_code(),
                    request.method,
                    request.url
                );
                descriptor.generate_response()
            }
            None => {
                let mut printed = String::new();
                // Writing into a `String` cannot fail.
                let _ = request.print_with_limit(&mut printed, self.body_print_limit);
                debug!("No response left in the queue for request:\n{}", printed);

                let mut response = Response::new(Full::new(Bytes::new()));
                *response.status_mut() = StatusCode::NOT_FOUND;
                response
            }
        };
        if let Some(received_requests) = &mut self.received_requests {
            received_requests.push(request);
        }
        response
    }

    pub(super) fn enqueue(&mut self, response: ResponseDescriptor) {
        self.queue.push_back(response);
    }

    pub(super) fn pending_responses(&self) -> usize {
        self.queue.len()
    }

    pub(super) fn received_requests(&self) -> Option<Vec<Request>> {
        self.received_requests.clone()
    }

    pub(super) fn is_running(&self) -> bool {
        self.running
    }

    pub(super) fn shut_down(&mut self) {
        self.running = false;
    }
}

/// An HTTP server running on a background thread, serving the responses enqueued on it in
/// FIFO order.
///
/// `MockWebServer` owns the server: only the owner can stop it. Everybody else works with a
/// [`ServerHandle`], obtained through [`MockWebServer::handle`].
///
/// Dropping a running `MockWebServer` stops it.
pub struct MockWebServer {
    handle: ServerHandle,
    // Dropping or firing the trigger makes the accept loop exit.
    shutdown_trigger: Option<oneshot::Sender<()>>,
    server_thread: Option<JoinHandle<()>>,
}

impl MockWebServer {
    /// Start serving on `listener`.
    ///
    /// The listener is already bound, so connections are queued by the OS until the
    /// background thread starts accepting them: the server is usable as soon as this returns.
    pub(super) fn start(
        listener: TcpListener,
        recording: RequestRecording,
        body_print_limit: BodyPrintLimit,
    ) -> Result<Self, ServerLifecycleError> {
        let server_address: SocketAddr = listener.local_addr().map_err(ServerLifecycleError::Start)?;
        listener
            .set_nonblocking(true)
            .map_err(ServerLifecycleError::Start)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ServerLifecycleError::Start)?;
        let listener = {
            // Registering the listener requires a reactor.
            let _guard = runtime.enter();
            tokio::net::TcpListener::from_std(listener).map_err(ServerLifecycleError::Start)?
        };

        let state = Arc::new(RwLock::new(MockServerState::new(recording, body_print_limit)));
        let (shutdown_trigger, shutdown_receiver) = oneshot::channel();

        let server_state = state.clone();
        let server_thread = std::thread::Builder::new()
            .name(format!("mock-web-server-{}", server_address.port()))
            .spawn(move || runtime.block_on(run_server(listener, server_state, shutdown_receiver)))
            .map_err(ServerLifecycleError::Start)?;

        debug!("Mock web server listening on {}.", server_address);
        Ok(Self {
            handle: ServerHandle::new(state, server_address),
            shutdown_trigger: Some(shutdown_trigger),
            server_thread: Some(server_thread),
        })
    }

    /// Shut the server down and wait for its thread to exit.
    ///
    /// Stopping an already stopped server does nothing. From then on every [`ServerHandle`]
    /// of this server refuses new responses.
    pub fn stop(&mut self) -> Result<(), ServerLifecycleError> {
        self.handle.shut_down();
        if let Some(trigger) = self.shutdown_trigger.take() {
            // The receiver is gone if the server loop already exited, nothing to signal then.
            let _ = trigger.send(());
        }
        if let Some(thread) = self.server_thread.take() {
            thread.join().map_err(|panic| {
                let reason = panic
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                    .unwrap_or_else(|| "the server thread panicked".to_string());
                ServerLifecycleError::Stop(reason)
            })?;
            debug!("Mock web server on {} stopped.", self.handle.address());
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.server_thread.is_some()
    }

    /// A non-owning handle to this server.
    pub fn handle(&self) -> &ServerHandle {
        &self.handle
    }
}

impl Drop for MockWebServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method};

    fn get(path: &str) -> Request {
        Request {
            url: format!("http://localhost{}", path).parse().unwrap(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    #[test]
    fn responses_are_served_first_in_first_out() {
        let mut state = MockServerState::new(RequestRecording::Enabled, BodyPrintLimit::Unlimited);
        state.enqueue(ResponseDescriptor::of("A"));
        state.enqueue(ResponseDescriptor::of("B"));

        let first = state.handle_request(get("/"));
        let second = state.handle_request(get("/"));
        let third = state.handle_request(get("/"));

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(third.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.pending_responses(), 0);
    }

    #[test]
    fn requests_are_recorded_only_when_enabled() {
        let mut recording =
            MockServerState::new(RequestRecording::Enabled, BodyPrintLimit::Unlimited);
        let mut silent = MockServerState::new(RequestRecording::Disabled, BodyPrintLimit::Unlimited);

        recording.handle_request(get("/a"));
        silent.handle_request(get("/a"));

        assert_eq!(recording.received_requests().unwrap().len(), 1);
        assert!(silent.received_requests().is_none());
    }

    #[test]
    fn stopping_the_server_invalidates_its_handles() {
        let mut server = MockWebServer::builder().start().unwrap();
        let handle = server.handle().clone();
        assert!(handle.is_running());

        server.stop().unwrap();

        assert!(!handle.is_running());
        assert!(matches!(
            handle.enqueue(ResponseDescriptor::of("too late")),
            Err(ServerLifecycleError::NotRunning)
        ));
        assert_eq!(handle.pending_responses(), 0);
    }
}
