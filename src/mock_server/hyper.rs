use crate::mock_server::bare_server::MockServerState;
use http::{Response, StatusCode};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use log::{debug, warn};
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// The actual HTTP server answering incoming requests with the enqueued responses.
pub(super) async fn run_server(
    listener: TcpListener,
    server_state: Arc<RwLock<MockServerState>>,
    mut shutdown_signal: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(serve_connection(stream, server_state.clone()));
                }
                Err(e) => warn!("Mock web server failed to accept a connection: {}", e),
            },
            // Resolves when either:
            // - the sender half of the channel gets dropped (i.e. the MockWebServer is dropped)
            // - the sender is used, sending a poison pill willingly as a shutdown signal
            _ = &mut shutdown_signal => break,
        }
    }
    // Connections still open are dropped together with the runtime.
}

async fn serve_connection(stream: TcpStream, server_state: Arc<RwLock<MockServerState>>) {
    let service = service_fn(move |request: hyper::Request<Incoming>| {
        let server_state = server_state.clone();
        async move {
            let response = match crate::Request::from_hyper(request).await {
                Ok(request) => answer(&server_state, request),
                Err(e) => {
                    warn!("Failed to read an incoming request: {}", e);
                    let mut response = Response::new(Full::new(Bytes::new()));
                    *response.status_mut() = StatusCode::BAD_REQUEST;
                    response
                }
            };
            Ok::<_, Infallible>(response)
        }
    });

    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!("Connection to the mock web server closed with an error: {}", e);
    }
}

// Kept out of the async block so the lock guard never lives across an `.await`.
fn answer(server_state: &RwLock<MockServerState>, request: crate::Request) -> Response<Full<Bytes>> {
    server_state
        .write()
        .expect("Poisoned lock!")
        .handle_request(request)
}
