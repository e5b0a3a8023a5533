//! Error types surfaced to the host test runner.
//!
//! Every failure here is a configuration or environment fault: nothing is retried, and
//! all of them abort the setup of the affected test (or suite).
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A [`ContentLoader`](crate::ContentLoader) could not produce the content for a reference.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The reference does not name anything in the bundled resource set.
    #[error("Resource `{reference}` does not exist (looked for `{}`).", path.display())]
    ResourceNotFound { reference: String, path: PathBuf },

    /// The resource exists but could not be read.
    #[error("Failed to read resource `{reference}`.")]
    Io {
        reference: String,
        #[source]
        source: io::Error,
    },
}

/// A transition of the embedded server failed, or a hook was invoked in the wrong state.
#[derive(Debug, Error)]
pub enum ServerLifecycleError {
    #[error("Failed to start the mock web server.")]
    Start(#[source] io::Error),

    #[error("Failed to stop the mock web server: {0}")]
    Stop(String),

    #[error("The mock web server is not running.")]
    NotRunning,

    #[error("The mock web server is already running.")]
    AlreadyRunning,

    /// Suite-scoped servers cannot be started again once stopped.
    #[error("The mock web server has already been stopped for this suite.")]
    Terminated,
}

/// Top-level error returned by the lifecycle hooks and the binder.
#[derive(Debug, Error)]
pub enum TestbedError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Lifecycle(#[from] ServerLifecycleError),

    /// The slot's target type cannot hold the kind of value that was declared for it.
    #[error("Slot `{slot}` of type `{type_name}` cannot be bound as {kind}.")]
    UnsupportedBinding {
        slot: String,
        type_name: &'static str,
        kind: &'static str,
    },

    #[error("Slot `{slot}` has an invalid declaration: {reason}")]
    InvalidDeclaration { slot: String, reason: String },

    #[error("{code} is not a valid HTTP status code.")]
    InvalidStatusCode { code: u16 },

    #[error("Cannot resolve `{path}` against the mock web server's base url.")]
    InvalidUrl {
        path: String,
        #[source]
        source: url::ParseError,
    },
}
