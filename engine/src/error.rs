use thiserror::Error;

/// Error taxonomy for the stream engine.
///
/// Construction-time problems surface synchronously through these variants;
/// data-path backend failures are absorbed by the worker (silence on input,
/// logged-and-reported-written on output) and never reach the client as
/// errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("backend failure: {0}")]
    Backend(String),
}
