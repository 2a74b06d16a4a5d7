use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{
    config::LoadError,
    engine::{Capability, EngineError},
    views::ViewError,
};

/// Errors surfaced by the render facade and response assembly.
///
/// Everything propagates synchronously to the caller; there is no local
/// recovery or retry in this layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("pdf configuration error: {0}")]
    Config(#[from] LoadError),
    /// Backend warnings promoted to a hard failure. The display output is the
    /// newline-terminated concatenation of every reported message.
    #[error("{messages}")]
    RenderingWarnings { messages: String },
    #[error("pdf backend `{backend}` does not support {capability}")]
    UnsupportedBackend {
        backend: &'static str,
        capability: Capability,
    },
    #[error(transparent)]
    View(#[from] ViewError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl Error {
    fn presentation_message(&self) -> &'static str {
        match self {
            Error::Config(_) => "PDF service is misconfigured",
            Error::RenderingWarnings { .. } => "PDF rendering reported warnings",
            Error::UnsupportedBackend { .. } => "PDF backend capability missing",
            Error::View(_) => "View rendering failed",
            Error::Engine(_) => "PDF rendering failed",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!(error = %self, "pdf error");
        (StatusCode::INTERNAL_SERVER_ERROR, self.presentation_message()).into_response()
    }
}
