//! Error types for the catalog downloader.
//!
//! Record-count failures are classified into `ServiceFailure`, `RequestError` and
//! `InternalError`. Transport errors raised while fetching result pages are
//! passed through untouched as `Error::Transport`, so callers see the
//! underlying failure.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for catalog download operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an [`HttpGet`](crate::remote::HttpGet) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
  /// The remote host could not be reached (connect failure or timeout)
  #[error("could not connect to {url}: {message}")]
  Connect { url: String, message: String },

  /// Any other transport-level failure (malformed request, broken body, ...)
  #[error("request to {url} failed: {message}")]
  Request { url: String, message: String },
}

impl TransportError {
  pub fn is_connect(&self) -> bool {
    matches!(self, TransportError::Connect { .. })
  }
}

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
  /// The catalog service is unreachable or answered with an error status
  #[error("failed to connect to the catalog service -- try again later ({0})")]
  ServiceFailure(String),

  /// The search request itself failed at the transport level
  #[error("failed to search the catalog: {0}")]
  RequestError(String),

  /// The service returned content in a shape we do not understand
  #[error("unexpected content from the catalog service: {0}")]
  InternalError(String),

  /// Transport failure while fetching a page of records
  #[error(transparent)]
  Transport(#[from] TransportError),

  /// Reading or writing a local file failed
  #[error("I/O error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// Invalid configuration or argument
  #[error("configuration error: {0}")]
  Config(String),

  /// The download worker thread panicked
  #[error("download worker panicked")]
  WorkerPanicked,
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Error::Io {
      path: path.into(),
      source,
    }
  }
}
