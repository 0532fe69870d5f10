//! LLM error types
//!
//! Re-exports wpcraft-error and maps provider failures onto it.

pub use wpcraft_error::{Error, ErrorKind, ErrorStatus, Result};

use crate::provider::ProviderError;

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        let error = match &err {
            ProviderError::Network(_) => Error::new(ErrorKind::NetworkFailed, message),
            ProviderError::Api { status, .. } => {
                let status = *status;
                let kind = if status >= 500 {
                    ErrorKind::ProviderUnavailable
                } else {
                    ErrorKind::InferenceFailed
                };
                Error::new(kind, message).with_context("http_status", status.to_string())
            }
            ProviderError::Parse(_) => Error::new(ErrorKind::ParseFailed, message),
            ProviderError::RateLimited { retry_after } => {
                let error = Error::new(ErrorKind::RateLimited, message);
                match retry_after {
                    Some(secs) => error.with_context("retry_after", secs.to_string()),
                    None => error,
                }
            }
            ProviderError::InvalidRequest(_) => Error::new(ErrorKind::InvalidArgument, message),
            ProviderError::AuthenticationFailed => {
                Error::new(ErrorKind::AuthenticationFailed, message)
            }
            ProviderError::Other(_) => Error::new(ErrorKind::InferenceFailed, message),
        };
        error.with_operation("provider")
    }
}
